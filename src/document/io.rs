use anyhow::{bail, Context, Result};
use std::path::Path;
use tracing::info;

use super::{load, ConfigDocument, FormatError};

/// Maximum size for an imported document file (4 MB).
pub const MAX_DOCUMENT_FILE_BYTES: u64 = 4 * 1024 * 1024;

/// Render the whole document as YAML, keys in field order.
pub fn to_yaml(doc: &ConfigDocument) -> Result<String, FormatError> {
    Ok(serde_yaml::to_string(doc)?)
}

/// Parse a whole-document YAML export. Goes through [`load`], so legacy and
/// partial documents are accepted as well.
pub fn from_yaml(text: &str) -> Result<ConfigDocument, FormatError> {
    if text.trim().is_empty() {
        return Ok(ConfigDocument::default());
    }
    let value: serde_json::Value = serde_yaml::from_str(text)?;
    load(value)
}

/// Read and load a document file. See [`read_document_value`].
pub fn read_document_file(path: &Path) -> Result<ConfigDocument> {
    let doc = load(read_document_value(path)?)?;
    info!("Loaded document from {}", path.display());
    Ok(doc)
}

/// Read a document file as an untyped value, with guardrails:
///
/// - File size limit (`MAX_DOCUMENT_FILE_BYTES`)
/// - Symlinks at the final path component are refused
/// - Files with more than one hard link are refused
///
/// The format follows the extension: YAML, TOML, otherwise JSON5 (which
/// also accepts plain JSON). Blank files read as `null`.
pub fn read_document_value(path: &Path) -> Result<serde_json::Value> {
    let metadata = std::fs::symlink_metadata(path)
        .with_context(|| format!("Cannot stat document file '{}'", path.display()))?;

    #[cfg(unix)]
    if metadata.file_type().is_symlink() {
        bail!(
            "Document file '{}' is a symlink, refusing to follow it",
            path.display()
        );
    }

    if metadata.len() > MAX_DOCUMENT_FILE_BYTES {
        bail!(
            "Document file '{}' is {} bytes, exceeds limit of {} bytes",
            path.display(),
            metadata.len(),
            MAX_DOCUMENT_FILE_BYTES,
        );
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        if metadata.is_file() && metadata.nlink() > 1 {
            bail!(
                "Document file '{}' has {} hard links, refusing to read it",
                path.display(),
                metadata.nlink(),
            );
        }
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read document file '{}'", path.display()))?;

    if content.trim().is_empty() {
        return Ok(serde_json::Value::Null);
    }

    let value = match path.extension().and_then(|e| e.to_str()) {
        Some("yaml") | Some("yml") => serde_yaml::from_str(&content)?,
        Some("toml") => toml::from_str(&content)?,
        _ => json5::from_str(&content)?,
    };

    Ok(value)
}

/// Write the document as YAML, replacing any existing file.
pub fn write_yaml_file(path: &Path, doc: &ConfigDocument) -> Result<()> {
    let yaml = to_yaml(doc)?;
    std::fs::write(path, yaml)
        .with_context(|| format!("Failed to write document file '{}'", path.display()))?;
    Ok(())
}

/// Hash of the serialized document, for detecting unsaved changes.
pub fn document_fingerprint(doc: &ConfigDocument) -> String {
    use sha2::{Digest, Sha256};
    let canonical = serde_json::to_string(&doc.serialize()).unwrap_or_default();
    let hash = Sha256::digest(canonical.as_bytes());
    hex::encode(hash)
}
