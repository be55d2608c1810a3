/// Default document values shared by loading, migration and the editors.

/// Name of the mandatory fallback rule.
pub const DEFAULT_RULE_NAME: &str = "default-rule";

/// Preprompt given to a synthesized fallback rule.
pub const DEFAULT_PREPROMPT: &str =
    "Summarize the following message in one or two short sentences. Do not add anything else.";

/// Maximum preprompt length in characters.
pub const MAX_PREPROMPT_CHARS: usize = 2048;

/// Default Ollama endpoint.
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Default Ollama model.
pub const DEFAULT_OLLAMA_MODEL: &str = "gemma:2b";

/// Public ntfy server; topics on it map to `ntfy://{topic}`.
pub const NTFY_PUBLIC_SERVER: &str = "https://ntfy.sh";
