//! relaybell: configuration model and editing engine for AI-summarized
//! notification routing.
//!
//! A [`document::ConfigDocument`] holds the AI settings, the destinations and
//! the routing rules. Edits arrive either as toggles ([`reconcile`]) or as
//! YAML text ([`sync`]), are gated by the structural checks in
//! [`validation`], and move to and from the backend through [`transport`].

pub mod cli;
pub mod document;
pub mod logging;
pub mod poll;
pub mod reconcile;
pub mod settings;
pub mod sync;
pub mod transport;
pub mod validation;
