//! Envelope-encryption key management: a root key wraps per-scope data
//! encryption keys (DEKs), which in turn encrypt caller payloads.
//!
//! The [`provider`] module is the stable entry point; everything else is
//! composed underneath it and is not meant to be used directly by callers
//! outside this crate.

pub mod app;
pub mod cli;
pub mod config;
pub mod crypto;
pub mod entropy;
pub mod exit_codes;
pub mod http;
pub mod provider;
pub mod registry;
pub mod secret;
pub mod store;
pub mod wire;
