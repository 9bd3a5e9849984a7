//! MindGate Blocklist Compiler
//!
//! This crate turns blocklist text (one entry per line or comma separated,
//! `#` comments, or a JSON array) into plaintext or salted-hash blocklists
//! and the storage entries the extension reads them from.

pub mod parser;
pub mod optimizer;
pub mod builder;

pub use builder::{build_hashed, build_list, build_storage_entries, generate_salt, BuildError};
pub use optimizer::{optimize_entries, OptimizeStats};
pub use parser::{parse_list, ParseError, ParsedEntry};
