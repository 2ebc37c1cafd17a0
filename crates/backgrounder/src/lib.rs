//! Backgrounder command-line client.
//!
//! The binary in `main.rs` only parses arguments and sets up logging; the
//! commands live in [`cli`].

pub mod cli;
