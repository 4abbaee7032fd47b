// src/config/mod.rs

//! Task configuration.
//!
//! Responsibilities:
//! - Hold a task's declared parameters as an ordered JSON-like map (`model.rs`).
//! - Load a task file from disk for the `shtask` binary (`loader.rs`).
//! - Extract and check the shell parameters (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_from_path, load_from_str};
pub use model::TaskConfig;
pub use validate::{COMMAND_KEY, DEFAULT_SHELL, SHELL_KEY, ShellParams};
