// src/config/mod.rs

//! Build file loading and validation.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a build file from disk (`loader.rs`).
//! - Validate basic invariants like relation targets and `only_if` shape
//!   (`validate.rs`).
//! - Turn the file into declared tasks (`tasks.rs`) and merge it with CLI
//!   flags (`settings.rs`).

pub mod loader;
pub mod model;
pub mod settings;
pub mod tasks;
pub mod validate;

pub use loader::{config_root_dir, load_and_validate, load_from_path, load_from_str};
pub use model::{ConfigFile, ConfigSection, PredicateConfig, RawConfigFile, TaskConfig};
pub use settings::BuildSettings;
