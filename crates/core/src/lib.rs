//! blockgen: C++ block header analysis and plugin registration generation.
//!
//! Scans a tree of block-library headers, matches each block class against
//! its declarative XML metadata, reconciles factory and setter parameters and
//! renders a single C++ source that registers every block together with a
//! JSON description for graphical editors.
//!
//! # Modules
//!
//! - [`types`]: Core types shared across the codebase
//! - [`config`]: Generator configuration and `blockgen.toml` loading
//! - [`error`]: Fatal errors and per-item skip reasons
//! - [`header`]: tree-sitter C++ header adapter
//! - [`classify`]: Which classes are blocks
//! - [`metadata`]: XML block records and category trees
//! - [`fuzzy`]: Pluggable similarity scoring (Ratcliff/Obershelp)
//! - [`matcher`]: Class to metadata record matching
//! - [`signature`]: Factory and call extraction
//! - [`resolve`]: Parameter key resolution and descriptor assembly
//! - [`meta`]: Meta-block synthesis for type-specialized variants
//! - [`doxygen`]: Doxygen comment to HTML doc lines
//! - [`emit`]: Descriptor JSON and template rendering
//! - [`pipeline`]: Two-phase run orchestration and the run report

pub mod classify;
pub mod config;
pub mod doxygen;
pub mod emit;
pub mod error;
pub mod fuzzy;
pub mod header;
pub mod matcher;
pub mod meta;
pub mod metadata;
pub mod pipeline;
pub mod resolve;
pub mod signature;
pub mod types;

pub use config::{load_config, GeneratorConfig};
pub use error::{FatalError, SkipReason};
pub use pipeline::{run, RunOptions, RunOutput, RunReport};
