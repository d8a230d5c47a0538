//! Error taxonomy.
//!
//! Only [`FatalError`] ever aborts a run. The other types describe why a
//! single header, metadata record, class or meta group was left out; the
//! pipeline logs them and records them in the run report.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort the whole run.
#[derive(Error, Debug)]
pub enum FatalError {
    #[error("no ancestor of {} contains a '{dir}' directory", root.display())]
    RootNotFound { root: PathBuf, dir: String },

    #[error("duplicate metadata '{key}' in {} and {}", first.display(), second.display())]
    DuplicateMetadata { key: String, first: PathBuf, second: PathBuf },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("template error: {0}")]
    Template(#[from] tera::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Why a header contributed no classes.
#[derive(Error, Debug)]
pub enum HeaderError {
    #[error("could not read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parser produced no tree for {}", path.display())]
    Parse { path: PathBuf },

    #[error("syntax errors in {}", path.display())]
    Syntax { path: PathBuf },
}

/// Why a metadata file was not loaded.
#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("could not read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed XML in {}: {message}", path.display())]
    Xml { path: PathBuf, message: String },

    #[error("{} has no <{field}> element", path.display())]
    MissingField { path: PathBuf, field: &'static str },

    #[error("{} is neither a <block> nor a <cat> document", path.display())]
    UnknownRoot { path: PathBuf },
}

/// Why a class or meta group was left out of the output.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    #[error("no factory function found for {class}")]
    NoFactory { class: String },

    #[error("too many factory parameters for {class} ({count} > {max})")]
    TooManyFactoryArgs { class: String, count: usize, max: usize },

    #[error("no GRC/metadata match for {class} (tried '{candidate}')")]
    NoMetadataMatch { class: String, candidate: String },

    #[error("metadata group {group} has no type parameter")]
    MissingTypeParam { group: String },

    #[error("cannot generalize path {path} for group {group}: no '_' to strip")]
    NonGeneralizablePath { group: String, path: String },

    #[error("metadata group {group} is empty")]
    EmptyGroup { group: String },
}
