//! Template error types

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("unknown template: {0}")]
    NotFound(String),

    #[error("IO error reading templates from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("template render failed for {name}: {source}")]
    Render {
        name: String,
        #[source]
        source: minijinja::Error,
    },

    #[error("rendered output for {name} failed structural validation: {reason}")]
    Structural { name: String, reason: String },

    #[error("template source invalid: {0}")]
    Invalid(#[from] minijinja::Error),
}
