use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::schema::TagId;

/// Which lifecycle hook raised a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookPhase {
    Start,
    Finalize,
}

impl fmt::Display for HookPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookPhase::Start => f.write_str("start"),
            HookPhase::Finalize => f.write_str("finalize"),
        }
    }
}

/// Main error type for schema validation and tree building
#[derive(Error, Debug)]
pub enum TagError {
    #[error("Unknown attribute \"{attribute}\" for tag <{element}>")]
    UnknownAttribute { element: String, attribute: String },

    #[error("Attribute \"{attribute}\" already set on tag <{element}>")]
    AttributeAlreadySet { element: String, attribute: String },

    #[error("Tag <{element}> is incomplete: {}", describe_missing(.attributes, .children))]
    MissingMandatoryAttributes {
        element: String,
        attributes: Vec<String>,
        /// Mandatory children also missing at the same close
        children: Vec<String>,
    },

    #[error("Tag <{element}> is incomplete: {}", describe_missing(&[], .children))]
    MissingMandatoryChildren {
        element: String,
        children: Vec<String>,
    },

    #[error("Sub tag <{child}> must be unique for tag <{element}>")]
    DuplicateUniqueChild { element: String, child: String },

    #[error("Unexpected sub tag <{child}> for tag <{element}>")]
    UnexpectedElement { element: String, child: String },

    #[error("Tag <{element}> is finalized and can no longer be modified")]
    NodeFrozen { element: String },

    #[error("Tag {tag} is not declared in this schema")]
    UnknownTag { tag: TagId },

    #[error("The {phase} hook of tag <{element}> failed: {message}")]
    Hook {
        element: String,
        phase: HookPhase,
        message: String,
    },

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Manifest(#[from] ManifestError),
}

/// Failures of the markup source itself
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Source not found: {path}")]
    NotFound { path: PathBuf },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed markup at byte {position}: {message}")]
    Syntax { position: u64, message: String },
}

/// Failures raised by the package manifest hooks
#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("Duplicate module '{name}'")]
    DuplicateModule { name: String },

    #[error("Invalid source pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("{pattern}: no such file or directory under {}", .base_dir.display())]
    NoMatchingSources { pattern: String, base_dir: PathBuf },

    #[error("Tag <{element}> can only appear inside a module")]
    OutsideModule { element: String },
}

/// Failures while generating docstring includes for module sources
#[derive(Error, Debug)]
pub enum DocError {
    #[error("Cannot read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Cannot write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{}:{line}: doc block has no name", .path.display())]
    MissingName { path: PathBuf, line: usize },
}

impl From<std::io::Error> for TagError {
    fn from(err: std::io::Error) -> Self {
        TagError::Source(SourceError::Io(err))
    }
}

fn describe_missing(attributes: &[String], children: &[String]) -> String {
    let mut parts = Vec::new();
    if !attributes.is_empty() {
        parts.push(format!(
            "missing mandatory attributes [{}]",
            attributes.join(", ")
        ));
    }
    if !children.is_empty() {
        parts.push(format!("missing mandatory tags [{}]", children.join(", ")));
    }
    parts.join("; ")
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, TagError>;
