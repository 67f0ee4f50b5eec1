//! # tagtree Library
//!
//! A schema-validated streaming parser for hierarchical markup. Callers declare tag
//! types with attribute and child constraints, then parse documents into a typed node
//! tree while lifecycle hooks fire at element entry and exit.
//!
//! The bundled [`manifest`] schema reads package manifests into a build description,
//! and [`docstrings`] prepares the modules it describes for compilation.

pub mod cli;
pub mod config;
pub mod docstrings;
pub mod error;
pub mod error_reporter;
pub mod manifest;
pub mod output;
pub mod parser;
pub mod schema;
pub mod sources;
pub mod tokenizer;
pub mod tree;

pub use cli::{Cli, OutputFormat, VerbosityLevel};
pub use config::{Config, ConfigError, ConfigManager};
pub use docstrings::{prebuild_module, prebuild_package, render_doc_blocks};
pub use error::{DocError, HookPhase, ManifestError, Result, SourceError, TagError};
pub use manifest::{
    Manifest, ModuleDescriptor, PackageDescriptor, manifest_schema, read_manifest,
    read_manifest_str, read_manifest_with,
};
pub use output::Output;
pub use parser::{ParseOptions, Parser, parse, parse_file, parse_str};
pub use schema::{
    AttributeSpec, DescriptorTable, NoHooks, Schema, SchemaBuilder, TagDescriptor, TagHandler,
    TagId,
};
pub use sources::SourceMatcher;
pub use tree::{NodeId, NodeRef, NodeState, Tree};
