//! Docstring includes for extension module sources.
//!
//! A source such as `src/circle.c` may sit next to `src/circle.doc`, a text file of
//! named blocks:
//!
//! ```text
//! !DOC area
//! Area of the circle, in "square units".
//! !END
//! ```
//!
//! Every block becomes a `PyDoc_STRVAR(area_doc, ...)` declaration in
//! `src/circle.d`, which the source includes before it is compiled. An include is
//! only rewritten when its `.doc` file is at least as recent.

use std::fmt::Write;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::{debug, info, warn};

use crate::error::DocError;
use crate::manifest::{ModuleDescriptor, PackageDescriptor};

const BLOCK_START: &str = "!DOC";
const BLOCK_END: &str = "!END";

/// Render the doc blocks of `input` as C string declarations.
///
/// Trailing blanks are stripped from every line and double quotes are escaped.
/// Lines outside a block are ignored, as is a block left open at the end of input.
pub fn render_doc_blocks(input: &str, path: &Path) -> Result<String, DocError> {
    let mut output = String::new();
    let mut block: Option<(&str, Vec<String>)> = None;

    for (index, line) in input.lines().enumerate() {
        let line = line.trim_end_matches([' ', '\t', '\r']);

        if let Some((name, mut lines)) = block.take() {
            if line == BLOCK_END {
                write_declaration(&mut output, name, &lines);
            } else {
                lines.push(format!("\"{}\\n\"", line.replace('"', "\\\"")));
                block = Some((name, lines));
            }
        } else if line.starts_with(BLOCK_START) {
            let name = line
                .split_whitespace()
                .nth(1)
                .ok_or_else(|| DocError::MissingName {
                    path: path.to_path_buf(),
                    line: index + 1,
                })?;
            block = Some((name, Vec::new()));
        }
    }

    if let Some((name, _)) = block {
        warn!(path = %path.display(), block = name, "doc block is never closed");
    }
    Ok(output)
}

fn write_declaration(output: &mut String, name: &str, lines: &[String]) {
    let _ = write!(
        output,
        "PyDoc_STRVAR(\n\t{name}_doc,\n\t{}\n\t);\n\n",
        lines.join("\n\t")
    );
}

/// Whether `include` is missing or older than `doc`.
///
/// When either modification time cannot be read the include is left alone.
pub fn needs_rebuild(doc: &Path, include: &Path) -> bool {
    if !include.is_file() {
        return true;
    }
    match (modified(doc), modified(include)) {
        (Some(doc), Some(include)) => doc >= include,
        _ => false,
    }
}

fn modified(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|meta| meta.modified()).ok()
}

/// Regenerate the out-of-date includes of one module.
///
/// Returns the includes written, relative to `base_dir`.
pub fn prebuild_module(
    base_dir: &Path,
    module: &ModuleDescriptor,
) -> Result<Vec<PathBuf>, DocError> {
    let mut written = Vec::new();

    for source in &module.sources {
        let doc = base_dir.join(source.with_extension("doc"));
        if !doc.is_file() {
            continue;
        }
        let include = source.with_extension("d");
        let include_path = base_dir.join(&include);
        if !needs_rebuild(&doc, &include_path) {
            debug!(include = %include.display(), "docstrings up to date");
            continue;
        }

        info!(include = %include.display(), "building docstrings");
        let input = fs::read_to_string(&doc).map_err(|source| DocError::Read {
            path: doc.clone(),
            source,
        })?;
        let rendered = render_doc_blocks(&input, &doc)?;
        fs::write(&include_path, rendered).map_err(|source| DocError::Write {
            path: include_path.clone(),
            source,
        })?;
        written.push(include);
    }

    Ok(written)
}

/// Regenerate the out-of-date includes of every module of a package
pub fn prebuild_package(
    base_dir: &Path,
    package: &PackageDescriptor,
) -> Result<Vec<PathBuf>, DocError> {
    let mut written = Vec::new();
    for module in &package.modules {
        info!(module = %module.name, "pre-processing module");
        written.extend(prebuild_module(base_dir, module)?);
    }
    Ok(written)
}
