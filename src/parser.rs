//! Event dispatcher and parse entry points.
//!
//! The dispatcher keeps a cursor on the innermost open node. Each open event resolves
//! a new child of the cursor, applies its attributes and runs its `start` hook; text
//! accumulates on the cursor; each close event validates the cursor, runs its
//! `finalize` hook, freezes it and moves the cursor back to the parent. The root node
//! is created before the first event and closed after the last one.

use std::fs::File;
use std::io::{BufRead, BufReader, ErrorKind};
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::error::{HookPhase, Result, SourceError, TagError};
use crate::schema::{Schema, TagId};
use crate::tokenizer::{MarkupSink, Tokenizer};
use crate::tree::{NodeId, Tree};

/// Options controlling how markup is fed to the tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ParseOptions {
    /// Trim text fragments and drop whitespace-only ones
    pub trim_text: bool,
}

/// Parser bound to one schema; reusable across documents and threads
#[derive(Debug)]
pub struct Parser<'s, C> {
    schema: &'s Schema<C>,
    options: ParseOptions,
}

impl<'s, C> Parser<'s, C> {
    pub fn new(schema: &'s Schema<C>) -> Self {
        Self {
            schema,
            options: ParseOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ParseOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> ParseOptions {
        self.options
    }

    /// Parse a document whose outermost element must be a declared child of `root`.
    ///
    /// Returns the tree once every node, the root included, has been validated and
    /// finalized. Any failure aborts the parse and no tree is returned.
    pub fn parse<R: BufRead>(&self, source: R, root: TagId, context: &mut C) -> Result<Tree> {
        if !self.schema.contains(root) {
            return Err(TagError::UnknownTag { tag: root });
        }
        let tree = Tree::new(Arc::clone(self.schema.table()), root)?;
        let root_id = tree.root_id();
        debug!(
            root = self.schema.descriptor(root).element_name(),
            trim_text = self.options.trim_text,
            "parse started"
        );

        let mut dispatcher = Dispatcher {
            schema: self.schema,
            cursor: root_id,
            tree,
            context,
        };
        dispatcher.run_hook(root_id, HookPhase::Start)?;
        Tokenizer::new(source)
            .with_trim_text(self.options.trim_text)
            .run(&mut dispatcher)?;
        dispatcher.close_node(root_id)?;

        debug!(nodes = dispatcher.tree.len(), "parse finished");
        Ok(dispatcher.tree)
    }

    pub fn parse_str(&self, content: &str, root: TagId, context: &mut C) -> Result<Tree> {
        self.parse(content.as_bytes(), root, context)
    }

    /// Parse a file; it stays open only for the duration of the call.
    pub fn parse_file(&self, path: &Path, root: TagId, context: &mut C) -> Result<Tree> {
        let file = File::open(path).map_err(|err| match err.kind() {
            ErrorKind::NotFound => TagError::Source(SourceError::NotFound {
                path: path.to_path_buf(),
            }),
            _ => TagError::from(err),
        })?;
        debug!(path = %path.display(), "reading markup file");
        self.parse(BufReader::new(file), root, context)
    }
}

/// Parse `source` against `schema` with default options
pub fn parse<R: BufRead, C>(
    source: R,
    schema: &Schema<C>,
    root: TagId,
    context: &mut C,
) -> Result<Tree> {
    Parser::new(schema).parse(source, root, context)
}

pub fn parse_str<C>(
    content: &str,
    schema: &Schema<C>,
    root: TagId,
    context: &mut C,
) -> Result<Tree> {
    Parser::new(schema).parse_str(content, root, context)
}

pub fn parse_file<C>(
    path: &Path,
    schema: &Schema<C>,
    root: TagId,
    context: &mut C,
) -> Result<Tree> {
    Parser::new(schema).parse_file(path, root, context)
}

struct Dispatcher<'s, 'c, C> {
    schema: &'s Schema<C>,
    tree: Tree,
    cursor: NodeId,
    context: &'c mut C,
}

impl<C> Dispatcher<'_, '_, C> {
    fn run_hook(&mut self, id: NodeId, phase: HookPhase) -> Result<()> {
        let node = self.tree.node(id);
        let handler = self.schema.handler(node.tag());
        let outcome = match phase {
            HookPhase::Start => handler.start(node, self.context),
            HookPhase::Finalize => handler.finalize(node, self.context),
        };

        outcome.map_err(|err| match err.downcast::<TagError>() {
            Ok(tag_error) => tag_error,
            Err(other) => TagError::Hook {
                element: node.element_name().to_string(),
                phase,
                message: format!("{other:#}"),
            },
        })
    }

    fn close_node(&mut self, id: NodeId) -> Result<()> {
        self.tree.validate(id)?;
        self.run_hook(id, HookPhase::Finalize)?;
        self.tree.freeze(id);
        trace!(element = self.tree.node(id).element_name(), "finalized");
        Ok(())
    }
}

impl<C> MarkupSink for Dispatcher<'_, '_, C> {
    fn open(&mut self, name: &str, attributes: &[(String, String)]) -> Result<()> {
        let child = self.tree.resolve_child(self.cursor, name)?;
        for (key, value) in attributes {
            self.tree.set_attribute(child, key, value.as_str(), true)?;
        }
        self.run_hook(child, HookPhase::Start)?;
        self.cursor = child;
        Ok(())
    }

    fn text(&mut self, fragment: &str) -> Result<()> {
        self.tree.add_text(self.cursor, fragment)
    }

    fn close(&mut self, name: &str) -> Result<()> {
        let current = self.cursor;
        let parent = self.tree.node(current).parent().map(|node| node.id());
        let Some(parent) = parent else {
            return Err(SourceError::Syntax {
                position: 0,
                message: format!("unbalanced closing tag </{name}>"),
            }
            .into());
        };

        self.close_node(current)?;
        self.cursor = parent;
        Ok(())
    }
}
