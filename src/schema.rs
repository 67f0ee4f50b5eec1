//! Schema registration
//!
//! A schema is a table of immutable [`TagDescriptor`]s plus one lifecycle handler per
//! tag. Descriptors are computed once, when a tag is declared through
//! [`SchemaBuilder::tag`], and are shared read-only by every parse that uses the schema.
//!
//! Children reference already declared tags by [`TagId`], so a schema is declared from
//! the leaves up:
//!
//! ```
//! use tagtree::{AttributeSpec, SchemaBuilder};
//!
//! let mut builder = SchemaBuilder::<()>::new();
//! let module = builder
//!     .tag("module")
//!     .mandatory_attribute("name")
//!     .default_attribute("language", "none")
//!     .declare();
//! let package = builder
//!     .tag("package")
//!     .attribute("name", AttributeSpec::Mandatory)
//!     .child(module, true)
//!     .declare();
//! let root = builder.tag("#document").child(package, true).declare();
//! let schema = builder.build();
//!
//! assert_eq!(schema.descriptor(root).children().len(), 1);
//! ```

use std::collections::HashMap;
use std::fmt;
use std::ops::Index;
use std::sync::Arc;

use crate::tree::NodeRef;

/// Identifier of a declared tag type inside one schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TagId(u32);

impl TagId {
    fn new(index: usize) -> Self {
        TagId(index as u32)
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for TagId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Declaration of one attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeSpec {
    /// Must be present before the element closes
    Mandatory,
    /// May be absent; reads back as `None`
    Optional,
    /// May be absent; reads back as the given value
    Default(String),
}

impl AttributeSpec {
    pub fn default_value(value: impl Into<String>) -> Self {
        AttributeSpec::Default(value.into())
    }

    pub fn is_mandatory(&self) -> bool {
        matches!(self, AttributeSpec::Mandatory)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeDecl {
    pub name: String,
    pub spec: AttributeSpec,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChildDecl {
    pub tag: TagId,
    pub mandatory: bool,
}

/// Immutable schema of one tag type
#[derive(Debug, Clone, PartialEq)]
pub struct TagDescriptor {
    element_name: String,
    unique: bool,
    attributes: Vec<AttributeDecl>,
    attribute_slots: HashMap<String, usize>,
    mandatory_attributes: Vec<usize>,
    children: Vec<ChildDecl>,
    child_slots: HashMap<String, usize>,
    mandatory_children: Vec<usize>,
}

impl TagDescriptor {
    /// Derive the descriptor of a tag from its declaration.
    ///
    /// `declared` holds the descriptors of every tag declared so far; each child tag
    /// must be among them.
    fn compute(
        element_name: String,
        unique: bool,
        attribute_specs: Vec<(String, AttributeSpec)>,
        child_specs: Vec<(TagId, bool)>,
        declared: &[TagDescriptor],
    ) -> Self {
        let mut attributes: Vec<AttributeDecl> = Vec::with_capacity(attribute_specs.len());
        let mut attribute_slots = HashMap::with_capacity(attribute_specs.len());
        for (name, spec) in attribute_specs {
            match attribute_slots.get(&name) {
                Some(&slot) => attributes[slot] = AttributeDecl { name, spec },
                None => {
                    attribute_slots.insert(name.clone(), attributes.len());
                    attributes.push(AttributeDecl { name, spec });
                }
            }
        }
        let mandatory_attributes = attributes
            .iter()
            .enumerate()
            .filter(|(_, decl)| decl.spec.is_mandatory())
            .map(|(slot, _)| slot)
            .collect();

        let mut children: Vec<ChildDecl> = Vec::with_capacity(child_specs.len());
        let mut child_slots = HashMap::with_capacity(child_specs.len());
        for (tag, mandatory) in child_specs {
            if let Some(existing) = children.iter_mut().find(|decl| decl.tag == tag) {
                existing.mandatory = mandatory;
                continue;
            }
            // First declared child wins when two child tags share an element name
            child_slots
                .entry(declared[tag.index()].element_name.clone())
                .or_insert(children.len());
            children.push(ChildDecl { tag, mandatory });
        }
        let mandatory_children = children
            .iter()
            .enumerate()
            .filter(|(_, decl)| decl.mandatory)
            .map(|(slot, _)| slot)
            .collect();

        Self {
            element_name,
            unique,
            attributes,
            attribute_slots,
            mandatory_attributes,
            children,
            child_slots,
            mandatory_children,
        }
    }

    pub fn element_name(&self) -> &str {
        &self.element_name
    }

    pub fn is_unique(&self) -> bool {
        self.unique
    }

    /// Declared attributes, in declaration order
    pub fn attributes(&self) -> &[AttributeDecl] {
        &self.attributes
    }

    pub fn attribute_slot(&self, name: &str) -> Option<usize> {
        self.attribute_slots.get(name).copied()
    }

    pub fn mandatory_attributes(&self) -> impl Iterator<Item = &AttributeDecl> + '_ {
        self.mandatory_attributes
            .iter()
            .map(|&slot| &self.attributes[slot])
    }

    /// Default value of the attribute in `slot`, if it declares one
    pub fn default_value(&self, slot: usize) -> Option<&str> {
        match &self.attributes[slot].spec {
            AttributeSpec::Default(value) => Some(value),
            _ => None,
        }
    }

    /// Declared children, in declaration order
    pub fn children(&self) -> &[ChildDecl] {
        &self.children
    }

    /// Child slot matching an element name
    pub fn child_slot(&self, element_name: &str) -> Option<usize> {
        self.child_slots.get(element_name).copied()
    }

    pub(crate) fn mandatory_child_slots(&self) -> &[usize] {
        &self.mandatory_children
    }
}

/// Every tag descriptor of a schema, indexed by [`TagId`]
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DescriptorTable {
    tags: Vec<TagDescriptor>,
}

impl DescriptorTable {
    pub fn get(&self, tag: TagId) -> Option<&TagDescriptor> {
        self.tags.get(tag.index())
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// First declared tag with the given element name
    pub fn tag_named(&self, element_name: &str) -> Option<TagId> {
        self.tags
            .iter()
            .position(|desc| desc.element_name == element_name)
            .map(TagId::new)
    }
}

impl Index<TagId> for DescriptorTable {
    type Output = TagDescriptor;

    fn index(&self, tag: TagId) -> &TagDescriptor {
        &self.tags[tag.index()]
    }
}

/// Lifecycle hooks of a tag type.
///
/// `start` runs when the element opens, after its attributes are applied and before
/// any child exists. `finalize` runs when the element closes, after validation and
/// after every descendant has been finalized. Both receive the caller's parse context.
///
/// A [`TagError`](crate::TagError) returned from a hook aborts the parse unchanged;
/// any other error is reported as [`TagError::Hook`](crate::TagError::Hook).
pub trait TagHandler<C>: Send + Sync {
    fn start(&self, node: NodeRef<'_>, context: &mut C) -> anyhow::Result<()> {
        let _ = (node, context);
        Ok(())
    }

    fn finalize(&self, node: NodeRef<'_>, context: &mut C) -> anyhow::Result<()> {
        let _ = (node, context);
        Ok(())
    }
}

/// Handler used for tags declared without hooks
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHooks;

impl<C> TagHandler<C> for NoHooks {}

type HookFn<C> = Box<dyn Fn(NodeRef<'_>, &mut C) -> anyhow::Result<()> + Send + Sync>;

/// Handler assembled from closures
struct Hooks<C> {
    start: Option<HookFn<C>>,
    finalize: Option<HookFn<C>>,
}

impl<C> TagHandler<C> for Hooks<C> {
    fn start(&self, node: NodeRef<'_>, context: &mut C) -> anyhow::Result<()> {
        match &self.start {
            Some(hook) => hook(node, context),
            None => Ok(()),
        }
    }

    fn finalize(&self, node: NodeRef<'_>, context: &mut C) -> anyhow::Result<()> {
        match &self.finalize {
            Some(hook) => hook(node, context),
            None => Ok(()),
        }
    }
}

/// A declared schema: descriptors plus hooks, for parse contexts of type `C`
pub struct Schema<C> {
    table: Arc<DescriptorTable>,
    handlers: Vec<Box<dyn TagHandler<C>>>,
}

impl<C> Schema<C> {
    pub fn table(&self) -> &Arc<DescriptorTable> {
        &self.table
    }

    /// Descriptor of a tag.
    ///
    /// # Panics
    ///
    /// Panics if `tag` was declared by a different schema builder.
    pub fn descriptor(&self, tag: TagId) -> &TagDescriptor {
        &self.table[tag]
    }

    pub fn contains(&self, tag: TagId) -> bool {
        tag.index() < self.handlers.len()
    }

    pub fn tag_named(&self, element_name: &str) -> Option<TagId> {
        self.table.tag_named(element_name)
    }

    pub(crate) fn handler(&self, tag: TagId) -> &dyn TagHandler<C> {
        self.handlers[tag.index()].as_ref()
    }
}

impl<C> fmt::Debug for Schema<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("table", &self.table)
            .finish_non_exhaustive()
    }
}

/// Declares tag types, leaves first, then freezes them into a [`Schema`]
pub struct SchemaBuilder<C> {
    tags: Vec<TagDescriptor>,
    handlers: Vec<Box<dyn TagHandler<C>>>,
}

impl<C> Default for SchemaBuilder<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> SchemaBuilder<C> {
    pub fn new() -> Self {
        Self {
            tags: Vec::new(),
            handlers: Vec::new(),
        }
    }

    /// Start declaring a tag type matching `element_name`
    pub fn tag(&mut self, element_name: impl Into<String>) -> TagBuilder<'_, C> {
        TagBuilder {
            builder: self,
            element_name: element_name.into(),
            unique: false,
            attributes: Vec::new(),
            children: Vec::new(),
            handler: None,
            start: None,
            finalize: None,
        }
    }

    pub fn build(self) -> Schema<C> {
        Schema {
            table: Arc::new(DescriptorTable { tags: self.tags }),
            handlers: self.handlers,
        }
    }
}

/// Declaration of a single tag type; finish with [`TagBuilder::declare`]
pub struct TagBuilder<'b, C> {
    builder: &'b mut SchemaBuilder<C>,
    element_name: String,
    unique: bool,
    attributes: Vec<(String, AttributeSpec)>,
    children: Vec<(TagId, bool)>,
    handler: Option<Box<dyn TagHandler<C>>>,
    start: Option<HookFn<C>>,
    finalize: Option<HookFn<C>>,
}

impl<'b, C> TagBuilder<'b, C> {
    /// At most one instance among its parent's children
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn attribute(mut self, name: impl Into<String>, spec: AttributeSpec) -> Self {
        self.attributes.push((name.into(), spec));
        self
    }

    pub fn mandatory_attribute(self, name: impl Into<String>) -> Self {
        self.attribute(name, AttributeSpec::Mandatory)
    }

    pub fn optional_attribute(self, name: impl Into<String>) -> Self {
        self.attribute(name, AttributeSpec::Optional)
    }

    pub fn default_attribute(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attribute(name, AttributeSpec::default_value(value))
    }

    /// Allow `tag` as a child; `mandatory` children must appear at least once
    ///
    /// # Panics
    ///
    /// Panics if `tag` was not declared by this builder.
    pub fn child(mut self, tag: TagId, mandatory: bool) -> Self {
        assert!(
            tag.index() < self.builder.tags.len(),
            "child tag {tag} is not declared in this schema"
        );
        self.children.push((tag, mandatory));
        self
    }

    /// Hooks from a [`TagHandler`]; replaces any `on_start`/`on_finalize` closures
    pub fn handler(mut self, handler: impl TagHandler<C> + 'static) -> Self {
        self.handler = Some(Box::new(handler));
        self
    }

    pub fn on_start<F>(mut self, hook: F) -> Self
    where
        F: Fn(NodeRef<'_>, &mut C) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.start = Some(Box::new(hook));
        self
    }

    pub fn on_finalize<F>(mut self, hook: F) -> Self
    where
        F: Fn(NodeRef<'_>, &mut C) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.finalize = Some(Box::new(hook));
        self
    }

    pub fn declare(self) -> TagId
    where
        C: 'static,
    {
        let TagBuilder {
            builder,
            element_name,
            unique,
            attributes,
            children,
            handler,
            start,
            finalize,
        } = self;

        let handler: Box<dyn TagHandler<C>> = match handler {
            Some(handler) => handler,
            None if start.is_none() && finalize.is_none() => Box::new(NoHooks),
            None => Box::new(Hooks { start, finalize }),
        };

        let id = TagId::new(builder.tags.len());
        let descriptor =
            TagDescriptor::compute(element_name, unique, attributes, children, &builder.tags);
        builder.tags.push(descriptor);
        builder.handlers.push(handler);
        id
    }
}
