//! Node arena built by a parse.
//!
//! A [`Tree`] owns every node of one document. Nodes are addressed by [`NodeId`];
//! children are owned through their parent's child list and the parent link is a plain
//! index, so the whole tree is dropped in one go. Hooks and callers read nodes through
//! the borrowed [`NodeRef`] view.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::ser::{Serialize, SerializeStruct, Serializer};

use crate::error::{Result, TagError};
use crate::schema::{DescriptorTable, TagDescriptor, TagId};

/// Index into a tree's node arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

impl NodeId {
    fn new(index: usize) -> Self {
        NodeId(index as u32)
    }

    fn index(self) -> usize {
        self.0 as usize
    }
}

/// Lifecycle state of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    /// Accepting attributes, text and children
    Open,
    /// Validated and finalized; immutable from here on
    Finalized,
}

#[derive(Debug, Clone, PartialEq)]
struct NodeData {
    tag: TagId,
    parent: Option<NodeId>,
    /// One entry per declared attribute; `Some` once the attribute was set
    values: Vec<Option<String>>,
    text: String,
    children: Vec<NodeId>,
    /// One flag per declared child slot: a child of that type was instantiated.
    /// Drives both the mandatory-children check and duplicate detection for
    /// unique children.
    seen_children: Vec<bool>,
    state: NodeState,
}

impl NodeData {
    fn new(tag: TagId, descriptor: &TagDescriptor, parent: Option<NodeId>) -> Self {
        Self {
            tag,
            parent,
            values: vec![None; descriptor.attributes().len()],
            text: String::new(),
            children: Vec::new(),
            seen_children: vec![false; descriptor.children().len()],
            state: NodeState::Open,
        }
    }
}

/// The node tree of one parsed document
#[derive(Debug, Clone, PartialEq)]
pub struct Tree {
    table: Arc<DescriptorTable>,
    nodes: Vec<NodeData>,
}

impl Tree {
    /// Create a tree holding a single open root node of type `root`.
    pub fn new(table: Arc<DescriptorTable>, root: TagId) -> Result<Self> {
        let descriptor = table.get(root).ok_or(TagError::UnknownTag { tag: root })?;
        let root_node = NodeData::new(root, descriptor, None);
        Ok(Self {
            table,
            nodes: vec![root_node],
        })
    }

    pub fn root_id(&self) -> NodeId {
        NodeId::new(0)
    }

    pub fn root(&self) -> NodeRef<'_> {
        self.node(self.root_id())
    }

    /// Borrow a node.
    ///
    /// # Panics
    ///
    /// Panics if `id` does not belong to this tree.
    pub fn node(&self, id: NodeId) -> NodeRef<'_> {
        assert!(id.index() < self.nodes.len(), "node {id:?} is not in this tree");
        NodeRef { tree: self, id }
    }

    pub fn get(&self, id: NodeId) -> Option<NodeRef<'_>> {
        (id.index() < self.nodes.len()).then_some(NodeRef { tree: self, id })
    }

    /// Number of nodes, root included
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn table(&self) -> &Arc<DescriptorTable> {
        &self.table
    }

    fn open_node(&mut self, id: NodeId) -> Result<&mut NodeData> {
        let node = &mut self.nodes[id.index()];
        if node.state == NodeState::Finalized {
            return Err(TagError::NodeFrozen {
                element: self.table[node.tag].element_name().to_string(),
            });
        }
        Ok(node)
    }

    /// Store an attribute value and mark it seen.
    ///
    /// Fails with `UnknownAttribute` when the tag does not declare `name`, and with
    /// `AttributeAlreadySet` when `overwrite` is false and the attribute already has
    /// a value.
    pub fn set_attribute(
        &mut self,
        id: NodeId,
        name: &str,
        value: impl Into<String>,
        overwrite: bool,
    ) -> Result<()> {
        let table = Arc::clone(&self.table);
        let node = self.open_node(id)?;
        let descriptor = &table[node.tag];

        let slot = descriptor
            .attribute_slot(name)
            .ok_or_else(|| TagError::UnknownAttribute {
                element: descriptor.element_name().to_string(),
                attribute: name.to_string(),
            })?;

        if !overwrite && node.values[slot].is_some() {
            return Err(TagError::AttributeAlreadySet {
                element: descriptor.element_name().to_string(),
                attribute: name.to_string(),
            });
        }

        node.values[slot] = Some(value.into());
        Ok(())
    }

    /// Append character data to a node's text
    pub fn add_text(&mut self, id: NodeId, fragment: &str) -> Result<()> {
        self.open_node(id)?.text.push_str(fragment);
        Ok(())
    }

    /// Instantiate the child of `id` whose element name is `tag_name`.
    ///
    /// Fails with `UnexpectedElement` when the parent's tag declares no such child,
    /// and with `DuplicateUniqueChild` when the child tag is unique and already
    /// present among the parent's children.
    pub fn resolve_child(&mut self, id: NodeId, tag_name: &str) -> Result<NodeId> {
        let new_id = NodeId::new(self.nodes.len());
        let table = Arc::clone(&self.table);
        let parent = self.open_node(id)?;
        let descriptor = &table[parent.tag];

        let slot = descriptor
            .child_slot(tag_name)
            .ok_or_else(|| TagError::UnexpectedElement {
                element: descriptor.element_name().to_string(),
                child: tag_name.to_string(),
            })?;
        let child_tag = descriptor.children()[slot].tag;
        let child_descriptor = &table[child_tag];

        if child_descriptor.is_unique() && parent.seen_children[slot] {
            return Err(TagError::DuplicateUniqueChild {
                element: descriptor.element_name().to_string(),
                child: tag_name.to_string(),
            });
        }

        parent.seen_children[slot] = true;
        parent.children.push(new_id);
        self.nodes
            .push(NodeData::new(child_tag, child_descriptor, Some(id)));
        Ok(new_id)
    }

    /// Check that every mandatory attribute and mandatory child has been seen.
    ///
    /// All violations are reported together.
    pub fn validate(&self, id: NodeId) -> Result<()> {
        let node = &self.nodes[id.index()];
        let descriptor = &self.table[node.tag];

        let attributes: Vec<String> = descriptor
            .mandatory_attributes()
            .filter(|decl| {
                descriptor
                    .attribute_slot(&decl.name)
                    .is_some_and(|slot| node.values[slot].is_none())
            })
            .map(|decl| decl.name.clone())
            .collect();

        let children: Vec<String> = descriptor
            .mandatory_child_slots()
            .iter()
            .filter(|&&slot| !node.seen_children[slot])
            .map(|&slot| {
                let child = descriptor.children()[slot].tag;
                self.table[child].element_name().to_string()
            })
            .collect();

        let element = descriptor.element_name().to_string();
        if !attributes.is_empty() {
            Err(TagError::MissingMandatoryAttributes {
                element,
                attributes,
                children,
            })
        } else if !children.is_empty() {
            Err(TagError::MissingMandatoryChildren { element, children })
        } else {
            Ok(())
        }
    }

    /// Mark a node finalized; later mutations fail with `NodeFrozen`
    pub(crate) fn freeze(&mut self, id: NodeId) {
        self.nodes[id.index()].state = NodeState::Finalized;
    }
}

/// Read-only view of one node
#[derive(Debug, Clone, Copy)]
pub struct NodeRef<'t> {
    tree: &'t Tree,
    id: NodeId,
}

impl<'t> NodeRef<'t> {
    fn data(&self) -> &'t NodeData {
        &self.tree.nodes[self.id.index()]
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn tag(&self) -> TagId {
        self.data().tag
    }

    pub fn descriptor(&self) -> &'t TagDescriptor {
        &self.tree.table[self.data().tag]
    }

    pub fn element_name(&self) -> &'t str {
        self.descriptor().element_name()
    }

    pub fn state(&self) -> NodeState {
        self.data().state
    }

    /// Value of a declared attribute: the stored value, else the declared default,
    /// else `None`.
    pub fn attribute(&self, name: &str) -> Result<Option<&'t str>> {
        let descriptor = self.descriptor();
        let slot = descriptor
            .attribute_slot(name)
            .ok_or_else(|| TagError::UnknownAttribute {
                element: descriptor.element_name().to_string(),
                attribute: name.to_string(),
            })?;

        Ok(self.data().values[slot]
            .as_deref()
            .or_else(|| descriptor.default_value(slot)))
    }

    /// Like [`NodeRef::attribute`], but an absent value is an error
    pub fn require(&self, name: &str) -> Result<&'t str> {
        self.attribute(name)?
            .ok_or_else(|| TagError::MissingMandatoryAttributes {
                element: self.element_name().to_string(),
                attributes: vec![name.to_string()],
                children: Vec::new(),
            })
    }

    /// Whether the attribute was set by the document (defaults do not count)
    pub fn is_set(&self, name: &str) -> bool {
        self.descriptor()
            .attribute_slot(name)
            .is_some_and(|slot| self.data().values[slot].is_some())
    }

    pub fn text(&self) -> &'t str {
        &self.data().text
    }

    pub fn parent(&self) -> Option<NodeRef<'t>> {
        let tree = self.tree;
        self.data().parent.map(|id| NodeRef { tree, id })
    }

    pub fn children(&self) -> impl Iterator<Item = NodeRef<'t>> + use<'t> {
        let tree = self.tree;
        self.data()
            .children
            .iter()
            .map(move |&id| NodeRef { tree, id })
    }

    pub fn children_named<'n>(
        &self,
        element_name: &'n str,
    ) -> impl Iterator<Item = NodeRef<'t>> + use<'t, 'n> {
        self.children()
            .filter(move |child| child.element_name() == element_name)
    }

    pub fn child_count(&self) -> usize {
        self.data().children.len()
    }

    /// Effective attribute values, defaults applied, ordered by name
    pub fn attribute_values(&self) -> BTreeMap<&'t str, &'t str> {
        let descriptor = self.descriptor();
        descriptor
            .attributes()
            .iter()
            .enumerate()
            .filter_map(|(slot, decl)| {
                self.data().values[slot]
                    .as_deref()
                    .or_else(|| descriptor.default_value(slot))
                    .map(|value| (decl.name.as_str(), value))
            })
            .collect()
    }
}

impl Serialize for NodeRef<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let children: Vec<NodeRef<'_>> = self.children().collect();
        let mut state = serializer.serialize_struct("Node", 4)?;
        state.serialize_field("element", self.element_name())?;
        state.serialize_field("attributes", &self.attribute_values())?;
        state.serialize_field("text", self.text())?;
        state.serialize_field("children", &children)?;
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaBuilder;

    struct Fixture {
        tree: Tree,
        package: TagId,
    }

    fn fixture() -> Fixture {
        let mut builder = SchemaBuilder::<()>::new();
        let author = builder
            .tag("author")
            .unique()
            .mandatory_attribute("name")
            .declare();
        let module = builder
            .tag("module")
            .mandatory_attribute("name")
            .default_attribute("language", "none")
            .optional_attribute("comment")
            .declare();
        let package = builder
            .tag("package")
            .mandatory_attribute("name")
            .child(author, true)
            .child(module, true)
            .declare();
        let root = builder.tag("#document").child(package, true).declare();
        let schema = builder.build();

        Fixture {
            tree: Tree::new(Arc::clone(schema.table()), root).unwrap(),
            package,
        }
    }

    #[test]
    fn test_set_and_read_attributes() {
        let Fixture { mut tree, .. } = fixture();
        let root = tree.root_id();
        let package = tree.resolve_child(root, "package").unwrap();
        let module = tree.resolve_child(package, "module").unwrap();

        tree.set_attribute(module, "name", "m", true).unwrap();

        let node = tree.node(module);
        assert_eq!(node.attribute("name").unwrap(), Some("m"));
        assert_eq!(node.attribute("language").unwrap(), Some("none"));
        assert_eq!(node.attribute("comment").unwrap(), None);
        assert!(node.is_set("name"));
        assert!(!node.is_set("language"));
    }

    #[test]
    fn test_unknown_attribute_is_rejected_on_set_and_get() {
        let Fixture { mut tree, .. } = fixture();
        let package = tree.resolve_child(tree.root_id(), "package").unwrap();

        let err = tree.set_attribute(package, "colour", "red", true).unwrap_err();
        assert!(matches!(
            err,
            TagError::UnknownAttribute { ref element, ref attribute }
                if element == "package" && attribute == "colour"
        ));

        let err = tree.node(package).attribute("colour").unwrap_err();
        assert!(matches!(err, TagError::UnknownAttribute { .. }));
    }

    #[test]
    fn test_overwrite_flag() {
        let Fixture { mut tree, .. } = fixture();
        let package = tree.resolve_child(tree.root_id(), "package").unwrap();

        tree.set_attribute(package, "name", "first", false).unwrap();
        tree.set_attribute(package, "name", "second", true).unwrap();
        assert_eq!(tree.node(package).attribute("name").unwrap(), Some("second"));

        let err = tree.set_attribute(package, "name", "third", false).unwrap_err();
        assert!(matches!(err, TagError::AttributeAlreadySet { .. }));
        assert_eq!(tree.node(package).attribute("name").unwrap(), Some("second"));
    }

    #[test]
    fn test_resolve_child_links_both_directions() {
        let Fixture { mut tree, package } = fixture();
        let root = tree.root_id();
        let package_id = tree.resolve_child(root, "package").unwrap();
        let first = tree.resolve_child(package_id, "module").unwrap();
        let second = tree.resolve_child(package_id, "module").unwrap();

        let node = tree.node(package_id);
        assert_eq!(node.tag(), package);
        let children: Vec<NodeId> = node.children().map(|c| c.id()).collect();
        assert_eq!(children, vec![first, second]);
        assert_eq!(tree.node(second).parent().unwrap().id(), package_id);
        assert!(tree.root().parent().is_none());
        assert_eq!(tree.len(), 4);
    }

    #[test]
    fn test_unexpected_element() {
        let Fixture { mut tree, .. } = fixture();
        // Declared under package, not under the root
        let err = tree.resolve_child(tree.root_id(), "module").unwrap_err();
        assert!(matches!(
            err,
            TagError::UnexpectedElement { ref element, ref child }
                if element == "#document" && child == "module"
        ));
    }

    #[test]
    fn test_duplicate_unique_child() {
        let Fixture { mut tree, .. } = fixture();
        let package = tree.resolve_child(tree.root_id(), "package").unwrap();

        tree.resolve_child(package, "author").unwrap();
        let err = tree.resolve_child(package, "author").unwrap_err();
        assert!(matches!(
            err,
            TagError::DuplicateUniqueChild { ref element, ref child }
                if element == "package" && child == "author"
        ));
        assert_eq!(tree.node(package).child_count(), 1);
    }

    #[test]
    fn test_validate_reports_every_missing_item() {
        let Fixture { mut tree, .. } = fixture();
        let package = tree.resolve_child(tree.root_id(), "package").unwrap();

        match tree.validate(package).unwrap_err() {
            TagError::MissingMandatoryAttributes {
                element,
                attributes,
                children,
            } => {
                assert_eq!(element, "package");
                assert_eq!(attributes, vec!["name"]);
                assert_eq!(children, vec!["author", "module"]);
            }
            other => panic!("Expected MissingMandatoryAttributes, got {other:?}"),
        }

        tree.set_attribute(package, "name", "p", true).unwrap();
        tree.resolve_child(package, "author").unwrap();
        match tree.validate(package).unwrap_err() {
            TagError::MissingMandatoryChildren { children, .. } => {
                assert_eq!(children, vec!["module"]);
            }
            other => panic!("Expected MissingMandatoryChildren, got {other:?}"),
        }

        tree.resolve_child(package, "module").unwrap();
        assert!(tree.validate(package).is_ok());
    }

    #[test]
    fn test_text_accumulates_in_order() {
        let Fixture { mut tree, .. } = fixture();
        let package = tree.resolve_child(tree.root_id(), "package").unwrap();

        for fragment in ["Hello", ", ", "", "world", "\n"] {
            tree.add_text(package, fragment).unwrap();
        }
        assert_eq!(tree.node(package).text(), "Hello, world\n");
    }

    #[test]
    fn test_finalized_node_is_frozen() {
        let Fixture { mut tree, .. } = fixture();
        let package = tree.resolve_child(tree.root_id(), "package").unwrap();
        tree.freeze(package);

        assert_eq!(tree.node(package).state(), NodeState::Finalized);
        assert!(matches!(
            tree.add_text(package, "late").unwrap_err(),
            TagError::NodeFrozen { .. }
        ));
        assert!(matches!(
            tree.set_attribute(package, "name", "p", true).unwrap_err(),
            TagError::NodeFrozen { .. }
        ));
        assert!(matches!(
            tree.resolve_child(package, "module").unwrap_err(),
            TagError::NodeFrozen { .. }
        ));
    }

    #[test]
    fn test_unknown_root_tag() {
        let table = Arc::new(DescriptorTable::default());
        let mut builder = SchemaBuilder::<()>::new();
        let foreign = builder.tag("x").declare();

        assert!(matches!(
            Tree::new(table, foreign).unwrap_err(),
            TagError::UnknownTag { .. }
        ));
    }

    #[test]
    fn test_require_reports_absent_value() {
        let Fixture { mut tree, .. } = fixture();
        let package = tree.resolve_child(tree.root_id(), "package").unwrap();
        let module = tree.resolve_child(package, "module").unwrap();

        let node = tree.node(module);
        assert_eq!(node.require("language").unwrap(), "none");
        assert!(matches!(
            node.require("name").unwrap_err(),
            TagError::MissingMandatoryAttributes { ref attributes, .. } if attributes == &["name"]
        ));
    }

    #[test]
    fn test_node_serializes_with_defaults() {
        let Fixture { mut tree, .. } = fixture();
        let package = tree.resolve_child(tree.root_id(), "package").unwrap();
        let module = tree.resolve_child(package, "module").unwrap();
        tree.set_attribute(module, "name", "m", true).unwrap();
        tree.add_text(module, "body").unwrap();

        let json = serde_json::to_value(tree.node(module)).unwrap();
        assert_eq!(json["element"], "module");
        assert_eq!(json["attributes"]["name"], "m");
        assert_eq!(json["attributes"]["language"], "none");
        assert!(json["attributes"].get("comment").is_none());
        assert_eq!(json["text"], "body");
        assert_eq!(json["children"].as_array().unwrap().len(), 0);
    }
}
