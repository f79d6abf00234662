//! A [`Document`] that lives entirely in memory.
//!
//! It implements just enough of the DOM (elements, text, attributes, event listeners and live ranges)
//! to run the materializer and reconciler outside of a browser, and exposes the resulting tree for inspection.

use crate::{Document, Error, Listener};
use core::{cell::RefCell, cmp::Ordering, fmt};
use std::{
	collections::BTreeMap,
	rc::{Rc, Weak},
};
use tracing::{trace, trace_span};

/// A node of a [`MemoryDocument`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// An event dispatched through [`MemoryDocument::dispatch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryEvent {
	pub name: String,
	pub target: NodeId,
	/// The node whose listener is being called.
	pub current_target: NodeId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Boundary {
	node: NodeId,
	offset: usize,
}

#[derive(Debug)]
struct Boundaries {
	start: Boundary,
	end: Boundary,
}

/// A live range in a [`MemoryDocument`].
#[derive(Clone)]
pub struct MemoryRange(Rc<RefCell<Boundaries>>);

impl fmt::Debug for MemoryRange {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let boundaries = self.0.borrow();
		write!(
			f,
			"MemoryRange({:?}@{}..{:?}@{})",
			boundaries.start.node, boundaries.start.offset, boundaries.end.node, boundaries.end.offset
		)
	}
}

impl MemoryRange {
	#[must_use]
	pub fn start(&self) -> (NodeId, usize) {
		let start = self.0.borrow().start;
		(start.node, start.offset)
	}

	#[must_use]
	pub fn end(&self) -> (NodeId, usize) {
		let end = self.0.borrow().end;
		(end.node, end.offset)
	}

	#[must_use]
	pub fn collapsed(&self) -> bool {
		let boundaries = self.0.borrow();
		boundaries.start == boundaries.end
	}
}

enum NodeKind {
	Element {
		tag: String,
		attributes: BTreeMap<String, String>,
		listeners: Vec<(String, Listener<MemoryDocument>)>,
	},
	Text(String),
}

struct NodeData {
	kind: NodeKind,
	parent: Option<NodeId>,
	children: Vec<NodeId>,
}

struct Tree {
	nodes: Vec<NodeData>,
	ranges: Vec<Weak<RefCell<Boundaries>>>,
}

/// An in-memory document with a `<body>` element as root.
pub struct MemoryDocument {
	tree: RefCell<Tree>,
}

impl Default for MemoryDocument {
	fn default() -> Self {
		Self::new()
	}
}

impl fmt::Debug for MemoryDocument {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("MemoryDocument").field(&self.outer_html(self.body())).finish()
	}
}

impl MemoryDocument {
	#[must_use]
	pub fn new() -> Self {
		Self {
			tree: RefCell::new(Tree {
				nodes: vec![NodeData {
					kind: NodeKind::Element {
						tag: "body".to_owned(),
						attributes: BTreeMap::new(),
						listeners: Vec::new(),
					},
					parent: None,
					children: Vec::new(),
				}],
				ranges: Vec::new(),
			}),
		}
	}

	#[must_use]
	pub fn body(&self) -> NodeId {
		NodeId(0)
	}

	/// How many nodes were created in this document so far, including the body.
	#[must_use]
	pub fn created_count(&self) -> usize {
		self.tree.borrow().nodes.len()
	}

	/// Appends `child` to `parent`, moving it if it already has a parent.
	///
	/// # Errors
	///
	/// Iff either node doesn't exist, `parent` is a text node or `child` is an inclusive ancestor of `parent`.
	pub fn append_child(&self, parent: NodeId, child: NodeId) -> Result<(), Error> {
		let mut tree = self.tree.borrow_mut();
		let index = tree.container(parent, "appendChild")?.children.len();
		tree.insert(parent, child, index)
	}

	#[must_use]
	pub fn parent(&self, node: NodeId) -> Option<NodeId> {
		self.tree.borrow().nodes.get(node.0).and_then(|data| data.parent)
	}

	#[must_use]
	pub fn child_nodes(&self, node: NodeId) -> Vec<NodeId> {
		self.tree.borrow().nodes.get(node.0).map(|data| data.children.clone()).unwrap_or_default()
	}

	/// The tag name of an element, or [`None`] for text and unknown nodes.
	#[must_use]
	pub fn tag(&self, node: NodeId) -> Option<String> {
		match self.tree.borrow().nodes.get(node.0).map(|data| &data.kind) {
			Some(NodeKind::Element { tag, .. }) => Some(tag.clone()),
			_ => None,
		}
	}

	#[must_use]
	pub fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
		match self.tree.borrow().nodes.get(node.0).map(|data| &data.kind) {
			Some(NodeKind::Element { attributes, .. }) => attributes.get(name).cloned(),
			_ => None,
		}
	}

	/// The attribute names of an element, in lexicographic order.
	#[must_use]
	pub fn attribute_names(&self, node: NodeId) -> Vec<String> {
		match self.tree.borrow().nodes.get(node.0).map(|data| &data.kind) {
			Some(NodeKind::Element { attributes, .. }) => attributes.keys().cloned().collect(),
			_ => Vec::new(),
		}
	}

	/// The data of a text node, or [`None`] for elements and unknown nodes.
	#[must_use]
	pub fn text(&self, node: NodeId) -> Option<String> {
		match self.tree.borrow().nodes.get(node.0).map(|data| &data.kind) {
			Some(NodeKind::Text(text)) => Some(text.clone()),
			_ => None,
		}
	}

	#[must_use]
	pub fn listener_count(&self, node: NodeId, event: &str) -> usize {
		match self.tree.borrow().nodes.get(node.0).map(|data| &data.kind) {
			Some(NodeKind::Element { listeners, .. }) => listeners.iter().filter(|(name, _)| name == event).count(),
			_ => 0,
		}
	}

	/// Finds the first element with the given `id` attribute below the body, in tree order.
	#[must_use]
	pub fn get_element_by_id(&self, id: &str) -> Option<NodeId> {
		let tree = self.tree.borrow();
		let mut stack = vec![self.body()];
		while let Some(node) = stack.pop() {
			let data = &tree.nodes[node.0];
			if let NodeKind::Element { attributes, .. } = &data.kind {
				if attributes.get("id").map(String::as_str) == Some(id) {
					return Some(node);
				}
			}
			stack.extend(data.children.iter().rev());
		}
		None
	}

	/// Calls the `event` listeners of `target` and then those of its ancestors.
	///
	/// Listeners run after the document is released, so they may change it.
	/// Returns how many listeners were called.
	///
	/// # Errors
	///
	/// Iff `target` doesn't exist.
	pub fn dispatch(&self, target: NodeId, event: &str) -> Result<usize, Error> {
		let span = trace_span!("Dispatching event", event, ?target);
		let _enter = span.enter();

		let calls = {
			let tree = self.tree.borrow();
			tree.node(target, "dispatchEvent")?;
			let mut calls = Vec::new();
			let mut current = Some(target);
			while let Some(node) = current {
				let data = &tree.nodes[node.0];
				if let NodeKind::Element { listeners, .. } = &data.kind {
					calls.extend(listeners.iter().filter(|(name, _)| name == event).map(|(_, listener)| (node, listener.clone())));
				}
				current = data.parent;
			}
			calls
		};

		let count = calls.len();
		for (current_target, listener) in calls {
			listener(&MemoryEvent {
				name: event.to_owned(),
				target,
				current_target,
			});
		}
		trace!("Called {} listener(s).", count);
		Ok(count)
	}

	/// Serializes `node` and its descendants. Attributes are sorted by name.
	#[must_use]
	pub fn outer_html(&self, node: NodeId) -> String {
		let mut html = String::new();
		self.tree.borrow().write_html(node, &mut html);
		html
	}

	/// Serializes the descendants of `node`.
	#[must_use]
	pub fn inner_html(&self, node: NodeId) -> String {
		let tree = self.tree.borrow();
		let mut html = String::new();
		if let Some(data) = tree.nodes.get(node.0) {
			for &child in &data.children {
				tree.write_html(child, &mut html);
			}
		}
		html
	}

	fn push(&self, kind: NodeKind) -> NodeId {
		let mut tree = self.tree.borrow_mut();
		tree.nodes.push(NodeData {
			kind,
			parent: None,
			children: Vec::new(),
		});
		NodeId(tree.nodes.len() - 1)
	}

	fn new_range(&self, start: Boundary, end: Boundary) -> MemoryRange {
		let boundaries = Rc::new(RefCell::new(Boundaries { start, end }));
		let mut tree = self.tree.borrow_mut();
		tree.ranges.retain(|range| range.strong_count() > 0);
		tree.ranges.push(Rc::downgrade(&boundaries));
		MemoryRange(boundaries)
	}
}

impl Tree {
	fn node(&self, node: NodeId, operation: &'static str) -> Result<&NodeData, Error> {
		self.nodes.get(node.0).ok_or_else(|| Error::dom(operation, format!("Unknown node {:?}", node)))
	}

	fn container(&self, node: NodeId, operation: &'static str) -> Result<&NodeData, Error> {
		let data = self.node(node, operation)?;
		match data.kind {
			NodeKind::Element { .. } => Ok(data),
			NodeKind::Text(_) => Err(Error::dom(operation, format!("Text node {:?} can't have children", node))),
		}
	}

	fn index_of(&self, node: NodeId) -> Option<(NodeId, usize)> {
		let parent = self.nodes.get(node.0)?.parent?;
		let index = self.nodes[parent.0].children.iter().position(|&child| child == node)?;
		Some((parent, index))
	}

	fn is_inclusive_ancestor(&self, ancestor: NodeId, mut node: NodeId) -> bool {
		loop {
			if node == ancestor {
				return true;
			}
			match self.nodes.get(node.0).and_then(|data| data.parent) {
				Some(parent) => node = parent,
				None => return false,
			}
		}
	}

	/// The root of `boundary`'s tree and the path of child indices to it, followed by its offset.
	fn position(&self, boundary: Boundary) -> (NodeId, Vec<usize>) {
		let mut path = vec![boundary.offset];
		let mut node = boundary.node;
		while let Some((parent, index)) = self.index_of(node) {
			path.push(index);
			node = parent;
		}
		path.reverse();
		(node, path)
	}

	/// Compares two boundary points, or returns [`None`] if they are in different trees.
	fn compare(&self, a: Boundary, b: Boundary) -> Option<Ordering> {
		let (root_a, path_a) = self.position(a);
		let (root_b, path_b) = self.position(b);
		(root_a == root_b).then(|| path_a.cmp(&path_b))
	}

	fn live_ranges(&mut self) -> Vec<Rc<RefCell<Boundaries>>> {
		self.ranges.retain(|range| range.strong_count() > 0);
		self.ranges.iter().filter_map(Weak::upgrade).collect()
	}

	fn insert(&mut self, parent: NodeId, child: NodeId, mut index: usize) -> Result<(), Error> {
		self.container(parent, "insertBefore")?;
		self.node(child, "insertBefore")?;
		if self.is_inclusive_ancestor(child, parent) {
			return Err(Error::dom("insertBefore", format!("{:?} is an inclusive ancestor of {:?}", child, parent)));
		}

		if let Some((old_parent, old_index)) = self.index_of(child) {
			self.remove(child);
			if old_parent == parent && old_index < index {
				index -= 1;
			}
		}

		for range in self.live_ranges() {
			let mut range = range.borrow_mut();
			let range = &mut *range;
			for boundary in [&mut range.start, &mut range.end] {
				if boundary.node == parent && boundary.offset > index {
					boundary.offset += 1;
				}
			}
		}

		self.nodes[parent.0].children.insert(index, child);
		self.nodes[child.0].parent = Some(parent);
		Ok(())
	}

	fn remove(&mut self, child: NodeId) {
		let (parent, index) = match self.index_of(child) {
			Some(location) => location,
			None => return,
		};

		for range in self.live_ranges() {
			let mut range = range.borrow_mut();
			let range = &mut *range;
			for boundary in [&mut range.start, &mut range.end] {
				if self.is_inclusive_ancestor(child, boundary.node) {
					*boundary = Boundary { node: parent, offset: index };
				} else if boundary.node == parent && boundary.offset > index {
					boundary.offset -= 1;
				}
			}
		}

		self.nodes[parent.0].children.remove(index);
		self.nodes[child.0].parent = None;
	}

	fn boundary_before(&self, node: NodeId, operation: &'static str) -> Result<Boundary, Error> {
		self.index_of(node)
			.map(|(parent, index)| Boundary { node: parent, offset: index })
			.ok_or_else(|| Error::dom(operation, format!("{:?} has no parent", node)))
	}

	fn write_html(&self, node: NodeId, html: &mut String) {
		let data = match self.nodes.get(node.0) {
			Some(data) => data,
			None => return,
		};
		match &data.kind {
			NodeKind::Text(text) => html.push_str(&escape(text, false)),
			NodeKind::Element { tag, attributes, .. } => {
				html.push('<');
				html.push_str(tag);
				for (name, value) in attributes {
					html.push_str(&format!(" {}=\"{}\"", name, escape(value, true)));
				}
				html.push('>');
				for &child in &data.children {
					self.write_html(child, html);
				}
				html.push_str("</");
				html.push_str(tag);
				html.push('>');
			}
		}
	}
}

fn escape(text: &str, attribute: bool) -> String {
	let mut escaped = String::with_capacity(text.len());
	for c in text.chars() {
		match c {
			'&' => escaped.push_str("&amp;"),
			'<' => escaped.push_str("&lt;"),
			'>' => escaped.push_str("&gt;"),
			'"' if attribute => escaped.push_str("&quot;"),
			c => escaped.push(c),
		}
	}
	escaped
}

fn is_valid_name(name: &str) -> bool {
	let mut chars = name.chars();
	chars.next().map_or(false, char::is_alphabetic) && chars.all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | ':'))
}

impl Document for MemoryDocument {
	type LiveNode = NodeId;
	type Range = MemoryRange;
	type Event = MemoryEvent;

	fn create_element(&self, tag: &str) -> Result<NodeId, Error> {
		if !is_valid_name(tag) {
			return Err(Error::dom("createElement", format!("Invalid tag name {:?}", tag)));
		}
		Ok(self.push(NodeKind::Element {
			tag: tag.to_owned(),
			attributes: BTreeMap::new(),
			listeners: Vec::new(),
		}))
	}

	fn create_text_node(&self, data: &str) -> NodeId {
		self.push(NodeKind::Text(data.to_owned()))
	}

	fn set_attribute(&self, element: &NodeId, name: &str, value: &str) -> Result<(), Error> {
		if !is_valid_name(name) {
			return Err(Error::dom("setAttribute", format!("Invalid attribute name {:?}", name)));
		}
		let mut tree = self.tree.borrow_mut();
		let data = tree.nodes.get_mut(element.0).ok_or_else(|| Error::dom("setAttribute", format!("Unknown node {:?}", element)))?;
		match &mut data.kind {
			NodeKind::Element { attributes, .. } => {
				attributes.insert(name.to_owned(), value.to_owned());
				Ok(())
			}
			NodeKind::Text(_) => Err(Error::dom("setAttribute", format!("{:?} is a text node", element))),
		}
	}

	fn add_event_listener(&self, element: &NodeId, event: &str, listener: Listener<Self>) -> Result<(), Error> {
		let mut tree = self.tree.borrow_mut();
		let data = tree
			.nodes
			.get_mut(element.0)
			.ok_or_else(|| Error::dom("addEventListener", format!("Unknown node {:?}", element)))?;
		match &mut data.kind {
			NodeKind::Element { listeners, .. } => {
				listeners.push((event.to_owned(), listener));
				Ok(())
			}
			NodeKind::Text(_) => Err(Error::dom("addEventListener", format!("{:?} is a text node", element))),
		}
	}

	fn range_over_contents(&self, parent: &NodeId) -> Result<MemoryRange, Error> {
		let len = self
			.tree
			.borrow()
			.container(*parent, "selectNodeContents")
			.map_err(|error| Error::MissingContainer(error.to_string()))?
			.children
			.len();
		Ok(self.new_range(Boundary { node: *parent, offset: 0 }, Boundary { node: *parent, offset: len }))
	}

	fn range_at_end(&self, parent: &NodeId) -> Result<MemoryRange, Error> {
		let len = self
			.tree
			.borrow()
			.container(*parent, "selectNodeContents")
			.map_err(|error| Error::MissingContainer(error.to_string()))?
			.children
			.len();
		let end = Boundary { node: *parent, offset: len };
		Ok(self.new_range(end, end))
	}

	fn range_at_end_of(&self, range: &MemoryRange) -> Result<MemoryRange, Error> {
		let end = range.0.borrow().end;
		Ok(self.new_range(end, end))
	}

	fn delete_contents(&self, range: &MemoryRange) -> Result<(), Error> {
		let (start, end) = {
			let boundaries = range.0.borrow();
			(boundaries.start, boundaries.end)
		};
		if start == end {
			return Ok(());
		}
		if start.node != end.node {
			return Err(Error::dom("deleteContents", "Partially contained nodes aren't supported"));
		}

		let mut tree = self.tree.borrow_mut();
		let removed = tree.container(start.node, "deleteContents")?.children[start.offset..end.offset].to_vec();
		for node in removed {
			tree.remove(node);
		}
		drop(tree);

		let mut boundaries = range.0.borrow_mut();
		boundaries.start = start;
		boundaries.end = start;
		Ok(())
	}

	fn insert_node(&self, range: &MemoryRange, node: &NodeId) -> Result<(), Error> {
		let start = range.0.borrow().start;
		let mut tree = self.tree.borrow_mut();
		tree.insert(start.node, *node, start.offset)?;
		drop(tree);

		let mut boundaries = range.0.borrow_mut();
		if boundaries.start == boundaries.end {
			boundaries.end = Boundary {
				node: start.node,
				offset: start.offset + 1,
			};
		}
		Ok(())
	}

	fn set_start_before(&self, range: &MemoryRange, node: &NodeId) -> Result<(), Error> {
		let tree = self.tree.borrow();
		let start = tree.boundary_before(*node, "setStartBefore")?;
		set_start(&tree, range, start);
		Ok(())
	}

	fn set_start_after(&self, range: &MemoryRange, node: &NodeId) -> Result<(), Error> {
		let tree = self.tree.borrow();
		let mut start = tree.boundary_before(*node, "setStartAfter")?;
		start.offset += 1;
		set_start(&tree, range, start);
		Ok(())
	}

	fn set_end_after(&self, range: &MemoryRange, node: &NodeId) -> Result<(), Error> {
		let tree = self.tree.borrow();
		let mut end = tree.boundary_before(*node, "setEndAfter")?;
		end.offset += 1;
		let mut boundaries = range.0.borrow_mut();
		match tree.compare(end, boundaries.start) {
			Some(Ordering::Greater) | Some(Ordering::Equal) => boundaries.end = end,
			_ => {
				boundaries.start = end;
				boundaries.end = end;
			}
		}
		Ok(())
	}

	fn surrounds(&self, range: &MemoryRange, node: &NodeId) -> bool {
		let (parent, index) = match self.tree.borrow().index_of(*node) {
			Some(location) => location,
			None => return false,
		};
		let boundaries = range.0.borrow();
		boundaries.start == Boundary { node: parent, offset: index } && boundaries.end == Boundary { node: parent, offset: index + 1 }
	}
}

/// Sets the start of `range`, collapsing it there if that would put the start after the end (or in another tree).
fn set_start(tree: &Tree, range: &MemoryRange, start: Boundary) {
	let mut boundaries = range.0.borrow_mut();
	match tree.compare(start, boundaries.end) {
		Some(Ordering::Less) | Some(Ordering::Equal) => boundaries.start = start,
		_ => {
			boundaries.start = start;
			boundaries.end = start;
		}
	}
}

#[cfg(test)]
mod tests {
	use super::{MemoryDocument, NodeId};
	use crate::Document;

	fn setup() -> (MemoryDocument, NodeId, NodeId, NodeId) {
		let document = MemoryDocument::new();
		let a = document.create_text_node("a");
		let b = document.create_element("b").unwrap();
		let c = document.create_text_node("c");
		for node in [a, b, c] {
			document.append_child(document.body(), node).unwrap();
		}
		(document, a, b, c)
	}

	#[test]
	fn serialization() {
		let (document, _, b, _) = setup();
		document.set_attribute(&b, "title", "\"x\" & y").unwrap();
		let t = document.create_text_node("<i>");
		document.append_child(b, t).unwrap();
		assert_eq!(document.inner_html(document.body()), "a<b title=\"&quot;x&quot; &amp; y\">&lt;i&gt;</b>c");
	}

	#[test]
	fn invalid_names() {
		let document = MemoryDocument::new();
		assert!(document.create_element("").is_err());
		assert!(document.create_element("a b").is_err());
		assert!(document.create_element("1a").is_err());
		let div = document.create_element("div").unwrap();
		assert!(document.set_attribute(&div, "a=b", "").is_err());
	}

	#[test]
	fn ranges_follow_insertions() {
		let (document, a, _, c) = setup();
		let body = document.body();
		let range = document.range_over_contents(&body).unwrap();
		assert_eq!(range.start(), (body, 0));
		assert_eq!(range.end(), (body, 3));

		let before_c = document.range_at_end(&body).unwrap();
		document.set_start_before(&before_c, &c).unwrap();
		assert_eq!(before_c.start(), (body, 2));

		let x = document.create_text_node("x");
		let at_a = document.range_over_contents(&body).unwrap();
		document.set_start_before(&at_a, &a).unwrap();
		document.set_end_after(&at_a, &a).unwrap();
		document.insert_node(&at_a, &x).unwrap();

		assert_eq!(document.inner_html(body), "xa<b></b>c");
		// Boundaries at the insertion point stay put, later ones move.
		assert_eq!(range.start(), (body, 0));
		assert_eq!(range.end(), (body, 4));
		assert_eq!(before_c.start(), (body, 3));
		assert_eq!(at_a.start(), (body, 0));
		assert_eq!(at_a.end(), (body, 2));
	}

	#[test]
	fn ranges_follow_removals() {
		let (document, a, b, _) = setup();
		let body = document.body();
		let inside_b = document.range_at_end(&b).unwrap();
		let around_b = document.range_at_end(&body).unwrap();
		document.set_start_before(&around_b, &b).unwrap();
		document.set_end_after(&around_b, &b).unwrap();
		assert!(document.surrounds(&around_b, &b));

		let around_a = document.range_at_end(&body).unwrap();
		document.set_start_before(&around_a, &a).unwrap();
		document.set_end_after(&around_a, &a).unwrap();
		document.delete_contents(&around_a).unwrap();

		assert_eq!(document.inner_html(body), "<b></b>c");
		assert!(around_a.collapsed());
		assert!(document.surrounds(&around_b, &b));

		document.delete_contents(&around_b).unwrap();
		// A boundary inside a removed node moves to where that node was.
		assert_eq!(inside_b.start(), (body, 0));
		assert!(!document.surrounds(&around_b, &b));
	}

	#[test]
	fn collapsed_insertion_spans_the_new_node() {
		let document = MemoryDocument::new();
		let body = document.body();
		let range = document.range_at_end(&body).unwrap();
		let p = document.create_element("p").unwrap();
		document.insert_node(&range, &p).unwrap();
		assert!(document.surrounds(&range, &p));
	}

	#[test]
	fn dispatch_bubbles() {
		use std::{cell::RefCell, rc::Rc};

		let (document, _, b, _) = setup();
		let calls = Rc::new(RefCell::new(Vec::new()));
		for node in [b, document.body()] {
			let calls = calls.clone();
			document
				.add_event_listener(&node, "click", Rc::new(move |event: &super::MemoryEvent| calls.borrow_mut().push(event.current_target)))
				.unwrap();
		}

		assert_eq!(document.dispatch(b, "click").unwrap(), 2);
		assert_eq!(*calls.borrow(), [b, document.body()]);
		assert_eq!(document.dispatch(b, "keydown").unwrap(), 0);
		assert_eq!(document.listener_count(b, "click"), 1);
	}
}
