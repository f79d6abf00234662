//! Resolved trees (v-trees) that consist only of elements and text.

use crate::{Attributes, Composite, Cursor, Document, Element, Error, Handle, Node};
use core::{cell::RefCell, fmt};
use std::rc::Rc;
use tracing::{trace, trace_span};

/// How many composites may render each other in a chain before resolution gives up.
///
/// Plain element nesting doesn't count towards this.
pub const RENDER_DEPTH_LIMIT: usize = 256;

/// A node of a resolved tree.
///
/// Each one retains the [`Cursor`] of the live content it was last materialized or reconciled to, if any.
/// Clones share that span.
///
/// The root node of a composite's output also remembers that composite (weakly), so that an outdated copy of the node
/// can be exchanged for the composite's current v-tree during reconciliation.
pub enum VNode<D: Document> {
	Element(Rc<VElement<D>>),
	Text(Rc<VText<D>>),
}

pub struct VElement<D: Document> {
	pub(crate) tag: String,
	pub(crate) attributes: Attributes<D>,
	pub(crate) children: Vec<VNode<D>>,
	pub(crate) span: RefCell<Option<Cursor<D>>>,
	pub(crate) owner: RefCell<Option<Handle<D>>>,
}

pub struct VText<D: Document> {
	pub(crate) content: String,
	pub(crate) span: RefCell<Option<Cursor<D>>>,
	pub(crate) owner: RefCell<Option<Handle<D>>>,
}

impl<D: Document> VNode<D> {
	#[must_use]
	pub fn text(content: impl Into<String>) -> Self {
		Self::Text(Rc::new(VText {
			content: content.into(),
			span: RefCell::new(None),
			owner: RefCell::new(None),
		}))
	}

	#[must_use]
	pub fn element(tag: impl Into<String>, attributes: Attributes<D>, children: Vec<VNode<D>>) -> Self {
		Self::Element(Rc::new(VElement {
			tag: tag.into(),
			attributes,
			children,
			span: RefCell::new(None),
			owner: RefCell::new(None),
		}))
	}

	/// The element's tag name, or `"#text"`.
	#[must_use]
	pub fn kind(&self) -> &str {
		match self {
			VNode::Element(element) => &element.tag,
			VNode::Text(_) => "#text",
		}
	}

	#[must_use]
	pub fn children(&self) -> &[VNode<D>] {
		match self {
			VNode::Element(element) => &element.children,
			VNode::Text(_) => &[],
		}
	}

	#[must_use]
	pub fn span(&self) -> Option<Cursor<D>> {
		self.span_cell().borrow().clone()
	}

	pub(crate) fn set_span(&self, cursor: Cursor<D>) {
		*self.span_cell().borrow_mut() = Some(cursor);
	}

	fn span_cell(&self) -> &RefCell<Option<Cursor<D>>> {
		match self {
			VNode::Element(element) => &element.span,
			VNode::Text(text) => &text.span,
		}
	}

	fn owner_cell(&self) -> &RefCell<Option<Handle<D>>> {
		match self {
			VNode::Element(element) => &element.owner,
			VNode::Text(text) => &text.owner,
		}
	}

	/// Marks this node as the output of the composite behind `owner`, unless an inner composite already did so.
	pub(crate) fn claim(&self, owner: Handle<D>) {
		let mut cell = self.owner_cell().borrow_mut();
		if cell.is_none() {
			*cell = Some(owner);
		}
	}

	/// The most recent v-tree for this node's live content.
	///
	/// That is its owning composite's retained v-tree, which may have been updated on its own since this node was resolved.
	pub(crate) fn current(&self) -> VNode<D> {
		let owner = self.owner_cell().borrow().clone();
		owner.and_then(|owner| owner.retained_vdom()).unwrap_or_else(|| self.clone())
	}

	/// Whether this node's live content was left behind by a failed update of its owning composite.
	pub(crate) fn is_diverged(&self) -> bool {
		self.owner_cell().borrow().as_ref().map_or(false, Handle::is_diverged)
	}

	/// Whether `self` and `other` are the same node instance (not just equal).
	#[must_use]
	pub fn ptr_eq(&self, other: &Self) -> bool {
		match (self, other) {
			(VNode::Element(a), VNode::Element(b)) => Rc::ptr_eq(a, b),
			(VNode::Text(a), VNode::Text(b)) => Rc::ptr_eq(a, b),
			_ => false,
		}
	}
}

impl<D: Document> VElement<D> {
	#[must_use]
	pub fn tag(&self) -> &str {
		&self.tag
	}

	#[must_use]
	pub fn attributes(&self) -> &Attributes<D> {
		&self.attributes
	}

	#[must_use]
	pub fn children(&self) -> &[VNode<D>] {
		&self.children
	}
}

impl<D: Document> VText<D> {
	#[must_use]
	pub fn content(&self) -> &str {
		&self.content
	}
}

impl<D: Document> Clone for VNode<D> {
	fn clone(&self) -> Self {
		match self {
			VNode::Element(element) => VNode::Element(element.clone()),
			VNode::Text(text) => VNode::Text(text.clone()),
		}
	}
}

/// Structural equality. Spans are ignored.
impl<D: Document> PartialEq for VNode<D> {
	fn eq(&self, other: &Self) -> bool {
		match (self, other) {
			(VNode::Element(a), VNode::Element(b)) => a.tag == b.tag && a.attributes == b.attributes && a.children == b.children,
			(VNode::Text(a), VNode::Text(b)) => a.content == b.content,
			_ => false,
		}
	}
}

impl<D: Document> fmt::Debug for VNode<D> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			VNode::Element(element) => f
				.debug_struct("VElement")
				.field("tag", &element.tag)
				.field("attributes", &element.attributes)
				.field("children", &element.children)
				.finish(),
			VNode::Text(text) => f.debug_tuple("VText").field(&text.content).finish(),
		}
	}
}

/// Resolves `node` into a fresh v-tree by rendering all composites in it.
///
/// Nothing is cached: Composites keep the v-tree they were last materialized or reconciled with.
///
/// # Errors
///
/// - [`Error::InvalidRenderResult`] iff a composite rendered something other than exactly one node.
/// - [`Error::DepthLimit`] iff composites render each other more deeply than [`RENDER_DEPTH_LIMIT`].
/// - [`Error::ReentrantUpdate`] iff a composite is currently being updated.
pub fn resolve<D: Document>(node: &Node<D>) -> Result<VNode<D>, Error> {
	Resolver::new().resolve(node, 0)
}

/// Resolves trees while remembering which composite rendered which sub-tree,
/// so that each of them can retain its current v-tree once the result is live.
///
/// Composites are owned by the composite whose output they appear in, or by the caller of [`commit`](`Resolver::commit`) at the top level.
pub(crate) struct Resolver<D: Document> {
	rendered: Vec<Resolved<D>>,
	/// Composites encountered directly in each composite that is currently being resolved, innermost last.
	/// The first entry collects the top-level ones.
	frames: Vec<Vec<Composite<D>>>,
}

struct Resolved<D: Document> {
	composite: Composite<D>,
	vdom: VNode<D>,
	nested: Vec<Composite<D>>,
}

impl<D: Document> Resolver<D> {
	pub fn new() -> Self {
		Self {
			rendered: Vec::new(),
			frames: vec![Vec::new()],
		}
	}

	pub fn resolve(&mut self, node: &Node<D>, depth: usize) -> Result<VNode<D>, Error> {
		match node {
			Node::Text(text) => Ok(VNode::text(text.content())),
			Node::Element(element) => self.resolve_element(element, depth),
			Node::Composite(composite) => self.resolve_composite(composite, depth),
		}
	}

	/// `depth` is the number of enclosing composites.
	pub fn resolve_element(&mut self, element: &Element<D>, depth: usize) -> Result<VNode<D>, Error> {
		let children = element
			.children()
			.iter()
			.map(|child| self.resolve(child, depth))
			.collect::<Result<Vec<_>, _>>()?;
		Ok(VNode::element(element.tag(), element.attributes().clone(), children))
	}

	pub fn resolve_composite(&mut self, composite: &Composite<D>, depth: usize) -> Result<VNode<D>, Error> {
		if depth >= RENDER_DEPTH_LIMIT {
			return Err(Error::DepthLimit(RENDER_DEPTH_LIMIT));
		}

		let span = trace_span!("Resolving composite", component = composite.type_name(), depth);
		let _enter = span.enter();

		if let Some(frame) = self.frames.last_mut() {
			frame.push(composite.clone());
		}
		self.frames.push(Vec::new());
		let vdom = composite.render_node().and_then(|rendered| self.resolve(&rendered, depth + 1));
		let nested = self.frames.pop().unwrap_or_default();
		let vdom = vdom?;

		trace!("Resolved to {:?} with {} nested composite(s).", vdom.kind(), nested.len());
		vdom.claim(composite.handle());
		self.rendered.push(Resolved {
			composite: composite.clone(),
			vdom: vdom.clone(),
			nested,
		});
		Ok(vdom)
	}

	/// Lets each composite encountered during resolution retain its part of the tree and the composites nested in it.
	///
	/// Call this only once the resolved tree is live.
	/// Returns the top-level composites, which nothing else keeps alive.
	pub fn commit(mut self) -> Vec<Composite<D>> {
		for Resolved { composite, vdom, nested } in self.rendered {
			composite.retain_vdom(vdom, nested);
		}
		self.frames.pop().unwrap_or_default()
	}
}
