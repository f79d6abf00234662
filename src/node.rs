//! Declarative UI trees, as handed to [`mount`](`crate::mount`) or returned from [`Component::render`](`crate::Component::render`).

use crate::{Composite, Document};
use core::fmt;
use hashbrown::HashMap;
use std::rc::Rc;
use tracing::warn;

/// An event handler, compared by identity.
pub type Listener<D> = Rc<dyn Fn(&<D as Document>::Event)>;

/// Element attributes and composite props. Insertion order is irrelevant.
pub type Attributes<D> = HashMap<String, AttributeValue<D>>;

pub enum AttributeValue<D: Document> {
	Text(String),
	Listener(Listener<D>),
}

impl<D: Document> AttributeValue<D> {
	pub fn listener(listener: impl 'static + Fn(&D::Event)) -> Self {
		Self::Listener(Rc::new(listener))
	}

	#[must_use]
	pub fn as_text(&self) -> Option<&str> {
		match self {
			AttributeValue::Text(text) => Some(text),
			AttributeValue::Listener(_) => None,
		}
	}
}

impl<D: Document> Clone for AttributeValue<D> {
	fn clone(&self) -> Self {
		match self {
			AttributeValue::Text(text) => AttributeValue::Text(text.clone()),
			AttributeValue::Listener(listener) => AttributeValue::Listener(listener.clone()),
		}
	}
}

impl<D: Document> PartialEq for AttributeValue<D> {
	fn eq(&self, other: &Self) -> bool {
		match (self, other) {
			(AttributeValue::Text(a), AttributeValue::Text(b)) => a == b,
			(AttributeValue::Listener(a), AttributeValue::Listener(b)) => Rc::as_ptr(a).cast::<()>() == Rc::as_ptr(b).cast::<()>(),
			_ => false,
		}
	}
}

impl<D: Document> fmt::Debug for AttributeValue<D> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			AttributeValue::Text(text) => fmt::Debug::fmt(text, f),
			AttributeValue::Listener(listener) => write!(f, "Listener({:p})", Rc::as_ptr(listener).cast::<()>()),
		}
	}
}

impl<D: Document> From<&str> for AttributeValue<D> {
	fn from(text: &str) -> Self {
		Self::Text(text.to_owned())
	}
}

impl<D: Document> From<String> for AttributeValue<D> {
	fn from(text: String) -> Self {
		Self::Text(text)
	}
}

/// A renderable unit of a declarative tree.
pub enum Node<D: Document> {
	Element(Element<D>),
	Text(Text),
	Composite(Composite<D>),
}

impl<D: Document> Node<D> {
	#[must_use]
	pub fn element(tag: impl Into<String>) -> Self {
		Self::Element(Element::new(tag))
	}

	#[must_use]
	pub fn text(content: impl Into<String>) -> Self {
		Self::Text(Text::new(content))
	}
}

impl<D: Document> Clone for Node<D> {
	/// Elements and texts are copied deeply, but composites are shared.
	fn clone(&self) -> Self {
		match self {
			Node::Element(element) => Node::Element(element.clone()),
			Node::Text(text) => Node::Text(text.clone()),
			Node::Composite(composite) => Node::Composite(composite.clone()),
		}
	}
}

impl<D: Document> fmt::Debug for Node<D> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Node::Element(element) => element.fmt(f),
			Node::Text(text) => text.fmt(f),
			Node::Composite(composite) => composite.fmt(f),
		}
	}
}

impl<D: Document> From<Element<D>> for Node<D> {
	fn from(element: Element<D>) -> Self {
		Self::Element(element)
	}
}

impl<D: Document> From<Text> for Node<D> {
	fn from(text: Text) -> Self {
		Self::Text(text)
	}
}

impl<D: Document> From<Composite<D>> for Node<D> {
	fn from(composite: Composite<D>) -> Self {
		Self::Composite(composite)
	}
}

pub struct Element<D: Document> {
	tag: String,
	attributes: Attributes<D>,
	children: Vec<Node<D>>,
}

impl<D: Document> Element<D> {
	#[must_use]
	pub fn new(tag: impl Into<String>) -> Self {
		Self {
			tag: tag.into(),
			attributes: Attributes::new(),
			children: Vec::new(),
		}
	}

	#[must_use]
	pub fn tag(&self) -> &str {
		&self.tag
	}

	#[must_use]
	pub fn attributes(&self) -> &Attributes<D> {
		&self.attributes
	}

	#[must_use]
	pub fn children(&self) -> &[Node<D>] {
		&self.children
	}
}

impl<D: Document> Clone for Element<D> {
	fn clone(&self) -> Self {
		Self {
			tag: self.tag.clone(),
			attributes: self.attributes.clone(),
			children: self.children.clone(),
		}
	}
}

impl<D: Document> fmt::Debug for Element<D> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Element")
			.field("tag", &self.tag)
			.field("attributes", &self.attributes)
			.field("children", &self.children)
			.finish()
	}
}

/// Immutable text content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Text {
	content: String,
}

impl Text {
	#[must_use]
	pub fn new(content: impl Into<String>) -> Self {
		Self { content: content.into() }
	}

	#[must_use]
	pub fn content(&self) -> &str {
		&self.content
	}
}

/// Attribute and child attachment shared by [`Element`]s and [`Composite`]s.
pub trait Attach<D: Document> {
	/// Sets an attribute (or prop). The last write for each name wins.
	fn set_attribute(&mut self, name: &str, value: AttributeValue<D>);

	/// Appends a child. Children are never removed.
	fn append_child(&mut self, child: Node<D>);
}

impl<D: Document> Attach<D> for Element<D> {
	fn set_attribute(&mut self, name: &str, value: AttributeValue<D>) {
		self.attributes.insert(name.to_owned(), value);
	}

	fn append_child(&mut self, child: Node<D>) {
		self.children.push(child);
	}
}

impl<D: Document> Attach<D> for Node<D> {
	/// Text nodes have no attributes, so this is ignored for them.
	fn set_attribute(&mut self, name: &str, value: AttributeValue<D>) {
		match self {
			Node::Element(element) => element.set_attribute(name, value),
			Node::Composite(composite) => composite.set_attribute(name, value),
			Node::Text(_) => warn!("Tried to set attribute {:?} on a text node. Ignoring.", name),
		}
	}

	/// Text nodes have no children, so this is ignored for them.
	fn append_child(&mut self, child: Node<D>) {
		match self {
			Node::Element(element) => element.append_child(child),
			Node::Composite(composite) => composite.append_child(child),
			Node::Text(_) => warn!("Tried to append a child to a text node. Ignoring."),
		}
	}
}

/// Anything that can appear in the child list of [`build`].
///
/// Nested lists are flattened, strings become [`Text`] nodes and [`Child::Empty`] (from [`None`]) is skipped.
pub enum Child<D: Document> {
	Node(Node<D>),
	Many(Vec<Child<D>>),
	Empty,
}

impl<D: Document> Child<D> {
	fn flatten_into(self, sink: &mut impl Attach<D>) {
		match self {
			Child::Node(node) => sink.append_child(node),
			Child::Many(children) => {
				for child in children {
					child.flatten_into(sink)
				}
			}
			Child::Empty => (),
		}
	}
}

impl<D: Document> From<Node<D>> for Child<D> {
	fn from(node: Node<D>) -> Self {
		Self::Node(node)
	}
}

impl<D: Document> From<Element<D>> for Child<D> {
	fn from(element: Element<D>) -> Self {
		Self::Node(element.into())
	}
}

impl<D: Document> From<Composite<D>> for Child<D> {
	fn from(composite: Composite<D>) -> Self {
		Self::Node(composite.into())
	}
}

impl<D: Document> From<&str> for Child<D> {
	fn from(text: &str) -> Self {
		Self::Node(Node::text(text))
	}
}

impl<D: Document> From<String> for Child<D> {
	fn from(text: String) -> Self {
		Self::Node(Node::text(text))
	}
}

impl<D: Document, T: Into<Child<D>>> From<Vec<T>> for Child<D> {
	fn from(children: Vec<T>) -> Self {
		Self::Many(children.into_iter().map(Into::into).collect())
	}
}

impl<D: Document, T: Into<Child<D>>> From<Option<T>> for Child<D> {
	fn from(child: Option<T>) -> Self {
		child.map_or(Self::Empty, Into::into)
	}
}

/// What [`build`] constructs: A primitive element by tag name, or a fresh composite instance.
pub enum Kind<D: Document> {
	Tag(String),
	Composite(Composite<D>),
}

impl<D: Document> From<&str> for Kind<D> {
	fn from(tag: &str) -> Self {
		Self::Tag(tag.to_owned())
	}
}

impl<D: Document> From<String> for Kind<D> {
	fn from(tag: String) -> Self {
		Self::Tag(tag)
	}
}

impl<D: Document> From<Composite<D>> for Kind<D> {
	fn from(composite: Composite<D>) -> Self {
		Self::Composite(composite)
	}
}

/// Constructs a [`Node`] from a tag or composite, its attributes and its children.
///
/// Attributes are applied before any children are attached.
pub fn build<D, N, V>(kind: impl Into<Kind<D>>, attributes: impl IntoIterator<Item = (N, V)>, children: impl IntoIterator<Item = Child<D>>) -> Node<D>
where
	D: Document,
	N: AsRef<str>,
	V: Into<AttributeValue<D>>,
{
	let mut node: Node<D> = match kind.into() {
		Kind::Tag(tag) => Node::element(tag),
		Kind::Composite(composite) => composite.into(),
	};
	for (name, value) in attributes {
		node.set_attribute(name.as_ref(), value.into());
	}
	for child in children {
		child.flatten_into(&mut node);
	}
	node
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::memory::MemoryDocument;

	#[test]
	fn build_flattens_children() {
		type C = Child<MemoryDocument>;
		let node = build(
			"ul",
			vec![("id", "list")],
			vec![
				C::from("a"),
				C::from(vec![C::from("b"), C::from(None::<Node<MemoryDocument>>), C::from(vec!["c"])]),
				C::from(Node::element("li")),
			],
		);

		let element = match &node {
			Node::Element(element) => element,
			other => panic!("Expected element, got {:?}", other),
		};
		assert_eq!(element.tag(), "ul");
		assert_eq!(element.attributes().get("id"), Some(&AttributeValue::from("list")));
		let texts: Vec<_> = element
			.children()
			.iter()
			.map(|child| match child {
				Node::Text(text) => text.content().to_owned(),
				Node::Element(element) => format!("<{}>", element.tag()),
				Node::Composite(_) => "composite".to_owned(),
			})
			.collect();
		assert_eq!(texts, ["a", "b", "c", "<li>"]);
	}

	#[test]
	fn last_attribute_write_wins() {
		let mut element = Element::<MemoryDocument>::new("div");
		element.set_attribute("id", "first".into());
		element.set_attribute("id", "second".into());
		assert_eq!(element.attributes().len(), 1);
		assert_eq!(element.attributes()["id"].as_text(), Some("second"));
	}

	#[test]
	fn listeners_compare_by_identity() {
		let a = AttributeValue::<MemoryDocument>::listener(|_| ());
		let b = AttributeValue::<MemoryDocument>::listener(|_| ());
		assert_eq!(a, a.clone());
		assert_ne!(a, b);
		assert_ne!(a, AttributeValue::from("text"));
	}

	#[test]
	fn text_nodes_ignore_attributes_and_children() {
		let mut text = Node::<MemoryDocument>::text("text");
		text.set_attribute("id", "a".into());
		text.append_child(Node::text("child"));
		match text {
			Node::Text(text) => assert_eq!(text.content(), "text"),
			other => panic!("Expected text, got {:?}", other),
		}
	}
}
