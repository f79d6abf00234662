//! Turning nodes into live document content.

use crate::{redact, vdom::Resolver, AttributeValue, Composite, Cursor, Document, Element, Error, Node, Text, VElement, VNode, VText};
use tracing::{error, instrument, trace, trace_span, warn};

/// Something that can be materialized at a [`Cursor`], replacing whatever the cursor spans.
pub trait Renderable<D: Document> {
	/// # Errors
	///
	/// - [`Error::StaleCursor`] iff `cursor` (or a cursor derived from it) was invalidated by another operation.
	/// - [`Error::Dom`] iff the live document rejected an operation.
	/// - Resolution errors, see [`resolve`](`crate::resolve`).
	fn render_to_live_tree(&self, cursor: Cursor<D>) -> Result<(), Error>;
}

impl<D: Document> Renderable<D> for VText<D> {
	fn render_to_live_tree(&self, cursor: Cursor<D>) -> Result<(), Error> {
		let span = trace_span!("Creating text node", text = redact(&self.content));
		let _enter = span.enter();

		let text = cursor.document().create_text_node(&self.content);
		cursor.insert_at_start(&text)?;
		*self.span.borrow_mut() = Some(cursor);
		Ok(())
	}
}

impl<D: Document> Renderable<D> for VElement<D> {
	/// Always builds the element from scratch, including all of its children.
	fn render_to_live_tree(&self, cursor: Cursor<D>) -> Result<(), Error> {
		let span = trace_span!("Creating element", tag = %self.tag, "children.len()" = self.children.len());
		let _enter = span.enter();

		let document = cursor.document().clone();
		let element = document.create_element(&self.tag)?;
		for (name, value) in &self.attributes {
			apply_attribute(&*document, &element, name, value)?;
		}

		for child in &self.children {
			let child_cursor = Cursor::at_end_of(document.clone(), &element)?;
			child.render_to_live_tree(child_cursor)?;
		}

		cursor.insert_at_start(&element)?;
		*self.span.borrow_mut() = Some(cursor);
		Ok(())
	}
}

impl<D: Document> Renderable<D> for VNode<D> {
	fn render_to_live_tree(&self, cursor: Cursor<D>) -> Result<(), Error> {
		match self {
			VNode::Element(element) => element.render_to_live_tree(cursor),
			VNode::Text(text) => text.render_to_live_tree(cursor),
		}
	}
}

impl<D: Document> Renderable<D> for Text {
	fn render_to_live_tree(&self, cursor: Cursor<D>) -> Result<(), Error> {
		VNode::<D>::text(self.content()).render_to_live_tree(cursor)
	}
}

impl<D: Document> Renderable<D> for Element<D> {
	/// Resolves the children first, so composites among them are rendered (and retain their v-trees).
	///
	/// Composites that appear directly in `self` are only kept alive by `self`. [`mount`](`crate::mount`) holds on to them instead.
	fn render_to_live_tree(&self, cursor: Cursor<D>) -> Result<(), Error> {
		let mut resolver = Resolver::new();
		let vdom = resolver.resolve_element(self, 0)?;
		vdom.render_to_live_tree(cursor)?;
		resolver.commit();
		Ok(())
	}
}

impl<D: Document> Renderable<D> for Composite<D> {
	/// Composites don't create live content themselves. Their v-tree is materialized at the same cursor instead,
	/// and retained for the next [`update`](`Composite::update`).
	#[instrument(skip(self, cursor), fields(component = self.type_name()))]
	fn render_to_live_tree(&self, cursor: Cursor<D>) -> Result<(), Error> {
		let mut resolver = Resolver::new();
		let vdom = resolver.resolve_composite(self, 0)?;
		vdom.render_to_live_tree(cursor)?;
		resolver.commit();
		trace!("Retained v-tree.");
		Ok(())
	}
}

/// Resolves and materializes `node` at `cursor`, then returns the top-level composites, which nothing else owns.
pub(crate) fn materialize<D: Document>(node: &Node<D>, cursor: Cursor<D>) -> Result<Vec<Composite<D>>, Error> {
	let mut resolver = Resolver::new();
	let vdom = resolver.resolve(node, 0)?;
	vdom.render_to_live_tree(cursor)?;
	Ok(resolver.commit())
}

impl<D: Document> Renderable<D> for Node<D> {
	fn render_to_live_tree(&self, cursor: Cursor<D>) -> Result<(), Error> {
		match self {
			Node::Element(element) => element.render_to_live_tree(cursor),
			Node::Text(text) => Renderable::<D>::render_to_live_tree(text, cursor),
			Node::Composite(composite) => composite.render_to_live_tree(cursor),
		}
	}
}

/// The event name for attribute names like `onClick` (`"click"`), or [`None`] for plain attributes.
#[must_use]
pub fn event_name(attribute: &str) -> Option<String> {
	let rest = attribute.strip_prefix("on")?;
	if rest.chars().next()?.is_uppercase() {
		Some(rest.to_lowercase())
	} else {
		None
	}
}

/// The live attribute name for a plain attribute.
#[must_use]
pub fn live_attribute_name(attribute: &str) -> &str {
	match attribute {
		"className" => "class",
		other => other,
	}
}

fn apply_attribute<D: Document>(document: &D, element: &D::LiveNode, name: &str, value: &AttributeValue<D>) -> Result<(), Error> {
	match (event_name(name), value) {
		(Some(event), AttributeValue::Listener(listener)) => {
			trace!("Adding {:?} listener.", event);
			document.add_event_listener(element, &event, listener.clone())
		}
		(Some(_), AttributeValue::Text(text)) => {
			warn!("Expected a listener for {:?} but found text {:?}. Ignoring.", name, redact(text));
			Ok(())
		}
		(None, AttributeValue::Text(text)) => {
			let live_name = live_attribute_name(name);
			trace!("Setting attribute {:?}={:?}.", live_name, redact(text));
			document.set_attribute(element, live_name, text).map_err(|error| {
				error!("Failed to set attribute {:?}: {}", live_name, error);
				error
			})
		}
		(None, AttributeValue::Listener(_)) => {
			warn!("Found a listener under {:?}, which isn't an event attribute. Ignoring.", name);
			Ok(())
		}
	}
}
