//! The browser [`Document`], backed by [`web_sys`].

use crate::{mount, Document, Error, Listener, Mounted, Node};
use core::{cell::RefCell, fmt};
use hashbrown::HashMap;
use js_sys::Function;
use std::rc::Rc;
use tracing::{instrument, trace, trace_span, warn};
use wasm_bindgen::{closure::Closure, JsCast, JsValue};

/// Renders into a [`web_sys::Document`].
///
/// Event listeners are released when their element is deleted through a range of this document,
/// and otherwise stay registered for as long as this instance exists.
/// Once it's dropped, they will start throwing errors into JavaScript when called.
pub struct WebDocument {
	document: web_sys::Document,
	listeners: Rc<RefCell<Listeners>>,
	common_handler: Closure<dyn Fn(JsValue, web_sys::Event)>,
}

#[derive(Default)]
struct Listeners {
	next_key: u32,
	registered: HashMap<u32, Registered>,
}

struct Registered {
	element: web_sys::Node,
	listener: Listener<WebDocument>,
}

impl fmt::Debug for WebDocument {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("WebDocument")
			.field("document", &self.document)
			.field("listener_count()", &self.listener_count())
			.finish()
	}
}

impl WebDocument {
	#[must_use]
	pub fn new(document: web_sys::Document) -> Self {
		let listeners = Rc::new(RefCell::new(Listeners::default()));
		Self {
			document,
			common_handler: common_handler(listeners.clone()),
			listeners,
		}
	}

	/// The current window's document, if there is one.
	#[must_use]
	pub fn from_window() -> Option<Self> {
		web_sys::window().and_then(|window| window.document()).map(Self::new)
	}

	#[must_use]
	pub fn document(&self) -> &web_sys::Document {
		&self.document
	}

	/// How many event listeners are currently registered.
	#[must_use]
	pub fn listener_count(&self) -> usize {
		self.listeners.borrow().registered.len()
	}

	fn range(&self) -> Result<web_sys::Range, Error> {
		self.document.create_range().map_err(|error| js_error("createRange", &error))
	}

	/// Releases the listeners of `removed` and their descendants.
	fn release_listeners(&self, removed: &[web_sys::Node]) {
		if removed.is_empty() {
			return;
		}
		let mut listeners = self.listeners.borrow_mut();
		let before = listeners.registered.len();
		listeners
			.registered
			.retain(|_, registered| !removed.iter().any(|root| root.contains(Some(&registered.element))));
		let after = listeners.registered.len();
		if after < before {
			trace!("Released {} listener(s). ({} remaining)", before - after, after);
		}
	}
}

/// Calls the listener registered under the key it was bound to.
///
/// The listener is cloned out of the map first, so it may release itself while running.
fn common_handler(listeners: Rc<RefCell<Listeners>>) -> Closure<dyn Fn(JsValue, web_sys::Event)> {
	Closure::wrap(Box::new(move |key: JsValue, event: web_sys::Event| {
		let span = trace_span!("common_handler", key = ?&key, event = %event.type_());
		let _enter = span.enter();

		#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
		let key = key.as_f64().map(|key| key as u32);
		let listener = key.and_then(|key| {
			let listeners = listeners.borrow();
			listeners.registered.get(&key).map(|registered| registered.listener.clone())
		});
		match listener {
			Some(listener) => listener(&event),
			None => warn!("Listener was already released. Ignoring event."),
		}
	}) as Box<dyn Fn(JsValue, web_sys::Event)>)
}

/// The nodes `range` would remove entirely, if it stays within one container.
fn contained_children(range: &web_sys::Range) -> Result<Vec<web_sys::Node>, Error> {
	let start = range.start_container().map_err(|error| js_error("startContainer", &error))?;
	let end = range.end_container().map_err(|error| js_error("endContainer", &error))?;
	if !start.is_same_node(Some(&end)) {
		trace!("Range spans several containers. Listeners inside it stay registered.");
		return Ok(Vec::new());
	}
	let start_offset = range.start_offset().map_err(|error| js_error("startOffset", &error))?;
	let end_offset = range.end_offset().map_err(|error| js_error("endOffset", &error))?;
	let children = start.child_nodes();
	Ok((start_offset..end_offset).filter_map(|i| children.get(i)).collect())
}

fn js_error(operation: &'static str, error: &JsValue) -> Error {
	Error::dom(operation, format!("{:?}", error))
}

fn can_have_children(node: &web_sys::Node) -> bool {
	matches!(
		node.node_type(),
		web_sys::Node::ELEMENT_NODE | web_sys::Node::DOCUMENT_NODE | web_sys::Node::DOCUMENT_FRAGMENT_NODE
	)
}

impl Document for WebDocument {
	type LiveNode = web_sys::Node;
	type Range = web_sys::Range;
	type Event = web_sys::Event;

	fn create_element(&self, tag: &str) -> Result<web_sys::Node, Error> {
		self.document
			.create_element(tag)
			.map(Into::into)
			.map_err(|error| js_error("createElement", &error))
	}

	fn create_text_node(&self, data: &str) -> web_sys::Node {
		self.document.create_text_node(data).into()
	}

	fn set_attribute(&self, element: &web_sys::Node, name: &str, value: &str) -> Result<(), Error> {
		element
			.dyn_ref::<web_sys::Element>()
			.ok_or_else(|| Error::dom("setAttribute", format!("{:?} is not an element", element)))?
			.set_attribute(name, value)
			.map_err(|error| js_error("setAttribute", &error))
	}

	fn add_event_listener(&self, element: &web_sys::Node, event: &str, listener: Listener<Self>) -> Result<(), Error> {
		let mut listeners = self.listeners.borrow_mut();
		let key = listeners.next_key;
		let function = self
			.common_handler
			.as_ref()
			.unchecked_ref::<Function>()
			.bind1(&JsValue::UNDEFINED, &JsValue::from(key))
			.unchecked_into::<Function>();
		element
			.add_event_listener_with_callback(event, &function)
			.map_err(|error| js_error("addEventListener", &error))?;

		listeners.next_key = key.wrapping_add(1);
		listeners.registered.insert(
			key,
			Registered {
				element: element.clone(),
				listener,
			},
		);
		trace!("Registered {:?} listener {}. ({} total)", event, key, listeners.registered.len());
		Ok(())
	}

	fn range_over_contents(&self, parent: &web_sys::Node) -> Result<web_sys::Range, Error> {
		if !can_have_children(parent) {
			return Err(Error::MissingContainer(format!("{:?} can't have children", parent)));
		}
		let range = self.range()?;
		range.select_node_contents(parent).map_err(|error| js_error("selectNodeContents", &error))?;
		Ok(range)
	}

	fn range_at_end(&self, parent: &web_sys::Node) -> Result<web_sys::Range, Error> {
		let range = self.range_over_contents(parent)?;
		range.collapse_with_to_start(false);
		Ok(range)
	}

	fn range_at_end_of(&self, range: &web_sys::Range) -> Result<web_sys::Range, Error> {
		let container = range.end_container().map_err(|error| js_error("endContainer", &error))?;
		let offset = range.end_offset().map_err(|error| js_error("endOffset", &error))?;
		let new = self.range()?;
		new.set_start(&container, offset).map_err(|error| js_error("setStart", &error))?;
		new.collapse_with_to_start(true);
		Ok(new)
	}

	fn delete_contents(&self, range: &web_sys::Range) -> Result<(), Error> {
		let removed = contained_children(range)?;
		range.delete_contents().map_err(|error| js_error("deleteContents", &error))?;
		self.release_listeners(&removed);
		Ok(())
	}

	fn insert_node(&self, range: &web_sys::Range, node: &web_sys::Node) -> Result<(), Error> {
		range.insert_node(node).map_err(|error| js_error("insertNode", &error))
	}

	fn set_start_before(&self, range: &web_sys::Range, node: &web_sys::Node) -> Result<(), Error> {
		range.set_start_before(node).map_err(|error| js_error("setStartBefore", &error))
	}

	fn set_start_after(&self, range: &web_sys::Range, node: &web_sys::Node) -> Result<(), Error> {
		range.set_start_after(node).map_err(|error| js_error("setStartAfter", &error))
	}

	fn set_end_after(&self, range: &web_sys::Range, node: &web_sys::Node) -> Result<(), Error> {
		range.set_end_after(node).map_err(|error| js_error("setEndAfter", &error))
	}

	fn surrounds(&self, range: &web_sys::Range, node: &web_sys::Node) -> bool {
		let boundaries = (|| -> Result<_, JsValue> {
			Ok((range.start_container()?, range.start_offset()?, range.end_container()?, range.end_offset()?))
		})();
		let (start_container, start_offset, end_container, end_offset) = match boundaries {
			Ok(boundaries) => boundaries,
			Err(error) => {
				warn!("Couldn't read range boundaries: {:?}", error);
				return false;
			}
		};

		start_container.is_same_node(Some(&end_container))
			&& end_offset == start_offset + 1
			&& start_container.child_nodes().get(start_offset).map_or(false, |child| child.is_same_node(Some(node)))
	}
}

/// [`mount`]s `root` into the element with the given `id`.
///
/// # Errors
///
/// - [`Error::MissingContainer`] iff there is no element with that `id`.
/// - Anything [`mount`] returns.
#[instrument(skip(root, document))]
pub fn mount_to_element_id(root: &Node<WebDocument>, document: Rc<WebDocument>, id: &str) -> Result<Mounted<WebDocument>, Error> {
	let container: web_sys::Node = document
		.document
		.get_element_by_id(id)
		.ok_or_else(|| Error::MissingContainer(format!("#{}", id)))?
		.into();
	mount(root, document, &container)
}
