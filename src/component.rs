//! Stateful, user-defined nodes.

use crate::{diff, state::merge_state, vdom::Resolver, Attach, AttributeValue, Attributes, Cursor, Document, Element, Error, Node, Renderable, VNode};
use core::{
	any::type_name,
	cell::{Cell, RefCell},
	fmt,
};
use serde_json::Value;
use std::rc::{Rc, Weak};
use tracing::{error, instrument, trace, warn};

/// User-defined node content.
///
/// ```
/// use cambium::{build, memory::MemoryDocument, Child, Component, Context, Rendered};
///
/// struct Greeting;
/// impl Component<MemoryDocument> for Greeting {
/// 	fn render(&self, cx: &Context<'_, MemoryDocument>) -> Rendered<MemoryDocument> {
/// 		let name = cx.prop_text("name").unwrap_or("world");
/// 		build::<MemoryDocument, &str, &str>("p", vec![], vec![Child::from(format!("Hello {}!", name))]).into()
/// 	}
/// }
/// ```
pub trait Component<D: Document>: 'static {
	/// Produces this component's current output, which must be exactly one node.
	///
	/// This is called again whenever the state of this component or an ancestor changes.
	fn render(&self, cx: &Context<'_, D>) -> Rendered<D>;

	/// The state this component starts out with. Absent by default.
	fn initial_state(&self) -> Option<Value> {
		None
	}
}

/// The output of [`Component::render`].
///
/// Only a single node is valid, but anything else is reported as [`Error::InvalidRenderResult`] instead of being rejected by the compiler,
/// so that lists of nodes can be returned without further checks.
pub struct Rendered<D: Document>(Vec<Node<D>>);

impl<D: Document> Rendered<D> {
	#[must_use]
	pub fn nothing() -> Self {
		Self(Vec::new())
	}

	pub(crate) fn into_single(self, component: &'static str) -> Result<Node<D>, Error> {
		let mut nodes = self.0;
		if nodes.len() == 1 {
			Ok(nodes.remove(0))
		} else {
			let error = Error::InvalidRenderResult { component, count: nodes.len() };
			error!("{}", error);
			Err(error)
		}
	}
}

impl<D: Document> From<Node<D>> for Rendered<D> {
	fn from(node: Node<D>) -> Self {
		Self(vec![node])
	}
}

impl<D: Document> From<Element<D>> for Rendered<D> {
	fn from(element: Element<D>) -> Self {
		Self(vec![element.into()])
	}
}

impl<D: Document> From<Composite<D>> for Rendered<D> {
	fn from(composite: Composite<D>) -> Self {
		Self(vec![composite.into()])
	}
}

impl<D: Document> From<Vec<Node<D>>> for Rendered<D> {
	fn from(nodes: Vec<Node<D>>) -> Self {
		Self(nodes)
	}
}

impl<D: Document> From<Option<Node<D>>> for Rendered<D> {
	fn from(node: Option<Node<D>>) -> Self {
		Self(node.into_iter().collect())
	}
}

/// What a [`Component`] can see while rendering.
pub struct Context<'a, D: Document> {
	props: &'a Attributes<D>,
	children: &'a [Node<D>],
	state: Option<&'a Value>,
	handle: Handle<D>,
}

impl<'a, D: Document> Context<'a, D> {
	#[must_use]
	pub fn props(&self) -> &'a Attributes<D> {
		self.props
	}

	#[must_use]
	pub fn prop(&self, name: &str) -> Option<&'a AttributeValue<D>> {
		self.props.get(name)
	}

	#[must_use]
	pub fn prop_text(&self, name: &str) -> Option<&'a str> {
		self.prop(name).and_then(AttributeValue::as_text)
	}

	#[must_use]
	pub fn children(&self) -> &'a [Node<D>] {
		self.children
	}

	#[must_use]
	pub fn state(&self) -> Option<&'a Value> {
		self.state
	}

	/// A weak handle to the composite being rendered, for use in event listeners.
	#[must_use]
	pub fn handle(&self) -> Handle<D> {
		self.handle.clone()
	}
}

/// A stateful node backed by a [`Component`].
///
/// Clones refer to the same instance.
pub struct Composite<D: Document>(Rc<CompositeCell<D>>);

struct CompositeCell<D: Document> {
	type_name: &'static str,
	updating: Cell<bool>,
	/// Set while the retained v-tree may not match the live content, after an update failed partway through.
	diverged: Cell<bool>,
	instance: RefCell<Instance<D>>,
}

struct Instance<D: Document> {
	component: Box<dyn Component<D>>,
	props: Attributes<D>,
	children: Vec<Node<D>>,
	state: Option<Value>,
	/// The v-tree this composite was last materialized or reconciled with.
	vdom: Option<VNode<D>>,
	/// The composites that appear in `vdom`'s source tree, outside of other composites.
	/// Nothing else keeps them alive once they are live.
	nested: Vec<Composite<D>>,
}

impl<D: Document> Clone for Composite<D> {
	fn clone(&self) -> Self {
		Self(self.0.clone())
	}
}

impl<D: Document> fmt::Debug for Composite<D> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let mut debug = f.debug_struct("Composite");
		debug.field("component", &self.0.type_name);
		match self.0.instance.try_borrow() {
			Ok(instance) => debug
				.field("props", &instance.props)
				.field("children", &instance.children)
				.field("state", &instance.state),
			Err(_) => debug.field("instance", &"<borrowed>"),
		}
		.finish()
	}
}

impl<D: Document> Composite<D> {
	#[must_use]
	pub fn new<C: Component<D>>(component: C) -> Self {
		let state = component.initial_state();
		Self(Rc::new(CompositeCell {
			type_name: type_name::<C>(),
			updating: Cell::new(false),
			diverged: Cell::new(false),
			instance: RefCell::new(Instance {
				component: Box::new(component),
				props: Attributes::new(),
				children: Vec::new(),
				state,
				vdom: None,
				nested: Vec::new(),
			}),
		}))
	}

	#[must_use]
	pub fn type_name(&self) -> &'static str {
		self.0.type_name
	}

	#[must_use]
	pub fn handle(&self) -> Handle<D> {
		Handle(Rc::downgrade(&self.0))
	}

	#[must_use]
	pub fn ptr_eq(&self, other: &Self) -> bool {
		Rc::ptr_eq(&self.0, &other.0)
	}

	#[must_use]
	pub fn prop(&self, name: &str) -> Option<AttributeValue<D>> {
		self.0.instance.borrow().props.get(name).cloned()
	}

	#[must_use]
	pub fn children(&self) -> Vec<Node<D>> {
		self.0.instance.borrow().children.clone()
	}

	#[must_use]
	pub fn state(&self) -> Option<Value> {
		self.0.instance.borrow().state.clone()
	}

	/// The v-tree this composite was last materialized or reconciled with.
	#[must_use]
	pub fn vdom(&self) -> Option<VNode<D>> {
		self.0.instance.borrow().vdom.clone()
	}

	/// The live span this composite currently occupies, which is that of its v-tree's root.
	#[must_use]
	pub fn cursor(&self) -> Option<Cursor<D>> {
		self.vdom().and_then(|vdom| vdom.span())
	}

	/// Renders this composite into a fresh v-tree, without retaining it.
	///
	/// # Errors
	///
	/// See [`resolve`](`crate::resolve`).
	pub fn resolve(&self) -> Result<VNode<D>, Error> {
		Resolver::new().resolve_composite(self, 0)
	}

	pub(crate) fn render_node(&self) -> Result<Node<D>, Error> {
		let instance = self.0.instance.try_borrow().map_err(|_| Error::ReentrantUpdate)?;
		let cx = Context {
			props: &instance.props,
			children: &instance.children,
			state: instance.state.as_ref(),
			handle: self.handle(),
		};
		let rendered = instance.component.render(&cx);
		rendered.into_single(self.0.type_name)
	}

	pub(crate) fn retain_vdom(&self, vdom: VNode<D>, nested: Vec<Composite<D>>) {
		let mut instance = self.0.instance.borrow_mut();
		instance.vdom = Some(vdom);
		instance.nested = nested;
		self.0.diverged.set(false);
	}

	/// The composites rendered directly by this one, as of its last materialization or update.
	#[must_use]
	pub fn nested(&self) -> Vec<Composite<D>> {
		self.0.instance.borrow().nested.clone()
	}

	/// Merges `patch` into this composite's state and then reconciles its live content.
	///
	/// See [`merge_state`](`crate::merge_state`) for the merge rules.
	/// If this composite hasn't been materialized yet, only its state changes.
	///
	/// # Errors
	///
	/// - [`Error::ReentrantUpdate`] iff called while this composite renders or is being reconciled. The state is left unchanged.
	/// - Any error from [`update`](`Composite::update`).
	#[instrument(skip(self, patch), fields(component = self.0.type_name))]
	pub fn set_state(&self, patch: Value) -> Result<(), Error> {
		if self.0.updating.get() {
			return Err(Error::ReentrantUpdate);
		}

		{
			let mut instance = self.0.instance.try_borrow_mut().map_err(|_| Error::ReentrantUpdate)?;
			merge_state(&mut instance.state, patch);
		}

		self.update()
	}

	/// Renders this composite again and reconciles the result against the v-tree it retained.
	///
	/// If this fails partway through, the live content is left partially updated and the old v-tree stays retained.
	/// The next successful update then rebuilds this composite's live content as a whole instead of reconciling it.
	///
	/// # Errors
	///
	/// - [`Error::ReentrantUpdate`] iff this composite is already being updated.
	/// - Any resolution error (see [`resolve`](`crate::resolve`)).
	/// - [`Error::StaleCursor`] iff retained spans were invalidated by another operation.
	/// - [`Error::Dom`] iff the live document rejected a change.
	#[instrument(skip(self), fields(component = self.0.type_name))]
	pub fn update(&self) -> Result<(), Error> {
		let old = match self.vdom() {
			Some(old) => old,
			None => {
				trace!("Not materialized yet. Nothing to reconcile.");
				return Ok(());
			}
		};

		if self.0.updating.replace(true) {
			return Err(Error::ReentrantUpdate);
		}
		let result = self.reconcile_retained(&old);
		self.0.updating.set(false);
		result
	}

	fn reconcile_retained(&self, old: &VNode<D>) -> Result<(), Error> {
		let mut resolver = Resolver::new();
		let new = resolver.resolve_composite(self, 0)?;

		let result = if self.0.diverged.get() {
			warn!("The previous update failed partway through. Rebuilding all live content.");
			match old.span() {
				Some(span) => new.render_to_live_tree(span),
				None => Err(Error::StaleCursor),
			}
		} else {
			diff::reconcile(old, &new)
		};

		match result {
			Ok(()) => {
				resolver.commit();
				Ok(())
			}
			Err(error) => {
				error!("Update failed. The live content may be partially updated: {}", error);
				self.0.diverged.set(true);
				Err(error)
			}
		}
	}
}

impl<D: Document> Attach<D> for Composite<D> {
	/// Sets a prop. The last write for each name wins.
	fn set_attribute(&mut self, name: &str, value: AttributeValue<D>) {
		self.0.instance.borrow_mut().props.insert(name.to_owned(), value);
	}

	fn append_child(&mut self, child: Node<D>) {
		self.0.instance.borrow_mut().children.push(child);
	}
}

/// A weak reference to a [`Composite`], which doesn't keep it alive.
pub struct Handle<D: Document>(Weak<CompositeCell<D>>);

impl<D: Document> Clone for Handle<D> {
	fn clone(&self) -> Self {
		Self(self.0.clone())
	}
}

impl<D: Document> fmt::Debug for Handle<D> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("Handle").field(&self.0.upgrade().map(|cell| cell.type_name)).finish()
	}
}

impl<D: Document> Handle<D> {
	#[must_use]
	pub fn upgrade(&self) -> Option<Composite<D>> {
		self.0.upgrade().map(Composite)
	}

	pub(crate) fn is_diverged(&self) -> bool {
		self.0.upgrade().map_or(false, |cell| cell.diverged.get())
	}

	pub(crate) fn retained_vdom(&self) -> Option<VNode<D>> {
		let cell = self.0.upgrade()?;
		let instance = cell.instance.try_borrow().ok()?;
		instance.vdom.clone()
	}

	/// Like [`Composite::set_state`], but does nothing if the composite was dropped.
	///
	/// # Errors
	///
	/// See [`Composite::set_state`].
	pub fn set_state(&self, patch: Value) -> Result<(), Error> {
		match self.upgrade() {
			Some(composite) => composite.set_state(patch),
			None => {
				warn!("Tried to set state of a dropped composite. Ignoring.");
				Ok(())
			}
		}
	}

	/// Creates an event listener attribute that calls `handler` with this handle.
	///
	/// Errors can't be returned from event listeners, so they are logged instead.
	pub fn listener(&self, handler: impl 'static + Fn(&Handle<D>, &D::Event) -> Result<(), Error>) -> AttributeValue<D> {
		let handle = self.clone();
		AttributeValue::listener(move |event| {
			if let Err(error) = handler(&handle, event) {
				error!("Event listener failed: {}", error)
			}
		})
	}
}
