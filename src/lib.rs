#![doc(html_root_url = "https://docs.rs/cambium/0.0.1")]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! A minimal virtual DOM with stateful composite components.
//!
//! Trees of [`Node`]s are [`resolve`]d into [`VNode`] trees by rendering every [`Composite`] in them,
//! materialized into a live [`Document`] at [`Cursor`]s and later brought up to date by [`reconcile`]
//! whenever [`Composite::set_state`] is called.
//!
//! # Logging
//!
//! Everything is instrumented with [`tracing`]. Text content and attribute values are only logged with the `"dangerous-logging"` feature.

#[cfg(doctest)]
pub mod readme {
	doc_comment::doctest!("../README.md");
}

mod component;
mod cursor;
mod diff;
mod document;
mod error;
mod materialize;
pub mod memory;
mod node;
mod state;
mod vdom;
#[cfg(feature = "web")]
pub mod web;

pub use component::{Component, Composite, Context, Handle, Rendered};
pub use cursor::Cursor;
pub use diff::{reconcile, same_node};
pub use document::Document;
pub use error::Error;
pub use materialize::{event_name, live_attribute_name, Renderable};
pub use node::{build, Attach, AttributeValue, Attributes, Child, Element, Kind, Listener, Node, Text};
pub use serde_json::{json, Value};
pub use state::merge_state;
pub use vdom::{resolve, VElement, VNode, VText, RENDER_DEPTH_LIMIT};

use std::rc::Rc;
use tracing::{instrument, trace};

/// Renders `root` into `container`, replacing all of its current children.
///
/// Composites in `root` retain their v-trees, so they can later update themselves through [`Composite::set_state`].
/// Those that appear directly in `root` are owned by the returned [`Mounted`], and each composite owns those that appear in its own output.
///
/// # Errors
///
/// - [`Error::MissingContainer`] iff `container` can't have children.
/// - Anything [`Renderable::render_to_live_tree`] returns.
#[instrument(skip_all)]
pub fn mount<D: Document>(root: &Node<D>, document: Rc<D>, container: &D::LiveNode) -> Result<Mounted<D>, Error> {
	let cursor = Cursor::over_contents(document, container)?;
	cursor.delete_spanned()?;
	trace!("Cleared container.");
	let composites = materialize::materialize(root, cursor.clone())?;
	trace!("Mounted with {} top-level composite(s).", composites.len());
	Ok(Mounted { cursor, composites })
}

/// Mounted content, as returned by [`mount`].
///
/// The live content stays in place when this is dropped, but composites that nothing else holds on to are dropped along with it.
/// Their event listeners then do nothing.
#[must_use = "Dropping this drops the mounted composites."]
pub struct Mounted<D: Document> {
	cursor: Cursor<D>,
	composites: Vec<Composite<D>>,
}

impl<D: Document> Mounted<D> {
	/// Spans the mounted root node.
	#[must_use]
	pub fn cursor(&self) -> &Cursor<D> {
		&self.cursor
	}

	/// The composites that appear directly in the mounted tree, outside of other composites.
	#[must_use]
	pub fn composites(&self) -> &[Composite<D>] {
		&self.composites
	}
}

impl<D: Document> core::fmt::Debug for Mounted<D> {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		f.debug_struct("Mounted")
			.field("cursor", &self.cursor)
			.field("composites", &self.composites)
			.finish()
	}
}

#[cfg(feature = "dangerous-logging")]
pub(crate) fn redact(text: &str) -> &str {
	text
}

#[cfg(not(feature = "dangerous-logging"))]
pub(crate) fn redact(_text: &str) -> &str {
	"<redacted>"
}
