//! The live document capability everything else renders into.

use crate::Error;
use core::fmt::Debug;

/// A live document that can be rendered into.
///
/// Implementations exist for browsers ([`web::WebDocument`](`crate::web::WebDocument`), with the `"web"` feature)
/// and for plain memory ([`memory::MemoryDocument`](`crate::memory::MemoryDocument`)).
///
/// # Ranges
///
/// [`Range`](`Document::Range`)s must be *live*: Inserting or removing nodes updates the boundary points of every range still in use
/// the same way the [DOM Standard](https://dom.spec.whatwg.org/#concept-live-range) describes it.
/// Handles are cheap to clone and clones refer to the same range.
pub trait Document: 'static {
	type LiveNode: Clone + Debug;
	type Range: Clone + Debug;
	type Event;

	fn create_element(&self, tag: &str) -> Result<Self::LiveNode, Error>;
	fn create_text_node(&self, data: &str) -> Self::LiveNode;
	fn set_attribute(&self, element: &Self::LiveNode, name: &str, value: &str) -> Result<(), Error>;
	fn add_event_listener(&self, element: &Self::LiveNode, event: &str, listener: crate::Listener<Self>) -> Result<(), Error>;

	/// A range spanning all current child nodes of `parent`.
	///
	/// # Errors
	///
	/// [`Error::MissingContainer`] iff `parent` isn't a node of this document that can have children.
	fn range_over_contents(&self, parent: &Self::LiveNode) -> Result<Self::Range, Error>;

	/// A collapsed range after the last child node of `parent`.
	fn range_at_end(&self, parent: &Self::LiveNode) -> Result<Self::Range, Error>;

	/// A new collapsed range at the end boundary of `range`.
	fn range_at_end_of(&self, range: &Self::Range) -> Result<Self::Range, Error>;

	fn delete_contents(&self, range: &Self::Range) -> Result<(), Error>;

	/// Inserts `node` at the start boundary of `range`.
	///
	/// If `range` was collapsed, its end is moved after `node`.
	fn insert_node(&self, range: &Self::Range, node: &Self::LiveNode) -> Result<(), Error>;

	fn set_start_before(&self, range: &Self::Range, node: &Self::LiveNode) -> Result<(), Error>;
	fn set_start_after(&self, range: &Self::Range, node: &Self::LiveNode) -> Result<(), Error>;
	fn set_end_after(&self, range: &Self::Range, node: &Self::LiveNode) -> Result<(), Error>;

	/// Whether `range` starts immediately before and ends immediately after `node`, in `node`'s parent.
	fn surrounds(&self, range: &Self::Range, node: &Self::LiveNode) -> bool;
}
