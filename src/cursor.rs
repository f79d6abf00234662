use crate::{Document, Error};
use core::{cell::RefCell, fmt};
use std::rc::Rc;
use tracing::{error, trace};

/// A span of live document content that a single node is responsible for.
///
/// Clones share the same span: Repositioning one repositions all of them.
pub struct Cursor<D: Document> {
	inner: Rc<CursorInner<D>>,
}

struct CursorInner<D: Document> {
	document: Rc<D>,
	range: D::Range,
	/// The node this cursor was last placed around, if any.
	spanned: RefCell<Option<D::LiveNode>>,
}

impl<D: Document> Clone for Cursor<D> {
	fn clone(&self) -> Self {
		Self { inner: self.inner.clone() }
	}
}

impl<D: Document> fmt::Debug for Cursor<D> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Cursor")
			.field("range", &self.inner.range)
			.field("spanned", &self.inner.spanned.borrow())
			.finish()
	}
}

impl<D: Document> Cursor<D> {
	/// Wraps an existing range. It's not considered to span any particular node yet.
	#[must_use]
	pub fn new(document: Rc<D>, range: D::Range) -> Self {
		Self {
			inner: Rc::new(CursorInner {
				document,
				range,
				spanned: RefCell::new(None),
			}),
		}
	}

	/// A cursor spanning all current child nodes of `parent`.
	///
	/// # Errors
	///
	/// Iff `parent` can't contain child nodes.
	pub fn over_contents(document: Rc<D>, parent: &D::LiveNode) -> Result<Self, Error> {
		let range = document.range_over_contents(parent)?;
		Ok(Self::new(document, range))
	}

	/// A collapsed cursor after the current last child of `parent`.
	///
	/// # Errors
	///
	/// Iff `parent` can't contain child nodes.
	pub fn at_end_of(document: Rc<D>, parent: &D::LiveNode) -> Result<Self, Error> {
		let range = document.range_at_end(parent)?;
		Ok(Self::new(document, range))
	}

	/// A new collapsed cursor immediately after this one's span.
	///
	/// # Errors
	///
	/// [`Error::StaleCursor`] iff this cursor no longer surrounds the node it was placed around.
	pub fn after(&self) -> Result<Self, Error> {
		self.check_fresh()?;
		let range = self.inner.document.range_at_end_of(&self.inner.range)?;
		Ok(Self::new(self.inner.document.clone(), range))
	}

	/// A new collapsed cursor after the last child of the node this cursor surrounds.
	///
	/// # Errors
	///
	/// [`Error::StaleCursor`] iff this cursor doesn't currently surround a node.
	pub fn inside_end(&self) -> Result<Self, Error> {
		self.check_fresh()?;
		let spanned = self.inner.spanned.borrow().clone().ok_or(Error::StaleCursor)?;
		Self::at_end_of(self.inner.document.clone(), &spanned)
	}

	#[must_use]
	pub fn document(&self) -> &Rc<D> {
		&self.inner.document
	}

	#[must_use]
	pub fn range(&self) -> &D::Range {
		&self.inner.range
	}

	/// The node this cursor was last placed around.
	#[must_use]
	pub fn spanned(&self) -> Option<D::LiveNode> {
		self.inner.spanned.borrow().clone()
	}

	/// Whether this cursor was placed around a node that it doesn't surround anymore.
	#[must_use]
	pub fn is_stale(&self) -> bool {
		match &*self.inner.spanned.borrow() {
			Some(node) => !self.inner.document.surrounds(&self.inner.range, node),
			None => false,
		}
	}

	/// Whether `self` and `other` share their span.
	#[must_use]
	pub fn ptr_eq(&self, other: &Self) -> bool {
		Rc::ptr_eq(&self.inner, &other.inner)
	}

	fn check_fresh(&self) -> Result<(), Error> {
		if self.is_stale() {
			error!("Stale cursor: {:?}", self);
			Err(Error::StaleCursor)
		} else {
			Ok(())
		}
	}

	/// Removes all live content currently inside the span.
	///
	/// # Errors
	///
	/// [`Error::StaleCursor`] iff this cursor no longer surrounds the node it was placed around.
	pub fn delete_spanned(&self) -> Result<(), Error> {
		self.check_fresh()?;
		self.inner.document.delete_contents(&self.inner.range)?;
		*self.inner.spanned.borrow_mut() = None;
		Ok(())
	}

	/// Inserts `node` at the start of the span, deletes the previously spanned content
	/// and then repositions the span to surround exactly `node`.
	///
	/// `node` is inserted before anything is deleted, so it's never removed along with the old content.
	///
	/// # Errors
	///
	/// [`Error::StaleCursor`] iff this cursor no longer surrounds the node it was placed around.
	pub fn insert_at_start(&self, node: &D::LiveNode) -> Result<(), Error> {
		self.check_fresh()?;
		let document = &self.inner.document;
		let range = &self.inner.range;
		document.insert_node(range, node)?;
		document.set_start_after(range, node)?;
		document.delete_contents(range)?;
		document.set_start_before(range, node)?;
		document.set_end_after(range, node)?;
		trace!("Placed {:?}.", node);
		*self.inner.spanned.borrow_mut() = Some(node.clone());
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::Cursor;
	use crate::{memory::MemoryDocument, Document, Error};
	use std::rc::Rc;

	#[test]
	fn insert_at_start_replaces_the_span() {
		let document = Rc::new(MemoryDocument::new());
		let body = document.body();
		let old = document.create_text_node("old");
		document.append_child(body, old).unwrap();

		let cursor = Cursor::over_contents(document.clone(), &body).unwrap();
		let new = document.create_element("p").unwrap();
		cursor.insert_at_start(&new).unwrap();

		assert_eq!(document.child_nodes(body), [new]);
		assert_eq!(document.parent(old), None);
		assert_eq!(cursor.spanned(), Some(new));
		assert!(!cursor.is_stale());
	}

	#[test]
	fn after_is_a_new_span() {
		let document = Rc::new(MemoryDocument::new());
		let body = document.body();

		let first = Cursor::at_end_of(document.clone(), &body).unwrap();
		let a = document.create_text_node("a");
		first.insert_at_start(&a).unwrap();

		let second = first.after().unwrap();
		assert!(!second.ptr_eq(&first));
		let b = document.create_text_node("b");
		second.insert_at_start(&b).unwrap();

		assert_eq!(document.inner_html(body), "ab");
		assert_eq!(first.spanned(), Some(a));
		assert!(!first.is_stale());
		assert!(!second.is_stale());
	}

	#[test]
	fn inside_end_needs_a_spanned_node() {
		let document = Rc::new(MemoryDocument::new());
		let body = document.body();
		let cursor = Cursor::at_end_of(document.clone(), &body).unwrap();
		assert_eq!(cursor.inside_end().unwrap_err(), Error::StaleCursor);

		let ul = document.create_element("ul").unwrap();
		cursor.insert_at_start(&ul).unwrap();
		let li = document.create_element("li").unwrap();
		cursor.inside_end().unwrap().insert_at_start(&li).unwrap();
		assert_eq!(document.inner_html(body), "<ul><li></li></ul>");
	}

	#[test]
	fn removed_content_makes_cursors_stale() {
		let document = Rc::new(MemoryDocument::new());
		let body = document.body();
		let cursor = Cursor::at_end_of(document.clone(), &body).unwrap();
		let p = document.create_element("p").unwrap();
		cursor.insert_at_start(&p).unwrap();

		Cursor::over_contents(document.clone(), &body).unwrap().delete_spanned().unwrap();

		assert!(cursor.is_stale());
		assert_eq!(cursor.after().unwrap_err(), Error::StaleCursor);
		let q = document.create_element("q").unwrap();
		assert_eq!(cursor.insert_at_start(&q), Err(Error::StaleCursor));
		assert_eq!(document.inner_html(body), "");
	}
}
