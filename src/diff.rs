//! Reconciliation of an old v-tree against a new one.

use crate::{redact, Cursor, Document, Error, Renderable, VNode};
use tracing::{error, instrument, trace, trace_span, warn};

/// Whether `new` can take over `old`'s live content without being rebuilt.
///
/// That is the case iff both are the same kind of node (same tag, or both text), `new` has at least as many attributes as `old`,
/// every attribute of `new` equals that of `old` and, for text, the content is identical.
///
/// Attributes present only in `old` are not looked at individually.
#[must_use]
pub fn same_node<D: Document>(old: &VNode<D>, new: &VNode<D>) -> bool {
	match (old, new) {
		(VNode::Text(old), VNode::Text(new)) => old.content == new.content,
		(VNode::Element(old), VNode::Element(new)) => {
			old.tag == new.tag
				&& new.attributes.iter().all(|(name, value)| old.attributes.get(name) == Some(value))
				&& old.attributes.len() <= new.attributes.len()
		}
		_ => false,
	}
}

/// Brings the live content of `old` in line with `new`.
///
/// Positionally matching nodes that pass [`same_node`] are kept, and `new` takes over their spans.
/// Any other node is materialized from scratch at the span of the node it replaces.
/// Surplus new children are appended after the last old child.
///
/// Surplus old children are currently left in place.
///
/// # Errors
///
/// - [`Error::StaleCursor`] iff an old node hasn't been materialized or its span was invalidated.
/// - Materialization errors, see [`Renderable`].
#[instrument(skip(old, new), fields(old = old.kind(), new = new.kind()))]
pub fn reconcile<D: Document>(old: &VNode<D>, new: &VNode<D>) -> Result<(), Error> {
	reconcile_node(old, new)
}

fn reconcile_node<D: Document>(old: &VNode<D>, new: &VNode<D>) -> Result<(), Error> {
	let current = old.current();
	if !current.ptr_eq(old) {
		trace!("Using the owning composite's more recent v-tree.");
	}
	let old = &current;

	let span = old.span().ok_or_else(|| {
		error!("Tried to reconcile {:?}, which was never materialized.", old.kind());
		Error::StaleCursor
	})?;

	if old.is_diverged() {
		let tracing_span = trace_span!("Rebuilding after a failed update", old = old.kind(), new = new.kind());
		let _enter = tracing_span.enter();
		return new.render_to_live_tree(span);
	}

	if !same_node(old, new) {
		let tracing_span = trace_span!("Replacing mismatching", old = old.kind(), new = new.kind());
		let _enter = tracing_span.enter();
		return new.render_to_live_tree(span);
	}

	if span.is_stale() {
		error!("Span of {:?} was invalidated by another operation.", old.kind());
		return Err(Error::StaleCursor);
	}
	new.set_span(span.clone());

	if let VNode::Text(text) = new {
		trace!("Kept text {:?}.", redact(&text.content));
		return Ok(());
	}

	let tracing_span = trace_span!("Diffing children", tag = new.kind(), "old.len()" = old.children().len(), "new.len()" = new.children().len());
	let _enter = tracing_span.enter();

	let old_children = old.children();
	let mut tail: Option<Cursor<D>> = None;
	for (i, new_child) in new.children().iter().enumerate() {
		if let Some(old_child) = old_children.get(i) {
			reconcile_node(old_child, new_child)?;
			continue;
		}

		let previous = match tail.take() {
			Some(previous) => previous.after()?,
			None => match old_children.last() {
				Some(last) => last.span().ok_or(Error::StaleCursor)?.after()?,
				None => span.inside_end()?,
			},
		};
		trace!("Appending child {}.", i);
		new_child.render_to_live_tree(previous.clone())?;
		tail = Some(previous);
	}

	if old_children.len() > new.children().len() {
		warn!(
			"{} old child node(s) of <{}> are left in place. Removal of surplus children isn't supported.",
			old_children.len() - new.children().len(),
			new.kind()
		);
	}

	Ok(())
}
