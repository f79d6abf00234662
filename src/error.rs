use thiserror::Error;

/// Everything that can go wrong while materializing or reconciling.
///
/// None of these are transient. Each one indicates either a contract violation by a [`Component`](`crate::Component`)
/// or an adapter failure, so callers should surface them rather than retry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
	/// A [`Component::render`](`crate::Component::render`) produced something other than exactly one node.
	#[error("`{component}::render` must produce exactly one node, but produced {count}")]
	InvalidRenderResult { component: &'static str, count: usize },

	/// A cursor was used after the content it spanned was moved or removed by another operation.
	#[error("Tried to use a cursor whose span was consumed by another operation")]
	StaleCursor,

	/// The mount target couldn't be found in the live document.
	#[error("Mount container not found: {0}")]
	MissingContainer(String),

	/// A composite's state was changed while it was rendering or being reconciled.
	#[error("Tried to update a composite while it was already rendering or reconciling")]
	ReentrantUpdate,

	/// Composite nodes rendered other composites more deeply than allowed.
	#[error("Render depth limit ({0}) reached")]
	DepthLimit(usize),

	/// The live document rejected an operation.
	#[error("Document operation `{operation}` failed: {message}")]
	Dom { operation: &'static str, message: String },
}

impl Error {
	pub(crate) fn dom(operation: &'static str, message: impl Into<String>) -> Self {
		Self::Dom {
			operation,
			message: message.into(),
		}
	}
}
