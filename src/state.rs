use serde_json::{Map, Value};
use tracing::trace;

/// Merges `patch` into `state` the way [`Composite::set_state`](`crate::Composite::set_state`) does.
///
/// - Absent or non-object state is replaced by `patch` wholesale.
/// - Otherwise, each key of `patch` overwrites the existing value unless that value is an object, in which case it's merged recursively.
///
/// Arrays count as plain values and are overwritten rather than merged element-wise.
/// A non-object patch for an existing object leaves that object unchanged.
pub fn merge_state(state: &mut Option<Value>, patch: Value) {
	match state {
		Some(Value::Object(current)) => merge_object(current, patch),
		_ => *state = Some(patch),
	}
}

fn merge_object(current: &mut Map<String, Value>, patch: Value) {
	let patch = match patch {
		Value::Object(patch) => patch,
		_ => return trace!("Non-object patch for object state. Nothing to merge."),
	};

	for (key, value) in patch {
		match current.get_mut(&key) {
			Some(Value::Object(nested)) => merge_object(nested, value),
			_ => {
				current.insert(key, value);
			}
		}
	}
}
