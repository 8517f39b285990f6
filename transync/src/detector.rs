//! Change detection for field updates

use crate::value::{FieldValue, is_empty_or_absent};

/// Decide whether going from `old` to `new` is a material change.
///
/// An absent value, `null`, `""`, `[]` and `{}` are one single empty state:
/// moving between two empty representations is not a change, moving between
/// empty and non-empty always is. Non-empty values are compared through their
/// canonical serialization.
pub fn is_material_change(old: Option<&FieldValue>, new: Option<&FieldValue>) -> bool {
    let old_empty = is_empty_or_absent(old);
    let new_empty = is_empty_or_absent(new);

    match (old, new) {
        (Some(old), Some(new)) if !old_empty && !new_empty => old.canonical() != new.canonical(),
        _ => old_empty != new_empty,
    }
}
