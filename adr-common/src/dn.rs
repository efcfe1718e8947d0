//! Distinguished-name parsing.
//!
//! A DN is a comma-separated sequence of `attr=value` components, e.g.
//! `uuid=3ffc7b4c-66a6-11e3-af09-8752d24e4669, uuid=390c229a-8285-4457-8ff9-3371e0c02385, ou=users, o=smartdc`.
//! [`dn_value`] returns the value half of the component at a given position.

/// Returns the value at position `index` of a comma-separated DN, or `None`
/// if the DN is shorter than `index + 1` components or the component has no
/// `=`.
#[must_use]
pub fn dn_value(dn: &str, index: usize) -> Option<&str> {
    dn.split(',').nth(index).and_then(|component| {
        let trimmed = component.trim();
        trimmed.split_once('=').map(|(_, value)| value.trim())
    })
}
