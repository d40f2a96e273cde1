//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects have no identity and are immutable: two values with the same
/// attributes are the same value (`Money`, a receipt line). Entities, in
/// contrast, are compared by id (`Product`, `Customer`).
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
