//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// Reference data owned by other contexts (places, employees, users) is
/// modelled as plain entities; aggregates build on `AggregateRoot` instead.
pub trait Entity {
    /// Entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}
