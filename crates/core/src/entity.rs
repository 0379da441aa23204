//! Entity traits: identity + continuity across state changes.

/// Entity marker + minimal interface.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}

/// An entity whose lifecycle is tracked by a status value.
///
/// Conditional writes compare against [`StatusEntity::revision`] (see
/// [`crate::Expected`]). For most entities that is just the status; entities
/// that can be rewritten without a status change also carry a version.
pub trait StatusEntity: Entity {
    type Revision: Copy + Eq + core::fmt::Debug;

    fn revision(&self) -> Self::Revision;
}
