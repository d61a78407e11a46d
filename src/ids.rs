//! Typed arena handles.
//!
//! Every arena in the crate (tree nodes, schema documents, components,
//! particles, model groups) is addressed through one of these IDs instead
//! of references, so side tables can be keyed by value.

use std::num::NonZeroU32;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(NonZeroU32);

        impl $name {
            /// Create from a raw index (1-based).
            #[must_use]
            pub const fn from_raw(raw: u32) -> Option<Self> {
                match NonZeroU32::new(raw) {
                    Some(n) => Some(Self(n)),
                    None => None,
                }
            }

            /// Create from a 0-based index.
            #[must_use]
            pub fn from_index(index: usize) -> Option<Self> {
                let raw = u32::try_from(index.checked_add(1)?).ok()?;
                Self::from_raw(raw)
            }

            /// Get the raw value (1-based).
            #[must_use]
            pub const fn to_raw(self) -> u32 {
                self.0.get()
            }

            /// Get the 0-based index.
            #[must_use]
            pub const fn to_index(self) -> usize {
                (self.0.get() - 1) as usize
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}#{}", stringify!($name), self.0)
            }
        }
    };
}

define_id!(
    /// Element node within one schema tree.
    NodeId
);

define_id!(
    /// Schema document loaded in the current session.
    DocumentId
);

define_id!(
    /// Schema component (declaration or definition).
    ComponentId
);

define_id!(
    /// Particle within a content model.
    ParticleId
);

define_id!(
    /// Model group (sequence, choice, all).
    ModelGroupId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_round_trip() {
        let id = NodeId::from_index(0).unwrap();
        assert_eq!(id.to_raw(), 1);
        assert_eq!(id.to_index(), 0);
        assert!(DocumentId::from_raw(0).is_none());
        assert_eq!(ComponentId::from_index(41).unwrap().to_index(), 41);
    }

    #[test]
    fn display_names_the_arena() {
        let id = ParticleId::from_raw(3).unwrap();
        assert_eq!(id.to_string(), "ParticleId#3");
    }
}
