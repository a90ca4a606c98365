//! Stable, non-owning handles into the model's flat node tables.
//!
//! The containment tree (state -> region -> state) is expressed as owning
//! `Vec` storage inside [`crate::model::Model`]; everything that would be a
//! pointer or reference in a naively-ported object graph is instead one of
//! these newtype indices. This sidesteps the cyclic ownership (state <->
//! region <-> state) that a straightforward translation would otherwise hit.

use std::fmt;

macro_rules! index_id {
    ($name:ident) => {
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub(crate) u32);

        impl $name {
            #[inline]
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }
    };
}

index_id!(StateId);
index_id!(RegionId);
index_id!(TransitionId);
