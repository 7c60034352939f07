//! Canonical tree engine: the transform table (component A), the tiny tree
//! and its level-1/2 normalisation (component B), the deep structural
//! comparator, and dyadic cascade ordering (component C, level 3).
//!
//! Everything in this crate is tree-local: it never touches a signature
//! catalogue or an imprint index. The `catalogue` crate builds on top of it
//! to add semantic-equivalence lookups.

pub mod compare;
pub mod consts;
pub mod error;
pub mod node;
pub mod normalise;
pub mod transform;

pub use compare::{compare, compare_within};
pub use consts::{FOOTPRINT_WORDS, IBIT, KSTART, MAXSLOTS, NEND, NSTART, NUMNODES};
pub use error::{CapacityError, Error, ParseError, Result, TransformError};
pub use node::{seeded_lanes, Node, TinyTree};
pub use normalise::normalise_cascades;
pub use transform::{Perm, TransformTable};
