//! The signature catalogue: an interleaved imprint index over the `tree`
//! crate's canonical trees (component D), the generator that exhaustively
//! enumerates them (E), the two rewrite-table compilers (F, G), the
//! depreciation engine (H), and the container format and I/O context that
//! tie a build together.

pub mod container;
pub mod depreciate;
pub mod error;
pub mod generator;
pub mod imprint;
pub mod interleave;
pub mod io_context;
pub mod lookup;
pub mod member;
pub mod pair;
pub mod pattern;
pub mod rewrite_dfa;
pub mod signature;
pub mod versioned_index;

pub use error::{Error, Result};
pub use io_context::IoContext;
