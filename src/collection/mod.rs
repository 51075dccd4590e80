//! Ordered, key-indexed collections of models.
//!
//! Positions and the key index are kept in lockstep: every insertion,
//! removal, move and member key change rebuilds the index from the
//! members' current keys.

mod index;
mod set;

pub use set::Collection;
