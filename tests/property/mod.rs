//! Property-based tests using proptest
//!
//! These verify invariants that must hold for arbitrary signal sequences
//! and queue contents.

pub mod queue_proptest;
pub mod status_proptest;
