//! Domain model for stored pens.
//!
//! # Responsibility
//! - Define canonical data structures persisted by the pen store.
//! - Keep the typed schema and the open property map in one record.
//!
//! # Invariants
//! - A pen is identified by its position in the collection.
//! - Pens are appended only; never reordered or removed.

pub mod pen;
