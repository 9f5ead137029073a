//! Row structs matching the database tables.
//!
//! Each submodule contains a `FromRow` struct and its conversion into the
//! corresponding `genbroker_core` record.

pub mod artifact;
pub mod job;
pub mod reference;
