//! Learning-journey domain logic.
//!
//! Pure types and functions: the journey data model, the progression state
//! machine, scoring, final-test assembly, and the ports the persistence and
//! catalog adapters implement. Nothing in this crate performs I/O.

pub mod catalog;
pub mod error;
pub mod journey;
pub mod ports;
pub mod progression;
pub mod roles;
pub mod scoring;
pub mod types;
