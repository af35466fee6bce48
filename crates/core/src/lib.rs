//! Garment generation orchestration: job registry, per-job workers, and
//! the subprocess boundary to the external pattern generator.
//!
//! Everything here is transport-free. The `api` crate adapts the
//! [`generator::GeneratorService`] facades onto HTTP; this crate owns the
//! domain logic and never touches a socket.

pub mod config;
pub mod error;
pub mod generator;
pub mod handoff;
pub mod job;
pub mod launcher;
pub mod subprocess;
pub mod tmpdir;
pub mod worker;
