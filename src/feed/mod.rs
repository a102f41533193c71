//! Decoders for agency static-data feeds.
//!
//! Everything in here is a pure transform: bytes or files in, entity slices
//! out. Persistence is the caller's job.

pub mod gtfs;
pub mod siri;
