//! Core traits for the synchronizer
//!
//! This module defines the seams between the engine and its collaborators.
//!
//! - [`MapSource`]: list outstanding allow-list proposals and acknowledge them
//! - [`CidrTarget`]: apply a desired CIDR set to one downstream resource

pub mod map_source;
pub mod target;

pub use map_source::{MapSource, MapSourceFactory};
pub use target::{ApplyOutcome, CidrTarget, TargetFactory};
