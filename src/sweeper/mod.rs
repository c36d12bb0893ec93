//! History sweeper: static patterns, resolution against target roots, removal.

pub mod deletion;
pub mod patterns;
pub mod resolve;
pub mod sweep;
