//! Collaborator seams.
//!
//! The core owns no sockets or files. The inference engine and the
//! persistence layer are reached through these traits.

pub mod engine;
pub mod sink;
