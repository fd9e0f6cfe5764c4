//! Concrete clocks and in-memory collaborators.

pub mod clock;
pub mod in_memory;
