//! Game simulation modules

pub mod arena;
pub mod goal;
pub mod physics;
pub mod pitch;
pub mod registry;
pub mod room;
pub mod snapshot;

pub use arena::{Arena, ArenaError, ArenaHandle};
