//! Duration-driven layout of a short: who speaks when, what is on screen
//! while they do, and where the 60 second cut falls.

pub mod budget;
pub mod builder;
pub mod compositor;
pub mod layer;
pub mod selector;
pub mod subtitle;

pub use builder::{Timeline, TimelineBuilder};
pub use compositor::{composite, Tracks};
