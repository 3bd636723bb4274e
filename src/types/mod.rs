//! Core types for Chofesh.

pub mod message;
pub mod options;
pub mod stream;
pub mod usage;

pub use message::*;
pub use options::*;
pub use stream::*;
pub use usage::*;
