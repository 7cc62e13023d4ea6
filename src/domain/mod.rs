//! Domain Layer
//!
//! Core business entity definitions

pub mod message;
pub mod provider;

pub use message::*;
pub use provider::*;
