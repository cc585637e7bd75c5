//! Core conversation types.

pub mod message;

pub use message::{ContentPart, Message, Role};
