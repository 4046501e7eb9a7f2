//! These models represent the values exchanged between callers and provider adapters
//!
//! Content is always carried as an ordered list of typed [`content::ContentBlock`]s.
//! Code paths that only understand plain text work with the lossy
//! [`message::Message`] projection instead.
pub mod content;
pub mod message;
pub mod role;
pub mod tool;
