//! HTTP request handlers for the signaling API.

pub mod signaling;

pub use signaling::{answer, broadcast, join, leave, offer, trickle};
