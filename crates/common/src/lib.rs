//! Common utilities and types shared across Dark Tower session coordination components.

#![warn(clippy::pedantic)]

/// Module for cluster identifiers (rooms, peers, sessions, streams, nodes)
pub mod types;

/// Module for common configuration
pub mod config;

/// Module for secret types that prevent accidental logging
pub mod secret;
