//! Type definitions for the RGA CRDT.
//!
//! This module contains all the fundamental types used throughout the RGA implementation,
//! organized into focused submodules for better maintainability.

pub mod client;
pub mod clock;
pub mod op_id;

// Re-export all public types for backward compatibility
pub use client::ClientId;
pub use clock::LamportClock;
pub use op_id::{HEAD, OpId};
