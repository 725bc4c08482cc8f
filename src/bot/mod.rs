//! Discord bot layer
//!
//! Turns newly observed releases into channel announcements on a fixed
//! schedule.
//!
//! # Modules
//!
//! - [`discord`]: Minimal Discord REST client and message payload types
//! - [`error`]: Delivery error type
//! - [`notifier`]: Announcement formatting and the `ChatChannel` trait
//! - [`poll`]: One poll cycle (fetch, diff against cache, announce, persist)
//! - [`scheduler`]: Fixed-interval loop with graceful shutdown
//! - [`server`]: Startup sequence and lifecycle

pub mod discord;
pub mod error;
pub mod notifier;
pub mod poll;
pub mod scheduler;
pub mod server;
