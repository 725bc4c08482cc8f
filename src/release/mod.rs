//! Release tracking layer
//!
//! Fetches the releases of tracked projects from the supported platforms and
//! remembers which of them were already announced.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   Fetcher   │────▶│   Release   │────▶│    Cache    │
//! │   (fetch)   │     │ (normalized)│     │ (seen ids)  │
//! └─────────────┘     └─────────────┘     └─────────────┘
//!        │
//!        ▼
//! ┌──────────────────┐
//! │     Fetchers     │
//! │(modtale,cfwidget)│
//! └──────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`cache`]: JSON file cache of announced release ids with atomic saves
//! - [`fetcher`]: Fetcher trait for reading releases from a platform
//! - [`fetchers`]: Concrete fetchers (Modtale, CurseForge via cfwidget)
//! - [`error`]: Error types for cache and fetch operations
//! - [`types`]: Common types like `Project` and `Release`

pub mod cache;
pub mod error;
pub mod fetcher;
pub mod fetchers;
pub mod types;
