//! Multi-source water-quality data reconciliation engine.
//!
//! Two independent read paths:
//! - [`cascade::Cascade::aggregate`] assembles a best-effort parameter
//!   snapshot for a region from priority-ordered upstream providers.
//! - [`gauge_cache::GaugeCache::lookup`] answers coordinate queries against
//!   a spatially-indexed flood-gauge cache rebuilt out-of-band.

pub mod adapters;
pub mod blob;
pub mod cascade;
pub mod config;
pub mod error;
pub mod gauge_cache;
pub mod model;
pub mod params;
pub mod reference;
pub mod registry;
pub mod scheduler;
