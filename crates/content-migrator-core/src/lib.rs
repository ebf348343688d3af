//! # Content Migrator Core
//!
//! Shared, WASM-safe logic for Content Migrator: record models, the
//! conversion pipeline, the store abstraction, and an in-memory store.
//!
//! This crate contains no tokio, sqlx, filesystem I/O, or other
//! native-only dependencies.
//!
//! ## Pipeline
//!
//! | Phase | Module |
//! |-------|--------|
//! | Resolve share targets | [`routing`] |
//! | Eligibility filter | [`filter`] |
//! | Create content | [`materialize`] |
//! | Requery, restore owners, share | [`restore`] |
//! | Delete sources | [`cleanup`] |
//! | Collect results | [`results`] |
//!
//! [`pipeline::ConversionPipeline`] runs the phases in order for one chunk.

pub mod capability;
pub mod cleanup;
pub mod filter;
pub mod materialize;
pub mod models;
pub mod options;
pub mod pipeline;
pub mod restore;
pub mod results;
pub mod routing;
pub mod store;
pub mod strategy;
