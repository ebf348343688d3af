//! # Content Migrator
//!
//! **Bulk-migrates legacy notes and attachments into managed content.**
//!
//! Each legacy record becomes a content item that keeps the original
//! owner, records where it came from, and is shared back with the entity
//! the record belonged to, as far as the sharing rules allow.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌───────────────────┐
//! │   Legacy    │──▶│ Batch driver │──▶│ Conversion        │
//! │ notes/files │   │ chunks of N  │   │ pipeline (core)   │
//! └─────────────┘   └──────┬───────┘   └─────────┬─────────┘
//!                          │                     │
//!                          ▼                     ▼
//!                 ┌────────────────┐    ┌─────────────────┐
//!                 │ conversion log │    │ content + links │
//!                 │  + notifier    │    │    (SQLite)     │
//!                 └────────────────┘    └─────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! cmig init                       # create database
//! cmig import legacy.json         # load legacy records
//! cmig convert all --dry-run      # count the working set
//! cmig convert attachments --delete-source
//! cmig log --failed               # inspect failures
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`db`] | SQLite connection pool with WAL mode |
//! | [`migrate`] | Database schema migrations (idempotent) |
//! | [`sqlite_store`] | SQLite implementation of the core `Store` trait |
//! | [`import`] | JSON import of legacy records |
//! | [`batch`] | Chunked batch driver around the conversion pipeline |
//! | [`conversion_log`] | Persistent per-record results |
//! | [`notify`] | Result notifications (summary log, webhook) |
//! | [`progress`] | Progress reporting on stderr |

pub mod batch;
pub mod config;
pub mod conversion_log;
pub mod db;
pub mod import;
pub mod migrate;
pub mod notify;
pub mod progress;
pub mod sqlite_store;

pub use content_migrator_core::store;
