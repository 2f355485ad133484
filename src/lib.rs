//! # tsm
//!
//! Domain-scoped time series storage with:
//! - Replace-range writes applied in a single transaction
//! - Ordered range reads over byte-sortable timestamp keys
//! - Descriptive statistics over a whole series
//! - An embedded engine: nested buckets, write-ahead log, snapshots,
//!   single-writer/multi-reader transactions
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  SeriesStore (trait)                         │
//! │        write_data / read_data / describe / description       │
//! └──────────────┬──────────────────────────────┬───────────────┘
//!                │                              │
//!        ┌───────▼───────┐              ┌───────▼───────┐
//!        │    KvStore    │              │  MemoryStore  │
//!        │ (codec+stats) │              │  (test fake)  │
//!        └───────┬───────┘              └───────────────┘
//!                │ ReadTxn / WriteTxn
//! ┌──────────────▼──────────────────────────────────────────────┐
//! │                        Engine                                │
//! │            (Single Writer / Multi Reader)                    │
//! └──────────────┬──────────────────────────────┬───────────────┘
//!                │                              │
//!                ▼                              ▼
//!         ┌─────────────┐               ┌─────────────┐
//!         │     WAL     │               │ Bucket tree │
//!         │  (Append)   │               │ (persistent)│
//!         └─────────────┘               └──────┬──────┘
//!                                              │ checkpoint
//!                                              ▼
//!                                       ┌─────────────┐
//!                                       │  Snapshots  │
//!                                       └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod codec;
pub mod model;
pub mod stats;
pub mod id;

pub mod wal;
pub mod bucket;
pub mod storage;
pub mod txn;
pub mod engine;
pub mod store;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{TsmError, Result};
pub use config::{Config, WalSyncStrategy};
pub use engine::Engine;
pub use id::{IdGenerator, SequentialIds, UuidGenerator};
pub use model::{Attribute, Data, Description, Freq, Grid};
pub use store::{KvStore, MemoryStore, SeriesStore};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of tsm
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
