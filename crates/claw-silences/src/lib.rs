//! Durable Alertmanager-style silences for Clawbernetes.
//!
//! `claw-silences` stores silences (time-bounded rules that suppress
//! notifications for alerts whose labels match a filter) and answers the
//! hot-path question "is this label set muted right now?".
//!
//! # Features
//!
//! - **Matchers**: Equality and anchored-regex conditions over label names
//! - **Durable Store**: SQLite-backed, transactional create/get/delete/list
//! - **Fail-Open Muting**: A degraded store never suppresses an alert
//! - **Expiry Sweep**: Background purge of silences whose window has ended
//!
//! # Example
//!
//! ```rust
//! use claw_silences::{Matcher, MuteEvaluator, NewSilence, SilenceStore};
//! use chrono::{Duration, Utc};
//! use std::collections::HashMap;
//!
//! let store = SilenceStore::open_in_memory().unwrap();
//!
//! let now = Utc::now();
//! let silence = NewSilence::builder(now, now + Duration::hours(4))
//!     .matcher(Matcher::equal("alertname", "HighCPU").unwrap())
//!     .matcher(Matcher::regex("node", "gpu-.*").unwrap())
//!     .created_by("admin")
//!     .comment("Maintenance window")
//!     .build()
//!     .unwrap();
//! let id = store.create(&silence).unwrap();
//!
//! let evaluator = MuteEvaluator::from_store(store.clone());
//!
//! let mut labels = HashMap::new();
//! labels.insert("alertname".to_string(), "HighCPU".to_string());
//! labels.insert("node".to_string(), "gpu-07".to_string());
//! assert!(evaluator.is_muted(&labels, now));
//!
//! store.delete(id).unwrap();
//! assert!(!evaluator.is_muted(&labels, now));
//! ```
//!
//! # Expiry
//!
//! Silences stop muting at `ends_at` whether or not they are deleted. To
//! reclaim the rows, run an [`ExpirySweeper`]:
//!
//! ```rust,ignore
//! use claw_silences::{ExpirySweeper, SilenceStore, SilenceStoreConfig};
//!
//! let config = SilenceStoreConfig::from_file("silences.toml")?;
//! let store = SilenceStore::open(&config)?;
//! let handle = ExpirySweeper::from_config(store.clone(), &config.sweeper)?
//!     .map(ExpirySweeper::spawn);
//! ```

#![forbid(unsafe_code)]
#![doc(html_root_url = "https://docs.rs/claw-silences/0.1.0")]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod codec;
pub mod config;
pub mod error;
pub mod matcher;
pub mod mute;
pub mod store;
pub mod sweeper;
pub mod types;

// Re-export main types at crate root
pub use config::{SilenceStoreConfig, SweeperConfig};
pub use error::{Result, SilenceError};
pub use matcher::{LabelSet, Matcher, matches_all};
pub use mute::{MuteEvaluator, SilenceSource};
pub use store::SilenceStore;
pub use sweeper::{ExpirySweeper, SweeperHandle};
pub use types::{NewSilence, NewSilenceBuilder, Silence, SilenceId, SilenceState};
