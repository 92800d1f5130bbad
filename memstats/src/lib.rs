//! memstats - process runtime statistics as metric instruments
//!
//! Samples memory, allocator and scheduler statistics of the current
//! process at most once per configured interval, caches the sample, and
//! republishes it through a [`Reporter`] on every observation cycle.
//!
//! ```ignore
//! use memstats::{Label, MetricsReporter, Options};
//! use std::time::Duration;
//!
//! let handle = memstats::start(
//!     Options::new()
//!         .with_minimum_read_interval(Duration::from_secs(1))
//!         .with_labels([Label::new("app_name", "testapp")])
//!         .with_metric_prefix("test_app"),
//!     MetricsReporter,
//! )?;
//! ```

mod alloc;
mod config;
mod error;
mod instruments;
mod publisher;
mod reporter;
mod snapshot;
mod source;

pub use alloc::{AllocSnapshot, AllocStats, CountingAllocator, ALLOC_STATS};
pub use config::{Options, DEFAULT_MIN_READ_INTERVAL, DEFAULT_OBSERVE_INTERVAL};
pub use error::{Error, Result};
pub use publisher::{start, Handle, Publisher};
pub use reporter::{Descriptor, Fanout, Kind, Label, MetricsReporter, Reporter, Unit, Value, ValueType};
pub use snapshot::Snapshot;
pub use source::{ProcessStats, StatsSource};
