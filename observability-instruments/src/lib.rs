//! Point-in-time instruments and the collection protocol that merges them.
//!
//! An [`Instrument`] reads its internal state and writes zero or more
//! [`Record`](observability_primitives::Record)s into a [`Collector`]. The
//! [`AggregatingInstrument`] walks a set of named instruments and folds their
//! output into one snapshot record, and [`MetricsEndpoint`] exposes the
//! snapshot queries consumed by an HTTP layer.

#![warn(missing_docs, clippy::pedantic)]

mod aggregate;
mod endpoint;
mod error;
mod instrument;
mod registry;
mod requests;
mod resources;
mod system;
mod topics;

pub use aggregate::AggregatingInstrument;
pub use endpoint::MetricsEndpoint;
pub use error::{InstrumentError, InstrumentResult};
pub use instrument::{Collector, Instrument, JsonLinesCollector, ListCollector, TracingCollector};
pub use registry::InstrumentRegistry;
pub use requests::RequestCounter;
pub use resources::{
    FunctionInventory, QueueInventory, QueueState, QueueStatistics, ServiceMetrics,
};
pub use system::SystemMetrics;
pub use topics::TopicStatistics;
