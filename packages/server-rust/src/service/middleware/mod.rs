//! Tower middleware layers for the dispatch pipeline.
//!
//! - [`instrument`]: dispatch spans, counters, and latency histogram
//! - [`pipeline`]: composes the layers around the dispatcher

pub mod instrument;
pub mod pipeline;

pub use instrument::{InstrumentLayer, InstrumentService};
pub use pipeline::{build_dispatch_pipeline, DispatchPipeline};
