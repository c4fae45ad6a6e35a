pub mod build_info;
pub mod catalog;
pub mod collector;
pub mod exporters;
pub mod selection;
pub mod source;

pub use build_info::{build_info, BuildInfo};
pub use catalog::{MetricDefinition, CATALOG};
pub use collector::BillingCollector;
pub use exporters::PrometheusExporter;
pub use selection::{MetricSelection, SelectionError};
pub use source::{DynMetricSource, MetricSource};
