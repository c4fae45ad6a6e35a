use async_trait::async_trait;
use prometheus::core::Desc;
use prometheus::proto::MetricFamily;
use std::sync::Arc;

/// A pluggable producer of metric families, scraped on demand.
#[async_trait]
pub trait MetricSource: Send + Sync {
    /// Every descriptor this source can ever emit. Side-effect free.
    fn describe(&self) -> Vec<&Desc>;

    /// Produce one snapshot. Called once per scrape request.
    async fn collect(&self) -> Vec<MetricFamily>;
}

pub type DynMetricSource = Arc<dyn MetricSource>;
