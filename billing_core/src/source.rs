use crate::{cost::CostReport, error::Result};
use async_trait::async_trait;
use std::sync::Arc;

/// Anything that can answer a one-day cost query.
#[async_trait]
pub trait CostSource: Send + Sync {
    /// Query costs for the given AWS metric names. Exactly one upstream
    /// call per invocation; failures are returned unmodified.
    async fn fetch(&self, metrics: &[String]) -> Result<CostReport>;

    /// Get the name of this source
    fn name(&self) -> &str {
        "cost_source"
    }
}

pub type DynCostSource = Arc<dyn CostSource>;
