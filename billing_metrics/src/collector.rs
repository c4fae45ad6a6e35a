use crate::catalog::{MetricDefinition, LABEL_NAMES, NAMESPACE, SUBSYSTEM};
use crate::selection::MetricSelection;
use crate::source::MetricSource;
use async_trait::async_trait;
use billing_core::{CostReport, DynCostSource};
use prometheus::core::{Collector, Desc};
use prometheus::proto::MetricFamily;
use prometheus::{Gauge, GaugeVec, IntCounter, Opts};
use tokio::sync::RwLock;
use tracing::{debug, error, warn};

/// Exposes one day of AWS costs, fetched fresh on every scrape.
pub struct BillingCollector {
    selection: MetricSelection,
    requested: Vec<String>,
    source: DynCostSource,
    server_metrics: Vec<(&'static MetricDefinition, GaugeVec)>,
    up: Gauge,
    total_scrapes: IntCounter,
    // Held for writing across a whole scrape so scrapes run one at a time.
    scrape_lock: RwLock<()>,
}

impl BillingCollector {
    pub fn new(selection: MetricSelection, source: DynCostSource) -> prometheus::Result<Self> {
        let server_metrics = selection
            .definitions()
            .map(|def| {
                let opts = Opts::new(def.name, def.help)
                    .namespace(NAMESPACE)
                    .subsystem(SUBSYSTEM);
                GaugeVec::new(opts, &LABEL_NAMES).map(|gauge| (def, gauge))
            })
            .collect::<prometheus::Result<Vec<_>>>()?;

        let up = Gauge::with_opts(
            Opts::new("up", "Was the last scrape of aws billing successful.")
                .namespace(NAMESPACE),
        )?;
        let total_scrapes = IntCounter::with_opts(
            Opts::new(
                "exporter_total_scrapes",
                "Current total aws cost and usage API scrapes.",
            )
            .namespace(NAMESPACE),
        )?;

        Ok(Self {
            requested: selection.aws_names(),
            selection,
            source,
            server_metrics,
            up,
            total_scrapes,
            scrape_lock: RwLock::new(()),
        })
    }

    pub fn selection(&self) -> &MetricSelection {
        &self.selection
    }

    pub fn total_scrapes(&self) -> u64 {
        self.total_scrapes.get()
    }

    pub fn is_up(&self) -> bool {
        self.up.get() >= 1.0
    }

    async fn scrape(&self) -> f64 {
        self.total_scrapes.inc();

        let report = match self.source.fetch(&self.requested).await {
            Ok(report) => report,
            Err(e) => {
                error!(source = self.source.name(), error = %e, "Can't scrape AWS Billing data");
                return 0.0;
            }
        };

        self.record(&report);
        1.0
    }

    fn record(&self, report: &CostReport) {
        let Some(bucket) = report.first_bucket() else {
            warn!("Cost Explorer answered without a result bucket");
            return;
        };

        for (def, gauge) in &self.server_metrics {
            let Some(item) = bucket.total.get(def.aws_name) else {
                continue;
            };

            match item.amount.parse::<f64>() {
                Ok(value) => gauge
                    .with_label_values(&[def.aws_name, item.unit.as_str()])
                    .set(value),
                Err(_) => debug!(
                    "Skipping {}: unparsable amount '{}'",
                    def.aws_name, item.amount
                ),
            }
        }
    }
}

#[async_trait]
impl MetricSource for BillingCollector {
    fn describe(&self) -> Vec<&Desc> {
        self.server_metrics
            .iter()
            .flat_map(|(_, gauge)| gauge.desc())
            .chain(self.up.desc())
            .chain(self.total_scrapes.desc())
            .collect()
    }

    async fn collect(&self) -> Vec<MetricFamily> {
        let _scrape = self.scrape_lock.write().await;

        for (_, gauge) in &self.server_metrics {
            gauge.reset();
        }

        let up = self.scrape().await;
        self.up.set(up);
        debug!(up, total = self.total_scrapes.get(), "Scrape finished");

        let mut families: Vec<MetricFamily> = self
            .server_metrics
            .iter()
            .flat_map(|(_, gauge)| gauge.collect())
            .filter(|family| !family.get_metric().is_empty())
            .collect();
        families.extend(self.up.collect());
        families.extend(self.total_scrapes.collect());
        families
    }
}
