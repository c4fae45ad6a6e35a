use crate::catalog::NAMESPACE;
use prometheus::{GaugeVec, Opts};

const UNKNOWN: &str = "unknown";

/// Labels of `aws_billing_exporter_build_info`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildInfo {
    pub version: String,
    pub revision: String,
    pub branch: String,
}

impl BuildInfo {
    /// Revision and branch come from `AWS_BILLING_EXPORTER_REVISION` and
    /// `AWS_BILLING_EXPORTER_BRANCH` at compile time.
    pub fn current(version: &str) -> Self {
        Self {
            version: version.to_string(),
            revision: option_env!("AWS_BILLING_EXPORTER_REVISION")
                .unwrap_or(UNKNOWN)
                .to_string(),
            branch: option_env!("AWS_BILLING_EXPORTER_BRANCH")
                .unwrap_or(UNKNOWN)
                .to_string(),
        }
    }
}

/// `aws_billing_exporter_build_info{version="...",revision="...",branch="..."} 1`
pub fn build_info(info: &BuildInfo) -> prometheus::Result<GaugeVec> {
    let gauge = GaugeVec::new(
        Opts::new(
            "exporter_build_info",
            "A metric with a constant '1' value labeled by version, revision and branch from which aws_billing_exporter was built.",
        )
        .namespace(NAMESPACE),
        &["version", "revision", "branch"],
    )?;
    gauge
        .with_label_values(&[&info.version, &info.revision, &info.branch])
        .set(1.0);
    Ok(gauge)
}
