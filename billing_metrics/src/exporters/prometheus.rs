use prometheus::proto::MetricFamily;
use prometheus::{Encoder, TextEncoder};

pub struct PrometheusExporter;

impl PrometheusExporter {
    /// Renders families in the text exposition format. Returns the body
    /// and the matching content type.
    pub fn encode(mut families: Vec<MetricFamily>) -> prometheus::Result<(Vec<u8>, String)> {
        families.sort_by(|left, right| left.get_name().cmp(right.get_name()));

        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&families, &mut buffer)?;

        Ok((buffer, encoder.format_type().to_string()))
    }
}
