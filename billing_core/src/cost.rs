use crate::window::QueryWindow;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Granularity {
    Daily,
    Monthly,
    Hourly,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DateInterval {
    pub start: String,
    pub end: String,
}

impl From<QueryWindow> for DateInterval {
    fn from(window: QueryWindow) -> Self {
        Self {
            start: window.start_str(),
            end: window.end_str(),
        }
    }
}

/// Body of a `GetCostAndUsage` call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CostQuery {
    pub time_period: DateInterval,
    pub granularity: Granularity,
    pub metrics: Vec<String>,
}

impl CostQuery {
    pub fn daily(window: QueryWindow, metrics: &[String]) -> Self {
        Self {
            time_period: window.into(),
            granularity: Granularity::Daily,
            metrics: metrics.to_vec(),
        }
    }
}

/// One cost dimension as returned by Cost Explorer. The amount is kept
/// verbatim; parsing happens where the value is consumed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CostLineItem {
    #[serde(default)]
    pub amount: String,
    #[serde(default)]
    pub unit: String,
}

impl CostLineItem {
    pub fn new(amount: impl Into<String>, unit: impl Into<String>) -> Self {
        Self {
            amount: amount.into(),
            unit: unit.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResultByTime {
    #[serde(default)]
    pub time_period: Option<DateInterval>,
    #[serde(default)]
    pub total: BTreeMap<String, CostLineItem>,
    #[serde(default)]
    pub estimated: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CostReport {
    #[serde(default)]
    pub results_by_time: Vec<ResultByTime>,
}

impl CostReport {
    /// Builds a single-bucket report, mostly useful for fakes.
    pub fn single_bucket<I, K>(items: I) -> Self
    where
        I: IntoIterator<Item = (K, CostLineItem)>,
        K: Into<String>,
    {
        Self {
            results_by_time: vec![ResultByTime {
                time_period: None,
                total: items.into_iter().map(|(k, v)| (k.into(), v)).collect(),
                estimated: false,
            }],
        }
    }

    pub fn first_bucket(&self) -> Option<&ResultByTime> {
        self.results_by_time.first()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_query_serializes_to_cost_explorer_shape() {
        let window = QueryWindow::ending_on(NaiveDate::from_ymd_opt(2024, 5, 10).unwrap());
        let query = CostQuery::daily(window, &["BlendedCost".to_string()]);

        let value = serde_json::to_value(&query).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "TimePeriod": { "Start": "2024-05-09", "End": "2024-05-10" },
                "Granularity": "DAILY",
                "Metrics": ["BlendedCost"]
            })
        );
    }

    #[test]
    fn test_report_deserializes_cost_explorer_response() {
        let body = r#"
{
  "GroupDefinitions": [],
  "ResultsByTime": [
    {
      "TimePeriod": { "Start": "2024-05-09", "End": "2024-05-10" },
      "Total": {
        "BlendedCost": { "Amount": "12.34", "Unit": "USD" },
        "UsageQuantity": { "Amount": "871.2", "Unit": "N/A" }
      },
      "Groups": [],
      "Estimated": true
    }
  ],
  "DimensionValueAttributes": []
}
"#;

        let report: CostReport = serde_json::from_str(body).unwrap();
        let bucket = report.first_bucket().unwrap();
        assert!(bucket.estimated);
        assert_eq!(bucket.total.len(), 2);
        assert_eq!(bucket.total["BlendedCost"], CostLineItem::new("12.34", "USD"));
        assert_eq!(bucket.time_period.as_ref().unwrap().start, "2024-05-09");
    }

    #[test]
    fn test_empty_response_has_no_bucket() {
        let report: CostReport = serde_json::from_str("{}").unwrap();
        assert!(report.first_bucket().is_none());
    }
}
