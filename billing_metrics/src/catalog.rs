//! Fixed catalog of the Cost Explorer metrics this exporter knows about.

pub const NAMESPACE: &str = "aws_billing";
pub const SUBSYSTEM: &str = "server";

/// Variable labels carried by every catalog metric.
pub const LABEL_NAMES: [&str; 2] = ["type", "unit"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricDefinition {
    pub id: u8,
    /// Exposed as `aws_billing_server_<name>`.
    pub name: &'static str,
    /// Name in the Cost Explorer vocabulary, sent verbatim.
    pub aws_name: &'static str,
    pub help: &'static str,
}

pub const CATALOG: [MetricDefinition; 7] = [
    MetricDefinition {
        id: 1,
        name: "amortized_cost",
        aws_name: "AmortizedCost",
        help: "This cost metric reflects the effective cost of the upfront and monthly reservation fees spread across the billing period.",
    },
    MetricDefinition {
        id: 2,
        name: "blended_cost",
        aws_name: "BlendedCost",
        help: "This cost metric reflects the average cost of usage across the consolidated billing family.",
    },
    MetricDefinition {
        id: 3,
        name: "net_amortized_cost",
        aws_name: "NetAmortizedCost",
        help: "This cost metric amortizes the upfront and monthly reservation fees while including discounts such as RI volume discounts.",
    },
    MetricDefinition {
        id: 4,
        name: "net_unblended_cost",
        aws_name: "NetUnblendedCost",
        help: "This cost metric reflects the cost after discounts.",
    },
    MetricDefinition {
        id: 5,
        name: "normalized_usage_amount",
        aws_name: "NormalizedUsageAmount",
        help: "Cost of amount of resource consumption like CPU.",
    },
    MetricDefinition {
        id: 6,
        name: "unblended_cost",
        aws_name: "UnblendedCost",
        help: "Unblended costs separate discounts into their own line items. This enables you to view the amount of each discount received.",
    },
    MetricDefinition {
        id: 7,
        name: "usage_quantity",
        aws_name: "UsageQuantity",
        help: "Usage of quantity like data in GB.",
    },
];

pub fn definition(id: u8) -> Option<&'static MetricDefinition> {
    CATALOG.iter().find(|def| def.id == id)
}

pub fn aws_name(id: u8) -> Option<&'static str> {
    definition(id).map(|def| def.aws_name)
}

pub fn fq_name(def: &MetricDefinition) -> String {
    format!("{}_{}_{}", NAMESPACE, SUBSYSTEM, def.name)
}

/// Every catalog id, comma separated.
pub fn field_list() -> String {
    CATALOG
        .iter()
        .map(|def| def.id.to_string())
        .collect::<Vec<_>>()
        .join(",")
}
