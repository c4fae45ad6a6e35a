use crate::catalog::{self, MetricDefinition, CATALOG};
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectionError {
    #[error("invalid server metric field number: {0}")]
    InvalidField(String),

    #[error("unknown server metric field number: {0} (known: {})", catalog::field_list())]
    UnknownField(i64),
}

/// The catalog ids enabled for this process. Fixed after startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricSelection {
    ids: BTreeSet<u8>,
}

impl MetricSelection {
    pub fn all() -> Self {
        Self {
            ids: CATALOG.iter().map(|def| def.id).collect(),
        }
    }

    /// Parses a comma-separated list of field numbers. A blank filter
    /// enables every catalog metric.
    pub fn parse(filter: &str) -> Result<Self, SelectionError> {
        if filter.trim().is_empty() {
            return Ok(Self::all());
        }

        let mut ids = BTreeSet::new();
        for token in filter.split(',') {
            let token = token.trim();
            let field: i64 = token
                .parse()
                .map_err(|_| SelectionError::InvalidField(token.to_string()))?;

            let id = u8::try_from(field)
                .ok()
                .and_then(catalog::definition)
                .map(|def| def.id)
                .ok_or(SelectionError::UnknownField(field))?;
            ids.insert(id);
        }

        Ok(Self { ids })
    }

    /// Builds a selection without consulting the catalog. Ids with no
    /// catalog entry are carried along and resolve to nothing at scrape time.
    pub fn from_ids(ids: impl IntoIterator<Item = u8>) -> Self {
        Self {
            ids: ids.into_iter().collect(),
        }
    }

    pub fn ids(&self) -> impl Iterator<Item = u8> + '_ {
        self.ids.iter().copied()
    }

    pub fn definitions(&self) -> impl Iterator<Item = &'static MetricDefinition> + '_ {
        self.ids.iter().filter_map(|id| catalog::definition(*id))
    }

    /// Cost Explorer metric names for the selected ids.
    pub fn aws_names(&self) -> Vec<String> {
        self.definitions()
            .map(|def| def.aws_name.to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl Default for MetricSelection {
    fn default() -> Self {
        Self::all()
    }
}

impl fmt::Display for MetricSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids = self
            .ids
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>();
        write!(f, "{}", ids.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_filter_selects_everything() {
        for filter in ["", "   "] {
            let selection = MetricSelection::parse(filter).unwrap();
            assert_eq!(selection.len(), 7);
            assert_eq!(
                selection.aws_names(),
                vec![
                    "AmortizedCost",
                    "BlendedCost",
                    "NetAmortizedCost",
                    "NetUnblendedCost",
                    "NormalizedUsageAmount",
                    "UnblendedCost",
                    "UsageQuantity",
                ]
            );
        }
    }

    #[test]
    fn test_parse_subset() {
        let selection = MetricSelection::parse("7, 2,2").unwrap();
        assert_eq!(selection.ids().collect::<Vec<_>>(), vec![2, 7]);
        assert_eq!(selection.aws_names(), vec!["BlendedCost", "UsageQuantity"]);
        assert_eq!(selection.to_string(), "2,7");
    }

    #[test]
    fn test_non_numeric_token_fails() {
        for filter in ["1,two", "abc", "1,,2", "1.5"] {
            let err = MetricSelection::parse(filter).unwrap_err();
            assert!(matches!(err, SelectionError::InvalidField(_)), "{}", filter);
        }

        let err = MetricSelection::parse("1,x").unwrap_err();
        assert_eq!(err.to_string(), "invalid server metric field number: x");
    }

    #[test]
    fn test_out_of_catalog_field_fails() {
        assert_eq!(
            MetricSelection::parse("1,9").unwrap_err(),
            SelectionError::UnknownField(9)
        );
        assert_eq!(
            MetricSelection::parse("-1").unwrap_err(),
            SelectionError::UnknownField(-1)
        );
        assert_eq!(
            MetricSelection::parse("0").unwrap_err(),
            SelectionError::UnknownField(0)
        );
    }

    #[test]
    fn test_unvalidated_ids_resolve_to_nothing() {
        let selection = MetricSelection::from_ids([2, 42]);
        assert_eq!(selection.len(), 2);
        assert_eq!(selection.aws_names(), vec!["BlendedCost"]);
        assert_eq!(selection.definitions().count(), 1);
    }
}
