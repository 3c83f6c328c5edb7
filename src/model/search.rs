use crate::model::{Asset, AssetType, ConnectorType, EntityStatus, Guid};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Largest window (`from + size`) the catalog will page into
pub const MAX_RESULT_WINDOW: usize = 10_000;

pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Search predicate. A request matches assets satisfying every filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchFilter {
    TypeName(AssetType),
    TypeNames(Vec<AssetType>),
    QualifiedName(String),
    QualifiedNamePrefix(String),
    Name(String),
    Status(EntityStatus),
    Connector(ConnectorType),
    Tag(String),
    OwnerGroup(String),
    /// Glossary-family assets anchored in the glossary with this guid
    Glossary(Guid),
    Not(Box<SearchFilter>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    Name,
    QualifiedName,
    CreatedAt,
    UpdatedAt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortItem {
    pub field: SortField,
    pub order: SortOrder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationField {
    TypeName,
    Status,
    Connector,
    OwnerGroup,
    Tag,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    Terms { field: AggregationField, size: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    #[serde(default)]
    pub filters: Vec<SearchFilter>,
    #[serde(default)]
    pub from: usize,
    #[serde(default = "default_page_size")]
    pub size: usize,
    #[serde(default)]
    pub sort: Vec<SortItem>,
    #[serde(default)]
    pub aggregations: BTreeMap<String, Aggregation>,
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

impl Default for SearchRequest {
    fn default() -> Self {
        Self {
            filters: Vec::new(),
            from: 0,
            size: DEFAULT_PAGE_SIZE,
            sort: Vec::new(),
            aggregations: BTreeMap::new(),
        }
    }
}

impl SearchRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: SearchFilter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn type_name(self, asset_type: AssetType) -> Self {
        self.filter(SearchFilter::TypeName(asset_type))
    }

    pub fn qualified_name_prefix(self, prefix: &str) -> Self {
        self.filter(SearchFilter::QualifiedNamePrefix(prefix.to_string()))
    }

    pub fn status(self, status: EntityStatus) -> Self {
        self.filter(SearchFilter::Status(status))
    }

    pub fn page(mut self, from: usize, size: usize) -> Self {
        self.from = from;
        self.size = size;
        self
    }

    pub fn sort_by(mut self, field: SortField, order: SortOrder) -> Self {
        self.sort.push(SortItem { field, order });
        self
    }

    pub fn aggregate(mut self, name: &str, aggregation: Aggregation) -> Self {
        self.aggregations.insert(name.to_string(), aggregation);
        self
    }

    /// Checks predicate combinations the catalog rejects
    pub fn validate(&self) -> Result<(), String> {
        let window_end = self.from.checked_add(self.size);
        if window_end.map_or(true, |end| end > MAX_RESULT_WINDOW) {
            return Err(format!(
                "Result window too large: from {} + size {} exceeds {}",
                self.from, self.size, MAX_RESULT_WINDOW
            ));
        }
        for filter in &self.filters {
            Self::validate_filter(filter)?;
        }
        let qualified_name_filters = self
            .filters
            .iter()
            .filter(|f| matches!(f, SearchFilter::QualifiedName(_)))
            .count();
        if qualified_name_filters > 1 {
            return Err("At most one exact qualified name filter may be given".to_string());
        }
        for (name, aggregation) in &self.aggregations {
            let Aggregation::Terms { size, .. } = aggregation;
            if *size == 0 {
                return Err(format!("Aggregation '{}' must request at least one bucket", name));
            }
        }
        Ok(())
    }

    fn validate_filter(filter: &SearchFilter) -> Result<(), String> {
        match filter {
            SearchFilter::TypeNames(types) if types.is_empty() => {
                Err("Type name filter requires at least one type".to_string())
            }
            SearchFilter::QualifiedNamePrefix(prefix) if prefix.is_empty() => {
                Err("Qualified name prefix must not be empty".to_string())
            }
            SearchFilter::Not(inner) => match inner.as_ref() {
                SearchFilter::Not(_) => Err("Double negation is not supported".to_string()),
                other => Self::validate_filter(other),
            },
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregationBucket {
    pub key: String,
    pub doc_count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregationResult {
    pub buckets: Vec<AggregationBucket>,
}

impl AggregationResult {
    pub fn count_for(&self, key: &str) -> u64 {
        self.buckets
            .iter()
            .find(|b| b.key == key)
            .map(|b| b.doc_count)
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub approximate_count: u64,
    #[serde(default)]
    pub assets: Vec<Asset>,
    #[serde(default)]
    pub aggregations: BTreeMap<String, AggregationResult>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_invalid_combinations() {
        assert!(SearchRequest::new().page(9_990, 20).validate().is_err());
        assert!(SearchRequest::new()
            .filter(SearchFilter::TypeNames(vec![]))
            .validate()
            .is_err());
        assert!(SearchRequest::new()
            .filter(SearchFilter::QualifiedName("a".to_string()))
            .filter(SearchFilter::QualifiedName("b".to_string()))
            .validate()
            .is_err());
        assert!(SearchRequest::new()
            .filter(SearchFilter::Not(Box::new(SearchFilter::Not(Box::new(
                SearchFilter::Name("x".to_string())
            )))))
            .validate()
            .is_err());
        assert!(SearchRequest::new()
            .aggregate(
                "types",
                Aggregation::Terms {
                    field: AggregationField::TypeName,
                    size: 0
                }
            )
            .validate()
            .is_err());
    }

    #[test]
    fn test_validate_rejects_overflowing_page_window() {
        let error = SearchRequest::new()
            .page(usize::MAX, 10)
            .validate()
            .unwrap_err();
        assert!(error.contains("Result window too large"));
        assert!(SearchRequest::new().page(10, usize::MAX).validate().is_err());
        assert!(SearchRequest::new()
            .page(MAX_RESULT_WINDOW - 10, 10)
            .validate()
            .is_ok());
    }

    #[test]
    fn test_validate_accepts_ordinary_request() {
        let request = SearchRequest::new()
            .type_name(AssetType::Table)
            .qualified_name_prefix("default/snowflake/1")
            .sort_by(SortField::Name, SortOrder::Desc)
            .page(0, 50);
        assert!(request.validate().is_ok());

        let json = serde_json::to_string(&request).unwrap();
        let decoded: SearchRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, request);
    }
}
