use itertools::Itertools;
use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::model::{
    Aggregation, AggregationBucket, AggregationField, AggregationResult, Asset, EntityStatus,
    SearchFilter, SearchRequest, SearchResponse, SortField, SortItem, SortOrder,
};

/// Evaluates search requests against an in-memory set of indexed assets
pub struct AssetFilterEvaluator;

impl AssetFilterEvaluator {
    /// Run a validated request over the indexed assets
    pub fn search<'a, I>(assets: I, request: &SearchRequest) -> SearchResponse
    where
        I: IntoIterator<Item = &'a Asset>,
    {
        let constrains_status = request
            .filters
            .iter()
            .any(|f| matches!(f, SearchFilter::Status(_)));

        let mut matched: Vec<&Asset> = assets
            .into_iter()
            .filter(|asset| constrains_status || asset.status == EntityStatus::Active)
            .filter(|asset| Self::matches_all(asset, &request.filters))
            .collect();

        matched.sort_by(|a, b| Self::compare(a, b, &request.sort));

        let aggregations = request
            .aggregations
            .iter()
            .map(|(name, aggregation)| (name.clone(), Self::aggregate(&matched, aggregation)))
            .collect::<BTreeMap<_, _>>();

        let approximate_count = matched.len() as u64;
        let assets = matched
            .into_iter()
            .skip(request.from)
            .take(request.size)
            .cloned()
            .collect();

        SearchResponse {
            approximate_count,
            assets,
            aggregations,
        }
    }

    pub fn matches_all(asset: &Asset, filters: &[SearchFilter]) -> bool {
        filters.iter().all(|filter| Self::matches(asset, filter))
    }

    pub fn matches(asset: &Asset, filter: &SearchFilter) -> bool {
        match filter {
            SearchFilter::TypeName(asset_type) => asset.asset_type() == *asset_type,
            SearchFilter::TypeNames(types) => types.contains(&asset.asset_type()),
            SearchFilter::QualifiedName(qn) => &asset.qualified_name == qn,
            SearchFilter::QualifiedNamePrefix(prefix) => asset.qualified_name.starts_with(prefix),
            SearchFilter::Name(name) => &asset.name == name,
            SearchFilter::Status(status) => asset.status == *status,
            SearchFilter::Connector(connector) => asset.connector() == Some(*connector),
            SearchFilter::Tag(tag) => asset.tags.contains(tag),
            SearchFilter::OwnerGroup(group) => asset.owner_groups.contains(group),
            SearchFilter::Glossary(guid) => asset.detail.glossary_guid() == Some(guid),
            SearchFilter::Not(inner) => !Self::matches(asset, inner),
        }
    }

    fn compare(a: &Asset, b: &Asset, sort: &[SortItem]) -> Ordering {
        for item in sort {
            let ordering = match item.field {
                SortField::Name => a.name.cmp(&b.name),
                SortField::QualifiedName => a.qualified_name.cmp(&b.qualified_name),
                SortField::CreatedAt => a.created_at.cmp(&b.created_at),
                SortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
            };
            let ordering = match item.order {
                SortOrder::Asc => ordering,
                SortOrder::Desc => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        // Stable tie-breaker so paging is deterministic
        a.qualified_name
            .cmp(&b.qualified_name)
            .then_with(|| a.guid.cmp(&b.guid))
    }

    fn aggregate(assets: &[&Asset], aggregation: &Aggregation) -> AggregationResult {
        let Aggregation::Terms { field, size } = aggregation;

        let keys: Vec<String> = assets
            .iter()
            .flat_map(|asset| Self::aggregation_keys(asset, *field))
            .collect();

        let buckets = keys
            .into_iter()
            .counts()
            .into_iter()
            .sorted_by(|(ka, ca), (kb, cb)| cb.cmp(ca).then_with(|| ka.cmp(kb)))
            .take(*size)
            .map(|(key, count)| AggregationBucket {
                key,
                doc_count: count as u64,
            })
            .collect();

        AggregationResult { buckets }
    }

    fn aggregation_keys(asset: &Asset, field: AggregationField) -> Vec<String> {
        match field {
            AggregationField::TypeName => vec![asset.asset_type().to_string()],
            AggregationField::Status => vec![asset.status.to_string()],
            AggregationField::Connector => asset
                .connector()
                .map(|c| vec![c.to_string()])
                .unwrap_or_default(),
            AggregationField::OwnerGroup => asset.owner_groups.clone(),
            AggregationField::Tag => asset.tags.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AssetType, ConnectorType};

    fn sample() -> Vec<Asset> {
        let connection = Asset::connection("conn", ConnectorType::Postgres, vec![]);
        let database = Asset::database("db", &connection.qualified_name);
        let schema = Asset::schema("sch", &database.qualified_name);
        let mut tables: Vec<Asset> = ["alpha", "beta", "gamma"]
            .iter()
            .map(|name| Asset::table(name, &schema.qualified_name))
            .collect();
        tables[1].status = EntityStatus::Deleted;
        tables[2].tags.push("PII".to_string());

        let mut all = vec![connection, database, schema];
        all.extend(tables);
        all
    }

    #[test]
    fn test_default_search_excludes_deleted_assets() {
        let assets = sample();
        let response = AssetFilterEvaluator::search(
            &assets,
            &SearchRequest::new().type_name(AssetType::Table),
        );
        assert_eq!(response.approximate_count, 2);

        let deleted = AssetFilterEvaluator::search(
            &assets,
            &SearchRequest::new()
                .type_name(AssetType::Table)
                .status(EntityStatus::Deleted),
        );
        assert_eq!(deleted.approximate_count, 1);
        assert_eq!(deleted.assets[0].name, "beta");
    }

    #[test]
    fn test_sort_and_page_apply_after_counting() {
        let assets = sample();
        let request = SearchRequest::new()
            .filter(SearchFilter::Connector(ConnectorType::Postgres))
            .sort_by(SortField::Name, SortOrder::Desc)
            .page(1, 2);

        let response = AssetFilterEvaluator::search(&assets, &request);

        assert_eq!(response.approximate_count, 5);
        let names: Vec<&str> = response.assets.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["gamma", "db"]);
    }

    #[test]
    fn test_terms_aggregation_counts_by_type() {
        let assets = sample();
        let request = SearchRequest::new().aggregate(
            "types",
            Aggregation::Terms {
                field: AggregationField::TypeName,
                size: 10,
            },
        );

        let response = AssetFilterEvaluator::search(&assets, &request);
        let types = &response.aggregations["types"];

        assert_eq!(types.count_for("Table"), 2);
        assert_eq!(types.count_for("Connection"), 1);
        assert_eq!(types.buckets[0].key, "Table");
    }

    #[test]
    fn test_negated_tag_filter() {
        let assets = sample();
        let request = SearchRequest::new()
            .type_name(AssetType::Table)
            .filter(SearchFilter::Not(Box::new(SearchFilter::Tag("PII".to_string()))));
        let response = AssetFilterEvaluator::search(&assets, &request);
        assert_eq!(response.approximate_count, 1);
        assert_eq!(response.assets[0].name, "alpha");
    }
}
