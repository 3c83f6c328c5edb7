use anyhow::ensure;

use crate::client::{SearchClient, SharedClient};
use crate::error::{CatalogError, HarnessError};
use crate::harness::{expect_failure, RetryPolicy, StepFuture, Suite, SuiteReport};
use crate::model::{
    Aggregation, AggregationField, AssetType, SearchFilter, SearchRequest, MAX_RESULT_WINDOW,
};

/// Searches the catalog must reject, each with the reason it is malformed
fn rejected_requests() -> Vec<(&'static str, SearchRequest)> {
    vec![
        (
            "result window past the limit",
            SearchRequest::new().page(MAX_RESULT_WINDOW - 10, 20),
        ),
        (
            "empty type list",
            SearchRequest::new().filter(SearchFilter::TypeNames(Vec::new())),
        ),
        (
            "double negation",
            SearchRequest::new().filter(SearchFilter::Not(Box::new(SearchFilter::Not(
                Box::new(SearchFilter::TypeName(AssetType::Table)),
            )))),
        ),
        (
            "two exact qualified names",
            SearchRequest::new()
                .filter(SearchFilter::QualifiedName("a".to_string()))
                .filter(SearchFilter::QualifiedName("b".to_string())),
        ),
        (
            "aggregation without buckets",
            SearchRequest::new().aggregate(
                "types",
                Aggregation::Terms {
                    field: AggregationField::TypeName,
                    size: 0,
                },
            ),
        ),
    ]
}

pub struct InvalidSearchContext {
    client: SharedClient,
    rejected: usize,
}

impl InvalidSearchContext {
    pub fn new(client: SharedClient, _policy: RetryPolicy) -> Self {
        Self {
            client,
            rejected: 0,
        }
    }
}

fn malformed_searches(ctx: &mut InvalidSearchContext) -> StepFuture<'_> {
    Box::pin(async move {
        for (reason, request) in rejected_requests() {
            expect_failure(
                ctx.client.search(&request).await,
                CatalogError::is_invalid_request,
                reason,
            )?;
            ctx.rejected += 1;
        }
        Ok(())
    })
}

fn control_search(ctx: &mut InvalidSearchContext) -> StepFuture<'_> {
    Box::pin(async move {
        let request = SearchRequest::new()
            .type_name(AssetType::Connection)
            .filter(SearchFilter::Not(Box::new(SearchFilter::Tag(
                "never-applied".to_string(),
            ))))
            .page(MAX_RESULT_WINDOW - 20, 20);
        let response = ctx.client.search(&request).await?;
        ensure!(
            response.assets.len() as u64 <= response.approximate_count,
            "page holds more assets than the total count"
        );
        log::info!(
            "Control search accepted after {} rejections",
            ctx.rejected
        );
        Ok(())
    })
}

pub fn suite() -> Suite<InvalidSearchContext> {
    Suite::new("invalid-search")
        .step("malformed_searches", &[], malformed_searches)
        .step("control_search", &[], control_search)
}

pub async fn run(client: SharedClient, policy: RetryPolicy) -> Result<SuiteReport, HarnessError> {
    let mut ctx = InvalidSearchContext::new(client, policy);
    suite().run(&mut ctx).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::InMemoryCatalog;
    use std::sync::Arc;

    #[test]
    fn test_every_rejected_request_fails_validation() {
        for (reason, request) in rejected_requests() {
            assert!(request.validate().is_err(), "{} passed validation", reason);
        }
    }

    #[tokio::test]
    async fn test_invalid_search_suite_passes() {
        let catalog = Arc::new(InMemoryCatalog::new());
        let report = run(catalog, RetryPolicy::immediate(1)).await.unwrap();
        assert!(report.is_success(), "{}", report);
        assert_eq!(report.outcomes.len(), 2);
    }
}
