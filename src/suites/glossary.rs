use anyhow::ensure;

use crate::client::{AssetClient, SharedClient};
use crate::error::{CatalogError, HarnessError};
use crate::harness::{
    expect_failure, fixtures, retry_search_until, CategoryHierarchy, RetryPolicy, StepFuture,
    Suite, SuiteReport, UniqueNames,
};
use crate::model::{Asset, AssetType, AssetUpdater, SearchFilter, SearchRequest};
use crate::suites::require;

const BRANCHING: usize = 2;

pub struct GlossaryContext {
    client: SharedClient,
    policy: RetryPolicy,
    names: UniqueNames,
    glossary: Option<Asset>,
    /// Creation order: each top, then its mids, then each mid's leaves
    categories: Vec<Asset>,
    terms: Vec<Asset>,
}

impl GlossaryContext {
    pub fn new(client: SharedClient, policy: RetryPolicy) -> Self {
        Self {
            client,
            policy,
            names: UniqueNames::new("glossary"),
            glossary: None,
            categories: Vec::new(),
            terms: Vec::new(),
        }
    }

    fn created(&self) -> Vec<Asset> {
        self.glossary
            .iter()
            .cloned()
            .chain(self.categories.iter().cloned())
            .chain(self.terms.iter().cloned())
            .collect()
    }
}

fn create_glossary(ctx: &mut GlossaryContext) -> StepFuture<'_> {
    Box::pin(async move {
        let glossary =
            fixtures::create(&*ctx.client, Asset::glossary(&ctx.names.name("business"))).await?;
        ctx.glossary = Some(glossary);
        Ok(())
    })
}

fn create_categories(ctx: &mut GlossaryContext) -> StepFuture<'_> {
    Box::pin(async move {
        let glossary_guid = require(&ctx.glossary, "glossary")?.guid.clone();

        for top in 1..=BRANCHING {
            let top_name = format!("top{}", top);
            let top_category = fixtures::create(
                &*ctx.client,
                Asset::glossary_category(&top_name, &glossary_guid, None),
            )
            .await?;
            ctx.categories.push(top_category.clone());

            for mid in 1..=BRANCHING {
                let mid_name = format!("{}-mid{}", top_name, mid);
                let mid_category = fixtures::create(
                    &*ctx.client,
                    Asset::glossary_category(&mid_name, &glossary_guid, Some(&top_category.guid)),
                )
                .await?;
                ctx.categories.push(mid_category.clone());

                for leaf in 1..=BRANCHING {
                    let leaf_category = fixtures::create(
                        &*ctx.client,
                        Asset::glossary_category(
                            &format!("{}-leaf{}", mid_name, leaf),
                            &glossary_guid,
                            Some(&mid_category.guid),
                        ),
                    )
                    .await?;
                    ctx.categories.push(leaf_category);
                }
            }
        }
        Ok(())
    })
}

fn validate_hierarchy(ctx: &mut GlossaryContext) -> StepFuture<'_> {
    Box::pin(async move {
        let glossary = require(&ctx.glossary, "glossary")?;
        let expected = ctx.categories.len();
        let request = SearchRequest::new()
            .type_name(AssetType::GlossaryCategory)
            .filter(SearchFilter::Glossary(glossary.guid.clone()))
            .page(0, 100);

        let response =
            retry_search_until(&*ctx.client, &request, expected as u64, &ctx.policy).await?;
        let hierarchy = CategoryHierarchy::from_assets(&response.assets)?;
        ensure!(
            hierarchy.len() == expected,
            "hierarchy has {} categories, expected {}",
            hierarchy.len(),
            expected
        );
        ensure!(hierarchy.roots().len() == BRANCHING, "expected {} roots", BRANCHING);

        // Children sort by name, so pre-order matches creation order
        let depth_first: Vec<&str> = hierarchy
            .depth_first()
            .iter()
            .map(|node| node.guid.as_str())
            .collect();
        let created: Vec<&str> = ctx.categories.iter().map(|c| c.guid.as_str()).collect();
        ensure!(depth_first == created, "depth-first order differs from creation order");

        let level_sizes: Vec<usize> = hierarchy.levels().iter().map(|l| l.len()).collect();
        ensure!(
            level_sizes == vec![BRANCHING, BRANCHING.pow(2), BRANCHING.pow(3)],
            "unexpected level sizes {:?}",
            level_sizes
        );
        let breadth_first = hierarchy.breadth_first();
        ensure!(
            breadth_first.windows(2).all(|pair| pair[0].depth <= pair[1].depth),
            "breadth-first order visits a deeper level early"
        );
        Ok(())
    })
}

fn create_terms(ctx: &mut GlossaryContext) -> StepFuture<'_> {
    Box::pin(async move {
        let glossary_guid = require(&ctx.glossary, "glossary")?.guid.clone();
        for name in ["Revenue", "Gross margin"] {
            let term =
                fixtures::create(&*ctx.client, Asset::glossary_term(name, &glossary_guid)).await?;
            ctx.terms.push(term);
        }
        Ok(())
    })
}

fn link_see_also(ctx: &mut GlossaryContext) -> StepFuture<'_> {
    Box::pin(async move {
        ensure!(ctx.terms.len() >= 2, "two terms are required");
        let related = ctx.terms[1].guid.clone();
        let linked = fixtures::update(
            &*ctx.client,
            AssetUpdater::for_asset(&ctx.terms[0]).see_also(vec![related.clone()]),
        )
        .await?;
        ensure!(linked.see_also() == [related], "see-also not linked");
        ctx.terms[0] = linked;
        Ok(())
    })
}

fn stale_see_also(ctx: &mut GlossaryContext) -> StepFuture<'_> {
    Box::pin(async move {
        let glossary_guid = require(&ctx.glossary, "glossary")?.guid.clone();
        let retired =
            fixtures::create(&*ctx.client, Asset::glossary_term("Retired", &glossary_guid))
                .await?;
        fixtures::purge(&*ctx.client, &retired).await?;

        let source = ctx
            .terms
            .first()
            .ok_or_else(|| anyhow::anyhow!("no term to link from"))?;
        expect_failure(
            ctx.client
                .update(AssetUpdater::for_asset(source).see_also(vec![retired.guid.clone()]))
                .await,
            CatalogError::is_not_found,
            "linking a purged term",
        )?;

        expect_failure(
            ctx.client
                .save(Asset::glossary_term("Orphan", &"missing-glossary".to_string()))
                .await,
            CatalogError::is_invalid_request,
            "creating a term without its glossary",
        )?;
        Ok(())
    })
}

fn unlink_see_also(ctx: &mut GlossaryContext) -> StepFuture<'_> {
    Box::pin(async move {
        let source = ctx
            .terms
            .first()
            .ok_or_else(|| anyhow::anyhow!("no term to unlink"))?;
        let unlinked =
            fixtures::update(&*ctx.client, AssetUpdater::for_asset(source).remove_see_also())
                .await?;
        ensure!(unlinked.see_also().is_empty(), "see-also still linked");
        ctx.terms[0] = unlinked;
        Ok(())
    })
}

fn purge_fixtures(ctx: &mut GlossaryContext) -> StepFuture<'_> {
    Box::pin(async move {
        // Reverse creation order: terms, then leaves up to the glossary
        let created = ctx.created();
        let purged = fixtures::purge_all(&*ctx.client, &created).await?;
        log::info!("Purged {} glossary assets", purged);
        Ok(())
    })
}

pub fn suite() -> Suite<GlossaryContext> {
    Suite::new("glossary")
        .step("create_glossary", &[], create_glossary)
        .step("create_categories", &["create_glossary"], create_categories)
        .step("validate_hierarchy", &["create_categories"], validate_hierarchy)
        .step("create_terms", &["create_glossary"], create_terms)
        .step("link_see_also", &["create_terms"], link_see_also)
        .step("stale_see_also", &["link_see_also"], stale_see_also)
        .step("unlink_see_also", &["stale_see_also"], unlink_see_also)
        .finalizer("purge_fixtures", &[], purge_fixtures)
}

pub async fn run(client: SharedClient, policy: RetryPolicy) -> Result<SuiteReport, HarnessError> {
    let mut ctx = GlossaryContext::new(client, policy);
    suite().run(&mut ctx).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{InMemoryCatalog, SearchClient};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_glossary_suite_passes() {
        let catalog = Arc::new(InMemoryCatalog::with_index_lag(1));
        let report = run(catalog.clone(), RetryPolicy::immediate(5)).await.unwrap();
        assert!(report.is_success(), "{}", report);

        catalog.flush_index();
        let leftovers = catalog
            .search(&SearchRequest::new().type_name(AssetType::GlossaryCategory))
            .await
            .unwrap();
        assert_eq!(leftovers.approximate_count, 0);
    }
}
