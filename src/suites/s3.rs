use anyhow::ensure;

use crate::client::{SearchClient, SharedClient};
use crate::error::HarnessError;
use crate::harness::{
    fixtures, poll_until, retry_search_until, RetryPolicy, StepFuture, Suite, SuiteReport,
    UniqueNames,
};
use crate::model::{
    Asset, AssetType, ConnectorType, EntityStatus, SearchRequest, SortField, SortOrder,
};
use crate::suites::require;

const OBJECT_COUNT: usize = 5;
const PAGE_SIZE: usize = 2;
const REGION: &str = "eu-west-1";

pub struct S3Context {
    client: SharedClient,
    policy: RetryPolicy,
    names: UniqueNames,
    connection: Option<Asset>,
    bucket: Option<Asset>,
    objects: Vec<Asset>,
}

impl S3Context {
    pub fn new(client: SharedClient, policy: RetryPolicy) -> Self {
        Self {
            client,
            policy,
            names: UniqueNames::new("s3"),
            connection: None,
            bucket: None,
            objects: Vec::new(),
        }
    }

    fn created(&self) -> Vec<Asset> {
        [&self.connection, &self.bucket]
            .into_iter()
            .flatten()
            .cloned()
            .chain(self.objects.iter().cloned())
            .collect()
    }

    fn objects_in_bucket(&self) -> anyhow::Result<SearchRequest> {
        let bucket = require(&self.bucket, "bucket")?;
        Ok(SearchRequest::new()
            .type_name(AssetType::S3Object)
            .qualified_name_prefix(&bucket.qualified_name))
    }

    /// Every other object, starting with the second
    fn deleted_objects(&self) -> Vec<Asset> {
        self.objects.iter().skip(1).step_by(2).cloned().collect()
    }
}

fn create_connection(ctx: &mut S3Context) -> StepFuture<'_> {
    Box::pin(async move {
        let name = ctx.names.name("storage");
        let connection =
            fixtures::create_connection(&*ctx.client, &name, ConnectorType::S3, vec![]).await?;
        ctx.connection = Some(connection);
        Ok(())
    })
}

fn create_bucket(ctx: &mut S3Context) -> StepFuture<'_> {
    Box::pin(async move {
        let connection_qn = require(&ctx.connection, "connection")?.qualified_name.clone();
        let bucket = fixtures::create(
            &*ctx.client,
            Asset::s3_bucket(&ctx.names.name("landing"), &connection_qn, REGION),
        )
        .await?;
        ctx.bucket = Some(bucket);
        Ok(())
    })
}

fn create_objects(ctx: &mut S3Context) -> StepFuture<'_> {
    Box::pin(async move {
        let bucket_qn = require(&ctx.bucket, "bucket")?.qualified_name.clone();
        for i in 0..OBJECT_COUNT {
            let object = fixtures::create(
                &*ctx.client,
                Asset::s3_object(
                    &ctx.names.name(&format!("object-{}", i)),
                    &bucket_qn,
                    &format!("data/object-{}.csv", i),
                ),
            )
            .await?;
            ctx.objects.push(object);
        }
        Ok(())
    })
}

fn paginate_objects(ctx: &mut S3Context) -> StepFuture<'_> {
    Box::pin(async move {
        let request = ctx
            .objects_in_bucket()?
            .sort_by(SortField::Name, SortOrder::Asc);
        let total = ctx.objects.len();

        // Wait for the index once, then page through the settled results
        retry_search_until(&*ctx.client, &request, total as u64, &ctx.policy).await?;

        let mut seen = Vec::with_capacity(total);
        for from in (0..total).step_by(PAGE_SIZE) {
            let page = ctx
                .client
                .search(&request.clone().page(from, PAGE_SIZE))
                .await?;
            ensure!(
                page.approximate_count == total as u64,
                "page from {} reported {} results, expected {}",
                from,
                page.approximate_count,
                total
            );
            let expected_len = PAGE_SIZE.min(total - from);
            ensure!(
                page.assets.len() == expected_len,
                "page from {} held {} objects, expected {}",
                from,
                page.assets.len(),
                expected_len
            );
            seen.extend(page.assets.into_iter().map(|asset| asset.name));
        }

        let mut expected: Vec<String> = ctx.objects.iter().map(|o| o.name.clone()).collect();
        expected.sort();
        ensure!(
            seen == expected,
            "paged names {:?} differ from {:?}",
            seen,
            expected
        );
        Ok(())
    })
}

fn delete_objects(ctx: &mut S3Context) -> StepFuture<'_> {
    Box::pin(async move {
        let doomed = ctx.deleted_objects();
        for object in &doomed {
            fixtures::delete(&*ctx.client, object).await?;
        }
        let remaining = (ctx.objects.len() - doomed.len()) as u64;

        let deleted_request = ctx.objects_in_bucket()?.status(EntityStatus::Deleted);
        let deleted = retry_search_until(
            &*ctx.client,
            &deleted_request,
            doomed.len() as u64,
            &ctx.policy,
        )
        .await?;
        ensure!(
            deleted.approximate_count == doomed.len() as u64,
            "found {} deleted objects, expected {}",
            deleted.approximate_count,
            doomed.len()
        );

        let active_request = ctx.objects_in_bucket()?;
        let active = poll_until(
            &ctx.policy,
            || ctx.client.search(&active_request),
            |response| response.approximate_count == remaining,
        )
        .await?;
        ensure!(
            active.approximate_count == remaining,
            "found {} active objects, expected {}",
            active.approximate_count,
            remaining
        );
        Ok(())
    })
}

fn restore_objects(ctx: &mut S3Context) -> StepFuture<'_> {
    Box::pin(async move {
        for object in ctx.deleted_objects() {
            fixtures::restore(&*ctx.client, &object).await?;
        }
        let request = ctx.objects_in_bucket()?;
        let total = ctx.objects.len() as u64;
        let restored = retry_search_until(&*ctx.client, &request, total, &ctx.policy).await?;
        ensure!(
            restored.approximate_count == total,
            "only {} of {} objects active after restore",
            restored.approximate_count,
            total
        );
        Ok(())
    })
}

fn purge_fixtures(ctx: &mut S3Context) -> StepFuture<'_> {
    Box::pin(async move {
        let created = ctx.created();
        let purged = fixtures::purge_all(&*ctx.client, &created).await?;
        log::info!("Purged {} S3 assets", purged);
        Ok(())
    })
}

pub fn suite() -> Suite<S3Context> {
    Suite::new("s3")
        .step("create_connection", &[], create_connection)
        .step("create_bucket", &["create_connection"], create_bucket)
        .step("create_objects", &["create_bucket"], create_objects)
        .step("paginate_objects", &["create_objects"], paginate_objects)
        .step("delete_objects", &["paginate_objects"], delete_objects)
        .step("restore_objects", &["delete_objects"], restore_objects)
        .finalizer("purge_fixtures", &[], purge_fixtures)
}

pub async fn run(client: SharedClient, policy: RetryPolicy) -> Result<SuiteReport, HarnessError> {
    let mut ctx = S3Context::new(client, policy);
    suite().run(&mut ctx).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::InMemoryCatalog;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_s3_suite_passes() {
        let catalog = Arc::new(InMemoryCatalog::with_index_lag(3));
        let report = run(catalog.clone(), RetryPolicy::immediate(10)).await.unwrap();
        assert!(report.is_success(), "{}", report);
        assert_eq!(report.passed_count(), 7);
    }

    #[test]
    fn test_every_other_object_is_deleted() {
        let mut ctx = S3Context::new(Arc::new(InMemoryCatalog::new()), RetryPolicy::default());
        ctx.objects = (0..OBJECT_COUNT)
            .map(|i| Asset::s3_object(&format!("o{}", i), "bucket", &format!("k{}", i)))
            .collect();
        let names: Vec<String> = ctx.deleted_objects().into_iter().map(|o| o.name).collect();
        assert_eq!(names, vec!["o1", "o3"]);
    }
}
