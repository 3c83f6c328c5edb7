use std::collections::BTreeMap;

use anyhow::{ensure, Context};
use serde_json::{json, Value};

use crate::client::{AssetClient, AuditClient, CustomMetadataClient, SharedClient};
use crate::error::{CatalogError, HarnessError};
use crate::harness::{
    expect_failure, expect_shape, fixtures, RetryPolicy, StepFuture, Suite, SuiteReport,
    UniqueNames,
};
use crate::model::{
    Asset, AttributeDef, AttributeType, AuditAction, AuditSearchRequest, ConnectorType,
    CustomMetadataDef, ARCHIVED_MARKER,
};
use crate::suites::require;

const SCORE: &str = "Score";
const STEWARD: &str = "Steward";
const REVIEWED: &str = "Reviewed";
const LABELS: &str = "Labels";
const TIER: &str = "Tier";

pub struct CustomMetadataContext {
    client: SharedClient,
    names: UniqueNames,
    set_name: String,
    definition: Option<CustomMetadataDef>,
    connection: Option<Asset>,
    dashboard: Option<Asset>,
}

impl CustomMetadataContext {
    pub fn new(client: SharedClient, _policy: RetryPolicy) -> Self {
        let names = UniqueNames::new("cm");
        let set_name = names.name("Quality");
        Self {
            client,
            names,
            set_name,
            definition: None,
            connection: None,
            dashboard: None,
        }
    }

    fn created(&self) -> Vec<Asset> {
        [&self.connection, &self.dashboard]
            .into_iter()
            .flatten()
            .cloned()
            .collect()
    }

    fn definition(&self) -> anyhow::Result<&CustomMetadataDef> {
        self.definition
            .as_ref()
            .context("custom metadata was not defined by an earlier step")
    }

    /// Current value of an attribute on the dashboard, read back from the catalog
    async fn stored_value(&self, attribute: &str) -> anyhow::Result<Option<Value>> {
        let dashboard = require(&self.dashboard, "dashboard")?;
        let definition = self.definition()?;
        let internal = definition
            .internal_attribute_name(attribute)
            .with_context(|| format!("'{}' is not an active attribute", attribute))?;
        let current = self.client.get_by_guid(&dashboard.guid).await?;
        Ok(current
            .custom_metadata_value(&definition.internal_name, internal)
            .cloned())
    }
}

fn values(pairs: &[(&str, Value)]) -> BTreeMap<String, Value> {
    pairs
        .iter()
        .map(|(name, value)| (name.to_string(), value.clone()))
        .collect()
}

fn define_set(ctx: &mut CustomMetadataContext) -> StepFuture<'_> {
    Box::pin(async move {
        let definition = CustomMetadataDef::new(&ctx.set_name)
            .with_attribute(AttributeDef::new(SCORE, AttributeType::Integer))
            .with_attribute(AttributeDef::new(STEWARD, AttributeType::String))
            .with_attribute(AttributeDef::new(REVIEWED, AttributeType::Boolean))
            .with_attribute(AttributeDef::new(LABELS, AttributeType::String).multi_valued());

        let created = ctx.client.create_custom_metadata(definition.clone()).await?;
        ensure!(
            !created.internal_name.is_empty() && created.internal_name != created.display_name,
            "set {} kept no opaque internal name",
            created.display_name
        );
        ensure!(
            created
                .attributes
                .iter()
                .all(|a| !a.internal_name.is_empty() && a.internal_name != a.display_name),
            "attributes were not given internal names"
        );

        expect_failure(
            ctx.client.create_custom_metadata(definition).await,
            CatalogError::is_conflict,
            "defining the same set twice",
        )?;

        let fetched = ctx.client.get_custom_metadata(&ctx.set_name).await?;
        ensure!(fetched == created, "fetched definition differs from the created one");
        ctx.definition = Some(created);
        Ok(())
    })
}

fn create_target(ctx: &mut CustomMetadataContext) -> StepFuture<'_> {
    Box::pin(async move {
        let name = ctx.names.name("bi");
        let connection =
            fixtures::create_connection(&*ctx.client, &name, ConnectorType::Tableau, vec![])
                .await?;
        let dashboard = fixtures::create(
            &*ctx.client,
            Asset::dashboard(&ctx.names.name("sales"), &connection.qualified_name),
        )
        .await?;
        ctx.connection = Some(connection);
        ctx.dashboard = Some(dashboard);
        Ok(())
    })
}

fn merge_values(ctx: &mut CustomMetadataContext) -> StepFuture<'_> {
    Box::pin(async move {
        let guid = require(&ctx.dashboard, "dashboard")?.guid.clone();

        let first = ctx
            .client
            .update_custom_metadata(&guid, &ctx.set_name, values(&[(SCORE, json!(87))]))
            .await?;
        expect_shape(&first, (0, 1, 0), "set score")?;

        let second = ctx
            .client
            .update_custom_metadata(
                &guid,
                &ctx.set_name,
                values(&[
                    (STEWARD, json!("data-office")),
                    (LABELS, json!(["finance", "weekly"])),
                ]),
            )
            .await?;
        expect_shape(&second, (0, 1, 0), "set steward and labels")?;

        ensure!(
            ctx.stored_value(SCORE).await? == Some(json!(87)),
            "merge dropped the earlier score"
        );
        ensure!(
            ctx.stored_value(LABELS).await? == Some(json!(["finance", "weekly"])),
            "labels not stored"
        );

        expect_failure(
            ctx.client
                .update_custom_metadata(&guid, &ctx.set_name, values(&[(SCORE, json!("high"))]))
                .await,
            CatalogError::is_invalid_request,
            "writing text into an integer attribute",
        )?;
        expect_failure(
            ctx.client
                .update_custom_metadata(&guid, &ctx.set_name, values(&[(LABELS, json!("one"))]))
                .await,
            CatalogError::is_invalid_request,
            "writing a scalar into a multi-valued attribute",
        )?;
        Ok(())
    })
}

fn replace_values(ctx: &mut CustomMetadataContext) -> StepFuture<'_> {
    Box::pin(async move {
        let guid = require(&ctx.dashboard, "dashboard")?.guid.clone();
        let replaced = ctx
            .client
            .replace_custom_metadata(&guid, &ctx.set_name, values(&[(REVIEWED, json!(true))]))
            .await?;
        expect_shape(&replaced, (0, 1, 0), "replace values")?;

        ensure!(
            ctx.stored_value(REVIEWED).await? == Some(json!(true)),
            "replacement value missing"
        );
        ensure!(
            ctx.stored_value(SCORE).await?.is_none(),
            "replace kept a value it should have cleared"
        );
        Ok(())
    })
}

fn audit_values(ctx: &mut CustomMetadataContext) -> StepFuture<'_> {
    Box::pin(async move {
        let dashboard = require(&ctx.dashboard, "dashboard")?;
        let request = AuditSearchRequest::for_guid(&dashboard.guid)
            .with_actions(vec![AuditAction::CustomMetadataUpdate]);
        let audit = ctx.client.audit_search(&request).await?;

        ensure!(
            audit.total_count == 3,
            "expected 3 custom metadata audits, found {}",
            audit.total_count
        );
        let latest = audit.entries.first().context("no audit entries returned")?;
        let snapshot = latest
            .detail
            .custom_metadata
            .get(&ctx.set_name)
            .context("latest audit lacks the set snapshot")?;
        ensure!(
            snapshot == &json!({ REVIEWED: true }),
            "latest snapshot is {}",
            snapshot
        );
        Ok(())
    })
}

fn evolve_definition(ctx: &mut CustomMetadataContext) -> StepFuture<'_> {
    Box::pin(async move {
        let guid = require(&ctx.dashboard, "dashboard")?.guid.clone();

        let extended = ctx
            .client
            .add_custom_metadata_attribute(&ctx.set_name, AttributeDef::new(TIER, AttributeType::Options))
            .await?;
        ensure!(extended.attribute(TIER).is_some(), "new attribute missing");

        let archived = ctx
            .client
            .archive_custom_metadata_attribute(&ctx.set_name, STEWARD)
            .await?;
        let steward = archived
            .attributes
            .iter()
            .find(|a| a.archived && a.original_display_name() == STEWARD)
            .context("archived steward attribute missing")?;
        ensure!(
            steward.display_name.contains(ARCHIVED_MARKER),
            "archived display name {} lacks the archive marker",
            steward.display_name
        );
        ensure!(archived.attribute(STEWARD).is_none(), "steward still active");
        ctx.definition = Some(archived);

        expect_failure(
            ctx.client
                .update_custom_metadata(&guid, &ctx.set_name, values(&[(STEWARD, json!("x"))]))
                .await,
            CatalogError::is_invalid_request,
            "writing an archived attribute",
        )?;

        let tiered = ctx
            .client
            .update_custom_metadata(&guid, &ctx.set_name, values(&[(TIER, json!("Gold"))]))
            .await?;
        expect_shape(&tiered, (0, 1, 0), "set tier")?;
        ensure!(
            ctx.stored_value(TIER).await? == Some(json!("Gold")),
            "tier not stored"
        );
        Ok(())
    })
}

fn remove_values(ctx: &mut CustomMetadataContext) -> StepFuture<'_> {
    Box::pin(async move {
        let guid = require(&ctx.dashboard, "dashboard")?.guid.clone();
        let removed = ctx
            .client
            .remove_custom_metadata(&guid, &ctx.set_name)
            .await?;
        expect_shape(&removed, (0, 1, 0), "remove values")?;

        let internal = ctx.definition()?.internal_name.clone();
        ensure!(
            !removed.updated[0].custom_metadata.contains_key(&internal),
            "values survived removal"
        );

        let again = ctx
            .client
            .remove_custom_metadata(&guid, &ctx.set_name)
            .await?;
        expect_shape(&again, (0, 0, 0), "removing values twice")?;
        Ok(())
    })
}

fn purge_assets(ctx: &mut CustomMetadataContext) -> StepFuture<'_> {
    Box::pin(async move {
        let created = ctx.created();
        let purged = fixtures::purge_all(&*ctx.client, &created).await?;
        log::info!("Purged {} custom metadata targets", purged);
        Ok(())
    })
}

fn purge_definition(ctx: &mut CustomMetadataContext) -> StepFuture<'_> {
    Box::pin(async move {
        match ctx.client.purge_custom_metadata(&ctx.set_name).await {
            Ok(()) => Ok(()),
            Err(CatalogError::NotFound(_)) => {
                log::debug!("Custom metadata {} already gone", ctx.set_name);
                Ok(())
            }
            Err(error) => Err(error).with_context(|| format!("purge {}", ctx.set_name)),
        }
    })
}

pub fn suite() -> Suite<CustomMetadataContext> {
    Suite::new("custom-metadata")
        .step("define_set", &[], define_set)
        .step("create_target", &[], create_target)
        .step("merge_values", &["define_set", "create_target"], merge_values)
        .step("replace_values", &["merge_values"], replace_values)
        .step("audit_values", &["replace_values"], audit_values)
        .step("evolve_definition", &["audit_values"], evolve_definition)
        .step("remove_values", &["evolve_definition"], remove_values)
        .finalizer("purge_assets", &[], purge_assets)
        .finalizer("purge_definition", &["purge_assets"], purge_definition)
}

pub async fn run(client: SharedClient, policy: RetryPolicy) -> Result<SuiteReport, HarnessError> {
    let mut ctx = CustomMetadataContext::new(client, policy);
    suite().run(&mut ctx).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::InMemoryCatalog;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_custom_metadata_suite_passes() {
        let catalog = Arc::new(InMemoryCatalog::new());
        let mut ctx = CustomMetadataContext::new(catalog.clone(), RetryPolicy::immediate(3));
        let report = suite().run(&mut ctx).await.unwrap();
        assert!(report.is_success(), "{}", report);

        let leftover = catalog.get_custom_metadata(&ctx.set_name).await;
        assert!(matches!(leftover, Err(CatalogError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_definition_is_purged_when_values_step_fails() {
        let catalog = Arc::new(InMemoryCatalog::new());
        let mut ctx = CustomMetadataContext::new(catalog.clone(), RetryPolicy::immediate(1));
        let set_name = ctx.set_name.clone();

        let report = Suite::new("partial")
            .step("define_set", &[], define_set)
            .finalizer("purge_definition", &[], purge_definition)
            .run(&mut ctx)
            .await
            .unwrap();

        assert!(report.is_success(), "{}", report);
        assert!(catalog.get_custom_metadata(&set_name).await.is_err());
    }
}
