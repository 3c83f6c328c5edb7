use anyhow::{ensure, Context};

use crate::client::{AssetClient, AuditClient, SharedClient};
use crate::error::{CatalogError, HarnessError};
use crate::harness::{
    expect_failure, expect_shape, fixtures, retry_search_until, AuditScanner, RetryPolicy,
    StepFuture, Suite, SuiteReport, UniqueNames,
};
use crate::model::{
    child_qualified_name, Aggregation, AggregationField, Asset, AssetType, AssetUpdater,
    AuditAction, AuditSearchRequest, CertificateStatus, ConnectorType, SearchRequest,
};
use crate::suites::require;

const TABLE_DESCRIPTION: &str = "Orders placed through the web shop";
const OWNER_GROUP: &str = "data-engineering";
const COLUMNS: [(&str, &str); 3] = [("order_id", "NUMBER"), ("customer", "VARCHAR"), ("total", "DECIMAL")];

pub struct SqlContext {
    client: SharedClient,
    policy: RetryPolicy,
    names: UniqueNames,
    connection: Option<Asset>,
    database: Option<Asset>,
    schema: Option<Asset>,
    table: Option<Asset>,
    columns: Vec<Asset>,
}

impl SqlContext {
    pub fn new(client: SharedClient, policy: RetryPolicy) -> Self {
        Self {
            client,
            policy,
            names: UniqueNames::new("sql"),
            connection: None,
            database: None,
            schema: None,
            table: None,
            columns: Vec::new(),
        }
    }

    /// Everything created so far, in creation order
    fn created(&self) -> Vec<Asset> {
        [&self.connection, &self.database, &self.schema, &self.table]
            .into_iter()
            .flatten()
            .cloned()
            .chain(self.columns.iter().cloned())
            .collect()
    }
}

fn create_connection(ctx: &mut SqlContext) -> StepFuture<'_> {
    Box::pin(async move {
        let name = ctx.names.name("connection");
        let connection = fixtures::create_connection(
            &*ctx.client,
            &name,
            ConnectorType::Snowflake,
            vec!["harness".to_string()],
        )
        .await?;
        ctx.connection = Some(connection);
        Ok(())
    })
}

fn create_database(ctx: &mut SqlContext) -> StepFuture<'_> {
    Box::pin(async move {
        let connection = require(&ctx.connection, "connection")?;
        let database = fixtures::create(
            &*ctx.client,
            Asset::database(&ctx.names.name("db"), &connection.qualified_name),
        )
        .await?;
        ctx.database = Some(database);
        Ok(())
    })
}

fn create_schema(ctx: &mut SqlContext) -> StepFuture<'_> {
    Box::pin(async move {
        let database = require(&ctx.database, "database")?;
        let schema = fixtures::create(
            &*ctx.client,
            Asset::schema(&ctx.names.name("schema"), &database.qualified_name),
        )
        .await?;
        ctx.schema = Some(schema);
        Ok(())
    })
}

fn create_table(ctx: &mut SqlContext) -> StepFuture<'_> {
    Box::pin(async move {
        let schema = require(&ctx.schema, "schema")?;
        let table = fixtures::create(
            &*ctx.client,
            Asset::table(&ctx.names.name("orders"), &schema.qualified_name),
        )
        .await?;
        ctx.table = Some(table);
        Ok(())
    })
}

fn create_columns(ctx: &mut SqlContext) -> StepFuture<'_> {
    Box::pin(async move {
        let table_qn = require(&ctx.table, "table")?.qualified_name.clone();
        for (order, (name, data_type)) in COLUMNS.iter().enumerate() {
            let column = fixtures::create(
                &*ctx.client,
                Asset::column(name, &table_qn, order as u32 + 1, data_type),
            )
            .await?;
            ctx.columns.push(column);
        }
        Ok(())
    })
}

fn read_table(ctx: &mut SqlContext) -> StepFuture<'_> {
    Box::pin(async move {
        let schema = require(&ctx.schema, "schema")?;
        let table = require(&ctx.table, "table")?;

        let by_guid = ctx.client.get_by_guid(&table.guid).await?;
        let by_name = ctx
            .client
            .get_by_qualified_name(AssetType::Table, &table.qualified_name)
            .await?;
        ensure!(by_guid == by_name, "lookups by guid and qualified name disagree");
        ensure!(
            by_guid.qualified_name == child_qualified_name(&schema.qualified_name, &table.name),
            "table qualified name {} is not derived from its schema",
            by_guid.qualified_name
        );
        ensure!(
            by_guid.connector() == Some(ConnectorType::Snowflake),
            "table lost its connector"
        );
        Ok(())
    })
}

fn table_updater(table: &Asset) -> AssetUpdater {
    AssetUpdater::for_asset(table)
        .description(TABLE_DESCRIPTION)
        .certificate(CertificateStatus::Verified, Some("Reviewed by the harness"))
}

fn update_table(ctx: &mut SqlContext) -> StepFuture<'_> {
    Box::pin(async move {
        let table = require(&ctx.table, "table")?;
        let updated = fixtures::update(&*ctx.client, table_updater(table)).await?;
        ensure!(
            updated.description.as_deref() == Some(TABLE_DESCRIPTION),
            "description not applied"
        );
        ensure!(
            updated.certificate.as_ref().map(|c| c.status) == Some(CertificateStatus::Verified),
            "certificate not applied"
        );
        ctx.table = Some(updated);
        Ok(())
    })
}

fn reapply_update(ctx: &mut SqlContext) -> StepFuture<'_> {
    Box::pin(async move {
        let table = require(&ctx.table, "table")?;
        let response = ctx.client.update(table_updater(table)).await?;
        expect_shape(&response, (0, 0, 0), "reapplying an identical update")?;
        Ok(())
    })
}

fn search_assets(ctx: &mut SqlContext) -> StepFuture<'_> {
    Box::pin(async move {
        let connection = require(&ctx.connection, "connection")?;
        let expected = ctx.created().len() as u64;
        let request = SearchRequest::new()
            .qualified_name_prefix(&connection.qualified_name)
            .aggregate(
                "types",
                Aggregation::Terms {
                    field: AggregationField::TypeName,
                    size: 10,
                },
            );

        let response =
            retry_search_until(&*ctx.client, &request, expected, &ctx.policy).await?;
        ensure!(
            response.approximate_count == expected,
            "search found {} assets, expected {}",
            response.approximate_count,
            expected
        );
        let types = response
            .aggregations
            .get("types")
            .context("type aggregation missing")?;
        ensure!(
            types.count_for(AssetType::Column.type_name()) == COLUMNS.len() as u64,
            "expected {} columns in aggregation, got {:?}",
            COLUMNS.len(),
            types.buckets
        );
        ensure!(types.count_for(AssetType::Table.type_name()) == 1, "expected one table");
        Ok(())
    })
}

fn tag_table(ctx: &mut SqlContext) -> StepFuture<'_> {
    Box::pin(async move {
        let table = require(&ctx.table, "table")?;
        let tag = "PII".to_string();

        let added = ctx
            .client
            .add_tags(AssetType::Table, &table.qualified_name, vec![tag.clone()])
            .await?;
        expect_shape(&added, (0, 1, 0), "add tag")?;
        ensure!(added.updated[0].tags.contains(&tag), "tag not applied");

        let removed = ctx
            .client
            .remove_tag(AssetType::Table, &table.qualified_name, &tag)
            .await?;
        expect_shape(&removed, (0, 1, 0), "remove tag")?;

        expect_failure(
            ctx.client
                .remove_tag(AssetType::Table, &table.qualified_name, &tag)
                .await,
            CatalogError::is_not_found,
            "removing a tag twice",
        )?;
        Ok(())
    })
}

fn owner_groups(ctx: &mut SqlContext) -> StepFuture<'_> {
    Box::pin(async move {
        let table = require(&ctx.table, "table")?;
        let set = fixtures::update(
            &*ctx.client,
            AssetUpdater::for_asset(table).owner_groups(vec![OWNER_GROUP.to_string()]),
        )
        .await?;
        ensure!(set.owner_groups == vec![OWNER_GROUP.to_string()], "owner group not set");

        let cleared = fixtures::update(
            &*ctx.client,
            AssetUpdater::for_asset(table).remove_owner_groups(),
        )
        .await?;
        ensure!(cleared.owner_groups.is_empty(), "owner groups not cleared");
        ctx.table = Some(cleared);
        Ok(())
    })
}

fn audit_trail(ctx: &mut SqlContext) -> StepFuture<'_> {
    Box::pin(async move {
        let table = require(&ctx.table, "table")?;
        let audit = ctx
            .client
            .audit_search(&AuditSearchRequest::for_guid(&table.guid))
            .await?;
        let mut scanner = AuditScanner::new(audit.entries);

        scanner.next_expecting(AuditAction::EntityCreate)?;
        scanner.next_update_matching("description and certificate set", |entry| {
            entry.attribute("description").and_then(|v| v.as_str()) == Some(TABLE_DESCRIPTION)
        })?;
        scanner.next_update_matching("owner group set", |entry| {
            entry
                .attribute("ownerGroups")
                .and_then(|v| v.as_array())
                .map(|groups| groups.iter().any(|g| g == OWNER_GROUP))
                .unwrap_or(false)
        })?;
        scanner.next_update_matching("owner group cleared", |entry| {
            entry
                .attribute("ownerGroups")
                .map(|v| v.is_null())
                .unwrap_or(false)
        })?;
        Ok(())
    })
}

fn delete_and_restore(ctx: &mut SqlContext) -> StepFuture<'_> {
    Box::pin(async move {
        let table = require(&ctx.table, "table")?.clone();
        fixtures::delete(&*ctx.client, &table).await?;

        let deleted = ctx.client.get_by_guid(&table.guid).await?;
        ensure!(!deleted.is_active(), "table still active after delete");
        let again = ctx.client.delete(&table.guid).await?;
        expect_shape(&again, (0, 0, 0), "deleting a deleted table")?;

        let restored = fixtures::restore(&*ctx.client, &table).await?;
        ctx.table = Some(restored);
        Ok(())
    })
}

fn purge_fixtures(ctx: &mut SqlContext) -> StepFuture<'_> {
    Box::pin(async move {
        let created = ctx.created();
        let purged = fixtures::purge_all(&*ctx.client, &created).await?;
        log::info!("Purged {} SQL assets", purged);
        Ok(())
    })
}

pub fn suite() -> Suite<SqlContext> {
    Suite::new("sql-assets")
        .step("create_connection", &[], create_connection)
        .step("create_database", &["create_connection"], create_database)
        .step("create_schema", &["create_database"], create_schema)
        .step("create_table", &["create_schema"], create_table)
        .step("create_columns", &["create_table"], create_columns)
        .step("read_table", &["create_columns"], read_table)
        .step("update_table", &["read_table"], update_table)
        .step("reapply_update", &["update_table"], reapply_update)
        .step("search_assets", &["update_table"], search_assets)
        .step("tag_table", &["update_table"], tag_table)
        .step("owner_groups", &["tag_table"], owner_groups)
        .step("audit_trail", &["owner_groups", "reapply_update"], audit_trail)
        .step("delete_and_restore", &["audit_trail"], delete_and_restore)
        .finalizer("purge_fixtures", &[], purge_fixtures)
}

pub async fn run(client: SharedClient, policy: RetryPolicy) -> Result<SuiteReport, HarnessError> {
    let mut ctx = SqlContext::new(client, policy);
    suite().run(&mut ctx).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::InMemoryCatalog;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_sql_suite_against_lagging_catalog() {
        let _ = env_logger::builder().is_test(true).try_init();
        let catalog = Arc::new(InMemoryCatalog::with_index_lag(2));

        let report = run(catalog.clone(), RetryPolicy::immediate(10)).await.unwrap();

        println!("{}", report);
        assert!(report.is_success(), "{}", report);
        assert!(catalog.search_calls() >= 3);
    }
}
