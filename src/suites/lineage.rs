use anyhow::ensure;

use crate::client::{AssetClient, LineageClient, SharedClient};
use crate::error::{CatalogError, HarnessError};
use crate::harness::{
    expect_failure, fixtures, RetryPolicy, StepFuture, Suite, SuiteReport, UniqueNames,
};
use crate::model::{
    generate_guid, Asset, ConnectorType, Guid, LineageDirection, LineageRequest,
};
use crate::suites::require;

pub struct LineageContext {
    client: SharedClient,
    names: UniqueNames,
    connection: Option<Asset>,
    database: Option<Asset>,
    schema: Option<Asset>,
    /// Source, intermediate and target tables
    tables: Vec<Asset>,
    processes: Vec<Asset>,
}

impl LineageContext {
    pub fn new(client: SharedClient, _policy: RetryPolicy) -> Self {
        Self {
            client,
            names: UniqueNames::new("lineage"),
            connection: None,
            database: None,
            schema: None,
            tables: Vec::new(),
            processes: Vec::new(),
        }
    }

    fn created(&self) -> Vec<Asset> {
        [&self.connection, &self.database, &self.schema]
            .into_iter()
            .flatten()
            .cloned()
            .chain(self.tables.iter().cloned())
            .chain(self.processes.iter().cloned())
            .collect()
    }

    fn table(&self, index: usize) -> anyhow::Result<&Asset> {
        self.tables
            .get(index)
            .ok_or_else(|| anyhow::anyhow!("table {} was not created", index))
    }

    fn process(&self, index: usize) -> anyhow::Result<&Asset> {
        self.processes
            .get(index)
            .ok_or_else(|| anyhow::anyhow!("process {} was not created", index))
    }
}

fn expect_depth(
    depths: &[(&Guid, Option<usize>)],
    expected: &[usize],
    what: &str,
) -> anyhow::Result<()> {
    for ((guid, depth), wanted) in depths.iter().zip(expected) {
        ensure!(
            *depth == Some(*wanted),
            "{}: {} at depth {:?}, expected {}",
            what,
            guid,
            depth,
            wanted
        );
    }
    Ok(())
}

fn create_tables(ctx: &mut LineageContext) -> StepFuture<'_> {
    Box::pin(async move {
        let name = ctx.names.name("warehouse");
        let connection =
            fixtures::create_connection(&*ctx.client, &name, ConnectorType::Postgres, vec![])
                .await?;
        let database = fixtures::create(
            &*ctx.client,
            Asset::database(&ctx.names.name("db"), &connection.qualified_name),
        )
        .await?;
        let schema = fixtures::create(
            &*ctx.client,
            Asset::schema(&ctx.names.name("public"), &database.qualified_name),
        )
        .await?;
        ctx.connection = Some(connection);
        ctx.database = Some(database);

        for base in ["raw_orders", "clean_orders", "order_metrics"] {
            let table = fixtures::create(
                &*ctx.client,
                Asset::table(&ctx.names.name(base), &schema.qualified_name),
            )
            .await?;
            ctx.tables.push(table);
        }
        ctx.schema = Some(schema);
        Ok(())
    })
}

fn create_processes(ctx: &mut LineageContext) -> StepFuture<'_> {
    Box::pin(async move {
        let connection_qn = require(&ctx.connection, "connection")?.qualified_name.clone();
        let hops = [("clean", 0, 1), ("aggregate", 1, 2)];

        for (base, input, output) in hops {
            let inputs = vec![ctx.table(input)?.guid.clone()];
            let outputs = vec![ctx.table(output)?.guid.clone()];
            let process = fixtures::create(
                &*ctx.client,
                Asset::process(&ctx.names.name(base), &connection_qn, inputs, outputs),
            )
            .await?;
            ctx.processes.push(process);
        }
        Ok(())
    })
}

fn downstream_lineage(ctx: &mut LineageContext) -> StepFuture<'_> {
    Box::pin(async move {
        let source = ctx.table(0)?;
        let response = ctx
            .client
            .lineage(&LineageRequest::downstream(&source.guid))
            .await?;
        ensure!(
            response.assets.len() == 4,
            "downstream lineage holds {} assets, expected 4",
            response.assets.len()
        );
        ensure!(
            response
                .assets
                .iter()
                .all(|a| a.direction == LineageDirection::Downstream),
            "downstream lineage returned upstream assets"
        );

        let chain = [
            &ctx.process(0)?.guid,
            &ctx.table(1)?.guid,
            &ctx.process(1)?.guid,
            &ctx.table(2)?.guid,
        ];
        let depths: Vec<_> = chain
            .iter()
            .map(|guid| (*guid, response.depth_of(guid)))
            .collect();
        expect_depth(&depths, &[1, 2, 3, 4], "downstream")
    })
}

fn upstream_lineage(ctx: &mut LineageContext) -> StepFuture<'_> {
    Box::pin(async move {
        let target = ctx.table(2)?;
        let response = ctx
            .client
            .lineage(&LineageRequest::upstream(&target.guid).with_depth(2))
            .await?;
        let upstream = response.in_direction(LineageDirection::Upstream);
        ensure!(
            upstream.len() == 2,
            "depth-limited upstream lineage holds {} assets, expected 2",
            upstream.len()
        );

        let chain = [&ctx.process(1)?.guid, &ctx.table(1)?.guid];
        let depths: Vec<_> = chain
            .iter()
            .map(|guid| (*guid, response.depth_of(guid)))
            .collect();
        expect_depth(&depths, &[1, 2], "upstream")?;
        ensure!(
            response.depth_of(&ctx.table(0)?.guid).is_none(),
            "upstream lineage went past its depth limit"
        );
        Ok(())
    })
}

fn process_with_missing_input(ctx: &mut LineageContext) -> StepFuture<'_> {
    Box::pin(async move {
        let connection_qn = require(&ctx.connection, "connection")?.qualified_name.clone();
        let output = ctx.table(2)?.guid.clone();
        let broken = Asset::process(
            &ctx.names.name("broken"),
            &connection_qn,
            vec![generate_guid()],
            vec![output],
        );
        expect_failure(
            ctx.client.save(broken).await,
            CatalogError::is_invalid_request,
            "process reading a missing table",
        )?;
        Ok(())
    })
}

fn purge_breaks_lineage(ctx: &mut LineageContext) -> StepFuture<'_> {
    Box::pin(async move {
        let aggregate = ctx.process(1)?.clone();
        ensure!(
            fixtures::purge(&*ctx.client, &aggregate).await?,
            "process was already gone"
        );

        let source = ctx.table(0)?;
        let response = ctx
            .client
            .lineage(&LineageRequest::downstream(&source.guid))
            .await?;
        ensure!(
            response.depth_of(&ctx.table(2)?.guid).is_none(),
            "target still reachable after its process was purged"
        );
        ensure!(
            response.depth_of(&ctx.table(1)?.guid) == Some(2),
            "intermediate table lost its lineage"
        );
        Ok(())
    })
}

fn purge_fixtures(ctx: &mut LineageContext) -> StepFuture<'_> {
    Box::pin(async move {
        let created = ctx.created();
        let purged = fixtures::purge_all(&*ctx.client, &created).await?;
        log::info!("Purged {} lineage assets", purged);
        Ok(())
    })
}

pub fn suite() -> Suite<LineageContext> {
    Suite::new("lineage")
        .step("create_tables", &[], create_tables)
        .step("create_processes", &["create_tables"], create_processes)
        .step("downstream_lineage", &["create_processes"], downstream_lineage)
        .step("upstream_lineage", &["create_processes"], upstream_lineage)
        .step(
            "process_with_missing_input",
            &["create_tables"],
            process_with_missing_input,
        )
        .step(
            "purge_breaks_lineage",
            &["downstream_lineage", "upstream_lineage"],
            purge_breaks_lineage,
        )
        .finalizer("purge_fixtures", &[], purge_fixtures)
}

pub async fn run(client: SharedClient, policy: RetryPolicy) -> Result<SuiteReport, HarnessError> {
    let mut ctx = LineageContext::new(client, policy);
    suite().run(&mut ctx).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::InMemoryCatalog;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_lineage_suite_passes() {
        let catalog = Arc::new(InMemoryCatalog::new());
        let report = run(catalog.clone(), RetryPolicy::immediate(1)).await.unwrap();
        assert!(report.is_success(), "{}", report);
        assert_eq!(catalog.search_calls(), 0);
    }
}
