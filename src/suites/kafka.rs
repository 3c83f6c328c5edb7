use anyhow::ensure;

use crate::client::{AssetClient, SearchClient, SharedClient};
use crate::error::{CatalogError, HarnessError};
use crate::harness::{
    expect_failure, fixtures, poll_until, retry_search_until, RetryPolicy, StepFuture, Suite,
    SuiteReport, UniqueNames,
};
use crate::model::{
    generate_guid, Aggregation, AggregationField, Asset, AssetType, AssetUpdater, ConnectorType,
    EntityStatus, SearchRequest,
};
use crate::suites::require;

const TOPICS: [(&str, u32); 2] = [("orders", 3), ("payments", 6)];

pub struct KafkaContext {
    client: SharedClient,
    policy: RetryPolicy,
    names: UniqueNames,
    connection: Option<Asset>,
    topics: Vec<Asset>,
    consumer_group: Option<Asset>,
}

impl KafkaContext {
    pub fn new(client: SharedClient, policy: RetryPolicy) -> Self {
        Self {
            client,
            policy,
            names: UniqueNames::new("kafka"),
            connection: None,
            topics: Vec::new(),
            consumer_group: None,
        }
    }

    fn created(&self) -> Vec<Asset> {
        self.connection
            .iter()
            .cloned()
            .chain(self.topics.iter().cloned())
            .chain(self.consumer_group.iter().cloned())
            .collect()
    }

    fn topic_guids(&self) -> Vec<String> {
        self.topics.iter().map(|t| t.guid.clone()).collect()
    }
}

fn create_connection(ctx: &mut KafkaContext) -> StepFuture<'_> {
    Box::pin(async move {
        let name = ctx.names.name("cluster");
        let connection =
            fixtures::create_connection(&*ctx.client, &name, ConnectorType::Kafka, vec![]).await?;
        ctx.connection = Some(connection);
        Ok(())
    })
}

fn create_topics(ctx: &mut KafkaContext) -> StepFuture<'_> {
    Box::pin(async move {
        let connection_qn = require(&ctx.connection, "connection")?.qualified_name.clone();
        for (name, partitions) in TOPICS {
            let topic = fixtures::create(
                &*ctx.client,
                Asset::kafka_topic(&ctx.names.name(name), &connection_qn, partitions),
            )
            .await?;
            ctx.topics.push(topic);
        }
        Ok(())
    })
}

fn create_consumer_group(ctx: &mut KafkaContext) -> StepFuture<'_> {
    Box::pin(async move {
        let connection_qn = require(&ctx.connection, "connection")?.qualified_name.clone();
        let topics = ctx.topic_guids();
        let group = fixtures::create(
            &*ctx.client,
            Asset::kafka_consumer_group(&ctx.names.name("billing"), &connection_qn, topics.clone()),
        )
        .await?;
        ensure!(
            group.consumer_group_topics() == topics.as_slice(),
            "consumer group topics {:?} differ from {:?}",
            group.consumer_group_topics(),
            topics
        );
        ctx.consumer_group = Some(group);
        Ok(())
    })
}

fn consumer_group_missing_topic(ctx: &mut KafkaContext) -> StepFuture<'_> {
    Box::pin(async move {
        let connection_qn = require(&ctx.connection, "connection")?.qualified_name.clone();
        let dangling = Asset::kafka_consumer_group(
            &ctx.names.name("dangling"),
            &connection_qn,
            vec![generate_guid()],
        );
        expect_failure(
            ctx.client.save(dangling).await,
            CatalogError::is_invalid_request,
            "consumer group on a missing topic",
        )?;
        Ok(())
    })
}

fn search_topics(ctx: &mut KafkaContext) -> StepFuture<'_> {
    Box::pin(async move {
        let connection = require(&ctx.connection, "connection")?;
        let request = SearchRequest::new()
            .type_name(AssetType::KafkaTopic)
            .qualified_name_prefix(&connection.qualified_name)
            .aggregate(
                "connectors",
                Aggregation::Terms {
                    field: AggregationField::Connector,
                    size: 5,
                },
            );
        let expected = ctx.topics.len() as u64;
        let response = retry_search_until(&*ctx.client, &request, expected, &ctx.policy).await?;
        ensure!(
            response.approximate_count == expected,
            "found {} topics, expected {}",
            response.approximate_count,
            expected
        );
        let kafka = response
            .aggregations
            .get("connectors")
            .map(|a| a.count_for(&ConnectorType::Kafka.to_string()))
            .unwrap_or(0);
        ensure!(kafka == expected, "connector aggregation counted {} topics", kafka);
        Ok(())
    })
}

fn unlink_topic(ctx: &mut KafkaContext) -> StepFuture<'_> {
    Box::pin(async move {
        let group = require(&ctx.consumer_group, "consumer group")?;
        let remaining = ctx.topic_guids().into_iter().take(1).collect::<Vec<_>>();
        let updated = fixtures::update(
            &*ctx.client,
            AssetUpdater::for_asset(group).topics(remaining.clone()),
        )
        .await?;
        ensure!(
            updated.consumer_group_topics() == remaining.as_slice(),
            "topic still linked"
        );
        ctx.consumer_group = Some(updated);
        Ok(())
    })
}

fn delete_and_restore_topic(ctx: &mut KafkaContext) -> StepFuture<'_> {
    Box::pin(async move {
        let topic = ctx
            .topics
            .last()
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no topic to delete"))?;
        fixtures::delete(&*ctx.client, &topic).await?;

        let deleted_request = SearchRequest::new()
            .type_name(AssetType::KafkaTopic)
            .qualified_name_prefix(&topic.qualified_name)
            .status(EntityStatus::Deleted);
        let deleted = retry_search_until(&*ctx.client, &deleted_request, 1, &ctx.policy).await?;
        ensure!(deleted.approximate_count == 1, "deleted topic not searchable");

        fixtures::restore(&*ctx.client, &topic).await?;
        let settled = poll_until(
            &ctx.policy,
            || ctx.client.search(&deleted_request),
            |response| response.approximate_count == 0,
        )
        .await?;
        ensure!(
            settled.approximate_count == 0,
            "restored topic still listed as deleted"
        );
        Ok(())
    })
}

fn purge_fixtures(ctx: &mut KafkaContext) -> StepFuture<'_> {
    Box::pin(async move {
        let created = ctx.created();
        let purged = fixtures::purge_all(&*ctx.client, &created).await?;
        log::info!("Purged {} Kafka assets", purged);
        Ok(())
    })
}

pub fn suite() -> Suite<KafkaContext> {
    Suite::new("kafka")
        .step("create_connection", &[], create_connection)
        .step("create_topics", &["create_connection"], create_topics)
        .step("create_consumer_group", &["create_topics"], create_consumer_group)
        .step(
            "consumer_group_missing_topic",
            &["create_connection"],
            consumer_group_missing_topic,
        )
        .step("search_topics", &["create_topics"], search_topics)
        .step("unlink_topic", &["create_consumer_group"], unlink_topic)
        .step(
            "delete_and_restore_topic",
            &["search_topics", "unlink_topic"],
            delete_and_restore_topic,
        )
        .finalizer("purge_fixtures", &[], purge_fixtures)
}

pub async fn run(client: SharedClient, policy: RetryPolicy) -> Result<SuiteReport, HarnessError> {
    let mut ctx = KafkaContext::new(client, policy);
    suite().run(&mut ctx).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::InMemoryCatalog;
    use crate::harness::StepOutcome;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_kafka_suite_passes() {
        let catalog = Arc::new(InMemoryCatalog::with_index_lag(2));
        let report = run(catalog, RetryPolicy::immediate(10)).await.unwrap();
        assert!(report.is_success(), "{}", report);
    }

    #[tokio::test]
    async fn test_search_failures_beyond_ceiling_fail_the_step() {
        let catalog = Arc::new(InMemoryCatalog::new());
        catalog.fail_next_searches(100);
        let report = run(catalog, RetryPolicy::immediate(3)).await.unwrap();

        assert!(matches!(
            report.outcome("search_topics"),
            Some(StepOutcome::Failed(_))
        ));
        assert!(matches!(
            report.outcome("delete_and_restore_topic"),
            Some(StepOutcome::Skipped { .. })
        ));
        assert_eq!(report.outcome("purge_fixtures"), Some(&StepOutcome::Passed));
    }
}
