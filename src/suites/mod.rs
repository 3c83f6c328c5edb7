use anyhow::Context;

use crate::client::SharedClient;
use crate::error::HarnessError;
use crate::harness::{RetryPolicy, SuiteReport};
use crate::model::Asset;

pub mod custom_metadata;
pub mod glossary;
pub mod invalid_search;
pub mod kafka;
pub mod lineage;
pub mod s3;
pub mod sql_assets;

/// A fixture recorded by an earlier step
pub(crate) fn require<'a>(slot: &'a Option<Asset>, what: &str) -> anyhow::Result<&'a Asset> {
    slot.as_ref()
        .with_context(|| format!("{} was not created by an earlier step", what))
}

/// Run every suite concurrently; each owns its context
pub async fn run_all(
    client: SharedClient,
    policy: &RetryPolicy,
) -> Result<Vec<SuiteReport>, HarnessError> {
    let (sql, glossary, kafka, s3, custom_metadata, lineage, invalid_search) = tokio::join!(
        sql_assets::run(client.clone(), policy.clone()),
        glossary::run(client.clone(), policy.clone()),
        kafka::run(client.clone(), policy.clone()),
        s3::run(client.clone(), policy.clone()),
        custom_metadata::run(client.clone(), policy.clone()),
        lineage::run(client.clone(), policy.clone()),
        invalid_search::run(client, policy.clone()),
    );

    let reports = vec![
        sql?,
        glossary?,
        kafka?,
        s3?,
        custom_metadata?,
        lineage?,
        invalid_search?,
    ];
    for report in &reports {
        log::info!("{}", report);
    }
    Ok(reports)
}
