use anyhow::{ensure, Context};

use crate::client::{AssetClient, CatalogClient};
use crate::error::CatalogError;
use crate::harness::assertions::expect_shape;
use crate::model::{Asset, AssetUpdater, ConnectorType, EntityStatus};

/// Whether creating this asset should also report its container as updated
fn has_container(asset: &Asset) -> bool {
    asset.detail.parent_qualified_name().is_some() || asset.detail.glossary_guid().is_some()
}

/// Save a new asset, check the response shape and return what the catalog persisted
pub async fn create(client: &dyn CatalogClient, asset: Asset) -> anyhow::Result<Asset> {
    let asset_type = asset.asset_type();
    let operation = format!("create {} '{}'", asset_type, asset.name);
    let expected_updates = usize::from(has_container(&asset));

    let response = client
        .save(asset)
        .await
        .with_context(|| operation.clone())?;
    expect_shape(&response, (1, expected_updates, 0), &operation)?;

    let created = response
        .created
        .into_iter()
        .next()
        .with_context(|| format!("{} returned no asset", operation))?;
    ensure!(
        created.asset_type() == asset_type,
        "{} returned a {}",
        operation,
        created.asset_type()
    );
    ensure!(!created.guid.is_empty(), "{} returned no guid", operation);
    ensure!(
        created.qualified_name != created.name,
        "{} kept its display name as qualified name",
        operation
    );
    log::debug!("Created {} {}", asset_type, created.qualified_name);
    Ok(created)
}

pub async fn create_connection(
    client: &dyn CatalogClient,
    name: &str,
    connector: ConnectorType,
    admin_users: Vec<String>,
) -> anyhow::Result<Asset> {
    let connection = create(client, Asset::connection(name, connector, admin_users)).await?;
    ensure!(
        connection.connector() == Some(connector),
        "connection {} lost its connector",
        connection.qualified_name
    );
    Ok(connection)
}

/// Apply an updater that must change something
pub async fn update(client: &dyn CatalogClient, updater: AssetUpdater) -> anyhow::Result<Asset> {
    let operation = format!("update {} {}", updater.type_name, updater.qualified_name);
    let response = client
        .update(updater)
        .await
        .with_context(|| operation.clone())?;
    expect_shape(&response, (0, 1, 0), &operation)?;
    response
        .updated
        .into_iter()
        .next()
        .with_context(|| format!("{} returned no asset", operation))
}

pub async fn delete(client: &dyn CatalogClient, asset: &Asset) -> anyhow::Result<Asset> {
    let operation = format!("delete {} {}", asset.asset_type(), asset.qualified_name);
    let response = client
        .delete(&asset.guid)
        .await
        .with_context(|| operation.clone())?;
    expect_shape(&response, (0, 0, 1), &operation)?;
    let deleted = &response.deleted[0];
    ensure!(
        deleted.guid == asset.guid && deleted.status == EntityStatus::Deleted,
        "{} returned {} with status {}",
        operation,
        deleted.guid,
        deleted.status
    );
    Ok(deleted.clone())
}

pub async fn restore(client: &dyn CatalogClient, asset: &Asset) -> anyhow::Result<Asset> {
    let operation = format!("restore {} {}", asset.asset_type(), asset.qualified_name);
    let response = client
        .restore(asset.asset_type(), &asset.qualified_name)
        .await
        .with_context(|| operation.clone())?;
    expect_shape(&response, (0, 1, 0), &operation)?;
    let restored = &response.updated[0];
    ensure!(
        restored.is_active(),
        "{} left status {}",
        operation,
        restored.status
    );
    Ok(restored.clone())
}

/// Permanently remove an asset; one that is already gone counts as purged.
///
/// Returns whether this call did the removal.
pub async fn purge(client: &dyn CatalogClient, asset: &Asset) -> anyhow::Result<bool> {
    let operation = format!("purge {} {}", asset.asset_type(), asset.qualified_name);
    match client.purge(&asset.guid).await {
        Ok(response) => {
            expect_shape(&response, (0, 0, 1), &operation)?;
            Ok(true)
        }
        Err(CatalogError::NotFound(_)) => {
            log::debug!("{}: already gone", operation);
            Ok(false)
        }
        Err(error) => Err(error).with_context(|| operation),
    }
}

/// Purge children before parents: `assets` is in creation order and is walked in reverse.
/// Every purge is attempted; the first failure is returned afterwards.
pub async fn purge_all(client: &dyn CatalogClient, assets: &[Asset]) -> anyhow::Result<usize> {
    let mut purged = 0;
    let mut first_error: Option<anyhow::Error> = None;

    for asset in assets.iter().rev() {
        match purge(client, asset).await {
            Ok(true) => purged += 1,
            Ok(false) => {}
            Err(error) => {
                log::error!("{:#}", error);
                first_error.get_or_insert(error);
            }
        }
    }

    match first_error {
        Some(error) => Err(error),
        None => Ok(purged),
    }
}
