use crate::error::CatalogResult;
use crate::model::{
    Asset, AssetType, AssetUpdater, AttributeDef, AuditSearchRequest, AuditSearchResponse,
    CustomMetadataDef, Guid, LineageRequest, LineageResponse, MutationResponse, SearchRequest,
    SearchResponse,
};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

#[async_trait::async_trait]
pub trait AssetClient: Send + Sync {
    /// Create a new asset, or replace the mutable attributes of an existing one
    async fn save(&self, asset: Asset) -> CatalogResult<MutationResponse>;
    /// Merge the updater's changes into an existing asset
    async fn update(&self, updater: AssetUpdater) -> CatalogResult<MutationResponse>;
    async fn get_by_guid(&self, guid: &Guid) -> CatalogResult<Asset>;
    async fn get_by_qualified_name(
        &self,
        type_name: AssetType,
        qualified_name: &str,
    ) -> CatalogResult<Asset>;
    /// Soft delete; reversible through `restore`
    async fn delete(&self, guid: &Guid) -> CatalogResult<MutationResponse>;
    async fn restore(
        &self,
        type_name: AssetType,
        qualified_name: &str,
    ) -> CatalogResult<MutationResponse>;
    /// Permanent removal
    async fn purge(&self, guid: &Guid) -> CatalogResult<MutationResponse>;
    async fn add_tags(
        &self,
        type_name: AssetType,
        qualified_name: &str,
        tags: Vec<String>,
    ) -> CatalogResult<MutationResponse>;
    async fn remove_tag(
        &self,
        type_name: AssetType,
        qualified_name: &str,
        tag: &str,
    ) -> CatalogResult<MutationResponse>;
}

#[async_trait::async_trait]
pub trait SearchClient: Send + Sync {
    async fn search(&self, request: &SearchRequest) -> CatalogResult<SearchResponse>;
}

#[async_trait::async_trait]
pub trait LineageClient: Send + Sync {
    async fn lineage(&self, request: &LineageRequest) -> CatalogResult<LineageResponse>;
}

#[async_trait::async_trait]
pub trait AuditClient: Send + Sync {
    /// Entries for one asset, newest first
    async fn audit_search(&self, request: &AuditSearchRequest)
        -> CatalogResult<AuditSearchResponse>;
}

/// Custom-metadata definitions and their values on assets. Values are keyed by display names.
#[async_trait::async_trait]
pub trait CustomMetadataClient: Send + Sync {
    async fn create_custom_metadata(
        &self,
        definition: CustomMetadataDef,
    ) -> CatalogResult<CustomMetadataDef>;
    async fn get_custom_metadata(&self, display_name: &str) -> CatalogResult<CustomMetadataDef>;
    async fn add_custom_metadata_attribute(
        &self,
        set_name: &str,
        attribute: AttributeDef,
    ) -> CatalogResult<CustomMetadataDef>;
    async fn archive_custom_metadata_attribute(
        &self,
        set_name: &str,
        attribute_name: &str,
    ) -> CatalogResult<CustomMetadataDef>;
    async fn purge_custom_metadata(&self, set_name: &str) -> CatalogResult<()>;
    /// Merge values into the set on an asset
    async fn update_custom_metadata(
        &self,
        guid: &Guid,
        set_name: &str,
        values: BTreeMap<String, Value>,
    ) -> CatalogResult<MutationResponse>;
    /// Replace every value of the set on an asset
    async fn replace_custom_metadata(
        &self,
        guid: &Guid,
        set_name: &str,
        values: BTreeMap<String, Value>,
    ) -> CatalogResult<MutationResponse>;
    async fn remove_custom_metadata(
        &self,
        guid: &Guid,
        set_name: &str,
    ) -> CatalogResult<MutationResponse>;
}

pub trait CatalogClient:
    AssetClient + SearchClient + LineageClient + AuditClient + CustomMetadataClient + Send + Sync
{
}
impl<T> CatalogClient for T where
    T: AssetClient + SearchClient + LineageClient + AuditClient + CustomMetadataClient + Send + Sync
{
}

pub type SharedClient = Arc<dyn CatalogClient>;
