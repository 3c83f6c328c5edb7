use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    Json as RequestJson,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::client::{
    AssetClient, AuditClient, CatalogClient, CustomMetadataClient, InMemoryCatalog, LineageClient,
    SearchClient,
};
use crate::error::CatalogError;
use crate::model::{
    AddTagsRequest, Asset, AssetRef, AssetType, AssetUpdater, AttributeDef, AuditSearchRequest,
    AuditSearchResponse, CustomMetadataDef, CustomMetadataValues, DeleteQuery, Guid,
    LineageRequest, LineageResponse, MutationResponse, QualifiedNameQuery, RemoveTagRequest,
    SearchRequest, SearchResponse, UserContext,
};

pub type AppState<C> = Arc<C>;

/// A catalog the REST binding can serve: every request acts as the calling user
pub trait ScopedCatalog: CatalogClient + Sized + 'static {
    fn scoped(&self, user: UserContext) -> Self;
}

impl ScopedCatalog for InMemoryCatalog {
    fn scoped(&self, user: UserContext) -> Self {
        self.for_user(user)
    }
}

/// Simple health check endpoint
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// Error body; `kind` mirrors the `CatalogError` variant so clients can rebuild it
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub kind: String,
    pub error: String,
}

impl ErrorResponse {
    pub fn new(kind: &str, error: &str) -> Self {
        Self {
            kind: kind.to_string(),
            error: error.to_string(),
        }
    }
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);
pub type ApiResult<T> = Result<Json<T>, ApiError>;

pub fn status_for(error: &CatalogError) -> StatusCode {
    match error {
        CatalogError::NotFound(_) => StatusCode::NOT_FOUND,
        CatalogError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        CatalogError::Conflict(_) => StatusCode::CONFLICT,
        CatalogError::Transient(_) => StatusCode::SERVICE_UNAVAILABLE,
        CatalogError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn api_error(error: CatalogError) -> ApiError {
    let status = status_for(&error);
    if status.is_server_error() {
        log::warn!("Catalog request failed: {}", error);
    } else {
        log::debug!("Catalog request rejected: {}", error);
    }
    let message = match &error {
        CatalogError::NotFound(m)
        | CatalogError::InvalidRequest(m)
        | CatalogError::Conflict(m)
        | CatalogError::Transient(m)
        | CatalogError::Unexpected(m) => m.clone(),
    };
    (status, Json(ErrorResponse::new(error.kind(), &message)))
}

fn parse_type(type_name: &str) -> Result<AssetType, ApiError> {
    type_name
        .parse::<AssetType>()
        .map_err(|e| api_error(CatalogError::InvalidRequest(e)))
}

// Assets

pub async fn save_asset<C: ScopedCatalog>(
    State(catalog): State<AppState<C>>,
    user: UserContext,
    RequestJson(asset): RequestJson<Asset>,
) -> ApiResult<MutationResponse> {
    let response = catalog.scoped(user).save(asset).await.map_err(api_error)?;
    Ok(Json(response))
}

pub async fn update_asset<C: ScopedCatalog>(
    State(catalog): State<AppState<C>>,
    user: UserContext,
    RequestJson(updater): RequestJson<AssetUpdater>,
) -> ApiResult<MutationResponse> {
    let response = catalog
        .scoped(user)
        .update(updater)
        .await
        .map_err(api_error)?;
    Ok(Json(response))
}

pub async fn get_asset_by_guid<C: ScopedCatalog>(
    State(catalog): State<AppState<C>>,
    Path(guid): Path<Guid>,
) -> ApiResult<Asset> {
    let asset = catalog.get_by_guid(&guid).await.map_err(api_error)?;
    Ok(Json(asset))
}

pub async fn get_asset_by_qualified_name<C: ScopedCatalog>(
    State(catalog): State<AppState<C>>,
    Path(type_name): Path<String>,
    Query(query): Query<QualifiedNameQuery>,
) -> ApiResult<Asset> {
    let asset_type = parse_type(&type_name)?;
    let asset = catalog
        .get_by_qualified_name(asset_type, &query.qualified_name)
        .await
        .map_err(api_error)?;
    Ok(Json(asset))
}

/// Soft delete, or permanent removal with `?purge=true`
pub async fn delete_asset<C: ScopedCatalog>(
    State(catalog): State<AppState<C>>,
    user: UserContext,
    Path(guid): Path<Guid>,
    Query(query): Query<DeleteQuery>,
) -> ApiResult<MutationResponse> {
    let catalog = catalog.scoped(user);
    let response = if query.purge.unwrap_or(false) {
        catalog.purge(&guid).await
    } else {
        catalog.delete(&guid).await
    };
    Ok(Json(response.map_err(api_error)?))
}

pub async fn restore_asset<C: ScopedCatalog>(
    State(catalog): State<AppState<C>>,
    user: UserContext,
    RequestJson(asset): RequestJson<AssetRef>,
) -> ApiResult<MutationResponse> {
    let response = catalog
        .scoped(user)
        .restore(asset.type_name, &asset.qualified_name)
        .await
        .map_err(api_error)?;
    Ok(Json(response))
}

pub async fn add_tags<C: ScopedCatalog>(
    State(catalog): State<AppState<C>>,
    user: UserContext,
    RequestJson(request): RequestJson<AddTagsRequest>,
) -> ApiResult<MutationResponse> {
    let response = catalog
        .scoped(user)
        .add_tags(
            request.asset.type_name,
            &request.asset.qualified_name,
            request.tags,
        )
        .await
        .map_err(api_error)?;
    Ok(Json(response))
}

pub async fn remove_tag<C: ScopedCatalog>(
    State(catalog): State<AppState<C>>,
    user: UserContext,
    RequestJson(request): RequestJson<RemoveTagRequest>,
) -> ApiResult<MutationResponse> {
    let response = catalog
        .scoped(user)
        .remove_tag(
            request.asset.type_name,
            &request.asset.qualified_name,
            &request.tag,
        )
        .await
        .map_err(api_error)?;
    Ok(Json(response))
}

// Discovery

pub async fn search<C: ScopedCatalog>(
    State(catalog): State<AppState<C>>,
    RequestJson(request): RequestJson<SearchRequest>,
) -> ApiResult<SearchResponse> {
    let response = catalog.search(&request).await.map_err(api_error)?;
    Ok(Json(response))
}

pub async fn lineage<C: ScopedCatalog>(
    State(catalog): State<AppState<C>>,
    RequestJson(request): RequestJson<LineageRequest>,
) -> ApiResult<LineageResponse> {
    let response = catalog.lineage(&request).await.map_err(api_error)?;
    Ok(Json(response))
}

pub async fn audit_search<C: ScopedCatalog>(
    State(catalog): State<AppState<C>>,
    RequestJson(request): RequestJson<AuditSearchRequest>,
) -> ApiResult<AuditSearchResponse> {
    let response = catalog.audit_search(&request).await.map_err(api_error)?;
    Ok(Json(response))
}

// Custom metadata definitions

pub async fn create_custom_metadata<C: ScopedCatalog>(
    State(catalog): State<AppState<C>>,
    RequestJson(definition): RequestJson<CustomMetadataDef>,
) -> ApiResult<CustomMetadataDef> {
    let created = catalog
        .create_custom_metadata(definition)
        .await
        .map_err(api_error)?;
    Ok(Json(created))
}

pub async fn get_custom_metadata<C: ScopedCatalog>(
    State(catalog): State<AppState<C>>,
    Path(set_name): Path<String>,
) -> ApiResult<CustomMetadataDef> {
    let definition = catalog
        .get_custom_metadata(&set_name)
        .await
        .map_err(api_error)?;
    Ok(Json(definition))
}

pub async fn purge_custom_metadata<C: ScopedCatalog>(
    State(catalog): State<AppState<C>>,
    Path(set_name): Path<String>,
) -> Result<StatusCode, ApiError> {
    catalog
        .purge_custom_metadata(&set_name)
        .await
        .map_err(api_error)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn add_custom_metadata_attribute<C: ScopedCatalog>(
    State(catalog): State<AppState<C>>,
    Path(set_name): Path<String>,
    RequestJson(attribute): RequestJson<AttributeDef>,
) -> ApiResult<CustomMetadataDef> {
    let definition = catalog
        .add_custom_metadata_attribute(&set_name, attribute)
        .await
        .map_err(api_error)?;
    Ok(Json(definition))
}

pub async fn archive_custom_metadata_attribute<C: ScopedCatalog>(
    State(catalog): State<AppState<C>>,
    Path((set_name, attribute_name)): Path<(String, String)>,
) -> ApiResult<CustomMetadataDef> {
    let definition = catalog
        .archive_custom_metadata_attribute(&set_name, &attribute_name)
        .await
        .map_err(api_error)?;
    Ok(Json(definition))
}

// Custom metadata values on assets

pub async fn write_custom_metadata<C: ScopedCatalog>(
    State(catalog): State<AppState<C>>,
    user: UserContext,
    Path((guid, set_name)): Path<(Guid, String)>,
    RequestJson(body): RequestJson<CustomMetadataValues>,
) -> ApiResult<MutationResponse> {
    let catalog = catalog.scoped(user);
    let response = if body.replace {
        catalog
            .replace_custom_metadata(&guid, &set_name, body.values)
            .await
    } else {
        catalog
            .update_custom_metadata(&guid, &set_name, body.values)
            .await
    };
    Ok(Json(response.map_err(api_error)?))
}

pub async fn remove_custom_metadata<C: ScopedCatalog>(
    State(catalog): State<AppState<C>>,
    user: UserContext,
    Path((guid, set_name)): Path<(Guid, String)>,
) -> ApiResult<MutationResponse> {
    let response = catalog
        .scoped(user)
        .remove_custom_metadata(&guid, &set_name)
        .await
        .map_err(api_error)?;
    Ok(Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_body_round_trips_into_catalog_error() {
        let (status, Json(body)) = api_error(CatalogError::Conflict("taken".to_string()));
        assert_eq!(status, StatusCode::CONFLICT);

        let json = serde_json::to_string(&body).unwrap();
        let parsed: CatalogError = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, CatalogError::Conflict("taken".to_string()));
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_for(&CatalogError::Transient("busy".to_string())),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_for(&CatalogError::InvalidRequest("bad".to_string())),
            StatusCode::BAD_REQUEST
        );
    }

    #[tokio::test]
    async fn test_writes_are_attributed_to_the_caller() {
        let catalog = Arc::new(InMemoryCatalog::new());
        let asset = Asset::connection("warehouse", crate::model::ConnectorType::Postgres, vec![]);

        let Json(response) = save_asset(
            State(catalog.clone()),
            UserContext::new("alice".to_string()),
            RequestJson(asset),
        )
        .await
        .unwrap();

        let created = &response.created[0];
        assert_eq!(created.created_by, "alice");
        let Json(fetched) = get_asset_by_guid(State(catalog), Path(created.guid.clone()))
            .await
            .unwrap();
        assert_eq!(fetched.updated_by, "alice");
    }

    #[tokio::test]
    async fn test_unknown_type_name_is_bad_request() {
        let catalog = Arc::new(InMemoryCatalog::new());
        let result = get_asset_by_qualified_name(
            State(catalog),
            Path("Spreadsheet".to_string()),
            Query(QualifiedNameQuery {
                qualified_name: "x".to_string(),
            }),
        )
        .await;

        let (status, Json(body)) = result.unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.kind, "invalid_request");
    }
}
