use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

use crate::client::traits::{
    AssetClient, AuditClient, CustomMetadataClient, LineageClient, SearchClient,
};
use crate::config::HarnessConfig;
use crate::error::{CatalogError, CatalogResult};
use crate::model::{
    AddTagsRequest, Asset, AssetRef, AssetType, AssetUpdater, AttributeDef, AuditSearchRequest,
    AuditSearchResponse, CustomMetadataDef, CustomMetadataValues, Guid, LineageRequest,
    LineageResponse, MutationResponse, RemoveTagRequest, SearchRequest, SearchResponse,
    UserContext,
};

/// Catalog client over the REST binding served by `api::create_router`
#[derive(Debug, Clone)]
pub struct HttpCatalog {
    http: reqwest::Client,
    base_url: String,
    user: UserContext,
}

impl HttpCatalog {
    pub fn new(base_url: &str, user: UserContext, timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            user,
        })
    }

    pub fn from_config(config: &HarnessConfig) -> anyhow::Result<Self> {
        Self::new(&config.base_url(), config.user(), config.timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self
            .http
            .request(method, format!("{}{}", self.base_url, path))
            .header("X-User-Id", &self.user.user_id);
        match &self.user.api_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> CatalogResult<T> {
        let response = Self::execute(builder).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| CatalogError::Unexpected(format!("Malformed response body: {}", e)))
    }

    async fn execute(builder: RequestBuilder) -> CatalogResult<Response> {
        let response = builder.send().await.map_err(Self::transport_error)?;
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(Self::status_error(status, &body))
    }

    fn transport_error(error: reqwest::Error) -> CatalogError {
        if error.is_timeout() || error.is_connect() {
            CatalogError::Transient(error.to_string())
        } else {
            CatalogError::Unexpected(error.to_string())
        }
    }

    /// Prefer the structured `{kind, error}` body, fall back to the status code
    fn status_error(status: StatusCode, body: &str) -> CatalogError {
        if let Ok(error) = serde_json::from_str::<CatalogError>(body) {
            return error;
        }
        let message = format!("{}: {}", status, body);
        match status {
            StatusCode::NOT_FOUND => CatalogError::NotFound(message),
            StatusCode::BAD_REQUEST => CatalogError::InvalidRequest(message),
            StatusCode::CONFLICT => CatalogError::Conflict(message),
            StatusCode::TOO_MANY_REQUESTS
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT => CatalogError::Transient(message),
            _ => CatalogError::Unexpected(message),
        }
    }
}

#[async_trait::async_trait]
impl AssetClient for HttpCatalog {
    async fn save(&self, asset: Asset) -> CatalogResult<MutationResponse> {
        self.send(self.request(Method::POST, "/api/assets").json(&asset))
            .await
    }

    async fn update(&self, updater: AssetUpdater) -> CatalogResult<MutationResponse> {
        self.send(self.request(Method::POST, "/api/assets/update").json(&updater))
            .await
    }

    async fn get_by_guid(&self, guid: &Guid) -> CatalogResult<Asset> {
        self.send(self.request(Method::GET, &format!("/api/assets/guid/{}", guid)))
            .await
    }

    async fn get_by_qualified_name(
        &self,
        type_name: AssetType,
        qualified_name: &str,
    ) -> CatalogResult<Asset> {
        let path = format!("/api/assets/{}/by-name", type_name);
        self.send(
            self.request(Method::GET, &path)
                .query(&[("qualified_name", qualified_name)]),
        )
        .await
    }

    async fn delete(&self, guid: &Guid) -> CatalogResult<MutationResponse> {
        self.send(self.request(Method::DELETE, &format!("/api/assets/guid/{}", guid)))
            .await
    }

    async fn restore(
        &self,
        type_name: AssetType,
        qualified_name: &str,
    ) -> CatalogResult<MutationResponse> {
        let body = AssetRef::new(type_name, qualified_name);
        self.send(self.request(Method::POST, "/api/assets/restore").json(&body))
            .await
    }

    async fn purge(&self, guid: &Guid) -> CatalogResult<MutationResponse> {
        self.send(
            self.request(Method::DELETE, &format!("/api/assets/guid/{}", guid))
                .query(&[("purge", "true")]),
        )
        .await
    }

    async fn add_tags(
        &self,
        type_name: AssetType,
        qualified_name: &str,
        tags: Vec<String>,
    ) -> CatalogResult<MutationResponse> {
        let body = AddTagsRequest {
            asset: AssetRef::new(type_name, qualified_name),
            tags,
        };
        self.send(self.request(Method::POST, "/api/assets/tags/add").json(&body))
            .await
    }

    async fn remove_tag(
        &self,
        type_name: AssetType,
        qualified_name: &str,
        tag: &str,
    ) -> CatalogResult<MutationResponse> {
        let body = RemoveTagRequest {
            asset: AssetRef::new(type_name, qualified_name),
            tag: tag.to_string(),
        };
        self.send(self.request(Method::POST, "/api/assets/tags/remove").json(&body))
            .await
    }
}

#[async_trait::async_trait]
impl SearchClient for HttpCatalog {
    async fn search(&self, request: &SearchRequest) -> CatalogResult<SearchResponse> {
        self.send(self.request(Method::POST, "/api/search").json(request))
            .await
    }
}

#[async_trait::async_trait]
impl LineageClient for HttpCatalog {
    async fn lineage(&self, request: &LineageRequest) -> CatalogResult<LineageResponse> {
        self.send(self.request(Method::POST, "/api/lineage").json(request))
            .await
    }
}

#[async_trait::async_trait]
impl AuditClient for HttpCatalog {
    async fn audit_search(
        &self,
        request: &AuditSearchRequest,
    ) -> CatalogResult<AuditSearchResponse> {
        self.send(self.request(Method::POST, "/api/audit/search").json(request))
            .await
    }
}

#[async_trait::async_trait]
impl CustomMetadataClient for HttpCatalog {
    async fn create_custom_metadata(
        &self,
        definition: CustomMetadataDef,
    ) -> CatalogResult<CustomMetadataDef> {
        self.send(
            self.request(Method::POST, "/api/typedefs/custom-metadata")
                .json(&definition),
        )
        .await
    }

    async fn get_custom_metadata(&self, display_name: &str) -> CatalogResult<CustomMetadataDef> {
        let path = format!("/api/typedefs/custom-metadata/{}", display_name);
        self.send(self.request(Method::GET, &path)).await
    }

    async fn add_custom_metadata_attribute(
        &self,
        set_name: &str,
        attribute: AttributeDef,
    ) -> CatalogResult<CustomMetadataDef> {
        let path = format!("/api/typedefs/custom-metadata/{}/attributes", set_name);
        self.send(self.request(Method::POST, &path).json(&attribute))
            .await
    }

    async fn archive_custom_metadata_attribute(
        &self,
        set_name: &str,
        attribute_name: &str,
    ) -> CatalogResult<CustomMetadataDef> {
        let path = format!(
            "/api/typedefs/custom-metadata/{}/attributes/{}/archive",
            set_name, attribute_name
        );
        self.send(self.request(Method::POST, &path)).await
    }

    async fn purge_custom_metadata(&self, set_name: &str) -> CatalogResult<()> {
        let path = format!("/api/typedefs/custom-metadata/{}", set_name);
        Self::execute(self.request(Method::DELETE, &path)).await?;
        Ok(())
    }

    async fn update_custom_metadata(
        &self,
        guid: &Guid,
        set_name: &str,
        values: BTreeMap<String, Value>,
    ) -> CatalogResult<MutationResponse> {
        let path = format!("/api/assets/guid/{}/custom-metadata/{}", guid, set_name);
        let body = CustomMetadataValues {
            values,
            replace: false,
        };
        self.send(self.request(Method::POST, &path).json(&body))
            .await
    }

    async fn replace_custom_metadata(
        &self,
        guid: &Guid,
        set_name: &str,
        values: BTreeMap<String, Value>,
    ) -> CatalogResult<MutationResponse> {
        let path = format!("/api/assets/guid/{}/custom-metadata/{}", guid, set_name);
        let body = CustomMetadataValues {
            values,
            replace: true,
        };
        self.send(self.request(Method::POST, &path).json(&body))
            .await
    }

    async fn remove_custom_metadata(
        &self,
        guid: &Guid,
        set_name: &str,
    ) -> CatalogResult<MutationResponse> {
        let path = format!("/api/assets/guid/{}/custom-metadata/{}", guid, set_name);
        self.send(self.request(Method::DELETE, &path)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structured_error_body_wins() {
        let body = r#"{"kind":"conflict","error":"already exists"}"#;
        let error = HttpCatalog::status_error(StatusCode::BAD_REQUEST, body);
        assert_eq!(error, CatalogError::Conflict("already exists".to_string()));
    }

    #[test]
    fn test_status_fallback_mapping() {
        assert!(HttpCatalog::status_error(StatusCode::SERVICE_UNAVAILABLE, "busy").is_transient());
        assert!(HttpCatalog::status_error(StatusCode::NOT_FOUND, "").is_not_found());
        assert!(matches!(
            HttpCatalog::status_error(StatusCode::INTERNAL_SERVER_ERROR, "boom"),
            CatalogError::Unexpected(_)
        ));
    }

    #[test]
    fn test_base_url_is_normalized() {
        let client = HttpCatalog::new(
            "http://localhost:3010/",
            UserContext::default_user(),
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(client.base_url(), "http://localhost:3010");
    }
}
