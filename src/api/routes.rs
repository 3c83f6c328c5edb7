use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::api::handlers::{self, ScopedCatalog};

pub fn create_router<C: ScopedCatalog>() -> Router<Arc<C>> {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Assets
        .route("/api/assets", post(handlers::save_asset::<C>))
        .route("/api/assets/update", post(handlers::update_asset::<C>))
        .route("/api/assets/restore", post(handlers::restore_asset::<C>))
        .route(
            "/api/assets/guid/:guid",
            get(handlers::get_asset_by_guid::<C>).delete(handlers::delete_asset::<C>),
        )
        .route(
            "/api/assets/:type_name/by-name",
            get(handlers::get_asset_by_qualified_name::<C>),
        )
        // Tags
        .route("/api/assets/tags/add", post(handlers::add_tags::<C>))
        .route("/api/assets/tags/remove", post(handlers::remove_tag::<C>))
        // Custom metadata values on an asset
        .route(
            "/api/assets/guid/:guid/custom-metadata/:set_name",
            post(handlers::write_custom_metadata::<C>)
                .delete(handlers::remove_custom_metadata::<C>),
        )
        // Discovery
        .route("/api/search", post(handlers::search::<C>))
        .route("/api/lineage", post(handlers::lineage::<C>))
        .route("/api/audit/search", post(handlers::audit_search::<C>))
        // Custom metadata definitions
        .route(
            "/api/typedefs/custom-metadata",
            post(handlers::create_custom_metadata::<C>),
        )
        .route(
            "/api/typedefs/custom-metadata/:set_name",
            get(handlers::get_custom_metadata::<C>).delete(handlers::purge_custom_metadata::<C>),
        )
        .route(
            "/api/typedefs/custom-metadata/:set_name/attributes",
            post(handlers::add_custom_metadata_attribute::<C>),
        )
        .route(
            "/api/typedefs/custom-metadata/:set_name/attributes/:attribute_name/archive",
            post(handlers::archive_custom_metadata_attribute::<C>),
        )
}
