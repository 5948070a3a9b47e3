//! Typed Jira Assets client
//!
//! Thin layer over [`RequestExecutor`]: builds requests for the object,
//! AQL and object-type endpoints and decodes their payloads.

use futures::future::join_all;
use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;

use super::models::{AqlPage, AssetObject, AssetRef, InvalidAssetRef};
use super::resilience::{RequestExecutor, RequestFailure};
use super::schema::{ObjectTypeSchema, ResolvedAttribute, SchemaRegistry};
use super::transport::ApiRequest;

/// Page size used by AQL searches unless the caller picks one
pub const DEFAULT_PAGE_SIZE: usize = 50;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{context}: {source}")]
    Request {
        context: String,
        #[source]
        source: RequestFailure,
    },
    #[error("unexpected response for {context}: {source}")]
    UnexpectedPayload {
        context: String,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    InvalidRef(#[from] InvalidAssetRef),
}

/// `PUT /object/{id}` request replacing the given attribute values
pub fn update_object_request(asset: AssetRef, attributes: &[ResolvedAttribute]) -> ApiRequest {
    let attributes: Vec<Value> = attributes
        .iter()
        .map(|a| {
            json!({
                "objectTypeAttributeId": a.attribute_id,
                "objectAttributeValues": [{"value": a.value}],
            })
        })
        .collect();

    ApiRequest::put(
        format!("/object/{}", asset.id()),
        json!({
            "objectTypeId": asset.object_type().to_string(),
            "attributes": attributes,
            "avatarUUID": "",
            "hasAvatar": false,
        }),
    )
}

#[derive(Clone)]
pub struct AssetsClient {
    executor: Arc<RequestExecutor>,
}

impl AssetsClient {
    pub fn new(executor: Arc<RequestExecutor>) -> Self {
        Self { executor }
    }

    pub fn executor(&self) -> &Arc<RequestExecutor> {
        &self.executor
    }

    async fn request<T: DeserializeOwned>(
        &self,
        request: ApiRequest,
        context: impl Into<String>,
    ) -> Result<T, ApiError> {
        let context = context.into();
        let payload = self
            .executor
            .execute(&request)
            .await
            .into_result()
            .map_err(|source| ApiError::Request {
                context: context.clone(),
                source,
            })?;
        serde_json::from_value(payload).map_err(|source| ApiError::UnexpectedPayload { context, source })
    }

    /// Fetch one object; `None` when the service answers 404
    pub async fn get_object(&self, id: u64) -> Result<Option<AssetObject>, ApiError> {
        match self
            .request::<AssetObject>(ApiRequest::get(format!("/object/{}", id)), format!("get object {}", id))
            .await
        {
            Ok(object) => Ok(Some(object)),
            Err(ApiError::Request { source, .. }) if source.status == Some(404) => {
                debug!("Object {} not found", id);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Run one page of an AQL search
    pub async fn search_objects(
        &self,
        aql: &str,
        start_at: usize,
        max_results: usize,
    ) -> Result<AqlPage, ApiError> {
        let request = ApiRequest::post("/object/aql", json!({ "qlQuery": aql }))
            .with_query("startAt", start_at)
            .with_query("maxResults", max_results)
            .with_query("includeAttributes", true);

        self.request(request, format!("AQL search '{}'", aql)).await
    }

    /// Page through an AQL search, stopping at `limit` objects if given
    pub async fn search_all(
        &self,
        aql: &str,
        page_size: usize,
        limit: Option<usize>,
    ) -> Result<Vec<AssetObject>, ApiError> {
        let page_size = page_size.max(1);
        let mut objects = Vec::new();
        let mut start_at = 0;

        loop {
            let page = self.search_objects(aql, start_at, page_size).await?;
            let fetched = page.values.len();
            let has_more = page.has_more();
            objects.extend(page.values);
            debug!("AQL page at {} returned {} objects", start_at, fetched);

            if let Some(limit) = limit {
                if objects.len() >= limit {
                    objects.truncate(limit);
                    break;
                }
            }
            if fetched == 0 || !has_more {
                break;
            }
            start_at += fetched;
        }

        Ok(objects)
    }

    /// Replace attribute values on one object
    pub async fn update_object(
        &self,
        asset: AssetRef,
        attributes: &[ResolvedAttribute],
    ) -> Result<Value, ApiError> {
        self.request(
            update_object_request(asset, attributes),
            format!("update object {}", asset.id()),
        )
        .await
    }

    pub async fn fetch_object_type_schema(&self, object_type: u64) -> Result<ObjectTypeSchema, ApiError> {
        let context = format!("attributes of object type {}", object_type);
        let payload: Value = self
            .request(ApiRequest::get(format!("/objecttype/{}/attributes", object_type)), context.clone())
            .await?;
        ObjectTypeSchema::from_api(object_type, payload)
            .map_err(|source| ApiError::UnexpectedPayload { context, source })
    }

    /// Fetch the schema of every distinct object type, concurrently.
    ///
    /// A type whose schema cannot be fetched is left out of the registry, so
    /// its objects are skipped later instead of failing the whole batch.
    pub async fn load_schemas(&self, object_types: impl IntoIterator<Item = u64>) -> SchemaRegistry {
        let distinct: BTreeSet<u64> = object_types.into_iter().collect();
        let results = join_all(
            distinct
                .into_iter()
                .map(|object_type| self.fetch_object_type_schema(object_type)),
        )
        .await;

        results
            .into_iter()
            .filter_map(|result| match result {
                Ok(schema) => Some(schema),
                Err(e) => {
                    warn!("Skipping object type without a schema: {}", e);
                    None
                }
            })
            .collect()
    }
}
