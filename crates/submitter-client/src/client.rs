//! reqwest-backed implementation of [`ContentService`].
//!
//! Every request carries HTTP basic auth (user `deconst`, the API key as the
//! password), `Accept: application/json`, and a `submitter/<version>`
//! user agent.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use zeroize::Zeroizing;

use crate::config::ContentServiceConfig;
use crate::error::ContentServiceError;
use crate::types::{
    AssetFingerprints, AssetUrls, BulkContentResponse, ContentFingerprints, ContentPresence,
    UploadedAssetUrls,
};
use crate::ContentService;

/// Basic-auth user name the content service expects.
const AUTH_USER: &str = "deconst";

/// Media type of the bulk upload bodies.
const ARCHIVE_CONTENT_TYPE: &str = "application/tar+gzip";

/// Client for the content service API.
#[derive(Debug, Clone)]
pub struct ContentServiceClient {
    http: reqwest::Client,
    config: ContentServiceConfig,
}

impl ContentServiceClient {
    /// Create a new client from configuration.
    pub fn new(config: ContentServiceConfig) -> Result<Self, ContentServiceError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("submitter/", env!("CARGO_PKG_VERSION")))
            .default_headers({
                let mut headers = reqwest::header::HeaderMap::new();
                headers.insert(
                    reqwest::header::ACCEPT,
                    reqwest::header::HeaderValue::from_static("application/json"),
                );
                headers
            })
            .build()
            .map_err(|e| ContentServiceError::Http {
                endpoint: "client_init".into(),
                source: e,
            })?;

        Ok(Self { http, config })
    }

    fn api_key(&self) -> &Zeroizing<String> {
        &self.config.api_key
    }

    /// `GET` a JSON query body and decode a JSON response.
    async fn query<Q, R>(&self, path: &str, body: &Q) -> Result<R, ContentServiceError>
    where
        Q: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let endpoint = format!("GET /{path}");
        let url = self.config.endpoint_url(path);
        tracing::debug!(%endpoint, "querying content service");

        let resp = self
            .http
            .get(&url)
            .basic_auth(AUTH_USER, Some(self.api_key().as_str()))
            .json(body)
            .send()
            .await
            .map_err(|e| ContentServiceError::Http {
                endpoint: endpoint.clone(),
                source: e,
            })?;

        decode(endpoint, resp).await
    }

    /// `POST` a gzip tar archive and decode a JSON response.
    async fn upload<R>(&self, path: &str, archive: Vec<u8>) -> Result<R, ContentServiceError>
    where
        R: DeserializeOwned,
    {
        let endpoint = format!("POST /{path}");
        let url = self.config.endpoint_url(path);
        tracing::debug!(%endpoint, bytes = archive.len(), "uploading archive");

        let resp = self
            .http
            .post(&url)
            .basic_auth(AUTH_USER, Some(self.api_key().as_str()))
            .header(reqwest::header::CONTENT_TYPE, ARCHIVE_CONTENT_TYPE)
            .body(archive)
            .send()
            .await
            .map_err(|e| ContentServiceError::Http {
                endpoint: endpoint.clone(),
                source: e,
            })?;

        decode(endpoint, resp).await
    }
}

async fn decode<R: DeserializeOwned>(
    endpoint: String,
    resp: reqwest::Response,
) -> Result<R, ContentServiceError> {
    if !resp.status().is_success() {
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        return Err(ContentServiceError::Api {
            endpoint,
            status,
            body,
        });
    }

    resp.json()
        .await
        .map_err(|e| ContentServiceError::Deserialization {
            endpoint,
            source: e,
        })
}

impl ContentService for ContentServiceClient {
    async fn check_assets(
        &self,
        query: &AssetFingerprints,
    ) -> Result<AssetUrls, ContentServiceError> {
        self.query("checkassets", query).await
    }

    async fn bulk_asset(&self, archive: Vec<u8>) -> Result<UploadedAssetUrls, ContentServiceError> {
        self.upload("bulkasset", archive).await
    }

    async fn check_content(
        &self,
        query: &ContentFingerprints,
    ) -> Result<ContentPresence, ContentServiceError> {
        self.query("checkcontent", query).await
    }

    async fn bulk_content(
        &self,
        archive: Vec<u8>,
    ) -> Result<BulkContentResponse, ContentServiceError> {
        self.upload("bulkcontent", archive).await
    }
}
