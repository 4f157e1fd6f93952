//! Log store client for recomputed build log digests

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use sweeper_core::{LogStoreClient, RemoteError};

use super::{build_http_client, join_url, read_json, transport};
use crate::constants::{BUILD_LOG_LOGGER_NAME, LOG_STORE_SERVICE};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MetaData {
    #[serde(default)]
    md5_digest: Option<String>,
}

/// Log store client over HTTP.
#[derive(Debug)]
pub struct HttpLogStoreClient {
    client: Client,
    base_url: String,
    batch_size: u32,
}

impl HttpLogStoreClient {
    pub fn new(
        base_url: impl Into<String>,
        batch_size: u32,
        timeout: Duration,
    ) -> Result<Self, RemoteError> {
        Ok(Self {
            client: build_http_client(LOG_STORE_SERVICE, timeout)?,
            base_url: base_url.into(),
            batch_size,
        })
    }
}

/// Filter selecting the user-facing log lines of one build.
pub(crate) fn build_log_filter(build_id: &str) -> String {
    format!(
        "mdc.processContext.keyword:build-{},loggerName.keyword:{}",
        build_id, BUILD_LOG_LOGGER_NAME
    )
}

#[async_trait]
impl LogStoreClient for HttpLogStoreClient {
    async fn checksum(&self, build_id: &str) -> Result<Option<String>, RemoteError> {
        let url = join_url(&self.base_url, "metadata");
        let response = self
            .client
            .get(&url)
            .query(&[
                ("matchFilters", build_log_filter(build_id)),
                ("direction", "ASC".to_string()),
                ("maxLines", self.batch_size.to_string()),
            ])
            .send()
            .await
            .map_err(|e| transport(LOG_STORE_SERVICE, e))?;

        let metadata: MetaData = read_json(LOG_STORE_SERVICE, response).await?;
        Ok(metadata.md5_digest.filter(|digest| !digest.is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::stub;
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    #[test]
    fn test_build_log_filter() {
        assert_eq!(
            build_log_filter("1234"),
            "mdc.processContext.keyword:build-1234,loggerName.keyword:org.jboss.pnc._userlog_.build-log"
        );
    }

    #[test]
    fn test_metadata_without_digest() {
        let metadata: MetaData = serde_json::from_str("{}").expect("empty metadata");
        assert!(metadata.md5_digest.is_none());

        let metadata: MetaData =
            serde_json::from_str(r#"{"md5Digest":"d41d8cd9"}"#).expect("metadata");
        assert_eq!(metadata.md5_digest.as_deref(), Some("d41d8cd9"));
    }

    #[tokio::test]
    async fn test_checksum_query_parameters() {
        let server = stub::spawn(|_| (StatusCode::OK, json!({"md5Digest": "abc"}))).await;
        let client = HttpLogStoreClient::new(
            format!("{}/bifrost", server.base_url),
            25,
            Duration::from_secs(5),
        )
        .expect("client");

        let digest = client.checksum("1234").await.expect("digest");

        assert_eq!(digest.as_deref(), Some("abc"));
        let requests = server.requests();
        let request = &requests[0];
        assert_eq!(request.method, Method::GET);
        assert_eq!(request.path, "/bifrost/metadata");
        assert_eq!(request.query["matchFilters"], build_log_filter("1234"));
        assert_eq!(request.query["direction"], "ASC");
        assert_eq!(request.query["maxLines"], "25");
        assert!(request.authorization.is_none());
    }

    #[tokio::test]
    async fn test_empty_digest_is_missing() {
        let server = stub::spawn(|_| (StatusCode::OK, json!({"md5Digest": ""}))).await;
        let client =
            HttpLogStoreClient::new(server.base_url.clone(), 10, Duration::from_secs(5))
                .expect("client");

        assert_eq!(client.checksum("1").await.expect("response"), None);
    }

    #[tokio::test]
    async fn test_server_error_is_remote_failure() {
        let server =
            stub::spawn(|_| (StatusCode::SERVICE_UNAVAILABLE, json!({"error": "down"}))).await;
        let client =
            HttpLogStoreClient::new(server.base_url.clone(), 10, Duration::from_secs(5))
                .expect("client");

        let err = client.checksum("1").await.expect_err("unavailable");
        assert_eq!(err.status(), Some(503));
    }
}
