//! Orchestrator REST client

use async_trait::async_trait;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize};
use std::time::Duration;
use sweeper_core::{
    format_timestamp_for_rsql, Build, EntityKind, GroupBuild, OrchestratorClient, RemoteError,
    Timestamp, BUILD_OUTPUT_OK_KEY,
};

use super::{build_http_client, ensure_success, join_url, read_json, transport};
use crate::config::OrchestratorToken;
use crate::constants::{
    INDEPENDENT_TEMPORARY_BUILDS_PATH, ORCHESTRATOR_MAX_PAGES, ORCHESTRATOR_PAGE_SIZE,
    ORCHESTRATOR_SERVICE,
};

/// One page of a paged orchestrator listing.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Page<T> {
    #[serde(default)]
    total_pages: u32,
    #[serde(default = "Vec::new")]
    content: Vec<T>,
}

/// Orchestrator client over HTTP.
///
/// Reads are anonymous; attribute and delete requests carry the bearer token
/// when one is configured.
pub struct HttpOrchestratorClient {
    client: Client,
    base_url: String,
    token: Option<OrchestratorToken>,
}

impl HttpOrchestratorClient {
    pub fn new(
        base_url: impl Into<String>,
        token: Option<OrchestratorToken>,
        timeout: Duration,
    ) -> Result<Self, RemoteError> {
        Ok(Self {
            client: build_http_client(ORCHESTRATOR_SERVICE, timeout)?,
            base_url: base_url.into(),
            token,
        })
    }

    fn authenticated(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token.expose()),
            None => request,
        }
    }

    /// Fetch every page of a listing, up to `ORCHESTRATOR_MAX_PAGES`.
    ///
    /// Pages are counted locally; the server's `pageIndex` is not trusted.
    async fn get_all<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<Vec<T>, RemoteError> {
        let url = join_url(&self.base_url, path);
        let mut items = Vec::new();
        let mut page_index = 0u32;

        loop {
            let response = self
                .client
                .get(&url)
                .query(params)
                .query(&[
                    ("pageIndex", page_index.to_string()),
                    ("pageSize", ORCHESTRATOR_PAGE_SIZE.to_string()),
                ])
                .send()
                .await
                .map_err(|e| transport(ORCHESTRATOR_SERVICE, e))?;

            let page: Page<T> = read_json(ORCHESTRATOR_SERVICE, response).await?;
            let fetched = page.content.len();
            items.extend(page.content);

            page_index += 1;
            if fetched == 0 || page_index >= page.total_pages {
                break;
            }
            if page_index >= ORCHESTRATOR_MAX_PAGES {
                tracing::warn!(
                    path,
                    total_pages = page.total_pages,
                    fetched_pages = page_index,
                    "Listing exceeds page limit; remaining pages left for the next cycle"
                );
                break;
            }
        }

        Ok(items)
    }
}

#[async_trait]
impl OrchestratorClient for HttpOrchestratorClient {
    async fn unverified_builds(&self) -> Result<Vec<Build>, RemoteError> {
        self.get_all(
            "builds",
            &[
                ("running", "false".to_string()),
                ("attributes", format!("!{}", BUILD_OUTPUT_OK_KEY)),
                ("q", "buildOutputChecksum!=null".to_string()),
            ],
        )
        .await
    }

    async fn temporary_builds_older_than(
        &self,
        cutoff: Timestamp,
    ) -> Result<Vec<Build>, RemoteError> {
        self.get_all(
            INDEPENDENT_TEMPORARY_BUILDS_PATH,
            &[("timestamp", cutoff.timestamp_millis().to_string())],
        )
        .await
    }

    async fn temporary_group_builds_older_than(
        &self,
        cutoff: Timestamp,
    ) -> Result<Vec<GroupBuild>, RemoteError> {
        let query = format!(
            "temporaryBuild==TRUE;endTime<{}",
            format_timestamp_for_rsql(cutoff)
        );
        self.get_all("group-builds", &[("q", query)]).await
    }

    async fn add_build_attribute(
        &self,
        build_id: &str,
        key: &str,
        value: &str,
    ) -> Result<(), RemoteError> {
        let url = join_url(
            &self.base_url,
            &format!("builds/{}/attributes", urlencoding::encode(build_id)),
        );
        let response = self
            .authenticated(self.client.post(&url))
            .query(&[("key", key), ("value", value)])
            .send()
            .await
            .map_err(|e| transport(ORCHESTRATOR_SERVICE, e))?;

        ensure_success(ORCHESTRATOR_SERVICE, response).await?;
        Ok(())
    }

    async fn delete(
        &self,
        kind: EntityKind,
        id: &str,
        callback_url: &str,
    ) -> Result<(), RemoteError> {
        let url = join_url(
            &self.base_url,
            &format!("{}/{}", kind.path_segment(), urlencoding::encode(id)),
        );
        let response = self
            .authenticated(self.client.delete(&url))
            .query(&[("callback", callback_url)])
            .send()
            .await
            .map_err(|e| transport(ORCHESTRATOR_SERVICE, e))?;

        ensure_success(ORCHESTRATOR_SERVICE, response).await?;
        Ok(())
    }
}

impl std::fmt::Debug for HttpOrchestratorClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpOrchestratorClient")
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}
