use super::IngestSource;
use crate::model::{Page, PageRequest, Record};
use async_trait::async_trait;
use chrono::SecondsFormat;
use logpull_core::config::ApiConfig;
use logpull_core::error::ResponseMeta;
use logpull_core::{Error, Result, SourceError};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument};

const LIST_LOGS_PATH: &str = "/api/v2/logs/events";

// Response of GET /api/v2/logs/events
#[derive(Debug, Deserialize)]
struct ListLogsResponse {
    #[serde(default)]
    data: Vec<Record>,
    #[serde(default)]
    meta: Option<ResponseMetadata>,
}

#[derive(Debug, Deserialize)]
struct ResponseMetadata {
    #[serde(default)]
    page: Option<ResponsePage>,
}

#[derive(Debug, Deserialize)]
struct ResponsePage {
    #[serde(default)]
    after: Option<String>,
}

pub struct DatadogSource {
    client: Client,
    base_url: String,
    api_key: String,
    app_key: String,
}

impl DatadogSource {
    pub fn new(config: &ApiConfig, api_key: String, app_key: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(concat!("logpull/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url(&config.site),
            api_key,
            app_key,
        })
    }
}

fn base_url(site: &str) -> String {
    if site.starts_with("http://") || site.starts_with("https://") {
        site.trim_end_matches('/').to_string()
    } else {
        format!("https://api.{}", site)
    }
}

fn query_params(request: &PageRequest) -> Vec<(&'static str, String)> {
    let mut params = Vec::with_capacity(6);

    if !request.query.is_empty() {
        params.push(("filter[query]", request.query.clone()));
    }
    if let Some(index) = &request.index {
        params.push(("filter[indexes]", index.clone()));
    }
    if let Some(from) = request.from {
        params.push(("filter[from]", from.to_rfc3339_opts(SecondsFormat::Secs, true)));
    }
    if let Some(to) = request.to {
        params.push(("filter[to]", to.to_rfc3339_opts(SecondsFormat::Secs, true)));
    }
    params.push(("page[limit]", request.page_size.to_string()));
    if let Some(cursor) = request.cursor.as_deref().filter(|c| !c.is_empty()) {
        params.push(("page[cursor]", cursor.to_string()));
    }

    params
}

fn parse_body(body: &[u8]) -> std::result::Result<Page, serde_json::Error> {
    let response: ListLogsResponse = serde_json::from_slice(body)?;
    let cursor = response
        .meta
        .and_then(|m| m.page)
        .and_then(|p| p.after)
        .filter(|c| !c.is_empty());

    Ok(Page::new(response.data, cursor))
}

#[async_trait]
impl IngestSource for DatadogSource {
    #[instrument(skip(self, request), fields(cursor = ?request.cursor))]
    async fn fetch_page(&self, request: &PageRequest) -> std::result::Result<Page, SourceError> {
        let url = format!("{}{}", self.base_url, LIST_LOGS_PATH);

        let response = self
            .client
            .get(&url)
            .header("DD-API-KEY", &self.api_key)
            .header("DD-APPLICATION-KEY", &self.app_key)
            .header(reqwest::header::ACCEPT, "application/json")
            .query(&query_params(request))
            .send()
            .await
            .map_err(|e| SourceError::transport(format!("request to {} failed: {}", url, e)))?;

        let meta = ResponseMeta::new(response.status()).with_headers(response.headers().clone());

        let body = response.bytes().await.map_err(|e| {
            SourceError::with_response(format!("failed to read response body: {}", e), meta.clone())
        })?;

        if !meta.status.is_success() {
            let details = String::from_utf8_lossy(&body);
            return Err(SourceError::with_response(
                format!("{} {}", meta.status, details.trim()),
                meta,
            ));
        }

        let page = parse_body(&body).map_err(|e| {
            SourceError::with_response(format!("failed to decode response: {}", e), meta.clone())
        })?;

        debug!(
            records = page.records.len(),
            has_more = page.next_cursor().is_some(),
            "Fetched page"
        );

        Ok(page)
    }

    fn source_id(&self) -> &str {
        "datadog"
    }
}
