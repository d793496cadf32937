use async_trait::async_trait;
use reqwest::Client;
use shared::protocol::{subcategory_listing_path, SubcategoryRecord, CATEGORY_QUERY_PARAM};
use tracing::debug;
use url::Url;

use crate::{config::SyncSettings, error::FetchError};

#[async_trait]
pub trait SubcategorySource: Send + Sync {
    async fn list_subcategories(
        &self,
        category: &str,
    ) -> Result<Vec<SubcategoryRecord>, FetchError>;
}

/// Listing endpoint client: `GET {base}/admin/{domain}/api/subcategories/?category_id=..`.
#[derive(Debug, Clone)]
pub struct HttpSubcategorySource {
    http: Client,
    endpoint: Url,
}

impl HttpSubcategorySource {
    pub fn new(base_url: &str, domain: &str) -> Result<Self, FetchError> {
        Self::with_client(Client::new(), base_url, domain)
    }

    pub fn from_settings(settings: &SyncSettings) -> Result<Self, FetchError> {
        let http = Client::builder()
            .timeout(settings.request_timeout)
            .build()?;
        Self::with_client(http, &settings.base_url, &settings.domain)
    }

    pub fn with_client(http: Client, base_url: &str, domain: &str) -> Result<Self, FetchError> {
        let mut base = Url::parse(base_url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let endpoint = base.join(subcategory_listing_path(domain).trim_start_matches('/'))?;
        Ok(Self { http, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn request_url(&self, category: &str) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair(CATEGORY_QUERY_PARAM, category);
        url
    }
}

#[async_trait]
impl SubcategorySource for HttpSubcategorySource {
    async fn list_subcategories(
        &self,
        category: &str,
    ) -> Result<Vec<SubcategoryRecord>, FetchError> {
        let url = self.request_url(category);
        debug!(%url, "fetching subcategories");

        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await?;
        let records: Vec<SubcategoryRecord> = serde_json::from_slice(&body)?;
        Ok(records)
    }
}

#[cfg(test)]
#[path = "tests/source_tests.rs"]
mod tests;
