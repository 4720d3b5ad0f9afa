mod oauth;
pub mod metrics;
pub mod resources;

use anyhow::bail;
use reqwest::{
    blocking::{Client, Response},
    header::CONTENT_TYPE,
};
use tracing::debug;
use url::Url;

pub use oauth::{get_token, Credentials, DEFAULT_CREDENTIALS_FILE};

/// A blocking client for the Azure Resource Manager REST API, authorized with
/// a bearer token.
pub struct ArmClient {
    http: Client,
    endpoint: String,
    token: String,
}

impl ArmClient {
    pub fn new(management_endpoint: &str, token: String) -> anyhow::Result<Self> {
        // make sure the endpoint is usable before any request is built from it
        Url::parse(management_endpoint)?;
        Ok(Self {
            http: Client::new(),
            endpoint: management_endpoint.trim_end_matches('/').to_owned(),
            token,
        })
    }

    /// Sends a GET request to `path` (which must start with `/`) relative to
    /// the management endpoint. The response is returned whatever its status.
    fn get(&self, path: &str, query: &[(&str, &str)]) -> anyhow::Result<Response> {
        let url = Url::parse(&format!("{}{}", self.endpoint, path))?;
        debug!("GET {}", url);
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.token)
            .header(CONTENT_TYPE, "application/json")
            .query(query)
            .send()?;
        debug!("response status {}", response.status());
        Ok(response)
    }

    /// Like [`ArmClient::get`], but fails on a non-success status.
    fn get_success(&self, path: &str, query: &[(&str, &str)]) -> anyhow::Result<Response> {
        let response = self.get(path, query)?;
        if !response.status().is_success() {
            bail!("Request to {} failed with status code: {}", path, response.status());
        }
        Ok(response)
    }
}
