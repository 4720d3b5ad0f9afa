use std::{collections::HashMap, path::Path};

use anyhow::Context as _;
use oauth2::{
    basic::BasicClient, reqwest::http_client, AuthType, AuthUrl, ClientId, ClientSecret, Scope,
    TokenResponse as _, TokenUrl,
};
use thiserror::Error;
use tracing::{debug, trace};

pub const KEY_CLIENT_ID: &str = "sp_client_id";
pub const KEY_CLIENT_SECRET: &str = "sp_client_secret";
pub const KEY_TENANT_ID: &str = "sp_tenant_id";

pub const DEFAULT_CREDENTIALS_FILE: &str = "/root/.sp_cred";

#[derive(Debug, Error)]
pub enum CredentialsError {
    #[error("'{0}' is not set in the credentials file or the environment")]
    Missing(&'static str),
    #[error("failed to read credentials file {path}")]
    Unreadable {
        path: String,
        #[source]
        source: dotenvy::Error,
    },
}

/// Service principal credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub tenant_id: String,
}
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("tenant_id", &self.tenant_id)
            .finish()
    }
}

impl Credentials {
    /// Reads credentials from a dotenv-style file. Keys absent from the file
    /// (or a file that does not exist) fall back to environment variables of
    /// the same name.
    pub fn load(path: &Path) -> Result<Self, CredentialsError> {
        let from_file = match dotenvy::from_path_iter(path) {
            Ok(iter) => iter.collect::<Result<HashMap<_, _>, _>>().map_err(|source| {
                CredentialsError::Unreadable { path: path.display().to_string(), source }
            })?,
            Err(e) if e.not_found() => {
                debug!("credentials file {} does not exist", path.display());
                HashMap::new()
            }
            Err(source) => {
                return Err(CredentialsError::Unreadable {
                    path: path.display().to_string(),
                    source,
                })
            }
        };
        Self::from_lookup(|key| from_file.get(key).cloned().or_else(|| std::env::var(key).ok()))
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, CredentialsError> {
        let get = |key: &'static str| {
            lookup(key).filter(|val| !val.is_empty()).ok_or(CredentialsError::Missing(key))
        };
        Ok(Credentials {
            client_id: get(KEY_CLIENT_ID)?,
            client_secret: get(KEY_CLIENT_SECRET)?,
            tenant_id: get(KEY_TENANT_ID)?,
        })
    }
}

/// Exchanges the credentials for a bearer token scoped to the management
/// audience using the client credentials grant.
pub fn get_token(
    login_endpoint: &str,
    management_endpoint: &str,
    creds: &Credentials,
) -> anyhow::Result<String> {
    let base = format!("{}/{}/oauth2/v2.0", login_endpoint.trim_end_matches('/'), creds.tenant_id);
    let client = BasicClient::new(
        ClientId::new(creds.client_id.clone()),
        Some(ClientSecret::new(creds.client_secret.clone())),
        AuthUrl::new(format!("{}/authorize", base))?,
        Some(TokenUrl::new(format!("{}/token", base))?),
    )
    .set_auth_type(AuthType::RequestBody);

    let scope = format!("{}/.default", management_endpoint.trim_end_matches('/'));
    debug!("requesting token for scope {}", scope);
    let token = client
        .exchange_client_credentials()
        .add_scope(Scope::new(scope))
        .request(http_client)
        .context("failed to obtain an access token for the service principal")?;
    trace!("token expires in {:?}", token.expires_in());
    Ok(token.access_token().secret().to_owned())
}
