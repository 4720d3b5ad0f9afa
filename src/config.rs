use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::time_window::JanuaryRollover;

pub const RESOURCE_TYPE_COGNITIVE_SERVICES: &str = "Microsoft.CognitiveServices/accounts";
pub const RESOURCE_TYPE_SEARCH: &str = "Microsoft.Search/searchServices";
pub const RESOURCE_TYPE_BOT_SERVICE: &str = "Microsoft.BotService/botServices";

/// Metric names queried for any resource type without its own entry.
pub const DEFAULT_METRIC_NAMES: &str = "TotalCalls";

const DEFAULT_MANAGEMENT_ENDPOINT: &str = "https://management.azure.com";
const DEFAULT_LOGIN_ENDPOINT: &str = "https://login.microsoftonline.com";

// label, subscription id
const DEFAULT_SUBSCRIPTIONS: &[(&str, &str)] = &[
    ("A01", "abcdefgh-ijkl-mnop-qrst-000000000001"),
    ("B01", "abcdefgh-ijkl-mnop-qrst-000000000002"),
    ("C01", "abcdefgh-ijkl-mnop-qrst-000000000003"),
    ("D01", "abcdefgh-ijkl-mnop-qrst-000000000004"),
    ("E01", "abcdefgh-ijkl-mnop-qrst-000000000005"),
    ("F01", "abcdefgh-ijkl-mnop-qrst-000000000006"),
    ("G01", "abcdefgh-ijkl-mnop-qrst-000000000007"),
    ("H01", "abcdefgh-ijkl-mnop-qrst-000000000008"),
    ("I01", "abcdefgh-ijkl-mnop-qrst-000000000009"),
    ("J01", "abcdefgh-ijkl-mnop-qrst-000000000010"),
    ("K01", "abcdefgh-ijkl-mnop-qrst-000000000011"),
    ("L01", "abcdefgh-ijkl-mnop-qrst-000000000012"),
    ("M01", "abcdefgh-ijkl-mnop-qrst-000000000013"),
];

// resource type, metric names
const DEFAULT_TYPE_METRIC_NAMES: &[(&str, &str)] = &[
    (RESOURCE_TYPE_SEARCH, "SkillExecutionCount,DocumentProcessedCount"),
    (RESOURCE_TYPE_BOT_SERVICE, "RequestsTraffic"),
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("the config does not list any subscriptions")]
    NoSubscriptions,
    #[error("the config does not list any resource types")]
    NoResourceTypes,
}

/// Everything about a run that is not given on the command line.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub management_endpoint: String,
    pub login_endpoint: String,
    /// Subscription label -> subscription id.
    pub subscriptions: BTreeMap<String, String>,
    pub resource_types: Vec<String>,
    /// Resource type -> comma-separated metric names. Entries given in a
    /// config file are added to the built-in ones, replacing those for the
    /// same resource type.
    pub metric_names: BTreeMap<String, String>,
    pub january_rollover: JanuaryRollover,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            management_endpoint: DEFAULT_MANAGEMENT_ENDPOINT.to_owned(),
            login_endpoint: DEFAULT_LOGIN_ENDPOINT.to_owned(),
            subscriptions: DEFAULT_SUBSCRIPTIONS
                .iter()
                .map(|&(label, id)| (label.to_owned(), id.to_owned()))
                .collect(),
            resource_types: [
                RESOURCE_TYPE_COGNITIVE_SERVICES,
                RESOURCE_TYPE_SEARCH,
                RESOURCE_TYPE_BOT_SERVICE,
            ]
            .iter()
            .map(|&ty| ty.to_owned())
            .collect(),
            metric_names: DEFAULT_TYPE_METRIC_NAMES
                .iter()
                .map(|&(ty, names)| (ty.to_owned(), names.to_owned()))
                .collect(),
            january_rollover: JanuaryRollover::default(),
        }
    }
}

impl Config {
    /// Loads the config from `path`, or returns the built-in defaults if no
    /// path was given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => {
                debug!("loading config from {}", path.display());
                let content = std::fs::read_to_string(path)
                    .map_err(|source| ConfigError::Read { path: path.to_owned(), source })?;
                Self::from_toml(&content)
                    .map_err(|source| ConfigError::Parse { path: path.to_owned(), source })?
            }
            None => {
                debug!("no config file given; using built-in defaults");
                Self::default()
            }
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        let mut config: Self = toml::from_str(content)?;
        for &(ty, names) in DEFAULT_TYPE_METRIC_NAMES {
            config.metric_names.entry(ty.to_owned()).or_insert_with(|| names.to_owned());
        }
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.subscriptions.is_empty() {
            return Err(ConfigError::NoSubscriptions);
        }
        if self.resource_types.is_empty() {
            return Err(ConfigError::NoResourceTypes);
        }
        Ok(())
    }

    /// The comma-separated metric names to query for a resource of the given
    /// type.
    pub fn metric_names_for(&self, resource_type: &str) -> &str {
        self.metric_names.get(resource_type).map(String::as_str).unwrap_or(DEFAULT_METRIC_NAMES)
    }
}
