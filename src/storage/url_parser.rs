//! URL parsing for storage backends.
//!
//! Extracts backend configuration from Azure Blob Storage URLs and local
//! filesystem paths.

use object_store::path::Path;
use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::{InvalidUrlSnafu, StorageError};

use super::{AzureConfig, LocalConfig};

const ABFS_URL: &str = r"^abfss?://(?P<container>[a-z0-9\-]+)@(?P<account>[a-z0-9]+)\.dfs\.core\.windows\.net(/(?P<key>.+))?$";
const AZURE_HTTPS: &str = r"^https://(?P<account>[a-z0-9]+)\.(blob|dfs)\.core\.windows\.net/(?P<container>[a-z0-9\-]+)(/(?P<key>.+))?$";

const FILE_URI: &str = r"^file://(?P<path>.*)$";
const FILE_URL: &str = r"^file:(?P<path>.*)$";
const FILE_PATH: &str = r"^/(?P<path>.*)$";

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
enum Backend {
    Azure,
    Local,
}

fn matchers() -> &'static HashMap<Backend, Vec<Regex>> {
    static MATCHERS: OnceLock<HashMap<Backend, Vec<Regex>>> = OnceLock::new();
    MATCHERS.get_or_init(|| {
        let mut m = HashMap::new();

        m.insert(
            Backend::Azure,
            vec![
                Regex::new(ABFS_URL).unwrap(),
                Regex::new(AZURE_HTTPS).unwrap(),
            ],
        );

        m.insert(
            Backend::Local,
            vec![
                Regex::new(FILE_URI).unwrap(),
                Regex::new(FILE_URL).unwrap(),
                Regex::new(FILE_PATH).unwrap(),
            ],
        );

        m
    })
}

/// Backend configuration enum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendConfig {
    Azure(AzureConfig),
    Local(LocalConfig),
}

impl BackendConfig {
    /// Parse a URL into a backend configuration.
    pub fn parse_url(url: &str) -> Result<Self, StorageError> {
        for (backend, patterns) in matchers() {
            if let Some(captures) = patterns.iter().filter_map(|r| r.captures(url)).next() {
                return match backend {
                    Backend::Azure => Self::parse_azure(&captures),
                    Backend::Local => Self::parse_local(&captures),
                };
            }
        }

        InvalidUrlSnafu {
            url: url.to_string(),
        }
        .fail()
    }

    fn parse_azure(captures: &regex::Captures) -> Result<Self, StorageError> {
        let container = captures
            .name("container")
            .expect("container should always be available")
            .as_str()
            .to_string();

        let account = captures
            .name("account")
            .expect("account should always be available")
            .as_str()
            .to_string();

        let key = captures.name("key").map(|m| m.as_str().into());

        Ok(BackendConfig::Azure(AzureConfig {
            account,
            container,
            key,
        }))
    }

    fn parse_local(captures: &regex::Captures) -> Result<Self, StorageError> {
        let path = captures
            .name("path")
            .expect("path regex must contain a path group")
            .as_str();

        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{path}")
        };

        Ok(BackendConfig::Local(LocalConfig { path, key: None }))
    }

    pub(crate) fn key(&self) -> Option<&Path> {
        match self {
            BackendConfig::Azure(azure) => azure.key.as_ref(),
            BackendConfig::Local(local) => local.key.as_ref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_azure_abfs_url_parsing() {
        let config = BackendConfig::parse_url(
            "abfss://landing-zone@labresults.dfs.core.windows.net/incoming",
        )
        .unwrap();
        match config {
            BackendConfig::Azure(azure) => {
                assert_eq!(azure.account, "labresults");
                assert_eq!(azure.container, "landing-zone");
                assert_eq!(azure.key, Some(Path::from("incoming")));
            }
            _ => panic!("Expected Azure config"),
        }
    }

    #[test]
    fn test_azure_https_url_parsing() {
        let config = BackendConfig::parse_url(
            "https://labresults.blob.core.windows.net/quarantine",
        )
        .unwrap();
        match config {
            BackendConfig::Azure(azure) => {
                assert_eq!(azure.account, "labresults");
                assert_eq!(azure.container, "quarantine");
                assert_eq!(azure.key, None);
            }
            _ => panic!("Expected Azure config"),
        }
    }

    #[test]
    fn test_local_path_parsing() {
        let config = BackendConfig::parse_url("/var/lib/labflow/data").unwrap();
        match config {
            BackendConfig::Local(local) => {
                assert_eq!(local.path, "/var/lib/labflow/data");
            }
            _ => panic!("Expected Local config"),
        }
    }

    #[test]
    fn test_local_file_uri_parsing() {
        let config = BackendConfig::parse_url("file:///var/lib/labflow/data").unwrap();
        match config {
            BackendConfig::Local(local) => {
                assert_eq!(local.path, "/var/lib/labflow/data");
            }
            _ => panic!("Expected Local config"),
        }
    }

    #[test]
    fn test_invalid_url() {
        assert!(BackendConfig::parse_url("invalid://url").is_err());
    }
}
