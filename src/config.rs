use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::IngestError;
use crate::rules::UnsupportedBundlePolicy;

pub const CONFIG_FILE_NAME: &str = "nemo-ingest.json";
pub const DEFAULT_ERROR_REPORT_LIMIT: usize = 30;
pub const DEFAULT_ROW_LIMIT: usize = crate::manifest::DEFAULT_ROW_LIMIT;
pub const DEFAULT_PUBLIC_URL_BASE: &str = "https://data.nemoarchive.org";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub controlled_vocabulary: Option<String>,
    #[serde(default)]
    pub ic_form_mapping: Option<String>,
    #[serde(default)]
    pub restricted_buckets: Option<String>,
    #[serde(default)]
    pub error_report_limit: Option<usize>,
    #[serde(default)]
    pub row_limit: Option<usize>,
    #[serde(default)]
    pub archive_root: Option<String>,
    #[serde(default)]
    pub public_url_base: Option<String>,
    #[serde(default)]
    pub unsupported_bundle_policy: Option<UnsupportedBundlePolicy>,
}

/// Config with defaults applied and paths made absolute against the
/// directory the config file was found in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub controlled_vocabulary: Option<Utf8PathBuf>,
    pub ic_form_mapping: Option<Utf8PathBuf>,
    pub restricted_buckets: Option<Utf8PathBuf>,
    pub error_report_limit: usize,
    pub row_limit: usize,
    pub archive_root: Option<Utf8PathBuf>,
    pub public_url_base: String,
    pub unsupported_bundle_policy: UnsupportedBundlePolicy,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            schema_version: 1,
            controlled_vocabulary: None,
            ic_form_mapping: None,
            restricted_buckets: None,
            error_report_limit: DEFAULT_ERROR_REPORT_LIMIT,
            row_limit: DEFAULT_ROW_LIMIT,
            archive_root: None,
            public_url_base: DEFAULT_PUBLIC_URL_BASE.to_string(),
            unsupported_bundle_policy: UnsupportedBundlePolicy::default(),
        }
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Explicit path, then `./nemo-ingest.json`, then the user config
    /// directory. `Ok(None)` when no implicit config exists.
    pub fn resolve(path: Option<&str>) -> Result<Option<ResolvedConfig>, IngestError> {
        let config_path = match path {
            Some(path) => Utf8PathBuf::from(path),
            None => match Self::locate() {
                Some(found) => found,
                None => return Ok(None),
            },
        };
        debug!(path = %config_path, "loading config");

        let content = fs::read_to_string(config_path.as_std_path())
            .map_err(|_| IngestError::ConfigRead(config_path.as_std_path().to_path_buf()))?;
        let config: Config =
            serde_json::from_str(&content).map_err(|err| IngestError::ConfigParse(err.to_string()))?;

        let base_dir = config_path
            .parent()
            .filter(|parent| !parent.as_str().is_empty())
            .unwrap_or(Utf8Path::new("."));
        Self::resolve_config(config, base_dir).map(Some)
    }

    pub fn locate() -> Option<Utf8PathBuf> {
        let local = Utf8PathBuf::from(CONFIG_FILE_NAME);
        if local.as_std_path().exists() {
            return Some(local);
        }
        BaseDirs::new()
            .and_then(|dirs| {
                Utf8PathBuf::from_path_buf(
                    dirs.config_dir().join("nemo-ingest").join(CONFIG_FILE_NAME),
                )
                .ok()
            })
            .filter(|path| path.as_std_path().exists())
    }

    pub fn resolve_config(config: Config, base_dir: &Utf8Path) -> Result<ResolvedConfig, IngestError> {
        let defaults = ResolvedConfig::default();
        let schema_version = config.schema_version.unwrap_or(1);
        if schema_version != 1 {
            return Err(IngestError::ConfigParse(format!(
                "unsupported schema_version {schema_version}"
            )));
        }
        let resolve = |value: Option<String>| value.map(|path| absolutize(base_dir, &path));

        Ok(ResolvedConfig {
            schema_version,
            controlled_vocabulary: resolve(config.controlled_vocabulary),
            ic_form_mapping: resolve(config.ic_form_mapping),
            restricted_buckets: resolve(config.restricted_buckets),
            error_report_limit: config
                .error_report_limit
                .unwrap_or(defaults.error_report_limit),
            row_limit: config.row_limit.unwrap_or(defaults.row_limit),
            archive_root: resolve(config.archive_root),
            public_url_base: config.public_url_base.unwrap_or(defaults.public_url_base),
            unsupported_bundle_policy: config
                .unsupported_bundle_policy
                .unwrap_or(defaults.unsupported_bundle_policy),
        })
    }
}

fn absolutize(base_dir: &Utf8Path, path: &str) -> Utf8PathBuf {
    let path = Utf8Path::new(path);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}
