use std::fs;

use assert_matches::assert_matches;
use camino::{Utf8Path, Utf8PathBuf};

use nemo_ingest::config::{Config, ConfigLoader, DEFAULT_PUBLIC_URL_BASE};
use nemo_ingest::error::IngestError;
use nemo_ingest::rules::UnsupportedBundlePolicy;

#[test]
fn parse_config_defaults() {
    let resolved = ConfigLoader::resolve_config(Config::default(), Utf8Path::new(".")).unwrap();
    assert_eq!(resolved.schema_version, 1);
    assert_eq!(resolved.error_report_limit, 30);
    assert_eq!(resolved.row_limit, 50_000);
    assert_eq!(resolved.public_url_base, DEFAULT_PUBLIC_URL_BASE);
    assert_eq!(resolved.unsupported_bundle_policy, UnsupportedBundlePolicy::Skip);
    assert!(resolved.controlled_vocabulary.is_none());
}

#[test]
fn explicit_path_is_loaded() {
    let dir = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
    let path = root.join("nemo-ingest.json");
    fs::write(
        &path,
        r#"{"schema_version": 1, "controlled_vocabulary": "aux/cv.json", "row_limit": 10}"#,
    )
    .unwrap();

    let resolved = ConfigLoader::resolve(Some(path.as_str())).unwrap().unwrap();
    assert_eq!(resolved.controlled_vocabulary, Some(root.join("aux/cv.json")));
    assert_eq!(resolved.row_limit, 10);
}

#[test]
fn unreadable_and_malformed_configs() {
    assert_matches!(
        ConfigLoader::resolve(Some("/no/such/nemo-ingest.json")),
        Err(IngestError::ConfigRead(_))
    );

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.json");
    fs::write(&path, "{ not json").unwrap();
    assert_matches!(
        ConfigLoader::resolve(path.to_str()),
        Err(IngestError::ConfigParse(_))
    );

    let config: Config = serde_json::from_str(r#"{"schema_version": 2}"#).unwrap();
    assert_matches!(
        ConfigLoader::resolve_config(config, Utf8Path::new(".")),
        Err(IngestError::ConfigParse(_))
    );
}
