use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use tracing::{info, warn};

use crate::bundle::Bundle;
use crate::classify::classify;
use crate::config::ResolvedConfig;
use crate::domain::{BundleState, SubmissionName, Technique};
use crate::error::IngestError;
use crate::manifest::{ManifestValidator, ValidationOutcome, read_manifest};
use crate::restricted::RestrictedAccess;
use crate::rules::RuleRegistry;
use crate::store::Store;
use crate::vocabulary::ControlledVocabulary;

#[derive(Debug, Clone, Default)]
pub struct ValidateOptions {
    pub skip_header_check: bool,
    pub error_dir: Option<Utf8PathBuf>,
    pub dry_run: bool,
    pub error_limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmissionReport {
    pub submission_id: Option<String>,
    pub original_filename: String,
    pub manifest_path: String,
    pub program: String,
    pub result: bool,
    pub dryrun: bool,
    pub errors: Vec<String>,
    pub complete_errors: bool,
    pub error_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_path: Option<String>,
    pub bundles: Vec<BundleSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BundleSummary {
    pub prefix: String,
    pub kind: String,
    pub state: String,
    pub files: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_url: Option<String>,
}

impl From<&Bundle> for BundleSummary {
    fn from(bundle: &Bundle) -> Self {
        Self {
            prefix: bundle.prefix().to_string(),
            kind: bundle.kind().to_string(),
            state: bundle.state().to_string(),
            files: bundle
                .members()
                .iter()
                .map(|member| member.path().to_string())
                .collect(),
            warnings: bundle.warnings().to_vec(),
            release_path: bundle.release_path().map(|path| path.to_string()),
            public_url: None,
        }
    }
}

impl SubmissionReport {
    /// Render an outcome, keeping at most `limit` errors inline.
    pub fn from_outcome(
        manifest: &Utf8Path,
        outcome: &ValidationOutcome,
        limit: usize,
        dry_run: bool,
        error_path: Option<&Utf8Path>,
    ) -> Self {
        let original_filename = manifest.file_name().unwrap_or(manifest.as_str()).to_string();
        let submission_id = original_filename
            .parse::<SubmissionName>()
            .ok()
            .map(|name| name.submission_id().to_string());
        let complete_errors = outcome.errors.len() <= limit;
        Self {
            submission_id,
            original_filename,
            manifest_path: manifest.to_string(),
            program: outcome.program.clone(),
            result: outcome.is_valid(),
            dryrun: dry_run,
            errors: outcome.errors.iter().take(limit).cloned().collect(),
            complete_errors,
            error_count: outcome.errors.len(),
            error_path: error_path.map(|path| path.to_string()),
            bundles: outcome.files.bundles.iter().map(BundleSummary::from).collect(),
        }
    }
}

/// Full error list as stored next to the report.
pub fn error_file_contents(errors: &[String]) -> String {
    if errors.is_empty() {
        "No errors".to_string()
    } else {
        errors.join("\n")
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassifyResult {
    pub filename: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug)]
pub struct App {
    config: ResolvedConfig,
    vocabulary: ControlledVocabulary,
    restricted: Option<RestrictedAccess>,
}

impl App {
    pub fn new(
        config: ResolvedConfig,
        vocabulary: ControlledVocabulary,
        restricted: Option<RestrictedAccess>,
    ) -> Self {
        Self {
            config,
            vocabulary,
            restricted,
        }
    }

    /// Load the auxiliary files named by the config. An explicit
    /// `vocabulary` path stands in for a missing config.
    pub fn from_config(
        config: Option<ResolvedConfig>,
        vocabulary: Option<&Utf8Path>,
    ) -> Result<Self, IngestError> {
        let has_config = config.is_some();
        let config = config.unwrap_or_default();
        let vocabulary_path = match (vocabulary, config.controlled_vocabulary.as_deref()) {
            (Some(path), _) | (None, Some(path)) => path.to_path_buf(),
            (None, None) if has_config => return Err(IngestError::MissingVocabulary),
            (None, None) => return Err(IngestError::MissingConfig),
        };
        let vocabulary = ControlledVocabulary::load(&vocabulary_path)?;

        let restricted = match (&config.ic_form_mapping, &config.restricted_buckets) {
            (Some(mapping), Some(buckets)) => Some(RestrictedAccess::load(mapping, buckets)?),
            _ => None,
        };
        Ok(Self::new(config, vocabulary, restricted))
    }

    pub fn validate(
        &self,
        manifest: &Utf8Path,
        options: &ValidateOptions,
    ) -> Result<SubmissionReport, IngestError> {
        let name = manifest.file_name().unwrap_or(manifest.as_str());
        if let Err(err) = name.parse::<SubmissionName>() {
            warn!("{err}");
        }

        let rows = read_manifest(manifest, options.skip_header_check)?;
        let mut outcome = ManifestValidator::new(&self.vocabulary)
            .with_restricted(self.restricted.as_ref())
            .with_rules(RuleRegistry::standard())
            .with_policy(self.config.unsupported_bundle_policy)
            .with_row_limit(self.config.row_limit)
            .with_archive_root(self.config.archive_root.clone())
            .validate(&rows);
        let public_urls = self.plan_releases(&mut outcome);

        let error_path = match &options.error_dir {
            Some(dir) => {
                let path = dir.join(format!("{name}.errors"));
                Store::write_bytes_atomic(&path, error_file_contents(&outcome.errors).as_bytes())?;
                info!(path = %path, errors = outcome.errors.len(), "errors written");
                Some(path)
            }
            None => None,
        };

        let limit = options.error_limit.unwrap_or(self.config.error_report_limit);
        let mut report = SubmissionReport::from_outcome(
            manifest,
            &outcome,
            limit,
            options.dry_run,
            error_path.as_deref(),
        );
        for (summary, url) in report.bundles.iter_mut().zip(public_urls) {
            summary.public_url = url;
        }
        info!(result = report.result, "{}", if report.result { "VALID" } else { "INVALID" });
        Ok(report)
    }

    /// Pick release archive names for the valid bundles against the archive
    /// on disk and derive their public URLs. Nothing is planned without an
    /// archive root.
    fn plan_releases(&self, outcome: &mut ValidationOutcome) -> Vec<Option<String>> {
        let Some(root) = &self.config.archive_root else {
            return vec![None; outcome.files.bundles.len()];
        };
        let store = Store::new(root);
        let release_root = store.release_root(&outcome.access_level);
        outcome
            .files
            .bundles
            .iter_mut()
            .map(|bundle| {
                if bundle.state() != BundleState::Valid {
                    return None;
                }
                match bundle.determine_release_path(&store) {
                    Ok(_) => bundle.public_url(&release_root, &self.config.public_url_base),
                    Err(err) => {
                        warn!(prefix = %bundle.prefix(), "{err}");
                        None
                    }
                }
            })
            .collect()
    }

    pub fn classify(filenames: &[String], technique: Option<&str>) -> Vec<ClassifyResult> {
        let technique = technique.and_then(Technique::parse);
        filenames
            .iter()
            .map(|filename| match classify(filename, technique.as_ref()) {
                Ok(found) => ClassifyResult {
                    filename: filename.clone(),
                    kind: Some(found.kind.to_string()),
                    subtype: Some(found.subtype.to_string()),
                    prefix: Some(found.prefix),
                    error: None,
                },
                Err(err) => ClassifyResult {
                    filename: filename.clone(),
                    kind: None,
                    subtype: None,
                    prefix: None,
                    error: Some(err.to_string()),
                },
            })
            .collect()
    }
}
