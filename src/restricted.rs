use std::collections::{BTreeMap, BTreeSet};
use std::fs;

use camino::Utf8Path;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::error::IngestError;
use crate::manifest::ManifestRow;

pub const IC_FORM_FIELD: &str = "CA_IC_id";
pub const PROJECT_FIELD: &str = "BCDC_Project";
pub const COLLECTION_FIELD: &str = "BCDC_collection";
pub const USAGE_FIELD: &str = "CA_usage";

/// IC form -> project -> collection -> allowed data usages.
pub type IcFormMapping = BTreeMap<String, BTreeMap<String, BTreeMap<String, Vec<String>>>>;

#[derive(Debug, Clone, Deserialize)]
pub struct BucketListing {
    pub bucket_list: Vec<Bucket>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Bucket {
    pub name: String,
}

/// Checks for controlled-access submissions: the four access columns must be
/// filled, single-valued, consistent with the IC form hierarchy and point at
/// an existing release bucket.
#[derive(Debug, Clone)]
pub struct RestrictedAccess {
    mapping: IcFormMapping,
    buckets: BTreeSet<String>,
}

impl RestrictedAccess {
    pub fn new(mapping: IcFormMapping, listing: BucketListing) -> Self {
        Self {
            mapping,
            buckets: listing.bucket_list.into_iter().map(|bucket| bucket.name).collect(),
        }
    }

    pub fn load(mapping_path: &Utf8Path, buckets_path: &Utf8Path) -> Result<Self, IngestError> {
        let mapping: IcFormMapping = read_json(mapping_path)?;
        let listing: BucketListing = read_json(buckets_path)?;
        Ok(Self::new(mapping, listing))
    }

    /// Errors in the order the checks run; the first failing stage ends the
    /// check.
    pub fn validate(&self, rows: &[ManifestRow]) -> Vec<String> {
        let mut errors = Vec::new();
        let Some(first) = rows.first() else {
            return errors;
        };

        for row in rows {
            for field in [IC_FORM_FIELD, PROJECT_FIELD, COLLECTION_FIELD, USAGE_FIELD] {
                if row.get(field).is_empty() {
                    errors.push(format!(
                        "Row for '{}' does not have required field '{}' filled in.",
                        row.file_name(),
                        field
                    ));
                }
            }
        }
        if !errors.is_empty() {
            return errors;
        }

        if let Some(message) = multiple_values(rows) {
            errors.push(message);
            return errors;
        }

        if let Some(message) = self.mapping_error(first) {
            errors.push(message);
            return errors;
        }

        let project = first.get(PROJECT_FIELD);
        let usage = first.get(USAGE_FIELD);
        if !self.buckets.contains(&expected_bucket_name(project, usage)) {
            errors.push(format!(
                "The provided '{PROJECT_FIELD}' ('{project}') and '{USAGE_FIELD}' ('{usage}') is an invalid combination."
            ));
        }
        errors
    }

    fn mapping_error(&self, row: &ManifestRow) -> Option<String> {
        let ic_form = row.get(IC_FORM_FIELD);
        let project = row.get(PROJECT_FIELD);
        let collection = row.get(COLLECTION_FIELD);
        let usage = row.get(USAGE_FIELD);

        let Some(projects) = self.mapping.get(ic_form) else {
            return Some(format!("The '{IC_FORM_FIELD}' value '{ic_form}' is invalid."));
        };
        let Some(collections) = projects.get(project) else {
            return Some(format!(
                "The '{PROJECT_FIELD}' value '{project}' does not map to the provided '{IC_FORM_FIELD}' value '{ic_form}'."
            ));
        };
        let Some(usages) = collections.get(collection) else {
            return Some(format!(
                "The '{COLLECTION_FIELD}' value '{collection}' does not map to the provided '{PROJECT_FIELD}' value '{project}'."
            ));
        };
        if !usages.iter().any(|allowed| allowed == usage) {
            return Some(format!(
                "The '{USAGE_FIELD}' value '{usage}' does not map to the provided '{COLLECTION_FIELD}' value '{collection}'."
            ));
        }
        None
    }
}

fn multiple_values(rows: &[ManifestRow]) -> Option<String> {
    let mut message = String::from(
        "The manifest has more than value for the following column(s). Each column can only have one value in it.",
    );
    let mut failed = false;
    for field in [IC_FORM_FIELD, COLLECTION_FIELD, PROJECT_FIELD, USAGE_FIELD] {
        let values: BTreeSet<&str> = rows.iter().map(|row| row.get(field)).collect();
        if values.len() > 1 {
            failed = true;
            let joined = values.into_iter().collect::<Vec<_>>().join(", ");
            message.push_str(&format!("\n'{field}' column has more than one value: {joined}."));
        }
    }
    failed.then_some(message)
}

/// `<project>-<usage>`: lower-cased, a trailing `_proj` dropped from the
/// project and underscores turned into hyphens.
pub fn expected_bucket_name(project: &str, usage: &str) -> String {
    let project = project.to_lowercase();
    let project = project.strip_suffix("_proj").unwrap_or(&project).replace('_', "-");
    let usage = usage.to_lowercase().replace('_', "-");
    format!("{project}-{usage}")
}

fn read_json<T: DeserializeOwned>(path: &Utf8Path) -> Result<T, IngestError> {
    let content = fs::read_to_string(path.as_std_path())
        .map_err(|_| IngestError::AuxRead(path.as_std_path().to_path_buf()))?;
    serde_json::from_str(&content).map_err(|err| IngestError::AuxParse {
        path: path.as_std_path().to_path_buf(),
        message: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn access() -> RestrictedAccess {
        let mapping: IcFormMapping = serde_json::from_str(
            r#"{"IC-01": {"AIBS_proj": {"human_mop": ["HMB", "GRU"]}}}"#,
        )
        .unwrap();
        let listing: BucketListing =
            serde_json::from_str(r#"{"bucket_list": [{"name": "aibs-hmb"}]}"#).unwrap();
        RestrictedAccess::new(mapping, listing)
    }

    fn row(file: &str, ic: &str, project: &str, collection: &str, usage: &str) -> ManifestRow {
        ManifestRow::from_pairs([
            ("File_name", file),
            (IC_FORM_FIELD, ic),
            (PROJECT_FIELD, project),
            (COLLECTION_FIELD, collection),
            (USAGE_FIELD, usage),
        ])
    }

    #[test]
    fn bucket_name_formatting() {
        assert_eq!(expected_bucket_name("AIBS_proj", "HMB"), "aibs-hmb");
        assert_eq!(expected_bucket_name("Big_Lab", "gru_col"), "big-lab-gru-col");
    }

    #[test]
    fn consistent_rows_pass() {
        let rows = [
            row("a.bam", "IC-01", "AIBS_proj", "human_mop", "HMB"),
            row("b.bam", "IC-01", "AIBS_proj", "human_mop", "HMB"),
        ];
        assert!(access().validate(&rows).is_empty());
    }

    #[test]
    fn missing_values_stop_the_check() {
        let rows = [row("a.bam", "IC-01", "", "human_mop", "HMB")];
        assert_eq!(
            access().validate(&rows),
            ["Row for 'a.bam' does not have required field 'BCDC_Project' filled in.".to_string()]
        );
    }

    #[test]
    fn multiple_values_are_listed_per_column() {
        let rows = [
            row("a.bam", "IC-01", "AIBS_proj", "human_mop", "HMB"),
            row("b.bam", "IC-01", "AIBS_proj", "human_mop", "GRU"),
        ];
        let errors = access().validate(&rows);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].ends_with("\n'CA_usage' column has more than one value: GRU, HMB."));
    }

    #[test]
    fn mapping_and_bucket_failures() {
        let rows = [row("a.bam", "IC-02", "AIBS_proj", "human_mop", "HMB")];
        assert_eq!(
            access().validate(&rows),
            ["The 'CA_IC_id' value 'IC-02' is invalid.".to_string()]
        );

        let rows = [row("a.bam", "IC-01", "AIBS_proj", "human_mop", "GRU")];
        assert_eq!(
            access().validate(&rows),
            ["The provided 'BCDC_Project' ('AIBS_proj') and 'CA_usage' ('GRU') is an invalid combination."
                .to_string()]
        );
    }
}
