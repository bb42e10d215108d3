use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;

use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use tracing::{debug, info, warn};

use crate::domain::Technique;
use crate::error::IngestError;
use crate::file_entity::FileEntity;
use crate::grouping::{GroupedFiles, group_and_validate};
use crate::restricted::RestrictedAccess;
use crate::rules::{RuleRegistry, UnsupportedBundlePolicy};
use crate::vocabulary::ControlledVocabulary;

pub const ALL_FIELDS: [&str; 24] = [
    "File_name",
    "Sample_ID",
    "Program",
    "Sub-program",
    "Lab",
    "Species",
    "Modality",
    "Technique",
    "Subspecimen_type",
    "Data_type",
    "File_type",
    "Access",
    "Checksum",
    "Anatomical_site",
    "Counts_pipeline",
    "Read_aligner",
    "Genome_build",
    "Gene_set_release",
    "BCDC_Project",
    "BCDC_collection",
    "CA_usage",
    "CA_IC_id",
    "CA_donor",
    "CA_tissue_provider",
];

pub const OPTIONAL_FIELDS: [&str; 11] = [
    "Anatomical_site",
    "Counts_pipeline",
    "Read_aligner",
    "Genome_build",
    "Gene_set_release",
    "BCDC_Project",
    "BCDC_collection",
    "CA_usage",
    "CA_IC_id",
    "CA_donor",
    "CA_tissue_provider",
];

/// Columns that make up the submission location, outermost first.
pub const LOCATION_FIELDS: [&str; 8] = [
    "Program",
    "Sub-program",
    "Lab",
    "Modality",
    "Subspecimen_type",
    "Technique",
    "Species",
    "Data_type",
];

pub const DEFAULT_ROW_LIMIT: usize = 50_000;

const UTF8_BOM: char = '\u{feff}';

/// One manifest line keyed by header column, in header order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestRow {
    fields: IndexMap<String, String>,
}

impl ManifestRow {
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            fields: pairs
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }

    /// Value of `column`, empty when the column is absent.
    pub fn get(&self, column: &str) -> &str {
        self.fields.get(column).map(String::as_str).unwrap_or("")
    }

    pub fn file_name(&self) -> &str {
        self.get("File_name")
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

pub fn read_manifest(path: &Utf8Path, skip_header_check: bool) -> Result<Vec<ManifestRow>, IngestError> {
    let bytes = fs::read(path.as_std_path()).map_err(|err| match err.kind() {
        ErrorKind::NotFound => {
            IngestError::ManifestNotFound(path.file_name().unwrap_or(path.as_str()).to_string())
        }
        _ => IngestError::Filesystem(format!("read {path}: {err}")),
    })?;
    let content = String::from_utf8(bytes).map_err(|_| IngestError::ManifestEncoding)?;
    parse_manifest(&content, skip_header_check)
}

/// Parse tab-separated manifest text. Short rows are padded with empty
/// values; rows with more fields than the header abort the read.
pub fn parse_manifest(content: &str, skip_header_check: bool) -> Result<Vec<ManifestRow>, IngestError> {
    let content = content.strip_prefix(UTF8_BOM).unwrap_or(content);
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());
    let mut records = reader.records();

    let header: Vec<String> = match records.next() {
        Some(record) => record
            .map_err(|err| IngestError::ManifestParse(err.to_string()))?
            .iter()
            .map(|field| field.trim().to_string())
            .collect(),
        None if skip_header_check => return Err(IngestError::ManifestEmpty),
        None => return Err(IngestError::ManifestHeader),
    };
    if !skip_header_check && header != ALL_FIELDS {
        return Err(IngestError::ManifestHeader);
    }

    let mut rows = Vec::new();
    for (index, record) in records.enumerate() {
        let record = record.map_err(|err| IngestError::ManifestParse(err.to_string()))?;
        let found = record.len().max(header.len());
        if found != ALL_FIELDS.len() {
            return Err(IngestError::RowFieldCount {
                row: index + 2,
                expected: ALL_FIELDS.len(),
                found,
            });
        }
        let row = ManifestRow::from_pairs(
            header
                .iter()
                .enumerate()
                .map(|(column, key)| (key.as_str(), record.get(column).unwrap_or(""))),
        );
        rows.push(row);
    }

    if rows.is_empty() {
        return Err(IngestError::ManifestEmpty);
    }
    debug!(rows = rows.len(), "read manifest rows");
    Ok(rows)
}

/// Relative submission location: the location columns lower-cased with
/// spaces replaced, empty values left out.
pub fn location_for(row: &ManifestRow) -> Utf8PathBuf {
    let mut location = Utf8PathBuf::new();
    for field in LOCATION_FIELDS {
        let value = row.get(field).trim();
        if !value.is_empty() {
            location.push(value.to_lowercase().replace(' ', "_"));
        }
    }
    location
}

/// Result of one validation pass over a manifest.
#[derive(Debug, Default)]
pub struct ValidationOutcome {
    pub errors: Vec<String>,
    pub access_level: String,
    pub program: String,
    pub files: GroupedFiles,
}

impl ValidationOutcome {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Runs the manifest checks, classifies every file and validates the
/// resulting bundles.
pub struct ManifestValidator<'a> {
    vocabulary: &'a ControlledVocabulary,
    restricted: Option<&'a RestrictedAccess>,
    rules: &'a RuleRegistry,
    policy: UnsupportedBundlePolicy,
    row_limit: usize,
    archive_root: Option<Utf8PathBuf>,
}

impl<'a> ManifestValidator<'a> {
    pub fn new(vocabulary: &'a ControlledVocabulary) -> Self {
        Self {
            vocabulary,
            restricted: None,
            rules: RuleRegistry::standard(),
            policy: UnsupportedBundlePolicy::default(),
            row_limit: DEFAULT_ROW_LIMIT,
            archive_root: None,
        }
    }

    pub fn with_restricted(mut self, restricted: Option<&'a RestrictedAccess>) -> Self {
        self.restricted = restricted;
        self
    }

    pub fn with_rules(mut self, rules: &'a RuleRegistry) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_policy(mut self, policy: UnsupportedBundlePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_row_limit(mut self, row_limit: usize) -> Self {
        self.row_limit = row_limit;
        self
    }

    pub fn with_archive_root(mut self, archive_root: Option<Utf8PathBuf>) -> Self {
        self.archive_root = archive_root;
        self
    }

    pub fn validate(&self, rows: &[ManifestRow]) -> ValidationOutcome {
        info!(rows = rows.len(), "validating manifest");
        let mut outcome = ValidationOutcome::default();
        if let Some(first) = rows.first() {
            outcome.access_level = first.get("Access").to_string();
            outcome.program = self.program_of(first);
        }

        if rows.len() > self.row_limit {
            outcome.errors.push(format!(
                "Manifest row count exceeds limit of {} rows.",
                with_thousands(self.row_limit)
            ));
            return outcome;
        }

        check_required_fields(rows, &mut outcome.errors);
        check_checksums(rows, &mut outcome.errors);
        check_unique_filenames(rows, &mut outcome.errors);
        self.check_vocabulary(rows, &mut outcome.errors);
        check_uniform_access(rows, &mut outcome.errors);
        check_filename_within_row(rows, &mut outcome.errors);
        check_directory_in_filename(rows, &mut outcome.errors);

        let mut entities = Vec::with_capacity(rows.len());
        for row in rows {
            for (_, value) in row.fields() {
                if value.contains('\n') {
                    outcome
                        .errors
                        .push(format!("Line break found in entry for file {}.", row.file_name()));
                }
            }
            match self.entity_for(row, &outcome.access_level) {
                Ok(entity) => entities.push(entity),
                Err(err) => {
                    warn!("{err}");
                    outcome.errors.push(err.to_string());
                }
            }
        }

        let files = group_and_validate(entities, self.rules, self.policy);
        outcome.errors.extend(files.errors().map(str::to_string));
        outcome.files = files;

        if outcome.is_valid() && self.is_restricted(&outcome) {
            if let Some(restricted) = self.restricted {
                info!("running restricted-access checks");
                outcome.errors.extend(restricted.validate(rows));
            }
        }

        info!(
            valid = outcome.is_valid(),
            errors = outcome.errors.len(),
            "manifest validation finished"
        );
        outcome
    }

    fn program_of(&self, row: &ManifestRow) -> String {
        let program = row.get("Program").to_lowercase();
        if self.vocabulary.covers("Program") && !self.vocabulary.accepts("Program", &program) {
            return "unknown".to_string();
        }
        program
    }

    fn is_restricted(&self, outcome: &ValidationOutcome) -> bool {
        outcome.access_level.eq_ignore_ascii_case("controlled") && outcome.program == "biccn"
    }

    fn entity_for(&self, row: &ManifestRow, access_level: &str) -> Result<FileEntity, IngestError> {
        let technique = Technique::parse(row.get("Technique"));
        let location = location_for(row);
        let mut entity = FileEntity::from_path(row.file_name(), technique)?
            .with_sample_id(row.get("Sample_ID"))
            .with_location(location.clone());
        if let Some(root) = &self.archive_root {
            entity = entity.with_validated_dir(
                root.join(access_level.to_lowercase())
                    .join("validated")
                    .join(location),
            );
        }
        Ok(entity)
    }

    fn check_vocabulary(&self, rows: &[ManifestRow], errors: &mut Vec<String>) {
        for row in rows {
            for (key, value) in row.fields() {
                if value.is_empty() {
                    continue;
                }
                let Some(allowed) = self.vocabulary.allowed(key) else {
                    continue;
                };
                if !self.vocabulary.accepts(key, value) {
                    let terms = allowed.iter().map(String::as_str).collect::<Vec<_>>().join(";");
                    errors.push(format!(
                        "Row for '{}' has invalid controlled vocabulary term '{}' for field '{}'. Valid fields are [{}].",
                        row.file_name(),
                        value,
                        key,
                        terms
                    ));
                }
            }
        }
    }
}

fn check_required_fields(rows: &[ManifestRow], errors: &mut Vec<String>) {
    for row in rows {
        for (key, value) in row.fields() {
            if OPTIONAL_FIELDS.contains(&key) {
                continue;
            }
            if value.is_empty() {
                errors.push(format!(
                    "Row for '{}' does not have required field '{}' filled in.",
                    row.file_name(),
                    key
                ));
            }
        }
    }
}

fn check_checksums(rows: &[ManifestRow], errors: &mut Vec<String>) {
    for row in rows {
        let checksum = row.get("Checksum");
        if checksum.len() != 32 {
            errors.push(format!(
                "Row for '{}' does not have a 32 character checksum.",
                row.file_name()
            ));
        }
        if checksum.is_empty() || !checksum.chars().all(|c| c.is_ascii_hexdigit()) {
            errors.push(format!(
                "The checksum for row '{}' is not a valid md5 checksum.",
                row.file_name()
            ));
        }
    }
}

fn check_unique_filenames(rows: &[ManifestRow], errors: &mut Vec<String>) {
    let mut seen = HashSet::new();
    let mut reported = HashSet::new();
    for row in rows {
        let name = row.file_name();
        if !seen.insert(name) && reported.insert(name) {
            errors.push(format!("Duplicate file name found: {name}."));
        }
    }
}

fn check_uniform_access(rows: &[ManifestRow], errors: &mut Vec<String>) {
    let levels: HashSet<&str> = rows.iter().map(|row| row.get("Access")).collect();
    if levels.len() > 1 {
        errors.push(
            "The manifest has more than one level of access. There can only be one type of data in each manifest."
                .to_string(),
        );
    }
}

fn check_filename_within_row(rows: &[ManifestRow], errors: &mut Vec<String>) {
    for (index, row) in rows.iter().enumerate() {
        let name = row.file_name();
        let count = row.fields().filter(|(_, value)| *value == name).count();
        if count > 1 {
            errors.push(format!(
                "File name {name} was duplicated within row #{}.",
                index + 2
            ));
        }
    }
}

fn check_directory_in_filename(rows: &[ManifestRow], errors: &mut Vec<String>) {
    for (index, row) in rows.iter().enumerate() {
        let name = row.file_name();
        if name.contains('/') {
            errors.push(format!(
                "File name {name} on row#{} contains directory structure.",
                index + 2
            ));
        }
    }
}

fn with_thousands(value: usize) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, digit) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            out.push(',');
        }
        out.push(digit);
    }
    out
}
