use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info};

use crate::classify::{Classification, classify};
use crate::domain::{FileKind, FileState, FileSubtype, IdentifierTable, Normalization, Technique};
use crate::error::IngestError;
use crate::fs_util;
use crate::store::Store;

/// Sidecar left next to a file while an Aspera transfer is in flight.
pub const TRANSFER_MARKER_EXT: &str = ".aspx";

/// Lookup key of the bundle that owns a file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct BundleKey {
    pub prefix: String,
    pub kind: FileKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileStats {
    pub md5: String,
    pub size: u64,
    pub mtime: DateTime<Utc>,
}

impl FileStats {
    pub fn compute(path: &Utf8Path) -> Result<Self, IngestError> {
        info!(path = %path, "computing md5, size and mtime");
        let metadata = fs::metadata(path.as_std_path())
            .map_err(|err| IngestError::Filesystem(format!("stat {path}: {err}")))?;
        let modified = metadata
            .modified()
            .map_err(|err| IngestError::Filesystem(err.to_string()))?;
        Ok(Self {
            md5: fs_util::md5_file(path)?,
            size: metadata.len(),
            mtime: DateTime::<Utc>::from(modified),
        })
    }
}

/// One submitted file: where it lives, what it was classified as and how far
/// it has moved through ingest.
#[derive(Debug, Clone)]
pub struct FileEntity {
    path: Utf8PathBuf,
    classification: Classification,
    technique: Option<Technique>,
    sample_id: Option<String>,
    location: Option<Utf8PathBuf>,
    validated_dir: Option<Utf8PathBuf>,
    state: FileState,
    version: u32,
    errors: Vec<String>,
    stats: Option<FileStats>,
    bundle: Option<BundleKey>,
}

impl FileEntity {
    pub fn new(
        path: impl Into<Utf8PathBuf>,
        classification: Classification,
        technique: Option<Technique>,
    ) -> Self {
        let path = path.into();
        info!(
            kind = %classification.kind,
            subtype = %classification.subtype,
            prefix = %classification.prefix,
            "creating file entity for {}",
            path.file_name().unwrap_or(path.as_str())
        );
        Self {
            path,
            classification,
            technique,
            sample_id: None,
            location: None,
            validated_dir: None,
            state: FileState::NotSubmitted,
            version: 1,
            errors: Vec::new(),
            stats: None,
            bundle: None,
        }
    }

    /// Classify `path` and wrap the result.
    pub fn from_path(path: impl Into<Utf8PathBuf>, technique: Option<Technique>) -> Result<Self, IngestError> {
        let path = path.into();
        let classification = classify(path.as_str(), technique.as_ref())?;
        Ok(Self::new(path, classification, technique))
    }

    pub fn with_sample_id(mut self, sample_id: impl Into<String>) -> Self {
        self.sample_id = Some(sample_id.into());
        self
    }

    pub fn with_location(mut self, location: impl Into<Utf8PathBuf>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_validated_dir(mut self, dir: impl Into<Utf8PathBuf>) -> Self {
        self.validated_dir = Some(dir.into());
        self
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    pub fn set_path(&mut self, path: impl Into<Utf8PathBuf>) {
        self.path = path.into();
    }

    pub fn classification(&self) -> &Classification {
        &self.classification
    }

    pub fn prefix(&self) -> &str {
        &self.classification.prefix
    }

    pub fn kind(&self) -> FileKind {
        self.classification.kind
    }

    pub fn subtype(&self) -> FileSubtype {
        self.classification.subtype
    }

    pub fn technique(&self) -> Option<&Technique> {
        self.technique.as_ref()
    }

    pub fn sample_id(&self) -> Option<&str> {
        self.sample_id.as_deref()
    }

    pub fn location(&self) -> Option<&Utf8Path> {
        self.location.as_deref()
    }

    pub fn validated_dir(&self) -> Option<&Utf8Path> {
        self.validated_dir.as_deref()
    }

    pub fn state(&self) -> FileState {
        self.state
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn set_version(&mut self, version: u32) {
        self.version = version.max(1);
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn stats(&self) -> Option<&FileStats> {
        self.stats.as_ref()
    }

    pub fn bundle(&self) -> Option<&BundleKey> {
        self.bundle.as_ref()
    }

    pub fn set_bundle(&mut self, key: BundleKey) {
        self.bundle = Some(key);
    }

    pub fn bundle_key(&self) -> BundleKey {
        BundleKey {
            prefix: self.prefix().to_string(),
            kind: self.kind(),
        }
    }

    pub fn is_bundled(&self) -> bool {
        self.kind().is_bundled()
    }

    pub fn identifier_table(&self) -> IdentifierTable {
        self.kind().identifier_table()
    }

    /// Identifier label used by the archive catalogue. Members of a bundle
    /// are recorded as components of the bundle's table.
    pub fn identifier_label(&self) -> String {
        match (self.is_bundled(), self.kind()) {
            (true, FileKind::Vcf) | (false, _) => self.identifier_table().to_string(),
            (true, _) => format!("{}_component", self.identifier_table()),
        }
    }

    /// Append an error and drop the file to INVALID unless it is already
    /// VALIDATED.
    pub fn record_error(&mut self, message: impl Into<String>) {
        let message = message.into();
        error!(path = %self.path, "{message}");
        self.errors.push(message);
        if self.state.can_transition_to(FileState::Invalid) {
            self.state = FileState::Invalid;
        }
    }

    /// Move to `next`. Backward moves are recorded as errors and leave the
    /// state untouched.
    pub fn set_state(&mut self, next: FileState) {
        if next == self.state {
            return;
        }
        if !self.state.can_transition_to(next) {
            let err = IngestError::InvalidStateTransition {
                from: self.state.to_string(),
                to: next.to_string(),
            };
            error!(path = %self.path, "{err}");
            self.errors.push(err.to_string());
            return;
        }
        debug!(path = %self.path, from = %self.state, to = %next, "file state change");
        self.state = next;
    }

    /// Same as [`set_state`](Self::set_state) for a state given by name.
    /// Unknown names are recorded and otherwise ignored.
    pub fn set_state_named(&mut self, name: &str) {
        match FileState::from_name(name) {
            Some(next) => self.set_state(next),
            None => {
                let err = IngestError::UnknownState {
                    from: self.state.to_string(),
                    to: name.to_string(),
                };
                error!(path = %self.path, "{err}");
                self.errors.push(err.to_string());
            }
        }
    }

    /// Path the file will have once brought to its kind's canonical
    /// compression.
    pub fn normalized_path(&self) -> Utf8PathBuf {
        let current = self.path.as_str();
        match self.kind().normalization() {
            Normalization::Gzip if !current.ends_with(".gz") => Utf8PathBuf::from(format!("{current}.gz")),
            Normalization::Gunzip => current
                .strip_suffix(".gz")
                .map(Utf8PathBuf::from)
                .unwrap_or_else(|| self.path.clone()),
            _ => self.path.clone(),
        }
    }

    /// Bring the file on disk to its canonical compression and point the
    /// entity at the result. Cached stats belong to the old content and are
    /// dropped.
    pub fn normalize(&mut self) -> Result<Utf8PathBuf, IngestError> {
        let normalized = match self.kind().normalization() {
            Normalization::Gzip => fs_util::gzip_file(&self.path)?,
            Normalization::Gunzip => fs_util::gunzip_file(&self.path)?,
            Normalization::Keep => return Ok(self.path.clone()),
        };
        if normalized != self.path {
            info!(from = %self.path, to = %normalized, "normalized file");
            self.path = normalized.clone();
            self.stats = None;
        }
        Ok(normalized)
    }

    pub fn transfer_marker(&self) -> Utf8PathBuf {
        Utf8PathBuf::from(format!("{}{TRANSFER_MARKER_EXT}", self.path))
    }

    pub fn is_transferring(&self) -> bool {
        self.transfer_marker().as_std_path().is_file()
    }

    pub fn is_transfer_done(&self) -> bool {
        self.path.as_std_path().is_file() && !self.is_transferring()
    }

    pub fn compute_stats(&mut self) -> Result<&FileStats, IngestError> {
        let stats = match self.stats.take() {
            Some(stats) => stats,
            None => FileStats::compute(&self.path)?,
        };
        Ok(self.stats.insert(stats))
    }

    pub fn set_submitted(&mut self, compute_stats: bool) -> Result<(), IngestError> {
        self.set_state(FileState::Submitted);
        if compute_stats {
            self.compute_stats()?;
        }
        Ok(())
    }

    /// Compare the content hash against the manifest value and settle on
    /// VALID or INVALID.
    pub fn validate_checksum(&mut self, expected: &str) -> Result<(), IngestError> {
        let observed = self.compute_stats()?.md5.clone();
        debug!(expected, observed = %observed, "comparing md5");
        if !observed.eq_ignore_ascii_case(expected.trim()) {
            let message = format!(
                "MD5 of file {} does not match - Expected: {} and computed: {}",
                self.path, expected, observed
            );
            self.record_error(message);
            return Ok(());
        }
        self.set_state(FileState::Valid);
        Ok(())
    }

    /// Basename in the validated area. The name is split on the last
    /// occurrence of the prefix (or tail for split names); a version above 1
    /// is written as a `.vN` infix.
    pub fn validated_basename(&self) -> String {
        let name = self.path.file_name().unwrap_or(self.path.as_str());
        let anchor = self.classification.parts.anchor();
        let Some(index) = name
            .rmatch_indices(anchor)
            .map(|(index, _)| index)
            .find(|index| {
                name[index + anchor.len()..]
                    .chars()
                    .next()
                    .is_none_or(|next| ['.', '_', '-'].contains(&next))
            })
        else {
            return name.to_string();
        };
        let stem = &name[..index + anchor.len()];
        let extension = &name[index + anchor.len()..];
        let extension = ['.', '_', '-']
            .iter()
            .find_map(|sep| extension.strip_prefix(*sep))
            .unwrap_or(extension);
        if self.version > 1 {
            format!("{stem}.v{}.{extension}", self.version)
        } else {
            format!("{stem}.{extension}")
        }
    }

    pub fn validated_path(&self) -> Option<Utf8PathBuf> {
        self.validated_dir
            .as_ref()
            .map(|dir| dir.join(self.validated_basename()))
    }

    pub fn release_path(&self) -> Option<Utf8PathBuf> {
        self.validated_path().map(|path| release_counterpart(&path))
    }

    /// Normalize the file, move it under its validated name and mark the
    /// entity VALIDATED.
    pub fn move_to_validated(&mut self) -> Result<Utf8PathBuf, IngestError> {
        if let Err(err) = self.normalize() {
            self.record_error(format!("Could not normalize {}: {err}", self.path));
            return Err(err);
        }
        let target = self.validated_path().ok_or_else(|| {
            IngestError::Filesystem(format!("no validated directory for {}", self.path))
        })?;
        info!(from = %self.path, to = %target, "moving file to validated area");
        if let Err(err) = Store::move_file_atomic(&self.path, &target) {
            self.record_error(format!(
                "Could not move {} to validated area: {err}",
                self.path
            ));
            return Err(err);
        }
        self.path = target.clone();
        self.set_state(FileState::Validated);
        Ok(target)
    }
}

/// Swap the `validated` area for `release` in an archive path.
pub fn release_counterpart(path: &Utf8Path) -> Utf8PathBuf {
    Utf8PathBuf::from(path.as_str().replace("validated", "release"))
}
