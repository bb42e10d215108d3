use camino::{Utf8Path, Utf8PathBuf};
use tracing::{debug, error, info, warn};

use crate::domain::{BundleState, FileKind, IdentifierTable};
use crate::error::{BundleIssue, IngestError};
use crate::file_entity::{BundleKey, FileEntity, FileStats, release_counterpart};

/// Existence check against an archive destination. Versioning asks this
/// before picking a release name.
pub trait DestinationProbe {
    fn exists(&self, path: &Utf8Path) -> bool;
}

/// Files sharing a prefix and kind, validated and released as one archive.
#[derive(Debug, Clone)]
pub struct Bundle {
    key: BundleKey,
    members: Vec<FileEntity>,
    state: BundleState,
    version: u32,
    errors: Vec<String>,
    warnings: Vec<String>,
    release_path: Option<Utf8PathBuf>,
    stats: Option<FileStats>,
}

impl Bundle {
    pub fn new(key: BundleKey, mut members: Vec<FileEntity>) -> Self {
        info!(kind = %key.kind, "creating file bundle {}", key.prefix);
        for member in &mut members {
            member.set_bundle(key.clone());
        }
        Self {
            key,
            members,
            state: BundleState::NotBundled,
            version: 1,
            errors: Vec::new(),
            warnings: Vec::new(),
            release_path: None,
            stats: None,
        }
    }

    pub fn key(&self) -> &BundleKey {
        &self.key
    }

    pub fn kind(&self) -> FileKind {
        self.key.kind
    }

    pub fn prefix(&self) -> &str {
        &self.key.prefix
    }

    pub fn members(&self) -> &[FileEntity] {
        &self.members
    }

    pub fn state(&self) -> BundleState {
        self.state
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn release_path(&self) -> Option<&Utf8Path> {
        self.release_path.as_deref()
    }

    pub fn stats(&self) -> Option<&FileStats> {
        self.stats.as_ref()
    }

    pub fn identifier_table(&self) -> IdentifierTable {
        self.kind().identifier_table()
    }

    pub fn archive_extension(&self) -> Option<&'static str> {
        self.kind().bundle_extension()
    }

    pub fn record_issue(&mut self, issue: BundleIssue) {
        self.record_error(issue.to_string());
    }

    pub fn record_error(&mut self, message: impl Into<String>) {
        let message = message.into();
        error!("{message}");
        self.errors.push(message);
        if self.state.can_transition_to(BundleState::Invalid) {
            self.state = BundleState::Invalid;
        }
    }

    pub fn push_warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    /// Move to `next`. A disallowed move is recorded and leaves the state
    /// untouched; the return value tells whether the bundle is now in `next`.
    pub fn set_state(&mut self, next: BundleState) -> bool {
        if next == self.state {
            return true;
        }
        if !self.state.can_transition_to(next) {
            let err = IngestError::InvalidStateTransition {
                from: self.state.to_string(),
                to: next.to_string(),
            };
            error!(prefix = %self.key.prefix, "{err}");
            self.errors.push(err.to_string());
            return false;
        }
        debug!(prefix = %self.key.prefix, from = %self.state, to = %next, "bundle state change");
        self.state = next;
        true
    }

    /// Same as [`set_state`](Self::set_state) for a state given by name.
    /// Unknown names are recorded and otherwise ignored.
    pub fn set_state_named(&mut self, name: &str) -> bool {
        match BundleState::from_name(name) {
            Some(next) => self.set_state(next),
            None => {
                let err = IngestError::UnknownState {
                    from: self.state.to_string(),
                    to: name.to_string(),
                };
                error!(prefix = %self.key.prefix, "{err}");
                self.errors.push(err.to_string());
                false
            }
        }
    }

    /// End of a validation pass: VALID when nothing was recorded.
    pub fn finalize(&mut self) {
        if self.state != BundleState::NotBundled {
            return;
        }
        if self.errors.is_empty() {
            self.set_state(BundleState::Valid);
        } else {
            self.set_state(BundleState::Invalid);
        }
    }

    /// `<prefix>.<ext>` for version 1, `<prefix>.vN.<ext>` above.
    pub fn archive_basename(&self, version: u32) -> String {
        let extension = self.archive_extension().unwrap_or("tar");
        if version > 1 {
            format!("{}.v{version}.{extension}", self.key.prefix)
        } else {
            format!("{}.{extension}", self.key.prefix)
        }
    }

    /// Bump the version past every archive already present in `release_dir`.
    /// Members follow the bundle version.
    pub fn adjust_version(&mut self, release_dir: &Utf8Path, probe: &dyn DestinationProbe) -> u32 {
        let mut version = self.version;
        while probe.exists(&release_dir.join(self.archive_basename(version))) {
            version += 1;
        }
        if version != self.version {
            info!(prefix = %self.key.prefix, version, "bundle previously released, bumping version");
        }
        self.version = version;
        for member in &mut self.members {
            member.set_version(version);
        }
        version
    }

    /// Release archive path, derived from the first member's validated
    /// directory.
    pub fn determine_release_path(&mut self, probe: &dyn DestinationProbe) -> Result<Utf8PathBuf, IngestError> {
        let validated_dir = self
            .members
            .first()
            .and_then(|member| member.validated_dir())
            .map(Utf8Path::to_path_buf)
            .ok_or_else(|| {
                IngestError::Filesystem(format!(
                    "no validated directory for bundle {}",
                    self.key.prefix
                ))
            })?;
        let release_dir = release_counterpart(&validated_dir);
        let version = self.adjust_version(&release_dir, probe);
        let path = release_dir.join(self.archive_basename(version));
        self.release_path = Some(path.clone());
        Ok(path)
    }

    /// Public download URL: the release root swapped for `base_url`.
    pub fn public_url(&self, release_root: &Utf8Path, base_url: &str) -> Option<String> {
        let path = self.release_path.as_deref()?;
        match path.strip_prefix(release_root) {
            Ok(relative) => Some(format!("{}/{relative}", base_url.trim_end_matches('/'))),
            Err(_) => {
                warn!("File URI for {path} will not have an automatically-created URL");
                None
            }
        }
    }

    pub fn set_released(&mut self, compute_stats: bool) -> Result<(), IngestError> {
        if !self.set_state(BundleState::Released) {
            return Ok(());
        }
        if compute_stats {
            let path = self.release_path.clone().ok_or_else(|| {
                IngestError::Filesystem(format!("no release path for bundle {}", self.key.prefix))
            })?;
            self.stats = Some(FileStats::compute(&path)?);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    struct Existing(HashSet<Utf8PathBuf>);

    impl DestinationProbe for Existing {
        fn exists(&self, path: &Utf8Path) -> bool {
            self.0.contains(path)
        }
    }

    fn fastq_bundle() -> Bundle {
        let members = vec![
            FileEntity::from_path("in/s_R1.fastq.gz", None)
                .unwrap()
                .with_validated_dir("/nemo/public/validated/biccn/lab"),
            FileEntity::from_path("in/s_R2.fastq.gz", None)
                .unwrap()
                .with_validated_dir("/nemo/public/validated/biccn/lab"),
        ];
        Bundle::new(members[0].bundle_key(), members)
    }

    #[test]
    fn members_link_back_to_bundle() {
        let bundle = fastq_bundle();
        for member in bundle.members() {
            assert_eq!(member.bundle(), Some(bundle.key()));
        }
        assert_eq!(bundle.identifier_table(), IdentifierTable::Sequence);
    }

    #[test]
    fn version_bumps_past_existing_archives() {
        let mut bundle = fastq_bundle();
        let probe = Existing(HashSet::from([
            Utf8PathBuf::from("/nemo/public/release/biccn/lab/s.fastq.tar"),
            Utf8PathBuf::from("/nemo/public/release/biccn/lab/s.v2.fastq.tar"),
        ]));
        let path = bundle.determine_release_path(&probe).unwrap();
        assert_eq!(path, "/nemo/public/release/biccn/lab/s.v3.fastq.tar");
        assert_eq!(bundle.version(), 3);
        assert!(bundle.members().iter().all(|member| member.version() == 3));
        assert_eq!(
            bundle.members()[0].validated_basename(),
            "s.v3.R1.fastq.gz"
        );
    }

    #[test]
    fn public_url_replaces_release_root() {
        let mut bundle = fastq_bundle();
        bundle
            .determine_release_path(&Existing(HashSet::new()))
            .unwrap();
        assert_eq!(
            bundle
                .public_url(Utf8Path::new("/nemo/public/release"), "https://data.nemoarchive.org/")
                .as_deref(),
            Some("https://data.nemoarchive.org/biccn/lab/s.fastq.tar")
        );
        assert_eq!(
            bundle.public_url(Utf8Path::new("/elsewhere"), "https://data.nemoarchive.org"),
            None
        );
    }

    #[test]
    fn released_only_from_valid() {
        let mut bundle = fastq_bundle();
        bundle.set_released(false).unwrap();
        assert_eq!(bundle.state(), BundleState::NotBundled);
        assert_eq!(bundle.errors().len(), 1);

        let mut bundle = fastq_bundle();
        bundle.finalize();
        bundle.set_released(false).unwrap();
        assert_eq!(bundle.state(), BundleState::Released);
    }

    #[test]
    fn refused_release_skips_stats() {
        // no release path was planned, so computing stats would fail
        let mut bundle = fastq_bundle();
        bundle.set_released(true).unwrap();
        assert_eq!(bundle.state(), BundleState::NotBundled);
        assert!(bundle.stats().is_none());
        assert_eq!(bundle.errors().len(), 1);
    }

    #[test]
    fn unknown_state_name_is_recorded() {
        let mut bundle = fastq_bundle();
        assert!(!bundle.set_state_named("ARCHIVED"));
        assert_eq!(bundle.state(), BundleState::NotBundled);
        assert_eq!(bundle.errors().len(), 1);

        assert!(bundle.set_state_named("VALID"));
        assert_eq!(bundle.state(), BundleState::Valid);
    }

    #[test]
    fn released_stats_read_the_archive() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        let member = FileEntity::from_path("s.bam", None)
            .unwrap()
            .with_validated_dir(root.join("validated"));
        let mut bundle = Bundle::new(member.bundle_key(), vec![member]);
        let path = bundle.determine_release_path(&Existing(HashSet::new())).unwrap();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"archive").unwrap();

        bundle.finalize();
        bundle.set_released(true).unwrap();
        assert_eq!(bundle.stats().unwrap().size, 7);
    }
}
