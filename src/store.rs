use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use tempfile::Builder;
use tracing::debug;

use crate::bundle::DestinationProbe;
use crate::error::IngestError;

/// Archive layout: `<root>/<access>/{validated,release}/<location>`.
#[derive(Debug, Clone)]
pub struct Store {
    archive_root: Utf8PathBuf,
}

impl Store {
    pub fn new(archive_root: impl Into<Utf8PathBuf>) -> Self {
        Self {
            archive_root: archive_root.into(),
        }
    }

    pub fn archive_root(&self) -> &Utf8Path {
        &self.archive_root
    }

    pub fn validated_dir(&self, access_level: &str, location: &Utf8Path) -> Utf8PathBuf {
        self.archive_root
            .join(access_level.to_lowercase())
            .join("validated")
            .join(location)
    }

    pub fn release_dir(&self, access_level: &str, location: &Utf8Path) -> Utf8PathBuf {
        self.archive_root
            .join(access_level.to_lowercase())
            .join("release")
            .join(location)
    }

    /// Root that public URLs are made relative to.
    pub fn release_root(&self, access_level: &str) -> Utf8PathBuf {
        self.archive_root
            .join(access_level.to_lowercase())
            .join("release")
    }

    pub fn write_bytes_atomic(path: &Utf8Path, content: &[u8]) -> Result<(), IngestError> {
        let parent = ensure_parent(path)?;
        let temp = Builder::new()
            .prefix("nemo-ingest-write")
            .tempfile_in(parent.as_std_path())
            .map_err(|err| IngestError::Filesystem(err.to_string()))?;
        fs::write(temp.path(), content).map_err(|err| IngestError::Filesystem(err.to_string()))?;
        temp.persist(path.as_std_path())
            .map_err(|err| IngestError::Filesystem(err.to_string()))?;
        debug!(path = %path, bytes = content.len(), "wrote file");
        Ok(())
    }

    pub fn copy_file_atomic(source: &Utf8Path, dest: &Utf8Path) -> Result<(), IngestError> {
        let parent = ensure_parent(dest)?;
        let temp = Builder::new()
            .prefix("nemo-ingest-file")
            .tempfile_in(parent.as_std_path())
            .map_err(|err| IngestError::Filesystem(err.to_string()))?;
        fs::copy(source.as_std_path(), temp.path())
            .map_err(|err| IngestError::Filesystem(format!("copy {source}: {err}")))?;
        temp.persist(dest.as_std_path())
            .map_err(|err| IngestError::Filesystem(err.to_string()))?;
        Ok(())
    }

    /// Copy then remove the source, so a crash never leaves a partial file
    /// at `dest`.
    pub fn move_file_atomic(source: &Utf8Path, dest: &Utf8Path) -> Result<(), IngestError> {
        Self::copy_file_atomic(source, dest)?;
        fs::remove_file(source.as_std_path())
            .map_err(|err| IngestError::Filesystem(format!("remove {source}: {err}")))?;
        Ok(())
    }
}

impl DestinationProbe for Store {
    fn exists(&self, path: &Utf8Path) -> bool {
        path.as_std_path().exists()
    }
}

fn ensure_parent(path: &Utf8Path) -> Result<&Utf8Path, IngestError> {
    let parent = path
        .parent()
        .filter(|parent| !parent.as_str().is_empty())
        .unwrap_or(Utf8Path::new("."));
    fs::create_dir_all(parent.as_std_path())
        .map_err(|err| IngestError::Filesystem(err.to_string()))?;
    Ok(parent)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_paths() {
        let store = Store::new("/nemo");
        let location = Utf8Path::new("biccn/u19/zeng");
        assert_eq!(
            store.validated_dir("Controlled", location),
            "/nemo/controlled/validated/biccn/u19/zeng"
        );
        assert_eq!(
            store.release_dir("open", location),
            "/nemo/open/release/biccn/u19/zeng"
        );
        assert_eq!(store.release_root("open"), "/nemo/open/release");
    }
}
