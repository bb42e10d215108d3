use std::fs;
use std::io::{self, Read};

use camino::{Utf8Path, Utf8PathBuf};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use tempfile::Builder;

use crate::error::IngestError;

const BLOCK_SIZE: usize = 65536;

/// Compress `path` to `path.gz` and remove the original. Already-compressed
/// names are returned unchanged.
pub fn gzip_file(path: &Utf8Path) -> Result<Utf8PathBuf, IngestError> {
    if path.as_str().ends_with(".gz") {
        return Ok(path.to_path_buf());
    }
    let target = Utf8PathBuf::from(format!("{path}.gz"));
    let mut input = fs::File::open(path.as_std_path())
        .map_err(|err| IngestError::Filesystem(format!("open {path}: {err}")))?;
    let temp = temp_sibling(&target)?;
    let mut encoder = GzEncoder::new(temp.as_file(), Compression::default());
    io::copy(&mut input, &mut encoder).map_err(|err| IngestError::Filesystem(err.to_string()))?;
    encoder
        .finish()
        .map_err(|err| IngestError::Filesystem(err.to_string()))?;
    persist(temp, &target)?;
    fs::remove_file(path.as_std_path()).map_err(|err| IngestError::Filesystem(err.to_string()))?;
    Ok(target)
}

/// Decompress `path.gz` to `path` and remove the original. Names without a
/// `.gz` suffix are returned unchanged.
pub fn gunzip_file(path: &Utf8Path) -> Result<Utf8PathBuf, IngestError> {
    let Some(stripped) = path.as_str().strip_suffix(".gz") else {
        return Ok(path.to_path_buf());
    };
    let target = Utf8PathBuf::from(stripped);
    let input = fs::File::open(path.as_std_path())
        .map_err(|err| IngestError::Filesystem(format!("open {path}: {err}")))?;
    let mut decoder = GzDecoder::new(input);
    let mut temp = temp_sibling(&target)?;
    io::copy(&mut decoder, temp.as_file_mut())
        .map_err(|err| IngestError::Filesystem(format!("gunzip {path}: {err}")))?;
    persist(temp, &target)?;
    fs::remove_file(path.as_std_path()).map_err(|err| IngestError::Filesystem(err.to_string()))?;
    Ok(target)
}

pub fn md5_file(path: &Utf8Path) -> Result<String, IngestError> {
    let mut file = fs::File::open(path.as_std_path())
        .map_err(|err| IngestError::Filesystem(format!("open {path}: {err}")))?;
    let mut context = md5::Context::new();
    let mut buffer = vec![0u8; BLOCK_SIZE];
    loop {
        let read = file
            .read(&mut buffer)
            .map_err(|err| IngestError::Filesystem(err.to_string()))?;
        if read == 0 {
            break;
        }
        context.consume(&buffer[..read]);
    }
    Ok(format!("{:x}", context.compute()))
}

fn temp_sibling(target: &Utf8Path) -> Result<tempfile::NamedTempFile, IngestError> {
    let parent = target
        .parent()
        .filter(|parent| !parent.as_str().is_empty())
        .unwrap_or(Utf8Path::new("."));
    Builder::new()
        .prefix("nemo-ingest-file")
        .tempfile_in(parent.as_std_path())
        .map_err(|err| IngestError::Filesystem(err.to_string()))
}

fn persist(temp: tempfile::NamedTempFile, target: &Utf8Path) -> Result<(), IngestError> {
    temp.persist(target.as_std_path())
        .map_err(|err| IngestError::Filesystem(err.to_string()))?;
    Ok(())
}
