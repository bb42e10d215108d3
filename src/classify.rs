use camino::Utf8Path;
use serde::Serialize;

use crate::domain::{FileKind, FileSubtype, Technique};
use crate::error::IngestError;
use crate::patterns::PatternRegistry;
use crate::prefix::{PrefixParts, extract_prefix};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub filename: String,
    pub kind: FileKind,
    pub subtype: FileSubtype,
    pub prefix: String,
    #[serde(skip)]
    pub parts: PrefixParts,
}

/// Classify a filename against the standard pattern table. Only the basename
/// takes part in matching.
pub fn classify(filename: &str, technique: Option<&Technique>) -> Result<Classification, IngestError> {
    classify_with(PatternRegistry::standard(), filename, technique)
}

pub fn classify_with(
    registry: &PatternRegistry,
    filename: &str,
    technique: Option<&Technique>,
) -> Result<Classification, IngestError> {
    let name = Utf8Path::new(filename).file_name().unwrap_or(filename);
    let found = registry.lookup(name, technique)?;
    let parts = extract_prefix(name, &found, registry)?;
    Ok(Classification {
        filename: filename.to_string(),
        kind: found.subtype.kind(),
        subtype: found.subtype,
        prefix: parts.prefix.clone(),
        parts,
    })
}
