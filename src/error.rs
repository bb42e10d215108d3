use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

use crate::domain::{FileKind, FileSubtype};

#[derive(Debug, Error, Diagnostic)]
pub enum IngestError {
    #[error("Cannot determine an appropriate filetype for file {0}")]
    UnclassifiableFile(String),

    #[error("Cannot determine an appropriate sub-filetype for FASTQ file {0}")]
    UnresolvedFastqSubtype(String),

    #[error("Row for '{0}' has invalid value for field 'File_name'. No file prefix detected.")]
    EmptyPrefix(String),

    #[error("Attempted to bundle an unsupported file type {kind} for files of prefix {prefix}")]
    UnsupportedBundleKind { kind: String, prefix: String },

    #[error("Tried to change state from {from} to non-existing state {to}")]
    UnknownState { from: String, to: String },

    #[error("Tried to change state from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Manifest file {0} was not found")]
    ManifestNotFound(String),

    #[error("The file could not be read. It must be a plaintext tsv file.")]
    ManifestEncoding,

    #[error("Manifest header row fields differ from the header fields from the template.")]
    ManifestHeader,

    #[error("Row #{row} does not have the correct number of fields. Expected {expected} fields, but got {found}.")]
    RowFieldCount {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("Manifest contains no file rows.")]
    ManifestEmpty,

    #[error("failed to parse manifest: {0}")]
    ManifestParse(String),

    #[error("invalid submission manifest name: {0}")]
    InvalidSubmissionName(String),

    #[error("missing config file nemo-ingest.json")]
    MissingConfig,

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("no controlled vocabulary configured")]
    MissingVocabulary,

    #[error("failed to read auxiliary file at {0}")]
    AuxRead(PathBuf),

    #[error("failed to parse auxiliary file {path}: {message}")]
    AuxParse { path: PathBuf, message: String },

    #[error("filesystem error: {0}")]
    Filesystem(String),
}

/// Completeness violation found while validating one bundle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BundleIssue {
    #[error("All of the files for bundle with prefix '{prefix}' do not have the same sample ID in the manifest.")]
    SampleMismatch { prefix: String },

    #[error(
        "The files for the bundle with prefix '{prefix}' do not have the same metadata for the path. The columns Sub-program, Lab, Modality, Subspecimen_type, Technique, Species, and Data_type should all be the same."
    )]
    LocationMismatch { prefix: String },

    #[error("One of the {kind} files for file prefix '{prefix}' has multiple files of the same subtype")]
    DuplicateSubtype { kind: FileKind, prefix: String },

    #[error("Cannot create {kind} bundle for prefix '{prefix}': Missing {subtype} subtype file.")]
    MissingSubtype {
        kind: FileKind,
        prefix: String,
        subtype: FileSubtype,
    },

    #[error("Cannot create {kind} bundle for prefix '{prefix}': Only one fastq is allowed for long read sequencing.")]
    LongReadSubtypes { kind: FileKind, prefix: String },
}
