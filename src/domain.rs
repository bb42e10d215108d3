use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use chrono::NaiveDateTime;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::IngestError;

/// Top-level file category. Decides which bundle rule set and which
/// normalisation applies to a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileKind {
    Bam,
    Bed,
    Qbed,
    Bigbed,
    Bigwig,
    Cram,
    Csv,
    #[serde(rename = "CELLHASH")]
    CellHash,
    Fastq,
    Fpkm,
    H5,
    H5ad,
    Loom,
    Mex,
    Snap,
    TabAnalysis,
    TabCounts,
    Tsv,
    PlinkBed,
    Bim,
    Fam,
    R,
    Txt,
    Vcf,
}

impl FileKind {
    pub const ALL: [FileKind; 24] = [
        FileKind::Bam,
        FileKind::Bed,
        FileKind::Qbed,
        FileKind::Bigbed,
        FileKind::Bigwig,
        FileKind::Cram,
        FileKind::Csv,
        FileKind::CellHash,
        FileKind::Fastq,
        FileKind::Fpkm,
        FileKind::H5,
        FileKind::H5ad,
        FileKind::Loom,
        FileKind::Mex,
        FileKind::Snap,
        FileKind::TabAnalysis,
        FileKind::TabCounts,
        FileKind::Tsv,
        FileKind::PlinkBed,
        FileKind::Bim,
        FileKind::Fam,
        FileKind::R,
        FileKind::Txt,
        FileKind::Vcf,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::Bam => "BAM",
            FileKind::Bed => "BED",
            FileKind::Qbed => "QBED",
            FileKind::Bigbed => "BIGBED",
            FileKind::Bigwig => "BIGWIG",
            FileKind::Cram => "CRAM",
            FileKind::Csv => "CSV",
            FileKind::CellHash => "CELLHASH",
            FileKind::Fastq => "FASTQ",
            FileKind::Fpkm => "FPKM",
            FileKind::H5 => "H5",
            FileKind::H5ad => "H5AD",
            FileKind::Loom => "LOOM",
            FileKind::Mex => "MEX",
            FileKind::Snap => "SNAP",
            FileKind::TabAnalysis => "TAB_ANALYSIS",
            FileKind::TabCounts => "TAB_COUNTS",
            FileKind::Tsv => "TSV",
            FileKind::PlinkBed => "PLINK_BED",
            FileKind::Bim => "BIM",
            FileKind::Fam => "FAM",
            FileKind::R => "R",
            FileKind::Txt => "TXT",
            FileKind::Vcf => "VCF",
        }
    }

    /// Whether files of this kind are grouped into bundles. Positional and
    /// free-form formats validate on their own.
    pub fn is_bundled(&self) -> bool {
        matches!(
            self,
            FileKind::Bam
                | FileKind::CellHash
                | FileKind::Cram
                | FileKind::Csv
                | FileKind::Fastq
                | FileKind::Fpkm
                | FileKind::H5ad
                | FileKind::Mex
                | FileKind::Snap
                | FileKind::TabAnalysis
                | FileKind::TabCounts
                | FileKind::Tsv
                | FileKind::Vcf
        )
    }

    pub fn identifier_table(&self) -> IdentifierTable {
        match self {
            FileKind::Bam
            | FileKind::Cram
            | FileKind::Vcf
            | FileKind::PlinkBed
            | FileKind::Bim
            | FileKind::Fam => IdentifierTable::Alignment,
            FileKind::CellHash | FileKind::Fastq => IdentifierTable::Sequence,
            _ => IdentifierTable::Derived,
        }
    }

    pub fn normalization(&self) -> Normalization {
        match self {
            FileKind::Csv | FileKind::Fastq | FileKind::Snap | FileKind::Loom => {
                Normalization::Gzip
            }
            FileKind::Bed | FileKind::Qbed | FileKind::Bigbed | FileKind::Bigwig | FileKind::Mex => {
                Normalization::Gunzip
            }
            _ => Normalization::Keep,
        }
    }

    /// Archive extension of the released bundle, for bundled kinds only.
    pub fn bundle_extension(&self) -> Option<&'static str> {
        match self {
            FileKind::Bam => Some("bam.tar"),
            FileKind::CellHash => Some("nuc_hash.tar"),
            FileKind::Cram => Some("cram.tar"),
            FileKind::Csv => Some("csv.tar"),
            FileKind::Fastq => Some("fastq.tar"),
            FileKind::Fpkm => Some("fpkm_tracking.tar"),
            FileKind::H5ad => Some("h5ad.tar"),
            FileKind::Mex => Some("mex.tar.gz"),
            FileKind::Snap => Some("snap.tar.gz"),
            FileKind::TabAnalysis => Some("tab.analysis.tar.gz"),
            FileKind::TabCounts => Some("tab.counts.tar.gz"),
            FileKind::Tsv => Some("tsv.tar"),
            FileKind::Vcf => Some("vcf.tar"),
            _ => None,
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Role of a file within its kind. Every subtype belongs to exactly one kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileSubtype {
    Bam,
    BamIdx,
    Bed,
    Qbed,
    Bigbed,
    Bigwig,
    Cram,
    CramIdx,
    Csv,
    CellhashCsv,
    CellhashFastqR1,
    CellhashFastqR2,
    CellhashFastqR3,
    CellhashFastqI1,
    CellhashFastqI2,
    FastqRead1,
    FastqRead2,
    FastqRead3,
    FastqIndex1,
    FastqIndex2,
    LongReadFastq,
    GenesFpkm,
    IsoformsFpkm,
    H5,
    H5ad,
    H5adJson,
    Loom,
    MexBarcodes,
    MexGenes,
    MexMtx,
    MexPeak,
    Snap,
    SnapQc,
    TabAnalysisCol,
    TabAnalysisRow,
    TabAnalysisDimred,
    TabCountsCol,
    TabCountsRow,
    TabCountsMtx,
    TabCountsJson,
    Tsv,
    TsvIdx,
    PlinkBed,
    Bim,
    Fam,
    R,
    Txt,
    Vcf,
    VcfTbi,
}

impl FileSubtype {
    pub fn kind(&self) -> FileKind {
        match self {
            FileSubtype::Bam | FileSubtype::BamIdx => FileKind::Bam,
            FileSubtype::Bed => FileKind::Bed,
            FileSubtype::Qbed => FileKind::Qbed,
            FileSubtype::Bigbed => FileKind::Bigbed,
            FileSubtype::Bigwig => FileKind::Bigwig,
            FileSubtype::Cram | FileSubtype::CramIdx => FileKind::Cram,
            FileSubtype::Csv => FileKind::Csv,
            FileSubtype::CellhashCsv
            | FileSubtype::CellhashFastqR1
            | FileSubtype::CellhashFastqR2
            | FileSubtype::CellhashFastqR3
            | FileSubtype::CellhashFastqI1
            | FileSubtype::CellhashFastqI2 => FileKind::CellHash,
            FileSubtype::FastqRead1
            | FileSubtype::FastqRead2
            | FileSubtype::FastqRead3
            | FileSubtype::FastqIndex1
            | FileSubtype::FastqIndex2
            | FileSubtype::LongReadFastq => FileKind::Fastq,
            FileSubtype::GenesFpkm | FileSubtype::IsoformsFpkm => FileKind::Fpkm,
            FileSubtype::H5 => FileKind::H5,
            FileSubtype::H5ad | FileSubtype::H5adJson => FileKind::H5ad,
            FileSubtype::Loom => FileKind::Loom,
            FileSubtype::MexBarcodes
            | FileSubtype::MexGenes
            | FileSubtype::MexMtx
            | FileSubtype::MexPeak => FileKind::Mex,
            FileSubtype::Snap | FileSubtype::SnapQc => FileKind::Snap,
            FileSubtype::TabAnalysisCol
            | FileSubtype::TabAnalysisRow
            | FileSubtype::TabAnalysisDimred => FileKind::TabAnalysis,
            FileSubtype::TabCountsCol
            | FileSubtype::TabCountsRow
            | FileSubtype::TabCountsMtx
            | FileSubtype::TabCountsJson => FileKind::TabCounts,
            FileSubtype::Tsv | FileSubtype::TsvIdx => FileKind::Tsv,
            FileSubtype::PlinkBed => FileKind::PlinkBed,
            FileSubtype::Bim => FileKind::Bim,
            FileSubtype::Fam => FileKind::Fam,
            FileSubtype::R => FileKind::R,
            FileSubtype::Txt => FileKind::Txt,
            FileSubtype::Vcf | FileSubtype::VcfTbi => FileKind::Vcf,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FileSubtype::Bam => "BAM",
            FileSubtype::BamIdx => "BAM_IDX",
            FileSubtype::Bed => "BED",
            FileSubtype::Qbed => "QBED",
            FileSubtype::Bigbed => "BIGBED",
            FileSubtype::Bigwig => "BIGWIG",
            FileSubtype::Cram => "CRAM",
            FileSubtype::CramIdx => "CRAM_IDX",
            FileSubtype::Csv => "CSV",
            FileSubtype::CellhashCsv => "CELLHASH_CSV",
            FileSubtype::CellhashFastqR1 => "CELLHASH_FASTQ_R1",
            FileSubtype::CellhashFastqR2 => "CELLHASH_FASTQ_R2",
            FileSubtype::CellhashFastqR3 => "CELLHASH_FASTQ_R3",
            FileSubtype::CellhashFastqI1 => "CELLHASH_FASTQ_I1",
            FileSubtype::CellhashFastqI2 => "CELLHASH_FASTQ_I2",
            FileSubtype::FastqRead1 => "FASTQ_READ1",
            FileSubtype::FastqRead2 => "FASTQ_READ2",
            FileSubtype::FastqRead3 => "FASTQ_READ3",
            FileSubtype::FastqIndex1 => "FASTQ_INDEX1",
            FileSubtype::FastqIndex2 => "FASTQ_INDEX2",
            FileSubtype::LongReadFastq => "LONG_READ_FASTQ",
            FileSubtype::GenesFpkm => "GENES_FPKM",
            FileSubtype::IsoformsFpkm => "ISOFORMS_FPKM",
            FileSubtype::H5 => "H5",
            FileSubtype::H5ad => "H5AD",
            FileSubtype::H5adJson => "H5AD_JSON",
            FileSubtype::Loom => "LOOM",
            FileSubtype::MexBarcodes => "MEX_BARCODES",
            FileSubtype::MexGenes => "MEX_GENES",
            FileSubtype::MexMtx => "MEX_MTX",
            FileSubtype::MexPeak => "MEX_PEAK",
            FileSubtype::Snap => "SNAP",
            FileSubtype::SnapQc => "SNAP_QC",
            FileSubtype::TabAnalysisCol => "TAB_ANALYSIS_COL",
            FileSubtype::TabAnalysisRow => "TAB_ANALYSIS_ROW",
            FileSubtype::TabAnalysisDimred => "TAB_ANALYSIS_DIMRED",
            FileSubtype::TabCountsCol => "TAB_COUNTS_COL",
            FileSubtype::TabCountsRow => "TAB_COUNTS_ROW",
            FileSubtype::TabCountsMtx => "TAB_COUNTS_MTX",
            FileSubtype::TabCountsJson => "TAB_COUNTS_JSON",
            FileSubtype::Tsv => "TSV",
            FileSubtype::TsvIdx => "TSV_IDX",
            FileSubtype::PlinkBed => "PLINK_BED",
            FileSubtype::Bim => "BIM",
            FileSubtype::Fam => "FAM",
            FileSubtype::R => "R",
            FileSubtype::Txt => "TXT",
            FileSubtype::Vcf => "VCF",
            FileSubtype::VcfTbi => "VCF_TBI",
        }
    }
}

impl fmt::Display for FileSubtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentifierTable {
    Alignment,
    Sequence,
    Derived,
}

impl fmt::Display for IdentifierTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentifierTable::Alignment => write!(f, "alignment"),
            IdentifierTable::Sequence => write!(f, "sequence"),
            IdentifierTable::Derived => write!(f, "derived"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Normalization {
    Gzip,
    Gunzip,
    Keep,
}

/// Sequencing or assay method declared in the manifest `Technique` column.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Technique {
    CellHashing,
    PacBio,
    Nanopore,
    SciRnaSeq3,
    Other(String),
}

impl Technique {
    /// Empty values carry no technique.
    pub fn parse(value: &str) -> Option<Self> {
        let normalized = value.trim().to_lowercase();
        let technique = match normalized.as_str() {
            "" => return None,
            "10x genomics multiome-cell hashing;cell hashing" => Technique::CellHashing,
            "pacbio long read sequencing" => Technique::PacBio,
            "oxford nanopore long read sequencing" => Technique::Nanopore,
            "sci-rna-seq3" => Technique::SciRnaSeq3,
            _ => Technique::Other(normalized),
        };
        Some(technique)
    }

    pub fn is_long_read(&self) -> bool {
        matches!(self, Technique::PacBio | Technique::Nanopore)
    }
}

impl fmt::Display for Technique {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Technique::CellHashing => write!(f, "10x genomics multiome-cell hashing;cell hashing"),
            Technique::PacBio => write!(f, "pacbio long read sequencing"),
            Technique::Nanopore => write!(f, "oxford nanopore long read sequencing"),
            Technique::SciRnaSeq3 => write!(f, "sci-rna-seq3"),
            Technique::Other(value) => write!(f, "{value}"),
        }
    }
}

/// Lifecycle of a submitted file.
///
/// NOT SUBMITTED -> TRANSFERRING -> SUBMITTED -> INVALID/VALID -> VALIDATED
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileState {
    NotSubmitted,
    Transferring,
    Submitted,
    Invalid,
    Valid,
    Validated,
}

impl FileState {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_uppercase().replace('_', " ").as_str() {
            "NOT SUBMITTED" => Some(FileState::NotSubmitted),
            "TRANSFERRING" => Some(FileState::Transferring),
            "SUBMITTED" => Some(FileState::Submitted),
            "INVALID" => Some(FileState::Invalid),
            "VALID" => Some(FileState::Valid),
            "VALIDATED" => Some(FileState::Validated),
            _ => None,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            FileState::NotSubmitted => 0,
            FileState::Transferring => 1,
            FileState::Submitted => 2,
            FileState::Invalid | FileState::Valid => 3,
            FileState::Validated => 4,
        }
    }

    /// Forward-only, except that any state before VALIDATED may drop to INVALID.
    pub fn can_transition_to(&self, next: FileState) -> bool {
        match next {
            FileState::Invalid => *self != FileState::Validated,
            FileState::Validated => *self == FileState::Valid,
            FileState::Valid => self.rank() < 3 || *self == FileState::Valid,
            _ => next.rank() >= self.rank() && self.rank() < 3,
        }
    }
}

impl fmt::Display for FileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileState::NotSubmitted => write!(f, "NOT SUBMITTED"),
            FileState::Transferring => write!(f, "TRANSFERRING"),
            FileState::Submitted => write!(f, "SUBMITTED"),
            FileState::Invalid => write!(f, "INVALID"),
            FileState::Valid => write!(f, "VALID"),
            FileState::Validated => write!(f, "VALIDATED"),
        }
    }
}

/// Lifecycle of a bundle: NOT BUNDLED -> INVALID/VALID -> RELEASED
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BundleState {
    NotBundled,
    Invalid,
    Valid,
    Released,
}

impl BundleState {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_uppercase().replace('_', " ").as_str() {
            "NOT BUNDLED" => Some(BundleState::NotBundled),
            "INVALID" => Some(BundleState::Invalid),
            "VALID" => Some(BundleState::Valid),
            "RELEASED" => Some(BundleState::Released),
            _ => None,
        }
    }

    pub fn can_transition_to(&self, next: BundleState) -> bool {
        match (self, next) {
            (BundleState::NotBundled, BundleState::Valid | BundleState::Invalid) => true,
            (BundleState::Valid, BundleState::Invalid | BundleState::Released) => true,
            (BundleState::Invalid, BundleState::Invalid) => true,
            _ => false,
        }
    }
}

impl fmt::Display for BundleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BundleState::NotBundled => write!(f, "NOT BUNDLED"),
            BundleState::Invalid => write!(f, "INVALID"),
            BundleState::Valid => write!(f, "VALID"),
            BundleState::Released => write!(f, "RELEASED"),
        }
    }
}

static SUBMISSION_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^manifest-([0-9]{4}-[0-9]{2}-[0-9]{2})-([0-9]{2})[:_]([0-9]{2})[:_]([0-9]{2})-([a-zA-Z0-9]{7})\.tsv$",
    )
    .unwrap()
});

/// Name given to a manifest by the submission portal:
/// `manifest-YYYY-MM-DD-HH:MM:SS-<submission id>.tsv`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionName {
    submission_id: String,
    submitted_at: NaiveDateTime,
}

impl SubmissionName {
    pub fn submission_id(&self) -> &str {
        &self.submission_id
    }

    pub fn submitted_at(&self) -> NaiveDateTime {
        self.submitted_at
    }
}

impl FromStr for SubmissionName {
    type Err = IngestError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let caps = SUBMISSION_NAME
            .captures(trimmed)
            .ok_or_else(|| IngestError::InvalidSubmissionName(value.to_string()))?;
        let stamp = format!("{} {}:{}:{}", &caps[1], &caps[2], &caps[3], &caps[4]);
        let submitted_at = NaiveDateTime::parse_from_str(&stamp, "%Y-%m-%d %H:%M:%S")
            .map_err(|_| IngestError::InvalidSubmissionName(value.to_string()))?;
        Ok(Self {
            submission_id: caps[5].to_string(),
            submitted_at,
        })
    }
}
