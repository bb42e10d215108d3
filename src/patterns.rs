use std::sync::LazyLock;

use regex::Regex;

use crate::domain::{FileSubtype, Technique};
use crate::error::IngestError;

/// How a matched pattern divides a filename for prefix extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitStyle {
    /// Everything left of the match is the prefix.
    Suffix,
    /// Sequencing read/index marker; the text after it is cut at the FASTQ extension.
    ReadMarker,
    /// Cell-hash sample/lane marker; the lane group is kept as the tail.
    CellHashMarker,
    /// Tabular analysis marker embedded mid-name.
    AnalysisMarker,
}

#[derive(Debug, Clone, Copy)]
enum Target {
    Subtype(FileSubtype),
    Fastq,
}

#[derive(Debug)]
struct Rule {
    pattern: Regex,
    exclude: Option<Regex>,
    target: Target,
    split: SplitStyle,
}

impl Rule {
    fn new(pattern: &str, target: Target, split: SplitStyle) -> Self {
        Self {
            pattern: Regex::new(pattern).unwrap(),
            exclude: None,
            target,
            split,
        }
    }

    fn suffix(pattern: &str, subtype: FileSubtype) -> Self {
        Self::new(pattern, Target::Subtype(subtype), SplitStyle::Suffix)
    }

    fn excluding(mut self, exclude: &str) -> Self {
        self.exclude = Some(Regex::new(exclude).unwrap());
        self
    }

    fn matches(&self, name: &str) -> bool {
        self.pattern.is_match(name)
            && !self
                .exclude
                .as_ref()
                .map(|exclude| exclude.is_match(name))
                .unwrap_or(false)
    }
}

/// Result of a successful pattern lookup: the subtype and the pattern that
/// claimed the name.
#[derive(Debug, Clone, Copy)]
pub struct PatternMatch<'r> {
    pub subtype: FileSubtype,
    pub pattern: &'r Regex,
    pub split: SplitStyle,
}

pub const FASTQ_EXTENSION: &str = r"\.f(ast)?q(\.gz)?$";

const READ_SUFFIX: &str = r"(?:_[0-9]{3}|\.raw|\.trimmed|\.trimed)?\.f(?:ast)?q(?:\.gz)?$";
const CELLHASH_LANE: &str = r"(_[Ss][0-9]{1,2}_[Ll](?:[0-9]{3}|[0-9]{1}-[0-9]{1}))";
const CELLHASH_SUFFIX: &str = r"(?:_[0-9]{3})?\.f(?:ast)?q(?:\.gz)?$";

/// Ordered classification table. The first rule that matches wins, so index
/// and excluded variants sit ahead of the generic rules they would shadow.
pub struct PatternRegistry {
    rules: Vec<Rule>,
    read_markers: Vec<(Regex, FileSubtype)>,
    cellhash_markers: Vec<(Regex, FileSubtype)>,
    fastq: Regex,
}

static STANDARD: LazyLock<PatternRegistry> = LazyLock::new(PatternRegistry::build);

impl PatternRegistry {
    /// Shared read-only table.
    pub fn standard() -> &'static PatternRegistry {
        &STANDARD
    }

    fn build() -> Self {
        use FileSubtype as S;

        let rules = vec![
            Rule::suffix(r"\.bam$", S::Bam),
            Rule::suffix(r"\.bam\.bai$", S::BamIdx),
            Rule::suffix(r"\.bed(\.gz)?$", S::Bed).excluding(r"(peaks|plink)\.bed(\.gz)?$"),
            Rule::suffix(r"\.qbed(\.gz)?$", S::Qbed).excluding(r"(peaks|plink)\.qbed(\.gz)?$"),
            Rule::suffix(r"(\.bb|\.bigBed|\.bigbed)(\.gz)?$", S::Bigbed),
            Rule::suffix(r"(\.bw|\.bigWig|\.bigwig)(\.gz)?$", S::Bigwig),
            Rule::suffix(r"\.cram$", S::Cram),
            Rule::suffix(r"\.cram\.crai$", S::CramIdx),
            Rule::suffix(r"\.csv(\.gz)?$", S::Csv).excluding(r"(^|_)nuc_hash\.csv(\.gz)?$"),
            Rule::suffix(r"(^|_)nuc_hash\.csv(\.gz)?$", S::CellhashCsv),
            Rule::new(FASTQ_EXTENSION, Target::Fastq, SplitStyle::Suffix),
            Rule::suffix(r"genes\.fpkm_tracking$", S::GenesFpkm),
            Rule::suffix(r"isoforms\.fpkm_tracking$", S::IsoformsFpkm),
            Rule::suffix(r"\.h5$", S::H5),
            Rule::suffix(r"\.h5ad$", S::H5ad),
            Rule::suffix(r"\.json$", S::H5adJson).excluding(r"EXPmeta\.json$"),
            Rule::suffix(r"\.loom$", S::Loom),
            Rule::suffix(r"\.?(barcodes|_cell_annotations)\.tsv(\.gz)?$", S::MexBarcodes),
            Rule::suffix(r"\.?(features|genes|_gene_annotations)\.tsv(\.gz)?$", S::MexGenes),
            Rule::suffix(r"\.?(matrix|_umi_counts)\.mtx(\.gz)?$", S::MexMtx),
            Rule::suffix(r"peaks\.bed(\.gz)?$", S::MexPeak),
            Rule::suffix(r"\.snap$", S::Snap),
            Rule::suffix(r"\.snap\.qc$", S::SnapQc),
            Rule::new(
                r"_?COLmeta_DIMRED_?",
                Target::Subtype(S::TabAnalysisCol),
                SplitStyle::AnalysisMarker,
            ),
            Rule::new(
                r"_?ROWmeta_DIMRED_?",
                Target::Subtype(S::TabAnalysisRow),
                SplitStyle::AnalysisMarker,
            ),
            Rule::new(
                r"_?DIMREDmeta_?",
                Target::Subtype(S::TabAnalysisDimred),
                SplitStyle::AnalysisMarker,
            ),
            Rule::suffix(r"COLmeta\.tab$", S::TabCountsCol),
            Rule::suffix(r"ROWmeta\.tab$", S::TabCountsRow),
            Rule::suffix(r"DataMTX\.tab$", S::TabCountsMtx),
            Rule::suffix(r"EXPmeta\.json$", S::TabCountsJson),
            Rule::suffix(r"\.tsv(\.gz)?$", S::Tsv).excluding(r"(barcodes|features|genes)\.tsv(\.gz)?$"),
            Rule::suffix(r"\.tsv(\.gz)?\.(tbi|idx)$", S::TsvIdx),
            Rule::suffix(r"\.plink\.bed$", S::PlinkBed),
            Rule::suffix(r"\.bim$", S::Bim),
            Rule::suffix(r"\.fam$", S::Fam),
            Rule::suffix(r"(\.rds|\.rda|\.Rdata|\.Robj)$", S::R),
            Rule::suffix(r"\.txt$", S::Txt),
            Rule::suffix(r"\.vcf\.gz$", S::Vcf),
            Rule::suffix(r"\.vcf\.gz\.tbi$", S::VcfTbi),
        ];

        let read_marker = |marker: &str| Regex::new(&format!("{marker}{READ_SUFFIX}")).unwrap();
        let read_markers = vec![
            (read_marker(r"(-R1|_R1|\.R1|\.read1)"), S::FastqRead1),
            (read_marker(r"(-R2|_R2|\.R2|\.read2)"), S::FastqRead2),
            (read_marker(r"(-R3|_R3|\.R3|\.read3)"), S::FastqRead3),
            (read_marker(r"(-|_|\.)I1"), S::FastqIndex1),
            (read_marker(r"(-|_|\.)I2"), S::FastqIndex2),
        ];

        let cellhash_marker =
            |read: &str| Regex::new(&format!("{CELLHASH_LANE}_{read}{CELLHASH_SUFFIX}")).unwrap();
        let cellhash_markers = vec![
            (cellhash_marker("R1"), S::CellhashFastqR1),
            (cellhash_marker("R2"), S::CellhashFastqR2),
            (cellhash_marker("R3"), S::CellhashFastqR3),
            (cellhash_marker("I1"), S::CellhashFastqI1),
            (cellhash_marker("I2"), S::CellhashFastqI2),
        ];

        Self {
            rules,
            read_markers,
            cellhash_markers,
            fastq: Regex::new(FASTQ_EXTENSION).unwrap(),
        }
    }

    /// Find the subtype for a basename. FASTQ names go through a second
    /// lookup driven by the declared technique.
    pub fn lookup(
        &self,
        name: &str,
        technique: Option<&Technique>,
    ) -> Result<PatternMatch<'_>, IngestError> {
        let rule = self
            .rules
            .iter()
            .find(|rule| rule.matches(name))
            .ok_or_else(|| IngestError::UnclassifiableFile(name.to_string()))?;

        match rule.target {
            Target::Subtype(subtype) => Ok(PatternMatch {
                subtype,
                pattern: &rule.pattern,
                split: rule.split,
            }),
            Target::Fastq => self
                .fastq_component(name, technique)
                .ok_or_else(|| IngestError::UnresolvedFastqSubtype(name.to_string())),
        }
    }

    fn fastq_component(
        &self,
        name: &str,
        technique: Option<&Technique>,
    ) -> Option<PatternMatch<'_>> {
        if matches!(technique, Some(Technique::CellHashing)) {
            return self
                .cellhash_markers
                .iter()
                .find(|(pattern, _)| pattern.is_match(name))
                .map(|(pattern, subtype)| PatternMatch {
                    subtype: *subtype,
                    pattern,
                    split: SplitStyle::CellHashMarker,
                });
        }

        if let Some((pattern, subtype)) = self
            .read_markers
            .iter()
            .find(|(pattern, _)| pattern.is_match(name))
        {
            return Some(PatternMatch {
                subtype: *subtype,
                pattern,
                split: SplitStyle::ReadMarker,
            });
        }

        // Long-read platforms carry no read marker in their names.
        if technique.is_some_and(Technique::is_long_read) {
            return Some(PatternMatch {
                subtype: FileSubtype::LongReadFastq,
                pattern: &self.fastq,
                split: SplitStyle::Suffix,
            });
        }

        None
    }

    pub fn fastq_extension(&self) -> &Regex {
        &self.fastq
    }
}
