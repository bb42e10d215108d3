use std::collections::BTreeSet;
use std::sync::LazyLock;

use camino::Utf8Path;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::bundle::Bundle;
use crate::domain::{FileKind, FileSubtype, Technique};
use crate::error::{BundleIssue, IngestError};

/// What to do with a bundle whose kind has no completeness rule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnsupportedBundlePolicy {
    /// Log and leave the bundle NOT BUNDLED.
    #[default]
    Skip,
    /// Record an error on the bundle.
    Reject,
}

/// Recommended companion file that was not submitted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("No {subtype} file found for prefix '{prefix}'")]
pub struct MissingCompanion {
    pub prefix: String,
    pub subtype: FileSubtype,
}

#[derive(Debug, Default)]
pub struct Findings {
    pub issues: Vec<BundleIssue>,
    pub warnings: Vec<MissingCompanion>,
}

/// Read-only view of a bundle handed to a completeness rule.
pub struct RuleContext<'a> {
    kind: FileKind,
    prefix: &'a str,
    subtypes: Vec<FileSubtype>,
    technique: Option<&'a Technique>,
    sample_ids: BTreeSet<Option<&'a str>>,
    locations: BTreeSet<Option<&'a Utf8Path>>,
}

impl<'a> RuleContext<'a> {
    pub fn from_bundle(bundle: &'a Bundle) -> Self {
        let members = bundle.members();
        Self {
            kind: bundle.kind(),
            prefix: bundle.prefix(),
            subtypes: members.iter().map(|file| file.subtype()).collect(),
            technique: members.first().and_then(|file| file.technique()),
            sample_ids: members.iter().map(|file| file.sample_id()).collect(),
            locations: members.iter().map(|file| file.location()).collect(),
        }
    }

    pub fn technique(&self) -> Option<&Technique> {
        self.technique
    }

    pub fn has(&self, subtype: FileSubtype) -> bool {
        self.subtypes.contains(&subtype)
    }

    pub fn distinct_subtypes(&self) -> usize {
        self.subtypes.iter().collect::<BTreeSet<_>>().len()
    }

    /// One issue per required subtype that is absent.
    pub fn require(&self, findings: &mut Findings, required: &[FileSubtype]) {
        for subtype in required {
            if !self.has(*subtype) {
                findings.issues.push(BundleIssue::MissingSubtype {
                    kind: self.kind,
                    prefix: self.prefix.to_string(),
                    subtype: *subtype,
                });
            }
        }
    }

    pub fn recommend(&self, findings: &mut Findings, subtype: FileSubtype) {
        if !self.has(subtype) {
            findings.warnings.push(MissingCompanion {
                prefix: self.prefix.to_string(),
                subtype,
            });
        }
    }

    fn preamble(&self, findings: &mut Findings) {
        if self.sample_ids.len() > 1 {
            findings.issues.push(BundleIssue::SampleMismatch {
                prefix: self.prefix.to_string(),
            });
        }
        if self.locations.len() > 1 {
            findings.issues.push(BundleIssue::LocationMismatch {
                prefix: self.prefix.to_string(),
            });
        }
        if self.distinct_subtypes() != self.subtypes.len() {
            findings.issues.push(BundleIssue::DuplicateSubtype {
                kind: self.kind,
                prefix: self.prefix.to_string(),
            });
        }
    }
}

pub type CompletenessRule = fn(&RuleContext<'_>, &mut Findings);

/// Kind -> completeness rule table.
#[derive(Clone)]
pub struct RuleRegistry {
    rules: Vec<(FileKind, CompletenessRule)>,
}

static STANDARD: LazyLock<RuleRegistry> = LazyLock::new(|| RuleRegistry {
    rules: vec![
        (FileKind::Bam, bam_rule),
        (FileKind::CellHash, cellhash_rule),
        (FileKind::Cram, cram_rule),
        (FileKind::Csv, csv_rule),
        (FileKind::Fastq, fastq_rule),
        (FileKind::Fpkm, fpkm_rule),
        (FileKind::H5ad, h5ad_rule),
        (FileKind::Mex, mex_rule),
        (FileKind::Snap, snap_rule),
        (FileKind::TabAnalysis, tab_analysis_rule),
        (FileKind::TabCounts, tab_counts_rule),
        (FileKind::Tsv, tsv_rule),
        (FileKind::Vcf, vcf_rule),
    ],
});

impl RuleRegistry {
    pub fn standard() -> &'static RuleRegistry {
        &STANDARD
    }

    /// Copy of the table with `kind` unregistered.
    pub fn without(&self, kind: FileKind) -> RuleRegistry {
        RuleRegistry {
            rules: self
                .rules
                .iter()
                .filter(|(registered, _)| *registered != kind)
                .copied()
                .collect(),
        }
    }

    pub fn get(&self, kind: FileKind) -> Option<CompletenessRule> {
        self.rules
            .iter()
            .find(|(registered, _)| *registered == kind)
            .map(|(_, rule)| *rule)
    }

    /// Run the shared checks and the kind's rule, record every issue on the
    /// bundle and settle it on VALID or INVALID.
    pub fn validate(&self, bundle: &mut Bundle) -> Result<(), IngestError> {
        let rule = self
            .get(bundle.kind())
            .ok_or_else(|| IngestError::UnsupportedBundleKind {
                kind: bundle.kind().to_string(),
                prefix: bundle.prefix().to_string(),
            })?;

        info!(kind = %bundle.kind(), "validating file bundle {}", bundle.prefix());
        let mut findings = Findings::default();
        {
            let context = RuleContext::from_bundle(bundle);
            context.preamble(&mut findings);
            rule(&context, &mut findings);
        }

        for issue in findings.issues {
            bundle.record_issue(issue);
        }
        for warning in findings.warnings {
            warn!("{warning}");
            bundle.push_warning(warning.to_string());
        }
        bundle.finalize();
        Ok(())
    }

    /// [`validate`](Self::validate) with the unsupported-kind outcome decided
    /// by `policy`.
    pub fn validate_with_policy(&self, bundle: &mut Bundle, policy: UnsupportedBundlePolicy) {
        if let Err(err) = self.validate(bundle) {
            match policy {
                UnsupportedBundlePolicy::Skip => {
                    info!("{err}. Skipping bundle validation");
                }
                UnsupportedBundlePolicy::Reject => bundle.record_error(err.to_string()),
            }
        }
    }
}

fn bam_rule(ctx: &RuleContext<'_>, findings: &mut Findings) {
    ctx.require(findings, &[FileSubtype::Bam]);
    ctx.recommend(findings, FileSubtype::BamIdx);
}

fn cram_rule(ctx: &RuleContext<'_>, findings: &mut Findings) {
    ctx.require(findings, &[FileSubtype::Cram]);
    ctx.recommend(findings, FileSubtype::CramIdx);
}

fn vcf_rule(ctx: &RuleContext<'_>, findings: &mut Findings) {
    ctx.require(findings, &[FileSubtype::Vcf]);
    ctx.recommend(findings, FileSubtype::VcfTbi);
}

fn csv_rule(ctx: &RuleContext<'_>, findings: &mut Findings) {
    ctx.require(findings, &[FileSubtype::Csv]);
}

fn tsv_rule(ctx: &RuleContext<'_>, findings: &mut Findings) {
    ctx.require(findings, &[FileSubtype::Tsv]);
    ctx.recommend(findings, FileSubtype::TsvIdx);
}

fn fpkm_rule(ctx: &RuleContext<'_>, findings: &mut Findings) {
    ctx.require(findings, &[FileSubtype::GenesFpkm, FileSubtype::IsoformsFpkm]);
}

fn h5ad_rule(ctx: &RuleContext<'_>, findings: &mut Findings) {
    ctx.require(findings, &[FileSubtype::H5ad]);
}

fn snap_rule(ctx: &RuleContext<'_>, findings: &mut Findings) {
    ctx.require(findings, &[FileSubtype::Snap]);
    ctx.recommend(findings, FileSubtype::SnapQc);
}

fn tab_analysis_rule(ctx: &RuleContext<'_>, findings: &mut Findings) {
    ctx.require(
        findings,
        &[
            FileSubtype::TabAnalysisCol,
            FileSubtype::TabAnalysisRow,
            FileSubtype::TabAnalysisDimred,
        ],
    );
}

fn tab_counts_rule(ctx: &RuleContext<'_>, findings: &mut Findings) {
    ctx.require(
        findings,
        &[
            FileSubtype::TabCountsCol,
            FileSubtype::TabCountsRow,
            FileSubtype::TabCountsMtx,
        ],
    );
}

fn mex_rule(ctx: &RuleContext<'_>, findings: &mut Findings) {
    // Peak calls stand in for the feature table in ATAC matrices.
    if ctx.has(FileSubtype::MexPeak) {
        ctx.require(
            findings,
            &[FileSubtype::MexBarcodes, FileSubtype::MexPeak, FileSubtype::MexMtx],
        );
    } else {
        ctx.require(
            findings,
            &[FileSubtype::MexBarcodes, FileSubtype::MexGenes, FileSubtype::MexMtx],
        );
    }
}

fn cellhash_rule(ctx: &RuleContext<'_>, findings: &mut Findings) {
    use FileSubtype::{CellhashCsv, CellhashFastqI1, CellhashFastqI2, CellhashFastqR1, CellhashFastqR2, CellhashFastqR3};

    if ctx.has(CellhashFastqI2) {
        ctx.require(findings, &[CellhashFastqI1, CellhashFastqR1, CellhashFastqR2]);
    } else if ctx.has(CellhashFastqI1) || ctx.has(CellhashFastqR3) {
        ctx.require(findings, &[CellhashFastqR1, CellhashFastqR2]);
    } else if ctx.has(CellhashFastqR2) {
        ctx.require(findings, &[CellhashFastqR1]);
    } else if ctx.has(CellhashCsv) {
        ctx.require(findings, &[CellhashFastqR1, CellhashFastqR2]);
    }
}

fn fastq_rule(ctx: &RuleContext<'_>, findings: &mut Findings) {
    use FileSubtype::{FastqIndex1, FastqIndex2, FastqRead1, FastqRead2, FastqRead3};

    match ctx.technique() {
        Some(technique) if technique.is_long_read() => {
            if ctx.distinct_subtypes() != 1 {
                findings.issues.push(BundleIssue::LongReadSubtypes {
                    kind: ctx.kind,
                    prefix: ctx.prefix.to_string(),
                });
            }
        }
        Some(Technique::SciRnaSeq3) => {
            if ctx.has(FastqIndex1) {
                ctx.require(findings, &[FastqRead2, FastqRead1]);
            } else {
                ctx.require(findings, &[FastqRead2]);
            }
        }
        _ => {
            if ctx.has(FastqIndex2) {
                ctx.require(findings, &[FastqIndex1, FastqRead1, FastqRead2]);
            } else if ctx.has(FastqIndex1) || ctx.has(FastqRead3) {
                ctx.require(findings, &[FastqRead1, FastqRead2]);
            } else if ctx.has(FastqRead2) {
                ctx.require(findings, &[FastqRead1]);
            }
        }
    }
}
