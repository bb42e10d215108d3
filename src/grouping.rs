use indexmap::IndexMap;
use tracing::debug;

use crate::bundle::Bundle;
use crate::file_entity::{BundleKey, FileEntity};
use crate::rules::{RuleRegistry, UnsupportedBundlePolicy};

/// Files of one manifest after grouping: bundles in order of first
/// appearance, plus the files that validate on their own.
#[derive(Debug, Default)]
pub struct GroupedFiles {
    pub bundles: Vec<Bundle>,
    pub standalone: Vec<FileEntity>,
}

impl GroupedFiles {
    pub fn is_valid(&self) -> bool {
        self.bundles.iter().all(|bundle| bundle.errors().is_empty())
    }

    pub fn errors(&self) -> impl Iterator<Item = &str> {
        self.bundles
            .iter()
            .flat_map(|bundle| bundle.errors().iter().map(String::as_str))
    }
}

/// Partition files by (prefix, kind). Kinds that are never bundled are
/// passed through untouched.
pub fn group_by_prefix(entities: impl IntoIterator<Item = FileEntity>) -> GroupedFiles {
    let mut groups: IndexMap<BundleKey, Vec<FileEntity>> = IndexMap::new();
    let mut standalone = Vec::new();
    for entity in entities {
        if entity.is_bundled() {
            groups.entry(entity.bundle_key()).or_default().push(entity);
        } else {
            standalone.push(entity);
        }
    }

    debug!(bundles = groups.len(), standalone = standalone.len(), "grouped files");
    GroupedFiles {
        bundles: groups
            .into_iter()
            .map(|(key, members)| Bundle::new(key, members))
            .collect(),
        standalone,
    }
}

/// Group the files and run every bundle through its completeness rule.
pub fn group_and_validate(
    entities: impl IntoIterator<Item = FileEntity>,
    rules: &RuleRegistry,
    policy: UnsupportedBundlePolicy,
) -> GroupedFiles {
    let mut grouped = group_by_prefix(entities);
    for bundle in &mut grouped.bundles {
        rules.validate_with_policy(bundle, policy);
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BundleState, FileKind};

    fn entities(names: &[&str]) -> Vec<FileEntity> {
        names
            .iter()
            .map(|name| FileEntity::from_path(*name, None).unwrap())
            .collect()
    }

    #[test]
    fn groups_by_prefix_and_kind_in_first_appearance_order() {
        let grouped = group_by_prefix(entities(&[
            "b_R1.fastq.gz",
            "a.bam",
            "b_R2.fastq.gz",
            "a.bam.bai",
            "b.bam",
            "tracks.bigwig",
        ]));
        let keys: Vec<(&str, FileKind)> = grouped
            .bundles
            .iter()
            .map(|bundle| (bundle.prefix(), bundle.kind()))
            .collect();
        assert_eq!(
            keys,
            [("b", FileKind::Fastq), ("a", FileKind::Bam), ("b", FileKind::Bam)]
        );
        assert_eq!(grouped.bundles[0].members().len(), 2);
        assert_eq!(grouped.standalone.len(), 1);
    }

    #[test]
    fn read_pair_validates() {
        let grouped = group_and_validate(
            entities(&["sampleA_R1.fastq.gz", "sampleA_R2.fastq.gz"]),
            RuleRegistry::standard(),
            UnsupportedBundlePolicy::Skip,
        );
        assert_eq!(grouped.bundles.len(), 1);
        assert_eq!(grouped.bundles[0].state(), BundleState::Valid);
        assert!(grouped.is_valid());
    }

    #[test]
    fn cellhash_csv_and_plain_csv_stay_apart() {
        let grouped = group_by_prefix(entities(&["sample_nuc_hash.csv", "sample.csv"]));
        let kinds: Vec<FileKind> = grouped.bundles.iter().map(Bundle::kind).collect();
        assert_eq!(kinds, [FileKind::CellHash, FileKind::Csv]);
    }
}
