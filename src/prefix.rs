use crate::error::IngestError;
use crate::patterns::{PatternMatch, PatternRegistry, SplitStyle};

const SEPARATORS: [char; 3] = ['.', '_', '-'];

/// Grouping key derived from a basename, plus the halves it was built from
/// when the matched pattern sits mid-name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixParts {
    pub prefix: String,
    pub head: Option<String>,
    pub tail: Option<String>,
}

impl PrefixParts {
    /// Text the validated basename is anchored on: the tail when one was
    /// found, else the prefix.
    pub fn anchor(&self) -> &str {
        match self.tail.as_deref() {
            Some(tail) if !tail.is_empty() => tail,
            _ => &self.prefix,
        }
    }
}

pub fn extract_prefix(
    name: &str,
    found: &PatternMatch<'_>,
    registry: &PatternRegistry,
) -> Result<PrefixParts, IngestError> {
    let matched = found.pattern.find(name);
    let base = matched.map(|m| &name[..m.start()]).unwrap_or(name);
    if base.is_empty() {
        return Err(IngestError::EmptyPrefix(name.to_string()));
    }

    let parts = match (found.split, matched) {
        (SplitStyle::Suffix, _) => PrefixParts {
            prefix: base.to_string(),
            head: None,
            tail: None,
        },
        (SplitStyle::CellHashMarker, Some(_)) => {
            let lane = found
                .pattern
                .captures(name)
                .and_then(|caps| caps.get(1))
                .map(|group| stem(group.as_str()).to_string())
                .unwrap_or_default();
            PrefixParts {
                prefix: base.to_string(),
                head: Some(base.to_string()),
                tail: Some(lane),
            }
        }
        (SplitStyle::ReadMarker, Some(m)) => {
            let after = stem(&name[m.end()..]);
            let after = registry
                .fastq_extension()
                .find(after)
                .map(|ext| &after[..ext.start()])
                .unwrap_or(after);
            joined(base, after)
        }
        (SplitStyle::AnalysisMarker, Some(m)) => joined(base, stem(&name[m.end()..])),
        (_, None) => {
            let head = name.rsplit_once('-').map(|(head, _)| head).unwrap_or(name);
            joined(head, "")
        }
    };

    let prefix = trim_trailing_separator(&parts.prefix).to_string();
    if prefix.is_empty() {
        return Err(IngestError::EmptyPrefix(name.to_string()));
    }
    Ok(PrefixParts { prefix, ..parts })
}

fn joined(head: &str, tail: &str) -> PrefixParts {
    let tail = trim_leading_separator(tail);
    PrefixParts {
        prefix: format!("{head}-{tail}"),
        head: Some(head.to_string()),
        tail: Some(tail.to_string()),
    }
}

/// Final path component minus its last extension. A leading dot is part of
/// the stem.
pub fn stem(value: &str) -> &str {
    match value.rfind('.') {
        Some(index) if index > 0 => &value[..index],
        _ => value,
    }
}

fn trim_trailing_separator(value: &str) -> &str {
    SEPARATORS
        .iter()
        .find_map(|sep| value.strip_suffix(*sep))
        .unwrap_or(value)
}

fn trim_leading_separator(value: &str) -> &str {
    SEPARATORS
        .iter()
        .find_map(|sep| value.strip_prefix(*sep))
        .unwrap_or(value)
}
