use std::collections::{BTreeMap, BTreeSet};
use std::fs;

use camino::Utf8Path;

use crate::error::IngestError;

/// Accepted values per manifest column, stored lower-cased.
#[derive(Debug, Clone, Default)]
pub struct ControlledVocabulary {
    terms: BTreeMap<String, BTreeSet<String>>,
}

impl ControlledVocabulary {
    /// Load a JSON object of `column -> [terms]`.
    pub fn load(path: &Utf8Path) -> Result<Self, IngestError> {
        let content = fs::read_to_string(path.as_std_path())
            .map_err(|_| IngestError::AuxRead(path.as_std_path().to_path_buf()))?;
        Self::from_json_str(&content).map_err(|message| IngestError::AuxParse {
            path: path.as_std_path().to_path_buf(),
            message,
        })
    }

    pub fn from_json_str(content: &str) -> Result<Self, String> {
        let raw: BTreeMap<String, Vec<String>> =
            serde_json::from_str(content).map_err(|err| err.to_string())?;
        Ok(Self::from_terms(raw))
    }

    pub fn from_terms<C, T, V>(terms: C) -> Self
    where
        C: IntoIterator<Item = (String, T)>,
        T: IntoIterator<Item = V>,
        V: AsRef<str>,
    {
        let terms = terms
            .into_iter()
            .map(|(column, values)| {
                let values = values
                    .into_iter()
                    .map(|value| value.as_ref().trim().to_lowercase())
                    .collect();
                (column, values)
            })
            .collect();
        Self { terms }
    }

    pub fn covers(&self, column: &str) -> bool {
        self.terms.contains_key(column)
    }

    pub fn allowed(&self, column: &str) -> Option<&BTreeSet<String>> {
        self.terms.get(column)
    }

    /// Case-insensitive membership. Columns without a vocabulary accept
    /// anything.
    pub fn accepts(&self, column: &str, value: &str) -> bool {
        match self.terms.get(column) {
            Some(values) => values.contains(&value.to_lowercase()),
            None => true,
        }
    }
}
