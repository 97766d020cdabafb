use serde::Serialize;

/// One nucleotide record as it ends up in the output table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SequenceRecord {
    #[serde(rename = "Accession")]
    pub identifier: String,
    #[serde(rename = "Length")]
    pub length: u64,
    #[serde(rename = "Description")]
    pub description: String,
}

impl SequenceRecord {
    pub fn new(identifier: impl Into<String>, length: u64, description: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            length,
            description: description.into(),
        }
    }
}

// Inclusive range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LengthFilter {
    pub min: u64,
    pub max: u64,
}

impl LengthFilter {
    pub fn new(min: u64, max: u64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, length: u64) -> bool {
        self.min <= length && length <= self.max
    }

    pub fn is_empty(&self) -> bool {
        self.min > self.max
    }
}

impl Default for LengthFilter {
    fn default() -> Self {
        Self {
            min: 0,
            max: 1_000_000,
        }
    }
}
