use std::{fmt, str::FromStr};

use anyhow::{anyhow, Result};
use regex::Regex;

lazy_static::lazy_static! {
    static ref TAXON_ID: Regex = Regex::new(r"^(?i:txid)?(\d+)$").unwrap();
}

/// Numeric NCBI taxonomy identifier, e.g. `9606` for Homo sapiens.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaxonId(String);

impl TaxonId {
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        TAXON_ID
            .captures(s)
            .and_then(|caps| caps.get(1))
            .map(|id| Self(id.as_str().to_owned()))
            .ok_or_else(|| {
                anyhow!("Invalid taxonomy id '{s}': expected digits, optionally prefixed with 'txid'")
            })
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Query term restricting a nucleotide search to this organism.
    pub fn search_term(&self) -> String {
        format!("txid{}[Organism]", self.0)
    }
}

impl FromStr for TaxonId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for TaxonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
