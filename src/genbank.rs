//! GenBank flat-file pages as returned by `efetch` with `rettype=gb`.

use gb_io::{reader::SeqReader, seq::Seq};

use crate::types::SequenceRecord;

#[derive(thiserror::Error, Debug)]
pub enum ParseError {
    #[error("Page doesn't look like GenBank flat file: {0:?}")]
    NotGenBank(String),
    #[error("Invalid GenBank record #{index}: {reason}")]
    Record { index: usize, reason: String },
    #[error("Expected {expected} records but parsed {parsed}")]
    RecordCount { expected: usize, parsed: usize },
}

/// Parses every record of a page, preserving server order.
pub fn parse_page(body: &str) -> Result<Vec<SequenceRecord>, ParseError> {
    let body = body.trim_start();
    if body.trim_end().is_empty() {
        return Ok(Vec::new());
    }
    if !body.starts_with("LOCUS") {
        let head = body.lines().next().unwrap_or_default();
        return Err(ParseError::NotGenBank(head.chars().take(80).collect()));
    }

    let records = SeqReader::new(body.as_bytes())
        .enumerate()
        .map(|(index, seq)| {
            seq.map(|seq| to_record(&seq))
                .map_err(|e| ParseError::Record {
                    index,
                    reason: e.to_string(),
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let expected = body.lines().filter(|l| l.starts_with("LOCUS")).count();
    if records.len() != expected {
        return Err(ParseError::RecordCount {
            expected,
            parsed: records.len(),
        });
    }
    Ok(records)
}

fn to_record(seq: &Seq) -> SequenceRecord {
    let identifier = [&seq.version, &seq.accession, &seq.name]
        .into_iter()
        .flatten()
        .find_map(|field| field.split_whitespace().next())
        .unwrap_or_default();
    // CON records carry no ORIGIN block, only the length on the LOCUS line
    let length = if seq.seq.is_empty() {
        seq.len.unwrap_or(0)
    } else {
        seq.seq.len()
    };
    let definition = seq.definition.as_deref().unwrap_or_default().trim();
    let description = definition.strip_suffix('.').unwrap_or(definition);
    SequenceRecord::new(identifier, length as u64, description)
}
