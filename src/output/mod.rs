pub mod table;
pub mod plot;

use itertools::Itertools;

use crate::types::SequenceRecord;

pub use table::write_csv;
pub use plot::plot_lengths;

/// Longest first; records of equal length keep their relative order.
pub fn sort_by_length_desc(records: Vec<SequenceRecord>) -> Vec<SequenceRecord> {
    records
        .into_iter()
        .sorted_by(|a, b| b.length.cmp(&a.length))
        .collect()
}
