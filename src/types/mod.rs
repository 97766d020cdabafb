pub mod record;
pub mod taxon;

pub use record::{LengthFilter, SequenceRecord};
pub use taxon::TaxonId;
