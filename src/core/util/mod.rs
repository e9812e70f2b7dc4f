pub mod bit_set;
pub mod doc_id;

pub use self::doc_id::DocId;
