pub mod composite_reader;
pub mod doc_values;
pub mod live_docs;
pub mod norms;
pub mod postings;
pub mod segment;
pub mod stored_fields;
pub mod term;
pub mod writer;

pub use self::composite_reader::{CompositeReader, LeafReaderContext};
pub use self::segment::{segment_file_name, SegmentInfo, SegmentReader};
pub use self::term::Term;
