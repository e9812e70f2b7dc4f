/// A document identifier. Local doc IDs are relative to a single segment
/// (`[0, max_doc)`); global doc IDs additionally carry a leaf's `doc_base`.
pub type DocId = i32;

/// Sentinel returned by `next_doc`/`advance`/`doc_id` once a doc iterator
/// is exhausted. Equal to the maximum signed 32-bit integer so that it
/// sorts after every real doc ID.
pub const NO_MORE_DOCS: DocId = std::i32::MAX;
