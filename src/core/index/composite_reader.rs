//! Combines every segment of an index into one logical reader, mapping
//! between global doc IDs (as the searcher and top-level collector see
//! them) and each leaf's local doc IDs via a `doc_base` offset.

use std::sync::Arc;

use crate::core::index::segment::SegmentReader;

/// One segment plus the global doc ID its local doc `0` corresponds to.
/// `ord` is this leaf's position among its siblings, used to key
/// per-leaf state (e.g. collector buffers) independent of doc_base.
pub struct LeafReaderContext {
    pub reader: Arc<SegmentReader>,
    pub doc_base: i32,
    pub ord: i32,
}

/// A read-only view over every segment making up an index at the moment
/// it was opened; later commits are invisible until the searcher is
/// reopened against a fresh `CompositeReader`.
pub struct CompositeReader {
    leaves: Vec<LeafReaderContext>,
    max_doc: i32,
    num_docs: i32,
}

impl CompositeReader {
    pub fn new(segments: Vec<Arc<SegmentReader>>) -> CompositeReader {
        let mut leaves = Vec::with_capacity(segments.len());
        let mut doc_base = 0;
        let mut num_docs = 0;
        for (ord, reader) in segments.into_iter().enumerate() {
            num_docs += reader.num_docs();
            let max_doc = reader.max_doc();
            leaves.push(LeafReaderContext {
                reader,
                doc_base,
                ord: ord as i32,
            });
            doc_base += max_doc;
        }
        CompositeReader {
            max_doc: doc_base,
            num_docs,
            leaves,
        }
    }

    pub fn leaves(&self) -> &[LeafReaderContext] {
        &self.leaves
    }

    pub fn max_doc(&self) -> i32 {
        self.max_doc
    }

    pub fn num_docs(&self) -> i32 {
        self.num_docs
    }
}
