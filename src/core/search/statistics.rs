//! Aggregate counts a `Similarity` needs to turn a raw term frequency
//! into a score: how rare the term is across the whole collection, and
//! how long the field's documents tend to be.

/// Collection-wide counts for one field, gathered once per `Weight`
/// rather than recomputed per document.
#[derive(Debug, Clone, Copy)]
pub struct CollectionStatistics {
    pub doc_count: i64,
    pub sum_total_term_freq: i64,
}

impl CollectionStatistics {
    pub fn new(doc_count: i64, sum_total_term_freq: i64) -> CollectionStatistics {
        CollectionStatistics {
            doc_count,
            sum_total_term_freq,
        }
    }

    /// `sum_total_term_freq / doc_count`, the BM25 `avgFieldLength`
    /// input. Falls back to a fixed `50.0` (logged once, not silently)
    /// when the field is empty across the whole collection — there is
    /// no real average to compute, and `0.0` would make every document
    /// infinitely long relative to it.
    pub fn avg_field_length(&self, field: &str) -> f32 {
        if self.doc_count <= 0 {
            debug!(
                "field \"{}\" has no documents in this collection; falling back to the default \
                 average field length of 50.0 for BM25 length normalization",
                field
            );
            return 50.0;
        }
        self.sum_total_term_freq as f32 / self.doc_count as f32
    }
}

/// Per-term statistics: how many documents contain the term, and how
/// many times it occurs across the whole collection.
#[derive(Debug, Clone, Copy)]
pub struct TermStatistics {
    pub doc_freq: i64,
    pub total_term_freq: i64,
}

impl TermStatistics {
    pub fn new(doc_freq: i64, total_term_freq: i64) -> TermStatistics {
        TermStatistics {
            doc_freq,
            total_term_freq,
        }
    }
}
