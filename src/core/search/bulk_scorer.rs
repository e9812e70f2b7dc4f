//! `BulkScorer`: drives a `Scorer` across a window of doc IDs itself,
//! rather than handing control back to the searcher one `next_doc` at a
//! time. `MaxScoreBulkScorer` is the only implementation that actually
//! exploits this (batched, bitset-driven inner windows); `DefaultBulkScorer`
//! wraps any ordinary `Scorer` (including `WANDScorer`) in the same
//! interface so the searcher's driver loop never needs two code paths.

use crate::core::search::collector::LeafCollector;
use crate::core::search::{Scorer, NO_MORE_DOCS};
use crate::core::util::doc_id::DocId;
use crate::error::Result;

/// Scores and collects documents in `[min, max)`, returning the first
/// doc ID at or after `max` still to be visited (or `NO_MORE_DOCS`).
pub trait BulkScorer {
    fn score(&mut self, collector: &mut dyn LeafCollector, min: DocId, max: DocId) -> Result<DocId>;

    /// An estimate of the remaining work, for leaf-ordering decisions.
    fn cost(&self) -> i64;

    /// Tells the bulk scorer it no longer needs to produce documents
    /// scoring below `min_score`, the same feedback channel
    /// `Scorer::set_min_competitive_score` gives a doc-at-a-time scorer.
    /// Default: no-op, correct for bulk scorers without a threshold to
    /// exploit. `MaxScoreBulkScorer` is the one implementation that uses
    /// this to shrink its essential-clause set between windows.
    fn set_min_competitive_score(&mut self, _min_score: f32) -> Result<()> {
        Ok(())
    }
}

/// Advances `scorer`'s approximation (if any) until its two-phase
/// `matches()` confirms, or exhaustion. A no-op for ordinary one-phase
/// scorers.
pub fn advance_verified(scorer: &mut dyn Scorer, mut doc: DocId) -> Result<DocId> {
    loop {
        if doc == NO_MORE_DOCS {
            return Ok(NO_MORE_DOCS);
        }
        let confirmed = match scorer.two_phase() {
            Some(tp) => tp.matches()?,
            None => true,
        };
        if confirmed {
            return Ok(doc);
        }
        doc = scorer.next_doc()?;
    }
}

/// The plain-`Scorer` fallback: a doc-at-a-time loop that still honors
/// two-phase verification, usable with any `Box<dyn Scorer>` (term,
/// boolean, phrase, or `WANDScorer`).
pub struct DefaultBulkScorer {
    scorer: Box<dyn Scorer>,
}

impl DefaultBulkScorer {
    pub fn new(scorer: Box<dyn Scorer>) -> DefaultBulkScorer {
        DefaultBulkScorer { scorer }
    }
}

impl BulkScorer for DefaultBulkScorer {
    fn score(&mut self, collector: &mut dyn LeafCollector, min: DocId, max: DocId) -> Result<DocId> {
        let mut doc = self.scorer.doc_id();
        if doc < min {
            doc = self.scorer.advance(min)?;
        }
        doc = advance_verified(self.scorer.as_mut(), doc)?;
        while doc < max {
            collector.collect(doc, self.scorer.as_mut())?;
            let next = self.scorer.next_doc()?;
            doc = advance_verified(self.scorer.as_mut(), next)?;
        }
        Ok(doc)
    }

    fn cost(&self) -> i64 {
        self.scorer.cost()
    }

    fn set_min_competitive_score(&mut self, min_score: f32) -> Result<()> {
        self.scorer.set_min_competitive_score(min_score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::search::scorer::MatchAllScorer;
    use crate::core::util::bit_set::{BitsRef, MatchAllBits};
    use std::sync::Arc;

    struct CountingCollector {
        docs: Vec<DocId>,
    }
    impl LeafCollector for CountingCollector {
        fn collect(&mut self, doc: DocId, _scorer: &mut dyn Scorer) -> Result<()> {
            self.docs.push(doc);
            Ok(())
        }
    }

    #[test]
    fn test_default_bulk_scorer_visits_whole_window() {
        let live = Arc::new(MatchAllBits::new(10)) as BitsRef;
        let scorer = MatchAllScorer::new(10, live, 1.0);
        let mut bulk = DefaultBulkScorer::new(Box::new(scorer));
        let mut collector = CountingCollector { docs: Vec::new() };
        let next = bulk.score(&mut collector, 0, 5).unwrap();
        assert_eq!(collector.docs, vec![0, 1, 2, 3, 4]);
        assert_eq!(next, 5);
    }
}
