//! MaxScore: a window-at-a-time bulk disjunction scorer.
//!
//! Clauses are sorted once by their all-time maximum score. Given the
//! collector's current competitive-score threshold, a prefix of the
//! cheapest clauses can be proven to never, even at their very best,
//! push a document over that threshold by themselves — those
//! "non-essential" clauses are only consulted lazily, to refine a
//! candidate's score, never to decide whether it's a candidate at all.
//! The remaining "essential" clauses are driven doc-at-a-time and are
//! the only ones that can introduce a new candidate document.
//!
//! Matching proceeds one bounded window of doc IDs at a time so the
//! per-document state (which clauses matched, their summed score) fits
//! in two flat arrays rather than a heap.

use std::cmp::Ordering;

use crate::core::search::bulk_scorer::BulkScorer;
use crate::core::search::collector::LeafCollector;
use crate::core::search::{DocIterator, Scorer, NO_MORE_DOCS};
use crate::core::util::doc_id::DocId;
use crate::error::Result;

const INNER_WINDOW_SIZE: DocId = 4096;

struct Clause {
    scorer: Box<dyn Scorer>,
    max_score: f32,
}

/// A read-only `Scorer` handed to the collector for one already-summed
/// window result; it never drives its own iteration, it only reports
/// the score this bulk scorer already computed for `doc`.
struct WindowScore {
    doc: DocId,
    score: f32,
}

impl DocIterator for WindowScore {
    fn doc_id(&self) -> DocId {
        self.doc
    }
    fn next_doc(&mut self) -> Result<DocId> {
        Ok(NO_MORE_DOCS)
    }
    fn advance(&mut self, _target: DocId) -> Result<DocId> {
        Ok(NO_MORE_DOCS)
    }
    fn cost(&self) -> i64 {
        1
    }
}

impl Scorer for WindowScore {
    fn score(&mut self) -> Result<f32> {
        Ok(self.score)
    }
    fn max_score(&self, _up_to: DocId) -> f32 {
        self.score
    }
}

pub struct MaxScoreBulkScorer {
    clauses: Vec<Clause>,
    min_competitive_score: f32,
}

impl MaxScoreBulkScorer {
    pub fn new(scorers: Vec<Box<dyn Scorer>>) -> Result<MaxScoreBulkScorer> {
        let mut clauses: Vec<Clause> = scorers
            .into_iter()
            .map(|s| {
                let max_score = s.max_score(NO_MORE_DOCS);
                Clause { scorer: s, max_score }
            })
            .collect();
        clauses.sort_by(|a, b| a.max_score.partial_cmp(&b.max_score).unwrap_or(Ordering::Equal));
        Ok(MaxScoreBulkScorer {
            clauses,
            min_competitive_score: 0.0,
        })
    }

    /// How many of the cheapest clauses (by prefix, already sorted
    /// ascending) can jointly never reach the competitive threshold on
    /// their own. At threshold 0 this is always 0 — the fast path where
    /// every clause is essential and MaxScore degenerates to an ordinary
    /// windowed disjunction.
    fn non_essential_count(&self) -> usize {
        if self.min_competitive_score <= 0.0 {
            return 0;
        }
        let mut sum = 0.0f32;
        let mut count = 0usize;
        for clause in &self.clauses {
            let next = sum + clause.max_score;
            if next < self.min_competitive_score {
                sum = next;
                count += 1;
            } else {
                break;
            }
        }
        count
    }

    fn score_window(&mut self, collector: &mut dyn LeafCollector, lo: DocId, hi: DocId) -> Result<()> {
        let width = (hi - lo) as usize;
        let mut scores = vec![0f32; width];
        let mut matched = vec![false; width];

        let non_essential = self.non_essential_count();

        let mut batch: Vec<(DocId, f32)> = Vec::new();
        for clause in self.clauses.iter_mut().skip(non_essential) {
            let doc = clause.scorer.doc_id();
            if doc < lo {
                clause.scorer.advance(lo)?;
            }
            batch.clear();
            clause.scorer.score_batch_into(hi, &mut batch)?;
            for &(doc, score) in &batch {
                let idx = (doc - lo) as usize;
                matched[idx] = true;
                scores[idx] += score;
            }
        }

        // Non-essential clauses can only raise a score that essential
        // clauses already qualified as a candidate, never introduce one.
        for clause in self.clauses.iter_mut().take(non_essential) {
            let mut doc = clause.scorer.doc_id();
            if doc < lo {
                doc = clause.scorer.advance(lo)?;
            }
            for (idx, slot) in scores.iter_mut().enumerate() {
                if !matched[idx] {
                    continue;
                }
                let target = lo + idx as DocId;
                if doc < target {
                    doc = clause.scorer.advance(target)?;
                }
                if doc == target {
                    *slot += clause.scorer.score()?;
                }
            }
        }

        for idx in 0..width {
            if matched[idx] && scores[idx] >= self.min_competitive_score {
                let mut window_scorer = WindowScore {
                    doc: lo + idx as DocId,
                    score: scores[idx],
                };
                collector.collect(lo + idx as DocId, &mut window_scorer)?;
            }
        }
        Ok(())
    }

    /// The window ceiling for a pass starting at `lo`: the ordinary fixed
    /// inner window size, narrowed to the nearest upcoming block
    /// boundary among essential clauses so `max_score` bounds computed at
    /// the start of the window stay valid for documents scored near its
    /// end.
    fn window_ceiling(&mut self, lo: DocId, hard_max: DocId, non_essential: usize) -> Result<DocId> {
        let mut hi = (lo + INNER_WINDOW_SIZE).min(hard_max);
        for clause in self.clauses.iter_mut().skip(non_essential) {
            clause.scorer.advance_shallow(lo)?;
            let boundary = clause.scorer.next_block_boundary(lo)?;
            if boundary != NO_MORE_DOCS {
                hi = hi.min(boundary + 1);
            }
        }
        Ok(hi.max(lo + 1))
    }
}

impl BulkScorer for MaxScoreBulkScorer {
    fn score(&mut self, collector: &mut dyn LeafCollector, min: DocId, max: DocId) -> Result<DocId> {
        if self.clauses.is_empty() {
            return Ok(NO_MORE_DOCS);
        }
        // A collector (e.g. a top-K heap already filled by an earlier
        // leaf) may already carry a competitive threshold before this
        // leaf's first window is even scored.
        if let Some(s) = collector.min_competitive_score() {
            self.set_min_competitive_score(s)?;
        }
        let mut window_lo = min;
        while window_lo < max {
            let non_essential = self.non_essential_count();
            let window_hi = self.window_ceiling(window_lo, max, non_essential)?;
            self.score_window(collector, window_lo, window_hi)?;
            // The collector's root score only ever rises; re-polling it
            // after each window is this bulk scorer's only channel back
            // from "the heap just filled/improved" to "shrink the
            // essential set" — there is no live per-document `Scorer`
            // handle for the collector to call back into directly.
            if let Some(s) = collector.min_competitive_score() {
                self.set_min_competitive_score(s)?;
            }
            window_lo = window_hi;
        }
        let any_live = self.clauses.iter().any(|c| c.scorer.doc_id() != NO_MORE_DOCS);
        Ok(if any_live { max } else { NO_MORE_DOCS })
    }

    fn cost(&self) -> i64 {
        self.clauses.iter().map(|c| c.scorer.cost()).sum()
    }

    fn set_min_competitive_score(&mut self, min_score: f32) -> Result<()> {
        self.min_competitive_score = self.min_competitive_score.max(min_score);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::index::postings::{write_postings, PostingEntry, TermMeta};
    use crate::core::search::bm25_similarity::Bm25Similarity;
    use crate::core::search::scorer::TermScorer;
    use crate::core::search::statistics::{CollectionStatistics, TermStatistics};
    use crate::core::store::{Directory, IOContext, RamDirectory, ReadAdvice};
    use crate::core::util::bit_set::{BitsRef, MatchAllBits};
    use std::sync::Arc;

    struct CountingCollector {
        docs: Vec<(DocId, f32)>,
    }
    impl LeafCollector for CountingCollector {
        fn collect(&mut self, doc: DocId, scorer: &mut dyn Scorer) -> Result<()> {
            self.docs.push((doc, scorer.score()?));
            Ok(())
        }
    }

    fn term_scorer(dir: &RamDirectory, file: &str, postings: &[PostingEntry], max_doc: usize) -> TermScorer {
        let mut out = dir.create_output(file, &IOContext::Write).unwrap();
        let start_fp = out.file_pointer();
        let impacts = write_postings(out.as_mut(), postings).unwrap();
        drop(out);
        let meta = TermMeta {
            doc_freq: postings.len() as i32,
            total_term_freq: postings.iter().map(|p| i64::from(p.1)).sum(),
            doc_start_fp: start_fp,
            impacts: impacts.clone(),
        };
        let input = dir.open_input(file, &IOContext::Read(ReadAdvice::Normal)).unwrap();
        let pe = crate::core::index::postings::PostingsEnum::new(input, &meta).unwrap();
        let sim = Bm25Similarity::default();
        let sw = sim.sim_weight(
            "body",
            &TermStatistics::new(postings.len() as i64, meta.total_term_freq),
            &CollectionStatistics::new(max_doc as i64, max_doc as i64 * 10),
            1.0,
        );
        let live = Arc::new(MatchAllBits::new(max_doc)) as BitsRef;
        TermScorer::new(pe, sw, live, None, impacts)
    }

    #[test]
    fn test_window_collects_union_with_summed_scores() {
        let dir = RamDirectory::new();
        let a = term_scorer(&dir, "a.doc", &[(1, 2, 100, vec![]), (3, 1, 100, vec![])], 10);
        let b = term_scorer(&dir, "b.doc", &[(3, 2, 100, vec![]), (4, 1, 100, vec![])], 10);
        let mut bulk = MaxScoreBulkScorer::new(vec![Box::new(a), Box::new(b)]).unwrap();
        let mut collector = CountingCollector { docs: Vec::new() };
        let next = bulk.score(&mut collector, 0, 10).unwrap();
        assert_eq!(next, NO_MORE_DOCS);
        let docs: Vec<DocId> = collector.docs.iter().map(|&(d, _)| d).collect();
        assert_eq!(docs, vec![1, 3, 4]);
        // doc 3 is matched by both clauses, so its score is the sum.
        let (_, doc3_score) = collector.docs.iter().find(|&&(d, _)| d == 3).unwrap();
        let (_, doc1_score) = collector.docs.iter().find(|&&(d, _)| d == 1).unwrap();
        assert!(doc3_score > doc1_score);
    }

    #[test]
    fn test_threshold_excludes_non_competitive_docs() {
        let dir = RamDirectory::new();
        let a = term_scorer(&dir, "c.doc", &[(1, 20, 100, vec![]), (2, 1, 100, vec![])], 10);
        let mut bulk = MaxScoreBulkScorer::new(vec![Box::new(a)]).unwrap();
        // Find doc 1's real score, then raise the threshold just above it.
        let mut probe_collector = CountingCollector { docs: Vec::new() };
        bulk.score(&mut probe_collector, 0, 10).unwrap();
        let doc1_score = probe_collector.docs.iter().find(|&&(d, _)| d == 1).unwrap().1;

        let dir2 = RamDirectory::new();
        let a2 = term_scorer(&dir2, "d.doc", &[(1, 20, 100, vec![]), (2, 1, 100, vec![])], 10);
        let mut bulk2 = MaxScoreBulkScorer::new(vec![Box::new(a2)]).unwrap();
        bulk2.set_min_competitive_score(doc1_score + 0.01).unwrap();
        let mut collector = CountingCollector { docs: Vec::new() };
        bulk2.score(&mut collector, 0, 10).unwrap();
        assert!(collector.docs.is_empty());
    }

    #[test]
    fn test_cost_sums_clause_costs() {
        let dir = RamDirectory::new();
        let a = term_scorer(&dir, "e.doc", &[(1, 1, 100, vec![])], 10);
        let b = term_scorer(&dir, "f.doc", &[(2, 1, 100, vec![])], 10);
        let bulk = MaxScoreBulkScorer::new(vec![Box::new(a), Box::new(b)]).unwrap();
        assert_eq!(bulk.cost(), 2);
    }

    /// A minimal top-1 collector that, like the real `TopDocsLeafCollector`,
    /// exposes its current root score through `min_competitive_score` once
    /// it has one. Unlike `CountingCollector` above it also counts how many
    /// times `collect` is invoked at all, which is what makes a block skip
    /// observable: once the bulk scorer learns the threshold this crosses,
    /// a later window with no essential clause left to introduce a
    /// candidate should never call back into `collect` for it.
    struct CountingTopOneCollector {
        best: Option<(DocId, f32)>,
        calls: usize,
    }
    impl LeafCollector for CountingTopOneCollector {
        fn collect(&mut self, doc: DocId, scorer: &mut dyn Scorer) -> Result<()> {
            self.calls += 1;
            let score = scorer.score()?;
            if self.best.map_or(true, |(_, best_score)| score > best_score) {
                self.best = Some((doc, score));
            }
            Ok(())
        }
        fn min_competitive_score(&self) -> Option<f32> {
            self.best.map(|(_, s)| s)
        }
    }

    #[test]
    fn test_rising_threshold_from_collector_skips_later_window() {
        let dir = RamDirectory::new();
        // "hot" matches only doc 0, with a high enough frequency that
        // doc 0's combined score dominates anything "cold" can reach on
        // its own; "cold" matches every doc across 3 posting blocks
        // (128-doc blocks => 3 outer windows over 300 docs).
        let hot = term_scorer(&dir, "hot.doc", &[(0, 50, 100, vec![])], 300);
        let cold_entries: Vec<PostingEntry> = (0..300).map(|d| (d, 1, 100, vec![])).collect();
        let cold = term_scorer(&dir, "cold.doc", &cold_entries, 300);

        let mut bulk = MaxScoreBulkScorer::new(vec![Box::new(hot), Box::new(cold)]).unwrap();
        let mut collector = CountingTopOneCollector { best: None, calls: 0 };
        bulk.score(&mut collector, 0, 300).unwrap();

        assert_eq!(collector.best.map(|(d, _)| d), Some(0));
        // Every one of the 300 docs matches "cold" by itself, so without
        // the collector's rising threshold ever reaching the bulk scorer,
        // every one of them would still be visited. The first block (docs
        // 0..128) has to be visited to find doc 0 at all; once the
        // threshold it sets is fed back in, "cold" alone can never beat it
        // again, so no later-window doc should ever reach `collect`.
        assert!(
            collector.calls <= 128,
            "expected the 172 non-competitive docs in later windows to be skipped, got {} calls",
            collector.calls
        );
    }
}
