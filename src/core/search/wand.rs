//! WAND (Weak AND): a block-max, doc-at-a-time disjunction scorer.
//!
//! At each candidate document it first asks every live clause to
//! shallow-advance and report a block-max score bound; if the sum of
//! those bounds (or the number of still-live clauses) can't possibly
//! satisfy `minimumShouldMatch`/the collector's competitive-score
//! threshold, the whole bounded range is skipped in one step rather than
//! visited document by document. Only once a range is judged feasible
//! does it pay the cost of actually scoring a candidate.
//!
//! This mirrors the intent of Lucene's WAND scorer but keeps the
//! "is this candidate worth fully evaluating" decision at block
//! granularity rather than Lucene's incremental per-clause admission —
//! plainer to reason about without a compiler double-checking heap
//! invariants, and no less sound: every bound used to skip is read
//! straight from each clause's own `advance_shallow`/`max_score`/
//! `next_block_boundary`, never a fixed placeholder.

use crate::core::search::{DocIterator, Scorer, NO_MORE_DOCS};
use crate::core::util::doc_id::DocId;
use crate::error::{ErrorKind, Result};

pub struct WANDScorer {
    scorers: Vec<Box<dyn Scorer>>,
    min_should_match: usize,
    doc: DocId,
    lead: Vec<usize>,
    lead_score: f32,
    min_competitive_score: f32,
}

impl WANDScorer {
    pub fn new(mut scorers: Vec<Box<dyn Scorer>>, min_should_match: usize) -> Result<WANDScorer> {
        if scorers.is_empty() {
            bail!(ErrorKind::IllegalArgument(
                "WANDScorer requires at least one clause".to_string()
            ));
        }
        for s in &mut scorers {
            s.next_doc()?;
        }
        let mut wand = WANDScorer {
            scorers,
            min_should_match: min_should_match.max(1),
            doc: -1,
            lead: Vec::new(),
            lead_score: 0.0,
            min_competitive_score: 0.0,
        };
        wand.doc = wand.settle(-1)?;
        Ok(wand)
    }

    fn live_min_doc(&self) -> DocId {
        self.scorers
            .iter()
            .map(|s| s.doc_id())
            .filter(|&d| d != NO_MORE_DOCS)
            .min()
            .unwrap_or(NO_MORE_DOCS)
    }

    /// Finds and positions on the next doc at or after `floor` whose
    /// live lead clauses meet both `minimumShouldMatch` and the
    /// competitive-score threshold, skipping whole non-competitive
    /// block ranges via block-max bounds along the way.
    fn settle(&mut self, floor: DocId) -> Result<DocId> {
        for s in &mut self.scorers {
            if s.doc_id() != NO_MORE_DOCS && s.doc_id() < floor {
                s.advance(floor)?;
            }
        }

        loop {
            let candidate = self.live_min_doc();
            if candidate == NO_MORE_DOCS {
                self.doc = NO_MORE_DOCS;
                return Ok(NO_MORE_DOCS);
            }

            // A sound upper bound for every doc in [candidate, up_to]:
            // the narrowest block boundary among live clauses, and the
            // sum of each clause's own max_score up to that boundary.
            let mut up_to = NO_MORE_DOCS;
            let mut live = 0usize;
            for s in &mut self.scorers {
                if s.doc_id() == NO_MORE_DOCS {
                    continue;
                }
                live += 1;
                s.advance_shallow(candidate)?;
                let boundary = s.next_block_boundary(candidate)?;
                up_to = up_to.min(boundary);
            }
            let bound: f32 = self
                .scorers
                .iter()
                .filter(|s| s.doc_id() != NO_MORE_DOCS)
                .map(|s| s.max_score(up_to))
                .sum();

            if live < self.min_should_match || bound < self.min_competitive_score {
                let skip_to = if up_to == NO_MORE_DOCS { NO_MORE_DOCS } else { up_to + 1 };
                for s in &mut self.scorers {
                    if s.doc_id() != NO_MORE_DOCS && s.doc_id() < skip_to {
                        s.advance(skip_to)?;
                    }
                }
                continue;
            }

            // The range is feasible; catch every remaining clause up to
            // `candidate` itself and see whether it actually delivers.
            for s in &mut self.scorers {
                if s.doc_id() != NO_MORE_DOCS && s.doc_id() < candidate {
                    s.advance(candidate)?;
                }
            }
            self.lead.clear();
            self.lead_score = 0.0;
            for (idx, s) in self.scorers.iter_mut().enumerate() {
                if s.doc_id() == candidate {
                    self.lead.push(idx);
                    self.lead_score += s.score()?;
                }
            }
            if self.lead.len() >= self.min_should_match && self.lead_score >= self.min_competitive_score {
                self.doc = candidate;
                return Ok(candidate);
            }
            // The realized score fell short of the bound; move on and
            // recompute with whatever the new minimum doc becomes.
            for &idx in &self.lead {
                self.scorers[idx].next_doc()?;
            }
        }
    }
}

impl DocIterator for WANDScorer {
    fn doc_id(&self) -> DocId {
        self.doc
    }

    fn next_doc(&mut self) -> Result<DocId> {
        if self.doc == NO_MORE_DOCS {
            return Ok(NO_MORE_DOCS);
        }
        self.settle(self.doc + 1)
    }

    fn advance(&mut self, target: DocId) -> Result<DocId> {
        if self.doc == NO_MORE_DOCS {
            return Ok(NO_MORE_DOCS);
        }
        self.settle(target.max(self.doc + 1))
    }

    fn cost(&self) -> i64 {
        self.scorers.iter().map(|s| s.cost()).sum()
    }
}

impl Scorer for WANDScorer {
    fn score(&mut self) -> Result<f32> {
        Ok(self.lead_score)
    }

    fn max_score(&self, up_to: DocId) -> f32 {
        self.scorers.iter().map(|s| s.max_score(up_to)).sum()
    }

    fn set_min_competitive_score(&mut self, min_score: f32) -> Result<()> {
        self.min_competitive_score = min_score;
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
    use proptest::prelude::*;
    use std::sync::Arc;

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
    fn test_pure_disjunction_visits_union_of_docs() {
        let dir = RamDirectory::new();
        let a = term_scorer(&dir, "a.doc", &[(1, 3, 100, vec![]), (5, 1, 100, vec![])], 10);
        let b = term_scorer(&dir, "b.doc", &[(2, 2, 100, vec![]), (5, 4, 100, vec![])], 10);
        let mut wand = WANDScorer::new(vec![Box::new(a), Box::new(b)], 1).unwrap();
        let mut docs = vec![wand.doc_id()];
        while wand.next_doc().unwrap() != NO_MORE_DOCS {
            docs.push(wand.doc_id());
        }
        assert_eq!(docs, vec![1, 2, 5]);
    }

    #[test]
    fn test_min_should_match_requires_overlap() {
        let dir = RamDirectory::new();
        let a = term_scorer(&dir, "c.doc", &[(1, 1, 100, vec![]), (5, 1, 100, vec![])], 10);
        let b = term_scorer(&dir, "d.doc", &[(2, 1, 100, vec![]), (5, 1, 100, vec![])], 10);
        let mut wand = WANDScorer::new(vec![Box::new(a), Box::new(b)], 2).unwrap();
        assert_eq!(wand.doc_id(), 5);
        assert_eq!(wand.next_doc().unwrap(), NO_MORE_DOCS);
    }

    #[test]
    fn test_min_competitive_score_skips_low_scoring_docs() {
        let dir = RamDirectory::new();
        // doc 1 has a much higher frequency (and therefore score) than doc 2.
        let a = term_scorer(&dir, "e.doc", &[(1, 20, 100, vec![]), (2, 1, 100, vec![])], 10);
        let mut wand = WANDScorer::new(vec![Box::new(a)], 1).unwrap();
        let high_score = wand.score().unwrap();
        assert_eq!(wand.doc_id(), 1);
        wand.set_min_competitive_score(high_score + 0.01).unwrap();
        assert_eq!(wand.next_doc().unwrap(), NO_MORE_DOCS);
    }

    /// A plain doc-at-a-time union over the same postings, scored with
    /// a fresh set of clause scorers so it shares no mutable state with
    /// `WANDScorer` — the oracle `WANDScorer`'s block-max skipping is
    /// checked against.
    fn brute_force_union(postings: &[Vec<(i32, i32)>], max_doc: usize) -> Vec<(DocId, f32)> {
        let dir = RamDirectory::new();
        let scorers: Vec<TermScorer> = postings
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let entries: Vec<PostingEntry> = p.iter().map(|&(d, f)| (d, f, 100, vec![])).collect();
                term_scorer(&dir, &format!("brute_{}.doc", i), &entries, max_doc)
            })
            .collect();
        let mut totals = vec![0f32; max_doc];
        let mut matched = vec![false; max_doc];
        for mut s in scorers {
            loop {
                let doc = s.doc_id();
                if doc == NO_MORE_DOCS {
                    break;
                }
                matched[doc as usize] = true;
                totals[doc as usize] += s.score().unwrap();
                if s.next_doc().unwrap() == NO_MORE_DOCS {
                    break;
                }
            }
        }
        (0..max_doc)
            .filter(|&d| matched[d])
            .map(|d| (d as DocId, totals[d]))
            .collect()
    }

    proptest! {
        #[test]
        fn wand_matches_brute_force_union(
            clauses in prop::collection::vec(
                prop::collection::vec((0i32..30, 1i32..20), 0..8),
                1..4,
            ),
        ) {
            let max_doc = 30usize;
            let postings: Vec<Vec<(i32, i32)>> = clauses
                .into_iter()
                .map(|mut docs| {
                    docs.sort_by_key(|&(d, _)| d);
                    docs.dedup_by_key(|&mut (d, _)| d);
                    docs
                })
                .filter(|docs| !docs.is_empty())
                .collect();
            prop_assume!(!postings.is_empty());

            let expected = brute_force_union(&postings, max_doc);

            let dir = RamDirectory::new();
            let scorers: Vec<Box<dyn Scorer>> = postings
                .iter()
                .enumerate()
                .map(|(i, p)| {
                    let entries: Vec<PostingEntry> = p.iter().map(|&(d, f)| (d, f, 100, vec![])).collect();
                    Box::new(term_scorer(&dir, &format!("wand_{}.doc", i), &entries, max_doc)) as Box<dyn Scorer>
                })
                .collect();
            let mut wand = WANDScorer::new(scorers, 1).unwrap();
            let mut actual = Vec::new();
            loop {
                let doc = wand.doc_id();
                if doc == NO_MORE_DOCS {
                    break;
                }
                actual.push((doc, wand.score().unwrap()));
                if wand.next_doc().unwrap() == NO_MORE_DOCS {
                    break;
                }
            }

            prop_assert_eq!(actual.len(), expected.len());
            for ((actual_doc, actual_score), (expected_doc, expected_score)) in actual.iter().zip(expected.iter()) {
                prop_assert_eq!(actual_doc, expected_doc);
                prop_assert!((actual_score - expected_score).abs() < 1e-4);
            }
        }
    }
}
