//! Scorer primitives: the leaf-level term scorer plus the boolean
//! composition operators (conjunction, disjunction, required-minus-
//! excluded) every boolean query is built from.

use std::collections::BinaryHeap;
use std::sync::Arc;

use crate::core::index::norms::NormValues;
use crate::core::index::postings::PostingsEnum;
use crate::core::search::bm25_similarity::SimWeight;
use crate::core::search::{DocIterator, Scorer, TwoPhaseIterator, NO_MORE_DOCS};
use crate::core::util::bit_set::{Bits, BitsRef, FixedBitSet};
use crate::core::util::doc_id::DocId;
use crate::error::Result;

/// A single term's postings, scored as it's iterated. `score()` reads
/// the exact per-document norm byte from `norms` (when the field has
/// one); `max_score`/`advance_shallow` use the coarser, block-level
/// impacts list instead, since those bounds must hold for every doc in
/// the block, not just the one currently visited.
pub struct TermScorer {
    postings: PostingsEnum,
    sim_weight: SimWeight,
    live_docs: BitsRef,
    norms: Option<Arc<NormValues>>,
    impacts: Vec<crate::core::index::postings::Impact>,
    impact_idx: usize,
}

impl TermScorer {
    pub fn new(
        postings: PostingsEnum,
        sim_weight: SimWeight,
        live_docs: BitsRef,
        norms: Option<Arc<NormValues>>,
        impacts: Vec<crate::core::index::postings::Impact>,
    ) -> TermScorer {
        TermScorer {
            postings,
            sim_weight,
            live_docs,
            norms,
            impacts,
            impact_idx: 0,
        }
    }

    fn advance_over_deleted(&mut self, mut doc: DocId) -> Result<DocId> {
        while doc != NO_MORE_DOCS && !self.live_docs.get(doc as usize)? {
            doc = self.postings.next_doc()?;
        }
        Ok(doc)
    }
}

impl DocIterator for TermScorer {
    fn doc_id(&self) -> DocId {
        self.postings.doc()
    }

    fn next_doc(&mut self) -> Result<DocId> {
        let doc = self.postings.next_doc()?;
        self.advance_over_deleted(doc)
    }

    fn advance(&mut self, target: DocId) -> Result<DocId> {
        let doc = self.postings.advance(target)?;
        self.advance_over_deleted(doc)
    }

    fn cost(&self) -> i64 {
        self.postings.cost()
    }
}

impl Scorer for TermScorer {
    fn score(&mut self) -> Result<f32> {
        let norm_byte = match &self.norms {
            Some(n) => n.get(self.postings.doc()),
            // No norms file for this field: a byte of 127 decodes to
            // length 1.0, the length-normalization-free case.
            None => 127,
        };
        Ok(self.sim_weight.score(self.postings.freq(), norm_byte))
    }

    fn max_score(&self, up_to: DocId) -> f32 {
        self.impacts
            .iter()
            .skip(self.impact_idx)
            .take_while(|i| i.doc_id_upper_bound <= up_to || self.impact_idx == self.impacts.len() - 1)
            .map(|i| self.sim_weight.score(i.max_freq, i.max_norm_byte))
            .fold(0.0f32, f32::max)
            .max(
                self.impacts
                    .get(self.impact_idx)
                    .map(|i| self.sim_weight.score(i.max_freq, i.max_norm_byte))
                    .unwrap_or(0.0),
            )
    }

    fn advance_shallow(&mut self, target: DocId) -> Result<DocId> {
        while self.impact_idx < self.impacts.len()
            && self.impacts[self.impact_idx].doc_id_upper_bound < target
        {
            self.impact_idx += 1;
        }
        Ok(self
            .impacts
            .get(self.impact_idx)
            .map(|i| i.doc_id_upper_bound)
            .unwrap_or(NO_MORE_DOCS))
    }

    fn next_block_boundary(&self, target: DocId) -> Result<DocId> {
        Ok(self
            .impacts
            .iter()
            .find(|i| i.doc_id_upper_bound >= target)
            .map(|i| i.doc_id_upper_bound)
            .unwrap_or(NO_MORE_DOCS))
    }

    /// Collects every doc in `[doc_id(), hi)` up front, then scores them
    /// in one SIMD batch rather than one `score()` call per document: the
    /// `uniform_norm` variant when this field has no norms file at all
    /// (every document decodes to the same constant length, the common
    /// case this fast path exists for), the per-document variant
    /// otherwise.
    fn score_batch_into(&mut self, hi: DocId, out: &mut Vec<(DocId, f32)>) -> Result<()> {
        let mut docs = Vec::new();
        let mut freqs = Vec::new();
        let mut doc = self.postings.doc();
        while doc < hi {
            docs.push(doc);
            freqs.push(self.postings.freq());
            let next = self.postings.next_doc()?;
            doc = self.advance_over_deleted(next)?;
        }
        if docs.is_empty() {
            return Ok(());
        }
        let mut scores = vec![0f32; docs.len()];
        match &self.norms {
            None => self.sim_weight.score_batch_uniform_norm(127, &freqs, &mut scores),
            Some(norms) => {
                let norm_bytes: Vec<u8> = docs.iter().map(|&d| norms.get(d)).collect();
                self.sim_weight.score_batch(&freqs, &norm_bytes, &mut scores);
            }
        }
        out.extend(docs.into_iter().zip(scores));
        Ok(())
    }
}

#[cfg(test)]
mod term_scorer_tests {
    use super::*;
    use crate::core::index::postings::{write_postings, PostingEntry, TermMeta};
    use crate::core::search::bm25_similarity::Bm25Similarity;
    use crate::core::search::statistics::{CollectionStatistics, TermStatistics};
    use crate::core::store::{Directory, IOContext, RamDirectory, ReadAdvice};
    use crate::core::util::bit_set::MatchAllBits;

    fn term_scorer(dir: &RamDirectory, file: &str, postings: &[PostingEntry]) -> TermScorer {
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
        let pe = PostingsEnum::new(input, &meta).unwrap();
        let sim = Bm25Similarity::default();
        let sw = sim.sim_weight("body", &TermStatistics::new(postings.len() as i64, 10), &CollectionStatistics::new(10, 100), 1.0);
        let live = Arc::new(MatchAllBits::new(10)) as BitsRef;
        TermScorer::new(pe, sw, live, None, impacts)
    }

    #[test]
    fn test_score_batch_into_matches_doc_at_a_time() {
        let dir = RamDirectory::new();
        let entries = vec![(1, 2, 100, vec![]), (3, 1, 100, vec![]), (4, 5, 100, vec![])];

        // Advancing to the first doc before scoring mirrors how a real
        // caller (MaxScoreBulkScorer::score_window) always positions a
        // scorer before either scoring it doc-at-a-time or batching it.
        let mut doc_at_a_time = term_scorer(&dir, "g.doc", &entries);
        let mut expected = Vec::new();
        let mut doc = doc_at_a_time.advance(0).unwrap();
        while doc != NO_MORE_DOCS {
            expected.push((doc, doc_at_a_time.score().unwrap()));
            doc = doc_at_a_time.next_doc().unwrap();
        }

        let mut batched = term_scorer(&dir, "h.doc", &entries);
        batched.advance(0).unwrap();
        let mut out = Vec::new();
        batched.score_batch_into(NO_MORE_DOCS, &mut out).unwrap();

        assert_eq!(out.len(), expected.len());
        for ((doc, score), (expected_doc, expected_score)) in out.into_iter().zip(expected) {
            assert_eq!(doc, expected_doc);
            assert!((score - expected_score).abs() < 1e-3);
        }
    }
}

/// Matches every document `live_docs` allows, scoring a constant boost.
/// The disjunction-free base case of the query tree.
pub struct MatchAllScorer {
    doc: DocId,
    max_doc: DocId,
    live_docs: BitsRef,
    boost: f32,
}

impl MatchAllScorer {
    pub fn new(max_doc: DocId, live_docs: BitsRef, boost: f32) -> MatchAllScorer {
        MatchAllScorer {
            doc: -1,
            max_doc,
            live_docs,
            boost,
        }
    }

    fn skip_deleted(&mut self) -> Result<DocId> {
        while self.doc < self.max_doc && !self.live_docs.get(self.doc as usize)? {
            self.doc += 1;
        }
        Ok(if self.doc >= self.max_doc {
            self.doc = NO_MORE_DOCS;
            NO_MORE_DOCS
        } else {
            self.doc
        })
    }
}

impl DocIterator for MatchAllScorer {
    fn doc_id(&self) -> DocId {
        self.doc
    }

    fn next_doc(&mut self) -> Result<DocId> {
        if self.doc == NO_MORE_DOCS {
            return Ok(NO_MORE_DOCS);
        }
        self.doc += 1;
        self.skip_deleted()
    }

    fn advance(&mut self, target: DocId) -> Result<DocId> {
        if self.doc == NO_MORE_DOCS {
            return Ok(NO_MORE_DOCS);
        }
        self.doc = target.max(self.doc + 1);
        self.skip_deleted()
    }

    fn cost(&self) -> i64 {
        i64::from(self.max_doc)
    }
}

impl Scorer for MatchAllScorer {
    fn score(&mut self) -> Result<f32> {
        Ok(self.boost)
    }

    fn max_score(&self, _up_to: DocId) -> f32 {
        self.boost
    }
}

/// AND of its clauses: advances the clause with the lowest current doc
/// until every clause agrees, using the others' `advance` to skip ahead
/// rather than stepping one document at a time.
pub struct ConjunctionScorer {
    scorers: Vec<Box<dyn Scorer>>,
    doc: DocId,
}

impl ConjunctionScorer {
    pub fn new(mut scorers: Vec<Box<dyn Scorer>>) -> Result<ConjunctionScorer> {
        scorers.sort_by_key(|s| s.cost());
        let mut c = ConjunctionScorer { scorers, doc: -1 };
        c.doc = c.do_next(0)?;
        Ok(c)
    }

    fn do_next(&mut self, mut candidate: DocId) -> Result<DocId> {
        'outer: loop {
            if candidate == NO_MORE_DOCS {
                return Ok(NO_MORE_DOCS);
            }
            for scorer in &mut self.scorers {
                let doc = if scorer.doc_id() < candidate {
                    scorer.advance(candidate)?
                } else {
                    scorer.doc_id()
                };
                if doc != candidate {
                    candidate = doc.max(candidate);
                    if doc == NO_MORE_DOCS {
                        return Ok(NO_MORE_DOCS);
                    }
                    continue 'outer;
                }
            }
            return Ok(candidate);
        }
    }
}

impl DocIterator for ConjunctionScorer {
    fn doc_id(&self) -> DocId {
        self.doc
    }

    fn next_doc(&mut self) -> Result<DocId> {
        let first = self.scorers[0].next_doc()?;
        self.doc = self.do_next(first)?;
        Ok(self.doc)
    }

    fn advance(&mut self, target: DocId) -> Result<DocId> {
        let first = self.scorers[0].advance(target)?;
        self.doc = self.do_next(first)?;
        Ok(self.doc)
    }

    fn cost(&self) -> i64 {
        self.scorers[0].cost()
    }
}

impl Scorer for ConjunctionScorer {
    fn score(&mut self) -> Result<f32> {
        let mut sum = 0.0f32;
        for scorer in &mut self.scorers {
            sum += scorer.score()?;
        }
        Ok(sum)
    }

    fn max_score(&self, up_to: DocId) -> f32 {
        self.scorers.iter().map(|s| s.max_score(up_to)).sum()
    }
}

struct HeapEntry {
    doc: DocId,
    idx: usize,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.doc == other.doc
    }
}
impl Eq for HeapEntry {}
impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Reversed: BinaryHeap is a max-heap, we want the smallest doc on top.
        other.doc.cmp(&self.doc)
    }
}

/// OR of its clauses: a min-heap keyed by doc ID so the next candidate
/// is always whichever live clause is furthest behind. Scores sum over
/// every clause currently positioned on the winning doc.
pub struct DisjunctionScorer {
    scorers: Vec<Box<dyn Scorer>>,
    heap: BinaryHeap<HeapEntry>,
    doc: DocId,
    matching: Vec<usize>,
}

impl DisjunctionScorer {
    pub fn new(scorers: Vec<Box<dyn Scorer>>) -> Result<DisjunctionScorer> {
        let mut d = DisjunctionScorer {
            scorers,
            heap: BinaryHeap::new(),
            doc: -1,
            matching: Vec::new(),
        };
        for idx in 0..d.scorers.len() {
            let doc = d.scorers[idx].next_doc()?;
            if doc != NO_MORE_DOCS {
                d.heap.push(HeapEntry { doc, idx });
            }
        }
        d.doc = d.settle()?;
        Ok(d)
    }

    fn settle(&mut self) -> Result<DocId> {
        self.matching.clear();
        let doc = match self.heap.peek() {
            Some(top) => top.doc,
            None => return Ok(NO_MORE_DOCS),
        };
        while let Some(top) = self.heap.peek() {
            if top.doc != doc {
                break;
            }
            let entry = self.heap.pop().unwrap();
            self.matching.push(entry.idx);
        }
        Ok(doc)
    }

    fn refill_matching(&mut self) -> Result<()> {
        let matching = std::mem::take(&mut self.matching);
        for idx in matching {
            let next = self.scorers[idx].next_doc()?;
            if next != NO_MORE_DOCS {
                self.heap.push(HeapEntry { doc: next, idx });
            }
        }
        Ok(())
    }
}

impl DocIterator for DisjunctionScorer {
    fn doc_id(&self) -> DocId {
        self.doc
    }

    fn next_doc(&mut self) -> Result<DocId> {
        self.refill_matching()?;
        self.doc = self.settle()?;
        Ok(self.doc)
    }

    fn advance(&mut self, target: DocId) -> Result<DocId> {
        // Drop everything below target, whether matching the current
        // doc or still sitting idle in the heap, and refill.
        let stale: Vec<usize> = std::mem::take(&mut self.matching);
        let mut rebuilt: Vec<HeapEntry> = Vec::new();
        for entry in self.heap.drain() {
            rebuilt.push(entry);
        }
        for idx in stale {
            let doc = self.scorers[idx].advance(target)?;
            if doc != NO_MORE_DOCS {
                rebuilt.push(HeapEntry { doc, idx });
            }
        }
        for entry in rebuilt {
            if entry.doc < target {
                let doc = self.scorers[entry.idx].advance(target)?;
                if doc != NO_MORE_DOCS {
                    self.heap.push(HeapEntry {
                        doc,
                        idx: entry.idx,
                    });
                }
            } else {
                self.heap.push(entry);
            }
        }
        self.doc = self.settle()?;
        Ok(self.doc)
    }

    fn cost(&self) -> i64 {
        self.scorers.iter().map(|s| s.cost()).sum()
    }
}

impl Scorer for DisjunctionScorer {
    fn score(&mut self) -> Result<f32> {
        let matching = self.matching.clone();
        let mut sum = 0.0f32;
        for idx in matching {
            sum += self.scorers[idx].score()?;
        }
        Ok(sum)
    }

    fn max_score(&self, up_to: DocId) -> f32 {
        self.scorers.iter().map(|s| s.max_score(up_to)).fold(0.0, f32::max)
    }
}

/// `required AND NOT excluded`: iterates the required clause and skips
/// any doc the excluded clause also matches. Only the required clause
/// contributes to the score.
pub struct ReqExclScorer {
    required: Box<dyn Scorer>,
    excluded: Box<dyn Scorer>,
}

impl ReqExclScorer {
    pub fn new(required: Box<dyn Scorer>, excluded: Box<dyn Scorer>) -> ReqExclScorer {
        ReqExclScorer { required, excluded }
    }

    fn skip_excluded(&mut self) -> Result<DocId> {
        loop {
            let doc = self.required.doc_id();
            if doc == NO_MORE_DOCS {
                return Ok(NO_MORE_DOCS);
            }
            let excl_doc = if self.excluded.doc_id() < doc {
                self.excluded.advance(doc)?
            } else {
                self.excluded.doc_id()
            };
            if excl_doc != doc {
                return Ok(doc);
            }
            if self.required.next_doc()? == NO_MORE_DOCS {
                return Ok(NO_MORE_DOCS);
            }
        }
    }
}

impl DocIterator for ReqExclScorer {
    fn doc_id(&self) -> DocId {
        self.required.doc_id()
    }

    fn next_doc(&mut self) -> Result<DocId> {
        self.required.next_doc()?;
        self.skip_excluded()
    }

    fn advance(&mut self, target: DocId) -> Result<DocId> {
        self.required.advance(target)?;
        self.skip_excluded()
    }

    fn cost(&self) -> i64 {
        self.required.cost()
    }
}

impl Scorer for ReqExclScorer {
    fn score(&mut self) -> Result<f32> {
        self.required.score()
    }

    fn max_score(&self, up_to: DocId) -> f32 {
        self.required.max_score(up_to)
    }
}

/// Constant-score filter over a precomputed bitset of matching
/// documents, used by numeric/double range queries: doc-values lookups
/// are O(1) random access, so the whole match set is cheap to compute
/// once up front rather than re-checked lazily on every `advance`.
pub struct RangeScorer {
    doc: DocId,
    max_doc: DocId,
    matching: Arc<FixedBitSet>,
    live_docs: BitsRef,
    boost: f32,
}

impl RangeScorer {
    pub fn new(matching: Arc<FixedBitSet>, live_docs: BitsRef, max_doc: DocId, boost: f32) -> RangeScorer {
        RangeScorer {
            doc: -1,
            max_doc,
            matching,
            live_docs,
            boost,
        }
    }

    fn advance_to_match(&mut self) -> Result<DocId> {
        while self.doc < self.max_doc {
            if self.matching.get(self.doc as usize)? && self.live_docs.get(self.doc as usize)? {
                return Ok(self.doc);
            }
            self.doc += 1;
        }
        self.doc = NO_MORE_DOCS;
        Ok(NO_MORE_DOCS)
    }
}

impl DocIterator for RangeScorer {
    fn doc_id(&self) -> DocId {
        self.doc
    }

    fn next_doc(&mut self) -> Result<DocId> {
        if self.doc == NO_MORE_DOCS {
            return Ok(NO_MORE_DOCS);
        }
        self.doc += 1;
        self.advance_to_match()
    }

    fn advance(&mut self, target: DocId) -> Result<DocId> {
        if self.doc == NO_MORE_DOCS {
            return Ok(NO_MORE_DOCS);
        }
        self.doc = target.max(self.doc + 1);
        self.advance_to_match()
    }

    fn cost(&self) -> i64 {
        i64::from(self.max_doc)
    }
}

impl Scorer for RangeScorer {
    fn score(&mut self) -> Result<f32> {
        Ok(self.boost)
    }

    fn max_score(&self, _up_to: DocId) -> f32 {
        self.boost
    }
}

/// One phrase term's postings plus its declared offset (the relative
/// position the phrase query placed it at, e.g. 0, 1, 2 for an ordinary
/// three-word phrase, or something sparser for a phrase with gaps).
type PhraseTerm = (PostingsEnum, i32);

/// Conjunction-over-positions scorer for `PhraseQuery`. The `DocIterator`
/// half only establishes that every term occurs somewhere in a
/// document (a cheap over-approximation); `TwoPhaseIterator::matches`
/// does the expensive exact position check and caches the resulting
/// phrase frequency for `score()`.
///
/// Position alignment is checked by anchoring on the first term: for
/// each of its positions, every other term must have an occurrence
/// within `slop` of the position that term's declared offset implies.
/// At `slop == 0` this degenerates to requiring an exact match at the
/// declared relative offsets, matching the spec's exact-phrase contract;
/// at `slop > 0` it sums each term's nearest-occurrence deviation rather
/// than searching every assignment, a documented simplification of
/// Lucene's full sloppy-phrase matcher.
pub struct PhraseScorer {
    terms: Vec<PhraseTerm>,
    /// Indices into `terms`, ascending by postings cost; `order[0]` is
    /// the lead iterator driving `next_doc`/`advance`.
    order: Vec<usize>,
    doc: DocId,
    slop: i32,
    sim_weight: SimWeight,
    norms: Option<Arc<NormValues>>,
    live_docs: BitsRef,
    freq: i32,
}

impl PhraseScorer {
    pub fn new(
        terms: Vec<PhraseTerm>,
        slop: i32,
        sim_weight: SimWeight,
        norms: Option<Arc<NormValues>>,
        live_docs: BitsRef,
    ) -> Result<PhraseScorer> {
        let mut order: Vec<usize> = (0..terms.len()).collect();
        order.sort_by_key(|&i| terms[i].0.cost());
        let mut scorer = PhraseScorer {
            terms,
            order,
            doc: -1,
            slop,
            sim_weight,
            norms,
            live_docs,
            freq: 0,
        };
        let lead = scorer.order[0];
        let first = scorer.terms[lead].0.next_doc()?;
        scorer.doc = scorer.advance_approx(first)?;
        Ok(scorer)
    }

    /// Advances every term to (at least) `candidate`, repeating until
    /// all agree on one doc ID that is also live, or exhaustion.
    fn advance_approx(&mut self, mut candidate: DocId) -> Result<DocId> {
        'outer: loop {
            if candidate == NO_MORE_DOCS {
                return Ok(NO_MORE_DOCS);
            }
            for &idx in &self.order {
                let cur = self.terms[idx].0.doc();
                let doc = if cur < candidate {
                    self.terms[idx].0.advance(candidate)?
                } else {
                    cur
                };
                if doc != candidate {
                    candidate = doc;
                    if doc == NO_MORE_DOCS {
                        return Ok(NO_MORE_DOCS);
                    }
                    continue 'outer;
                }
            }
            if !self.live_docs.get(candidate as usize)? {
                let lead = self.order[0];
                candidate = self.terms[lead].0.next_doc()?;
                continue;
            }
            return Ok(candidate);
        }
    }

    /// Number of positions in the current document where every term
    /// aligns with term 0 within `slop`, term 0's position serving as
    /// the phrase's anchor.
    fn compute_phrase_freq(&self) -> i32 {
        let (_, anchor_offset) = self.terms[0];
        let anchor_positions = self.terms[0].0.positions().to_vec();
        let mut freq = 0;
        'anchor: for p0 in anchor_positions {
            let mut slop_used = 0i32;
            for (postings, offset) in self.terms.iter().skip(1) {
                let expected = p0 + (offset - anchor_offset);
                let closest = postings
                    .positions()
                    .iter()
                    .min_by_key(|&&pos| (pos - expected).abs());
                match closest {
                    Some(&pos) => {
                        let diff = (pos - expected).abs();
                        if diff > self.slop {
                            continue 'anchor;
                        }
                        slop_used += diff;
                    }
                    None => continue 'anchor,
                }
            }
            if slop_used <= self.slop {
                freq += 1;
            }
        }
        freq
    }
}

impl DocIterator for PhraseScorer {
    fn doc_id(&self) -> DocId {
        self.doc
    }

    fn next_doc(&mut self) -> Result<DocId> {
        let lead = self.order[0];
        let next = self.terms[lead].0.next_doc()?;
        self.doc = self.advance_approx(next)?;
        Ok(self.doc)
    }

    fn advance(&mut self, target: DocId) -> Result<DocId> {
        let lead = self.order[0];
        let next = self.terms[lead].0.advance(target)?;
        self.doc = self.advance_approx(next)?;
        Ok(self.doc)
    }

    fn cost(&self) -> i64 {
        self.terms[self.order[0]].0.cost()
    }
}

impl TwoPhaseIterator for PhraseScorer {
    fn matches(&mut self) -> Result<bool> {
        self.freq = self.compute_phrase_freq();
        Ok(self.freq > 0)
    }

    fn match_cost(&self) -> f32 {
        self.terms.len() as f32 * 4.0
    }
}

impl Scorer for PhraseScorer {
    fn score(&mut self) -> Result<f32> {
        let norm_byte = match &self.norms {
            Some(n) => n.get(self.doc),
            None => 127,
        };
        Ok(self.sim_weight.score(self.freq, norm_byte))
    }

    fn two_phase(&mut self) -> Option<&mut dyn TwoPhaseIterator> {
        Some(self)
    }
}

#[cfg(test)]
mod phrase_tests {
    use super::*;
    use crate::core::index::postings::{write_postings, PostingEntry, TermMeta};
    use crate::core::store::{Directory, IOContext, RamDirectory};
    use crate::core::util::bit_set::MatchAllBits;
    use crate::core::search::statistics::{CollectionStatistics, TermStatistics};
    use crate::core::search::bm25_similarity::Bm25Similarity;

    fn build_term(dir: &RamDirectory, file: &str, entries: &[PostingEntry]) -> (PostingsEnum, Vec<crate::core::index::postings::Impact>) {
        let mut out = dir.create_output(file, &IOContext::Write).unwrap();
        let start_fp = out.file_pointer();
        let impacts = write_postings(out.as_mut(), entries).unwrap();
        drop(out);
        let meta = TermMeta {
            doc_freq: entries.len() as i32,
            total_term_freq: entries.iter().map(|e| i64::from(e.1)).sum(),
            doc_start_fp: start_fp,
            impacts: impacts.clone(),
        };
        let input = dir.open_input(file, &IOContext::Read(crate::core::store::ReadAdvice::Normal)).unwrap();
        (PostingsEnum::new(input, &meta).unwrap(), impacts)
    }

    #[test]
    fn test_exact_phrase_matches_adjacent_positions() {
        let dir = RamDirectory::new();
        // doc 0: "the quick brown fox" -> quick@1, brown@2
        let (quick, _) = build_term(&dir, "quick.doc", &[(0, 1, 100, vec![1])]);
        let (brown, _) = build_term(&dir, "brown.doc", &[(0, 1, 100, vec![2])]);

        let sim = Bm25Similarity::default();
        let sw = sim.sim_weight("body", &TermStatistics::new(1, 1), &CollectionStatistics::new(1, 4), 1.0);
        let live = Arc::new(MatchAllBits::new(1)) as BitsRef;
        let mut scorer = PhraseScorer::new(
            vec![(quick, 0), (brown, 1)],
            0,
            sw,
            None,
            live,
        )
        .unwrap();
        assert_eq!(scorer.doc_id(), 0);
        assert!(scorer.two_phase().unwrap().matches().unwrap());
        assert!(scorer.score().unwrap() > 0.0);
    }

    #[test]
    fn test_exact_phrase_rejects_out_of_order() {
        let dir = RamDirectory::new();
        // doc 0: brown appears before quick -> not a phrase match for "quick brown"
        let (quick, _) = build_term(&dir, "q2.doc", &[(0, 1, 100, vec![2])]);
        let (brown, _) = build_term(&dir, "b2.doc", &[(0, 1, 100, vec![0])]);

        let sim = Bm25Similarity::default();
        let sw = sim.sim_weight("body", &TermStatistics::new(1, 1), &CollectionStatistics::new(1, 4), 1.0);
        let live = Arc::new(MatchAllBits::new(1)) as BitsRef;
        let mut scorer = PhraseScorer::new(vec![(quick, 0), (brown, 1)], 0, sw, None, live).unwrap();
        assert_eq!(scorer.doc_id(), 0);
        assert!(!scorer.two_phase().unwrap().matches().unwrap());
    }

    #[test]
    fn test_sloppy_phrase_allows_small_gap() {
        let dir = RamDirectory::new();
        // "quick" at 0, "fox" at 3 (one extra word between): slop 1 too tight, slop 2 matches.
        let (quick, _) = build_term(&dir, "q3.doc", &[(0, 1, 100, vec![0])]);
        let (fox, _) = build_term(&dir, "f3.doc", &[(0, 1, 100, vec![3])]);

        let sim = Bm25Similarity::default();
        let sw = sim.sim_weight("body", &TermStatistics::new(1, 1), &CollectionStatistics::new(1, 4), 1.0);
        let live = Arc::new(MatchAllBits::new(1)) as BitsRef;
        let mut too_tight = PhraseScorer::new(vec![(quick, 0), (fox, 1)], 1, sw, None, Arc::clone(&live)).unwrap();
        assert!(!too_tight.two_phase().unwrap().matches().unwrap());

        let dir2 = RamDirectory::new();
        let (quick2, _) = build_term(&dir2, "q4.doc", &[(0, 1, 100, vec![0])]);
        let (fox2, _) = build_term(&dir2, "f4.doc", &[(0, 1, 100, vec![3])]);
        let mut loose = PhraseScorer::new(vec![(quick2, 0), (fox2, 1)], 2, sw, None, live).unwrap();
        assert!(loose.two_phase().unwrap().matches().unwrap());
    }
}
