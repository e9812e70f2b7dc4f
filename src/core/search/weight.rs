//! The concrete `Weight` for each query type in
//! [`crate::core::search::query`]: binds a query's compile-time state
//! (similarity weights, range bounds, sub-weights) to one segment,
//! producing a `Scorer` or answering `count`/`explain` directly.

use std::sync::Arc;

use crate::core::index::doc_values::NumericDocValues;
use crate::core::index::term::Term;
use crate::core::index::LeafReaderContext;
use crate::core::search::bm25_similarity::SimWeight;
use crate::core::search::bulk_scorer::BulkScorer;
use crate::core::search::max_score::MaxScoreBulkScorer;
use crate::core::search::scorer::{
    ConjunctionScorer, DisjunctionScorer, MatchAllScorer, PhraseScorer, RangeScorer, ReqExclScorer, TermScorer,
};
use crate::core::search::wand::WANDScorer;
use crate::core::search::{DocIterator, Explanation, Scorer, TwoPhaseIterator, Weight, NO_MORE_DOCS};
use crate::core::util::bit_set::{Bits, FixedBitSet};
use crate::core::util::doc_id::DocId;
use crate::error::Result;

/// Advances `scorer` to `doc` and, for a two-phase scorer, confirms the
/// approximate match before scoring — the shared core of every `Weight`'s
/// `explain`, which needs a yes/no/score answer for one specific
/// document rather than a full iteration.
fn explain_at(mut scorer: Box<dyn Scorer>, doc: DocId, matched: impl FnOnce(f32) -> Explanation, no_match: impl FnOnce() -> Explanation) -> Result<Explanation> {
    if scorer.advance(doc)? != doc {
        return Ok(no_match());
    }
    let confirmed = match scorer.two_phase() {
        Some(tp) => tp.matches()?,
        None => true,
    };
    if !confirmed {
        return Ok(no_match());
    }
    let score = scorer.score()?;
    Ok(matched(score))
}

pub struct TermWeight {
    term: Term,
    sim_weight: SimWeight,
}

impl TermWeight {
    pub fn new(term: Term, sim_weight: SimWeight) -> TermWeight {
        TermWeight { term, sim_weight }
    }
}

impl Weight for TermWeight {
    fn scorer(&self, leaf: &LeafReaderContext) -> Result<Option<Box<dyn Scorer>>> {
        let postings = match leaf.reader.postings(&self.term)? {
            Some(p) => p,
            None => return Ok(None),
        };
        let impacts = leaf
            .reader
            .term_meta(&self.term.field, &self.term.bytes)
            .map(|m| m.impacts.clone())
            .unwrap_or_default();
        let norms = leaf.reader.norm_values(&self.term.field);
        let live_docs = leaf.reader.live_docs();
        Ok(Some(Box::new(TermScorer::new(postings, self.sim_weight, live_docs, norms, impacts))))
    }

    fn explain(&self, leaf: &LeafReaderContext, doc: DocId) -> Result<Explanation> {
        let term = self.term.to_string();
        match self.scorer(leaf)? {
            Some(scorer) => explain_at(
                scorer,
                doc,
                |score| Explanation::leaf(score, format!("bm25 score of term \"{}\" at doc {}", term, doc)),
                || Explanation::no_match(format!("term \"{}\" does not occur at doc {}", term, doc)),
            ),
            None => Ok(Explanation::no_match(format!("term \"{}\" has no postings in this segment", term))),
        }
    }

    fn count(&self, leaf: &LeafReaderContext) -> Result<Option<i32>> {
        if leaf.reader.has_deletions() {
            return Ok(None);
        }
        Ok(Some(leaf.reader.doc_freq(&self.term)))
    }
}

pub struct PhraseWeight {
    field: String,
    terms: Vec<(Vec<u8>, i32)>,
    slop: i32,
    sim_weight: SimWeight,
}

impl PhraseWeight {
    pub fn new(field: String, terms: Vec<(Vec<u8>, i32)>, slop: i32, sim_weight: SimWeight) -> PhraseWeight {
        PhraseWeight { field, terms, slop, sim_weight }
    }

    fn build(&self, leaf: &LeafReaderContext) -> Result<Option<PhraseScorer>> {
        let mut phrase_terms = Vec::with_capacity(self.terms.len());
        for (bytes, offset) in &self.terms {
            let term = Term::new(self.field.clone(), bytes.clone());
            match leaf.reader.postings(&term)? {
                Some(p) => phrase_terms.push((p, *offset)),
                None => return Ok(None),
            }
        }
        let norms = leaf.reader.norm_values(&self.field);
        let live_docs = leaf.reader.live_docs();
        Ok(Some(PhraseScorer::new(phrase_terms, self.slop, self.sim_weight, norms, live_docs)?))
    }
}

impl Weight for PhraseWeight {
    fn scorer(&self, leaf: &LeafReaderContext) -> Result<Option<Box<dyn Scorer>>> {
        Ok(self.build(leaf)?.map(|s| Box::new(s) as Box<dyn Scorer>))
    }

    fn explain(&self, leaf: &LeafReaderContext, doc: DocId) -> Result<Explanation> {
        let field = self.field.clone();
        match self.build(leaf)? {
            Some(scorer) => explain_at(
                Box::new(scorer),
                doc,
                |score| Explanation::leaf(score, format!("phrase score in field \"{}\" at doc {}", field, doc)),
                || Explanation::no_match(format!("phrase does not occur in sequence at doc {}", doc)),
            ),
            None => Ok(Explanation::no_match(format!("a phrase term has no postings in field \"{}\"", field))),
        }
    }
}

/// A sub-scorer wrapper for `FILTER` clauses: the document still has to
/// match (and still drives skipping/conjunction), it just never
/// contributes to the combined score.
struct ZeroScoreScorer {
    inner: Box<dyn Scorer>,
}

impl ZeroScoreScorer {
    fn new(inner: Box<dyn Scorer>) -> ZeroScoreScorer {
        ZeroScoreScorer { inner }
    }
}

impl DocIterator for ZeroScoreScorer {
    fn doc_id(&self) -> DocId {
        self.inner.doc_id()
    }
    fn next_doc(&mut self) -> Result<DocId> {
        self.inner.next_doc()
    }
    fn advance(&mut self, target: DocId) -> Result<DocId> {
        self.inner.advance(target)
    }
    fn cost(&self) -> i64 {
        self.inner.cost()
    }
}

impl Scorer for ZeroScoreScorer {
    fn score(&mut self) -> Result<f32> {
        Ok(0.0)
    }
    fn max_score(&self, _up_to: DocId) -> f32 {
        0.0
    }
    fn advance_shallow(&mut self, target: DocId) -> Result<DocId> {
        self.inner.advance_shallow(target)
    }
    fn next_block_boundary(&self, target: DocId) -> Result<DocId> {
        self.inner.next_block_boundary(target)
    }
}

/// Required-plus-optional composition: the document set is exactly
/// `required`'s, and `optional`'s score is added in only on the docs
/// where it happens to also match. Mirrors Lucene's `ReqOptSumScorer`.
struct ReqOptScorer {
    required: Box<dyn Scorer>,
    optional: Box<dyn Scorer>,
}

impl ReqOptScorer {
    fn new(required: Box<dyn Scorer>, optional: Box<dyn Scorer>) -> ReqOptScorer {
        ReqOptScorer { required, optional }
    }
}

impl DocIterator for ReqOptScorer {
    fn doc_id(&self) -> DocId {
        self.required.doc_id()
    }
    fn next_doc(&mut self) -> Result<DocId> {
        self.required.next_doc()
    }
    fn advance(&mut self, target: DocId) -> Result<DocId> {
        self.required.advance(target)
    }
    fn cost(&self) -> i64 {
        self.required.cost()
    }
}

impl Scorer for ReqOptScorer {
    fn score(&mut self) -> Result<f32> {
        let doc = self.required.doc_id();
        let mut sum = self.required.score()?;
        if self.optional.doc_id() < doc && doc != NO_MORE_DOCS {
            self.optional.advance(doc)?;
        }
        if self.optional.doc_id() == doc {
            sum += self.optional.score()?;
        }
        Ok(sum)
    }
    fn max_score(&self, up_to: DocId) -> f32 {
        self.required.max_score(up_to) + self.optional.max_score(up_to)
    }
}

pub struct BooleanWeight {
    must: Vec<Box<dyn Weight>>,
    should: Vec<Box<dyn Weight>>,
    must_not: Vec<Box<dyn Weight>>,
    filter: Vec<Box<dyn Weight>>,
    min_should_match: usize,
    enable_block_max_wand: bool,
}

impl BooleanWeight {
    pub fn new(
        must: Vec<Box<dyn Weight>>,
        should: Vec<Box<dyn Weight>>,
        must_not: Vec<Box<dyn Weight>>,
        filter: Vec<Box<dyn Weight>>,
        min_should_match: usize,
        enable_block_max_wand: bool,
    ) -> BooleanWeight {
        BooleanWeight { must, should, must_not, filter, min_should_match, enable_block_max_wand }
    }

    fn required_scorers(&self, leaf: &LeafReaderContext) -> Result<Option<Vec<Box<dyn Scorer>>>> {
        let mut required = Vec::with_capacity(self.must.len() + self.filter.len());
        for w in &self.must {
            match w.scorer(leaf)? {
                Some(s) => required.push(s),
                None => return Ok(None),
            }
        }
        for w in &self.filter {
            match w.scorer(leaf)? {
                Some(s) => required.push(Box::new(ZeroScoreScorer::new(s)) as Box<dyn Scorer>),
                None => return Ok(None),
            }
        }
        Ok(Some(required))
    }

    fn should_scorers(&self, leaf: &LeafReaderContext) -> Result<Vec<Box<dyn Scorer>>> {
        let mut scorers = Vec::with_capacity(self.should.len());
        for w in &self.should {
            if let Some(s) = w.scorer(leaf)? {
                scorers.push(s);
            }
        }
        Ok(scorers)
    }

    /// Combines the `MUST`/`FILTER` conjunction with the `SHOULD`
    /// disjunction per `minimum_should_match`: `0` makes `SHOULD` purely
    /// additive (`ReqOptScorer`), `>0` makes it required alongside the
    /// rest (nested `ConjunctionScorer`). `MUST_NOT` is applied by the
    /// caller once this combination is built.
    fn combine(&self, leaf: &LeafReaderContext) -> Result<Option<Box<dyn Scorer>>> {
        let required = match self.required_scorers(leaf)? {
            Some(r) => r,
            None => return Ok(None),
        };
        let has_required = !required.is_empty();
        let mut should = self.should_scorers(leaf)?;

        if should.len() < self.min_should_match {
            return Ok(None);
        }

        let should_combined: Option<Box<dyn Scorer>> = if should.is_empty() {
            None
        } else if should.len() == 1 {
            Some(should.pop().unwrap())
        } else {
            Some(Box::new(WANDScorer::new(should, self.min_should_match.max(1))?))
        };

        let combined = match (has_required, should_combined) {
            (false, Some(s)) => Some(s),
            (true, None) => Some(Box::new(ConjunctionScorer::new(required)?) as Box<dyn Scorer>),
            (true, Some(s)) => {
                let req: Box<dyn Scorer> = Box::new(ConjunctionScorer::new(required)?);
                if self.min_should_match > 0 {
                    Some(Box::new(ConjunctionScorer::new(vec![req, s])?) as Box<dyn Scorer>)
                } else {
                    Some(Box::new(ReqOptScorer::new(req, s)) as Box<dyn Scorer>)
                }
            }
            (false, None) => None,
        };
        Ok(combined)
    }
}

impl Weight for BooleanWeight {
    fn scorer(&self, leaf: &LeafReaderContext) -> Result<Option<Box<dyn Scorer>>> {
        let mut combined = match self.combine(leaf)? {
            Some(s) => s,
            None => return Ok(None),
        };
        let mut excluded = Vec::new();
        for w in &self.must_not {
            if let Some(s) = w.scorer(leaf)? {
                excluded.push(s);
            }
        }
        if !excluded.is_empty() {
            let excl: Box<dyn Scorer> = if excluded.len() == 1 {
                excluded.pop().unwrap()
            } else {
                Box::new(DisjunctionScorer::new(excluded)?)
            };
            combined = Box::new(ReqExclScorer::new(combined, excl));
        }
        Ok(Some(combined))
    }

    fn explain(&self, leaf: &LeafReaderContext, doc: DocId) -> Result<Explanation> {
        match self.scorer(leaf)? {
            Some(scorer) => explain_at(
                scorer,
                doc,
                |score| Explanation::leaf(score, format!("boolean combination matches doc {}", doc)),
                || Explanation::no_match(format!("boolean combination does not match doc {}", doc)),
            ),
            None => Ok(Explanation::no_match("no clause produced a scorer for this segment".to_string())),
        }
    }

    /// Only pure, flat `SHOULD` disjunctions (no `MUST`/`FILTER`/
    /// `MUST_NOT`, `minimumShouldMatch <= 1`) are eligible for windowed
    /// MaxScore collection; anything else falls back to the plain
    /// doc-at-a-time scorer built above.
    fn bulk_scorer(&self, leaf: &LeafReaderContext) -> Result<Option<Box<dyn BulkScorer>>> {
        if !self.enable_block_max_wand {
            return Ok(None);
        }
        if !self.must.is_empty() || !self.filter.is_empty() || !self.must_not.is_empty() {
            return Ok(None);
        }
        if self.min_should_match > 1 {
            return Ok(None);
        }
        let scorers = self.should_scorers(leaf)?;
        if scorers.len() < 2 {
            return Ok(None);
        }
        Ok(Some(Box::new(MaxScoreBulkScorer::new(scorers)?)))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RangeBounds {
    lower: i64,
    upper: i64,
    include_lower: bool,
    include_upper: bool,
}

impl RangeBounds {
    pub fn new(lower: i64, upper: i64, include_lower: bool, include_upper: bool) -> RangeBounds {
        RangeBounds { lower, upper, include_lower, include_upper }
    }

    pub fn contains(&self, value: i64) -> bool {
        let lower_ok = if self.include_lower { value >= self.lower } else { value > self.lower };
        let upper_ok = if self.include_upper { value <= self.upper } else { value < self.upper };
        lower_ok && upper_ok
    }
}

pub struct RangeWeight {
    field: String,
    boost: f32,
    bounds: RangeBounds,
}

impl RangeWeight {
    pub fn new(field: String, boost: f32, bounds: RangeBounds) -> RangeWeight {
        RangeWeight { field, boost, bounds }
    }
}

impl Weight for RangeWeight {
    fn scorer(&self, leaf: &LeafReaderContext) -> Result<Option<Box<dyn Scorer>>> {
        let dv = match leaf.reader.numeric_doc_values(&self.field) {
            Some(dv) => dv,
            None => return Ok(None),
        };
        let max_doc = leaf.reader.max_doc();
        let mut matching = FixedBitSet::new(max_doc as usize);
        for doc in 0..max_doc {
            if self.bounds.contains(dv.get(doc)?) {
                matching.set(doc as usize);
            }
        }
        let live_docs = leaf.reader.live_docs();
        Ok(Some(Box::new(RangeScorer::new(Arc::new(matching), live_docs, max_doc, self.boost))))
    }

    fn explain(&self, leaf: &LeafReaderContext, doc: DocId) -> Result<Explanation> {
        let field = self.field.clone();
        let boost = self.boost;
        match leaf.reader.numeric_doc_values(&self.field) {
            Some(dv) => {
                let raw = dv.get(doc)?;
                if self.bounds.contains(raw) {
                    Ok(Explanation::leaf(boost, format!("doc value {} within range for field \"{}\"", raw, field)))
                } else {
                    Ok(Explanation::no_match(format!("doc value {} outside range for field \"{}\"", raw, field)))
                }
            }
            None => Ok(Explanation::no_match(format!("field \"{}\" has no doc values in this segment", field))),
        }
    }
}

pub struct MatchAllWeight {
    boost: f32,
}

impl MatchAllWeight {
    pub fn new(boost: f32) -> MatchAllWeight {
        MatchAllWeight { boost }
    }
}

impl Weight for MatchAllWeight {
    fn scorer(&self, leaf: &LeafReaderContext) -> Result<Option<Box<dyn Scorer>>> {
        let live_docs = leaf.reader.live_docs();
        Ok(Some(Box::new(MatchAllScorer::new(leaf.reader.max_doc(), live_docs, self.boost))))
    }

    fn explain(&self, leaf: &LeafReaderContext, doc: DocId) -> Result<Explanation> {
        if leaf.reader.live_docs().get(doc as usize)? {
            Ok(Explanation::leaf(self.boost, "MatchAllDocsQuery constant score".to_string()))
        } else {
            Ok(Explanation::no_match(format!("doc {} is deleted", doc)))
        }
    }

    fn count(&self, leaf: &LeafReaderContext) -> Result<Option<i32>> {
        Ok(Some(leaf.reader.num_docs()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_bounds_respect_inclusivity() {
        let inclusive = RangeBounds::new(1, 10, true, true);
        assert!(inclusive.contains(1));
        assert!(inclusive.contains(10));

        let exclusive = RangeBounds::new(1, 10, false, false);
        assert!(!exclusive.contains(1));
        assert!(!exclusive.contains(10));
        assert!(exclusive.contains(5));
    }
}
