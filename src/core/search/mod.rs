//! Query evaluation: the `DocIterator`/`Scorer` iteration protocol,
//! `Query`/`Weight` construction, `Collector`/`LeafCollector` result
//! gathering, and the concrete scorer/query implementations built on
//! top of them.

pub mod bm25_similarity;
pub mod bulk_scorer;
pub mod collector;
pub mod max_score;
pub mod query;
pub mod scorer;
pub mod searcher;
pub mod statistics;
pub mod wand;
pub mod weight;

use crate::core::index::LeafReaderContext;
use crate::core::util::bit_set::BitsRef;
use crate::core::util::doc_id::DocId;
pub use crate::core::util::doc_id::NO_MORE_DOCS;
use crate::error::{Error, ErrorKind, Result};

/// Forward-only traversal over an ascending sequence of doc IDs, shared
/// by postings, scorers, and filter bitsets. `next_doc`/`advance` both
/// return `NO_MORE_DOCS` once exhausted rather than an error — iterator
/// exhaustion is an expected outcome, not a failure.
pub trait DocIterator {
    fn doc_id(&self) -> DocId;
    fn next_doc(&mut self) -> Result<DocId>;
    fn advance(&mut self, target: DocId) -> Result<DocId>;

    /// An estimate of how many documents remain, used to choose
    /// conjunction/disjunction leader order and leaf ordering. Exactness
    /// is not required; it must never be zero unless truly exhausted.
    fn cost(&self) -> i64;

    /// Naive O(target - doc_id) fallback for iterators that don't have a
    /// smarter `advance`; used to implement `advance` for wrapper types
    /// that only know how to call `next_doc`.
    fn slow_advance(&mut self, target: DocId) -> Result<DocId> {
        let mut doc = self.doc_id();
        while doc < target {
            doc = self.next_doc()?;
        }
        Ok(doc)
    }
}

/// A `DocIterator` that scores the document it is currently positioned
/// on. Block-max algorithms additionally use `max_score`/
/// `advance_shallow`/`set_min_competitive_score` to skip whole ranges of
/// non-competitive documents without visiting them one at a time.
pub trait Scorer: DocIterator {
    fn score(&mut self) -> Result<f32>;

    /// An upper bound on the score of any document in
    /// `[doc_id(), upTo]`. The default of `f32::MAX` is always correct
    /// but useless for skipping; scorers backed by impacts override it
    /// with a real bound.
    fn max_score(&self, _up_to: DocId) -> f32 {
        f32::MAX
    }

    /// Loads whatever per-block metadata covers `target` so the next
    /// `max_score` call is accurate there, without actually advancing
    /// the iterator's position. Default: a same no-op, appropriate for
    /// scorers without block-level impacts.
    fn advance_shallow(&mut self, _target: DocId) -> Result<DocId> {
        Ok(self.doc_id())
    }

    /// The next doc ID at or after `target` up to which `max_score`
    /// is guaranteed to hold without calling `advance_shallow` again.
    /// The default models an unblocked scorer: `max_score` is constant
    /// at `f32::MAX` until exhaustion, so there is no boundary closer
    /// than `NO_MORE_DOCS`.
    fn next_block_boundary(&self, _target: DocId) -> Result<DocId> {
        Ok(NO_MORE_DOCS)
    }

    /// Tells the scorer it no longer needs to produce documents scoring
    /// below `min_score` — WAND/MaxScore call this as the collector's
    /// worst competitive score rises, letting lower scorers in a
    /// disjunction skip themselves out of contention. Default: no-op,
    /// correct for scorers that can't use the hint.
    fn set_min_competitive_score(&mut self, _min_score: f32) -> Result<()> {
        Ok(())
    }

    /// Whether this scorer supports two-phase iteration (`DocIterator`
    /// gives an approximate match that a separate, more expensive
    /// `matches()` check confirms). `None` means ordinary one-phase
    /// iteration.
    fn two_phase(&mut self) -> Option<&mut dyn TwoPhaseIterator> {
        None
    }

    /// Scores every remaining doc in `[doc_id(), hi)` into `out` as
    /// `(doc, score)` pairs, leaving the iterator positioned at the first
    /// doc at or after `hi` (or `NO_MORE_DOCS`). The default walks
    /// doc-at-a-time via `next_doc`/`score`; a scorer with a SIMD batch
    /// path (`TermScorer`) overrides this to score several documents per
    /// instruction instead of one `score()` call each. `MaxScoreBulkScorer`
    /// calls this for every essential clause in a window rather than
    /// looping `score()` itself, so the batch path is actually reachable
    /// from a real query.
    fn score_batch_into(&mut self, hi: DocId, out: &mut Vec<(DocId, f32)>) -> Result<()> {
        let mut doc = self.doc_id();
        while doc < hi {
            out.push((doc, self.score()?));
            doc = self.next_doc()?;
        }
        Ok(())
    }
}

/// The expensive-but-exact half of two-phase iteration: confirms
/// whether the approximate match the wrapped `DocIterator` is
/// positioned on is a real match (e.g. phrase position verification
/// after a conjunction of term positions agreed on a candidate doc).
pub trait TwoPhaseIterator {
    fn matches(&mut self) -> Result<bool>;

    /// Relative cost of calling `matches()` versus advancing the
    /// approximation, used to decide how eagerly to verify candidates.
    fn match_cost(&self) -> f32;
}

/// Advances `approximation` to the next doc whose `two_phase.matches()`
/// confirms, or `NO_MORE_DOCS`. Shared by every two-phase scorer
/// (phrase queries, span-like constructs) so the verify loop is written
/// once.
pub fn two_phase_next(
    approximation: &mut dyn DocIterator,
    two_phase: &mut dyn TwoPhaseIterator,
) -> Result<DocId> {
    loop {
        let doc = approximation.next_doc()?;
        if doc == NO_MORE_DOCS {
            return Ok(NO_MORE_DOCS);
        }
        if two_phase.matches()? {
            return Ok(doc);
        }
    }
}

/// Per-segment statistics a `Similarity` needs up front (computed once
/// per `Weight`, not per document): how many documents in the whole
/// collection, how many contain each term, and the field's average
/// length.
pub use crate::core::search::statistics::{CollectionStatistics, TermStatistics};

/// Produces a `Scorer` for one leaf, capturing query-time state
/// (collection statistics, IDF) computed once rather than per document.
pub trait Weight: Send + Sync {
    fn scorer(&self, leaf: &LeafReaderContext) -> Result<Option<Box<dyn Scorer>>>;

    /// Recomputes a score for one document directly, for explain/rescore
    /// paths that don't want to drive a full iterator.
    fn explain(&self, leaf: &LeafReaderContext, doc: DocId) -> Result<Explanation>;

    /// A bulk scorer for this leaf when the query supports windowed,
    /// batch-oriented collection (currently only pure disjunctions via
    /// `max_score::MaxScoreBulkScorer`). `None` means the searcher should
    /// fall back to driving a plain `Scorer` doc-at-a-time.
    fn bulk_scorer(
        &self,
        _leaf: &LeafReaderContext,
    ) -> Result<Option<Box<dyn bulk_scorer::BulkScorer>>> {
        Ok(None)
    }

    /// How many documents this query matches in `leaf`, in O(1) when the
    /// weight can derive it from statistics alone (e.g. a term with no
    /// deletions in the segment); `None` means the caller must count by
    /// iterating.
    fn count(&self, _leaf: &LeafReaderContext) -> Result<Option<i32>> {
        Ok(None)
    }
}

/// A human-readable score breakdown, mirroring the structured
/// explanation every scoring query can produce on request.
#[derive(Debug, Clone)]
pub struct Explanation {
    pub value: f32,
    pub description: String,
    pub details: Vec<Explanation>,
}

impl Explanation {
    pub fn leaf(value: f32, description: impl Into<String>) -> Explanation {
        Explanation {
            value,
            description: description.into(),
            details: Vec::new(),
        }
    }

    pub fn combined(
        value: f32,
        description: impl Into<String>,
        details: Vec<Explanation>,
    ) -> Explanation {
        Explanation {
            value,
            description: description.into(),
            details,
        }
    }

    pub fn no_match(description: impl Into<String>) -> Explanation {
        Explanation {
            value: 0.0,
            description: description.into(),
            details: Vec::new(),
        }
    }
}

/// A query in tree form, before being bound to a particular index. Each
/// `Query` implementation creates the `Weight` that does the actual
/// per-segment scoring.
pub trait Query: Send + Sync + std::fmt::Debug + 'static {
    fn create_weight(
        &self,
        searcher: &dyn searcher::SearchPlan,
        needs_scores: bool,
        boost: f32,
    ) -> Result<Box<dyn Weight>>;

    /// Returns a possibly-simplified equivalent query (e.g. a single-term
    /// phrase collapsing to a `TermQuery`, or a single-clause boolean
    /// collapsing to its clause). The default is "already simplest form".
    fn rewrite(self: Box<Self>, _plan: &dyn searcher::SearchPlan) -> Result<Box<dyn Query>> {
        Ok(self)
    }
}

/// Unwinds collection at the `Collector`/collection-loop boundary; see
/// [`crate::error::collector`].
pub fn collector_terminated() -> Error {
    ErrorKind::Collector(crate::error::collector::ErrorKind::CollectionTerminated).into()
}

pub fn leaf_collection_terminated() -> Error {
    ErrorKind::Collector(crate::error::collector::ErrorKind::LeafCollectionTerminated).into()
}

/// Bits a scorer should treat as absent, combining the live-docs filter
/// with query deletion.
pub fn is_live(live_docs: &BitsRef, doc: DocId) -> Result<bool> {
    live_docs.get(doc as usize)
}
