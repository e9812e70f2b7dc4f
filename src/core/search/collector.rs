//! Result gathering: the `Collector`/`LeafCollector` traits, the score
//! modes that tell a `Scorer` how aggressively it may skip, and the
//! fixed-capacity top-K priority queue every ranked search drains into.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::core::index::LeafReaderContext;
use crate::core::search::Scorer;
use crate::core::util::doc_id::DocId;
use crate::error::Result;

/// How a collector plans to consume scores. Mirrors Lucene's
/// `ScoreMode`: whether a scorer may skip computing a score at all, and
/// whether it should expect (and may exploit) a rising competitive
/// threshold via `Scorer::set_min_competitive_score`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreMode {
    /// Every matching document is collected; scores are needed but the
    /// collector never raises a competitive threshold.
    Complete,
    /// Every matching document is collected; scores are not read at all,
    /// so scorers may skip score computation entirely.
    CompleteNoScores,
    /// Only the best documents matter; the collector will call
    /// `set_min_competitive_score` as its worst candidate improves,
    /// letting WAND/MaxScore skip non-competitive ranges.
    TopScores,
}

impl ScoreMode {
    pub fn needs_scores(self) -> bool {
        self != ScoreMode::CompleteNoScores
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreDoc {
    pub doc: DocId,
    pub score: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TotalHitsRelation {
    EqualTo,
    GreaterThanOrEqualTo,
}

#[derive(Debug, Clone, Copy)]
pub struct TotalHits {
    pub value: i64,
    pub relation: TotalHitsRelation,
}

#[derive(Debug, Clone)]
pub struct TopDocs {
    pub total_hits: TotalHits,
    pub score_docs: Vec<ScoreDoc>,
}

/// Per-leaf half of a `Collector`: `collect` is called once per matching
/// document with the scorer positioned on it, in ascending doc order.
pub trait LeafCollector {
    fn collect(&mut self, doc: DocId, scorer: &mut dyn Scorer) -> Result<()>;

    /// The collector's current worst-competitive score, once it has a
    /// meaningful one (e.g. a top-K heap that has filled). A bulk scorer
    /// that drives its own windowed iteration — and so never has a live
    /// `Scorer` handle for the collector to call `set_min_competitive_score`
    /// on directly — polls this between windows instead. Default: `None`,
    /// correct for collectors that never raise a threshold.
    fn min_competitive_score(&self) -> Option<f32> {
        None
    }
}

/// Drives collection for one query across every leaf of the index.
pub trait Collector {
    fn score_mode(&self) -> ScoreMode;

    /// Builds the per-leaf collector for `leaf`, or `None` to skip the
    /// leaf entirely (e.g. a count-only collector that already read an
    /// O(1) count for it from the `Weight` and has nothing left to do).
    fn leaf_collector(&mut self, leaf: &LeafReaderContext) -> Result<Option<Box<dyn LeafCollector + '_>>>;
}

fn is_finite(score: f32) -> bool {
    score.is_finite()
}

/// `(-score, doc)` ascending, i.e. highest score first and, among ties,
/// lowest doc ID first — the order `TopDocs::score_docs` is returned in
/// and the order `search_after` paginates through.
fn is_strictly_after(score: f32, doc: DocId, after: &ScoreDoc) -> bool {
    match score.partial_cmp(&after.score) {
        Some(Ordering::Less) => true,
        Some(Ordering::Equal) => doc > after.doc,
        _ => false,
    }
}

#[derive(Debug, Clone, Copy)]
struct RankedDoc {
    doc: DocId,
    score: f32,
}

/// Ordered so a `BinaryHeap`'s max (top) element is the *worst*
/// competitive document: lowest score, with ties broken by the larger
/// doc ID (matching the spec's `(-score, doc)` total order — the
/// smaller doc ID is "better" at equal scores, so it is less likely to
/// be evicted).
impl PartialEq for RankedDoc {
    fn eq(&self, other: &Self) -> bool {
        self.score == other.score && self.doc == other.doc
    }
}
impl Eq for RankedDoc {}
impl PartialOrd for RankedDoc {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for RankedDoc {
    fn cmp(&self, other: &Self) -> Ordering {
        match other.score.partial_cmp(&self.score) {
            Some(Ordering::Equal) | None => self.doc.cmp(&other.doc),
            Some(ord) => ord,
        }
    }
}

/// Fixed-capacity top-K ranked collector: keeps the `k` best-scoring
/// documents seen across every leaf, feeding its rising worst-score
/// threshold back to each leaf's scorer so WAND/MaxScore can skip
/// non-competitive ranges. `total_hits` counts every document the
/// collector was asked to collect, independent of whether it made the
/// cut (or was excluded by `search_after` pagination).
pub struct TopDocsCollector {
    num_hits: usize,
    search_after: Option<ScoreDoc>,
    heap: BinaryHeap<RankedDoc>,
    total_hits: i64,
}

impl TopDocsCollector {
    pub fn new(num_hits: usize) -> TopDocsCollector {
        TopDocsCollector {
            num_hits,
            search_after: None,
            heap: BinaryHeap::new(),
            total_hits: 0,
        }
    }

    pub fn with_search_after(num_hits: usize, after: ScoreDoc) -> TopDocsCollector {
        let mut collector = TopDocsCollector::new(num_hits);
        collector.search_after = Some(after);
        collector
    }

    /// Drains the queue into a final, score-then-doc-ordered `TopDocs`.
    /// `total_hits` is always exact in this single-process searcher
    /// (`EqualTo`); the `GreaterThanOrEqualTo` relation exists for
    /// distributed searchers that cap per-shard work, which this crate
    /// does not implement.
    pub fn top_docs(self) -> TopDocs {
        let mut docs: Vec<ScoreDoc> = self
            .heap
            .into_iter()
            .map(|r| ScoreDoc { doc: r.doc, score: r.score })
            .collect();
        docs.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.doc.cmp(&b.doc))
        });
        TopDocs {
            total_hits: TotalHits {
                value: self.total_hits,
                relation: TotalHitsRelation::EqualTo,
            },
            score_docs: docs,
        }
    }
}

impl Collector for TopDocsCollector {
    fn score_mode(&self) -> ScoreMode {
        ScoreMode::TopScores
    }

    fn leaf_collector(&mut self, leaf: &LeafReaderContext) -> Result<Option<Box<dyn LeafCollector + '_>>> {
        Ok(Some(Box::new(TopDocsLeafCollector {
            parent: self,
            doc_base: leaf.doc_base,
        })))
    }
}

struct TopDocsLeafCollector<'a> {
    parent: &'a mut TopDocsCollector,
    doc_base: DocId,
}

impl<'a> LeafCollector for TopDocsLeafCollector<'a> {
    fn collect(&mut self, doc: DocId, scorer: &mut dyn Scorer) -> Result<()> {
        let global_doc = self.doc_base + doc;
        self.parent.total_hits += 1;

        let score = scorer.score()?;
        if !is_finite(score) {
            return Ok(());
        }
        if let Some(after) = &self.parent.search_after {
            if !is_strictly_after(score, global_doc, after) {
                return Ok(());
            }
        }

        if self.parent.num_hits == 0 {
            return Ok(());
        }

        if self.parent.heap.len() < self.parent.num_hits {
            self.parent.heap.push(RankedDoc { doc: global_doc, score });
            if self.parent.heap.len() == self.parent.num_hits {
                if let Some(worst) = self.parent.heap.peek() {
                    scorer.set_min_competitive_score(worst.score)?;
                }
            }
            return Ok(());
        }

        let beats_worst = match self.parent.heap.peek() {
            Some(worst) => score > worst.score || (score == worst.score && global_doc < worst.doc),
            None => true,
        };
        if beats_worst {
            self.parent.heap.pop();
            self.parent.heap.push(RankedDoc { doc: global_doc, score });
            if let Some(new_worst) = self.parent.heap.peek() {
                scorer.set_min_competitive_score(new_worst.score)?;
            }
        }
        Ok(())
    }

    fn min_competitive_score(&self) -> Option<f32> {
        if self.parent.heap.len() < self.parent.num_hits {
            return None;
        }
        self.parent.heap.peek().map(|worst| worst.score)
    }
}

/// Counts matching documents without ranking them. Prefers each leaf's
/// `Weight::count` when available (O(1), no iteration); otherwise falls
/// back to `score_mode() == CompleteNoScores` iteration via a
/// `CountingLeafCollector`.
pub struct TotalHitCountCollector {
    count: i64,
}

impl TotalHitCountCollector {
    pub fn new() -> TotalHitCountCollector {
        TotalHitCountCollector { count: 0 }
    }

    pub fn count(&self) -> i64 {
        self.count
    }

    pub fn add(&mut self, n: i64) {
        self.count += n;
    }
}

impl Default for TotalHitCountCollector {
    fn default() -> Self {
        TotalHitCountCollector::new()
    }
}

impl Collector for TotalHitCountCollector {
    fn score_mode(&self) -> ScoreMode {
        ScoreMode::CompleteNoScores
    }

    fn leaf_collector(&mut self, _leaf: &LeafReaderContext) -> Result<Option<Box<dyn LeafCollector + '_>>> {
        Ok(Some(Box::new(CountingLeafCollector { count: &mut self.count })))
    }
}

struct CountingLeafCollector<'a> {
    count: &'a mut i64,
}

impl<'a> LeafCollector for CountingLeafCollector<'a> {
    fn collect(&mut self, _doc: DocId, _scorer: &mut dyn Scorer) -> Result<()> {
        *self.count += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::search::scorer::MatchAllScorer;
    use crate::core::util::bit_set::{BitsRef, MatchAllBits};
    use std::sync::Arc;

    fn match_all(max_doc: DocId, boost: f32) -> MatchAllScorer {
        let live = Arc::new(MatchAllBits::new(max_doc as usize)) as BitsRef;
        MatchAllScorer::new(max_doc, live, boost)
    }

    #[test]
    fn test_top_docs_keeps_k_best_in_score_order() {
        let mut collector = TopDocsCollector::new(2);
        let leaf_scores = [1.0f32, 3.0, 2.0, 0.5];
        {
            let mut leaf = TopDocsLeafCollector { parent: &mut collector, doc_base: 0 };
            for (doc, &score) in leaf_scores.iter().enumerate() {
                let mut scorer = ConstScorer { doc: doc as DocId, score };
                leaf.collect(doc as DocId, &mut scorer).unwrap();
            }
        }
        let top = collector.top_docs();
        assert_eq!(top.total_hits.value, 4);
        assert_eq!(top.score_docs.len(), 2);
        assert_eq!(top.score_docs[0].doc, 1);
        assert_eq!(top.score_docs[1].doc, 2);
    }

    #[test]
    fn test_search_after_skips_leading_page() {
        let mut collector = TopDocsCollector::with_search_after(10, ScoreDoc { doc: 1, score: 3.0 });
        {
            let mut leaf = TopDocsLeafCollector { parent: &mut collector, doc_base: 0 };
            for (doc, &score) in [3.0f32, 2.0, 1.0].iter().enumerate() {
                let mut scorer = ConstScorer { doc: doc as DocId, score };
                leaf.collect(doc as DocId, &mut scorer).unwrap();
            }
        }
        let top = collector.top_docs();
        assert_eq!(top.total_hits.value, 3);
        assert_eq!(top.score_docs.len(), 2);
        assert_eq!(top.score_docs[0].doc, 1);
        assert_eq!(top.score_docs[1].doc, 2);
    }

    #[test]
    fn test_total_hit_count_collector_counts_every_doc() {
        let mut collector = TotalHitCountCollector::new();
        let mut scorer = match_all(5, 1.0);
        {
            let mut leaf = collector
                .leaf_collector(&leaf_ctx())
                .unwrap()
                .unwrap();
            for doc in 0..5 {
                leaf.collect(doc, &mut scorer).unwrap();
            }
        }
        assert_eq!(collector.count(), 5);
    }

    struct ConstScorer {
        doc: DocId,
        score: f32,
    }
    impl crate::core::search::DocIterator for ConstScorer {
        fn doc_id(&self) -> DocId {
            self.doc
        }
        fn next_doc(&mut self) -> Result<DocId> {
            Ok(self.doc)
        }
        fn advance(&mut self, _target: DocId) -> Result<DocId> {
            Ok(self.doc)
        }
        fn cost(&self) -> i64 {
            1
        }
    }
    impl Scorer for ConstScorer {
        fn score(&mut self) -> Result<f32> {
            Ok(self.score)
        }
    }

    fn leaf_ctx() -> LeafReaderContext {
        use crate::core::index::segment::{SegmentInfo, SegmentReader};
        use crate::core::store::{Directory, IOContext, ReadAdvice, RamDirectory};
        use std::collections::HashMap;

        let dir = RamDirectory::new();
        // A reader with no terms never touches the doc file; point it at
        // an empty one the directory happily creates.
        let out = dir.create_output("_0_0.doc", &IOContext::Write).unwrap();
        drop(out);
        let doc_input = dir
            .open_input("_0_0.doc", &IOContext::Read(ReadAdvice::Normal))
            .unwrap();

        let info = SegmentInfo { name: "_0".to_string(), max_doc: 5, id: [0u8; 16] };
        let reader = SegmentReader::new(info, Arc::new(dir), None, HashMap::new(), doc_input, HashMap::new(), HashMap::new());
        LeafReaderContext { reader: Arc::new(reader), doc_base: 0, ord: 0 }
    }
}
