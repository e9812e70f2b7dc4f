//! The top-level entry point driving a query end to end: compiles a
//! `Query` into a `Weight` once, then for every leaf asks it for the
//! cheapest evaluation path available (an O(1) count, a bulk scorer, or
//! a plain doc-at-a-time scorer driven through `DefaultBulkScorer`).

use std::collections::HashMap;
use std::sync::RwLock;

use crate::core::index::stored_fields::StoredDocument;
use crate::core::index::term::Term;
use crate::core::index::{CompositeReader, LeafReaderContext};
use crate::core::search::bm25_similarity::Bm25Similarity;
use crate::core::search::bulk_scorer::{BulkScorer, DefaultBulkScorer};
use crate::core::search::collector::{Collector, ScoreDoc, TopDocs, TopDocsCollector, TotalHitCountCollector};
use crate::core::search::statistics::{CollectionStatistics, TermStatistics};
use crate::core::search::{Explanation, Query, Weight};
use crate::core::util::bit_set::Bits;
use crate::core::util::doc_id::DocId;
use crate::error::Result;

/// Options threaded from the searcher down into query evaluation.
/// `enable_block_max_wand` is the one knob a `BooleanQuery` consults when
/// deciding whether it may hand back a `MaxScoreBulkScorer`; this is the
/// natural home for future ones (e.g. a query timeout) without touching
/// every call site.
#[derive(Debug, Clone, Copy)]
pub struct SearcherConfig {
    pub enable_block_max_wand: bool,
}

impl Default for SearcherConfig {
    fn default() -> SearcherConfig {
        SearcherConfig { enable_block_max_wand: true }
    }
}

/// What a `Query` needs from its environment to compile into a `Weight`:
/// collection-wide statistics, the similarity to score with, and the
/// searcher's configuration. A trait rather than a concrete `&Searcher`
/// parameter so `Query` impls don't depend on how (or whether) those
/// statistics are cached.
pub trait SearchPlan {
    fn collection_statistics(&self, field: &str) -> CollectionStatistics;
    fn term_statistics(&self, term: &Term) -> TermStatistics;
    fn similarity(&self) -> Bm25Similarity;
    fn config(&self) -> SearcherConfig;
}

/// Drives search over one immutable, point-in-time view of an index.
/// Collection statistics are cached per field for the lifetime of the
/// searcher: they only depend on the (fixed) set of segments it was
/// opened with, and rebuilding them is a full leaf scan.
pub struct Searcher {
    reader: CompositeReader,
    similarity: Bm25Similarity,
    config: SearcherConfig,
    collection_stats_cache: RwLock<HashMap<String, CollectionStatistics>>,
}

impl Searcher {
    pub fn new(reader: CompositeReader) -> Searcher {
        Searcher::with_config(reader, SearcherConfig::default())
    }

    pub fn with_config(reader: CompositeReader, config: SearcherConfig) -> Searcher {
        Searcher {
            reader,
            similarity: Bm25Similarity::default(),
            config,
            collection_stats_cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn reader(&self) -> &CompositeReader {
        &self.reader
    }

    pub fn max_doc(&self) -> i32 {
        self.reader.max_doc()
    }

    pub fn num_docs(&self) -> i32 {
        self.reader.num_docs()
    }

    /// Repeatedly rewrites `query` until a pass leaves its `Debug`
    /// representation unchanged, or a practical bound is hit. `Query`
    /// doesn't require structural equality (trait objects can't compare
    /// across concrete types), so `Debug` output is the cheapest stable
    /// stand-in for "did this pass change anything".
    fn rewrite(&self, query: Box<dyn Query>) -> Result<Box<dyn Query>> {
        let mut current = query;
        for _ in 0..8 {
            let before = format!("{:?}", current);
            current = current.rewrite(self)?;
            if format!("{:?}", current) == before {
                break;
            }
        }
        Ok(current)
    }

    fn drive_leaf(&self, weight: &dyn Weight, leaf: &LeafReaderContext, collector: &mut dyn Collector) -> Result<()> {
        let mut leaf_collector = match collector.leaf_collector(leaf)? {
            Some(lc) => lc,
            None => return Ok(()),
        };
        let max_doc = leaf.reader.max_doc();
        if let Some(mut bulk) = weight.bulk_scorer(leaf)? {
            bulk.score(&mut *leaf_collector, 0, max_doc)?;
            return Ok(());
        }
        if let Some(scorer) = weight.scorer(leaf)? {
            let mut bulk = DefaultBulkScorer::new(scorer);
            bulk.score(&mut *leaf_collector, 0, max_doc)?;
        }
        Ok(())
    }

    fn search_with_collector(&self, query: Box<dyn Query>, mut collector: TopDocsCollector) -> Result<TopDocs> {
        let query = self.rewrite(query)?;
        let weight = query.create_weight(self, true, 1.0)?;
        for leaf in self.reader.leaves() {
            self.drive_leaf(weight.as_ref(), leaf, &mut collector)?;
        }
        Ok(collector.top_docs())
    }

    pub fn search(&self, query: Box<dyn Query>, num_hits: usize) -> Result<TopDocs> {
        self.search_with_collector(query, TopDocsCollector::new(num_hits))
    }

    pub fn search_after(&self, query: Box<dyn Query>, num_hits: usize, after: ScoreDoc) -> Result<TopDocs> {
        self.search_with_collector(query, TopDocsCollector::with_search_after(num_hits, after))
    }

    /// Counts every matching document without ranking them, taking each
    /// leaf's O(1) `Weight::count` when it's available (e.g. a term query
    /// with no deletions, or `MatchAllDocsQuery`) and only falling back
    /// to full iteration for the leaves that need it.
    pub fn count(&self, query: Box<dyn Query>) -> Result<i64> {
        let query = self.rewrite(query)?;
        let weight = query.create_weight(self, false, 1.0)?;
        let mut collector = TotalHitCountCollector::new();
        for leaf in self.reader.leaves() {
            if let Some(c) = weight.count(leaf)? {
                collector.add(i64::from(c));
                continue;
            }
            self.drive_leaf(weight.as_ref(), leaf, &mut collector)?;
        }
        Ok(collector.count())
    }

    /// Produces a human-readable score breakdown for one global doc ID,
    /// first checking liveness (a deleted document never matches,
    /// regardless of what a `Weight` might otherwise compute for it).
    pub fn explain(&self, query: Box<dyn Query>, doc: DocId) -> Result<Explanation> {
        let query = self.rewrite(query)?;
        let weight = query.create_weight(self, true, 1.0)?;
        for leaf in self.reader.leaves() {
            let max_doc = leaf.reader.max_doc();
            if doc < leaf.doc_base || doc >= leaf.doc_base + max_doc {
                continue;
            }
            let local_doc = doc - leaf.doc_base;
            if !leaf.reader.live_docs().get(local_doc as usize)? {
                return Ok(Explanation::no_match(format!("document {} is deleted", doc)));
            }
            return weight.explain(leaf, local_doc);
        }
        Ok(Explanation::no_match(format!("document {} is out of range", doc)))
    }

    /// Retrieves the original stored field values for one global doc ID,
    /// for display after the collector has already ranked the hit —
    /// never touched during matching or scoring.
    pub fn document(&self, doc: DocId) -> Result<StoredDocument> {
        for leaf in self.reader.leaves() {
            let max_doc = leaf.reader.max_doc();
            if doc < leaf.doc_base || doc >= leaf.doc_base + max_doc {
                continue;
            }
            return leaf.reader.document(doc - leaf.doc_base);
        }
        bail!(crate::error::ErrorKind::IllegalArgument(format!(
            "document {} is out of range",
            doc
        )))
    }
}

impl SearchPlan for Searcher {
    fn collection_statistics(&self, field: &str) -> CollectionStatistics {
        if let Some(stats) = self.collection_stats_cache.read().unwrap().get(field) {
            return *stats;
        }
        let mut doc_count = 0i64;
        let mut sum_total_term_freq = 0i64;
        for leaf in self.reader.leaves() {
            let (leaf_sum, leaf_doc_count) = leaf.reader.field_statistics(field);
            sum_total_term_freq += leaf_sum;
            doc_count += leaf_doc_count;
        }
        let stats = CollectionStatistics::new(doc_count, sum_total_term_freq);
        self.collection_stats_cache.write().unwrap().insert(field.to_string(), stats);
        stats
    }

    fn term_statistics(&self, term: &Term) -> TermStatistics {
        let mut doc_freq = 0i64;
        let mut total_term_freq = 0i64;
        for leaf in self.reader.leaves() {
            doc_freq += i64::from(leaf.reader.doc_freq(term));
            total_term_freq += leaf.reader.total_term_freq(term);
        }
        TermStatistics::new(doc_freq, total_term_freq)
    }

    fn similarity(&self) -> Bm25Similarity {
        self.similarity
    }

    fn config(&self) -> SearcherConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::index::segment::open_segment_reader;
    use crate::core::index::writer::{write_segment, Document};
    use crate::core::search::query::{BooleanQueryBuilder, MatchAllDocsQuery, Occur, TermQuery};
    use crate::core::store::RamDirectory;
    use std::sync::Arc;

    fn text_doc(field: &str, text: &str) -> Document {
        let mut doc = Document::new();
        doc.add_text(field, text);
        doc
    }

    fn searcher_over(documents: Vec<Document>) -> Searcher {
        let dir = RamDirectory::new();
        let written = write_segment(&dir, "_0", &documents, &[]).unwrap();
        let norm_fields: Vec<(&str, i32)> = written.norm_fields.iter().map(|(f, n)| (f.as_str(), *n)).collect();
        let numeric_dv_fields: Vec<(&str, i32)> =
            written.numeric_dv_fields.iter().map(|(f, n)| (f.as_str(), *n)).collect();
        let reader = open_segment_reader(
            written.info,
            Arc::new(dir) as crate::core::store::DirectoryRc,
            written.terms,
            &norm_fields,
            &numeric_dv_fields,
            written.has_live_docs,
        )
        .unwrap();
        Searcher::new(CompositeReader::new(vec![Arc::new(reader)]))
    }

    #[test]
    fn test_search_ranks_term_query_by_bm25() {
        let searcher = searcher_over(vec![
            text_doc("body", "the quick fox"),
            text_doc("body", "the quick quick quick fox"),
        ]);
        let query = Box::new(TermQuery::new(Term::from_text("body", "quick")));
        let top = searcher.search(query, 10).unwrap();
        assert_eq!(top.total_hits.value, 2);
        assert_eq!(top.score_docs.len(), 2);
        assert_eq!(top.score_docs[0].doc, 1);
    }

    #[test]
    fn test_count_uses_o1_path_for_match_all() {
        let searcher = searcher_over(vec![
            text_doc("body", "a"),
            text_doc("body", "b"),
            text_doc("body", "c"),
        ]);
        let count = searcher.count(Box::new(MatchAllDocsQuery)).unwrap();
        assert_eq!(count, 3);
    }

    #[test]
    fn test_boolean_must_and_should_combination() {
        let searcher = searcher_over(vec![
            text_doc("body", "quick fox"),
            text_doc("body", "quick dog"),
            text_doc("body", "slow dog"),
        ]);
        let query = BooleanQueryBuilder::new()
            .add(Box::new(TermQuery::new(Term::from_text("body", "quick"))), Occur::Must)
            .add(Box::new(TermQuery::new(Term::from_text("body", "fox"))), Occur::Should)
            .build()
            .unwrap();
        let top = searcher.search(Box::new(query), 10).unwrap();
        let docs: Vec<DocId> = top.score_docs.iter().map(|d| d.doc).collect();
        assert_eq!(docs, vec![0, 1]);
    }

    #[test]
    fn test_document_retrieves_stored_text() {
        let searcher = searcher_over(vec![text_doc("body", "the quick fox"), text_doc("body", "lazy dog")]);
        let doc = searcher.document(1).unwrap();
        assert_eq!(
            doc.get("body"),
            Some(&crate::core::index::stored_fields::StoredValue::Text("lazy dog".to_string()))
        );
    }

    #[test]
    fn test_explain_reports_no_match_for_absent_term() {
        let searcher = searcher_over(vec![text_doc("body", "a")]);
        let query = Box::new(TermQuery::new(Term::from_text("body", "missing")));
        let explanation = searcher.explain(query, 0).unwrap();
        assert_eq!(explanation.value, 0.0);
    }
}
