//! The query tree: the small, closed set of query types this engine
//! evaluates, each producing its own `Weight` (see
//! [`crate::core::search::weight`]) when bound to a searcher.

use crate::core::index::doc_values::double_to_sortable_long;
use crate::core::index::term::Term;
use crate::core::search::bm25_similarity::Bm25Similarity;
use crate::core::search::searcher::SearchPlan;
use crate::core::search::weight::{
    BooleanWeight, MatchAllWeight, PhraseWeight, RangeBounds, RangeWeight, TermWeight,
};
use crate::core::search::{Query, Weight};
use crate::error::{ErrorKind, Result};

/// How a `BooleanQuery` clause constrains a matching document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Occur {
    Must,
    Should,
    MustNot,
    Filter,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TermQuery {
    pub term: Term,
}

impl TermQuery {
    pub fn new(term: Term) -> TermQuery {
        TermQuery { term }
    }

    pub fn to_query_string(&self) -> String {
        self.term.to_string()
    }
}

impl Query for TermQuery {
    fn create_weight(&self, searcher: &dyn SearchPlan, _needs_scores: bool, boost: f32) -> Result<Box<dyn Weight>> {
        let collection_stats = searcher.collection_statistics(&self.term.field);
        let term_stats = searcher.term_statistics(&self.term);
        let sim_weight = searcher
            .similarity()
            .sim_weight(&self.term.field, &term_stats, &collection_stats, boost);
        Ok(Box::new(TermWeight::new(self.term.clone(), sim_weight)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PhraseQuery {
    pub field: String,
    /// Each term's text and its declared offset relative to the phrase's
    /// start (0, 1, 2, ... for an ordinary phrase; wider gaps for a
    /// phrase built with `add_at`).
    pub terms: Vec<(Vec<u8>, i32)>,
    pub slop: i32,
}

pub struct PhraseQueryBuilder {
    field: String,
    terms: Vec<(Vec<u8>, i32)>,
    next_position: i32,
    slop: i32,
}

impl PhraseQueryBuilder {
    pub fn new(field: impl Into<String>) -> PhraseQueryBuilder {
        PhraseQueryBuilder {
            field: field.into(),
            terms: Vec::new(),
            next_position: 0,
            slop: 0,
        }
    }

    pub fn add(mut self, text: &str) -> PhraseQueryBuilder {
        self.terms.push((text.as_bytes().to_vec(), self.next_position));
        self.next_position += 1;
        self
    }

    pub fn add_at(mut self, text: &str, position: i32) -> PhraseQueryBuilder {
        self.terms.push((text.as_bytes().to_vec(), position));
        self.next_position = position + 1;
        self
    }

    pub fn slop(mut self, slop: i32) -> PhraseQueryBuilder {
        self.slop = slop;
        self
    }

    pub fn build(self) -> Result<PhraseQuery> {
        if self.terms.is_empty() {
            bail!(ErrorKind::IllegalArgument(
                "a phrase query needs at least one term".to_string()
            ));
        }
        Ok(PhraseQuery {
            field: self.field,
            terms: self.terms,
            slop: self.slop,
        })
    }
}

impl Query for PhraseQuery {
    fn create_weight(&self, searcher: &dyn SearchPlan, _needs_scores: bool, boost: f32) -> Result<Box<dyn Weight>> {
        let collection_stats = searcher.collection_statistics(&self.field);
        let sim = searcher.similarity();
        let mut idf_sum = 0.0f32;
        for (bytes, _) in &self.terms {
            let term = Term::new(self.field.clone(), bytes.clone());
            let stats = searcher.term_statistics(&term);
            idf_sum += crate::core::search::bm25_similarity::idf(stats.doc_freq, collection_stats.doc_count);
        }
        let sim_weight = sim.sim_weight_for_idf_sum(&self.field, idf_sum, &collection_stats, boost);
        Ok(Box::new(PhraseWeight::new(
            self.field.clone(),
            self.terms.clone(),
            self.slop,
            sim_weight,
        )))
    }

    fn rewrite(self: Box<Self>, _plan: &dyn SearchPlan) -> Result<Box<dyn Query>> {
        if self.terms.len() == 1 {
            let (bytes, _) = self.terms[0].clone();
            return Ok(Box::new(TermQuery::new(Term::new(self.field.clone(), bytes))));
        }
        Ok(self)
    }
}

/// Boolean clauses own their sub-query outright (a query tree has a
/// single owner), so `BooleanQuery` can't derive `Clone`/`PartialEq`
/// the way leaf queries do — `dyn Query` deliberately isn't a cloneable
/// trait object (see the module-level note on `Query::rewrite`).
#[derive(Debug)]
pub struct BooleanClause {
    pub query: Box<dyn Query>,
    pub occur: Occur,
}

impl BooleanClause {
    pub fn new(query: Box<dyn Query>, occur: Occur) -> BooleanClause {
        BooleanClause { query, occur }
    }
}

#[derive(Debug)]
pub struct BooleanQuery {
    pub clauses: Vec<BooleanClause>,
    pub minimum_should_match: i32,
}

pub struct BooleanQueryBuilder {
    clauses: Vec<BooleanClause>,
    minimum_should_match: i32,
}

impl BooleanQueryBuilder {
    pub fn new() -> BooleanQueryBuilder {
        BooleanQueryBuilder {
            clauses: Vec::new(),
            minimum_should_match: 0,
        }
    }

    pub fn add(mut self, query: Box<dyn Query>, occur: Occur) -> BooleanQueryBuilder {
        self.clauses.push(BooleanClause::new(query, occur));
        self
    }

    pub fn minimum_should_match(mut self, n: i32) -> BooleanQueryBuilder {
        self.minimum_should_match = n;
        self
    }

    pub fn build(self) -> Result<BooleanQuery> {
        if self.clauses.is_empty() {
            bail!(ErrorKind::IllegalArgument(
                "a boolean query needs at least one clause".to_string()
            ));
        }
        Ok(BooleanQuery {
            clauses: self.clauses,
            minimum_should_match: self.minimum_should_match,
        })
    }
}

impl Default for BooleanQueryBuilder {
    fn default() -> Self {
        BooleanQueryBuilder::new()
    }
}

impl Query for BooleanQuery {
    fn create_weight(&self, searcher: &dyn SearchPlan, needs_scores: bool, boost: f32) -> Result<Box<dyn Weight>> {
        let mut must = Vec::new();
        let mut should = Vec::new();
        let mut must_not = Vec::new();
        let mut filter = Vec::new();
        for clause in &self.clauses {
            let weight = clause.query.create_weight(searcher, needs_scores, boost)?;
            match clause.occur {
                Occur::Must => must.push(weight),
                Occur::Should => should.push(weight),
                Occur::MustNot => must_not.push(weight),
                Occur::Filter => filter.push(weight),
            }
        }
        let min_should_match = if must.is_empty() && filter.is_empty() {
            self.minimum_should_match.max(1) as usize
        } else {
            self.minimum_should_match.max(0) as usize
        };
        Ok(Box::new(BooleanWeight::new(
            must,
            should,
            must_not,
            filter,
            min_should_match,
            searcher.config().enable_block_max_wand,
        )))
    }

    fn rewrite(mut self: Box<Self>, plan: &dyn SearchPlan) -> Result<Box<dyn Query>> {
        if self.clauses.len() == 1 && self.minimum_should_match <= 1 {
            let clause = self.clauses.pop().unwrap();
            if matches!(clause.occur, Occur::Must | Occur::Should) {
                return clause.query.rewrite(plan);
            }
            self.clauses.push(clause);
        }
        Ok(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NumericRangeQuery {
    pub field: String,
    pub lower: i64,
    pub upper: i64,
    pub include_lower: bool,
    pub include_upper: bool,
}

impl NumericRangeQuery {
    pub fn new(field: impl Into<String>, lower: i64, upper: i64, include_lower: bool, include_upper: bool) -> Result<NumericRangeQuery> {
        if lower > upper {
            bail!(ErrorKind::IllegalArgument(format!(
                "lower bound {} exceeds upper bound {}",
                lower, upper
            )));
        }
        Ok(NumericRangeQuery {
            field: field.into(),
            lower,
            upper,
            include_lower,
            include_upper,
        })
    }

    pub fn new_exact(field: impl Into<String>, value: i64) -> Result<NumericRangeQuery> {
        NumericRangeQuery::new(field, value, value, true, true)
    }

    pub fn new_at_least(field: impl Into<String>, lower: i64) -> Result<NumericRangeQuery> {
        NumericRangeQuery::new(field, lower, i64::MAX, true, true)
    }

    pub fn new_at_most(field: impl Into<String>, upper: i64) -> Result<NumericRangeQuery> {
        NumericRangeQuery::new(field, i64::MIN, upper, true, true)
    }
}

impl Query for NumericRangeQuery {
    fn create_weight(&self, _searcher: &dyn SearchPlan, _needs_scores: bool, boost: f32) -> Result<Box<dyn Weight>> {
        let bounds = RangeBounds::new(self.lower, self.upper, self.include_lower, self.include_upper);
        Ok(Box::new(RangeWeight::new(self.field.clone(), boost, bounds)))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DoubleRangeQuery {
    pub field: String,
    pub lower: f64,
    pub upper: f64,
    pub include_lower: bool,
    pub include_upper: bool,
}

impl Eq for DoubleRangeQuery {}

impl DoubleRangeQuery {
    pub fn new(field: impl Into<String>, lower: f64, upper: f64, include_lower: bool, include_upper: bool) -> Result<DoubleRangeQuery> {
        if lower.is_nan() || upper.is_nan() {
            bail!(ErrorKind::IllegalArgument("range bounds must not be NaN".to_string()));
        }
        if lower > upper {
            bail!(ErrorKind::IllegalArgument(format!(
                "lower bound {} exceeds upper bound {}",
                lower, upper
            )));
        }
        Ok(DoubleRangeQuery {
            field: field.into(),
            lower,
            upper,
            include_lower,
            include_upper,
        })
    }
}

impl Query for DoubleRangeQuery {
    fn create_weight(&self, _searcher: &dyn SearchPlan, _needs_scores: bool, boost: f32) -> Result<Box<dyn Weight>> {
        // Doubles are stored as sortable longs; translating the bounds
        // once here lets RangeWeight/RangeScorer work in plain i64
        // comparisons regardless of which query type produced them.
        let lower = double_to_sortable_long(self.lower);
        let upper = double_to_sortable_long(self.upper);
        let bounds = RangeBounds::new(lower, upper, self.include_lower, self.include_upper);
        Ok(Box::new(RangeWeight::new(self.field.clone(), boost, bounds)))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct MatchAllDocsQuery;

impl Query for MatchAllDocsQuery {
    fn create_weight(&self, _searcher: &dyn SearchPlan, _needs_scores: bool, boost: f32) -> Result<Box<dyn Weight>> {
        Ok(Box::new(MatchAllWeight::new(boost)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_range_rejects_inverted_bounds() {
        assert!(NumericRangeQuery::new("price", 10, 5, true, true).is_err());
    }

    #[test]
    fn test_double_range_rejects_nan() {
        assert!(DoubleRangeQuery::new("price", f64::NAN, 5.0, true, true).is_err());
    }

    #[test]
    fn test_phrase_builder_tracks_positions() {
        let query = PhraseQueryBuilder::new("body").add("quick").add("fox").build().unwrap();
        assert_eq!(query.terms, vec![(b"quick".to_vec(), 0), (b"fox".to_vec(), 1)]);
    }

    #[test]
    fn test_phrase_builder_rejects_empty() {
        assert!(PhraseQueryBuilder::new("body").build().is_err());
    }

    #[test]
    fn test_boolean_builder_rejects_empty() {
        assert!(BooleanQueryBuilder::new().build().is_err());
    }
}
