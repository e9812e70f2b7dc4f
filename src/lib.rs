//! `rucene` is a Lucene-compatible, segment-based full-text search engine
//! core: an immutable inverted index reader plus a query evaluation
//! pipeline (scorer/collector/weight) that produces top-K scored hits.
//!
//! The indexing write path, concrete term-dictionary codec (block-tree/FST)
//! and merge scheduling are external collaborators; this crate consumes
//! their on-disk artifacts and produces search results over them.

#[macro_use]
extern crate error_chain;
#[macro_use]
extern crate log;

pub mod core;
pub mod error;

pub use crate::error::{Error, ErrorKind, Result};
