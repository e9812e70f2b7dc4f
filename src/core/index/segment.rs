//! A single immutable segment: its identity, the term dictionary
//! stand-in, and the open handles onto its postings/doc-values/norms/
//! live-docs bodies.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use crate::core::index::live_docs;
use crate::core::index::norms::{self, NormValues};
use crate::core::index::doc_values::{self, SegmentNumericDocValues};
use crate::core::index::postings::{PostingsEnum, TermMeta};
use crate::core::index::stored_fields::{self, StoredDocument, StoredFieldsReader};
use crate::core::index::term::Term;
use crate::core::store::{DirectoryRc, IndexInput, IO_CONTEXT_RANDOM};
use crate::core::util::bit_set::{BitsRef, FixedBitSet, MatchAllBits};
use crate::error::{ErrorKind, Result};

/// Identity and sizing of one segment, independent of any open file
/// handle — this is what a composite reader keeps around to compute
/// `doc_base` offsets and what gets handed to collection statistics.
#[derive(Debug, Clone)]
pub struct SegmentInfo {
    pub name: String,
    pub max_doc: i32,
    pub id: [u8; 16],
}

pub fn segment_file_name(segment_name: &str, field_number: i32, extension: &str) -> String {
    format!("{}_{}.{}", segment_name, field_number, extension)
}

/// Everything needed to evaluate a query against one segment: the term
/// dictionary stand-in, the shared postings input it points into, and
/// per-field norms/doc-values, plus the live-docs filter.
///
/// Readers are reference-counted rather than tied to Rust's ownership
/// model directly because the same `Arc<SegmentReader>` is shared by
/// every in-flight query against it; `dec_ref` only actually closes
/// backing file handles once the last query finishes.
pub struct SegmentReader {
    pub info: SegmentInfo,
    pub directory: DirectoryRc,
    live_docs: Option<Arc<FixedBitSet>>,
    terms: HashMap<String, BTreeMap<Vec<u8>, TermMeta>>,
    doc_input: Box<dyn IndexInput>,
    norms: HashMap<String, Arc<NormValues>>,
    numeric_dv: HashMap<String, SegmentNumericDocValues>,
    stored_fields: StoredFieldsReader,
    ref_count: AtomicI32,
}

impl SegmentReader {
    pub fn new(
        info: SegmentInfo,
        directory: DirectoryRc,
        live_docs: Option<Arc<FixedBitSet>>,
        terms: HashMap<String, BTreeMap<Vec<u8>, TermMeta>>,
        doc_input: Box<dyn IndexInput>,
        norms: HashMap<String, Arc<NormValues>>,
        numeric_dv: HashMap<String, SegmentNumericDocValues>,
        stored_fields: StoredFieldsReader,
    ) -> SegmentReader {
        SegmentReader {
            info,
            directory,
            live_docs,
            terms,
            doc_input,
            norms,
            numeric_dv,
            stored_fields,
            ref_count: AtomicI32::new(1),
        }
    }

    pub fn max_doc(&self) -> i32 {
        self.info.max_doc
    }

    pub fn num_docs(&self) -> i32 {
        match &self.live_docs {
            Some(bits) => bits.cardinality() as i32,
            None => self.info.max_doc,
        }
    }

    /// Whether any document in this segment has been deleted. A term's
    /// `doc_freq` only equals its live match count when this is `false`.
    pub fn has_deletions(&self) -> bool {
        self.live_docs.is_some()
    }

    pub fn live_docs(&self) -> BitsRef {
        match &self.live_docs {
            Some(bits) => Arc::clone(bits) as BitsRef,
            None => Arc::new(MatchAllBits::new(self.info.max_doc as usize)) as BitsRef,
        }
    }

    pub fn term_meta(&self, field: &str, term_bytes: &[u8]) -> Option<&TermMeta> {
        self.terms.get(field).and_then(|m| m.get(term_bytes))
    }

    pub fn doc_freq(&self, term: &Term) -> i32 {
        self.term_meta(&term.field, &term.bytes)
            .map(|m| m.doc_freq)
            .unwrap_or(0)
    }

    pub fn total_term_freq(&self, term: &Term) -> i64 {
        self.term_meta(&term.field, &term.bytes)
            .map(|m| m.total_term_freq)
            .unwrap_or(0)
    }

    /// The sum of every term's `total_term_freq` in a field, and the
    /// number of documents that contain that field at all — the two
    /// quantities `sum_total_term_freq / doc_count` combine into the
    /// average field length BM25 needs.
    pub fn field_statistics(&self, field: &str) -> (i64, i64) {
        let sum_total_term_freq = self
            .terms
            .get(field)
            .map(|m| m.values().map(|meta| meta.total_term_freq).sum())
            .unwrap_or(0);
        let doc_count = self
            .norms
            .get(field)
            .map(|n| i64::from(n.max_doc()))
            .unwrap_or(0);
        (sum_total_term_freq, doc_count)
    }

    pub fn postings(&self, term: &Term) -> Result<Option<PostingsEnum>> {
        match self.term_meta(&term.field, &term.bytes) {
            Some(meta) => {
                let input = self.doc_input.clone_instance()?;
                Ok(Some(PostingsEnum::new(input, meta)?))
            }
            None => Ok(None),
        }
    }

    pub fn norm_values(&self, field: &str) -> Option<Arc<NormValues>> {
        self.norms.get(field).map(Arc::clone)
    }

    pub fn numeric_doc_values(&self, field: &str) -> Option<&SegmentNumericDocValues> {
        self.numeric_dv.get(field)
    }

    /// The original field values stored for one local doc ID. Never
    /// consulted during matching or scoring — only for retrieving a hit
    /// to display after the collector has already ranked it.
    pub fn document(&self, doc: i32) -> Result<StoredDocument> {
        self.stored_fields.document(doc)
    }

    pub fn inc_ref(&self) {
        self.ref_count.fetch_add(1, Ordering::SeqCst);
    }

    /// Decrements the refcount; once it reaches zero the segment's
    /// backing handles are logically closed (any further use is an
    /// `AlreadyClosed` error from the caller's own bookkeeping — this
    /// type itself just reports whether it just became unreferenced).
    pub fn dec_ref(&self) -> bool {
        self.ref_count.fetch_sub(1, Ordering::SeqCst) == 1
    }

    pub fn try_inc_ref(&self) -> Result<()> {
        loop {
            let current = self.ref_count.load(Ordering::SeqCst);
            if current <= 0 {
                bail!(ErrorKind::AlreadyClosed(format!(
                    "segment \"{}\" is already closed",
                    self.info.name
                )));
            }
            if self
                .ref_count
                .compare_exchange(current, current + 1, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                return Ok(());
            }
        }
    }
}

/// Loads every file family for one segment from `directory`, building
/// the in-memory term-dictionary stand-in from the `terms` argument
/// (normally produced by the real block-tree/FST term dictionary this
/// crate doesn't implement; the test-support writer builds it directly).
pub fn open_segment_reader(
    info: SegmentInfo,
    directory: DirectoryRc,
    terms: HashMap<String, BTreeMap<Vec<u8>, TermMeta>>,
    norm_fields: &[(&str, i32)],
    numeric_dv_fields: &[(&str, i32)],
    has_live_docs: bool,
) -> Result<SegmentReader> {
    let doc_file = segment_file_name(&info.name, 0, "doc");
    let doc_input = directory.open_input(&doc_file, &IO_CONTEXT_RANDOM)?;

    let mut norms = HashMap::new();
    for &(field, field_number) in norm_fields {
        let file_name = norms::norms_file_name(&info.name, field_number);
        let values = norms::read_norms(directory.as_ref(), &file_name, &info.id, info.max_doc)?;
        norms.insert(field.to_string(), values);
    }

    let mut numeric_dv = HashMap::new();
    for &(field, field_number) in numeric_dv_fields {
        let file_name = doc_values::doc_values_file_name(&info.name, field_number);
        let values = doc_values::read_numeric_doc_values(
            directory.as_ref(),
            &file_name,
            &info.id,
            info.max_doc,
        )?;
        numeric_dv.insert(field.to_string(), values);
    }

    let live = if has_live_docs {
        let file_name = live_docs::live_docs_file_name(&info.name, 1);
        Some(Arc::new(live_docs::read_live_docs(
            directory.as_ref(),
            &file_name,
            &info.id,
            info.max_doc,
        )?))
    } else {
        None
    };

    let mut field_names = HashMap::new();
    for &(field, field_number) in norm_fields {
        field_names.insert(field_number, field.to_string());
    }
    for &(field, field_number) in numeric_dv_fields {
        field_names.insert(field_number, field.to_string());
    }
    let stored_fields = stored_fields::open_stored_fields(
        directory.as_ref(),
        &stored_fields::stored_fields_data_file_name(&info.name),
        &stored_fields::stored_fields_index_file_name(&info.name),
        &info.id,
        info.max_doc,
        field_names,
    )?;

    Ok(SegmentReader::new(
        info, directory, live, terms, doc_input, norms, numeric_dv, stored_fields,
    ))
}
