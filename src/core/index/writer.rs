//! A minimal segment writer used by tests to build real, on-disk (or
//! in-memory, via `RamDirectory`) segment fixtures rather than hand-
//! rolled byte arrays. This is not a flush/merge pipeline: one call
//! writes one finished, immutable segment from a batch of documents
//! supplied up front.

use std::collections::{BTreeMap, HashMap};

use crate::core::index::doc_values::{self};
use crate::core::index::live_docs;
use crate::core::index::norms;
use crate::core::index::postings::{self, TermMeta};
use crate::core::index::segment::{segment_file_name, SegmentInfo};
use crate::core::index::stored_fields::{self, StoredValue};
use crate::core::store::{Directory, IOContext};
use crate::core::util::bit_set::FixedBitSet;
use crate::error::Result;

/// One document to be indexed: whitespace-tokenized text fields plus
/// already-numeric fields (range queries don't need tokenization).
#[derive(Default, Clone)]
pub struct Document {
    pub text_fields: HashMap<String, String>,
    pub numeric_fields: HashMap<String, i64>,
}

impl Document {
    pub fn new() -> Document {
        Document::default()
    }

    pub fn add_text(&mut self, field: &str, value: &str) -> &mut Self {
        self.text_fields.insert(field.to_string(), value.to_string());
        self
    }

    pub fn add_numeric(&mut self, field: &str, value: i64) -> &mut Self {
        self.numeric_fields.insert(field.to_string(), value);
        self
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|t| t.to_lowercase())
        .collect()
}

/// Everything a `SegmentReader` needs beyond the files themselves: the
/// in-memory term-dictionary stand-in and which field numbers own which
/// norms/doc-values file.
pub struct WrittenSegment {
    pub info: SegmentInfo,
    pub terms: HashMap<String, BTreeMap<Vec<u8>, TermMeta>>,
    pub norm_fields: Vec<(String, i32)>,
    pub numeric_dv_fields: Vec<(String, i32)>,
    pub has_live_docs: bool,
}

/// Builds and writes one segment named `segment_name` into `directory`
/// from `documents`. `deleted` marks doc IDs (indices into `documents`)
/// that should come up live=false in the `.liv` file; pass an empty
/// slice to omit the file entirely (every doc live).
pub fn write_segment(
    directory: &dyn Directory,
    segment_name: &str,
    documents: &[Document],
    deleted: &[i32],
) -> Result<WrittenSegment> {
    let max_doc = documents.len() as i32;
    let id = segment_id_for(segment_name);

    let mut text_field_names: Vec<String> = documents
        .iter()
        .flat_map(|d| d.text_fields.keys().cloned())
        .collect();
    text_field_names.sort();
    text_field_names.dedup();

    let mut numeric_field_names: Vec<String> = documents
        .iter()
        .flat_map(|d| d.numeric_fields.keys().cloned())
        .collect();
    numeric_field_names.sort();
    numeric_field_names.dedup();

    // field_number assigns a stable, small integer per field so norms
    // and doc-values files get distinct, deterministic names.
    let mut field_number = 0i32;
    let mut terms: HashMap<String, BTreeMap<Vec<u8>, TermMeta>> = HashMap::new();
    let mut norm_fields = Vec::new();
    let mut stored: Vec<Vec<(i32, StoredValue)>> = vec![Vec::new(); max_doc as usize];

    let mut doc_out =
        directory.create_output(&segment_file_name(segment_name, 0, "doc"), &IOContext::Write)?;

    for field in &text_field_names {
        let mut field_lengths = vec![0i32; max_doc as usize];
        // Per term: doc id -> ascending positions of that term within the doc.
        let mut postings_by_term: BTreeMap<Vec<u8>, BTreeMap<i32, Vec<i32>>> = BTreeMap::new();
        for (doc_id, doc) in documents.iter().enumerate() {
            if let Some(text) = doc.text_fields.get(field) {
                let tokens = tokenize(text);
                field_lengths[doc_id] = tokens.len() as i32;
                for (position, tok) in tokens.into_iter().enumerate() {
                    postings_by_term
                        .entry(tok.into_bytes())
                        .or_insert_with(BTreeMap::new)
                        .entry(doc_id as i32)
                        .or_insert_with(Vec::new)
                        .push(position as i32);
                }
                stored[doc_id].push((field_number, StoredValue::Text(text.clone())));
            }
        }

        let norm_bytes: Vec<u8> = field_lengths.iter().map(|&len| norms::encode_norm(len)).collect();

        let mut field_terms = BTreeMap::new();
        for (term_bytes, postings) in postings_by_term {
            let doc_start_fp = doc_out.file_pointer();
            let total_term_freq: i64 = postings.values().map(|p| p.len() as i64).sum();
            let doc_freq = postings.len() as i32;
            let entries: Vec<postings::PostingEntry> = postings
                .into_iter()
                .map(|(doc, positions)| {
                    let freq = positions.len() as i32;
                    (doc, freq, norm_bytes[doc as usize], positions)
                })
                .collect();
            let impacts = postings::write_postings(doc_out.as_mut(), &entries)?;
            field_terms.insert(
                term_bytes,
                TermMeta {
                    doc_freq,
                    total_term_freq,
                    doc_start_fp,
                    impacts,
                },
            );
        }
        terms.insert(field.clone(), field_terms);

        let norms_file = norms::norms_file_name(segment_name, field_number);
        norms::write_norms(directory, &norms_file, &id, &field_lengths)?;
        norm_fields.push((field.clone(), field_number));
        field_number += 1;
    }

    let mut numeric_dv_fields = Vec::new();
    for field in &numeric_field_names {
        let values: Vec<i64> = documents
            .iter()
            .map(|d| d.numeric_fields.get(field).copied().unwrap_or(0))
            .collect();
        let dv_file = doc_values::doc_values_file_name(segment_name, field_number);
        doc_values::write_numeric_doc_values(directory, &dv_file, &id, &values)?;
        numeric_dv_fields.push((field.clone(), field_number));
        for (doc_id, doc) in documents.iter().enumerate() {
            if let Some(&value) = doc.numeric_fields.get(field) {
                stored[doc_id].push((field_number, StoredValue::Long(value)));
            }
        }
        field_number += 1;
    }

    stored_fields::write_stored_fields(
        directory,
        &stored_fields::stored_fields_data_file_name(segment_name),
        &stored_fields::stored_fields_index_file_name(segment_name),
        &id,
        &stored,
    )?;

    let has_live_docs = !deleted.is_empty();
    if has_live_docs {
        let mut bits = FixedBitSet::all_set(max_doc as usize);
        for &d in deleted {
            bits.clear(d as usize);
        }
        let liv_file = live_docs::live_docs_file_name(segment_name, 1);
        live_docs::write_live_docs(directory, &liv_file, &id, &bits)?;
    }

    Ok(WrittenSegment {
        info: SegmentInfo {
            name: segment_name.to_string(),
            max_doc,
            id,
        },
        terms,
        norm_fields,
        numeric_dv_fields,
        has_live_docs,
    })
}

/// Test fixtures don't need cryptographically random segment ids, just
/// ones that are consistent between the files of a single segment and
/// distinct across segments in the same directory.
fn segment_id_for(segment_name: &str) -> [u8; 16] {
    let mut id = [0u8; 16];
    let bytes = segment_name.as_bytes();
    for (i, slot) in id.iter_mut().enumerate() {
        *slot = bytes.get(i % bytes.len().max(1)).copied().unwrap_or(0) ^ (i as u8);
    }
    id
}
