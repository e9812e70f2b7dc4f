//! Per-term postings: block-encoded (doc, freq, positions) triples plus
//! a coarse impacts skip list used to compute block-max score upper
//! bounds for WAND/MaxScore without decoding every posting.
//!
//! The term dictionary itself (mapping a [`Term`](super::term::Term) to
//! its [`TermMeta`]) is kept as an in-memory sorted map rather than a
//! block-tree/FST structure — this crate consumes the postings and
//! doc-values bodies a real term dictionary would point into, but does
//! not implement the dictionary's own on-disk encoding.

use crate::core::store::{DataInput, DataOutput, IndexInput, IndexOutput};
use crate::core::util::doc_id::{DocId, NO_MORE_DOCS};
use crate::error::Result;

/// Documents are grouped into fixed-size blocks; each block gets one
/// impacts entry, bounding how finely WAND/MaxScore can skip.
pub const BLOCK_SIZE: usize = 128;

/// A coarse, sound (never an underestimate) upper bound on the BM25
/// contribution of any single posting in `[_, doc_id_upper_bound]`:
/// the highest term frequency in that range paired with the most
/// favorable norm byte (the one that decodes to the shortest field
/// length) seen in that range. Individual documents in the range will
/// usually score lower than this bound; that asymmetry is exactly what
/// lets WAND/MaxScore skip non-competitive ranges without visiting them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Impact {
    pub doc_id_upper_bound: DocId,
    pub max_freq: i32,
    pub max_norm_byte: u8,
}

/// Everything the term dictionary stand-in records about one term.
#[derive(Debug, Clone)]
pub struct TermMeta {
    pub doc_freq: i32,
    pub total_term_freq: i64,
    /// Byte offset of this term's postings body within the segment's
    /// shared `.doc` file.
    pub doc_start_fp: i64,
    /// One entry per block, ascending by `doc_id_upper_bound`.
    pub impacts: Vec<Impact>,
}

impl TermMeta {
    /// The maximum score upper bound applicable at or after `target`,
    /// i.e. the widest bound among impact blocks covering `target` or
    /// it never gets smaller than those blocks' ceiling would allow.
    /// Used as the simple (non-shallow-advancing) fallback bound.
    pub fn max_impact_from(&self, target: DocId) -> Option<Impact> {
        self.impacts
            .iter()
            .find(|i| i.doc_id_upper_bound >= target)
            .copied()
    }
}

/// One (doc, freq, positions) posting block as decoded off disk.
/// Positions restart at zero for every document (Lucene semantics); a
/// field indexed without positions stores an empty vector per doc.
struct Block {
    doc_ids: Vec<DocId>,
    freqs: Vec<i32>,
    positions: Vec<Vec<i32>>,
    idx: usize,
}

/// Doc-at-a-time iterator over a single term's postings, positioned by
/// `doc()`/`next_doc()`/`advance()`. Carries no scoring logic — that is
/// layered on top by the search module's `TermScorer`/`PhraseScorer`.
pub struct PostingsEnum {
    input: Box<dyn IndexInput>,
    doc_freq: i32,
    consumed: i32,
    doc: DocId,
    freq: i32,
    block: Option<Block>,
}

impl PostingsEnum {
    pub fn new(mut input: Box<dyn IndexInput>, meta: &TermMeta) -> Result<PostingsEnum> {
        input.seek(meta.doc_start_fp)?;
        Ok(PostingsEnum {
            input,
            doc_freq: meta.doc_freq,
            consumed: 0,
            doc: -1,
            freq: 0,
            block: None,
        })
    }

    pub fn doc(&self) -> DocId {
        self.doc
    }

    pub fn freq(&self) -> i32 {
        self.freq
    }

    /// Absolute term positions within the current document, empty if
    /// this term's postings were written without position information.
    pub fn positions(&self) -> &[i32] {
        match &self.block {
            Some(b) if b.idx > 0 => &b.positions[b.idx - 1],
            _ => &[],
        }
    }

    fn decode_next_block(&mut self) -> Result<()> {
        let remaining = (self.doc_freq - self.consumed) as usize;
        let block_len = remaining.min(BLOCK_SIZE);
        let mut doc_ids = Vec::with_capacity(block_len);
        let mut freqs = Vec::with_capacity(block_len);
        let mut positions = Vec::with_capacity(block_len);
        let mut prev_doc = 0i32;
        for _ in 0..block_len {
            let delta = self.input.read_vint()?;
            prev_doc += delta;
            doc_ids.push(prev_doc);
            let freq = self.input.read_vint()?;
            freqs.push(freq);
            let mut prev_pos = 0i32;
            let mut doc_positions = Vec::with_capacity(freq as usize);
            for _ in 0..freq {
                prev_pos += self.input.read_vint()?;
                doc_positions.push(prev_pos);
            }
            positions.push(doc_positions);
        }
        let _block_max_freq = self.input.read_vint()?;
        self.block = Some(Block {
            doc_ids,
            freqs,
            positions,
            idx: 0,
        });
        Ok(())
    }

    pub fn next_doc(&mut self) -> Result<DocId> {
        if self.consumed >= self.doc_freq {
            self.doc = NO_MORE_DOCS;
            return Ok(NO_MORE_DOCS);
        }
        let needs_block = match &self.block {
            None => true,
            Some(b) => b.idx >= b.doc_ids.len(),
        };
        if needs_block {
            self.decode_next_block()?;
        }
        let block = self.block.as_mut().unwrap();
        self.doc = block.doc_ids[block.idx];
        self.freq = block.freqs[block.idx];
        block.idx += 1;
        self.consumed += 1;
        Ok(self.doc)
    }

    /// Naive linear advance via repeated `next_doc`; correct for any
    /// postings list and fine for test fixtures, but a production reader
    /// would skip whole blocks using the impacts/skip list before
    /// falling back to this for the final block.
    pub fn advance(&mut self, target: DocId) -> Result<DocId> {
        while self.doc < target {
            self.next_doc()?;
        }
        Ok(self.doc)
    }

    pub fn cost(&self) -> i64 {
        i64::from(self.doc_freq)
    }
}

/// One posting to be written: doc id, its term frequency, the norm byte
/// of the field at that document (used to compute this block's impact),
/// and the term's absolute positions within the document (empty if the
/// field isn't indexed with positions).
pub type PostingEntry = (DocId, i32, u8, Vec<i32>);

/// Appends one term's postings body (blocks of vint-delta doc ids, vint
/// freqs and vint-delta positions, each block closed with its own max
/// freq) to `out`, returning the impacts list the term dictionary
/// stand-in should keep alongside the term's `doc_start_fp`.
pub fn write_postings(out: &mut dyn IndexOutput, postings: &[PostingEntry]) -> Result<Vec<Impact>> {
    let mut impacts = Vec::new();
    let mut prev = 0i32;
    for chunk in postings.chunks(BLOCK_SIZE) {
        let mut max_freq = 0;
        let mut max_norm_byte = 0u8;
        for (doc, freq, norm_byte, positions) in chunk {
            out.write_vint(doc - prev)?;
            out.write_vint(*freq)?;
            let mut prev_pos = 0i32;
            for &pos in positions {
                out.write_vint(pos - prev_pos)?;
                prev_pos = pos;
            }
            prev = *doc;
            max_freq = max_freq.max(*freq);
            max_norm_byte = max_norm_byte.max(*norm_byte);
        }
        out.write_vint(max_freq)?;
        impacts.push(Impact {
            doc_id_upper_bound: chunk.last().unwrap().0,
            max_freq,
            max_norm_byte,
        });
    }
    Ok(impacts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::{Directory, RamDirectory, IOContext};

    fn build_fixture(postings: &[PostingEntry]) -> (RamDirectory, TermMeta) {
        let dir = RamDirectory::new();
        let mut out = dir.create_output("_0.doc", &IOContext::Write).unwrap();
        let start_fp = out.file_pointer();
        let impacts = write_postings(out.as_mut(), postings).unwrap();
        drop(out);
        let meta = TermMeta {
            doc_freq: postings.len() as i32,
            total_term_freq: postings.iter().map(|p| i64::from(p.1)).sum(),
            doc_start_fp: start_fp,
            impacts,
        };
        (dir, meta)
    }

    fn entry(doc: DocId, freq: i32, norm: u8) -> PostingEntry {
        (doc, freq, norm, Vec::new())
    }

    #[test]
    fn test_iterate_single_block() {
        let postings = vec![entry(1, 3, 100), entry(5, 1, 90), entry(9, 2, 110)];
        let (dir, meta) = build_fixture(&postings);
        let input = dir.open_input("_0.doc", &IOContext::Read(crate::core::store::ReadAdvice::Normal)).unwrap();
        let mut pe = PostingsEnum::new(input, &meta).unwrap();
        assert_eq!(pe.next_doc().unwrap(), 1);
        assert_eq!(pe.freq(), 3);
        assert_eq!(pe.next_doc().unwrap(), 5);
        assert_eq!(pe.next_doc().unwrap(), 9);
        assert_eq!(pe.freq(), 2);
        assert_eq!(pe.next_doc().unwrap(), NO_MORE_DOCS);
    }

    #[test]
    fn test_advance_skips_forward() {
        let postings: Vec<PostingEntry> = (0..300).map(|i| entry(i * 2, 1, 100)).collect();
        let (dir, meta) = build_fixture(&postings);
        let input = dir.open_input("_0.doc", &IOContext::Read(crate::core::store::ReadAdvice::Normal)).unwrap();
        let mut pe = PostingsEnum::new(input, &meta).unwrap();
        assert_eq!(pe.advance(401).unwrap(), 402);
        assert_eq!(pe.advance(10000).unwrap(), NO_MORE_DOCS);
    }

    #[test]
    fn test_impacts_cover_every_block() {
        let postings: Vec<PostingEntry> = (0..300).map(|i| entry(i, (i % 5) + 1, 100)).collect();
        let (_dir, meta) = build_fixture(&postings);
        assert_eq!(meta.impacts.len(), 3);
        assert_eq!(meta.impacts[0].doc_id_upper_bound, 127);
        assert_eq!(meta.impacts[2].doc_id_upper_bound, 299);
    }

    #[test]
    fn test_positions_round_trip() {
        let postings = vec![
            (1, 2, 100u8, vec![0, 5]),
            (2, 1, 100u8, vec![3]),
            (4, 3, 100u8, vec![0, 1, 9]),
        ];
        let (dir, meta) = build_fixture(&postings);
        let input = dir.open_input("_0.doc", &IOContext::Read(crate::core::store::ReadAdvice::Normal)).unwrap();
        let mut pe = PostingsEnum::new(input, &meta).unwrap();
        assert_eq!(pe.next_doc().unwrap(), 1);
        assert_eq!(pe.positions(), &[0, 5]);
        assert_eq!(pe.next_doc().unwrap(), 2);
        assert_eq!(pe.positions(), &[3]);
        assert_eq!(pe.next_doc().unwrap(), 4);
        assert_eq!(pe.positions(), &[0, 1, 9]);
    }
}
