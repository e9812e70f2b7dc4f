//! Reads and writes the `.liv` live-docs file: a dense bitset of length
//! `max_doc`, bit=1 meaning the document is live. A segment with no
//! deletions carries no `.liv` file at all; readers treat that as
//! "every document is live" rather than materializing a bitset.

use crate::core::codec::codec_util;
use crate::core::store::{Directory, IOContext, IndexOutput, IO_CONTEXT_READONCE};
use crate::core::util::bit_set::FixedBitSet;
use crate::error::Result;

const LIVE_DOCS_CODEC: &str = "RuceneLiveDocs";
const LIVE_DOCS_VERSION_START: i32 = 0;
const LIVE_DOCS_VERSION_CURRENT: i32 = LIVE_DOCS_VERSION_START;

pub fn live_docs_file_name(segment_name: &str, gen: i64) -> String {
    format!("{}_{}.liv", segment_name, gen)
}

pub fn read_live_docs(
    dir: &dyn Directory,
    file_name: &str,
    segment_id: &[u8],
    max_doc: i32,
) -> Result<FixedBitSet> {
    let mut input = dir.open_checksum_input(file_name, &IO_CONTEXT_READONCE)?;
    codec_util::check_index_header(
        input.as_mut(),
        LIVE_DOCS_CODEC,
        LIVE_DOCS_VERSION_START,
        LIVE_DOCS_VERSION_CURRENT,
        segment_id,
        "",
    )?;
    let num_bits = input.as_mut().read_vint()? as usize;
    let num_words = (num_bits + 63) / 64;
    let mut words = Vec::with_capacity(num_words);
    for _ in 0..num_words {
        words.push(input.as_mut().read_long()? as u64);
    }
    codec_util::check_footer(input.as_mut())?;
    FixedBitSet::from_words(words, num_bits.max(max_doc as usize))
}

pub fn write_live_docs(
    dir: &dyn Directory,
    file_name: &str,
    segment_id: &[u8],
    live_docs: &FixedBitSet,
) -> Result<()> {
    let mut out = dir.create_output(file_name, &IOContext::Write)?;
    codec_util::write_index_header(
        out.as_mut(),
        LIVE_DOCS_CODEC,
        LIVE_DOCS_VERSION_CURRENT,
        segment_id,
        "",
    )?;
    out.write_vint(live_docs.len() as i32)?;
    for &word in live_docs.words() {
        out.write_long(word as i64)?;
    }
    codec_util::write_footer(out.as_mut())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::RamDirectory;

    #[test]
    fn test_round_trip() {
        let dir = RamDirectory::new();
        let id = [7u8; 16];
        let mut bits = FixedBitSet::all_set(200);
        bits.clear(5);
        bits.clear(199);
        write_live_docs(&dir, "_0.liv", &id, &bits).unwrap();
        let read_back = read_live_docs(&dir, "_0.liv", &id, 200).unwrap();
        assert_eq!(read_back.cardinality(), 198);
        assert!(!read_back.get(5).unwrap());
        assert!(!read_back.get(199).unwrap());
        assert!(read_back.get(0).unwrap());
    }
}
