//! Per-field, per-document length norms (`.nvd`): one byte per document,
//! encoding field length as `127 / sqrt(length)` rounded to the nearest
//! byte so BM25 can recover an approximate length cheaply at scoring
//! time without storing the exact term count.

use crate::core::codec::codec_util;
use crate::core::store::{Directory, IOContext, IndexInput, IndexOutput, IO_CONTEXT_READONCE};
use crate::error::Result;

const NORMS_CODEC: &str = "RuceneNorms";
const NORMS_VERSION_START: i32 = 0;
const NORMS_VERSION_CURRENT: i32 = NORMS_VERSION_START;

/// Encodes a field length into the single-byte norm representation.
/// Lossy by design: only used to approximate, not reconstruct, length.
pub fn encode_norm(length: i32) -> u8 {
    if length <= 0 {
        return 1;
    }
    let value = 127.0 / (length as f32).sqrt();
    value.round().clamp(1.0, 255.0) as u8
}

/// Inverse of `encode_norm`. Byte `0` and byte `127` both map to a
/// length of `1.0` (the encoding saturates at both ends of its range).
/// `encode_norm` stores `127 / sqrt(length)`, so recovering `length`
/// means undoing the square root as well as the division.
pub fn decode_norm(norm: u8) -> f32 {
    if norm == 0 || norm == 127 {
        return 1.0;
    }
    let length = 127.0 / f32::from(norm);
    length * length
}

/// A field's norm bytes for every doc in one segment, read fully into
/// memory — `max_doc` bytes is small next to the postings/doc-values
/// bodies it scores against.
pub struct NormValues {
    bytes: Vec<u8>,
}

impl NormValues {
    pub fn get(&self, doc: i32) -> u8 {
        self.bytes[doc as usize]
    }

    pub fn max_doc(&self) -> i32 {
        self.bytes.len() as i32
    }
}

pub fn norms_file_name(segment_name: &str, field_number: i32) -> String {
    format!("{}_{}.nvd", segment_name, field_number)
}

pub fn read_norms(
    dir: &dyn Directory,
    file_name: &str,
    segment_id: &[u8],
    max_doc: i32,
) -> Result<NormValues> {
    let mut input = dir.open_checksum_input(file_name, &IO_CONTEXT_READONCE)?;
    codec_util::check_index_header(
        input.as_mut(),
        NORMS_CODEC,
        NORMS_VERSION_START,
        NORMS_VERSION_CURRENT,
        segment_id,
        "",
    )?;
    let mut bytes = vec![0u8; max_doc as usize];
    input.as_mut().read_bytes(&mut bytes)?;
    codec_util::check_footer(input.as_mut())?;
    Ok(NormValues { bytes })
}

pub fn write_norms(
    dir: &dyn Directory,
    file_name: &str,
    segment_id: &[u8],
    field_lengths: &[i32],
) -> Result<()> {
    let mut out = dir.create_output(file_name, &IOContext::Write)?;
    codec_util::write_index_header(
        out.as_mut(),
        NORMS_CODEC,
        NORMS_VERSION_CURRENT,
        segment_id,
        "",
    )?;
    let encoded: Vec<u8> = field_lengths.iter().map(|&len| encode_norm(len)).collect();
    out.write_bytes(&encoded)?;
    codec_util::write_footer(out.as_mut())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::RamDirectory;

    #[test]
    fn test_decode_encode_saturate() {
        assert_eq!(decode_norm(0), 1.0);
        assert_eq!(decode_norm(127), 1.0);
        assert_eq!(encode_norm(0), 1);
    }

    #[test]
    fn test_round_trip() {
        let dir = RamDirectory::new();
        let id = [3u8; 16];
        let lengths = vec![1, 10, 50, 200, 1000];
        write_norms(&dir, "_0_2.nvd", &id, &lengths).unwrap();
        let norms = read_norms(&dir, "_0_2.nvd", &id, lengths.len() as i32).unwrap();
        assert_eq!(norms.max_doc(), 5);
        for (doc, &len) in lengths.iter().enumerate() {
            let decoded = decode_norm(norms.get(doc as i32));
            // Lossy: only check we're in the right ballpark.
            assert!((decoded - len as f32).abs() / (len as f32) < 0.15);
        }
    }
}
