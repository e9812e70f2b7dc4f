//! Per-document numeric values (`.dvd`): one fixed-width `i64` per
//! document for a single field, used by numeric and double range
//! queries. Doubles are stored via a sortable bit transform so range
//! comparisons can be done on the raw integers without decoding.

use crate::core::codec::codec_util;
use crate::core::store::{Directory, IOContext, IndexInput, IndexOutput, IO_CONTEXT_RANDOM};
use crate::error::Result;

const DOC_VALUES_CODEC: &str = "RuceneNumericDocValues";
const DOC_VALUES_VERSION_START: i32 = 0;
const DOC_VALUES_VERSION_CURRENT: i32 = DOC_VALUES_VERSION_START;

/// Maps an `f64` onto an `i64` such that the integer ordering matches
/// the floating point ordering, including across the positive/negative
/// zero and NaN boundaries: flip the sign bit for positives, flip every
/// bit for negatives.
pub fn double_to_sortable_long(value: f64) -> i64 {
    let bits = value.to_bits() as i64;
    if bits < 0 {
        !bits
    } else {
        bits ^ i64::MIN
    }
}

pub fn sortable_long_to_double(bits: i64) -> f64 {
    let bits = if bits < 0 { bits ^ i64::MIN } else { !bits };
    f64::from_bits(bits as u64)
}

/// Random access to one field's per-document numeric value.
pub trait NumericDocValues: Send + Sync {
    fn get(&self, doc: i32) -> Result<i64>;
}

/// A field's values read fully into memory at segment open, the same
/// tradeoff norms makes: `max_doc * 8` bytes is cheap next to postings.
pub struct SegmentNumericDocValues {
    values: Vec<i64>,
}

impl NumericDocValues for SegmentNumericDocValues {
    fn get(&self, doc: i32) -> Result<i64> {
        Ok(self.values[doc as usize])
    }
}

pub fn doc_values_file_name(segment_name: &str, field_number: i32) -> String {
    format!("{}_{}.dvd", segment_name, field_number)
}

pub fn read_numeric_doc_values(
    dir: &dyn Directory,
    file_name: &str,
    segment_id: &[u8],
    max_doc: i32,
) -> Result<SegmentNumericDocValues> {
    let mut input = dir.open_checksum_input(file_name, &IO_CONTEXT_RANDOM)?;
    codec_util::check_index_header(
        input.as_mut(),
        DOC_VALUES_CODEC,
        DOC_VALUES_VERSION_START,
        DOC_VALUES_VERSION_CURRENT,
        segment_id,
        "",
    )?;
    let mut values = Vec::with_capacity(max_doc as usize);
    for _ in 0..max_doc {
        values.push(input.as_mut().read_long()?);
    }
    codec_util::check_footer(input.as_mut())?;
    Ok(SegmentNumericDocValues { values })
}

pub fn write_numeric_doc_values(
    dir: &dyn Directory,
    file_name: &str,
    segment_id: &[u8],
    values: &[i64],
) -> Result<()> {
    let mut out = dir.create_output(file_name, &IOContext::Write)?;
    codec_util::write_index_header(
        out.as_mut(),
        DOC_VALUES_CODEC,
        DOC_VALUES_VERSION_CURRENT,
        segment_id,
        "",
    )?;
    for &v in values {
        out.write_long(v)?;
    }
    codec_util::write_footer(out.as_mut())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::RamDirectory;

    #[test]
    fn test_sortable_double_ordering() {
        let mut values = vec![-5.5, -0.0, 0.0, 1.0, 3.25, f64::MIN, f64::MAX];
        let mut sorted_by_bits = values.clone();
        sorted_by_bits.sort_by_key(|&v| double_to_sortable_long(v));
        values.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(sorted_by_bits, values);
    }

    #[test]
    fn test_sortable_double_round_trip() {
        for v in [0.0, -0.0, 1.5, -1.5, 1e10, -1e10] {
            let bits = double_to_sortable_long(v);
            assert_eq!(sortable_long_to_double(bits), v);
        }
    }

    #[test]
    fn test_numeric_doc_values_round_trip() {
        let dir = RamDirectory::new();
        let id = [9u8; 16];
        let values = vec![10i64, -5, 0, 42, 1000];
        write_numeric_doc_values(&dir, "_0_1.dvd", &id, &values).unwrap();
        let dv = read_numeric_doc_values(&dir, "_0_1.dvd", &id, values.len() as i32).unwrap();
        for (doc, &v) in values.iter().enumerate() {
            assert_eq!(dv.get(doc as i32).unwrap(), v);
        }
    }
}
