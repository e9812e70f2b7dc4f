//! Shared header/footer framing for every on-disk file family
//! (postings, doc values, norms, stored fields, live-docs). Every file
//! opens with a codec header identifying its format name, version and
//! owning segment, and closes with a footer carrying a CRC32 checksum of
//! everything before it — corruption anywhere in the file is caught on
//! open rather than surfacing as a wrong search result.

use crate::core::store::{ChecksumIndexInput, DataInput, DataOutput, IndexInput, IndexOutput};
use crate::error::{ErrorKind, Result};

/// Magic number opening every codec header, matching the on-disk format
/// this reader was modeled on.
pub const CODEC_MAGIC: i32 = 0x3fd7_6c17u32 as i32;
/// Magic number opening every footer.
pub const FOOTER_MAGIC: i32 = 0x0567_7a6cu32 as i32;

/// Segment IDs are a fixed 16-byte random token shared by every file of
/// the segment, so files can be cross-checked against each other.
pub const ID_LENGTH: usize = 16;

/// Bytes consumed by `write_footer`: magic (4) + algorithm id (4) +
/// checksum (8).
pub fn footer_length() -> usize {
    16
}

/// Bytes a header with the given codec name and suffix occupies, used to
/// validate a compound/composite file's declared total length up front.
pub fn index_header_length(codec: &str, suffix: &str) -> usize {
    // magic(4) + vint-prefixed codec name + version(4) + id(16) +
    // vint-prefixed suffix.
    4 + vint_len(codec.len() as i32) + codec.len() + 4 + ID_LENGTH + vint_len(suffix.len() as i32)
        + suffix.len()
}

fn vint_len(mut v: i32) -> usize {
    let mut n = 1;
    loop {
        if v & !0x7f == 0 {
            return n;
        }
        v = ((v as u32) >> 7) as i32;
        n += 1;
    }
}

pub fn write_index_header<O: IndexOutput + ?Sized>(
    out: &mut O,
    codec: &str,
    version: i32,
    id: &[u8],
    suffix: &str,
) -> Result<()> {
    if id.len() != ID_LENGTH {
        bail!(ErrorKind::IllegalArgument(format!(
            "segment id must be {} bytes, got {}",
            ID_LENGTH,
            id.len()
        )));
    }
    out.write_int(CODEC_MAGIC)?;
    out.write_string(codec)?;
    out.write_int(version)?;
    out.write_bytes(id)?;
    out.write_string(suffix)
}

/// Reads and validates a header written by `write_index_header`,
/// returning the on-disk version so callers can branch on format
/// evolution (e.g. whether postings carry SIMD-width impacts blocks).
pub fn check_index_header<I: IndexInput + ?Sized>(
    input: &mut I,
    codec: &str,
    min_version: i32,
    max_version: i32,
    expected_id: &[u8],
    expected_suffix: &str,
) -> Result<i32> {
    let magic = input.read_int()?;
    if magic != CODEC_MAGIC {
        bail!(ErrorKind::CorruptIndex(format!(
            "codec header mismatch: expected magic {:#x}, got {:#x}",
            CODEC_MAGIC, magic
        )));
    }
    let actual_codec = input.read_string()?;
    if actual_codec != codec {
        bail!(ErrorKind::CorruptIndex(format!(
            "codec mismatch: expected \"{}\", got \"{}\"",
            codec, actual_codec
        )));
    }
    let version = input.read_int()?;
    if version < min_version || version > max_version {
        bail!(ErrorKind::CorruptIndex(format!(
            "unsupported version {} for codec \"{}\" (supported: {}-{})",
            version, codec, min_version, max_version
        )));
    }
    let mut actual_id = [0u8; ID_LENGTH];
    input.read_bytes(&mut actual_id)?;
    if actual_id != *expected_id {
        bail!(ErrorKind::CorruptIndex(
            "segment id mismatch between this file and the segment it belongs to".to_string()
        ));
    }
    let actual_suffix = input.read_string()?;
    if actual_suffix != expected_suffix {
        bail!(ErrorKind::CorruptIndex(format!(
            "suffix mismatch: expected \"{}\", got \"{}\"",
            expected_suffix, actual_suffix
        )));
    }
    Ok(version)
}

/// Copies a header from `input` to `output` unchanged, verifying its
/// segment id matches what the caller expects as it goes. Used by
/// operations that fold several segment files into one container.
pub fn verify_and_copy_index_header<I: IndexInput + ?Sized, O: IndexOutput + ?Sized>(
    input: &mut I,
    output: &mut O,
    expected_id: &[u8],
) -> Result<()> {
    let magic = input.read_int()?;
    if magic != CODEC_MAGIC {
        bail!(ErrorKind::CorruptIndex("codec header magic mismatch".to_string()));
    }
    output.write_int(magic)?;
    let codec = input.read_string()?;
    output.write_string(&codec)?;
    let version = input.read_int()?;
    output.write_int(version)?;
    let mut id = [0u8; ID_LENGTH];
    input.read_bytes(&mut id)?;
    if id != *expected_id {
        bail!(ErrorKind::CorruptIndex(
            "segment id mismatch while copying index header".to_string()
        ));
    }
    output.write_bytes(&id)?;
    let suffix = input.read_string()?;
    output.write_string(&suffix)
}

pub fn write_footer<O: IndexOutput + ?Sized>(out: &mut O) -> Result<()> {
    let checksum = out.checksum() as i64;
    out.write_int(FOOTER_MAGIC)?;
    out.write_int(0)?;
    out.write_long(checksum)
}

/// Validates and returns the checksum stored in a footer without
/// consuming the rest of the stream; `input` must already be positioned
/// exactly `footer_length()` bytes from the end.
pub fn check_footer<I: ChecksumIndexInput + ?Sized>(input: &mut I) -> Result<i64> {
    let remaining = input.length() - input.file_pointer();
    if remaining != footer_length() as i64 {
        bail!(ErrorKind::CorruptIndex(format!(
            "expected footer at this position but {} bytes remain",
            remaining
        )));
    }
    let computed = input.checksum();
    let magic = input.read_int()?;
    if magic != FOOTER_MAGIC {
        bail!(ErrorKind::CorruptIndex("footer magic mismatch".to_string()));
    }
    let algorithm_id = input.read_int()?;
    if algorithm_id != 0 {
        bail!(ErrorKind::CorruptIndex(format!(
            "unknown checksum algorithm id {}",
            algorithm_id
        )));
    }
    let expected = input.read_long()?;
    if expected != computed as i64 {
        bail!(ErrorKind::CorruptIndex(format!(
            "checksum mismatch: file says {:#x}, computed {:#x}",
            expected, computed
        )));
    }
    Ok(expected)
}

/// Reads (and discards) a footer's checksum field without validating it
/// against a running computation, used when the caller already verified
/// the whole-file checksum via `check_footer` and only wants the value.
pub fn retrieve_checksum<I: IndexInput + ?Sized>(input: &mut I) -> Result<i64> {
    let footer_start = input.length() - footer_length() as i64;
    if footer_start < 0 {
        bail!(ErrorKind::CorruptIndex(
            "file too short to contain a footer".to_string()
        ));
    }
    input.seek(footer_start)?;
    let magic = input.read_int()?;
    if magic != FOOTER_MAGIC {
        bail!(ErrorKind::CorruptIndex("footer magic mismatch".to_string()));
    }
    let _algorithm_id = input.read_int()?;
    input.read_long()
}
