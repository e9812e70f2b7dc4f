//! Directory abstraction: the seam between the segment reader and the
//! concrete byte source (mmap'd file, plain file, or an in-memory
//! fixture used by tests). Everything above this layer reads index data
//! exclusively through `IndexInput`/`DataInput`.

use std::fmt;
use std::sync::Arc;

use crate::core::store::io_context::IOContext;
use crate::error::{ErrorKind, Result};

/// Primitive decode operations shared by every on-disk format: fixed-width
/// big-endian integers and Lucene-style variable-length integers (7 data
/// bits per byte, high bit set while more bytes follow).
pub trait DataInput {
    fn read_byte(&mut self) -> Result<u8>;
    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<()>;

    fn read_int(&mut self) -> Result<i32> {
        let mut buf = [0u8; 4];
        self.read_bytes(&mut buf)?;
        Ok(i32::from_be_bytes(buf))
    }

    fn read_long(&mut self) -> Result<i64> {
        let mut buf = [0u8; 8];
        self.read_bytes(&mut buf)?;
        Ok(i64::from_be_bytes(buf))
    }

    /// Variable-length, unsigned-semantics 32-bit int: 7 bits per byte,
    /// little-endian group order, continuation flagged by the high bit.
    /// At most 5 bytes; a longer run is corruption.
    fn read_vint(&mut self) -> Result<i32> {
        let mut b = self.read_byte()?;
        let mut i = (b & 0x7f) as i32;
        let mut shift = 7;
        while b & 0x80 != 0 {
            if shift > 28 {
                bail!(ErrorKind::CorruptIndex(
                    "vint overflow: too many continuation bytes".to_string()
                ));
            }
            b = self.read_byte()?;
            i |= ((b & 0x7f) as i32) << shift;
            shift += 7;
        }
        Ok(i)
    }

    /// Same encoding as `read_vint` extended to 64 bits, at most 9 bytes.
    fn read_vlong(&mut self) -> Result<i64> {
        let mut b = self.read_byte()?;
        let mut i = (b & 0x7f) as i64;
        let mut shift = 7;
        while b & 0x80 != 0 {
            if shift > 63 {
                bail!(ErrorKind::CorruptIndex(
                    "vlong overflow: too many continuation bytes".to_string()
                ));
            }
            b = self.read_byte()?;
            i |= ((b & 0x7f) as i64) << shift;
            shift += 7;
        }
        Ok(i)
    }

    fn read_string(&mut self) -> Result<String> {
        let len = self.read_vint()? as usize;
        let mut buf = vec![0u8; len];
        self.read_bytes(&mut buf)?;
        String::from_utf8(buf)
            .map_err(|e| ErrorKind::CorruptIndex(format!("invalid utf8 string: {}", e)).into())
    }
}

pub trait DataOutput {
    fn write_byte(&mut self, b: u8) -> Result<()>;
    fn write_bytes(&mut self, buf: &[u8]) -> Result<()>;

    fn write_int(&mut self, i: i32) -> Result<()> {
        self.write_bytes(&i.to_be_bytes())
    }

    fn write_long(&mut self, i: i64) -> Result<()> {
        self.write_bytes(&i.to_be_bytes())
    }

    fn write_vint(&mut self, mut i: i32) -> Result<()> {
        loop {
            if i & !0x7f == 0 {
                self.write_byte(i as u8)?;
                return Ok(());
            }
            self.write_byte(((i & 0x7f) | 0x80) as u8)?;
            i = ((i as u32) >> 7) as i32;
        }
    }

    fn write_vlong(&mut self, mut i: i64) -> Result<()> {
        loop {
            if i & !0x7f == 0 {
                self.write_byte(i as u8)?;
                return Ok(());
            }
            self.write_byte(((i & 0x7f) | 0x80) as u8)?;
            i = ((i as u64) >> 7) as i64;
        }
    }

    fn write_string(&mut self, s: &str) -> Result<()> {
        self.write_vint(s.len() as i32)?;
        self.write_bytes(s.as_bytes())
    }

    fn copy_bytes(&mut self, input: &mut dyn DataInput, num_bytes: usize) -> Result<()> {
        let mut remaining = num_bytes;
        let mut buf = [0u8; 8192];
        while remaining > 0 {
            let chunk = remaining.min(buf.len());
            input.read_bytes(&mut buf[..chunk])?;
            self.write_bytes(&buf[..chunk])?;
            remaining -= chunk;
        }
        Ok(())
    }
}

/// A named, randomly-sliceable, seekable byte source. Segment files are
/// opened once per leaf reader and then sliced per logical sub-stream
/// (e.g. one slice per field's doc values) without re-opening the file.
pub trait IndexInput: DataInput + Send {
    fn name(&self) -> &str;

    /// Absolute position of the next byte `read_*` will consume.
    fn file_pointer(&self) -> i64;

    fn seek(&mut self, pos: i64) -> Result<()>;

    /// Total length of the stream, independent of the current position.
    fn length(&self) -> i64;

    /// A new, independently-positioned input over `[offset, offset+length)`
    /// of this stream's bytes. Implementations must share backing storage
    /// (no copy) since slices are created per-field on every leaf open.
    fn slice(&self, description: &str, offset: i64, length: i64) -> Result<Box<dyn IndexInput>>;

    /// An independent cursor over the same full range as `self`,
    /// positioned at zero.
    fn clone_instance(&self) -> Result<Box<dyn IndexInput>>;

    /// Direct pointer to `len` bytes at the current position without
    /// copying, when the implementation can offer one (mmap inputs can;
    /// a plain buffered file cannot.) Callers fall back to `read_bytes`
    /// when this returns `None`.
    fn direct_pointer(&self, _len: usize) -> Option<&[u8]> {
        None
    }
}

pub trait IndexOutput: DataOutput {
    fn name(&self) -> &str;
    fn file_pointer(&self) -> i64;

    /// Running CRC32 over every byte written so far, used to stamp the
    /// footer on close.
    fn checksum(&self) -> u32;
}

/// An `IndexInput` that also accumulates a running checksum over every
/// byte read, used to validate file footers on open.
pub trait ChecksumIndexInput: IndexInput {
    fn checksum(&self) -> i64;
}

/// An exclusive directory lock (one per segment writer). Readers never
/// take one; only present for interface parity with the write path.
pub trait Lock: Send {
    fn close(&mut self) -> Result<()>;
    fn ensure_valid(&self) -> Result<()>;
}

/// The file-system-like collaborator every reader component talks to.
/// Readers only ever need the `open_input`/`open_checksum_input`/
/// `file_length`/`list_all` read surface; the write methods exist for
/// interface parity with the indexing side and for the test-support
/// writer module.
pub trait Directory: fmt::Display + Send + Sync {
    fn list_all(&self) -> Result<Vec<String>>;
    fn file_length(&self, name: &str) -> Result<i64>;
    fn open_input(&self, name: &str, ctx: &IOContext) -> Result<Box<dyn IndexInput>>;

    fn open_checksum_input(
        &self,
        name: &str,
        ctx: &IOContext,
    ) -> Result<Box<dyn ChecksumIndexInput>>;

    fn create_output(&self, name: &str, ctx: &IOContext) -> Result<Box<dyn IndexOutput>>;

    fn create_temp_output(
        &self,
        prefix: &str,
        suffix: &str,
        ctx: &IOContext,
    ) -> Result<Box<dyn IndexOutput>>;

    fn delete_file(&self, name: &str) -> Result<()>;
    fn rename(&self, source: &str, dest: &str) -> Result<()>;
    fn sync(&self, names: &[String]) -> Result<()>;
    fn sync_meta_data(&self) -> Result<()>;
    fn obtain_lock(&self, name: &str) -> Result<Box<dyn Lock>>;
}

pub type DirectoryRc = Arc<dyn Directory>;

#[cfg(test)]
mod tests {
    use crate::core::store::{DataInput, DataOutput, Directory, IOContext, RamDirectory, ReadAdvice};
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn vint_round_trips_through_a_real_directory(values in prop::collection::vec(any::<u32>(), 0..64)) {
            let dir = RamDirectory::new();
            {
                let mut out = dir.create_output("vint.bin", &IOContext::Write).unwrap();
                for &v in &values {
                    out.write_vint(v as i32).unwrap();
                }
            }
            let mut input = dir.open_input("vint.bin", &IOContext::Read(ReadAdvice::Normal)).unwrap();
            for &v in &values {
                prop_assert_eq!(input.read_vint().unwrap(), v as i32);
            }
        }

        #[test]
        fn vlong_round_trips_through_a_real_directory(values in prop::collection::vec(any::<u64>(), 0..64)) {
            let dir = RamDirectory::new();
            {
                let mut out = dir.create_output("vlong.bin", &IOContext::Write).unwrap();
                for &v in &values {
                    out.write_vlong(v as i64).unwrap();
                }
            }
            let mut input = dir.open_input("vlong.bin", &IOContext::Read(ReadAdvice::Normal)).unwrap();
            for &v in &values {
                prop_assert_eq!(input.read_vlong().unwrap(), v as i64);
            }
        }

        #[test]
        fn string_round_trips_through_a_real_directory(s in "\\PC*") {
            let dir = RamDirectory::new();
            {
                let mut out = dir.create_output("str.bin", &IOContext::Write).unwrap();
                out.write_string(&s).unwrap();
            }
            let mut input = dir.open_input("str.bin", &IOContext::Read(ReadAdvice::Normal)).unwrap();
            prop_assert_eq!(input.read_string().unwrap(), s);
        }
    }
}
