//! Chunked memory-mapped segment I/O.
//!
//! A segment file is mapped in fixed-size chunks (`1 << chunk_bits` bytes
//! each) rather than as one contiguous mapping. On 32-bit targets a
//! single mapping can't address a multi-gigabyte segment; chunking also
//! bounds how much address space a single slice/clone pins. Every
//! `IndexInput` produced from the same open file shares the same
//! `Arc<Vec<Chunk>>`, so cloning or slicing an input is just an `Arc`
//! bump plus an offset/length pair, never a copy.
//!
//! Reads that stay within one chunk go through a direct pointer into the
//! mapped pages (`direct_pointer`), skipping per-byte virtual dispatch;
//! reads that straddle a chunk boundary fall back to a byte-by-byte copy
//! loop.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crc32fast::Hasher;

use crate::core::store::directory::{
    ChecksumIndexInput, DataInput, DataOutput, Directory, IndexInput, IndexOutput, Lock,
};
use crate::core::store::io_context::{IOContext, ReadAdvice};
use crate::error::{ErrorKind, Result};

/// `1 << 34` = 16 GiB chunks, matching the chunk size Lucene's
/// `MMapDirectory` picks on 64-bit JVMs: large enough that a term
/// dictionary or postings list essentially never straddles a boundary.
pub const DEFAULT_CHUNK_BITS_64: u32 = 34;
/// `1 << 28` = 256 MiB chunks, used when `usize` is 32 bits wide and a
/// single mapping that large would exhaust address space.
pub const DEFAULT_CHUNK_BITS_32: u32 = 28;

#[cfg(target_pointer_width = "64")]
fn default_chunk_bits() -> u32 {
    DEFAULT_CHUNK_BITS_64
}

#[cfg(not(target_pointer_width = "64"))]
fn default_chunk_bits() -> u32 {
    DEFAULT_CHUNK_BITS_32
}

struct Chunk {
    ptr: *const u8,
    len: usize,
}

// The mapping outlives every `MmapIndexInput` that references it (it's
// held behind an `Arc`) and is read-only for the process lifetime of the
// mapping, so sharing `*const u8` across threads is sound.
unsafe impl Send for Chunk {}
unsafe impl Sync for Chunk {}

impl Chunk {
    fn as_slice(&self) -> &[u8] {
        if self.len == 0 {
            &[]
        } else {
            unsafe { std::slice::from_raw_parts(self.ptr, self.len) }
        }
    }
}

impl Drop for Chunk {
    fn drop(&mut self) {
        if self.len == 0 {
            return;
        }
        unsafe {
            platform::unmap(self.ptr, self.len);
        }
    }
}

#[cfg(unix)]
mod platform {
    use super::ErrorKind;
    use crate::error::Result;
    use std::fs::File;
    use std::os::unix::io::AsRawFd;

    pub fn map(file: &File, offset: i64, len: usize, advice: super::ReadAdvice) -> Result<*const u8> {
        if len == 0 {
            return Ok(std::ptr::null());
        }
        let fd = file.as_raw_fd();
        let ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                len,
                libc::PROT_READ,
                libc::MAP_SHARED,
                fd,
                offset as libc::off_t,
            )
        };
        if ptr == libc::MAP_FAILED {
            bail!(ErrorKind::IllegalState(format!(
                "mmap failed for offset={} len={}: {}",
                offset,
                len,
                std::io::Error::last_os_error()
            )));
        }
        apply_advice(ptr, len, advice);
        Ok(ptr as *const u8)
    }

    fn apply_advice(ptr: *mut libc::c_void, len: usize, advice: super::ReadAdvice) {
        let madv = match advice {
            super::ReadAdvice::Normal => libc::POSIX_MADV_NORMAL,
            super::ReadAdvice::Sequential => libc::POSIX_MADV_SEQUENTIAL,
            super::ReadAdvice::Random => libc::POSIX_MADV_RANDOM,
            super::ReadAdvice::ReadOnce => libc::POSIX_MADV_SEQUENTIAL,
        };
        unsafe {
            libc::posix_madvise(ptr, len, madv);
        }
    }

    pub unsafe fn unmap(ptr: *const u8, len: usize) {
        libc::munmap(ptr as *mut libc::c_void, len);
    }
}

#[cfg(windows)]
mod platform {
    use super::ErrorKind;
    use crate::error::Result;
    use std::fs::File;
    use std::os::windows::io::AsRawHandle;
    use std::ptr;
    use winapi::shared::minwindef::DWORD;
    use winapi::um::handleapi::CloseHandle;
    use winapi::um::memoryapi::{CreateFileMappingW, MapViewOfFile, FILE_MAP_READ};
    use winapi::um::winnt::PAGE_READONLY;

    pub fn map(file: &File, offset: i64, len: usize, _advice: super::ReadAdvice) -> Result<*const u8> {
        if len == 0 {
            return Ok(ptr::null());
        }
        let handle = file.as_raw_handle();
        unsafe {
            let high = ((offset + len as i64) >> 32) as DWORD;
            let low = ((offset + len as i64) & 0xFFFF_FFFF) as DWORD;
            let mapping = CreateFileMappingW(handle, ptr::null_mut(), PAGE_READONLY, high, low, ptr::null());
            if mapping.is_null() {
                bail!(ErrorKind::IllegalState(format!(
                    "CreateFileMappingW failed: {}",
                    std::io::Error::last_os_error()
                )));
            }
            let off_high = (offset >> 32) as DWORD;
            let off_low = (offset & 0xFFFF_FFFF) as DWORD;
            let view = MapViewOfFile(mapping, FILE_MAP_READ, off_high, off_low, len);
            CloseHandle(mapping);
            if view.is_null() {
                bail!(ErrorKind::IllegalState(format!(
                    "MapViewOfFile failed: {}",
                    std::io::Error::last_os_error()
                )));
            }
            Ok(view as *const u8)
        }
    }

    pub unsafe fn unmap(ptr: *const u8, _len: usize) {
        winapi::um::memoryapi::UnmapViewOfFile(ptr as winapi::shared::minwindef::LPCVOID);
    }
}

fn map_file(file: &File, file_len: i64, chunk_bits: u32, advice: ReadAdvice) -> Result<Vec<Chunk>> {
    let chunk_size = 1i64 << chunk_bits;
    let num_chunks = if file_len == 0 {
        1
    } else {
        ((file_len + chunk_size - 1) / chunk_size) as usize
    };
    let mut chunks = Vec::with_capacity(num_chunks);
    let mut remaining = file_len;
    let mut offset = 0i64;
    for _ in 0..num_chunks {
        let this_len = remaining.min(chunk_size) as usize;
        let ptr = platform::map(file, offset, this_len, advice)?;
        chunks.push(Chunk { ptr, len: this_len });
        offset += this_len as i64;
        remaining -= this_len as i64;
    }
    Ok(chunks)
}

/// A directory backed by memory-mapped, chunked segment files.
pub struct MmapDirectory {
    root: PathBuf,
    chunk_bits: u32,
}

impl MmapDirectory {
    pub fn new<P: AsRef<Path>>(root: P) -> MmapDirectory {
        MmapDirectory {
            root: root.as_ref().to_path_buf(),
            chunk_bits: default_chunk_bits(),
        }
    }

    pub fn with_chunk_bits<P: AsRef<Path>>(root: P, chunk_bits: u32) -> MmapDirectory {
        MmapDirectory {
            root: root.as_ref().to_path_buf(),
            chunk_bits,
        }
    }

    fn resolve(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

impl std::fmt::Display for MmapDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "MmapDirectory({})", self.root.display())
    }
}

impl Directory for MmapDirectory {
    fn list_all(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    fn file_length(&self, name: &str) -> Result<i64> {
        Ok(std::fs::metadata(self.resolve(name))?.len() as i64)
    }

    fn open_input(&self, name: &str, ctx: &IOContext) -> Result<Box<dyn IndexInput>> {
        let path = self.resolve(name);
        let file = File::open(&path)?;
        let len = file.metadata()?.len() as i64;
        let chunks = map_file(&file, len, self.chunk_bits, ctx.advice())?;
        Ok(Box::new(MmapIndexInput {
            name: name.to_string(),
            chunks: Arc::new(chunks),
            chunk_bits: self.chunk_bits,
            chunk_mask: (1i64 << self.chunk_bits) - 1,
            base_offset: 0,
            length: len,
            pos: 0,
        }))
    }

    fn open_checksum_input(
        &self,
        name: &str,
        ctx: &IOContext,
    ) -> Result<Box<dyn ChecksumIndexInput>> {
        let input = self.open_input(name, ctx)?;
        Ok(Box::new(BufferedChecksumInput::new(input)))
    }

    fn create_output(&self, name: &str, _ctx: &IOContext) -> Result<Box<dyn IndexOutput>> {
        let file = std::fs::File::create(self.resolve(name))?;
        Ok(Box::new(FileIndexOutput::new(name.to_string(), file)))
    }

    fn create_temp_output(
        &self,
        prefix: &str,
        suffix: &str,
        ctx: &IOContext,
    ) -> Result<Box<dyn IndexOutput>> {
        let mut n = 0u32;
        loop {
            let name = format!("{}_{}.{}", prefix, n, suffix);
            let path = self.resolve(&name);
            if !path.exists() {
                return self.create_output(&name, ctx);
            }
            n += 1;
        }
    }

    fn delete_file(&self, name: &str) -> Result<()> {
        std::fs::remove_file(self.resolve(name))?;
        Ok(())
    }

    fn rename(&self, source: &str, dest: &str) -> Result<()> {
        std::fs::rename(self.resolve(source), self.resolve(dest))?;
        Ok(())
    }

    fn sync(&self, names: &[String]) -> Result<()> {
        for name in names {
            File::open(self.resolve(name))?.sync_all()?;
        }
        Ok(())
    }

    fn sync_meta_data(&self) -> Result<()> {
        Ok(())
    }

    fn obtain_lock(&self, name: &str) -> Result<Box<dyn Lock>> {
        let path = self.resolve(&format!("{}.lock", name));
        let file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| ErrorKind::LockObtainFailed(format!("{}: {}", path.display(), e)))?;
        Ok(Box::new(FileLock { path, _file: file }))
    }
}

struct FileLock {
    path: PathBuf,
    _file: File,
}

impl Lock for FileLock {
    fn close(&mut self) -> Result<()> {
        let _ = std::fs::remove_file(&self.path);
        Ok(())
    }

    fn ensure_valid(&self) -> Result<()> {
        if self.path.exists() {
            Ok(())
        } else {
            bail!(ErrorKind::LockObtainFailed(format!(
                "lock file {} was removed out from under us",
                self.path.display()
            )))
        }
    }
}

pub struct MmapIndexInput {
    name: String,
    chunks: Arc<Vec<Chunk>>,
    chunk_bits: u32,
    chunk_mask: i64,
    /// Offset of this view's logical position 0 within the full file.
    base_offset: i64,
    length: i64,
    pos: i64,
}

impl MmapIndexInput {
    fn chunk_and_within(&self, absolute: i64) -> (usize, usize) {
        ((absolute >> self.chunk_bits) as usize, (absolute & self.chunk_mask) as usize)
    }

    fn check_eof(&self, needed: i64) -> Result<()> {
        if self.pos + needed > self.length {
            bail!(ErrorKind::EndOfInput(format!(
                "read past end of \"{}\": pos={} needed={} length={}",
                self.name, self.pos, needed, self.length
            )));
        }
        Ok(())
    }
}

impl DataInput for MmapIndexInput {
    fn read_byte(&mut self) -> Result<u8> {
        self.check_eof(1)?;
        let absolute = self.base_offset + self.pos;
        let (chunk_idx, within) = self.chunk_and_within(absolute);
        let b = self.chunks[chunk_idx].as_slice()[within];
        self.pos += 1;
        Ok(b)
    }

    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<()> {
        self.check_eof(buf.len() as i64)?;
        let mut written = 0;
        while written < buf.len() {
            let absolute = self.base_offset + self.pos;
            let (chunk_idx, within) = self.chunk_and_within(absolute);
            let chunk = self.chunks[chunk_idx].as_slice();
            let avail = chunk.len() - within;
            let n = avail.min(buf.len() - written);
            buf[written..written + n].copy_from_slice(&chunk[within..within + n]);
            written += n;
            self.pos += n as i64;
        }
        Ok(())
    }
}

impl IndexInput for MmapIndexInput {
    fn name(&self) -> &str {
        &self.name
    }

    fn file_pointer(&self) -> i64 {
        self.pos
    }

    fn seek(&mut self, pos: i64) -> Result<()> {
        if pos < 0 || pos > self.length {
            bail!(ErrorKind::IllegalArgument(format!(
                "seek position {} out of range [0, {}] for \"{}\"",
                pos, self.length, self.name
            )));
        }
        self.pos = pos;
        Ok(())
    }

    fn length(&self) -> i64 {
        self.length
    }

    fn slice(&self, description: &str, offset: i64, length: i64) -> Result<Box<dyn IndexInput>> {
        if offset < 0 || length < 0 || offset + length > self.length {
            bail!(ErrorKind::IllegalArgument(format!(
                "invalid slice [{}, {}) of \"{}\" (length {})",
                offset,
                offset + length,
                self.name,
                self.length
            )));
        }
        Ok(Box::new(MmapIndexInput {
            name: format!("{}({})", description, self.name),
            chunks: Arc::clone(&self.chunks),
            chunk_bits: self.chunk_bits,
            chunk_mask: self.chunk_mask,
            base_offset: self.base_offset + offset,
            length,
            pos: 0,
        }))
    }

    fn clone_instance(&self) -> Result<Box<dyn IndexInput>> {
        Ok(Box::new(MmapIndexInput {
            name: self.name.clone(),
            chunks: Arc::clone(&self.chunks),
            chunk_bits: self.chunk_bits,
            chunk_mask: self.chunk_mask,
            base_offset: self.base_offset,
            length: self.length,
            pos: self.pos,
        }))
    }

    fn direct_pointer(&self, len: usize) -> Option<&[u8]> {
        let absolute = self.base_offset + self.pos;
        let (chunk_idx, within) = self.chunk_and_within(absolute);
        let chunk = self.chunks[chunk_idx].as_slice();
        if within + len <= chunk.len() {
            Some(&chunk[within..within + len])
        } else {
            None
        }
    }
}

/// Wraps any `IndexInput` to track a running CRC32 of every byte read,
/// for files opened purely to validate their footer checksum.
struct BufferedChecksumInput {
    inner: Box<dyn IndexInput>,
    hasher: Hasher,
    hashed_up_to: i64,
}

impl BufferedChecksumInput {
    fn new(inner: Box<dyn IndexInput>) -> BufferedChecksumInput {
        BufferedChecksumInput {
            inner,
            hasher: Hasher::new(),
            hashed_up_to: 0,
        }
    }

    fn catch_up_hash(&mut self) -> Result<()> {
        // Only forward, sequential reads are hashed; this input is used
        // exclusively for header/footer validation, which reads
        // front-to-back.
        if self.inner.file_pointer() > self.hashed_up_to {
            bail!(ErrorKind::IllegalState(
                "checksum input read out of order".to_string()
            ));
        }
        Ok(())
    }
}

impl DataInput for BufferedChecksumInput {
    fn read_byte(&mut self) -> Result<u8> {
        let b = self.inner.read_byte()?;
        self.hasher.update(&[b]);
        self.hashed_up_to += 1;
        Ok(b)
    }

    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<()> {
        self.catch_up_hash()?;
        self.inner.read_bytes(buf)?;
        self.hasher.update(buf);
        self.hashed_up_to += buf.len() as i64;
        Ok(())
    }
}

impl IndexInput for BufferedChecksumInput {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn file_pointer(&self) -> i64 {
        self.inner.file_pointer()
    }

    fn seek(&mut self, pos: i64) -> Result<()> {
        // Checksum inputs are read-once, front-to-back; seeking
        // backwards would desync the running hash from the stream.
        if pos < self.inner.file_pointer() {
            bail!(ErrorKind::UnsupportedOperation(
                "cannot seek backwards on a checksum input".to_string()
            ));
        }
        self.inner.seek(pos)
    }

    fn length(&self) -> i64 {
        self.inner.length()
    }

    fn slice(&self, _description: &str, _offset: i64, _length: i64) -> Result<Box<dyn IndexInput>> {
        bail!(ErrorKind::UnsupportedOperation(
            "cannot slice a checksum input".to_string()
        ))
    }

    fn clone_instance(&self) -> Result<Box<dyn IndexInput>> {
        bail!(ErrorKind::UnsupportedOperation(
            "cannot clone a checksum input".to_string()
        ))
    }
}

impl ChecksumIndexInput for BufferedChecksumInput {
    fn checksum(&self) -> i64 {
        i64::from(self.hasher.clone().finalize())
    }
}

struct FileIndexOutput {
    name: String,
    file: std::io::BufWriter<File>,
    hasher: Hasher,
    pos: i64,
}

impl FileIndexOutput {
    fn new(name: String, file: File) -> FileIndexOutput {
        FileIndexOutput {
            name,
            file: std::io::BufWriter::new(file),
            hasher: Hasher::new(),
            pos: 0,
        }
    }
}

impl DataOutput for FileIndexOutput {
    fn write_byte(&mut self, b: u8) -> Result<()> {
        self.write_bytes(&[b])
    }

    fn write_bytes(&mut self, buf: &[u8]) -> Result<()> {
        use std::io::Write;
        self.file.write_all(buf)?;
        self.hasher.update(buf);
        self.pos += buf.len() as i64;
        Ok(())
    }
}

impl IndexOutput for FileIndexOutput {
    fn name(&self) -> &str {
        &self.name
    }

    fn file_pointer(&self) -> i64 {
        self.pos
    }

    fn checksum(&self) -> u32 {
        self.hasher.clone().finalize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::io_context::IO_CONTEXT_RANDOM;

    /// Exercises the real platform mmap path end to end (not `RamDirectory`):
    /// writes with `FileIndexOutput`, forces a chunk boundary well inside
    /// the data with a tiny `chunk_bits`, then reads back across it.
    #[test]
    fn test_reads_span_chunk_boundaries_on_a_real_file() {
        let dir = tempfile::tempdir().unwrap();
        let mmap_dir = MmapDirectory::with_chunk_bits(dir.path(), 6); // 64-byte chunks

        let mut out = mmap_dir.create_output("spanning.bin", &IOContext::Write).unwrap();
        let bytes: Vec<u8> = (0..200u32).map(|i| (i % 256) as u8).collect();
        out.write_bytes(&bytes).unwrap();
        drop(out);

        let mut input = mmap_dir.open_input("spanning.bin", &IO_CONTEXT_RANDOM).unwrap();
        assert_eq!(input.length(), bytes.len() as i64);

        // Read a span that straddles the 64-byte chunk boundary at offset 60.
        input.seek(60).unwrap();
        let mut buf = [0u8; 16];
        input.read_bytes(&mut buf).unwrap();
        assert_eq!(&buf[..], &bytes[60..76]);

        let cloned = input.clone_instance().unwrap();
        assert_eq!(cloned.length(), bytes.len() as i64);

        let slice = input.slice("tail", 190, 10).unwrap();
        assert_eq!(slice.length(), 10);
    }

    #[test]
    fn test_checksum_input_detects_footer_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let mmap_dir = MmapDirectory::new(dir.path());

        let mut out = mmap_dir.create_output("sum.bin", &IOContext::Write).unwrap();
        out.write_bytes(b"some index bytes").unwrap();
        drop(out);

        let mut checksum_input = mmap_dir.open_checksum_input("sum.bin", &IO_CONTEXT_RANDOM).unwrap();
        let mut buf = [0u8; 17];
        checksum_input.read_bytes(&mut buf).unwrap();
        assert_eq!(&buf, b"some index bytes");
        assert!(checksum_input.checksum() != 0);
    }
}
