//! An in-memory `Directory`, used by unit tests that want a segment
//! fixture without touching the filesystem or mmap machinery.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crc32fast::Hasher;

use crate::core::store::directory::{
    ChecksumIndexInput, DataInput, DataOutput, Directory, IndexInput, IndexOutput, Lock,
};
use crate::core::store::io_context::IOContext;
use crate::error::{ErrorKind, Result};

#[derive(Default)]
pub struct RamDirectory {
    files: Arc<Mutex<HashMap<String, Arc<Vec<u8>>>>>,
}

impl RamDirectory {
    pub fn new() -> RamDirectory {
        RamDirectory {
            files: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl std::fmt::Display for RamDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "RamDirectory")
    }
}

impl Directory for RamDirectory {
    fn list_all(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.files.lock().unwrap().keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    fn file_length(&self, name: &str) -> Result<i64> {
        self.files
            .lock()
            .unwrap()
            .get(name)
            .map(|b| b.len() as i64)
            .ok_or_else(|| ErrorKind::IllegalState(format!("no such file: {}", name)).into())
    }

    fn open_input(&self, name: &str, _ctx: &IOContext) -> Result<Box<dyn IndexInput>> {
        let bytes = self
            .files
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| ErrorKind::IllegalState(format!("no such file: {}", name)))?;
        Ok(Box::new(RamIndexInput {
            name: name.to_string(),
            bytes,
            base: 0,
            length: 0,
            pos: 0,
        }
        .with_full_length()))
    }

    fn open_checksum_input(
        &self,
        name: &str,
        ctx: &IOContext,
    ) -> Result<Box<dyn ChecksumIndexInput>> {
        let input = self.open_input(name, ctx)?;
        Ok(Box::new(RamChecksumInput::new(input)))
    }

    fn create_output(&self, name: &str, _ctx: &IOContext) -> Result<Box<dyn IndexOutput>> {
        Ok(Box::new(RamIndexOutput {
            name: name.to_string(),
            buf: Vec::new(),
            hasher: Hasher::new(),
            files: Arc::clone(&self.files),
        }))
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
            if !self.files.lock().unwrap().contains_key(&name) {
                return self.create_output(&name, ctx);
            }
            n += 1;
        }
    }

    fn delete_file(&self, name: &str) -> Result<()> {
        self.files.lock().unwrap().remove(name);
        Ok(())
    }

    fn rename(&self, source: &str, dest: &str) -> Result<()> {
        let mut files = self.files.lock().unwrap();
        let bytes = files
            .remove(source)
            .ok_or_else(|| ErrorKind::IllegalState(format!("no such file: {}", source)))?;
        files.insert(dest.to_string(), bytes);
        Ok(())
    }

    fn sync(&self, _names: &[String]) -> Result<()> {
        Ok(())
    }

    fn sync_meta_data(&self) -> Result<()> {
        Ok(())
    }

    fn obtain_lock(&self, _name: &str) -> Result<Box<dyn Lock>> {
        Ok(Box::new(NoopLock))
    }
}

struct NoopLock;

impl Lock for NoopLock {
    fn close(&mut self) -> Result<()> {
        Ok(())
    }

    fn ensure_valid(&self) -> Result<()> {
        Ok(())
    }
}

struct RamIndexInput {
    name: String,
    bytes: Arc<Vec<u8>>,
    base: i64,
    length: i64,
    pos: i64,
}

impl RamIndexInput {
    fn with_full_length(mut self) -> RamIndexInput {
        self.length = self.bytes.len() as i64;
        self
    }

    fn check_eof(&self, needed: i64) -> Result<()> {
        if self.pos + needed > self.length {
            bail!(ErrorKind::EndOfInput(format!(
                "read past end of \"{}\"",
                self.name
            )));
        }
        Ok(())
    }
}

impl DataInput for RamIndexInput {
    fn read_byte(&mut self) -> Result<u8> {
        self.check_eof(1)?;
        let b = self.bytes[(self.base + self.pos) as usize];
        self.pos += 1;
        Ok(b)
    }

    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<()> {
        self.check_eof(buf.len() as i64)?;
        let start = (self.base + self.pos) as usize;
        buf.copy_from_slice(&self.bytes[start..start + buf.len()]);
        self.pos += buf.len() as i64;
        Ok(())
    }
}

impl IndexInput for RamIndexInput {
    fn name(&self) -> &str {
        &self.name
    }

    fn file_pointer(&self) -> i64 {
        self.pos
    }

    fn seek(&mut self, pos: i64) -> Result<()> {
        if pos < 0 || pos > self.length {
            bail!(ErrorKind::IllegalArgument(format!(
                "seek position {} out of range for \"{}\"",
                pos, self.name
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
                "invalid slice of \"{}\"",
                self.name
            )));
        }
        Ok(Box::new(RamIndexInput {
            name: format!("{}({})", description, self.name),
            bytes: Arc::clone(&self.bytes),
            base: self.base + offset,
            length,
            pos: 0,
        }))
    }

    fn clone_instance(&self) -> Result<Box<dyn IndexInput>> {
        Ok(Box::new(RamIndexInput {
            name: self.name.clone(),
            bytes: Arc::clone(&self.bytes),
            base: self.base,
            length: self.length,
            pos: self.pos,
        }))
    }

    fn direct_pointer(&self, len: usize) -> Option<&[u8]> {
        let start = (self.base + self.pos) as usize;
        let end = start + len;
        if end as i64 <= self.base + self.length {
            Some(&self.bytes[start..end])
        } else {
            None
        }
    }
}

struct RamChecksumInput {
    inner: Box<dyn IndexInput>,
    hasher: Hasher,
}

impl RamChecksumInput {
    fn new(inner: Box<dyn IndexInput>) -> RamChecksumInput {
        RamChecksumInput {
            inner,
            hasher: Hasher::new(),
        }
    }
}

impl DataInput for RamChecksumInput {
    fn read_byte(&mut self) -> Result<u8> {
        let b = self.inner.read_byte()?;
        self.hasher.update(&[b]);
        Ok(b)
    }

    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<()> {
        self.inner.read_bytes(buf)?;
        self.hasher.update(buf);
        Ok(())
    }
}

impl IndexInput for RamChecksumInput {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn file_pointer(&self) -> i64 {
        self.inner.file_pointer()
    }

    fn seek(&mut self, pos: i64) -> Result<()> {
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

    fn slice(&self, _d: &str, _o: i64, _l: i64) -> Result<Box<dyn IndexInput>> {
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

impl ChecksumIndexInput for RamChecksumInput {
    fn checksum(&self) -> i64 {
        i64::from(self.hasher.clone().finalize())
    }
}

struct RamIndexOutput {
    name: String,
    buf: Vec<u8>,
    hasher: Hasher,
    files: Arc<Mutex<HashMap<String, Arc<Vec<u8>>>>>,
}

impl DataOutput for RamIndexOutput {
    fn write_byte(&mut self, b: u8) -> Result<()> {
        self.buf.push(b);
        self.hasher.update(&[b]);
        Ok(())
    }

    fn write_bytes(&mut self, buf: &[u8]) -> Result<()> {
        self.buf.extend_from_slice(buf);
        self.hasher.update(buf);
        Ok(())
    }
}

impl IndexOutput for RamIndexOutput {
    fn name(&self) -> &str {
        &self.name
    }

    fn file_pointer(&self) -> i64 {
        self.buf.len() as i64
    }

    fn checksum(&self) -> u32 {
        self.hasher.clone().finalize()
    }
}

impl Drop for RamIndexOutput {
    fn drop(&mut self) {
        self.files
            .lock()
            .unwrap()
            .insert(self.name.clone(), Arc::new(std::mem::take(&mut self.buf)));
    }
}
