//! Read/write intent hints passed down to a `Directory` when opening a
//! file. These drive madvise()/mmap-preload decisions; they never change
//! correctness, only how eagerly pages get paged in.

/// Hint about how the returned input will be scanned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadAdvice {
    /// Default OS behavior, no explicit advice given.
    Normal,
    /// Caller will read front-to-back once (e.g. merging, checksumming).
    Sequential,
    /// Caller will seek unpredictably (term dictionary lookups, doc
    /// values random access).
    Random,
    /// Caller will read the file exactly once and never again; skip any
    /// readahead/caching the platform would otherwise do.
    ReadOnce,
}

/// Per-open context threaded through `Directory::open_input` /
/// `create_output`. Mirrors the two shapes a caller actually needs:
/// "I'm reading this" (with an advice hint) or "I'm writing this".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IOContext {
    Read(ReadAdvice),
    Write,
}

impl IOContext {
    pub fn advice(&self) -> ReadAdvice {
        match *self {
            IOContext::Read(advice) => advice,
            IOContext::Write => ReadAdvice::Normal,
        }
    }
}

pub const IO_CONTEXT_DEFAULT: IOContext = IOContext::Read(ReadAdvice::Normal);
pub const IO_CONTEXT_READONCE: IOContext = IOContext::Read(ReadAdvice::ReadOnce);
pub const IO_CONTEXT_RANDOM: IOContext = IOContext::Read(ReadAdvice::Random);
