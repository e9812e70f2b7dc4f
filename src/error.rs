//! Crate-wide error taxonomy.
//!
//! Every fallible operation in the search core returns this `Result`. The
//! `ErrorKind` variants line up one-to-one with the failure taxonomy: I/O,
//! on-disk format corruption, use-after-close, directory lock contention,
//! bad caller input, and unsupported platform capabilities. Iterator
//! exhaustion is never an error here — it is the `NO_MORE_DOCS` sentinel.

use std::io;

error_chain! {
    types {
        Error, ErrorKind, ResultExt, Result;
    }

    foreign_links {
        Io(io::Error);
    }

    errors {
        /// File not found, not a regular file, read past end, mapping
        /// failure, rename/sync failure.
        IllegalState(desc: String) {
            description("illegal state")
            display("illegal state: {}", desc)
        }

        /// Magic mismatch, unsupported version, malformed VInt (too many
        /// continuation bytes), inconsistent declared vs actual sizes,
        /// live-docs length mismatch.
        CorruptIndex(desc: String) {
            description("corrupt index")
            display("corrupt index: {}", desc)
        }

        /// Operation on a reader/directory whose refcount reached zero or
        /// whose close has been called.
        AlreadyClosed(desc: String) {
            description("already closed")
            display("already closed: {}", desc)
        }

        /// Cannot acquire the write lock (exclusive directory lock).
        LockObtainFailed(desc: String) {
            description("lock obtain failed")
            display("lock obtain failed: {}", desc)
        }

        /// Range query with lower > upper, NaN bound for doubles,
        /// numHits <= 0, posting iterator fed a negative seek position.
        IllegalArgument(desc: String) {
            description("illegal argument")
            display("illegal argument: {}", desc)
        }

        /// Memory mapping attempted on a platform without it, with
        /// fallback disabled; or an operation a read-only directory does
        /// not implement.
        UnsupportedOperation(desc: String) {
            description("unsupported operation")
            display("unsupported operation: {}", desc)
        }

        /// End of a segment input reached before the requested bytes could
        /// be read.
        EndOfInput(desc: String) {
            description("end of input")
            display("end of input: {}", desc)
        }

        /// A collector-driven early-termination signal; see [`collector`].
        /// These are control flow, not user-visible failures — the
        /// searcher unwinds one leaf (or the whole search) and returns
        /// `Ok`.
        Collector(kind: collector::ErrorKind) {
            description("collection terminated early")
            display("collection terminated early: {:?}", kind)
        }
    }
}

/// Non-fatal signals a [`Collector`](crate::core::search::collector::Collector)
/// uses to unwind out of a scorer's iteration loop early. The searcher
/// treats both as successful completion of that leaf (or the whole
/// search), never as a user-visible error.
pub mod collector {
    /// Which scope an early-termination signal unwinds.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum ErrorKind {
        /// Stop visiting any further leaves; the search is done.
        CollectionTerminated,
        /// Stop visiting the current leaf, but continue with the next one.
        LeafCollectionTerminated,
    }
}
