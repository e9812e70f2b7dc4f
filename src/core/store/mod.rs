mod directory;
mod io_context;
mod mmap;
mod ram;

pub use self::directory::{
    ChecksumIndexInput, DataInput, DataOutput, Directory, DirectoryRc, IndexInput, IndexOutput,
    Lock,
};
pub use self::io_context::{
    IOContext, ReadAdvice, IO_CONTEXT_DEFAULT, IO_CONTEXT_RANDOM, IO_CONTEXT_READONCE,
};
pub use self::mmap::{MmapDirectory, DEFAULT_CHUNK_BITS_32, DEFAULT_CHUNK_BITS_64};
pub use self::ram::RamDirectory;
