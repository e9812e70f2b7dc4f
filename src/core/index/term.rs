/// A field name plus the exact bytes of a single term in that field.
/// Text fields are indexed as UTF-8 bytes; numeric range fields are
/// indexed as big-endian encoded sort keys, so `bytes` is opaque outside
/// the codec that produced it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Term {
    pub field: String,
    pub bytes: Vec<u8>,
}

impl Term {
    pub fn new(field: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Term {
        Term {
            field: field.into(),
            bytes: bytes.into(),
        }
    }

    pub fn from_text(field: impl Into<String>, text: &str) -> Term {
        Term {
            field: field.into(),
            bytes: text.as_bytes().to_vec(),
        }
    }
}

impl std::fmt::Display for Term {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match std::str::from_utf8(&self.bytes) {
            Ok(s) => write!(f, "{}:{}", self.field, s),
            Err(_) => write!(f, "{}:{:?}", self.field, self.bytes),
        }
    }
}
