//! Stored fields (`_N.fdt`/`_N.fdx`): the original field values handed to
//! the writer, recoverable per-document for display — never consulted by
//! the scorer, which only ever reads postings/doc-values/norms.
//!
//! `.fdt` holds one variable-length record per document: a field count
//! followed by `(fieldNumber, typeCode, value)` triples. `.fdx` is the
//! seek table into it: one `VLong` byte offset per document.

use std::collections::HashMap;

use crate::core::codec::codec_util;
use crate::core::store::{Directory, IOContext, IndexInput, IO_CONTEXT_READONCE};
use crate::error::{ErrorKind, Result};

const STORED_FIELDS_CODEC: &str = "DiagonStoredFields";
const STORED_FIELDS_VERSION_START: i32 = 1;
const STORED_FIELDS_VERSION_CURRENT: i32 = STORED_FIELDS_VERSION_START;

const STORED_FIELDS_INDEX_CODEC: &str = "DiagonStoredFieldsIndex";

const TYPE_STRING: u8 = 0;
const TYPE_INT: u8 = 1;
const TYPE_LONG: u8 = 2;

#[derive(Debug, Clone, PartialEq)]
pub enum StoredValue {
    Text(String),
    Int(i32),
    Long(i64),
}

/// The stored fields of one document, in the order they were written.
#[derive(Debug, Clone, Default)]
pub struct StoredDocument {
    pub fields: Vec<(String, StoredValue)>,
}

impl StoredDocument {
    pub fn get(&self, name: &str) -> Option<&StoredValue> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }
}

pub fn stored_fields_data_file_name(segment_name: &str) -> String {
    format!("{}.fdt", segment_name)
}

pub fn stored_fields_index_file_name(segment_name: &str) -> String {
    format!("{}.fdx", segment_name)
}

/// Writes one `.fdt`/`.fdx` pair. `documents[doc]` lists exactly the
/// `(fieldNumber, value)` pairs present on that document — fields the
/// document doesn't carry are simply absent from its record.
pub fn write_stored_fields(
    dir: &dyn Directory,
    data_file: &str,
    index_file: &str,
    segment_id: &[u8],
    documents: &[Vec<(i32, StoredValue)>],
) -> Result<()> {
    let mut data_out = dir.create_output(data_file, &IOContext::Write)?;
    codec_util::write_index_header(
        data_out.as_mut(),
        STORED_FIELDS_CODEC,
        STORED_FIELDS_VERSION_CURRENT,
        segment_id,
        "",
    )?;

    let mut offsets = Vec::with_capacity(documents.len());
    for doc_fields in documents {
        offsets.push(data_out.file_pointer());
        data_out.write_vint(doc_fields.len() as i32)?;
        for (field_number, value) in doc_fields {
            data_out.write_vint(*field_number)?;
            match value {
                StoredValue::Text(s) => {
                    data_out.write_byte(TYPE_STRING)?;
                    data_out.write_string(s)?;
                }
                StoredValue::Int(v) => {
                    data_out.write_byte(TYPE_INT)?;
                    data_out.write_int(*v)?;
                }
                StoredValue::Long(v) => {
                    data_out.write_byte(TYPE_LONG)?;
                    data_out.write_long(*v)?;
                }
            }
        }
    }
    codec_util::write_footer(data_out.as_mut())?;
    drop(data_out);

    let mut index_out = dir.create_output(index_file, &IOContext::Write)?;
    codec_util::write_index_header(
        index_out.as_mut(),
        STORED_FIELDS_INDEX_CODEC,
        STORED_FIELDS_VERSION_CURRENT,
        segment_id,
        "",
    )?;
    index_out.write_vint(offsets.len() as i32)?;
    for offset in &offsets {
        index_out.write_vlong(*offset)?;
    }
    codec_util::write_footer(index_out.as_mut())
}

/// An open `.fdt`/`.fdx` pair: the offset table is small (one `i64` per
/// doc) and read fully into memory; the data file stays seek-and-clone
/// for random per-document access.
pub struct StoredFieldsReader {
    data: Box<dyn IndexInput>,
    offsets: Vec<i64>,
    field_names: HashMap<i32, String>,
}

impl StoredFieldsReader {
    pub fn document(&self, doc: i32) -> Result<StoredDocument> {
        let offset = *self.offsets.get(doc as usize).ok_or_else(|| {
            ErrorKind::IllegalArgument(format!("doc {} is out of range for stored fields", doc))
        })?;
        let mut input = self.data.clone_instance()?;
        input.seek(offset)?;
        let field_count = input.read_vint()?;
        let mut fields = Vec::with_capacity(field_count as usize);
        for _ in 0..field_count {
            let field_number = input.read_vint()?;
            let type_code = input.read_byte()?;
            let value = match type_code {
                TYPE_STRING => StoredValue::Text(input.read_string()?),
                TYPE_INT => StoredValue::Int(input.read_int()?),
                TYPE_LONG => StoredValue::Long(input.read_long()?),
                other => bail!(ErrorKind::CorruptIndex(format!(
                    "unknown stored field type code {}",
                    other
                ))),
            };
            let name = self
                .field_names
                .get(&field_number)
                .cloned()
                .unwrap_or_else(|| field_number.to_string());
            fields.push((name, value));
        }
        Ok(StoredDocument { fields })
    }
}

pub fn open_stored_fields(
    dir: &dyn Directory,
    data_file: &str,
    index_file: &str,
    segment_id: &[u8],
    max_doc: i32,
    field_names: HashMap<i32, String>,
) -> Result<StoredFieldsReader> {
    let data = dir.open_input(data_file, &IO_CONTEXT_READONCE)?;

    let mut index_input = dir.open_checksum_input(index_file, &IO_CONTEXT_READONCE)?;
    codec_util::check_index_header(
        index_input.as_mut(),
        STORED_FIELDS_INDEX_CODEC,
        STORED_FIELDS_VERSION_START,
        STORED_FIELDS_VERSION_CURRENT,
        segment_id,
        "",
    )?;
    let num_docs = index_input.as_mut().read_vint()?;
    if num_docs != max_doc {
        bail!(ErrorKind::CorruptIndex(format!(
            "stored fields index declares {} docs but segment has {}",
            num_docs, max_doc
        )));
    }
    let mut offsets = Vec::with_capacity(num_docs as usize);
    for _ in 0..num_docs {
        offsets.push(index_input.as_mut().read_vlong()?);
    }
    codec_util::check_footer(index_input.as_mut())?;

    Ok(StoredFieldsReader { data, offsets, field_names })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::RamDirectory;

    #[test]
    fn test_round_trip_mixed_types() {
        let dir = RamDirectory::new();
        let id = [9u8; 16];
        let documents = vec![
            vec![(0, StoredValue::Text("the quick fox".to_string())), (1, StoredValue::Long(42))],
            vec![(0, StoredValue::Text("lazy dog".to_string()))],
        ];
        write_stored_fields(&dir, "_0.fdt", "_0.fdx", &id, &documents).unwrap();

        let mut field_names = HashMap::new();
        field_names.insert(0, "body".to_string());
        field_names.insert(1, "views".to_string());
        let reader = open_stored_fields(&dir, "_0.fdt", "_0.fdx", &id, 2, field_names).unwrap();

        let doc0 = reader.document(0).unwrap();
        assert_eq!(doc0.get("body"), Some(&StoredValue::Text("the quick fox".to_string())));
        assert_eq!(doc0.get("views"), Some(&StoredValue::Long(42)));

        let doc1 = reader.document(1).unwrap();
        assert_eq!(doc1.get("body"), Some(&StoredValue::Text("lazy dog".to_string())));
        assert_eq!(doc1.get("views"), None);
    }
}
