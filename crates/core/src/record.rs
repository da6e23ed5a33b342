//! Line-delimited record reading, decoding and writing.

use std::io::{self, BufRead, LineWriter, Write};

use serde_json::{Map, Value};
use thiserror::Error;

use crate::turn::{RoleVocabulary, Turn};

/// Why a line could not be read as a record.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("line is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("JSON value is not an object")]
    NotAnObject,
}

/// A line that is written back exactly as it was read.
#[derive(Debug, Error)]
pub enum PassThrough {
    #[error("blank line")]
    Blank,
    #[error("not a record: {0}")]
    Unparseable(#[from] DocumentError),
    #[error("record has no conversation")]
    NoConversation,
    #[error("conversation field is not a list")]
    NotAList,
    #[error("turn {position} has no role")]
    UnattributedTurn { position: usize },
}

impl PassThrough {
    /// Whether the pass-through should be surfaced as a warning.
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            PassThrough::Unparseable(_) | PassThrough::UnattributedTurn { .. }
        )
    }
}

/// One physical input line, terminator included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLine {
    /// 1-based position in the input stream.
    pub index: usize,
    pub bytes: Vec<u8>,
}

impl RawLine {
    fn split_at_terminator(&self) -> usize {
        let mut end = self.bytes.len();
        if self.bytes[..end].ends_with(b"\n") {
            end -= 1;
            if self.bytes[..end].ends_with(b"\r") {
                end -= 1;
            }
        }
        end
    }

    pub fn content(&self) -> &[u8] {
        &self.bytes[..self.split_at_terminator()]
    }

    pub fn terminator(&self) -> &[u8] {
        &self.bytes[self.split_at_terminator()..]
    }
}

/// A decoded record: the document with its turns lifted out.
#[derive(Debug, Clone)]
pub struct Record {
    document: Map<String, Value>,
    pub turns: Vec<Turn>,
    /// Conversation entries that were not turns (no object, no text).
    pub malformed: usize,
}

/// Decode one line into a [`Record`].
pub fn decode_record(line: &[u8], vocab: &RoleVocabulary) -> Result<Record, PassThrough> {
    let text = std::str::from_utf8(line).map_err(DocumentError::from)?;
    if text.trim().is_empty() {
        return Err(PassThrough::Blank);
    }
    let value: Value = serde_json::from_str(text).map_err(DocumentError::from)?;
    let Value::Object(document) = value else {
        return Err(DocumentError::NotAnObject.into());
    };

    let entries = match document.get(&vocab.conversation_key) {
        None => return Err(PassThrough::NoConversation),
        Some(Value::Array(entries)) if entries.is_empty() => {
            return Err(PassThrough::NoConversation)
        }
        Some(Value::Array(entries)) => entries,
        Some(_) => return Err(PassThrough::NotAList),
    };

    let mut turns = Vec::with_capacity(entries.len());
    let mut malformed = 0;
    for (position, entry) in entries.iter().enumerate() {
        let Some(fields) = entry.as_object() else {
            malformed += 1;
            continue;
        };
        let Some(text) = fields.get(&vocab.text_key).and_then(Value::as_str) else {
            malformed += 1;
            continue;
        };
        let Some(role) = fields.get(&vocab.role_key).and_then(Value::as_str) else {
            return Err(PassThrough::UnattributedTurn {
                position: position + 1,
            });
        };
        turns.push(Turn::new(vocab.decode_role(role), text));
    }

    Ok(Record {
        document,
        turns,
        malformed,
    })
}

impl Record {
    /// Serialize the document with its conversation replaced by `turns`.
    ///
    /// Every other field keeps its value and position.
    pub fn encode(mut self, turns: &[Turn], vocab: &RoleVocabulary) -> serde_json::Result<String> {
        let entries = turns
            .iter()
            .map(|turn| {
                let mut fields = Map::new();
                fields.insert(
                    vocab.role_key.clone(),
                    Value::String(vocab.encode_role(&turn.role).to_string()),
                );
                fields.insert(vocab.text_key.clone(), Value::String(turn.text.clone()));
                Value::Object(fields)
            })
            .collect();
        self.document
            .insert(vocab.conversation_key.clone(), Value::Array(entries));
        serde_json::to_string(&Value::Object(self.document))
    }
}

/// Iterator over the raw lines of a record stream.
pub struct RecordReader<R> {
    inner: R,
    read: usize,
}

impl<R: BufRead> RecordReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, read: 0 }
    }
}

impl<R: BufRead> Iterator for RecordReader<R> {
    type Item = io::Result<RawLine>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut bytes = Vec::new();
        match self.inner.read_until(b'\n', &mut bytes) {
            Ok(0) => None,
            Ok(_) => {
                self.read += 1;
                Some(Ok(RawLine {
                    index: self.read,
                    bytes,
                }))
            }
            Err(e) => Some(Err(e)),
        }
    }
}

/// Writes records, flushing each completed line.
pub struct RecordWriter<W: Write> {
    inner: LineWriter<W>,
}

impl<W: Write> RecordWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner: LineWriter::new(inner),
        }
    }

    /// Write bytes exactly as given.
    pub fn write_raw(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.inner.write_all(bytes)
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }

    pub fn into_inner(self) -> io::Result<W> {
        self.inner.into_inner().map_err(|e| e.into_error())
    }
}
