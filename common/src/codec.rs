//! Encoding of intermediate key-value records.
//!
//! Each record is a single line, `base64(key) base64(value)\n`, using the
//! URL-safe alphabet so neither field can contain the separator or a newline.
//! Readers stop at the first line that is unterminated or fails to decode,
//! which turns a truncated or corrupt tail into a clean end of stream.

use anyhow::{anyhow, Context, Result};
use base64::{engine::general_purpose::URL_SAFE, Engine as _};
use bytes::{BufMut, Bytes, BytesMut};
use tracing::debug;

use crate::KeyValue;

/// Append the encoded form of `kv` to `buf`.
pub fn encode_record(kv: &KeyValue, buf: &mut BytesMut) {
    buf.put_slice(URL_SAFE.encode(&kv.key).as_bytes());
    buf.put_u8(b' ');
    buf.put_slice(URL_SAFE.encode(&kv.value).as_bytes());
    buf.put_u8(b'\n');
}

/// Encode a whole sequence of records into one buffer.
pub fn encode_records<'a>(records: impl IntoIterator<Item = &'a KeyValue>) -> Bytes {
    let mut buf = BytesMut::new();
    for kv in records {
        encode_record(kv, &mut buf);
    }
    buf.freeze()
}

fn decode_line(line: &[u8]) -> Result<KeyValue> {
    let sep = line
        .iter()
        .position(|&b| b == b' ')
        .ok_or_else(|| anyhow!("record has no separator"))?;
    let key = URL_SAFE.decode(&line[..sep]).context("bad key encoding")?;
    let value = URL_SAFE.decode(&line[sep + 1..]).context("bad value encoding")?;
    Ok(KeyValue::new(key, value))
}

/// Iterator over the records in an encoded buffer.
///
/// Yields records until the data runs out, the last line has no newline,
/// or a line fails to decode. Whatever follows a bad line is ignored.
pub struct RecordReader<'a> {
    rest: &'a [u8],
}

impl<'a> RecordReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { rest: data }
    }
}

impl<'a> Iterator for RecordReader<'a> {
    type Item = KeyValue;

    fn next(&mut self) -> Option<Self::Item> {
        let end = self.rest.iter().position(|&b| b == b'\n')?;
        let line = &self.rest[..end];
        self.rest = &self.rest[end + 1..];

        match decode_line(line) {
            Ok(kv) => Some(kv),
            Err(e) => {
                debug!("stopping at undecodable record: {e:#}");
                self.rest = &[];
                None
            }
        }
    }
}

/// Decode every readable record in `data`.
pub fn decode_records(data: &[u8]) -> Vec<KeyValue> {
    RecordReader::new(data).collect()
}
