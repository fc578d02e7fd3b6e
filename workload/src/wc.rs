//! Word count. Every maximal run of letters is a word.

use anyhow::Result;
use bytes::Bytes;

use common::utils::string_from_bytes;
use common::{KeyValue, MapOutput};

pub fn map(kv: KeyValue) -> MapOutput {
    let contents = string_from_bytes(kv.value)?;
    let words = contents
        .split(|c: char| !c.is_alphabetic())
        .filter(|w| !w.is_empty())
        .map(|w| Ok(KeyValue::new(w.to_string(), "1")))
        .collect::<Vec<Result<KeyValue>>>();
    Ok(Box::new(words.into_iter()))
}

pub fn reduce(_key: Bytes, values: Box<dyn Iterator<Item = Bytes> + '_>) -> Result<Bytes> {
    Ok(Bytes::from(values.count().to_string()))
}
