//! Inverted index: for every word, the input files it appears in.

use std::collections::BTreeSet;

use anyhow::Result;
use bytes::Bytes;

use common::utils::string_from_bytes;
use common::{KeyValue, MapOutput};

pub fn map(kv: KeyValue) -> MapOutput {
    let document = kv.key;
    let contents = string_from_bytes(kv.value)?;

    let words: BTreeSet<&str> = contents
        .split(|c: char| !c.is_alphabetic())
        .filter(|w| !w.is_empty())
        .collect();

    let pairs = words
        .into_iter()
        .map(|w| Ok(KeyValue::new(w.to_string(), document.clone())))
        .collect::<Vec<Result<KeyValue>>>();
    Ok(Box::new(pairs.into_iter()))
}

/// Produces `<count> <doc>,<doc>,...` with documents sorted and deduplicated.
pub fn reduce(_key: Bytes, values: Box<dyn Iterator<Item = Bytes> + '_>) -> Result<Bytes> {
    let mut documents = BTreeSet::new();
    for value in values {
        documents.insert(string_from_bytes(value)?);
    }
    let joined = documents.iter().map(String::as_str).collect::<Vec<_>>().join(",");
    Ok(Bytes::from(format!("{} {}", documents.len(), joined)))
}
