use serde::Deserialize;

use crate::error::Result;
use crate::storage::StorageType;

#[derive(Debug, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
}

#[derive(Debug, PartialEq, Deserialize)]
pub struct Config {
    pub log_level: LogLevel,
    pub storage_type: StorageType,
    /// Number of frames in each buffer pool shard.
    pub pool_size: usize,
    /// The k in LRU-k.
    pub replacer_k: usize,
    /// Capacity of one page-table bucket.
    pub bucket_size: usize,
    /// Number of independent buffer pool shards.
    pub shards: usize,
}

impl Config {
    pub fn new(file: &str) -> Result<Config> {
        let mut cfg = config::Config::builder()
            .set_default("log_level", "debug")?
            .set_default("storage_type", "memory")?
            .set_default("pool_size", 64i64)?
            .set_default("replacer_k", 2i64)?
            .set_default("bucket_size", 4i64)?
            .set_default("shards", 1i64)?;
        if !file.is_empty() {
            cfg = cfg.add_source(config::File::with_name(file))
        }
        cfg = cfg.add_source(config::Environment::with_prefix("PAGEPOOL"));
        Ok(cfg.build()?.try_deserialize()?)
    }
}
