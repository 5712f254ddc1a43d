//! Persistence of infobox render data for a page.
//!
//! Render data is stored as a JSON page property, with a TTL-bounded copy in
//! an object cache in front of it. Records written by a different schema
//! version are never returned; the page is reparsed instead, if the host
//! supplied a way to do that.

use crate::{
    config::Config,
    lru_limiter::{ByteBudget, HeapSize},
    render_data::{InfoboxRecord, PARSER_TAG_VERSION},
};
use indexmap::IndexSet;
use schnellru::LruMap;
use std::{
    collections::HashMap,
    sync::{Mutex, PoisonError},
    time::{Duration, Instant},
};

/// The name of the page property holding the infobox records.
pub const INFOBOXES_PROPERTY: &str = "infoboxes";

/// The result type for data service operations.
pub type Result<T = (), E = Error> = core::result::Result<T, E>;

/// Errors that may occur when storing infobox data.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The records could not be encoded.
    #[error("could not encode infobox data: {0}")]
    Json(#[from] serde_json::Error),
}

/// Persistent per-page key/value properties.
pub trait PageProps {
    /// Gets the value of a page property.
    fn get(&self, page_id: u64, name: &str) -> Option<String>;

    /// Sets the value of a page property.
    fn set(&self, page_id: u64, name: &str, value: String);
}

/// A shared cache with expiring entries.
pub trait ObjectCache {
    /// Gets an unexpired value.
    fn get(&self, key: &str) -> Option<String>;

    /// Sets a value which expires after `ttl`.
    fn set(&self, key: &str, value: String, ttl: Duration);

    /// Removes a value.
    fn delete(&self, key: &str);
}

/// Page properties held in memory.
#[derive(Debug, Default)]
pub struct MemoryPageProps {
    props: Mutex<HashMap<(u64, String), String>>,
}

impl PageProps for MemoryPageProps {
    fn get(&self, page_id: u64, name: &str) -> Option<String> {
        self.props
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(page_id, name.to_string()))
            .cloned()
    }

    fn set(&self, page_id: u64, name: &str, value: String) {
        self.props
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((page_id, name.to_string()), value);
    }
}

/// A cached value.
struct CacheEntry {
    value: String,
    expires: Instant,
}

impl HeapSize for CacheEntry {
    fn heap_size(&self) -> usize {
        size_of::<Instant>() + self.value.heap_size()
    }
}

/// An in-process [`ObjectCache`] bounded by memory usage.
pub struct MemoryCache {
    entries: Mutex<LruMap<String, CacheEntry, ByteBudget>>,
}

impl MemoryCache {
    /// Creates a new cache which holds at most `budget` bytes of entries.
    pub fn new(budget: usize) -> Self {
        Self {
            entries: Mutex::new(LruMap::new(ByteBudget::new(budget))),
        }
    }

    /// Returns the number of bytes currently held by entries.
    pub fn used(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .limiter()
            .used()
    }
}

impl ObjectCache for MemoryCache {
    fn get(&self, key: &str) -> Option<String> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = entries.get(key)?;
        if entry.expires <= Instant::now() {
            entries.remove(key);
            None
        } else {
            Some(entry.value.clone())
        }
    }

    fn set(&self, key: &str, value: String, ttl: Duration) {
        let entry = CacheEntry {
            value,
            expires: Instant::now() + ttl,
        };
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if !entries.insert(key.to_string(), entry) {
            log::debug!("Infobox data for {key} is too large to cache");
        }
    }

    fn delete(&self, key: &str) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }
}

/// A function which reparses a page and returns its current records.
pub type Reparser<'a> = Box<dyn FnMut() -> Vec<InfoboxRecord> + 'a>;

/// Reads and writes the infobox records of one page.
pub struct DataService<'a> {
    /// The page id. Page 0 does not exist, and nothing is stored for it.
    page_id: u64,
    props: &'a dyn PageProps,
    cache: &'a dyn ObjectCache,
    ttl: Duration,
    /// The object cache key.
    key: String,
    /// The records, once loaded.
    loaded: Option<Vec<InfoboxRecord>>,
    reparser: Option<Reparser<'a>>,
}

impl<'a> DataService<'a> {
    /// Creates a new data service for the given page.
    pub fn new(
        page_id: u64,
        props: &'a dyn PageProps,
        cache: &'a dyn ObjectCache,
        config: &Config,
    ) -> Self {
        Self {
            page_id,
            props,
            cache,
            ttl: Duration::from_secs(config.cache_ttl),
            key: format!("portable-infobox:{page_id}:{INFOBOXES_PROPERTY}:{PARSER_TAG_VERSION}"),
            loaded: None,
            reparser: None,
        }
    }

    /// Sets the function used to regenerate stale records.
    pub fn with_reparser(mut self, reparser: impl FnMut() -> Vec<InfoboxRecord> + 'a) -> Self {
        self.reparser = Some(Box::new(reparser));
        self
    }

    /// Returns the stored records of the page, or an empty list.
    pub fn get_data(&mut self) -> Result<&[InfoboxRecord]> {
        if self.loaded.is_none() {
            let records = self.load()?;
            self.loaded = Some(records);
        }
        Ok(self.loaded.as_deref().unwrap_or_default())
    }

    /// Returns the unique names of every media file in the stored records.
    pub fn images(&mut self) -> Result<Vec<String>> {
        let images = self
            .get_data()?
            .iter()
            .flat_map(InfoboxRecord::images)
            .map(str::to_string)
            .collect::<IndexSet<_>>();
        Ok(images.into_iter().collect())
    }

    /// Appends a record to the stored records.
    pub fn save(&mut self, record: InfoboxRecord) -> Result {
        let mut records = self.get_data()?.to_vec();
        records.push(record);
        self.set(records)
    }

    /// Replaces all stored records. An empty list deletes the stored data.
    pub fn replace(&mut self, records: Vec<InfoboxRecord>) -> Result {
        if records.is_empty() {
            self.delete();
            Ok(())
        } else {
            self.set(records)
        }
    }

    /// Removes the stored records.
    pub fn delete(&mut self) {
        if self.page_id != 0 {
            self.props
                .set(self.page_id, INFOBOXES_PROPERTY, String::new());
            self.purge();
        }
        self.loaded = None;
    }

    /// Drops the cached copy of the records, so the next read goes to the page
    /// properties.
    pub fn purge(&mut self) {
        self.cache.delete(&self.key);
        self.loaded = None;
    }

    /// Regenerates the records if any of them is stale or the stored payload
    /// could not be decoded. Returns the records which should be used.
    pub fn reparse_if_needed(
        &mut self,
        records: Option<Vec<InfoboxRecord>>,
    ) -> Result<Vec<InfoboxRecord>> {
        match records {
            Some(records) if records.iter().all(InfoboxRecord::is_current) => Ok(records),
            _ => {
                log::debug!("Reparsing infoboxes of page {}", self.page_id);
                let records = self.reparser.as_mut().map(|reparse| reparse()).unwrap_or_default();
                self.replace(records.clone())?;
                Ok(records)
            }
        }
    }

    fn load(&mut self) -> Result<Vec<InfoboxRecord>> {
        if self.page_id == 0 {
            return Ok(Vec::new());
        }

        if let Some(cached) = self.cache.get(&self.key) {
            match serde_json::from_str::<Vec<InfoboxRecord>>(&cached) {
                Ok(records) if records.iter().all(InfoboxRecord::is_current) => {
                    return Ok(records);
                }
                Ok(_) => log::debug!("Rejected stale cached infobox data for {}", self.key),
                Err(err) => log::debug!("Rejected cached infobox data for {}: {err}", self.key),
            }
        }

        let stored = self
            .props
            .get(self.page_id, INFOBOXES_PROPERTY)
            .unwrap_or_default();

        // A page with no property is treated as a page without infoboxes.
        let records = if stored.is_empty() {
            Vec::new()
        } else {
            let records = match serde_json::from_str::<Vec<InfoboxRecord>>(&stored) {
                Ok(records) => Some(records),
                Err(err) => {
                    log::debug!("Rejected stored infobox data of page {}: {err}", self.page_id);
                    None
                }
            };
            self.reparse_if_needed(records)?
        };

        self.cache
            .set(&self.key, serde_json::to_string(&records)?, self.ttl);
        Ok(records)
    }

    fn set(&mut self, records: Vec<InfoboxRecord>) -> Result {
        if self.page_id != 0 {
            let json = serde_json::to_string(&records)?;
            self.cache.set(&self.key, json.clone(), self.ttl);
            self.props.set(self.page_id, INFOBOXES_PROPERTY, json);
        }
        self.loaded = Some(records);
        Ok(())
    }
}
