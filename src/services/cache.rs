use crate::constants::cache_keys;
use crate::services::insight_hub_api::{EventField, Organization, Project};
use crate::services::logger::Logger;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::{Arc, Mutex};

/// Values the resolver stores. Each variant is shared by `Arc` so readers
/// never copy project lists or schemas.
#[derive(Debug, Clone)]
pub enum CacheEntry {
    Organization(Arc<Organization>),
    Projects(Arc<Vec<Project>>),
    Project(Arc<Project>),
    EventFields(Arc<Vec<EventField>>),
}

impl CacheEntry {
    fn kind(&self) -> &'static str {
        match self {
            CacheEntry::Organization(_) => "organization",
            CacheEntry::Projects(_) => "projects",
            CacheEntry::Project(_) => "project",
            CacheEntry::EventFields(_) => "event_fields",
        }
    }
}

#[derive(Default)]
struct CacheStats {
    hits: u64,
    misses: u64,
    writes: u64,
}

/// Process-lifetime key/value store for resolved vendor resources. No TTL,
/// no eviction.
pub struct ResolutionCache {
    logger: Logger,
    entries: DashMap<String, CacheEntry>,
    stats: Mutex<CacheStats>,
}

pub fn project_event_fields_key(project_id: &str) -> String {
    format!("{}{}", cache_keys::PROJECT_EVENT_FILTERS_PREFIX, project_id)
}

impl ResolutionCache {
    pub fn new(logger: Logger) -> Self {
        Self {
            logger: logger.child("cache"),
            entries: DashMap::new(),
            stats: Mutex::new(CacheStats::default()),
        }
    }

    pub fn get(&self, key: &str) -> Option<CacheEntry> {
        let found = self.entries.get(key).map(|entry| entry.value().clone());
        if found.is_some() {
            self.bump(|s| s.hits += 1);
        } else {
            self.bump(|s| s.misses += 1);
        }
        found
    }

    pub fn set(&self, key: &str, entry: CacheEntry) {
        self.logger.debug(
            "set",
            Some(&serde_json::json!({ "key": key, "kind": entry.kind() })),
        );
        self.entries.insert(key.to_string(), entry);
        self.bump(|s| s.writes += 1);
    }

    /// Stores `entry` only when `key` is vacant and returns whatever the key
    /// holds afterwards.
    pub fn set_if_absent(&self, key: &str, entry: CacheEntry) -> CacheEntry {
        let slot = self.entries.entry(key.to_string()).or_insert_with(|| {
            self.bump(|s| s.writes += 1);
            entry
        });
        slot.value().clone()
    }

    pub fn delete(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn organization(&self, key: &str) -> Option<Arc<Organization>> {
        match self.get(key)? {
            CacheEntry::Organization(org) => Some(org),
            other => self.mismatch(key, &other),
        }
    }

    pub fn projects(&self, key: &str) -> Option<Arc<Vec<Project>>> {
        match self.get(key)? {
            CacheEntry::Projects(list) => Some(list),
            other => self.mismatch(key, &other),
        }
    }

    pub fn project(&self, key: &str) -> Option<Arc<Project>> {
        match self.get(key)? {
            CacheEntry::Project(project) => Some(project),
            other => self.mismatch(key, &other),
        }
    }

    pub fn event_fields(&self, key: &str) -> Option<Arc<Vec<EventField>>> {
        match self.get(key)? {
            CacheEntry::EventFields(fields) => Some(fields),
            other => self.mismatch(key, &other),
        }
    }

    fn mismatch<T>(&self, key: &str, entry: &CacheEntry) -> Option<T> {
        self.logger.warn(
            "Cache entry has unexpected kind",
            Some(&serde_json::json!({ "key": key, "kind": entry.kind() })),
        );
        None
    }

    fn bump(&self, f: impl FnOnce(&mut CacheStats)) {
        if let Ok(mut stats) = self.stats.lock() {
            f(&mut stats);
        }
    }

    pub fn stats(&self) -> Value {
        let stats = self.stats.lock().unwrap_or_else(|err| err.into_inner());
        let mut keys: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        serde_json::json!({
            "entries": keys.len(),
            "keys": keys,
            "hits": stats.hits,
            "misses": stats.misses,
            "writes": stats.writes,
        })
    }
}
