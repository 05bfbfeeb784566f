//! Caller-owned profile cache
//!
//! Baseline and chronotype depend only on the history window, so they can be
//! reused across display requests for the same user and date range. The cache
//! is a plain value: the engine never consults it implicitly, and the caller
//! decides when entries go stale.

use crate::types::{ChronotypeResult, MctqProfile};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Identifies one history window of one user
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    pub user_id: String,
    /// First record date of the window
    pub start: NaiveDate,
    /// Last record date of the window
    pub end: NaiveDate,
}

impl CacheKey {
    pub fn new(user_id: impl Into<String>, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            user_id: user_id.into(),
            start,
            end,
        }
    }

    fn covers(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// Results that are stable for a given history window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedProfile {
    pub profile: MctqProfile,
    pub chronotype: ChronotypeResult,
}

/// Serialized form of one cache entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub value: CachedProfile,
}

/// Profile cache keyed by user and date range
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<CacheEntry>", into = "Vec<CacheEntry>")]
pub struct ProfileCache {
    entries: BTreeMap<CacheKey, CachedProfile>,
}

impl ProfileCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &CacheKey) -> Option<&CachedProfile> {
        self.entries.get(key)
    }

    /// Insert or replace, returning the previous value
    pub fn insert(&mut self, key: CacheKey, value: CachedProfile) -> Option<CachedProfile> {
        self.entries.insert(key, value)
    }

    /// Drop every entry of a user; returns how many were removed
    pub fn invalidate_user(&mut self, user_id: &str) -> usize {
        self.remove_where(|k| k.user_id == user_id)
    }

    /// Drop a user's entries whose window contains `date`, e.g. after a
    /// record for that night was edited
    pub fn invalidate_overlapping(&mut self, user_id: &str, date: NaiveDate) -> usize {
        self.remove_where(|k| k.user_id == user_id && k.covers(date))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Load cache from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize cache to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    fn remove_where(&mut self, pred: impl Fn(&CacheKey) -> bool) -> usize {
        let before = self.entries.len();
        self.entries.retain(|k, _| !pred(k));
        before - self.entries.len()
    }
}

impl From<Vec<CacheEntry>> for ProfileCache {
    fn from(entries: Vec<CacheEntry>) -> Self {
        Self {
            entries: entries.into_iter().map(|e| (e.key, e.value)).collect(),
        }
    }
}

impl From<ProfileCache> for Vec<CacheEntry> {
    fn from(cache: ProfileCache) -> Self {
        cache
            .entries
            .into_iter()
            .map(|(key, value)| CacheEntry { key, value })
            .collect()
    }
}
