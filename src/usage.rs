//! Daily usage counter.
//!
//! Counts conversion batches per UTC day, separately for guests and signed-in
//! users. Records are keyed `usage_YYYY-MM-DD` and stored together in one
//! JSON object:
//!
//! ```json
//! {
//!   "usage_2025-10-11": { "guest": 3, "user": 0 },
//!   "usage_2025-10-12": { "guest": 1, "user": 2 }
//! }
//! ```
//!
//! The tracker owns its state file: every mutation goes through `&mut self`
//! and is written back immediately. Older days are kept until [`reset`].
//!
//! [`reset`]: UsageTracker::reset

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum UsageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Usage state is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Who is converting. Only this distinction of the auth layer reaches us.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Audience {
    Guest,
    User,
}

impl fmt::Display for Audience {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Audience::Guest => "guest",
            Audience::User => "user",
        })
    }
}

/// Batches counted on one day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DailyUsage {
    pub guest: u32,
    pub user: u32,
}

impl DailyUsage {
    pub fn get(&self, audience: Audience) -> u32 {
        match audience {
            Audience::Guest => self.guest,
            Audience::User => self.user,
        }
    }

    fn bump(&mut self, audience: Audience) -> u32 {
        let slot = match audience {
            Audience::Guest => &mut self.guest,
            Audience::User => &mut self.user,
        };
        *slot = slot.saturating_add(1);
        *slot
    }
}

/// Daily allowance per audience.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsageLimits {
    pub guest: u32,
    pub user: u32,
}

impl Default for UsageLimits {
    fn default() -> Self {
        Self { guest: 5, user: 5 }
    }
}

impl UsageLimits {
    pub fn for_audience(&self, audience: Audience) -> u32 {
        match audience {
            Audience::Guest => self.guest,
            Audience::User => self.user,
        }
    }
}

/// Storage key for a given day.
pub fn key_for(date: NaiveDate) -> String {
    format!("usage_{}", date.format("%Y-%m-%d"))
}

/// Storage key for the current UTC day.
pub fn today_key() -> String {
    key_for(today())
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

#[derive(Debug)]
pub struct UsageTracker {
    /// `None` keeps everything in memory.
    path: Option<PathBuf>,
    limits: UsageLimits,
    records: BTreeMap<String, DailyUsage>,
}

impl UsageTracker {
    /// Load the tracker from `path`. A missing file starts empty.
    pub fn open(path: impl Into<PathBuf>, limits: UsageLimits) -> Result<Self, UsageError> {
        let path = path.into();
        let records = if path.exists() {
            let content = fs::read_to_string(&path)?;
            if content.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&content)?
            }
        } else {
            BTreeMap::new()
        };
        debug!(path = %path.display(), days = records.len(), "usage state loaded");
        Ok(Self {
            path: Some(path),
            limits,
            records,
        })
    }

    pub fn in_memory(limits: UsageLimits) -> Self {
        Self {
            path: None,
            limits,
            records: BTreeMap::new(),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn limits(&self) -> UsageLimits {
        self.limits
    }

    pub fn usage_count(&self, audience: Audience) -> u32 {
        self.usage_count_on(today(), audience)
    }

    pub fn usage_count_on(&self, date: NaiveDate, audience: Audience) -> u32 {
        self.records
            .get(&key_for(date))
            .map_or(0, |day| day.get(audience))
    }

    /// Count one more batch today. Returns the new count.
    pub fn increment(&mut self, audience: Audience) -> Result<u32, UsageError> {
        self.increment_on(today(), audience)
    }

    pub fn increment_on(&mut self, date: NaiveDate, audience: Audience) -> Result<u32, UsageError> {
        let count = self.records.entry(key_for(date)).or_default().bump(audience);
        self.save()?;
        debug!(%audience, count, "usage incremented");
        Ok(count)
    }

    pub fn remaining_quota(&self, audience: Audience) -> u32 {
        self.remaining_quota_on(today(), audience)
    }

    pub fn remaining_quota_on(&self, date: NaiveDate, audience: Audience) -> u32 {
        self.limits
            .for_audience(audience)
            .saturating_sub(self.usage_count_on(date, audience))
    }

    /// Forget every day's counts.
    pub fn reset(&mut self) -> Result<(), UsageError> {
        self.records.clear();
        self.save()
    }

    fn save(&self) -> Result<(), UsageError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(&self.records)?)?;
        Ok(())
    }
}
