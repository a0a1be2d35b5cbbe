use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

pub const CACHE_FILE: &str = "client-cache.json";

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedSubject {
    pub id: String,
    pub name: String,
    pub code: String,
    #[serde(default)]
    pub teacher: String,
    pub total_classes: u32,
    pub attended_classes: u32,
    pub required_percentage: f64,
}

/// Snapshot the shell keeps between sessions so the dashboard can render
/// before the first query returns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientCache {
    pub current_semester_id: Option<String>,
    pub onboarded: bool,
    pub subjects: Vec<CachedSubject>,
}

impl ClientCache {
    /// Quick mark from the dashboard: one more class, attended or not.
    /// Returns false when the subject is not cached.
    pub fn record_class(&mut self, subject_id: &str, attended: bool) -> bool {
        let Some(subject) = self.subjects.iter_mut().find(|s| s.id == subject_id) else {
            return false;
        };
        // Counters come from the client; they stop at the ceiling.
        subject.total_classes = subject.total_classes.saturating_add(1);
        if attended {
            subject.attended_classes = subject.attended_classes.saturating_add(1);
        }
        true
    }
}

#[derive(Debug, Clone)]
pub struct CacheStore {
    path: PathBuf,
}

impl CacheStore {
    pub fn new(workspace: &Path) -> Self {
        Self {
            path: workspace.join(CACHE_FILE),
        }
    }

    /// Missing or unreadable caches fall back to an empty one.
    pub fn load(&self) -> ClientCache {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return ClientCache::default(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "client cache unreadable");
                return ClientCache::default();
            }
        };
        serde_json::from_str(&text).unwrap_or_else(|e| {
            warn!(path = %self.path.display(), error = %e, "client cache corrupt; starting empty");
            ClientCache::default()
        })
    }

    pub fn save(&self, cache: &ClientCache) -> Result<(), CacheError> {
        let body = serde_json::to_string_pretty(cache)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, body)?;
        std::fs::rename(&tmp, &self.path)?;
        debug!(subjects = cache.subjects.len(), "client cache saved");
        Ok(())
    }

    pub fn reset(&self) -> Result<(), CacheError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_dir(prefix: &str) -> PathBuf {
        let p = std::env::temp_dir().join(format!(
            "{}-{}",
            prefix,
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .expect("clock")
                .as_nanos()
        ));
        std::fs::create_dir_all(&p).expect("create temp dir");
        p
    }

    fn subject(id: &str) -> CachedSubject {
        CachedSubject {
            id: id.to_string(),
            name: "Data Structures".to_string(),
            code: "CS201".to_string(),
            teacher: "Dr. Sarah Johnson".to_string(),
            total_classes: 40,
            attended_classes: 35,
            required_percentage: 75.0,
        }
    }

    #[test]
    fn save_load_reset_lifecycle() {
        let dir = temp_dir("attendd-cache");
        let store = CacheStore::new(&dir);
        assert_eq!(store.load(), ClientCache::default());

        let cache = ClientCache {
            current_semester_id: Some("sem-1".to_string()),
            onboarded: true,
            subjects: vec![subject("a")],
        };
        store.save(&cache).expect("save");
        assert_eq!(store.load(), cache);

        store.reset().expect("reset");
        assert_eq!(store.load(), ClientCache::default());
        store.reset().expect("reset twice");
    }

    #[test]
    fn corrupt_cache_loads_empty() {
        let dir = temp_dir("attendd-cache-corrupt");
        std::fs::write(dir.join(CACHE_FILE), "{not json").expect("write");
        assert_eq!(CacheStore::new(&dir).load(), ClientCache::default());
    }

    #[test]
    fn record_class_bumps_counters() {
        let mut cache = ClientCache {
            subjects: vec![subject("a")],
            ..ClientCache::default()
        };
        assert!(cache.record_class("a", true));
        assert!(cache.record_class("a", false));
        assert!(!cache.record_class("missing", true));
        assert_eq!(cache.subjects[0].total_classes, 42);
        assert_eq!(cache.subjects[0].attended_classes, 36);
    }

    #[test]
    fn record_class_saturates_at_u32_max() {
        let mut at_max = subject("a");
        at_max.total_classes = u32::MAX;
        at_max.attended_classes = u32::MAX;
        let mut cache = ClientCache {
            subjects: vec![at_max],
            ..ClientCache::default()
        };
        assert!(cache.record_class("a", true));
        assert_eq!(cache.subjects[0].total_classes, u32::MAX);
        assert_eq!(cache.subjects[0].attended_classes, u32::MAX);
    }
}
