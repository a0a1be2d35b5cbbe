use std::path::PathBuf;

use rusqlite::Connection;
use serde::Deserialize;

use crate::cache::CacheStore;
use crate::timetable::TimetableSource;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    pub cache: Option<CacheStore>,
    pub timetable: Box<dyn TimetableSource>,
}

impl AppState {
    pub fn new(timetable: Box<dyn TimetableSource>) -> Self {
        Self {
            workspace: None,
            db: None,
            cache: None,
            timetable,
        }
    }
}
