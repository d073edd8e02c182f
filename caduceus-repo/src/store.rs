//! The append-only event store
//!
//! One JSON file per event, named by the zero-padded decimal event id, under
//! `<repo>/src/`. The file set must be exactly `{1..last_id}`; a gap is a
//! fatal integrity violation detected at open. Writes are synchronous and
//! durable before `write_event` returns.
//!
//! While a transaction is staged, new event files are written to
//! `src/.staging/` instead. Committing renames them into `src/` in ascending
//! id order, so a crash mid-commit leaves a contiguous committed prefix.
//! Aborting removes the staging directory. Leftover staging directories from
//! a crashed process are deleted at open.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use thiserror::Error;
use tracing::warn;

use crate::event::{Event, EventBody};

const STAGING_DIR: &str = ".staging";

/// Fatal event store integrity errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Event IDs are not sequential")]
    NonContiguous,

    #[error("Event {event_id} not found in event store")]
    EventNotFound { event_id: u64 },

    #[error("Event {event_id} is not readable: {reason}")]
    InvalidEvent { event_id: u64, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Interface for the event store
#[derive(Debug)]
pub struct EventStore {
    path: PathBuf,
    last_id: u64,
    committed_last_id: u64,
    staging: bool,
}

impl EventStore {
    /// Open the event store at `path`, creating the directory if needed.
    ///
    /// Scans all stored entries, fails fatally if entry ids are not
    /// contiguous from 1, and records the highest id as `last_id`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();

        fs::create_dir_all(&path)?;

        let staging_path = path.join(STAGING_DIR);

        if staging_path.exists() {
            warn!(
                path = %staging_path.display(),
                "Removing leftover transaction staging directory"
            );
            fs::remove_dir_all(&staging_path)?;
        }

        let mut event_ids = Vec::new();

        for entry in fs::read_dir(&path)? {
            let entry = entry?;

            if !entry.file_type()?.is_file() {
                continue;
            }

            let name = entry.file_name();

            if let Some(stem) = Path::new(&name).file_stem().and_then(|s| s.to_str()) {
                if let Ok(event_id) = stem.parse::<u64>() {
                    event_ids.push(event_id);
                }
            }
        }

        event_ids.sort_unstable();

        let mut last_id = 0;

        for event_id in event_ids {
            if event_id != last_id + 1 {
                return Err(StoreError::NonContiguous);
            }

            last_id = event_id;
        }

        Ok(Self {
            path,
            last_id,
            committed_last_id: last_id,
            staging: false,
        })
    }

    /// The id of the most recently written event.
    pub fn last_id(&self) -> u64 {
        self.last_id
    }

    /// Whether a transaction staging area is active.
    pub fn staging(&self) -> bool {
        self.staging
    }

    /// Write a new event, assigning it the next sequential id.
    ///
    /// The event is durable on disk before this returns. Inside a staged
    /// transaction the file lands in the staging directory instead of the
    /// committed log.
    pub fn write_event(&mut self, body: EventBody) -> Result<Event, StoreError> {
        let event_id = self.last_id + 1;

        let event = Event {
            id: event_id,
            timestamp: Utc::now(),
            body,
        };

        let bytes =
            serde_json::to_vec(&event).map_err(|e| StoreError::Serialization(e.to_string()))?;

        let dir = if self.staging {
            self.path.join(STAGING_DIR)
        } else {
            self.path.clone()
        };

        let mut file = File::create(dir.join(event_file_name(event_id)))?;
        file.write_all(&bytes)?;
        file.sync_all()?;

        self.last_id = event_id;

        Ok(event)
    }

    /// Read the event with the given id.
    pub fn read_event(&self, event_id: u64) -> Result<Event, StoreError> {
        let bytes = match fs::read(self.event_path(event_id)) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::EventNotFound { event_id });
            }
            Err(e) => return Err(e.into()),
        };

        let event: Event =
            serde_json::from_slice(&bytes).map_err(|e| StoreError::InvalidEvent {
                event_id,
                reason: e.to_string(),
            })?;

        if event.id != event_id {
            return Err(StoreError::InvalidEvent {
                event_id,
                reason: format!("stored id {} does not match file name", event.id),
            });
        }

        Ok(event)
    }

    /// Iterate events by ascending id, starting from `start`.
    ///
    /// Fails immediately if `start > 1` and the event does not exist.
    pub fn iter_events(
        &self,
        start: u64,
    ) -> Result<impl Iterator<Item = Result<Event, StoreError>> + '_, StoreError> {
        if start < 1 || (start > 1 && start > self.last_id) {
            return Err(StoreError::EventNotFound { event_id: start });
        }

        Ok((start..=self.last_id).map(move |event_id| self.read_event(event_id)))
    }

    /// Start routing writes to the staging directory.
    pub fn begin_staging(&mut self) -> Result<(), StoreError> {
        debug_assert!(!self.staging);

        fs::create_dir_all(self.path.join(STAGING_DIR))?;

        self.committed_last_id = self.last_id;
        self.staging = true;

        Ok(())
    }

    /// Move all staged events into the committed log, in ascending id order.
    pub fn commit_staging(&mut self) -> Result<(), StoreError> {
        debug_assert!(self.staging);

        let staging_path = self.path.join(STAGING_DIR);

        for event_id in self.committed_last_id + 1..=self.last_id {
            let name = event_file_name(event_id);
            fs::rename(staging_path.join(&name), self.path.join(&name))?;
        }

        File::open(&self.path)?.sync_all()?;

        fs::remove_dir_all(&staging_path)?;

        self.committed_last_id = self.last_id;
        self.staging = false;

        Ok(())
    }

    /// Discard all staged events and reset `last_id` to the committed value.
    pub fn abort_staging(&mut self) -> Result<(), StoreError> {
        debug_assert!(self.staging);

        fs::remove_dir_all(self.path.join(STAGING_DIR))?;

        self.last_id = self.committed_last_id;
        self.staging = false;

        Ok(())
    }

    fn event_path(&self, event_id: u64) -> PathBuf {
        let name = event_file_name(event_id);

        if self.staging && event_id > self.committed_last_id {
            self.path.join(STAGING_DIR).join(name)
        } else {
            self.path.join(name)
        }
    }
}

fn event_file_name(event_id: u64) -> String {
    format!("{event_id:08}.json")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{CreateIsolateData, EventBody, IsolateQuery};
    use tempfile::TempDir;
    use uuid::Uuid;

    fn body() -> EventBody {
        EventBody::CreateIsolate {
            data: CreateIsolateData {
                id: Uuid::new_v4(),
                legacy_id: None,
                name: None,
            },
            query: IsolateQuery {
                otu_id: Uuid::new_v4(),
                isolate_id: Uuid::new_v4(),
            },
        }
    }

    #[test]
    fn test_write_and_read() {
        let dir = TempDir::new().unwrap();
        let mut store = EventStore::open(dir.path().join("src")).unwrap();

        let written = store.write_event(body()).unwrap();

        assert_eq!(written.id, 1);
        assert_eq!(store.last_id(), 1);
        assert!(dir.path().join("src").join("00000001.json").exists());

        let read = store.read_event(1).unwrap();
        assert_eq!(read, written);
    }

    #[test]
    fn test_read_missing_event() {
        let dir = TempDir::new().unwrap();
        let store = EventStore::open(dir.path().join("src")).unwrap();

        assert!(matches!(
            store.read_event(1),
            Err(StoreError::EventNotFound { event_id: 1 })
        ));
    }

    #[test]
    fn test_open_detects_gap() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");

        {
            let mut store = EventStore::open(&src).unwrap();
            store.write_event(body()).unwrap();
            store.write_event(body()).unwrap();
            store.write_event(body()).unwrap();
        }

        fs::remove_file(src.join("00000002.json")).unwrap();

        assert!(matches!(
            EventStore::open(&src),
            Err(StoreError::NonContiguous)
        ));
    }

    #[test]
    fn test_iter_events() {
        let dir = TempDir::new().unwrap();
        let mut store = EventStore::open(dir.path().join("src")).unwrap();

        for _ in 0..3 {
            store.write_event(body()).unwrap();
        }

        let ids: Vec<u64> = store
            .iter_events(2)
            .unwrap()
            .map(|e| e.unwrap().id)
            .collect();

        assert_eq!(ids, vec![2, 3]);

        // Iterating from the start of an empty range is allowed.
        assert_eq!(store.iter_events(1).unwrap().count(), 3);

        assert!(store.iter_events(4).is_err());
        assert!(store.iter_events(0).is_err());
    }

    #[test]
    fn test_unknown_event_type_is_fatal() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");

        let mut store = EventStore::open(&src).unwrap();
        store.write_event(body()).unwrap();

        let path = src.join("00000001.json");
        let mut value: serde_json::Value =
            serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        value["type"] = "MalformedEvent".into();
        fs::write(&path, serde_json::to_vec(&value).unwrap()).unwrap();

        assert!(matches!(
            store.read_event(1),
            Err(StoreError::InvalidEvent { event_id: 1, .. })
        ));
    }

    #[test]
    fn test_staged_events_visible_before_commit() {
        let dir = TempDir::new().unwrap();
        let mut store = EventStore::open(dir.path().join("src")).unwrap();

        store.write_event(body()).unwrap();
        store.begin_staging().unwrap();
        store.write_event(body()).unwrap();

        assert_eq!(store.last_id(), 2);
        assert_eq!(store.read_event(2).unwrap().id, 2);

        // The staged file is not in the committed log yet.
        assert!(!dir.path().join("src").join("00000002.json").exists());

        store.commit_staging().unwrap();

        assert!(dir.path().join("src").join("00000002.json").exists());
        assert_eq!(store.read_event(2).unwrap().id, 2);
    }

    #[test]
    fn test_abort_discards_staged_events() {
        let dir = TempDir::new().unwrap();
        let mut store = EventStore::open(dir.path().join("src")).unwrap();

        store.write_event(body()).unwrap();
        store.begin_staging().unwrap();
        store.write_event(body()).unwrap();
        store.write_event(body()).unwrap();

        store.abort_staging().unwrap();

        assert_eq!(store.last_id(), 1);
        assert!(store.read_event(2).is_err());
        assert!(!dir.path().join("src").join(STAGING_DIR).exists());
    }

    #[test]
    fn test_leftover_staging_cleared_at_open() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");

        {
            let mut store = EventStore::open(&src).unwrap();
            store.write_event(body()).unwrap();
            store.begin_staging().unwrap();
            store.write_event(body()).unwrap();
            // Dropped without commit or abort, as a crashed process would.
        }

        let store = EventStore::open(&src).unwrap();

        assert_eq!(store.last_id(), 1);
        assert!(!src.join(STAGING_DIR).exists());
    }
}
