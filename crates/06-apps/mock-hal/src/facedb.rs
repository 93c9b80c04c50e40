//! Reference face database.
//!
//! A flat, fixed-capacity store keyed by a 16-bit id. The trait is the
//! contract the recognition stack programs against; [`MemoryFaceDb`] is the
//! reference implementation for algorithm bring-up, optionally persisted to
//! one file so saved records survive a reboot.

use log::debug;
use parking_lot::Mutex;
use std::fs;
use std::path::PathBuf;
use thiserror::Error;

/// Id value marking "no face"; also used to address all records at once.
pub const INVALID_FACE_ID: u16 = 0xFFFF;
/// Maximum number of stored faces.
pub const MAX_FACE_DB_SIZE: usize = 100;
/// Longest accepted face name, in bytes.
pub const FACE_NAME_MAX_LEN: usize = 31;

/// Errors surfaced by face-database operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FaceDbError {
    /// `init` has not been called.
    #[error("face database not initialized")]
    NotInit,

    /// The database is at capacity.
    #[error("face database is full")]
    Full,

    /// No record with the given id or name.
    #[error("no such face")]
    WrongId,

    /// A parameter violates the contract (name length, feature size).
    #[error("invalid parameter: {0}")]
    WrongParam(&'static str),

    /// The backing file could not be read or written.
    #[error("face database persistence failed")]
    Failed,
}

/// One stored face.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FaceRecord {
    /// Stable id.
    pub id: u16,
    /// Display name, at most [`FACE_NAME_MAX_LEN`] bytes.
    pub name: String,
    /// Feature vector bytes, `feature_size` long.
    pub feature: Vec<u8>,
    /// Whether this record has been persisted.
    pub saved: bool,
}

/// The face-database contract. All operations are atomic with respect to
/// the backing store.
pub trait FaceDb: Send {
    /// Prepares the store for features of `feature_size` bytes (0 keeps the
    /// implementation maximum) and loads persisted records.
    fn init(&self, feature_size: u16) -> Result<(), FaceDbError>;

    /// Adds a face under `id`.
    fn add(&self, id: u16, name: &str, feature: &[u8]) -> Result<(), FaceDbError>;

    /// Removes the face with `id`, or every face for [`INVALID_FACE_ID`].
    fn del_by_id(&self, id: u16) -> Result<(), FaceDbError>;

    /// Removes the first face called `name`.
    fn del_by_name(&self, name: &str) -> Result<(), FaceDbError>;

    /// Renames the face with `id`.
    fn update_name(&self, id: u16, name: &str) -> Result<(), FaceDbError>;

    /// Replaces the feature (and name) of the face with `id`.
    fn update_feature(&self, id: u16, name: &str, feature: &[u8]) -> Result<(), FaceDbError>;

    /// The face with `id`.
    fn get_by_id(&self, id: u16) -> Result<FaceRecord, FaceDbError>;

    /// The id of the first face called `name`.
    fn get_id_by_name(&self, name: &str) -> Result<u16, FaceDbError>;

    /// Ids of every stored face.
    fn ids(&self) -> Vec<u16>;

    /// An id not currently in use.
    fn generate_id(&self) -> Result<u16, FaceDbError>;

    /// Number of stored faces.
    fn count(&self) -> usize;

    /// Whether the face with `id` (or every face, for
    /// [`INVALID_FACE_ID`]) has been persisted.
    fn save_status(&self, id: u16) -> bool;

    /// Persists all records and marks them clean.
    fn save(&self) -> Result<(), FaceDbError>;
}

struct DbState {
    feature_size: u16,
    records: Vec<FaceRecord>,
    initialized: bool,
}

/// Reference implementation backed by memory and one optional file.
pub struct MemoryFaceDb {
    path: Option<PathBuf>,
    state: Mutex<DbState>,
}

impl MemoryFaceDb {
    /// A purely in-memory database.
    pub fn new() -> Self {
        Self {
            path: None,
            state: Mutex::new(DbState {
                feature_size: 0,
                records: Vec::new(),
                initialized: false,
            }),
        }
    }

    /// A database persisted to `path` on save.
    pub fn with_file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::new()
        }
    }

    fn check_params(state: &DbState, name: &str, feature: &[u8]) -> Result<(), FaceDbError> {
        if name.len() > FACE_NAME_MAX_LEN {
            return Err(FaceDbError::WrongParam("name too long"));
        }
        if state.feature_size != 0 && feature.len() != state.feature_size as usize {
            return Err(FaceDbError::WrongParam("feature size mismatch"));
        }
        Ok(())
    }

    fn persist(&self, state: &mut DbState) -> Result<(), FaceDbError> {
        let Some(path) = &self.path else {
            for record in state.records.iter_mut() {
                record.saved = true;
            }
            return Ok(());
        };

        let mut out = Vec::new();
        out.extend_from_slice(&(state.records.len() as u16).to_le_bytes());
        out.extend_from_slice(&state.feature_size.to_le_bytes());
        for record in &state.records {
            out.extend_from_slice(&record.id.to_le_bytes());
            out.push(record.name.len() as u8);
            out.extend_from_slice(record.name.as_bytes());
            out.extend_from_slice(&(record.feature.len() as u16).to_le_bytes());
            out.extend_from_slice(&record.feature);
        }
        fs::write(path, out).map_err(|_| FaceDbError::Failed)?;
        for record in state.records.iter_mut() {
            record.saved = true;
        }
        Ok(())
    }

    fn load(&self, state: &mut DbState) -> Result<(), FaceDbError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(_) => return Ok(()), // nothing persisted yet
        };
        if bytes.len() < 4 {
            return Err(FaceDbError::Failed);
        }
        let record_count = u16::from_le_bytes([bytes[0], bytes[1]]) as usize;
        let mut at = 4;
        let mut records = Vec::new();
        for _ in 0..record_count {
            if bytes.len() < at + 3 {
                return Err(FaceDbError::Failed);
            }
            let id = u16::from_le_bytes([bytes[at], bytes[at + 1]]);
            let name_len = bytes[at + 2] as usize;
            at += 3;
            if bytes.len() < at + name_len + 2 {
                return Err(FaceDbError::Failed);
            }
            let name = String::from_utf8_lossy(&bytes[at..at + name_len]).into_owned();
            at += name_len;
            let feat_len = u16::from_le_bytes([bytes[at], bytes[at + 1]]) as usize;
            at += 2;
            if bytes.len() < at + feat_len {
                return Err(FaceDbError::Failed);
            }
            records.push(FaceRecord {
                id,
                name,
                feature: bytes[at..at + feat_len].to_vec(),
                saved: true,
            });
            at += feat_len;
        }
        debug!("face db loaded {} records", records.len());
        state.records = records;
        Ok(())
    }
}

impl Default for MemoryFaceDb {
    fn default() -> Self {
        Self::new()
    }
}

impl FaceDb for MemoryFaceDb {
    fn init(&self, feature_size: u16) -> Result<(), FaceDbError> {
        let mut state = self.state.lock();
        state.feature_size = feature_size;
        state.initialized = true;
        self.load(&mut state)
    }

    fn add(&self, id: u16, name: &str, feature: &[u8]) -> Result<(), FaceDbError> {
        let mut state = self.state.lock();
        if !state.initialized {
            return Err(FaceDbError::NotInit);
        }
        Self::check_params(&state, name, feature)?;
        if state.records.len() >= MAX_FACE_DB_SIZE {
            return Err(FaceDbError::Full);
        }
        if id == INVALID_FACE_ID || state.records.iter().any(|rec| rec.id == id) {
            return Err(FaceDbError::WrongParam("id unusable"));
        }
        state.records.push(FaceRecord {
            id,
            name: name.to_string(),
            feature: feature.to_vec(),
            saved: false,
        });
        self.persist(&mut state)
    }

    fn del_by_id(&self, id: u16) -> Result<(), FaceDbError> {
        let mut state = self.state.lock();
        if id == INVALID_FACE_ID {
            state.records.clear();
            return self.persist(&mut state);
        }
        let before = state.records.len();
        state.records.retain(|rec| rec.id != id);
        if state.records.len() == before {
            return Err(FaceDbError::WrongId);
        }
        self.persist(&mut state)
    }

    fn del_by_name(&self, name: &str) -> Result<(), FaceDbError> {
        let mut state = self.state.lock();
        let index = state
            .records
            .iter()
            .position(|rec| rec.name == name)
            .ok_or(FaceDbError::WrongId)?;
        state.records.remove(index);
        self.persist(&mut state)
    }

    fn update_name(&self, id: u16, name: &str) -> Result<(), FaceDbError> {
        let mut state = self.state.lock();
        if name.len() > FACE_NAME_MAX_LEN {
            return Err(FaceDbError::WrongParam("name too long"));
        }
        let record = state
            .records
            .iter_mut()
            .find(|rec| rec.id == id)
            .ok_or(FaceDbError::WrongId)?;
        record.name = name.to_string();
        record.saved = false;
        self.persist(&mut state)
    }

    fn update_feature(&self, id: u16, name: &str, feature: &[u8]) -> Result<(), FaceDbError> {
        let mut state = self.state.lock();
        Self::check_params(&state, name, feature)?;
        let record = state
            .records
            .iter_mut()
            .find(|rec| rec.id == id)
            .ok_or(FaceDbError::WrongId)?;
        record.name = name.to_string();
        record.feature = feature.to_vec();
        record.saved = false;
        self.persist(&mut state)
    }

    fn get_by_id(&self, id: u16) -> Result<FaceRecord, FaceDbError> {
        self.state
            .lock()
            .records
            .iter()
            .find(|rec| rec.id == id)
            .cloned()
            .ok_or(FaceDbError::WrongId)
    }

    fn get_id_by_name(&self, name: &str) -> Result<u16, FaceDbError> {
        self.state
            .lock()
            .records
            .iter()
            .find(|rec| rec.name == name)
            .map(|rec| rec.id)
            .ok_or(FaceDbError::WrongId)
    }

    fn ids(&self) -> Vec<u16> {
        self.state.lock().records.iter().map(|rec| rec.id).collect()
    }

    fn generate_id(&self) -> Result<u16, FaceDbError> {
        let state = self.state.lock();
        if state.records.len() >= MAX_FACE_DB_SIZE {
            return Err(FaceDbError::Full);
        }
        (0..MAX_FACE_DB_SIZE as u16)
            .find(|candidate| state.records.iter().all(|rec| rec.id != *candidate))
            .ok_or(FaceDbError::Full)
    }

    fn count(&self) -> usize {
        self.state.lock().records.len()
    }

    fn save_status(&self, id: u16) -> bool {
        let state = self.state.lock();
        if id == INVALID_FACE_ID {
            return state.records.iter().all(|rec| rec.saved);
        }
        state
            .records
            .iter()
            .find(|rec| rec.id == id)
            .map(|rec| rec.saved)
            .unwrap_or(false)
    }

    fn save(&self) -> Result<(), FaceDbError> {
        let mut state = self.state.lock();
        self.persist(&mut state)
    }
}
