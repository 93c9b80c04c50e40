//! Versioned persisted configuration.
//!
//! Two logical records live in a `cfg/` directory on the device filesystem:
//! the fixed-layout framework config and an opaque, application-owned blob,
//! both described by a metadata record. On boot, a framework-version
//! mismatch rewrites the framework config with defaults and refreshes the
//! metadata; the application blob is left alone unless its size changed.
//!
//! All read-modify-write sequences serialize on one mutex; framework-config
//! reads go through a lock-free shadow.

mod records;

pub use records::{ConnectivityType, DisplayOutput, DisplayType, FwkConfig, LogLevel, Metadata};

use arc_swap::ArcSwap;
use log::{debug, error, LevelFilter};
use parking_lot::{Mutex, MutexGuard};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Built-in framework config version: bumping it invalidates persisted
/// framework configs on the next boot.
pub const FWK_VERSION: u32 = (2 << 8) | 1;

const CONFIG_DIR: &str = "cfg";
const METADATA_FILE: &str = "Metadata";
const FWK_CONFIG_FILE: &str = "fwk_cfg";
const APP_CONFIG_FILE: &str = "app_cfg";

/// Errors surfaced by the config store.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The backing filesystem refused an operation.
    #[error("config persistence failed: {0}")]
    Persist(#[from] std::io::Error),

    /// A persisted record has an impossible layout or value.
    #[error("corrupt config record: {0}")]
    Corrupt(&'static str),
}

struct AppConfig {
    data: Option<Vec<u8>>,
    version: u32,
}

struct Inner {
    metadata: Metadata,
    app: AppConfig,
}

/// The persisted configuration store.
pub struct ConfigStore {
    dir: PathBuf,
    shadow: ArcSwap<FwkConfig>,
    inner: Mutex<Inner>,
}

impl ConfigStore {
    /// Opens (or creates) the `cfg/` directory under `root` and runs the
    /// boot reconciliation sequence.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let dir = root.as_ref().join(CONFIG_DIR);
        let existed = dir.is_dir();
        fs::create_dir_all(&dir)?;

        let mut fwk = FwkConfig::default();
        let mut metadata = Metadata {
            fwk_version: FWK_VERSION,
            fwk_size: FwkConfig::SIZE as u32,
            app_version: 0,
            app_size: 0,
        };
        let mut app = AppConfig {
            data: None,
            version: 0,
        };

        if existed {
            match Self::load_record(&dir, METADATA_FILE, Metadata::SIZE)
                .and_then(|bytes| Metadata::parse(&bytes))
            {
                Ok(stored) if stored.fwk_version == FWK_VERSION => {
                    metadata = stored;
                    fwk = Self::load_record(&dir, FWK_CONFIG_FILE, FwkConfig::SIZE)
                        .and_then(|bytes| FwkConfig::parse(&bytes))?;
                }
                Ok(stored) => {
                    // Version changed: defaults win, the app blob survives.
                    debug!(
                        "framework config version changed ({:#x} -> {:#x}), rewriting defaults",
                        stored.fwk_version, FWK_VERSION
                    );
                    metadata.app_version = stored.app_version;
                    metadata.app_size = stored.app_size;
                    Self::save_record(&dir, FWK_CONFIG_FILE, &fwk.encode())?;
                    Self::save_record(&dir, METADATA_FILE, &metadata.encode())?;
                }
                Err(err) => {
                    error!("could not read metadata: {}", err);
                    Self::save_record(&dir, FWK_CONFIG_FILE, &fwk.encode())?;
                    Self::save_record(&dir, METADATA_FILE, &metadata.encode())?;
                }
            }

            if metadata.app_version != 0 {
                let blob = Self::load_record(&dir, APP_CONFIG_FILE, metadata.app_size as usize)?;
                app.version = metadata.app_version;
                app.data = Some(blob);
            }
        } else {
            // First boot: write defaults, no application data yet.
            Self::save_record(&dir, FWK_CONFIG_FILE, &fwk.encode())?;
            Self::save_record(&dir, METADATA_FILE, &metadata.encode())?;
        }

        Ok(Self {
            dir,
            shadow: ArcSwap::from_pointee(fwk),
            inner: Mutex::new(Inner { metadata, app }),
        })
    }

    fn load_record(dir: &Path, name: &str, expect: usize) -> Result<Vec<u8>, ConfigError> {
        let bytes = fs::read(dir.join(name))?;
        if bytes.len() < expect {
            return Err(ConfigError::Corrupt("record shorter than its layout"));
        }
        Ok(bytes)
    }

    fn save_record(dir: &Path, name: &str, bytes: &[u8]) -> Result<(), ConfigError> {
        fs::write(dir.join(name), bytes)?;
        Ok(())
    }

    fn set_fwk<F>(&self, mutate: F) -> Result<(), ConfigError>
    where
        F: FnOnce(&mut FwkConfig),
    {
        let guard = self.inner.lock();
        let mut cfg = **self.shadow.load();
        mutate(&mut cfg);
        // The shadow updates even when the persist fails, so a caller may
        // retry the save without losing the value.
        self.shadow.store(Arc::new(cfg));
        let result = Self::save_record(&self.dir, FWK_CONFIG_FILE, &cfg.encode());
        drop(guard);
        result
    }

    /// Current log level.
    pub fn log_level(&self) -> LogLevel {
        self.shadow.load().log_level
    }

    /// Persists a new log level.
    pub fn set_log_level(&self, level: LogLevel) -> Result<(), ConfigError> {
        self.set_fwk(|cfg| cfg.log_level = level)
    }

    /// The log level as a `log` crate filter.
    pub fn log_filter(&self) -> LevelFilter {
        match self.log_level() {
            LogLevel::None => LevelFilter::Off,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Verbose => LevelFilter::Trace,
        }
    }

    /// Current display type.
    pub fn display_type(&self) -> DisplayType {
        self.shadow.load().display_type
    }

    /// Persists a new display type.
    pub fn set_display_type(&self, display_type: DisplayType) -> Result<(), ConfigError> {
        self.set_fwk(|cfg| cfg.display_type = display_type)
    }

    /// Current display output route.
    pub fn display_output(&self) -> DisplayOutput {
        self.shadow.load().display_output
    }

    /// Persists a new display output route.
    pub fn set_display_output(&self, output: DisplayOutput) -> Result<(), ConfigError> {
        self.set_fwk(|cfg| cfg.display_output = output)
    }

    /// Current connectivity type.
    pub fn connectivity_type(&self) -> ConnectivityType {
        self.shadow.load().connectivity_type
    }

    /// Persists a new connectivity type.
    pub fn set_connectivity_type(&self, conn: ConnectivityType) -> Result<(), ConfigError> {
        self.set_fwk(|cfg| cfg.connectivity_type = conn)
    }

    /// The stored metadata record.
    pub fn metadata(&self) -> Metadata {
        self.inner.lock().metadata
    }

    /// Version of the application blob; 0 when absent.
    pub fn app_version(&self) -> u32 {
        self.inner.lock().app.version
    }

    /// Size of the application blob in bytes.
    pub fn app_size(&self) -> usize {
        self.inner
            .lock()
            .app
            .data
            .as_ref()
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// Replaces the application blob and its version, then persists blob and
    /// metadata.
    pub fn set_app_data(&self, data: &[u8], version: u32) -> Result<(), ConfigError> {
        let mut inner = self.inner.lock();
        inner.app.data = Some(data.to_vec());
        inner.app.version = version;
        Self::save_record(&self.dir, APP_CONFIG_FILE, data)?;
        inner.metadata.app_version = version;
        inner.metadata.app_size = data.len() as u32;
        Self::save_record(&self.dir, METADATA_FILE, &inner.metadata.encode())
    }

    /// Takes the config lock and borrows the application blob; `None` when
    /// no blob has been stored. The borrow must not outlive the guard.
    pub fn lock_app_data(&self) -> Option<AppDataGuard<'_>> {
        let inner = self.inner.lock();
        inner.app.data.is_some().then(|| AppDataGuard {
            dir: self.dir.clone(),
            inner,
        })
    }
}

/// Exclusive borrow of the application blob; dropping it releases the
/// config lock without saving, [`AppDataGuard::save`] persists first.
pub struct AppDataGuard<'a> {
    dir: PathBuf,
    inner: MutexGuard<'a, Inner>,
}

impl AppDataGuard<'_> {
    /// The blob bytes.
    pub fn data(&self) -> &[u8] {
        self.inner.app.data.as_deref().unwrap_or(&[])
    }

    /// The blob bytes, mutable in place.
    pub fn data_mut(&mut self) -> &mut [u8] {
        self.inner.app.data.as_deref_mut().unwrap_or(&mut [])
    }

    /// Persists the blob, then releases the lock.
    pub fn save(self) -> Result<(), ConfigError> {
        if let Some(data) = self.inner.app.data.as_deref() {
            ConfigStore::save_record(&self.dir, APP_CONFIG_FILE, data)?;
        }
        Ok(())
    }
}
