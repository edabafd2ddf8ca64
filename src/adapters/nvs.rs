//! NVS (Non-Volatile Storage) adapter.
//!
//! Implements [`ModeStorePort`] and [`ConfigPort`].
//!
//! | key        | contents                                   |
//! |------------|--------------------------------------------|
//! | `mode`     | 1 byte mode index, `0xFF` = idle           |
//! | `custom_t` | custom target, `f32` little-endian         |
//! | `thermcfg` | [`ThermalConfig`] as a postcard blob       |
//!
//! - Config validation: every field is range-checked before persistence.
//! - Atomic writes: ESP-IDF NVS commits are atomic per `nvs_commit()`.
//! - The simulation backend is an in-memory map (dev/test only).

use log::{info, warn};

use crate::app::ports::{ConfigPort, ModeStorePort};
use crate::config::ThermalConfig;
use crate::error::StorageError;

#[cfg(not(target_os = "espidf"))]
use std::collections::HashMap;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

const NAMESPACE: &str = "chamberctl";
const MODE_KEY: &str = "mode";
const CUSTOM_TARGET_KEY: &str = "custom_t";
const CONFIG_KEY: &str = "thermcfg";

/// Stored in `mode` for "no active mode".
const IDLE_MARKER: u8 = 0xFF;

#[cfg(target_os = "espidf")]
const MAX_BLOB_SIZE: usize = 512;

pub struct NvsAdapter {
    #[cfg(not(target_os = "espidf"))]
    store: std::cell::RefCell<HashMap<String, Vec<u8>>>,
}

impl NvsAdapter {
    /// Initialise NVS flash.
    ///
    /// On first boot or after a version mismatch the partition is erased
    /// and re-initialised.
    pub fn new() -> Result<Self, StorageError> {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: called once from the main task before any NVS access.
            let ret = unsafe { nvs_flash_init() };
            if ret == ESP_ERR_NVS_NO_FREE_PAGES as i32
                || ret == ESP_ERR_NVS_NEW_VERSION_FOUND as i32
            {
                warn!("NVS: erasing and re-initialising flash partition");
                if unsafe { nvs_flash_erase() } != ESP_OK as i32 {
                    return Err(StorageError::Io);
                }
                if unsafe { nvs_flash_init() } != ESP_OK as i32 {
                    return Err(StorageError::Io);
                }
            } else if ret != ESP_OK as i32 {
                return Err(StorageError::Io);
            }
            info!("NvsAdapter: ESP-IDF NVS initialised");
        }

        #[cfg(not(target_os = "espidf"))]
        info!("NvsAdapter: simulation backend");

        Ok(Self {
            #[cfg(not(target_os = "espidf"))]
            store: std::cell::RefCell::new(HashMap::new()),
        })
    }

    // ── Raw blob access ───────────────────────────────────────

    #[cfg(not(target_os = "espidf"))]
    fn composite_key(key: &str) -> String {
        format!("{}::{}", NAMESPACE, key)
    }

    /// `Ok(None)` when the key has never been written.
    #[cfg(not(target_os = "espidf"))]
    fn read_blob(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.store.borrow().get(&Self::composite_key(key)).cloned())
    }

    #[cfg(not(target_os = "espidf"))]
    fn write_blob(&self, key: &str, data: &[u8]) -> Result<(), StorageError> {
        self.store
            .borrow_mut()
            .insert(Self::composite_key(key), data.to_vec());
        Ok(())
    }

    /// Open the namespace, run `f` with the handle, then close.
    #[cfg(target_os = "espidf")]
    fn with_nvs_handle<F, T>(write: bool, f: F) -> Result<T, i32>
    where
        F: FnOnce(nvs_handle_t) -> Result<T, i32>,
    {
        let ns_buf = c_key(NAMESPACE);
        let mut handle: nvs_handle_t = 0;
        let mode = if write {
            nvs_open_mode_t_NVS_READWRITE
        } else {
            nvs_open_mode_t_NVS_READONLY
        };

        // SAFETY: ns_buf is NUL-terminated; handle is closed below.
        let ret = unsafe { nvs_open(ns_buf.as_ptr() as *const _, mode, &mut handle) };
        if ret != ESP_OK as i32 {
            return Err(ret);
        }
        let result = f(handle);
        unsafe {
            nvs_close(handle);
        }
        result
    }

    #[cfg(target_os = "espidf")]
    fn read_blob(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let key_buf = c_key(key);
        let result = Self::with_nvs_handle(false, |handle| {
            let mut size: usize = 0;
            // First call: size only.
            let ret = unsafe {
                nvs_get_blob(
                    handle,
                    key_buf.as_ptr() as *const _,
                    core::ptr::null_mut(),
                    &mut size,
                )
            };
            if ret != ESP_OK as i32 {
                return Err(ret);
            }
            if size == 0 || size > MAX_BLOB_SIZE {
                return Err(ESP_ERR_INVALID_SIZE as i32);
            }

            let mut buf = vec![0u8; size];
            let ret = unsafe {
                nvs_get_blob(
                    handle,
                    key_buf.as_ptr() as *const _,
                    buf.as_mut_ptr() as *mut _,
                    &mut size,
                )
            };
            if ret != ESP_OK as i32 {
                return Err(ret);
            }
            Ok(buf)
        });

        match result {
            Ok(bytes) => Ok(Some(bytes)),
            // A namespace that was never opened for writing reads as not found too.
            Err(e) if e == ESP_ERR_NVS_NOT_FOUND as i32 => Ok(None),
            Err(e) => {
                warn!("NvsAdapter: read {} failed ({})", key, e);
                Err(StorageError::Io)
            }
        }
    }

    #[cfg(target_os = "espidf")]
    fn write_blob(&self, key: &str, data: &[u8]) -> Result<(), StorageError> {
        let key_buf = c_key(key);
        Self::with_nvs_handle(true, |handle| {
            let ret = unsafe {
                nvs_set_blob(
                    handle,
                    key_buf.as_ptr() as *const _,
                    data.as_ptr() as *const _,
                    data.len(),
                )
            };
            if ret != ESP_OK as i32 {
                return Err(ret);
            }
            let ret = unsafe { nvs_commit(handle) };
            if ret != ESP_OK as i32 {
                return Err(ret);
            }
            Ok(())
        })
        .map_err(|e| {
            warn!("NvsAdapter: write {} failed ({})", key, e);
            StorageError::Io
        })
    }
}

/// NVS keys and namespaces are at most 15 bytes plus NUL.
#[cfg(target_os = "espidf")]
fn c_key(s: &str) -> [u8; 16] {
    let mut buf = [0u8; 16];
    let bytes = s.as_bytes();
    let len = bytes.len().min(15);
    buf[..len].copy_from_slice(&bytes[..len]);
    buf
}

// ── ModeStorePort ─────────────────────────────────────────────

impl ModeStorePort for NvsAdapter {
    fn load_mode(&self) -> Result<Option<u8>, StorageError> {
        match self.read_blob(MODE_KEY)?.as_deref() {
            None | Some([IDLE_MARKER]) => Ok(None),
            Some([index]) => Ok(Some(*index)),
            Some(_) => Err(StorageError::Corrupted),
        }
    }

    fn load_custom_target(&self) -> Result<Option<f32>, StorageError> {
        match self.read_blob(CUSTOM_TARGET_KEY)? {
            None => Ok(None),
            Some(bytes) => {
                let raw: [u8; 4] = bytes
                    .as_slice()
                    .try_into()
                    .map_err(|_| StorageError::Corrupted)?;
                Ok(Some(f32::from_le_bytes(raw)))
            }
        }
    }

    fn save_mode(&mut self, index: Option<u8>) -> Result<(), StorageError> {
        self.write_blob(MODE_KEY, &[index.unwrap_or(IDLE_MARKER)])
    }

    fn save_custom_target(&mut self, target_c: f32) -> Result<(), StorageError> {
        self.write_blob(CUSTOM_TARGET_KEY, &target_c.to_le_bytes())
    }
}

// ── ConfigPort ────────────────────────────────────────────────

impl ConfigPort for NvsAdapter {
    fn load(&self) -> Result<ThermalConfig, StorageError> {
        let bytes = self.read_blob(CONFIG_KEY)?.ok_or(StorageError::NotFound)?;
        let cfg: ThermalConfig =
            postcard::from_bytes(&bytes).map_err(|_| StorageError::Corrupted)?;
        if let Err(e) = cfg.validate() {
            warn!("NvsAdapter: stored config invalid: {}", e);
            return Err(StorageError::ValidationFailed("stored config out of range"));
        }
        info!("NvsAdapter: loaded config ({} bytes)", bytes.len());
        Ok(cfg)
    }

    fn save(&mut self, config: &ThermalConfig) -> Result<(), StorageError> {
        config
            .validate()
            .map_err(|_| StorageError::ValidationFailed("config out of range"))?;
        let bytes = postcard::to_allocvec(config).map_err(|_| StorageError::Io)?;
        self.write_blob(CONFIG_KEY, &bytes)?;
        info!("NvsAdapter: config saved ({} bytes)", bytes.len());
        Ok(())
    }
}

/// Load the stored config, falling back to defaults on any failure.
pub fn load_config_or_default(port: &impl ConfigPort) -> ThermalConfig {
    match port.load() {
        Ok(cfg) => cfg,
        Err(StorageError::NotFound) => {
            info!("no stored config, using defaults");
            ThermalConfig::default()
        }
        Err(e) => {
            warn!("config load failed ({}), using defaults", e);
            ThermalConfig::default()
        }
    }
}
