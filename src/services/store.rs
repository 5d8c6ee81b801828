use std::fs;
use std::path::{Path, PathBuf};

use tokio::sync::Mutex;

use crate::error::StoreError;
use crate::models::StateDoc;

/// Durable, crash-safe home of the whole watch document. All reads and
/// mutations go through the async mutex, and every mutation is written back
/// before the lock is released, so two tasks can never interleave mid-write.
pub struct WatchStore {
    path: PathBuf,
    doc: Mutex<StateDoc>,
}

impl WatchStore {
    /// Loads the persisted document, or a default one seeded with
    /// `default_threshold_pct` when the file does not exist. Legacy single
    /// target/stop fields are migrated into `triggers` and the migrated
    /// document is persisted immediately.
    pub fn load(path: &Path, default_threshold_pct: f64) -> Result<Self, StoreError> {
        let mut doc = if path.exists() {
            let raw = fs::read_to_string(path)?;
            serde_json::from_str::<StateDoc>(&raw)?
        } else {
            StateDoc::default()
        };

        let mut dirty = false;

        if doc.default_threshold_pct <= 0.0 {
            doc.default_threshold_pct = default_threshold_pct;
            dirty = true;
        }

        for asset in doc.assets.values_mut() {
            for legacy in [asset.target_price.take(), asset.stop_price.take()] {
                if let Some(level) = legacy {
                    asset.triggers.push(level);
                    dirty = true;
                }
            }
        }

        if dirty {
            persist(path, &doc)?;
        }

        Ok(Self {
            path: path.to_path_buf(),
            doc: Mutex::new(doc),
        })
    }

    /// Runs a read-only closure against the document.
    pub async fn read<R>(&self, f: impl FnOnce(&StateDoc) -> R) -> R {
        let doc = self.doc.lock().await;
        f(&doc)
    }

    /// The only mutation path: applies the closure, then persists the whole
    /// document before returning.
    pub async fn mutate<R>(&self, f: impl FnOnce(&mut StateDoc) -> R) -> Result<R, StoreError> {
        let mut doc = self.doc.lock().await;
        let out = f(&mut doc);
        persist(&self.path, &doc)?;
        Ok(out)
    }
}

// Temp file + rename so a crash never leaves a half-written document. A
// failed write is logged and retried once before giving up.
fn persist(path: &Path, doc: &StateDoc) -> Result<(), StoreError> {
    if let Err(first) = write_once(path, doc) {
        tracing::warn!(error = %first, path = %path.display(), "state write failed, retrying once");
        write_once(path, doc)?;
    }
    Ok(())
}

fn write_once(path: &Path, doc: &StateDoc) -> Result<(), StoreError> {
    let json = serde_json::to_string_pretty(doc)?;

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, json)?;
    fs::rename(&tmp, path)?;
    Ok(())
}
