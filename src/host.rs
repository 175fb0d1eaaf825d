use std::path::{Path, PathBuf};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// Liveness of the bundle that hosts us (sound assets, store).
///
/// Once invalidated it never comes back in-process; the page has to be
/// reloaded, which here means restarting the companion.
#[derive(Debug, Clone)]
pub struct HostContext {
    valid: Arc<AtomicBool>,
    asset_root: PathBuf,
}

impl HostContext {
    pub fn new(asset_root: impl Into<PathBuf>) -> Self {
        Self {
            valid: Arc::new(AtomicBool::new(true)),
            asset_root: asset_root.into(),
        }
    }

    pub fn asset_root(&self) -> &Path {
        &self.asset_root
    }

    /// Probe the bundle identity: flag still set and the asset root still on disk.
    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::SeqCst) && self.asset_root.is_dir()
    }

    pub fn invalidate(&self) {
        self.valid.store(false, Ordering::SeqCst);
    }

    /// Absolute path of a bundle-relative asset.
    pub fn resolve(&self, relative: &str) -> PathBuf {
        self.asset_root.join(relative)
    }
}
