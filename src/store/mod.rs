// src/store/mod.rs
// Persistent state: validator cache, snapshot log, latest projection.
pub mod cache;
pub mod latest;
pub mod log;

use std::fs;
use std::io::{self, Write};
use std::path::Path;

pub use cache::{SourceEntry, ValidatorCache};
pub use latest::{composite_key, rebuild, LatestEntry, Projection};
pub use log::{LoggedObservation, LoggedSnapshot, SnapshotLog};

/// Replace `path` with `bytes` via a sibling temp file, creating parent dirs.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = std::path::PathBuf::from(tmp);
    let mut f = fs::File::create(&tmp)?;
    f.write_all(bytes)?;
    f.sync_all()?;
    fs::rename(tmp, path)?;
    Ok(())
}
