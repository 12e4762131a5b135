//! Filesystem fixtures shared by the unit tests

use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::time::{Duration, SystemTime};

pub(crate) fn hours_ago(hours: u64) -> SystemTime {
    SystemTime::now() - Duration::from_secs(hours * 60 * 60)
}

/// Write `size` zero bytes to `path` and backdate its mtime
pub(crate) fn create_audio_file(path: &Path, size: usize, modified: SystemTime) {
    let mut file = File::create(path).unwrap();
    file.write_all(&vec![0u8; size]).unwrap();
    file.set_modified(modified).unwrap();
}
