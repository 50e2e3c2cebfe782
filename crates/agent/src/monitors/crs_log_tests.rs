// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::monitors::testutil::test_uploads;
use crs_core::SystemClock;
use std::io::Write as _;

#[tokio::test]
async fn flush_ships_only_new_bytes() {
    let uploads = test_uploads();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "first line").unwrap();
    file.flush().unwrap();

    let monitor = CrsLogMonitor::new(
        Arc::clone(&uploads),
        &ArtifactIdAllocator::new(),
        file.path().to_path_buf(),
        &SystemClock,
    );

    assert_eq!(monitor.flush(), 11);
    assert_eq!(uploads.pending(), 1);

    // Nothing new: no post.
    assert_eq!(monitor.flush(), 0);

    writeln!(file, "second").unwrap();
    file.flush().unwrap();
    assert_eq!(monitor.flush(), 7);
    assert_eq!(uploads.pending(), 2);
}

#[tokio::test]
async fn missing_log_file_is_harmless() {
    let uploads = test_uploads();
    let monitor = CrsLogMonitor::new(
        uploads,
        &ArtifactIdAllocator::new(),
        PathBuf::from("/nonexistent/crs.log"),
        &SystemClock,
    );
    assert_eq!(monitor.flush(), 0);
}
