use {
    seqlog::{Level, LoggerBuilder, LoggerError, MAX_FILE_SIZE},
    std::{
        fs::{self, OpenOptions},
        path::Path,
    },
};

/// Grow `path` to the rotation threshold without writing any data.
fn fill(path: &Path) {
    OpenOptions::new()
        .create(true)
        .write(true)
        .open(path)
        .unwrap()
        .set_len(MAX_FILE_SIZE)
        .unwrap();
}

fn file_names(paths: &[std::path::PathBuf]) -> Vec<String> {
    paths
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect()
}

#[test]
fn info_line_lands_in_first_file() {
    let dir = tempfile::tempdir().unwrap();
    let logger = LoggerBuilder::new(dir.path(), "app").level("INFO").console(false).build().unwrap();

    seqlog::info!(logger => "started");

    let content = fs::read_to_string(dir.path().join("app_0.log")).unwrap();
    assert!(content.ends_with("|INFO|started\n"), "{content:?}");
    assert_eq!(logger.current_file(), dir.path().join("app_0.log"));
}

#[test]
fn file_below_threshold_keeps_being_used() {
    let dir = tempfile::tempdir().unwrap();
    let logger = LoggerBuilder::new(dir.path(), "app").console(false).build().unwrap();

    for i in 0..100 {
        seqlog::info!(logger => "line", i);
    }

    assert_eq!(logger.current_file(), dir.path().join("app_0.log"));
    assert_eq!(file_names(&logger.log_files().unwrap()), ["app_0.log"]);
    let content = fs::read_to_string(dir.path().join("app_0.log")).unwrap();
    assert_eq!(content.lines().count(), 100);
}

#[test]
fn full_file_rotates_to_next_sequence() {
    let dir = tempfile::tempdir().unwrap();
    let logger = LoggerBuilder::new(dir.path(), "app").console(false).build().unwrap();
    seqlog::info!(logger => "before");

    let first = dir.path().join("app_0.log");
    fill(&first);
    seqlog::info!(logger => "after");

    let second = dir.path().join("app_1.log");
    assert_eq!(logger.current_file(), second);
    assert_eq!(fs::metadata(&first).unwrap().len(), MAX_FILE_SIZE);
    let content = fs::read_to_string(&second).unwrap();
    assert_eq!(content.lines().count(), 1);
    assert!(content.ends_with("|INFO|after\n"));
    assert!(logger.health().is_healthy());
}

#[test]
fn rotations_leave_consecutive_files() {
    let dir = tempfile::tempdir().unwrap();
    let logger = LoggerBuilder::new(dir.path(), "app")
        .level(Level::Debug)
        .console(false)
        .build()
        .unwrap();

    let rotations = 3;
    for _ in 0..rotations {
        seqlog::debug!(logger => "filling");
        fill(&logger.current_file());
    }
    seqlog::debug!(logger => "last");

    assert_eq!(
        file_names(&logger.log_files().unwrap()),
        ["app_debug_0.log", "app_debug_1.log", "app_debug_2.log", "app_debug_3.log"]
    );
}

#[test]
fn failed_rotation_is_recorded_and_keeps_current_file() {
    let dir = tempfile::tempdir().unwrap();
    let first = dir.path().join("app_0.log");
    let logger = LoggerBuilder::new(dir.path(), "app").console(false).build().unwrap();
    fill(&first);
    // A directory where the next log file should go makes the open fail.
    fs::create_dir(dir.path().join("app_1.log")).unwrap();

    seqlog::info!(logger => "one");
    let health = logger.health();
    assert_eq!(health.faults, 1);
    assert!(health.last_fault.as_deref().unwrap().contains("app_1.log"), "{health:?}");
    assert_eq!(logger.current_file(), first);

    seqlog::info!(logger => "two");
    let health = logger.health();
    assert_eq!(health.faults, 2);
    assert!(!health.is_healthy());
    assert_eq!(logger.current_file(), first);
}

#[test]
fn reinit_resumes_at_first_file_that_is_not_full() {
    let dir = tempfile::tempdir().unwrap();
    fill(&dir.path().join("app_0.log"));
    fs::write(dir.path().join("app_1.log"), "existing\n").unwrap();

    let logger = LoggerBuilder::new(dir.path(), "app").console(false).build().unwrap();
    assert_eq!(logger.current_file(), dir.path().join("app_1.log"));
    seqlog::info!(logger => "appended");

    let content = fs::read_to_string(dir.path().join("app_1.log")).unwrap();
    assert!(content.starts_with("existing\n"));
    assert!(content.ends_with("|INFO|appended\n"));

    // Re-initializing scans from 0 again and lands on the same file.
    logger.set(dir.path(), "INFO", "app").unwrap();
    assert_eq!(logger.current_file(), dir.path().join("app_1.log"));
}

#[test]
fn reinit_switches_level_and_name() {
    let dir = tempfile::tempdir().unwrap();
    let logger = LoggerBuilder::new(dir.path(), "app").console(false).build().unwrap();

    logger.set(dir.path(), Level::Debug, "other").unwrap();
    assert_eq!(logger.level(), Level::Debug);
    assert_eq!(logger.current_file(), dir.path().join("other_debug_0.log"));
}

#[test]
fn vanished_file_moves_to_next_sequence() {
    let dir = tempfile::tempdir().unwrap();
    let logger = LoggerBuilder::new(dir.path(), "app").console(false).build().unwrap();
    seqlog::info!(logger => "first");

    fs::remove_file(dir.path().join("app_0.log")).unwrap();
    seqlog::info!(logger => "second");

    assert_eq!(logger.current_file(), dir.path().join("app_1.log"));
    assert!(!dir.path().join("app_0.log").exists());
    let content = fs::read_to_string(dir.path().join("app_1.log")).unwrap();
    assert!(content.ends_with("|INFO|second\n"));
}

#[test]
fn missing_directory_is_created() {
    let dir = tempfile::tempdir().unwrap();
    let nested = dir.path().join("a").join("b");
    let logger = LoggerBuilder::new(&nested, "app").console(false).build().unwrap();

    seqlog::info!(logger => "hello");
    assert!(nested.join("app_0.log").is_file());
}

#[test]
fn unusable_directory_fails_to_build() {
    let dir = tempfile::tempdir().unwrap();
    let not_a_dir = dir.path().join("plain-file");
    fs::write(&not_a_dir, "").unwrap();

    let result = LoggerBuilder::new(not_a_dir.join("logs"), "app").console(false).build();
    assert!(matches!(
        result,
        Err(LoggerError::CreateDirectoryFailed(..)) | Err(LoggerError::CreateFileFailed(..))
    ));
}

#[cfg(unix)]
#[test]
fn file_mode_is_applied() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    let logger = LoggerBuilder::new(dir.path(), "app")
        .file_mode(0o640)
        .console(false)
        .build()
        .unwrap();

    let mode = fs::metadata(logger.current_file()).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o640);
}
