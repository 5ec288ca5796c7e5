//! # SeqLog
//!
//! SeqLog is a small leveled logger that writes every line to standard output
//! and to a sequence of numbered log files. Files are named
//! `{base}_{N}.log` (or `{base}_debug_{N}.log` at debug level) and a new file
//! is started once the current one reaches [`MAX_FILE_SIZE`] bytes, so that log
//! consumers limited to 32-bit file sizes can still read every file.
//!
//! All writes, size checks and rotations of a [`Logger`] go through one
//! exclusive lock: lines never interleave and two callers can never rotate at
//! the same time.
//!
//! ## Example
//!
//! ```no_run
//! use seqlog::{Level, LoggerBuilder};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let logger = LoggerBuilder::new("./logs", "app")
//!         .level(Level::Debug)
//!         .build()?;
//!
//!     // ./logs/app_debug_0.log
//!     seqlog::debug!(logger => "value=", 5);
//!     Ok(())
//! }
//! ```
//!
//! Programs that prefer a single logger for the whole process call [`set`] once
//! at startup and then use the macros without a target:
//!
//! ```no_run
//! seqlog::set("./logs", "INFO", "app");
//! seqlog::info!("started");
//! ```
use {
    chrono::{DateTime, FixedOffset, Local, Utc},
    regex::Regex,
    std::{
        fmt::{self, Display},
        fs::{self, Permissions},
        io::{self, Write as _},
        path::{Path, PathBuf},
        sync::{OnceLock, PoisonError, RwLock, RwLockWriteGuard},
    },
};

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

/// Size in bytes at which a log file is considered full: `2^31 - 1`, the
/// largest size a signed 32-bit field can hold.
pub const MAX_FILE_SIZE: u64 = i32::MAX as u64;

const RFC1123: &str = "%a, %d %b %Y %H:%M:%S %Z";
const RFC1123_UTC: &str = "%a, %d %b %Y %H:%M:%S UTC";

/// Level of a logger.
///
/// The gate is a plain equality test: debug lines are written only by a
/// `Debug` logger and info lines only by an `Info` logger. There is no mode
/// that writes both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Level {
    Debug,
    #[default]
    Info,
}

impl Level {
    /// The tag written in the level field of every line.
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
        }
    }

    /// Infix between the base name and the sequence number.
    fn file_infix(&self) -> &'static str {
        match self {
            Level::Debug => "_debug_",
            Level::Info => "_",
        }
    }
}

/// Only the exact tag `"DEBUG"` selects debug level; every other tag is info.
impl From<&str> for Level {
    fn from(tag: &str) -> Self {
        if tag == "DEBUG" {
            Level::Debug
        } else {
            Level::Info
        }
    }
}

impl Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Specifies the time zone used for the timestamp field of each line.
///
/// Timestamps follow RFC 1123, e.g. `Mon, 02 Jan 2006 15:04:05 UTC`. For local
/// and fixed zones the zone is written as an offset (`+08:00`).
///
/// # Examples
/// ```
/// use seqlog::TimeZone;
/// use chrono::FixedOffset;
///
/// let utc = TimeZone::UTC;
/// let local = TimeZone::Local;
/// let china = TimeZone::Fix(FixedOffset::east_opt(8 * 3600).unwrap());
/// ```
#[derive(Debug, Clone, Default)]
pub enum TimeZone {
    UTC,
    /// The system's local time zone, looked up on every line.
    #[default]
    Local,
    Fix(FixedOffset),
}

impl TimeZone {
    /// Format `now` in this time zone.
    fn format(&self, now: DateTime<Utc>) -> String {
        match self {
            TimeZone::UTC => now.format(RFC1123_UTC).to_string(),
            TimeZone::Local => now.with_timezone(&Local).format(RFC1123).to_string(),
            TimeZone::Fix(offset) => now.with_timezone(offset).format(RFC1123).to_string(),
        }
    }
}

/// Where a debug line was logged from.
///
/// Built at the call site by [`caller!`], which the [`debug!`] macro invokes
/// for you. Renders as `dir/file.rs:crate::module::function:line`, where `dir`
/// is the last directory of the source path. An unknown caller renders as an
/// empty string.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Caller {
    file: &'static str,
    function: &'static str,
    line: u32,
}

impl Caller {
    pub const fn new(file: &'static str, function: &'static str, line: u32) -> Self {
        Caller { file, function, line }
    }

    pub fn file(&self) -> &'static str {
        self.file
    }

    pub fn function(&self) -> &'static str {
        self.function
    }

    pub fn line(&self) -> u32 {
        self.line
    }
}

impl Display for Caller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.file.is_empty() {
            return Ok(());
        }
        let mut parts = self.file.rsplit(|c: char| c == '/' || c == '\\');
        let file = parts.next().unwrap_or_default();
        match parts.next() {
            Some(dir) if !dir.is_empty() => write!(f, "{dir}/{file}")?,
            _ => f.write_str(file)?,
        }
        write!(f, ":{}:{}", self.function, self.line)
    }
}

/// Turn the type name of the marker function declared by [`caller!`] into the
/// path of the function that contains it.
#[doc(hidden)]
pub fn __function_path(marker: &'static str) -> &'static str {
    let mut path = marker.strip_suffix("::__here").unwrap_or(marker);
    while let Some(outer) = path.strip_suffix("::{{closure}}") {
        path = outer;
    }
    path
}

/// Capture the [`Caller`] at the point of invocation.
#[macro_export]
macro_rules! caller {
    () => {{
        fn __here() {}
        fn __type_name_of<T>(_: T) -> &'static str {
            ::std::any::type_name::<T>()
        }
        $crate::Caller::new(file!(), $crate::__function_path(__type_name_of(__here)), line!())
    }};
}

/// Log a debug line.
///
/// `debug!(logger => a, b, c)` writes to `logger`; `debug!(a, b, c)` writes to
/// the process-wide logger installed by [`set`] and does nothing before that.
/// Values are joined by single spaces.
#[macro_export]
macro_rules! debug {
    () => {
        if let Some(logger) = $crate::global() {
            logger.debug($crate::caller!(), &[])
        }
    };
    ($logger:expr => $($value:expr),* $(,)?) => {
        $logger.debug($crate::caller!(), &[$(&$value as &dyn ::std::fmt::Display),*])
    };
    ($($value:expr),+ $(,)?) => {
        if let Some(logger) = $crate::global() {
            logger.debug($crate::caller!(), &[$(&$value as &dyn ::std::fmt::Display),+])
        }
    };
}

/// Log an info line. Same forms as [`debug!`], without caller context.
#[macro_export]
macro_rules! info {
    () => {
        if let Some(logger) = $crate::global() {
            logger.info(&[])
        }
    };
    ($logger:expr => $($value:expr),* $(,)?) => {
        $logger.info(&[$(&$value as &dyn ::std::fmt::Display),*])
    };
    ($($value:expr),+ $(,)?) => {
        if let Some(logger) = $crate::global() {
            logger.info(&[$(&$value as &dyn ::std::fmt::Display),+])
        }
    };
}

/// The message field: values joined by single spaces, newline terminated.
struct Message<'a>(&'a [&'a dyn Display]);

impl Display for Message<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, value) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{value}")?;
        }
        f.write_str("\n")
    }
}

/// Compose `timestamp|LEVEL|[caller|]message`.
fn format_line(timestamp: &str, level: Level, caller: Option<&Caller>, values: &[&dyn Display]) -> String {
    let message = Message(values);
    match caller {
        Some(caller) => format!("{timestamp}|{level}|{caller}|{message}"),
        None => format!("{timestamp}|{level}|{message}"),
    }
}

/// Best-effort failures swallowed by a [`Logger`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Health {
    /// Number of failures since the logger was built.
    pub faults: u64,
    /// Description of the most recent failure.
    pub last_fault: Option<String>,
}

impl Health {
    pub fn is_healthy(&self) -> bool {
        self.faults == 0
    }
}

/// Something that happened under the lock and is reported once it is released.
enum Event {
    Rotated { from: PathBuf, to: PathBuf },
    Fault(String),
}

impl Event {
    fn emit(self) {
        match self {
            Event::Rotated { from, to } => {
                tracing::debug!(from = %from.display(), to = %to.display(), "rotated log file")
            }
            Event::Fault(fault) => tracing::warn!("{fault}"),
        }
    }
}

/// Settings fixed when the logger is built.
#[derive(Debug, Clone)]
struct LoggerMeta {
    /// The time zone of the timestamp field.
    time_zone: TimeZone,
    /// The file permissions to set on opened log files (Unix-like systems
    /// only), in octal notation (e.g. 0o644). `None` keeps the permissions the
    /// OS gives new files.
    file_mode: Option<u32>,
    /// Whether lines are also written to standard output.
    console: bool,
}

impl Default for LoggerMeta {
    fn default() -> Self {
        LoggerMeta {
            time_zone: TimeZone::Local,
            file_mode: None,
            console: true,
        }
    }
}

impl LoggerMeta {
    /// Find the file to write to, starting at sequence number `start`.
    ///
    /// Probes `{base}{infix}{N}.log` for N = start, start + 1, ... and stops at
    /// the first file that is missing or below [`MAX_FILE_SIZE`]. Files are
    /// assumed not to be edited or renamed by anyone else.
    /// # Returns
    /// The sequence number and path of that file.
    fn resolve_log_path(directory: &Path, base_name: &str, level: Level, start: u64) -> (u64, PathBuf) {
        let mut index = start;
        loop {
            let path = Self::log_path(directory, base_name, level, index);
            match fs::metadata(&path) {
                Ok(metadata) if metadata.len() >= MAX_FILE_SIZE => index += 1,
                _ => return (index, path),
            }
        }
    }

    fn log_path(directory: &Path, base_name: &str, level: Level, index: u64) -> PathBuf {
        directory.join(format!("{base_name}{}{index}.log", level.file_infix()))
    }

    /// Open a log file for appending, creating it if it does not exist.
    /// If the open fails, the parent directory is created (recursively) and
    /// the open retried once, so a missing log directory is not fatal.
    fn create_log_file(&self, log_path: &Path) -> Result<fs::File, LoggerError> {
        let mut open_options = fs::OpenOptions::new();
        open_options.append(true).create(true);

        let mut create_log_file_res = open_options.open(log_path);
        if create_log_file_res.is_err() {
            if let Some(parent) = log_path.parent() {
                fs::create_dir_all(parent)
                    .map_err(|err| LoggerError::CreateDirectoryFailed(parent.to_path_buf(), err.to_string()))?;
                create_log_file_res = open_options.open(log_path);
            }
        }

        let log_file =
            create_log_file_res.map_err(|err| LoggerError::CreateFileFailed(log_path.to_path_buf(), err.to_string()))?;

        self.set_permissions(log_path)?;

        Ok(log_file)
    }

    /// Set the permissions of a log file to the configured file mode.
    ///
    /// Does nothing unless a mode was configured. On non-Unix systems a
    /// warning is emitted instead.
    fn set_permissions(&self, path: &Path) -> Result<(), LoggerError> {
        if let Some(mode) = self.file_mode {
            #[cfg(unix)]
            {
                let perms = Permissions::from_mode(mode);
                fs::set_permissions(path, perms).map_err(|err| LoggerError::SetFilePermissionsError {
                    path: path.to_path_buf(),
                    error: err.to_string(),
                })?
            }
            #[cfg(not(unix))]
            {
                tracing::warn!(mode, path = %path.display(), "setting file permissions is not supported on this platform");
            }
        }
        Ok(())
    }

    /// Resolve the file to write to from `start` and open it.
    fn open_log_file(
        &self,
        directory: &Path,
        base_name: &str,
        level: Level,
        start: u64,
    ) -> Result<(u64, PathBuf, fs::File), LoggerError> {
        let (index, path) = Self::resolve_log_path(directory, base_name, level, start);
        let file = self.create_log_file(&path)?;
        Ok((index, path, file))
    }
}

/// State of a logger, only ever touched under its lock.
struct LogState {
    level: Level,
    directory: PathBuf,
    base_name: String,
    /// The file currently written to.
    curr_file_path: PathBuf,
    /// One past the sequence number of `curr_file_path`; the next resolution
    /// starts probing here. Moves forward only.
    sequence: u64,
    file: fs::File,
    health: Health,
}

impl LogState {
    /// Start from sequence 0 and open the first file that is not full.
    fn open(meta: &LoggerMeta, directory: PathBuf, level: Level, base_name: String) -> Result<Self, LoggerError> {
        let (index, curr_file_path, file) = meta.open_log_file(&directory, &base_name, level, 0)?;
        Ok(LogState {
            level,
            directory,
            base_name,
            curr_file_path,
            sequence: index + 1,
            file,
            health: Health::default(),
        })
    }

    fn fault(&mut self, fault: String, events: &mut Vec<Event>) {
        self.health.faults += 1;
        self.health.last_fault = Some(fault.clone());
        events.push(Event::Fault(fault));
    }

    /// Move on to the next file if the current one has reached
    /// [`MAX_FILE_SIZE`] or is gone from disk.
    ///
    /// The next file is opened before the current handle is released, so
    /// that a failed open leaves the logger writing where it was. Two handles
    /// are open only for that moment: the old one is dropped as soon as the
    /// new one is in place.
    fn rotate_if_full(&mut self, meta: &LoggerMeta, events: &mut Vec<Event>) {
        let full = match fs::metadata(&self.curr_file_path) {
            Ok(metadata) => metadata.len() >= MAX_FILE_SIZE,
            Err(err) if err.kind() == io::ErrorKind::NotFound => true,
            Err(err) => {
                let fault = format!("Failed to stat log file '{}': {}", self.curr_file_path.display(), err);
                self.fault(fault, events);
                false
            }
        };
        if !full {
            return;
        }

        match meta.open_log_file(&self.directory, &self.base_name, self.level, self.sequence) {
            Ok((index, path, file)) => {
                // The old handle is closed when it is dropped here.
                self.file = file;
                let from = std::mem::replace(&mut self.curr_file_path, path.clone());
                self.sequence = index + 1;
                events.push(Event::Rotated { from, to: path });
            }
            Err(err) => self.fault(err.to_string(), events),
        }
    }

    fn write_line(&mut self, meta: &LoggerMeta, line: &str, events: &mut Vec<Event>) {
        if let Err(err) = self.file.write_all(line.as_bytes()) {
            let fault = format!("Failed to write log file '{}': {}", self.curr_file_path.display(), err);
            self.fault(fault, events);
        }
        if meta.console {
            if let Err(err) = io::stdout().lock().write_all(line.as_bytes()) {
                self.fault(format!("Failed to write standard output: {err}"), events);
            }
        }
    }
}

/// A leveled logger writing to standard output and to size-bounded,
/// sequentially numbered log files.
///
/// Build one with [`LoggerBuilder`]. A `Logger` is `Send + Sync`; share it by
/// reference or in an `Arc`.
pub struct Logger {
    meta: LoggerMeta,
    state: RwLock<LogState>,
}

impl Logger {
    /// Every call can rotate, so there is no read-only path: the lock is
    /// always taken exclusively.
    fn lock(&self) -> RwLockWriteGuard<'_, LogState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Re-initialize the logger.
    ///
    /// The sequence restarts at 0 and resolution scans forward to the first
    /// file that is not full, so existing files are appended to rather than
    /// overwritten. On error the logger keeps writing where it was; on
    /// success the previous handle is dropped right after the new file opens.
    /// # Arguments
    /// * `directory` - The directory where the log files are stored.
    /// * `level` - The level, e.g. `Level::Debug` or a tag such as `"INFO"`.
    /// * `base_name` - The prefix of the log file names.
    pub fn set(
        &self,
        directory: impl AsRef<Path>,
        level: impl Into<Level>,
        base_name: impl Into<String>,
    ) -> Result<(), LoggerError> {
        let mut state = self.lock();
        let mut fresh = LogState::open(
            &self.meta,
            directory.as_ref().to_path_buf(),
            level.into(),
            base_name.into(),
        )?;
        fresh.health = std::mem::take(&mut state.health);
        *state = fresh;
        Ok(())
    }

    /// Write a debug line if this is a debug logger. Usually called through
    /// [`debug!`].
    pub fn debug(&self, caller: Caller, values: &[&dyn Display]) {
        self.log(Level::Debug, Some(&caller), values);
    }

    /// Write an info line unless this is a debug logger. Usually called
    /// through [`info!`].
    pub fn info(&self, values: &[&dyn Display]) {
        self.log(Level::Info, None, values);
    }

    fn log(&self, level: Level, caller: Option<&Caller>, values: &[&dyn Display]) {
        let now = Utc::now();
        let mut events = Vec::new();
        {
            let mut state = self.lock();
            if state.level != level {
                return;
            }
            state.rotate_if_full(&self.meta, &mut events);
            let line = format_line(&self.meta.time_zone.format(now), level, caller, values);
            state.write_line(&self.meta, &line, &mut events);
        }
        for event in events {
            event.emit();
        }
    }

    pub fn level(&self) -> Level {
        self.lock().level
    }

    /// Path of the file currently written to.
    pub fn current_file(&self) -> PathBuf {
        self.lock().curr_file_path.clone()
    }

    /// Failures that were not reported to callers of [`debug`](Self::debug)
    /// and [`info`](Self::info).
    pub fn health(&self) -> Health {
        self.lock().health.clone()
    }

    /// List the log files of the current level and base name in the log
    /// directory, ordered by sequence number.
    pub fn log_files(&self) -> Result<Vec<PathBuf>, LoggerError> {
        let (directory, pattern) = {
            let state = self.lock();
            (
                state.directory.clone(),
                format!(r"^{}{}(\d+)\.log$", regex::escape(&state.base_name), state.level.file_infix()),
            )
        };
        let file_pattern = Regex::new(&pattern).map_err(|err| LoggerError::InternalError(err.to_string()))?;

        let files = fs::read_dir(&directory).map_err(LoggerError::FileIOError)?;

        let mut log_files = Vec::new();
        for file in files.flatten() {
            let Some(file_name) = file.file_name().to_str().map(str::to_owned) else {
                continue;
            };
            let Some(index) = file_pattern
                .captures(&file_name)
                .and_then(|captures| captures[1].parse::<u64>().ok())
            else {
                continue;
            };
            if file.metadata().map_err(LoggerError::FileIOError)?.is_file() {
                log_files.push((index, file.path()));
            }
        }
        log_files.sort_by_key(|(index, _)| *index);

        Ok(log_files.into_iter().map(|(_, path)| path).collect())
    }
}

/// Errors that can occur when using the logger.
#[derive(Debug, thiserror::Error)]
pub enum LoggerError {
    #[error("Failed to create directory '{0}': {1}")]
    CreateDirectoryFailed(PathBuf, String),
    #[error("Failed to create file '{0}': {1}")]
    CreateFileFailed(PathBuf, String),
    #[error("Failed to set file permissions for '{path}': {error}")]
    SetFilePermissionsError { path: PathBuf, error: String },
    #[error("File IO error: {0}")]
    FileIOError(#[from] std::io::Error),
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Provides a fluent interface for configuring [`Logger`] instances.
///
/// # Default Configuration
///
/// * Info level
/// * Local system time zone
/// * Lines mirrored to standard output
/// * Standard file permissions
///
/// # Examples
///
/// ```no_run
/// use seqlog::{Level, LoggerBuilder, TimeZone};
///
/// let logger = LoggerBuilder::new("./logs", "app")
///     .level(Level::Debug)
///     .time_zone(TimeZone::UTC)
///     .file_mode(0o640)
///     .console(false)
///     .build()
///     .unwrap();
/// ```
pub struct LoggerBuilder {
    meta: LoggerMeta,
    directory: PathBuf,
    base_name: String,
    level: Level,
}

impl LoggerBuilder {
    /// Create a new logger builder.
    /// # Arguments
    /// * `directory` - The directory where the log files are stored.
    /// * `base_name` - The prefix of the log file names.
    pub fn new(directory: impl AsRef<Path>, base_name: impl Into<String>) -> Self {
        LoggerBuilder {
            meta: LoggerMeta::default(),
            directory: directory.as_ref().to_path_buf(),
            base_name: base_name.into(),
            level: Level::default(),
        }
    }

    /// Set the level. Accepts a [`Level`] or a tag such as `"DEBUG"`.
    pub fn level(self, level: impl Into<Level>) -> Self {
        Self {
            level: level.into(),
            ..self
        }
    }

    /// Set the time zone of the timestamp field.
    pub fn time_zone(self, time_zone: TimeZone) -> Self {
        Self {
            meta: LoggerMeta { time_zone, ..self.meta },
            ..self
        }
    }

    /// Set the file permissions for log files (Unix-like systems only), in
    /// octal notation like chmod, e.g. 0o644 for rw-r--r--.
    pub fn file_mode(self, mode: u32) -> Self {
        Self {
            meta: LoggerMeta {
                file_mode: Some(mode),
                ..self.meta
            },
            ..self
        }
    }

    /// Whether lines are also written to standard output. On by default.
    pub fn console(self, console: bool) -> Self {
        Self {
            meta: LoggerMeta { console, ..self.meta },
            ..self
        }
    }

    /// Build the logger, opening the first log file that is not full.
    pub fn build(self) -> Result<Logger, LoggerError> {
        let state = LogState::open(&self.meta, self.directory, self.level, self.base_name)?;
        Ok(Logger {
            meta: self.meta,
            state: RwLock::new(state),
        })
    }
}

static GLOBAL: OnceLock<Logger> = OnceLock::new();

/// The process-wide logger, once [`set`] has been called.
pub fn global() -> Option<&'static Logger> {
    GLOBAL.get()
}

/// Initialize the process-wide logger used by the target-less forms of
/// [`debug!`] and [`info!`]. Meant to be called once at startup; a later call
/// re-initializes the same logger.
///
/// If two threads race on the very first call, the logger of the one that
/// loses is discarded and its settings are applied to the installed logger,
/// as if it had been the later call.
///
/// A logger that cannot open its file is a failed startup precondition: the
/// error is printed to standard error and the process exits with status 1.
pub fn set(directory: impl AsRef<Path>, level: impl Into<Level>, base_name: impl Into<String>) -> &'static Logger {
    let directory = directory.as_ref().to_path_buf();
    let level = level.into();
    let base_name = base_name.into();
    let result = match GLOBAL.get() {
        Some(logger) => logger.set(directory, level, base_name).map(|()| logger),
        None => LoggerBuilder::new(&directory, base_name.clone())
            .level(level)
            .build()
            .and_then(|built| {
                let mut installed = false;
                let logger = GLOBAL.get_or_init(|| {
                    installed = true;
                    built
                });
                if installed {
                    Ok(logger)
                } else {
                    logger.set(directory, level, base_name).map(|()| logger)
                }
            }),
    };
    match result {
        Ok(logger) => logger,
        Err(err) => {
            eprintln!("Unable to open/create log file: {err}");
            std::process::exit(1);
        }
    }
}
