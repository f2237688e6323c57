//! Per-launch log file for the editor and the headless runner.
//!
//! `init` truncates `<data dir>/PastelPix/pastelpix.log`, so the file only
//! ever describes the latest run. Before `init` the `log_info!`, `log_warn!`
//! and `log_err!` macros are no-ops.

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::{Mutex, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

static SINK: OnceLock<Mutex<File>> = OnceLock::new();

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Level {
    Info,
    Warn,
    Error,
    Panic,
}

impl Level {
    fn tag(self) -> &'static str {
        match self {
            Level::Info => "INFO ",
            Level::Warn => "WARN ",
            Level::Error => "ERROR",
            Level::Panic => "PANIC",
        }
    }
}

/// Append one entry. Does nothing before `init`; write errors are dropped.
pub fn record(level: Level, args: fmt::Arguments<'_>) {
    let Some(sink) = SINK.get() else {
        return;
    };
    let line = format_line(level, now_millis(), &args.to_string());
    if let Ok(mut file) = sink.lock() {
        let _ = file.write_all(line.as_bytes());
    }
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::logger::record($crate::logger::Level::Info, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::logger::record($crate::logger::Level::Warn, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_err {
    ($($arg:tt)*) => {
        $crate::logger::record($crate::logger::Level::Error, format_args!($($arg)*))
    };
}

/// Start logging to the default location, reporting failure on stderr.
pub fn init() {
    let path = crate::io::data_dir().join("PastelPix").join("pastelpix.log");
    if let Err(e) = init_at(&path) {
        eprintln!("pastelpix: cannot open log {}: {}", path.display(), e);
    }
}

/// Start logging to `path` and hook panics into the log. Later calls are
/// ignored once a file is open.
pub fn init_at(path: &Path) -> std::io::Result<()> {
    if SINK.get().is_some() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)?;
    writeln!(
        file,
        "# pastelpix {} log, started at unix {}s\n# {}",
        env!("CARGO_PKG_VERSION"),
        now_millis() / 1000,
        path.display()
    )?;
    if SINK.set(Mutex::new(file)).is_err() {
        return Ok(());
    }

    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        record(Level::Panic, format_args!("{}", info));
        previous(info);
    }));
    Ok(())
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// `HH:MM:SS.mmm LEVEL message`, UTC time of day.
fn format_line(level: Level, millis: u64, msg: &str) -> String {
    let ms = millis % 1000;
    let secs = (millis / 1000) % 86_400;
    format!(
        "{:02}:{:02}:{:02}.{:03} {} {}\n",
        secs / 3600,
        (secs % 3600) / 60,
        secs % 60,
        ms,
        level.tag(),
        msg
    )
}
