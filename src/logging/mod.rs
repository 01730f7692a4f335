use std::{
    fs,
    fs::File,
    io,
    io::prelude::Write as _,
    path::{Path, PathBuf},
    sync::Mutex,
    thread,
    time::SystemTime,
};

use log::{LevelFilter, Log, SetLoggerError};
use thiserror::Error;

use crate::ext::MutexExt;

#[derive(Debug, Error)]
pub enum LoggerInitErr {
    #[error("unable to create log file: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    SetLogger(#[from] SetLoggerError),
}

/// installs a [`Logger`] writing to a new file in `log_folder` as the global logger
pub fn init(
    log_folder: impl AsRef<Path>,
    name: impl AsRef<str>,
    max_level: LevelFilter,
) -> Result<PathBuf, LoggerInitErr> {
    let logger = Logger::new(log_folder, name, max_level)?;
    let path = logger.path.clone();
    log::set_boxed_logger(Box::new(logger))?;
    log::set_max_level(max_level);
    Ok(path)
}

/// appends every record to one file per run
pub struct Logger {
    max_level: LevelFilter,
    path: PathBuf,
    log_file: Mutex<File>,
}

impl Logger {
    pub fn new(
        log_folder: impl AsRef<Path>,
        name: impl AsRef<str>,
        max_level: LevelFilter,
    ) -> io::Result<Self> {
        let folder = log_folder.as_ref();
        fs::create_dir_all(folder)?;
        // NOTE: `:` is not allowed in windows file names
        let timestamp = humantime::format_rfc3339_seconds(SystemTime::now())
            .to_string()
            .replace(':', "-");
        let path = folder.join(format!("{}-{}.txt", name.as_ref(), timestamp));
        Ok(Self {
            log_file: Mutex::new(File::options().create(true).append(true).open(&path)?),
            path,
            max_level,
        })
    }

    pub fn path(&self) -> &Path {
        self.path.as_path()
    }
}

impl Log for Logger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= self.max_level
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let current = thread::current();
        let _ = self.log_file.lock_unpoisoned().write_fmt(format_args!(
            "[{}] [{:<5}] [{}] {}\n",
            humantime::format_rfc3339_millis(SystemTime::now()),
            record.level(),
            current.name().unwrap_or("unnamed"),
            record.args(),
        ));
    }

    fn flush(&self) {
        let _ = self.log_file.lock_unpoisoned().flush();
    }
}
