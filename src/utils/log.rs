// src/utils/log.rs

//! Log output target.
//!
//! Every formatted log line goes to stdout and, when `log_file` is set,
//! is appended to that file as well.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

/// Writer that copies everything to stdout and an optional log file.
#[derive(Debug)]
pub struct LogTee {
    file: Option<File>,
}

impl LogTee {
    /// Open the tee, appending to `log_file` if given.
    pub fn open(log_file: Option<&Path>) -> io::Result<Self> {
        let file = match log_file {
            Some(path) => Some(OpenOptions::new().create(true).append(true).open(path)?),
            None => None,
        };
        Ok(Self { file })
    }
}

impl Write for LogTee {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stdout().write_all(buf)?;
        if let Some(file) = self.file.as_mut() {
            file.write_all(buf)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stdout().flush()?;
        if let Some(file) = self.file.as_mut() {
            file.flush()?;
        }
        Ok(())
    }
}
