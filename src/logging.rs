use anyhow::{Context, Result};
use chrono::Local;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

const LOGS_DIR: &str = "logs";

/// `<output_folder>/logs/novelist_<timestamp>.log`
pub fn log_file_path(output_folder: &str) -> PathBuf {
    Path::new(output_folder)
        .join(LOGS_DIR)
        .join(format!("novelist_{}.log", Local::now().format("%Y%m%d_%H%M%S")))
}

/// Installs the global logger, writing every record to stderr and to a
/// per-run file. `RUST_LOG` still controls the filter; it defaults to `info`.
pub fn init(output_folder: &str) -> Result<PathBuf> {
    let path = log_file_path(output_folder);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let file = File::create(&path)
        .with_context(|| format!("Failed to create log file {}", path.display()))?;

    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .target(env_logger::Target::Pipe(Box::new(Tee {
            primary: io::stderr(),
            secondary: file,
        })))
        .try_init()?;
    Ok(path)
}

/// Duplicates writes into two sinks.
struct Tee<A, B> {
    primary: A,
    secondary: B,
}

impl<A: Write, B: Write> Write for Tee<A, B> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.primary.write_all(buf)?;
        self.secondary.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.primary.flush()?;
        self.secondary.flush()
    }
}
