use std::collections::VecDeque;
use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriter;

/// Install the global subscriber: info and above, to stdout and `log` if set.
pub(crate) fn install(log: Option<PathBuf>) -> io::Result<()> {
    let writer = LogWriter::new(log)?;
    tracing_subscriber::fmt()
        .with_writer(writer)
        .with_target(false)
        .with_max_level(Level::INFO)
        .try_init()
        .map_err(|err| io::Error::other(err.to_string()))
}

/// Writes every log line to stdout and, when configured, to a log file.
#[derive(Clone)]
pub(crate) struct LogWriter {
    file: Option<Arc<Mutex<File>>>,
}

impl LogWriter {
    pub(crate) fn new(path: Option<PathBuf>) -> io::Result<Self> {
        let file = path
            .map(File::create)
            .transpose()?
            .map(|file| Arc::new(Mutex::new(file)));
        Ok(Self { file })
    }
}

pub(crate) struct LogWriterGuard {
    file: Option<Arc<Mutex<File>>>,
}

impl<'a> MakeWriter<'a> for LogWriter {
    type Writer = LogWriterGuard;

    fn make_writer(&'a self) -> Self::Writer {
        LogWriterGuard {
            file: self.file.clone(),
        }
    }
}

fn lock_file(file: &Mutex<File>) -> io::Result<MutexGuard<'_, File>> {
    file.lock()
        .map_err(|_| io::Error::other("log file lock poisoned"))
}

impl Write for LogWriterGuard {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stdout().write_all(buf)?;
        if let Some(file) = &self.file {
            lock_file(file)?.write_all(buf)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stdout().flush()?;
        if let Some(file) = &self.file {
            lock_file(file)?.flush()?;
        }
        Ok(())
    }
}

/// Keeps the first `head` step descriptions and a sliding window of the last
/// `tail`, so a failure report shows how the run started and how it ended.
pub(crate) struct EventLog {
    head_limit: usize,
    tail_limit: usize,
    head: Vec<String>,
    tail: VecDeque<String>,
    dropped: u64,
}

impl EventLog {
    pub(crate) fn new(head_limit: usize, tail_limit: usize) -> Self {
        Self {
            head_limit,
            tail_limit,
            head: Vec::with_capacity(head_limit),
            tail: VecDeque::with_capacity(tail_limit),
            dropped: 0,
        }
    }

    pub(crate) fn record(&mut self, message: String) {
        tracing::debug!("{}", message);
        if self.head.len() < self.head_limit {
            self.head.push(message);
            return;
        }
        if self.tail_limit == 0 {
            self.dropped += 1;
            return;
        }
        if self.tail.len() == self.tail_limit {
            self.tail.pop_front();
            self.dropped += 1;
        }
        self.tail.push_back(message);
    }

    pub(crate) fn dump_failure(&self, reason: &str) {
        tracing::error!("FAILURE: {}", reason);
        for line in &self.head {
            tracing::error!("  {}", line);
        }
        if self.dropped > 0 {
            tracing::error!("  ... {} steps omitted ...", self.dropped);
        }
        for line in &self.tail {
            tracing::error!("  {}", line);
        }
    }

    #[cfg(test)]
    pub(crate) fn retained(&self) -> Vec<&str> {
        self.head
            .iter()
            .chain(self.tail.iter())
            .map(String::as_str)
            .collect()
    }
}
