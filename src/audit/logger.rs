use crate::git::handle::TaskId;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::ffi::OsString;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// When the log rolls over and how many rolled files survive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RotationPolicy {
    /// Size at which the current log is rolled before the next write
    pub max_bytes: u64,
    /// Rolled files kept as `<log>.1` (newest) to `<log>.<keep>`
    pub keep: usize,
}

impl Default for RotationPolicy {
    fn default() -> Self {
        Self {
            max_bytes: 10 * 1024 * 1024,
            keep: 3,
        }
    }
}

/// How a recorded command ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Exited(i32),
    /// git could not be launched
    NotStarted,
}

/// One line of the audit log
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditRecord {
    pub at: DateTime<Utc>,
    pub module: String,
    pub cwd: PathBuf,
    pub task: u64,
    pub command: String,
    pub mutating: bool,
    pub outcome: Outcome,
}

impl AuditRecord {
    pub fn new(
        module: &str,
        cwd: &Path,
        task: TaskId,
        command: &str,
        mutating: bool,
        outcome: Outcome,
    ) -> Self {
        Self {
            at: Utc::now(),
            module: module.to_string(),
            cwd: cwd.to_path_buf(),
            task: task.get(),
            command: command.to_string(),
            mutating,
            outcome,
        }
    }
}

/// Append-only JSON lines log of commands run through modules
#[derive(Debug)]
pub struct AuditLogger {
    log_path: PathBuf,
    rotation: RotationPolicy,
}

impl AuditLogger {
    /// Log to `path` with the default rotation, creating parent directories
    pub fn with_path<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let log_path = path.as_ref().to_path_buf();
        if let Some(parent) = log_path.parent() {
            fs::create_dir_all(parent)?;
        }

        Ok(Self {
            log_path,
            rotation: RotationPolicy::default(),
        })
    }

    pub fn with_rotation(mut self, rotation: RotationPolicy) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    pub fn record(&self, record: &AuditRecord) -> io::Result<()> {
        self.rotate_if_needed()?;

        let mut line = serde_json::to_string(record).map_err(io::Error::other)?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)?;
        file.write_all(line.as_bytes())
    }

    fn rolled_path(&self, n: usize) -> PathBuf {
        let mut name = OsString::from(self.log_path.as_os_str());
        name.push(format!(".{}", n));
        PathBuf::from(name)
    }

    /// Shift `<log>.N` to `<log>.N+1`, dropping whatever falls past `keep`
    fn rotate_if_needed(&self) -> io::Result<()> {
        let size = match fs::metadata(&self.log_path) {
            Ok(metadata) => metadata.len(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e),
        };
        if size < self.rotation.max_bytes {
            return Ok(());
        }

        if self.rotation.keep == 0 {
            return fs::remove_file(&self.log_path);
        }

        let oldest = self.rolled_path(self.rotation.keep);
        if oldest.exists() {
            fs::remove_file(&oldest)?;
        }
        for n in (1..self.rotation.keep).rev() {
            let from = self.rolled_path(n);
            if from.exists() {
                fs::rename(&from, self.rolled_path(n + 1))?;
            }
        }
        fs::rename(&self.log_path, self.rolled_path(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::handle::TaskHandle;
    use serde_json::Value;
    use tempfile::TempDir;

    fn record(command: &str, mutating: bool, outcome: Outcome) -> AuditRecord {
        let task = TaskHandle::<()>::ready(Ok(())).id();
        AuditRecord::new("game", Path::new("/work/game"), task, command, mutating, outcome)
    }

    fn lines(path: &Path) -> Vec<Value> {
        fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn test_record_fields() {
        let temp_dir = TempDir::new().unwrap();
        let logger = AuditLogger::with_path(temp_dir.path().join("logs").join("history.log")).unwrap();

        let entry = record("commit -m \"wip\"", true, Outcome::Exited(0));
        logger.record(&entry).unwrap();
        logger.record(&record("status", false, Outcome::NotStarted)).unwrap();

        let written = lines(logger.log_path());
        assert_eq!(written.len(), 2);
        assert_eq!(written[0]["module"], "game");
        assert_eq!(written[0]["cwd"], "/work/game");
        assert_eq!(written[0]["task"], entry.task);
        assert_eq!(written[0]["command"], "commit -m \"wip\"");
        assert_eq!(written[0]["mutating"], true);
        assert_eq!(written[0]["outcome"]["exited"], 0);
        assert_eq!(written[1]["mutating"], false);
        assert_eq!(written[1]["outcome"], "not_started");
    }

    #[test]
    fn test_rotation_keeps_newest_files() {
        let temp_dir = TempDir::new().unwrap();
        let log_path = temp_dir.path().join("history.log");
        let logger = AuditLogger::with_path(&log_path).unwrap().with_rotation(RotationPolicy {
            max_bytes: 1,
            keep: 2,
        });

        for n in 1..=4 {
            logger
                .record(&record(&format!("fetch origin-{}", n), true, Outcome::Exited(0)))
                .unwrap();
        }

        let command_in = |path: &Path| lines(path)[0]["command"].as_str().unwrap().to_string();
        assert_eq!(lines(&log_path).len(), 1);
        assert_eq!(command_in(&log_path), "fetch origin-4");
        assert_eq!(command_in(&logger.rolled_path(1)), "fetch origin-3");
        assert_eq!(command_in(&logger.rolled_path(2)), "fetch origin-2");
        assert!(!logger.rolled_path(3).exists());
    }

    #[test]
    fn test_no_rotation_below_limit() {
        let temp_dir = TempDir::new().unwrap();
        let logger = AuditLogger::with_path(temp_dir.path().join("history.log")).unwrap();

        for _ in 0..3 {
            logger.record(&record("add a.txt", true, Outcome::Exited(0))).unwrap();
        }

        assert_eq!(lines(logger.log_path()).len(), 3);
        assert!(!logger.rolled_path(1).exists());
    }

    #[test]
    fn test_keep_zero_discards_old_log() {
        let temp_dir = TempDir::new().unwrap();
        let logger = AuditLogger::with_path(temp_dir.path().join("history.log"))
            .unwrap()
            .with_rotation(RotationPolicy {
                max_bytes: 1,
                keep: 0,
            });

        logger.record(&record("tag v1", true, Outcome::Exited(0))).unwrap();
        logger.record(&record("tag v2", true, Outcome::Exited(128))).unwrap();

        let written = lines(logger.log_path());
        assert_eq!(written.len(), 1);
        assert_eq!(written[0]["outcome"]["exited"], 128);
        assert!(!logger.rolled_path(1).exists());
    }
}
