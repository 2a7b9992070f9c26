//! Record of submitted jobs, kept next to the working directory as RON.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Utc};
use ingest_core::JobStatus;
use ingest_logging::{ingest_info, ingest_warn};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub job_id: String,
    pub source_file: String,
    pub sheet: String,
    pub submitted_at: DateTime<Utc>,
    /// Last status observed by this client, in wire spelling.
    #[serde(default)]
    pub last_status: Option<String>,
}

impl LedgerEntry {
    pub fn submitted_now(
        job_id: impl Into<String>,
        source_file: impl Into<String>,
        sheet: impl Into<String>,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            source_file: source_file.into(),
            sheet: sheet.into(),
            submitted_at: Utc::now(),
            last_status: Some(JobStatus::Pending.as_str().to_string()),
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct LedgerFile {
    jobs: Vec<LedgerEntry>,
}

#[derive(Debug)]
pub struct Ledger {
    path: PathBuf,
    entries: Vec<LedgerEntry>,
}

impl Ledger {
    /// Load the ledger at `path`. A missing or unreadable file yields an
    /// empty ledger.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(text) => match ron::from_str::<LedgerFile>(&text) {
                Ok(file) => file.jobs,
                Err(err) => {
                    ingest_warn!("Ignoring unreadable job ledger {:?}: {}", path, err);
                    Vec::new()
                }
            },
            Err(err) if err.kind() == io::ErrorKind::NotFound => Vec::new(),
            Err(err) => {
                ingest_warn!("Failed to read job ledger {:?}: {}", path, err);
                Vec::new()
            }
        };
        Self { path, entries }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    pub fn find(&self, job_id: &str) -> Option<&LedgerEntry> {
        self.entries.iter().find(|entry| entry.job_id == job_id)
    }

    /// Add `entry`, replacing any earlier record of the same job.
    pub fn record(&mut self, entry: LedgerEntry) {
        self.entries.retain(|existing| existing.job_id != entry.job_id);
        self.entries.push(entry);
    }

    /// Returns `false` when the job is not in the ledger.
    pub fn update_status(&mut self, job_id: &str, status: JobStatus) -> bool {
        match self.entries.iter_mut().find(|entry| entry.job_id == job_id) {
            Some(entry) => {
                entry.last_status = Some(status.as_str().to_string());
                true
            }
            None => false,
        }
    }

    /// Write the ledger through a temp file in the same directory, then rename.
    pub fn save(&self) -> anyhow::Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)
            .with_context(|| format!("cannot create ledger directory {}", dir.display()))?;

        let file = LedgerFile {
            jobs: self.entries.clone(),
        };
        let content = ron::ser::to_string_pretty(&file, ron::ser::PrettyConfig::new())
            .context("cannot serialize job ledger")?;

        let mut tmp = NamedTempFile::new_in(&dir)?;
        tmp.write_all(content.as_bytes())?;
        tmp.flush()?;
        tmp.as_file_mut().sync_all()?;
        tmp.persist(&self.path)
            .map_err(|err| err.error)
            .with_context(|| format!("cannot write job ledger {}", self.path.display()))?;

        ingest_info!("Saved {} job(s) to {:?}", self.entries.len(), self.path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use ingest_core::JobStatus;
    use pretty_assertions::assert_eq;

    use super::{Ledger, LedgerEntry};

    #[test]
    fn saved_ledger_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("jobs.ron");

        let mut ledger = Ledger::load(&path);
        assert!(ledger.entries().is_empty());
        ledger.record(LedgerEntry::submitted_now("abc123", "cases.xlsx", "A"));
        ledger.record(LedgerEntry::submitted_now("def456", "cases.xlsx", "B"));
        assert!(ledger.update_status("abc123", JobStatus::Completed));
        assert!(!ledger.update_status("zzz", JobStatus::Failed));
        ledger.save().unwrap();

        let reloaded = Ledger::load(&path);
        assert_eq!(reloaded.entries(), ledger.entries());
        assert_eq!(
            reloaded
                .find("abc123")
                .and_then(|entry| entry.last_status.as_deref()),
            Some("completed")
        );
    }

    #[test]
    fn recording_same_job_replaces_entry() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledger = Ledger::load(dir.path().join("jobs.ron"));
        ledger.record(LedgerEntry::submitted_now("abc123", "old.csv", "old"));
        ledger.record(LedgerEntry::submitted_now("abc123", "new.csv", "new"));

        assert_eq!(ledger.entries().len(), 1);
        assert_eq!(ledger.entries()[0].source_file, "new.csv");
    }

    #[test]
    fn corrupt_ledger_is_treated_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jobs.ron");
        fs::write(&path, "this is not ron").unwrap();

        let mut ledger = Ledger::load(&path);
        assert!(ledger.entries().is_empty());

        ledger.record(LedgerEntry::submitted_now("abc123", "cases.csv", "cases"));
        ledger.save().unwrap();
        assert_eq!(Ledger::load(&path).entries().len(), 1);
    }
}
