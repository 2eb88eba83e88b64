//! Resumable ledger: processed-set replay and append-only outcome sinks
//!
//! The success sink doubles as the resume journal: at startup its entity ids
//! become the `ProcessedSet`, and matching input records are excluded from
//! the run entirely. Sink writers are opened once in append mode and written
//! only by the fan-in consumer, so each outcome is a single whole-line
//! append even with six workers in flight.

use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::path::Path;

use crate::error::Result;
use crate::types::{is_entity_id, Outcome};

/// Entity ids already recorded as successful in a prior run.
#[derive(Debug, Default)]
pub struct ProcessedSet {
    ids: HashSet<String>,
}

impl ProcessedSet {
    /// Replay the success sink. A missing file is an empty set: resumability
    /// only requires that an existing sink be honored.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::info!(path = %path.display(), "no success sink yet, starting fresh");
            return Ok(Self::default());
        }

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(path)?;

        let mut ids = HashSet::new();
        for row in reader.records() {
            let row = row?;
            if let Some(entity_id) = row.get(0) {
                if is_entity_id(entity_id) {
                    ids.insert(entity_id.to_string());
                }
            }
        }

        Ok(Self { ids })
    }

    pub fn contains(&self, entity_id: &str) -> bool {
        self.ids.contains(entity_id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Append-only writers for the three outcome sinks.
pub struct Ledger {
    success: csv::Writer<File>,
    failure: csv::Writer<File>,
    redirect: csv::Writer<File>,
}

impl Ledger {
    pub fn open(success: &Path, failure: &Path, redirect: &Path) -> Result<Self> {
        Ok(Self {
            success: append_writer(success)?,
            failure: append_writer(failure)?,
            redirect: append_writer(redirect)?,
        })
    }

    /// Append one outcome to its sink and flush, so a mid-run crash loses at
    /// most the in-flight batch.
    pub fn record(&mut self, outcome: &Outcome) -> Result<()> {
        match outcome {
            Outcome::Success {
                entity_id,
                identifier,
                note,
            } => {
                self.success
                    .write_record([entity_id.as_str(), identifier.as_str(), note.as_str()])?;
                self.success.flush()?;
            }
            Outcome::Failure {
                entity_id,
                identifier,
                reason,
            } => {
                self.failure
                    .write_record([entity_id.as_str(), identifier.as_str(), reason.as_str()])?;
                self.failure.flush()?;
            }
            Outcome::Redirect { entity_id, target } => {
                self.redirect
                    .write_record([entity_id.as_str(), target.as_str()])?;
                self.redirect.flush()?;
            }
        }
        Ok(())
    }
}

fn append_writer(path: &Path) -> Result<csv::Writer<File>> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    Ok(csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_success_sink_is_empty_set() {
        let dir = tempfile::TempDir::new().unwrap();
        let set = ProcessedSet::load(&dir.path().join("success.csv")).unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn replays_entity_ids_from_success_sink() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "Q1,object/a,added").unwrap();
        writeln!(file, "Q2,object/b,already exists").unwrap();
        writeln!(file, "garbage row").unwrap();

        let set = ProcessedSet::load(file.path()).unwrap();
        assert_eq!(set.len(), 2);
        assert!(set.contains("Q1"));
        assert!(set.contains("Q2"));
        assert!(!set.contains("Q3"));
    }

    #[test]
    fn appends_outcomes_to_matching_sinks() {
        let dir = tempfile::TempDir::new().unwrap();
        let success = dir.path().join("success.csv");
        let failure = dir.path().join("failures.csv");
        let redirect = dir.path().join("redirects.csv");

        let mut ledger = Ledger::open(&success, &failure, &redirect).unwrap();
        ledger
            .record(&Outcome::Success {
                entity_id: "Q1".into(),
                identifier: "object/a".into(),
                note: "added".into(),
            })
            .unwrap();
        ledger
            .record(&Outcome::Redirect {
                entity_id: "Q2".into(),
                target: "Q999".into(),
            })
            .unwrap();
        drop(ledger);

        let success_content = std::fs::read_to_string(&success).unwrap();
        assert_eq!(success_content, "Q1,object/a,added\n");
        let redirect_content = std::fs::read_to_string(&redirect).unwrap();
        assert_eq!(redirect_content, "Q2,Q999\n");
        assert_eq!(std::fs::read_to_string(&failure).unwrap(), "");
    }

    #[test]
    fn reopening_appends_rather_than_truncates() {
        let dir = tempfile::TempDir::new().unwrap();
        let success = dir.path().join("success.csv");
        let failure = dir.path().join("failures.csv");
        let redirect = dir.path().join("redirects.csv");

        for entity_id in ["Q1", "Q2"] {
            let mut ledger = Ledger::open(&success, &failure, &redirect).unwrap();
            ledger
                .record(&Outcome::Success {
                    entity_id: entity_id.into(),
                    identifier: "object/a".into(),
                    note: "added".into(),
                })
                .unwrap();
        }

        let set = ProcessedSet::load(&success).unwrap();
        assert_eq!(set.len(), 2);
    }
}
