use crate::backup::artifact::{date_from_encrypted_path, ArtifactNames};
use crate::backup::result_error::result::Result;
use chrono::{Days, NaiveDate};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::fs::read_dir;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use validator::Validate;

/// How expired archives are found
#[derive(Clone, Copy, Default, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RetentionMode {
    /// Walk back one day at a time from the cutoff, probing for the expected
    /// file name, and stop at the first date with no archive. Dates older than
    /// a gap in the daily series are never looked at.
    #[default]
    Probe,
    /// List the archive directory and delete every artifact dated at or before
    /// the cutoff.
    Scan,
}

#[derive(Clone, Validate, Serialize, Deserialize, Debug)]
#[serde(deny_unknown_fields)]
pub struct RetentionConfig {
    /// Archives dated `today - days` or earlier are expired
    #[validate(range(min = 1))]
    pub days: u32,
    #[serde(default)]
    pub mode: RetentionMode,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct PruneReport {
    pub deleted: Vec<PathBuf>,
    pub failed: Vec<PathBuf>,
}

impl RetentionConfig {
    pub fn new(days: u32, mode: RetentionMode) -> Self {
        Self { days, mode }
    }

    /// Last date that is outside the retention window.
    pub fn cutoff(&self, today: NaiveDate) -> Option<NaiveDate> {
        today.checked_sub_days(Days::new(self.days.into()))
    }

    /// Deletes expired archives from `archive_dir`.
    ///
    /// Individual deletion failures are logged and reported, never fatal.
    pub fn prune(&self, archive_dir: &Path, today: NaiveDate) -> Result<PruneReport> {
        let Some(cutoff) = self.cutoff(today) else {
            return Ok(PruneReport::default());
        };
        info!(
            "Pruning archives dated {} or earlier ({:?} mode)",
            cutoff, self.mode
        );

        let report = match self.mode {
            RetentionMode::Probe => probe(archive_dir, cutoff),
            RetentionMode::Scan => scan(archive_dir, cutoff)?,
        };

        info!(
            "Pruned {} archive(s), {} failure(s)",
            report.deleted.len(),
            report.failed.len()
        );
        Ok(report)
    }
}

fn probe(archive_dir: &Path, cutoff: NaiveDate) -> PruneReport {
    let mut report = PruneReport::default();
    let mut date = Some(cutoff);

    while let Some(current) = date {
        let path = ArtifactNames::for_date(current).encrypted_in(archive_dir);
        if !path.exists() {
            break;
        }
        delete(path, &mut report);
        date = current.pred_opt();
    }

    report
}

fn scan(archive_dir: &Path, cutoff: NaiveDate) -> Result<PruneReport> {
    let mut report = PruneReport::default();

    read_dir(archive_dir)?
        .filter_map(|r| r.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter_map(|path| date_from_encrypted_path(&path).map(|date| (date, path)))
        .filter(|(date, _)| *date <= cutoff)
        .sorted_unstable()
        .for_each(|(_, path)| delete(path, &mut report));

    Ok(report)
}

fn delete(path: PathBuf, report: &mut PruneReport) {
    match std::fs::remove_file(&path) {
        Ok(_) => {
            info!("Removing out of retention file {:?}", &path);
            report.deleted.push(path);
        }
        Err(e) => {
            warn!("Failed to delete file {:?}: {}", &path, e);
            report.failed.push(path);
        }
    }
}
