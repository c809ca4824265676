//! Parallel processing of many deck files.
//!
//! Each worker owns its own raw and typed trees; the schema and session are
//! shared by reference. Results come back in input order.

use crate::converter::Converted;
use crate::error::{DeckError, DeckResult};
use crate::session::{Report, Session};
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use std::path::{Path, PathBuf};

/// Result for one input file.
#[derive(Debug)]
pub struct FileOutcome<T> {
    pub path: PathBuf,
    pub result: DeckResult<T>,
}

/// Counts over a finished batch of checks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub files: usize,
    /// Files that could not be read or decoded.
    pub failed: usize,
    /// Files read but carrying error diagnostics.
    pub with_errors: usize,
    pub clean: usize,
}

impl BatchSummary {
    pub fn is_clean(&self) -> bool {
        self.failed == 0 && self.with_errors == 0
    }
}

/// Parse and validate every file on the global rayon pool.
pub fn process_files<'s, P>(session: &Session<'s>, paths: &[P]) -> Vec<FileOutcome<Report<'s>>>
where
    P: AsRef<Path> + Sync,
{
    let outcomes = run(paths, |path| session.check_file(path));
    let summary = summarize(&outcomes);
    tracing::info!(
        files = summary.files,
        failed = summary.failed,
        with_errors = summary.with_errors,
        "checked batch"
    );
    outcomes
}

/// Like [`process_files`] on a dedicated pool of `jobs` threads.
pub fn process_files_with_jobs<'s, P>(
    session: &Session<'s>,
    paths: &[P],
    jobs: usize,
) -> DeckResult<Vec<FileOutcome<Report<'s>>>>
where
    P: AsRef<Path> + Sync,
{
    let pool = ThreadPoolBuilder::new()
        .num_threads(jobs)
        .build()
        .map_err(|e| DeckError::WorkerPool {
            reason: e.to_string(),
        })?;
    Ok(pool.install(|| process_files(session, paths)))
}

/// Convert every file to a structured tree.
pub fn convert_files<P>(session: &Session<'_>, paths: &[P]) -> Vec<FileOutcome<Converted>>
where
    P: AsRef<Path> + Sync,
{
    let outcomes = run(paths, |path| session.to_structured_file(path));
    tracing::info!(
        files = outcomes.len(),
        failed = outcomes.iter().filter(|o| o.result.is_err()).count(),
        "converted batch"
    );
    outcomes
}

pub fn summarize(outcomes: &[FileOutcome<Report<'_>>]) -> BatchSummary {
    let mut summary = BatchSummary {
        files: outcomes.len(),
        ..BatchSummary::default()
    };
    for outcome in outcomes {
        match &outcome.result {
            Err(_) => summary.failed += 1,
            Ok(report) if report.has_errors() => summary.with_errors += 1,
            Ok(_) => summary.clean += 1,
        }
    }
    summary
}

fn run<P, T, F>(paths: &[P], work: F) -> Vec<FileOutcome<T>>
where
    P: AsRef<Path> + Sync,
    T: Send,
    F: Fn(&Path) -> DeckResult<T> + Sync,
{
    paths
        .par_iter()
        .map(|path| {
            let path = path.as_ref();
            tracing::trace!(path = %path.display(), "processing file");
            FileOutcome {
                path: path.to_path_buf(),
                result: work(path),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use deckhand_core::metadata::load_str;
    use std::fs;

    #[test]
    fn test_batch_keeps_input_order() {
        let schema = load_str(
            "sections:\n  - name: IO\n    parameters:\n      - { name: STEPS, type: integer, min: 1 }\n",
        )
        .unwrap();
        let session = Session::new(&schema);

        let dir = std::env::temp_dir().join(format!("deckhand-batch-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let mut paths = Vec::new();
        for i in 0..8 {
            let path = dir.join(format!("deck{}.dat", i));
            fs::write(&path, format!("--IO\nSTEPS {}\n", i)).unwrap();
            paths.push(path);
        }
        paths.push(dir.join("absent.dat"));

        let outcomes = process_files_with_jobs(&session, &paths, 3).unwrap();
        let returned: Vec<_> = outcomes.iter().map(|o| o.path.clone()).collect();
        assert_eq!(returned, paths);

        let summary = summarize(&outcomes);
        assert_eq!(
            summary,
            BatchSummary {
                files: 9,
                failed: 1,
                with_errors: 1,
                clean: 7,
            }
        );
        assert!(!summary.is_clean());

        let converted = convert_files(&session, &paths[1..2]);
        let tree = &converted[0].result.as_ref().unwrap().tree;
        assert!(tree.contains("IO"));

        fs::remove_dir_all(&dir).unwrap();
    }
}
