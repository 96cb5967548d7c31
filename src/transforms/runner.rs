//! Batch execution of a [`PageTransform`] over the site.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};

use super::{Outcome, PageTransform, Scope};
use crate::core::errors::{LearningHubError, Result};
use crate::core::file_utils::{relative_slash_path, FileReader, FileWriter};
use crate::core::page::Site;

/// What happened to one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    /// Written (or would be, in dry-run mode)
    Updated,
    /// Left untouched
    Skipped,
    /// Reading, transforming or writing failed
    Error,
}

/// Per-file record in a batch summary
#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    /// Path relative to the site root
    pub path: String,
    /// Outcome
    pub status: FileStatus,
    /// Changes made, the skip reason, or the error
    pub details: Vec<String>,
}

/// Totals for a batch run
#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    /// Transform name
    pub transform: String,
    /// No files were written
    pub dry_run: bool,
    /// Files changed
    pub updated: usize,
    /// Files left alone
    pub skipped: usize,
    /// Files that failed
    pub errors: usize,
    /// Per-file records, in processing order
    pub files: Vec<FileReport>,
}

impl BatchSummary {
    fn new(transform: &str, dry_run: bool) -> Self {
        Self {
            transform: transform.to_string(),
            dry_run,
            updated: 0,
            skipped: 0,
            errors: 0,
            files: Vec::new(),
        }
    }

    fn record(&mut self, report: FileReport) {
        match report.status {
            FileStatus::Updated => self.updated += 1,
            FileStatus::Skipped => self.skipped += 1,
            FileStatus::Error => self.errors += 1,
        }
        self.files.push(report);
    }

    /// Total files considered
    pub fn total(&self) -> usize {
        self.files.len()
    }
}

/// Applies a transform to every file in its scope
pub struct BatchRunner<'a> {
    site: &'a Site,
    dry_run: bool,
    within: Option<PathBuf>,
}

impl<'a> BatchRunner<'a> {
    /// Runner over `site` that writes changes
    pub fn new(site: &'a Site) -> Self {
        Self {
            site,
            dry_run: false,
            within: None,
        }
    }

    /// Report changes without writing them
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Only touch files at or below `path` (a directory or a single page)
    pub fn within(mut self, path: impl Into<PathBuf>) -> Self {
        self.within = Some(path.into());
        self
    }

    /// Candidate files for a scope, sorted
    pub fn files_for(&self, scope: Scope) -> Result<Vec<PathBuf>> {
        let walker = self.site.walker();
        let content = &self.site.content_dir;
        let files = match scope {
            Scope::ContentHtml => walker.html_files(content)?,
            Scope::Lessons => walker.files_matching(content, "lectia*.html")?,
            Scope::SiteHtml => walker.html_files(&self.site.root)?,
            Scope::ContentAndHub => {
                let mut files = walker.html_files(content)?;
                files.extend(walker.html_files(&self.site.hub_dir)?);
                files
            }
            Scope::ModuleIndexes => module_indexes(content)?,
        };
        match &self.within {
            Some(target) => restrict(files, target),
            None => Ok(files),
        }
    }

    /// Run the transform over its whole scope
    pub fn run(&self, transform: &dyn PageTransform) -> Result<BatchSummary> {
        self.run_with_progress(transform, |_| {})
    }

    /// Run the transform, calling `on_file` after each file
    pub fn run_with_progress<F>(
        &self,
        transform: &dyn PageTransform,
        mut on_file: F,
    ) -> Result<BatchSummary>
    where
        F: FnMut(&FileReport),
    {
        let files = self.files_for(transform.scope())?;
        info!(
            "Running '{}' over {} files{}",
            transform.name(),
            files.len(),
            if self.dry_run { " (dry run)" } else { "" }
        );

        let mut summary = BatchSummary::new(transform.name(), self.dry_run);
        for path in files {
            let report = self.process_file(transform, &path);
            on_file(&report);
            summary.record(report);
        }

        info!(
            "'{}' finished: {} updated, {} skipped, {} errors",
            summary.transform, summary.updated, summary.skipped, summary.errors
        );
        Ok(summary)
    }

    /// Apply the transform to a single file
    pub fn process_file(&self, transform: &dyn PageTransform, path: &Path) -> FileReport {
        let rel = relative_slash_path(&self.site.root, path)
            .unwrap_or_else(|| path.display().to_string());

        match self.try_process(transform, path) {
            Ok(Outcome::Updated { changes, .. }) => {
                debug!("[{}] updated {}", transform.name(), rel);
                FileReport {
                    path: rel,
                    status: FileStatus::Updated,
                    details: changes,
                }
            }
            Ok(Outcome::Skipped(reason)) => {
                debug!("[{}] skipped {}: {}", transform.name(), rel, reason);
                FileReport {
                    path: rel,
                    status: FileStatus::Skipped,
                    details: vec![reason],
                }
            }
            Err(e) => {
                warn!("[{}] failed on {}: {}", transform.name(), rel, e);
                FileReport {
                    path: rel,
                    status: FileStatus::Error,
                    details: vec![e.to_string()],
                }
            }
        }
    }

    fn try_process(&self, transform: &dyn PageTransform, path: &Path) -> Result<Outcome> {
        let html = FileReader::read_to_string(path)?;
        let page = self.site.page(path);
        let outcome = transform
            .apply(&page, &html)
            .map_err(|e| e.with_context(path.display().to_string()))?;
        if let Outcome::Updated { content, .. } = &outcome {
            if !self.dry_run {
                FileWriter::write_atomic(path, content)?;
            }
        }
        Ok(outcome)
    }
}

fn restrict(files: Vec<PathBuf>, target: &Path) -> Result<Vec<PathBuf>> {
    let target = fs::canonicalize(target)
        .map_err(|_| LearningHubError::not_found("no such file or directory", target))?;
    Ok(files
        .into_iter()
        .filter(|p| fs::canonicalize(p).is_ok_and(|p| p.starts_with(&target)))
        .collect())
}

/// `<content>/<cls*>/<m*>/index.html`, sorted
fn module_indexes(content: &Path) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    if !content.is_dir() {
        return Ok(found);
    }
    for grade in sorted_subdirs(content, "cls")? {
        for module in sorted_subdirs(&grade, "m")? {
            let index = module.join("index.html");
            if index.is_file() {
                found.push(index);
            }
        }
    }
    Ok(found)
}

fn sorted_subdirs(dir: &Path, prefix: &str) -> Result<Vec<PathBuf>> {
    let mut dirs: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| {
            p.is_dir()
                && p.file_name()
                    .and_then(|n| n.to_str())
                    .map(|n| n.starts_with(prefix))
                    .unwrap_or(false)
        })
        .collect();
    dirs.sort();
    Ok(dirs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::LearningHubConfig;
    use crate::core::page::Page;
    use tempfile::TempDir;

    struct Shout;

    impl PageTransform for Shout {
        fn name(&self) -> &'static str {
            "shout"
        }

        fn scope(&self) -> Scope {
            Scope::Lessons
        }

        fn apply(&self, _page: &Page, html: &str) -> Result<Outcome> {
            if html.contains("broken") {
                return Err(LearningHubError::transform("shout", "cannot shout"));
            }
            if html.contains("LOUD") {
                return Ok(Outcome::skip("already loud"));
            }
            Ok(Outcome::from_edit(
                html,
                html.to_uppercase(),
                vec!["uppercased".to_string()],
            ))
        }
    }

    fn site_in(dir: &Path) -> Site {
        let mut config = LearningHubConfig::default();
        config.site.root = dir.to_path_buf();
        Site::from_config(&config)
    }

    fn write(dir: &Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_runner_counts_and_writes() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "content/tic/cls5/m1/lectia1.html", "quiet");
        write(tmp.path(), "content/tic/cls5/m1/lectia2.html", "LOUD");
        write(tmp.path(), "content/tic/cls5/m1/lectia3.html", "broken");
        write(tmp.path(), "content/tic/cls5/m1/index.html", "quiet");

        let site = site_in(tmp.path());
        let mut seen = 0;
        let summary = BatchRunner::new(&site)
            .run_with_progress(&Shout, |_| seen += 1)
            .unwrap();

        assert_eq!(seen, 3);
        assert_eq!(summary.updated, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.errors, 1);
        assert_eq!(summary.files[0].path, "content/tic/cls5/m1/lectia1.html");
        assert_eq!(
            fs::read_to_string(tmp.path().join("content/tic/cls5/m1/lectia1.html")).unwrap(),
            "QUIET"
        );
        assert_eq!(
            fs::read_to_string(tmp.path().join("content/tic/cls5/m1/index.html")).unwrap(),
            "quiet"
        );
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "content/tic/cls5/m1/lectia1.html", "quiet");

        let site = site_in(tmp.path());
        let summary = BatchRunner::new(&site).dry_run(true).run(&Shout).unwrap();

        assert!(summary.dry_run);
        assert_eq!(summary.updated, 1);
        assert_eq!(
            fs::read_to_string(tmp.path().join("content/tic/cls5/m1/lectia1.html")).unwrap(),
            "quiet"
        );
    }

    #[test]
    fn test_module_index_scope() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "content/tic/cls5/m1-sisteme/index.html", "");
        write(tmp.path(), "content/tic/cls5/m2-birotice/index.html", "");
        write(tmp.path(), "content/tic/cls5/index.html", "");
        write(tmp.path(), "content/tic/cls5/assets/index.html", "");

        let site = site_in(tmp.path());
        let files = BatchRunner::new(&site)
            .files_for(Scope::ModuleIndexes)
            .unwrap();
        assert_eq!(files.len(), 2);
        assert!(files[0].ends_with("m1-sisteme/index.html"));
    }

    #[test]
    fn test_within_limits_the_batch() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "content/tic/cls5/m1/lectia1.html", "quiet");
        write(tmp.path(), "content/tic/cls5/m2/lectia1.html", "quiet");
        write(tmp.path(), "content/tic/cls6/m1/lectia1.html", "quiet");

        let site = site_in(tmp.path());
        let folder = BatchRunner::new(&site)
            .within(tmp.path().join("content/tic/cls5"))
            .files_for(Scope::Lessons)
            .unwrap();
        assert_eq!(folder.len(), 2);

        let single = BatchRunner::new(&site)
            .within(tmp.path().join("content/tic/cls6/m1/lectia1.html"))
            .run(&Shout)
            .unwrap();
        assert_eq!(single.updated, 1);
        assert_eq!(single.files[0].path, "content/tic/cls6/m1/lectia1.html");

        let missing = BatchRunner::new(&site)
            .within(tmp.path().join("content/tic/cls9"))
            .files_for(Scope::Lessons);
        assert!(missing.is_err());
    }
}
