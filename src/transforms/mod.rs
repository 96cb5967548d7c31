//! Batch page transforms.
//!
//! Each transform is a small, idempotent text edit over a set of pages. The
//! [`runner::BatchRunner`] owns file discovery, writing and bookkeeping, so a
//! transform only decides whether a page needs the edit and what it becomes.

use std::fmt;
use std::str::FromStr;

use crate::core::errors::{LearningHubError, Result};
use crate::core::page::Page;

pub mod fixes;
pub mod lesson_fixer;
pub mod mobile;
pub mod navigation;
pub mod runner;
pub mod scripts;
pub mod upgrade;

/// Which files a transform is offered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Every `.html` under the content directory
    ContentHtml,
    /// `lectia*.html` under the content directory
    Lessons,
    /// Every `.html` under the site root, minus skip dirs
    SiteHtml,
    /// Every `.html` under the content and hub directories
    ContentAndHub,
    /// `index.html` directly inside a `<grade>/<module>` directory
    ModuleIndexes,
}

/// Result of applying a transform to one page
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The page changed
    Updated {
        /// New page content
        content: String,
        /// Human-readable list of edits
        changes: Vec<String>,
    },
    /// Nothing to do, with the reason
    Skipped(String),
}

impl Outcome {
    /// Build an outcome from a possibly-edited copy of `original`
    pub fn from_edit(original: &str, content: String, changes: Vec<String>) -> Self {
        if content == original || changes.is_empty() {
            Outcome::Skipped("no changes needed".to_string())
        } else {
            Outcome::Updated { content, changes }
        }
    }

    /// Shorthand for a skip
    pub fn skip(reason: impl Into<String>) -> Self {
        Outcome::Skipped(reason.into())
    }

    /// Whether the page changed
    pub fn is_updated(&self) -> bool {
        matches!(self, Outcome::Updated { .. })
    }
}

/// An idempotent edit applied to pages one at a time
pub trait PageTransform: Send + Sync {
    /// Stable name used on the command line
    fn name(&self) -> &'static str;

    /// Files offered to the transform
    fn scope(&self) -> Scope;

    /// Edit one page
    fn apply(&self, page: &Page, html: &str) -> Result<Outcome>;
}

/// Every transform the toolkit ships
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransformKind {
    /// Breadcrumb navigation
    Breadcrumbs,
    /// `mobile.css` link
    MobileCss,
    /// Mobile-first stylesheet, skip link, main landmark and lazy images
    MobileFirst,
    /// `evidence-system.js` ahead of `progress.js`
    Evidence,
    /// `quiz.js` with pass thresholds
    Quiz,
    /// RPG progression hooks
    Rpg,
    /// Lesson progress tracking
    Progress,
    /// Module index progress
    ProgressIndex,
    /// `white-space` for code blocks
    CodeBlocks,
    /// Hidden lesson summary container
    LessonSummaryDiv,
    /// Practice exercise script
    PracticeSimple,
    /// Duplicate atom initialisation removal
    AtomicInit,
    /// Scratch block styling and language toggle
    ScratchBlocks,
    /// Combined lesson fixer
    FixLessons,
    /// Lesson summary and progress download for classic lessons
    UpgradeLessons,
}

impl TransformKind {
    /// All kinds, in the order they are listed to users
    pub const ALL: [TransformKind; 15] = [
        TransformKind::Breadcrumbs,
        TransformKind::MobileCss,
        TransformKind::MobileFirst,
        TransformKind::Evidence,
        TransformKind::Quiz,
        TransformKind::Rpg,
        TransformKind::Progress,
        TransformKind::ProgressIndex,
        TransformKind::CodeBlocks,
        TransformKind::LessonSummaryDiv,
        TransformKind::PracticeSimple,
        TransformKind::AtomicInit,
        TransformKind::ScratchBlocks,
        TransformKind::FixLessons,
        TransformKind::UpgradeLessons,
    ];

    /// Command-line name
    pub fn as_str(&self) -> &'static str {
        match self {
            TransformKind::Breadcrumbs => "breadcrumbs",
            TransformKind::MobileCss => "mobile-css",
            TransformKind::MobileFirst => "mobile-first",
            TransformKind::Evidence => "evidence",
            TransformKind::Quiz => "quiz",
            TransformKind::Rpg => "rpg",
            TransformKind::Progress => "progress",
            TransformKind::ProgressIndex => "progress-index",
            TransformKind::CodeBlocks => "code-blocks",
            TransformKind::LessonSummaryDiv => "lesson-summary-div",
            TransformKind::PracticeSimple => "practice-simple",
            TransformKind::AtomicInit => "atomic-init",
            TransformKind::ScratchBlocks => "scratch-blocks",
            TransformKind::FixLessons => "fix-lessons",
            TransformKind::UpgradeLessons => "upgrade-lessons",
        }
    }

    /// One-line description
    pub fn description(&self) -> &'static str {
        match self {
            TransformKind::Breadcrumbs => "Replace back links with breadcrumb navigation",
            TransformKind::MobileCss => "Link assets/css/mobile.css in every page",
            TransformKind::MobileFirst => {
                "Repair mobile stylesheet links, add skip link, main landmark and lazy images"
            }
            TransformKind::Evidence => "Load evidence-system.js before progress.js",
            TransformKind::Quiz => "Add quiz.js with a pass threshold to quiz pages",
            TransformKind::Rpg => "Add RPG progression hooks to lessons",
            TransformKind::Progress => "Add LearningProgress tracking to lessons",
            TransformKind::ProgressIndex => "Add module progress to module index pages",
            TransformKind::CodeBlocks => "Wrap long lines in .code-block styles",
            TransformKind::LessonSummaryDiv => "Add the hidden #lesson-summary container",
            TransformKind::PracticeSimple => "Load practice-simple.js on practice lessons",
            TransformKind::AtomicInit => "Remove the duplicate atom initialisation loop",
            TransformKind::ScratchBlocks => "Add Scratch block styles to Scratch lessons",
            TransformKind::FixLessons => {
                "Lesson summary, practice and quiz bridge fixes in one pass"
            }
            TransformKind::UpgradeLessons => {
                "Add grading summary and a progress download button to classic lessons"
            }
        }
    }

    /// Instantiate the transform
    pub fn build(&self) -> Box<dyn PageTransform> {
        match self {
            TransformKind::Breadcrumbs => Box::new(navigation::Breadcrumbs),
            TransformKind::MobileCss => Box::new(mobile::MobileCss),
            TransformKind::MobileFirst => Box::new(mobile::MobileFirst),
            TransformKind::Evidence => Box::new(scripts::EvidenceScript),
            TransformKind::Quiz => Box::new(scripts::QuizEnhancements),
            TransformKind::Rpg => Box::new(scripts::RpgSystem),
            TransformKind::Progress => Box::new(scripts::ProgressTracking),
            TransformKind::ProgressIndex => Box::new(scripts::ModuleProgress),
            TransformKind::CodeBlocks => Box::new(fixes::CodeBlocks),
            TransformKind::LessonSummaryDiv => Box::new(fixes::LessonSummaryDiv),
            TransformKind::PracticeSimple => Box::new(scripts::PracticeSimple),
            TransformKind::AtomicInit => Box::new(fixes::AtomicInit),
            TransformKind::ScratchBlocks => Box::new(scripts::ScratchBlocks),
            TransformKind::FixLessons => Box::new(lesson_fixer::LessonFixer),
            TransformKind::UpgradeLessons => Box::new(upgrade::LessonUpgrade),
        }
    }
}

impl fmt::Display for TransformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransformKind {
    type Err = LearningHubError;

    fn from_str(s: &str) -> Result<Self> {
        TransformKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| {
                LearningHubError::mismatch(
                    format!("unknown transform '{s}'"),
                    TransformKind::ALL
                        .iter()
                        .map(|k| k.as_str())
                        .collect::<Vec<_>>()
                        .join(", "),
                    s,
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names_roundtrip() {
        for kind in TransformKind::ALL {
            assert_eq!(kind.as_str().parse::<TransformKind>().unwrap(), kind);
            assert_eq!(kind.build().name(), kind.as_str());
        }
        assert!("nope".parse::<TransformKind>().is_err());
    }

    #[test]
    fn test_outcome_from_edit() {
        assert!(!Outcome::from_edit("a", "a".to_string(), vec!["x".into()]).is_updated());
        assert!(!Outcome::from_edit("a", "b".to_string(), vec![]).is_updated());
        assert!(Outcome::from_edit("a", "b".to_string(), vec!["x".into()]).is_updated());
    }
}
