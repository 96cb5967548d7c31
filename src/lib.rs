//! # LearningHub tools
//!
//! Maintenance tooling for the LearningHub static site: an ICT curriculum of
//! HTML lessons, quizzes and exercises organised by grade and module.
//!
//! - **Transforms**: idempotent batch edits that insert scripts, navigation
//!   and markup fixes into lesson pages
//! - **Atomic lessons**: conversion of classic lessons into small
//!   quiz-carrying "atoms", plus repair of converted pages
//! - **Extraction**: quiz and practice exercises exported to JSON, and a
//!   content-review analysis of every lesson
//! - **Submissions**: checksum verification, heuristic grading of written
//!   answers and worksheet grading
//! - **Sync**: change detection for the site tree and page preparation for
//!   OneCompiler
//!
//! ## Layout
//!
//! ```text
//! <root>/
//! ├── assets/{css,js}/          shared front-end files
//! ├── content/tic/<grade>/<module>/lectiaN-*.html
//! ├── data/worksheets/<grade>.json
//! └── sync/                     watcher and OneCompiler state
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use learninghub::{BatchRunner, LearningHubConfig, Site, TransformKind};
//!
//! fn main() -> learninghub::Result<()> {
//!     let site = Site::from_config(&LearningHubConfig::default());
//!     let runner = BatchRunner::new(&site).dry_run(true);
//!     let summary = runner.run(TransformKind::Breadcrumbs.build().as_ref())?;
//!     println!("{} pages would change", summary.updated);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(unsafe_code)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

/// Compile a regex literal once and return a `&'static Regex`.
#[macro_export]
macro_rules! lazy_regex {
    ($re:expr $(,)?) => {{
        static RE: ::once_cell::sync::Lazy<::regex::Regex> =
            ::once_cell::sync::Lazy::new(|| ::regex::Regex::new($re).expect("invalid regex literal"));
        &*RE
    }};
}

// Shared building blocks
pub mod core {
    //! Configuration, errors, file handling and the site model.

    pub mod config;
    pub mod errors;
    pub mod file_utils;
    pub mod html;
    pub mod page;
}

// Batch page edits
pub mod transforms;

// Atomic lesson format
pub mod atomic {
    //! Conversion into, and repair of, the atomic lesson format.

    pub mod convert;
    pub mod repair;
}

// JSON exports
pub mod extract {
    //! Exercise extraction and lesson content analysis.

    pub mod analysis;
    pub mod exercises;
    pub mod practice;
}

// Read-only lesson checks
pub mod audit;

// Student submissions
pub mod submissions {
    //! Integrity checks, evaluation and grading of student submissions.

    pub mod checksum;
    pub mod evaluate;
    pub mod grading;
    pub mod report;
}

// Change detection and third-party sync
pub mod sync {
    //! Site change watcher and OneCompiler page preparation.

    pub mod onecompiler;
    pub mod watcher;
}

// Re-export commonly used types
pub use crate::core::config::LearningHubConfig;
pub use crate::core::errors::{LearningHubError, Result, ResultExt};
pub use crate::core::page::{Page, PageInfo, Site};
pub use crate::transforms::runner::{BatchRunner, BatchSummary};
pub use crate::transforms::{Outcome, PageTransform, TransformKind};
