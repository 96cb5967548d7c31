//! Read-only lesson audit: which pages are missing the shared quiz, summary
//! and practice components, and whether quiz totals are right.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info};

use crate::core::errors::Result;
use crate::core::file_utils::{files_in_dir, relative_slash_path, FileReader};
use crate::core::page::Site;
use crate::lazy_regex;
use crate::transforms::scripts::has_practice_section;

/// Problems the audit reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueCode {
    /// Quiz page without `quiz-bridge.js`
    MissingQuizBridgeJs,
    /// Quiz page without `QuizBridge.init`
    MissingQuizBridgeInit,
    /// `totalQuestions` disagrees with the page
    WrongTotalQuestions,
    /// `QuizBridge.init` not guarded by `document.readyState`
    MissingReadyState,
    /// No `lesson-summary.js`
    MissingLessonSummaryJs,
    /// No `LessonSummary.init`
    MissingLessonSummaryInit,
    /// `LessonSummary.init` without its container
    MissingLessonSummaryDiv,
    /// Practice page without `practice-simple.js`
    MissingPracticeSimpleJs,
    /// Practice page without `PracticeSimple.init`
    MissingPracticeSimpleInit,
}

impl IssueCode {
    /// Upper-case code as printed in reports
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueCode::MissingQuizBridgeJs => "MISSING_QUIZ_BRIDGE_JS",
            IssueCode::MissingQuizBridgeInit => "MISSING_QUIZ_BRIDGE_INIT",
            IssueCode::WrongTotalQuestions => "WRONG_TOTAL_QUESTIONS",
            IssueCode::MissingReadyState => "MISSING_READY_STATE",
            IssueCode::MissingLessonSummaryJs => "MISSING_LESSON_SUMMARY_JS",
            IssueCode::MissingLessonSummaryInit => "MISSING_LESSON_SUMMARY_INIT",
            IssueCode::MissingLessonSummaryDiv => "MISSING_LESSON_SUMMARY_DIV",
            IssueCode::MissingPracticeSimpleJs => "MISSING_PRACTICE_SIMPLE_JS",
            IssueCode::MissingPracticeSimpleInit => "MISSING_PRACTICE_SIMPLE_INIT",
        }
    }
}

impl fmt::Display for IssueCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One finding
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LessonIssue {
    /// Issue code
    pub code: IssueCode,
    /// Description
    pub message: String,
}

impl LessonIssue {
    fn new(code: IssueCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Audit result for one lesson
#[derive(Debug, Clone, Serialize)]
pub struct LessonAudit {
    /// Path relative to the content directory
    pub path: String,
    /// Lesson file name
    pub file_name: String,
    /// Findings, empty when the lesson is clean
    pub issues: Vec<LessonIssue>,
    /// Questions counted in the page
    pub actual_questions: usize,
    /// `totalQuestions` passed to `QuizBridge.init`
    pub init_questions: Option<usize>,
    /// Page grades its own quiz inline
    pub has_quiz: bool,
    /// Page has practice exercises
    pub has_practice: bool,
}

/// Whole-site audit
#[derive(Debug, Clone, Default, Serialize)]
pub struct AuditReport {
    /// grade → module → lessons
    pub grades: BTreeMap<String, BTreeMap<String, Vec<LessonAudit>>>,
    /// Lessons scanned
    pub total_lessons: usize,
    /// Lessons with at least one issue
    pub lessons_with_issues: usize,
    /// Occurrences per issue code
    pub issues_by_type: BTreeMap<IssueCode, usize>,
}

impl AuditReport {
    /// Issue counts, most frequent first
    pub fn issues_ranked(&self) -> Vec<(IssueCode, usize)> {
        let mut ranked: Vec<_> = self.issues_by_type.iter().map(|(k, v)| (*k, *v)).collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        ranked
    }

    fn record(&mut self, grade: &str, module: &str, audit: LessonAudit) {
        self.total_lessons += 1;
        if !audit.issues.is_empty() {
            self.lessons_with_issues += 1;
        }
        for issue in &audit.issues {
            *self.issues_by_type.entry(issue.code).or_default() += 1;
        }
        self.grades
            .entry(grade.to_string())
            .or_default()
            .entry(module.to_string())
            .or_default()
            .push(audit);
    }
}

/// Where quiz questions may be counted from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionSources {
    /// `checkAnswer(N,` handlers, `.quiz-question` markup, then `feedbackN` ids
    All,
    /// Handlers, then feedback ids
    HandlersOnly,
}

/// Number of quiz questions on a page
pub fn count_quiz_questions(html: &str, sources: QuestionSources) -> usize {
    let handlers: HashSet<&str> = lazy_regex!(r#"onclick="checkAnswer\((\d+),"#)
        .captures_iter(html)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .collect();
    if !handlers.is_empty() {
        return handlers.len();
    }
    if sources == QuestionSources::All {
        let markup = html.matches(r#"class="quiz-question""#).count();
        if markup > 0 {
            return markup;
        }
    }
    lazy_regex!(r#"id="feedback(\d+)""#)
        .captures_iter(html)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .collect::<HashSet<_>>()
        .len()
}

/// `totalQuestions` passed to `QuizBridge.init`
pub fn quiz_bridge_total(html: &str) -> Option<usize> {
    lazy_regex!(r"QuizBridge\.init\([^,]+,\s*\{\s*totalQuestions:\s*(\d+)")
        .captures(html)
        .and_then(|c| c[1].parse().ok())
}

/// Whether the page defines its own `checkAnswer` function
pub fn has_inline_check_answer(html: &str) -> bool {
    lazy_regex!(r"function\s+checkAnswer\s*\(").is_match(html)
}

/// Audit one lesson's HTML
pub fn audit_lesson(path: &str, file_name: &str, html: &str) -> LessonAudit {
    let mut issues = Vec::new();

    let actual_questions = count_quiz_questions(html, QuestionSources::All);
    let init_questions = quiz_bridge_total(html);
    let has_quiz = has_inline_check_answer(html) && actual_questions > 0;
    let has_practice = has_practice_section(html);
    let has_bridge_init = html.contains("QuizBridge.init");
    let has_summary_init = html.contains("LessonSummary.init");

    if has_quiz {
        if !html.contains("quiz-bridge.js") {
            issues.push(LessonIssue::new(
                IssueCode::MissingQuizBridgeJs,
                "quiz-bridge.js not included",
            ));
        }
        if !has_bridge_init {
            issues.push(LessonIssue::new(
                IssueCode::MissingQuizBridgeInit,
                "QuizBridge.init() not called",
            ));
        }
        if let Some(init) = init_questions.filter(|n| *n != actual_questions) {
            issues.push(LessonIssue::new(
                IssueCode::WrongTotalQuestions,
                format!("totalQuestions={init} but actual={actual_questions}"),
            ));
        }
        if has_bridge_init && !html.contains("document.readyState") {
            issues.push(LessonIssue::new(
                IssueCode::MissingReadyState,
                "No readyState check for QuizBridge.init",
            ));
        }
    }

    if !html.contains("lesson-summary.js") {
        issues.push(LessonIssue::new(
            IssueCode::MissingLessonSummaryJs,
            "lesson-summary.js not included",
        ));
    }
    if !has_summary_init {
        issues.push(LessonIssue::new(
            IssueCode::MissingLessonSummaryInit,
            "LessonSummary.init() not called",
        ));
    }
    if has_summary_init && !html.contains("id=\"lesson-summary\"") {
        issues.push(LessonIssue::new(
            IssueCode::MissingLessonSummaryDiv,
            "No #lesson-summary div for grade display",
        ));
    }

    if has_practice {
        if !html.contains("practice-simple.js") {
            issues.push(LessonIssue::new(
                IssueCode::MissingPracticeSimpleJs,
                "practice-simple.js not included",
            ));
        }
        if !html.contains("PracticeSimple.init") {
            issues.push(LessonIssue::new(
                IssueCode::MissingPracticeSimpleInit,
                "PracticeSimple.init() not called",
            ));
        }
    }

    LessonAudit {
        path: path.to_string(),
        file_name: file_name.to_string(),
        issues,
        actual_questions,
        init_questions,
        has_quiz,
        has_practice,
    }
}

/// Audits every `<grade>/<module>/lectia*.html` in the content directory
pub struct LessonAuditor<'a> {
    site: &'a Site,
}

impl<'a> LessonAuditor<'a> {
    /// Auditor for a site
    pub fn new(site: &'a Site) -> Self {
        Self { site }
    }

    /// Scan all grades
    pub fn audit_all(&self) -> Result<AuditReport> {
        let content = &self.site.content_dir;
        let mut report = AuditReport::default();

        for grade_dir in subdirs(content)? {
            let grade = dir_name(&grade_dir);
            if !grade.starts_with("cls") {
                continue;
            }
            for module_dir in subdirs(&grade_dir)? {
                let module = dir_name(&module_dir);
                let lessons = files_in_dir(&module_dir, "lectia*.html")?;
                debug!("Auditing {} lessons in {}/{}", lessons.len(), grade, module);
                for lesson in lessons {
                    let html = FileReader::read_to_string(&lesson)?;
                    let rel = relative_slash_path(content, &lesson)
                        .unwrap_or_else(|| lesson.display().to_string());
                    let file_name = dir_name(&lesson);
                    report.record(&grade, &module, audit_lesson(&rel, &file_name, &html));
                }
            }
        }

        info!(
            "Audited {} lessons, {} with issues",
            report.total_lessons, report.lessons_with_issues
        );
        Ok(report)
    }
}

fn subdirs(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut dirs: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    dirs.sort();
    Ok(dirs)
}

fn dir_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
