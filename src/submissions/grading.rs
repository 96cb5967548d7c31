//! Worksheet grading.
//!
//! A worksheet submission answers the items of one lesson, grouped by level
//! (`minim`, `standard`, `performanta`). Multiple-choice items are graded
//! exactly. Open items get a keyword score and are always flagged for a
//! teacher's review.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::Local;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::report::render_report;
use crate::core::config::SubmissionsConfig;
use crate::core::errors::{LearningHubError, Result};
use crate::core::file_utils::{files_in_dir, FileReader, FileWriter};

/// Levels in grading order
pub const LEVELS: [&str; 3] = ["minim", "standard", "performanta"];

/// Score given to open answers below the minimum length
pub const TOO_SHORT_SCORE: f64 = 0.3;

/// Score given to open answers when the item lists no keywords
pub const NO_KEYWORDS_SCORE: f64 = 0.5;

/// A grade's worksheet file (`data/worksheets/<grade>.json`)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Worksheet {
    /// Modules of the grade
    #[serde(default)]
    pub modules: Vec<WorksheetModule>,
}

/// One module of a worksheet
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct WorksheetModule {
    /// Module directory name (`m3-word`)
    #[serde(default)]
    pub module_id: String,
    /// Lessons
    #[serde(default)]
    pub lessons: Vec<WorksheetLesson>,
}

/// Items of one lesson, by level
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct WorksheetLesson {
    /// Lesson stem (`lectia1`)
    pub lesson_id: String,
    /// Level name to level
    #[serde(default)]
    pub levels: BTreeMap<String, WorksheetLevel>,
}

/// Items of one level
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct WorksheetLevel {
    /// Maximum points of the level
    #[serde(default)]
    pub punctaj_max: f64,
    /// Items
    #[serde(default)]
    pub items: Vec<WorksheetItem>,
}

/// One worksheet item
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct WorksheetItem {
    /// Item id, the key of the answer in the submission
    pub id: String,
    /// `mcq`, `short`, `explain`, ...
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Points awarded for a full answer
    #[serde(default)]
    pub points: f64,
    /// Question text
    #[serde(default)]
    pub question: Option<String>,
    /// Task description, used when there is no question
    #[serde(default)]
    pub description: Option<String>,
    /// Index of the right option (`mcq`)
    #[serde(default)]
    pub correct: usize,
    /// Options (`mcq`)
    #[serde(default)]
    pub options: Vec<String>,
    /// Words expected in an open answer
    #[serde(default)]
    pub answer_hints: Vec<String>,
    /// Points expected in an open answer
    #[serde(default)]
    pub key_points: Vec<String>,
}

impl WorksheetItem {
    fn prompt(&self) -> String {
        self.question
            .clone()
            .or_else(|| self.description.clone())
            .unwrap_or_default()
    }

    fn min_length(&self) -> usize {
        match self.kind.as_str() {
            "short" | "explain" => 20,
            _ => 50,
        }
    }
}

/// A student's worksheet answers
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct WorksheetSubmission {
    /// Student identity, kept as submitted
    #[serde(default)]
    pub student: Value,
    /// `grade/module/lesson`, e.g. `cls5/m3-word/lectia1`
    #[serde(default)]
    pub lesson: String,
    /// Submission time, kept as submitted
    #[serde(default)]
    pub timestamp: Value,
    /// Level name to item id to answer
    #[serde(default)]
    pub answers: BTreeMap<String, BTreeMap<String, Value>>,
}

impl WorksheetSubmission {
    /// Grade directory from the lesson path, when it has one
    pub fn grade(&self) -> Option<&str> {
        self.lesson
            .split_once('/')
            .map(|(grade, _)| grade)
            .filter(|g| !g.is_empty())
    }
}

/// Grade of one item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemResult {
    /// Item id
    pub id: String,
    /// Item type
    #[serde(rename = "type")]
    pub kind: String,
    /// Question or description
    pub question: String,
    /// Answer as submitted
    pub student_answer: Value,
    /// Points available
    pub max_points: f64,
    /// 0..=1
    pub score: f64,
    /// Points awarded
    pub points_earned: f64,
    /// Feedback line
    pub feedback: String,
    /// Open answers are always flagged
    #[serde(skip_serializing_if = "Option::is_none")]
    pub needs_review: Option<bool>,
}

/// Grades of one level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelResult {
    /// Item grades
    pub items: Vec<ItemResult>,
    /// Points awarded
    pub points: f64,
    /// Points available
    pub max_points: f64,
}

/// Final numbers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradingSummary {
    /// Points awarded, one decimal
    pub total_points: f64,
    /// Points available
    pub max_points: f64,
    /// Percentage, one decimal
    pub percentage: f64,
    /// Grade from 4 to 10
    pub nota: u8,
    /// Some answer needs a teacher
    pub needs_review: bool,
    /// Level name to "earned any points"
    pub levels_completed: IndexMap<String, bool>,
}

/// Graded worksheet submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradingResult {
    /// Student identity
    pub student: Value,
    /// Lesson path
    pub lesson: String,
    /// Submission time as submitted
    pub timestamp_submission: Value,
    /// Local grading time
    pub timestamp_graded: String,
    /// Level name to level grades
    pub levels: IndexMap<String, LevelResult>,
    /// Final numbers
    pub summary: GradingSummary,
}

/// Verdict of an item grader
#[derive(Debug, Clone, PartialEq)]
pub struct ItemGrade {
    /// 0..=1
    pub score: f64,
    /// Whether the answer is right (`None` for open answers)
    pub correct: Option<bool>,
    /// Feedback line
    pub feedback: String,
}

/// Round to one decimal, ties to even
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round_ties_even() / 10.0
}

/// Null, `false`, `""` and empty containers are unanswered. Whitespace is an
/// answer (it fails the length check instead) and so is MCQ index `0`.
fn is_missing(answer: &Value) -> bool {
    match answer {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        Value::Number(_) => false,
    }
}

/// Grade a multiple-choice answer given as an index, a numeric string or
/// the option text
pub fn grade_mcq(answer: &Value, correct: usize, options: &[String]) -> ItemGrade {
    let right_text = options.get(correct).map(String::as_str).unwrap_or_default();
    let is_correct = match answer {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0 && *f >= 0.0).map(|f| f as u64))
            .is_some_and(|i| i as usize == correct),
        Value::String(s) => match s.trim().parse::<i64>() {
            Ok(i) => i >= 0 && i as usize == correct,
            Err(_) => !right_text.is_empty() && s.trim().to_lowercase() == right_text.trim().to_lowercase(),
        },
        _ => false,
    };
    ItemGrade {
        score: if is_correct { 1.0 } else { 0.0 },
        correct: Some(is_correct),
        feedback: if is_correct {
            "Corect!".to_string()
        } else {
            format!("Raspunsul corect era: {right_text}")
        },
    }
}

/// Keyword score of an open answer
pub fn grade_open(item: &WorksheetItem, answer: &str) -> ItemGrade {
    let lower = answer.to_lowercase();
    let expected: Vec<&String> = item.answer_hints.iter().chain(&item.key_points).collect();
    let found = expected
        .iter()
        .filter(|kw| lower.contains(&kw.to_lowercase()))
        .count();
    let keyword_score = if expected.is_empty() {
        NO_KEYWORDS_SCORE
    } else {
        found as f64 / expected.len() as f64
    };

    let min_length = item.min_length();
    if answer.trim().chars().count() < min_length {
        return ItemGrade {
            score: TOO_SHORT_SCORE,
            correct: None,
            feedback: format!("Raspunsul e prea scurt (minim {min_length} caractere)."),
        };
    }

    ItemGrade {
        score: keyword_score,
        correct: None,
        feedback: format!(
            "Scor automat: {:.0}%. Verificare manuala recomandata.",
            keyword_score * 100.0
        ),
    }
}

fn answer_text(answer: &Value) -> String {
    match answer {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Result file written for one submission
#[derive(Debug, Clone)]
pub struct GradedFile {
    /// Grading result
    pub result: GradingResult,
    /// `result_<stem>.json`
    pub result_path: PathBuf,
    /// `report_<stem>.txt`, when requested
    pub report_path: Option<PathBuf>,
}

/// Grade distribution over a folder
#[derive(Debug, Clone, PartialEq)]
pub struct FolderSummary {
    /// Submissions graded
    pub processed: usize,
    /// Mean grade
    pub mean: f64,
    /// Highest grade
    pub max: u8,
    /// Lowest grade
    pub min: u8,
}

/// Grades worksheet submissions against worksheet files
#[derive(Debug, Clone)]
pub struct WorksheetGrader {
    settings: SubmissionsConfig,
    worksheets_dir: PathBuf,
    results_dir: PathBuf,
}

impl WorksheetGrader {
    /// Grader reading worksheets from and writing results to the configured
    /// directories under `root`
    pub fn new(root: &Path, settings: &SubmissionsConfig) -> Self {
        Self {
            settings: settings.clone(),
            worksheets_dir: root.join(&settings.worksheets_dir),
            results_dir: root.join(&settings.results_dir),
        }
    }

    /// Write results somewhere other than the configured directory
    pub fn with_results_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.results_dir = dir.into();
        self
    }

    /// Directory results are written to
    pub fn results_dir(&self) -> &Path {
        &self.results_dir
    }

    /// Load `<worksheets_dir>/<grade>.json`
    pub fn load_worksheet(&self, grade: &str) -> Result<Worksheet> {
        let path = self.worksheets_dir.join(format!("{grade}.json"));
        if !path.exists() {
            return Err(LearningHubError::not_found(
                format!("Nu exista worksheet pentru {grade}"),
                &path,
            ));
        }
        FileReader::read_json(&path)
    }

    /// Grade a parsed submission
    pub fn grade(&self, submission: &WorksheetSubmission, worksheet: &Worksheet) -> Result<GradingResult> {
        let parts: Vec<&str> = submission.lesson.split('/').collect();
        let [_, module_id, lesson_id, ..] = parts.as_slice() else {
            return Err(LearningHubError::validation(format!(
                "Format lectie invalid: {}",
                submission.lesson
            )));
        };
        let lesson = find_lesson(worksheet, module_id, lesson_id).ok_or_else(|| {
            LearningHubError::validation(format!("Lectia nu a fost gasita: {lesson_id}"))
        })?;

        let mut levels = IndexMap::new();
        let mut total_points = 0.0;
        let mut max_points = 0.0;
        let mut needs_review = false;

        for level in LEVELS {
            let empty = WorksheetLevel::default();
            let level_data = lesson.levels.get(level).unwrap_or(&empty);
            let answers = submission.answers.get(level);

            let mut items = Vec::with_capacity(level_data.items.len());
            for item in &level_data.items {
                let answer = answers
                    .and_then(|a| a.get(&item.id))
                    .cloned()
                    .unwrap_or(Value::String(String::new()));
                let result = grade_item(item, answer);
                needs_review |= result.needs_review.unwrap_or(false);
                items.push(result);
            }

            let points: f64 = items.iter().map(|i| i.points_earned).sum();
            total_points += points;
            max_points += level_data.punctaj_max;
            levels.insert(
                level.to_string(),
                LevelResult {
                    items,
                    points,
                    max_points: level_data.punctaj_max,
                },
            );
        }

        let percentage = if max_points > 0.0 {
            total_points / max_points * 100.0
        } else {
            0.0
        };

        let levels_completed = levels
            .iter()
            .map(|(name, level)| (name.clone(), level.points > 0.0))
            .collect();

        Ok(GradingResult {
            student: submission.student.clone(),
            lesson: submission.lesson.clone(),
            timestamp_submission: submission.timestamp.clone(),
            timestamp_graded: Local::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string(),
            levels,
            summary: GradingSummary {
                total_points: round1(total_points),
                max_points,
                percentage: round1(percentage),
                nota: self.settings.nota_for(percentage),
                needs_review,
                levels_completed,
            },
        })
    }

    /// Grade one submission file and write `result_<stem>.json` (and
    /// `report_<stem>.txt` when `with_report`). The grade comes from the
    /// lesson path, else from `grade_hint`.
    pub fn grade_file(&self, path: &Path, grade_hint: Option<&str>, with_report: bool) -> Result<GradedFile> {
        if !path.exists() {
            return Err(LearningHubError::not_found("Fisierul nu exista", path));
        }
        let submission: WorksheetSubmission = FileReader::read_json(path)?;
        let grade = submission
            .grade()
            .or(grade_hint)
            .ok_or_else(|| LearningHubError::validation("Nu pot detecta clasa. Specifica --grade"))?;
        let worksheet = self.load_worksheet(grade)?;
        self.grade_and_write(path, &submission, &worksheet, with_report)
    }

    fn grade_and_write(
        &self,
        path: &Path,
        submission: &WorksheetSubmission,
        worksheet: &Worksheet,
        with_report: bool,
    ) -> Result<GradedFile> {
        let result = self.grade(submission, worksheet)?;
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        let result_path = self.results_dir.join(format!("result_{stem}.json"));
        FileWriter::write_json(&result_path, &result)?;
        debug!("Saved {}", result_path.display());

        let report_path = if with_report {
            let report_path = self.results_dir.join(format!("report_{stem}.txt"));
            FileWriter::write_atomic(&report_path, &render_report(&result))?;
            Some(report_path)
        } else {
            None
        };

        Ok(GradedFile {
            result,
            result_path,
            report_path,
        })
    }

    /// Grade every `*.json` in `dir` against the worksheet of `grade`.
    /// Submissions that cannot be graded are logged and skipped.
    pub fn grade_folder(&self, dir: &Path, grade: &str) -> Result<(Vec<GradedFile>, Option<FolderSummary>)> {
        if !dir.is_dir() {
            return Err(LearningHubError::not_found("Folderul nu exista", dir));
        }
        let worksheet = self.load_worksheet(grade)?;
        let files = files_in_dir(dir, "*.json")?;
        info!("Procesez {} submisii...", files.len());

        let mut graded = Vec::with_capacity(files.len());
        for path in &files {
            let outcome = FileReader::read_json::<WorksheetSubmission>(path)
                .and_then(|submission| self.grade_and_write(path, &submission, &worksheet, false));
            match outcome {
                Ok(file) => graded.push(file),
                Err(e) => warn!("Skipping {}: {}", path.display(), e),
            }
        }

        let notes: Vec<u8> = graded.iter().map(|g| g.result.summary.nota).collect();
        let summary = match (notes.iter().max(), notes.iter().min()) {
            (Some(&max), Some(&min)) => Some(FolderSummary {
                processed: notes.len(),
                mean: notes.iter().map(|&n| f64::from(n)).sum::<f64>() / notes.len() as f64,
                max,
                min,
            }),
            _ => None,
        };
        Ok((graded, summary))
    }
}

/// Lesson in `module_id`, else any lesson with the same id
fn find_lesson<'w>(worksheet: &'w Worksheet, module_id: &str, lesson_id: &str) -> Option<&'w WorksheetLesson> {
    let in_module = worksheet
        .modules
        .iter()
        .filter(|m| m.module_id == module_id)
        .flat_map(|m| &m.lessons)
        .find(|l| l.lesson_id == lesson_id);
    in_module.or_else(|| {
        worksheet
            .modules
            .iter()
            .flat_map(|m| &m.lessons)
            .find(|l| l.lesson_id == lesson_id)
    })
}

fn grade_item(item: &WorksheetItem, answer: Value) -> ItemResult {
    let mut result = ItemResult {
        id: item.id.clone(),
        kind: item.kind.clone(),
        question: item.prompt(),
        student_answer: answer,
        max_points: item.points,
        score: 0.0,
        points_earned: 0.0,
        feedback: "Fara raspuns".to_string(),
        needs_review: None,
    };

    if is_missing(&result.student_answer) {
        return result;
    }

    if item.kind == "mcq" {
        let grade = grade_mcq(&result.student_answer, item.correct, &item.options);
        result.score = grade.score;
        result.points_earned = if grade.correct == Some(true) { item.points } else { 0.0 };
        result.feedback = grade.feedback;
    } else {
        let grade = grade_open(item, &answer_text(&result.student_answer));
        result.score = grade.score;
        result.points_earned = round1(item.points * grade.score);
        result.feedback = grade.feedback;
        result.needs_review = Some(true);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn worksheet() -> Worksheet {
        serde_json::from_value(json!({
            "modules": [{
                "module_id": "m3-word",
                "lessons": [{
                    "lesson_id": "lectia1",
                    "levels": {
                        "minim": {
                            "punctaj_max": 4,
                            "items": [
                                {"id": "m1", "type": "mcq", "points": 2, "question": "Ce este Word?",
                                 "options": ["Editor de text", "Browser"], "correct": 0},
                                {"id": "m2", "type": "mcq", "points": 2, "question": "Salvare?",
                                 "options": ["Ctrl+S", "Ctrl+P"], "correct": 0}
                            ]
                        },
                        "standard": {
                            "punctaj_max": 3,
                            "items": [
                                {"id": "s1", "type": "short", "points": 3, "question": "Ce face Bold?",
                                 "answer_hints": ["ingroasa"], "key_points": ["text"]}
                            ]
                        },
                        "performanta": {
                            "punctaj_max": 3,
                            "items": [
                                {"id": "p1", "type": "project", "points": 3, "description": "Creeaza un document"}
                            ]
                        }
                    }
                }]
            }]
        }))
        .unwrap()
    }

    fn submission(answers: Value) -> WorksheetSubmission {
        serde_json::from_value(json!({
            "student": {"name": "Ana", "class": "5A"},
            "lesson": "cls5/m3-word/lectia1",
            "timestamp": "2026-01-19T10:00:00",
            "answers": answers
        }))
        .unwrap()
    }

    fn grader(root: &Path) -> WorksheetGrader {
        WorksheetGrader::new(root, &SubmissionsConfig::default())
    }

    #[test]
    fn test_mcq_answer_forms() {
        let options = vec!["Editor de text".to_string(), "Browser".to_string()];
        assert_eq!(grade_mcq(&json!(0), 0, &options).correct, Some(true));
        assert_eq!(grade_mcq(&json!("0"), 0, &options).correct, Some(true));
        assert_eq!(grade_mcq(&json!("  editor DE text "), 0, &options).correct, Some(true));
        let wrong = grade_mcq(&json!(1), 0, &options);
        assert_eq!(wrong.correct, Some(false));
        assert_eq!(wrong.feedback, "Raspunsul corect era: Editor de text");
        assert_eq!(grade_mcq(&json!(true), 0, &options).correct, Some(false));
    }

    #[test]
    fn test_open_answer_scoring() {
        let item = WorksheetItem {
            id: "s1".to_string(),
            kind: "short".to_string(),
            points: 3.0,
            answer_hints: vec!["ingroasa".to_string()],
            key_points: vec!["text".to_string(), "litere".to_string()],
            ..Default::default()
        };
        let short = grade_open(&item, "ingroasa");
        assert_relative_eq!(short.score, TOO_SHORT_SCORE);
        assert_eq!(short.feedback, "Raspunsul e prea scurt (minim 20 caractere).");

        let ok = grade_open(&item, "Bold ingroasa textul selectat");
        assert_relative_eq!(ok.score, 2.0 / 3.0);
        assert_eq!(ok.feedback, "Scor automat: 67%. Verificare manuala recomandata.");

        let no_keywords = WorksheetItem {
            kind: "project".to_string(),
            ..Default::default()
        };
        let long = "a".repeat(50);
        assert_relative_eq!(grade_open(&no_keywords, &long).score, NO_KEYWORDS_SCORE);
    }

    #[test]
    fn test_blank_and_whitespace_answers() {
        let item = WorksheetItem {
            id: "s1".to_string(),
            kind: "short".to_string(),
            points: 3.0,
            ..Default::default()
        };
        let empty = grade_item(&item, json!(""));
        assert_eq!(empty.feedback, "Fara raspuns");
        assert_eq!(empty.needs_review, None);

        let spaces = grade_item(&item, json!("   "));
        assert_relative_eq!(spaces.score, TOO_SHORT_SCORE);
        assert_relative_eq!(spaces.points_earned, 0.9);
        assert_eq!(spaces.needs_review, Some(true));

        let mcq = WorksheetItem {
            kind: "mcq".to_string(),
            points: 2.0,
            options: vec!["A".to_string(), "B".to_string()],
            ..Default::default()
        };
        assert_eq!(grade_item(&mcq, json!(0)).feedback, "Corect!");
        assert_eq!(grade_item(&mcq, json!([])).feedback, "Fara raspuns");
    }

    #[test]
    fn test_grade_full_submission() {
        let tmp = TempDir::new().unwrap();
        let sub = submission(json!({
            "minim": {"m1": 0, "m2": "Ctrl+P"},
            "standard": {"s1": "Bold ingroasa literele alese"},
            "performanta": {}
        }));
        let result = grader(tmp.path()).grade(&sub, &worksheet()).unwrap();

        let minim = &result.levels["minim"];
        assert_relative_eq!(minim.points, 2.0);
        assert_eq!(minim.items[0].feedback, "Corect!");

        let standard = &result.levels["standard"];
        // one of two keywords: 3 * 0.5
        assert_relative_eq!(standard.items[0].points_earned, 1.5);
        assert_eq!(standard.items[0].needs_review, Some(true));

        let performanta = &result.levels["performanta"];
        assert_eq!(performanta.items[0].feedback, "Fara raspuns");
        assert_eq!(performanta.items[0].question, "Creeaza un document");

        // 3.5 of 10 points
        assert_relative_eq!(result.summary.total_points, 3.5);
        assert_relative_eq!(result.summary.percentage, 35.0);
        assert_eq!(result.summary.nota, 5);
        assert!(result.summary.needs_review);
        assert_eq!(
            result.summary.levels_completed.keys().collect::<Vec<_>>(),
            vec!["minim", "standard", "performanta"]
        );
        assert!(!result.summary.levels_completed["performanta"]);
    }

    #[test]
    fn test_invalid_lesson_paths() {
        let tmp = TempDir::new().unwrap();
        let mut sub = submission(json!({}));
        sub.lesson = "cls5/lectia1".to_string();
        let err = grader(tmp.path()).grade(&sub, &worksheet()).unwrap_err();
        assert!(err.to_string().contains("Format lectie invalid"));

        sub.lesson = "cls5/m3-word/lectia9".to_string();
        let err = grader(tmp.path()).grade(&sub, &worksheet()).unwrap_err();
        assert!(err.to_string().contains("Lectia nu a fost gasita: lectia9"));
    }

    #[test]
    fn test_grade_file_and_folder() {
        let tmp = TempDir::new().unwrap();
        let sheets = tmp.path().join("data/worksheets");
        fs::create_dir_all(&sheets).unwrap();
        fs::write(
            sheets.join("cls5.json"),
            serde_json::to_string(&worksheet()).unwrap(),
        )
        .unwrap();

        let inbox = tmp.path().join("inbox");
        fs::create_dir_all(&inbox).unwrap();
        let perfect = json!({
            "student": {"name": "Ana"},
            "lesson": "cls5/m3-word/lectia1",
            "answers": {"minim": {"m1": 0, "m2": 0}}
        });
        fs::write(inbox.join("ana.json"), perfect.to_string()).unwrap();
        let blank = json!({"lesson": "cls5/m3-word/lectia1", "answers": {}});
        fs::write(inbox.join("dan.json"), blank.to_string()).unwrap();
        fs::write(inbox.join("junk.json"), "not json").unwrap();

        let grader = grader(tmp.path());
        let graded = grader.grade_file(&inbox.join("ana.json"), None, true).unwrap();
        assert_eq!(graded.result_path, tmp.path().join("results/result_ana.json"));
        let report = fs::read_to_string(graded.report_path.unwrap()).unwrap();
        assert!(report.contains("NOTA: 6"));

        let (files, summary) = grader.grade_folder(&inbox, "cls5").unwrap();
        assert_eq!(files.len(), 2);
        let summary = summary.unwrap();
        assert_eq!(summary.max, 6);
        assert_eq!(summary.min, 4);
        assert_relative_eq!(summary.mean, 5.0);

        let missing = grader.load_worksheet("cls9").unwrap_err();
        assert!(missing.to_string().contains("Nu exista worksheet pentru cls9"));
    }
}
