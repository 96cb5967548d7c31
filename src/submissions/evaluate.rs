//! Analysis of verified submissions exported by lesson pages.
//!
//! Quiz items are summarised as-is. Written answers get a keyword and length
//! heuristic with a confidence level that tells the teacher which answers
//! still need a manual read.

use std::path::{Path, PathBuf};

use chrono::Local;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use super::checksum::{verify_file, Verification};
use crate::core::errors::Result;
use crate::core::file_utils::{files_in_dir, FileWriter};

/// Characters of the raw answer kept in the evaluation
pub const RAW_ANSWER_PREVIEW: usize = 500;

/// Suffix of evaluation files written beside submissions
pub const EVALUATION_SUFFIX: &str = "_evaluation.json";

/// Heuristic verdict on one written answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WrittenEvaluation {
    /// 0..=100
    pub score: u32,
    /// How much the score can be trusted
    pub confidence: f64,
    /// Feedback for the student
    pub feedback: String,
    /// Keywords present in the answer
    pub keywords_found: Vec<String>,
    /// Keywords absent from the answer
    pub keywords_missing: Vec<String>,
    /// Answer reached the minimum length
    #[serde(rename = "lengthOK")]
    pub length_ok: bool,
    /// Characters in the answer
    #[serde(skip_serializing_if = "Option::is_none")]
    pub char_count: Option<usize>,
    /// Teacher should read the answer
    pub requires_manual_review: bool,
    /// Start of the answer as written
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_answer: Option<String>,
    /// Question the answer belongs to
    #[serde(default)]
    pub question_text: String,
    /// Scenario shown with the question
    #[serde(default)]
    pub context: String,
}

/// Python-style truthiness of a JSON value
fn truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(a)) => !a.is_empty(),
        Some(Value::Object(o)) => !o.is_empty(),
    }
}

fn text(item: &Value, key: &str) -> String {
    item.get(key).and_then(Value::as_str).unwrap_or_default().to_string()
}

fn strings(item: &Value, key: &str) -> Vec<String> {
    item.get(key)
        .and_then(Value::as_array)
        .map(|list| list.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default()
}

fn feedback_for(score: f64, missing: &[String]) -> String {
    if score >= 80.0 {
        "Raspuns complet si detaliat".to_string()
    } else if score >= 60.0 {
        let listed: Vec<&str> = missing.iter().take(3).map(String::as_str).collect();
        format!("Raspuns bun, lipsesc: {}", listed.join(", "))
    } else if score >= 40.0 {
        "Raspuns partial, lipsesc concepte importante".to_string()
    } else {
        "Raspuns insuficient sau incomplet".to_string()
    }
}

/// Score a practice item with `studentWrittenAnswer`, `keywords` and an
/// optional `minChars` (falls back to `default_min_chars`)
pub fn evaluate_written_answer(item: &Value, default_min_chars: usize) -> WrittenEvaluation {
    let raw = text(item, "studentWrittenAnswer");
    let answer = raw.to_lowercase();
    let keywords = strings(item, "keywords");
    let min_chars = item
        .get("minChars")
        .and_then(Value::as_u64)
        .map(|n| n as usize)
        .unwrap_or(default_min_chars);

    if answer.is_empty() {
        return WrittenEvaluation {
            score: 0,
            confidence: 1.0,
            feedback: "Raspuns lipsa".to_string(),
            keywords_found: Vec::new(),
            keywords_missing: keywords,
            length_ok: false,
            char_count: None,
            requires_manual_review: false,
            raw_answer: None,
            question_text: String::new(),
            context: String::new(),
        };
    }

    let (found, missing): (Vec<String>, Vec<String>) = keywords
        .into_iter()
        .partition(|kw| answer.contains(&kw.to_lowercase()));
    let total = found.len() + missing.len();
    let ratio = if total == 0 {
        0.0
    } else {
        found.len() as f64 / total as f64
    };

    let char_count = answer.chars().count();
    let length_ok = char_count >= min_chars;
    let length_bonus = match (length_ok, min_chars) {
        (false, _) => 0.0,
        (true, 0) => 0.2,
        (true, min) => f64::min(0.2, (char_count - min) as f64 / (min * 2) as f64),
    };

    let base = ratio * 0.7 + if length_ok { 0.3 } else { 0.0 };
    let score = f64::min(100.0, base * 100.0 + length_bonus * 100.0);

    let (confidence, requires_manual_review) = if ratio >= 0.7 && length_ok {
        (0.9, false)
    } else if ratio >= 0.4 && length_ok {
        (0.7, true)
    } else {
        (0.5, true)
    };

    WrittenEvaluation {
        score: score.round_ties_even() as u32,
        confidence,
        feedback: feedback_for(score, &missing),
        keywords_found: found,
        keywords_missing: missing,
        length_ok,
        char_count: Some(char_count),
        requires_manual_review,
        raw_answer: Some(raw.chars().take(RAW_ANSWER_PREVIEW).collect()),
        question_text: String::new(),
        context: String::new(),
    }
}

/// A wrong answer the teacher should look at
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncorrectItem {
    /// Question text
    pub question: String,
    /// What the student picked
    pub student_answer: String,
    /// The right answer
    pub correct_answer: String,
    /// Atom the question came from
    pub atom_title: String,
}

/// Counters over quiz items
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AtomicAnalysis {
    /// Items in the submission
    pub total_items: usize,
    /// Items with an answer
    pub answered_items: usize,
    /// Items answered correctly
    pub correct_items: usize,
    /// Answered but wrong
    pub incorrect_items: Vec<IncorrectItem>,
    /// Items as submitted
    pub items: Vec<Value>,
}

/// Counters over practice items
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PracticeAnalysis {
    /// Items in the submission
    pub total_items: usize,
    /// Items with an answer
    pub answered_items: usize,
    /// Items answered correctly
    pub correct_items: usize,
    /// Items as submitted
    pub items: Vec<Value>,
}

/// Written answers flagged for review
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManualReview {
    /// Number of flagged answers
    pub count: usize,
    /// The flagged evaluations
    pub items: Vec<WrittenEvaluation>,
}

/// Everything known about one submission file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionAnalysis {
    /// Path as given
    pub filepath: String,
    /// File name
    pub filename: String,
    /// Checksum verified
    pub is_valid: bool,
    /// Verification message
    pub verification_message: String,
    /// Local timestamp of the analysis
    #[serde(rename = "analyzed_at")]
    pub analyzed_at: String,
    /// Set when the file could not be verified
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// `payload.student`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student: Option<Value>,
    /// `payload.lesson`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lesson: Option<Value>,
    /// `payload.grading`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grading: Option<Value>,
    /// `payload.summary`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<Value>,
    /// `payload._meta`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
    /// Quiz item counters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub atomic_analysis: Option<AtomicAnalysis>,
    /// Practice item counters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub practice_analysis: Option<PracticeAnalysis>,
    /// One entry per item needing teacher evaluation
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub written_evaluations: Vec<WrittenEvaluation>,
    /// Evaluations needing a manual read
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manual_review_required: Option<ManualReview>,
    /// Mean confidence over written evaluations, 1.0 when there are none
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overall_confidence: Option<f64>,
}

impl SubmissionAnalysis {
    /// Analysis carrying only the file facts and the verification outcome
    fn unverified(path: &Path, is_valid: bool, message: String) -> Self {
        SubmissionAnalysis {
            filepath: path.display().to_string(),
            filename: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            is_valid,
            verification_message: message,
            analyzed_at: Local::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string(),
            error: None,
            student: None,
            lesson: None,
            grading: None,
            summary: None,
            meta: None,
            atomic_analysis: None,
            practice_analysis: None,
            written_evaluations: Vec::new(),
            manual_review_required: None,
            overall_confidence: None,
        }
    }
}

fn object_or_empty(payload: &Value, key: &str) -> Value {
    payload
        .get(key)
        .cloned()
        .unwrap_or_else(|| Value::Object(Map::new()))
}

fn items(payload: &Value, key: &str) -> Vec<Value> {
    payload
        .get(key)
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

fn count_where(items: &[Value], key: &str) -> usize {
    items.iter().filter(|i| truthy(i.get(key))).count()
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}

/// Verifies, analyses and exports submissions
#[derive(Debug, Clone)]
pub struct SubmissionEvaluator {
    default_min_chars: usize,
}

impl Default for SubmissionEvaluator {
    fn default() -> Self {
        Self::new(50)
    }
}

impl SubmissionEvaluator {
    /// Evaluator using `default_min_chars` for answers without `minChars`
    pub fn new(default_min_chars: usize) -> Self {
        Self { default_min_chars }
    }

    /// Verify and analyse one submission file
    pub fn analyze(&self, path: &Path) -> Result<SubmissionAnalysis> {
        let verified = verify_file(path)?;
        let message = match &verified.status {
            Verification::NotFound => format!("File not found: {}", path.display()),
            other => other.message(),
        };

        let mut analysis = SubmissionAnalysis::unverified(path, verified.status.is_valid(), message.clone());

        let payload = match verified.payload() {
            Some(payload) if analysis.is_valid => payload,
            _ => {
                warn!("{}: {}", analysis.filename, message);
                analysis.error = Some(message);
                return Ok(analysis);
            }
        };

        analysis.student = Some(object_or_empty(payload, "student"));
        analysis.lesson = Some(object_or_empty(payload, "lesson"));
        analysis.grading = Some(object_or_empty(payload, "grading"));
        analysis.summary = Some(object_or_empty(payload, "summary"));
        analysis.meta = Some(object_or_empty(payload, "_meta"));

        let atomic = items(payload, "atomicItems");
        let incorrect = atomic
            .iter()
            .filter(|i| truthy(i.get("answered")) && !truthy(i.get("isCorrect")))
            .map(|i| IncorrectItem {
                question: text(i, "questionText"),
                student_answer: text(i, "studentAnswerText"),
                correct_answer: text(i, "correctAnswerText"),
                atom_title: text(i, "atomTitle"),
            })
            .collect();
        analysis.atomic_analysis = Some(AtomicAnalysis {
            total_items: atomic.len(),
            answered_items: count_where(&atomic, "answered"),
            correct_items: count_where(&atomic, "isCorrect"),
            incorrect_items: incorrect,
            items: atomic,
        });

        let practice = items(payload, "practiceItems");
        let written: Vec<WrittenEvaluation> = practice
            .iter()
            .filter(|i| truthy(i.get("requiresTeacherEvaluation")))
            .map(|i| WrittenEvaluation {
                question_text: text(i, "questionText"),
                context: text(i, "context"),
                ..evaluate_written_answer(i, self.default_min_chars)
            })
            .collect();
        analysis.practice_analysis = Some(PracticeAnalysis {
            total_items: practice.len(),
            answered_items: count_where(&practice, "answered"),
            correct_items: count_where(&practice, "isCorrect"),
            items: practice,
        });

        let flagged: Vec<WrittenEvaluation> = written
            .iter()
            .filter(|e| e.requires_manual_review)
            .cloned()
            .collect();
        analysis.manual_review_required = Some(ManualReview {
            count: flagged.len(),
            items: flagged,
        });

        let confidence = if written.is_empty() {
            1.0
        } else {
            written.iter().map(|e| e.confidence).sum::<f64>() / written.len() as f64
        };
        analysis.overall_confidence = Some(round2(confidence));
        analysis.written_evaluations = written;

        debug!(
            "{}: confidence {:.2}",
            analysis.filename,
            analysis.overall_confidence.unwrap_or_default()
        );
        Ok(analysis)
    }

    /// `<stem>_evaluation.json` beside the submission
    pub fn evaluation_path(submission: &Path) -> PathBuf {
        let stem = submission
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        submission.with_file_name(format!("{stem}{EVALUATION_SUFFIX}"))
    }

    /// Write an analysis as pretty JSON, by default beside the submission
    pub fn export(&self, analysis: &SubmissionAnalysis, output: Option<&Path>) -> Result<PathBuf> {
        let path = output
            .map(Path::to_path_buf)
            .unwrap_or_else(|| Self::evaluation_path(Path::new(&analysis.filepath)));
        FileWriter::write_json(&path, analysis)?;
        info!("Report saved to: {}", path.display());
        Ok(path)
    }

    /// Analyse every `*.json` submission in `dir`, skipping earlier
    /// evaluation outputs. A file that cannot be analysed is reported as
    /// invalid and the batch goes on.
    pub fn analyze_folder(&self, dir: &Path) -> Result<Vec<SubmissionAnalysis>> {
        let files: Vec<PathBuf> = files_in_dir(dir, "*.json")?
            .into_iter()
            .filter(|p| {
                !p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.ends_with(EVALUATION_SUFFIX))
            })
            .collect();
        info!("Processing {} files...", files.len());
        Ok(files
            .iter()
            .map(|path| {
                self.analyze(path).unwrap_or_else(|e| {
                    warn!("{}: {}", path.display(), e);
                    let mut failed = SubmissionAnalysis::unverified(path, false, format!("Error: {e}"));
                    failed.error = Some(failed.verification_message.clone());
                    failed
                })
            })
            .collect())
    }
}
