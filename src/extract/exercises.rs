//! Export of every quiz and practice exercise to a single JSON document.

use std::path::{Path, PathBuf};

use html_escape::decode_html_entities;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::practice::{extract_practice, PracticeExercise};
use crate::core::errors::Result;
use crate::core::file_utils::{relative_slash_path, FileReader, FileWriter};
use crate::core::html::collapse_whitespace;
use crate::core::page::Site;
use crate::lazy_regex;

/// Multiple-choice question in the export
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuizExercise {
    /// Question text
    #[serde(rename = "cerinta")]
    pub question: String,
    /// Option texts
    #[serde(rename = "optiuni")]
    pub options: Vec<String>,
    /// Letter of the correct option, empty when unknown
    #[serde(rename = "raspuns_corect")]
    pub correct: String,
    /// Hint, may be empty
    pub hint: String,
}

/// Exercises of one lesson
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LessonExercises {
    /// Lesson title from the first `<h1>`
    #[serde(rename = "titlu")]
    pub title: String,
    /// Quiz questions
    #[serde(rename = "exercitii")]
    pub quiz: Vec<QuizExercise>,
    /// Practice exercises
    #[serde(rename = "practica_avansata", skip_serializing_if = "Vec::is_empty", default)]
    pub practice: Vec<PracticeExercise>,
}

/// Export header
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportMeta {
    /// Project name
    pub project: String,
    /// Description
    pub description: String,
    /// Grades present
    pub total_clase: usize,
    /// Quiz questions
    pub total_exercitii_quiz: usize,
    /// Practice exercises
    pub total_practica_avansata: usize,
    /// Sum of both
    pub total_exercitii: usize,
}

/// `clasa_N` → module → lesson → exercises, in discovery order
pub type ExerciseTree = IndexMap<String, IndexMap<String, IndexMap<String, LessonExercises>>>;

/// The whole export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseExport {
    /// Totals
    pub meta: ExportMeta,
    /// Exercises by grade, module and lesson
    #[serde(rename = "clase")]
    pub grades: ExerciseTree,
}

/// Where a lesson sits in the export tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LessonLocation {
    /// `clasa_N`
    pub grade: String,
    /// Module name without its `mN-` prefix
    pub module: String,
    /// Lesson file stem
    pub lesson: String,
}

/// Map a lesson path to `clasa_N`, module and lesson; missing parts become
/// `unknown`
pub fn locate(path: &str) -> LessonLocation {
    let grade = lazy_regex!(r"cls(\d+)")
        .captures(path)
        .map(|c| format!("clasa_{}", &c[1]))
        .unwrap_or_else(|| "unknown".to_string());
    let module = lazy_regex!(r"m\d+-([^/\\]+)")
        .captures(path)
        .map(|c| c[1].to_string())
        .unwrap_or_else(|| "unknown".to_string());
    let lesson = lazy_regex!(r"(lectia\d+[^/\\]*?)\.html")
        .captures(path)
        .map(|c| c[1].to_string())
        .unwrap_or_else(|| "unknown".to_string());
    LessonLocation { grade, module, lesson }
}

fn strip_number(text: &str) -> String {
    lazy_regex!(r"^\d+\.\s*").replace(text.trim(), "").into_owned()
}

fn json_text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

fn option_letter(index: usize) -> String {
    char::from(b'a' + (index % 26) as u8).to_string()
}

/// Lesson title: the first `<h1>` text, whitespace collapsed
pub fn lesson_title(html: &str) -> String {
    lazy_regex!(r"<h1[^>]*>([^<]+)</h1>")
        .captures(html)
        .map(|c| collapse_whitespace(&c[1]))
        .unwrap_or_else(|| "Unknown".to_string())
}

/// Quiz questions, trying each known page format until one yields results
pub fn extract_quiz(html: &str) -> Vec<QuizExercise> {
    let strategies: [fn(&str) -> Vec<QuizExercise>; 4] =
        [atomic_quiz, legacy_quiz, data_correct_quiz, select_option_quiz];
    strategies
        .iter()
        .map(|strategy| strategy(html))
        .find(|found| !found.is_empty())
        .unwrap_or_default()
}

/// Atoms carry their questions as JSON in `data-quiz`
fn atomic_quiz(html: &str) -> Vec<QuizExercise> {
    let mut exercises = Vec::new();
    for caps in lazy_regex!(r"(?s)data-quiz='(\[.*?\])'").captures_iter(html) {
        let raw = decode_html_entities(&caps[1]);
        let questions: Vec<Value> = match serde_json::from_str(&raw) {
            Ok(questions) => questions,
            Err(e) => {
                debug!("Skipping unparsable data-quiz: {}", e);
                continue;
            }
        };
        for q in questions {
            let options = q
                .get("options")
                .and_then(Value::as_array)
                .map(|opts| opts.iter().map(|o| json_text(Some(o))).collect())
                .unwrap_or_default();
            exercises.push(QuizExercise {
                question: json_text(q.get("question")),
                options,
                correct: json_text(q.get("correct")),
                hint: json_text(q.get("hint")),
            });
        }
    }
    exercises
}

/// `.quiz-question#qN` blocks with `checkAnswer(n, this, true|false)` options
fn legacy_quiz(html: &str) -> Vec<QuizExercise> {
    let block = lazy_regex!(
        r#"(?s)<div[^>]*class="quiz-question"[^>]*id="q(\d+)"[^>]*>(.*?)</div>\s*<div[^>]*class="feedback""#
    );
    let option = lazy_regex!(
        r#"<div[^>]*class="quiz-option"[^>]*onclick="checkAnswer\(\d+,\s*this,\s*(true|false)\)"[^>]*>([^<]+)</div>"#
    );
    block
        .captures_iter(html)
        .filter_map(|caps| {
            let body = &caps[2];
            let question = lazy_regex!(r"<p>([^<]+)</p>").captures(body)?;
            let mut correct = String::new();
            let options: Vec<String> = option
                .captures_iter(body)
                .enumerate()
                .map(|(idx, o)| {
                    if &o[1] == "true" {
                        correct = option_letter(idx);
                    }
                    o[2].trim().to_string()
                })
                .collect();
            (!options.is_empty()).then(|| QuizExercise {
                question: strip_number(&question[1]),
                options,
                correct,
                hint: String::new(),
            })
        })
        .collect()
}

/// `.quiz-question[data-correct]` blocks with `data-value` options
fn data_correct_quiz(html: &str) -> Vec<QuizExercise> {
    if !html.contains("data-correct=\"") {
        return Vec::new();
    }
    let header = lazy_regex!(r#"<div[^>]*class="quiz-question"[^>]*data-correct="([a-z])"[^>]*>"#);
    let option = lazy_regex!(r#"<div[^>]*class="quiz-option"[^>]*data-value="[a-z]"[^>]*>([^<]+)</div>"#);

    let heads: Vec<(usize, String)> = header
        .captures_iter(html)
        .filter_map(|c| Some((c.get(0)?.end(), c[1].to_string())))
        .collect();
    let starts: Vec<usize> = header.find_iter(html).map(|m| m.start()).collect();

    let mut exercises = Vec::new();
    for (i, (body_start, correct)) in heads.iter().enumerate() {
        let body_end = starts.get(i + 1).copied().unwrap_or(html.len());
        let body = &html[*body_start..body_end];
        let Some(question) = lazy_regex!(r"<p>([^<]+)</p>").captures(body) else {
            continue;
        };
        let options: Vec<String> = option.captures_iter(body).map(|o| o[1].trim().to_string()).collect();
        if !options.is_empty() {
            exercises.push(QuizExercise {
                question: strip_number(&question[1]),
                options,
                correct: correct.clone(),
                hint: String::new(),
            });
        }
    }
    exercises
}

/// `.question-text` questions answered through `selectOption(this, 'qN', ok)`
fn select_option_quiz(html: &str) -> Vec<QuizExercise> {
    if !html.contains("selectOption(") {
        return Vec::new();
    }
    let block = lazy_regex!(
        r#"(?s)<div[^>]*class="quiz-question"[^>]*id="(q\d+)"[^>]*>(.*?)</div>\s*<div[^>]*class="feedback""#
    );
    let option = lazy_regex!(
        r#"(?s)<div[^>]*class="option"[^>]*onclick="selectOption\(this,\s*['"](q\d+)['"]\s*,\s*(true|false)\)"[^>]*>\s*([^<]+?)\s*</div>"#
    );

    block
        .captures_iter(html)
        .filter_map(|caps| {
            let id = &caps[1];
            let body = &caps[2];
            let question =
                lazy_regex!(r#"<div[^>]*class="question-text"[^>]*>([^<]+)</div>"#).captures(body)?;
            let mut correct = String::new();
            let options: Vec<String> = option
                .captures_iter(body)
                .filter(|o| &o[1] == id)
                .enumerate()
                .map(|(idx, o)| {
                    if &o[2] == "true" {
                        correct = option_letter(idx);
                    }
                    o[3].trim().to_string()
                })
                .collect();
            (!options.is_empty()).then(|| QuizExercise {
                question: strip_number(&question[1]),
                options,
                correct,
                hint: String::new(),
            })
        })
        .collect()
}

/// Walks the content tree and builds the export
pub struct ExerciseExtractor<'a> {
    site: &'a Site,
}

impl<'a> ExerciseExtractor<'a> {
    /// Extractor for `site`
    pub fn new(site: &'a Site) -> Self {
        Self { site }
    }

    /// Extract every lesson under the content directory
    pub fn extract_all(&self) -> Result<ExerciseExport> {
        let files = self
            .site
            .walker()
            .files_matching(&self.site.content_dir, "lectia*.html")?;
        info!("Found {} lesson files", files.len());

        let mut grades = ExerciseTree::new();
        for path in &files {
            let rel = relative_slash_path(&self.site.content_dir, path)
                .unwrap_or_else(|| path.display().to_string());
            let html = match FileReader::read_to_string(path) {
                Ok(html) => html,
                Err(e) => {
                    warn!("Skipping {}: {}", rel, e);
                    continue;
                }
            };
            let Some(lesson) = extract_lesson(&html) else {
                continue;
            };
            debug!(
                "{}: {} quiz + {} practice",
                rel,
                lesson.quiz.len(),
                lesson.practice.len()
            );
            let location = locate(&rel);
            grades
                .entry(location.grade)
                .or_default()
                .entry(location.module)
                .or_default()
                .insert(location.lesson, lesson);
        }

        Ok(build_export(grades))
    }

    /// Extract and write the export as pretty JSON
    pub fn write(&self, output: &Path) -> Result<ExerciseExport> {
        let export = self.extract_all()?;
        FileWriter::write_json(output, &export)?;
        info!(
            "Saved {} exercises to {}",
            export.meta.total_exercitii,
            output.display()
        );
        Ok(export)
    }

    /// Default output path under the site root
    pub fn default_output(&self) -> PathBuf {
        self.site.root.join("learninghub_exercises.json")
    }
}

/// Exercises of one page, `None` when it has neither quiz nor practice
pub fn extract_lesson(html: &str) -> Option<LessonExercises> {
    let quiz = extract_quiz(html);
    let practice = extract_practice(html);
    if quiz.is_empty() && practice.is_empty() {
        return None;
    }
    Some(LessonExercises {
        title: lesson_title(html),
        quiz,
        practice,
    })
}

fn build_export(grades: ExerciseTree) -> ExerciseExport {
    let lessons = grades.values().flat_map(|m| m.values()).flat_map(|l| l.values());
    let (quiz, practice) = lessons.fold((0, 0), |(q, p), lesson| {
        (q + lesson.quiz.len(), p + lesson.practice.len())
    });
    ExerciseExport {
        meta: ExportMeta {
            project: "LearningHub".to_string(),
            description: "Exercitii extrase din toate lectiile TIC".to_string(),
            total_clase: grades.len(),
            total_exercitii_quiz: quiz,
            total_practica_avansata: practice,
            total_exercitii: quiz + practice,
        },
        grades,
    }
}
