//! Content-review analysis of every lesson.
//!
//! Each lesson is reduced to what it teaches (goal, concepts, learn text) and
//! what it tests (quiz questions with their answers). Questions whose answer
//! cannot be traced back to the taught content are reported as potential
//! issues, so reviewers can spot gaps between lesson and quiz.

use std::fmt;
use std::path::{Path, PathBuf};

use html_escape::decode_html_entities;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::core::errors::Result;
use crate::core::file_utils::{relative_slash_path, FileReader, FileWriter};
use crate::core::html::{attribute, clean_text, find_divs, find_divs_with_class, has_class, ElementSpan};
use crate::core::page::Site;
use crate::lazy_regex;

/// Learn text longer than this is cut and suffixed with `...`
pub const LEARN_CONTENT_LIMIT: usize = 2000;

const VISUAL_WORDS: &[&str] = &["culoare", "color", "arata", "forma", "aspect"];
const COLOUR_WORDS: &[&str] = &[
    "portocaliu", "orange", "albastru", "blue", "verde", "green", "mov", "purple", "rosu", "red",
    "galben", "yellow",
];
const TOOL_WORDS: &[&str] = &["scratch", "word", "powerpoint", "excel", "access", "codeblocks"];
const INSTRUCTION_WORDS: &[&str] = &["deschide", "aplicati", "program"];

/// How a lesson page is built
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LessonFormat {
    /// Converted page made of quiz-carrying atoms
    Atomic,
    /// Classic page with concept cards and a quiz section
    Traditional,
}

impl LessonFormat {
    /// Lowercase name
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Atomic => "atomic",
            Self::Traditional => "traditional",
        }
    }
}

impl fmt::Display for LessonFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of content gap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// Question about colours or shapes the lesson never describes
    VisualWithoutDescription,
    /// Question about an application with no hint to open it
    ToolReferenceWithoutInstruction,
    /// Correct answer text appears nowhere in the lesson
    AnswerNotInContent,
}

impl IssueKind {
    /// snake_case name used in the report
    pub fn as_str(self) -> &'static str {
        match self {
            Self::VisualWithoutDescription => "visual_without_description",
            Self::ToolReferenceWithoutInstruction => "tool_reference_without_instruction",
            Self::AnswerNotInContent => "answer_not_in_content",
        }
    }
}

/// A named piece of taught content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Concept {
    /// Atom title or concept-card name
    pub name: String,
    /// Plain text
    pub content: String,
}

/// An answer option with its letter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LetteredOption {
    /// `a`, `b`, ...
    pub letter: String,
    /// Plain text
    pub text: String,
}

/// A quiz question as the reviewer sees it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalyzedQuestion {
    /// Atom carrying the question (atomic format)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub atom_id: Option<String>,
    /// Title of that atom
    #[serde(skip_serializing_if = "Option::is_none")]
    pub atom_title: Option<String>,
    /// Text of that atom
    #[serde(skip_serializing_if = "Option::is_none")]
    pub atom_content: Option<String>,
    /// Question number (traditional format)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
    /// Question text
    pub question: String,
    /// Options
    pub options: Vec<LetteredOption>,
    /// Letter of the correct option
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct_answer: Option<String>,
    /// Hint (atomic format)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    /// Explanation from the page's `explanations` table
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

/// A practice exercise, title and first paragraph only
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PracticeSummary {
    /// Heading text
    pub title: String,
    /// First paragraph
    pub description: String,
}

/// A question that may test something the lesson does not teach
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentIssue {
    /// Gap kind
    #[serde(rename = "type")]
    pub kind: IssueKind,
    /// Question text
    pub question: String,
    /// Correct option text, for missing answers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct_answer: Option<String>,
    /// Text of the atom the question belongs to
    pub atom_content: String,
    /// Suggested fix for the author
    pub suggestion: String,
    /// Lesson path, filled in the site-wide list
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

/// Per-lesson counters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LessonCounts {
    /// Concepts
    pub num_concepts: usize,
    /// Questions
    pub num_questions: usize,
    /// Practice exercises
    pub num_practice: usize,
    /// Potential issues
    pub num_issues: usize,
}

/// Everything extracted from one lesson
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LessonAnalysis {
    /// Path relative to the content directory
    pub file_path: String,
    /// `<title>` text
    pub title: String,
    /// Page format
    pub format: LessonFormat,
    /// Lesson objective
    pub goal_description: String,
    /// Atoms or concept cards
    pub concepts_taught: Vec<Concept>,
    /// Learn section text, truncated
    pub full_learn_content: String,
    /// Quiz questions
    pub quiz_questions: Vec<AnalyzedQuestion>,
    /// Practice exercises
    pub practice_exercises: Vec<PracticeSummary>,
    /// Potential content gaps
    pub potential_issues: Vec<ContentIssue>,
    /// Counters
    pub metadata: LessonCounts,
}

/// Site-wide counters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSummary {
    /// Lessons analysed
    pub total_lessons: usize,
    /// Concepts across lessons
    pub total_concepts: usize,
    /// Questions across lessons
    pub total_questions: usize,
    /// Practice exercises across lessons
    pub total_practice: usize,
    /// Issues across lessons
    pub total_potential_issues: usize,
    /// Lesson count per format
    pub lessons_by_format: IndexMap<String, usize>,
    /// Issue count per kind, in first-seen order
    pub issues_by_type: IndexMap<String, usize>,
}

/// Report header
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisMeta {
    /// What the report is
    pub description: String,
    /// What it is for
    pub purpose: String,
    /// Source content
    pub generated_from: String,
    /// One line per issue kind
    pub analysis_criteria: Vec<String>,
    /// How to use it
    pub usage: String,
}

impl Default for AnalysisMeta {
    fn default() -> Self {
        Self {
            description: "Full lesson analysis for AI review".to_string(),
            purpose: "Identify gaps where questions test concepts not taught in the lesson".to_string(),
            generated_from: "LearningHub TIC lessons".to_string(),
            analysis_criteria: vec![
                "visual_without_description: Intrebari despre aspecte vizuale (culori, forme) fara descriere in lectie".to_string(),
                "tool_reference_without_instruction: Referinte la aplicatii fara instructiuni de verificare".to_string(),
                "answer_not_in_content: Raspunsul corect nu apare in continutul lectiei".to_string(),
            ],
            usage: "Acest JSON poate fi folosit de AI pentru a genera sugestii de imbunatatire pentru fiecare lectie".to_string(),
        }
    }
}

/// The full analysis document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    /// Header
    pub meta: AnalysisMeta,
    /// Counters
    pub summary: AnalysisSummary,
    /// Every issue with its lesson path
    pub all_potential_issues: Vec<ContentIssue>,
    /// Per-lesson results
    pub lessons: Vec<LessonAnalysis>,
}

fn lettered(index: usize) -> String {
    char::from(b'a' + (index % 26) as u8).to_string()
}

fn json_text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

/// Whether the page is in the atomic format
pub fn is_atomic(html: &str) -> bool {
    html.contains("data-quiz=") || html.contains("atomic-content")
}

fn is_quiz_atom(open_tag: &str) -> bool {
    has_class(open_tag, "atom")
        && attribute(open_tag, "id").is_some_and(|id| id.starts_with("atom-"))
        && attribute(open_tag, "data-quiz").is_some()
}

/// Atoms and their questions
pub fn extract_atomic(html: &str) -> (Vec<Concept>, Vec<AnalyzedQuestion>) {
    let mut concepts = Vec::new();
    let mut questions = Vec::new();

    for span in find_divs(html, is_quiz_atom) {
        let open = span.open_tag(html);
        let inner = span.inner(html);
        let atom_id = attribute(open, "id").unwrap_or_default();
        let title = lazy_regex!(r#"(?s)<h3[^>]*class="atom-title"[^>]*>(.*?)</h3>"#)
            .captures(inner)
            .map(|c| clean_text(&c[1]))
            .unwrap_or_default();
        let content = find_divs_with_class(inner, "atom-content")
            .first()
            .map(|s| clean_text(s.inner(inner)))
            .unwrap_or_default();

        let raw = attribute(open, "data-quiz").unwrap_or_default();
        match serde_json::from_str::<Vec<Value>>(&decode_html_entities(&raw)) {
            Ok(quiz) => {
                for q in quiz {
                    let options = q
                        .get("options")
                        .and_then(Value::as_array)
                        .map(|opts| {
                            opts.iter()
                                .enumerate()
                                .map(|(i, o)| LetteredOption {
                                    letter: lettered(i),
                                    text: json_text(Some(o)),
                                })
                                .collect()
                        })
                        .unwrap_or_default();
                    questions.push(AnalyzedQuestion {
                        atom_id: Some(atom_id.clone()),
                        atom_title: Some(title.clone()),
                        atom_content: Some(content.clone()),
                        question: json_text(q.get("question")),
                        options,
                        correct_answer: Some(json_text(q.get("correct"))),
                        hint: Some(json_text(q.get("hint"))),
                        ..Default::default()
                    });
                }
            }
            Err(e) => debug!("{}: unreadable data-quiz: {}", atom_id, e),
        }

        concepts.push(Concept { name: title, content });
    }

    (concepts, questions)
}

fn class_contains(open_tag: &str, fragment: &str) -> bool {
    attribute(open_tag, "class").is_some_and(|c| c.contains(fragment))
}

/// Concept cards, quiz questions and the answer tables of a classic lesson
pub fn extract_traditional(html: &str) -> (Vec<Concept>, Vec<AnalyzedQuestion>) {
    let concepts = find_divs(html, |tag| class_contains(tag, "concept-card"))
        .iter()
        .filter_map(|span| {
            let inner = span.inner(html);
            let name = lazy_regex!(r#"class="[^"]*concept-name[^"]*"[^>]*>([^<]+)"#)
                .captures(inner)
                .map(|c| clean_text(&c[1]))
                .unwrap_or_default();
            let content = clean_text(inner);
            (!name.is_empty() || !content.is_empty()).then_some(Concept { name, content })
        })
        .collect();

    let mut questions: Vec<AnalyzedQuestion> = find_divs(html, |tag| class_contains(tag, "quiz-question"))
        .iter()
        .enumerate()
        .filter_map(|(idx, span)| traditional_question(html, span, idx))
        .collect();

    if let Some(list) = lazy_regex!(r"(?s)correctAnswers\s*=\s*\[(.*?)\]").captures(html) {
        let answers = lazy_regex!(r#"['"]([^'"]+)['"]"#).captures_iter(&list[1]);
        for (q, answer) in questions.iter_mut().zip(answers) {
            q.correct_answer = Some(answer[1].to_string());
        }
    }

    if let Some(table) = lazy_regex!(r"(?s)explanations\s*=\s*\{(.*?)\}").captures(html) {
        for pair in lazy_regex!(r#"(\d+)\s*:\s*['"]([^'"]+)['"]"#).captures_iter(&table[1]) {
            if let Some(q) = pair[1].parse::<usize>().ok().and_then(|i| questions.get_mut(i)) {
                q.explanation = Some(pair[2].to_string());
            }
        }
    }

    (concepts, questions)
}

fn traditional_question(html: &str, span: &ElementSpan, idx: usize) -> Option<AnalyzedQuestion> {
    let inner = span.inner(html);
    let text = lazy_regex!(r"(?s)<h4[^>]*>(.*?)</h4>").captures(inner)?;
    let index = attribute(span.open_tag(html), "data-question")
        .and_then(|n| n.parse().ok())
        .unwrap_or(idx);
    let options = find_divs(inner, |tag| class_contains(tag, "quiz-option"))
        .iter()
        .filter_map(|opt| {
            let letter = attribute(opt.open_tag(inner), "data-answer")?;
            Some(LetteredOption {
                letter,
                text: clean_text(opt.inner(inner)),
            })
        })
        .collect();
    Some(AnalyzedQuestion {
        index: Some(index),
        question: clean_text(&text[1]),
        options,
        ..Default::default()
    })
}

/// Goal text from the first matching goal element
pub fn extract_goal(html: &str) -> String {
    let patterns = [
        lazy_regex!(r#"(?s)class="[^"]*goal-desc[^"]*"[^>]*>(.*?)</p>"#),
        lazy_regex!(r#"(?s)class="[^"]*goal-text[^"]*"[^>]*>(.*?)</p>"#),
        lazy_regex!(r#"(?s)<section[^>]*class="[^"]*goal[^"]*"[^>]*>(.*?)</section>"#),
    ];
    patterns
        .iter()
        .find_map(|re| re.captures(html))
        .map(|c| clean_text(&c[1]))
        .unwrap_or_default()
}

/// Full text of the learn section, or of the atomic main element
pub fn extract_learn(html: &str) -> String {
    let patterns = [
        lazy_regex!(r#"(?s)id="section-learn"[^>]*>(.*?)</div>\s*<div class="nav-buttons""#),
        lazy_regex!(r#"(?s)class="[^"]*learn-section[^"]*"[^>]*>(.*?)</div>\s*<div class="nav-buttons""#),
        lazy_regex!(r#"(?s)<main[^>]*id="atomic-content"[^>]*>(.*?)</main>"#),
    ];
    patterns
        .iter()
        .find_map(|re| re.captures(html))
        .map(|c| clean_text(&c[1]))
        .unwrap_or_default()
}

/// Title and first paragraph of each advanced practice exercise
pub fn extract_practice_summaries(html: &str) -> Vec<PracticeSummary> {
    let Some(section) =
        lazy_regex!(r#"(?s)<section[^>]*class="[^"]*practice-advanced[^"]*"[^>]*>(.*?)</section>"#)
            .captures(html)
    else {
        return Vec::new();
    };
    let body = &section[1];
    find_divs(body, |tag| class_contains(tag, "practice-exercise"))
        .iter()
        .map(|span| {
            let inner = span.inner(body);
            let title = lazy_regex!(r"(?s)<h4[^>]*>(.*?)</h4>")
                .captures(inner)
                .map(|c| clean_text(&c[1]))
                .unwrap_or_default();
            let description = lazy_regex!(r"(?s)<p\b[^>]*>(.*?)</p>")
                .captures(inner)
                .map(|c| clean_text(&c[1]))
                .unwrap_or_default();
            PracticeSummary { title, description }
        })
        .collect()
}

fn mentions_any(text: &str, words: &[&str]) -> bool {
    words.iter().any(|w| text.contains(w))
}

/// Questions that ask about things the lesson content does not cover
pub fn find_content_issues(questions: &[AnalyzedQuestion], learn_content: &str) -> Vec<ContentIssue> {
    let learn_lower = learn_content.to_lowercase();
    let mut issues = Vec::new();

    for q in questions {
        let question = q.question.to_lowercase();
        let atom_content = q.atom_content.clone().unwrap_or_default();
        let atom_lower = atom_content.to_lowercase();
        let issue = |kind, correct_answer, suggestion: String| ContentIssue {
            kind,
            question: q.question.clone(),
            correct_answer,
            atom_content: atom_content.clone(),
            suggestion,
            file: None,
        };

        if mentions_any(&question, VISUAL_WORDS) && !mentions_any(&atom_lower, COLOUR_WORDS) {
            issues.push(issue(
                IssueKind::VisualWithoutDescription,
                None,
                "Intrebarea cere identificarea vizuala a unui element fara ca lectia sa descrie acest aspect. Sugestie: adauga o descriere vizuala sau indica elevului sa verifice in aplicatie.".to_string(),
            ));
        }

        if mentions_any(&question, TOOL_WORDS) && !mentions_any(&atom_lower, INSTRUCTION_WORDS) {
            issues.push(issue(
                IssueKind::ToolReferenceWithoutInstruction,
                None,
                "Intrebarea face referire la o aplicatie specifica. Sugestie: indica clar ca elevul trebuie sa deschida aplicatia pentru a verifica.".to_string(),
            ));
        }

        let correct = q
            .correct_answer
            .as_deref()
            .and_then(|letter| q.options.iter().find(|o| o.letter == letter))
            .map(|o| o.text.to_lowercase())
            .filter(|text| !text.is_empty());
        if let Some(correct) = correct {
            if !atom_lower.contains(&correct) && !learn_lower.contains(&correct) {
                let suggestion = format!(
                    "Raspunsul corect '{correct}' nu apare in continutul lectiei. Sugestie: adauga explicatia sau indica sursa de verificare."
                );
                issues.push(issue(IssueKind::AnswerNotInContent, Some(correct), suggestion));
            }
        }
    }

    issues
}

fn truncate_learn(text: String) -> String {
    match text.char_indices().nth(LEARN_CONTENT_LIMIT) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text,
    }
}

/// Analyse one lesson page
pub fn analyze_lesson(file_path: &str, html: &str) -> LessonAnalysis {
    let title = lazy_regex!(r"<title>(.*?)</title>")
        .captures(html)
        .map(|c| clean_text(&c[1]))
        .unwrap_or_default();

    let format = if is_atomic(html) {
        LessonFormat::Atomic
    } else {
        LessonFormat::Traditional
    };
    let (concepts, questions) = match format {
        LessonFormat::Atomic => extract_atomic(html),
        LessonFormat::Traditional => extract_traditional(html),
    };

    let learn = extract_learn(html);
    let practice = extract_practice_summaries(html);
    let issues = find_content_issues(&questions, &learn);

    LessonAnalysis {
        file_path: file_path.to_string(),
        title,
        format,
        goal_description: extract_goal(html),
        metadata: LessonCounts {
            num_concepts: concepts.len(),
            num_questions: questions.len(),
            num_practice: practice.len(),
            num_issues: issues.len(),
        },
        concepts_taught: concepts,
        full_learn_content: truncate_learn(learn),
        quiz_questions: questions,
        practice_exercises: practice,
        potential_issues: issues,
    }
}

/// Runs the analysis over every lesson of a site
pub struct LessonAnalyzer<'a> {
    site: &'a Site,
}

impl<'a> LessonAnalyzer<'a> {
    /// Analyzer for `site`
    pub fn new(site: &'a Site) -> Self {
        Self { site }
    }

    /// Analyse every `lectia*.html` under the content directory
    pub fn analyze_all(&self) -> Result<AnalysisReport> {
        let files = self
            .site
            .walker()
            .files_matching(&self.site.content_dir, "lectia*.html")?;
        info!("Analysing {} lessons", files.len());

        let mut lessons = Vec::with_capacity(files.len());
        for path in &files {
            let rel = relative_slash_path(&self.site.content_dir, path)
                .unwrap_or_else(|| path.display().to_string());
            match FileReader::read_to_string(path) {
                Ok(html) => {
                    let lesson = analyze_lesson(&rel, &html);
                    debug!(
                        "{}: {} questions, {} issues",
                        rel, lesson.metadata.num_questions, lesson.metadata.num_issues
                    );
                    lessons.push(lesson);
                }
                Err(e) => warn!("Skipping {}: {}", rel, e),
            }
        }

        Ok(build_report(lessons))
    }

    /// Analyse and write the report as pretty JSON
    pub fn write(&self, output: &Path) -> Result<AnalysisReport> {
        let report = self.analyze_all()?;
        FileWriter::write_json(output, &report)?;
        info!("Analysis saved to {}", output.display());
        Ok(report)
    }

    /// Default output path under the site root
    pub fn default_output(&self) -> PathBuf {
        self.site.root.join("learninghub_lessons_full_analysis.json")
    }
}

fn build_report(lessons: Vec<LessonAnalysis>) -> AnalysisReport {
    let all_issues: Vec<ContentIssue> = lessons
        .iter()
        .flat_map(|lesson| {
            lesson.potential_issues.iter().map(|issue| ContentIssue {
                file: Some(lesson.file_path.clone()),
                ..issue.clone()
            })
        })
        .collect();

    let mut issues_by_type = IndexMap::new();
    for issue in &all_issues {
        *issues_by_type.entry(issue.kind.as_str().to_string()).or_insert(0) += 1;
    }

    let mut lessons_by_format = IndexMap::new();
    for format in [LessonFormat::Atomic, LessonFormat::Traditional] {
        let count = lessons.iter().filter(|l| l.format == format).count();
        lessons_by_format.insert(format.as_str().to_string(), count);
    }

    let sum = |f: fn(&LessonCounts) -> usize| lessons.iter().map(|l| f(&l.metadata)).sum::<usize>();
    let summary = AnalysisSummary {
        total_lessons: lessons.len(),
        total_concepts: sum(|m| m.num_concepts),
        total_questions: sum(|m| m.num_questions),
        total_practice: sum(|m| m.num_practice),
        total_potential_issues: all_issues.len(),
        lessons_by_format,
        issues_by_type,
    };

    AnalysisReport {
        meta: AnalysisMeta::default(),
        summary,
        all_potential_issues: all_issues,
        lessons,
    }
}
