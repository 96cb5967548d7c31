//! Conversion of GOAL → TRY → LEARN → TEST lessons into the atomic format.
//!
//! A lesson is parsed with a real HTML parser into [`LessonData`], then
//! rendered as a sequence of atoms: short content blocks, each optionally
//! carrying one quiz question that unlocks the next atom.

use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;
use tracing::{debug, info};

use crate::core::errors::{LearningHubError, Result};
use crate::core::file_utils::{FileReader, FileWriter};
use crate::core::html::{collapse_whitespace, escape_attr, escape_text, js_string};
use crate::core::page::{Page, Site};
use crate::lazy_regex;

macro_rules! selector {
    ($css:expr) => {{
        static SEL: Lazy<Selector> =
            Lazy::new(|| Selector::parse($css).expect("invalid CSS selector"));
        &*SEL
    }};
}

const DEFAULT_HINT: &str = "Reciteste sectiunea pentru a gasi raspunsul.";
const MAX_PARAGRAPHS_PER_ATOM: usize = 3;
const MIN_PARAGRAPH_CHARS: usize = 20;

/// One quiz question as stored in an atom's `data-quiz`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AtomQuestion {
    /// Question text
    pub question: String,
    /// Option texts in display order
    pub options: Vec<String>,
    /// Letter of the correct option (`a`, `b`, ...)
    pub correct: String,
    /// Hint shown after a wrong answer
    pub hint: String,
}

/// Titled group of paragraphs from a TRY/LEARN section
#[derive(Debug, Clone, PartialEq)]
pub struct ContentSection {
    /// Section heading
    pub title: String,
    /// Paragraph texts; highlight boxes are wrapped in `**`
    pub content: Vec<String>,
}

/// Everything the converter keeps from a classic lesson
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LessonData {
    /// Lesson title
    pub title: String,
    /// Badge text
    pub badge: String,
    /// Goal statement
    pub goal_text: String,
    /// Content sections in document order
    pub sections: Vec<ContentSection>,
    /// Quiz questions in document order
    pub questions: Vec<AtomQuestion>,
    /// Previous lesson link
    pub nav_prev: String,
    /// Next lesson link
    pub nav_next: String,
    /// `grade-module-stem`
    pub lesson_id: String,
}

/// One atom ready for rendering
#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    /// Element id
    pub id: String,
    /// Display number
    pub number: usize,
    /// Heading
    pub title: String,
    /// Inner HTML of `.atom-content`
    pub content: String,
    /// Question gating the atom
    pub question: Option<AtomQuestion>,
}

fn text_of(element: ElementRef<'_>) -> String {
    collapse_whitespace(&element.text().collect::<String>())
}

fn first_text(root: ElementRef<'_>, selectors: &[&Selector]) -> Option<String> {
    selectors
        .iter()
        .find_map(|sel| root.select(sel).next())
        .map(text_of)
}

fn class_contains(element: ElementRef<'_>, needle: &str) -> bool {
    element.value().classes().any(|c| c.contains(needle))
}

/// `grade-module-stem` from the first `cls*` path component, else the stem
pub fn lesson_id_for(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let parts: Vec<String> = path
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    match parts.iter().position(|p| p.starts_with("cls")) {
        Some(idx) if idx + 2 < parts.len() => format!("{}-{}-{}", parts[idx], parts[idx + 1], stem),
        _ => stem,
    }
}

/// Parse a classic lesson
pub fn parse_lesson(html: &str, lesson_id: &str) -> LessonData {
    let doc = Html::parse_document(html);
    let root = doc.root_element();

    let title = first_text(root, &[selector!("h1.lesson-title"), selector!("h1")]).unwrap_or_default();
    let badge = first_text(root, &[selector!(".lesson-badge"), selector!(".step-badge")]).unwrap_or_default();
    let goal_text = first_text(
        root,
        &[selector!(".goal-text"), selector!(".goal-desc"), selector!(".goal-box p")],
    )
    .unwrap_or_default();

    let (nav_prev, nav_next) = nav_links(root);

    LessonData {
        title,
        badge,
        goal_text,
        sections: content_sections(root),
        questions: quiz_questions(root),
        nav_prev,
        nav_next,
        lesson_id: lesson_id.to_string(),
    }
}

fn content_sections(root: ElementRef<'_>) -> Vec<ContentSection> {
    let mut sections = Vec::new();
    for section in root
        .select(selector!("section, div"))
        .filter(|el| class_contains(*el, "section"))
    {
        let header = section
            .select(selector!("h2, h3"))
            .find(|h| class_contains(*h, "title"))
            .or_else(|| section.select(selector!("h2, h3")).next());
        let title = header.map(text_of).unwrap_or_default();

        let lowered = title.to_lowercase();
        if ["test", "verifica", "quiz"].iter().any(|skip| lowered.contains(skip)) {
            continue;
        }

        let mut content: Vec<String> = section
            .select(selector!("p"))
            .map(text_of)
            .filter(|t| t.chars().count() > MIN_PARAGRAPH_CHARS)
            .collect();
        content.extend(
            section
                .select(selector!(".highlight-box"))
                .map(text_of)
                .filter(|t| !t.is_empty())
                .map(|t| format!("**{t}**")),
        );

        if !content.is_empty() {
            sections.push(ContentSection { title, content });
        }
    }
    sections
}

/// Strip a leading option letter such as `A)`, `b.` or `C `
fn strip_option_letter(text: &str) -> String {
    lazy_regex!(r"^[A-Za-z](?:[).]\s*|\s+)").replace(text, "").into_owned()
}

fn quiz_questions(root: ElementRef<'_>) -> Vec<AtomQuestion> {
    let mut questions = Vec::new();
    for (i, quiz) in root.select(selector!(".quiz-question")).enumerate() {
        let raw = quiz
            .select(selector!(".question-text"))
            .next()
            .map(text_of)
            .unwrap_or_else(|| format!("Intrebarea {}", i + 1));
        let question = lazy_regex!(r"^\d+\.\s*").replace(&raw, "").into_owned();

        let mut option_els: Vec<ElementRef<'_>> = quiz.select(selector!(".quiz-option")).collect();
        if option_els.is_empty() {
            option_els = quiz.select(selector!(".option")).collect();
        }

        let mut correct = 'a';
        let mut options = Vec::with_capacity(option_els.len());
        for (j, opt) in option_els.iter().enumerate() {
            options.push(strip_option_letter(&text_of(*opt)));
            let onclick = opt.value().attr("onclick").unwrap_or_default();
            if onclick.to_lowercase().contains("true") {
                correct = option_letter(j);
            }
        }

        if !options.is_empty() {
            questions.push(AtomQuestion {
                question,
                options,
                correct: correct.to_string(),
                hint: DEFAULT_HINT.to_string(),
            });
        }
    }
    questions
}

fn option_letter(index: usize) -> char {
    char::from(b'a' + (index % 26) as u8)
}

fn nav_links(root: ElementRef<'_>) -> (String, String) {
    let mut prev = String::new();
    let mut next = String::new();
    for link in root.select(selector!("a.nav-link")) {
        let href = link.value().attr("href").unwrap_or_default().to_string();
        let text = text_of(link).to_lowercase();
        let href_lower = href.to_lowercase();
        if text.contains("inapoi") || text.contains('←') || href_lower.contains("prev") {
            prev = href;
        } else if text.contains("urmatoare") || text.contains('→') || href_lower.contains("next") {
            next = href;
        }
    }
    (prev, next)
}

/// Lay out atoms: one per section, leftover questions as extra atoms, and a
/// summary atom so there are always at least two
pub fn build_atoms(data: &LessonData) -> Vec<Atom> {
    let mut atoms = Vec::new();
    let mut questions = data.questions.iter().cloned();
    let mut used = 0;

    for (i, section) in data.sections.iter().enumerate() {
        if section.content.is_empty() {
            continue;
        }
        let stripped = lazy_regex!(r"^(TRY|LEARN|GOAL)\s*[-–—]\s*").replace(&section.title, "");
        let mut title = stripped.trim().to_string();
        if title.chars().count() < 3 {
            title = format!("Concept {}", i + 1);
        }
        let content = section
            .content
            .iter()
            .take(MAX_PARAGRAPHS_PER_ATOM)
            .map(|p| format!("<p>{}</p>", escape_text(p)))
            .collect::<Vec<_>>()
            .join("\n");
        let question = questions.next();
        if question.is_some() {
            used += 1;
        }
        atoms.push(Atom {
            id: format!("atom-{}", i + 1),
            number: i + 1,
            title,
            content,
            question,
        });
    }

    for (offset, question) in questions.enumerate() {
        let q_idx = used + offset;
        atoms.push(Atom {
            id: format!("atom-extra-{q_idx}"),
            number: atoms.len() + 1,
            title: format!("Verificare {}", q_idx + 1),
            content: "<p>Raspunde la intrebarea de mai jos pentru a-ti verifica cunostintele.</p>"
                .to_string(),
            question: Some(question),
        });
    }

    if atoms.len() < 2 {
        atoms.push(Atom {
            id: "atom-summary".to_string(),
            number: atoms.len() + 1,
            title: "Rezumat".to_string(),
            content: "<p>Felicitari! Ai parcurs aceasta lectie.</p>".to_string(),
            question: None,
        });
    }
    atoms
}

/// `data-quiz` attribute value: a JSON list, safe inside single quotes
fn data_quiz(question: Option<&AtomQuestion>) -> Result<String> {
    let list: Vec<&AtomQuestion> = question.into_iter().collect();
    let json = serde_json::to_string(&list)?;
    Ok(json.replace('&', "&amp;").replace('\'', "&#39;"))
}

fn render_atom(atom: &Atom) -> Result<String> {
    let question_html = match &atom.question {
        Some(q) => {
            let options: String = q
                .options
                .iter()
                .enumerate()
                .map(|(j, opt)| {
                    let letter = option_letter(j);
                    format!(
                        r#"
                    <div class="atom-option" data-answer="{letter}">
                        <span class="option-letter">{upper}</span>
                        <span class="option-text">{text}</span>
                    </div>"#,
                        upper = letter.to_ascii_uppercase(),
                        text = escape_text(opt),
                    )
                })
                .collect();
            format!(
                r#"
                <div class="atom-quiz" data-qid="{id}-q0">
                    <div class="atom-question-text">{question}</div>
                    <div class="atom-options">{options}
                    </div>
                    <div class="atom-feedback"></div>
                    <div class="atom-hint" style="display: none;">
                        <span class="hint-icon">&#128161;</span> {hint}
                    </div>
                </div>"#,
                id = atom.id,
                question = escape_text(&q.question),
                hint = escape_text(&q.hint),
            )
        }
        None => String::new(),
    };

    Ok(format!(
        r#"
        <!-- Atom {number} -->
        <div class="atom" id="{id}" data-quiz='{quiz}'>
            <div class="atom-header">
                <div class="atom-number">{number}</div>
                <h3 class="atom-title">{title}</h3>
            </div>
            <div class="atom-content">
                {content}
            </div>{question_html}
        </div>
"#,
        number = atom.number,
        id = atom.id,
        quiz = data_quiz(atom.question.as_ref())?,
        title = escape_text(&atom.title),
        content = atom.content,
    ))
}

/// Render the complete atomic page
pub fn render_lesson(data: &LessonData, page: &Page) -> Result<String> {
    let atoms = build_atoms(data);
    let mut atoms_html = String::new();
    for atom in &atoms {
        atoms_html.push_str(&render_atom(atom)?);
    }

    let grade_name = page.info.grade_name.clone().unwrap_or_else(|| "TIC".to_string());
    let id = js_string(&data.lesson_id);
    let or_fallback = |value: &str, fallback: &str| {
        if value.is_empty() {
            fallback.to_string()
        } else {
            value.to_string()
        }
    };

    Ok(format!(
        r#"<!DOCTYPE html>
<html lang="ro">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title} | TIC {grade_name}</title>
    <link href="https://fonts.googleapis.com/css2?family=Inter:wght@400;500;600;700&display=swap" rel="stylesheet">
    <link rel="stylesheet" href="{css}atomic-learning.css">
    <link rel="stylesheet" href="{css}mobile.css">
    <link rel="stylesheet" href="{css}mobile-first.css">
</head>
<body>
    <div class="container">
        <!-- Navigation -->
        <nav class="nav-bar">
            <a href="{prev}" class="nav-link">
                <span>&#8592;</span> Lectia anterioara
            </a>
            <a href="{next}" class="nav-link">
                Lectia urmatoare <span>&#8594;</span>
            </a>
        </nav>

        <!-- Lesson Header -->
        <header class="lesson-header">
            <span class="lesson-badge">{badge}</span>
            <h1 class="lesson-title">{title}</h1>
            <p class="lesson-subtitle">Citeste fiecare concept, apoi raspunde la intrebari pentru a continua</p>
        </header>

        <!-- Progress -->
        <div class="progress-container">
            <span class="progress-label">Progres lectie:</span>
            <div class="progress-bar-wrapper">
                <div class="progress-bar-fill" id="progress-fill"></div>
            </div>
            <span class="progress-percent" id="progress-percent">0%</span>
        </div>

        <!-- GOAL Section -->
        <section class="goal-section">
            <div class="goal-header">
                <span class="goal-icon">&#127919;</span>
                <h2 class="goal-title">Obiectivul lectiei</h2>
            </div>
            <p class="goal-text">"{goal}"</p>
        </section>

        <!-- Atomic Content -->
        <main id="atomic-content">
{atoms_html}
        </main>

        <!-- Lesson Summary -->
        <div id="lesson-summary" style="display: none;"></div>

        <!-- Restart Section -->
        <section class="restart-section">
            <p>Vrei un punctaj mai bun? Poti relua lectia de la inceput.</p>
            <button onclick="restartLesson()" class="btn btn-danger">&#8634; Reia lectia</button>
            <button onclick="downloadProgress()" class="btn btn-primary">&#128190; Descarca progresul (JSON)</button>
        </section>
    </div>

    <footer>
        <p><a href="index.html">Inapoi la modul</a></p>
    </footer>

    <!-- User System -->
    <script src="{js}user-system.js"></script>
    <!-- Atomic Learning System -->
    <script src="{js}atomic-learning.js"></script>
    <!-- Lesson Summary System -->
    <script src="{js}lesson-summary.js"></script>

    <script>
        document.addEventListener('DOMContentLoaded', function() {{
            AtomicLearning.init('{id}');
            LessonSummary.init('{id}');
        }});

        function restartLesson() {{
            if (confirm('Esti sigur ca vrei sa reiei lectia? Tot progresul va fi sters.')) {{
                localStorage.removeItem('atomic-progress-{id}');
                localStorage.removeItem('lesson-summary-{id}');
                window.location.reload();
            }}
        }}

        function downloadProgress() {{
            LessonSummary.downloadProgress('{id}-progres.json');
        }}
    </script>
</body>
</html>
"#,
        title = escape_text(&data.title),
        grade_name = escape_text(&grade_name),
        css = page.asset("css/"),
        js = page.asset("js/"),
        prev = escape_attr(&or_fallback(&data.nav_prev, "index.html")),
        next = escape_attr(&or_fallback(&data.nav_next, "index.html")),
        badge = escape_text(&or_fallback(&data.badge, "Invatare Atomica")),
        goal = escape_text(&or_fallback(
            &data.goal_text,
            "Vreau sa inteleg conceptele din aceasta lectie!"
        )),
    ))
}

/// Conversion options
#[derive(Debug, Clone, Default)]
pub struct ConvertOptions {
    /// Appended to the file stem of the output; empty overwrites the input
    pub suffix: String,
    /// Parse only
    pub dry_run: bool,
}

/// Result of converting one lesson
#[derive(Debug, Clone, Serialize)]
pub struct ConversionReport {
    /// Source lesson
    pub input: PathBuf,
    /// Written file, if any
    pub output: Option<PathBuf>,
    /// Questions carried over
    pub questions: usize,
    /// Content sections found
    pub sections: usize,
    /// Atoms in the generated page
    pub atoms: usize,
}

/// Converts lessons of a site into the atomic format
pub struct AtomicConverter<'a> {
    site: &'a Site,
    options: ConvertOptions,
}

impl<'a> AtomicConverter<'a> {
    /// Converter for `site`
    pub fn new(site: &'a Site, options: ConvertOptions) -> Self {
        Self { site, options }
    }

    /// Lessons in a module folder (relative to the content directory),
    /// skipping earlier atomic outputs and backups
    pub fn lessons_in_folder(&self, folder: &str) -> Result<Vec<PathBuf>> {
        let dir = self.site.content_dir.join(folder);
        let files = crate::core::file_utils::files_in_dir(&dir, "lectia*.html")?;
        Ok(files.into_iter().filter(|f| is_convertible(f)).collect())
    }

    /// Every lesson under a grade directory
    pub fn lessons_in_grade(&self, grade: &str) -> Result<Vec<PathBuf>> {
        let dir = self.site.content_dir.join(grade);
        let files = self.site.walker().files_matching(&dir, "lectia*.html")?;
        Ok(files.into_iter().filter(|f| is_convertible(f)).collect())
    }

    /// Convert one lesson
    pub fn convert(&self, path: &Path) -> Result<ConversionReport> {
        let html = FileReader::read_to_string(path)?;
        let data = parse_lesson(&html, &lesson_id_for(path));
        debug!(
            "{}: {} sections, {} questions",
            path.display(),
            data.sections.len(),
            data.questions.len()
        );

        let mut report = ConversionReport {
            input: path.to_path_buf(),
            output: None,
            questions: data.questions.len(),
            sections: data.sections.len(),
            atoms: 0,
        };
        if self.options.dry_run {
            return Ok(report);
        }

        if data.title.is_empty() {
            return Err(LearningHubError::transform("atomic", "Could not extract lesson title")
                .with_context(path.display().to_string()));
        }
        if data.sections.is_empty() && data.questions.is_empty() {
            return Err(LearningHubError::transform("atomic", "No content or quiz questions found")
                .with_context(path.display().to_string()));
        }

        let page = self.site.page(path);
        let rendered = render_lesson(&data, &page)?;
        let output = output_path(path, &self.options.suffix);
        FileWriter::write_atomic(&output, &rendered)?;
        info!("Converted {} with {} questions", path.display(), data.questions.len());

        report.atoms = build_atoms(&data).len();
        report.output = Some(output);
        Ok(report)
    }
}

fn is_convertible(path: &Path) -> bool {
    let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
    !name.contains("-atomic") && !name.contains(".bak")
}

fn output_path(path: &Path, suffix: &str) -> PathBuf {
    if suffix.is_empty() {
        return path.to_path_buf();
    }
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    path.with_file_name(format!("{stem}{suffix}{ext}"))
}
