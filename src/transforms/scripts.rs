//! Script injections: each adds one front-end component to the pages that
//! need it.

use super::{Outcome, PageTransform, Scope};
use crate::core::errors::{LearningHubError, Result};
use crate::core::file_utils::files_in_dir;
use crate::core::html::{insert_before_first, insert_before_last, js_string, splice};
use crate::core::page::Page;
use crate::lazy_regex;

/// Loads `evidence-system.js` right before `progress.js`, which depends on it
pub struct EvidenceScript;

impl PageTransform for EvidenceScript {
    fn name(&self) -> &'static str {
        "evidence"
    }

    fn scope(&self) -> Scope {
        Scope::Lessons
    }

    fn apply(&self, page: &Page, html: &str) -> Result<Outcome> {
        if html.contains("evidence-system.js") {
            return Ok(Outcome::skip("already has evidence-system.js"));
        }
        let Some(tag) = lazy_regex!(r#"<script\s+src="[^"]*progress\.js"[^>]*></script>"#).find(html)
        else {
            return Ok(Outcome::skip("no progress.js found"));
        };
        let script = format!(
            "<script src=\"{}\"></script>\n    ",
            page.asset("js/evidence-system.js")
        );
        let content = splice(html, tag.start(), &script);
        Ok(Outcome::from_edit(
            html,
            content,
            vec!["Added evidence-system.js".to_string()],
        ))
    }
}

/// Passing score for a quiz: one mistake allowed up to five questions,
/// 75% above that
pub fn passing_score(total: usize) -> usize {
    if total <= 5 {
        total.saturating_sub(1)
    } else {
        total * 3 / 4
    }
}

/// Adds `quiz.js` to pages whose quizzes carry `data-correct` answers
pub struct QuizEnhancements;

impl PageTransform for QuizEnhancements {
    fn name(&self) -> &'static str {
        "quiz"
    }

    fn scope(&self) -> Scope {
        Scope::ContentHtml
    }

    fn apply(&self, page: &Page, html: &str) -> Result<Outcome> {
        if page.info.is_index {
            return Ok(Outcome::skip("index page"));
        }
        if !(html.contains("quiz-question") && html.contains("data-correct=")) {
            return Ok(Outcome::skip("no quiz"));
        }
        if html.contains("quiz.js") {
            return Ok(Outcome::skip("already has quiz.js"));
        }

        let total = html.matches("quiz-question").count();
        let passing = passing_score(total);
        let script = format!(
            r#"
    <!-- Enhanced Quiz System -->
    <script src="{src}"></script>
    <script>
        document.addEventListener('DOMContentLoaded', function() {{
            Quiz.init({{
                passingScore: {passing},
                totalQuestions: {total},
                explanations: {{}}
            }});
        }});
    </script>"#,
            src = page.asset("js/quiz.js"),
        );
        let content = insert_before_last(html, "</body>", &format!("{script}\n"))
            .unwrap_or_else(|| format!("{html}{script}"));
        Ok(Outcome::from_edit(
            html,
            content,
            vec![format!("Added quiz ({total} questions, pass at {passing})")],
        ))
    }
}

/// Hooks quiz results into the RPG progression system
pub struct RpgSystem;

impl PageTransform for RpgSystem {
    fn name(&self) -> &'static str {
        "rpg"
    }

    fn scope(&self) -> Scope {
        Scope::Lessons
    }

    fn apply(&self, page: &Page, html: &str) -> Result<Outcome> {
        if html.contains("rpg-system.js") {
            return Ok(Outcome::skip("already has RPG"));
        }
        let (Some(grade), Some(module)) = (&page.info.grade, &page.info.module) else {
            return Ok(Outcome::skip("cannot determine grade/module"));
        };

        let (position, method) = rpg_insertion_point(html).ok_or_else(|| {
            LearningHubError::transform(self.name(), "could not find insertion point")
        })?;

        // four options per question, between four and five questions
        let options = html.matches(r#"class="quiz-option""#).count();
        let total = (options / 4).clamp(4, 5);
        let snippet = format!(
            r#"
    <!-- RPG System -->
    <script src="{src}"></script>
    <script>
        RPG.init('{grade}', '{module}');
        // Hook quiz checking to RPG system
        if (typeof checkAllAnswers !== 'undefined') {{
            const originalCheckAllAnswers = checkAllAnswers;
            checkAllAnswers = function() {{
                originalCheckAllAnswers();
                if (typeof correctCount !== 'undefined' && correctCount >= {pass}) {{
                    RPG.onQuizPass(correctCount, {total}, correctCount === {total});
                }}
            }};
        }}
    </script>
"#,
            src = page.asset("js/rpg-system.js"),
            grade = js_string(grade),
            module = js_string(module),
            pass = total - 1,
        );
        let content = splice(html, position, &snippet);
        Ok(Outcome::from_edit(
            html,
            content,
            vec![format!("Added RPG ({method})")],
        ))
    }
}

fn rpg_insertion_point(html: &str) -> Option<(usize, &'static str)> {
    if let Some(m) = lazy_regex!(r#"<script src="[^"]*progress\.js"></script>"#).find(html) {
        return Some((m.end(), "after progress.js"));
    }
    if let Some(idx) = html.find("<!-- Progress Tracking -->") {
        if let Some(end) = html[idx..].find("</script>") {
            return Some((idx + end + "</script>".len(), "after progress section"));
        }
    }
    html.rfind("</body>").map(|idx| (idx, "before </body>"))
}

/// Tracks lesson progress with `LearningProgress`
pub struct ProgressTracking;

impl PageTransform for ProgressTracking {
    fn name(&self) -> &'static str {
        "progress"
    }

    fn scope(&self) -> Scope {
        Scope::Lessons
    }

    fn apply(&self, page: &Page, html: &str) -> Result<Outcome> {
        let info = &page.info;
        let (Some(grade), Some(module), Some(number)) =
            (&info.grade, &info.module, info.lesson_number)
        else {
            return Ok(Outcome::skip("couldn't parse lesson info"));
        };
        if html.contains("LearningProgress.init") {
            return Ok(Outcome::skip("already integrated"));
        }

        let lesson = format!("lectia{number}");
        let snippet = format!(
            r#"
    <!-- Progress Tracking -->
    <script src="{src}"></script>
    <script>
        LearningProgress.init('{grade}', '{module}', '{lesson}');
        // Auto-mark complete when reaching completion section
        const originalGoToStep = goToStep;
        goToStep = function(step) {{
            originalGoToStep(step);
            if (step === 'complete') {{
                LearningProgress.markComplete();
            }}
        }};
    </script>
"#,
            src = page.asset("js/progress.js"),
            grade = js_string(grade),
            module = js_string(module),
        );
        match insert_before_last(html, "</body>", &snippet) {
            Some(content) => Ok(Outcome::from_edit(
                html,
                content,
                vec![format!("Integrated {grade}/{module}/{lesson}")],
            )),
            None => Ok(Outcome::skip("no </body> tag found")),
        }
    }
}

/// Number of lessons assumed for modules with no lesson files yet
pub const DEFAULT_MODULE_LESSONS: usize = 6;

/// Shows module progress on module index pages
pub struct ModuleProgress;

impl PageTransform for ModuleProgress {
    fn name(&self) -> &'static str {
        "progress-index"
    }

    fn scope(&self) -> Scope {
        Scope::ModuleIndexes
    }

    fn apply(&self, page: &Page, html: &str) -> Result<Outcome> {
        let (Some(grade), Some(module)) = (&page.info.grade, &page.info.module) else {
            return Ok(Outcome::skip("couldn't parse module info"));
        };
        if html.contains("LearningProgress.updateModuleProgress") {
            return Ok(Outcome::skip("already integrated"));
        }

        let lessons = match page.path.parent() {
            Some(dir) => files_in_dir(dir, "lectia*.html")?.len(),
            None => 0,
        };
        let lessons = if lessons == 0 {
            DEFAULT_MODULE_LESSONS
        } else {
            lessons
        };

        let snippet = format!(
            r#"
    <!-- Progress Tracking -->
    <script src="{src}"></script>
    <script>
        // Update module progress on page load
        document.addEventListener('DOMContentLoaded', function() {{
            LearningProgress.updateModuleProgress('{grade}', '{module}', {lessons});
        }});
    </script>
"#,
            src = page.asset("js/progress.js"),
            grade = js_string(grade),
            module = js_string(module),
        );

        let placeholder = lazy_regex!(r"(?s)<script>\s*// Future: Track progress.*?</script>");
        let content = if let Some(m) = placeholder.find(html) {
            let mut out = String::with_capacity(html.len() + snippet.len());
            out.push_str(&html[..m.start()]);
            out.push_str(snippet.trim());
            out.push_str(&html[m.end()..]);
            out
        } else if let Some(content) = insert_before_last(html, "</body>", &snippet) {
            content
        } else {
            return Ok(Outcome::skip("no placeholder or </body> tag"));
        };

        Ok(Outcome::from_edit(
            html,
            content,
            vec![format!("Integrated {grade}/{module} ({lessons} lessons)")],
        ))
    }
}

/// `practice-simple.js` loader and init block for a lesson
pub fn practice_simple_block(page: &Page) -> String {
    format!(
        r#"<!-- Practice System -->
    <script src="{src}"></script>
    <script>
        document.addEventListener('DOMContentLoaded', function() {{
            if (typeof PracticeSimple !== 'undefined') {{
                PracticeSimple.init('{id}');
            }}
        }});
    </script>
    "#,
        src = page.asset("js/practice-simple.js"),
        id = js_string(&page.info.lesson_id()),
    )
}

/// Whether a page has practice exercises
pub fn has_practice_section(html: &str) -> bool {
    html.contains("practice-advanced") || html.contains("practice-exercise")
}

/// Loads the practice exercise component on lessons with practice sections
pub struct PracticeSimple;

impl PageTransform for PracticeSimple {
    fn name(&self) -> &'static str {
        "practice-simple"
    }

    fn scope(&self) -> Scope {
        Scope::Lessons
    }

    fn apply(&self, page: &Page, html: &str) -> Result<Outcome> {
        if !has_practice_section(html) {
            return Ok(Outcome::skip("no practice section"));
        }
        if html.contains("practice-simple.js") {
            return Ok(Outcome::skip("already has practice-simple.js"));
        }

        let block = practice_simple_block(page);
        let script_start = lazy_regex!(r"LearningProgress\.init\([^)]+\);")
            .find(html)
            .and_then(|m| html[..m.start()].rfind("<script>"));

        let content = match script_start {
            Some(pos) => splice(html, pos, &block),
            None => {
                let block = format!("\n    {}", block.trim_end_matches(' '));
                match insert_before_last(html, "</body>", &block) {
                    Some(content) => content,
                    None => return Ok(Outcome::skip("no insertion point")),
                }
            }
        };
        Ok(Outcome::from_edit(
            html,
            content,
            vec![format!("Added PracticeSimple.init('{}')", page.info.lesson_id())],
        ))
    }
}

/// Adds the Scratch block stylesheet and language toggle to Scratch lessons
pub struct ScratchBlocks;

impl PageTransform for ScratchBlocks {
    fn name(&self) -> &'static str {
        "scratch-blocks"
    }

    fn scope(&self) -> Scope {
        Scope::Lessons
    }

    fn apply(&self, page: &Page, html: &str) -> Result<Outcome> {
        let is_scratch = page
            .info
            .module
            .as_deref()
            .map(|m| m.contains("scratch"))
            .unwrap_or(false);
        if !is_scratch {
            return Ok(Outcome::skip("not a Scratch module"));
        }

        let mut content = html.to_string();
        let mut changes = Vec::new();

        if !content.contains("scratch-blocks.css") {
            let link = format!(
                "<!-- Authentic Scratch Blocks -->\n    <link rel=\"stylesheet\" href=\"{}\">\n    ",
                page.asset("css/scratch-blocks.css")
            );
            let anchor = lazy_regex!(r#"rel="stylesheet">\s*<style>"#)
                .find(&content)
                .map(|m| m.end() - "<style>".len());
            let updated = match anchor {
                Some(pos) => Some(splice(&content, pos, &link)),
                None => insert_before_first(&content, "</head>", &link),
            };
            if let Some(updated) = updated {
                content = updated;
                changes.push("Added scratch-blocks.css".to_string());
            }
        }

        if !content.contains("scratch-blocks.js") {
            let script = format!(
                "<!-- Scratch Blocks Language Toggle -->\n    <script src=\"{}\"></script>\n\n    ",
                page.asset("js/scratch-blocks.js")
            );
            let updated = insert_before_first(&content, "<!-- Progress Tracking -->", &script)
                .or_else(|| insert_before_last(&content, "</body>", &script));
            if let Some(updated) = updated {
                content = updated;
                changes.push("Added scratch-blocks.js".to_string());
            }
        }

        Ok(Outcome::from_edit(html, content, changes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::LearningHubConfig;
    use crate::core::page::Site;
    use std::fs;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    fn page_at(root: &Path, rel: &str) -> Page {
        let mut config = LearningHubConfig::default();
        config.site.root = root.to_path_buf();
        Site::from_config(&config).page(&root.join("content/tic").join(rel))
    }

    fn page(rel: &str) -> Page {
        page_at(&PathBuf::from("/site"), rel)
    }

    fn updated(outcome: Outcome) -> String {
        match outcome {
            Outcome::Updated { content, .. } => content,
            Outcome::Skipped(reason) => panic!("unexpected skip: {reason}"),
        }
    }

    #[test]
    fn test_passing_score() {
        assert_eq!(passing_score(0), 0);
        assert_eq!(passing_score(3), 2);
        assert_eq!(passing_score(5), 4);
        assert_eq!(passing_score(6), 4);
        assert_eq!(passing_score(8), 6);
        assert_eq!(passing_score(10), 7);
    }

    #[test]
    fn test_evidence_before_progress() {
        let page = page("cls5/m1-sisteme/lectia1.html");
        let html = r#"<body><script src="../../../../assets/js/progress.js"></script></body>"#;
        let content = updated(EvidenceScript.apply(&page, html).unwrap());
        assert!(content.contains(
            "<script src=\"../../../../assets/js/evidence-system.js\"></script>\n    <script src=\"../../../../assets/js/progress.js\">"
        ));
        assert!(!EvidenceScript.apply(&page, &content).unwrap().is_updated());
        assert!(!EvidenceScript.apply(&page, "<body></body>").unwrap().is_updated());
    }

    #[test]
    fn test_quiz_counts_questions() {
        let page = page("cls5/m1-sisteme/lectia1.html");
        let html = r#"<body>
<div class="quiz-question" data-correct="a"></div>
<div class="quiz-question" data-correct="b"></div>
<div class="quiz-question" data-correct="c"></div>
</body>"#;
        let content = updated(QuizEnhancements.apply(&page, html).unwrap());
        assert!(content.contains("passingScore: 2,"));
        assert!(content.contains("totalQuestions: 3,"));
        assert!(!QuizEnhancements.apply(&page, &content).unwrap().is_updated());

        let index = self::page("cls5/m1-sisteme/index.html");
        assert!(!QuizEnhancements.apply(&index, html).unwrap().is_updated());
    }

    #[test]
    fn test_rpg_insertion_points() {
        let page = page("cls6/m2-scratch/lectia1.html");
        let html = r#"<body><script src="p/progress.js"></script><p>end</p></body>"#;
        let content = updated(RpgSystem.apply(&page, html).unwrap());
        let rpg = content.find("<!-- RPG System -->").unwrap();
        assert!(rpg > content.find("progress.js").unwrap());
        assert!(rpg < content.find("<p>end</p>").unwrap());
        assert!(content.contains("RPG.init('cls6', 'm2-scratch');"));
        assert!(content.contains("correctCount >= 3"));

        let options = r#"<div class="quiz-option"></div>"#.repeat(24);
        let html = format!("<body>{options}</body>");
        let content = updated(RpgSystem.apply(&page, &html).unwrap());
        assert!(content.contains("RPG.onQuizPass(correctCount, 5, correctCount === 5);"));

        assert!(RpgSystem.apply(&page, "<p>no body</p>").is_err());
    }

    #[test]
    fn test_progress_tracking() {
        let page = page("cls5/m3-word/lectia4-formatare.html");
        let content = updated(ProgressTracking.apply(&page, "<body></body>").unwrap());
        assert!(content.contains("LearningProgress.init('cls5', 'm3-word', 'lectia4');"));
        assert!(content.contains("../../../../assets/js/progress.js"));
        assert!(!ProgressTracking.apply(&page, &content).unwrap().is_updated());

        let odd = self::page("cls5/m3-word/recap.html");
        assert!(!ProgressTracking.apply(&odd, "<body></body>").unwrap().is_updated());
    }

    #[test]
    fn test_module_progress_counts_lessons() {
        let tmp = TempDir::new().unwrap();
        let module = tmp.path().join("content/tic/cls7/m4-web");
        fs::create_dir_all(&module).unwrap();
        for name in ["lectia1.html", "lectia2.html", "lectia3.html", "index.html"] {
            fs::write(module.join(name), "").unwrap();
        }
        let page = page_at(tmp.path(), "cls7/m4-web/index.html");
        let html = "<body>\n<script>\n    // Future: Track progress\n</script>\n</body>";
        let content = updated(ModuleProgress.apply(&page, html).unwrap());
        assert!(content.contains("updateModuleProgress('cls7', 'm4-web', 3)"));
        assert!(!content.contains("Future: Track progress"));

        let empty = page_at(tmp.path(), "cls7/m5-proiect/index.html");
        let content = updated(ModuleProgress.apply(&empty, "<body></body>").unwrap());
        assert!(content.contains("updateModuleProgress('cls7', 'm5-proiect', 6)"));
    }

    #[test]
    fn test_practice_simple_before_progress_script() {
        let page = page("cls5/m1-sisteme/lectia1-calculator.html");
        let html = "<section class=\"practice-advanced\"></section>\n    <script>\n        LearningProgress.init('cls5', 'm1-sisteme', 'lectia1');\n    </script>\n</body>";
        let content = updated(PracticeSimple.apply(&page, html).unwrap());
        let init = content.find("PracticeSimple.init('cls5-m1-sisteme-lectia1-calculator')").unwrap();
        assert!(init < content.find("LearningProgress.init").unwrap());
        assert!(!PracticeSimple.apply(&page, &content).unwrap().is_updated());

        let fallback = "<div class=\"practice-exercise\"></div></body>";
        let content = updated(PracticeSimple.apply(&page, fallback).unwrap());
        assert!(content.ends_with("</script>\n</body>"));
    }

    #[test]
    fn test_scratch_blocks_only_for_scratch_modules() {
        let page = page("cls6/m2-scratch/lectia4-variabile.html");
        let html = "<head><link href=\"font\" rel=\"stylesheet\">\n    <style></style></head>\n<body>\n    <!-- Progress Tracking -->\n</body>";
        let content = updated(ScratchBlocks.apply(&page, html).unwrap());
        assert!(content.contains(
            "<!-- Authentic Scratch Blocks -->\n    <link rel=\"stylesheet\" href=\"../../../../assets/css/scratch-blocks.css\">\n    <style>"
        ));
        assert!(content.contains("scratch-blocks.js\"></script>\n\n    <!-- Progress Tracking -->"));
        assert!(!ScratchBlocks.apply(&page, &content).unwrap().is_updated());

        let other = self::page("cls6/m1-prezentari/lectia1.html");
        assert!(!ScratchBlocks.apply(&other, html).unwrap().is_updated());
    }
}
