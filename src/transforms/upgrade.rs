//! Grading and progress-export upgrade for classic lessons.
//!
//! Adds the lesson summary component, its init call and a download button
//! that saves the student's progress as JSON for the teacher. Atomic lessons
//! and quiz pages are left alone; they carry their own export.

use super::{Outcome, PageTransform, Scope};
use crate::core::errors::Result;
use crate::core::html::{insert_before_first, insert_before_last, js_string, splice};
use crate::core::page::Page;
use crate::lazy_regex;

const DOWNLOAD_SECTION: &str = r#"
        <section class="section-card" style="margin-top: 2rem; text-align: center;">
            <p style="color: var(--text-secondary); margin-bottom: 1rem;">
                Dupa ce termini lectia, poti descarca progresul pentru profesor.
            </p>
            <button onclick="downloadLessonProgress()" class="btn btn-primary" style="background: var(--accent-blue);">
                &#128190; Descarca progresul (JSON)
            </button>
        </section>"#;

/// Adds `lesson-summary.js`, `LessonSummary.init`, the `#lesson-summary`
/// container and the progress download button to classic lessons
pub struct LessonUpgrade;

impl PageTransform for LessonUpgrade {
    fn name(&self) -> &'static str {
        "upgrade-lessons"
    }

    fn scope(&self) -> Scope {
        Scope::Lessons
    }

    fn apply(&self, page: &Page, html: &str) -> Result<Outcome> {
        let name = page.file_name();
        if name.ends_with("-atomic.html") || name.starts_with("quiz") {
            return Ok(Outcome::skip("atomic or quiz page"));
        }
        if html.contains("lesson-summary.js") || html.contains("LessonSummary.init") {
            return Ok(Outcome::skip("already upgraded"));
        }
        if !is_classic_lesson(html) {
            return Ok(Outcome::skip("not a standard lesson file"));
        }

        let lesson_id = js_string(&page.info.lesson_id());
        let mut content = html.to_string();
        let mut changes = Vec::new();

        if !content.contains("downloadLessonProgress") {
            let mut section = String::from("\n        <!-- Lesson Summary & Export -->");
            if !content.contains("id=\"lesson-summary\"") {
                section.push_str("\n        <div id=\"lesson-summary\" style=\"display: none;\"></div>\n");
            }
            section.push_str(DOWNLOAD_SECTION);

            if let Some(nav) = lazy_regex!(r"(?s)<!-- Navigation Bottom -->.*?</div>").find(&content) {
                let start = nav.start();
                content = splice(&content, start, &format!("{section}\n\n        "));
                changes.push("Added download button and summary container".to_string());
            } else if let Some(updated) =
                insert_before_first(&content, "<footer>", &format!("{section}\n\n    "))
            {
                content = updated;
                changes.push("Added download button before footer".to_string());
            }
        }

        let init = format!(
            r#"
        // Initialize Lesson Summary for grading
        if (typeof LessonSummary !== 'undefined') {{
            LessonSummary.init('{lesson_id}');
        }}"#
        );
        if let Some(call) = lazy_regex!(r"LearningProgress\.init\([^)]+\);").find(&content) {
            content = splice(&content, call.end(), &init);
            changes.push("Added LessonSummary.init()".to_string());
        } else if let Some(pos) = content.rfind("</script>").filter(|&pos| pos > 0) {
            content = splice(&content, pos, &format!("{init}\n    "));
            changes.push("Added LessonSummary.init()".to_string());
        }

        if !content.contains("function downloadLessonProgress") {
            let function = format!(
                r#"
        function downloadLessonProgress() {{
            if (typeof LessonSummary !== 'undefined') {{
                LessonSummary.downloadProgress('{lesson_id}-progres.json');
            }} else {{
                alert('Sistemul de export nu este disponibil.');
            }}
        }}
    "#
            );
            let tail = lazy_regex!(r"</script>\n(?:    \n)?</body>").find(&content);
            if let Some(tail) = tail {
                content = splice(&content, tail.start(), &function);
                changes.push("Added downloadLessonProgress function".to_string());
            }
        }

        // added last so the tag does not become the closing script anchor
        let tag = format!(
            "\n    <!-- Lesson Summary System (Grading + Export) -->\n    <script src=\"{}\"></script>",
            page.asset("js/lesson-summary.js")
        );
        let updated = insert_before_first(&content, "<!-- User System -->", &format!("{tag}\n\n    "))
            .or_else(|| insert_before_last(&content, "</body>", &format!("{tag}\n")));
        if let Some(updated) = updated {
            content = updated;
            changes.push("Added lesson-summary.js script".to_string());
        }

        if changes.is_empty() {
            return Ok(Outcome::skip("injection points not found"));
        }
        Ok(Outcome::from_edit(html, content, changes))
    }
}

/// Section cards, step sections or quiz options mark a classic lesson
fn is_classic_lesson(html: &str) -> bool {
    html.contains("<section class=\"section-card\">")
        || (html.contains(".section {") && html.contains("goal-section"))
        || html.contains("class=\"section\"")
        || html.contains("quiz-option")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::LearningHubConfig;
    use crate::core::page::Site;
    use std::path::{Path, PathBuf};

    fn page_at(rel: &str) -> Page {
        let mut config = LearningHubConfig::default();
        config.site.root = PathBuf::from("/site");
        Site::from_config(&config).page(&Path::new("/site/content/tic").join(rel))
    }

    const LESSON: &str = r#"<html><head><title>Excel</title></head>
<body>
<div class="container">
    <section class="section-card">
        <button class="quiz-option">A</button>
    </section>
    <!-- Navigation Bottom -->
    <div class="nav-bottom"><a href="lectia2.html">Inainte</a></div>
</div>
<footer>LearningHub</footer>
<script>
    LearningProgress.init('cls7', 'm2-excel', 'lectia3');
</script>
</body></html>"#;

    fn updated(outcome: Outcome) -> (String, Vec<String>) {
        match outcome {
            Outcome::Updated { content, changes } => (content, changes),
            Outcome::Skipped(reason) => panic!("unexpected skip: {reason}"),
        }
    }

    #[test]
    fn test_upgrade_adds_summary_and_download() {
        let page = page_at("cls7/m2-excel/lectia3.html");
        let (content, changes) = updated(LessonUpgrade.apply(&page, LESSON).unwrap());

        assert_eq!(changes.len(), 4, "{changes:?}");
        assert!(content.contains(r#"<script src="../../../../assets/js/lesson-summary.js"></script>"#));
        assert!(content.contains("LessonSummary.init('cls7-m2-excel-lectia3');"));
        assert!(content.contains("LessonSummary.downloadProgress('cls7-m2-excel-lectia3-progres.json')"));
        assert!(content.contains("Descarca progresul (JSON)"));
        assert_eq!(content.matches("id=\"lesson-summary\"").count(), 1);

        let button = content.find("downloadLessonProgress()").unwrap();
        let nav = content.find("<!-- Navigation Bottom -->").unwrap();
        assert!(button < nav);

        let progress = content.find("LearningProgress.init").unwrap();
        let init = content.find("LessonSummary.init").unwrap();
        assert!(progress < init);
        let function = content.find("function downloadLessonProgress").unwrap();
        let loader = content.find("lesson-summary.js").unwrap();
        assert!(init < function && function < loader);
        assert!(content.contains("}\n    </script>\n\n    <!-- Lesson Summary System"));
    }

    #[test]
    fn test_second_run_is_noop() {
        let page = page_at("cls7/m2-excel/lectia3.html");
        let (content, _) = updated(LessonUpgrade.apply(&page, LESSON).unwrap());
        assert_eq!(
            LessonUpgrade.apply(&page, &content).unwrap(),
            Outcome::skip("already upgraded")
        );
    }

    #[test]
    fn test_keeps_existing_summary_container() {
        let html = LESSON.replace(
            "<footer>",
            "<div id=\"lesson-summary\" style=\"display: none;\"></div>\n<footer>",
        );
        let page = page_at("cls7/m2-excel/lectia3.html");
        let (content, _) = updated(LessonUpgrade.apply(&page, &html).unwrap());
        assert_eq!(content.matches("id=\"lesson-summary\"").count(), 1);
    }

    #[test]
    fn test_falls_back_to_footer_and_last_script() {
        let html = r#"<html><body>
<div class="section">Text</div>
<footer>LearningHub</footer>
<script>
    console.log('ready');
</script>
</body></html>"#;
        let page = page_at("cls5/m1-sisteme/lectia1.html");
        let (content, changes) = updated(LessonUpgrade.apply(&page, html).unwrap());

        assert!(changes.contains(&"Added download button before footer".to_string()));
        let init = content.find("LessonSummary.init('cls5-m1-sisteme-lectia1')").unwrap();
        let log = content.find("console.log").unwrap();
        assert!(log < init);
        assert!(content.find("downloadLessonProgress()").unwrap() < content.find("<footer>").unwrap());
    }

    #[test]
    fn test_skips_atomic_quiz_and_unknown_pages() {
        let atomic = page_at("cls5/m1-sisteme/lectia1-atomic.html");
        assert!(!LessonUpgrade.apply(&atomic, LESSON).unwrap().is_updated());

        let plain = page_at("cls5/m1-sisteme/lectia1.html");
        assert_eq!(
            LessonUpgrade.apply(&plain, "<html><body><p>x</p></body></html>").unwrap(),
            Outcome::skip("not a standard lesson file")
        );
    }
}
