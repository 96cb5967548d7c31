//! Markup and style fixes for pages generated by older tooling.

use regex::NoExpand;

use super::{Outcome, PageTransform, Scope};
use crate::core::errors::Result;
use crate::core::html::{insert_before_first, insert_before_last};
use crate::core::page::Page;
use crate::lazy_regex;

/// Makes `.code-block` wrap long lines
pub struct CodeBlocks;

impl PageTransform for CodeBlocks {
    fn name(&self) -> &'static str {
        "code-blocks"
    }

    fn scope(&self) -> Scope {
        Scope::ContentAndHub
    }

    fn apply(&self, _page: &Page, html: &str) -> Result<Outcome> {
        if !html.contains(".code-block {") {
            return Ok(Outcome::skip("no .code-block"));
        }
        if let Some(rule) = lazy_regex!(r"\.code-block \{[^}]*\}").find(html) {
            if rule.as_str().contains("white-space:") {
                return Ok(Outcome::skip("already has white-space"));
            }
        }
        let content = lazy_regex!(r"(\.code-block \{[^}]*overflow-x: auto;)")
            .replace_all(html, "${1}\n            white-space: pre-wrap;")
            .into_owned();
        if content == html {
            return Ok(Outcome::skip("no overflow-x rule to extend"));
        }
        Ok(Outcome::from_edit(
            html,
            content,
            vec!["Added white-space: pre-wrap".to_string()],
        ))
    }
}

/// Hidden container filled in by the lesson summary component
pub const LESSON_SUMMARY_DIV: &str = "\n    <!-- Lesson Summary & Export -->\n    <div id=\"lesson-summary\" style=\"display: none;\"></div>\n";

/// Adds the `#lesson-summary` container to lessons
pub struct LessonSummaryDiv;

impl PageTransform for LessonSummaryDiv {
    fn name(&self) -> &'static str {
        "lesson-summary-div"
    }

    fn scope(&self) -> Scope {
        Scope::Lessons
    }

    fn apply(&self, _page: &Page, html: &str) -> Result<Outcome> {
        if html.contains("id=\"lesson-summary\"") {
            return Ok(Outcome::skip("already has #lesson-summary"));
        }

        let inserted = insert_before_first(html, "<footer>", &format!("{LESSON_SUMMARY_DIV}    "))
            .map(|c| (c, "before <footer>"))
            .or_else(|| {
                html.find("</main>").map(|pos| {
                    let end = pos + "</main>".len();
                    let mut out = String::with_capacity(html.len() + LESSON_SUMMARY_DIV.len() + 1);
                    out.push_str(&html[..end]);
                    out.push('\n');
                    out.push_str(LESSON_SUMMARY_DIV);
                    out.push_str(&html[end..]);
                    (out, "after </main>")
                })
            })
            .or_else(|| {
                insert_before_last(html, "</body>", LESSON_SUMMARY_DIV).map(|c| (c, "before </body>"))
            });

        match inserted {
            Some((content, place)) => Ok(Outcome::from_edit(
                html,
                content,
                vec![format!("Added #lesson-summary {place}")],
            )),
            None => Ok(Outcome::skip("no insertion point")),
        }
    }
}

/// Removes the per-atom initialisation loop that duplicates
/// `AtomicLearning.init()`
pub struct AtomicInit;

impl PageTransform for AtomicInit {
    fn name(&self) -> &'static str {
        "atomic-init"
    }

    fn scope(&self) -> Scope {
        Scope::ContentHtml
    }

    fn apply(&self, _page: &Page, html: &str) -> Result<Outcome> {
        if !html.contains("AtomicLearning.initAtom(atomEl.id") {
            return Ok(Outcome::skip("no duplicate initialisation"));
        }

        let loop_block = lazy_regex!(
            r"(?m)^[ \t]*// Initialize all atoms\r?\n[ \t]*document\.querySelectorAll\('\.atom\[data-quiz\]'\)\.forEach\(function\(atomEl\) \{\r?\n[ \t]*var quizData = JSON\.parse\(atomEl\.dataset\.quiz \|\| '\[\]'\);\r?\n[ \t]*if \(quizData\.length > 0\) \{\r?\n[ \t]*AtomicLearning\.initAtom\(atomEl\.id, quizData\);\r?\n[ \t]*\}\r?\n[ \t]*\}\);"
        );
        let mut content = loop_block.replace_all(html, NoExpand("")).into_owned();

        if content.contains("AtomicLearning.initAtom(atomEl.id") {
            content = drop_init_loop_lines(&content);
        }

        Ok(Outcome::from_edit(
            html,
            content,
            vec!["Removed duplicate initAtom loop".to_string()],
        ))
    }
}

/// Line-based removal for loops whose formatting drifted: drops the marker
/// comment and everything up to the second `});` after it.
fn drop_init_loop_lines(content: &str) -> String {
    let mut kept = Vec::new();
    let mut closers_left = 0;
    for line in content.split('\n') {
        if line.contains("// Initialize all atoms") {
            closers_left = 2;
            continue;
        }
        if closers_left > 0 {
            if line.contains("});") {
                closers_left -= 1;
            }
            continue;
        }
        kept.push(line);
    }
    kept.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::LearningHubConfig;
    use crate::core::page::Site;
    use std::path::Path;

    fn page() -> Page {
        Site::from_config(&LearningHubConfig::default())
            .page(Path::new("./content/tic/cls5/m1-sisteme/lectia1.html"))
    }

    fn updated(outcome: Outcome) -> String {
        match outcome {
            Outcome::Updated { content, .. } => content,
            Outcome::Skipped(reason) => panic!("unexpected skip: {reason}"),
        }
    }

    #[test]
    fn test_code_blocks() {
        let html = "<style>\n        .code-block {\n            overflow-x: auto;\n        }\n</style>";
        let content = updated(CodeBlocks.apply(&page(), html).unwrap());
        assert!(content.contains("overflow-x: auto;\n            white-space: pre-wrap;"));
        assert!(!CodeBlocks.apply(&page(), &content).unwrap().is_updated());

        let no_overflow = "<style>.code-block { color: red; }</style>";
        assert!(!CodeBlocks.apply(&page(), no_overflow).unwrap().is_updated());
    }

    #[test]
    fn test_lesson_summary_strategies() {
        let footer = updated(LessonSummaryDiv.apply(&page(), "<main></main><footer></footer>").unwrap());
        assert!(footer.contains("display: none;\"></div>\n    <footer>"));

        let main = updated(LessonSummaryDiv.apply(&page(), "<main></main><body></body>").unwrap());
        assert!(main.starts_with("<main></main>\n\n    <!-- Lesson Summary"));

        let body = updated(LessonSummaryDiv.apply(&page(), "<p></p></body>").unwrap());
        assert!(body.ends_with("</div>\n</body>"));

        assert!(!LessonSummaryDiv.apply(&page(), &body).unwrap().is_updated());
        assert!(!LessonSummaryDiv.apply(&page(), "<p></p>").unwrap().is_updated());
    }

    #[test]
    fn test_atomic_init_removes_loop() {
        let html = r#"<script>
        AtomicLearning.init();
        // Initialize all atoms
        document.querySelectorAll('.atom[data-quiz]').forEach(function(atomEl) {
            var quizData = JSON.parse(atomEl.dataset.quiz || '[]');
            if (quizData.length > 0) {
                AtomicLearning.initAtom(atomEl.id, quizData);
            }
        });
        LessonSummary.init('x');
</script>"#;
        let content = updated(AtomicInit.apply(&page(), html).unwrap());
        assert!(!content.contains("initAtom"));
        assert!(content.contains("AtomicLearning.init();"));
        assert!(content.contains("LessonSummary.init('x');"));
        assert!(!AtomicInit.apply(&page(), &content).unwrap().is_updated());
    }

    #[test]
    fn test_atomic_init_line_fallback() {
        let html = "a\n// Initialize all atoms\ndocument.querySelectorAll('.atom').forEach(function(atomEl) {\n  if (x) { AtomicLearning.initAtom(atomEl.id, q); });\n});\nb";
        let content = updated(AtomicInit.apply(&page(), html).unwrap());
        assert_eq!(content, "a\nb");
    }
}
