//! One-pass repair of everything the lesson audit reports.

use regex::Captures;

use super::fixes::LESSON_SUMMARY_DIV;
use super::{Outcome, PageTransform, Scope};
use crate::audit::{count_quiz_questions, has_inline_check_answer, quiz_bridge_total, QuestionSources};
use crate::core::errors::Result;
use crate::core::html::{insert_before_first, insert_before_last, js_string, splice};
use crate::core::page::Page;
use crate::lazy_regex;
use crate::transforms::scripts::has_practice_section;

/// Adds missing summary, practice and quiz bridge components to a lesson and
/// corrects `QuizBridge.init` totals
pub struct LessonFixer;

impl PageTransform for LessonFixer {
    fn name(&self) -> &'static str {
        "fix-lessons"
    }

    fn scope(&self) -> Scope {
        Scope::Lessons
    }

    fn apply(&self, page: &Page, html: &str) -> Result<Outcome> {
        let lesson_id = js_string(&page.info.lesson_id());
        let questions = count_quiz_questions(html, QuestionSources::HandlersOnly);
        let has_quiz = has_inline_check_answer(html) && questions > 0;
        let has_practice = has_practice_section(html);

        let mut content = html.to_string();
        let mut changes = Vec::new();

        if !content.contains("id=\"lesson-summary\"") {
            if let Some(pos) = content.find("</main>") {
                content = splice(&content, pos + "</main>".len(), &format!("\n{LESSON_SUMMARY_DIV}"));
                changes.push("Added #lesson-summary div".to_string());
            }
        }

        if has_practice && !content.contains("practice-simple.js") {
            let tag = format!(
                "    <script src=\"{}\"></script>\n",
                page.asset("js/practice-simple.js")
            );
            if let Some(updated) = before_progress_init(&content, &tag) {
                content = updated;
                changes.push("Added practice-simple.js".to_string());
            }
        }

        if has_practice && !content.contains("PracticeSimple.init") {
            let init = format!(
                r#"    <script>
        document.addEventListener('DOMContentLoaded', function() {{
            if (typeof PracticeSimple !== 'undefined') {{
                PracticeSimple.init('{lesson_id}');
            }}
        }});
    </script>
"#
            );
            if let Some(updated) = before_progress_init(&content, &init) {
                content = updated;
                changes.push("Added PracticeSimple.init()".to_string());
            }
        }

        if !content.contains("lesson-summary.js")
            && content.contains("</head>")
            && content.contains("</body>")
        {
            let tag = format!(
                "    <!-- Lesson Summary System -->\n    <script src=\"{}\"></script>\n",
                page.asset("js/lesson-summary.js")
            );
            let updated = insert_before_first(&content, "    <!-- Breadcrumb Navigation -->", &tag)
                .or_else(|| insert_before_last(&content, "</body>", &tag));
            if let Some(updated) = updated {
                content = updated;
                changes.push("Added lesson-summary.js".to_string());
            }
        }

        if !content.contains("LessonSummary.init") {
            let init = format!(
                r#"    <script>
        if (typeof LessonSummary !== 'undefined') {{
            LessonSummary.init('{lesson_id}');
        }}
    </script>
"#
            );
            if let Some(updated) = insert_before_last(&content, "</body>", &init) {
                content = updated;
                changes.push("Added LessonSummary.init()".to_string());
            }
        }

        if has_quiz {
            if !content.contains("quiz-bridge.js") {
                let src = page.asset("js/quiz-bridge.js");
                let tag = format!("    <!-- Quiz Bridge -->\n    <script src=\"{src}\"></script>\n");
                let updated = insert_before_first(&content, "    <!-- Lesson Summary System -->", &tag)
                    .or_else(|| insert_before_last(&content, "</body>", &tag));
                if let Some(updated) = updated {
                    content = updated;
                    changes.push("Added quiz-bridge.js".to_string());
                }
            }

            if let Some(change) = fix_quiz_bridge_init(&mut content, &lesson_id, questions) {
                changes.push(change);
            }
        }

        Ok(Outcome::from_edit(html, content, changes))
    }
}

/// Insert `snippet` before the `<script>` that calls `LearningProgress.init`
fn before_progress_init(content: &str, snippet: &str) -> Option<String> {
    let m = lazy_regex!(r"<script>\s*\n\s*LearningProgress\.init").find(content)?;
    Some(splice(content, m.start(), snippet))
}

fn quiz_bridge_init_block(lesson_id: &str, questions: usize) -> String {
    format!(
        r#"<script>
        if (document.readyState === 'loading') {{
            document.addEventListener('DOMContentLoaded', function() {{
                QuizBridge.init('{lesson_id}', {{ totalQuestions: {questions} }});
            }});
        }} else {{
            QuizBridge.init('{lesson_id}', {{ totalQuestions: {questions} }});
        }}
    </script>"#
    )
}

/// Make sure a single readyState-guarded `QuizBridge.init` with the right
/// total exists. Returns the change description when the page was edited.
fn fix_quiz_bridge_init(content: &mut String, lesson_id: &str, questions: usize) -> Option<String> {
    let has_init = lazy_regex!(r"QuizBridge\.init\([^)]+\)").is_match(content);

    if !has_init {
        if content.contains("QuizBridge.init") {
            return None;
        }
        let loader = lazy_regex!(r#"<script src="[^"]*quiz-bridge\.js"></script>"#).find(content)?;
        let block = format!("\n    {}\n", quiz_bridge_init_block(lesson_id, questions));
        *content = splice(content, loader.end(), &block);
        return Some(format!("Added QuizBridge.init (totalQuestions={questions})"));
    }

    let stale = quiz_bridge_total(content).is_some_and(|n| n != questions);
    if content.contains("document.readyState") {
        if !stale {
            return None;
        }
        let fixed = lazy_regex!(r"(QuizBridge\.init\([^,]+,\s*\{\s*totalQuestions:\s*)\d+")
            .replace_all(content, |caps: &Captures| format!("{}{}", &caps[1], questions))
            .into_owned();
        *content = fixed;
        return Some(format!("Fixed QuizBridge.init (totalQuestions={questions})"));
    }

    let old_block = lazy_regex!(
        r#"(?s)<script>\s*(?:document\.addEventListener\(['"]DOMContentLoaded['"],\s*function\(\)\s*\{)?\s*QuizBridge\.init\([^)]+\);?\s*(?:\}\);?)?\s*</script>"#
    );
    let m = old_block.find(content)?;
    let replacement = quiz_bridge_init_block(lesson_id, questions);
    let old = m.as_str().to_string();
    *content = content.replacen(&old, &replacement, 1);
    Some(format!(
        "Fixed QuizBridge.init (totalQuestions={questions}, added readyState)"
    ))
}
