//! Breadcrumb navigation.

use super::{Outcome, PageTransform, Scope};
use crate::core::errors::Result;
use crate::core::html::{insert_before_last, js_string};
use crate::core::page::Page;
use crate::lazy_regex;

/// Replaces ad-hoc "back" links with the shared breadcrumb component
pub struct Breadcrumbs;

impl PageTransform for Breadcrumbs {
    fn name(&self) -> &'static str {
        "breadcrumbs"
    }

    fn scope(&self) -> Scope {
        Scope::ContentHtml
    }

    fn apply(&self, page: &Page, html: &str) -> Result<Outcome> {
        let info = &page.info;
        if info.is_index && info.rel_parts.len() == 1 {
            return Ok(Outcome::skip("content root index"));
        }
        if html.contains("breadcrumb.js") {
            return Ok(Outcome::skip("already has breadcrumb"));
        }
        let (Some(grade), Some(grade_name)) = (&info.grade, &info.grade_name) else {
            return Ok(Outcome::skip("cannot determine grade"));
        };

        let mut config = vec![
            format!("        grade: '{}'", js_string(grade)),
            format!("        gradeName: '{}'", js_string(grade_name)),
        ];
        if let (Some(module), Some(module_name)) = (&info.module, &info.module_name) {
            config.push(format!("        module: '{}'", js_string(module)));
            config.push(format!("        moduleName: '{}'", js_string(module_name)));
        }
        if !info.is_index && info.rel_parts.len() >= 2 {
            let label = title_label(html).or_else(|| info.lesson_label());
            if let Some(label) = label {
                config.push(format!("        lesson: '{}'", js_string(&label)));
            }
        }

        let script = format!(
            r#"
    <!-- Breadcrumb Navigation -->
    <script src="{src}"></script>
    <script>
        document.addEventListener('DOMContentLoaded', function() {{
            Breadcrumb.init({{
{config}
            }});
        }});
    </script>"#,
            src = page.asset("js/breadcrumb.js"),
            config = config.join(",\n"),
        );

        let mut changes = Vec::new();
        let cleaned = remove_old_nav(html);
        if cleaned != html {
            changes.push("Removed old back navigation".to_string());
        }
        let content = match insert_before_last(&cleaned, "</body>", &format!("{script}\n")) {
            Some(content) => content,
            None => format!("{cleaned}{script}"),
        };
        changes.push(format!("Added breadcrumb for {grade}"));

        Ok(Outcome::from_edit(html, content, changes))
    }
}

/// Lesson label from `<title>`: text before `|`, cut at the first `:`
fn title_label(html: &str) -> Option<String> {
    let caps = lazy_regex!(r"<title>([^|<]+)").captures(html)?;
    let title = caps[1].trim();
    if title.is_empty() {
        return None;
    }
    Some(match title.split_once(':') {
        Some((head, _)) => head.to_string(),
        None => title.to_string(),
    })
}

/// Strip the legacy back links and the nav bars they leave empty
pub fn remove_old_nav(html: &str) -> String {
    let content = lazy_regex!(r#"(?is)<a[^>]+class="nav-back"[^>]*>.*?</a>\s*"#).replace_all(html, "");
    let content = lazy_regex!(r#"(?i)<a[^>]+href="[^"]*"[^>]*>\s*←\s*(Inapoi|Înapoi)[^<]*</a>\s*"#)
        .replace_all(&content, "");
    let content =
        lazy_regex!(r#"(?i)<nav[^>]+class="nav-bar"[^>]*>\s*<span[^>]*>[^<]*</span>\s*</nav>\s*"#)
            .replace_all(&content, "");
    let content = lazy_regex!(r#"(?i)<nav[^>]+class="nav-bar"[^>]*>\s*</nav>\s*"#)
        .replace_all(&content, "");
    content.into_owned()
}
