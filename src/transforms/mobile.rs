//! Mobile stylesheet links and small accessibility fixes.

use regex::{Captures, NoExpand};

use super::{Outcome, PageTransform, Scope};
use crate::core::errors::{LearningHubError, Result};
use crate::core::html::{insert_after_first, insert_before_first};
use crate::core::page::Page;
use crate::lazy_regex;

/// Links `assets/css/mobile.css` in every page that lacks it
pub struct MobileCss;

impl PageTransform for MobileCss {
    fn name(&self) -> &'static str {
        "mobile-css"
    }

    fn scope(&self) -> Scope {
        Scope::SiteHtml
    }

    fn apply(&self, page: &Page, html: &str) -> Result<Outcome> {
        if html.contains("mobile.css") {
            return Ok(Outcome::skip("already has mobile.css"));
        }
        let href = page.asset("css/mobile.css");
        let link = format!("    <link rel=\"stylesheet\" href=\"{href}\">\n");
        let content = insert_before_first(html, "</head>", &link)
            .ok_or_else(|| LearningHubError::transform(self.name(), "no </head> tag found"))?;
        Ok(Outcome::from_edit(html, content, vec![format!("Added: {href}")]))
    }
}

/// Repairs mobile stylesheet links and adds the skip link, the
/// `#main-content` landmark and lazy image loading
pub struct MobileFirst;

impl PageTransform for MobileFirst {
    fn name(&self) -> &'static str {
        "mobile-first"
    }

    fn scope(&self) -> Scope {
        Scope::SiteHtml
    }

    fn apply(&self, page: &Page, html: &str) -> Result<Outcome> {
        let css_base = page.asset("css/");
        let mobile_href = format!("{css_base}mobile.css");
        let mobile_first_href = format!("{css_base}mobile-first.css");
        let mut content = html.to_string();
        let mut changes = Vec::new();

        let nested = lazy_regex!(r#"<link rel="stylesheet" href="<link[^>]*>[^"]*">\n?\s*"#);
        if nested.is_match(&content) {
            content = nested.replace_all(&content, "").into_owned();
            changes.push("Removed broken CSS links".to_string());
        }

        let mobile_first =
            lazy_regex!(r#"<link rel="stylesheet" href="([^"]*mobile-first\.css[^"]*)">\n?\s*"#);
        let hrefs: Vec<String> = mobile_first
            .captures_iter(&content)
            .map(|c| c[1].to_string())
            .collect();
        if hrefs.len() > 1 || hrefs.iter().any(|h| *h != mobile_first_href) {
            content = mobile_first.replace_all(&content, "").into_owned();
            changes.push("Removed broken/duplicate mobile-first.css links".to_string());
        }

        let mobile = lazy_regex!(r#"<link rel="stylesheet" href="([^"]*mobile\.css[^"]*)">"#);
        if mobile
            .captures_iter(&content)
            .any(|c| c[1] != *mobile_href)
        {
            let replacement = format!(r#"<link rel="stylesheet" href="{mobile_href}">"#);
            content = mobile
                .replace_all(&content, NoExpand(&replacement))
                .into_owned();
            changes.push(format!("Fixed mobile.css path ({mobile_href})"));
        }

        if !content.contains("mobile-first.css") {
            let existing = mobile.find(&content).map(|m| m.end());
            if let Some(end) = existing {
                let link = format!("\n    <link rel=\"stylesheet\" href=\"{mobile_first_href}\">");
                content.insert_str(end, &link);
                changes.push(format!("Added mobile-first.css ({mobile_first_href})"));
            } else if let Some(updated) = insert_before_first(
                &content,
                "</head>",
                &format!(
                    "    <link rel=\"stylesheet\" href=\"{mobile_href}\">\n    <link rel=\"stylesheet\" href=\"{mobile_first_href}\">\n"
                ),
            ) {
                content = updated;
                changes.push("Added mobile.css and mobile-first.css".to_string());
            }
        }

        if !content.contains("<a href=\"#main-content\"") {
            if let Some(body) = lazy_regex!(r"<body\b[^>]*>").find(&content) {
                let tag = body.as_str().to_string();
                if let Some(updated) = insert_after_first(
                    &content,
                    &tag,
                    "\n    <a href=\"#main-content\" class=\"skip-link\">Sari la continut</a>",
                ) {
                    content = updated;
                    changes.push("Added skip-to-content link".to_string());
                }
            }
        }

        if !content.contains("id=\"main-content\"") {
            if let Some(updated) = add_main_landmark(&content) {
                content = updated;
                changes.push("Added id=\"main-content\"".to_string());
            }
        }

        let lazy = add_lazy_loading(&content);
        if lazy != content {
            content = lazy;
            changes.push("Added lazy loading to images".to_string());
        }

        Ok(Outcome::from_edit(html, content, changes))
    }
}

/// Mark the first `.container`, `<main>` or `.loading-container` as the
/// skip link target
fn add_main_landmark(content: &str) -> Option<String> {
    if content.contains(r#"<div class="container""#) {
        return Some(content.replacen(
            r#"<div class="container""#,
            r#"<div id="main-content" class="container""#,
            1,
        ));
    }
    if let Some(m) = lazy_regex!(r"<main\b[^>]*>").find(content) {
        let tag = m.as_str();
        let with_id = format!("{} id=\"main-content\">", &tag[..tag.len() - 1]);
        let mut out = String::with_capacity(content.len() + 20);
        out.push_str(&content[..m.start()]);
        out.push_str(&with_id);
        out.push_str(&content[m.end()..]);
        return Some(out);
    }
    if content.contains(r#"<div class="loading-container""#) {
        return Some(content.replacen(
            r#"<div class="loading-container""#,
            r#"<div id="main-content" class="loading-container""#,
            1,
        ));
    }
    None
}

/// Add `loading="lazy"` to every `<img>` that does not set `loading`
pub fn add_lazy_loading(content: &str) -> String {
    lazy_regex!(r"<img\b[^>]*>")
        .replace_all(content, |caps: &Captures| {
            let tag = &caps[0];
            if tag.contains("loading=") {
                return tag.to_string();
            }
            match tag.strip_suffix("/>") {
                Some(head) => format!("{} loading=\"lazy\" />", head.trim_end()),
                None => format!("{} loading=\"lazy\">", &tag[..tag.len() - 1]),
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::LearningHubConfig;
    use crate::core::page::Site;
    use std::path::{Path, PathBuf};

    fn page(rel: &str) -> Page {
        let mut config = LearningHubConfig::default();
        config.site.root = PathBuf::from("/site");
        Site::from_config(&config).page(&Path::new("/site").join(rel))
    }

    #[test]
    fn test_mobile_css_inserted_with_relative_path() {
        let page = page("content/tic/cls5/m1-sisteme/lectia1.html");
        let html = "<html><head><title>x</title></head><body></body></html>";
        let Outcome::Updated { content, .. } = MobileCss.apply(&page, html).unwrap() else {
            panic!("expected update");
        };
        assert!(content.contains(
            "<link rel=\"stylesheet\" href=\"../../../../assets/css/mobile.css\">\n</head>"
        ));
        assert!(!MobileCss.apply(&page, &content).unwrap().is_updated());
    }

    #[test]
    fn test_mobile_css_without_head_is_error() {
        let page = page("index.html");
        assert!(MobileCss.apply(&page, "<body></body>").is_err());
    }

    #[test]
    fn test_mobile_first_full_upgrade() {
        let page = page("hub/index.html");
        let html = r#"<html><head>
    <link rel="stylesheet" href="assets/css/mobile.css">
</head>
<body class="hub">
<div class="container"><img src="a.png"><img src="b.png" loading="eager"><img src="c.png"/></div>
</body></html>"#;
        let Outcome::Updated { content, changes } = MobileFirst.apply(&page, html).unwrap() else {
            panic!("expected update");
        };
        assert!(content.contains(r#"href="../assets/css/mobile.css""#));
        assert!(content.contains(r#"href="../assets/css/mobile-first.css""#));
        assert!(content.contains("<body class=\"hub\">\n    <a href=\"#main-content\""));
        assert!(content.contains(r#"<div id="main-content" class="container">"#));
        assert!(content.contains(r#"<img src="a.png" loading="lazy">"#));
        assert!(content.contains(r#"<img src="b.png" loading="eager">"#));
        assert!(content.contains(r#"<img src="c.png" loading="lazy" />"#));
        assert!(changes.len() >= 5);

        assert!(!MobileFirst.apply(&page, &content).unwrap().is_updated());
    }

    #[test]
    fn test_mobile_first_dedupes_links_and_uses_main() {
        let page = page("index.html");
        let html = r#"<head>
    <link rel="stylesheet" href="assets/css/mobile.css">
    <link rel="stylesheet" href="assets/css/mobile-first.css">
    <link rel="stylesheet" href="assets/css/mobile-first.css">
</head><body><main class="page"></main></body>"#;
        let Outcome::Updated { content, .. } = MobileFirst.apply(&page, html).unwrap() else {
            panic!("expected update");
        };
        assert_eq!(content.matches("mobile-first.css").count(), 1);
        assert!(content.contains(r#"<main class="page" id="main-content">"#));
    }

    #[test]
    fn test_mobile_first_adds_both_links_when_missing() {
        let page = page("index.html");
        let html = "<head></head><body><div class=\"loading-container\"></div></body>";
        let Outcome::Updated { content, .. } = MobileFirst.apply(&page, html).unwrap() else {
            panic!("expected update");
        };
        assert!(content.contains("href=\"assets/css/mobile.css\""));
        assert!(content.contains("href=\"assets/css/mobile-first.css\""));
        assert!(content.contains(r#"<div id="main-content" class="loading-container">"#));
    }
}
