//! Site layout model: what a page path says about grade, module and lesson.

use std::path::{Component, Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::core::config::LearningHubConfig;
use crate::core::file_utils::SiteWalker;

static LESSON_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^lectia(\d+)").expect("valid lesson number regex"));

/// Resolved site layout plus display names, shared by every page operation
#[derive(Debug, Clone)]
pub struct Site {
    /// Site root
    pub root: PathBuf,
    /// Lesson content directory (`<root>/content/tic`)
    pub content_dir: PathBuf,
    /// Hub pages directory
    pub hub_dir: PathBuf,
    /// Assets directory relative to the root, forward slashes
    pub assets_dir: String,
    skip_dirs: Vec<String>,
    config: LearningHubConfig,
}

impl Site {
    /// Build the site model from configuration
    pub fn from_config(config: &LearningHubConfig) -> Self {
        Self {
            root: config.site.root.clone(),
            content_dir: config.site.content_path(),
            hub_dir: config.site.hub_path(),
            assets_dir: config.site.assets_dir.trim_end_matches('/').to_string(),
            skip_dirs: config.site.skip_dirs.clone(),
            config: config.clone(),
        }
    }

    /// Configuration the site was built from
    pub fn config(&self) -> &LearningHubConfig {
        &self.config
    }

    /// Walker honouring the configured skip directories
    pub fn walker(&self) -> SiteWalker {
        SiteWalker::new(&self.skip_dirs)
    }

    /// Describe the page at `path`
    pub fn page(&self, path: &Path) -> Page {
        let info = PageInfo::from_path(&self.content_dir, path, &self.config);
        let root_prefix = root_prefix(&self.root, path);
        let assets_prefix = format!("{}{}/", root_prefix, self.assets_dir);
        Page {
            path: path.to_path_buf(),
            info,
            root_prefix,
            assets_prefix,
        }
    }
}

/// A page on disk together with its position in the site
#[derive(Debug, Clone)]
pub struct Page {
    /// Path of the HTML file
    pub path: PathBuf,
    /// Grade/module/lesson facts derived from the path
    pub info: PageInfo,
    /// `../` chain from the page's directory back to the site root
    pub root_prefix: String,
    /// `root_prefix` followed by the assets directory and a slash
    pub assets_prefix: String,
}

impl Page {
    /// Relative URL of a file under the assets directory
    pub fn asset(&self, rel: &str) -> String {
        format!("{}{}", self.assets_prefix, rel)
    }

    /// File name of the page
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Whether the file name looks like a lesson (`lectia*.html`)
    pub fn is_lesson(&self) -> bool {
        let name = self.file_name();
        name.starts_with("lectia") && name.ends_with(".html")
    }
}

/// Facts derived from a page's path relative to the content directory
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageInfo {
    /// Path components relative to the content directory
    pub rel_parts: Vec<String>,
    /// Grade directory (`cls6`)
    pub grade: Option<String>,
    /// Grade display name
    pub grade_name: Option<String>,
    /// Module directory (`m1-prezentari`)
    pub module: Option<String>,
    /// Module display name
    pub module_name: Option<String>,
    /// Number from a `lectiaN` file-name prefix
    pub lesson_number: Option<u32>,
    /// File is an `index.html`
    pub is_index: bool,
}

impl PageInfo {
    /// Derive page facts; pages outside `content_dir` get no grade or module
    pub fn from_path(content_dir: &Path, path: &Path, config: &LearningHubConfig) -> Self {
        let rel_parts: Vec<String> = path
            .strip_prefix(content_dir)
            .map(|rel| {
                rel.components()
                    .filter_map(|c| match c {
                        Component::Normal(p) => Some(p.to_string_lossy().into_owned()),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default();

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut info = PageInfo {
            is_index: file_name == "index.html",
            ..Default::default()
        };

        if let Some(first) = rel_parts.first().filter(|p| p.starts_with("cls")) {
            // a bare file name directly in the content dir is not a grade
            if rel_parts.len() > 1 {
                info.grade_name = Some(config.grade_name(first));
                info.grade = Some(first.clone());
            }
        }
        if let Some(second) = rel_parts.get(1).filter(|p| p.starts_with('m')) {
            if rel_parts.len() > 2 {
                info.module_name = Some(config.module_name(second));
                info.module = Some(second.clone());
            }
        }
        info.lesson_number = LESSON_NUMBER
            .captures(&file_name)
            .and_then(|c| c[1].parse().ok());
        info.rel_parts = rel_parts;
        info
    }

    /// Relative path components joined with `-`, `.html` dropped
    /// (`cls5-m1-sisteme-lectia1-calculator`)
    pub fn lesson_id(&self) -> String {
        self.rel_parts.join("-").trim_end_matches(".html").to_string()
    }

    /// `grade/module/stem` identifier used by progress tracking
    pub fn lesson_key(&self) -> Option<String> {
        Some(format!(
            "{}/{}/lectia{}",
            self.grade.as_ref()?,
            self.module.as_ref()?,
            self.lesson_number?
        ))
    }

    /// File stem with dashes as spaces, title-cased (`Lectia1 Intro`)
    pub fn lesson_label(&self) -> Option<String> {
        let last = self.rel_parts.last()?;
        let stem = last.trim_end_matches(".html").replace('-', " ");
        Some(title_case(&stem))
    }
}

/// Capitalise each letter that follows a non-letter, lowercase the rest
pub fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut prev_alpha = false;
    for ch in text.chars() {
        if ch.is_alphabetic() {
            if prev_alpha {
                out.extend(ch.to_lowercase());
            } else {
                out.extend(ch.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(ch);
            prev_alpha = false;
        }
    }
    out
}

/// `../` chain from the directory containing `path` back to `root`
pub fn root_prefix(root: &Path, path: &Path) -> String {
    let depth = path
        .parent()
        .and_then(|parent| parent.strip_prefix(root).ok())
        .map(|rel| {
            rel.components()
                .filter(|c| matches!(c, Component::Normal(_)))
                .count()
        })
        .unwrap_or(0);
    "../".repeat(depth)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site() -> Site {
        let mut config = LearningHubConfig::default();
        config.site.root = PathBuf::from("/srv/hub");
        Site::from_config(&config)
    }

    #[test]
    fn test_lesson_page_info() {
        let site = site();
        let page = site.page(Path::new(
            "/srv/hub/content/tic/cls6/m1-prezentari/lectia3-animatii.html",
        ));

        assert_eq!(page.info.grade.as_deref(), Some("cls6"));
        assert_eq!(page.info.grade_name.as_deref(), Some("Clasa a VI-a"));
        assert_eq!(page.info.module.as_deref(), Some("m1-prezentari"));
        assert_eq!(
            page.info.module_name.as_deref(),
            Some("Modulul 1: Prezentari")
        );
        assert_eq!(page.info.lesson_number, Some(3));
        assert!(!page.info.is_index);
        assert!(page.is_lesson());
        assert_eq!(
            page.info.lesson_id(),
            "cls6-m1-prezentari-lectia3-animatii"
        );
        assert_eq!(
            page.info.lesson_key().as_deref(),
            Some("cls6/m1-prezentari/lectia3")
        );
        assert_eq!(page.info.lesson_label().as_deref(), Some("Lectia3 Animatii"));
        assert_eq!(page.root_prefix, "../../../../");
        assert_eq!(page.asset("js/quiz.js"), "../../../../assets/js/quiz.js");
    }

    #[test]
    fn test_grade_index_page() {
        let site = site();
        let page = site.page(Path::new("/srv/hub/content/tic/cls5/index.html"));
        assert_eq!(page.info.grade.as_deref(), Some("cls5"));
        assert_eq!(page.info.module, None);
        assert!(page.info.is_index);
        assert_eq!(page.root_prefix, "../../../");
    }

    #[test]
    fn test_page_outside_content() {
        let site = site();
        let page = site.page(Path::new("/srv/hub/hub/index.html"));
        assert_eq!(page.info.grade, None);
        assert!(page.info.rel_parts.is_empty());
        assert_eq!(page.root_prefix, "../");

        let root_page = site.page(Path::new("/srv/hub/index.html"));
        assert_eq!(root_page.root_prefix, "");
        assert_eq!(root_page.asset("css/mobile.css"), "assets/css/mobile.css");
    }

    #[test]
    fn test_unknown_names_fall_back_to_ids() {
        let site = site();
        let page = site.page(Path::new("/srv/hub/content/tic/cls13/m9-robotica/lectia1.html"));
        assert_eq!(page.info.grade_name.as_deref(), Some("cls13"));
        assert_eq!(page.info.module_name.as_deref(), Some("m9-robotica"));
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("lectia1 intro"), "Lectia1 Intro");
        assert_eq!(title_case("abc1def"), "Abc1Def");
        assert_eq!(title_case("ÎNVĂȚARE online"), "Învățare Online");
    }
}
