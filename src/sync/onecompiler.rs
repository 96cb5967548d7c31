//! Page preparation for OneCompiler.
//!
//! OneCompiler has no public API, so pages are published by pasting them into
//! the site by hand. This module keeps the bookkeeping in
//! `sync/onecompiler_config.json` (page ids, sync status and the link map
//! from site paths to OneCompiler URLs), rewrites internal links of a page to
//! the published URLs and writes paste-ready copies to
//! `sync/onecompiler_ready/`.

use std::fs;
use std::path::{Component, Path, PathBuf};

use chrono::Local;
use indexmap::IndexMap;
use regex::Captures;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::core::config::SyncConfig;
use crate::core::errors::{LearningHubError, Result};
use crate::core::file_utils::{FileReader, FileWriter};
use crate::lazy_regex;

/// Config file name inside the sync directory
pub const CONFIG_FILE: &str = "onecompiler_config.json";

/// Output directory name inside the sync directory
pub const READY_DIR: &str = "onecompiler_ready";

/// Comment left in pages while no page has been published yet
pub const LINKS_TODO: &str = "<!-- TODO: Update links after creating all OneCompiler pages -->\n";

/// Page has never been published
pub const STATUS_PENDING_CREATE: &str = "pending_create";
/// Published copy is current
pub const STATUS_SYNCED: &str = "synced";
/// Local page changed since publishing
pub const STATUS_MODIFIED: &str = "modified";

/// Bookkeeping header
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigMeta {
    /// Date of the last save (`YYYY-MM-DD`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<String>,
    /// Fields this tool does not manage
    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

/// Publishing state of one page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageEntry {
    /// OneCompiler page id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub onecompiler_id: Option<String>,
    /// `pending_create`, `synced` or `modified`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Local timestamp of the last registration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_synced: Option<String>,
    /// Fields this tool does not manage
    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

impl PageEntry {
    /// Status tag shown in listings
    pub fn status_tag(&self) -> &'static str {
        match self.status.as_deref() {
            Some(STATUS_PENDING_CREATE) => "[NEW]",
            Some(STATUS_SYNCED) => "[OK]",
            Some(STATUS_MODIFIED) => "[MOD]",
            _ => "[?]",
        }
    }

    /// Whether the page still has to be pasted
    pub fn is_pending(&self) -> bool {
        matches!(
            self.status.as_deref(),
            Some(STATUS_PENDING_CREATE) | Some(STATUS_MODIFIED)
        )
    }
}

/// Site path to published URL
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinkMappings {
    /// Root-relative path to OneCompiler URL
    #[serde(default)]
    pub mappings: IndexMap<String, String>,
    /// Fields this tool does not manage
    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

/// Contents of `onecompiler_config.json`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OneCompilerConfig {
    /// Header
    #[serde(default)]
    pub meta: ConfigMeta,
    /// Root-relative page path to publishing state
    #[serde(default)]
    pub pages: IndexMap<String, PageEntry>,
    /// Link map
    #[serde(default)]
    pub link_mappings: LinkMappings,
}

impl OneCompilerConfig {
    /// Paths with status `pending_create` or `modified`, in config order
    pub fn pending(&self) -> Vec<String> {
        self.pages
            .iter()
            .filter(|(_, page)| page.is_pending())
            .map(|(path, _)| path.clone())
            .collect()
    }
}

/// Where a prepared page went and where to paste it
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedPage {
    /// Root-relative source path
    pub source: String,
    /// Paste-ready copy
    pub output: PathBuf,
    /// Existing page URL, or the new-page URL
    pub url: String,
    /// The page was published before
    pub existing: bool,
}

/// Resolve `href` against `source_dir` without touching the file system.
/// Returns `None` when the result would leave the site root.
pub fn resolve_site_path(source_dir: &str, href: &str) -> Option<String> {
    let mut parts: Vec<String> = Vec::new();
    let joined = Path::new(source_dir).join(href);
    for component in joined.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            Component::ParentDir => {
                parts.pop()?;
            }
            Component::CurDir => {}
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(parts.join("/"))
}

fn is_external(href: &str) -> bool {
    ["http://", "https://", "#", "javascript:", "mailto:"]
        .iter()
        .any(|prefix| href.starts_with(prefix))
}

/// Point internal links of a page at their published URLs. Without any
/// mapping the page only gets a reminder comment before `</head>`.
pub fn rewrite_links(html: &str, source: &str, mappings: &IndexMap<String, String>) -> String {
    if mappings.is_empty() {
        return html.replace("</head>", &format!("{LINKS_TODO}</head>"));
    }

    let source_dir = Path::new(source)
        .parent()
        .map(|p| p.to_string_lossy().replace('\\', "/"))
        .unwrap_or_default();

    lazy_regex!(r#"href=(?:"([^"']+)"|'([^"']+)')"#)
        .replace_all(html, |caps: &Captures| {
            let (quote, href) = match (caps.get(1), caps.get(2)) {
                (Some(m), _) => ('"', m.as_str()),
                (None, Some(m)) => ('\'', m.as_str()),
                (None, None) => return caps[0].to_string(),
            };
            if is_external(href) {
                return caps[0].to_string();
            }
            resolve_site_path(&source_dir, href)
                .and_then(|key| mappings.get(&key))
                .map(|url| format!("href={quote}{url}{quote}"))
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Make sure the page starts with a doctype
pub fn prepare(html: &str) -> String {
    if html.trim_start().to_lowercase().starts_with("<!doctype") {
        html.to_string()
    } else {
        format!("<!DOCTYPE html>\n{html}")
    }
}

/// File name of the paste-ready copy of `source`
pub fn ready_file_name(source: &str) -> String {
    source.replace(['/', '\\'], "_")
}

/// OneCompiler bookkeeping for one site
#[derive(Debug, Clone)]
pub struct OneCompilerSync {
    root: PathBuf,
    sync_dir: PathBuf,
    base_url: String,
}

impl OneCompilerSync {
    /// Sync helper for the site at `root`
    pub fn new(root: &Path, settings: &SyncConfig) -> Self {
        Self {
            root: root.to_path_buf(),
            sync_dir: root.join(&settings.dir),
            base_url: settings.onecompiler_base_url.trim_end_matches('/').to_string(),
        }
    }

    /// `sync/onecompiler_config.json`
    pub fn config_path(&self) -> PathBuf {
        self.sync_dir.join(CONFIG_FILE)
    }

    /// `sync/onecompiler_ready`
    pub fn ready_dir(&self) -> PathBuf {
        self.sync_dir.join(READY_DIR)
    }

    /// URL for creating a new page
    pub fn new_page_url(&self) -> &str {
        &self.base_url
    }

    /// URL of a published page
    pub fn page_url(&self, id: &str) -> String {
        format!("{}/{}", self.base_url, id)
    }

    /// Load the bookkeeping file; a missing file means an empty config
    pub fn load_config(&self) -> Result<OneCompilerConfig> {
        let path = self.config_path();
        if !path.exists() {
            debug!("No OneCompiler config at {}", path.display());
            return Ok(OneCompilerConfig::default());
        }
        FileReader::read_json(&path)
    }

    /// Stamp `meta.updated` and save
    pub fn save_config(&self, config: &mut OneCompilerConfig) -> Result<()> {
        config.meta.updated = Some(Local::now().format("%Y-%m-%d").to_string());
        FileWriter::write_json(&self.config_path(), config)
    }

    /// Existing file for a root-relative `source`; paths that resolve
    /// outside the site root are rejected
    fn site_file(&self, source: &str) -> Result<PathBuf> {
        let full = self.root.join(source);
        if !full.is_file() {
            return Err(LearningHubError::not_found(
                format!("File not found: {source}"),
                &full,
            ));
        }
        let root = fs::canonicalize(&self.root)
            .map_err(|e| LearningHubError::io(format!("Failed to resolve {}", self.root.display()), e))?;
        let resolved = fs::canonicalize(&full)
            .map_err(|e| LearningHubError::io(format!("Failed to resolve {}", full.display()), e))?;
        if !resolved.starts_with(&root) {
            return Err(LearningHubError::validation(format!(
                "{source} is outside the site root"
            )));
        }
        Ok(resolved)
    }

    /// Read a page, rewrite its links and add a doctype
    pub fn process(&self, source: &str, config: &OneCompilerConfig) -> Result<String> {
        let full = self.site_file(source)?;
        let html = FileReader::read_to_string(&full)?;
        let rewritten = rewrite_links(&html, source, &config.link_mappings.mappings);
        Ok(prepare(&rewritten))
    }

    /// Write the paste-ready copy of one page
    pub fn prepare_page(&self, source: &str, config: &OneCompilerConfig) -> Result<PreparedPage> {
        let content = self.process(source, config)?;
        let output = self.ready_dir().join(ready_file_name(source));
        FileWriter::write_atomic(&output, &content)?;
        info!("Saved to: {}", output.display());

        let id = config
            .pages
            .get(source)
            .and_then(|page| page.onecompiler_id.as_deref())
            .filter(|id| !id.is_empty());
        let (url, existing) = match id {
            Some(id) => (self.page_url(id), true),
            None => (self.new_page_url().to_string(), false),
        };
        Ok(PreparedPage {
            source: source.to_string(),
            output,
            url,
            existing,
        })
    }

    /// Prepare every pending page
    pub fn prepare_pending(&self, config: &OneCompilerConfig) -> Vec<(String, Result<PreparedPage>)> {
        config
            .pending()
            .into_iter()
            .map(|source| {
                let prepared = self.prepare_page(&source, config);
                (source, prepared)
            })
            .collect()
    }

    /// Record the id of a page after it was created on OneCompiler.
    /// Returns the page URL.
    pub fn register(&self, source: &str, id: &str) -> Result<String> {
        let id = id.trim();
        if id.is_empty() {
            return Err(LearningHubError::validation("OneCompiler id cannot be empty"));
        }
        if resolve_site_path("", source).is_none() {
            return Err(LearningHubError::validation(format!(
                "{source} is outside the site root"
            )));
        }
        let mut config = self.load_config()?;
        let url = self.page_url(id);

        let page = config.pages.entry(source.to_string()).or_default();
        page.onecompiler_id = Some(id.to_string());
        page.status = Some(STATUS_SYNCED.to_string());
        page.last_synced = Some(Local::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string());
        config
            .link_mappings
            .mappings
            .insert(source.to_string(), url.clone());

        self.save_config(&mut config)?;
        info!("Registered: {} -> {}", source, url);
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn mappings() -> IndexMap<String, String> {
        let mut map = IndexMap::new();
        map.insert("hub/index.html".to_string(), "https://onecompiler.com/html/hub1".to_string());
        map.insert(
            "content/tic/cls5/index.html".to_string(),
            "https://onecompiler.com/html/cls5".to_string(),
        );
        map
    }

    #[test]
    fn test_resolve_site_path() {
        assert_eq!(
            resolve_site_path("content/tic/cls5/m1", "../index.html").as_deref(),
            Some("content/tic/cls5/index.html")
        );
        assert_eq!(resolve_site_path("hub", "./a/b.html").as_deref(), Some("hub/a/b.html"));
        assert_eq!(resolve_site_path("", "../../etc"), None);
    }

    #[test]
    fn test_rewrite_links() {
        let html = r##"<a href="../../../../hub/index.html">Hub</a>
<a href='../index.html'>Clasa</a>
<a href="lectia2.html">Next</a>
<a href="https://example.com">Ext</a>
<a href="#top">Top</a>"##;
        let out = rewrite_links(html, "content/tic/cls5/m1/lectia1.html", &mappings());
        assert!(out.contains(r#"<a href="https://onecompiler.com/html/hub1">Hub</a>"#));
        assert!(out.contains("<a href='https://onecompiler.com/html/cls5'>Clasa</a>"));
        assert!(out.contains(r#"<a href="lectia2.html">Next</a>"#));
        assert!(out.contains(r#"<a href="https://example.com">Ext</a>"#));
        assert!(out.contains(r##"<a href="#top">Top</a>"##));
    }

    #[test]
    fn test_rewrite_without_mappings_adds_reminder() {
        let out = rewrite_links("<head></head>", "hub/index.html", &IndexMap::new());
        assert_eq!(out, format!("<head>{LINKS_TODO}</head>"));
    }

    #[test]
    fn test_prepare_adds_doctype_once() {
        assert_eq!(prepare("<html></html>"), "<!DOCTYPE html>\n<html></html>");
        assert_eq!(prepare("  <!doctype html><html>"), "  <!doctype html><html>");
    }

    #[test]
    fn test_prepare_register_and_pending() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("hub")).unwrap();
        fs::write(tmp.path().join("hub/index.html"), "<html><head></head></html>").unwrap();
        fs::create_dir_all(tmp.path().join("sync")).unwrap();
        fs::write(
            tmp.path().join("sync").join(CONFIG_FILE),
            r#"{"meta": {"owner": "prof"}, "pages": {
                "hub/index.html": {"status": "pending_create", "notes": "start"},
                "hub/old.html": {"status": "synced", "onecompiler_id": "x"}
            }, "link_mappings": {"mappings": {}}}"#,
        )
        .unwrap();

        let sync = OneCompilerSync::new(tmp.path(), &SyncConfig::default());
        let config = sync.load_config().unwrap();
        assert_eq!(config.pending(), vec!["hub/index.html"]);
        assert_eq!(config.pages["hub/old.html"].status_tag(), "[OK]");

        let prepared = sync.prepare_page("hub/index.html", &config).unwrap();
        assert!(!prepared.existing);
        assert_eq!(prepared.url, "https://onecompiler.com/html");
        assert_eq!(prepared.output, tmp.path().join("sync/onecompiler_ready/hub_index.html"));
        let content = fs::read_to_string(&prepared.output).unwrap();
        assert!(content.starts_with("<!DOCTYPE html>\n<html><head><!-- TODO"));

        let url = sync.register("hub/index.html", "abc123").unwrap();
        assert_eq!(url, "https://onecompiler.com/html/abc123");

        let saved = sync.load_config().unwrap();
        let page = &saved.pages["hub/index.html"];
        assert_eq!(page.onecompiler_id.as_deref(), Some("abc123"));
        assert_eq!(page.status_tag(), "[OK]");
        assert!(page.last_synced.is_some());
        assert_eq!(page.extra["notes"], "start");
        assert_eq!(saved.meta.extra["owner"], "prof");
        assert!(saved.meta.updated.is_some());
        assert_eq!(saved.link_mappings.mappings["hub/index.html"], url);
        assert!(saved.pending().is_empty());

        let again = sync.prepare_page("hub/index.html", &saved).unwrap();
        assert!(again.existing);
        assert_eq!(again.url, url);

        assert!(sync.prepare_page("hub/missing.html", &saved).is_err());
    }

    #[test]
    fn test_pages_outside_the_root_are_rejected() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("site");
        fs::create_dir_all(root.join("hub")).unwrap();
        fs::write(root.join("hub/index.html"), "<html></html>").unwrap();
        fs::write(tmp.path().join("private.html"), "<html>secret</html>").unwrap();

        let sync = OneCompilerSync::new(&root, &SyncConfig::default());
        let config = OneCompilerConfig::default();
        assert!(sync.process("hub/../hub/index.html", &config).is_ok());

        let escaped = sync.prepare_page("../private.html", &config).unwrap_err();
        assert!(matches!(escaped, LearningHubError::Validation { .. }), "{escaped}");
        let absolute = tmp.path().join("private.html").display().to_string();
        assert!(sync.process(&absolute, &config).is_err());
        assert!(!sync.ready_dir().exists());

        assert!(sync.register("../private.html", "abc").is_err());
        assert!(!sync.config_path().exists());
    }
}
