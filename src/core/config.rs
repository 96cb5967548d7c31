//! Configuration types and management for the LearningHub tooling.
//!
//! The configuration describes where the site lives, how grades and modules
//! are displayed, where submissions are graded from and written to, and how
//! the sync tooling watches the tree. Every section has sensible defaults so
//! the tools run against a stock checkout without any YAML file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::{LearningHubError, Result};

/// Default file name looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = ".learninghub.yml";

/// Main configuration for the LearningHub tools
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningHubConfig {
    /// Site layout
    #[serde(default)]
    pub site: SiteConfig,

    /// Display names for grade directories (`cls5` -> `Clasa a V-a`)
    #[serde(default = "default_grade_names")]
    pub grades: BTreeMap<String, String>,

    /// Display names for module directories (`m3-word` -> `Modulul 3: Word`)
    #[serde(default = "default_module_names")]
    pub modules: BTreeMap<String, String>,

    /// Submission grading settings
    #[serde(default)]
    pub submissions: SubmissionsConfig,

    /// Change watching and OneCompiler sync settings
    #[serde(default)]
    pub sync: SyncConfig,
}

impl Default for LearningHubConfig {
    fn default() -> Self {
        Self {
            site: SiteConfig::default(),
            grades: default_grade_names(),
            modules: default_module_names(),
            submissions: SubmissionsConfig::default(),
            sync: SyncConfig::default(),
        }
    }
}

impl LearningHubConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| {
            LearningHubError::io(format!("Failed to read config file: {}", path.display()), e)
        })?;

        serde_yaml::from_str(&content).map_err(Into::into)
    }

    /// Save configuration to a YAML file
    pub fn to_yaml_file(&self, path: impl Into<PathBuf>) -> Result<()> {
        let path = path.into();
        let content = serde_yaml::to_string(self)?;
        std::fs::write(&path, content).map_err(|e| {
            LearningHubError::io(
                format!("Failed to write config file: {}", path.display()),
                e,
            )
        })
    }

    /// Resolve the configuration to use: an explicit path, the default file
    /// in `cwd` when present, or the built-in defaults.
    pub fn discover(explicit: Option<&Path>, cwd: &Path) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_yaml_file(path);
        }
        let candidate = cwd.join(DEFAULT_CONFIG_FILE);
        if candidate.is_file() {
            tracing::debug!("Using configuration from {}", candidate.display());
            return Self::from_yaml_file(candidate);
        }
        Ok(Self::default())
    }

    /// Display name for a grade id, falling back to the id itself
    pub fn grade_name(&self, grade: &str) -> String {
        self.grades
            .get(grade)
            .cloned()
            .unwrap_or_else(|| grade.to_string())
    }

    /// Display name for a module id, falling back to the id itself
    pub fn module_name(&self, module: &str) -> String {
        self.modules
            .get(module)
            .cloned()
            .unwrap_or_else(|| module.to_string())
    }

    /// Validate configuration settings
    pub fn validate(&self) -> Result<()> {
        self.site.validate()?;
        self.submissions.validate()?;
        self.sync.validate()?;

        for grade in self.grades.keys() {
            if !grade.starts_with("cls") {
                return Err(LearningHubError::config_field(
                    format!("grade id '{grade}' must start with 'cls'"),
                    format!("grades.{grade}"),
                ));
            }
        }
        for module in self.modules.keys() {
            if !module.starts_with('m') {
                return Err(LearningHubError::config_field(
                    format!("module id '{module}' must start with 'm'"),
                    format!("modules.{module}"),
                ));
            }
        }

        Ok(())
    }
}

/// Where the site lives on disk
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Site root directory
    pub root: PathBuf,

    /// Lesson content directory, relative to the root
    pub content_dir: PathBuf,

    /// Hub pages directory, relative to the root
    pub hub_dir: PathBuf,

    /// Shared assets directory, relative to the root
    pub assets_dir: String,

    /// Directory names never touched by site-wide transforms
    pub skip_dirs: Vec<String>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            content_dir: PathBuf::from("content/tic"),
            hub_dir: PathBuf::from("hub"),
            assets_dir: "assets".to_string(),
            skip_dirs: vec![
                ".git".to_string(),
                "node_modules".to_string(),
                "sync".to_string(),
                "tools".to_string(),
                ".pow-migration-backup".to_string(),
            ],
        }
    }
}

impl SiteConfig {
    /// Absolute-or-relative path of the content directory
    pub fn content_path(&self) -> PathBuf {
        self.root.join(&self.content_dir)
    }

    /// Path of the hub directory
    pub fn hub_path(&self) -> PathBuf {
        self.root.join(&self.hub_dir)
    }

    /// Validate site configuration
    pub fn validate(&self) -> Result<()> {
        if self.content_dir.as_os_str().is_empty() {
            return Err(LearningHubError::config_field(
                "content_dir cannot be empty",
                "site.content_dir",
            ));
        }
        if self.content_dir.is_absolute() {
            return Err(LearningHubError::config_field(
                "content_dir must be relative to the site root",
                "site.content_dir",
            ));
        }
        if self.assets_dir.trim().is_empty() || self.assets_dir.contains('\\') {
            return Err(LearningHubError::config_field(
                "assets_dir must be a non-empty forward-slash path",
                "site.assets_dir",
            ));
        }
        Ok(())
    }
}

/// One step of the percentage → grade scale
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GradeThreshold {
    /// Minimum percentage (inclusive)
    pub min_percentage: f64,
    /// Grade awarded at or above the percentage
    pub nota: u8,
}

/// Submission grading settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SubmissionsConfig {
    /// Worksheet definitions, relative to the site root
    pub worksheets_dir: PathBuf,

    /// Where grading results are written, relative to the site root
    pub results_dir: PathBuf,

    /// Percentage thresholds, highest first
    pub grade_scale: Vec<GradeThreshold>,

    /// Grade given below the lowest threshold
    pub minimum_nota: u8,

    /// Minimum characters for written answers lacking `minChars`
    pub default_min_chars: usize,
}

impl Default for SubmissionsConfig {
    fn default() -> Self {
        let scale = [(90.0, 10), (80.0, 9), (65.0, 8), (50.0, 7), (40.0, 6), (30.0, 5)];
        Self {
            worksheets_dir: PathBuf::from("data/worksheets"),
            results_dir: PathBuf::from("results"),
            grade_scale: scale
                .iter()
                .map(|&(min_percentage, nota)| GradeThreshold {
                    min_percentage,
                    nota,
                })
                .collect(),
            minimum_nota: 4,
            default_min_chars: 50,
        }
    }
}

impl SubmissionsConfig {
    /// Convert a percentage to a grade using the scale
    pub fn nota_for(&self, percentage: f64) -> u8 {
        self.grade_scale
            .iter()
            .find(|t| percentage >= t.min_percentage)
            .map(|t| t.nota)
            .unwrap_or(self.minimum_nota)
    }

    /// Validate submission settings
    pub fn validate(&self) -> Result<()> {
        if self.grade_scale.is_empty() {
            return Err(LearningHubError::config_field(
                "grade_scale must contain at least one threshold",
                "submissions.grade_scale",
            ));
        }
        for pair in self.grade_scale.windows(2) {
            if pair[1].min_percentage >= pair[0].min_percentage {
                return Err(LearningHubError::config_field(
                    "grade_scale thresholds must be strictly decreasing",
                    "submissions.grade_scale",
                ));
            }
        }
        for threshold in &self.grade_scale {
            if !(0.0..=100.0).contains(&threshold.min_percentage) {
                return Err(LearningHubError::config_field(
                    format!(
                        "threshold {} is outside 0..=100",
                        threshold.min_percentage
                    ),
                    "submissions.grade_scale",
                ));
            }
        }
        if self.default_min_chars == 0 {
            return Err(LearningHubError::config_field(
                "default_min_chars must be greater than 0",
                "submissions.default_min_chars",
            ));
        }
        Ok(())
    }
}

/// Change watching and OneCompiler sync settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Sync working directory, relative to the site root
    pub dir: PathBuf,

    /// File-name patterns tracked by the watcher
    pub watch_patterns: Vec<String>,

    /// Directory names the watcher ignores anywhere in a path
    pub ignore_dirs: Vec<String>,

    /// Seconds between watcher checks
    pub interval_secs: u64,

    /// Base URL for OneCompiler HTML pages
    pub onecompiler_base_url: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("sync"),
            watch_patterns: ["*.html", "*.css", "*.js", "*.json"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            ignore_dirs: ["sync", ".git", "__pycache__", "node_modules"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            interval_secs: 30,
            onecompiler_base_url: "https://onecompiler.com/html".to_string(),
        }
    }
}

impl SyncConfig {
    /// Validate sync settings
    pub fn validate(&self) -> Result<()> {
        if self.interval_secs == 0 {
            return Err(LearningHubError::config_field(
                "interval_secs must be greater than 0",
                "sync.interval_secs",
            ));
        }
        if self.watch_patterns.is_empty() {
            return Err(LearningHubError::config_field(
                "at least one watch pattern is required",
                "sync.watch_patterns",
            ));
        }
        for pattern in &self.watch_patterns {
            glob::Pattern::new(pattern).map_err(|e| {
                LearningHubError::config_field(
                    format!("invalid watch pattern '{pattern}': {e}"),
                    "sync.watch_patterns",
                )
            })?;
        }
        if !self.onecompiler_base_url.starts_with("http") {
            return Err(LearningHubError::config_field(
                "onecompiler_base_url must be an http(s) URL",
                "sync.onecompiler_base_url",
            ));
        }
        Ok(())
    }
}

fn default_grade_names() -> BTreeMap<String, String> {
    [
        ("cls5", "Clasa a V-a"),
        ("cls6", "Clasa a VI-a"),
        ("cls7", "Clasa a VII-a"),
        ("cls8", "Clasa a VIII-a"),
        ("cls9", "Clasa a IX-a"),
        ("cls10", "Clasa a X-a"),
        ("cls11", "Clasa a XI-a"),
        ("cls12", "Clasa a XII-a"),
    ]
    .iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

fn default_module_names() -> BTreeMap<String, String> {
    [
        ("m1-sisteme", "Modulul 1: Sisteme"),
        ("m1-prezentari", "Modulul 1: Prezentari"),
        ("m1-baze-date", "Modulul 1: Baze de date"),
        ("m1-subprograme", "Modulul 1: Subprograme"),
        ("m2-birotice", "Modulul 2: Birotice"),
        ("m2-scratch", "Modulul 2: Scratch"),
        ("m2-multimedia", "Modulul 2: Multimedia"),
        ("m2-structuri-date", "Modulul 2: Structuri date"),
        ("m3-word", "Modulul 3: Word"),
        ("m3-scratch-control", "Modulul 3: Structuri control"),
        ("m3-cpp-algorithms", "Modulul 3: Algoritmi C++"),
        ("m3-databases", "Modulul 3: Baze de date"),
        ("m4-siguranta", "Modulul 4: Siguranta"),
        ("m4-comunicare", "Modulul 4: Comunicare"),
        ("m4-web", "Modulul 4: Web"),
        ("m5-proiect", "Modulul 5: Proiect"),
        ("m5-recapitulare", "Modulul 5: Recapitulare"),
    ]
    .iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_validates() {
        let config = LearningHubConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.grade_name("cls7"), "Clasa a VII-a");
        assert_eq!(config.module_name("m9-unknown"), "m9-unknown");
    }

    #[test]
    fn test_nota_scale_boundaries() {
        let submissions = SubmissionsConfig::default();
        assert_eq!(submissions.nota_for(100.0), 10);
        assert_eq!(submissions.nota_for(90.0), 10);
        assert_eq!(submissions.nota_for(89.9), 9);
        assert_eq!(submissions.nota_for(65.0), 8);
        assert_eq!(submissions.nota_for(50.0), 7);
        assert_eq!(submissions.nota_for(40.0), 6);
        assert_eq!(submissions.nota_for(30.0), 5);
        assert_eq!(submissions.nota_for(29.99), 4);
        assert_eq!(submissions.nota_for(0.0), 4);
    }

    #[test]
    fn test_yaml_roundtrip_through_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yml");

        let mut config = LearningHubConfig::default();
        config.sync.interval_secs = 5;
        config.to_yaml_file(&path).unwrap();

        let loaded = LearningHubConfig::from_yaml_file(&path).unwrap();
        assert_eq!(loaded.sync.interval_secs, 5);
        assert_eq!(loaded.site.content_dir, PathBuf::from("content/tic"));
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = "site:\n  root: /srv/learninghub\nsync:\n  interval_secs: 10\n";
        let config: LearningHubConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.site.root, PathBuf::from("/srv/learninghub"));
        assert_eq!(config.site.assets_dir, "assets");
        assert_eq!(config.sync.interval_secs, 10);
        assert_eq!(config.sync.watch_patterns.len(), 4);
        assert_eq!(config.grades.len(), 8);
    }

    #[test]
    fn test_validation_failures() {
        let mut config = LearningHubConfig::default();
        config.sync.interval_secs = 0;
        assert!(config.validate().is_err());

        let mut config = LearningHubConfig::default();
        config.submissions.grade_scale.reverse();
        assert!(config.validate().is_err());

        let mut config = LearningHubConfig::default();
        config
            .grades
            .insert("grade5".to_string(), "Fifth".to_string());
        let err = config.validate().unwrap_err();
        assert!(matches!(err, LearningHubError::Config { field: Some(_), .. }));

        let mut config = LearningHubConfig::default();
        config.sync.watch_patterns = vec!["[".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_discover_prefers_local_file() {
        let dir = TempDir::new().unwrap();
        let defaults = LearningHubConfig::discover(None, dir.path()).unwrap();
        assert_eq!(defaults.sync.interval_secs, 30);

        std::fs::write(
            dir.path().join(DEFAULT_CONFIG_FILE),
            "sync:\n  interval_secs: 7\n",
        )
        .unwrap();
        let local = LearningHubConfig::discover(None, dir.path()).unwrap();
        assert_eq!(local.sync.interval_secs, 7);
    }
}
