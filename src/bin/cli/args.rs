//! CLI Argument Structures
//!
//! Command, subcommand and per-command argument definitions for the
//! `learninghub` binary.

use clap::{Args, Parser, Subcommand};
use learninghub::TransformKind;
use std::path::PathBuf;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Maintenance tooling for the LearningHub static site
#[derive(Parser)]
#[command(name = "learninghub")]
#[command(version = VERSION)]
#[command(about = "📚 LearningHub - maintenance tools for the lesson site")]
#[command(long_about = "
Batch edits, audits, exports, submission grading and sync helpers for the
LearningHub lesson site.

Common Usage:

  # Preview a transform without writing anything
  learninghub transform breadcrumbs --dry-run

  # Check every lesson for missing scripts and stale quiz totals
  learninghub audit

  # Export quiz and practice exercises to JSON
  learninghub extract exercises

  # Verify a student submission
  learninghub submissions verify submission.json

  # Grade a folder of worksheets
  learninghub submissions grade --folder submisii/cls5 --grade cls5
")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging for debugging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file (defaults to .learninghub.yml when present)
    #[arg(long, global = true, env = "LEARNINGHUB_CONFIG")]
    pub config: Option<PathBuf>,

    /// Site root, overriding site.root from the configuration
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print default configuration in YAML format
    #[command(name = "print-default-config")]
    PrintDefaultConfig,

    /// Initialize a configuration file with defaults
    #[command(name = "init-config")]
    InitConfig(InitConfigArgs),

    /// Validate a LearningHub configuration file
    #[command(name = "validate-config")]
    ValidateConfig(ValidateConfigArgs),

    /// Apply a batch page transform
    Transform(TransformArgs),

    /// Report lessons with missing scripts or stale quiz totals
    Audit(AuditArgs),

    /// Convert lessons into atomic lessons and repair converted pages
    #[command(subcommand)]
    Atomic(AtomicCommand),

    /// Export exercises and lesson analyses to JSON
    #[command(subcommand)]
    Extract(ExtractCommand),

    /// Verify, evaluate and grade student submissions
    #[command(subcommand)]
    Submissions(SubmissionsCommand),

    /// Watch the site for changes
    #[command(subcommand)]
    Sync(SyncCommand),

    /// Prepare pages for OneCompiler
    #[command(subcommand)]
    Onecompiler(OneCompilerCommand),
}

#[derive(Args)]
pub struct InitConfigArgs {
    /// Output configuration file name
    #[arg(short, long, default_value = ".learninghub.yml")]
    pub output: PathBuf,

    /// Overwrite existing configuration file
    #[arg(short, long)]
    pub force: bool,
}

#[derive(Args)]
pub struct ValidateConfigArgs {
    /// Configuration file to validate (defaults to --config or .learninghub.yml)
    #[arg(value_name = "FILE")]
    pub file: Option<PathBuf>,
}

#[derive(Args)]
pub struct TransformArgs {
    /// Transform to apply
    #[arg(value_name = "KIND", required_unless_present = "list")]
    pub kind: Option<TransformKind>,

    /// List available transforms
    #[arg(long)]
    pub list: bool,

    /// Only pages under this folder of the content directory (cls5/m1-sisteme)
    #[arg(long, conflicts_with = "file")]
    pub folder: Option<String>,

    /// Only this page
    #[arg(long)]
    pub file: Option<PathBuf>,

    /// Report what would change without writing files
    #[arg(long)]
    pub dry_run: bool,

    /// Print the batch summary as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct AuditArgs {
    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum AtomicCommand {
    /// Convert classic lessons into the atomic format
    Convert(ConvertArgs),

    /// Count defects in converted lessons
    Scan(ScanArgs),

    /// Fix defects in converted lessons
    Fix(FixArgs),
}

#[derive(Args)]
pub struct ConvertArgs {
    /// Single lesson file
    #[arg(long, conflicts_with_all = ["folder", "grade"])]
    pub file: Option<PathBuf>,

    /// Module folder relative to the content directory (cls5/m1-sisteme)
    #[arg(long, conflicts_with = "grade")]
    pub folder: Option<String>,

    /// Every lesson of a grade (cls5)
    #[arg(long)]
    pub grade: Option<String>,

    /// Write `<stem><suffix>.html` next to the input instead of overwriting it
    #[arg(long, default_value = "")]
    pub suffix: String,

    /// Parse only
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Args)]
pub struct ScanArgs {
    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct FixArgs {
    /// Also remove empty-quiz atoms with placeholder content
    #[arg(long)]
    pub prune_empty: bool,

    /// Report what would change without writing files
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Subcommand)]
pub enum ExtractCommand {
    /// Export quiz and practice exercises
    Exercises(OutputArgs),

    /// Export the per-lesson content analysis
    Analysis(OutputArgs),
}

#[derive(Args)]
pub struct OutputArgs {
    /// Output JSON file (defaults to a file in the site root)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum SubmissionsCommand {
    /// Check the checksum of a submission file
    Verify(VerifyArgs),

    /// Analyse a submission, or every submission in a folder
    Evaluate(EvaluateArgs),

    /// Grade worksheet submissions
    Grade(GradeArgs),
}

#[derive(Args)]
pub struct VerifyArgs {
    /// Submission file
    pub file: PathBuf,
}

#[derive(Args)]
pub struct EvaluateArgs {
    /// Submission file, or a folder with --batch
    pub path: PathBuf,

    /// Process every *.json in the folder
    #[arg(long)]
    pub batch: bool,

    /// Evaluation output file (single-file mode)
    #[arg(short, long, conflicts_with = "batch")]
    pub output: Option<PathBuf>,
}

#[derive(Args)]
pub struct GradeArgs {
    /// Submission file
    #[arg(long, conflicts_with = "folder", required_unless_present = "folder")]
    pub file: Option<PathBuf>,

    /// Folder of submissions (requires --grade)
    #[arg(long, requires = "grade")]
    pub folder: Option<PathBuf>,

    /// Grade id (cls5, cls6, ...); detected from the lesson when omitted
    #[arg(long)]
    pub grade: Option<String>,

    /// Also write and print a text report
    #[arg(long)]
    pub report: bool,

    /// Results directory
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum SyncCommand {
    /// Poll the site for changes until stopped
    Watch(WatchArgs),

    /// Show watcher state and pending changes
    Status,

    /// Rehash every tracked file
    Reindex,

    /// Delete the pending changes list
    Clear,

    /// Stop a running watcher
    Stop,
}

#[derive(Args)]
pub struct WatchArgs {
    /// Check once and exit
    #[arg(long)]
    pub once: bool,
}

#[derive(Subcommand)]
pub enum OneCompilerCommand {
    /// Write paste-ready copies of pages
    Sync(OneCompilerSyncArgs),

    /// Record the OneCompiler id of a published page
    Register(RegisterArgs),

    /// List pages and their status
    List,
}

#[derive(Args)]
pub struct OneCompilerSyncArgs {
    /// Page path relative to the site root
    #[arg(long, conflicts_with = "all", required_unless_present = "all")]
    pub file: Option<String>,

    /// Every page marked pending_create or modified
    #[arg(long)]
    pub all: bool,
}

#[derive(Args)]
pub struct RegisterArgs {
    /// Page path relative to the site root
    pub file: String,

    /// OneCompiler page id
    pub id: String,
}
