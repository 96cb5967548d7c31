//! Command Execution Logic
//!
//! One function per subcommand. Each loads what it needs from the library,
//! runs it and hands the result to the renderers in `output`.

use crate::cli::args::*;
use crate::cli::output::*;
use indicatif::{ProgressBar, ProgressStyle};
use learninghub::atomic::convert::{AtomicConverter, ConvertOptions};
use learninghub::atomic::repair::{scan_site, AtomicRepair, RepairOptions};
use learninghub::audit::LessonAuditor;
use learninghub::core::config::DEFAULT_CONFIG_FILE;
use learninghub::extract::analysis::LessonAnalyzer;
use learninghub::extract::exercises::ExerciseExtractor;
use learninghub::submissions::checksum::verify_file;
use learninghub::submissions::evaluate::SubmissionEvaluator;
use learninghub::submissions::grading::WorksheetGrader;
use learninghub::submissions::report::render_report;
use learninghub::sync::onecompiler::OneCompilerSync;
use learninghub::sync::watcher::{WatchEvent, Watcher};
use learninghub::{BatchRunner, LearningHubConfig, PageTransform, Site};
use owo_colors::OwoColorize;
use std::path::{Path, PathBuf};
use tabled::{settings::Style as TableStyle, Table, Tabled};
use tracing::{info, warn};

/// Load configuration: `--config`, else `.learninghub.yml` in the working
/// directory, else defaults; `--root` replaces `site.root`
pub async fn load_configuration(
    config_path: Option<&Path>,
    root: Option<&Path>,
) -> anyhow::Result<LearningHubConfig> {
    let cwd = std::env::current_dir()?;
    let mut config = LearningHubConfig::discover(config_path, &cwd)?;
    if let Some(root) = root {
        config.site.root = root.to_path_buf();
    }
    config.validate()?;
    Ok(config)
}

/// Print default configuration in YAML format
pub async fn print_default_config() -> anyhow::Result<()> {
    println!("{}", "# Default LearningHub configuration".dimmed());
    println!("{}", "# Save this to .learninghub.yml and customize as needed".dimmed());
    println!();

    let yaml_output = serde_yaml::to_string(&LearningHubConfig::default())?;
    println!("{}", yaml_output);
    Ok(())
}

/// Initialize a configuration file with defaults
pub async fn init_config(args: InitConfigArgs) -> anyhow::Result<()> {
    if args.output.exists() && !args.force {
        eprintln!("{} {}", "❌ Configuration file already exists:".red(), args.output.display());
        eprintln!("   Use --force to overwrite or choose a different name with --output");
        std::process::exit(1);
    }

    let yaml_content = serde_yaml::to_string(&LearningHubConfig::default())?;
    tokio::fs::write(&args.output, yaml_content).await?;

    println!(
        "{} {}",
        "✅ Configuration saved to:".bright_green().bold(),
        args.output.display().to_string().cyan()
    );
    println!();
    println!("{}", "🔧 Key settings you can customize:".bright_blue().bold());

    #[derive(Tabled)]
    struct CustomizationRow {
        setting: &'static str,
        description: &'static str,
    }

    let rows = vec![
        CustomizationRow {
            setting: "site.root",
            description: "Site checkout the tools operate on",
        },
        CustomizationRow {
            setting: "site.content_dir",
            description: "Lesson tree, laid out as <grade>/<module>/",
        },
        CustomizationRow {
            setting: "submissions.grade_scale",
            description: "Percentage thresholds for each grade",
        },
        CustomizationRow {
            setting: "sync.interval_secs",
            description: "Seconds between watcher checks",
        },
    ];
    let mut table = Table::new(rows);
    table.with(TableStyle::rounded());
    println!("{}", table);
    Ok(())
}

/// Validate a configuration file
pub async fn validate_config(args: ValidateConfigArgs, global: Option<&Path>) -> anyhow::Result<()> {
    let path = args
        .file
        .or_else(|| global.map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    println!(
        "{} {}",
        "🔍 Validating configuration:".bright_blue().bold(),
        path.display().to_string().cyan()
    );
    println!();

    let config = match LearningHubConfig::from_yaml_file(&path).and_then(|c| c.validate().map(|_| c)) {
        Ok(config) => {
            println!("{}", "✅ Configuration file is valid!".bright_green().bold());
            println!();
            config
        }
        Err(e) => {
            eprintln!("{} {}", "❌ Configuration validation failed:".red(), e);
            println!();
            println!("{}", "💡 Tip: Use 'learninghub print-default-config' to see valid format".dimmed());
            std::process::exit(1);
        }
    };

    #[derive(Tabled)]
    struct ConfigRow {
        setting: &'static str,
        value: String,
    }

    let rows = vec![
        ConfigRow {
            setting: "Site root",
            value: config.site.root.display().to_string(),
        },
        ConfigRow {
            setting: "Content",
            value: config.site.content_path().display().to_string(),
        },
        ConfigRow {
            setting: "Grades",
            value: config.grades.len().to_string(),
        },
        ConfigRow {
            setting: "Modules",
            value: config.modules.len().to_string(),
        },
        ConfigRow {
            setting: "Watch interval",
            value: format!("{}s", config.sync.interval_secs),
        },
    ];
    let mut table = Table::new(rows);
    table.with(TableStyle::rounded());
    println!("{}", table);
    Ok(())
}

fn file_progress(len: usize) -> anyhow::Result<ProgressBar> {
    let pb = ProgressBar::new(len as u64);
    pb.set_style(ProgressStyle::with_template(
        "📝 {msg} [{bar:40.bright_blue/blue}] {pos}/{len}",
    )?);
    Ok(pb)
}

fn run_batch(
    runner: BatchRunner<'_>,
    transform: &dyn PageTransform,
    json: bool,
) -> anyhow::Result<learninghub::BatchSummary> {
    if json {
        return Ok(runner.run(transform)?);
    }

    let total = runner.files_for(transform.scope())?.len();
    let pb = file_progress(total)?;
    pb.set_message(transform.name());
    let summary = runner.run_with_progress(transform, |_| pb.inc(1))?;
    pb.finish_and_clear();
    Ok(summary)
}

/// Apply a batch page transform
pub async fn transform_command(args: TransformArgs, config: &LearningHubConfig) -> anyhow::Result<()> {
    if args.list {
        display_transform_list();
        return Ok(());
    }
    let Some(kind) = args.kind else {
        anyhow::bail!("a transform name is required");
    };

    if !args.json {
        print_header();
    }
    let site = Site::from_config(config);
    let mut runner = BatchRunner::new(&site).dry_run(args.dry_run);
    if let Some(folder) = &args.folder {
        runner = runner.within(site.content_dir.join(folder));
    } else if let Some(file) = &args.file {
        runner = runner.within(file);
    }
    let transform = kind.build();
    let summary = run_batch(runner, transform.as_ref(), args.json)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        display_batch_summary(&summary);
    }
    Ok(())
}

/// Report lessons with missing scripts or stale quiz totals
pub async fn audit_command(args: AuditArgs, config: &LearningHubConfig) -> anyhow::Result<()> {
    let site = Site::from_config(config);
    let report = LessonAuditor::new(&site).audit_all()?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        display_audit_report(&report);
    }
    Ok(())
}

/// Atomic lesson conversion and repair
pub async fn atomic_command(command: AtomicCommand, config: &LearningHubConfig) -> anyhow::Result<()> {
    let site = Site::from_config(config);
    match command {
        AtomicCommand::Convert(args) => convert_lessons(&site, args),
        AtomicCommand::Scan(args) => {
            let report = scan_site(&site)?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("Scanning for issues...");
                println!("{}", "=".repeat(60));
                display_scan_report(&report);
            }
            Ok(())
        }
        AtomicCommand::Fix(args) => {
            let repair = AtomicRepair {
                options: RepairOptions {
                    prune_empty: args.prune_empty,
                },
            };
            let summary = run_batch(BatchRunner::new(&site).dry_run(args.dry_run), &repair, false)?;
            display_batch_summary(&summary);
            Ok(())
        }
    }
}

fn convert_lessons(site: &Site, args: ConvertArgs) -> anyhow::Result<()> {
    let converter = AtomicConverter::new(
        site,
        ConvertOptions {
            suffix: args.suffix,
            dry_run: args.dry_run,
        },
    );

    if let Some(file) = args.file {
        let report = converter.convert(&file)?;
        print_conversion(&report, args.dry_run);
        return Ok(());
    }

    let files = match (args.folder, args.grade) {
        (Some(folder), _) => converter.lessons_in_folder(&folder)?,
        (None, Some(grade)) => converter.lessons_in_grade(&grade)?,
        (None, None) => anyhow::bail!("specify --file, --folder or --grade"),
    };
    info!("Converting {} lessons", files.len());

    let mut converted = 0;
    let mut failed = 0;
    for file in &files {
        match converter.convert(file) {
            Ok(report) => {
                converted += 1;
                print_conversion(&report, args.dry_run);
            }
            Err(e) => {
                failed += 1;
                warn!("{}: {}", file.display(), e);
                eprintln!("  {} {}: {}", "✗".red(), file.display(), e);
            }
        }
    }
    println!();
    println!("Converted: {}/{}", converted.to_string().green().bold(), files.len());
    if failed > 0 {
        println!("Errors: {}", failed.to_string().red().bold());
    }
    Ok(())
}

fn print_conversion(report: &learninghub::atomic::convert::ConversionReport, dry_run: bool) {
    if dry_run {
        println!(
            "  {} {}: {} sections, {} questions",
            "🔍".cyan(),
            report.input.display(),
            report.sections,
            report.questions
        );
    } else if let Some(output) = &report.output {
        println!(
            "  {} {}: {} atoms, {} questions",
            "✓".green(),
            output.display(),
            report.atoms,
            report.questions
        );
    }
}

/// JSON exports
pub async fn extract_command(command: ExtractCommand, config: &LearningHubConfig) -> anyhow::Result<()> {
    let site = Site::from_config(config);
    match command {
        ExtractCommand::Exercises(args) => {
            let extractor = ExerciseExtractor::new(&site);
            let output = args.output.unwrap_or_else(|| extractor.default_output());
            let export = extractor.write(&output)?;
            let meta = &export.meta;
            println!("{} {}", "✅ Exercises saved to:".bright_green().bold(), output.display());
            println!("   Grades: {}", meta.total_clase);
            println!("   Quiz questions: {}", meta.total_exercitii_quiz);
            println!("   Practice exercises: {}", meta.total_practica_avansata);
            println!("   Total: {}", meta.total_exercitii.to_string().bold());
        }
        ExtractCommand::Analysis(args) => {
            let analyzer = LessonAnalyzer::new(&site);
            let output = args.output.unwrap_or_else(|| analyzer.default_output());
            let report = analyzer.write(&output)?;
            let summary = &report.summary;
            println!("{} {}", "✅ Analysis saved to:".bright_green().bold(), output.display());
            println!("   Lessons: {}", summary.total_lessons);
            for (format, count) in &summary.lessons_by_format {
                println!("     {format}: {count}");
            }
            println!("   Concepts: {}", summary.total_concepts);
            println!("   Questions: {}", summary.total_questions);
            println!("   Practice: {}", summary.total_practice);
            println!("   Potential issues: {}", summary.total_potential_issues.to_string().yellow());
            for (kind, count) in &summary.issues_by_type {
                println!("     {kind}: {count}");
            }
        }
    }
    Ok(())
}

/// Submission verification, evaluation and grading
pub async fn submissions_command(command: SubmissionsCommand, config: &LearningHubConfig) -> anyhow::Result<()> {
    match command {
        SubmissionsCommand::Verify(args) => {
            let verified = verify_file(&args.file)?;
            display_verification(&verified);
            std::process::exit(verified.status.exit_code());
        }
        SubmissionsCommand::Evaluate(args) => {
            let evaluator = SubmissionEvaluator::new(config.submissions.default_min_chars);
            if args.batch {
                let results = evaluator.analyze_folder(&args.path)?;
                println!("Processing {} files...", results.len());
                for result in &results {
                    display_submission_analysis(result);
                    println!("\n{}\n", "-".repeat(40));
                }
                let valid = results.iter().filter(|r| r.is_valid).count();
                println!("SUMMARY: {}/{} valid submissions", valid, results.len());
            } else {
                let analysis = evaluator.analyze(&args.path)?;
                display_submission_analysis(&analysis);
                let path = evaluator.export(&analysis, args.output.as_deref())?;
                println!("\nReport saved to: {}", path.display());
            }
            Ok(())
        }
        SubmissionsCommand::Grade(args) => grade_command(args, config),
    }
}

fn grade_command(args: GradeArgs, config: &LearningHubConfig) -> anyhow::Result<()> {
    let mut grader = WorksheetGrader::new(&config.site.root, &config.submissions);
    if let Some(output) = args.output {
        grader = grader.with_results_dir(output);
    }

    if let Some(file) = args.file {
        let graded = grader.grade_file(&file, args.grade.as_deref(), args.report)?;
        display_graded_file(&graded);
        if args.report {
            println!("\n{}", render_report(&graded.result));
        }
        return Ok(());
    }

    let (Some(folder), Some(grade)) = (args.folder, args.grade) else {
        anyhow::bail!("specify --file, or --folder together with --grade");
    };
    let (graded, summary) = grader.grade_folder(&folder, &grade)?;
    for file in &graded {
        println!("  Procesat: {}", file.result_path.display());
    }
    display_folder_summary(summary.as_ref());
    Ok(())
}

/// Site change watcher
pub async fn sync_command(command: SyncCommand, config: &LearningHubConfig) -> anyhow::Result<()> {
    let watcher = Watcher::new(&config.site.root, &config.sync)?;
    match command {
        SyncCommand::Watch(args) if args.once => match watcher.check_once()? {
            WatchEvent::Indexed(n) => println!("First run - indexed {n} files"),
            WatchEvent::Changes(changes) => display_changes(&changes),
            WatchEvent::Unchanged => println!("No changes"),
        },
        SyncCommand::Watch(_) => {
            println!("{}", "LearningHub Watcher Started".bright_green().bold());
            println!("Monitoring: {}", watcher.root().display());
            println!("Check interval: {} seconds", watcher.interval().as_secs());
            println!("Press Ctrl+C to stop\n");
            watcher
                .run(|event| match event {
                    WatchEvent::Indexed(n) => println!("First run - indexed {n} files"),
                    WatchEvent::Changes(changes) => display_changes(changes),
                    WatchEvent::Unchanged => {}
                })
                .await?;
            println!("\nWatcher stopped");
        }
        SyncCommand::Status => display_watcher_status(&watcher.status()),
        SyncCommand::Reindex => {
            let count = watcher.reindex()?;
            println!("Reindexed {count} files");
        }
        SyncCommand::Clear => {
            if watcher.clear_pending()? {
                println!("Pending changes cleared");
            } else {
                println!("No pending changes");
            }
        }
        SyncCommand::Stop => match watcher.stop()? {
            Some(pid) => println!("Removed PID file, watcher {pid} stops at its next check"),
            None => println!("Watcher is not running"),
        },
    }
    Ok(())
}

/// OneCompiler page preparation
pub async fn onecompiler_command(command: OneCompilerCommand, config: &LearningHubConfig) -> anyhow::Result<()> {
    let sync = OneCompilerSync::new(&config.site.root, &config.sync);
    match command {
        OneCompilerCommand::Sync(args) => {
            let oc_config = sync.load_config()?;
            if let Some(file) = args.file {
                let prepared = sync.prepare_page(&file, &oc_config)?;
                display_prepared_page(&prepared);
                return Ok(());
            }

            let results = sync.prepare_pending(&oc_config);
            if results.is_empty() {
                println!("No pages to sync");
                return Ok(());
            }
            println!("Found {} pages to sync\n", results.len());
            for (source, prepared) in results {
                match prepared {
                    Ok(prepared) => display_prepared_page(&prepared),
                    Err(e) => eprintln!("  {} {}: {}", "✗".red(), source, e),
                }
            }
        }
        OneCompilerCommand::Register(args) => {
            let url = sync.register(&args.file, &args.id)?;
            println!("{} {} -> {}", "✅ Registered:".bright_green().bold(), args.file, url.cyan());
        }
        OneCompilerCommand::List => display_onecompiler_pages(&sync.load_config()?),
    }
    Ok(())
}
