//! Console Rendering
//!
//! Human-readable output for every command: batch summaries, audit and scan
//! reports, submission verdicts, watcher status and OneCompiler listings.

use console::Term;
use learninghub::atomic::repair::ScanReport;
use learninghub::audit::AuditReport;
use learninghub::submissions::checksum::VerifiedSubmission;
use learninghub::submissions::evaluate::SubmissionAnalysis;
use learninghub::submissions::grading::{FolderSummary, GradedFile};
use learninghub::sync::onecompiler::{OneCompilerConfig, PreparedPage};
use learninghub::sync::watcher::{ChangeSet, WatcherStatus};
use learninghub::transforms::runner::FileStatus;
use learninghub::{BatchSummary, TransformKind};
use owo_colors::OwoColorize;
use serde_json::Value;
use tabled::{settings::Style as TableStyle, Table, Tabled};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Files listed before the rest is summarised
const FILE_LIST_LIMIT: usize = 20;

/// Print the LearningHub header with version info
pub fn print_header() {
    if Term::stdout().size().1 >= 80 {
        let rule = "─".repeat(50);
        println!("{}", format!("┌{rule}┐").cyan().bold());
        println!(
            "{} {}",
            "│".cyan().bold(),
            format!("📚 LearningHub tools v{VERSION}").bright_cyan().bold()
        );
        println!("{}", format!("└{rule}┘").cyan().bold());
    } else {
        println!("{}", format!("📚 LearningHub tools v{VERSION}").bright_cyan().bold());
    }
    println!();
}

fn rounded<T: Tabled>(rows: Vec<T>) -> Table {
    let mut table = Table::new(rows);
    table.with(TableStyle::rounded());
    table
}

/// Table of every transform
pub fn display_transform_list() {
    #[derive(Tabled)]
    struct TransformRow {
        name: &'static str,
        description: &'static str,
    }

    let rows: Vec<TransformRow> = TransformKind::ALL
        .iter()
        .map(|kind| TransformRow {
            name: kind.as_str(),
            description: kind.description(),
        })
        .collect();
    println!("{}", rounded(rows));
}

/// Totals and per-file changes of a batch run
pub fn display_batch_summary(summary: &BatchSummary) {
    println!();
    let title = if summary.dry_run {
        format!("🔍 {} (dry run)", summary.transform)
    } else {
        format!("✏️  {}", summary.transform)
    };
    println!("{}", title.bright_blue().bold());

    let changed: Vec<_> = summary
        .files
        .iter()
        .filter(|f| f.status != FileStatus::Skipped)
        .collect();
    for file in changed.iter().take(FILE_LIST_LIMIT) {
        match file.status {
            FileStatus::Updated => println!("  {} {}", "✓".green(), file.path),
            _ => println!("  {} {}", "✗".red(), file.path),
        }
        for detail in &file.details {
            println!("      {}", detail.dimmed());
        }
    }
    if changed.len() > FILE_LIST_LIMIT {
        println!("  ... and {} more files", changed.len() - FILE_LIST_LIMIT);
    }

    println!();
    let verb = if summary.dry_run { "Would update" } else { "Updated" };
    println!("{}: {}", verb, summary.updated.to_string().green().bold());
    println!("Skipped: {}", summary.skipped);
    if summary.errors > 0 {
        println!("Errors: {}", summary.errors.to_string().red().bold());
    } else {
        println!("Errors: 0");
    }
}

/// Lessons grouped by grade and module, then issue totals
pub fn display_audit_report(report: &AuditReport) {
    let wide = "=".repeat(70);
    println!("{wide}");
    println!("{}", "LEARNINGHUB LESSON AUDIT REPORT".bold());
    println!("{wide}");

    for (grade, modules) in &report.grades {
        println!("\n{}", format!("### {} ###", grade.to_uppercase()).bright_blue().bold());
        for (module, lessons) in modules {
            let with_issues: Vec<_> = lessons.iter().filter(|l| !l.issues.is_empty()).collect();
            if with_issues.is_empty() {
                continue;
            }
            println!(
                "\n  {}: {}/{} lessons with issues",
                module,
                with_issues.len(),
                lessons.len()
            );
            for lesson in with_issues {
                println!("    - {}", lesson.file_name);
                for issue in &lesson.issues {
                    println!("        [{}] {}", issue.code.to_string().yellow(), issue.message);
                }
            }
        }
    }

    println!("\n{wide}");
    println!("{}", "SUMMARY".bold());
    println!("{wide}");
    println!("Total lessons scanned: {}", report.total_lessons);
    println!("Lessons with issues: {}", report.lessons_with_issues);
    println!("\nIssues by type:");
    for (code, count) in report.issues_ranked() {
        println!("  {code}: {count}");
    }
}

/// Defect totals of converted lessons
pub fn display_scan_report(report: &ScanReport) {
    println!("Total files scanned: {}", report.total_files);
    println!("Files with issues: {}", report.files_with_issues);
    println!();
    println!("Issue totals:");
    for (issue, count) in report.totals.nonzero() {
        println!("  - {issue}: {count}");
    }

    if !report.files.is_empty() {
        println!();
        println!("Files with issues:");
        for (path, issues) in report.files.iter().take(FILE_LIST_LIMIT) {
            let listed: Vec<String> = issues
                .nonzero()
                .into_iter()
                .map(|(name, n)| format!("{name}={n}"))
                .collect();
            println!("  {}: {}", path, listed.join(", "));
        }
        if report.files.len() > FILE_LIST_LIMIT {
            println!("  ... and {} more files", report.files.len() - FILE_LIST_LIMIT);
        }
    }

    println!();
    println!("Atoms to remove (placeholder): {}", report.atoms_to_remove);
    println!("Atoms to review (have content): {}", report.atoms_to_review);
    for (path, empty) in report.empty_atoms.iter().take(FILE_LIST_LIMIT) {
        println!();
        println!("{path}:");
        if !empty.to_remove.is_empty() {
            println!("  Remove ({}):", empty.to_remove.len());
            for atom in &empty.to_remove {
                println!("    - {}: {}", atom.id, truncate(&atom.title, 30));
            }
        }
        if !empty.to_review.is_empty() {
            println!("  Review ({}):", empty.to_review.len());
            for atom in &empty.to_review {
                println!(
                    "    - {}: {} - {}...",
                    atom.id,
                    truncate(&atom.title, 30),
                    truncate(&atom.preview, 50)
                );
            }
        }
    }
    if report.empty_atoms.len() > FILE_LIST_LIMIT {
        println!();
        println!("  ... and {} more files", report.empty_atoms.len() - FILE_LIST_LIMIT);
    }
}

fn truncate(text: &str, chars: usize) -> String {
    text.chars().take(chars).collect()
}

/// One-line checksum verdict
pub fn display_verification(verified: &VerifiedSubmission) {
    if verified.status.is_valid() {
        println!("{}: {}", "VALID".green().bold(), verified.status);
    } else {
        println!("{}: {}", "INVALID".red().bold(), verified.status);
    }
}

fn field<'a>(value: Option<&'a Value>, key: &str) -> Option<&'a Value> {
    value?.get(key).filter(|v| !v.is_null())
}

fn plain(value: Option<&Value>, fallback: &str) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => fallback.to_string(),
    }
}

/// Submission analysis: identity, grade, quiz counters and written answers
pub fn display_submission_analysis(result: &SubmissionAnalysis) {
    let wide = "=".repeat(60);
    println!();
    println!("{wide}");
    println!("FILE: {}", result.filename.cyan());
    if result.is_valid {
        println!("STATUS: {}", "VALID".green().bold());
    } else {
        println!("STATUS: {}", "TAMPERED/INVALID".red().bold());
    }
    println!("MESSAGE: {}", result.verification_message);
    println!("{wide}");

    if !result.is_valid {
        println!("{}", "Cannot analyze tampered/invalid submission!".red());
        return;
    }

    let lesson = result.lesson.as_ref();
    let grading = result.grading.as_ref();
    println!("\nStudent: {}", plain(field(result.student.as_ref(), "name"), "Unknown"));
    println!(
        "Lectie: {}",
        plain(field(lesson, "title").or_else(|| field(lesson, "id")), "Unknown")
    );
    println!(
        "Nota: {}/10 ({})",
        plain(field(grading, "grade"), "?"),
        plain(field(grading, "gradeLabel"), "")
    );
    println!("Scor: {}%", plain(field(grading, "finalScore"), "0"));
    println!(
        "Confidence: {:.0}%",
        result.overall_confidence.unwrap_or(0.0) * 100.0
    );

    if let Some(atomic) = &result.atomic_analysis {
        println!(
            "\nInvatare Atomica: {}/{} corecte",
            atomic.correct_items, atomic.total_items
        );
        if !atomic.incorrect_items.is_empty() {
            #[derive(Tabled)]
            struct IncorrectRow {
                question: String,
                answer: String,
                correct: String,
            }
            let rows: Vec<IncorrectRow> = atomic
                .incorrect_items
                .iter()
                .map(|item| IncorrectRow {
                    question: item.question.chars().take(50).collect(),
                    answer: item.student_answer.clone(),
                    correct: item.correct_answer.clone(),
                })
                .collect();
            println!("{}", rounded(rows));
        }
    }

    if !result.written_evaluations.is_empty() {
        println!("\nRaspunsuri scrise:");
        for (i, eval) in result.written_evaluations.iter().enumerate() {
            let review = if eval.requires_manual_review {
                " [REVIEW]".yellow().to_string()
            } else {
                String::new()
            };
            println!(
                "  [{}] Scor: {}/100, Confidence: {:.0}%{}",
                i + 1,
                eval.score,
                eval.confidence * 100.0,
                review
            );
            println!(
                "      Keywords: {}/{} gasite",
                eval.keywords_found.len(),
                eval.keywords_found.len() + eval.keywords_missing.len()
            );
            println!("      {}", eval.feedback);
        }
    }

    if let Some(review) = result.manual_review_required.as_ref().filter(|r| r.count > 0) {
        println!(
            "\n{}",
            format!(">>> {} item(e) necesita verificare manuala!", review.count).yellow()
        );
    }
}

/// Where grading results went
pub fn display_graded_file(graded: &GradedFile) {
    let summary = &graded.result.summary;
    println!(
        "  {} {} / {} pts, {}%, nota {}",
        "✓".green(),
        summary.total_points,
        summary.max_points,
        summary.percentage,
        summary.nota.to_string().bold()
    );
    println!("Rezultate salvate: {}", graded.result_path.display());
    if let Some(report) = &graded.report_path {
        println!("Raport salvat: {}", report.display());
    }
}

/// Grade distribution of a folder run
pub fn display_folder_summary(summary: Option<&FolderSummary>) {
    match summary {
        Some(summary) => {
            println!("\nProcesat: {} submisii", summary.processed);
            println!("Nota medie: {:.1}", summary.mean);
            println!("Nota maxima: {}", summary.max);
            println!("Nota minima: {}", summary.min);
        }
        None => println!("\nProcesat: 0 submisii"),
    }
}

/// Changes found by a watcher check
pub fn display_changes(changes: &ChangeSet) {
    let rule = "=".repeat(50);
    println!("\n{rule}");
    println!(
        "[{}] {}",
        chrono::Local::now().format("%H:%M:%S"),
        "LearningHub Changes Detected!".bold()
    );
    println!("{rule}");

    if !changes.added.is_empty() {
        println!("\n{}", format!("+ ADDED ({}):", changes.added.len()).green());
        for f in &changes.added {
            println!("  + {f}");
        }
    }
    if !changes.modified.is_empty() {
        println!("\n{}", format!("~ MODIFIED ({}):", changes.modified.len()).yellow());
        for f in &changes.modified {
            println!("  ~ {f}");
        }
    }
    if !changes.deleted.is_empty() {
        println!("\n{}", format!("- DELETED ({}):", changes.deleted.len()).red());
        for f in &changes.deleted {
            println!("  - {f}");
        }
    }

    println!("\n>>> Run 'learninghub onecompiler sync --all' to sync these changes");
    println!("{rule}\n");
}

/// Watcher state and the first pending changes
pub fn display_watcher_status(status: &WatcherStatus) {
    println!("{}", "LearningHub Watcher Status".bold());
    println!("{}", "-".repeat(40));
    match &status.running_pid {
        Some(pid) => println!("Status: {} (PID: {})", "RUNNING".green().bold(), pid),
        None => println!("Status: {}", "NOT RUNNING".dimmed()),
    }
    if let Some(last) = &status.last_check {
        println!("Last check: {last}");
    }
    println!("Tracked files: {}", status.tracked_files);

    if !status.pending.is_empty() {
        println!("\nPending changes: {}", status.pending.len());
        for change in status.pending.iter().take(5) {
            println!("  [{}] {}", change.kind.as_str(), change.file);
        }
        if status.pending.len() > 5 {
            println!("  ... and {} more", status.pending.len() - 5);
        }
    }
}

/// Pages known to the OneCompiler config
pub fn display_onecompiler_pages(config: &OneCompilerConfig) {
    if config.pages.is_empty() {
        println!("No pages configured in sync/onecompiler_config.json");
        return;
    }

    #[derive(Tabled)]
    struct PageRow {
        status: &'static str,
        page: String,
        id: String,
    }

    let rows: Vec<PageRow> = config
        .pages
        .iter()
        .map(|(path, page)| PageRow {
            status: page.status_tag(),
            page: path.clone(),
            id: page.onecompiler_id.clone().unwrap_or_else(|| "-".to_string()),
        })
        .collect();
    println!("{}", rounded(rows));
}

/// Next steps for a prepared page
pub fn display_prepared_page(prepared: &PreparedPage) {
    println!("{} {}", "📄".cyan(), prepared.source.bold());
    println!("   Saved to: {}", prepared.output.display());
    if prepared.existing {
        println!("   Update at: {}", prepared.url.cyan());
    } else {
        println!("   Create at: {}", prepared.url.cyan());
        println!(
            "   Then run: {}",
            format!("learninghub onecompiler register {} <ID>", prepared.source).dimmed()
        );
    }
}
