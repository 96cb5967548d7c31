//! Plain-text feedback report for a graded worksheet.

use serde_json::Value;

use super::grading::{GradingResult, LEVELS};

const WIDE: usize = 60;
const NARROW: usize = 40;
const QUESTION_PREVIEW: usize = 50;

fn level_title(level: &str) -> String {
    match level {
        "minim" => "MINIM (5-6)".to_string(),
        "standard" => "STANDARD (7-8)".to_string(),
        "performanta" => "PERFORMANTA (9-10)".to_string(),
        other => other.to_uppercase(),
    }
}

fn student_field(student: &Value, key: &str, fallback: &str) -> String {
    match student.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => fallback.to_string(),
        Some(other) => other.to_string(),
    }
}

/// Render a grading result as the report handed to students
pub fn render_report(result: &GradingResult) -> String {
    let wide = "=".repeat(WIDE);
    let narrow = "-".repeat(NARROW);
    let mut lines: Vec<String> = vec![
        wide.clone(),
        "RAPORT DE VERIFICARE - LearningHub".to_string(),
        wide.clone(),
        String::new(),
        format!("Elev: {}", student_field(&result.student, "name", "Necunoscut")),
        format!("Clasa: {}", student_field(&result.student, "class", "-")),
        format!("Lectia: {}", result.lesson),
        format!("Data verificare: {}", result.timestamp_graded),
        String::new(),
    ];

    let summary = &result.summary;
    lines.push(narrow.clone());
    lines.push("REZULTAT FINAL".to_string());
    lines.push(narrow.clone());
    lines.push(format!("Punctaj: {} / {}", summary.total_points, summary.max_points));
    lines.push(format!("Procent: {}%", summary.percentage));
    lines.push(format!("NOTA: {}", summary.nota));
    if summary.needs_review {
        lines.push(String::new());
        lines.push("⚠️  NECESITA VERIFICARE MANUALA pentru raspunsuri deschise".to_string());
    }
    lines.push(String::new());

    for level in LEVELS {
        let Some(data) = result.levels.get(level) else {
            continue;
        };
        lines.push(narrow.clone());
        lines.push(level_title(level));
        lines.push(format!("Punctaj: {} / {}", data.points, data.max_points));
        lines.push(String::new());

        for item in &data.items {
            let status = if item.needs_review == Some(true) {
                "?"
            } else if item.points_earned == item.max_points {
                "✓"
            } else {
                "✗"
            };
            let preview: String = item.question.chars().take(QUESTION_PREVIEW).collect();
            lines.push(format!("  {status} [{}] {preview}...", item.id));
            lines.push(format!("      Puncte: {} / {}", item.points_earned, item.max_points));
            lines.push(format!("      {}", item.feedback));
            lines.push(String::new());
        }
    }

    lines.push(wide);
    lines.join("\n")
}
