//! Practice exercise extraction.
//!
//! Four page layouts carry practice work: open-ended exercise cards in a
//! `practice-advanced` section, task cards in a `practice-section`, coding
//! problems in `practice-problem` blocks and typed exercises passed to
//! `AdvancedPractice.init` as a JavaScript literal.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::core::html::clean_text;
use crate::lazy_regex;

/// One practice exercise. Field names follow the exported JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PracticeExercise {
    /// Exercise kind: `deschis`, `practica_cod`, or the JS `type`
    #[serde(rename = "tip")]
    pub kind: String,
    /// Title
    #[serde(rename = "titlu", skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Free-text description
    #[serde(rename = "descriere", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Sub-questions
    #[serde(rename = "intrebari", skip_serializing_if = "Option::is_none")]
    pub questions: Option<Vec<String>>,
    /// Difficulty label
    #[serde(rename = "dificultate", skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<String>,
    /// Statement of the task
    #[serde(rename = "cerinta", skip_serializing_if = "Option::is_none")]
    pub statement: Option<String>,
    /// Scenario text
    #[serde(rename = "context", skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    /// Steps
    #[serde(rename = "pasi", skip_serializing_if = "Option::is_none")]
    pub steps: Option<Vec<String>>,
    /// Mini-project checkpoints
    #[serde(rename = "checkpoint_uri", skip_serializing_if = "Option::is_none")]
    pub checkpoints: Option<Vec<String>>,
    /// Hint
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    /// Choice texts
    #[serde(rename = "optiuni", skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    /// Correct answer
    #[serde(rename = "raspuns_corect", skip_serializing_if = "Option::is_none")]
    pub correct: Option<String>,
    /// Explanation
    #[serde(rename = "explicatie", skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    /// Drag-and-drop items
    #[serde(rename = "elemente", skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<DragItem>>,
    /// Schema slots
    #[serde(rename = "spatii", skip_serializing_if = "Option::is_none")]
    pub slots: Option<Vec<SchemaSlot>>,
    /// Hints for written answers
    #[serde(rename = "indicii", skip_serializing_if = "Option::is_none")]
    pub hints: Option<Vec<String>>,
    /// Expected keywords for written answers
    #[serde(rename = "cuvinte_cheie", skip_serializing_if = "Option::is_none")]
    pub keywords: Option<Vec<String>>,
}

/// Drag-and-drop item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DragItem {
    /// Item label
    pub label: String,
    /// Target category
    #[serde(rename = "categorie")]
    pub category: String,
}

/// Schema slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaSlot {
    /// Slot label
    pub label: String,
    /// Expected value
    #[serde(rename = "corect")]
    pub correct: String,
}

fn non_empty(values: Vec<String>) -> Option<Vec<String>> {
    if values.is_empty() {
        None
    } else {
        Some(values)
    }
}

fn first_clean(re: &Regex, text: &str) -> Option<String> {
    re.captures(text).map(|c| clean_text(&c[1]))
}

fn all_clean(re: &Regex, text: &str) -> Vec<String> {
    re.captures_iter(text)
        .map(|c| clean_text(&c[1]))
        .filter(|t| !t.is_empty())
        .collect()
}

/// Text following each match of `opener`, up to the next match
fn split_after<'a>(text: &'a str, opener: &Regex) -> Vec<&'a str> {
    let starts: Vec<(usize, usize)> = opener.find_iter(text).map(|m| (m.start(), m.end())).collect();
    starts
        .iter()
        .enumerate()
        .map(|(i, (_, end))| {
            let stop = starts.get(i + 1).map(|(s, _)| *s).unwrap_or(text.len());
            &text[*end..stop]
        })
        .collect()
}

/// All practice exercises on a page, formats A to D
pub fn extract_practice(html: &str) -> Vec<PracticeExercise> {
    let mut exercises = open_exercises(html);
    if exercises.is_empty() {
        exercises = practice_tasks(html);
    }
    if html.contains("practice-problem") {
        exercises.extend(coding_problems(html));
    }
    exercises.extend(scripted_exercises(html));
    exercises
}

fn h4() -> &'static Regex {
    lazy_regex!(r"(?s)<h4[^>]*>(.*?)</h4>")
}

fn list_items(text: &str) -> Vec<String> {
    all_clean(lazy_regex!(r"(?s)<li[^>]*>(.*?)</li>"), text)
}

/// Format A: `section.practice-advanced` with `div.practice-exercise` cards
fn open_exercises(html: &str) -> Vec<PracticeExercise> {
    let Some(section) =
        lazy_regex!(r#"(?s)<section[^>]*class="practice-advanced"[^>]*>(.*?)</section>"#).captures(html)
    else {
        return Vec::new();
    };
    let body = section.get(1).map(|m| m.as_str()).unwrap_or_default();

    split_after(body, lazy_regex!(r#"<div[^>]*class="practice-exercise"[^>]*>"#))
        .into_iter()
        .filter_map(|card| {
            let description = lazy_regex!(r"(?s)<p\b([^>]*)>(.*?)</p>")
                .captures_iter(card)
                .find(|c| !c[1].contains(r#"class="answer-instruction""#))
                .map(|c| clean_text(&c[2]));
            open_card(card, description)
        })
        .collect()
}

/// Format B: `section.practice-section` with `div.practice-task` cards
fn practice_tasks(html: &str) -> Vec<PracticeExercise> {
    let Some(section) =
        lazy_regex!(r#"(?s)<section[^>]*class="practice-section"[^>]*>(.*?)</section>"#).captures(html)
    else {
        return Vec::new();
    };
    let body = section.get(1).map(|m| m.as_str()).unwrap_or_default();

    split_after(body, lazy_regex!(r#"<div[^>]*class="practice-task"[^>]*>"#))
        .into_iter()
        .filter_map(|card| {
            let description = first_clean(lazy_regex!(r"(?s)<p\b[^>]*>(.*?)</p>"), card);
            open_card(card, description)
        })
        .collect()
}

fn open_card(card: &str, description: Option<String>) -> Option<PracticeExercise> {
    let exercise = PracticeExercise {
        kind: "deschis".to_string(),
        title: first_clean(h4(), card),
        description,
        questions: non_empty(list_items(card)),
        ..Default::default()
    };
    if exercise.title.is_some() || exercise.description.is_some() {
        Some(exercise)
    } else {
        None
    }
}

/// Format C: coding problems in `div.practice-problem[data-problem]`
fn coding_problems(html: &str) -> Vec<PracticeExercise> {
    let opener = lazy_regex!(r#"<div[^>]*class="practice-problem[^"]*"[^>]*data-problem="[^"]+"[^>]*>"#);
    split_after(html, opener)
        .into_iter()
        .filter_map(|problem| {
            let title = first_clean(
                lazy_regex!(r#"(?s)<span[^>]*class="problem-title"[^>]*>(.*?)</span>\s*</span>"#),
                problem,
            )
            .or_else(|| {
                first_clean(lazy_regex!(r#"(?s)<span[^>]*class="problem-title"[^>]*>(.*?)</span>"#), problem)
            });
            let statement = first_clean(lazy_regex!(r#"(?s)<p[^>]*class="project-intro"[^>]*>(.*?)</p>"#), problem)
                .or_else(|| {
                    first_clean(lazy_regex!(r#"(?s)<p[^>]*class="problem-desc"[^>]*>(.*?)</p>"#), problem)
                });

            let exercise = PracticeExercise {
                kind: "practica_cod".to_string(),
                title,
                difficulty: first_clean(
                    lazy_regex!(r#"<span[^>]*class="difficulty-badge[^"]*"[^>]*>([^<]+)</span>"#),
                    problem,
                ),
                statement,
                steps: non_empty(all_clean(
                    lazy_regex!(r#"(?s)<span[^>]*class="test-io-value"[^>]*>(.*?)</span>"#),
                    problem,
                )),
                checkpoints: non_empty(all_clean(
                    lazy_regex!(r#"(?s)<span[^>]*class="checkpoint-text"[^>]*>(.*?)</span>"#),
                    problem,
                )),
                hint: first_clean(lazy_regex!(r#"(?s)<div[^>]*class="hint-content"[^>]*>(.*?)</div>"#), problem),
                ..Default::default()
            };
            (exercise.title.is_some() || exercise.statement.is_some()).then_some(exercise)
        })
        .collect()
}

/// `{...}` objects at the top level of an array literal body. Brackets
/// inside quoted strings are ignored.
fn top_level_objects(literal: &str) -> Vec<&str> {
    let mut objects = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (i, ch) in literal.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == q {
                quote = None;
            }
            continue;
        }
        match ch {
            '\'' | '"' | '`' => quote = Some(ch),
            '{' | '[' => {
                if depth == 0 && ch == '{' {
                    start = i;
                }
                depth += 1;
            }
            '}' | ']' => {
                depth = depth.saturating_sub(1);
                if depth == 0 && ch == '}' {
                    objects.push(&literal[start..=i]);
                }
            }
            _ => {}
        }
    }
    objects
}

fn js_field(re: &Regex, text: &str) -> Option<String> {
    re.captures(text).map(|c| c[1].to_string())
}

fn quoted_strings(text: &str) -> Vec<String> {
    lazy_regex!(r#"['"]([^'"]+)['"]"#)
        .captures_iter(text)
        .map(|c| c[1].to_string())
        .collect()
}

fn js_list<'a>(re: &Regex, text: &'a str) -> Option<&'a str> {
    re.captures(text).and_then(|c| c.get(1)).map(|m| m.as_str())
}

fn labelled(re: &Regex, text: &str) -> Vec<String> {
    re.captures_iter(text).map(|c| c[1].to_string()).collect()
}

/// Format D: typed exercises in an `AdvancedPractice.init(id, [...])` literal
fn scripted_exercises(html: &str) -> Vec<PracticeExercise> {
    let Some(literal) = lazy_regex!(r"(?s)AdvancedPractice\.init\s*\([^,]+,\s*\[(.*?)\]\s*\);")
        .captures(html)
        .and_then(|c| c.get(1))
    else {
        return Vec::new();
    };

    let typed = lazy_regex!(r#"^\{\s*type:\s*['"](\w+)['"]"#);
    let label = lazy_regex!(r#"label:\s*['"]([^'"]+)['"]"#);
    let correct_field = lazy_regex!(r#"correct:\s*['"]([^'"]+)['"]"#);

    let mut exercises = Vec::new();
    for object in top_level_objects(literal.as_str()) {
        let Some(head) = typed.captures(object) else {
            continue;
        };
        let kind = head[1].to_string();
        let body = &object[head[0].len()..object.len() - 1];

        let mut exercise = PracticeExercise {
            statement: js_field(lazy_regex!(r#"question:\s*['"]([^'"]+)['"]"#), body),
            context: js_field(lazy_regex!(r#"scenario:\s*['"]([^'"]+)['"]"#), body),
            correct: js_field(correct_field, body),
            explanation: js_field(lazy_regex!(r#"explanation:\s*['"]([^'"]+)['"]"#), body),
            ..Default::default()
        };

        if let Some(options) = js_list(lazy_regex!(r"(?s)options:\s*\[(.*?)\]"), body) {
            exercise.options = non_empty(quoted_strings(options));
        }
        if let Some(choices) = js_list(lazy_regex!(r"(?s)choices:\s*\[(.*?)\]"), body) {
            let texts = labelled(lazy_regex!(r#"text:\s*['"]([^'"]+)['"]"#), choices);
            if !texts.is_empty() {
                exercise.options = Some(texts);
            }
        }
        if let Some(index) = lazy_regex!(r"correctChoice:\s*(\d+)")
            .captures(body)
            .and_then(|c| c[1].parse::<u8>().ok())
        {
            exercise.correct = Some(char::from(b'a' + index % 26).to_string());
        }

        match kind.as_str() {
            "dragdrop" => {
                if let Some(items) = js_list(lazy_regex!(r"(?s)items:\s*\[(.*?)\]"), body) {
                    let labels = labelled(label, items);
                    let categories = labelled(lazy_regex!(r#"category:\s*['"]([^'"]+)['"]"#), items);
                    if !labels.is_empty() && !categories.is_empty() {
                        exercise.items = Some(
                            labels
                                .into_iter()
                                .zip(categories)
                                .map(|(label, category)| DragItem { label, category })
                                .collect(),
                        );
                    }
                }
            }
            "schema" => {
                if let Some(slots) = js_list(lazy_regex!(r"(?s)slots:\s*\[(.*?)\]"), body) {
                    let labels = labelled(label, slots);
                    if !labels.is_empty() {
                        let expected = labelled(correct_field, slots);
                        exercise.slots = Some(
                            labels
                                .into_iter()
                                .zip(expected)
                                .map(|(label, correct)| SchemaSlot { label, correct })
                                .collect(),
                        );
                    }
                }
            }
            "written" => {
                if let Some(hints) = js_list(lazy_regex!(r"(?s)hints:\s*\[(.*?)\]"), body) {
                    exercise.hints = non_empty(quoted_strings(hints));
                }
                if let Some(keywords) = js_list(lazy_regex!(r"(?s)keywords:\s*\[(.*?)\]"), body) {
                    exercise.keywords = non_empty(quoted_strings(keywords));
                }
            }
            _ => {}
        }
        exercise.kind = kind;

        if exercise.statement.is_some() || exercise.context.is_some() {
            exercises.push(exercise);
        }
    }
    exercises
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_exercises_skip_answer_instruction() {
        let html = r#"<section class="practice-advanced">
<div class="practice-exercise">
  <h4>Exercitiul 1: Fisiere</h4>
  <p class="answer-instruction">Scrie raspunsul in caiet</p>
  <p>Organizeaza fisierele &amp; folderele.</p>
  <ul><li>Ce e un folder?</li><li> </li><li>Cum redenumesti?</li></ul>
</div>
<div class="practice-exercise"><h4>Exercitiul 2</h4></div>
</section>"#;
        let exercises = extract_practice(html);
        assert_eq!(exercises.len(), 2);
        assert_eq!(exercises[0].kind, "deschis");
        assert_eq!(exercises[0].title.as_deref(), Some("Exercitiul 1: Fisiere"));
        assert_eq!(exercises[0].description.as_deref(), Some("Organizeaza fisierele & folderele."));
        assert_eq!(
            exercises[0].questions,
            Some(vec!["Ce e un folder?".to_string(), "Cum redenumesti?".to_string()])
        );
        assert!(exercises[1].questions.is_none());
    }

    #[test]
    fn test_practice_tasks_only_without_format_a() {
        let html = r#"<section class="practice-section">
<div class="practice-task"><h4>Sarcina</h4><p>Deseneaza</p></div>
</section>"#;
        let exercises = extract_practice(html);
        assert_eq!(exercises.len(), 1);
        assert_eq!(exercises[0].description.as_deref(), Some("Deseneaza"));

        let both = format!(
            r#"<section class="practice-advanced"><div class="practice-exercise"><h4>A</h4></div></section>{html}"#
        );
        let exercises = extract_practice(&both);
        assert_eq!(exercises.len(), 1);
        assert_eq!(exercises[0].title.as_deref(), Some("A"));
    }

    #[test]
    fn test_coding_problems() {
        let html = r#"
<div class="practice-problem easy" data-problem="p1">
  <span class="problem-header"><span class="problem-title">Suma <span>a+b</span></span></span>
  <span class="difficulty-badge easy">Usor</span>
  <p class="problem-desc">Citeste doua numere.</p>
  <span class="test-io-value">3 4</span><span class="test-io-value">7</span>
  <div class="hint-content">Foloseste cin.</div>
</div>
<div class="practice-problem" data-problem="p2">
  <span class="problem-title">Proiect</span>
  <p class="project-intro">Un mini-joc.</p>
  <span class="checkpoint-text">Meniu</span>
</div>"#;
        let exercises = extract_practice(html);
        assert_eq!(exercises.len(), 2);
        assert_eq!(exercises[0].kind, "practica_cod");
        assert_eq!(exercises[0].title.as_deref(), Some("Suma a+b"));
        assert_eq!(exercises[0].difficulty.as_deref(), Some("Usor"));
        assert_eq!(exercises[0].statement.as_deref(), Some("Citeste doua numere."));
        assert_eq!(exercises[0].steps, Some(vec!["3 4".to_string(), "7".to_string()]));
        assert_eq!(exercises[0].hint.as_deref(), Some("Foloseste cin."));
        assert_eq!(exercises[1].statement.as_deref(), Some("Un mini-joc."));
        assert_eq!(exercises[1].checkpoints, Some(vec!["Meniu".to_string()]));
    }

    #[test]
    fn test_scripted_exercises() {
        let html = r#"<script>
AdvancedPractice.init('cls5-m1-lectia1', [
    { type: 'written', question: 'Explica ce este RAM', hints: ['memorie', 'temporar'], keywords: ['memorie', 'volatila'] },
    { type: 'scenario', scenario: 'Calculatorul merge greu', choices: [{ text: 'Restart' }, { text: 'Curatare' }], correctChoice: 1 },
    { type: 'dragdrop', question: 'Sorteaza', items: [{ label: 'Mouse', category: 'intrare' }, { label: 'Monitor', category: 'iesire' }] },
    { type: 'schema', question: 'Completeaza', slots: [{ label: 'CPU', correct: 'procesor' }] },
    { type: 'quiz', question: 'Alege', options: ['a1', 'a2'], correct: 'b', explanation: 'Pentru ca' }
]);
</script>"#;
        let exercises = extract_practice(html);
        assert_eq!(exercises.len(), 5);

        assert_eq!(exercises[0].kind, "written");
        assert_eq!(exercises[0].keywords, Some(vec!["memorie".to_string(), "volatila".to_string()]));
        assert_eq!(exercises[0].hints.as_ref().map(Vec::len), Some(2));

        assert_eq!(exercises[1].context.as_deref(), Some("Calculatorul merge greu"));
        assert_eq!(exercises[1].options, Some(vec!["Restart".to_string(), "Curatare".to_string()]));
        assert_eq!(exercises[1].correct.as_deref(), Some("b"));

        let items = exercises[2].items.as_ref().unwrap();
        assert_eq!(items[1].label, "Monitor");
        assert_eq!(items[1].category, "iesire");

        let slots = exercises[3].slots.as_ref().unwrap();
        assert_eq!(slots[0].correct, "procesor");

        assert_eq!(exercises[4].options, Some(vec!["a1".to_string(), "a2".to_string()]));
        assert_eq!(exercises[4].correct.as_deref(), Some("b"));
        assert_eq!(exercises[4].explanation.as_deref(), Some("Pentru ca"));
    }

    #[test]
    fn test_serialized_field_names() {
        let exercise = PracticeExercise {
            kind: "deschis".into(),
            title: Some("T".into()),
            ..Default::default()
        };
        let json = serde_json::to_value(&exercise).unwrap();
        assert_eq!(json, serde_json::json!({"tip": "deschis", "titlu": "T"}));
    }
}
