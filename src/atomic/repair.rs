//! Scan and repair of converted atomic lessons.
//!
//! Conversion leaves a few recurring defects behind: `trl +` shortcuts that
//! lost their `C`, static congratulation atoms, consecutive duplicate atoms
//! and placeholder atoms without a quiz. Atoms are located as `<div>`
//! spans, so removal keeps the rest of the page byte-for-byte.

use std::collections::HashSet;
use std::path::PathBuf;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::Serialize;
use tracing::{debug, info};

use crate::core::errors::Result;
use crate::core::file_utils::{relative_slash_path, FileReader};
use crate::core::html::{attribute, clean_text, find_divs_with_class, ElementSpan};
use crate::core::page::{Page, Site};
use crate::lazy_regex;
use crate::transforms::{Outcome, PageTransform, Scope};

const DUPLICATE_PREFIX_CHARS: usize = 200;
const MIN_DUPLICATE_CHARS: usize = 50;
const MIN_CONTENT_CHARS: usize = 50;
const REMOVE_PREVIEW_CHARS: usize = 100;
const REVIEW_PREVIEW_CHARS: usize = 200;

/// Lower-cased atom texts that carry no real content
static PLACEHOLDERS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"^informatiile importante$",
        r"^concept \d+$",
        r"^retine$",
        r"^dupa ce termini",
        r"^hai sa descoperim",
        r"^felicitari",
        r"^rezumat$",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid placeholder pattern"))
    .collect()
});

/// Defect counts for one page
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AtomicIssues {
    /// `trl +` not preceded by `C`
    pub trl_typo: usize,
    /// `"options": ["", "", ""]`
    pub empty_options: usize,
    /// `data-quiz='[]'`
    pub empty_quiz: usize,
    /// Static `Felicitari` atom present (0 or 1)
    pub felicitari_static: usize,
    /// Atoms repeating an earlier atom's content
    pub duplicate_atoms: usize,
}

impl AtomicIssues {
    /// Whether anything was found
    pub fn has_issues(&self) -> bool {
        self.trl_typo + self.empty_options + self.empty_quiz + self.felicitari_static + self.duplicate_atoms > 0
    }

    fn add(&mut self, other: &AtomicIssues) {
        self.trl_typo += other.trl_typo;
        self.empty_options += other.empty_options;
        self.empty_quiz += other.empty_quiz;
        self.felicitari_static += other.felicitari_static;
        self.duplicate_atoms += other.duplicate_atoms;
    }

    /// Non-zero counts as `(name, count)` pairs
    pub fn nonzero(&self) -> Vec<(&'static str, usize)> {
        [
            ("trl_typo", self.trl_typo),
            ("empty_options", self.empty_options),
            ("empty_quiz", self.empty_quiz),
            ("felicitari_static", self.felicitari_static),
            ("duplicate_atoms", self.duplicate_atoms),
        ]
        .into_iter()
        .filter(|(_, n)| *n > 0)
        .collect()
    }
}

/// An atom without a quiz
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmptyAtom {
    pub id: String,
    pub title: String,
    /// Start of the atom's text
    pub preview: String,
}

/// Quiz-less atoms of one page. Placeholders can go; atoms with real
/// content need a quiz written by hand.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EmptyAtoms {
    pub to_remove: Vec<EmptyAtom>,
    pub to_review: Vec<EmptyAtom>,
}

impl EmptyAtoms {
    pub fn is_empty(&self) -> bool {
        self.to_remove.is_empty() && self.to_review.is_empty()
    }
}

/// Scan results for a site
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanReport {
    /// Pages scanned
    pub total_files: usize,
    /// Pages with at least one issue
    pub files_with_issues: usize,
    /// Totals across pages
    pub totals: AtomicIssues,
    /// Per-page counts, only pages with issues
    pub files: Vec<(String, AtomicIssues)>,
    /// Placeholder atoms across pages
    pub atoms_to_remove: usize,
    /// Quiz-less atoms with content across pages
    pub atoms_to_review: usize,
    /// Per-page quiz-less atoms, only pages that have some
    pub empty_atoms: Vec<(String, EmptyAtoms)>,
}

/// Whether the character before `pos` is a `C`
fn after_c(html: &str, pos: usize) -> bool {
    html[..pos]
        .chars()
        .next_back()
        .is_some_and(|c| c == 'C' || c == 'c')
}

/// Count defects in one page
pub fn scan(html: &str) -> AtomicIssues {
    let trl_typo = lazy_regex!(r"(?i)trl\s*\+")
        .find_iter(html)
        .filter(|m| !after_c(html, m.start()))
        .count();
    let empty_options = lazy_regex!(r#""options":\s*\["",\s*"",\s*""\]"#).find_iter(html).count();
    let empty_quiz = html.matches("data-quiz='[]'").count();
    let felicitari_static =
        usize::from(lazy_regex!(r#"class="atom-title"[^>]*>Felicitari"#).is_match(html));

    let mut seen = HashSet::new();
    let mut duplicate_atoms = 0;
    for span in find_divs_with_class(html, "atom") {
        if let Some(text) = atom_text(span.outer(html)) {
            let key = prefix(&text);
            if seen.contains(&key) && key.chars().count() > MIN_DUPLICATE_CHARS {
                duplicate_atoms += 1;
            }
            seen.insert(key);
        }
    }

    AtomicIssues {
        trl_typo,
        empty_options,
        empty_quiz,
        felicitari_static,
        duplicate_atoms,
    }
}

fn prefix(text: &str) -> String {
    text.chars().take(DUPLICATE_PREFIX_CHARS).collect()
}

/// Text of an atom's `.atom-content`, if it has one
fn atom_text(atom: &str) -> Option<String> {
    find_divs_with_class(atom, "atom-content")
        .first()
        .map(|span| clean_text(span.inner(atom)))
}

fn atom_title(atom: &str) -> String {
    lazy_regex!(r#"(?s)class="atom-title"[^>]*>(.*?)</"#)
        .captures(atom)
        .map(|c| clean_text(&c[1]))
        .unwrap_or_default()
}

fn has_empty_quiz(span: &ElementSpan, html: &str) -> bool {
    match attribute(span.open_tag(html), "data-quiz") {
        None => true,
        Some(value) => value.is_empty() || value == "[]",
    }
}

/// Split the quiz-less atoms of a page into placeholders and atoms to review
pub fn empty_quiz_atoms(html: &str) -> EmptyAtoms {
    let mut found = EmptyAtoms::default();
    for span in find_divs_with_class(html, "atom") {
        if !has_empty_quiz(&span, html) {
            continue;
        }
        let atom = span.outer(html);
        let text = atom_text(atom).unwrap_or_default();
        let title = Some(atom_title(atom))
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| "Unknown".to_string());
        let id = attribute(span.open_tag(html), "id").unwrap_or_else(|| "unknown".to_string());

        if is_placeholder(&text) {
            found.to_remove.push(EmptyAtom {
                id,
                title,
                preview: text.chars().take(REMOVE_PREVIEW_CHARS).collect(),
            });
        } else {
            found.to_review.push(EmptyAtom {
                id,
                title,
                preview: text.chars().take(REVIEW_PREVIEW_CHARS).collect(),
            });
        }
    }
    found
}

/// Whether atom text is too short or a known placeholder
pub fn is_placeholder(text: &str) -> bool {
    let clean = text.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
    if clean.chars().count() < MIN_CONTENT_CHARS {
        return true;
    }
    PLACEHOLDERS.iter().any(|re| re.is_match(&clean))
}

/// Repair options
#[derive(Debug, Clone, Copy, Default)]
pub struct RepairOptions {
    /// Also remove empty-quiz atoms whose content is a placeholder
    pub prune_empty: bool,
}

/// Fix `trl + X` shortcuts not preceded by `C`
fn fix_trl(html: &str) -> String {
    let re = lazy_regex!(r"(?i)trl\s*\+\s*([A-Za-z])");
    let mut out = String::with_capacity(html.len() + 8);
    let mut last = 0;
    for caps in re.captures_iter(html) {
        let Some(m) = caps.get(0) else {
            continue;
        };
        if after_c(html, m.start()) {
            continue;
        }
        out.push_str(&html[last..m.start()]);
        out.push_str("Ctrl + ");
        out.push_str(&caps[1]);
        last = m.end();
    }
    out.push_str(&html[last..]);
    out
}

/// Apply every repair to one page. Returns the new text and the fixes made.
pub fn repair(html: &str, options: RepairOptions) -> (String, Vec<String>) {
    let mut fixes = Vec::new();

    let mut content = fix_trl(html);
    if content != html {
        fixes.push("Fixed trl -> Ctrl typos".to_string());
    }

    let spans = find_divs_with_class(&content, "atom");
    let mut remove = vec![false; spans.len()];

    for (i, span) in spans.iter().enumerate() {
        let atom = span.outer(&content);
        if atom_title(atom).contains("Felicitari") && has_empty_quiz(span, &content) {
            remove[i] = true;
            fixes.push("Removed static Felicitari atom".to_string());
        }
    }

    let mut prev: Option<String> = None;
    for (i, span) in spans.iter().enumerate() {
        if remove[i] {
            continue;
        }
        let Some(text) = atom_text(span.outer(&content)) else {
            continue;
        };
        let current = prefix(&text);
        if prev.as_deref() == Some(current.as_str()) && current.chars().count() > MIN_DUPLICATE_CHARS {
            remove[i] = true;
            fixes.push("Removed duplicate atom".to_string());
        }
        prev = Some(current);
    }

    if options.prune_empty {
        for (i, span) in spans.iter().enumerate() {
            if remove[i] {
                continue;
            }
            let atom = span.outer(&content);
            if has_empty_quiz(span, &content)
                && is_placeholder(&atom_text(atom).unwrap_or_default())
            {
                remove[i] = true;
                fixes.push("Removed placeholder atom".to_string());
            }
        }
    }

    if remove.iter().any(|r| *r) {
        content = rebuild(&content, &spans, &remove);
    }

    (content, fixes)
}

/// Drop removed atoms (with their `<!-- Atom N -->` marker) and renumber
/// the rest
fn rebuild(html: &str, spans: &[ElementSpan], remove: &[bool]) -> String {
    let mut out = String::with_capacity(html.len());
    let mut cursor = 0;
    let mut number = 0;

    for (span, removed) in spans.iter().zip(remove) {
        let gap = &html[cursor..span.start];
        if *removed {
            let marker = lazy_regex!(r"\s*<!--\s*Atom\s+\d+\s*-->[ \t\r\n]*$|[ \t]*$");
            let keep = marker.find(gap).map(|m| m.start()).unwrap_or(gap.len());
            out.push_str(&gap[..keep]);
        } else {
            number += 1;
            let gap = lazy_regex!(r"<!--\s*Atom\s+\d+\s*-->([ \t\r\n]*)$")
                .replace(gap, |c: &Captures| format!("<!-- Atom {number} -->{}", &c[1]));
            out.push_str(&gap);
            out.push_str(&renumber_atom(span.outer(html), number));
        }
        cursor = span.end;
    }
    out.push_str(&html[cursor..]);
    out
}

fn renumber_atom(atom: &str, number: usize) -> String {
    let id = format!("atom-{number}");
    let open_end = atom.find('>').map(|p| p + 1).unwrap_or(atom.len());
    let (open, rest) = atom.split_at(open_end);

    let id_attr = lazy_regex!(r#"\sid="[^"]*""#);
    let open = if id_attr.is_match(open) {
        id_attr.replace(open, format!(r#" id="{id}""#).as_str()).into_owned()
    } else {
        open.replacen("<div", &format!(r#"<div id="{id}""#), 1)
    };
    let rest = lazy_regex!(r#"(<div class="atom-number">)[^<]*(</div>)"#)
        .replace(rest, |c: &Captures| format!("{}{}{}", &c[1], number, &c[2]));
    format!("{open}{rest}")
}

/// Batch repair of atomic lessons through the transform runner
pub struct AtomicRepair {
    /// Options applied to every page
    pub options: RepairOptions,
}

impl PageTransform for AtomicRepair {
    fn name(&self) -> &'static str {
        "atomic-repair"
    }

    fn scope(&self) -> Scope {
        Scope::ContentHtml
    }

    fn apply(&self, page: &Page, html: &str) -> Result<Outcome> {
        if !is_lesson_or_quiz(&page.file_name()) {
            return Ok(Outcome::skip("not a lesson or quiz page"));
        }
        let (content, fixes) = repair(html, self.options);
        Ok(Outcome::from_edit(html, content, fixes))
    }
}

fn is_lesson_or_quiz(name: &str) -> bool {
    name.contains("lectia") || name.contains("quiz")
}

/// Scan every lesson and quiz page of a site
pub fn scan_site(site: &Site) -> Result<ScanReport> {
    let files: Vec<PathBuf> = site
        .walker()
        .html_files(&site.content_dir)?
        .into_iter()
        .filter(|p| {
            p.file_name()
                .map(|n| is_lesson_or_quiz(&n.to_string_lossy()))
                .unwrap_or(false)
        })
        .collect();

    let mut report = ScanReport {
        total_files: files.len(),
        ..Default::default()
    };
    for path in files {
        let html = FileReader::read_to_string(&path)?;
        let rel = relative_slash_path(&site.content_dir, &path)
            .unwrap_or_else(|| path.display().to_string());
        let issues = scan(&html);
        if issues.has_issues() {
            debug!("{}: {:?}", rel, issues);
            report.files_with_issues += 1;
            report.totals.add(&issues);
            report.files.push((rel.clone(), issues));
        }
        let empty = empty_quiz_atoms(&html);
        if !empty.is_empty() {
            report.atoms_to_remove += empty.to_remove.len();
            report.atoms_to_review += empty.to_review.len();
            report.empty_atoms.push((rel, empty));
        }
    }
    info!(
        "Scanned {} atomic pages, {} with issues, {} atoms to remove, {} to review",
        report.total_files, report.files_with_issues, report.atoms_to_remove, report.atoms_to_review
    );
    Ok(report)
}
