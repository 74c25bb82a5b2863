//! Heuristic project score.
//!
//! The score only looks at the shape of the extracted tree: which file
//! extensions appear, whether something looks like a README or a test,
//! whether the root has subdirectories and how many files there are.
//! Paths are matched relative to the root so the result does not depend on
//! where the upload directory lives.

use std::{
    collections::{BTreeMap, BTreeSet},
    fs,
    path::Path,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;

use crate::storage::to_slash;

#[derive(Debug, Error)]
pub enum ScoringError {
    #[error("cannot score {path}: {reason}")]
    Input { path: String, reason: String },
}

impl ScoringError {
    fn input(path: &Path, reason: impl ToString) -> Self {
        Self::Input {
            path: path.display().to_string(),
            reason: reason.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Category {
    CodeDiversity,
    Documentation,
    FileStructure,
    Tests,
    Complexity,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::CodeDiversity,
        Category::Documentation,
        Category::FileStructure,
        Category::Tests,
        Category::Complexity,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Category::CodeDiversity => "Code Diversity",
            Category::Documentation => "Documentation",
            Category::FileStructure => "File Structure",
            Category::Tests => "Tests",
            Category::Complexity => "Complexity",
        }
    }
}

/// Total plus one entry per [`Category`], keyed by its label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreReport {
    pub total: i32,
    pub categories: BTreeMap<String, i32>,
}

impl ScoreReport {
    fn from_parts(parts: [(Category, i32); 5]) -> Self {
        let categories: BTreeMap<String, i32> = parts
            .iter()
            .map(|(c, v)| (c.label().to_string(), *v))
            .collect();
        Self {
            total: parts.iter().map(|(_, v)| v).sum(),
            categories,
        }
    }

    pub fn get(&self, category: Category) -> i32 {
        self.categories.get(category.label()).copied().unwrap_or(0)
    }
}

/// What the rubric needs to know about a tree.
#[derive(Debug, Default)]
struct TreeSurvey {
    files: Vec<String>,
    has_subdirectory: bool,
}

pub fn score(root: &Path) -> Result<ScoreReport, ScoringError> {
    let survey = survey(root)?;
    let report = rate(&survey);
    debug!(
        root = %root.display(),
        files = survey.files.len(),
        total = report.total,
        "project scored"
    );
    Ok(report)
}

fn survey(root: &Path) -> Result<TreeSurvey, ScoringError> {
    let meta = fs::metadata(root).map_err(|e| ScoringError::input(root, e))?;
    if !meta.is_dir() {
        return Err(ScoringError::input(root, "not a directory"));
    }

    let mut has_subdirectory = false;
    for entry in fs::read_dir(root).map_err(|e| ScoringError::input(root, e))? {
        let entry = entry.map_err(|e| ScoringError::input(root, e))?;
        if entry.path().is_dir() {
            has_subdirectory = true;
            break;
        }
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(root).min_depth(1) {
        let entry = entry.map_err(|e| ScoringError::input(root, e))?;
        if !entry.file_type().is_file() {
            continue;
        }
        if let Ok(rel) = entry.path().strip_prefix(root) {
            files.push(to_slash(rel));
        }
    }

    Ok(TreeSurvey {
        files,
        has_subdirectory,
    })
}

fn rate(survey: &TreeSurvey) -> ScoreReport {
    let lowered: Vec<String> = survey.files.iter().map(|f| f.to_lowercase()).collect();
    let any_contains = |needle: &str| lowered.iter().any(|f| f.contains(needle));

    ScoreReport::from_parts([
        (
            Category::CodeDiversity,
            code_diversity(distinct_extensions(&survey.files)),
        ),
        (
            Category::Documentation,
            if any_contains("readme") { 20 } else { 0 },
        ),
        (
            Category::FileStructure,
            if survey.has_subdirectory { 15 } else { 5 },
        ),
        (Category::Tests, if any_contains("test") { 20 } else { 0 }),
        (Category::Complexity, complexity(survey.files.len())),
    ])
}

/// `.py`, `.PY` and `""` (no extension) all count separately.
fn distinct_extensions(files: &[String]) -> usize {
    files
        .iter()
        .map(|f| extension_of(f))
        .collect::<BTreeSet<_>>()
        .len()
}

/// Suffix from the last `.` of the basename, dot included. Leading dots
/// never start an extension, so `.gitignore` and `..foo` have none while
/// `file.` has `"."`.
fn extension_of(path: &str) -> &str {
    let base = path.rsplit('/').next().unwrap_or(path);
    let name = base.trim_start_matches('.');
    name.rfind('.').map_or("", |i| &name[i..])
}

fn code_diversity(distinct: usize) -> i32 {
    match distinct {
        0 => 0,
        1 => 10,
        2 => 15,
        _ => 20,
    }
}

// Mid-sized projects intentionally outscore large ones.
fn complexity(file_count: usize) -> i32 {
    match file_count {
        0..=4 => 5,
        5..=19 => 15,
        _ => 10,
    }
}
