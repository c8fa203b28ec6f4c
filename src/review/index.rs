//! Plan index: enumerate review areas and map plan ids to file paths.
//!
//! Also hosts plan id validation and generation and title slugification
//! for plan filenames.

use crate::context::ReviewContext;
use crate::error::{Result, WardenError};
use regex::Regex;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Regex pattern for valid plan ids.
static PLAN_ID_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^plan-\d{3,}$").expect("plan id regex must compile"));

/// Longest slug kept in a plan filename.
const MAX_SLUG_LEN: usize = 40;

/// Review areas a plan document can live in. The area always mirrors the
/// plan's status: open plans sit in `review`, decided plans in their
/// terminal area.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanArea {
    Review,
    Approved,
    Rejected,
}

impl PlanArea {
    /// Scan order; later areas win when a crash left a duplicate, since
    /// the relocation protocol writes the destination before removing
    /// the source.
    pub const ALL: &[PlanArea] = &[PlanArea::Review, PlanArea::Approved, PlanArea::Rejected];

    pub fn as_str(&self) -> &'static str {
        match self {
            PlanArea::Review => "review",
            PlanArea::Approved => "approved",
            PlanArea::Rejected => "rejected",
        }
    }

    pub fn dir(&self, ctx: &ReviewContext) -> PathBuf {
        match self {
            PlanArea::Review => ctx.review_dir(),
            PlanArea::Approved => ctx.approved_dir(),
            PlanArea::Rejected => ctx.rejected_dir(),
        }
    }
}

impl std::fmt::Display for PlanArea {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Information about one plan on disk.
#[derive(Debug, Clone)]
pub struct PlanEntry {
    /// The plan id (e.g., "plan-001").
    pub id: String,

    /// The area the plan is in.
    pub area: PlanArea,

    /// The full path to the plan file.
    pub path: PathBuf,

    /// The numeric part of the plan id.
    pub number: u32,
}

/// Index of all plans across the review areas.
#[derive(Debug, Default)]
pub struct PlanIndex {
    plans: HashMap<String, PlanEntry>,
    max_number: u32,
}

impl PlanIndex {
    /// Build an index by scanning every review area.
    ///
    /// Files are matched by the pattern `plan-{number}[-{slug}].md`;
    /// everything else is ignored. Missing area directories read as empty.
    pub fn build(ctx: &ReviewContext) -> Result<Self> {
        let mut index = PlanIndex::default();

        for &area in PlanArea::ALL {
            let dir = area.dir(ctx);
            if !dir.exists() {
                continue;
            }

            let entries = fs::read_dir(&dir).map_err(|e| {
                WardenError::UserError(format!(
                    "Failed to read review area '{}': {}",
                    dir.display(),
                    e
                ))
            })?;

            for entry in entries {
                let entry = entry.map_err(|e| {
                    WardenError::UserError(format!("Failed to read directory entry: {}", e))
                })?;
                let path = entry.path();

                if path.extension().and_then(|e| e.to_str()) != Some("md") {
                    continue;
                }

                if let Some(id) = extract_plan_id_from_filename(&path)
                    && let Some(number) = extract_plan_number(&id)
                {
                    index.plans.insert(
                        id.clone(),
                        PlanEntry {
                            id,
                            area,
                            path,
                            number,
                        },
                    );

                    if number > index.max_number {
                        index.max_number = number;
                    }
                }
            }
        }

        Ok(index)
    }

    /// The next unused plan number.
    pub fn next_number(&self) -> u32 {
        self.max_number + 1
    }

    /// Find a plan by id, tolerating case differences.
    pub fn find(&self, plan_id: &str) -> Option<&PlanEntry> {
        self.plans.get(&plan_id.to_lowercase())
    }

    /// All plans in one area.
    pub fn plans_in_area(&self, area: PlanArea) -> Vec<&PlanEntry> {
        self.plans.values().filter(|p| p.area == area).collect()
    }

    /// All plans ordered by number.
    pub fn sorted_plans(&self) -> Vec<&PlanEntry> {
        let mut plans: Vec<&PlanEntry> = self.plans.values().collect();
        plans.sort_by_key(|p| p.number);
        plans
    }

    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }
}

/// Extract the plan id from a filename of the form `plan-{number}[-{slug}].md`.
fn extract_plan_id_from_filename(path: &Path) -> Option<String> {
    let filename = path.file_stem()?.to_str()?;
    let rest = filename.strip_prefix("plan-")?;

    let number_part = match rest.find('-') {
        Some(end) => &rest[..end],
        None => rest,
    };

    if number_part.is_empty() || !number_part.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    Some(format!("plan-{}", number_part))
}

/// Extract the numeric part from a plan id.
fn extract_plan_number(plan_id: &str) -> Option<u32> {
    plan_id.strip_prefix("plan-")?.parse().ok()
}

/// Validate a plan id, rejecting path traversal and bad formats.
///
/// Returns the normalized (lowercase) id.
pub fn validate_plan_id(plan_id: &str) -> Result<String> {
    if plan_id.contains('/') || plan_id.contains('\\') || plan_id.contains("..") {
        return Err(WardenError::UserError(format!(
            "Invalid plan id '{}': contains path separators.\n\
             Plan ids look like plan-001.",
            plan_id
        )));
    }

    let normalized = plan_id.to_lowercase();

    if !PLAN_ID_REGEX.is_match(&normalized) {
        return Err(WardenError::UserError(format!(
            "Invalid plan id '{}': expected the format plan-NNN (e.g., plan-001).",
            plan_id
        )));
    }

    Ok(normalized)
}

/// Generate a plan id from a number, zero-padded to at least 3 digits.
pub fn generate_plan_id(number: u32) -> String {
    format!("plan-{:03}", number)
}

/// Slugify a title for use in a plan filename: lowercase alphanumerics
/// joined by single hyphens, truncated to a sane length.
pub fn slugify_title(title: &str) -> String {
    let mut slug = String::new();
    let mut last_was_hyphen = false;

    for c in title.chars() {
        if slug.len() >= MAX_SLUG_LEN {
            break;
        }
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_was_hyphen = false;
        } else if !last_was_hyphen && !slug.is_empty() {
            slug.push('-');
            last_was_hyphen = true;
        }
    }

    while slug.ends_with('-') {
        slug.pop();
    }

    slug
}

/// Filename for a new plan: `plan-NNN-{slug}.md`, or `plan-NNN.md` when
/// the title slugifies to nothing.
pub fn plan_file_name(plan_id: &str, title: &str) -> String {
    let slug = slugify_title(title);
    if slug.is_empty() {
        format!("{}.md", plan_id)
    } else {
        format!("{}-{}.md", plan_id, slug)
    }
}
