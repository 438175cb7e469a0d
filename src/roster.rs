//! Reference-image roster.
//!
//! Registered people live on disk as
//! `database/{category}/{person}/{photo}.jpg` (current layout) or
//! `database/{category}/{person}.jpg` (legacy flat layout). There is no
//! database row for a person: the folder name is the identity, and the
//! display name is recovered by stripping trailing capture-timestamp tokens.

use anyhow::{Context, Result};
use regex::Regex;
use std::path::{Component, Path, PathBuf};
use std::sync::OnceLock;

use crate::roles::RoleCategory;

const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_lowercase();
            IMAGE_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Recover a display name from a file or folder name.
///
/// Capture tooling appends `_`-separated numeric timestamps to names
/// (`Carlos_Perez_20240101_103000`). Tokens that are all digits are dropped,
/// the rest are title-cased and joined with spaces. A name that is nothing
/// but digits keeps its first token.
pub fn display_name(file_name: &str) -> String {
    let stem = Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file_name);

    let tokens: Vec<&str> = stem.split('_').collect();
    let kept: Vec<String> = tokens
        .iter()
        .filter(|t| !t.is_empty() && !t.chars().all(|c| c.is_ascii_digit()))
        .map(|t| title_case(t))
        .collect();

    if kept.is_empty() {
        title_case(tokens.first().copied().unwrap_or(stem))
    } else {
        kept.join(" ")
    }
}

fn title_case(token: &str) -> String {
    let mut chars = token.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Category of an identity path returned by the recognizer.
///
/// Nested layout puts the category three components up from the photo,
/// the legacy flat layout two components up.
pub fn category_from_path(path: &Path) -> Option<RoleCategory> {
    let parts: Vec<&str> = path
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => part.to_str(),
            _ => None,
        })
        .collect();

    if parts.len() >= 3 {
        if let Some(category) = RoleCategory::from_dir_name(parts[parts.len() - 3]) {
            return Some(category);
        }
    }
    if parts.len() >= 2 {
        return RoleCategory::from_dir_name(parts[parts.len() - 2]);
    }
    None
}

/// Display name of the person an identity path belongs to.
pub fn person_from_path(path: &Path) -> String {
    let parts: Vec<&str> = path
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => part.to_str(),
            _ => None,
        })
        .collect();

    // Nested layout: the person is the photo's parent folder.
    if parts.len() >= 3 && RoleCategory::from_dir_name(parts[parts.len() - 3]).is_some() {
        return display_name(parts[parts.len() - 2]);
    }
    display_name(parts.last().copied().unwrap_or(""))
}

/// Normalize a free-text name into a folder-safe slug (`[a-z0-9_]`).
pub fn normalize_name(name: &str) -> String {
    static INVALID: OnceLock<Regex> = OnceLock::new();
    let invalid = INVALID.get_or_init(|| Regex::new(r"[^a-z0-9_]").expect("static pattern"));
    let lowered = name.trim().to_lowercase().replace(' ', "_");
    invalid.replace_all(&lowered, "").into_owned()
}

#[derive(Clone, Debug)]
pub struct RosterEntry {
    pub name: String,
    pub category: RoleCategory,
    pub image_count: usize,
}

/// Snapshot of the reference database taken at session start.
#[derive(Clone, Debug, Default)]
pub struct Roster {
    entries: Vec<RosterEntry>,
}

impl Roster {
    /// Scan the reference database. A missing directory or category folder
    /// degrades to an empty roster rather than failing: with nothing
    /// registered, every probe resolves to Unauthorized.
    pub fn load(database_dir: &Path) -> Result<Self> {
        let mut entries = Vec::new();

        for category in RoleCategory::ALL {
            let category_dir = database_dir.join(category.dir_name());
            if !category_dir.is_dir() {
                continue;
            }
            let listing = std::fs::read_dir(&category_dir)
                .with_context(|| format!("reading category dir {}", category_dir.display()))?;
            for entry in listing {
                let entry = entry?;
                let path = entry.path();
                if path.is_dir() {
                    let image_count = count_images(&path)?;
                    if image_count > 0 {
                        entries.push(RosterEntry {
                            name: display_name(&entry.file_name().to_string_lossy()),
                            category,
                            image_count,
                        });
                    }
                } else if is_image_file(&path) {
                    // Legacy flat layout: one photo per person.
                    entries.push(RosterEntry {
                        name: display_name(&entry.file_name().to_string_lossy()),
                        category,
                        image_count: 1,
                    });
                }
            }
        }

        entries.sort_by(|a, b| {
            a.category
                .dir_name()
                .cmp(b.category.dir_name())
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[RosterEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn in_category(&self, category: RoleCategory) -> impl Iterator<Item = &RosterEntry> {
        self.entries.iter().filter(move |e| e.category == category)
    }
}

fn count_images(person_dir: &Path) -> Result<usize> {
    let mut count = 0;
    for entry in std::fs::read_dir(person_dir)
        .with_context(|| format!("reading person dir {}", person_dir.display()))?
    {
        let entry = entry?;
        if is_image_file(&entry.path()) {
            count += 1;
        }
    }
    Ok(count)
}

/// Destination path for a newly enrolled reference photo.
pub fn enrollment_path(
    database_dir: &Path,
    category: RoleCategory,
    person_slug: &str,
    file_name: &str,
) -> PathBuf {
    database_dir
        .join(category.dir_name())
        .join(person_slug)
        .join(file_name)
}
