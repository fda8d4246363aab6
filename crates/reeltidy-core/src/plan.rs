//! Target names for a movie directory and its files.
//!
//! Directory names stay human readable ("Matrix (1999)"); file prefixes are
//! dotted and lower case ("matrix.(1999)"). Both start from the same cleaned
//! title.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::media::MediaItem;
use crate::normalize::{
    collapse_repeats, remove_characters, replace_substrings, strip_leading_stop_word,
    FORBIDDEN_PATH_CHARS, INVALID_CHARS, REPLACE_TABLE, STOP_WORDS,
};

/// Prefix used when nothing printable survives cleaning.
const FALLBACK_PREFIX: &str = "movie";

/// Computed target names. `file_names[i]` belongs to `item.files[i]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenamePlan {
    pub dir_name: String,
    pub file_prefix: String,
    pub file_names: Vec<String>,
}

impl RenamePlan {
    pub fn sidecar_name(&self) -> String {
        format!("{}.{}", self.file_prefix, crate::sidecar::SIDECAR_EXTENSION)
    }
}

/// Compute the plan for an item and store it on the item.
pub fn plan_item(item: &mut MediaItem, use_alternate: bool) -> RenamePlan {
    let file_prefix = plan_file_prefix(item, use_alternate);
    let plan = RenamePlan {
        dir_name: plan_dir_name(item, use_alternate),
        file_names: plan_file_names(&file_prefix, &item.files, &item.tags),
        file_prefix,
    };
    item.plan = Some(plan.clone());
    plan
}

/// Title the names are built from, and whether it is the alternate title.
fn base_title(item: &MediaItem, use_alternate: bool) -> (&str, bool) {
    if use_alternate {
        let alternate = item
            .record
            .as_ref()
            .and_then(|r| r.alternate_title.as_deref())
            .filter(|t| !t.trim().is_empty());
        if let Some(alternate) = alternate {
            return (alternate, true);
        }
    }
    (item.title(), false)
}

fn trim_name(text: &str) -> &str {
    text.trim_matches(|c: char| c == '.' || c.is_whitespace())
}

/// Substitutions, invalid characters, one leading stop word, doubled dots.
fn clean_title(title: &str) -> String {
    let replaced = replace_substrings(title, REPLACE_TABLE);
    let removed: String = remove_characters(&replaced, INVALID_CHARS)
        .chars()
        .filter(|c| !c.is_control())
        .collect();
    let stripped = strip_leading_stop_word(removed.trim(), STOP_WORDS);
    trim_name(&collapse_repeats(&stripped, '.')).to_string()
}

/// Raw directory name minus characters no path may hold.
fn fallback_name(dir_name: &str) -> String {
    let removed: String = remove_characters(dir_name, FORBIDDEN_PATH_CHARS)
        .chars()
        .filter(|c| !c.is_control())
        .collect();
    trim_name(&removed).to_string()
}

/// Directory name: cleaned title plus "(year)", "(country)" or "(country-year)".
///
/// Country only appears when the alternate title is used. If the title cleans
/// down to nothing the raw directory name is used instead.
pub fn plan_dir_name(item: &MediaItem, use_alternate: bool) -> String {
    let (title, alternate_used) = base_title(item, use_alternate);
    let mut base = clean_title(title);
    if base.is_empty() {
        base = fallback_name(&item.dir_name);
    }
    if base.is_empty() {
        return item.dir_name.clone();
    }

    let country = item
        .record
        .as_ref()
        .and_then(|r| r.country.as_deref())
        .map(fallback_name)
        .filter(|c| !c.is_empty());

    match (alternate_used, country, item.year()) {
        (true, Some(country), Some(year)) => format!("{base} ({country}-{year})"),
        (true, Some(country), None) => format!("{base} ({country})"),
        (_, _, Some(year)) => format!("{base} ({year})"),
        _ => base,
    }
}

/// File prefix: cleaned title, dotted and lower-cased, plus ".(year)".
pub fn plan_file_prefix(item: &MediaItem, use_alternate: bool) -> String {
    let (title, _) = base_title(item, use_alternate);
    let dotted = |text: &str| {
        let spaced = text.replace(char::is_whitespace, ".");
        trim_name(&collapse_repeats(&spaced, '.')).to_lowercase()
    };

    let mut prefix = dotted(&clean_title(title));
    if prefix.is_empty() {
        prefix = dotted(&fallback_name(&item.dir_name));
    }
    if prefix.is_empty() {
        prefix = FALLBACK_PREFIX.to_string();
    }
    match item.year() {
        Some(year) => format!("{prefix}.({year})"),
        None => prefix,
    }
}

/// New names for `files`, in the same order.
///
/// Two or more files get a 1-based ".partN"; tags are appended sorted and
/// dot-joined after a "-"; the extension is kept, lower-cased.
pub fn plan_file_names(prefix: &str, files: &[String], tags: &BTreeSet<String>) -> Vec<String> {
    let include_count = files.len() >= 2;
    let tag_suffix = tags.iter().map(String::as_str).collect::<Vec<_>>().join(".");

    files
        .iter()
        .enumerate()
        .map(|(i, file)| {
            let mut name = prefix.to_string();
            if include_count {
                name.push_str(&format!(".part{}", i + 1));
            }
            if !tag_suffix.is_empty() {
                name.push('-');
                name.push_str(&tag_suffix);
            }
            if let Some((_, ext)) = file.rsplit_once('.') {
                name.push('.');
                name.push_str(&ext.to_lowercase());
            }
            name
        })
        .collect()
}
