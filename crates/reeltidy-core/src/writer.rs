//! Applies a rename plan to the filesystem.
//!
//! Every rename goes through [`rename`], which never overwrites: an existing
//! target is reported and skipped. Applying the same plan twice is a no-op.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::diag::Diagnostics;
use crate::error::Result;
use crate::media::MediaItem;
use crate::plan::RenamePlan;
use crate::sidecar;

/// Directory subtitles are gathered into.
pub const SUBTITLE_DIR: &str = "subtitles";

/// What happened to a single rename.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenameOutcome {
    Renamed,
    /// Source and target are the same path
    Unchanged,
    /// Target already exists
    Refused,
}

/// Counts for one item's renames.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenameSummary {
    pub renamed: u64,
    pub refused: u64,
}

impl RenameSummary {
    fn record(&mut self, outcome: RenameOutcome) {
        match outcome {
            RenameOutcome::Renamed => self.renamed += 1,
            RenameOutcome::Refused => self.refused += 1,
            RenameOutcome::Unchanged => {}
        }
    }

    pub fn add(&mut self, other: RenameSummary) {
        self.renamed += other.renamed;
        self.refused += other.refused;
    }
}

/// Rename `src` to `dst` unless `dst` is taken.
pub fn rename(src: &Path, dst: &Path, diag: &dyn Diagnostics) -> io::Result<RenameOutcome> {
    if src == dst {
        return Ok(RenameOutcome::Unchanged);
    }
    // symlink_metadata also catches dangling links
    if fs::symlink_metadata(dst).is_ok() {
        diag.warn(&format!("  Path already exists: {}", dst.display()));
        return Ok(RenameOutcome::Refused);
    }
    diag.info(&format!(">> Renaming: {}", src.display()));
    diag.info(&format!("         to: {}", dst.display()));
    fs::rename(src, dst)?;
    Ok(RenameOutcome::Renamed)
}

/// Rename media files, then the sidecar, then subtitles into `subtitles/`.
///
/// `item.files` and `item.sidecar` are updated for every rename that happened.
pub fn rename_files(item: &mut MediaItem, diag: &dyn Diagnostics) -> io::Result<RenameSummary> {
    let mut summary = RenameSummary::default();
    let Some(plan) = item.plan.clone() else {
        return Ok(summary);
    };

    for (index, new_name) in plan.file_names.iter().enumerate() {
        let Some(current) = item.files.get(index).cloned() else {
            break;
        };
        let outcome = rename(&item.file_path(&current), &item.file_path(new_name), diag)?;
        if outcome == RenameOutcome::Renamed {
            item.files[index] = new_name.clone();
        }
        summary.record(outcome);
    }

    if let Some(current) = item.sidecar.clone() {
        let new_name = plan.sidecar_name();
        let outcome = rename(&item.file_path(&current), &item.file_path(&new_name), diag)?;
        if outcome == RenameOutcome::Renamed {
            item.sidecar = Some(new_name);
        }
        summary.record(outcome);
    }

    summary.add(rename_subtitles(item, &plan, diag)?);
    Ok(summary)
}

fn rename_subtitles(item: &mut MediaItem, plan: &RenamePlan, diag: &dyn Diagnostics) -> io::Result<RenameSummary> {
    let mut summary = RenameSummary::default();
    let Some(subtitles) = item.subtitles.as_mut().filter(|s| !s.is_empty()) else {
        return Ok(summary);
    };

    let target_dir = item.path.join(SUBTITLE_DIR);
    if !target_dir.is_dir() {
        diag.info(&format!(">> Creating directory: {}", target_dir.display()));
        fs::create_dir(&target_dir)?;
    }

    for (subtitle, media_name) in subtitles.iter_mut().zip(&plan.file_names) {
        let stem = media_name.rsplit_once('.').map_or(media_name.as_str(), |(stem, _)| stem);
        let new_path = Path::new(SUBTITLE_DIR).join(format!("{}.{}", stem, subtitle.extension()));

        let outcome = rename(&item.path.join(&subtitle.path), &item.path.join(&new_path), diag)?;
        summary.record(outcome);
        if outcome != RenameOutcome::Renamed {
            continue;
        }
        subtitle.path = new_path;

        if let Some(companion) = subtitle.companion.clone() {
            let new_companion = Path::new(SUBTITLE_DIR).join(format!("{stem}.sub"));
            let outcome = rename(&item.path.join(&companion), &item.path.join(&new_companion), diag)?;
            if outcome == RenameOutcome::Renamed {
                subtitle.companion = Some(new_companion);
            }
            summary.record(outcome);
        }
    }
    Ok(summary)
}

/// Rename the item directory. Returns where the directory now is.
pub fn rename_dir(item: &MediaItem, diag: &dyn Diagnostics) -> io::Result<(PathBuf, RenameOutcome)> {
    let Some(plan) = item.plan.as_ref() else {
        return Ok((item.path.clone(), RenameOutcome::Unchanged));
    };
    let target = item
        .path
        .parent()
        .map_or_else(|| PathBuf::from(&plan.dir_name), |parent| parent.join(&plan.dir_name));

    let outcome = rename(&item.path, &target, diag)?;
    let current = if outcome == RenameOutcome::Renamed {
        target
    } else {
        item.path.clone()
    };
    Ok((current, outcome))
}

/// Write the record as a sidecar when there is none yet or the record changed.
///
/// An existing sidecar is rewritten in place; a new one is named after the
/// planned file prefix. Returns true if a file was written.
pub fn save_sidecar(item: &mut MediaItem, diag: &dyn Diagnostics) -> Result<bool> {
    if item.sidecar.is_some() && !item.new_info {
        diag.debug("  No new info collected, skipping NFO create");
        return Ok(false);
    }
    let Some(record) = item.record.as_ref() else {
        diag.info(&format!("  No metadata to save for: {}", item.dir_name));
        return Ok(false);
    };
    if !record.is_complete() {
        diag.warn(&format!(
            "  Incomplete metadata (title, year and country required), not saving NFO for: {}",
            item.dir_name
        ));
        return Ok(false);
    }

    let name = match (&item.sidecar, &item.plan) {
        (Some(existing), _) => existing.clone(),
        (None, Some(plan)) => plan.sidecar_name(),
        (None, None) => return Ok(false),
    };
    let path = item.file_path(&name);
    diag.info(&format!(">> Saving NFO file: {}", path.display()));
    sidecar::save(&path, record)?;

    item.sidecar = Some(name);
    item.new_info = false;
    Ok(true)
}
