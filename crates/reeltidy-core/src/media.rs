use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::plan::RenamePlan;
use crate::sidecar::MovieRecord;

/// How far an item has progressed through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Only filename-derived values are known
    Guess,
    /// A canonical record exists
    Resolved,
    /// Target names have been computed
    Planned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SubtitleKind {
    Srt,
    /// VobSub index; always travels with its `.sub` companion
    Idx,
}

/// A usable subtitle file, relative to the item directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Subtitle {
    pub path: PathBuf,
    pub kind: SubtitleKind,
    /// The `.sub` file paired with an `.idx`
    pub companion: Option<PathBuf>,
}

impl Subtitle {
    /// Lower-cased extension the renamed file keeps.
    pub fn extension(&self) -> &'static str {
        match self.kind {
            SubtitleKind::Srt => "srt",
            SubtitleKind::Idx => "idx",
        }
    }
}

/// One movie directory on disk, as seen during a single pass.
#[derive(Debug, Clone)]
pub struct MediaItem {
    /// Directory holding the movie
    pub path: PathBuf,
    /// Last path component of `path`
    pub dir_name: String,
    /// Media file names, sorted ascending
    pub files: Vec<String>,
    /// One subtitle per media file, or None when the counts disagree
    pub subtitles: Option<Vec<Subtitle>>,
    /// True if any subtitle-looking file was seen, usable or not
    pub subs_found: bool,
    /// First `.nfo` file name in the directory
    pub sidecar: Option<String>,
    /// Existing trailer file name
    pub trailer: Option<String>,
    pub guessed_title: String,
    pub guessed_year: Option<i32>,
    /// Rip-quality markers found in the media file names
    pub tags: BTreeSet<String>,
    /// Resolved metadata
    pub record: Option<MovieRecord>,
    /// Set when `record` carries something the sidecar does not
    pub new_info: bool,
    pub plan: Option<RenamePlan>,
}

impl MediaItem {
    /// A fresh item with nothing resolved yet.
    pub fn new(path: PathBuf) -> Self {
        let dir_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            path,
            dir_name,
            files: Vec::new(),
            subtitles: Some(Vec::new()),
            subs_found: false,
            sidecar: None,
            trailer: None,
            guessed_title: String::new(),
            guessed_year: None,
            tags: BTreeSet::new(),
            record: None,
            new_info: false,
            plan: None,
        }
    }

    pub fn stage(&self) -> Stage {
        if self.plan.is_some() {
            Stage::Planned
        } else if self.record.is_some() {
            Stage::Resolved
        } else {
            Stage::Guess
        }
    }

    /// True when no media file passed the filters.
    pub fn has_no_video(&self) -> bool {
        self.files.is_empty()
    }

    /// Subtitles were seen but none of them can be used.
    pub fn has_subtitle_error(&self) -> bool {
        self.subs_found && !self.subtitles.as_ref().is_some_and(|s| !s.is_empty())
    }

    /// Title used for searching and naming: resolved, else guessed.
    pub fn title(&self) -> &str {
        self.record
            .as_ref()
            .map(|r| r.title.as_str())
            .filter(|t| !t.is_empty())
            .unwrap_or(&self.guessed_title)
    }

    /// Year used for searching and naming: resolved, else guessed.
    pub fn year(&self) -> Option<i32> {
        self.record.as_ref().and_then(|r| r.year).or(self.guessed_year)
    }

    pub fn sidecar_path(&self) -> Option<PathBuf> {
        self.sidecar.as_ref().map(|name| self.path.join(name))
    }

    pub fn file_path(&self, name: &str) -> PathBuf {
        Path::new(&self.path).join(name)
    }
}

impl std::fmt::Display for MediaItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.year() {
            Some(year) => write!(f, "<Movie: {} ({})>", self.title(), year),
            None => write!(f, "<Movie: {}>", self.title()),
        }
    }
}
