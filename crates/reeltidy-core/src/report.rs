//! Read-only listings over a library, for piping into other tools.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::media::MediaItem;
use crate::sidecar::{self, SIDECAR_EXTENSION};

/// What a report lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportKind {
    /// Items without any media file
    NoVideo,
    /// Every sidecar file that does not parse
    BadSidecar,
    /// Items without a sidecar
    NoSidecar,
    /// Items with usable subtitles
    HasSubtitles,
    /// Items without any subtitle file
    NoSubtitles,
    /// Items whose subtitle files cannot be used
    SubtitleErrors,
}

impl ReportKind {
    pub const ALL: [ReportKind; 6] = [
        ReportKind::NoVideo,
        ReportKind::BadSidecar,
        ReportKind::NoSidecar,
        ReportKind::HasSubtitles,
        ReportKind::NoSubtitles,
        ReportKind::SubtitleErrors,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ReportKind::NoVideo => "novideo",
            ReportKind::BadSidecar => "badnfo",
            ReportKind::NoSidecar => "nonfo",
            ReportKind::HasSubtitles => "hassub",
            ReportKind::NoSubtitles => "nosub",
            ReportKind::SubtitleErrors => "suberr",
        }
    }
}

impl FromStr for ReportKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ReportKind::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::Parse(format!("unknown list: {s}")))
    }
}

/// Report lines contributed by one item.
pub fn entries(item: &MediaItem, kind: ReportKind) -> io::Result<Vec<PathBuf>> {
    let listed = match kind {
        ReportKind::NoVideo => item.has_no_video(),
        ReportKind::BadSidecar => return bad_sidecars(&item.path),
        ReportKind::NoSidecar => item.sidecar.is_none(),
        ReportKind::HasSubtitles => item.subtitles.as_ref().is_some_and(|s| !s.is_empty()),
        ReportKind::NoSubtitles => !item.subs_found,
        ReportKind::SubtitleErrors => item.has_subtitle_error(),
    };
    Ok(if listed { vec![item.path.clone()] } else { Vec::new() })
}

/// Every `.nfo` file in `dir` that fails to parse, sorted.
pub fn bad_sidecars(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut bad = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_sidecar = path
            .extension()
            .is_some_and(|e| e.to_string_lossy().eq_ignore_ascii_case(SIDECAR_EXTENSION));
        if !is_sidecar || !path.is_file() {
            continue;
        }
        let text = String::from_utf8_lossy(&fs::read(&path)?).into_owned();
        if sidecar::parse(&text).is_err() {
            bad.push(path);
        }
    }
    bad.sort();
    Ok(bad)
}

/// Join report lines with newlines, or NUL bytes for `xargs -0`.
pub fn join(entries: &[PathBuf], print0: bool) -> String {
    let separator = if print0 { "\0" } else { "\n" };
    entries
        .iter()
        .map(|p| p.to_string_lossy())
        .collect::<Vec<_>>()
        .join(separator)
}
