use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::diag::Diagnostics;
use crate::media::{MediaItem, Subtitle, SubtitleKind};

/// Rip-quality markers, checked in this order.
pub const VIDEO_TAGS: &[&str] = &[
    "xvid", "divx", "bdrip", "hdrip", "dvdrip", "dvdscr", "dvd", "r5", "scr", "repack", "ac3",
];

/// Recognized video extensions (lower case, no dot)
pub const VIDEO_EXTENSIONS: &[&str] = &["avi", "iso", "mkv", "mp4", "mpg"];

/// Sub directories searched for subtitles; "" is the item root
pub const SUBTITLE_DIRS: &[&str] = &["", "subs", "subtitles"];

/// Lower-case marker of sample clips
pub const SAMPLE_MARKER: &str = "samp";

/// Lower-case marker of trailer files
pub const TRAILER_MARKER: &str = "-trailer.";

pub const MEGABYTE: u64 = 1024 * 1024;

/// Smallest file accepted as a movie
pub const MIN_VIDEO_BYTES: u64 = 100 * MEGABYTE;

static YEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\[(\-.\s_]([12]\d{3})(?:[\])\-.\s_]|$)").unwrap());

/// Result of looking for subtitles in an item directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtitleScan {
    /// Any `.srt`, `.idx` or `.sub` file was seen
    pub found: bool,
    /// Usable subtitles, or None when their count disagrees with the media count
    pub accepted: Option<Vec<Subtitle>>,
}

/// Build a `MediaItem` from what is on disk.
pub fn scan_item(dir: &Path, min_video_bytes: u64, diag: &dyn Diagnostics) -> io::Result<MediaItem> {
    let mut item = MediaItem::new(dir.to_path_buf());

    item.files = list_media_files(dir, min_video_bytes, diag)?;
    item.sidecar = find_sidecar(dir)?;
    item.trailer = find_trailer(dir)?;

    let subs = list_subtitles(dir, item.files.len(), diag)?;
    item.subs_found = subs.found;
    item.subtitles = subs.accepted;

    item.guessed_title = guess_title(&item.dir_name);
    let names = std::iter::once(item.dir_name.as_str()).chain(item.files.iter().map(String::as_str));
    item.guessed_year = guess_year(names);
    item.tags = extract_tags(item.files.iter().map(String::as_str));

    Ok(item)
}

/// File names in `dir`, sorted. Symlinks are followed; entries that are not
/// valid UTF-8 are skipped.
fn sorted_file_names(dir: &Path) -> io::Result<Vec<String>> {
    let mut names: Vec<String> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| fs::metadata(entry.path()).map(|m| m.is_file()).unwrap_or(false))
        .filter_map(|entry| entry.file_name().into_string().ok())
        .collect();
    names.sort();
    Ok(names)
}

fn extension_lower(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// Movie files: not a sample, large enough, with a video extension.
pub fn list_media_files(dir: &Path, min_bytes: u64, diag: &dyn Diagnostics) -> io::Result<Vec<String>> {
    let mut files = Vec::new();
    for name in sorted_file_names(dir)? {
        if name.to_lowercase().contains(SAMPLE_MARKER) {
            continue;
        }
        let Some(ext) = extension_lower(&name) else {
            continue;
        };
        if !VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            continue;
        }
        let size = fs::metadata(dir.join(&name))?.len();
        if size < min_bytes {
            continue;
        }
        files.push(name);
    }
    if files.is_empty() {
        diag.warn(&format!("  No video files found for: {}", dir.display()));
    }
    Ok(files)
}

/// Subtitles for an item with `media_count` media files.
///
/// `.srt` is always usable, `.idx` only next to a same-stem `.sub`. A `.sub`
/// on its own only counts as "found". When the number of usable subtitles is
/// non-zero and differs from `media_count` the whole set is discarded.
pub fn list_subtitles(dir: &Path, media_count: usize, diag: &dyn Diagnostics) -> io::Result<SubtitleScan> {
    let mut found = false;
    let mut accepted: Vec<Subtitle> = Vec::new();

    for sub_dir in SUBTITLE_DIRS {
        let search_dir = dir.join(sub_dir);
        if !search_dir.is_dir() {
            continue;
        }
        let names = sorted_file_names(&search_dir)?;
        let sub_stems: HashSet<(&str, &str)> = names
            .iter()
            .filter_map(|n| n.rsplit_once('.'))
            .filter(|(_, ext)| ext.eq_ignore_ascii_case("sub"))
            .collect();

        for name in &names {
            let rel = PathBuf::from(sub_dir).join(name);
            match extension_lower(name).as_deref() {
                Some("srt") => {
                    found = true;
                    accepted.push(Subtitle { path: rel, kind: SubtitleKind::Srt, companion: None });
                }
                Some("idx") => {
                    found = true;
                    let stem = &name[..name.len() - 4];
                    let companion = sub_stems.iter().find(|(s, _)| *s == stem);
                    match companion {
                        Some((s, ext)) => accepted.push(Subtitle {
                            path: rel,
                            kind: SubtitleKind::Idx,
                            companion: Some(PathBuf::from(sub_dir).join(format!("{s}.{ext}"))),
                        }),
                        None => diag.warn(&format!("  Subtitle Error: {}", search_dir.join(name).display())),
                    }
                }
                Some("sub") => found = true,
                _ => {}
            }
        }
    }

    accepted.sort_by(|a, b| a.path.cmp(&b.path));
    if !accepted.is_empty() && accepted.len() != media_count {
        diag.warn(&format!(
            "  Mismatch between {} videos and {} subtitles: {}",
            media_count,
            accepted.len(),
            dir.display()
        ));
        return Ok(SubtitleScan { found, accepted: None });
    }
    Ok(SubtitleScan { found, accepted: Some(accepted) })
}

/// First `.nfo` file in the directory.
pub fn find_sidecar(dir: &Path) -> io::Result<Option<String>> {
    Ok(sorted_file_names(dir)?
        .into_iter()
        .find(|name| extension_lower(name).as_deref() == Some("nfo")))
}

/// First file that looks like a downloaded trailer.
pub fn find_trailer(dir: &Path) -> io::Result<Option<String>> {
    Ok(sorted_file_names(dir)?
        .into_iter()
        .find(|name| name.to_lowercase().contains(TRAILER_MARKER)))
}

/// Title guessed from a directory name: text before the first bracket.
///
/// A `[` or `(` at position 0 is ignored; with no usable bracket the whole
/// name is the title.
pub fn guess_title(dir_name: &str) -> String {
    let end = [dir_name.find('['), dir_name.find('(')]
        .into_iter()
        .flatten()
        .filter(|&pos| pos > 0)
        .min();
    match end {
        Some(end) => dir_name[..end].trim().to_string(),
        None => dir_name.to_string(),
    }
}

/// First year token found, checking the names in order.
pub fn guess_year<'a>(names: impl IntoIterator<Item = &'a str>) -> Option<i32> {
    names.into_iter().find_map(|name| {
        YEAR_RE
            .captures(name)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse().ok())
    })
}

/// Union of quality markers across all names.
///
/// A marker found in a name is cut out of it before the next marker is
/// checked, so "dvdrip" never also yields "dvd".
pub fn extract_tags<'a>(names: impl IntoIterator<Item = &'a str>) -> BTreeSet<String> {
    let mut tags = BTreeSet::new();
    for name in names {
        let mut working = name.to_lowercase();
        for tag in VIDEO_TAGS {
            if working.contains(tag) {
                tags.insert(tag.to_string());
                working = working.replace(tag, "");
            }
        }
    }
    tags
}
