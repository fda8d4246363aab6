//! Trailer lookup across an ordered list of providers, and download.

use std::path::{Path, PathBuf};

use crate::diag::Diagnostics;
use crate::error::{Error, Result};
use crate::media::MediaItem;
use crate::resolve::Chooser;
use crate::sidecar::MovieRecord;

/// Extensions kept when naming a downloaded trailer.
const TRAILER_EXTENSIONS: &[&str] = &["flv", "mp4", "m4v", "mov", "webm", "mkv"];
const DEFAULT_TRAILER_EXTENSION: &str = "mp4";

/// A movie page found at a trailer provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrailerHit {
    pub title: String,
    pub year: Option<i32>,
    pub url: String,
}

impl TrailerHit {
    pub fn label(&self) -> String {
        match self.year {
            Some(year) => format!("{} ({}) - {}", self.title, year, self.url),
            None => format!("{} - {}", self.title, self.url),
        }
    }
}

/// How a provider's first search hit may be accepted without asking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectPolicy {
    /// Take the first hit if its title equals (ignoring case) and the year matches
    ExactTitleYear,
    AlwaysAsk,
}

/// A site trailers can be found on.
pub trait TrailerSource {
    fn name(&self) -> &str;

    fn policy(&self) -> SelectPolicy;

    fn search(&self, title: &str) -> Result<Vec<TrailerHit>>;

    /// Trailer page URLs for a search hit.
    fn trailer_urls(&self, hit: &TrailerHit) -> Result<Vec<String>>;

    /// Whether `trailer_url` points at this provider.
    fn handles(&self, trailer_url: &str) -> bool;

    /// Direct media URL behind a trailer page.
    fn media_url(&self, trailer_url: &str) -> Result<String>;
}

/// Fetches a URL into a file.
pub trait Download {
    /// Returns the number of bytes written.
    fn download(&self, url: &str, dest: &Path) -> Result<u64>;
}

/// Runs trailer lookups against providers in order until one yields a URL.
pub struct TrailerFinder<'a> {
    sources: Vec<&'a dyn TrailerSource>,
    chooser: &'a dyn Chooser,
}

impl<'a> TrailerFinder<'a> {
    pub fn new(sources: Vec<&'a dyn TrailerSource>, chooser: &'a dyn Chooser) -> Self {
        Self { sources, chooser }
    }

    /// Find a trailer page for the item and store it on the record.
    ///
    /// Returns true when a new URL was recorded.
    pub fn lookup(&self, item: &mut MediaItem, use_alternate: bool, diag: &dyn Diagnostics) -> bool {
        if let Some(url) = item.record.as_ref().and_then(|r| r.trailer_url.as_deref()) {
            diag.info(&format!("  Trailer URL already exists: {url}"));
            return false;
        }

        let mut title = item.title().to_string();
        if use_alternate {
            if let Some(aka) = item.record.as_ref().and_then(|r| r.alternate_title.clone()) {
                title = aka;
            }
        }
        let year = item.year();

        let found = self
            .sources
            .iter()
            .find_map(|source| self.search_source(*source, &title, year, diag));
        let Some(url) = found else {
            diag.debug(&format!("  Found no trailer for: '{}' (yr: {})", title, year_label(year)));
            return false;
        };

        let record = item.record.get_or_insert_with(|| MovieRecord {
            title: item.guessed_title.clone(),
            year: item.guessed_year,
            ..Default::default()
        });
        record.trailer_url = Some(url);
        item.new_info = true;
        true
    }

    fn search_source(
        &self,
        source: &dyn TrailerSource,
        title: &str,
        year: Option<i32>,
        diag: &dyn Diagnostics,
    ) -> Option<String> {
        let name = source.name();
        diag.info(&format!("  Searching {} for: '{}' (yr: {})", name, title, year_label(year)));

        let hits = match source.search(title) {
            Ok(hits) => hits,
            Err(e) => {
                diag.warn(&format!("  {name} search failed: {e}"));
                return None;
            }
        };
        if hits.is_empty() {
            diag.debug(&format!("  {} has no search results for: '{}'", name, title));
            return None;
        }

        let exact = source.policy() == SelectPolicy::ExactTitleYear
            && year.is_some()
            && hits[0].year == year
            && hits[0].title.to_lowercase() == title.to_lowercase();
        let selection = if exact {
            diag.debug(&format!("  First result is exact match: {}", hits[0].label()));
            Some(0)
        } else {
            diag.debug(&format!("  No exact {name} match found, prompting user"));
            let labels: Vec<String> = hits.iter().map(TrailerHit::label).collect();
            self.chooser.choose(&format!("Please select the correct {name} entry"), &labels)
        };
        let Some(hit) = selection.and_then(|i| hits.get(i)) else {
            diag.debug(&format!("  {} has no entry for: '{}'", name, title));
            return None;
        };

        let urls = match source.trailer_urls(hit) {
            Ok(urls) => urls,
            Err(e) => {
                diag.warn(&format!("  {name} trailer list failed: {e}"));
                return None;
            }
        };
        match main_trailer(&urls) {
            Some(index) => Some(urls[index].clone()),
            None if urls.is_empty() => None,
            None => {
                diag.info("  Main trailer not found, prompting user");
                let index = self.chooser.choose("Please select the trailer", &urls)?;
                urls.get(index).cloned()
            }
        }
    }

    /// Download the recorded trailer next to the first media file.
    ///
    /// `dir` is where the item lives now, which differs from `item.path`
    /// after a directory rename. Provider failures are reported and skipped.
    pub fn download(
        &self,
        item: &MediaItem,
        dir: &Path,
        downloader: &dyn Download,
        diag: &dyn Diagnostics,
    ) -> Result<Option<PathBuf>> {
        if let Some(existing) = &item.trailer {
            diag.info(&format!("  Trailer already found: {}", dir.join(existing).display()));
            return Ok(None);
        }
        let Some(url) = item.record.as_ref().and_then(|r| r.trailer_url.as_deref()) else {
            diag.info(&format!("  TrailerUrl not found for: {}", item.title()));
            return Ok(None);
        };
        let first = item
            .plan
            .as_ref()
            .and_then(|p| p.file_names.first())
            .or_else(|| item.files.first());
        let Some(first) = first else {
            diag.warn(&format!("  No video file to name the trailer after in: {}", dir.display()));
            return Ok(None);
        };
        let Some(source) = self.sources.iter().find(|s| s.handles(url)) else {
            diag.warn(&format!("  No provider can download: {url}"));
            return Ok(None);
        };

        let media_url = match source.media_url(url) {
            Ok(media_url) => media_url,
            Err(e) => {
                diag.warn(&format!("  Could not resolve trailer stream for {url}: {e}"));
                return Ok(None);
            }
        };

        let path = dir.join(trailer_file_name(first, &media_url));
        if path.exists() {
            diag.warn(&format!("  Filepath already exists: {}", path.display()));
            return Ok(None);
        }

        diag.info(&format!("  Downloading trailer to: {}", path.display()));
        match downloader.download(&media_url, &path) {
            Ok(_) => Ok(Some(path)),
            Err(e @ Error::Io(_)) => Err(e),
            Err(e) => {
                diag.warn(&format!("  Trailer download failed: {e}"));
                Ok(None)
            }
        }
    }
}

fn year_label(year: Option<i32>) -> String {
    year.map_or_else(|| "NA".to_string(), |y| y.to_string())
}

/// Index of the main trailer: the only URL, else the one ending "/trailer".
pub fn main_trailer(urls: &[String]) -> Option<usize> {
    if urls.len() == 1 {
        return Some(0);
    }
    urls.iter().position(|u| u.trim_end_matches('/').ends_with("/trailer"))
}

/// "<stem of first media file without .part1>-trailer.<ext>".
pub fn trailer_file_name(first_media: &str, media_url: &str) -> String {
    let name = first_media.replacen(".part1", "", 1);
    let stem = name.rsplit_once('.').map_or(name.as_str(), |(stem, _)| stem);
    let extension = reqwest::Url::parse(media_url)
        .ok()
        .and_then(|url| {
            Path::new(url.path())
                .extension()
                .map(|e| e.to_string_lossy().to_lowercase())
        })
        .filter(|e| TRAILER_EXTENSIONS.contains(&e.as_str()))
        .unwrap_or_else(|| DEFAULT_TRAILER_EXTENSION.to_string());
    format!("{stem}-trailer.{extension}")
}
