//! The per-item `.nfo` metadata file.
//!
//! ```xml
//! <?xml version="1.0" encoding="UTF-8"?>
//! <movie>
//!   <title>Heat</title>
//!   <year>1995</year>
//!   <country>United States of America</country>
//!   <aka>...</aka>
//!   <sourceurl>https://www.imdb.com/title/tt0113277/</sourceurl>
//!   <lastupdated>2024-01-01 12:00:00</lastupdated>
//!   <trailerurl>...</trailerurl>
//! </movie>
//! ```
//!
//! Elements are looked up by name wherever they appear, so older files that
//! wrap `<movie>` in another root still load. Unknown elements are ignored.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use regex::Regex;
use serde::Serialize;

use crate::diag::Diagnostics;
use crate::error::{Error, Result};

pub const SIDECAR_EXTENSION: &str = "nfo";

static IMDB_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"imdb\.com/title/(tt\d+)").unwrap());
static TMDB_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"themoviedb\.org/movie/(\d+)").unwrap());

/// Canonical metadata for one movie.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MovieRecord {
    pub title: String,
    pub year: Option<i32>,
    pub country: Option<String>,
    pub alternate_title: Option<String>,
    pub source_url: Option<String>,
    pub last_updated: Option<String>,
    pub trailer_url: Option<String>,
}

impl MovieRecord {
    /// Fill every absent field from `other`. Present values are kept.
    pub fn fill_missing(&mut self, other: &MovieRecord) {
        if self.title.is_empty() {
            self.title = other.title.clone();
        }
        self.year = self.year.or(other.year);
        fill(&mut self.country, &other.country);
        fill(&mut self.alternate_title, &other.alternate_title);
        fill(&mut self.source_url, &other.source_url);
        fill(&mut self.trailer_url, &other.trailer_url);
    }

    /// True when the record has everything `parse` requires: a title, a year
    /// and a country.
    pub fn is_complete(&self) -> bool {
        !self.title.is_empty()
            && self.year.is_some()
            && self.country.as_deref().is_some_and(|c| !c.is_empty())
    }

    /// True when the two records differ in anything but `last_updated`.
    pub fn differs_from(&self, other: &MovieRecord) -> bool {
        let strip = |r: &MovieRecord| MovieRecord { last_updated: None, ..r.clone() };
        strip(self) != strip(other)
    }

    /// Link back to the metadata source, when one is recorded.
    pub fn source_ref(&self) -> Option<SourceRef> {
        self.source_url.as_deref().and_then(find_source_ref)
    }
}

fn fill(slot: &mut Option<String>, other: &Option<String>) {
    if slot.as_deref().map_or(true, str::is_empty) {
        if let Some(value) = other.as_ref().filter(|v| !v.is_empty()) {
            *slot = Some(value.clone());
        }
    }
}

/// Identifier of a movie at an external metadata source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceRef {
    /// IMDb title id, e.g. "tt0113277"
    Imdb(String),
    /// TMDB movie id
    Tmdb(u64),
}

impl SourceRef {
    pub fn url(&self) -> String {
        match self {
            SourceRef::Imdb(id) => format!("https://www.imdb.com/title/{id}/"),
            SourceRef::Tmdb(id) => format!("https://www.themoviedb.org/movie/{id}"),
        }
    }
}

/// Find a metadata-source link anywhere in free text.
pub fn find_source_ref(text: &str) -> Option<SourceRef> {
    if let Some(caps) = IMDB_RE.captures(text) {
        return Some(SourceRef::Imdb(caps[1].to_string()));
    }
    TMDB_RE
        .captures(text)
        .and_then(|caps| caps[1].parse().ok())
        .map(SourceRef::Tmdb)
}

/// A sidecar file as found on disk.
#[derive(Debug, Clone)]
pub struct Sidecar {
    /// Raw file content, searched for source links even when invalid
    pub raw: String,
    /// Parsed record, None when the file is malformed or incomplete
    pub record: Option<MovieRecord>,
}

impl Sidecar {
    pub fn load(path: &Path, diag: &dyn Diagnostics) -> Result<Self> {
        let bytes = fs::read(path)?;
        let raw = String::from_utf8_lossy(&bytes).into_owned();
        let record = match parse(&raw) {
            Ok(record) => Some(record),
            Err(e) => {
                diag.warn(&format!("  Invalid NFO file: {}; {}", path.display(), e));
                None
            }
        };
        Ok(Self { raw, record })
    }

    /// Source link from the record, else from the raw text.
    pub fn source_ref(&self) -> Option<SourceRef> {
        self.record
            .as_ref()
            .and_then(MovieRecord::source_ref)
            .or_else(|| find_source_ref(&self.raw))
    }
}

/// Parse sidecar XML. Fails on malformed XML or a missing title, year or country.
pub fn parse(xml: &str) -> Result<MovieRecord> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut fields: HashMap<String, String> = HashMap::new();
    let mut current: Option<String> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                current = Some(String::from_utf8_lossy(e.name().as_ref()).to_lowercase());
            }
            Event::End(_) => current = None,
            Event::Text(e) => {
                if let Some(tag) = current.clone() {
                    let text = e.unescape()?.trim().to_string();
                    fields.entry(tag).or_insert(text);
                }
            }
            Event::CData(e) => {
                if let Some(tag) = current.clone() {
                    let text = String::from_utf8_lossy(e.as_ref()).trim().to_string();
                    fields.entry(tag).or_insert(text);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    let mut take = |name: &str| fields.remove(name).filter(|v| !v.is_empty());

    let title = take("title").ok_or_else(|| Error::Parse("missing <title>".into()))?;
    let year = take("year")
        .ok_or_else(|| Error::Parse("missing <year>".into()))?
        .parse::<i32>()
        .map_err(|e| Error::Parse(format!("bad <year>: {e}")))?;
    let country = take("country").ok_or_else(|| Error::Parse("missing <country>".into()))?;

    Ok(MovieRecord {
        title,
        year: Some(year),
        country: Some(country),
        alternate_title: take("aka"),
        source_url: take("sourceurl"),
        last_updated: take("lastupdated").or_else(|| take("imdbupdate")),
        trailer_url: take("trailerurl"),
    })
}

/// Serialize a record. Text is escaped by the XML writer.
pub fn to_xml(record: &MovieRecord) -> Result<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    writer.write_event(Event::Start(BytesStart::new("movie")))?;

    let year = record.year.map(|y| y.to_string());
    let fields = [
        ("title", Some(&record.title).filter(|t| !t.is_empty())),
        ("year", year.as_ref()),
        ("country", record.country.as_ref()),
        ("aka", record.alternate_title.as_ref()),
        ("sourceurl", record.source_url.as_ref()),
        ("lastupdated", record.last_updated.as_ref()),
        ("trailerurl", record.trailer_url.as_ref()),
    ];
    for (tag, value) in fields {
        if let Some(value) = value {
            writer
                .create_element(tag)
                .write_text_content(BytesText::new(value))?;
        }
    }

    writer.write_event(Event::End(BytesEnd::new("movie")))?;
    let mut xml = String::from_utf8(writer.into_inner()).map_err(|e| Error::Parse(e.to_string()))?;
    xml.push('\n');
    Ok(xml)
}

/// Write a record to `path`, replacing any existing file.
pub fn save(path: &Path, record: &MovieRecord) -> Result<()> {
    let xml = to_xml(record)?;
    let temp_path = path.with_extension("nfo.tmp");

    // Write to temp file first, then rename over the target
    fs::write(&temp_path, xml)?;
    fs::rename(&temp_path, path)?;
    Ok(())
}
