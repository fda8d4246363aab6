use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

use super::HttpClient;
use crate::error::{Error, Result};
use crate::trailer::{SelectPolicy, TrailerHit, TrailerSource};

const BASE_URL: &str = "https://www.traileraddict.com";
const SEARCH_URL: &str = "https://www.traileraddict.com/search.php";
const FLASH_VARS_URL: &str = "https://www.traileraddict.com/fvar.php";

static SEARCH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<a href="(/tags/.+?)">(.*?)</a>.*?\n.*?(\d{4})</span>"#).unwrap());
static VIDEO_NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<param name="movie" value="https?://(?:www\.)?traileraddict\.com/emb/(\d+)">"#).unwrap()
});
static FILE_URL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"fileurl=(.+?\.flv)&").unwrap());
static MARKUP_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());

/// TrailerAddict scraper. Movie pages live under `/tags/<tag>`, their
/// trailers under `/trailer/<tag>/<name>`; the main one is `.../trailer`.
pub struct TrailerAddict<'a> {
    http: &'a HttpClient,
}

impl<'a> TrailerAddict<'a> {
    pub fn new(http: &'a HttpClient) -> Self {
        Self { http }
    }
}

impl TrailerSource for TrailerAddict<'_> {
    fn name(&self) -> &str {
        "TrailerAddict"
    }

    fn policy(&self) -> SelectPolicy {
        SelectPolicy::ExactTitleYear
    }

    fn search(&self, title: &str) -> Result<Vec<TrailerHit>> {
        let html = self.http.get_text(SEARCH_URL, &[("q", title)])?;
        Ok(parse_search(&html))
    }

    fn trailer_urls(&self, hit: &TrailerHit) -> Result<Vec<String>> {
        let tag = hit.url.trim_end_matches('/').rsplit('/').next().unwrap_or_default();
        let html = self.http.get_text(&hit.url, &[])?;
        parse_trailer_links(&html, tag)
    }

    fn handles(&self, trailer_url: &str) -> bool {
        trailer_url.contains("traileraddict.com")
    }

    fn media_url(&self, trailer_url: &str) -> Result<String> {
        let page = self.http.get_text(trailer_url, &[])?;
        let number = parse_video_number(&page)
            .ok_or_else(|| Error::Parse(format!("no video id on {trailer_url}")))?;
        let vars = self.http.get_text(FLASH_VARS_URL, &[("tid", number.as_str())])?;
        parse_file_url(&vars).ok_or_else(|| Error::Parse(format!("no video file for {trailer_url}")))
    }
}

/// Search hits in page order.
pub fn parse_search(html: &str) -> Vec<TrailerHit> {
    SEARCH_RE
        .captures_iter(html)
        .map(|caps| TrailerHit {
            title: MARKUP_RE.replace_all(&caps[2], "").trim().to_string(),
            year: caps[3].parse().ok(),
            url: format!("{BASE_URL}{}", &caps[1]),
        })
        .collect()
}

/// Distinct trailer links for one movie tag, sorted.
pub fn parse_trailer_links(html: &str, tag: &str) -> Result<Vec<String>> {
    let pattern = format!(r#"<a href="(/trailer/{}/.*?)">.*?</a>"#, regex::escape(tag));
    let re = Regex::new(&pattern).map_err(|e| Error::Parse(e.to_string()))?;
    let links: BTreeSet<String> = re
        .captures_iter(html)
        .map(|caps| format!("{BASE_URL}{}", &caps[1]))
        .collect();
    Ok(links.into_iter().collect())
}

pub fn parse_video_number(html: &str) -> Option<String> {
    VIDEO_NUMBER_RE.captures(html).map(|caps| caps[1].to_string())
}

pub fn parse_file_url(vars: &str) -> Option<String> {
    FILE_URL_RE.captures(vars).map(|caps| caps[1].to_string())
}
