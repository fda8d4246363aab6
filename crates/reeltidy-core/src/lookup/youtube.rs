use std::sync::LazyLock;

use regex::Regex;

use super::HttpClient;
use crate::error::{Error, Result};
use crate::trailer::{SelectPolicy, TrailerHit, TrailerSource};

const SEARCH_URL: &str = "https://www.youtube.com/results";
const WATCH_URL: &str = "https://www.youtube.com/watch";

static RESULT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""videoRenderer":\{"videoId":"([\w-]{11})".*?"title":\{"runs":\[\{"text":"((?:[^"\\]|\\.)*)""#)
        .unwrap()
});
static VIDEO_ID_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[?&]v=([\w-]{11})").unwrap());
static STREAM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""url":"(https:(?:[^"\\]|\\.)*?googlevideo\.com(?:[^"\\]|\\.)*?videoplayback(?:[^"\\]|\\.)*)""#)
        .unwrap()
});

/// YouTube scraper. Hits carry no year, so the user always picks.
pub struct YouTube<'a> {
    http: &'a HttpClient,
}

impl<'a> YouTube<'a> {
    pub fn new(http: &'a HttpClient) -> Self {
        Self { http }
    }
}

impl TrailerSource for YouTube<'_> {
    fn name(&self) -> &str {
        "YouTube"
    }

    fn policy(&self) -> SelectPolicy {
        SelectPolicy::AlwaysAsk
    }

    fn search(&self, title: &str) -> Result<Vec<TrailerHit>> {
        let query = format!("{title} trailer");
        let html = self.http.get_text(SEARCH_URL, &[("search_query", query.as_str())])?;
        Ok(parse_results(&html))
    }

    fn trailer_urls(&self, hit: &TrailerHit) -> Result<Vec<String>> {
        Ok(vec![hit.url.clone()])
    }

    fn handles(&self, trailer_url: &str) -> bool {
        trailer_url.contains("youtube.com") || trailer_url.contains("youtu.be")
    }

    fn media_url(&self, trailer_url: &str) -> Result<String> {
        let id = video_id(trailer_url).ok_or_else(|| Error::Parse(format!("no video id in {trailer_url}")))?;
        let page = self.http.get_text(WATCH_URL, &[("v", id.as_str())])?;
        parse_stream_url(&page).ok_or_else(|| Error::Parse(format!("no unprotected stream for {trailer_url}")))
    }
}

/// Decode a JSON string body, falling back to the raw text.
fn unescape_json(raw: &str) -> String {
    serde_json::from_str::<String>(&format!("\"{raw}\"")).unwrap_or_else(|_| raw.to_string())
}

/// Video results from a search page, duplicates dropped.
pub fn parse_results(html: &str) -> Vec<TrailerHit> {
    let mut hits: Vec<TrailerHit> = Vec::new();
    for caps in RESULT_RE.captures_iter(html) {
        let url = format!("{WATCH_URL}?v={}", &caps[1]);
        if hits.iter().any(|h| h.url == url) {
            continue;
        }
        hits.push(TrailerHit {
            title: unescape_json(&caps[2]),
            year: None,
            url,
        });
    }
    hits
}

pub fn video_id(url: &str) -> Option<String> {
    VIDEO_ID_RE.captures(url).map(|caps| caps[1].to_string())
}

/// First directly downloadable stream on a watch page.
pub fn parse_stream_url(page: &str) -> Option<String> {
    STREAM_RE.captures(page).map(|caps| unescape_json(&caps[1]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_results() {
        let html = concat!(
            r#"{"videoRenderer":{"videoId":"abcdefghijk","thumbnail":{},"title":{"runs":[{"text":"The Terminal \"Official\" Trailer"}]}},"#,
            r#"{"videoRenderer":{"videoId":"ZYXWVUT-_12","title":{"runs":[{"text":"Terminal & more"}]}},"#,
            r#"{"videoRenderer":{"videoId":"abcdefghijk","title":{"runs":[{"text":"dup"}]}}"#,
        );
        let hits = parse_results(html);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].title, "The Terminal \"Official\" Trailer");
        assert_eq!(hits[0].url, "https://www.youtube.com/watch?v=abcdefghijk");
        assert_eq!(hits[0].year, None);
        assert_eq!(hits[1].title, "Terminal & more");
    }

    #[test]
    fn test_video_id() {
        assert_eq!(video_id("https://www.youtube.com/watch?v=abcdefghijk").as_deref(), Some("abcdefghijk"));
        assert_eq!(
            video_id("https://www.youtube.com/watch?feature=x&v=ZYXWVUT-_12&t=3").as_deref(),
            Some("ZYXWVUT-_12")
        );
        assert_eq!(video_id("https://www.youtube.com/"), None);
    }

    #[test]
    fn test_parse_stream_url() {
        let page = r#"{"formats":[{"itag":18,"url":"https://rr1---sn.googlevideo.com/videoplayback?expire=1&id=2","mimeType":"video/mp4"}]}"#;
        assert_eq!(
            parse_stream_url(page).as_deref(),
            Some("https://rr1---sn.googlevideo.com/videoplayback?expire=1&id=2")
        );
        assert_eq!(parse_stream_url(r#"{"signatureCipher":"s=abc"}"#), None);
    }
}
