//! TMDB metadata source.
//!
//! Accepts either a v3 API key (sent as `api_key`) or a v4 read access token
//! (sent as a bearer header; these are JWTs and start with "eyJ").

use serde::Deserialize;

use super::HttpClient;
use crate::error::{Error, Result};
use crate::resolve::{Candidate, MetadataSource};
use crate::sidecar::SourceRef;

const API_BASE: &str = "https://api.themoviedb.org/3";

#[derive(Debug, Deserialize)]
struct SearchPage {
    #[serde(default)]
    results: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct FindResult {
    #[serde(default)]
    movie_results: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: u64,
    title: Option<String>,
    original_title: Option<String>,
    release_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MovieDetails {
    id: u64,
    title: Option<String>,
    original_title: Option<String>,
    release_date: Option<String>,
    imdb_id: Option<String>,
    #[serde(default)]
    production_countries: Vec<ProductionCountry>,
    alternative_titles: Option<AlternativeTitles>,
}

#[derive(Debug, Deserialize)]
struct ProductionCountry {
    name: String,
}

#[derive(Debug, Deserialize)]
struct AlternativeTitles {
    #[serde(default)]
    titles: Vec<AlternativeTitle>,
}

#[derive(Debug, Deserialize)]
struct AlternativeTitle {
    title: String,
}

/// TMDB client.
pub struct TmdbSource<'a> {
    http: &'a HttpClient,
    credential: String,
    language: String,
}

impl<'a> TmdbSource<'a> {
    pub fn new(http: &'a HttpClient, credential: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            http,
            credential: credential.into(),
            language: language.into(),
        }
    }

    fn is_access_token(&self) -> bool {
        self.credential.starts_with("eyJ")
    }

    fn fetch<T: serde::de::DeserializeOwned>(&self, path: &str, params: &[(&str, &str)]) -> Result<T> {
        tracing::debug!(path, "TMDB request");
        let mut request = self
            .http
            .get(&format!("{API_BASE}{path}"))
            .query(&[("language", self.language.as_str())])
            .query(params);
        request = if self.is_access_token() {
            request.bearer_auth(&self.credential)
        } else {
            request.query(&[("api_key", self.credential.as_str())])
        };
        self.http.get_json(request)
    }

    fn details(&self, id: u64) -> Result<Option<Candidate>> {
        match self.fetch::<MovieDetails>(&format!("/movie/{id}"), &[("append_to_response", "alternative_titles")]) {
            Ok(details) => Ok(Some(candidate_from_details(details))),
            Err(Error::Status { status: 404, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

impl MetadataSource for TmdbSource<'_> {
    fn search(&self, title: &str, _year: Option<i32>) -> Result<Vec<Candidate>> {
        // No year filter: a wrongly guessed year would hide the right movie
        let page: SearchPage = self.fetch("/search/movie", &[("query", title), ("include_adult", "false")])?;
        Ok(page.results.into_iter().filter_map(candidate_from_search).collect())
    }

    fn lookup(&self, id: &SourceRef) -> Result<Option<Candidate>> {
        match id {
            SourceRef::Tmdb(id) => self.details(*id),
            SourceRef::Imdb(imdb_id) => {
                let found: FindResult =
                    self.fetch(&format!("/find/{imdb_id}"), &[("external_source", "imdb_id")])?;
                match found.movie_results.first() {
                    Some(movie) => self.details(movie.id),
                    None => Ok(None),
                }
            }
        }
    }
}

fn year_of(release_date: Option<&str>) -> Option<i32> {
    release_date.and_then(|d| d.get(..4)).and_then(|y| y.parse().ok())
}

fn nonempty(text: Option<String>) -> Option<String> {
    text.map(|t| t.trim().to_string()).filter(|t| !t.is_empty())
}

fn candidate_from_search(item: SearchItem) -> Option<Candidate> {
    let original = nonempty(item.original_title);
    let title = nonempty(item.title).or_else(|| original.clone())?;
    let alternate_titles = original.filter(|o| *o != title).into_iter().collect();
    let id = SourceRef::Tmdb(item.id);
    Some(Candidate {
        source_url: Some(id.url()),
        id,
        title,
        year: year_of(item.release_date.as_deref()),
        country: None,
        alternate_titles,
    })
}

/// Localized title is canonical; the original title leads the alternates.
fn candidate_from_details(details: MovieDetails) -> Candidate {
    let original = nonempty(details.original_title);
    let title = nonempty(details.title).or_else(|| original.clone()).unwrap_or_default();

    let mut alternate_titles: Vec<String> = Vec::new();
    let others = details
        .alternative_titles
        .map(|a| a.titles)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|t| nonempty(Some(t.title)));
    for alternate in original.into_iter().chain(others) {
        if alternate != title && !alternate_titles.contains(&alternate) {
            alternate_titles.push(alternate);
        }
    }

    let id = SourceRef::Tmdb(details.id);
    let source_url = match nonempty(details.imdb_id) {
        Some(imdb_id) => SourceRef::Imdb(imdb_id).url(),
        None => id.url(),
    };
    Candidate {
        id,
        title,
        year: year_of(details.release_date.as_deref()),
        country: details.production_countries.into_iter().next().map(|c| c.name),
        alternate_titles,
        source_url: Some(source_url),
    }
}
