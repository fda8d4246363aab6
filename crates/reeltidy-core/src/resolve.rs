//! Sidecar first, then the external metadata source, then the user.

use crate::diag::Diagnostics;
use crate::error::Result;
use crate::matcher::weak_match;
use crate::media::MediaItem;
use crate::sidecar::{MovieRecord, Sidecar, SourceRef};

/// Search hits considered for automatic selection.
const AUTO_SELECT_WINDOW: usize = 5;

/// One movie as reported by a metadata source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub id: SourceRef,
    pub title: String,
    pub year: Option<i32>,
    pub country: Option<String>,
    pub alternate_titles: Vec<String>,
    pub source_url: Option<String>,
}

impl Candidate {
    /// Line shown when the user has to pick.
    pub fn label(&self) -> String {
        let year = self.year.map_or_else(|| "NA".to_string(), |y| y.to_string());
        let url = self.source_url.clone().unwrap_or_else(|| self.id.url());
        match self.alternate_titles.first() {
            Some(aka) => format!("{} ({}) aka {} - {}", self.title, year, aka, url),
            None => format!("{} ({}) - {}", self.title, year, url),
        }
    }

    pub fn to_record(&self) -> MovieRecord {
        MovieRecord {
            title: self.title.clone(),
            year: self.year,
            country: self.country.clone(),
            alternate_title: self.alternate_titles.first().cloned(),
            source_url: Some(self.source_url.clone().unwrap_or_else(|| self.id.url())),
            last_updated: None,
            trailer_url: None,
        }
    }
}

/// External movie database.
pub trait MetadataSource {
    /// Search by title; results in the source's relevance order.
    fn search(&self, title: &str, year: Option<i32>) -> Result<Vec<Candidate>>;

    /// Full details for one movie, None when the source does not know it.
    fn lookup(&self, id: &SourceRef) -> Result<Option<Candidate>>;
}

/// Fallback decision when automatic matching is inconclusive.
pub trait Chooser {
    /// Index into `choices`, or None for "none of these".
    fn choose(&self, question: &str, choices: &[String]) -> Option<usize>;
}

/// Never picks anything. Used for unattended runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoChoice;

impl Chooser for NoChoice {
    fn choose(&self, _question: &str, _choices: &[String]) -> Option<usize> {
        None
    }
}

/// Outcome of resolving one item.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    pub record: Option<MovieRecord>,
    /// The record differs from what the sidecar already holds
    pub new_info: bool,
}

/// Produces the canonical record for an item.
pub trait Resolve {
    fn resolve(&self, item: &MediaItem, diag: &dyn Diagnostics) -> Result<Resolution>;
}

/// Resolver for movie directories.
pub struct MovieResolver<'a> {
    source: Option<&'a dyn MetadataSource>,
    chooser: &'a dyn Chooser,
    force: bool,
    max_results: usize,
}

impl<'a> MovieResolver<'a> {
    pub fn new(source: Option<&'a dyn MetadataSource>, chooser: &'a dyn Chooser) -> Self {
        Self {
            source,
            chooser,
            force: false,
            max_results: 10,
        }
    }

    /// Query the source even when a valid sidecar exists.
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Cap on search hits offered to the chooser.
    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results.max(1);
        self
    }

    fn fetch(
        &self,
        source: &dyn MetadataSource,
        title: &str,
        year: Option<i32>,
        link: Option<SourceRef>,
        diag: &dyn Diagnostics,
    ) -> Option<Candidate> {
        let id = match link {
            Some(link) => {
                diag.debug(&format!("  Using recorded link: {}", link.url()));
                link
            }
            None => self.search(source, title, year, diag)?,
        };

        diag.debug(&format!("  Looking up movie: {}", id.url()));
        match source.lookup(&id) {
            Ok(Some(candidate)) => Some(candidate),
            Ok(None) => {
                diag.warn(&format!("  No entry at {}", id.url()));
                None
            }
            Err(e) => {
                diag.warn(&format!("  Lookup failed for {}: {}", id.url(), e));
                None
            }
        }
    }

    fn search(
        &self,
        source: &dyn MetadataSource,
        title: &str,
        year: Option<i32>,
        diag: &dyn Diagnostics,
    ) -> Option<SourceRef> {
        let query = search_query(title, year);
        let year_label = year.map_or_else(|| "NA".to_string(), |y| y.to_string());
        diag.info(&format!("  Searching for: '{}' (yr: {})", query, year_label));

        let mut results = match source.search(&query, year) {
            Ok(results) => results,
            Err(e) => {
                diag.warn(&format!("  Search failed for '{}': {}", query, e));
                return None;
            }
        };
        results.truncate(self.max_results);
        if results.is_empty() {
            diag.info(&format!("  No search results for: '{}' (yr: {})", query, year_label));
            return None;
        }

        if let Some(index) = select_candidate(&results, &query, year) {
            let hit = &results[index];
            diag.debug(&format!("  Result match: {}", hit.label()));
            return Some(hit.id.clone());
        }

        diag.debug("  No exact match found, prompting user");
        let labels: Vec<String> = results.iter().map(Candidate::label).collect();
        match self.chooser.choose("Please select the correct movie", &labels) {
            Some(index) if index < results.len() => Some(results[index].id.clone()),
            _ => {
                diag.info(&format!("  No entry selected for: '{}' (yr: {})", query, year_label));
                None
            }
        }
    }
}

impl Resolve for MovieResolver<'_> {
    fn resolve(&self, item: &MediaItem, diag: &dyn Diagnostics) -> Result<Resolution> {
        let sidecar = match item.sidecar_path() {
            Some(path) => Some(Sidecar::load(&path, diag)?),
            None => None,
        };
        let existing = sidecar.as_ref().and_then(|s| s.record.clone());
        let mut record = existing.clone();

        let needs_lookup = existing.is_none() || self.force;
        if let (true, Some(source)) = (needs_lookup, self.source) {
            let (title, year) = match &existing {
                Some(r) => (r.title.as_str(), r.year),
                None => (item.guessed_title.as_str(), item.guessed_year),
            };
            let link = sidecar.as_ref().and_then(Sidecar::source_ref);

            if let Some(candidate) = self.fetch(source, title, year, link, diag) {
                let fetched = candidate.to_record();
                let mut merged = existing.clone().unwrap_or_default();
                merged.fill_missing(&fetched);
                if fetched.alternate_title.is_some() {
                    merged.alternate_title = fetched.alternate_title;
                }
                merged.last_updated = Some(chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string());
                record = Some(merged);
            }
        }

        let new_info = match (&existing, &record) {
            (Some(old), Some(new)) => new.differs_from(old),
            (None, Some(_)) => true,
            _ => false,
        };
        Ok(Resolution { record, new_info })
    }
}

/// First hit in the auto-select window whose title weakly matches and whose
/// year is equal.
pub fn select_candidate(candidates: &[Candidate], title: &str, year: Option<i32>) -> Option<usize> {
    let year = year?;
    candidates
        .iter()
        .take(AUTO_SELECT_WINDOW)
        .position(|c| c.year == Some(year) && weak_match(&c.title, title))
}

/// Turn a dotted release name into a search phrase.
///
/// "The.Matrix.1999.XviD" becomes "The Matrix": separators become spaces
/// when the name has none, and everything from the year on is dropped.
pub fn search_query(title: &str, year: Option<i32>) -> String {
    let spaced = if title.contains(' ') {
        title.to_string()
    } else {
        title.replace(['.', '_'], " ")
    };
    let cut = year
        .and_then(|y| spaced.find(&format!(" {y}")))
        .filter(|&pos| pos > 0)
        .map_or(spaced.as_str(), |pos| &spaced[..pos]);
    cut.trim().to_string()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::diag::testing::Recorder;
    use crate::sidecar;
    use std::cell::RefCell;
    use std::path::Path;
    use tempfile::tempdir;

    pub fn candidate(id: u64, title: &str, year: Option<i32>) -> Candidate {
        Candidate {
            id: SourceRef::Tmdb(id),
            title: title.into(),
            year,
            country: Some("USA".into()),
            alternate_titles: vec![],
            source_url: None,
        }
    }

    /// Serves canned search results and details.
    #[derive(Default)]
    pub struct FakeSource {
        pub results: Vec<Candidate>,
        pub fail: bool,
        pub searches: RefCell<Vec<String>>,
        pub lookups: RefCell<Vec<SourceRef>>,
    }

    impl MetadataSource for FakeSource {
        fn search(&self, title: &str, _year: Option<i32>) -> Result<Vec<Candidate>> {
            self.searches.borrow_mut().push(title.to_string());
            if self.fail {
                return Err(crate::Error::Status { url: "https://example.com".into(), status: 503 });
            }
            Ok(self.results.clone())
        }

        fn lookup(&self, id: &SourceRef) -> Result<Option<Candidate>> {
            self.lookups.borrow_mut().push(id.clone());
            if self.fail {
                return Err(crate::Error::Status { url: id.url(), status: 503 });
            }
            Ok(self.results.iter().find(|c| &c.id == id).cloned())
        }
    }

    /// Answers with a fixed index and records what it was asked.
    pub struct FixedChoice {
        pub answer: Option<usize>,
        pub asked: RefCell<Vec<Vec<String>>>,
    }

    impl FixedChoice {
        pub fn new(answer: Option<usize>) -> Self {
            Self { answer, asked: RefCell::new(vec![]) }
        }
    }

    impl Chooser for FixedChoice {
        fn choose(&self, _question: &str, choices: &[String]) -> Option<usize> {
            self.asked.borrow_mut().push(choices.to_vec());
            self.answer
        }
    }

    fn item_at(dir: &Path, name: &str) -> MediaItem {
        let path = dir.join(name);
        std::fs::create_dir_all(&path).unwrap();
        let mut item = MediaItem::new(path);
        item.guessed_title = crate::scan::guess_title(name);
        item.guessed_year = crate::scan::guess_year([name]);
        item
    }

    #[test]
    fn test_select_candidate() {
        let hits = vec![
            candidate(1, "The Terminal Man", Some(1974)),
            candidate(2, "The Terminal", Some(2004)),
            candidate(3, "Terminal", Some(2004)),
        ];
        assert_eq!(select_candidate(&hits, "terminal", Some(2004)), Some(1));
        assert_eq!(select_candidate(&hits, "terminal", Some(1999)), None);
        assert_eq!(select_candidate(&hits, "terminal", None), None);

        // Only the first five hits qualify
        let mut many: Vec<_> = (0..5).map(|i| candidate(i, "Other", Some(2004))).collect();
        many.push(candidate(9, "Terminal", Some(2004)));
        assert_eq!(select_candidate(&many, "terminal", Some(2004)), None);
    }

    #[test]
    fn test_search_query() {
        assert_eq!(search_query("The.Matrix.1999.XviD", Some(1999)), "The Matrix");
        assert_eq!(search_query("Heat", Some(1995)), "Heat");
        assert_eq!(search_query("Blade_Runner", None), "Blade Runner");
        assert_eq!(search_query("2001 A Space Odyssey", Some(1968)), "2001 A Space Odyssey");
    }

    #[test]
    fn test_auto_accepts_unambiguous_hit() {
        let root = tempdir().unwrap();
        let item = item_at(root.path(), "The.Terminal.2004.DVDRip");
        let source = FakeSource {
            results: vec![candidate(7, "The Terminal", Some(2004))],
            ..Default::default()
        };
        let chooser = FixedChoice::new(None);
        let resolver = MovieResolver::new(Some(&source), &chooser);

        let resolution = resolver.resolve(&item, &Recorder::default()).unwrap();
        let record = resolution.record.unwrap();
        assert_eq!(record.title, "The Terminal");
        assert_eq!(record.year, Some(2004));
        assert_eq!(record.source_url.as_deref(), Some("https://www.themoviedb.org/movie/7"));
        assert!(record.last_updated.is_some());
        assert!(resolution.new_info);
        assert_eq!(source.searches.borrow().as_slice(), ["The Terminal"]);
        assert!(chooser.asked.borrow().is_empty());
    }

    #[test]
    fn test_ambiguous_hits_go_to_chooser() {
        let root = tempdir().unwrap();
        let item = item_at(root.path(), "Heat");
        let source = FakeSource {
            results: vec![candidate(1, "Heat", Some(1986)), candidate(2, "Heat", Some(1995))],
            ..Default::default()
        };
        let chooser = FixedChoice::new(Some(1));
        let resolver = MovieResolver::new(Some(&source), &chooser);

        let resolution = resolver.resolve(&item, &Recorder::default()).unwrap();
        assert_eq!(resolution.record.unwrap().year, Some(1995));
        assert_eq!(chooser.asked.borrow().len(), 1);
        assert_eq!(chooser.asked.borrow()[0].len(), 2);
    }

    #[test]
    fn test_declined_choice_leaves_guess() {
        let root = tempdir().unwrap();
        let item = item_at(root.path(), "Heat");
        let source = FakeSource {
            results: vec![candidate(1, "Heat", Some(1986))],
            ..Default::default()
        };
        let resolver = MovieResolver::new(Some(&source), &NoChoice);

        let resolution = resolver.resolve(&item, &Recorder::default()).unwrap();
        assert_eq!(resolution, Resolution::default());
    }

    #[test]
    fn test_lookup_failure_is_not_fatal() {
        let root = tempdir().unwrap();
        let item = item_at(root.path(), "Heat (1995)");
        let source = FakeSource { fail: true, ..Default::default() };
        let diag = Recorder::default();
        let resolver = MovieResolver::new(Some(&source), &NoChoice);

        let resolution = resolver.resolve(&item, &diag).unwrap();
        assert_eq!(resolution.record, None);
        assert!(diag.warned("Search failed"));
    }

    #[test]
    fn test_valid_sidecar_skips_lookup() {
        let root = tempdir().unwrap();
        let mut item = item_at(root.path(), "Heat (1995)");
        let record = MovieRecord {
            title: "Heat".into(),
            year: Some(1995),
            country: Some("USA".into()),
            ..Default::default()
        };
        sidecar::save(&item.path.join("heat.nfo"), &record).unwrap();
        item.sidecar = Some("heat.nfo".into());

        let source = FakeSource::default();
        let resolver = MovieResolver::new(Some(&source), &NoChoice);
        let resolution = resolver.resolve(&item, &Recorder::default()).unwrap();
        assert_eq!(resolution.record, Some(record));
        assert!(!resolution.new_info);
        assert!(source.searches.borrow().is_empty());
        assert!(source.lookups.borrow().is_empty());
    }

    #[test]
    fn test_invalid_sidecar_link_skips_search() {
        let root = tempdir().unwrap();
        let mut item = item_at(root.path(), "Heat (1995)");
        std::fs::write(item.path.join("release.nfo"), "see https://www.imdb.com/title/tt0113277/").unwrap();
        item.sidecar = Some("release.nfo".into());

        let mut found = candidate(949, "Heat", Some(1995));
        found.id = SourceRef::Imdb("tt0113277".into());
        let source = FakeSource { results: vec![found], ..Default::default() };
        let resolver = MovieResolver::new(Some(&source), &NoChoice);

        let resolution = resolver.resolve(&item, &Recorder::default()).unwrap();
        assert_eq!(resolution.record.unwrap().title, "Heat");
        assert!(resolution.new_info);
        assert!(source.searches.borrow().is_empty());
        assert_eq!(source.lookups.borrow().as_slice(), [SourceRef::Imdb("tt0113277".into())]);
    }

    #[test]
    fn test_force_fills_gaps_without_overwriting() {
        let root = tempdir().unwrap();
        let mut item = item_at(root.path(), "Amelie (2001)");
        let record = MovieRecord {
            title: "Amelie".into(),
            year: Some(2001),
            country: Some("France".into()),
            source_url: Some("https://www.themoviedb.org/movie/194".into()),
            ..Default::default()
        };
        sidecar::save(&item.path.join("amelie.nfo"), &record).unwrap();
        item.sidecar = Some("amelie.nfo".into());

        let mut fetched = candidate(194, "Amélie", Some(2001));
        fetched.alternate_titles = vec!["Le Fabuleux Destin d'Amélie Poulain".into()];
        let source = FakeSource { results: vec![fetched], ..Default::default() };
        let resolver = MovieResolver::new(Some(&source), &NoChoice).with_force(true);

        let resolution = resolver.resolve(&item, &Recorder::default()).unwrap();
        let merged = resolution.record.unwrap();
        assert_eq!(merged.title, "Amelie");
        assert_eq!(merged.alternate_title.as_deref(), Some("Le Fabuleux Destin d'Amélie Poulain"));
        assert!(resolution.new_info);
        assert_eq!(source.lookups.borrow().as_slice(), [SourceRef::Tmdb(194)]);
    }

    #[test]
    fn test_no_source_keeps_guess() {
        let root = tempdir().unwrap();
        let item = item_at(root.path(), "Heat (1995)");
        let resolver = MovieResolver::new(None, &NoChoice);
        let resolution = resolver.resolve(&item, &Recorder::default()).unwrap();
        assert_eq!(resolution, Resolution::default());
    }
}
