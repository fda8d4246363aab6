pub mod cancel;
pub mod config;
pub mod diag;
pub mod error;
pub mod lookup;
pub mod matcher;
pub mod media;
pub mod normalize;
pub mod plan;
pub mod report;
pub mod resolve;
pub mod scan;
pub mod sidecar;
pub mod trailer;
pub mod writer;

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub use cancel::CancellationToken;
pub use config::Settings;
pub use diag::{Diagnostics, Silent, TracingDiagnostics};
pub use error::{Error, Result};
pub use media::MediaItem;
pub use report::ReportKind;
pub use resolve::{Chooser, MetadataSource, MovieResolver, NoChoice, Resolve};
pub use trailer::{Download, TrailerFinder, TrailerSource};

/// Which items a run visits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunMode {
    /// Every subdirectory. With `start_at`, skip until the first name
    /// containing it (case-insensitive), then continue to the end.
    Sweep { start_at: Option<String> },
    /// Only the first subdirectory whose name contains the pattern.
    Single(String),
    /// List items for a report; nothing is looked up or changed.
    Report(ReportKind),
}

impl Default for RunMode {
    fn default() -> Self {
        RunMode::Sweep { start_at: None }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOptions {
    pub base_dir: PathBuf,
    #[serde(default)]
    pub mode: RunMode,
    /// Name things after the alternate title, with the country
    #[serde(default)]
    pub use_alternate: bool,
    /// Query the metadata source even when a valid sidecar exists
    #[serde(default)]
    pub force: bool,
    #[serde(default)]
    pub lookup_trailer: bool,
    /// Log the resolved record of every item
    #[serde(default)]
    pub show_info: bool,
    #[serde(default)]
    pub save_sidecar: bool,
    #[serde(default)]
    pub rename_files: bool,
    #[serde(default)]
    pub rename_dir: bool,
    #[serde(default)]
    pub download_trailer: bool,
    pub min_video_bytes: u64,
    pub max_results: usize,
}

impl RunOptions {
    pub fn new(base_dir: impl Into<PathBuf>, settings: &Settings) -> Self {
        Self {
            base_dir: base_dir.into(),
            mode: RunMode::default(),
            use_alternate: false,
            force: false,
            lookup_trailer: false,
            show_info: false,
            save_sidecar: false,
            rename_files: false,
            rename_dir: false,
            download_trailer: false,
            min_video_bytes: settings.min_video_bytes(),
            max_results: settings.lookup.max_results,
        }
    }
}

/// External collaborators for a run. Absent ones disable their feature.
pub struct Services<'a> {
    pub metadata: Option<&'a dyn MetadataSource>,
    pub trailers: Vec<&'a dyn TrailerSource>,
    pub downloader: Option<&'a dyn Download>,
    pub chooser: &'a dyn Chooser,
}

impl Default for Services<'_> {
    fn default() -> Self {
        Self {
            metadata: None,
            trailers: Vec::new(),
            downloader: None,
            chooser: &NoChoice,
        }
    }
}

/// Control options for a run (cancellation).
#[derive(Debug, Clone, Default)]
pub struct RunControl {
    pub cancel_token: Option<CancellationToken>,
}

impl RunControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel_token = Some(token);
        self
    }

    fn check(&self) -> Result<()> {
        match &self.cancel_token {
            Some(token) => token.check(),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunResult {
    pub items_processed: u64,
    pub renamed: u64,
    /// Renames skipped because the target existed
    pub refused: u64,
    pub sidecars_written: u64,
    pub trailers_found: u64,
    pub trailers_downloaded: u64,
    /// Report lines, only filled in report mode
    #[serde(default)]
    pub report: Vec<PathBuf>,
}

/// Subdirectories of `base_dir`, sorted by name.
pub fn list_item_dirs(base_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for entry in fs::read_dir(base_dir)? {
        let entry = entry?;
        if entry.path().is_dir() {
            dirs.push(entry.path());
        }
    }
    dirs.sort_by_key(|p| p.file_name().map(|n| n.to_os_string()));
    Ok(dirs)
}

fn name_contains(path: &Path, pattern: &str) -> bool {
    path.file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .is_some_and(|n| n.contains(&pattern.to_lowercase()))
}

/// Items a run mode visits, in order.
pub fn select_items(dirs: Vec<PathBuf>, mode: &RunMode) -> Vec<PathBuf> {
    match mode {
        RunMode::Sweep { start_at: Some(pattern) } => dirs
            .into_iter()
            .skip_while(|d| !name_contains(d, pattern))
            .collect(),
        RunMode::Single(pattern) => dirs.into_iter().find(|d| name_contains(d, pattern)).into_iter().collect(),
        RunMode::Sweep { start_at: None } | RunMode::Report(_) => dirs,
    }
}

/// Run over the library. Items are processed one at a time; cancellation is
/// honoured between items.
pub fn run(
    options: &RunOptions,
    services: &Services<'_>,
    control: &RunControl,
    diag: &dyn Diagnostics,
) -> Result<RunResult> {
    control.check()?;
    let dirs = list_item_dirs(&options.base_dir)?;
    let items = select_items(dirs, &options.mode);
    let mut result = RunResult::default();

    if let RunMode::Report(kind) = options.mode {
        for dir in items {
            control.check()?;
            let item = scan::scan_item(&dir, options.min_video_bytes, &Silent)?;
            result.report.extend(report::entries(&item, kind)?);
            result.items_processed += 1;
        }
        return Ok(result);
    }

    if items.is_empty() {
        if let RunMode::Single(pattern) = &options.mode {
            diag.warn(&format!("No directory matching '{}' in {}", pattern, options.base_dir.display()));
        }
    }

    for dir in items {
        control.check()?;
        process_item(&dir, options, services, &mut result, diag)?;
        result.items_processed += 1;
    }
    Ok(result)
}

/// Extract, resolve, plan, then apply the requested actions to one item.
pub fn process_item(
    dir: &Path,
    options: &RunOptions,
    services: &Services<'_>,
    result: &mut RunResult,
    diag: &dyn Diagnostics,
) -> Result<MediaItem> {
    diag.info(&format!("Processing Directory: {}", dir.display()));
    let mut item = scan::scan_item(dir, options.min_video_bytes, diag)?;

    let resolver = MovieResolver::new(services.metadata, services.chooser)
        .with_force(options.force)
        .with_max_results(options.max_results);
    let resolution = resolver.resolve(&item, diag)?;
    item.record = resolution.record;
    item.new_info = resolution.new_info;

    let finder = TrailerFinder::new(services.trailers.clone(), services.chooser);
    if options.lookup_trailer && finder.lookup(&mut item, options.use_alternate, diag) {
        result.trailers_found += 1;
    }

    let plan = plan::plan_item(&mut item, options.use_alternate);
    diag.debug(&format!(
        "  {} dir: '{}' prefix: '{}' files: {:?}",
        item, plan.dir_name, plan.file_prefix, plan.file_names
    ));
    if options.show_info {
        log_record(&item, diag);
    }

    if options.save_sidecar && writer::save_sidecar(&mut item, diag)? {
        result.sidecars_written += 1;
    }
    if options.rename_files {
        let summary = writer::rename_files(&mut item, diag)?;
        result.renamed += summary.renamed;
        result.refused += summary.refused;
    }

    let mut current_dir = item.path.clone();
    if options.rename_dir {
        let (moved_to, outcome) = writer::rename_dir(&item, diag)?;
        match outcome {
            writer::RenameOutcome::Renamed => result.renamed += 1,
            writer::RenameOutcome::Refused => result.refused += 1,
            writer::RenameOutcome::Unchanged => {}
        }
        current_dir = moved_to;
    }

    if options.download_trailer {
        match services.downloader {
            Some(downloader) => {
                if finder.download(&item, &current_dir, downloader, diag)?.is_some() {
                    result.trailers_downloaded += 1;
                }
            }
            None => diag.warn("  Trailer download unavailable"),
        }
    }
    Ok(item)
}

fn log_record(item: &MediaItem, diag: &dyn Diagnostics) {
    let Some(record) = &item.record else {
        diag.info(&format!("  No metadata for {item}"));
        return;
    };
    let show = |label: &str, value: Option<&str>| {
        diag.info(&format!("  {:<12} {}", label, value.unwrap_or("-")));
    };
    let year = record.year.map(|y| y.to_string());
    show("Title:", Some(&record.title));
    show("Year:", year.as_deref());
    show("Country:", record.country.as_deref());
    show("AKA:", record.alternate_title.as_deref());
    show("Source:", record.source_url.as_deref());
    show("Updated:", record.last_updated.as_deref());
    show("Trailer:", record.trailer_url.as_deref());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diag::testing::Recorder;
    use crate::resolve::tests::{candidate, FakeSource};
    use std::fs::File;
    use tempfile::tempdir;

    const MB: u64 = 1024 * 1024;

    fn video(path: &Path, bytes: u64) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        File::create(path).unwrap().set_len(bytes).unwrap();
    }

    fn options(base: &Path) -> RunOptions {
        let mut options = RunOptions::new(base, &Settings::default());
        options.min_video_bytes = MB;
        options
    }

    fn names(paths: &[PathBuf]) -> Vec<String> {
        paths
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_select_items() {
        let dirs: Vec<PathBuf> = ["Alien", "Brazil", "Casablanca", "Dune"].iter().map(PathBuf::from).collect();
        let sweep = |start: Option<&str>| RunMode::Sweep { start_at: start.map(String::from) };

        assert_eq!(names(&select_items(dirs.clone(), &sweep(None))).len(), 4);
        assert_eq!(names(&select_items(dirs.clone(), &sweep(Some("CASA")))), ["Casablanca", "Dune"]);
        assert!(select_items(dirs.clone(), &sweep(Some("zzz"))).is_empty());
        assert_eq!(names(&select_items(dirs.clone(), &RunMode::Single("a".into()))), ["Alien"]);
        assert!(select_items(dirs, &RunMode::Single("xyz".into())).is_empty());
    }

    #[test]
    fn test_list_item_dirs_skips_files() {
        let base = tempdir().unwrap();
        fs::create_dir(base.path().join("b")).unwrap();
        fs::create_dir(base.path().join("a")).unwrap();
        fs::write(base.path().join("c.txt"), "x").unwrap();
        assert_eq!(names(&list_item_dirs(base.path()).unwrap()), ["a", "b"]);
    }

    #[test]
    fn test_report_mode() {
        let base = tempdir().unwrap();
        video(&base.path().join("Heat (1995)/heat.avi"), 2 * MB);
        fs::create_dir(base.path().join("Empty")).unwrap();

        let mut opts = options(base.path());
        opts.mode = RunMode::Report(ReportKind::NoVideo);
        let result = run(&opts, &Services::default(), &RunControl::new(), &Silent).unwrap();
        assert_eq!(result.report, vec![base.path().join("Empty")]);
        assert_eq!(result.items_processed, 2);
        assert!(base.path().join("Heat (1995)/heat.avi").exists());
    }

    #[test]
    fn test_full_sweep_without_network() {
        let base = tempdir().unwrap();
        video(&base.path().join("The.Matrix.1999.XviD/the.matrix.1999.xvid.avi"), 2 * MB);

        let mut opts = options(base.path());
        opts.rename_files = true;
        opts.rename_dir = true;
        let result = run(&opts, &Services::default(), &RunControl::new(), &Silent).unwrap();

        let renamed = base.path().join("The.Matrix.1999.XviD (1999)");
        assert!(renamed.join("the.matrix.1999.xvid.(1999)-xvid.avi").exists());
        assert_eq!(result.items_processed, 1);
        assert_eq!(result.renamed, 2);

        // Running again changes nothing
        let again = run(&opts, &Services::default(), &RunControl::new(), &Silent).unwrap();
        assert_eq!(again.renamed, 0);
        assert_eq!(again.refused, 0);
    }

    #[test]
    fn test_resolved_run_saves_sidecar_and_renames() {
        let base = tempdir().unwrap();
        video(&base.path().join("terminal 2004/cd1.avi"), 2 * MB);
        video(&base.path().join("terminal 2004/cd2.avi"), 2 * MB);

        let source = FakeSource {
            results: vec![candidate(594, "The Terminal", Some(2004))],
            ..Default::default()
        };
        let services = Services { metadata: Some(&source), ..Default::default() };
        let mut opts = options(base.path());
        opts.save_sidecar = true;
        opts.rename_files = true;
        opts.rename_dir = true;

        let diag = Recorder::default();
        let result = run(&opts, &services, &RunControl::new(), &diag).unwrap();
        assert_eq!(result.sidecars_written, 1);

        let dir = base.path().join("Terminal (2004)");
        assert!(dir.join("terminal.(2004).part1.avi").exists());
        assert!(dir.join("terminal.(2004).part2.avi").exists());
        let record = sidecar::parse(&fs::read_to_string(dir.join("terminal.(2004).nfo")).unwrap()).unwrap();
        assert_eq!(record.title, "The Terminal");
        assert_eq!(record.source_url.as_deref(), Some("https://www.themoviedb.org/movie/594"));

        // The sidecar now answers; no second lookup
        let again = run(&opts, &services, &RunControl::new(), &diag).unwrap();
        assert_eq!(again.sidecars_written, 0);
        assert_eq!(source.searches.borrow().len(), 1);
    }

    #[test]
    fn test_incomplete_metadata_is_never_saved() {
        let base = tempdir().unwrap();
        video(&base.path().join("Obscure 2004/obscure.avi"), 2 * MB);

        let mut found = candidate(77, "Obscure", Some(2004));
        found.country = None;
        let source = FakeSource { results: vec![found], ..Default::default() };
        let services = Services { metadata: Some(&source), ..Default::default() };
        let mut opts = options(base.path());
        opts.save_sidecar = true;

        let first = run(&opts, &services, &RunControl::new(), &Silent).unwrap();
        let second = run(&opts, &services, &RunControl::new(), &Silent).unwrap();
        assert_eq!(first.sidecars_written, 0);
        assert_eq!(second.sidecars_written, 0);

        opts.mode = RunMode::Report(ReportKind::BadSidecar);
        let report = run(&opts, &services, &RunControl::new(), &Silent).unwrap();
        assert!(report.report.is_empty());
    }

    #[test]
    fn test_cancelled_before_items() {
        let base = tempdir().unwrap();
        fs::create_dir(base.path().join("Heat")).unwrap();
        let token = CancellationToken::new();
        token.cancel();
        let control = RunControl::new().with_cancel_token(token);

        let err = run(&options(base.path()), &Services::default(), &control, &Silent).unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }

    #[test]
    fn test_single_without_match_warns() {
        let base = tempdir().unwrap();
        fs::create_dir(base.path().join("Heat")).unwrap();
        let mut opts = options(base.path());
        opts.mode = RunMode::Single("alien".into());

        let diag = Recorder::default();
        let result = run(&opts, &Services::default(), &RunControl::new(), &diag).unwrap();
        assert_eq!(result.items_processed, 0);
        assert!(diag.warned("No directory matching"));
    }
}
