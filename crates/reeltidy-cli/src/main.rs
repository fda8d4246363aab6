mod prompt;

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use reeltidy_core::lookup::{HttpClient, TmdbSource, TrailerAddict, YouTube};
use reeltidy_core::{
    report, CancellationToken, Chooser, MetadataSource, NoChoice, ReportKind, RunControl, RunMode, RunOptions,
    Services, Settings, Silent, TracingDiagnostics, TrailerSource,
};
use tracing_subscriber::EnvFilter;

use crate::prompt::TerminalChooser;

/// Exit code after Ctrl-C, as a shell reports SIGINT.
const EXIT_INTERRUPTED: u8 = 130;

#[derive(Clone, Copy, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn as_str(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum ListKind {
    /// Directories without video files
    Novideo,
    /// Invalid NFO files
    Badnfo,
    /// Directories without an NFO file
    Nonfo,
    /// Directories with usable subtitles
    Hassub,
    /// Directories without subtitles
    Nosub,
    /// Directories with subtitles that cannot be used
    Suberr,
}

impl From<ListKind> for ReportKind {
    fn from(kind: ListKind) -> Self {
        match kind {
            ListKind::Novideo => ReportKind::NoVideo,
            ListKind::Badnfo => ReportKind::BadSidecar,
            ListKind::Nonfo => ReportKind::NoSidecar,
            ListKind::Hassub => ReportKind::HasSubtitles,
            ListKind::Nosub => ReportKind::NoSubtitles,
            ListKind::Suberr => ReportKind::SubtitleErrors,
        }
    }
}

#[derive(Parser)]
#[command(
    name = "reeltidy",
    version,
    about = "Rename movie directories and files to a canonical scheme, with NFO files and trailers"
)]
struct Cli {
    /// Base directory holding one subdirectory per movie
    #[arg(short, long, default_value = ".")]
    basedir: PathBuf,

    /// Only process the first directory whose name contains this text
    #[arg(short, long)]
    single: Option<String>,

    /// Skip directories until one whose name contains this text
    #[arg(long)]
    startat: Option<String>,

    /// Log level
    #[arg(short, long, value_enum, default_value = "info")]
    log: LogLevel,

    /// Same as --log trace
    #[arg(short, long)]
    verbose: bool,

    /// Settings file (default: the platform config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print a list of directories instead of processing them
    #[arg(long, value_enum, help_heading = "Display Listing")]
    list: Option<ListKind>,

    /// Delimit list items by NUL (for xargs -0)
    #[arg(short = '0', long, help_heading = "Display Listing")]
    print0: bool,

    /// Use the alternate title (for foreign films)
    #[arg(short, long, help_heading = "Runtime Options")]
    aka: bool,

    /// Look up metadata even if a valid NFO file exists
    #[arg(short, long, help_heading = "Runtime Options")]
    force: bool,

    /// Look up a trailer page
    #[arg(short, long, help_heading = "Runtime Options")]
    trailer: bool,

    /// Display the resolved metadata
    #[arg(short, long, help_heading = "Runtime Options")]
    info: bool,

    /// Never ask; ambiguous matches are skipped
    #[arg(long, help_heading = "Runtime Options")]
    no_prompt: bool,

    /// Rename movie directories to the resolved title
    #[arg(long = "renamedir", help_heading = "Actions to Perform")]
    rename_dir: bool,

    /// Rename video files, NFO and subtitles to the resolved title
    #[arg(long = "renamefiles", help_heading = "Actions to Perform")]
    rename_files: bool,

    /// Create or update NFO files
    #[arg(long = "savenfo", help_heading = "Actions to Perform")]
    save_nfo: bool,

    /// Download the trailer
    #[arg(long, help_heading = "Actions to Perform")]
    download: bool,
}

impl Cli {
    fn mode(&self) -> RunMode {
        if let Some(kind) = self.list {
            RunMode::Report(kind.into())
        } else if let Some(pattern) = self.single.clone().filter(|s| !s.is_empty()) {
            RunMode::Single(pattern)
        } else {
            RunMode::Sweep {
                start_at: self.startat.clone(),
            }
        }
    }
}

fn init_tracing(cli: &Cli) {
    let level = if cli.verbose { "trace" } else { cli.log.as_str() };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("reeltidy={level},reeltidy_core={level}")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if matches!(e.downcast_ref::<reeltidy_core::Error>(), Some(reeltidy_core::Error::Cancelled)) => {
            eprintln!("Keyboard Interrupt: quitting.");
            ExitCode::from(EXIT_INTERRUPTED)
        }
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let mode = cli.mode();
    let reporting = matches!(mode, RunMode::Report(_));
    // Reports go to stdout and must stay clean
    if !reporting {
        init_tracing(&cli);
    }

    let settings = Settings::load(cli.config.as_deref()).context("Failed to load settings")?;
    anyhow::ensure!(cli.basedir.is_dir(), "Base directory not found: {}", cli.basedir.display());

    let token = CancellationToken::new();
    let handler_token = token.clone();
    ctrlc::set_handler(move || {
        if handler_token.is_cancelled() {
            eprintln!("\nKeyboard Interrupt: quitting.");
            std::process::exit(i32::from(EXIT_INTERRUPTED));
        }
        eprintln!("\nInterrupted: stopping after the current directory (Ctrl-C again to quit now)");
        handler_token.cancel();
    })
    .context("Failed to install Ctrl-C handler")?;
    let control = RunControl::new().with_cancel_token(token);

    let mut options = RunOptions::new(&cli.basedir, &settings);
    options.mode = mode;
    options.use_alternate = cli.aka;
    options.force = cli.force;
    options.lookup_trailer = cli.trailer;
    options.show_info = cli.info;
    options.save_sidecar = cli.save_nfo;
    options.rename_files = cli.rename_files;
    options.rename_dir = cli.rename_dir;
    options.download_trailer = cli.download;

    if let RunMode::Report(_) = options.mode {
        let result = reeltidy_core::run(&options, &Services::default(), &control, &Silent)?;
        if !result.report.is_empty() {
            let mut stdout = std::io::stdout().lock();
            write!(stdout, "{}", report::join(&result.report, cli.print0))?;
            if !cli.print0 {
                writeln!(stdout)?;
            }
        }
        return Ok(());
    }

    let http = HttpClient::new(&settings.http).context("Failed to build HTTP client")?;
    let tmdb = settings
        .tmdb_credential()
        .map(|key| TmdbSource::new(&http, key, settings.lookup.language.clone()));
    if tmdb.is_none() {
        tracing::warn!(
            "No TMDB API key configured (set {} or lookup.tmdb_api_key); metadata lookups are disabled",
            reeltidy_core::config::TMDB_KEY_ENV
        );
    }
    let trailer_addict = TrailerAddict::new(&http);
    let youtube = YouTube::new(&http);
    let chooser: &dyn Chooser = if cli.no_prompt { &NoChoice } else { &TerminalChooser };

    let services = Services {
        metadata: tmdb.as_ref().map(|t| t as &dyn MetadataSource),
        trailers: vec![&trailer_addict as &dyn TrailerSource, &youtube],
        downloader: Some(&http),
        chooser,
    };

    let t_total = std::time::Instant::now();
    let result = reeltidy_core::run(&options, &services, &control, &TracingDiagnostics)?;
    tracing::info!(
        "Done! {} directories, {} renamed, {} skipped, {} NFO files written, {} trailers found, {} downloaded ({:.2}s)",
        result.items_processed,
        result.renamed,
        result.refused,
        result.sidecars_written,
        result.trailers_found,
        result.trailers_downloaded,
        t_total.elapsed().as_secs_f64()
    );
    Ok(())
}
