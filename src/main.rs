//! depcorpus CLI - build a corpus of per-repository dependency databases

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use depcorpus::catalog::{self, Filter};
use depcorpus::config::{load_config, CorpusConfig};
use depcorpus::fetch::{GithubSource, RateLimitedFetcher, Token};
use depcorpus::linecount::SccCounter;
use depcorpus::repo::load_repo_list;
use depcorpus::stages::{self, CloneStage, ExtractStage, MetadataStage, MetricsStage};
use depcorpus::{ui, CorpusDb, RunSummary, Schedule, StageRunner};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "depcorpus")]
#[command(version)]
#[command(about = "Build a corpus of dependency databases from GitHub repositories")]
#[command(long_about = r#"
depcorpus drives a resumable pipeline over a list of GitHub repositories:
  fetch -> catalog -> filter -> clone -> extract -> export -> augment -> metrics

Every stage skips items whose output already exists, so any command can be
interrupted and rerun. Use --skip/--step to split a stage across processes.

Example usage:
  depcorpus fetch --input names.txt --output metadata
  depcorpus catalog --input metadata --output records.jsonl
  depcorpus clone --input records.jsonl --output clones --skip 0 --step 4
  depcorpus extract --input records.jsonl --clones clones --output dbs
  depcorpus export --input records.jsonl --dbs dbs --output valid-dbs.txt
  depcorpus augment --input valid-dbs.txt
  depcorpus metrics --input valid-dbs.txt
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the config file (defaults to ./depcorpus.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone, Copy)]
struct ScheduleArgs {
    /// Number of items to skip before starting
    #[arg(long, default_value_t = 0)]
    skip: usize,

    /// Stride between visited items
    #[arg(long, default_value_t = 1)]
    step: usize,
}

impl ScheduleArgs {
    fn schedule(self) -> anyhow::Result<Schedule> {
        Ok(Schedule::new(self.skip, self.step)?)
    }
}

#[derive(Args, Clone)]
struct FilterArgs {
    /// Comma-separated list of languages
    #[arg(long, default_value = "Java")]
    languages: String,

    /// Max repository size in GB
    #[arg(long, default_value_t = 2.0)]
    max_size: f64,

    /// Min number of stars
    #[arg(long, default_value_t = 64)]
    min_stars: u64,

    /// Min number of forks
    #[arg(long, default_value_t = 64)]
    min_forks: u64,

    /// Min number of open issues
    #[arg(long, default_value_t = 16)]
    min_open_issues: u64,
}

impl FilterArgs {
    fn filter(&self) -> Filter {
        Filter {
            max_size: self.max_size,
            min_stars: self.min_stars,
            min_forks: self.min_forks,
            min_open_issues: self.min_open_issues,
            ..Filter::default()
        }
        .with_languages(&self.languages)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Download repository metadata from the GitHub API
    Fetch {
        /// GitHub token
        #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
        gh_token: String,

        /// Repository list (owner/name lines or catalog records)
        #[arg(short, long)]
        input: PathBuf,

        /// Metadata directory
        #[arg(short, long)]
        output: PathBuf,

        /// Number of repositories to skip before starting
        #[arg(long, default_value_t = 0)]
        skip: usize,
    },

    /// Scan downloaded metadata into sorted catalog records
    Catalog {
        /// Metadata directory
        #[arg(short, long)]
        input: PathBuf,

        /// Output JSON Lines file
        #[arg(short, long)]
        output: PathBuf,

        /// Do not apply any filters
        #[arg(long)]
        no_filtering: bool,

        #[command(flatten)]
        filter: FilterArgs,
    },

    /// Narrow an existing catalog down to candidate repositories
    Filter {
        /// Catalog records (JSON Lines)
        #[arg(short, long)]
        input: PathBuf,

        /// Output JSON Lines file
        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        filter: FilterArgs,

        /// File with newline-delimited keywords; matching names are dropped
        #[arg(long)]
        keywords: Option<PathBuf>,
    },

    /// Clone bare mirrors
    Clone {
        /// Repository list
        #[arg(short, long)]
        input: PathBuf,

        /// Clones directory
        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        schedule: ScheduleArgs,
    },

    /// Run the dependency extractor over each mirror
    Extract {
        /// Repository list
        #[arg(short, long)]
        input: PathBuf,

        /// Clones directory
        #[arg(long)]
        clones: PathBuf,

        /// Databases directory
        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        schedule: ScheduleArgs,
    },

    /// Write the list of databases that pass the validity checks
    Export {
        /// Repository list
        #[arg(short, long)]
        input: PathBuf,

        /// Databases directory
        #[arg(long)]
        dbs: PathBuf,

        /// Output path list
        #[arg(short, long)]
        output: PathBuf,

        /// Number of repositories to skip before starting
        #[arg(long, default_value_t = 0)]
        skip: usize,
    },

    /// Add ancestor and filename tables to each database
    Augment {
        /// Database path list
        #[arg(short, long)]
        input: PathBuf,

        #[command(flatten)]
        schedule: ScheduleArgs,
    },

    /// Add per-file line metrics to each database
    Metrics {
        /// Database path list
        #[arg(short, long)]
        input: PathBuf,

        #[command(flatten)]
        schedule: ScheduleArgs,
    },

    /// Show statistics for one database
    Stats {
        /// Path to the database file
        #[arg(short, long)]
        database: PathBuf,
    },
}

fn finish(stage: &str, summary: &RunSummary, started: Instant) {
    println!("{}", ui::summary_table(stage, summary));
    ui::timing(&format!("{:.1}s", started.elapsed().as_secs_f64()));
    if summary.failed > 0 {
        ui::warn(&format!("{} item(s) failed; rerun to retry them", summary.failed));
    }
}

fn write_catalog(output: &Path, records: &[catalog::RepoRecord]) -> anyhow::Result<()> {
    catalog::write_records(output, records)
        .with_context(|| format!("writing {}", output.display()))?;
    ui::success(&format!("{} repositories written to {}", records.len(), output.display()));
    Ok(())
}

fn run(command: Commands, config: &CorpusConfig) -> anyhow::Result<()> {
    let started = Instant::now();
    match command {
        Commands::Fetch { gh_token, input, output, skip } => {
            let repos = load_repo_list(&input)?;
            let source = GithubSource::new(&config.github)?;
            let stage = MetadataStage::new(RateLimitedFetcher::new(source), Token::new(gh_token), output);
            let runner = StageRunner::new("fetch", Schedule::new(skip, 1)?);
            let summary = runner.run(&repos, |repo| stage.process(repo));
            finish(runner.stage(), &summary, started);
        }

        Commands::Catalog { input, output, no_filtering, filter } => {
            ui::header("Generating catalog");
            ui::info("Metadata", &input.display().to_string());
            let mut records = catalog::generate(&input)?;
            if !no_filtering {
                records = filter.filter().apply(records);
            }
            write_catalog(&output, &records)?;
        }

        Commands::Filter { input, output, filter, keywords } => {
            let mut filter = filter.filter();
            if let Some(path) = keywords {
                filter.keywords = catalog::load_keywords(&path)
                    .with_context(|| format!("reading keywords from {}", path.display()))?;
            }
            let records = catalog::read_records(&input)?;
            let total = records.len();
            let kept = filter.apply(records);
            ui::info("Kept", &format!("{} of {}", kept.len(), total));
            write_catalog(&output, &kept)?;
        }

        Commands::Clone { input, output, schedule } => {
            let repos = load_repo_list(&input)?;
            let stage = CloneStage::new(&config.git, output);
            let runner = StageRunner::new("clone", schedule.schedule()?);
            let summary = runner.run(&repos, |repo| stage.process(repo));
            finish(runner.stage(), &summary, started);
        }

        Commands::Extract { input, clones, output, schedule } => {
            let repos = load_repo_list(&input)?;
            let stage = ExtractStage::new(&config.git, &config.extractor, clones, output);
            let runner = StageRunner::new("extract", schedule.schedule()?);
            let summary = runner.run(&repos, |repo| stage.process(repo));
            finish(runner.stage(), &summary, started);
        }

        Commands::Export { input, dbs, output, skip } => {
            let repos = load_repo_list(&input)?;
            let runner = StageRunner::new("export", Schedule::new(skip, 1)?);
            let report = stages::export_valid(&runner, &repos, &dbs, &output)?;
            finish(runner.stage(), &report.summary, started);
            ui::success(&format!("{} valid database(s) listed in {}", report.listed, output.display()));
        }

        Commands::Augment { input, schedule } => {
            let items = stages::load_db_items(&input)?;
            let runner = StageRunner::new("augment", schedule.schedule()?);
            let summary = runner.run(&items, stages::augment_database);
            finish(runner.stage(), &summary, started);
        }

        Commands::Metrics { input, schedule } => {
            let items = stages::load_db_items(&input)?;
            let counter = SccCounter::new(config.line_counter.program.clone());
            let stage = MetricsStage::new(counter, config.line_counter.chunk_size);
            let runner = StageRunner::new("metrics", schedule.schedule()?);
            let summary = runner.run(&items, |item| stage.process(item));
            finish(runner.stage(), &summary, started);
        }

        Commands::Stats { database } => {
            let db = CorpusDb::open_read_only(&database)?;
            ui::section(&database.display().to_string());
            println!("{}", db.stats()?);
        }
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over --verbose
    let level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let config = load_config(cli.config.as_deref())?;
    if let Err(e) = run(cli.command, &config) {
        ui::error(&format!("{:#}", e));
        std::process::exit(1);
    }
    Ok(())
}
