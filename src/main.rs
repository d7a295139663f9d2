//! Continuous coverage history tool
//!
//! Registers coverage reports once per day and prints coverage summaries,
//! annotated sources and change histories.

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;
use tokio::runtime::Runtime;
use tokio::sync::mpsc;

use covhist::store::{Filter, Matcher, SourceRepo};
use covhist::types::ProgressEstimate;
use covhist::{parser, register, view, Config, Error, Revision, Store, View};

#[derive(Parser, Debug)]
#[command(name = "covhist", author, version, about, long_about = None)]
struct Cli {
    /// Configuration file (default: ./covhist.toml, then the user config dir)
    #[arg(short, long, global = true, value_name = "FILE")]
    conf: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Initialize database
    Init,
    /// Output meta information of database
    Info {
        /// initialized?, first-date, last-date, last-registered-date or backends
        kind: String,
    },
    /// Gather coverage files and record the coverage to database
    Register {
        /// Date YYYYmmdd (default: today)
        #[arg(short, long, value_parser = parse_revision)]
        date: Option<Revision>,
        /// Directory holding the coverage reports
        dir: PathBuf,
    },
    /// Show coverage summary
    View {
        /// YYYYmmdd, wYYYYmmdd, dYYYYmmdd, YYYYmmdddYYYYmmdd or cYYYYmmdd (default: last date)
        #[arg(short, long)]
        date: Option<String>,
        #[command(flatten)]
        filter: FilterArgs,
        /// Directory or file (default: the whole tree)
        path: Option<String>,
    },
}

#[derive(Args, Debug)]
struct FilterArgs {
    /// Named filter preset from the configuration
    #[arg(long)]
    query: Option<String>,
    /// Only reports of this adapter (gcov, rbcov)
    #[arg(long)]
    adapter: Option<String>,
    /// Only files with this extension
    #[arg(long)]
    ext: Option<String>,
    /// Comma-separated directory patterns to include
    #[arg(long)]
    incl: Option<String>,
    /// Comma-separated directory patterns to exclude
    #[arg(long)]
    excl: Option<String>,
}

impl FilterArgs {
    fn compile(self, config: &Config) -> anyhow::Result<Matcher> {
        let preset = match &self.query {
            Some(name) => config.query(name)?.clone(),
            None => Filter::default(),
        };
        let explicit = Filter {
            adapter: self.adapter,
            ext: self.ext,
            incl: self.incl,
            excl: self.excl,
        };
        Ok(preset.merged(&explicit).compile()?)
    }
}

fn parse_revision(s: &str) -> Result<Revision, Error> {
    Revision::parse_path(s)
}

/// One progress bar per stage. A finished stage is left as a
/// `stage: x sec.` line.
struct StageProgress {
    target: fn() -> ProgressDrawTarget,
    counted: ProgressStyle,
    spinner: ProgressStyle,
    done: ProgressStyle,
    stage: Option<&'static str>,
    bar: ProgressBar,
}

impl StageProgress {
    fn new(target: fn() -> ProgressDrawTarget) -> anyhow::Result<Self> {
        Ok(Self {
            target,
            counted: ProgressStyle::with_template("{msg}... {pos} / {len} ({percent}%)")?,
            spinner: ProgressStyle::with_template("{msg}... {pos}")?,
            done: ProgressStyle::with_template("{msg}")?,
            stage: None,
            bar: ProgressBar::hidden(),
        })
    }

    fn update(&mut self, estimate: &ProgressEstimate) {
        if self.stage != Some(estimate.stage) {
            self.finish();
            let style = match estimate.total {
                Some(_) => self.counted.clone(),
                None => self.spinner.clone(),
            };
            self.bar = ProgressBar::with_draw_target(estimate.total.map(|t| t as u64), (self.target)())
                .with_style(style)
                .with_message(estimate.stage);
            self.stage = Some(estimate.stage);
        }
        if let Some(total) = estimate.total {
            self.bar.set_length(total as u64);
        }
        self.bar.set_position(estimate.processed as u64);
    }

    fn finish(&mut self) {
        if let Some(stage) = self.stage.take() {
            let elapsed = self.bar.elapsed().as_secs_f64();
            self.bar.set_style(self.done.clone());
            self.bar.finish_with_message(format!("{}: {:.1} sec.", stage, elapsed));
        }
    }
}

fn info(config: &Config, kind: &str) -> anyhow::Result<()> {
    let root = &config.database_path;
    if kind == "initialized?" {
        println!("{}", Store::is_initialized(root));
        return Ok(());
    }
    if kind == "backends" {
        println!("{}", SourceRepo::version());
        return Ok(());
    }

    let store = Store::open(root)?;
    let all = Matcher::all();
    let date = match kind {
        "first-date" => store.first_date(&all),
        "last-date" => store.last_date(&all),
        "last-registered-date" => store.last_registered_date(),
        other => bail!("unknown information: {}", other),
    };
    if let Some(date) = date {
        println!("{}", date.to_path());
    }
    Ok(())
}

async fn register_dir(config: &Config, date: Option<Revision>, dir: PathBuf) -> anyhow::Result<()> {
    let mut store = Store::open(&config.database_path)?;
    let date = date.unwrap_or_else(Revision::today);
    if let Some(last) = store.last_registered_date() {
        if date <= last {
            return Err(Error::DateNotNewer(last).into());
        }
    }
    let skip = config.skip_matcher()?;

    let mut progress = StageProgress::new(ProgressDrawTarget::stdout)?;
    let files = parser::gather(&dir, &skip, |estimate| progress.update(&estimate))
        .with_context(|| format!("failed to gather coverage from {}", dir.display()))?;

    let (tx, mut rx) = mpsc::channel(32);
    let registration = register(&mut store, date, files, Some(tx));
    let drain = async {
        while let Some(estimate) = rx.recv().await {
            progress.update(&estimate);
        }
    };
    let (result, ()) = tokio::join!(registration, drain);
    progress.finish();
    result?;
    Ok(())
}

fn view_path(config: &Config, date: Option<String>, filter: FilterArgs, path: Option<String>) -> anyhow::Result<()> {
    let start_time = Instant::now();
    let store = Store::open(&config.database_path)?;
    let view = date.map(|d| d.parse::<View>()).transpose()?;
    let matcher = filter.compile(config)?;

    let (view, text) = view::render(&store, view, path.as_deref().unwrap_or(""), &matcher)?;
    println!("  date: {}", view.to_show());
    println!();
    for line in text.lines() {
        println!("  {}", line);
    }
    println!();
    println!("  elipsed time: {:.1} sec.", start_time.elapsed().as_secs_f64());
    Ok(())
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load(cli.conf.as_deref())?;
    match cli.command {
        Command::Init => {
            Store::init(&config.database_path)?;
        }
        Command::Info { kind } => info(&config, &kind)?,
        Command::Register { date, dir } => {
            let rt = Runtime::new()?;
            rt.block_on(register_dir(&config, date, dir))?;
        }
        Command::View { date, filter, path } => view_path(&config, date, filter, path)?,
    }
    Ok(())
}

fn main() -> ExitCode {
    let default_level = if cfg!(feature = "dev") { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use covhist::analysis::register::REGISTER_STAGE;
    use covhist::parser::GATHER_STAGE;
    use pretty_assertions::assert_eq;

    fn estimate(stage: &'static str, processed: usize, total: Option<usize>) -> ProgressEstimate {
        ProgressEstimate { stage, processed, total }
    }

    #[test]
    fn test_stage_progress_finishes_each_stage() {
        let mut progress = StageProgress::new(ProgressDrawTarget::hidden).unwrap();
        progress.update(&estimate(GATHER_STAGE, 1, None));
        progress.update(&estimate(GATHER_STAGE, 2, None));
        assert_eq!((progress.bar.position(), progress.bar.length()), (2, None));
        let gathered = progress.bar.clone();

        progress.update(&estimate(REGISTER_STAGE, 1, Some(4)));
        assert!(gathered.is_finished());
        assert!(gathered.message().starts_with("gather source code: "));
        assert_eq!((progress.bar.position(), progress.bar.length()), (1, Some(4)));
        assert_eq!(progress.bar.message(), REGISTER_STAGE);

        progress.update(&estimate(REGISTER_STAGE, 4, Some(4)));
        progress.finish();
        assert!(progress.bar.is_finished());
        let message = progress.bar.message();
        assert!(message.starts_with("register to database: ") && message.ends_with(" sec."));

        // nothing left to finish
        progress.finish();
        assert_eq!(progress.bar.message(), message);
    }
}
