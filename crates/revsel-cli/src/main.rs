//! Revsel - choose which commits a CI job should build next
//!
//! ## Commands
//!
//! - `select`: print the candidate revisions for a poll or a build
//! - `poll`: report whether anything worth building appeared
//! - `client`: resolve the repository backend required by the policies

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::{info, Level};

use revsel_core::{
    poll_all, with_client, BuildHistory, BuildResult, BuiltRevision, ChooserContext,
    ClientCapability, ClientKind, MemoryBuildHistory, PollJob, PollOutcome, PollTarget,
    RepositoryAccess, Revision, RevselError, SelectionConfig, TracingBuildLog,
};

#[derive(Parser)]
#[command(name = "revsel")]
#[command(version = revsel_core::VERSION)]
#[command(about = "Choose which commits of a git repository to build next", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Only warnings and build log lines
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Emit JSON log lines and JSON command output
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn log_level(&self) -> Level {
        if self.verbose {
            Level::DEBUG
        } else if self.quiet {
            Level::WARN
        } else {
            Level::INFO
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Print the candidate revisions, oldest first
    Select {
        #[command(flatten)]
        selection: SelectionArgs,

        /// Select for a poll instead of a build (no re-run fallback)
        #[arg(long)]
        poll: bool,
    },

    /// Check whether a build is needed
    Poll {
        #[command(flatten)]
        selection: SelectionArgs,
    },

    /// Resolve the repository client required by the configured policies
    Client {
        /// Selection config (TOML)
        #[arg(short, long, env = "REVSEL_CONFIG")]
        config: Option<PathBuf>,
    },
}

#[derive(Args)]
struct SelectionArgs {
    /// Repository to inspect
    #[arg(short, long, default_value = ".")]
    repo: PathBuf,

    /// Selection config (TOML)
    #[arg(short, long, env = "REVSEL_CONFIG")]
    config: Option<PathBuf>,

    /// Single branch to build (default chooser only)
    #[arg(short, long)]
    branch: Option<String>,

    /// A previously built commit or ref (repeatable)
    #[arg(long = "built")]
    built: Vec<String>,

    /// The most recently built commit or ref
    #[arg(long)]
    last_built: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    revsel_core::telemetry::init_tracing(cli.json, cli.log_level());

    match cli.command {
        Commands::Select { selection, poll } => cmd_select(&selection, poll, cli.json),
        Commands::Poll { selection } => cmd_poll(&selection, cli.json).await,
        Commands::Client { config } => cmd_client(config.as_deref(), cli.json),
    }
}

fn load_config(path: Option<&Path>) -> Result<SelectionConfig> {
    match path {
        Some(path) => SelectionConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(SelectionConfig::default()),
    }
}

/// Build a ledger from `--built` and `--last-built`, resolving refs.
fn seed_history(
    repo: &dyn RepositoryAccess,
    built: &[String],
    last_built: Option<&str>,
) -> revsel_core::Result<MemoryBuildHistory> {
    let history = MemoryBuildHistory::new();
    let revs = built.iter().map(String::as_str).chain(last_built);
    for (i, rev) in revs.enumerate() {
        let sha1 = repo.rev_parse(rev)?.ok_or_else(|| {
            RevselError::Config(format!("'{rev}' does not name a commit"))
        })?;
        history.save_build(BuiltRevision::new(
            i as u64 + 1,
            Revision::new(sha1),
            BuildResult::Success,
        ));
    }
    Ok(history)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn cmd_select(args: &SelectionArgs, is_poll: bool, json: bool) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let client = config
        .resolve_client()
        .context("Failed to resolve repository client")?;
    let chooser = config.chooser();
    let env = config.environment();
    let log = TracingBuildLog::scoped(args.repo.display().to_string());

    let revisions = with_client(client, &args.repo, |repo| {
        let history = seed_history(repo, &args.built, args.last_built.as_deref())?;
        let ctx = ChooserContext {
            branches: config.branch_specs(),
            remotes: &config.remotes,
            env: &env,
            history: &history,
            log: &log,
        };
        chooser.candidate_revisions(is_poll, args.branch.as_deref(), repo, &ctx)
    })
    .with_context(|| format!("Selection failed for {}", args.repo.display()))?;

    info!(chooser = chooser.name(), candidates = revisions.len(), "selection done");

    if json {
        return print_json(&revisions);
    }
    if revisions.is_empty() {
        println!("No candidate revisions");
    }
    for rev in &revisions {
        println!("{} {}", rev.sha1, rev.branch_names().join(","));
    }
    Ok(())
}

async fn cmd_poll(args: &SelectionArgs, json: bool) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let client = config
        .resolve_client()
        .context("Failed to resolve repository client")?;

    let history = with_client(client, &args.repo, |repo| {
        seed_history(repo, &args.built, args.last_built.as_deref())
    })
    .with_context(|| format!("Failed to open {}", args.repo.display()))?;

    let history: Arc<dyn BuildHistory> = Arc::new(history);
    let mut job = PollJob::new(
        args.repo.display().to_string(),
        PollTarget::Path(args.repo.clone()),
        Arc::new(config),
        history,
    );
    if let Some(branch) = &args.branch {
        job = job.with_single_branch(branch.clone());
    }

    let Some(report) = poll_all(vec![job]).await.into_iter().next() else {
        bail!("poll produced no report");
    };
    let outcome = report
        .outcome
        .with_context(|| format!("Poll failed for {}", report.name))?;

    if json {
        return print_json(&outcome);
    }
    match outcome {
        PollOutcome::Significant { revision } => println!("significant {revision}"),
        PollOutcome::NoChanges => println!("no changes"),
    }
    Ok(())
}

#[derive(Serialize)]
struct ClientReport {
    required: ClientCapability,
    client: ClientKind,
    requires_workspace_for_polling: bool,
}

fn cmd_client(config: Option<&Path>, json: bool) -> Result<()> {
    let config = load_config(config)?;
    let chain = config.exclusion_chain()?;
    let required = chain
        .required_client()
        .context("Configured policies require conflicting clients")?;
    let client = config.resolve_client()?;

    let report = ClientReport {
        required,
        client,
        requires_workspace_for_polling: chain.requires_workspace_for_polling(),
    };
    if json {
        return print_json(&report);
    }
    println!("required: {}", report.required);
    println!("client:   {}", report.client);
    Ok(())
}
