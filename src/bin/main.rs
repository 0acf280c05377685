use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::Notify;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::ChronoLocal;
use waterfall_exec::shell::{command_job, parse_job_line};
use waterfall_exec::{
    Executor, ExecutorConfig, JobQueue, OPTIONS_ENV_VAR, RunOptions, load_options_file,
    load_run_options,
};

#[derive(Parser)]
#[command(name = "waterfall-exec")]
#[command(about = "Run shell commands one after another, waterfall style")]
struct Cli {
    /// Log every job and continuation
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run each line of FILE (or stdin) as a shell command, in order
    Run {
        /// Job script; reads stdin when omitted or `-`
        file: Option<PathBuf>,
        /// Keep running and execute lines as they arrive, until end of input
        #[arg(long)]
        follow: bool,
        /// Fail if no new line arrives within this many milliseconds (0 disables)
        #[arg(long)]
        wait_timeout_ms: Option<u64>,
        /// How often to check for new lines while waiting
        #[arg(long)]
        check_interval_ms: Option<u64>,
        /// JSON run options file
        #[arg(long, env = OPTIONS_ENV_VAR)]
        options: Option<PathBuf>,
    },
    /// Validate a run options file and print it normalized
    CheckOptions { path: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let directive = if cli.verbose {
        "waterfall_exec=debug"
    } else {
        "waterfall_exec=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(directive.parse()?))
        .with_timer(ChronoLocal::rfc_3339())
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run {
            file,
            follow,
            wait_timeout_ms,
            check_interval_ms,
            options,
        } => {
            let mut run_options = load_run_options(options.as_deref())?;
            if follow {
                run_options.wait_for_items = true;
            }
            if let Some(ms) = wait_timeout_ms {
                run_options.wait_timeout = (ms > 0).then(|| Duration::from_millis(ms));
            }
            if let Some(ms) = check_interval_ms {
                run_options.check_interval = Duration::from_millis(ms);
            }

            let input = open_input(file.as_deref()).await?;
            let result = if follow {
                run_following(input, run_options).await?
            } else {
                run_script(input, run_options).await?
            };

            if let Some(output) = result {
                println!("{}", output);
            }
        }
        Commands::CheckOptions { path } => {
            let options = load_options_file(&path)?;
            println!("{}", serde_json::to_string_pretty(&options)?);
        }
    }

    Ok(())
}

type Input = BufReader<Box<dyn AsyncRead + Unpin + Send>>;

async fn open_input(file: Option<&Path>) -> Result<Input> {
    let reader: Box<dyn AsyncRead + Unpin + Send> = match file {
        Some(path) if path != Path::new("-") => Box::new(
            tokio::fs::File::open(path)
                .await
                .with_context(|| format!("Failed to open job script {}", path.display()))?,
        ),
        _ => Box::new(tokio::io::stdin()),
    };
    Ok(BufReader::new(reader))
}

fn executor() -> Executor<String> {
    Executor::with_config(ExecutorConfig::new().on_new_continuation(|continuation| {
        debug!(
            "Run {}: continuation for job {} started",
            continuation.run_id(),
            continuation.position()
        );
    }))
}

/// Read the whole script, then run it.
async fn run_script(input: Input, options: RunOptions) -> Result<Option<String>> {
    let queue = JobQueue::new();
    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        if let Some(command) = parse_job_line(&line) {
            queue.push(command_job(command));
        }
    }
    info!("Loaded {} jobs", queue.len());

    Ok(executor().exec(queue, options).await?)
}

/// Run lines as they are read; end of input stops the run.
async fn run_following(input: Input, options: RunOptions) -> Result<Option<String>> {
    let executor = executor();
    let queue = JobQueue::new();
    let check_interval = options.check_interval;
    let finished = Notify::new();
    let mut lines = input.lines();

    let run = async {
        let result = executor.exec(queue.clone(), options).await;
        finished.notify_one();
        result
    };

    let producer = async {
        let reading = async {
            while let Some(line) = lines.next_line().await? {
                if let Some(command) = parse_job_line(&line) {
                    debug!("Queued `{}`", command);
                    queue.push(command_job(command));
                }
            }
            anyhow::Ok(())
        };

        tokio::select! {
            read = reading => {
                info!("End of input, stopping after the queued jobs");
                wait_until_taken(&executor, &queue, check_interval).await;
                executor.stop();
                read
            }
            // The run ended on its own (failure or timeout).
            _ = finished.notified() => Ok(()),
        }
    };

    // `join!` polls the run first, so it is registered before the producer
    // can reach end of input and stop it.
    let (result, read) = tokio::join!(run, producer);
    let value = result?;
    read.context("Failed to read job input")?;
    Ok(value)
}

/// Wait until the executor has taken every queued job, or the run is over.
///
/// `stop` drops whatever is still queued, so stopping right at end of input
/// would skip lines that were read but not yet run. The job in flight when
/// this returns still runs and supplies the result.
async fn wait_until_taken(executor: &Executor<String>, queue: &JobQueue<String>, every: Duration) {
    while !queue.is_empty() && executor.is_running() {
        tokio::time::sleep(every).await;
    }
}
