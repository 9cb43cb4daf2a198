//! CLI entry point for `mboxlite`.

use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};

use mboxlite::model::message::FormatKind;
use mboxlite::pipeline::{self, LightenOptions, RunStats};

#[derive(Parser)]
#[command(
    name = "mboxlite",
    version,
    about = "Strip quoted-reply noise from MBOX archives"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Input mailbox (classic mbox or mboxcl)
    #[arg(value_name = "INPUT")]
    input: Option<PathBuf>,

    /// Output mailbox (appended to if it already exists)
    #[arg(value_name = "OUTPUT")]
    output: Option<PathBuf>,

    /// Mailbox dialect, instead of auto-detection
    #[arg(short, long, value_enum, default_value = "auto")]
    format: FormatArg,

    /// Minimum number of consecutive quoted lines that gets a block deleted
    #[arg(short, long, value_name = "N")]
    blocksize: Option<usize>,

    /// Only delete a quoted block at the very end of the body
    #[arg(long)]
    trailing_only: bool,

    /// Classify lines containing '<' as quoted too
    #[arg(long)]
    quote_angle: bool,

    /// Do not treat "On ... wrote:" attribution lines as quoted
    #[arg(long)]
    no_attribution: bool,

    /// Print run statistics as JSON
    #[arg(long)]
    json: bool,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect the dialect of a mailbox file
    Detect { path: PathBuf },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum FormatArg {
    Auto,
    Mbox,
    Mboxcl,
}

impl FormatArg {
    fn to_kind(self) -> Option<FormatKind> {
        match self {
            FormatArg::Auto => None,
            FormatArg::Mbox => Some(FormatKind::Mbox),
            FormatArg::Mboxcl => Some(FormatKind::Mboxcl),
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = mboxlite::config::load_config();

    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    match cli.command {
        Some(Commands::Detect { path }) => cmd_detect(&path),
        Some(Commands::Completions { shell }) => cmd_completions(shell),
        Some(Commands::Manpage) => cmd_manpage(),
        None => match (cli.input.clone(), cli.output.clone()) {
            (Some(input), Some(output)) => cmd_lighten(&cli, &config, &input, &output),
            _ => {
                anyhow::bail!("expected an input and an output mailbox; see --help")
            }
        },
    }
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &mboxlite::config::Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_dir = mboxlite::config::cache_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "mboxlite.log");
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        // Fall back to stderr only
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

/// Run the lightening pipeline with a byte progress bar.
fn cmd_lighten(
    cli: &Cli,
    config: &mboxlite::config::Config,
    input: &Path,
    output: &Path,
) -> anyhow::Result<()> {
    let mut options = LightenOptions::from_config(config);
    options.format = cli.format.to_kind();
    if let Some(blocksize) = cli.blocksize {
        options.blocksize = blocksize;
    }
    if cli.trailing_only {
        options.trailing_only = true;
    }
    if cli.quote_angle {
        options.exclude_angle = false;
    }
    if cli.no_attribution {
        options.strip_attribution = false;
    }

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} Lightening [{bar:40.cyan/blue}] {bytes}/{total_bytes}")
            .expect("valid template")
            .progress_chars("#>-"),
    );

    let start = Instant::now();
    let stats = pipeline::run(
        input,
        output,
        &options,
        Some(&|current, total| {
            pb.set_length(total);
            pb.set_position(current);
        }),
    )?;
    pb.finish_and_clear();
    let elapsed = start.elapsed();

    if cli.json {
        print_stats_json(input, output, &stats, elapsed)?;
    } else {
        print_stats_table(input, output, &stats, elapsed);
    }

    Ok(())
}

/// Detect and print the mailbox dialect. Indeterminate is a failure.
fn cmd_detect(path: &Path) -> anyhow::Result<()> {
    let kind = mboxlite::parser::detect::FormatDetector::new().detect(path)?;
    if kind == FormatKind::Indeterminate {
        anyhow::bail!("{}: indeterminate mailbox dialect", path.display());
    }
    println!("{kind}");
    Ok(())
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "mboxlite", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}

/// Print run statistics in a human-readable table.
fn print_stats_table(input: &Path, output: &Path, stats: &RunStats, elapsed: std::time::Duration) {
    use humansize::{format_size, BINARY};

    let format = stats
        .format
        .map(|f| f.to_string())
        .unwrap_or_else(|| "unknown".to_string());

    println!();
    println!(
        "  {:<22} {} ({})",
        "Input",
        input.display(),
        format_size(stats.bytes_in, BINARY)
    );
    println!("  {:<22} {}", "Dialect", format);
    println!("  {:<22} {}", "Messages scanned", stats.scanned);
    println!("  {:<22} {}", "Messages written", stats.written);
    println!("  {:<22} {}", "Skipped (no content)", stats.skipped_no_content);
    println!("  {:<22} {}", "Skipped (no subject)", stats.skipped_no_subject);
    println!(
        "  {:<22} {} (+{})",
        "Output",
        output.display(),
        format_size(stats.bytes_out, BINARY)
    );
    println!("  {:<22} {:.2?}", "Elapsed", elapsed);
    println!();
}

/// Print run statistics as JSON.
fn print_stats_json(
    input: &Path,
    output: &Path,
    stats: &RunStats,
    elapsed: std::time::Duration,
) -> anyhow::Result<()> {
    let out = serde_json::json!({
        "input": input.to_string_lossy(),
        "output": output.to_string_lossy(),
        "format": stats.format.map(|f| f.to_string()),
        "scanned": stats.scanned,
        "written": stats.written,
        "skipped_no_content": stats.skipped_no_content,
        "skipped_no_subject": stats.skipped_no_subject,
        "bytes_in": stats.bytes_in,
        "bytes_out": stats.bytes_out,
        "elapsed_ms": elapsed.as_millis(),
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}
