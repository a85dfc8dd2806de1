use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::filter::LevelFilter;

use crudbench_config::Overrides;

/// Crates whose log output the CLI enables
const LOG_TARGETS: [&str; 5] = [
    "crudbench_cli",
    "crudbench_core",
    "crudbench_config",
    "crudbench_sqlite",
    "crudbench_surrealdb",
];

/// Log level options for CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    /// No logging output
    Off,
    /// Error messages only
    Error,
    /// Warnings and errors
    Warn,
    /// Informational messages (default)
    Info,
    /// Debug messages, including per-call timings
    Debug,
    /// Trace-level messages (most verbose)
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => LevelFilter::OFF,
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

/// Which backends a run measures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum BackendChoice {
    /// SQLite first, then SurrealDB
    #[default]
    Both,
    Sqlite,
    Surrealdb,
}

impl BackendChoice {
    pub fn includes_sqlite(self) -> bool {
        matches!(self, Self::Both | Self::Sqlite)
    }

    pub fn includes_surrealdb(self) -> bool {
        matches!(self, Self::Both | Self::Surrealdb)
    }
}

#[derive(Parser, Debug)]
#[command(name = "crudbench")]
#[command(about = "crudbench - CRUD latency comparison between SQLite and SurrealDB")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Set log level (off, error, warn, info, debug, trace)
    #[arg(short = 'l', long, global = true, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Enable verbose logging (shortcut for --log-level=debug)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file path (defaults to ./crudbench.toml when present)
    #[arg(short = 'C', long, global = true)]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// Effective level: explicit `--log-level`, then `-v`, then info
    pub fn level(&self) -> LevelFilter {
        match (self.log_level, self.verbose) {
            (Some(level), _) => level.into(),
            (None, true) => LevelFilter::DEBUG,
            (None, false) => LevelFilter::INFO,
        }
    }

    /// `EnvFilter` directive string covering every crudbench crate
    pub fn log_filter(&self) -> String {
        let level = self.level().to_string().to_lowercase();
        LOG_TARGETS
            .iter()
            .map(|target| format!("{}={}", target, level))
            .collect::<Vec<_>>()
            .join(",")
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the benchmark and write the results CSV
    Run(RunArgs),

    /// Print the effective configuration as TOML
    Config,
}

#[derive(Args, Debug, Default, Clone)]
pub struct RunArgs {
    /// Workload sizes, ascending (e.g. 10,100,1000)
    #[arg(long, value_delimiter = ',')]
    pub sizes: Option<Vec<usize>>,

    /// Repetitions averaged per cell
    #[arg(short = 'n', long)]
    pub iterations: Option<usize>,

    /// Per-call timeout in seconds
    #[arg(long = "timeout")]
    pub timeout_secs: Option<u64>,

    /// Tabular CSV input, fed to SQLite
    #[arg(long)]
    pub tabular: Option<PathBuf>,

    /// Hierarchical JSON input, fed to SurrealDB
    #[arg(long)]
    pub hierarchical: Option<PathBuf>,

    /// Size of the synthetic population used when an input file is absent
    #[arg(long)]
    pub synthetic: Option<usize>,

    /// Seed for the synthetic population
    #[arg(long)]
    pub seed: Option<u64>,

    /// Directory the results CSV is written to
    #[arg(short = 'o', long)]
    pub output_dir: Option<PathBuf>,

    /// Clear both stores before the first tier
    #[arg(long)]
    pub reset: bool,

    /// Backends to measure
    #[arg(short = 'b', long, value_enum, default_value_t = BackendChoice::Both)]
    pub backend: BackendChoice,

    /// SQLite database file (":memory:" for an in-memory database)
    #[arg(long)]
    pub sqlite_path: Option<PathBuf>,

    /// SurrealDB endpoint (mem://, ws://host:port, ...)
    #[arg(long)]
    pub surreal_endpoint: Option<String>,
}

impl RunArgs {
    /// Flag layer of the configuration; unset flags leave lower layers alone
    pub fn overrides(&self) -> Overrides {
        Overrides {
            sizes: self.sizes.clone(),
            iterations: self.iterations,
            operation_timeout_secs: self.timeout_secs,
            reset_before_run: self.reset.then_some(true),
            tabular_path: self.tabular.clone(),
            hierarchical_path: self.hierarchical.clone(),
            synthetic_count: self.synthetic,
            synthetic_seed: self.seed,
            sqlite_path: self.sqlite_path.clone(),
            surreal_endpoint: self.surreal_endpoint.clone(),
            output_dir: self.output_dir.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("crudbench").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_run_flags() {
        let cli = parse(&[
            "run",
            "--sizes",
            "10,100",
            "-n",
            "3",
            "--tabular",
            "in.csv",
            "--reset",
            "--backend",
            "sqlite",
        ]);
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.sizes, Some(vec![10, 100]));
        assert_eq!(args.iterations, Some(3));
        assert_eq!(args.tabular, Some(PathBuf::from("in.csv")));
        assert_eq!(args.backend, BackendChoice::Sqlite);

        let overrides = args.overrides();
        assert_eq!(overrides.reset_before_run, Some(true));
        assert_eq!(overrides.hierarchical_path, None);
    }

    #[test]
    fn test_reset_flag_absent_leaves_config_alone() {
        let cli = parse(&["run"]);
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.overrides().reset_before_run, None);
        assert_eq!(args.backend, BackendChoice::Both);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = parse(&["config", "-C", "bench.toml", "-v"]);
        assert!(matches!(cli.command, Commands::Config));
        assert_eq!(cli.config, Some(PathBuf::from("bench.toml")));
        assert_eq!(cli.level(), LevelFilter::DEBUG);
    }

    #[test]
    fn test_log_level_beats_verbose() {
        let cli = parse(&["run", "-v", "--log-level", "warn"]);
        assert_eq!(cli.level(), LevelFilter::WARN);
        assert!(cli.log_filter().contains("crudbench_sqlite=warn"));
    }

    #[test]
    fn test_default_filter_is_info() {
        let cli = parse(&["run"]);
        assert_eq!(
            cli.log_filter(),
            "crudbench_cli=info,crudbench_core=info,crudbench_config=info,\
             crudbench_sqlite=info,crudbench_surrealdb=info"
        );
    }

    #[test]
    fn test_backend_choice() {
        assert!(BackendChoice::Both.includes_sqlite());
        assert!(BackendChoice::Both.includes_surrealdb());
        assert!(!BackendChoice::Sqlite.includes_surrealdb());
        assert!(!BackendChoice::Surrealdb.includes_sqlite());
    }

    #[test]
    fn test_rejects_unknown_backend() {
        let err = Cli::try_parse_from(["crudbench", "run", "--backend", "postgres"]);
        assert!(err.is_err());
    }
}
