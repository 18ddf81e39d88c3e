//! psel: label-matcher injection and list-payload decoding from the shell.

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use promsel::Config;

mod commands;

#[derive(Parser)]
#[command(name = "psel")]
#[command(about = "Inject label matchers into metric queries and decode label payloads")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config.toml under the config root
    Init,

    /// Merge one matcher into a selector body
    Merge {
        /// Selector body, with or without braces (e.g. 'job="api",env="prod"')
        body: String,
        key: String,
        value: String,

        /// Matcher operator: =, !=, =~ or !~ (default from config)
        #[arg(short = 'o', long = "op")]
        op: Option<String>,

        /// Treat the value as a number
        #[arg(short = 'n', long = "numeric")]
        numeric: bool,
    },

    /// Add a matcher to every metric reference in an expression
    Add {
        expr: String,
        key: String,
        value: String,

        /// Matcher operator: =, !=, =~ or !~ (default from config)
        #[arg(short = 'o', long = "op")]
        op: Option<String>,

        /// Treat the value as a number
        #[arg(short = 'n', long = "numeric")]
        numeric: bool,
    },

    /// Apply adhoc filters to an expression
    Apply {
        expr: String,

        /// Filter as key<op>value (repeatable), applied after config filters
        #[arg(short = 'f', long = "filter")]
        filters: Vec<String>,

        /// Ignore filters from config.toml
        #[arg(long = "no-config-filters")]
        no_config_filters: bool,
    },

    /// Escape a value for use in a regex matcher
    Escape { value: String },

    /// Decode a backend list response into records (JSON lines)
    Decode {
        /// tag-keys, tag-values, labels or metric-find
        variant: String,

        /// File with the JSON response (reads stdin if not provided)
        file: Option<String>,
    },

    /// Apply config filters and variables to a panel query (JSON)
    Render {
        /// File with the query JSON (reads stdin if not provided)
        file: Option<String>,
    },

    /// Print the backend request for a list variant
    Target {
        /// tag-keys, tag-values, labels or metric-find
        variant: String,

        /// Label key (tag-values)
        #[arg(short = 'k', long = "key")]
        key: Option<String>,

        /// Variable query text (metric-find)
        #[arg(short = 'q', long = "query")]
        query: Option<String>,

        /// Query language (metric-find)
        #[arg(short = 'l', long = "lang", default_value = "promql")]
        lang: String,

        /// Range start, epoch milliseconds
        #[arg(long = "from", requires = "to")]
        from: Option<i64>,

        /// Range end, epoch milliseconds
        #[arg(long = "to", requires = "from")]
        to: Option<i64>,
    },
}

/// Log to stderr. PROMSEL_LOG overrides the config's `log_filter`.
fn init_logging() {
    let fallback = Config::load()
        .map(|config| config.log_filter)
        .unwrap_or_else(|_| "warn".to_string());
    let filter = EnvFilter::try_from_env("PROMSEL_LOG").unwrap_or_else(|_| EnvFilter::new(fallback));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging();

    let result = match cli.command {
        Commands::Init => commands::init(),
        Commands::Merge { body, key, value, op, numeric } => {
            commands::merge(&body, &key, &value, op.as_deref(), numeric)
        }
        Commands::Add { expr, key, value, op, numeric } => {
            commands::add(&expr, &key, &value, op.as_deref(), numeric)
        }
        Commands::Apply { expr, filters, no_config_filters } => {
            commands::apply(&expr, &filters, !no_config_filters)
        }
        Commands::Escape { value } => commands::escape(&value),
        Commands::Decode { variant, file } => commands::decode(&variant, file.as_deref()),
        Commands::Render { file } => commands::render(file.as_deref()),
        Commands::Target { variant, key, query, lang, from, to } => {
            let range = from.zip(to);
            commands::target(&variant, key.as_deref(), query.as_deref(), &lang, range)
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
