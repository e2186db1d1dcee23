mod app;
mod ingest;
mod model;
mod pipeline;
mod progress;
mod sink;

use clap::Parser;
use logpull_core::config::{default_from, parse_time};
use logpull_core::{shutdown, telemetry, Config, FetchConfig, OutputFormat};
use model::FetchOutcome;
use std::path::PathBuf;
use std::process;
use tracing::{error, info};

#[derive(Parser)]
#[clap(name = "logpull")]
#[clap(about = "Export logs from Datadog with resumable cursor pagination", version)]
struct Cli {
    /// The filter query (search term)
    #[clap(long)]
    query: String,

    /// Which index to read from
    #[clap(long, default_value = "main")]
    index: String,

    /// Start date/time, RFC3339 or Unix seconds (default: 24 hours ago)
    #[clap(long)]
    from: Option<String>,

    /// End date/time, RFC3339 or Unix seconds (default: now)
    #[clap(long)]
    to: Option<String>,

    /// Results per page (max 5000)
    #[clap(long, default_value_t = 1000)]
    page_size: u32,

    /// Output file path; empty or "-" writes to stdout
    #[clap(long, default_value = "results.json")]
    output: String,

    /// Output format: json (buffered) or ndjson (streaming)
    #[clap(long, default_value = "json")]
    format: String,

    /// Page cursor to resume from (ndjson only)
    #[clap(long)]
    cursor: Option<String>,

    /// Append to the output file instead of truncating it (ndjson only)
    #[clap(long)]
    append: bool,

    /// Datadog API key
    #[clap(long, env = "DD_API_KEY", hide_env_values = true, default_value = "")]
    api_key: String,

    /// Datadog application key
    #[clap(long, env = "DD_APP_KEY", hide_env_values = true, default_value = "")]
    app_key: String,

    /// Datadog site, e.g. datadoghq.eu (default: datadoghq.com)
    #[clap(long, env = "DD_SITE")]
    site: Option<String>,
}

impl Cli {
    fn fetch_config(&self) -> anyhow::Result<FetchConfig> {
        let from = match self.from.as_deref() {
            Some(s) => parse_time(s).map_err(|e| anyhow::anyhow!("--from: {}", e))?,
            None => default_from(),
        };
        let to = self
            .to
            .as_deref()
            .map(parse_time)
            .transpose()
            .map_err(|e| anyhow::anyhow!("--to: {}", e))?;

        let output = match self.output.as_str() {
            "" | "-" => None,
            path => Some(PathBuf::from(path)),
        };

        Ok(FetchConfig {
            query: self.query.clone(),
            index: Some(self.index.clone()).filter(|i| !i.is_empty()),
            from,
            to,
            page_size: self.page_size,
            cursor: self.cursor.clone().filter(|c| !c.is_empty()),
            format: self.format.parse::<OutputFormat>()?,
            append: self.append,
            output,
        })
    }
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!(error = %e, "Fatal error");
        eprintln!("Fetch failed: {:#}", e);
        process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = Config::load()
        .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;

    // Initialize telemetry
    telemetry::init(&config.telemetry)?;

    if let Some(site) = cli.site.clone().filter(|s| !s.is_empty()) {
        config.api.site = site;
    }

    let fetch = cli
        .fetch_config()
        .map_err(|e| anyhow::anyhow!("Configuration error: {:#}", e))?;
    let credentials = app::Credentials {
        api_key: cli.api_key.clone(),
        app_key: cli.app_key.clone(),
    };

    let mut app = app::App::new(&config, fetch, credentials)
        .map_err(|e| anyhow::anyhow!("Failed to create fetcher: {}", e))?;

    let mut shutdown = shutdown::on_os_signal();
    match app.run(&mut shutdown).await? {
        FetchOutcome::Completed { records, pages } => {
            info!(records, pages, "Export finished");
        }
        FetchOutcome::Cancelled { cursor, records, .. } => {
            info!(?cursor, records, "Export interrupted");
        }
    }

    telemetry::shutdown();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["logpull", "--query", "service:web"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn defaults_match_documented_flags() {
        let fetch = cli(&[]).fetch_config().unwrap();
        assert_eq!(fetch.index.as_deref(), Some("main"));
        assert_eq!(fetch.page_size, 1000);
        assert_eq!(fetch.format, OutputFormat::Json);
        assert_eq!(fetch.output, Some(PathBuf::from("results.json")));
        assert_eq!(fetch.to, None);
        assert!(fetch.cursor.is_none());
    }

    #[test]
    fn dash_output_means_stdout() {
        let fetch = cli(&["--output", "-", "--format", "ndjson"]).fetch_config().unwrap();
        assert_eq!(fetch.output, None);
        assert_eq!(fetch.format, OutputFormat::Ndjson);
    }

    #[test]
    fn unsupported_format_is_rejected_up_front() {
        let err = cli(&["--format", "xml"]).fetch_config().unwrap_err();
        assert!(err.to_string().contains("unsupported format: xml"), "{err}");
    }

    #[test]
    fn bad_time_names_the_flag() {
        let err = cli(&["--from", "last tuesday"]).fetch_config().unwrap_err();
        assert!(err.to_string().starts_with("--from:"), "{err}");
    }

    #[test]
    fn resume_flags_pass_through() {
        let fetch = cli(&[
            "--format",
            "ndjson",
            "--cursor",
            "C2",
            "--append",
            "--from",
            "1705312800",
        ])
        .fetch_config()
        .unwrap();
        assert_eq!(fetch.cursor.as_deref(), Some("C2"));
        assert!(fetch.append);
        assert_eq!(fetch.from.timestamp(), 1_705_312_800);
        fetch.validate().unwrap();
    }
}
