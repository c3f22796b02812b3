use anyhow::Context;
use clap::Parser;
use promframes::{
    client::{ClientConfig, PrometheusClient},
    DispatchConfig, Dispatcher, Query,
};
use std::{fs, path::PathBuf, time::Duration};
use tokio_util::sync::CancellationToken;

/// Run a batch of Prometheus queries and print the resulting frames as JSON.
#[derive(Parser)]
#[command(name = "promframes", version, about)]
struct Cli {
    /// Prometheus base URL
    #[arg(long, default_value = "http://localhost:9090")]
    url: String,

    /// JSON file holding the list of queries to run
    #[arg(long)]
    queries: PathBuf,

    /// Per-query timeout, e.g. "30s"
    #[arg(long, value_parser = humantime::parse_duration)]
    timeout: Option<Duration>,

    /// Number of queries sent to Prometheus at once
    #[arg(long, default_value_t = 16)]
    concurrency: usize,

    /// Pretty-print the output
    #[arg(long)]
    pretty: bool,
}

impl Cli {
    async fn run(self) -> anyhow::Result<()> {
        let batch = fs::read(&self.queries)
            .with_context(|| format!("reading {}", self.queries.display()))?;
        let queries: Vec<Query> = serde_json::from_slice(&batch)
            .with_context(|| format!("parsing {}", self.queries.display()))?;

        let client = PrometheusClient::new(ClientConfig {
            url: self.url,
            timeout: self.timeout,
            ..Default::default()
        })?;
        let dispatcher = Dispatcher::new(
            client,
            DispatchConfig {
                max_concurrent_queries: self.concurrency,
                query_timeout: self.timeout,
                ..Default::default()
            },
        )?;

        let cancel = CancellationToken::new();
        let on_interrupt = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::info!("interrupted, cancelling batch");
                on_interrupt.cancel();
            }
        });

        let response = dispatcher.execute(queries, cancel).await?;
        let out = if self.pretty {
            serde_json::to_string_pretty(&response)?
        } else {
            serde_json::to_string(&response)?
        };
        println!("{}", out);
        Ok(())
    }
}

#[tokio::main]
async fn main() {
    env_logger::init();
    let cli = Cli::parse();
    if let Err(e) = cli.run().await {
        eprintln!("Error: {e}");
        for cause in e.chain().skip(1) {
            eprintln!("  caused by: {cause}");
        }
        std::process::exit(1);
    }
}
