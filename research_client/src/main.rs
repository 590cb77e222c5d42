use std::{fs, path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use research_lib::{JobRunner, JobStore, Pipeline, SimulatedPipeline};
use structopt::StructOpt;
use tracing_subscriber::EnvFilter;

use crate::http_pipeline::HttpPipeline;

mod http_pipeline;
mod operations;
mod render;

/// Submit research queries and follow them until they are done
#[derive(StructOpt, Debug)]
#[structopt(name = "research-client")]
struct Opt {
    /// base url of the research backend
    #[structopt(
        long,
        env = "RESEARCH_BACKEND_URL",
        default_value = "http://127.0.0.1:8000"
    )]
    backend_url: String,

    /// additional root certificate (PEM) for https backends
    #[structopt(long, parse(from_os_str))]
    ca_cert: Option<PathBuf>,

    /// give up on a query after this many seconds, 0 waits forever
    #[structopt(long, default_value = "300")]
    timeout_secs: u64,

    /// answer locally with canned results instead of calling the backend
    #[structopt(long)]
    simulate: bool,

    /// print jobs as json lines
    #[structopt(long)]
    json: bool,

    #[structopt(subcommand)]
    operation: Operation,
}

#[derive(Debug, StructOpt)]
enum Operation {
    Query(QueryOperation),
    Repl(ReplOperation),
    Health(HealthOperation),
}

/// Run a single query
#[derive(Debug, StructOpt)]
struct QueryOperation {
    #[structopt(name = "QUERY")]
    words: Vec<String>,
}

/// Read queries from stdin, one per line
#[derive(Debug, StructOpt)]
struct ReplOperation {
    /// wait for each query before accepting the next one
    #[structopt(long)]
    serial: bool,
}

/// Check whether the backend is up
#[derive(Debug, StructOpt)]
struct HealthOperation {}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn build_http_client(opt: &Opt) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder()
        .use_rustls_tls()
        .connect_timeout(Duration::from_secs(10));
    if let Some(ca_cert_path) = &opt.ca_cert {
        let ca_cert = fs::read(ca_cert_path)
            .with_context(|| format!("could not read CA certificate {:?}", ca_cert_path))?;
        let ca_cert =
            reqwest::Certificate::from_pem(&ca_cert).context("could not read CA certificate as PEM")?;
        builder = builder.add_root_certificate(ca_cert);
    }
    builder.build().context("could not build http client")
}

fn build_runner(pipeline: Arc<dyn Pipeline>, timeout_secs: u64) -> JobRunner {
    let runner = JobRunner::new(Arc::new(JobStore::new()), pipeline);
    if timeout_secs == 0 {
        runner
    } else {
        runner.with_timeout(Duration::from_secs(timeout_secs))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let opt = Opt::from_args();
    init_tracing();

    let http_pipeline = HttpPipeline::new(build_http_client(&opt)?, &opt.backend_url);
    if let Operation::Health(_) = opt.operation {
        println!("{}", operations::health(&http_pipeline).await);
        return Ok(());
    }

    let pipeline: Arc<dyn Pipeline> = if opt.simulate {
        Arc::new(SimulatedPipeline::new())
    } else {
        Arc::new(http_pipeline)
    };
    let runner = build_runner(pipeline, opt.timeout_secs);
    let mut stdout = std::io::stdout();

    match opt.operation {
        Operation::Query(query) => {
            let completed =
                operations::query(&runner, &query.words.join(" "), opt.json, &mut stdout).await?;
            if !completed {
                std::process::exit(1);
            }
        }
        Operation::Repl(repl) => {
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            operations::repl(&runner, repl.serial, opt.json, stdin, &mut stdout).await?;
        }
        Operation::Health(_) => {}
    }
    Ok(())
}
