use std::path::PathBuf;

use failure::Error;
use log::{error, info, LevelFilter};
use spot_termination_exporter::config::{ConfigOverrides, ExporterConfig};
use spot_termination_exporter::server;
use structopt::StructOpt;

/// Exposes AWS spot instance termination notices as Prometheus metrics
#[derive(StructOpt, Debug)]
#[structopt(name = "spot-termination-exporter")]
struct Opt {
    /// Verbose mode (-v, -vv)
    #[structopt(short = "v", long = "verbose", parse(from_occurrences))]
    verbose: u8,

    /// Config file
    #[structopt(short = "c", long = "config", name = "config", parse(from_os_str))]
    config: Option<PathBuf>,

    /// Address to listen on for scrapes [default: 0.0.0.0:9189]
    #[structopt(long = "bind-addr", name = "bind-addr")]
    bind_addr: Option<String>,

    /// Path under which to expose metrics [default: /metrics]
    #[structopt(long = "metrics-path", name = "metrics-path")]
    metrics_path: Option<String>,

    /// Metadata service endpoint [default: http://169.254.169.254/latest/meta-data/]
    #[structopt(long = "metadata-endpoint", name = "metadata-endpoint")]
    metadata_endpoint: Option<String>,
}

fn main() {
    let args = Opt::from_args();
    init_logger(args.verbose);

    if let Err(e) = run(args) {
        error!("Failed to run exporter: {}", e);
        for cause in e.iter_causes() {
            error!("  caused by: {}", cause);
        }
        std::process::exit(1);
    }
}

fn init_logger(verbose: u8) {
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if verbose == 1 {
        builder.filter_level(LevelFilter::Debug);
    } else if verbose > 1 {
        builder.filter_level(LevelFilter::Trace);
    }
    builder.init();
}

fn run(args: Opt) -> Result<(), Error> {
    let overrides = ConfigOverrides {
        bind_address:      args.bind_addr,
        metrics_path:      args.metrics_path,
        metadata_endpoint: args.metadata_endpoint,
    };
    let config = ExporterConfig::load(args.config.as_ref(), overrides)?;
    let registry = spot_termination_exporter::registry(&config)?;
    let bind_address = config.bind_address()?;

    info!(
        "Starting exporter for metadata endpoint '{}', version {}.",
        config.metadata.endpoint,
        env!("CARGO_PKG_VERSION")
    );

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async move {
        let (_, server) = server::bind(bind_address, &config.listen.metrics_path, registry)?;
        server.await;
        Ok::<(), Error>(())
    })
}
