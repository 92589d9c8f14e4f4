use spot_termination_exporter::config::{ConfigOverrides, ExporterConfig};

use std::path::PathBuf;
use structopt::StructOpt;

/// Validates an exporter config file
#[derive(StructOpt, Debug)]
#[structopt(name = "validate-config")]
struct Opt {
    /// Verbose mode (-v)
    #[structopt(short = "v", long = "verbose", parse(from_occurrences))]
    verbose: u8,

    /// Config file to validate
    #[structopt(name = "CONFIG_FILE", parse(from_os_str))]
    file: PathBuf,
}

fn main() {
    let args = Opt::from_args();

    let config = match ExporterConfig::load(Some(&args.file), ConfigOverrides::default()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Config invalid: {}", e);
            std::process::exit(1);
        }
    };
    if args.verbose > 0 {
        eprintln!("{:#?}", config);
    }

    println!("Config okay.");
}
