//! refmirror - keeps a local mirror of the refcardz catalog and its documents.

#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

use std::env;
use std::path::PathBuf;

use refmirror::AppConfig;

fn print_usage() {
    eprintln!("Usage: refmirror [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --config <PATH>     Config file (default: {})", AppConfig::default_path().display());
    eprintln!("  --proxy             Route requests through the configured proxy");
    eprintln!("  --output <DIR>      Directory for downloaded documents");
    eprintln!("  --catalog <FILE>    Catalog file");
    eprintln!("  -h, --help          Show this help");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  {}      Account name, needed when there is something to download", refmirror::config::USER_ENV);
    eprintln!("  {}  Account password", refmirror::config::PASSWORD_ENV);
    eprintln!("  RUST_LOG            Log filter (default: info)");
}

#[derive(Debug, Default)]
struct CliArgs {
    config: Option<PathBuf>,
    proxy: bool,
    output: Option<PathBuf>,
    catalog: Option<PathBuf>,
}

fn required_value(args: &[String], i: usize, flag: &str) -> PathBuf {
    if let Some(value) = args.get(i) {
        return PathBuf::from(value);
    }
    eprintln!("Error: {flag} requires a value");
    std::process::exit(1);
}

fn parse_args() -> CliArgs {
    let args: Vec<String> = env::args().skip(1).collect();
    let mut cli = CliArgs::default();

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--config" => {
                i += 1;
                cli.config = Some(required_value(&args, i, "--config"));
            }
            "--proxy" => cli.proxy = true,
            "--output" => {
                i += 1;
                cli.output = Some(required_value(&args, i, "--output"));
            }
            "--catalog" => {
                i += 1;
                cli.catalog = Some(required_value(&args, i, "--catalog"));
            }
            "-h" | "--help" => {
                print_usage();
                std::process::exit(0);
            }
            other => {
                eprintln!("Error: unknown argument: {other}");
                print_usage();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    cli
}

fn build_config(cli: CliArgs) -> refmirror::Result<AppConfig> {
    let mut config = AppConfig::load(cli.config.as_deref())?;
    if cli.proxy {
        config = config.with_proxy_enabled();
    }
    if let Some(dir) = cli.output {
        config = config.with_output_dir(dir);
    }
    if let Some(file) = cli.catalog {
        config = config.with_catalog_file(file);
    }
    Ok(config)
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = parse_args();
    let result = match build_config(cli) {
        Ok(config) => refmirror::cli::run(config).await.map(|_| ()),
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        log::error!("{e}");
        std::process::exit(1);
    }
}
