use clap::{CommandFactory, Parser};
use log::error;
use std::io::{self, Write};
use std::process::exit;
use tlsinspect::{inspect, presenter, Config, ConfigError, DEFAULT_PORT};

/// Inspect the certificate presented by a TLS server
#[derive(Parser, Debug)]
#[command(name = "tlsinspect", version, about, long_about = None)]
struct Cli {
    /// Target hostname
    #[arg(long)]
    hostname: Option<String>,

    /// Target port
    #[arg(long, default_value = DEFAULT_PORT)]
    port: String,
}

fn init_logger() {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    builder.format(|buf, record| {
        writeln!(
            buf,
            "{}: {}",
            record.level().to_string().to_lowercase(),
            record.args()
        )
    });
    let _ = builder.try_init();
}

fn main() {
    init_logger();
    let cli = Cli::parse();

    let config = match Config::from_cli_args(cli.hostname, Some(cli.port)) {
        Ok(config) => config,
        Err(ConfigError::MissingHostname) => {
            let _ = Cli::command().print_help();
            exit(0);
        }
    };

    match inspect(&config) {
        Ok(report) => {
            let stdout = io::stdout();
            if let Err(e) = presenter::present(&mut stdout.lock(), &report, config.label_width) {
                error!("failed to write output: {}", e);
                exit(1);
            }
        }
        Err(err) => {
            error!("{}", err);
            exit(1);
        }
    }

    exit(0);
}
