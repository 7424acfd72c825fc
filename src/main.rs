use clap::Parser;
use homesim::api::cli::{Cli, Command, execute_compare, execute_run};
use tracing::error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "homesim=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let output = match cli.command {
        Command::Serve { port } => {
            if let Err(e) = homesim::api::run_http_server(port).await {
                error!("server error: {e}");
                std::process::exit(1);
            }
            return;
        }
        Command::Run(args) => execute_run(&args),
        Command::Compare(args) => execute_compare(&args),
    };

    match output {
        Ok(json) => println!("{json}"),
        Err(e) => {
            error!("{e}");
            std::process::exit(1);
        }
    }
}
