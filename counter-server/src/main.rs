// a failing visitor counter should answer with 500, not take the process down
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::panic)]

use {
    std::{path::PathBuf, process::exit},
    tracing::{Level, info, error},
    tracing_subscriber::FmtSubscriber,
    clap::Parser,
    counter_server::{
        config::{CounterConfig, ServerConfig},
        error::ServerError,
        handler::CounterHandler,
        metrics::{Metrics, run_metrics_server},
        server::{bind, open_table_store, serve},
        service::CounterService,
    },
};

#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// yaml file with server settings, defaults are used when omitted
    #[arg(long)]
    config_file: Option<PathBuf>,

    /// table store connection string (`sqlite:<path>`, `sqlite::memory:` or an account connection string)
    #[arg(long, env = "COSMOS_CONNECTION_STRING", hide_env_values = true)]
    connection_string: Option<String>,
}

#[tokio::main]
async fn main() {
    FmtSubscriber::builder().with_max_level(Level::INFO).init();
    let args = Args::parse();

    if let Err(err) = run(args).await {
        error!("failed to run counter server: {err}");
        exit(-1);
    }
}

async fn run(args: Args) -> Result<(), ServerError> {
    let config = match args.config_file {
        Some(config_file) => {
            let config_path = std::env::current_dir()
                .map(|v| v.join(&config_file))
                .unwrap_or(config_file);
            info!("loading config from {config_path:?}");
            ServerConfig::load(config_path).await?
        },
        None => ServerConfig::default(),
    };

    let counter_config = CounterConfig::new(args.connection_string).with_table_name(config.table.clone());
    let store = open_table_store(&counter_config);

    let metrics = Metrics::new()?;
    if let Some(metrics_listen) = config.metrics_listen {
        tokio::spawn(run_metrics_server(bind(metrics_listen).await?, metrics.clone()));
    }

    let handler = CounterHandler::new(counter_config, store, metrics.clone());
    let service = CounterService::new(handler, &config.route, metrics);
    info!("serving visitor counter on {}", config.route);

    serve(bind(config.listen).await?, service, shutdown_signal()).await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("failed to listen for shutdown signal: {err:?}");
        std::future::pending::<()>().await;
    }
}
