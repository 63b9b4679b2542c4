use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use comercio_gateway::config::Config;
use comercio_gateway::scheduler::SweepScheduler;
use comercio_gateway::state::AppState;
use log::info;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::io;
use std::io::Write;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "comercio-gateway")]
#[command(about = "Merchant and POS terminal lifecycle engine.")]
struct CommandLine {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending database migrations
    Migrate,
    /// Deactivate idle terminals once and exit
    Sweep,
    /// Run the inactivity sweep on a fixed interval
    Watch,
    /// Show the merchant a terminal belongs to
    MerchantInfo { terminal_code: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    let mut log_builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    log_builder
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] - {}",
                Local::now().format("%Y-%m-%d %H:%M:%S %:z"),
                record.level(),
                record.args()
            )
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e)) // 转换为 io::Result
        })
        .init();

    let cli = CommandLine::parse();

    let config = Config::from_env()?;
    config.validate()?;

    let pool = connect(&config).await?;

    match cli.command {
        Commands::Migrate => {
            sqlx::migrate!()
                .run(&pool)
                .await
                .context("Failed to run database migrations")?;
            info!("Database migrations applied");
        }
        Commands::Sweep => {
            let state = AppState::new(pool, config);
            let report = state.terminals.sweep_inactivity().await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Watch => {
            let interval = config.lifecycle.sweep_interval_minutes;
            let state = AppState::new(pool, config);
            SweepScheduler::new(state.terminals.clone(), interval).start().await;
        }
        Commands::MerchantInfo { terminal_code } => {
            let state = AppState::new(pool, config);
            let info = state.terminals.merchant_info(&terminal_code).await?;
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
    }

    Ok(())
}

/// 按配置创建数据库连接池
async fn connect(config: &Config) -> Result<PgPool> {
    info!("Connecting to database");

    PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .acquire_timeout(Duration::from_secs(config.database.connect_timeout))
        .idle_timeout(Duration::from_secs(config.database.idle_timeout))
        .connect(&config.database.url)
        .await
        .context("Failed to connect to database")
}
