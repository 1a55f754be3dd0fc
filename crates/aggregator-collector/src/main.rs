//! Market aggregator collector CLI.

use aggregator_collector::{commands, daemon};
use aggregator_core::logging::{init_logging, LogConfig};
use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "aggregator-collector")]
#[command(about = "Multi-exchange market data collector", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 설정 파일 경로
    #[arg(long, default_value = "config/default.toml")]
    config: PathBuf,

    /// 로그 레벨 재정의 (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// 데몬 모드: 모든 활성 거래소의 시세를 계속 수집
    Run,

    /// 활성 마켓 목록 출력
    Markets {
        /// 거래소 이름 (기본값: 홈 화면 거래소)
        #[arg(long)]
        exchange: Option<String>,
    },

    /// 리샘플링된 차트 출력
    Chart {
        #[arg(long)]
        exchange: Option<String>,
        /// 기준 통화 (예: BTC)
        #[arg(long)]
        base: Option<String>,
        /// 거래 통화 (예: ETH)
        #[arg(long)]
        curr: Option<String>,
        /// 캔들 간격 (분)
        #[arg(long)]
        interval: Option<u64>,
        /// 조회 기간 (분)
        #[arg(long)]
        lookback: Option<u64>,
    },

    /// 호가창 출력
    Book {
        #[arg(long)]
        exchange: Option<String>,
        #[arg(long)]
        base: Option<String>,
        #[arg(long)]
        curr: Option<String>,
        /// 표시 깊이 (기본값: display_book_depth)
        #[arg(long)]
        depth: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = commands::load_config(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;

    let mut log_config = LogConfig::from_settings(&config.logging);
    if let Some(level) = cli.log_level {
        log_config.level = level;
    }
    init_logging(log_config).map_err(|e| anyhow::anyhow!(e))?;

    tracing::info!(
        exchanges = config.enabled_exchanges().len(),
        "Market aggregator collector starting"
    );

    let home = &config.home_view;
    match cli.command {
        Commands::Run => {
            daemon::run(&config).await?;
        }
        Commands::Markets { exchange } => {
            let exchange = exchange.unwrap_or_else(|| home.exchange.clone());
            print!("{}", commands::list_markets(&config, &exchange).await?);
        }
        Commands::Chart {
            exchange,
            base,
            curr,
            interval,
            lookback,
        } => {
            let output = commands::show_chart(
                &config,
                exchange.as_deref().unwrap_or(&home.exchange),
                base.as_deref().unwrap_or(&home.base),
                curr.as_deref().unwrap_or(&home.curr),
                interval.unwrap_or(home.chart_interval_minutes),
                lookback.unwrap_or(home.chart_lookback_minutes),
            )
            .await?;
            print!("{}", output);
        }
        Commands::Book {
            exchange,
            base,
            curr,
            depth,
        } => {
            let output = commands::show_order_book(
                &config,
                exchange.as_deref().unwrap_or(&home.exchange),
                base.as_deref().unwrap_or(&home.base),
                curr.as_deref().unwrap_or(&home.curr),
                depth.unwrap_or(config.display_book_depth),
            )
            .await?;
            print!("{}", output);
        }
    }

    tracing::info!("Market aggregator collector stopped");
    Ok(())
}
