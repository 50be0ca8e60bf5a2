//! Foreground scheduler command

use anyhow::Result;
use tally_core::config::Config;
use tally_core::Tally;
use tracing::info;

use crate::scheduler::{start_daily_scheduler, TickSchedule};

pub async fn cmd_run(tally: Tally, config: &Config) -> Result<()> {
    println!("🚀 Tally scheduler running");
    println!("   Database:  {}", config.database_path.display());
    println!("   Daily tick at {:02}:00 local time", config.tick_hour);
    println!("   Press Ctrl+C to stop");

    let handle = start_daily_scheduler(
        tally,
        TickSchedule {
            tick_hour: config.tick_hour,
            run_on_start: config.run_on_start,
        },
    );

    tokio::signal::ctrl_c().await?;
    info!("Shutting down scheduler");
    handle.abort();

    Ok(())
}
