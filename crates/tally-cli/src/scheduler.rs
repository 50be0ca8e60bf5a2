//! Daily background tick
//!
//! Fires due recurring payments once a day at the configured local hour
//! (`tick_hour`, default midnight) and refreshes every user's budgets and
//! goals so finished windows flip to COMPLETED and missed goals to FAILED. With `run_on_start` a catch-up tick
//! runs as soon as the loop starts.

use std::time::Duration;

use chrono::{Days, Local, NaiveDateTime, NaiveTime};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use tally_core::{Tally, TickReport};

/// When and whether the daily tick runs
#[derive(Debug, Clone, Copy)]
pub struct TickSchedule {
    /// Local hour (0-23) of the daily tick
    pub tick_hour: u32,
    /// Run one tick immediately on start
    pub run_on_start: bool,
}

/// Time from `now` until the next occurrence of `tick_hour:00`.
///
/// A tick hour that is exactly now schedules for tomorrow, so a tick
/// that just ran is not repeated.
pub fn duration_until_next_tick(now: NaiveDateTime, tick_hour: u32) -> Duration {
    let at = NaiveTime::from_hms_opt(tick_hour.min(23), 0, 0).unwrap_or(NaiveTime::MIN);
    let mut next = now.date().and_time(at);
    if next <= now {
        next = now
            .date()
            .checked_add_days(Days::new(1))
            .map(|d| d.and_time(at))
            .unwrap_or(next);
    }
    (next - now).to_std().unwrap_or_default()
}

/// Start the daily tick as a background task
pub fn start_daily_scheduler(tally: Tally, schedule: TickSchedule) -> JoinHandle<()> {
    info!(
        tick_hour = schedule.tick_hour,
        run_on_start = schedule.run_on_start,
        "Starting daily scheduler"
    );

    tokio::spawn(async move {
        if schedule.run_on_start {
            run_scheduled_tick(&tally).await;
        }

        loop {
            let wait = duration_until_next_tick(Local::now().naive_local(), schedule.tick_hour);
            info!("Next tick in {}m", wait.as_secs() / 60);
            tokio::time::sleep(wait).await;

            run_scheduled_tick(&tally).await;
        }
    })
}

/// Run one tick off the async runtime; the engine is blocking
pub async fn run_scheduled_tick(tally: &Tally) -> Option<TickReport> {
    let tally = tally.clone();
    let result = tokio::task::spawn_blocking(move || {
        let today = tally.clock().today();
        let report = tally.scheduler().process_due_definitions(today)?;
        refresh_derived(&tally);
        Ok::<_, tally_core::Error>((today, report))
    })
    .await;

    match result {
        Ok(Ok((today, report))) => {
            info!(
                %today,
                processed = report.processed,
                fired = report.fired,
                failed = report.failed,
                skipped = report.skipped,
                "Scheduled tick completed"
            );
            if report.failed > 0 {
                warn!(failed = report.failed, "Some recurring payments failed to fire");
            }
            Some(report)
        }
        Ok(Err(e)) => {
            error!("Scheduled tick failed: {}", e);
            None
        }
        Err(e) => {
            error!("Scheduled tick panicked: {}", e);
            None
        }
    }
}

/// Recalculate every user's budgets and goals as of the engine's clock
pub fn refresh_derived(tally: &Tally) {
    let users = match tally.db().list_users() {
        Ok(users) => users,
        Err(e) => {
            error!("Failed to list users for refresh: {}", e);
            return;
        }
    };

    for user in users {
        if let Err(e) = tally.budgets().recalculate_all(user.id) {
            error!(owner_id = user.id, "Budget refresh failed: {}", e);
        }
        if let Err(e) = tally.goals().recalculate_all(user.id) {
            error!(owner_id = user.id, "Goal refresh failed: {}", e);
        }
    }
}
