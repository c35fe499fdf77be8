//! Token blacklist sweeps
//!
//! Two independent timers delete expired blacklist rows: a recurring one
//! every `interval` and a daily one at a fixed UTC time. A failed sweep is
//! logged and left for the next tick.

use std::time::Duration;

use chrono::{DateTime, NaiveTime, Utc};
use sqlx::PgPool;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::config::SweepConfig;
use crate::db::{BlacklistRepo, DbError};

/// Delay from `now` until the next `at` (today if still ahead, else tomorrow).
pub fn duration_until(now: DateTime<Utc>, at: NaiveTime) -> Duration {
    let today = now.date_naive().and_time(at).and_utc();
    let next = if today > now {
        today
    } else {
        today + chrono::Duration::days(1)
    };
    (next - now).to_std().unwrap_or(Duration::ZERO)
}

/// Run one sweep, returning the number of rows removed.
pub async fn sweep_once(pool: &PgPool) -> Result<u64, DbError> {
    BlacklistRepo::new(pool).sweep_expired(Utc::now()).await
}

async fn tick(pool: &PgPool, schedule: &'static str) {
    match sweep_once(pool).await {
        Ok(removed) => tracing::info!(schedule, removed, "Token blacklist sweep complete"),
        Err(e) => tracing::error!(schedule, error = %e, "Token blacklist sweep failed"),
    }
}

/// Running sweep timers
pub struct SweepHandle {
    interval: JoinHandle<()>,
    daily: JoinHandle<()>,
}

impl SweepHandle {
    /// Stop both timers.
    pub fn abort(&self) {
        self.interval.abort();
        self.daily.abort();
    }
}

/// Spawn both sweep timers on the current runtime.
pub fn spawn(pool: PgPool, config: SweepConfig) -> SweepHandle {
    let interval_pool = pool.clone();
    let interval = tokio::spawn(async move {
        let mut timer = tokio::time::interval(config.interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            timer.tick().await;
            tick(&interval_pool, "interval").await;
        }
    });

    let daily = tokio::spawn(async move {
        loop {
            tokio::time::sleep(duration_until(Utc::now(), config.daily_at)).await;
            tick(&pool, "daily").await;
        }
    });

    tracing::info!(
        interval_secs = config.interval.as_secs(),
        daily_at = %config.daily_at.format("%H:%M"),
        "Token blacklist sweeps scheduled"
    );
    SweepHandle { interval, daily }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn later_today() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 1, 30, 0).unwrap();
        assert_eq!(duration_until(now, at(3, 0)), Duration::from_secs(90 * 60));
    }

    #[test]
    fn already_passed_rolls_to_tomorrow() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 4, 0, 0).unwrap();
        assert_eq!(duration_until(now, at(3, 0)), Duration::from_secs(23 * 3600));
    }

    #[test]
    fn exactly_now_waits_a_full_day() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 3, 0, 0).unwrap();
        assert_eq!(duration_until(now, at(3, 0)), Duration::from_secs(24 * 3600));
    }

    #[test]
    fn crosses_month_end() {
        let now = Utc.with_ymd_and_hms(2024, 1, 31, 23, 59, 0).unwrap();
        assert_eq!(duration_until(now, at(0, 0)), Duration::from_secs(60));
    }

    #[tokio::test]
    async fn timers_can_be_aborted() {
        let pool = crate::db::lazy_pool("postgres://localhost/pitchhub_unused").unwrap();
        let handle = spawn(
            pool,
            SweepConfig {
                interval: Duration::from_secs(3600),
                daily_at: at(3, 0),
            },
        );
        handle.abort();
    }
}
