//! Per-minute daily digest scheduler.
//!
//! Each tick loads the digest candidates and evaluates every user on their own:
//! a failure for one user is logged and never stops the rest of the batch.
use crate::db::{self, Pool};
use crate::digest::DigestComposer;
use crate::model::User;
use crate::time_util::{local_hhmm, now_in_zone, same_local_day};
use crate::transport::Transport;
use anyhow::Result;
use chrono::{DateTime, DurationRound, Timelike, Utc};
use chrono_tz::Tz;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, instrument, warn};

/// Upper bound on minutes replayed after a slow tick.
pub const MAX_CATCH_UP_MINUTES: i64 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NotEligible,
    TimeMismatch,
    AlreadySentToday,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Evaluation {
    Skip(SkipReason),
    Due { local_now: DateTime<Tz> },
}

/// Decide whether `user` should receive a digest at `now`.
pub fn evaluate(user: &User, now: DateTime<Utc>, default_tz: Tz) -> Evaluation {
    let Some(daily_time) = user.daily_time.as_deref().filter(|_| user.digest_eligible()) else {
        return Evaluation::Skip(SkipReason::NotEligible);
    };

    let local_now = now_in_zone(user.timezone.as_deref(), default_tz, now);
    if local_hhmm(&local_now) != *daily_time {
        return Evaluation::Skip(SkipReason::TimeMismatch);
    }

    if let Some(last) = user.last_digest_at {
        let last_local = last.with_timezone(&local_now.timezone());
        if same_local_day(&last_local, &local_now) {
            return Evaluation::Skip(SkipReason::AlreadySentToday);
        }
    }

    Evaluation::Due { local_now }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub candidates: usize,
    pub sent: usize,
    pub skipped: usize,
    pub failed: usize,
}

pub struct DigestScheduler {
    pool: Pool,
    composer: DigestComposer,
    transport: Arc<dyn Transport>,
    default_tz: Tz,
    tick_guard: Mutex<()>,
}

impl DigestScheduler {
    pub fn new(
        pool: Pool,
        composer: DigestComposer,
        transport: Arc<dyn Transport>,
        default_tz: Tz,
    ) -> Self {
        Self {
            pool,
            composer,
            transport,
            default_tz,
            tick_guard: Mutex::new(()),
        }
    }

    /// Run one evaluation pass at `now`. Returns `None` when another tick is
    /// still running.
    #[instrument(skip(self))]
    pub async fn tick(&self, now: DateTime<Utc>) -> Option<TickReport> {
        let Ok(_guard) = self.tick_guard.try_lock() else {
            warn!("previous digest tick still running; skipping");
            return None;
        };

        let mut report = TickReport::default();
        let users = match db::list_digest_candidates(&self.pool).await {
            Ok(users) => users,
            Err(err) => {
                error!(?err, "failed to load digest candidates");
                return Some(report);
            }
        };
        report.candidates = users.len();

        for user in &users {
            match evaluate(user, now, self.default_tz) {
                Evaluation::Skip(reason) => {
                    debug!(user_id = user.id, ?reason, "digest skipped");
                    report.skipped += 1;
                }
                Evaluation::Due { local_now } => {
                    match self.deliver(user, now, local_now).await {
                        Ok(()) => report.sent += 1,
                        Err(err) => {
                            warn!(?err, user_id = user.id, chat_id = user.chat_id, "digest delivery failed");
                            report.failed += 1;
                        }
                    }
                }
            }
        }

        if report.sent > 0 || report.failed > 0 {
            info!(?report, "digest tick finished");
        }
        Some(report)
    }

    async fn deliver(&self, user: &User, now: DateTime<Utc>, local_now: DateTime<Tz>) -> Result<()> {
        let city = user.city.as_deref().unwrap_or_default();
        let text = self.composer.compose(&self.pool, user, city, local_now).await?;
        self.transport.send_text(user.chat_id, &text).await?;
        db::mark_digest_sent(&self.pool, user.id, now).await?;
        info!(user_id = user.id, chat_id = user.chat_id, "digest sent");
        Ok(())
    }

    /// Evaluate every whole minute after `last` up to the minute containing
    /// `now`, oldest first. Returns the latest minute actually evaluated.
    pub async fn catch_up(
        &self,
        last: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        let mut evaluated = last;
        let minutes = pending_minutes(last, now);
        if minutes.len() > 1 {
            warn!(count = minutes.len(), "catching up on missed scheduler minutes");
        }
        for minute in minutes {
            if self.tick(minute).await.is_none() {
                break;
            }
            evaluated = Some(minute);
        }
        evaluated
    }

    /// Tick every `period`, starting at the next whole minute, until `shutdown`
    /// flips or its sender is dropped. An in-flight tick is allowed to finish.
    pub async fn run(self: Arc<Self>, period: Duration, mut shutdown: watch::Receiver<bool>) {
        let start = Instant::now() + delay_to_next_minute(Utc::now());
        let mut ticker = tokio::time::interval_at(start, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(?period, "digest scheduler started");

        let mut last_evaluated = None;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    last_evaluated = self.catch_up(last_evaluated, Utc::now()).await;
                }
                res = shutdown.changed() => {
                    if res.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("digest scheduler stopped");
    }
}

/// Whole minutes after `last` up to the one containing `now`, at most
/// [`MAX_CATCH_UP_MINUTES`] of them. Without `last` only the current minute.
pub fn pending_minutes(last: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Vec<DateTime<Utc>> {
    let one = chrono::Duration::minutes(1);
    let current = now.duration_trunc(one).unwrap_or(now);
    let earliest = current - chrono::Duration::minutes(MAX_CATCH_UP_MINUTES - 1);
    let mut minute = match last {
        Some(last) if last >= current => return Vec::new(),
        Some(last) => (last + one).max(earliest),
        None => current,
    };
    let mut out = Vec::new();
    while minute <= current {
        out.push(minute);
        minute += one;
    }
    out
}

fn delay_to_next_minute(now: DateTime<Utc>) -> Duration {
    let into_minute = Duration::new(u64::from(now.second()), now.nanosecond() % 1_000_000_000);
    Duration::from_secs(60).saturating_sub(into_minute)
}
