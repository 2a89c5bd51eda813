use std::{
    collections::{BTreeMap, BTreeSet},
    str::FromStr,
    sync::Arc,
};

use chrono::{DateTime, Datelike, Days, FixedOffset, NaiveDate, Utc};
use thiserror::Error;

use crate::{
    error::LeaderboardError,
    store::{RecordStore, RollEvent},
};

pub const TOP_LIMIT: usize = 10;
pub const DEFAULT_WINDOW_DAYS: u32 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Today,
    CurrentMonth,
}

#[derive(Debug, Error)]
#[error("unknown period '{0}', expected 'today' or 'all'")]
pub struct UnknownPeriod(String);

impl FromStr for Period {
    type Err = UnknownPeriod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "today" => Ok(Self::Today),
            // "all" predates the month scope; the spelling stuck around.
            "all" => Ok(Self::CurrentMonth),
            other => Err(UnknownPeriod(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaderboardEntry {
    pub user_id: String,
    pub username: String,
    pub best: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyWin {
    pub user_id: String,
    pub username: String,
    pub wins: u32,
}

/// Read-only views over the roll log. Every query goes back to the store;
/// nothing is cached between calls.
#[derive(Clone)]
pub struct LeaderboardService {
    store: Arc<dyn RecordStore>,
    offset: FixedOffset,
}

impl LeaderboardService {
    pub fn new(store: Arc<dyn RecordStore>, offset: FixedOffset) -> Self {
        Self { store, offset }
    }

    /// Best roll per user within `period`, highest first, at most
    /// [`TOP_LIMIT`] entries. `None` means no rolls fell into the period at
    /// all, as opposed to a short list.
    pub async fn top(
        &self,
        period: Period,
        now: DateTime<Utc>,
    ) -> Result<Option<Vec<LeaderboardEntry>>, LeaderboardError> {
        let today = self.civil_date(now);
        let events = self.store.list_all().await?;

        let mut best: BTreeMap<&str, &RollEvent> = BTreeMap::new();
        for event in &events {
            if !in_period(event.date, period, today) {
                continue;
            }
            match best.get(event.user_id.as_str()) {
                // Ties keep the later event so the username stays current.
                Some(current) if current.result > event.result => {}
                _ => {
                    best.insert(event.user_id.as_str(), event);
                }
            }
        }

        if best.is_empty() {
            return Ok(None);
        }

        let mut entries: Vec<LeaderboardEntry> = best
            .into_values()
            .map(|event| LeaderboardEntry {
                user_id: event.user_id.clone(),
                username: event.username.clone(),
                best: event.result,
            })
            .collect();
        // Stable sort on a BTreeMap ordering: equal scores stay in user id order.
        entries.sort_by(|a, b| b.best.cmp(&a.best));
        entries.truncate(TOP_LIMIT);
        Ok(Some(entries))
    }

    /// Win counts over the trailing `window_days` civil days including
    /// today. Every user tied at a day's maximum is credited for that day.
    /// `None` or `0` falls back to [`DEFAULT_WINDOW_DAYS`].
    pub async fn daily_wins(
        &self,
        window_days: Option<u32>,
        now: DateTime<Utc>,
    ) -> Result<Vec<DailyWin>, LeaderboardError> {
        let window = normalize_window(window_days);
        let today = self.civil_date(now);
        let first = today
            .checked_sub_days(Days::new(u64::from(window - 1)))
            .unwrap_or(NaiveDate::MIN);
        let events = self.store.list_all().await?;

        let mut by_day: BTreeMap<NaiveDate, Vec<&RollEvent>> = BTreeMap::new();
        for event in &events {
            if event.date < first || event.date > today {
                continue;
            }
            by_day.entry(event.date).or_default().push(event);
        }

        let mut wins: BTreeMap<&str, DailyWin> = BTreeMap::new();
        for day_events in by_day.values() {
            let Some(day_best) = day_events.iter().map(|event| event.result).max() else {
                continue;
            };
            // Credit each user at most once per day, even if imported data
            // carries duplicate rows.
            let mut credited: BTreeSet<&str> = BTreeSet::new();
            for event in day_events {
                if event.result != day_best || !credited.insert(event.user_id.as_str()) {
                    continue;
                }
                let entry = wins
                    .entry(event.user_id.as_str())
                    .or_insert_with(|| DailyWin {
                        user_id: event.user_id.clone(),
                        username: event.username.clone(),
                        wins: 0,
                    });
                entry.wins += 1;
                entry.username = event.username.clone();
            }
        }

        let mut ranking: Vec<DailyWin> = wins.into_values().collect();
        ranking.sort_by(|a, b| b.wins.cmp(&a.wins));
        ranking.truncate(TOP_LIMIT);
        Ok(ranking)
    }

    fn civil_date(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.offset).date_naive()
    }
}

fn normalize_window(window_days: Option<u32>) -> u32 {
    match window_days {
        Some(days) if days >= 1 => days,
        _ => DEFAULT_WINDOW_DAYS,
    }
}

fn in_period(date: NaiveDate, period: Period, today: NaiveDate) -> bool {
    match period {
        Period::Today => date == today,
        Period::CurrentMonth => date.year() == today.year() && date.month() == today.month(),
    }
}
