use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::models::{
    validate_lengths, CalendarDay, CycleLength, CyclePhase, CycleProfile, CycleStats, DayFlags,
    DayMark, FertileWindow, PeriodLog, Phase, ValidationError,
};

/// Last cycle day (exclusive) of the follicular phase.
const FOLLICULAR_END: i64 = 14;
/// Last cycle day (inclusive) of the ovulation phase.
const OVULATION_END: i64 = 16;
/// Ovulation is placed this many days before the next period.
const LUTEAL_DAYS: i64 = 14;
/// Fertile days before ovulation.
const FERTILE_LEAD_DAYS: i64 = 5;

/// Gaps between period starts outside (10, 60) are not cycles.
const MIN_PLAUSIBLE_GAP: i64 = 10;
const MAX_PLAUSIBLE_GAP: i64 = 60;
/// Insights use a tighter lower bound.
const MIN_STATS_GAP: i64 = 15;
/// Use last 6 cycles max
const STATS_WINDOW: usize = 6;

/// Anchor and cycle length derived from logged history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Refinement {
    pub anchor: NaiveDate,
    pub average_cycle_length: i32,
}

/// Refine the anchor date and average cycle length from logged periods.
///
/// `history` must be most-recent-first. With no history the fallbacks are
/// returned untouched; with one entry only the anchor moves. Gaps that don't
/// look like a real cycle are dropped, and if none survive the fallback length
/// is kept.
pub fn refine_cycle_length(
    history: &[PeriodLog],
    fallback_anchor: NaiveDate,
    fallback_length: i32,
) -> Result<Refinement, ValidationError> {
    validate_history(history)?;

    let Some(latest) = history.first() else {
        return Ok(Refinement {
            anchor: fallback_anchor,
            average_cycle_length: fallback_length,
        });
    };

    let gaps: Vec<f64> = history
        .windows(2)
        .map(|w| (w[0].start_date - w[1].start_date).num_days())
        .filter(|gap| *gap > MIN_PLAUSIBLE_GAP && *gap < MAX_PLAUSIBLE_GAP)
        .map(|gap| gap as f64)
        .collect();

    let average_cycle_length = if gaps.is_empty() {
        fallback_length
    } else {
        mean(&gaps).round() as i32
    };

    Ok(Refinement {
        anchor: latest.start_date,
        average_cycle_length,
    })
}

/// Work out where `today` falls in the cycle anchored at `anchor`.
pub fn compute_phase(
    anchor: NaiveDate,
    average_cycle_length: i32,
    average_period_length: i32,
    today: NaiveDate,
) -> Result<CyclePhase, ValidationError> {
    validate_lengths(average_cycle_length, average_period_length)?;
    let cycle_length = i64::from(average_cycle_length);
    let period_length = i64::from(average_period_length);

    // An anchor in the future counts as day 0.
    let days_since_anchor = (today - anchor).num_days().max(0);
    let cycle_day = days_since_anchor % cycle_length;
    let cycle_start = shift(anchor, days_since_anchor - cycle_day)?;

    let next_period_date = if cycle_day == 0 {
        cycle_start
    } else {
        shift(cycle_start, cycle_length)?
    };
    let days_until_next_period = (next_period_date - today).num_days().max(0) % cycle_length;

    let ovulation_offset = cycle_length - LUTEAL_DAYS;

    Ok(CyclePhase {
        phase: phase_for_day(cycle_day, period_length),
        cycle_day,
        days_until_next_period,
        next_period_date,
        fertile_window: fertile_window_from(anchor, ovulation_offset)?,
        current_fertile_window: fertile_window_from(cycle_start, ovulation_offset)?,
        is_in_fertile_window: in_fertile_range(cycle_day, ovulation_offset),
    })
}

fn fertile_window_from(
    cycle_start: NaiveDate,
    ovulation_offset: i64,
) -> Result<FertileWindow, ValidationError> {
    Ok(FertileWindow {
        start: shift(cycle_start, ovulation_offset - FERTILE_LEAD_DAYS)?,
        end: shift(cycle_start, ovulation_offset)?,
    })
}

/// `date + days`, failing instead of panicking at the ends of the calendar.
fn shift(date: NaiveDate, days: i64) -> Result<NaiveDate, ValidationError> {
    date.checked_add_signed(Duration::days(days))
        .ok_or(ValidationError::DateOutOfRange { date, days })
}

/// Flags for a single calendar date, past or future.
pub fn classify_calendar_day(
    date: NaiveDate,
    period_logs: &[PeriodLog],
    profile: &CycleProfile,
    today: NaiveDate,
) -> Result<DayFlags, ValidationError> {
    let calendar = Calendar::new(period_logs, profile, today)?;
    Ok(calendar.marks(date))
}

/// Flags for every day of a month.
pub fn classify_month(
    year: i32,
    month: u32,
    period_logs: &[PeriodLog],
    profile: &CycleProfile,
    today: NaiveDate,
) -> Result<Vec<CalendarDay>, ValidationError> {
    let first_day =
        NaiveDate::from_ymd_opt(year, month, 1).ok_or(ValidationError::InvalidDate { year, month })?;
    let calendar = Calendar::new(period_logs, profile, today)?;

    Ok(first_day
        .iter_days()
        .take_while(|d| d.month() == month)
        .map(|date| CalendarDay {
            date,
            marks: calendar.marks(date),
        })
        .collect())
}

/// Compute cycle statistics for the insights view.
pub fn cycle_stats(history: &[PeriodLog], profile: &CycleProfile) -> CycleStats {
    let mut ordered: Vec<&PeriodLog> = history.iter().collect();
    ordered.sort_by_key(|l| l.start_date);

    let Some(last) = ordered.last() else {
        return CycleStats {
            total_periods: 0,
            avg_cycle_length: None,
            avg_period_length: None,
            shortest_cycle: None,
            longest_cycle: None,
            variation: None,
            regularity: None,
            recent_cycles: Vec::new(),
            last_period_start: None,
            last_period_end: None,
        };
    };

    let mut cycles: Vec<CycleLength> = ordered
        .windows(2)
        .filter_map(|w| {
            let cycle_length = (w[1].start_date - w[0].start_date).num_days();
            (cycle_length > MIN_STATS_GAP && cycle_length < MAX_PLAUSIBLE_GAP).then(|| {
                CycleLength {
                    start_date: w[1].start_date,
                    cycle_length,
                    period_length: w[1].length(profile.average_period_length),
                }
            })
        })
        .collect();
    if cycles.len() > STATS_WINDOW {
        cycles.drain(..cycles.len() - STATS_WINDOW);
    }

    let cycle_lengths: Vec<f64> = cycles.iter().map(|c| c.cycle_length as f64).collect();
    let period_lengths: Vec<f64> = cycles.iter().map(|c| c.period_length as f64).collect();
    let shortest_cycle = cycles.iter().map(|c| c.cycle_length).min();
    let longest_cycle = cycles.iter().map(|c| c.cycle_length).max();

    let regularity = match cycle_lengths.len() {
        0 => None,
        1 => Some(0.5),
        _ => {
            let avg = mean(&cycle_lengths);
            Some((1.0 - (std_deviation(&cycle_lengths) / avg) as f32).clamp(0.1, 0.95))
        }
    };

    CycleStats {
        total_periods: ordered.len(),
        avg_cycle_length: (!cycles.is_empty()).then(|| mean(&cycle_lengths).round() as i64),
        avg_period_length: (!cycles.is_empty()).then(|| mean(&period_lengths).round() as i64),
        shortest_cycle,
        longest_cycle,
        variation: shortest_cycle.zip(longest_cycle).map(|(lo, hi)| hi - lo),
        regularity,
        recent_cycles: cycles,
        last_period_start: Some(last.start_date),
        last_period_end: last.end_date,
    }
}

/// Latest logged start, or the profile's anchor when nothing is logged.
pub fn most_recent_anchor(period_logs: &[PeriodLog], profile: &CycleProfile) -> NaiveDate {
    period_logs
        .iter()
        .map(|l| l.start_date)
        .max()
        .unwrap_or(profile.last_period_date)
}

fn phase_for_day(cycle_day: i64, period_length: i64) -> Phase {
    if cycle_day < period_length {
        Phase::Period
    } else if cycle_day < FOLLICULAR_END {
        Phase::Follicular
    } else if cycle_day <= OVULATION_END {
        Phase::Ovulation
    } else {
        Phase::Luteal
    }
}

fn in_fertile_range(cycle_day: i64, ovulation_offset: i64) -> bool {
    cycle_day >= ovulation_offset - FERTILE_LEAD_DAYS && cycle_day <= ovulation_offset
}

fn validate_history(history: &[PeriodLog]) -> Result<(), ValidationError> {
    for log in history {
        log.validate()?;
    }
    for w in history.windows(2) {
        if w[0].start_date < w[1].start_date {
            return Err(ValidationError::NonChronologicalHistory {
                earlier: w[0].start_date,
                later: w[1].start_date,
            });
        }
    }
    Ok(())
}

/// Validated inputs shared by every day of a calendar query.
struct Calendar<'a> {
    logs: &'a [PeriodLog],
    anchor: NaiveDate,
    cycle_length: i64,
    period_length: i32,
    today: NaiveDate,
}

impl<'a> Calendar<'a> {
    fn new(
        logs: &'a [PeriodLog],
        profile: &CycleProfile,
        today: NaiveDate,
    ) -> Result<Self, ValidationError> {
        profile.validate()?;
        for log in logs {
            log.validate()?;
        }
        Ok(Self {
            logs,
            anchor: most_recent_anchor(logs, profile),
            cycle_length: i64::from(profile.average_cycle_length),
            period_length: profile.average_period_length,
            today,
        })
    }

    fn marks(&self, date: NaiveDate) -> DayFlags {
        let mut marks = DayFlags::new();

        let logged = self
            .logs
            .iter()
            .any(|log| log.covers(date, self.period_length));
        if logged {
            marks.insert(DayMark::LoggedPeriod);
        }

        let days_since = (date - self.anchor).num_days();
        if days_since < 0 {
            return marks;
        }
        let cycle_day = days_since % self.cycle_length;

        if !logged && date > self.today && cycle_day < i64::from(self.period_length) {
            marks.insert(DayMark::PredictedPeriod);
        }

        let ovulation_offset = self.cycle_length - LUTEAL_DAYS;
        if cycle_day == ovulation_offset {
            marks.insert(DayMark::Ovulation);
        } else if in_fertile_range(cycle_day, ovulation_offset) {
            marks.insert(DayMark::FertileWindow);
        }

        marks
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn std_deviation(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let avg = mean(values);
    let variance =
        values.iter().map(|v| (v - avg).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}
