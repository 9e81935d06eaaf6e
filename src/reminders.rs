use chrono::{Duration, NaiveDate};

use crate::models::{CyclePhase, Reminder, ReminderKind};

pub const DEFAULT_DAYS_BEFORE_PERIOD: u32 = 2;

/// Delivery side of reminders. Implementations must not fail the caller.
pub trait ReminderScheduler: Send + Sync {
    fn cancel_all(&self);
    fn schedule(&self, reminder: &Reminder);
}

/// Scheduler that only records what would have been delivered.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingScheduler;

impl ReminderScheduler for TracingScheduler {
    fn cancel_all(&self) {
        tracing::debug!("cancelled pending reminders");
    }

    fn schedule(&self, reminder: &Reminder) {
        tracing::info!(kind = ?reminder.kind, date = %reminder.date, "reminder scheduled");
    }
}

/// Reminder dates for the upcoming period, fertile window and ovulation.
///
/// Fertility reminders follow the window of the cycle `today` is in. A date
/// that has already passed is pushed one cycle forward; anything still not
/// after `today`, or off the end of the calendar, is dropped.
pub fn plan_reminders(
    phase: &CyclePhase,
    average_cycle_length: i32,
    days_before_period: u32,
    today: NaiveDate,
) -> Vec<Reminder> {
    let cycle = Duration::days(i64::from(average_cycle_length));
    let window = phase.current_fertile_window;
    let targets = [
        (
            ReminderKind::PeriodSoon,
            phase
                .next_period_date
                .checked_sub_signed(Duration::days(i64::from(days_before_period))),
        ),
        (
            ReminderKind::FertileWindowSoon,
            window.start.checked_sub_signed(Duration::days(1)),
        ),
        (ReminderKind::Ovulation, Some(window.end)),
    ];

    targets
        .into_iter()
        .filter_map(|(kind, date)| {
            let date = date?;
            let date = if date <= today {
                date.checked_add_signed(cycle)?
            } else {
                date
            };
            (date > today).then_some(Reminder { kind, date })
        })
        .collect()
}

/// Replace whatever is scheduled with `reminders`.
pub fn sync_reminders(scheduler: &dyn ReminderScheduler, reminders: &[Reminder]) {
    scheduler.cancel_all();
    for reminder in reminders {
        scheduler.schedule(reminder);
    }
}
