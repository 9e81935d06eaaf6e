use std::sync::Mutex;

use chrono::NaiveDate;
use uuid::Uuid;

use crate::config::Settings;
use crate::models::{
    CycleProfile, CycleStats, DailyLog, Dashboard, DayMark, MonthView, PeriodLog,
    ValidationError,
};
use crate::prediction;
use crate::reminders::{self, ReminderScheduler};
use crate::store::{CycleProfileStore, DailyLogStore, PeriodLogStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("no cycle profile for user {0}; complete onboarding first")]
    NotOnboarded(Uuid),
    #[error("user {0} already has a cycle profile")]
    AlreadyOnboarded(Uuid),
    #[error("period log not found: {0}")]
    PeriodNotFound(Uuid),
    #[error("{0} is in the future")]
    FutureDate(NaiveDate),
    #[error("period {0} already has an end date")]
    AlreadyEnded(Uuid),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// The flows behind the dashboard, calendar, logging and settings screens.
pub struct CycleService<S> {
    store: S,
    scheduler: Box<dyn ReminderScheduler>,
    settings: Settings,
    /// Held across every read-check-write of profiles and period logs.
    refine_lock: Mutex<()>,
}

impl<S> CycleService<S>
where
    S: PeriodLogStore + CycleProfileStore + DailyLogStore,
{
    pub fn new(store: S, scheduler: Box<dyn ReminderScheduler>, settings: Settings) -> Self {
        Self {
            store,
            scheduler,
            settings,
            refine_lock: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn onboard(&self, user: Uuid, profile: CycleProfile) -> Result<(), ServiceError> {
        profile.validate_settings()?;
        if self.store.profile(user)?.is_some() {
            return Err(ServiceError::AlreadyOnboarded(user));
        }
        self.store.put_profile(user, profile)?;
        tracing::info!(%user, anchor = %profile.last_period_date, "onboarded");
        Ok(())
    }

    pub fn update_profile(
        &self,
        user: Uuid,
        average_cycle_length: i32,
        average_period_length: i32,
    ) -> Result<CycleProfile, ServiceError> {
        let _guard = self.refine_lock.lock().map_err(|_| StoreError::Poisoned)?;
        let profile = CycleProfile {
            average_cycle_length,
            average_period_length,
            ..self.require_profile(user)?
        };
        profile.validate_settings()?;
        self.store.put_profile(user, profile)?;
        Ok(profile)
    }

    /// Log a period start, optionally with its end. Moves the profile anchor
    /// forward when this is the latest start on record.
    pub fn log_period(
        &self,
        user: Uuid,
        start_date: NaiveDate,
        end_date: Option<NaiveDate>,
        today: NaiveDate,
    ) -> Result<PeriodLog, ServiceError> {
        for date in std::iter::once(start_date).chain(end_date) {
            if date > today {
                return Err(ServiceError::FutureDate(date));
            }
        }
        let log = PeriodLog::new(start_date, end_date);
        log.validate()?;

        let _guard = self.refine_lock.lock().map_err(|_| StoreError::Poisoned)?;
        let profile = self.require_profile(user)?;
        self.store.add_period(user, log.clone())?;
        if start_date > profile.last_period_date {
            self.store.put_profile(
                user,
                CycleProfile {
                    last_period_date: start_date,
                    ..profile
                },
            )?;
        }
        tracing::info!(%user, id = %log.id, start = %start_date, "period logged");
        Ok(log)
    }

    pub fn end_period(
        &self,
        user: Uuid,
        id: Uuid,
        end_date: NaiveDate,
        today: NaiveDate,
    ) -> Result<PeriodLog, ServiceError> {
        if end_date > today {
            return Err(ServiceError::FutureDate(end_date));
        }
        let _guard = self.refine_lock.lock().map_err(|_| StoreError::Poisoned)?;
        let mut log = self
            .store
            .period(user, id)?
            .ok_or(ServiceError::PeriodNotFound(id))?;
        if log.end_date.is_some() {
            return Err(ServiceError::AlreadyEnded(id));
        }
        log.end_date = Some(end_date);
        log.validate()?;

        if !self.store.set_period_end(user, id, end_date)? {
            return Err(ServiceError::PeriodNotFound(id));
        }
        tracing::info!(%user, %id, end = %end_date, "period ended");
        Ok(log)
    }

    pub fn delete_period(&self, user: Uuid, id: Uuid) -> Result<(), ServiceError> {
        let _guard = self.refine_lock.lock().map_err(|_| StoreError::Poisoned)?;
        if !self.store.delete_period(user, id)? {
            return Err(ServiceError::PeriodNotFound(id));
        }
        tracing::info!(%user, %id, "period deleted");
        Ok(())
    }

    /// Add `name` to the symptoms logged on `date`, or take it off again.
    /// Returns whether the symptom is logged afterwards.
    pub fn toggle_symptom(
        &self,
        user: Uuid,
        date: NaiveDate,
        name: &str,
        today: NaiveDate,
    ) -> Result<bool, ServiceError> {
        if date > today {
            return Err(ServiceError::FutureDate(date));
        }
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::EmptySymptom.into());
        }
        let logged = self.store.toggle_symptom(user, date, name)?;
        tracing::info!(%user, %date, symptom = name, logged, "symptom toggled");
        Ok(logged)
    }

    /// Save the mood, energy, sleep and notes for one day, replacing any
    /// entry already saved for that date.
    pub fn log_day(
        &self,
        user: Uuid,
        log: DailyLog,
        today: NaiveDate,
    ) -> Result<DailyLog, ServiceError> {
        if log.date > today {
            return Err(ServiceError::FutureDate(log.date));
        }
        log.validate()?;
        let replaced = self.store.upsert_daily_log(user, log.clone())?;
        tracing::info!(%user, date = %log.date, replaced = replaced.is_some(), "daily log saved");
        Ok(log)
    }

    /// Refine the profile from recent history, persist the refinement,
    /// compute today's phase and reschedule reminders.
    pub fn refresh(&self, user: Uuid, today: NaiveDate) -> Result<Dashboard, ServiceError> {
        let _guard = self.refine_lock.lock().map_err(|_| StoreError::Poisoned)?;
        let stored = self.require_profile(user)?;
        let profile = self.refined_profile(user, stored)?;
        if profile != stored {
            self.store.put_profile(user, profile)?;
            tracing::info!(
                %user,
                anchor = %profile.last_period_date,
                cycle_length = profile.average_cycle_length,
                "cycle profile refined"
            );
        }

        let phase = prediction::compute_phase(
            profile.last_period_date,
            profile.average_cycle_length,
            profile.average_period_length,
            today,
        )?;
        let reminders = reminders::plan_reminders(
            &phase,
            profile.average_cycle_length,
            self.settings.reminder_days_before,
            today,
        );
        reminders::sync_reminders(self.scheduler.as_ref(), &reminders);

        Ok(Dashboard {
            profile,
            phase,
            reminders,
        })
    }

    pub fn month(
        &self,
        user: Uuid,
        year: i32,
        month: u32,
        today: NaiveDate,
    ) -> Result<MonthView, ServiceError> {
        let profile = self.refined_profile(user, self.require_profile(user)?)?;
        let logs = self.store.recent_periods(user, None)?;
        let mut days = prediction::classify_month(year, month, &logs, &profile, today)?;
        if !self.settings.show_fertility {
            for day in &mut days {
                day.marks
                    .retain(|m| !matches!(m, DayMark::Ovulation | DayMark::FertileWindow));
            }
        }
        Ok(MonthView { year, month, days })
    }

    pub fn stats(&self, user: Uuid) -> Result<CycleStats, ServiceError> {
        let profile = self.require_profile(user)?;
        let logs = self.store.recent_periods(user, None)?;
        Ok(prediction::cycle_stats(&logs, &profile))
    }

    fn require_profile(&self, user: Uuid) -> Result<CycleProfile, ServiceError> {
        self.store
            .profile(user)?
            .ok_or(ServiceError::NotOnboarded(user))
    }

    /// Stored profile with anchor and cycle length taken from logged history.
    /// A refined length that would break the profile invariants is ignored.
    fn refined_profile(
        &self,
        user: Uuid,
        stored: CycleProfile,
    ) -> Result<CycleProfile, ServiceError> {
        let history = self
            .store
            .recent_periods(user, Some(self.settings.history_limit))?;
        let refinement = prediction::refine_cycle_length(
            &history,
            stored.last_period_date,
            stored.average_cycle_length,
        )?;

        let refined = CycleProfile {
            last_period_date: refinement.anchor,
            average_cycle_length: refinement.average_cycle_length,
            ..stored
        };
        if refined.validate().is_err() {
            tracing::warn!(
                %user,
                cycle_length = refinement.average_cycle_length,
                period_length = stored.average_period_length,
                "refined cycle length conflicts with period length, keeping stored length"
            );
            return Ok(CycleProfile {
                last_period_date: refinement.anchor,
                ..stored
            });
        }
        Ok(refined)
    }
}
