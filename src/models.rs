use std::collections::BTreeSet;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_CYCLE_LENGTH: i32 = 28;
pub const DEFAULT_PERIOD_LENGTH: i32 = 5;

/// Accepted range for user-entered cycle settings.
pub const MIN_CYCLE_LENGTH: i32 = 15;
pub const MAX_CYCLE_LENGTH: i32 = 60;
pub const MAX_PERIOD_LENGTH: i32 = 14;
/// Longest cycle the predictor accepts at all. Anything longer is not a cycle.
pub const MAX_PREDICTABLE_CYCLE_LENGTH: i32 = 365;
/// Energy and sleep are rated 1-5.
pub const MAX_RATING: u8 = 5;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("invalid cycle profile: cycle length {cycle_length}, period length {period_length}")]
    InvalidProfile { cycle_length: i32, period_length: i32 },
    #[error(
        "cycle length must be 15-60 days and period length 1-14 days \
         (got {cycle_length} and {period_length})"
    )]
    ProfileOutOfRange { cycle_length: i32, period_length: i32 },
    #[error("period {id} ends on {end_date}, before it starts on {start_date}")]
    InvalidPeriodLog {
        id: Uuid,
        start_date: NaiveDate,
        end_date: NaiveDate,
    },
    #[error("period history is not most-recent-first: {earlier} is listed before {later}")]
    NonChronologicalHistory { earlier: NaiveDate, later: NaiveDate },
    #[error("invalid calendar month {year}-{month}")]
    InvalidDate { year: i32, month: u32 },
    #[error("{date} shifted by {days} days is outside the supported calendar")]
    DateOutOfRange { date: NaiveDate, days: i64 },
    #[error("{field} on {date} must be 1-5, got {value}")]
    RatingOutOfRange {
        date: NaiveDate,
        field: &'static str,
        value: u8,
    },
    #[error("symptom name must not be empty")]
    EmptySymptom,
    #[error("unknown {kind} `{value}`")]
    UnknownValue { kind: &'static str, value: String },
}

/// Check the length invariants every phase computation relies on.
pub fn validate_lengths(cycle_length: i32, period_length: i32) -> Result<(), ValidationError> {
    if cycle_length <= 0
        || cycle_length > MAX_PREDICTABLE_CYCLE_LENGTH
        || period_length <= 0
        || period_length >= cycle_length
    {
        return Err(ValidationError::InvalidProfile {
            cycle_length,
            period_length,
        });
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodLog {
    pub id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
}

impl PeriodLog {
    pub fn new(start_date: NaiveDate, end_date: Option<NaiveDate>) -> Self {
        Self {
            id: Uuid::new_v4(),
            start_date,
            end_date,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        match self.end_date {
            Some(end_date) if end_date < self.start_date => Err(ValidationError::InvalidPeriodLog {
                id: self.id,
                start_date: self.start_date,
                end_date,
            }),
            _ => Ok(()),
        }
    }

    /// Last bleeding day, assuming `fallback_length` days when no end was logged.
    pub fn last_day(&self, fallback_length: i32) -> NaiveDate {
        self.end_date.unwrap_or_else(|| {
            self.start_date
                .checked_add_signed(Duration::days(i64::from(fallback_length.max(1)) - 1))
                .unwrap_or(NaiveDate::MAX)
        })
    }

    pub fn covers(&self, date: NaiveDate, fallback_length: i32) -> bool {
        date >= self.start_date && date <= self.last_day(fallback_length)
    }

    /// Length in days, inclusive of both ends.
    pub fn length(&self, fallback_length: i32) -> i64 {
        (self.last_day(fallback_length) - self.start_date).num_days() + 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleProfile {
    pub last_period_date: NaiveDate,
    pub average_cycle_length: i32,
    pub average_period_length: i32,
}

impl CycleProfile {
    /// Profile with the onboarding defaults.
    pub fn new(last_period_date: NaiveDate) -> Self {
        Self {
            last_period_date,
            average_cycle_length: DEFAULT_CYCLE_LENGTH,
            average_period_length: DEFAULT_PERIOD_LENGTH,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_lengths(self.average_cycle_length, self.average_period_length)
    }

    /// Stricter check for values a user types in during onboarding or in settings.
    pub fn validate_settings(&self) -> Result<(), ValidationError> {
        self.validate()?;
        let cycle_ok = (MIN_CYCLE_LENGTH..=MAX_CYCLE_LENGTH).contains(&self.average_cycle_length);
        let period_ok = (1..=MAX_PERIOD_LENGTH).contains(&self.average_period_length);
        if !cycle_ok || !period_ok {
            return Err(ValidationError::ProfileOutOfRange {
                cycle_length: self.average_cycle_length,
                period_length: self.average_period_length,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Period,
    Follicular,
    Ovulation,
    Luteal,
}

impl Phase {
    pub fn label(self) -> &'static str {
        match self {
            Phase::Period => "Period",
            Phase::Follicular => "Follicular Phase",
            Phase::Ovulation => "Ovulation",
            Phase::Luteal => "Luteal Phase",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FertileWindow {
    pub start: NaiveDate,
    /// Predicted ovulation day.
    pub end: NaiveDate,
}

/// Where `today` sits in the cycle, and what comes next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CyclePhase {
    pub phase: Phase,
    /// Zero-indexed.
    pub cycle_day: i64,
    pub days_until_next_period: i64,
    pub next_period_date: NaiveDate,
    /// Window counted from the anchor date itself.
    pub fertile_window: FertileWindow,
    /// The same window within the cycle `today` falls in. Equal to
    /// `fertile_window` during the first cycle after the anchor.
    pub current_fertile_window: FertileWindow,
    pub is_in_fertile_window: bool,
}

impl CyclePhase {
    /// "Day N" as shown to the user.
    pub fn display_day(&self) -> i64 {
        self.cycle_day + 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DayMark {
    LoggedPeriod,
    PredictedPeriod,
    Ovulation,
    FertileWindow,
}

pub type DayFlags = BTreeSet<DayMark>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarDay {
    pub date: NaiveDate,
    pub marks: DayFlags,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleLength {
    pub start_date: NaiveDate,
    pub cycle_length: i64,
    pub period_length: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleStats {
    pub total_periods: usize,
    pub avg_cycle_length: Option<i64>,
    pub avg_period_length: Option<i64>,
    pub shortest_cycle: Option<i64>,
    pub longest_cycle: Option<i64>,
    /// Spread between the longest and shortest recent cycle.
    pub variation: Option<i64>,
    /// 0.1 (erratic) to 0.95 (very regular).
    pub regularity: Option<f32>,
    pub recent_cycles: Vec<CycleLength>,
    pub last_period_start: Option<NaiveDate>,
    pub last_period_end: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReminderKind {
    PeriodSoon,
    FertileWindowSoon,
    Ovulation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reminder {
    pub kind: ReminderKind,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SymptomLog {
    pub date: NaiveDate,
    pub name: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    Great,
    Good,
    Okay,
    Low,
    Stressed,
}

impl Mood {
    pub fn score(self) -> u8 {
        match self {
            Mood::Great => 5,
            Mood::Good => 4,
            Mood::Okay => 3,
            Mood::Low => 2,
            Mood::Stressed => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Mood::Great => "great",
            Mood::Good => "good",
            Mood::Okay => "okay",
            Mood::Low => "low",
            Mood::Stressed => "stressed",
        }
    }
}

impl FromStr for Mood {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "great" => Ok(Mood::Great),
            "good" => Ok(Mood::Good),
            "okay" => Ok(Mood::Okay),
            "low" => Ok(Mood::Low),
            "stressed" => Ok(Mood::Stressed),
            _ => Err(ValidationError::UnknownValue {
                kind: "mood",
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FlowLevel {
    Spotting,
    Light,
    Medium,
    Heavy,
}

impl FromStr for FlowLevel {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "spotting" => Ok(FlowLevel::Spotting),
            "light" => Ok(FlowLevel::Light),
            "medium" => Ok(FlowLevel::Medium),
            "heavy" => Ok(FlowLevel::Heavy),
            _ => Err(ValidationError::UnknownValue {
                kind: "flow level",
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DailyLog {
    pub date: NaiveDate,
    pub mood: Option<Mood>,
    pub energy_level: Option<u8>, // 1-5
    pub sleep_quality: Option<u8>, // 1-5
    pub flow: Option<FlowLevel>,
    #[serde(default)]
    pub notes: String,
}

impl DailyLog {
    /// Empty entry for `date`.
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            mood: None,
            energy_level: None,
            sleep_quality: None,
            flow: None,
            notes: String::new(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        for (field, value) in [
            ("energy_level", self.energy_level),
            ("sleep_quality", self.sleep_quality),
        ] {
            if let Some(value) = value.filter(|v| !(1..=MAX_RATING).contains(v)) {
                return Err(ValidationError::RatingOutOfRange {
                    date: self.date,
                    field,
                    value,
                });
            }
        }
        Ok(())
    }
}

/// Everything cached on the device for one user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Snapshot {
    pub user_id: Uuid,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub age: Option<u32>,
    pub profile: Option<CycleProfile>,
    #[serde(default)]
    pub period_logs: Vec<PeriodLog>,
    #[serde(default)]
    pub symptoms: Vec<SymptomLog>,
    #[serde(default)]
    pub daily_logs: Vec<DailyLog>,
    pub last_sync: Option<DateTime<Utc>>,
}

impl Snapshot {
    pub fn new(user_id: Uuid) -> Self {
        Self {
            user_id,
            display_name: None,
            age: None,
            profile: None,
            period_logs: Vec::new(),
            symptoms: Vec::new(),
            daily_logs: Vec::new(),
            last_sync: None,
        }
    }

    /// Check every record an import would bring in.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(profile) = &self.profile {
            profile.validate()?;
        }
        for log in &self.period_logs {
            log.validate()?;
        }
        if self.symptoms.iter().any(|s| s.name.trim().is_empty()) {
            return Err(ValidationError::EmptySymptom);
        }
        self.daily_logs.iter().try_for_each(DailyLog::validate)
    }
}

/// Data returned for the home screen.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Dashboard {
    pub profile: CycleProfile,
    pub phase: CyclePhase,
    pub reminders: Vec<Reminder>,
}

/// Data returned for a month view
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MonthView {
    pub year: i32,
    pub month: u32,
    pub days: Vec<CalendarDay>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn open_period_uses_fallback_length() {
        let log = PeriodLog::new(date("2024-03-01"), None);
        assert_eq!(log.last_day(5), date("2024-03-05"));
        assert!(log.covers(date("2024-03-05"), 5));
        assert!(!log.covers(date("2024-03-06"), 5));
        assert_eq!(log.length(5), 5);
    }

    #[test]
    fn end_before_start_is_rejected() {
        let log = PeriodLog::new(date("2024-03-05"), Some(date("2024-03-01")));
        assert!(matches!(
            log.validate(),
            Err(ValidationError::InvalidPeriodLog { .. })
        ));
    }

    #[test]
    fn profile_lengths_must_be_ordered() {
        let mut profile = CycleProfile::new(date("2024-01-01"));
        assert!(profile.validate().is_ok());

        profile.average_period_length = 28;
        assert_eq!(
            profile.validate(),
            Err(ValidationError::InvalidProfile {
                cycle_length: 28,
                period_length: 28
            })
        );

        profile.average_period_length = 0;
        assert!(profile.validate().is_err());
    }

    #[test]
    fn settings_must_be_in_clinical_range() {
        let mut profile = CycleProfile::new(date("2024-01-01"));
        profile.average_cycle_length = 12;
        profile.average_period_length = 4;
        assert!(profile.validate().is_ok());
        assert!(matches!(
            profile.validate_settings(),
            Err(ValidationError::ProfileOutOfRange { .. })
        ));
    }

    #[test]
    fn absurd_cycle_length_is_rejected() {
        assert!(matches!(
            validate_lengths(200_000_000, 5),
            Err(ValidationError::InvalidProfile { .. })
        ));
        assert!(validate_lengths(MAX_PREDICTABLE_CYCLE_LENGTH, 5).is_ok());
    }

    #[test]
    fn daily_ratings_must_be_one_to_five() {
        let mut log = DailyLog::new(date("2024-03-01"));
        assert!(log.validate().is_ok());
        log.energy_level = Some(5);
        log.sleep_quality = Some(1);
        assert!(log.validate().is_ok());

        log.sleep_quality = Some(0);
        assert_eq!(
            log.validate(),
            Err(ValidationError::RatingOutOfRange {
                date: date("2024-03-01"),
                field: "sleep_quality",
                value: 0
            })
        );
        log.sleep_quality = None;
        log.energy_level = Some(6);
        assert!(log.validate().is_err());
    }

    #[test]
    fn mood_and_flow_parse_from_cli_words() {
        assert_eq!("Great".parse::<Mood>(), Ok(Mood::Great));
        assert_eq!("spotting".parse::<FlowLevel>(), Ok(FlowLevel::Spotting));
        assert!(matches!(
            "meh".parse::<Mood>(),
            Err(ValidationError::UnknownValue { kind: "mood", .. })
        ));
    }

    #[test]
    fn snapshot_validation_covers_every_record() {
        let mut snapshot = Snapshot::new(Uuid::new_v4());
        snapshot.profile = Some(CycleProfile::new(date("2024-01-01")));
        assert!(snapshot.validate().is_ok());

        snapshot.profile = Some(CycleProfile {
            average_cycle_length: 200_000_000,
            ..CycleProfile::new(date("2024-01-01"))
        });
        assert!(matches!(
            snapshot.validate(),
            Err(ValidationError::InvalidProfile { .. })
        ));

        snapshot.profile = None;
        let mut day = DailyLog::new(date("2024-01-02"));
        day.energy_level = Some(7);
        snapshot.daily_logs.push(day);
        assert!(matches!(
            snapshot.validate(),
            Err(ValidationError::RatingOutOfRange { .. })
        ));
    }

    #[test]
    fn mood_serializes_lowercase() {
        let json = serde_json::to_string(&Mood::Stressed).unwrap();
        assert_eq!(json, "\"stressed\"");
        assert_eq!(Mood::Stressed.score(), 1);
    }
}
