use chrono::{Duration, NaiveDate};

use crate::insights::recent_symptom_names;
use crate::models::{CyclePhase, CycleProfile, DailyLog, PeriodLog, SymptomLog};

/// Recent periods listed in the chat context.
const RECENT_PERIODS: usize = 3;
const SYMPTOM_LOOKBACK_DAYS: i64 = 7;

/// What the chat assistant is told about the user.
pub struct ContextInput<'a> {
    pub display_name: Option<&'a str>,
    pub age: Option<u32>,
    pub profile: &'a CycleProfile,
    pub phase: &'a CyclePhase,
    /// Most recent first.
    pub periods: &'a [PeriodLog],
    pub symptoms: &'a [SymptomLog],
    pub daily_logs: &'a [DailyLog],
    pub today: NaiveDate,
}

/// Render the cycle summary that is prepended to the assistant's system prompt.
pub fn build_chat_context(input: &ContextInput<'_>) -> String {
    let phase = input.phase;
    let mut lines = vec![
        "USER'S CURRENT CYCLE INFORMATION:".to_string(),
        format!("- Name: {}", input.display_name.unwrap_or("User")),
        format!(
            "- Age: {}",
            input
                .age
                .map(|a| a.to_string())
                .unwrap_or_else(|| "Not specified".into())
        ),
        format!("- Current Cycle Day: {}", phase.display_day()),
        format!("- Current Phase: {}", phase.phase.label()),
        format!("- Days Until Next Period: {}", phase.days_until_next_period),
        format!(
            "- Average Cycle Length: {} days",
            input.profile.average_cycle_length
        ),
        format!(
            "- Average Period Length: {} days",
            input.profile.average_period_length
        ),
        format!(
            "- In Fertile Window: {}",
            if phase.is_in_fertile_window { "Yes" } else { "No" }
        ),
        format!("- Last Period Started: {}", input.profile.last_period_date),
    ];

    if !input.periods.is_empty() {
        let starts: Vec<String> = input
            .periods
            .iter()
            .take(RECENT_PERIODS)
            .map(|p| p.start_date.to_string())
            .collect();
        lines.push(format!("- Recent Periods: {}", starts.join(", ")));
    }

    let week_ago = input.today - Duration::days(SYMPTOM_LOOKBACK_DAYS);
    let symptoms = recent_symptom_names(input.symptoms, week_ago);
    if !symptoms.is_empty() {
        lines.push(format!(
            "- Recent Symptoms (past week): {}",
            symptoms.join(", ")
        ));
    }

    if let Some(log) = input.daily_logs.iter().find(|l| l.date == input.today) {
        lines.push(format!(
            "- Today's Mood: {}",
            log.mood.map(|m| m.as_str()).unwrap_or("Not logged")
        ));
        lines.push(format!(
            "- Today's Energy: {}/5",
            log.energy_level
                .map(|e| e.to_string())
                .unwrap_or_else(|| "Not logged".into())
        ));
    }

    lines.join("\n")
}
