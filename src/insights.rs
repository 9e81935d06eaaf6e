//! Symptom and mood summaries for the insights screen and chat context.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::{DailyLog, SymptomLog};

/// Energy assumed for a day with a mood but no energy level.
const DEFAULT_ENERGY: u8 = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymptomCount {
    pub name: String,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoodPoint {
    pub date: NaiveDate,
    pub mood: u8,
    pub energy: u8,
}

/// Most frequent symptoms logged on or after `since`.
pub fn top_symptoms(symptoms: &[SymptomLog], since: NaiveDate, limit: usize) -> Vec<SymptomCount> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for symptom in symptoms.iter().filter(|s| s.date >= since) {
        *counts.entry(symptom.name.as_str()).or_default() += 1;
    }

    let mut ranked: Vec<SymptomCount> = counts
        .into_iter()
        .map(|(name, count)| SymptomCount {
            name: name.to_string(),
            count,
        })
        .collect();
    ranked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
    ranked.truncate(limit);
    ranked
}

/// Distinct symptom names since `since`, in the order first logged.
pub fn recent_symptom_names(symptoms: &[SymptomLog], since: NaiveDate) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for symptom in symptoms.iter().filter(|s| s.date >= since) {
        if !names.contains(&symptom.name) {
            names.push(symptom.name.clone());
        }
    }
    names
}

/// Mood and energy scores for the last `limit` days with a mood logged.
pub fn mood_trend(daily_logs: &[DailyLog], since: NaiveDate, limit: usize) -> Vec<MoodPoint> {
    let mut points: Vec<MoodPoint> = daily_logs
        .iter()
        .filter(|l| l.date >= since)
        .filter_map(|l| {
            l.mood.map(|mood| MoodPoint {
                date: l.date,
                mood: mood.score(),
                energy: l.energy_level.unwrap_or(DEFAULT_ENERGY),
            })
        })
        .collect();
    points.sort_by_key(|p| p.date);
    if points.len() > limit {
        points.drain(..points.len() - limit);
    }
    points
}
