//! Sequential day allocation for the activity schedule.

use serde::{Deserialize, Serialize};

/// One schedule row as typed into the form
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityInput {
    #[serde(rename = "atividade", alias = "description", default)]
    pub description: String,
    /// Raw text of the duration field, in days
    #[serde(rename = "duracao", alias = "duration", default)]
    pub duration: String,
}

impl ActivityInput {
    pub fn new(description: impl Into<String>, duration: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            duration: duration.into(),
        }
    }
}

/// Row with its allocated days. Start and end are `None` for rows that
/// carry no positive duration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledActivity {
    pub description: String,
    pub duration: Option<u32>,
    pub start_day: Option<u32>,
    pub end_day: Option<u32>,
}

impl ScheduledActivity {
    /// `Dia 11`, or empty when cleared
    pub fn start_label(&self) -> String {
        day_label(self.start_day)
    }

    pub fn end_label(&self) -> String {
        day_label(self.end_day)
    }
}

fn day_label(day: Option<u32>) -> String {
    day.map(|d| format!("Dia {}", d)).unwrap_or_default()
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schedule {
    pub rows: Vec<ScheduledActivity>,
    pub total_days: u32,
}

impl Schedule {
    /// `"35 dias"`; `None` when no row has a positive duration
    pub fn execution_deadline(&self) -> Option<String> {
        (self.total_days > 0).then(|| format!("{} dias", self.total_days))
    }

    /// Deadline field after recomputation: overwritten only when there is a total
    pub fn apply_deadline(&self, current: &str) -> String {
        self.execution_deadline()
            .unwrap_or_else(|| current.to_string())
    }
}

/// Leading integer of a number field: `" 10 "` → 10, `"5 dias"` → 5, `"abc"` → `None`
pub fn parse_duration(text: &str) -> Option<i64> {
    let trimmed = text.trim_start();
    let (negative, rest) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };
    let digits: &str = &rest[..rest.bytes().take_while(u8::is_ascii_digit).count()];
    if digits.is_empty() {
        return None;
    }
    let value: i64 = digits.parse().ok()?;
    Some(if negative { -value } else { value })
}

/// Allocates consecutive days starting at day 1.
///
/// Each row with a positive duration `d` occupies `[start, start + d - 1]`
/// and the next row starts the day after. Other rows are cleared and take
/// no days. Pure, so recomputing on unchanged input gives the same result.
pub fn compute_schedule(activities: &[ActivityInput]) -> Schedule {
    let mut next_day: u32 = 1;
    let mut total_days: u32 = 0;

    let rows = activities
        .iter()
        .map(|activity| {
            let duration = parse_duration(&activity.duration)
                .filter(|d| *d > 0)
                .and_then(|d| u32::try_from(d).ok());

            match duration {
                Some(days) => {
                    let start = next_day;
                    let end = start.saturating_add(days - 1);
                    next_day = end.saturating_add(1);
                    total_days = total_days.saturating_add(days);
                    ScheduledActivity {
                        description: activity.description.clone(),
                        duration: Some(days),
                        start_day: Some(start),
                        end_day: Some(end),
                    }
                }
                None => ScheduledActivity {
                    description: activity.description.clone(),
                    duration: None,
                    start_day: None,
                    end_day: None,
                },
            }
        })
        .collect();

    Schedule { rows, total_days }
}
