use crate::domain::recurrence::{EndCondition, Frequency, RecurrenceRule};
use crate::domain::settings::SchedulingSettings;
use chrono::{DateTime, Datelike, Days, Duration, Months, NaiveDateTime, TimeZone, Utc, Weekday};
use chrono_tz::Tz;

/// Steps on local wall-clock time in the configured zone, so a weekly 09:00 rule stays at
/// 09:00 across daylight-saving changes.
#[derive(Debug, Clone, Copy)]
pub struct RecurrenceEngine {
    timezone: Tz,
}

impl Default for RecurrenceEngine {
    fn default() -> Self {
        Self { timezone: Tz::UTC }
    }
}

impl RecurrenceEngine {
    pub fn new(timezone: Tz) -> Self {
        Self { timezone }
    }

    pub fn from_settings(settings: &SchedulingSettings) -> Self {
        Self::new(settings.timezone())
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// Monthly and yearly steps clamp to the last valid day of the target month
    /// (Jan 31 -> Feb 29 in a leap year, Feb 29 -> Feb 28 the following year).
    pub fn next_occurrence(
        &self,
        from_date: DateTime<Utc>,
        rule: &RecurrenceRule,
    ) -> Option<DateTime<Utc>> {
        let local = self.to_local(from_date);
        let next = step_local(rule.frequency(), local)?;
        self.from_local(next)
    }

    /// `materialized` is the number of occurrences the caller has already produced for
    /// this rule; the engine does not count across calls.
    pub fn is_finished(
        &self,
        rule: &RecurrenceRule,
        current_date: DateTime<Utc>,
        materialized: u32,
    ) -> bool {
        match rule.end_condition() {
            EndCondition::Never => false,
            EndCondition::OnDate(end_date) => current_date > end_date,
            EndCondition::AfterOccurrences(limit) => materialized >= limit.get(),
        }
    }

    /// Monthly and yearly occurrences are `start + k months` from the anchor, so a clamp
    /// in a short month does not shift later ones. End conditions are not applied here.
    pub fn occurrences<'a>(&'a self, rule: &'a RecurrenceRule) -> Occurrences<'a> {
        let mut anchor = self.to_local(rule.start_date());
        if rule.frequency() == Frequency::Workdays && is_weekend(anchor.weekday()) {
            anchor = next_workday(anchor).unwrap_or(anchor);
        }
        Occurrences {
            engine: self,
            frequency: rule.frequency(),
            anchor,
            index: 0,
            pending: Some(anchor),
        }
    }

    /// Occurrences before `start_from` are skipped without consuming either the `count`
    /// budget or the rule's occurrence budget. `start_from` itself is only emitted when
    /// it lands on the rule's cadence.
    pub fn generate_future_occurrences(
        &self,
        rule: &RecurrenceRule,
        count: usize,
        start_from: DateTime<Utc>,
    ) -> Vec<DateTime<Utc>> {
        let mut emitted = Vec::new();
        if count == 0 {
            return emitted;
        }

        for occurrence in self
            .occurrences(rule)
            .skip_while(|occurrence| *occurrence < start_from)
        {
            if emitted.len() >= count {
                break;
            }
            let materialized = u32::try_from(emitted.len()).unwrap_or(u32::MAX);
            if self.is_finished(rule, occurrence, materialized) {
                break;
            }
            emitted.push(occurrence);
        }

        tracing::debug!(
            frequency = ?rule.frequency(),
            requested = count,
            emitted = emitted.len(),
            "expanded recurrence rule"
        );
        emitted
    }

    pub fn describe(&self, rule: &RecurrenceRule) -> String {
        let start = rule.start_date().with_timezone(&self.timezone);
        let cadence = match rule.frequency() {
            Frequency::Daily => "Every day".to_string(),
            Frequency::Weekly => format!("Every week on {}", weekday_name(start.weekday())),
            Frequency::Monthly => format!("Every month on the {}", ordinal(start.day())),
            Frequency::Yearly => format!("Every year on {}", start.format("%B %-d")),
            Frequency::Workdays => "Every weekday (Monday to Friday)".to_string(),
        };

        let mut description = format!("{cadence}, starting {}", start.format("%B %-d, %Y"));
        match rule.end_condition() {
            EndCondition::Never => {}
            EndCondition::OnDate(end_date) => {
                let end = end_date.with_timezone(&self.timezone);
                description.push_str(&format!(", until {}", end.format("%B %-d, %Y")));
            }
            EndCondition::AfterOccurrences(count) if count.get() == 1 => {
                description.push_str(", once");
            }
            EndCondition::AfterOccurrences(count) => {
                description.push_str(&format!(", {} times", count.get()));
            }
        }
        description
    }

    fn to_local(&self, instant: DateTime<Utc>) -> NaiveDateTime {
        instant.with_timezone(&self.timezone).naive_local()
    }

    // ambiguous -> earlier instant, DST gap -> one hour later
    fn from_local(&self, local: NaiveDateTime) -> Option<DateTime<Utc>> {
        self.timezone
            .from_local_datetime(&local)
            .earliest()
            .or_else(|| {
                self.timezone
                    .from_local_datetime(&(local + Duration::hours(1)))
                    .earliest()
            })
            .map(|value| value.with_timezone(&Utc))
    }
}

pub struct Occurrences<'a> {
    engine: &'a RecurrenceEngine,
    frequency: Frequency,
    anchor: NaiveDateTime,
    index: u32,
    pending: Option<NaiveDateTime>,
}

impl Iterator for Occurrences<'_> {
    type Item = DateTime<Utc>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.pending.take()?;
        self.index = self.index.checked_add(1)?;
        self.pending = match self.frequency {
            Frequency::Monthly => self
                .anchor
                .checked_add_months(Months::new(self.index)),
            Frequency::Yearly => self
                .index
                .checked_mul(12)
                .and_then(|months| self.anchor.checked_add_months(Months::new(months))),
            _ => step_local(self.frequency, current),
        };
        self.engine.from_local(current)
    }
}

fn step_local(frequency: Frequency, local: NaiveDateTime) -> Option<NaiveDateTime> {
    match frequency {
        Frequency::Daily => local.checked_add_days(Days::new(1)),
        Frequency::Weekly => local.checked_add_days(Days::new(7)),
        Frequency::Monthly => local.checked_add_months(Months::new(1)),
        Frequency::Yearly => local.checked_add_months(Months::new(12)),
        Frequency::Workdays => next_workday(local),
    }
}

fn next_workday(local: NaiveDateTime) -> Option<NaiveDateTime> {
    let mut candidate = local.checked_add_days(Days::new(1))?;
    while is_weekend(candidate.weekday()) {
        candidate = candidate.checked_add_days(Days::new(1))?;
    }
    Some(candidate)
}

fn is_weekend(weekday: Weekday) -> bool {
    matches!(weekday, Weekday::Sat | Weekday::Sun)
}

fn weekday_name(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

fn ordinal(day: u32) -> String {
    let suffix = match (day % 10, day % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{day}{suffix}")
}
