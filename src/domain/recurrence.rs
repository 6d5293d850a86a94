use crate::domain::error::RecurrenceError;
use chrono::{DateTime, Datelike, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::num::NonZeroU32;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
    Workdays,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EndsType {
    Never,
    OnDate,
    AfterOccurrences,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndCondition {
    Never,
    OnDate(DateTime<Utc>),
    AfterOccurrences(NonZeroU32),
}

impl EndCondition {
    pub fn ends_type(&self) -> EndsType {
        match self {
            Self::Never => EndsType::Never,
            Self::OnDate(_) => EndsType::OnDate,
            Self::AfterOccurrences(_) => EndsType::AfterOccurrences,
        }
    }
}

/// Instants are kept at millisecond precision with a four-digit year so the JSON form
/// round-trips exactly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RecurrenceRuleRecord", into = "RecurrenceRuleRecord")]
pub struct RecurrenceRule {
    frequency: Frequency,
    start_date: DateTime<Utc>,
    ends: EndCondition,
    day_of_week: Option<u8>,
}

impl RecurrenceRule {
    pub fn new(
        frequency: Frequency,
        start_date: DateTime<Utc>,
        ends_type: EndsType,
        end_date: Option<DateTime<Utc>>,
        occurrences: Option<u32>,
        day_of_week: Option<u8>,
    ) -> Result<Self, RecurrenceError> {
        let start_date = storable_instant(start_date)?;
        let ends = match ends_type {
            EndsType::Never => {
                if end_date.is_some() {
                    return Err(RecurrenceError::UnexpectedEndDate);
                }
                if occurrences.is_some() {
                    return Err(RecurrenceError::UnexpectedOccurrences);
                }
                EndCondition::Never
            }
            EndsType::OnDate => {
                if occurrences.is_some() {
                    return Err(RecurrenceError::UnexpectedOccurrences);
                }
                let end_date =
                    storable_instant(end_date.ok_or(RecurrenceError::MissingEndDate)?)?;
                if end_date < start_date {
                    return Err(RecurrenceError::EndDateBeforeStart);
                }
                EndCondition::OnDate(end_date)
            }
            EndsType::AfterOccurrences => {
                if end_date.is_some() {
                    return Err(RecurrenceError::UnexpectedEndDate);
                }
                let occurrences = occurrences.ok_or(RecurrenceError::MissingOccurrences)?;
                EndCondition::AfterOccurrences(
                    NonZeroU32::new(occurrences).ok_or(RecurrenceError::ZeroOccurrences)?,
                )
            }
        };
        if let Some(day) = day_of_week {
            if day > 6 {
                return Err(RecurrenceError::InvalidDayOfWeek(day));
            }
        }

        Ok(Self {
            frequency,
            start_date,
            ends,
            day_of_week,
        })
    }

    pub fn never(
        frequency: Frequency,
        start_date: DateTime<Utc>,
    ) -> Result<Self, RecurrenceError> {
        Self::new(frequency, start_date, EndsType::Never, None, None, None)
    }

    pub fn until(
        frequency: Frequency,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
    ) -> Result<Self, RecurrenceError> {
        Self::new(
            frequency,
            start_date,
            EndsType::OnDate,
            Some(end_date),
            None,
            None,
        )
    }

    pub fn times(
        frequency: Frequency,
        start_date: DateTime<Utc>,
        occurrences: u32,
    ) -> Result<Self, RecurrenceError> {
        Self::new(
            frequency,
            start_date,
            EndsType::AfterOccurrences,
            None,
            Some(occurrences),
            None,
        )
    }

    pub fn with_day_of_week(mut self, day_of_week: u8) -> Result<Self, RecurrenceError> {
        if day_of_week > 6 {
            return Err(RecurrenceError::InvalidDayOfWeek(day_of_week));
        }
        self.day_of_week = Some(day_of_week);
        Ok(self)
    }

    pub fn frequency(&self) -> Frequency {
        self.frequency
    }

    pub fn start_date(&self) -> DateTime<Utc> {
        self.start_date
    }

    pub fn end_condition(&self) -> EndCondition {
        self.ends
    }

    pub fn ends_type(&self) -> EndsType {
        self.ends.ends_type()
    }

    pub fn end_date(&self) -> Option<DateTime<Utc>> {
        match self.ends {
            EndCondition::OnDate(end_date) => Some(end_date),
            _ => None,
        }
    }

    pub fn occurrences(&self) -> Option<u32> {
        match self.ends {
            EndCondition::AfterOccurrences(count) => Some(count.get()),
            _ => None,
        }
    }

    pub fn day_of_week(&self) -> Option<u8> {
        self.day_of_week
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parses the stored JSON form. Malformed or inconsistent input yields `None` so the
    /// owning entity can be treated as non-recurring.
    pub fn from_json(raw: &str) -> Option<Self> {
        serde_json::from_str(raw).ok()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RecurrenceRuleRecord {
    frequency: Frequency,
    #[serde(
        serialize_with = "serialize_instant",
        deserialize_with = "deserialize_instant"
    )]
    start_date: DateTime<Utc>,
    ends_type: EndsType,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_optional_instant",
        deserialize_with = "deserialize_optional_instant"
    )]
    end_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    occurrences: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    day_of_week: Option<u8>,
}

impl TryFrom<RecurrenceRuleRecord> for RecurrenceRule {
    type Error = RecurrenceError;

    fn try_from(record: RecurrenceRuleRecord) -> Result<Self, Self::Error> {
        Self::new(
            record.frequency,
            record.start_date,
            record.ends_type,
            record.end_date,
            record.occurrences,
            record.day_of_week,
        )
    }
}

impl From<RecurrenceRule> for RecurrenceRuleRecord {
    fn from(rule: RecurrenceRule) -> Self {
        Self {
            frequency: rule.frequency,
            start_date: rule.start_date,
            ends_type: rule.ends_type(),
            end_date: rule.end_date(),
            occurrences: rule.occurrences(),
            day_of_week: rule.day_of_week,
        }
    }
}

fn storable_instant(value: DateTime<Utc>) -> Result<DateTime<Utc>, RecurrenceError> {
    if !(0..=9999).contains(&value.year()) {
        return Err(RecurrenceError::InstantOutOfRange(value));
    }
    Ok(value.trunc_subsecs(3))
}

fn serialize_instant<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Millis, true))
}

fn serialize_optional_instant<S>(
    value: &Option<DateTime<Utc>>,
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match value {
        Some(value) => serialize_instant(value, serializer),
        None => serializer.serialize_none(),
    }
}

fn deserialize_instant<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|value| value.with_timezone(&Utc))
        .map_err(serde::de::Error::custom)
}

fn deserialize_optional_instant<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    raw.map(|raw| {
        DateTime::parse_from_rfc3339(raw.trim())
            .map(|value| value.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    })
    .transpose()
}
