//! Measurement log: numeric findings recorded while reporting, grouped by name.

use crate::error::{RadtextError, Result};
use crate::models::format_number;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub id: String,
    pub name: String,
    pub value: f64,
    pub unit: String,
    /// Serialized as `YYYY-MM-DD`
    pub date: NaiveDate,
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} {} ({})",
            self.name,
            format_number(self.value),
            self.unit,
            self.date.format("%Y-%m-%d")
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeasurementLog {
    entries: Vec<Measurement>,
}

impl MeasurementLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: Vec<Measurement>) -> Self {
        Self { entries }
    }

    pub fn list(&self) -> &[Measurement] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn add(
        &mut self,
        name: impl Into<String>,
        value: f64,
        unit: impl Into<String>,
        date: NaiveDate,
    ) -> Result<Measurement> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(RadtextError::Other("Measurement name is required".to_string()));
        }
        if !value.is_finite() {
            return Err(RadtextError::Other(format!(
                "Measurement value for '{}' must be a number",
                name
            )));
        }

        let measurement = Measurement {
            id: Uuid::new_v4().to_string(),
            name,
            value,
            unit: unit.into(),
            date,
        };
        self.entries.push(measurement.clone());
        Ok(measurement)
    }

    pub fn delete(&mut self, id: &str) -> Result<Measurement> {
        let index = self
            .entries
            .iter()
            .position(|m| m.id == id)
            .ok_or_else(|| RadtextError::MeasurementNotFound(id.to_string()))?;
        Ok(self.entries.remove(index))
    }

    /// Entries grouped by name, names in first-seen order
    pub fn grouped(&self) -> Vec<(&str, Vec<&Measurement>)> {
        let mut groups: Vec<(&str, Vec<&Measurement>)> = Vec::new();
        for entry in &self.entries {
            match groups.iter_mut().find(|(name, _)| *name == entry.name) {
                Some((_, entries)) => entries.push(entry),
                None => groups.push((entry.name.as_str(), vec![entry])),
            }
        }
        groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
    }

    #[test]
    fn test_add_and_group() {
        let mut log = MeasurementLog::new();
        log.add("Nódulo LID", 8.0, "mm", date(1)).unwrap();
        log.add("Fígado", 15.5, "cm", date(2)).unwrap();
        log.add("Nódulo LID", 9.5, "mm", date(20)).unwrap();

        let groups = log.grouped();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, "Nódulo LID");
        let values: Vec<f64> = groups[0].1.iter().map(|m| m.value).collect();
        assert_eq!(values, vec![8.0, 9.5]);
        assert_eq!(groups[1].1[0].to_string(), "Fígado: 15.5 cm (2024-03-02)");
    }

    #[test]
    fn test_add_rejects_bad_input() {
        let mut log = MeasurementLog::new();
        assert!(log.add("  ", 1.0, "mm", date(1)).is_err());
        assert!(log.add("x", f64::NAN, "mm", date(1)).is_err());
        assert!(log.is_empty());
    }

    #[test]
    fn test_delete() {
        let mut log = MeasurementLog::new();
        let m = log.add("Baço", 11.0, "cm", date(5)).unwrap();
        assert!(matches!(
            log.delete("missing"),
            Err(RadtextError::MeasurementNotFound(_))
        ));
        assert_eq!(log.delete(&m.id).unwrap(), m);
        assert!(log.is_empty());
    }

    #[test]
    fn test_date_serializes_as_calendar_day() {
        let mut log = MeasurementLog::new();
        log.add("Rim", 10.0, "cm", date(9)).unwrap();
        let json = serde_json::to_value(log.list()).unwrap();
        assert_eq!(json[0]["date"], "2024-03-09");
    }
}
