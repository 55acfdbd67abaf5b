//! Typed records, validated where they enter the store.

use super::source::Collection;
use crate::error::{Result, StoreError};
use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An income or expense entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Movement {
    pub id: String,
    pub amount: f64,
    pub date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Movement {
    pub fn from_raw(collection: Collection, raw: &Value) -> Result<Self> {
        let name = collection.name();
        Ok(Self {
            id: id_field(name, raw)?,
            amount: number_field(name, raw, "amount")?,
            date: date_field(name, raw, "date")?,
            category: optional_string(raw, "category"),
            description: optional_string(raw, "description"),
        })
    }
}

/// A saved loan simulation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditSimulation {
    pub id: String,
    /// Principal.
    pub amount: f64,
    /// Nominal annual rate, in percent.
    pub annual_rate: f64,
    pub term_months: u32,
    pub date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl CreditSimulation {
    pub fn from_raw(raw: &Value) -> Result<Self> {
        let name = Collection::CreditSimulations.name();

        let annual_rate = number_field(name, raw, "annualRate")?;
        if annual_rate < 0.0 {
            return Err(StoreError::invalid_record(name, "annualRate must not be negative"));
        }

        let term = number_field(name, raw, "termMonths")?;
        if term < 1.0 || term.fract() != 0.0 || term > u32::MAX as f64 {
            return Err(StoreError::invalid_record(
                name,
                format!("termMonths must be a positive whole number, got {}", term),
            ));
        }

        Ok(Self {
            id: id_field(name, raw)?,
            amount: number_field(name, raw, "amount")?,
            annual_rate,
            term_months: term as u32,
            date: date_field(name, raw, "date")?,
            name: optional_string(raw, "name"),
        })
    }

    /// Fixed monthly installment under French amortization.
    pub fn monthly_payment(&self) -> f64 {
        let n = self.term_months as f64;
        let r = self.annual_rate / 100.0 / 12.0;
        if r == 0.0 {
            return self.amount / n;
        }
        self.amount * r / (1.0 - (1.0 + r).powf(-n))
    }

    pub fn total_cost(&self) -> f64 {
        self.monthly_payment() * self.term_months as f64
    }
}

/// Validated contents of one collection.
#[derive(Clone, Debug, PartialEq)]
pub enum CollectionData {
    Movements(Vec<Movement>),
    Simulations(Vec<CreditSimulation>),
}

impl CollectionData {
    /// Validate every raw record; the first bad one fails the whole batch.
    pub fn from_raw(collection: Collection, raw: &[Value]) -> Result<Self> {
        match collection {
            Collection::Incomes | Collection::Expenses => raw
                .iter()
                .map(|r| Movement::from_raw(collection, r))
                .collect::<Result<Vec<_>>>()
                .map(CollectionData::Movements),
            Collection::CreditSimulations => raw
                .iter()
                .map(CreditSimulation::from_raw)
                .collect::<Result<Vec<_>>>()
                .map(CollectionData::Simulations),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            CollectionData::Movements(items) => items.len(),
            CollectionData::Simulations(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn movements(&self) -> Option<&[Movement]> {
        match self {
            CollectionData::Movements(items) => Some(items),
            CollectionData::Simulations(_) => None,
        }
    }

    pub fn to_value(&self) -> Result<Value> {
        let value = match self {
            CollectionData::Movements(items) => serde_json::to_value(items)?,
            CollectionData::Simulations(items) => serde_json::to_value(items)?,
        };
        Ok(value)
    }
}

fn id_field(collection: &str, raw: &Value) -> Result<String> {
    match raw.get("id") {
        Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => Err(StoreError::invalid_record(collection, "missing or empty id")),
    }
}

fn number_field(collection: &str, raw: &Value, field: &str) -> Result<f64> {
    let parsed = match raw.get(field) {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match parsed {
        Some(v) if v.is_finite() => Ok(v),
        _ => Err(StoreError::invalid_record(
            collection,
            format!("{} is not a finite number: {}", field, display_field(raw, field)),
        )),
    }
}

fn date_field(collection: &str, raw: &Value, field: &str) -> Result<NaiveDate> {
    let parsed = raw.get(field).and_then(Value::as_str).and_then(|s| {
        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .ok()
            .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.date_naive()))
    });
    parsed.ok_or_else(|| {
        StoreError::invalid_record(
            collection,
            format!("{} is not a date: {}", field, display_field(raw, field)),
        )
    })
}

fn optional_string(raw: &Value, field: &str) -> Option<String> {
    raw.get(field).and_then(Value::as_str).map(str::to_string)
}

fn display_field(raw: &Value, field: &str) -> String {
    raw.get(field)
        .map(Value::to_string)
        .unwrap_or_else(|| "missing".to_string())
}
