//! Aggregates derived from loaded collections.

use super::records::Movement;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Income and expense totals for one calendar month.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MonthTotals {
    pub income: f64,
    pub expenses: f64,
}

impl MonthTotals {
    pub fn balance(&self) -> f64 {
        self.income - self.expenses
    }
}

/// Totals written to `data.resumen` after a load.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total_income: f64,
    pub total_expenses: f64,
    pub balance: f64,
    /// Keyed by `YYYY-MM`.
    pub by_month: BTreeMap<String, MonthTotals>,
}

impl Summary {
    pub fn compute(incomes: &[Movement], expenses: &[Movement]) -> Self {
        let mut by_month: BTreeMap<String, MonthTotals> = BTreeMap::new();

        for m in incomes {
            by_month.entry(month_key(m)).or_default().income += m.amount;
        }
        for m in expenses {
            by_month.entry(month_key(m)).or_default().expenses += m.amount;
        }

        let total_income = incomes.iter().fold(0.0, |acc, m| acc + m.amount);
        let total_expenses = expenses.iter().fold(0.0, |acc, m| acc + m.amount);

        Self {
            total_income,
            total_expenses,
            balance: total_income - total_expenses,
            by_month,
        }
    }
}

fn month_key(m: &Movement) -> String {
    m.date.format("%Y-%m").to_string()
}
