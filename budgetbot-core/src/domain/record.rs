//! Record domain model

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::result::Error;

/// Whether a record takes money out or brings it in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Expense,
    Income,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Expense => "expense",
            EntryKind::Income => "income",
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "expense" => Ok(EntryKind::Expense),
            "income" => Ok(EntryKind::Income),
            other => Err(Error::validation(format!("Unknown entry kind: {}", other))),
        }
    }
}

/// Calendar month, used to scope monthly statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// A single income or expense entry. Records are append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub owner_id: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub amount: Decimal,
    pub category: String,
    pub date: NaiveDate,
}

impl Record {
    pub fn new(
        owner_id: impl Into<String>,
        kind: EntryKind,
        amount: Decimal,
        category: impl Into<String>,
        date: NaiveDate,
    ) -> Self {
        Self {
            owner_id: owner_id.into(),
            kind,
            amount,
            category: category.into(),
            date,
        }
    }

    pub fn is_expense(&self) -> bool {
        self.kind == EntryKind::Expense
    }

    pub fn is_income(&self) -> bool {
        self.kind == EntryKind::Income
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_json_shape() {
        let record = Record::new(
            "42",
            EntryKind::Expense,
            Decimal::new(50050, 2),
            "еда",
            NaiveDate::from_ymd_opt(2024, 3, 9).unwrap(),
        );

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["owner_id"], "42");
        assert_eq!(value["type"], "expense");
        assert_eq!(value["amount"], "500.50");
        assert_eq!(value["category"], "еда");
        assert_eq!(value["date"], "2024-03-09");
    }

    #[test]
    fn test_amount_accepts_json_numbers() {
        let json = r#"{"owner_id":"1","type":"income","amount":1000.0,"category":"зарплата","date":"2024-01-31"}"#;
        let record: Record = serde_json::from_str(json).unwrap();
        assert_eq!(record.amount, Decimal::new(1000, 0));
        assert!(record.is_income());
    }

    #[test]
    fn test_year_month() {
        let march = YearMonth::of(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert!(march.contains(NaiveDate::from_ymd_opt(2024, 3, 31).unwrap()));
        assert!(!march.contains(NaiveDate::from_ymd_opt(2023, 3, 15).unwrap()));
        assert_eq!(march.to_string(), "2024-03");
    }

    #[test]
    fn test_entry_kind_from_str() {
        assert_eq!("income".parse::<EntryKind>().unwrap(), EntryKind::Income);
        assert!("refund".parse::<EntryKind>().is_err());
    }
}
