//! Ledger document - the full persisted collection of users and records
//!
//! Current layout:
//! ```json
//! {
//!   "users": { "<id>": { "id": "<id>", "display_name": "..." } },
//!   "records": [ { "owner_id": "<id>", "type": "expense", "amount": "500", "category": "еда", "date": "2024-03-09" } ]
//! }
//! ```
//!
//! Older documents are a flat `owner_id -> [record]` mapping without owner ids
//! on the records; [`Ledger::from_json`] reads both.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::record::{EntryKind, Record, YearMonth};
use super::result::Result;
use super::user::User;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Ledger {
    #[serde(default)]
    pub users: BTreeMap<String, User>,
    #[serde(default)]
    pub records: Vec<Record>,
}

/// Record as stored in the flat per-owner layout
#[derive(Debug, Deserialize)]
struct LegacyRecord {
    #[serde(rename = "type")]
    kind: EntryKind,
    amount: Decimal,
    #[serde(default)]
    category: String,
    date: NaiveDate,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StoredDocument {
    Current(Ledger),
    Legacy(BTreeMap<String, Vec<LegacyRecord>>),
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a stored document in either layout
    pub fn from_json(content: &str) -> Result<Self> {
        let document: StoredDocument = serde_json::from_str(content)?;
        Ok(match document {
            StoredDocument::Current(ledger) => ledger,
            StoredDocument::Legacy(owners) => Self::from_legacy(owners),
        })
    }

    fn from_legacy(owners: BTreeMap<String, Vec<LegacyRecord>>) -> Self {
        let mut ledger = Self::new();
        for (owner_id, records) in owners {
            ledger
                .users
                .insert(owner_id.clone(), User::new(owner_id.clone(), owner_id.clone()));
            ledger.records.extend(records.into_iter().map(|r| Record {
                owner_id: owner_id.clone(),
                kind: r.kind,
                amount: r.amount,
                category: r.category,
                date: r.date,
            }));
        }
        ledger
    }

    /// Serialize in the current layout (two-space indentation, UTF-8 unescaped)
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn is_registered(&self, user_id: &str) -> bool {
        self.users.contains_key(user_id)
    }

    pub fn user(&self, user_id: &str) -> Option<&User> {
        self.users.get(user_id)
    }

    /// Register a user. Returns false (and changes nothing) if the id is taken.
    pub fn register(&mut self, user: User) -> bool {
        if self.users.contains_key(&user.id) {
            return false;
        }
        self.users.insert(user.id.clone(), user);
        true
    }

    /// Append a record, admitting its owner if not yet known
    pub fn append(&mut self, owner: &User, record: Record) {
        self.users
            .entry(owner.id.clone())
            .or_insert_with(|| owner.clone());
        self.records.push(record);
    }

    /// Records matching the filter, in insertion order
    pub fn query<'a>(&'a self, filter: &'a RecordFilter) -> impl Iterator<Item = &'a Record> + 'a {
        self.records.iter().filter(move |r| filter.matches(r))
    }

    /// Earliest and latest record dates
    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        let earliest = self.records.iter().map(|r| r.date).min()?;
        let latest = self.records.iter().map(|r| r.date).max()?;
        Some((earliest, latest))
    }
}

/// Selection criteria for record queries. Empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilter {
    pub owner_id: Option<String>,
    pub kind: Option<EntryKind>,
    pub month: Option<YearMonth>,
    pub category: Option<String>,
}

impl RecordFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn owner(mut self, owner_id: impl Into<String>) -> Self {
        self.owner_id = Some(owner_id.into());
        self
    }

    pub fn kind(mut self, kind: EntryKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn month(mut self, month: YearMonth) -> Self {
        self.month = Some(month);
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn matches(&self, record: &Record) -> bool {
        self.owner_id.as_deref().map_or(true, |o| record.owner_id == o)
            && self.kind.map_or(true, |k| record.kind == k)
            && self.month.map_or(true, |m| m.contains(record.date))
            && self
                .category
                .as_deref()
                .map_or(true, |c| record.category == c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sample() -> Ledger {
        let ann = User::new("1", "Аня");
        let bob = User::new("2", "Боря");
        let mut ledger = Ledger::new();
        ledger.append(&ann, Record::new("1", EntryKind::Expense, Decimal::new(500, 0), "еда", date(2024, 3, 1)));
        ledger.append(&ann, Record::new("1", EntryKind::Income, Decimal::new(1000, 0), "зарплата", date(2024, 3, 2)));
        ledger.append(&bob, Record::new("2", EntryKind::Expense, Decimal::new(120, 0), "еда", date(2024, 2, 28)));
        ledger
    }

    #[test]
    fn test_append_admits_owner_once() {
        let ledger = sample();
        assert_eq!(ledger.users.len(), 2);
        assert_eq!(ledger.records.len(), 3);
        assert_eq!(ledger.user("1").unwrap().display_name, "Аня");
    }

    #[test]
    fn test_register_is_idempotent() {
        let mut ledger = Ledger::new();
        assert!(ledger.register(User::new("7", "Вера")));
        assert!(!ledger.register(User::new("7", "Другое имя")));
        assert_eq!(ledger.users.len(), 1);
        assert_eq!(ledger.user("7").unwrap().display_name, "Вера");
    }

    #[test]
    fn test_filter_combinations() {
        let ledger = sample();
        let march = YearMonth { year: 2024, month: 3 };

        let owner = RecordFilter::all().owner("1");
        assert_eq!(ledger.query(&owner).count(), 2);

        let march_expenses = RecordFilter::all().kind(EntryKind::Expense).month(march);
        assert_eq!(ledger.query(&march_expenses).count(), 1);

        let food = RecordFilter::all().category("еда");
        assert_eq!(ledger.query(&food).count(), 2);

        assert_eq!(ledger.query(&RecordFilter::all()).count(), 3);
    }

    #[test]
    fn test_empty_document_is_current_layout() {
        let ledger = Ledger::from_json("{}").unwrap();
        assert_eq!(ledger, Ledger::new());
    }

    #[test]
    fn test_legacy_layout_is_converted() {
        let json = r#"{
          "1001": [
            {"type": "expense", "amount": 500.0, "category": "еда", "date": "2024-03-01"},
            {"type": "income", "amount": 1000.5, "category": "зарплата", "date": "2024-03-05"}
          ]
        }"#;

        let ledger = Ledger::from_json(json).unwrap();
        assert!(ledger.is_registered("1001"));
        assert_eq!(ledger.records.len(), 2);
        assert_eq!(ledger.records[0].owner_id, "1001");
        assert_eq!(ledger.records[1].amount, Decimal::new(10005, 1));

        let resaved = ledger.to_json().unwrap();
        assert!(resaved.contains("\"records\""));
        assert_eq!(Ledger::from_json(&resaved).unwrap(), ledger);
    }

    #[test]
    fn test_json_is_fixed_point() {
        let first = sample().to_json().unwrap();
        let second = Ledger::from_json(&first).unwrap().to_json().unwrap();
        assert_eq!(first, second);
        assert!(first.contains("Аня"), "non-ASCII text must not be escaped");
    }

    #[test]
    fn test_date_range() {
        assert_eq!(Ledger::new().date_range(), None);
        assert_eq!(sample().date_range(), Some((date(2024, 2, 28), date(2024, 3, 2))));
    }
}
