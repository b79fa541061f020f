//! Report service - read-only aggregation over the ledger

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::domain::{EntryKind, Record, RecordFilter, YearMonth};
use crate::ports::LedgerStore;

/// Income and expenses of one owner in one month
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthlySummary {
    #[serde(serialize_with = "serialize_month")]
    pub month: YearMonth,
    pub income: Decimal,
    pub expenses: Decimal,
}

impl MonthlySummary {
    pub fn balance(&self) -> Decimal {
        self.income - self.expenses
    }
}

fn serialize_month<S>(month: &YearMonth, s: S) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    s.collect_str(month)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryTotal {
    pub category: String,
    pub total: Decimal,
}

/// All-time totals of one owner, split by category
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OwnerReport {
    pub owner_id: String,
    pub income: Decimal,
    pub expenses: Decimal,
    pub expenses_by_category: Vec<CategoryTotal>,
    pub income_by_category: Vec<CategoryTotal>,
}

impl OwnerReport {
    pub fn balance(&self) -> Decimal {
        self.income - self.expenses
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberTotals {
    pub owner_id: String,
    pub display_name: String,
    pub income: Decimal,
    pub expenses: Decimal,
}

/// Totals across every owner in the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerStats {
    pub members: Vec<MemberTotals>,
    pub income: Decimal,
    pub expenses: Decimal,
    pub record_count: usize,
}

impl LedgerStats {
    pub fn balance(&self) -> Decimal {
        self.income - self.expenses
    }
}

#[derive(Debug, Serialize)]
pub struct LedgerStatus {
    pub backend: String,
    pub total_users: usize,
    pub total_records: usize,
    pub income: Decimal,
    pub expenses: Decimal,
    pub date_range: DateRange,
}

#[derive(Debug, Serialize)]
pub struct DateRange {
    pub earliest: Option<String>,
    pub latest: Option<String>,
}

fn add_amount(total: Decimal, amount: Decimal) -> Result<Decimal> {
    total
        .checked_add(amount)
        .ok_or_else(|| anyhow!("Total overflowed the decimal range"))
}

/// Sum of amounts of the given kind
pub fn sum_kind<'a>(
    records: impl IntoIterator<Item = &'a Record>,
    kind: EntryKind,
) -> Result<Decimal> {
    records
        .into_iter()
        .filter(|r| r.kind == kind)
        .try_fold(Decimal::ZERO, |total, r| add_amount(total, r.amount))
}

/// Per-category totals, largest first (ties by name)
pub fn totals_by_category<'a>(
    records: impl IntoIterator<Item = &'a Record>,
) -> Result<Vec<CategoryTotal>> {
    let mut totals: BTreeMap<&str, Decimal> = BTreeMap::new();
    for record in records {
        let total = totals.entry(record.category.as_str()).or_default();
        *total = add_amount(*total, record.amount)?;
    }

    let mut totals: Vec<CategoryTotal> = totals
        .into_iter()
        .map(|(category, total)| CategoryTotal {
            category: category.to_string(),
            total,
        })
        .collect();
    totals.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.category.cmp(&b.category)));
    Ok(totals)
}

/// Report service for ledger statistics
pub struct ReportService {
    store: Arc<dyn LedgerStore>,
}

impl ReportService {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Owner's income and expenses in `month`.
    ///
    /// None if the owner has no records at all; a month without entries
    /// yields zero totals.
    pub fn monthly_summary(
        &self,
        owner_id: &str,
        month: YearMonth,
    ) -> Result<Option<MonthlySummary>> {
        let in_month = self
            .store
            .query(&RecordFilter::all().owner(owner_id).month(month))?;
        if in_month.is_empty() && !self.has_records(owner_id)? {
            return Ok(None);
        }

        Ok(Some(MonthlySummary {
            month,
            income: sum_kind(&in_month, EntryKind::Income)?,
            expenses: sum_kind(&in_month, EntryKind::Expense)?,
        }))
    }

    fn has_records(&self, owner_id: &str) -> Result<bool> {
        Ok(!self.store.query(&RecordFilter::all().owner(owner_id))?.is_empty())
    }

    /// Owner's all-time totals per category
    pub fn owner_report(&self, owner_id: &str) -> Result<Option<OwnerReport>> {
        let records = self.store.query(&RecordFilter::all().owner(owner_id))?;
        if records.is_empty() {
            return Ok(None);
        }

        Ok(Some(OwnerReport {
            owner_id: owner_id.to_string(),
            income: sum_kind(&records, EntryKind::Income)?,
            expenses: sum_kind(&records, EntryKind::Expense)?,
            expenses_by_category: totals_by_category(records.iter().filter(|r| r.is_expense()))?,
            income_by_category: totals_by_category(records.iter().filter(|r| r.is_income()))?,
        }))
    }

    /// Expense totals per category across all owners
    pub fn family_report(&self) -> Result<Vec<CategoryTotal>> {
        let records = self.store.query(&RecordFilter::all().kind(EntryKind::Expense))?;
        totals_by_category(&records)
    }

    /// Per-member and overall totals. None if the ledger has no records.
    pub fn ledger_stats(&self) -> Result<Option<LedgerStats>> {
        let ledger = self.store.load()?;
        if ledger.records.is_empty() {
            return Ok(None);
        }

        let mut by_owner: BTreeMap<&str, Vec<&Record>> = BTreeMap::new();
        for record in &ledger.records {
            by_owner.entry(record.owner_id.as_str()).or_default().push(record);
        }

        let members = by_owner
            .into_iter()
            .map(|(owner_id, records)| {
                Ok(MemberTotals {
                    owner_id: owner_id.to_string(),
                    display_name: ledger
                        .user(owner_id)
                        .map(|u| u.display_name.clone())
                        .unwrap_or_else(|| owner_id.to_string()),
                    income: sum_kind(records.iter().copied(), EntryKind::Income)?,
                    expenses: sum_kind(records.iter().copied(), EntryKind::Expense)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Some(LedgerStats {
            members,
            income: sum_kind(&ledger.records, EntryKind::Income)?,
            expenses: sum_kind(&ledger.records, EntryKind::Expense)?,
            record_count: ledger.records.len(),
        }))
    }

    /// Overall status summary
    pub fn status(&self) -> Result<LedgerStatus> {
        let ledger = self.store.load()?;
        let (earliest, latest) = match ledger.date_range() {
            Some((earliest, latest)) => (Some(earliest.to_string()), Some(latest.to_string())),
            None => (None, None),
        };

        Ok(LedgerStatus {
            backend: self.store.name().to_string(),
            total_users: ledger.users.len(),
            total_records: ledger.records.len(),
            income: sum_kind(&ledger.records, EntryKind::Income)?,
            expenses: sum_kind(&ledger.records, EntryKind::Expense)?,
            date_range: DateRange { earliest, latest },
        })
    }
}
