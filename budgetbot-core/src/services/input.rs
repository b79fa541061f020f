//! Inbound text parsing and entry validation

use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use rust_decimal::Decimal;

/// A parsed chat message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `/name arg1 arg2 …`
    Named { name: String, args: Vec<String> },
    /// Anything that isn't a slash command
    Text(String),
}

impl Command {
    /// Parse raw message text.
    ///
    /// Command names are lowercased and lose any `@botname` suffix, so
    /// `/Add@budget_bot 500 еда` and `/add 500 еда` are the same command.
    pub fn parse(text: &str) -> Self {
        let trimmed = text.trim();
        let Some(rest) = trimmed.strip_prefix('/') else {
            return Command::Text(trimmed.to_string());
        };

        let mut parts = rest.split_whitespace();
        let head = parts.next().unwrap_or_default();
        let name = head.split('@').next().unwrap_or_default().to_lowercase();
        let args = parts.map(str::to_string).collect();

        Command::Named { name, args }
    }
}

/// Why an amount/category pair was rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryError {
    /// Missing or unparseable amount, or missing category
    Format,
    /// Category outside the configured set
    UnknownCategory { category: String },
}

/// A validated amount and category
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryInput {
    pub amount: Decimal,
    pub category: String,
}

impl EntryInput {
    /// Validate `<amount> <category words…>` arguments.
    ///
    /// With a fixed category set the category must match one of its entries
    /// (case-insensitive) and is stored in its canonical spelling. Free
    /// categories are lowercased so reports group them consistently.
    pub fn parse(args: &[String], categories: Option<&[String]>) -> Result<Self, EntryError> {
        let (amount, rest) = args.split_first().ok_or(EntryError::Format)?;
        let amount = parse_amount(amount).ok_or(EntryError::Format)?;

        let category = rest.join(" ").trim().to_string();
        if category.is_empty() {
            return Err(EntryError::Format);
        }

        let category = match categories {
            None => category.to_lowercase(),
            Some(allowed) => {
                let wanted = category.to_lowercase();
                allowed
                    .iter()
                    .find(|c| c.to_lowercase() == wanted)
                    .cloned()
                    .ok_or(EntryError::UnknownCategory { category })?
            }
        };

        Ok(Self { amount, category })
    }
}

/// Largest amount a single entry may carry
pub const MAX_AMOUNT: i64 = 1_000_000_000_000;

/// Parse a non-negative amount up to [`MAX_AMOUNT`]. Both `.` and `,` work
/// as decimal separator.
pub fn parse_amount(text: &str) -> Option<Decimal> {
    let normalized = text.trim().replace(',', ".");
    let amount = Decimal::from_str(&normalized).ok()?;
    if amount.is_sign_negative() && !amount.is_zero() {
        return None;
    }
    if amount > Decimal::from(MAX_AMOUNT) {
        return None;
    }
    Some(amount.abs())
}

fn quick_entry_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(\d+(?:[.,]\d+)?)\s+(\S.*)$").expect("quick entry pattern is valid")
    })
}

/// Recognize free text of the form `<amount> <category…>` (e.g. "500 еда").
///
/// The text is lowercased; the result is suitable as add-command arguments.
pub fn quick_entry_args(text: &str) -> Option<Vec<String>> {
    let lowered = text.trim().to_lowercase();
    let captures = quick_entry_pattern().captures(&lowered)?;
    let amount = captures.get(1)?.as_str().to_string();
    let category = captures.get(2)?.as_str().split_whitespace().collect::<Vec<_>>().join(" ");
    Some(vec![amount, category])
}
