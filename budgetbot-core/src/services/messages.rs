//! Reply texts

use rust_decimal::Decimal;

use crate::domain::{EntryKind, YearMonth};

use super::report::{CategoryTotal, LedgerStats, MonthlySummary, OwnerReport};

/// "500" for whole amounts, "99.90" otherwise
pub fn format_amount(amount: Decimal) -> String {
    let rounded = amount.round_dp(2);
    if rounded.fract().is_zero() {
        rounded.trunc().to_string()
    } else {
        format!("{:.2}", rounded)
    }
}

pub fn welcome(gated: bool) -> String {
    let mut text = String::from("Привет! Я твой бюджет-бот 💰\n\nКоманды:\n");
    if gated {
        text.push_str("/register – зарегистрироваться\n");
    }
    text.push_str(
        "/add 500 еда – добавить расход\n\
         /income 1000 зарплата – добавить доход\n\
         /stat – статистика за месяц\n\
         /report – мои траты по категориям\n\
         /family – траты семьи по категориям\n\
         /stats – общая статистика\n\
         /export – выгрузить в таблицу CSV\n\n\
         Можно и без команды: 500 еда",
    );
    text
}

pub fn registered(name: &str) -> String {
    format!("Готово, {}! Ты в семейном бюджете ✅", name)
}

pub fn already_registered() -> String {
    "Ты уже зарегистрирован 🙂".to_string()
}

pub fn please_register() -> String {
    "Сначала зарегистрируйся: /register".to_string()
}

pub fn entry_format(kind: EntryKind) -> String {
    match kind {
        EntryKind::Expense => "Формат: /add 500 еда".to_string(),
        EntryKind::Income => "Формат: /income 1000 зарплата".to_string(),
    }
}

pub fn unknown_category(category: &str, allowed: &[String]) -> String {
    format!(
        "Не знаю категорию «{}» 🤔\nДоступные категории: {}",
        category,
        allowed.join(", ")
    )
}

pub fn entry_added(kind: EntryKind, amount: Decimal, category: &str, currency: &str) -> String {
    let label = match kind {
        EntryKind::Expense => "расход",
        EntryKind::Income => "доход",
    };
    format!(
        "Добавлен {}: {} {} — {}",
        label,
        format_amount(amount),
        currency,
        category
    )
}

pub fn no_records() -> String {
    "У тебя пока нет записей".to_string()
}

pub fn no_family_records() -> String {
    "В бюджете пока нет записей".to_string()
}

pub fn no_export_data() -> String {
    "Нет данных для экспорта".to_string()
}

pub fn not_understood() -> String {
    "Я не понял 😕\nПопробуй формат: 500 еда".to_string()
}

pub fn export_caption(count: usize) -> String {
    format!("Выгрузка готова: {} записей", count)
}

pub fn monthly_summary(summary: &MonthlySummary, currency: &str) -> String {
    format!(
        "📊 Статистика за месяц ({}):\n\n\
         Доходы: {} {cur}\n\
         Расходы: {} {cur}\n\
         Баланс: {} {cur}",
        month_label(summary.month),
        format_amount(summary.income),
        format_amount(summary.expenses),
        format_amount(summary.balance()),
        cur = currency
    )
}

fn month_label(month: YearMonth) -> String {
    format!("{:02}.{}", month.month, month.year)
}

fn category_lines(text: &mut String, totals: &[CategoryTotal], currency: &str) {
    for total in totals {
        text.push_str(&format!(
            "• {}: {} {}\n",
            total.category,
            format_amount(total.total),
            currency
        ));
    }
}

pub fn owner_report(report: &OwnerReport, currency: &str) -> String {
    let mut text = String::from("🧾 Мой отчёт\n\n");

    if !report.expenses_by_category.is_empty() {
        text.push_str("Расходы:\n");
        category_lines(&mut text, &report.expenses_by_category, currency);
        text.push('\n');
    }
    if !report.income_by_category.is_empty() {
        text.push_str("Доходы:\n");
        category_lines(&mut text, &report.income_by_category, currency);
        text.push('\n');
    }

    text.push_str(&format!(
        "Всего доходов: {} {cur}\nВсего расходов: {} {cur}\nБаланс: {} {cur}",
        format_amount(report.income),
        format_amount(report.expenses),
        format_amount(report.balance()),
        cur = currency
    ));
    text
}

pub fn family_report(totals: &[CategoryTotal], currency: &str) -> String {
    let mut text = String::from("👨‍👩‍👧 Расходы семьи по категориям:\n\n");
    category_lines(&mut text, totals, currency);

    let sum: Decimal = totals.iter().map(|t| t.total).sum();
    text.push_str(&format!("\nИтого: {} {}", format_amount(sum), currency));
    text
}

pub fn ledger_stats(stats: &LedgerStats, currency: &str) -> String {
    let mut text = String::from("📈 Общая статистика\n\n");
    for member in &stats.members {
        text.push_str(&format!(
            "{}: доходы {} {cur}, расходы {} {cur}\n",
            member.display_name,
            format_amount(member.income),
            format_amount(member.expenses),
            cur = currency
        ));
    }
    text.push_str(&format!(
        "\nВсего доходов: {} {cur}\nВсего расходов: {} {cur}\nБаланс: {} {cur}\nЗаписей: {}",
        format_amount(stats.income),
        format_amount(stats.expenses),
        format_amount(stats.balance()),
        stats.record_count,
        cur = currency
    ));
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(Decimal::new(500, 0)), "500");
        assert_eq!(format_amount(Decimal::new(50000, 2)), "500");
        assert_eq!(format_amount(Decimal::new(9990, 2)), "99.90");
        assert_eq!(format_amount(Decimal::new(12346, 3)), "12.35");
        assert_eq!(format_amount(Decimal::new(-1500, 1)), "-150");
    }

    #[test]
    fn test_entry_added() {
        assert_eq!(
            entry_added(EntryKind::Expense, Decimal::new(500, 0), "еда", "₽"),
            "Добавлен расход: 500 ₽ — еда"
        );
        assert_eq!(
            entry_added(EntryKind::Income, Decimal::new(100050, 2), "зарплата", "€"),
            "Добавлен доход: 1000.50 € — зарплата"
        );
    }

    #[test]
    fn test_welcome_mentions_register_only_when_gated() {
        assert!(welcome(true).contains("/register"));
        assert!(!welcome(false).contains("/register"));
    }
}
