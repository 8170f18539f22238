use chrono::NaiveDate;

/// Formats an amount as Brazilian currency: `R$ 1.234,56`.
pub fn format_currency_brl(amount: f64) -> String {
    let negative = amount < 0.0;
    let cents = (amount.abs() * 100.0).round() as u64;
    let whole = cents / 100;
    let frac = cents % 100;

    let digits = whole.to_string();
    let mut grouped = String::new();
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }

    let sign = if negative { "-" } else { "" };
    format!("R$ {}{},{:02}", sign, grouped, frac)
}

/// Reformats an ISO date (`2025-08-30`) to the Brazilian convention
/// (`30/08/2025`). Unparseable input comes back unchanged.
pub fn format_date_br(iso_date: &str) -> String {
    match NaiveDate::parse_from_str(iso_date, "%Y-%m-%d") {
        Ok(date) => date.format("%d/%m/%Y").to_string(),
        Err(_) => iso_date.to_string(),
    }
}
