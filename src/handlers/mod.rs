//! Handler adapters
//!
//! Each handler reads its request slice from the session state, calls its
//! collaborator and writes its result slice back. Handlers never return
//! errors: collaborator failures become `Outcome::Failed` (or `Quote::error`).

pub mod goals;
pub mod knowledge;
pub mod market;
pub mod news;
pub mod portfolio;
pub mod tax;

/// `1234.5` → `"1,234.50"`
pub fn format_money(value: f64) -> String {
    if !value.is_finite() {
        return value.to_string();
    }

    let rounded = format!("{:.2}", value.abs());
    let (whole, cents) = rounded.split_once('.').unwrap_or((rounded.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if value < 0.0 && rounded != "0.00" { "-" } else { "" };
    format!("{}{}.{}", sign, grouped, cents)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_money() {
        assert_eq!(format_money(0.0), "0.00");
        assert_eq!(format_money(999.999), "1,000.00");
        assert_eq!(format_money(1800.0), "1,800.00");
        assert_eq!(format_money(60949.7214), "60,949.72");
        assert_eq!(format_money(-1234567.891), "-1,234,567.89");
    }
}
