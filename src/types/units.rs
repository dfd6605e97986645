//! Unit Conversion Utilities
//!
//! Helpers for lamport and token base-unit conversions and formatting.

/// Lamports per SOL
pub const LAMPORTS_PER_SOL: u64 = solana_sdk::native_token::LAMPORTS_PER_SOL;

/// Decimals of the native currency
pub const NATIVE_DECIMALS: u8 = 9;

/// Convert lamports to SOL (display only, lossy)
pub fn lamports_to_sol(lamports: u64) -> f64 {
    lamports as f64 / LAMPORTS_PER_SOL as f64
}

/// Convert a raw token amount to its UI value (display only, lossy)
pub fn raw_to_ui(amount: u64, decimals: u8) -> f64 {
    amount as f64 / 10f64.powi(decimals as i32)
}

/// Format a raw amount as an exact decimal string
///
/// e.g. `format_amount(1_500_000, 6)` -> `"1.5"`
pub fn format_amount(amount: u64, decimals: u8) -> String {
    if decimals == 0 {
        return amount.to_string();
    }

    let digits = format!("{:0>width$}", amount, width = decimals as usize + 1);
    let split = digits.len() - decimals as usize;
    let (whole, frac) = digits.split_at(split);
    let frac = frac.trim_end_matches('0');

    if frac.is_empty() {
        whole.to_string()
    } else {
        format!("{}.{}", whole, frac)
    }
}

/// Human-readable lamports, e.g. "10,000,000 lamports (0.01 SOL)"
pub fn lamports_to_display(lamports: u64) -> String {
    format!(
        "{} lamports ({} SOL)",
        format_with_commas(lamports),
        format_amount(lamports, NATIVE_DECIMALS)
    )
}

/// Parse a SOL amount from a decimal string without going through floats
pub fn parse_sol(s: &str) -> Option<u64> {
    parse_amount(s, NATIVE_DECIMALS)
}

/// Parse a decimal string into base units
fn parse_amount(s: &str, decimals: u8) -> Option<u64> {
    let s = s.trim().replace('_', "");
    let (whole, frac) = match s.split_once('.') {
        Some((w, f)) => (w, f),
        None => (s.as_str(), ""),
    };

    if frac.len() > decimals as usize || (whole.is_empty() && frac.is_empty()) {
        return None;
    }

    let whole: u64 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let frac_padded = format!("{:0<width$}", frac, width = decimals as usize);
    let frac: u64 = if frac_padded.is_empty() {
        0
    } else {
        frac_padded.parse().ok()?
    };

    whole
        .checked_mul(10u64.checked_pow(decimals as u32)?)?
        .checked_add(frac)
}

fn format_with_commas(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::new();
    let chars: Vec<char> = s.chars().collect();

    for (i, c) in chars.iter().enumerate() {
        if i > 0 && (chars.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(0, 9), "0");
        assert_eq!(format_amount(1, 9), "0.000000001");
        assert_eq!(format_amount(1_500_000, 6), "1.5");
        assert_eq!(format_amount(42, 0), "42");
        assert_eq!(format_amount(LAMPORTS_PER_SOL, 9), "1");
    }

    #[test]
    fn test_parse_sol() {
        assert_eq!(parse_sol("0.001"), Some(1_000_000));
        assert_eq!(parse_sol("1"), Some(LAMPORTS_PER_SOL));
        assert_eq!(parse_sol(".5"), Some(500_000_000));
        assert_eq!(parse_sol("0.0000000001"), None);
        assert_eq!(parse_sol("abc"), None);
        assert_eq!(parse_sol(""), None);
    }

    #[test]
    fn test_lamport_conversions() {
        assert_eq!(lamports_to_sol(500_000_000), 0.5);
        assert_eq!(raw_to_ui(2_500_000, 6), 2.5);
    }

    #[test]
    fn test_display_format() {
        let display = lamports_to_display(10_000_000);
        assert!(display.contains("10,000,000"));
        assert!(display.contains("0.01 SOL"));
    }
}
