use regex::Regex;

lazy_static::lazy_static! {
    /// Display names: letters (Spanish accents included), digits, dashes and spaces.
    pub static ref NAME: Regex = Regex::new(r"^[A-Za-z0-9ÁÉÍÓÚáéíóúÑñ\-\s]{1,100}$").unwrap();
    pub static ref HEX_COLOR: Regex = Regex::new(r"^#[0-9A-Fa-f]{6}$").unwrap();
    pub static ref SKU: Regex = Regex::new(r"^[A-Za-z0-9\-]{1,50}$").unwrap();
    /// Non-negative decimal with at most two decimals.
    pub static ref DECIMAL_2: Regex = Regex::new(r"^[0-9]+(\.[0-9]{1,2})?$").unwrap();
}

pub fn is_valid_name(name: &str) -> bool {
    NAME.is_match(name)
}

pub fn is_hex_color(hex: &str) -> bool {
    HEX_COLOR.is_match(hex)
}

pub fn is_valid_sku(sku: &str) -> bool {
    SKU.is_match(sku)
}

/// Non-negative amount with at most two decimals.
pub fn is_amount(text: &str) -> bool {
    DECIMAL_2.is_match(text)
}

/// Amount strictly greater than zero.
pub fn is_positive_amount(text: &str) -> bool {
    is_amount(text) && text.chars().any(|c| c.is_ascii_digit() && c != '0')
}

/// Cleans user-typed money text: keeps digits and separators, turns a
/// decimal comma into a dot and truncates to two decimals.
pub fn normalize_price(raw: &str) -> String {
    let kept: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .collect();
    let kept = kept.replacen(',', ".", 1);

    let mut parts = kept.split('.');
    let whole = parts.next().unwrap_or_default().to_string();
    let rest: Vec<&str> = parts.collect();
    match rest.len() {
        0 => whole,
        1 => format!("{}.{}", whole, rest[0].chars().take(2).collect::<String>()),
        _ => format!("{}.{}", whole, rest.concat()),
    }
}
