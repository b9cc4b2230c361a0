//! Input masks and display formatting for Brazilian documents, phones,
//! dates and money.

use chrono::NaiveDate;
use regex::Regex;
use std::sync::OnceLock;

fn regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("static pattern is valid"))
}

fn only_digits(value: &str) -> String {
    value.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Applies the first match of each `(pattern, replacement)` step in order.
fn apply_steps(mut value: String, steps: &[(&'static Regex, &str)]) -> String {
    for (re, replacement) in steps {
        value = re.replace(&value, *replacement).into_owned();
    }
    value
}

/// `12345678901` -> `123.456.789-01`; extra digits are dropped.
pub fn mask_cpf(value: &str) -> String {
    static THREE: OnceLock<Regex> = OnceLock::new();
    static TAIL: OnceLock<Regex> = OnceLock::new();
    let three = regex(&THREE, r"(\d{3})(\d)");
    let tail = regex(&TAIL, r"(-\d{2})\d+?$");

    apply_steps(
        only_digits(value),
        &[
            (three, "${1}.${2}"),
            (three, "${1}.${2}"),
            (three, "${1}-${2}"),
            (tail, "${1}"),
        ],
    )
}

/// `12345678000199` -> `12.345.678/0001-99`.
pub fn mask_cnpj(value: &str) -> String {
    static TWO: OnceLock<Regex> = OnceLock::new();
    static THREE: OnceLock<Regex> = OnceLock::new();
    static FOUR: OnceLock<Regex> = OnceLock::new();
    static TAIL: OnceLock<Regex> = OnceLock::new();
    let two = regex(&TWO, r"(\d{2})(\d)");
    let three = regex(&THREE, r"(\d{3})(\d)");
    let four = regex(&FOUR, r"(\d{4})(\d)");
    let tail = regex(&TAIL, r"(-\d{2})\d+?$");

    apply_steps(
        only_digits(value),
        &[
            (two, "${1}.${2}"),
            (three, "${1}.${2}"),
            (three, "${1}/${2}"),
            (four, "${1}-${2}"),
            (tail, "${1}"),
        ],
    )
}

/// `85999998888` -> `(85) 99999-8888`.
pub fn mask_phone(value: &str) -> String {
    static AREA: OnceLock<Regex> = OnceLock::new();
    static FIVE: OnceLock<Regex> = OnceLock::new();
    static TAIL: OnceLock<Regex> = OnceLock::new();
    let area = regex(&AREA, r"(\d{2})(\d)");
    let five = regex(&FIVE, r"(\d{5})(\d)");
    let tail = regex(&TAIL, r"(-\d{4})\d+?$");

    apply_steps(
        only_digits(value),
        &[(area, "(${1}) ${2}"), (five, "${1}-${2}"), (tail, "${1}")],
    )
}

/// `YYYY-MM-DD` -> `DD-MM-YYYY`. Values already in display form, blanks and
/// unparseable input pass through unchanged.
pub fn format_date_dmy(value: &str) -> String {
    let trimmed = value.trim();
    match NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        Ok(date) => date.format("%d-%m-%Y").to_string(),
        Err(_) => trimmed.to_string(),
    }
}

/// `DD-MM-YYYY` -> `YYYY-MM-DD`; ISO input passes through.
pub fn to_iso_date(value: &str) -> String {
    static ISO: OnceLock<Regex> = OnceLock::new();
    static DMY: OnceLock<Regex> = OnceLock::new();
    let iso = regex(&ISO, r"^\d{4}-\d{2}-\d{2}$");
    let dmy = regex(&DMY, r"^(\d{2})-(\d{2})-(\d{4})$");

    let trimmed = value.trim();
    if iso.is_match(trimmed) {
        return trimmed.to_string();
    }
    match dmy.captures(trimmed) {
        Some(caps) => format!("{}-{}-{}", &caps[3], &caps[2], &caps[1]),
        None => trimmed.to_string(),
    }
}

pub fn format_currency(amount: f64) -> String {
    format!("R$ {:.2}", amount)
}

/// Two-decimal rendering used inside PDF fields.
pub fn format_amount(amount: f64) -> String {
    format!("{:.2}", amount)
}

/// Replaces everything except ASCII letters and digits with `_`.
pub fn safe_file_component(value: &str) -> String {
    value
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}
