//! Field validators shared by every stage of the migration.
//!
//! Each validator takes the raw legacy text and either returns the canonical
//! value stored in the target schema or a typed error explaining the
//! rejection. Errors never abort a run; the normalizer turns them into
//! diagnostic issues.

use chrono::{Datelike, Duration, Local, NaiveDate};
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;
use thiserror::Error;

use super::text::{digits_only, normalize_text};

static EXCEL_INTEGER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\.0+$").expect("valid regex"));
static SCIENTIFIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d(?:[.,]\d+)?[eE]\+?\d{1,2}$").expect("valid regex"));
static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9._%+\-]+@[a-z0-9\-]+(?:\.[a-z0-9\-]+)*\.[a-z]{2,}$").expect("valid regex")
});
static DAY_FIRST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{1,2})[/\-.](\d{1,2})[/\-.](\d{4}|\d{2})$").expect("valid regex")
});
static YEAR_FIRST: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})[/\-](\d{1,2})[/\-](\d{1,2})$").expect("valid regex"));
static COMPACT_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})(\d{2})(\d{2})$").expect("valid regex"));
static THOUSANDS_DOT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{1,3}(?:\.\d{3})+$").expect("valid regex"));

/// Brazilian area codes in use.
const VALID_DDDS: &[u8] = &[
    11, 12, 13, 14, 15, 16, 17, 18, 19, 21, 22, 24, 27, 28, 31, 32, 33, 34, 35, 37, 38, 41, 42,
    43, 44, 45, 46, 47, 48, 49, 51, 53, 54, 55, 61, 62, 63, 64, 65, 66, 67, 68, 69, 71, 73, 74,
    75, 77, 79, 81, 82, 83, 84, 85, 86, 87, 88, 89, 91, 92, 93, 94, 95, 96, 97, 98, 99,
];

const NAME_PARTICLES: &[&str] = &["da", "de", "do", "das", "dos", "e", "di", "du", "del"];

const EMAIL_PLACEHOLDERS: &[&str] = &[
    "naotem", "naopossui", "nao", "sem", "sememail", "nt", "na", "x", "xx", "xxx", "teste",
    "test", "email", "nenhum", "naoinformado",
];

const EMAIL_DOMAIN_FIXES: &[(&str, &str)] = &[
    ("gmail.con", "gmail.com"),
    ("gmail.co", "gmail.com"),
    ("gmail.cm", "gmail.com"),
    ("gmail.com.br", "gmail.com"),
    ("gmial.com", "gmail.com"),
    ("gmal.com", "gmail.com"),
    ("gmai.com", "gmail.com"),
    ("gnail.com", "gmail.com"),
    ("hotmail.con", "hotmail.com"),
    ("hotmail.co", "hotmail.com"),
    ("hotmal.com", "hotmail.com"),
    ("hotmial.com", "hotmail.com"),
    ("hotmai.com", "hotmail.com"),
    ("homail.com", "hotmail.com"),
    ("yahoo.com.b", "yahoo.com.br"),
    ("yahoo.con.br", "yahoo.com.br"),
    ("yaho.com.br", "yahoo.com.br"),
    ("outlook.con", "outlook.com"),
    ("outlok.com", "outlook.com"),
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DocumentError {
    #[error("empty document")]
    Empty,
    #[error("expected 11 digits, found {0}")]
    Length(usize),
    #[error("all digits are equal")]
    RepeatedDigits,
    #[error("check digits do not match")]
    Checksum,
    #[error("value is a valid CNPJ, not a CPF")]
    IsCnpj,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PhoneError {
    #[error("empty phone")]
    Empty,
    #[error("unexpected length of {0} digits")]
    Length(usize),
    #[error("local number without area code")]
    MissingAreaCode,
    #[error("unknown area code {0}")]
    AreaCode(String),
    #[error("placeholder number")]
    Placeholder,
    #[error("number does not match a mobile or landline pattern")]
    InvalidNumber,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EmailError {
    #[error("empty e-mail")]
    Empty,
    #[error("placeholder e-mail")]
    Placeholder,
    #[error("malformed e-mail")]
    Malformed,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DateError {
    #[error("empty date")]
    Empty,
    #[error("unrecognized date format")]
    Unrecognized,
    #[error("date is in the future")]
    Future,
    #[error("date is more than 120 years ago")]
    TooOld,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountError {
    #[error("empty amount")]
    Empty,
    #[error("unrecognized amount")]
    Unrecognized,
}

/// Eleven-digit CPF with valid check digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Cpf(String);

impl Cpf {
    /// `pad_zeros` restores leading zeros that spreadsheets drop when a CPF is
    /// stored as a number (9 or 10 remaining digits).
    pub fn parse(raw: &str, pad_zeros: bool) -> Result<Self, DocumentError> {
        let mut digits = document_digits(raw);
        if digits.is_empty() {
            return Err(DocumentError::Empty);
        }

        if pad_zeros && (9..=10).contains(&digits.len()) {
            digits = format!("{:0>11}", digits);
        }

        if digits.len() == 14 && is_valid_cnpj(&digits) {
            return Err(DocumentError::IsCnpj);
        }

        if digits.len() != 11 {
            return Err(DocumentError::Length(digits.len()));
        }

        if all_same(&digits) {
            return Err(DocumentError::RepeatedDigits);
        }

        let values: Vec<u32> = digits.chars().filter_map(|c| c.to_digit(10)).collect();
        let first = cpf_check_digit(&values[..9]);
        let second = cpf_check_digit(&values[..10]);
        if values[9] != first || values[10] != second {
            return Err(DocumentError::Checksum);
        }

        Ok(Cpf(digits))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `000.000.000-00`
    pub fn formatted(&self) -> String {
        format!(
            "{}.{}.{}-{}",
            &self.0[0..3],
            &self.0[3..6],
            &self.0[6..9],
            &self.0[9..11]
        )
    }
}

impl fmt::Display for Cpf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn cpf_check_digit(digits: &[u32]) -> u32 {
    let weight_start = digits.len() as u32 + 1;
    let sum: u32 = digits
        .iter()
        .enumerate()
        .map(|(i, d)| d * (weight_start - i as u32))
        .sum();
    let rest = (sum * 10) % 11;
    if rest == 10 { 0 } else { rest }
}

pub fn is_valid_cnpj(raw: &str) -> bool {
    let digits = document_digits(raw);
    if digits.len() != 14 || all_same(&digits) {
        return false;
    }

    let values: Vec<u32> = digits.chars().filter_map(|c| c.to_digit(10)).collect();
    let weights = [6, 5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2];
    let check = |len: usize| -> u32 {
        let sum: u32 = values[..len]
            .iter()
            .zip(&weights[13 - len..])
            .map(|(d, w)| d * w)
            .sum();
        let rest = sum % 11;
        if rest < 2 { 0 } else { 11 - rest }
    };

    values[12] == check(12) && values[13] == check(13)
}

/// Digits of a document number, undoing spreadsheet artefacts such as
/// `12345678909.0` and `1.2345678909E+10`.
fn document_digits(raw: &str) -> String {
    let trimmed = raw.trim();

    if EXCEL_INTEGER.is_match(trimmed) {
        if let Some((integer, _)) = trimmed.split_once('.') {
            return integer.to_string();
        }
    }

    if SCIENTIFIC.is_match(trimmed) {
        if let Ok(value) = trimmed.replace(',', ".").parse::<f64>() {
            if value.is_finite() && value.fract() == 0.0 && value < 1e15 {
                return format!("{}", value as u64);
            }
        }
    }

    digits_only(trimmed)
}

fn all_same(digits: &str) -> bool {
    let mut chars = digits.chars();
    match chars.next() {
        Some(first) => chars.all(|c| c == first),
        None => true,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhoneKind {
    Mobile,
    Landline,
}

impl PhoneKind {
    /// Value stored in `core.telefones.tipo`.
    pub fn as_str(&self) -> &'static str {
        match self {
            PhoneKind::Mobile => "CELULAR",
            PhoneKind::Landline => "FIXO",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Phone {
    pub ddd: String,
    pub numero: String,
    pub kind: PhoneKind,
}

impl Phone {
    /// Parses a Brazilian phone number in any of the legacy layouts:
    /// `+55 (11) 98765-4321`, `011 3333-4444`, `0 21 11 98765 4321` (carrier
    /// code), `8765-4321` (store area code applied), `(11) 8765-4321` (mobile
    /// missing its ninth digit).
    pub fn parse(raw: &str, default_ddd: Option<&str>) -> Result<Self, PhoneError> {
        let mut digits = digits_only(raw);
        if digits.is_empty() {
            return Err(PhoneError::Empty);
        }
        if all_same(&digits) {
            return Err(PhoneError::Placeholder);
        }

        if (12..=13).contains(&digits.len()) && digits.starts_with("55") {
            digits.replace_range(..2, "");
        }

        if digits.starts_with('0') {
            digits = digits.trim_start_matches('0').to_string();
            if (12..=13).contains(&digits.len()) {
                // Carrier selection code before the area code
                digits.replace_range(..2, "");
            }
        }

        if (8..=9).contains(&digits.len()) {
            match default_ddd.map(digits_only) {
                Some(ddd) if ddd.len() == 2 => digits = format!("{}{}", ddd, digits),
                _ => return Err(PhoneError::MissingAreaCode),
            }
        }

        if !(10..=11).contains(&digits.len()) {
            return Err(PhoneError::Length(digits.len()));
        }

        let (ddd, subscriber) = digits.split_at(2);
        let ddd_value: u8 = ddd.parse().map_err(|_| PhoneError::AreaCode(ddd.to_string()))?;
        if !VALID_DDDS.contains(&ddd_value) {
            return Err(PhoneError::AreaCode(ddd.to_string()));
        }

        if all_same(subscriber) {
            return Err(PhoneError::Placeholder);
        }

        let first = subscriber.chars().next().unwrap_or('0');
        let (numero, kind) = match (subscriber.len(), first) {
            (8, '2'..='5') => (subscriber.to_string(), PhoneKind::Landline),
            (8, '6'..='9') => (format!("9{}", subscriber), PhoneKind::Mobile),
            (9, '9') => (subscriber.to_string(), PhoneKind::Mobile),
            _ => return Err(PhoneError::InvalidNumber),
        };

        Ok(Phone {
            ddd: ddd.to_string(),
            numero,
            kind,
        })
    }

    /// Area code followed by the subscriber number, digits only.
    pub fn digits(&self) -> String {
        format!("{}{}", self.ddd, self.numero)
    }

    pub fn e164(&self) -> String {
        format!("+55{}", self.digits())
    }

    pub fn formatted(&self) -> String {
        let split = self.numero.len() - 4;
        format!("({}) {}-{}", self.ddd, &self.numero[..split], &self.numero[split..])
    }
}

pub fn normalize_email(raw: &str) -> Result<String, EmailError> {
    let mut email: String = raw
        .trim()
        .to_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();

    if let Some(stripped) = email.strip_prefix("mailto:") {
        email = stripped.to_string();
    }
    email = email.trim_matches(|c: char| c == '.' || c == ',' || c == ';').to_string();

    if email.is_empty() {
        return Err(EmailError::Empty);
    }

    let Some((local, domain)) = email.split_once('@') else {
        let text = normalize_text(raw).replace(' ', "");
        if EMAIL_PLACEHOLDERS.contains(&text.as_str())
            || ["naotem", "sememail", "naopossui", "naoinformado"].iter().any(|p| text.starts_with(p))
        {
            return Err(EmailError::Placeholder);
        }
        return Err(EmailError::Malformed);
    };

    let mut domain = domain.replace(',', ".");
    while domain.contains("..") {
        domain = domain.replace("..", ".");
    }
    if let Some((_, fixed)) = EMAIL_DOMAIN_FIXES.iter().find(|(typo, _)| *typo == domain) {
        domain = fixed.to_string();
    }

    if EMAIL_PLACEHOLDERS.contains(&local) {
        return Err(EmailError::Placeholder);
    }

    let email = format!("{}@{}", local, domain);
    if !EMAIL.is_match(&email) {
        return Err(EmailError::Malformed);
    }

    Ok(email)
}

/// Title-cases a person name keeping Portuguese particles in lower case.
/// Digits and punctuation other than apostrophes and hyphens are dropped.
pub fn normalize_name(raw: &str) -> Option<String> {
    let cleaned: String = raw
        .chars()
        .map(|c| {
            if c.is_alphabetic() || c == '\'' || c == '-' {
                c
            } else {
                ' '
            }
        })
        .collect();

    let words: Vec<String> = cleaned
        .split_whitespace()
        .filter(|w| w.chars().any(char::is_alphabetic))
        .enumerate()
        .map(|(i, word)| {
            let lower = word.to_lowercase();
            if i > 0 && NAME_PARTICLES.contains(&lower.as_str()) {
                lower
            } else {
                capitalize(&lower)
            }
        })
        .collect();

    if words.is_empty() {
        None
    } else {
        Some(words.join(" "))
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub fn parse_date(raw: &str) -> Result<NaiveDate, DateError> {
    parse_date_with(raw, Local::now().date_naive())
}

/// Two-digit years resolve to the most recent year not after `today`.
pub fn parse_date_with(raw: &str, today: NaiveDate) -> Result<NaiveDate, DateError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(DateError::Empty);
    }

    if let Some(captures) = COMPACT_DATE.captures(trimmed) {
        return ymd(&captures[1], &captures[2], &captures[3]);
    }

    if let Ok(serial) = trimmed.replace(',', ".").parse::<f64>() {
        // A bare year is not a serial
        if serial.fract() == 0.0 && (1900.0..=2100.0).contains(&serial) {
            return Err(DateError::Unrecognized);
        }
        return excel_serial_date(serial);
    }

    let date_part = trimmed
        .split(|c: char| c == ' ' || c == 'T')
        .next()
        .unwrap_or(trimmed);

    if let Some(captures) = YEAR_FIRST.captures(date_part) {
        return ymd(&captures[1], &captures[2], &captures[3]);
    }

    if let Some(captures) = DAY_FIRST.captures(date_part) {
        let year = &captures[3];
        if year.len() == 2 {
            let short: i32 = year.parse().map_err(|_| DateError::Unrecognized)?;
            let mut full = 2000 + short;
            if full > today.year() {
                full -= 100;
            }
            return ymd(&full.to_string(), &captures[2], &captures[1]);
        }
        return ymd(year, &captures[2], &captures[1]);
    }

    Err(DateError::Unrecognized)
}

fn ymd(year: &str, month: &str, day: &str) -> Result<NaiveDate, DateError> {
    let year: i32 = year.parse().map_err(|_| DateError::Unrecognized)?;
    let month: u32 = month.parse().map_err(|_| DateError::Unrecognized)?;
    let day: u32 = day.parse().map_err(|_| DateError::Unrecognized)?;
    NaiveDate::from_ymd_opt(year, month, day).ok_or(DateError::Unrecognized)
}

fn excel_serial_date(serial: f64) -> Result<NaiveDate, DateError> {
    if !(1.0..=80000.0).contains(&serial) {
        return Err(DateError::Unrecognized);
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30).ok_or(DateError::Unrecognized)?;
    epoch
        .checked_add_signed(Duration::days(serial.trunc() as i64))
        .ok_or(DateError::Unrecognized)
}

pub fn validate_birth_date(date: NaiveDate, today: NaiveDate) -> Result<NaiveDate, DateError> {
    if date > today {
        return Err(DateError::Future);
    }
    if today.year() - date.year() > 120 {
        return Err(DateError::TooOld);
    }
    Ok(date)
}

/// Birth dates: a two-digit year that lands after `today` belongs to the
/// previous century (`15/12/26` read in October 2026 is 1926).
pub fn parse_birth_date_with(raw: &str, today: NaiveDate) -> Result<NaiveDate, DateError> {
    let date = parse_date_with(raw, today)?;
    if date > today && has_short_year(raw) {
        if let Some(shifted) = date.with_year(date.year() - 100) {
            return validate_birth_date(shifted, today);
        }
    }
    validate_birth_date(date, today)
}

fn has_short_year(raw: &str) -> bool {
    let trimmed = raw.trim();
    let date_part = trimmed
        .split(|c: char| c == ' ' || c == 'T')
        .next()
        .unwrap_or(trimmed);
    DAY_FIRST
        .captures(date_part)
        .is_some_and(|captures| captures[3].len() == 2)
}

/// Parses money in either `1.234,56` or `1,234.56` convention, with or
/// without `R$`. Negative values use a sign or parentheses.
pub fn parse_amount(raw: &str) -> Result<f64, AmountError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AmountError::Empty);
    }

    let negative = trimmed.starts_with('-')
        || trimmed.ends_with('-')
        || (trimmed.starts_with('(') && trimmed.ends_with(')'));

    let cleaned: String = trimmed
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .collect();
    if !cleaned.chars().any(|c| c.is_ascii_digit()) {
        return Err(AmountError::Unrecognized);
    }

    let normalized = match (cleaned.rfind(','), cleaned.rfind('.')) {
        (Some(comma), Some(dot)) if comma > dot => cleaned.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => cleaned.replace(',', ""),
        (Some(_), None) if cleaned.matches(',').count() > 1 => cleaned.replace(',', ""),
        (Some(_), None) => cleaned.replace(',', "."),
        (None, Some(_)) if cleaned.matches('.').count() > 1 || THOUSANDS_DOT.is_match(&cleaned) => {
            cleaned.replace('.', "")
        }
        _ => cleaned,
    };

    let value: f64 = normalized.parse().map_err(|_| AmountError::Unrecognized)?;
    let rounded = (value * 100.0).round() / 100.0;
    Ok(if negative { -rounded } else { rounded })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_cpf_formats() {
        assert_eq!(Cpf::parse("529.982.247-25", true).unwrap().as_str(), "52998224725");
        assert_eq!(Cpf::parse(" 52998224725 ", true).unwrap().as_str(), "52998224725");
        assert_eq!(Cpf::parse("529 982 247 25", false).unwrap().as_str(), "52998224725");
        assert_eq!(Cpf::parse("52998224725", true).unwrap().formatted(), "529.982.247-25");
    }

    #[test]
    fn test_cpf_spreadsheet_artefacts() {
        assert_eq!(Cpf::parse("52998224725.0", true).unwrap().as_str(), "52998224725");
        assert_eq!(Cpf::parse("5.2998224725E+10", true).unwrap().as_str(), "52998224725");
        // Leading zeros lost when stored as a number
        assert_eq!(Cpf::parse("1234567890", true).unwrap().as_str(), "01234567890");
        assert_eq!(Cpf::parse("123456797", true).unwrap().as_str(), "00123456797");
        assert_eq!(Cpf::parse("1234567890", false), Err(DocumentError::Length(10)));
    }

    #[test]
    fn test_cpf_rejections() {
        assert_eq!(Cpf::parse("", true), Err(DocumentError::Empty));
        assert_eq!(Cpf::parse("n/a", true), Err(DocumentError::Empty));
        assert_eq!(Cpf::parse("111.111.111-11", true), Err(DocumentError::RepeatedDigits));
        assert_eq!(Cpf::parse("529.982.247-24", true), Err(DocumentError::Checksum));
        assert_eq!(Cpf::parse("12345", true), Err(DocumentError::Length(5)));
        assert_eq!(Cpf::parse("11.222.333/0001-81", true), Err(DocumentError::IsCnpj));
        assert_eq!(Cpf::parse("11.222.333/0001-82", true), Err(DocumentError::Length(14)));
    }

    #[test]
    fn test_cnpj() {
        assert!(is_valid_cnpj("11.222.333/0001-81"));
        assert!(!is_valid_cnpj("11.222.333/0001-80"));
        assert!(!is_valid_cnpj("00000000000000"));
    }

    #[test]
    fn test_phone_layouts() {
        let mobile = Phone::parse("+55 (11) 98765-4321", None).unwrap();
        assert_eq!(mobile.digits(), "11987654321");
        assert_eq!(mobile.kind, PhoneKind::Mobile);
        assert_eq!(mobile.formatted(), "(11) 98765-4321");
        assert_eq!(mobile.e164(), "+5511987654321");

        let landline = Phone::parse("011 3333-4444", None).unwrap();
        assert_eq!(landline.digits(), "1133334444");
        assert_eq!(landline.kind, PhoneKind::Landline);
        assert_eq!(landline.formatted(), "(11) 3333-4444");

        let carrier = Phone::parse("0 21 11 98765 4321", None).unwrap();
        assert_eq!(carrier.digits(), "11987654321");
    }

    #[test]
    fn test_phone_ninth_digit_and_default_ddd() {
        let old_mobile = Phone::parse("(21) 8765-4321", None).unwrap();
        assert_eq!(old_mobile.digits(), "21987654321");
        assert_eq!(old_mobile.kind, PhoneKind::Mobile);

        let local = Phone::parse("98765-4321", Some("31")).unwrap();
        assert_eq!(local.digits(), "31987654321");

        assert_eq!(Phone::parse("3333-4444", None), Err(PhoneError::MissingAreaCode));
    }

    #[test]
    fn test_phone_rejections() {
        assert_eq!(Phone::parse("", None), Err(PhoneError::Empty));
        assert_eq!(Phone::parse("(20) 98765-4321", None), Err(PhoneError::AreaCode("20".into())));
        assert_eq!(Phone::parse("(11) 99999-9999", None), Err(PhoneError::Placeholder));
        assert_eq!(Phone::parse("(11) 1234-5678", None), Err(PhoneError::InvalidNumber));
        assert_eq!(Phone::parse("(11) 88765-4321", None), Err(PhoneError::InvalidNumber));
        assert_eq!(Phone::parse("123", None), Err(PhoneError::Length(3)));
        assert_eq!(Phone::parse("0000-0000", Some("11")), Err(PhoneError::Placeholder));
        assert_eq!(Phone::parse("000000000", None), Err(PhoneError::Placeholder));
    }

    #[test]
    fn test_email_normalization() {
        assert_eq!(normalize_email("  Maria.Silva@Gmail.COM ").unwrap(), "maria.silva@gmail.com");
        assert_eq!(normalize_email("joao@gmail.con").unwrap(), "joao@gmail.com");
        assert_eq!(normalize_email("ana@hotmail..com").unwrap(), "ana@hotmail.com");
        assert_eq!(normalize_email("mailto:ze@yahoo.com.b").unwrap(), "ze@yahoo.com.br");
        assert_eq!(normalize_email("jose @ outlook.com").unwrap(), "jose@outlook.com");
    }

    #[test]
    fn test_email_rejections() {
        assert_eq!(normalize_email(""), Err(EmailError::Empty));
        assert_eq!(normalize_email("NÃO TEM"), Err(EmailError::Placeholder));
        assert_eq!(normalize_email("sem@email.com"), Err(EmailError::Placeholder));
        assert_eq!(normalize_email("maria.gmail.com"), Err(EmailError::Malformed));
        assert_eq!(normalize_email("maria@gmail"), Err(EmailError::Malformed));
    }

    #[test]
    fn test_name_normalization() {
        assert_eq!(normalize_name("  MARIA  DA SILVA  ").as_deref(), Some("Maria da Silva"));
        assert_eq!(normalize_name("joão dos santos 123").as_deref(), Some("João dos Santos"));
        assert_eq!(normalize_name("DE OLIVEIRA, ANA").as_deref(), Some("De Oliveira Ana"));
        assert_eq!(normalize_name("--- 000"), None);
    }

    #[test]
    fn test_date_formats() {
        let today = day(2024, 6, 1);
        assert_eq!(parse_date_with("15/03/1985", today).unwrap(), day(1985, 3, 15));
        assert_eq!(parse_date_with("15-03-1985", today).unwrap(), day(1985, 3, 15));
        assert_eq!(parse_date_with("1985-03-15", today).unwrap(), day(1985, 3, 15));
        assert_eq!(parse_date_with("1985-03-15T00:00:00", today).unwrap(), day(1985, 3, 15));
        assert_eq!(parse_date_with("15/03/1985 10:22", today).unwrap(), day(1985, 3, 15));
        assert_eq!(parse_date_with("19850315", today).unwrap(), day(1985, 3, 15));
        assert_eq!(parse_date_with("45292", today).unwrap(), day(2024, 1, 1));
        assert_eq!(parse_date_with("31122", today).unwrap(), day(1985, 3, 16));
    }

    #[test]
    fn test_two_digit_years() {
        let today = day(2024, 6, 1);
        assert_eq!(parse_date_with("15/03/85", today).unwrap(), day(1985, 3, 15));
        assert_eq!(parse_date_with("01/02/23", today).unwrap(), day(2023, 2, 1));
        assert_eq!(parse_date_with("01/02/45", today).unwrap(), day(1945, 2, 1));
    }

    #[test]
    fn test_date_rejections() {
        let today = day(2024, 6, 1);
        assert_eq!(parse_date_with("", today), Err(DateError::Empty));
        assert_eq!(parse_date_with("00/00/0000", today), Err(DateError::Unrecognized));
        assert_eq!(parse_date_with("31/02/2020", today), Err(DateError::Unrecognized));
        assert_eq!(parse_date_with("ontem", today), Err(DateError::Unrecognized));
        assert_eq!(parse_date_with("1985", today), Err(DateError::Unrecognized));
        assert_eq!(parse_date_with("2024", today), Err(DateError::Unrecognized));
        assert_eq!(
            parse_birth_date_with("1985", today),
            Err(DateError::Unrecognized)
        );
        assert_eq!(
            validate_birth_date(day(2030, 1, 1), today),
            Err(DateError::Future)
        );
        assert_eq!(
            validate_birth_date(day(1890, 1, 1), today),
            Err(DateError::TooOld)
        );
        assert!(validate_birth_date(day(1990, 1, 1), today).is_ok());
    }

    #[test]
    fn test_birth_date_century_shift() {
        let today = day(2026, 10, 18);
        assert_eq!(parse_birth_date_with("15/12/26", today), Ok(day(1926, 12, 15)));
        assert_eq!(parse_birth_date_with("15/03/85", today), Ok(day(1985, 3, 15)));
        assert_eq!(parse_birth_date_with("15/12/2026", today), Err(DateError::Future));
        assert_eq!(parse_birth_date_with("01/01/1890", today), Err(DateError::TooOld));
    }

    #[test]
    fn test_amounts() {
        assert_eq!(parse_amount("R$ 1.234,56").unwrap(), 1234.56);
        assert_eq!(parse_amount("1,234.56").unwrap(), 1234.56);
        assert_eq!(parse_amount("89,9").unwrap(), 89.9);
        assert_eq!(parse_amount("1.500").unwrap(), 1500.0);
        assert_eq!(parse_amount("12.5").unwrap(), 12.5);
        assert_eq!(parse_amount("1.234.567").unwrap(), 1234567.0);
        assert_eq!(parse_amount("(45,00)").unwrap(), -45.0);
        assert_eq!(parse_amount("-10.999").unwrap(), -10999.0);
        assert_eq!(parse_amount("10.129").unwrap(), 10129.0);
        assert_eq!(parse_amount("10.12945").unwrap(), 10.13);
        assert_eq!(parse_amount(""), Err(AmountError::Empty));
        assert_eq!(parse_amount("R$ -"), Err(AmountError::Unrecognized));
    }
}
