use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::line_item::LineItemDraft;
use crate::errors::DomainError;

const PRICE_SENTINELS: [&str; 2] = ["n/a", "contact sales"];
const CURRENCY_MARKS: [char; 4] = ['₹', '$', '€', '£'];

/// Normalizes a display-formatted price (`"₹1,000"`, `"1,499.50/month"`) to an
/// amount. Sentinels and anything without a leading number yield `None`.
///
/// Like the estimator UI, only the leading numeric part is read, so unit
/// suffixes such as `/month` are ignored. An exponent (`1e3`, `2.5E-2`) is
/// part of the number; one that leaves the decimal range yields `None`.
pub fn parse_price(display: &str) -> Option<Decimal> {
    let trimmed = display.trim();
    if trimmed.is_empty()
        || PRICE_SENTINELS.iter().any(|sentinel| trimmed.eq_ignore_ascii_case(sentinel))
    {
        return None;
    }

    let cleaned: String = trimmed
        .chars()
        .filter(|ch| !ch.is_whitespace() && *ch != ',' && !CURRENCY_MARKS.contains(ch))
        .collect();

    let (mantissa, exponent) = leading_number(&cleaned)?;
    scale_by_exponent(Decimal::from_str(&mantissa).ok()?, exponent)
}

/// Splits the leading `[sign]digits[.digits][e[sign]digits]` run into a
/// mantissa string and a power of ten.
fn leading_number(input: &str) -> Option<(String, i32)> {
    let (negative, body) = match input.as_bytes().first() {
        Some(b'-') => (true, &input[1..]),
        Some(b'+') => (false, &input[1..]),
        _ => (false, input),
    };

    let mut end = 0;
    let mut digits = 0;
    let mut seen_dot = false;
    for byte in body.bytes() {
        match byte {
            b'0'..=b'9' => digits += 1,
            b'.' if !seen_dot => seen_dot = true,
            _ => break,
        }
        end += 1;
    }

    if digits == 0 {
        return None;
    }

    let exponent = match body.as_bytes().get(end) {
        Some(b'e' | b'E') => exponent_suffix(&body[end + 1..]),
        _ => Some(0),
    }?;

    let number = body[..end].trim_end_matches('.');
    let number = if number.starts_with('.') { format!("0{number}") } else { number.to_string() };
    Some((if negative { format!("-{number}") } else { number }, exponent))
}

/// Reads `[sign]digits` after an `e`. A bare `e` (as in `5each`) is not an
/// exponent and leaves the mantissa alone.
fn exponent_suffix(input: &str) -> Option<i32> {
    let unsigned = input.trim_start_matches(['+', '-']);
    let sign_len = input.len() - unsigned.len();
    if sign_len > 1 {
        return Some(0);
    }
    let digits = unsigned.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return Some(0);
    }
    // Exponents wider than four digits are out of range.
    if digits > 4 {
        return None;
    }
    let magnitude: i32 = unsigned[..digits].parse().ok()?;
    Some(if input.starts_with('-') { -magnitude } else { magnitude })
}

fn scale_by_exponent(mantissa: Decimal, exponent: i32) -> Option<Decimal> {
    let mut value = mantissa;
    for _ in 0..exponent.unsigned_abs() {
        value = if exponent > 0 {
            value.checked_mul(Decimal::TEN)?
        } else {
            value.checked_div(Decimal::TEN)?
        };
    }
    Some(value)
}

pub(crate) fn out_of_range() -> DomainError {
    DomainError::Validation("amount out of range".to_string())
}

pub fn line_total(unit_price: Decimal, quantity: u32) -> Result<Decimal, DomainError> {
    unit_price.checked_mul(Decimal::from(quantity)).ok_or_else(out_of_range)
}

pub fn subtotal<'a>(
    items: impl IntoIterator<Item = &'a LineItemDraft>,
) -> Result<Decimal, DomainError> {
    items.into_iter().try_fold(Decimal::ZERO, |sum, item| {
        sum.checked_add(item.total_price).ok_or_else(out_of_range)
    })
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotationTotals {
    pub subtotal: Decimal,
    pub tax_rate: Decimal,
    pub tax_amount: Decimal,
    pub discount_amount: Decimal,
    pub grand_total: Decimal,
}

impl QuotationTotals {
    /// `tax = subtotal * rate / 100`, `grand_total = subtotal + tax - discount`.
    pub fn compute(
        subtotal: Decimal,
        tax_rate: Decimal,
        discount_amount: Decimal,
    ) -> Result<Self, DomainError> {
        let tax_amount = subtotal
            .checked_mul(tax_rate)
            .and_then(|taxed| taxed.checked_div(Decimal::ONE_HUNDRED))
            .ok_or_else(out_of_range)?;
        let grand_total = subtotal
            .checked_add(tax_amount)
            .and_then(|gross| gross.checked_sub(discount_amount))
            .ok_or_else(out_of_range)?;
        Ok(Self { subtotal, tax_rate, tax_amount, discount_amount, grand_total })
    }

    pub fn for_items<'a>(
        items: impl IntoIterator<Item = &'a LineItemDraft>,
        tax_rate: Decimal,
        discount_amount: Decimal,
    ) -> Result<Self, DomainError> {
        Self::compute(subtotal(items)?, tax_rate, discount_amount)
    }
}
