// Buyout price calculation
//
// Amounts are held in integer cents and rates in hundredths of a percent.
// Every rounding step is half-up to the cent.

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

use super::depreciation::{DeviceType, Rate};

/// VAT added on top of the original cost, in percent
pub const VAT_PERCENT: i128 = 21;

const MAX_COST_SCALE: u32 = 18;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuyoutError {
    #[error("invalid original cost '{0}'")]
    InvalidCost(String),
    #[error("invalid purchase date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),
}

/// Non-negative amount in cents
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Money(i64);

impl Money {
    pub fn cents(self) -> i64 {
        self.0
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

impl Serialize for Money {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// `numerator / denominator` rounded half-up, `None` on overflow
fn round_half_up(numerator: i128, denominator: i128) -> Option<i128> {
    let doubled = numerator.checked_mul(2)?.checked_add(denominator)?;
    Some(doubled / denominator.checked_mul(2)?)
}

/// Split a decimal string into digits and scale: "1200.50" is (120050, 2)
fn parse_decimal(raw: &str) -> Result<(i128, u32), BuyoutError> {
    let invalid = || BuyoutError::InvalidCost(raw.to_string());
    let trimmed = raw.trim();
    let (whole, fraction) = trimmed.split_once('.').unwrap_or((trimmed, ""));

    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if whole.is_empty() && fraction.is_empty() {
        return Err(invalid());
    }
    if !all_digits(whole) || !all_digits(fraction) || fraction.len() as u32 > MAX_COST_SCALE {
        return Err(invalid());
    }

    let digits = format!("{}{}", whole, fraction);
    let mantissa = digits.parse::<i128>().map_err(|_| invalid())?;
    Ok((mantissa, fraction.len() as u32))
}

/// Original cost plus VAT, rounded to the cent
pub fn cost_with_vat(original_cost: &str) -> Result<Money, BuyoutError> {
    let (mantissa, scale) = parse_decimal(original_cost)?;
    let overflow = || BuyoutError::InvalidCost(original_cost.to_string());

    let numerator = mantissa.checked_mul(100 + VAT_PERCENT).ok_or_else(overflow)?;
    let cents = round_half_up(numerator, 10i128.pow(scale)).ok_or_else(overflow)?;
    i64::try_from(cents).map(Money).map_err(|_| overflow())
}

pub fn buyout_price(cost_with_vat: Money, rate: Rate) -> Money {
    let cents = round_half_up(
        i128::from(cost_with_vat.cents()) * i128::from(rate.hundredths()),
        10_000,
    )
    .unwrap_or(i128::MAX);
    // A rate at or below 100% never grows the amount
    Money(i64::try_from(cents).unwrap_or(i64::MAX))
}

/// Whole months from `purchase` to `today`, never less than one
pub fn months_since(purchase: NaiveDate, today: NaiveDate) -> u32 {
    let mut months = (today.year() - purchase.year()) * 12 + today.month() as i32
        - purchase.month() as i32;
    if today.day() < purchase.day() {
        months -= 1;
    }
    months.max(1) as u32
}

/// Age for an optional purchase date; no date means age zero
pub fn age_in_months(purchase_date: Option<&str>, today: NaiveDate) -> Result<u32, BuyoutError> {
    let Some(raw) = purchase_date.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(0);
    };
    // Assets may return a full timestamp; only the date part matters
    let date_part = raw.get(..10).unwrap_or(raw);
    let purchase = NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .map_err(|_| BuyoutError::InvalidDate(raw.to_string()))?;
    Ok(months_since(purchase, today))
}

/// Raw attribute values a quote is computed from
#[derive(Debug, Clone, Copy, Default)]
pub struct BuyoutInput<'a> {
    pub original_cost: Option<&'a str>,
    pub purchase_date: Option<&'a str>,
    pub object_type_name: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuyoutQuote {
    pub age_months: u32,
    pub device_type: DeviceType,
    pub cost_with_vat: Money,
    pub depreciation_rate: Rate,
    pub buyout_price: Money,
}

impl BuyoutQuote {
    /// Compute a quote, or `None` when the asset has no original cost
    pub fn calculate(input: &BuyoutInput<'_>, today: NaiveDate) -> Result<Option<Self>, BuyoutError> {
        let Some(cost) = input.original_cost.filter(|c| !c.trim().is_empty()) else {
            return Ok(None);
        };

        let age_months = age_in_months(input.purchase_date, today)?;
        let device_type = DeviceType::from_object_type_name(input.object_type_name);
        let cost_with_vat = cost_with_vat(cost)?;
        let depreciation_rate = Rate::for_age(age_months, device_type);

        Ok(Some(Self {
            age_months,
            device_type,
            cost_with_vat,
            depreciation_rate,
            buyout_price: buyout_price(cost_with_vat, depreciation_rate),
        }))
    }
}
