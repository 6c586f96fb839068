//! Conversions between decimal NEAR strings and yoctoNEAR.

use crate::error::{DaoClientError, Result};

/// Number of decimals in one NEAR
pub const NEAR_NOMINATION_EXP: u32 = 24;

/// yoctoNEAR in one NEAR
pub const ONE_NEAR: u128 = 10u128.pow(NEAR_NOMINATION_EXP);

/// Parse a decimal NEAR amount (`"1.5"`, `"1,000"`) into yoctoNEAR.
pub fn parse_near_amount(amount: &str) -> Result<u128> {
    let cleaned: String = amount.trim().chars().filter(|c| *c != ',').collect();
    let invalid = || DaoClientError::InvalidInput(format!("Invalid NEAR amount: {:?}", amount));

    let (whole, fraction) = match cleaned.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (cleaned.as_str(), ""),
    };

    if whole.is_empty() && fraction.is_empty() {
        return Err(invalid());
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !fraction.chars().all(|c| c.is_ascii_digit())
    {
        return Err(invalid());
    }
    if fraction.len() > NEAR_NOMINATION_EXP as usize {
        return Err(DaoClientError::InvalidInput(format!(
            "NEAR amount {:?} has more than {} decimals",
            amount, NEAR_NOMINATION_EXP
        )));
    }

    let whole: u128 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| invalid())?
    };
    let fraction: u128 = if fraction.is_empty() {
        0
    } else {
        let scale = 10u128.pow(NEAR_NOMINATION_EXP - fraction.len() as u32);
        fraction.parse::<u128>().map_err(|_| invalid())? * scale
    };

    whole
        .checked_mul(ONE_NEAR)
        .and_then(|w| w.checked_add(fraction))
        .ok_or_else(invalid)
}

/// Format yoctoNEAR as a decimal NEAR string, rounded to `frac_digits` decimals.
pub fn format_near_amount(yocto: u128, frac_digits: u32) -> String {
    let frac_digits = frac_digits.min(NEAR_NOMINATION_EXP);
    let rounded = if frac_digits < NEAR_NOMINATION_EXP {
        let half = 5 * 10u128.pow(NEAR_NOMINATION_EXP - frac_digits - 1);
        yocto.saturating_add(half)
    } else {
        yocto
    };

    let whole = rounded / ONE_NEAR;
    let fraction = format!("{:024}", rounded % ONE_NEAR);
    let fraction = fraction[..frac_digits as usize].trim_end_matches('0');

    if fraction.is_empty() {
        whole.to_string()
    } else {
        format!("{}.{}", whole, fraction)
    }
}
