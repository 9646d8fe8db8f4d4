use crate::domain::payment::CardInfo;
use chrono::{Datelike, Utc};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CardError {
    #[error("unknown credit card issuer")]
    UnknownIssuer,
    #[error("credit card has expired")]
    Expired,
    #[error("invalid month")]
    InvalidMonth,
    #[error("invalid CVV")]
    InvalidCvv,
    #[error("invalid credit card number")]
    InvalidNumber,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Issuer {
    Amex,
    Mastercard,
    VisaElectron,
    Visa,
}

impl Issuer {
    pub fn name(&self) -> &'static str {
        match self {
            Issuer::Amex => "amex",
            Issuer::Mastercard => "mastercard",
            Issuer::VisaElectron => "visa electron",
            Issuer::Visa => "visa",
        }
    }
}

/// Full card check: issuer, then expiry, then CVV, then Luhn.
/// The first failing rule wins.
pub fn validate(card: &CardInfo) -> Result<(), CardError> {
    issuer(&card.card_number)?;
    validate_expiration(card.expiry_month, card.expiry_year)?;
    validate_cvv(&card.cvv)?;
    if !valid_number(&card.card_number) {
        return Err(CardError::InvalidNumber);
    }
    Ok(())
}

/// Recognises the card scheme from the leading digits. A non-digit anywhere
/// in the inspected prefix windows makes the issuer unknown.
pub fn issuer(number: &str) -> Result<Issuer, CardError> {
    // prefixes[i] holds the numeric value of the first i+1 digits; windows
    // past the end of a short number stay 0 and match nothing.
    let mut prefixes = [0u64; 6];
    for (i, prefix) in prefixes.iter_mut().enumerate().take(number.len().min(6)) {
        let window = number.get(..i + 1).ok_or(CardError::UnknownIssuer)?;
        *prefix = window.parse().map_err(|_| CardError::UnknownIssuer)?;
    }

    if matches!(prefixes[1], 34 | 37) {
        Ok(Issuer::Amex)
    } else if (51..=55).contains(&prefixes[1]) || (222100..=272099).contains(&prefixes[5]) {
        Ok(Issuer::Mastercard)
    } else if matches!(prefixes[3], 4026 | 4405 | 4508 | 4844 | 4913 | 4917)
        || prefixes[5] == 417500
    {
        Ok(Issuer::VisaElectron)
    } else if prefixes[0] == 4 {
        Ok(Issuer::Visa)
    } else {
        Err(CardError::UnknownIssuer)
    }
}

/// Calendar-precision expiry in UTC; the two-digit year is read as 20YY.
/// A card whose expiry month equals the current month is still valid.
pub fn validate_expiration(month: i32, year: i32) -> Result<(), CardError> {
    let now = Utc::now();
    let year = year + 2000;

    if !(1..=12).contains(&month) {
        return Err(CardError::InvalidMonth);
    }
    if year < now.year() {
        return Err(CardError::Expired);
    }
    if year == now.year() && month < now.month() as i32 {
        return Err(CardError::Expired);
    }
    Ok(())
}

pub fn validate_cvv(cvv: &str) -> Result<(), CardError> {
    if cvv.len() < 3 || cvv.len() > 4 {
        return Err(CardError::InvalidCvv);
    }
    Ok(())
}

/// Luhn mod-10 over the full PAN; the length must be 13-19 digits.
pub fn valid_number(number: &str) -> bool {
    if number.len() < 13 || number.len() > 19 {
        return false;
    }

    let mut sum = 0u32;
    let mut alternate = false;
    for ch in number.chars().rev() {
        let Some(mut digit) = ch.to_digit(10) else {
            return false;
        };
        if alternate {
            digit *= 2;
            if digit > 9 {
                digit = digit % 10 + 1;
            }
        }
        alternate = !alternate;
        sum += digit;
    }
    sum % 10 == 0
}
