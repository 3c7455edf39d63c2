//! Ledger monetary system
//!
//! Amounts are held as `u64` counts of the smallest unit. The number of
//! fractional decimal digits a unit represents (the scale) is configured per
//! ledger, so `"80.25"` at scale 2 is `8025` units. Parsing never goes through
//! floating point, which keeps signer and verifier byte-for-byte in agreement.
use crate::error::{BlockchainError, Result};

/// Default number of fractional digits (same granularity as satoshis)
pub const DEFAULT_AMOUNT_SCALE: u32 = 8;

/// Largest scale whose unit multiplier still fits in a u64
pub const MAX_AMOUNT_SCALE: u32 = 18;

/// Multiplier from whole coins to units at `scale`
pub fn units_per_coin(scale: u32) -> Result<u64> {
    if scale > MAX_AMOUNT_SCALE {
        return Err(BlockchainError::Config(format!(
            "Amount scale {scale} exceeds the maximum of {MAX_AMOUNT_SCALE}"
        )));
    }
    Ok(10u64.pow(scale))
}

/// Validation limits applied to every transfer amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionRules {
    /// Fractional digits allowed in a decimal amount
    pub scale: u32,
    /// Floor for the covering inputs of a transfer, in units
    pub minimum_transaction_value: u64,
    /// Ceiling for a single transfer, in units
    pub max_transaction_amount: u64,
}

impl TransactionRules {
    /// Parse a decimal amount string into units and check it against the
    /// positivity, scale and ceiling rules.
    pub fn parse_amount(&self, text: &str) -> Result<u64> {
        // An amount too big for a u64 is also over my ceiling, so I report
        // it against the ceiling rather than against u64::MAX
        let units = checked_units(text, self.scale)?.ok_or_else(|| {
            BlockchainError::Transaction(format!(
                "Amount {} exceeds the maximum of {}",
                text.trim(),
                self.format(self.max_transaction_amount)
            ))
        })?;
        self.check_amount(units)?;
        Ok(units)
    }

    /// Check an amount already expressed in units.
    pub fn check_amount(&self, units: u64) -> Result<()> {
        if units == 0 {
            return Err(BlockchainError::AmountNotPositive);
        }
        if units > self.max_transaction_amount {
            return Err(BlockchainError::AmountTooLarge {
                amount: units,
                maximum: self.max_transaction_amount,
            });
        }
        Ok(())
    }

    pub fn format(&self, units: u64) -> String {
        format_units(units, self.scale)
    }
}

/// Convert a decimal string into units at `scale` without any rounding.
pub fn parse_units(text: &str, scale: u32) -> Result<u64> {
    checked_units(text, scale)?.ok_or_else(|| {
        BlockchainError::Transaction(format!(
            "Amount {} is too large to represent at scale {scale}",
            text.trim()
        ))
    })
}

// Ok(None) means the text is a well-formed amount that overflows a u64
fn checked_units(text: &str, scale: u32) -> Result<Option<u64>> {
    let text = text.trim();
    if text.is_empty() {
        return Err(BlockchainError::MissingFields("amount".to_string()));
    }
    if text.starts_with('-') {
        return Err(BlockchainError::AmountNotPositive);
    }

    let (whole, fraction) = match text.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (text, ""),
    };
    let is_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if whole.is_empty() || !is_digits(whole) || !is_digits(fraction) {
        return Err(BlockchainError::Transaction(format!(
            "Malformed amount: {text}"
        )));
    }
    if fraction.len() > scale as usize {
        return Err(BlockchainError::AmountScaleOverflow { scale });
    }

    let multiplier = units_per_coin(scale)?;

    // Both parts are all digits by now, so a failed parse can only mean
    // the value does not fit
    let whole_units = whole
        .parse::<u64>()
        .ok()
        .and_then(|whole| whole.checked_mul(multiplier));
    let fraction_units = if fraction.is_empty() {
        Some(0)
    } else {
        let padding = 10u64.pow(scale - fraction.len() as u32);
        fraction
            .parse::<u64>()
            .ok()
            .and_then(|fraction| fraction.checked_mul(padding))
    };

    Ok(whole_units
        .zip(fraction_units)
        .and_then(|(whole, fraction)| whole.checked_add(fraction)))
}

/// Render units as a decimal string with trailing fractional zeros trimmed.
pub fn format_units(units: u64, scale: u32) -> String {
    let multiplier = 10u64.pow(scale.min(MAX_AMOUNT_SCALE));
    let whole = units / multiplier;
    let fraction = units % multiplier;
    if fraction == 0 {
        return whole.to_string();
    }
    let digits = format!("{:0width$}", fraction, width = scale as usize);
    format!("{whole}.{}", digits.trim_end_matches('0'))
}
