pub mod balance;
pub mod futures;
pub mod pnl;
pub mod position;
pub mod trade;

/// Rejects NaN and infinities.
pub fn ensure_finite(field: &str, value: f64) -> Result<(), String> {
    if !value.is_finite() {
        return Err(format!("invalid {field} {value}: must be finite"));
    }
    Ok(())
}

/// Rejects NaN, infinities and negative values.
pub fn ensure_amount(field: &str, value: f64) -> Result<(), String> {
    if !value.is_finite() || value < 0.0 {
        return Err(format!(
            "invalid {field} {value}: must be a finite non-negative number"
        ));
    }
    Ok(())
}
