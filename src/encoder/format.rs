//! Scalar rendering.

use crate::error::{ExportError, Result};

/// Render a float with at most `precision` decimal places.
///
/// The value is rounded to `precision` decimals, then trailing zeros and a
/// trailing decimal point are removed. Negative zero renders as `0`. JSON
/// has no token for NaN or the infinities, so those are `Unencodable`.
pub fn format_float(value: f64, precision: usize) -> Result<String> {
    if !value.is_finite() {
        return Err(ExportError::Unencodable(format!("non-finite float {}", value)));
    }

    let mut text = format!("{:.*}", precision, value);
    if text.contains('.') {
        let end = text.trim_end_matches('0').trim_end_matches('.').len();
        text.truncate(end);
    }
    if text == "-0" {
        text.remove(0);
    }
    Ok(text)
}

/// Render a string as a quoted JSON string literal.
pub fn quote_str(value: &str) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}
