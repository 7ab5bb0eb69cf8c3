//! CLI argument validators.

/// Parse and validate a probability threshold (0.0-1.0).
pub fn parse_probability(s: &str) -> Result<f32, String> {
    let value: f32 = s
        .parse()
        .map_err(|_| format!("'{s}' is not a valid number"))?;

    if !(0.0..=1.0).contains(&value) {
        return Err(format!(
            "probability must be between 0.0 and 1.0, got {value}"
        ));
    }

    Ok(value)
}

/// Parse and validate a prediction count (at least 1).
pub fn parse_top_k(s: &str) -> Result<usize, String> {
    let value: usize = s
        .parse()
        .map_err(|_| format!("'{s}' is not a valid count"))?;

    if value == 0 {
        return Err("top-k must be at least 1".to_string());
    }

    Ok(value)
}
