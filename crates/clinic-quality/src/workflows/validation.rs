use serde::Serialize;

/// Input outside its domain, naming the offending field.
#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
#[error("invalid {field}: {reason}")]
pub struct ValidationError {
    pub field: &'static str,
    pub reason: String,
}

impl ValidationError {
    pub fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

pub(crate) fn ensure_finite(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ValidationError::new(field, format!("{value} is not a finite number")))
    }
}

/// Scores and rates live on a 0-100 scale.
pub(crate) fn ensure_percentage(field: &'static str, value: f64) -> Result<(), ValidationError> {
    ensure_finite(field, value)?;
    if (0.0..=100.0).contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::new(
            field,
            format!("{value} is outside the 0-100 range"),
        ))
    }
}
