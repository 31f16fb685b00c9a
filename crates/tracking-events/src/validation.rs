//! Event validation.
//!
//! Rejections are [`ValidationError`]s and the event is dropped. Funnel
//! ordering problems are [`FunnelWarning`]s and the event still sends.

use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

use crate::FunnelStepRecord;

pub const MAX_EVENT_NAME_LEN: usize = 100;

fn event_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-z][a-z0-9_]*$").expect("valid regex"))
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Page value must be a number")]
    ValueNotANumber,

    #[error("Value must be between 0 and 100, got {0}")]
    ValueOutOfRange(f64),

    #[error("Path must be a non-empty string")]
    EmptyPath,

    #[error("Step name must be a non-empty string")]
    EmptyStepName,

    #[error("Step number must be a positive integer, got {0}")]
    InvalidStepNumber(i64),

    #[error("Event name must be a non-empty string")]
    EmptyEventName,

    #[error("Event name '{0}' must be snake_case: lowercase letters, digits and underscores, starting with a letter")]
    EventNameFormat(String),

    #[error("Event name must be 100 characters or less, got {0}")]
    EventNameTooLong(usize),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FunnelWarning {
    #[error("Step number {step} is not greater than previous step {previous}")]
    Regression { step: u32, previous: u32 },

    #[error("Step {expected} was skipped. Current step is {step}")]
    Skipped { expected: u32, step: u32 },

    #[error("Step name \"{name}\" was already used with step number {previous}")]
    DuplicateName { name: String, previous: u32 },
}

/// Validate a page (or funnel) value and normalize it.
///
/// `None` is accepted as 0. Valid values are rounded to the nearest integer.
pub fn validate_page_value(value: Option<f64>, path: &str) -> Result<f64, ValidationError> {
    let Some(value) = value else {
        return Ok(0.0);
    };
    if value.is_nan() {
        return Err(ValidationError::ValueNotANumber);
    }
    if !(0.0..=100.0).contains(&value) {
        return Err(ValidationError::ValueOutOfRange(value));
    }
    if path.trim().is_empty() {
        return Err(ValidationError::EmptyPath);
    }
    Ok(value.round())
}

/// Validate a funnel step against the steps already sent this session.
///
/// Returns the normalized value and at most one warning.
pub fn validate_funnel_step(
    step_name: &str,
    step_number: i64,
    value: Option<f64>,
    history: &[FunnelStepRecord],
) -> Result<(u32, f64, Option<FunnelWarning>), ValidationError> {
    if step_name.trim().is_empty() {
        return Err(ValidationError::EmptyStepName);
    }
    let step = u32::try_from(step_number)
        .ok()
        .filter(|n| *n > 0)
        .ok_or(ValidationError::InvalidStepNumber(step_number))?;
    let value = validate_page_value(value, step_name)?;

    if let Some(previous) = history.last() {
        if step <= previous.step_number {
            let warning = FunnelWarning::Regression {
                step,
                previous: previous.step_number,
            };
            return Ok((step, value, Some(warning)));
        }
        let expected = previous.step_number + 1;
        if step > expected {
            return Ok((step, value, Some(FunnelWarning::Skipped { expected, step })));
        }
    }

    let duplicate = history
        .iter()
        .find(|s| s.step_name == step_name && s.step_number != step)
        .map(|s| FunnelWarning::DuplicateName {
            name: step_name.to_string(),
            previous: s.step_number,
        });

    Ok((step, value, duplicate))
}

pub fn validate_event_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::EmptyEventName);
    }
    if !event_name_regex().is_match(name) {
        return Err(ValidationError::EventNameFormat(name.to_string()));
    }
    if name.len() > MAX_EVENT_NAME_LEN {
        return Err(ValidationError::EventNameTooLong(name.len()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, number: u32) -> FunnelStepRecord {
        FunnelStepRecord {
            step_name: name.into(),
            step_number: number,
            value: 0.0,
            timestamp: 0,
        }
    }

    #[test]
    fn test_page_value_rules() {
        assert_eq!(validate_page_value(None, "/"), Ok(0.0));
        assert_eq!(validate_page_value(Some(49.6), "/pricing"), Ok(50.0));
        assert_eq!(validate_page_value(Some(100.0), "/"), Ok(100.0));
        assert_eq!(
            validate_page_value(Some(101.0), "/"),
            Err(ValidationError::ValueOutOfRange(101.0))
        );
        assert_eq!(
            validate_page_value(Some(f64::NAN), "/"),
            Err(ValidationError::ValueNotANumber)
        );
        assert_eq!(validate_page_value(Some(5.0), "  "), Err(ValidationError::EmptyPath));
    }

    #[test]
    fn test_event_name_rules() {
        assert!(validate_event_name("signup_completed").is_ok());
        assert!(validate_event_name("a1").is_ok());
        assert_eq!(
            validate_event_name("Invalid-Name"),
            Err(ValidationError::EventNameFormat("Invalid-Name".into()))
        );
        assert!(validate_event_name("1abc").is_err());
        assert_eq!(validate_event_name(""), Err(ValidationError::EmptyEventName));

        let long = "a".repeat(101);
        assert_eq!(validate_event_name(&long), Err(ValidationError::EventNameTooLong(101)));
        assert!(validate_event_name(&"a".repeat(100)).is_ok());
    }

    #[test]
    fn test_funnel_rejections() {
        assert_eq!(
            validate_funnel_step("", 1, None, &[]),
            Err(ValidationError::EmptyStepName)
        );
        assert_eq!(
            validate_funnel_step("cart", 0, None, &[]),
            Err(ValidationError::InvalidStepNumber(0))
        );
        assert_eq!(
            validate_funnel_step("cart", -2, None, &[]),
            Err(ValidationError::InvalidStepNumber(-2))
        );
        assert!(validate_funnel_step("cart", 1, Some(150.0), &[]).is_err());
    }

    #[test]
    fn test_funnel_warnings() {
        let history = vec![record("cart", 1), record("shipping", 2)];

        let (_, _, warning) = validate_funnel_step("shipping", 2, None, &history).unwrap();
        assert_eq!(warning, Some(FunnelWarning::Regression { step: 2, previous: 2 }));

        let (_, _, warning) = validate_funnel_step("payment", 4, None, &history).unwrap();
        assert_eq!(warning, Some(FunnelWarning::Skipped { expected: 3, step: 4 }));

        let (_, _, warning) = validate_funnel_step("cart", 3, None, &history).unwrap();
        assert_eq!(
            warning,
            Some(FunnelWarning::DuplicateName {
                name: "cart".into(),
                previous: 1
            })
        );

        let (step, value, warning) = validate_funnel_step("payment", 3, Some(20.0), &history).unwrap();
        assert_eq!((step, value, warning), (3, 20.0, None));
    }
}
