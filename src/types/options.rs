//! Per-call completion options.

use bon::Builder;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ChofeshError, Result};

/// Sampling overrides for a single call.
///
/// Unset fields fall back to the agent's configured defaults. `extra` keys are
/// passed through to the request body and override same-named agent defaults.
#[derive(Debug, Clone, Builder, Serialize, Deserialize, Default, PartialEq)]
pub struct CompletionOptions {
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
    #[builder(default)]
    #[serde(default)]
    pub extra: Map<String, Value>,
}

impl CompletionOptions {
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

/// Reject sampling parameters the endpoint cannot accept.
pub fn validate_sampling(temperature: f64, max_tokens: Option<u32>) -> Result<()> {
    if !(0.0..=2.0).contains(&temperature) {
        return Err(ChofeshError::Validation(format!(
            "temperature must be between 0.0 and 2.0, got {temperature}"
        )));
    }
    if max_tokens == Some(0) {
        return Err(ChofeshError::Validation(
            "max_tokens must be greater than zero".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults_extra_to_empty() {
        let options = CompletionOptions::builder().temperature(0.2).build();
        assert_eq!(options.temperature, Some(0.2));
        assert!(options.extra.is_empty());
    }

    #[test]
    fn sampling_bounds() {
        assert!(validate_sampling(0.0, None).is_ok());
        assert!(validate_sampling(2.0, Some(1)).is_ok());
        assert!(matches!(validate_sampling(2.5, None), Err(ChofeshError::Validation(_))));
        assert!(matches!(validate_sampling(-0.1, None), Err(ChofeshError::Validation(_))));
        assert!(matches!(validate_sampling(f64::NAN, None), Err(ChofeshError::Validation(_))));
        assert!(matches!(validate_sampling(0.7, Some(0)), Err(ChofeshError::Validation(_))));
    }
}
