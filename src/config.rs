//! Per-test tolerance overrides.
//!
//! Simulation configuration files may carry test parameters on lines of the form
//!
//! ```text
//! ## epsilon = 0.0001
//! ## scaling_factor = 10.0
//! ```
//!
//! Values are plain numbers. They are never evaluated as expressions.
use std::path::Path;

use tracing::debug;

use crate::{Error, Result, Tolerance};

const PREFIX: &str = "##";

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Overrides {
    pub epsilon: Option<f64>,
    pub scaling_factor: Option<f64>,
}

impl Overrides {
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    /// Collect the recognized parameters from `text`. Unknown keys are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a recognized key has a value that is not a number.
    pub fn parse(text: &str) -> Result<Self> {
        let mut overrides = Self::default();
        for (idx, line) in text.lines().enumerate() {
            let Some(param) = line.strip_prefix(PREFIX) else {
                continue;
            };
            let Some((key, value)) = param.split_once('=') else {
                continue;
            };
            let (key, value) = (key.trim(), value.trim());
            let slot = match key {
                "epsilon" => &mut overrides.epsilon,
                "scaling_factor" => &mut overrides.scaling_factor,
                _ => {
                    debug!("ignoring unknown test parameter '{key}'");
                    continue;
                }
            };
            let parsed: f64 = value.parse().map_err(|_| Error::Config {
                line: idx + 1,
                message: format!("value '{value}' for '{key}' is not a number"),
            })?;
            *slot = Some(parsed);
        }
        Ok(overrides)
    }
}

impl Tolerance {
    /// Replace epsilon and scale with the values that are set in `overrides`.
    pub fn with_overrides(self, overrides: &Overrides) -> Self {
        Self {
            epsilon: overrides.epsilon.unwrap_or(self.epsilon),
            scale: overrides.scaling_factor.unwrap_or(self.scale),
            ..self
        }
    }
}
