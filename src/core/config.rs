//! Portal configuration loaded from TOML.
//!
//! ```toml
//! [clock]
//! utc_offset_minutes = -360
//!
//! [cycle]
//! deadline_offset_days = 10
//! deadline_hour = 10
//!
//! [credit_note]
//! tolerance = "0.05"
//!
//! [pronto_pago]
//! fee_rate = "0.02"
//!
//! [backend]
//! base_url = "https://portal.example.mx"
//! timeout_secs = 30
//! ```

use std::path::Path;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::deadline::{CyclePolicy, DeadlineCalculator};
use super::error::PortalError;
use super::lateness::LatenessClassifier;
use super::week::{MEXICO_CITY_OFFSET_MINUTES, WeekClock};

/// Top-level configuration. Every section falls back to its defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    pub clock: ClockConfig,
    pub cycle: CyclePolicy,
    pub credit_note: CreditNoteConfig,
    pub pronto_pago: ProntoPagoConfig,
    pub backend: BackendConfig,
}

/// Civil timezone of the issuing jurisdiction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockConfig {
    /// Minutes east of UTC (Mexico City: -360).
    pub utc_offset_minutes: i32,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            utc_offset_minutes: MEXICO_CITY_OFFSET_MINUTES,
        }
    }
}

/// Credit-note matching parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CreditNoteConfig {
    /// Symmetric relative band around the expected fee (0.05 = ±5%).
    pub tolerance: Decimal,
}

impl Default for CreditNoteConfig {
    fn default() -> Self {
        Self {
            tolerance: dec!(0.05),
        }
    }
}

/// Early-payment program terms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProntoPagoConfig {
    /// Fraction of the invoice total charged for early payment.
    pub fee_rate: Decimal,
}

impl Default for ProntoPagoConfig {
    fn default() -> Self {
        Self {
            fee_rate: dec!(0.02),
        }
    }
}

/// Portal backend endpoint used by the HTTP collaborators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub base_url: Option<String>,
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_secs: 30,
        }
    }
}

impl PortalConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self, PortalError> {
        let cfg: Self = toml::from_str(s).map_err(|e| PortalError::Config(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load from disk; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, PortalError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "config file missing, using defaults");
            return Ok(Self::default());
        }
        let s = std::fs::read_to_string(path)
            .map_err(|e| PortalError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&s)
    }

    pub fn validate(&self) -> Result<(), PortalError> {
        WeekClock::from_offset_minutes(self.clock.utc_offset_minutes)?;
        self.cycle.validate()?;
        if self.credit_note.tolerance < Decimal::ZERO || self.credit_note.tolerance >= Decimal::ONE {
            return Err(PortalError::Config(format!(
                "credit_note.tolerance {} must be in [0, 1)",
                self.credit_note.tolerance
            )));
        }
        if self.pronto_pago.fee_rate <= Decimal::ZERO || self.pronto_pago.fee_rate >= Decimal::ONE {
            return Err(PortalError::Config(format!(
                "pronto_pago.fee_rate {} must be in (0, 1)",
                self.pronto_pago.fee_rate
            )));
        }
        if self.backend.timeout_secs == 0 {
            return Err(PortalError::Config("backend.timeout_secs must be positive".into()));
        }
        Ok(())
    }

    pub fn week_clock(&self) -> Result<WeekClock, PortalError> {
        WeekClock::from_offset_minutes(self.clock.utc_offset_minutes)
    }

    pub fn deadline_calculator(&self) -> Result<DeadlineCalculator, PortalError> {
        Ok(DeadlineCalculator::new(self.week_clock()?, self.cycle))
    }

    pub fn lateness_classifier(&self) -> Result<LatenessClassifier, PortalError> {
        Ok(LatenessClassifier::new(self.deadline_calculator()?))
    }
}
