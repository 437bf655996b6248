use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Pause between rounds. Carries no correctness obligation.
///
/// A positive `random_max_secs` wins: each pause is drawn uniformly from
/// `[0, random_max_secs)`. Otherwise every pause is `fixed_secs`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Pacing {
    pub fixed_secs:      f64,
    pub random_max_secs: f64,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            fixed_secs:      3.0,
            random_max_secs: 5.0,
        }
    }
}

impl Pacing {
    pub fn none() -> Self {
        Self {
            fixed_secs:      0.0,
            random_max_secs: 0.0,
        }
    }

    pub fn fixed(secs: f64) -> Self {
        Self {
            fixed_secs:      secs,
            random_max_secs: 0.0,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        seconds("pacing.fixed_secs", self.fixed_secs)?;
        seconds("pacing.random_max_secs", self.random_max_secs)
    }

    /// A non-finite `random_max_secs` falls back to `fixed_secs`.
    pub fn next_delay<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        let secs = if self.random_max_secs > 0.0 && self.random_max_secs.is_finite() {
            rng.gen_range(0.0..self.random_max_secs)
        } else {
            self.fixed_secs
        };
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::ZERO)
    }
}

pub(crate) fn seconds(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidSeconds { field, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn random_wins_when_positive() {
        let mut rng = StdRng::seed_from_u64(7);
        let pacing = Pacing {
            fixed_secs:      100.0,
            random_max_secs: 0.5,
        };
        for _ in 0..100 {
            assert!(pacing.next_delay(&mut rng) < Duration::from_millis(500));
        }
    }

    #[test]
    fn fixed_and_none() {
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(Pacing::fixed(1.5).next_delay(&mut rng), Duration::from_millis(1500));
        assert_eq!(Pacing::none().next_delay(&mut rng), Duration::ZERO);
        assert_eq!(Pacing::fixed(-3.0).next_delay(&mut rng), Duration::ZERO);
    }

    #[test]
    fn infinite_random_bound_does_not_panic() {
        let mut rng = StdRng::seed_from_u64(7);
        let pacing = Pacing {
            fixed_secs:      0.25,
            random_max_secs: f64::INFINITY,
        };
        assert_eq!(pacing.next_delay(&mut rng), Duration::from_millis(250));
        assert!(pacing.validate().is_err());
    }

    #[test]
    fn validate_rejects_negative_and_nan() {
        assert!(Pacing::default().validate().is_ok());
        assert!(Pacing::fixed(-1.0).validate().is_err());
        let nan = Pacing {
            fixed_secs:      0.0,
            random_max_secs: f64::NAN,
        };
        assert!(matches!(
            nan.validate(),
            Err(ConfigError::InvalidSeconds { field: "pacing.random_max_secs", .. })
        ));
    }
}
