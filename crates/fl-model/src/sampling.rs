//! Sampling of reconstructed frozen distributions.

use rand::Rng;

use fl_types::FrozenDistribution;

use crate::catalog::{LOG_UNIFORM, RAND_INT, UNIFORM};

/// Draw concrete values from a frozen distribution.
pub trait SampleDistribution {
    /// One draw, clamped to `[lower, upper]`; `None` when the identity is
    /// unknown or the bounds are not sampleable.
    fn sample<R: Rng>(&self, rng: &mut R) -> Option<f64>;
}

impl SampleDistribution for FrozenDistribution {
    fn sample<R: Rng>(&self, rng: &mut R) -> Option<f64> {
        if !self.lower.is_finite() || !self.upper.is_finite() || self.lower > self.upper {
            return None;
        }
        let value = match self.identity.as_str() {
            UNIFORM => rng.gen_range(self.lower..=self.upper),
            LOG_UNIFORM => {
                if self.lower <= 0.0 {
                    return None;
                }
                let (log_low, log_high) = (self.lower.ln(), self.upper.ln());
                rng.gen_range(log_low..=log_high).exp()
            }
            RAND_INT => {
                let (low, high) = (self.lower as i64, self.upper as i64);
                if high <= low {
                    low as f64
                } else {
                    rng.gen_range(low..high) as f64
                }
            }
            _ => return None,
        };
        Some(value.clamp(self.lower, self.upper))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{log_uniform, rand_int, uniform};
    use indexmap::IndexMap;

    #[test]
    fn uniform_draws_stay_in_bounds() {
        let dist = uniform(0.25, 0.75);
        let mut rng = rand::thread_rng();
        for _ in 0..100 {
            let value = dist.sample(&mut rng).unwrap();
            assert!((0.25..=0.75).contains(&value));
        }
    }

    #[test]
    fn log_uniform_requires_positive_bounds() {
        let mut rng = rand::thread_rng();
        assert!(log_uniform(0.0, 1.0).sample(&mut rng).is_none());

        let value = log_uniform(1e-4, 1e2).sample(&mut rng).unwrap();
        assert!((1e-4..=1e2).contains(&value));
    }

    #[test]
    fn rand_int_draws_integers() {
        let dist = rand_int(2, 9);
        let mut rng = rand::thread_rng();
        for _ in 0..50 {
            let value = dist.sample(&mut rng).unwrap();
            assert_eq!(value, value.trunc());
            assert!((2.0..9.0).contains(&value));
        }
    }

    #[test]
    fn unknown_identity_is_not_sampleable() {
        let dist = FrozenDistribution {
            identity: "mlcraft.random.Zipf".to_string(),
            lower: 0.0,
            upper: 1.0,
            args: vec![],
            kwargs: IndexMap::new(),
        };
        assert!(dist.sample(&mut rand::thread_rng()).is_none());
    }
}
