//! Fractional Brownian motion over any `[0, 1]` point sampler.
//!
//! Octave `i` samples at frequency `2^i` with amplitude `persistence^i`; the
//! sum is divided by the total amplitude so the result stays in `[0, 1]`
//! whatever the octave count. One octave is the raw sample, bit for bit.
use noise::NoiseFn;

/// Sum of `persistence^i` for `i` in `0..octaves`.
pub fn amplitude_sum(octaves: u32, persistence: f64) -> f64 {
    let mut sum = 0.0;
    let mut amplitude = 1.0;
    for _ in 0..octaves {
        sum += amplitude;
        amplitude *= persistence;
    }
    sum
}

/// Accumulate `sample(frequency)` over `octaves`, normalized by the
/// amplitude total.
///
/// # Panics
/// If `octaves == 0` or `persistence` is negative or not finite.
pub fn accumulate(octaves: u32, persistence: f64, mut sample: impl FnMut(f64) -> f64) -> f64 {
    assert_params(octaves, persistence);
    let mut total = 0.0;
    let mut frequency = 1.0;
    let mut amplitude = 1.0;
    let mut max_value = 0.0;
    for _ in 0..octaves {
        total += amplitude * sample(frequency);
        max_value += amplitude;
        amplitude *= persistence;
        frequency *= 2.0;
    }
    // Persistence 0 past the first octave still leaves max_value = 1.
    total / max_value
}

fn assert_params(octaves: u32, persistence: f64) {
    assert!(octaves >= 1, "octave count must be at least 1");
    assert!(
        persistence.is_finite() && persistence >= 0.0,
        "persistence must be finite and non-negative, got {persistence}"
    );
}

/// Multi-octave wrapper around a single-octave sampler.
#[derive(Debug, Clone)]
pub struct Fbm<S> {
    source: S,
    octaves: u32,
    persistence: f64,
}

impl<S> Fbm<S> {
    /// # Panics
    /// If `octaves == 0` or `persistence` is negative or not finite.
    pub fn new(source: S, octaves: u32, persistence: f64) -> Self {
        assert_params(octaves, persistence);
        Self { source, octaves, persistence }
    }

    pub fn octaves(&self) -> u32 {
        self.octaves
    }

    pub fn persistence(&self) -> f64 {
        self.persistence
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Normalizing denominator used by every sample.
    pub fn amplitude_sum(&self) -> f64 {
        amplitude_sum(self.octaves, self.persistence)
    }
}

impl<S: NoiseFn<f64, 2>> NoiseFn<f64, 2> for Fbm<S> {
    fn get(&self, point: [f64; 2]) -> f64 {
        accumulate(self.octaves, self.persistence, |f| {
            self.source.get([point[0] * f, point[1] * f])
        })
    }
}

impl<S: NoiseFn<f64, 3>> NoiseFn<f64, 3> for Fbm<S> {
    fn get(&self, point: [f64; 3]) -> f64 {
        accumulate(self.octaves, self.persistence, |f| {
            self.source.get([point[0] * f, point[1] * f, point[2] * f])
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Returns the x coordinate, so each octave reports its frequency.
    struct Probe;

    impl NoiseFn<f64, 2> for Probe {
        fn get(&self, point: [f64; 2]) -> f64 {
            point[0]
        }
    }

    impl NoiseFn<f64, 3> for Probe {
        fn get(&self, point: [f64; 3]) -> f64 {
            point[2]
        }
    }

    #[test]
    fn amplitude_sum_matches_geometric_series() {
        assert_relative_eq!(amplitude_sum(3, 0.5), 1.75);
        assert_relative_eq!(amplitude_sum(1, 0.3), 1.0);
        assert_relative_eq!(amplitude_sum(4, 1.0), 4.0);
    }

    #[test]
    fn frequencies_double_and_amplitudes_decay() {
        // x = 1 → octave samples 1, 2, 4 weighted 1, 0.5, 0.25.
        let fbm = Fbm::new(Probe, 3, 0.5);
        assert_relative_eq!(fbm.get([1.0, 0.0]), (1.0 + 1.0 + 1.0) / 1.75);
        assert_relative_eq!(fbm.get([0.0, 0.0, 2.0]), (2.0 + 2.0 + 2.0) / 1.75);
    }

    #[test]
    fn one_octave_is_identity() {
        let fbm = Fbm::new(Probe, 1, 0.8);
        for x in [0.0, 0.123_456_789, 0.5, 0.999_999] {
            assert_eq!(fbm.get([x, 0.3]), x);
        }
    }

    #[test]
    fn constant_source_is_preserved() {
        let constant = noise::Constant::new(0.4);
        let fbm = Fbm::new(constant, 5, 0.6);
        assert_relative_eq!(NoiseFn::<f64, 3>::get(&fbm, [1.0, 2.0, 3.0]), 0.4, epsilon = 1e-12);
    }

    #[test]
    #[should_panic(expected = "octave count")]
    fn zero_octaves_panics() {
        Fbm::new(Probe, 0, 0.5);
    }

    #[test]
    #[should_panic(expected = "persistence must be finite")]
    fn nan_persistence_panics() {
        accumulate(2, f64::NAN, |_| 0.0);
    }

    #[test]
    #[should_panic(expected = "non-negative")]
    fn negative_persistence_panics() {
        // Amplitudes 1 and -1 would sum to zero.
        accumulate(2, -1.0, |_| 0.5);
    }

    #[test]
    fn zero_persistence_keeps_first_octave() {
        assert_relative_eq!(accumulate(4, 0.0, |f| f), 1.0);
    }
}
