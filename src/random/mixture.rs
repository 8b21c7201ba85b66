use super::RandomVariable;
use crate::error::{Error, Result};
use rand::Rng;
use rand_distr::{Distribution, Open01};

/// One alternative of a mixture, with the cumulative weight up to and including it
#[derive(Debug, Clone)]
pub struct MixtureComponent {
    pub cumulative_weight: f64,
    pub variable: RandomVariable,
}

/// A discrete mixture of random variables.
///
/// The weights are given as a CDF over the alternatives: a sample first draws `u ~ U(0,1)`,
/// picks the first component whose cumulative weight is at least `u`, and returns a sample
/// of that component.
#[derive(Debug, Clone)]
pub struct MixtureRandomVariable {
    components: Vec<MixtureComponent>,
}

impl MixtureRandomVariable {
    pub fn new(weights_cdf: Vec<f64>, variables: Vec<RandomVariable>) -> Result<Self> {
        let mut mixture = MixtureRandomVariable { components: vec![] };
        mixture.set_rvs(weights_cdf, variables)?;
        Ok(mixture)
    }

    /// Replace all the components at once. On error, the mixture is left untouched.
    pub fn set_rvs(&mut self, weights_cdf: Vec<f64>, variables: Vec<RandomVariable>) -> Result<()> {
        if weights_cdf.len() != variables.len() {
            return Err(Error::InvalidMixture(format!(
                "CDF of weights and random variables must have the same size ({} != {})",
                weights_cdf.len(),
                variables.len()
            )));
        }
        if weights_cdf.is_empty() {
            return Err(Error::InvalidMixture("no component".to_string()));
        }
        if let Some(w) = weights_cdf
            .iter()
            .find(|w| !w.is_finite() || **w < 0.0 || **w > 1.0)
        {
            return Err(Error::InvalidMixture(format!(
                "weight {w} is not a probability"
            )));
        }
        if let Some(pair) = weights_cdf.windows(2).find(|pair| pair[1] < pair[0]) {
            return Err(Error::InvalidMixture(format!(
                "weights must be non-decreasing, found {} after {}",
                pair[1], pair[0]
            )));
        }
        let last = weights_cdf[weights_cdf.len() - 1];
        if last != 1.0 {
            return Err(Error::InvalidMixture(format!(
                "the last cumulative weight must be 1.0, instead: {last}"
            )));
        }

        self.components = weights_cdf
            .into_iter()
            .zip(variables)
            .map(|(cumulative_weight, variable)| MixtureComponent {
                cumulative_weight,
                variable,
            })
            .collect();
        Ok(())
    }

    pub fn components(&self) -> &[MixtureComponent] {
        &self.components
    }

    /// Index of the first component whose cumulative weight is at least `u`
    pub fn select(&self, u: f64) -> usize {
        self.components
            .partition_point(|c| c.cumulative_weight < u)
            .min(self.components.len() - 1)
    }
}

impl Distribution<f64> for MixtureRandomVariable {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        let u: f64 = rng.sample(Open01);
        self.components[self.select(u)].variable.sample(rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::RandomStream;

    fn constants(n: usize) -> Vec<RandomVariable> {
        (0..n).map(|i| RandomVariable::constant(i as f64)).collect()
    }

    #[test]
    fn test_invalid_weights() {
        assert!(MixtureRandomVariable::new(vec![0.5, 1.0], constants(3)).is_err());
        assert!(MixtureRandomVariable::new(vec![], vec![]).is_err());
        assert!(MixtureRandomVariable::new(vec![0.6, 0.4, 1.0], constants(3)).is_err());
        assert!(MixtureRandomVariable::new(vec![0.2, 0.9], constants(2)).is_err());
        assert!(MixtureRandomVariable::new(vec![-0.1, 1.0], constants(2)).is_err());
        assert!(MixtureRandomVariable::new(vec![f64::NAN, 1.0], constants(2)).is_err());
    }

    #[test]
    fn test_failed_update_keeps_components() {
        let mut m = MixtureRandomVariable::new(vec![0.5, 1.0], constants(2)).unwrap();
        assert!(m.set_rvs(vec![0.5], constants(2)).is_err());
        assert_eq!(m.components().len(), 2);
    }

    #[test]
    fn test_select_boundaries() {
        let m = MixtureRandomVariable::new(vec![0.25, 0.25, 0.75, 1.0], constants(4)).unwrap();
        assert_eq!(m.select(0.1), 0);
        // ties go to the first component reaching the boundary
        assert_eq!(m.select(0.25), 0);
        assert_eq!(m.select(0.2500001), 2);
        assert_eq!(m.select(0.75), 2);
        assert_eq!(m.select(0.9), 3);
        assert_eq!(m.select(1.0), 3);
    }

    #[test]
    fn test_single_component() {
        let m = MixtureRandomVariable::new(vec![1.0], vec![RandomVariable::constant(7.0)]).unwrap();
        let mut rng = RandomStream::new(3, 3);
        for _ in 0..100 {
            assert_eq!(m.sample(&mut rng), 7.0);
        }
    }

    #[test]
    fn test_selection_frequencies() {
        let cdf = vec![0.1, 0.4, 0.4, 1.0];
        let expected = [0.1, 0.3, 0.0, 0.6];
        let m = MixtureRandomVariable::new(cdf, constants(4)).unwrap();
        let mut rng = RandomStream::new(11, 0);
        let n = 100_000;
        let mut counts = [0usize; 4];
        for _ in 0..n {
            counts[m.sample(&mut rng) as usize] += 1;
        }
        for (count, p) in counts.iter().zip(expected) {
            let freq = *count as f64 / n as f64;
            assert!((freq - p).abs() < 0.01, "{freq} vs {p}");
        }
        assert_eq!(counts[2], 0);
    }
}
