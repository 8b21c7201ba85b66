//! Stream-indexed random sources and the random variables used by the burst models.
//!
//! Every random draw of the crate comes from a [`RandomStream`], identified by a seed and a
//! stream index. Given the same seed and the same stream assignment, two runs produce
//! exactly the same values, whatever the number of generators or their construction order.

use crate::error::{Error, Result};
use rand::Rng;
use rand_core::{impls, RngCore};
use rand_distr::{Distribution, Exp, Normal, Open01, Uniform};
use rand_pcg::Pcg32;

mod mixture;
pub use mixture::{MixtureComponent, MixtureRandomVariable};

/// Seed used by random variables whose stream has not been assigned
pub const DEFAULT_SEED: u64 = 1;

fn splitmix64(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9e3779b97f4a7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58476d1ce4e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d049bb133111eb);
    z ^ (z >> 31)
}

/// An independent, reproducible sub-stream of a seeded PCG generator
#[derive(Debug, Clone)]
pub struct RandomStream {
    seed: u64,
    stream: u64,
    rng: Pcg32,
}

impl RandomStream {
    pub fn new(seed: u64, stream: u64) -> Self {
        // PCG natively supports streams through its increment; the state is also mixed so that
        // neighbouring streams do not start from the same point
        let state = splitmix64(seed ^ splitmix64(stream));
        RandomStream {
            seed,
            stream,
            rng: Pcg32::new(state, stream),
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn stream(&self) -> u64 {
        self.stream
    }
}

impl Default for RandomStream {
    fn default() -> Self {
        RandomStream::new(DEFAULT_SEED, 0)
    }
}

impl RngCore for RandomStream {
    fn next_u32(&mut self) -> u32 {
        self.rng.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.rng.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        impls::fill_bytes_via_next(self, dest)
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> std::result::Result<(), rand_core::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

/// Draw until the value lies within `bound` of `center`. A zero bound can only return the
/// center itself.
fn sample_within<R: Rng + ?Sized>(
    rng: &mut R,
    center: f64,
    bound: f64,
    draw: impl Fn(&mut R) -> f64,
) -> f64 {
    if bound <= 0.0 {
        return center;
    }
    loop {
        let x = draw(rng);
        if (x - center).abs() <= bound {
            return x;
        }
    }
}

fn check_bound(bound: f64) -> Result<()> {
    if bound.is_nan() || bound < 0.0 {
        return Err(Error::InvalidConfig(format!(
            "bound must be non-negative, instead: {bound}"
        )));
    }
    Ok(())
}

fn check_center(name: &str, center: f64) -> Result<()> {
    if !center.is_finite() {
        return Err(Error::InvalidConfig(format!(
            "{name} must be finite, instead: {center}"
        )));
    }
    Ok(())
}

fn check_scale(name: &str, scale: f64) -> Result<()> {
    if !scale.is_finite() || scale < 0.0 {
        return Err(Error::InvalidConfig(format!(
            "{name} must be finite and non-negative, instead: {scale}"
        )));
    }
    Ok(())
}

/// Normal distribution restricted to `[mean - bound, mean + bound]` by resampling
#[derive(Debug, Clone)]
pub struct BoundedNormal {
    mean: f64,
    std_dev: f64,
    bound: f64,
    normal: Normal<f64>,
}

impl BoundedNormal {
    pub fn new(mean: f64, std_dev: f64, bound: f64) -> Result<Self> {
        check_center("normal mean", mean)?;
        check_scale("standard deviation", std_dev)?;
        check_bound(bound)?;
        let normal = Normal::new(mean, std_dev)
            .map_err(|e| Error::InvalidConfig(format!("normal({mean}, {std_dev}): {e}")))?;
        Ok(BoundedNormal {
            mean,
            std_dev,
            bound,
            normal,
        })
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    pub fn std_dev(&self) -> f64 {
        self.std_dev
    }

    pub fn bound(&self) -> f64 {
        self.bound
    }
}

impl Distribution<f64> for BoundedNormal {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        sample_within(rng, self.mean, self.bound, |rng| self.normal.sample(rng))
    }
}

/// Laplace distribution restricted to `[location - bound, location + bound]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Laplace {
    location: f64,
    scale: f64,
    bound: f64,
}

impl Laplace {
    pub fn new(location: f64, scale: f64, bound: f64) -> Result<Self> {
        check_center("Laplace location", location)?;
        check_scale("Laplace scale", scale)?;
        check_bound(bound)?;
        Ok(Laplace {
            location,
            scale,
            bound,
        })
    }

    pub fn location(&self) -> f64 {
        self.location
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }
}

impl Distribution<f64> for Laplace {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        sample_within(rng, self.location, self.bound, |rng| {
            // inverse CDF on an open interval, so that the log never sees 0
            let v: f64 = rng.sample(Open01);
            let u = v - 0.5;
            self.location - self.scale * u.signum() * (1.0 - 2.0 * u.abs()).ln()
        })
    }
}

/// Logistic distribution restricted to `[location - bound, location + bound]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Logistic {
    location: f64,
    scale: f64,
    bound: f64,
}

impl Logistic {
    pub fn new(location: f64, scale: f64, bound: f64) -> Result<Self> {
        check_center("logistic location", location)?;
        check_scale("logistic scale", scale)?;
        check_bound(bound)?;
        Ok(Logistic {
            location,
            scale,
            bound,
        })
    }

    pub fn location(&self) -> f64 {
        self.location
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }
}

impl Distribution<f64> for Logistic {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        sample_within(rng, self.location, self.bound, |rng| {
            let v: f64 = rng.sample(Open01);
            self.location + self.scale * (v / (1.0 - v)).ln()
        })
    }
}

/// Exponential distribution whose values are capped at `bound` by resampling
#[derive(Debug, Clone)]
pub struct BoundedExp {
    mean: f64,
    bound: f64,
    exp: Exp<f64>,
}

impl BoundedExp {
    pub fn new(mean: f64, bound: f64) -> Result<Self> {
        if !mean.is_finite() || mean <= 0.0 {
            return Err(Error::InvalidConfig(format!(
                "exponential mean must be positive, instead: {mean}"
            )));
        }
        if bound.is_nan() || bound <= 0.0 {
            return Err(Error::InvalidConfig(format!(
                "exponential bound must be positive, instead: {bound}"
            )));
        }
        let exp = Exp::new(1.0 / mean)
            .map_err(|e| Error::InvalidConfig(format!("exponential({mean}): {e}")))?;
        Ok(BoundedExp { mean, bound, exp })
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }
}

impl Distribution<f64> for BoundedExp {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        loop {
            let x = self.exp.sample(rng);
            if x <= self.bound {
                return x;
            }
        }
    }
}

/// The random variables available to the burst models
#[derive(Debug, Clone)]
pub enum RandomVariable {
    Constant(f64),
    Uniform(Uniform<f64>),
    Exponential(BoundedExp),
    Normal(BoundedNormal),
    Laplace(Laplace),
    Logistic(Logistic),
    Mixture(MixtureRandomVariable),
}

impl RandomVariable {
    pub fn constant(value: f64) -> Self {
        RandomVariable::Constant(value)
    }

    /// A constant read from a configuration, which must be finite
    pub fn checked_constant(value: f64) -> Result<Self> {
        check_center("constant", value)?;
        Ok(RandomVariable::Constant(value))
    }

    pub fn uniform(min: f64, max: f64) -> Result<Self> {
        if !(min.is_finite() && max.is_finite() && min < max) {
            return Err(Error::InvalidConfig(format!(
                "uniform requires min < max, instead: [{min}, {max})"
            )));
        }
        Ok(RandomVariable::Uniform(Uniform::new(min, max)))
    }

    pub fn exponential(mean: f64, bound: Option<f64>) -> Result<Self> {
        Ok(RandomVariable::Exponential(BoundedExp::new(
            mean,
            bound.unwrap_or(f64::INFINITY),
        )?))
    }

    pub fn normal(mean: f64, std_dev: f64, bound: Option<f64>) -> Result<Self> {
        Ok(RandomVariable::Normal(BoundedNormal::new(
            mean,
            std_dev,
            bound.unwrap_or(f64::INFINITY),
        )?))
    }

    pub fn laplace(location: f64, scale: f64, bound: Option<f64>) -> Result<Self> {
        Ok(RandomVariable::Laplace(Laplace::new(
            location,
            scale,
            bound.unwrap_or(f64::INFINITY),
        )?))
    }

    pub fn logistic(location: f64, scale: f64, bound: Option<f64>) -> Result<Self> {
        Ok(RandomVariable::Logistic(Logistic::new(
            location,
            scale,
            bound.unwrap_or(f64::INFINITY),
        )?))
    }
}

impl Distribution<f64> for RandomVariable {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match self {
            RandomVariable::Constant(c) => *c,
            RandomVariable::Uniform(d) => d.sample(rng),
            RandomVariable::Exponential(d) => d.sample(rng),
            RandomVariable::Normal(d) => d.sample(rng),
            RandomVariable::Laplace(d) => d.sample(rng),
            RandomVariable::Logistic(d) => d.sample(rng),
            RandomVariable::Mixture(d) => d.sample(rng),
        }
    }
}

impl From<MixtureRandomVariable> for RandomVariable {
    fn from(m: MixtureRandomVariable) -> Self {
        RandomVariable::Mixture(m)
    }
}

/// A random variable bound to its own random stream
#[derive(Debug, Clone)]
pub struct RandomVariableStream {
    variable: RandomVariable,
    rng: RandomStream,
}

impl RandomVariableStream {
    pub fn new(variable: RandomVariable) -> Self {
        RandomVariableStream {
            variable,
            rng: RandomStream::default(),
        }
    }

    pub fn with_stream(variable: RandomVariable, seed: u64, stream: u64) -> Self {
        RandomVariableStream {
            variable,
            rng: RandomStream::new(seed, stream),
        }
    }

    /// Restart the variable on another stream
    pub fn set_stream(&mut self, seed: u64, stream: u64) {
        self.rng = RandomStream::new(seed, stream);
    }

    pub fn stream(&self) -> u64 {
        self.rng.stream()
    }

    pub fn seed(&self) -> u64 {
        self.rng.seed()
    }

    pub fn variable(&self) -> &RandomVariable {
        &self.variable
    }

    pub fn value(&mut self) -> f64 {
        self.variable.sample(&mut self.rng)
    }

    /// Next value truncated to an unsigned integer.
    ///
    /// # Panics
    ///
    /// Panics if the value is not a non-negative 32-bit integer once truncated.
    pub fn integer(&mut self) -> u32 {
        let value = self.value();
        assert!(
            value.is_finite() && (0.0..=u32::MAX as f64).contains(&value.trunc()),
            "Burst size must be a non-negative 32-bit integer, instead found size={value}"
        );
        value as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draw(v: &mut RandomVariableStream, n: usize) -> Vec<f64> {
        (0..n).map(|_| v.value()).collect()
    }

    #[test]
    fn test_same_stream_same_values() {
        let rv = RandomVariable::normal(10.0, 3.0, None).unwrap();
        let mut a = RandomVariableStream::with_stream(rv.clone(), 42, 7);
        let mut b = RandomVariableStream::with_stream(rv, 42, 7);
        assert_eq!(draw(&mut a, 100), draw(&mut b, 100));
    }

    #[test]
    fn test_streams_are_distinct() {
        let rv = RandomVariable::uniform(0.0, 1.0).unwrap();
        let mut a = RandomVariableStream::with_stream(rv.clone(), 42, 7);
        let mut b = RandomVariableStream::with_stream(rv.clone(), 42, 8);
        let mut c = RandomVariableStream::with_stream(rv, 43, 7);
        let va = draw(&mut a, 50);
        assert_ne!(va, draw(&mut b, 50));
        assert_ne!(va, draw(&mut c, 50));
    }

    #[test]
    fn test_constant() {
        let mut v = RandomVariableStream::new(RandomVariable::constant(1e6));
        for _ in 0..10 {
            assert_eq!(v.integer(), 1_000_000);
        }
    }

    #[test]
    fn test_bounded_normal_stays_in_bounds() {
        let rv = RandomVariable::normal(100.0, 80.0, Some(100.0)).unwrap();
        let mut v = RandomVariableStream::with_stream(rv, 1, 3);
        for x in draw(&mut v, 10_000) {
            assert!((0.0..=200.0).contains(&x), "{x}");
        }
    }

    #[test]
    fn test_zero_bound_returns_center() {
        let rv = RandomVariable::laplace(0.5, 1.0, Some(0.0)).unwrap();
        let mut v = RandomVariableStream::new(rv);
        assert_eq!(v.value(), 0.5);
    }

    #[test]
    fn test_laplace_and_logistic_are_centered() {
        let n = 20_000;
        for rv in [
            RandomVariable::laplace(2.0, 0.5, Some(2.0)).unwrap(),
            RandomVariable::logistic(2.0, 0.5, Some(2.0)).unwrap(),
        ] {
            let mut v = RandomVariableStream::with_stream(rv, 5, 0);
            let values = draw(&mut v, n);
            assert!(values.iter().all(|x| (0.0..=4.0).contains(x)));
            let mean = values.iter().sum::<f64>() / n as f64;
            assert!((mean - 2.0).abs() < 0.05, "mean {mean}");
        }
    }

    #[test]
    fn test_exponential_bound() {
        let rv = RandomVariable::exponential(1.0, Some(0.5)).unwrap();
        let mut v = RandomVariableStream::with_stream(rv, 9, 1);
        assert!(draw(&mut v, 1000).iter().all(|x| (0.0..=0.5).contains(x)));
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(RandomVariable::uniform(1.0, 1.0).is_err());
        assert!(RandomVariable::normal(0.0, -1.0, None).is_err());
        assert!(RandomVariable::laplace(0.0, 1.0, Some(-1.0)).is_err());
        assert!(RandomVariable::exponential(0.0, None).is_err());
        assert!(RandomVariable::normal(f64::NAN, 1.0, Some(10.0)).is_err());
        assert!(RandomVariable::normal(f64::INFINITY, 1.0, None).is_err());
        assert!(RandomVariable::laplace(f64::NAN, 1.0, Some(1.0)).is_err());
        assert!(RandomVariable::logistic(f64::NEG_INFINITY, 1.0, None).is_err());
        assert!(RandomVariable::checked_constant(f64::NAN).is_err());
        assert!(RandomVariable::checked_constant(f64::INFINITY).is_err());
        assert!(RandomVariable::checked_constant(1e6).is_ok());
    }

    #[test]
    fn test_integer_truncates() {
        let mut v = RandomVariableStream::new(RandomVariable::constant(1499.9));
        assert_eq!(v.integer(), 1499);
        let mut v = RandomVariableStream::new(RandomVariable::constant(u32::MAX as f64 + 0.5));
        assert_eq!(v.integer(), u32::MAX);
        let mut v = RandomVariableStream::new(RandomVariable::constant(-0.5));
        assert_eq!(v.integer(), 0);
    }

    #[test]
    #[should_panic(expected = "Burst size must be a non-negative 32-bit integer")]
    fn test_negative_integer_aborts() {
        RandomVariableStream::new(RandomVariable::constant(-1.0)).integer();
    }

    #[test]
    #[should_panic(expected = "Burst size must be a non-negative 32-bit integer")]
    fn test_nan_integer_aborts() {
        RandomVariableStream::new(RandomVariable::constant(f64::NAN)).integer();
    }

    #[test]
    #[should_panic(expected = "Burst size must be a non-negative 32-bit integer")]
    fn test_oversized_integer_aborts() {
        RandomVariableStream::new(RandomVariable::constant(5e9)).integer();
    }
}
