use crate::generator::BurstGenerator;
use crate::random::{RandomVariable, RandomVariableStream};
use crate::structs::*;

/// Default period between bursts [s]
pub const DEFAULT_PERIOD: f64 = 1.0;
/// Default burst size [B]
pub const DEFAULT_BURST_SIZE: f64 = 1e6;

/// A generator without limits on the number of bursts, with independent distributions for
/// the burst size and the period
#[derive(Debug, Clone)]
pub struct SimpleBurstGenerator {
    burst_size: RandomVariableStream,
    period: RandomVariableStream,
}

impl Default for SimpleBurstGenerator {
    fn default() -> Self {
        SimpleBurstGenerator::new(
            RandomVariable::constant(DEFAULT_BURST_SIZE),
            RandomVariable::constant(DEFAULT_PERIOD),
        )
    }
}

impl SimpleBurstGenerator {
    pub fn new(burst_size: RandomVariable, period: RandomVariable) -> Self {
        SimpleBurstGenerator {
            burst_size: RandomVariableStream::new(burst_size),
            period: RandomVariableStream::new(period),
        }
    }

    /// Replace the burst size distribution, keeping its stream
    pub fn set_burst_size(&mut self, variable: RandomVariable) {
        self.burst_size = RandomVariableStream::with_stream(
            variable,
            self.burst_size.seed(),
            self.burst_size.stream(),
        );
    }

    /// Replace the period distribution [s], keeping its stream
    pub fn set_period(&mut self, variable: RandomVariable) {
        self.period =
            RandomVariableStream::with_stream(variable, self.period.seed(), self.period.stream());
    }

    pub fn burst_size(&self) -> &RandomVariable {
        self.burst_size.variable()
    }

    pub fn period(&self) -> &RandomVariable {
        self.period.variable()
    }
}

impl BurstGenerator for SimpleBurstGenerator {
    fn has_next_burst(&self) -> bool {
        true
    }

    fn generate_burst(&mut self) -> Burst {
        let size = self.burst_size.integer();
        let period = period_from_secs(self.period.value());
        log::debug!("Burst size: {size} B, period: {period:?}");
        Burst::new(size, period)
    }

    fn assign_streams(&mut self, seed: u64, stream: u64) -> u64 {
        self.burst_size.set_stream(seed, stream);
        self.period.set_stream(seed, stream + 1);
        2
    }
}
