use crate::structs::Burst;

pub mod simple;
pub mod trace;
pub mod vr;

pub use simple::SimpleBurstGenerator;
pub use trace::TraceFileBurstGenerator;
pub use vr::{VrApp, VrBurstGenerator};

/// A source of bursts.
///
/// The caller must check `has_next_burst` before every call to `generate_burst`.
pub trait BurstGenerator {
    /// Whether another burst can be generated
    fn has_next_burst(&self) -> bool;

    /// Generate the next burst: its size and the time before the next burst.
    ///
    /// # Panics
    ///
    /// Panics if the model yields a negative period, or if there is no next burst.
    fn generate_burst(&mut self) -> Burst;

    /// Assign consecutive stream indices, starting at `stream`, to the random variables of
    /// the generator. Returns the number of indices used.
    fn assign_streams(&mut self, seed: u64, stream: u64) -> u64;
}

/// The available burst generators
#[derive(Debug, Clone)]
pub enum Generator {
    Simple(SimpleBurstGenerator),
    TraceFile(TraceFileBurstGenerator),
    Vr(VrBurstGenerator),
}

impl Generator {
    pub fn kind(&self) -> &'static str {
        match self {
            Generator::Simple(_) => "simple",
            Generator::TraceFile(_) => "trace",
            Generator::Vr(_) => "vr",
        }
    }
}

impl BurstGenerator for Generator {
    fn has_next_burst(&self) -> bool {
        match self {
            Generator::Simple(g) => g.has_next_burst(),
            Generator::TraceFile(g) => g.has_next_burst(),
            Generator::Vr(g) => g.has_next_burst(),
        }
    }

    fn generate_burst(&mut self) -> Burst {
        match self {
            Generator::Simple(g) => g.generate_burst(),
            Generator::TraceFile(g) => g.generate_burst(),
            Generator::Vr(g) => g.generate_burst(),
        }
    }

    fn assign_streams(&mut self, seed: u64, stream: u64) -> u64 {
        match self {
            Generator::Simple(g) => g.assign_streams(seed, stream),
            Generator::TraceFile(g) => g.assign_streams(seed, stream),
            Generator::Vr(g) => g.assign_streams(seed, stream),
        }
    }
}

impl From<SimpleBurstGenerator> for Generator {
    fn from(g: SimpleBurstGenerator) -> Self {
        Generator::Simple(g)
    }
}

impl From<TraceFileBurstGenerator> for Generator {
    fn from(g: TraceFileBurstGenerator) -> Self {
        Generator::TraceFile(g)
    }
}

impl From<VrBurstGenerator> for Generator {
    fn from(g: VrBurstGenerator) -> Self {
        Generator::Vr(g)
    }
}

/// Hands out stream indices to generators, so that several of them can share one seed
/// without overlapping
#[derive(Debug, Clone, Copy)]
pub struct StreamAllocator {
    seed: u64,
    next: u64,
}

impl StreamAllocator {
    pub fn new(seed: u64, first_stream: u64) -> Self {
        StreamAllocator {
            seed,
            next: first_stream,
        }
    }

    /// Assign the next free streams to `generator`; returns the first index it received
    pub fn assign(&mut self, generator: &mut impl BurstGenerator) -> u64 {
        let first = self.next;
        self.next += generator.assign_streams(self.seed, first);
        first
    }

    pub fn next_stream(&self) -> u64 {
        self.next
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::RandomVariable;
    use std::io::Cursor;

    fn noisy_simple() -> SimpleBurstGenerator {
        let mut g = SimpleBurstGenerator::default();
        g.set_burst_size(RandomVariable::uniform(1000.0, 2000.0).unwrap());
        g.set_period(RandomVariable::exponential(0.01, None).unwrap());
        g
    }

    #[test]
    fn test_allocator_threads_streams() {
        let mut alloc = StreamAllocator::new(5, 100);
        let mut simple = noisy_simple();
        let mut trace = TraceFileBurstGenerator::from_reader(Cursor::new("100,0.1\n"), 0.0).unwrap();
        let mut vr = VrBurstGenerator::default();
        assert_eq!(alloc.assign(&mut simple), 100);
        assert_eq!(alloc.assign(&mut trace), 102);
        assert_eq!(alloc.assign(&mut vr), 102);
        assert_eq!(alloc.next_stream(), 104);
        assert_eq!(vr.size_stream(), 102);
        assert_eq!(vr.period_stream(), 103);
    }

    #[test]
    fn test_reproducible_given_assignment_order() {
        let run = || {
            let mut alloc = StreamAllocator::new(9, 0);
            let mut generators: Vec<Generator> = vec![
                noisy_simple().into(),
                VrBurstGenerator::default().into(),
                noisy_simple().into(),
            ];
            for g in generators.iter_mut() {
                alloc.assign(g);
            }
            let mut out = vec![];
            for _ in 0..20 {
                for g in generators.iter_mut() {
                    assert!(g.has_next_burst());
                    out.push(g.generate_burst());
                }
            }
            out
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_independent_instances_differ() {
        let mut alloc = StreamAllocator::new(9, 0);
        let mut a = noisy_simple();
        let mut b = noisy_simple();
        alloc.assign(&mut a);
        alloc.assign(&mut b);
        let va: Vec<Burst> = (0..10).map(|_| a.generate_burst()).collect();
        let vb: Vec<Burst> = (0..10).map(|_| b.generate_burst()).collect();
        assert_ne!(va, vb);
    }
}
