use crate::error::{Error, Result};
use crate::generator::BurstGenerator;
use crate::header::{BurstHeader, FragmentationHeader};
use bytes::{BufMut, Bytes, BytesMut};
use serde::Serialize;
use std::time::Duration;

const HEADER_SIZE: u32 = FragmentationHeader::SERIALIZED_SIZE as u32;

/// Default size of a fragment on the wire, header included [B]
pub const DEFAULT_FRAGMENT_SIZE: u32 = 1200;

/// One datagram of a burst
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fragment {
    pub header: FragmentationHeader,
    /// Size on the wire, header included [B]
    pub size: u32,
}

impl Fragment {
    pub fn payload_size(&self) -> u32 {
        self.size - HEADER_SIZE
    }

    /// The datagram: header, then a zeroed payload
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.size as usize);
        self.header.serialize(&mut buf);
        buf.put_bytes(0, self.payload_size() as usize);
        buf.freeze()
    }
}

/// Splits bursts into fragments of at most `fragment_size` bytes, each stamped with a
/// fragmentation header
#[derive(Debug, Clone)]
pub struct Fragmenter {
    fragment_size: u32,
    next_burst_seq: u32,
}

impl Default for Fragmenter {
    fn default() -> Self {
        Fragmenter {
            fragment_size: DEFAULT_FRAGMENT_SIZE,
            next_burst_seq: 0,
        }
    }
}

impl Fragmenter {
    pub fn new(fragment_size: u32) -> Result<Self> {
        if fragment_size < HEADER_SIZE {
            return Err(Error::InvalidConfig(format!(
                "fragment size must hold a header: {fragment_size} < {HEADER_SIZE}"
            )));
        }
        Ok(Fragmenter {
            fragment_size,
            next_burst_seq: 0,
        })
    }

    pub fn fragment_size(&self) -> u32 {
        self.fragment_size
    }

    /// Sequence number of the next fragmented burst
    pub fn next_burst_seq(&self) -> u32 {
        self.next_burst_seq
    }

    /// Split a burst of `burst_size` bytes sent at `now`.
    ///
    /// All fragments are `fragment_size` long except the last one, which holds the
    /// remainder. When the remainder cannot even hold a header, the second-to-last fragment
    /// gives up some of its bytes so that the last one is exactly a header long.
    pub fn fragment(&mut self, burst_size: u32, now: Duration) -> Result<Vec<Fragment>> {
        if burst_size < HEADER_SIZE {
            return Err(Error::InvalidConfig(format!(
                "burst must hold a header: {burst_size} < {HEADER_SIZE}"
            )));
        }

        let mut full_frags = burst_size / self.fragment_size;
        let mut last_size = burst_size % self.fragment_size;
        let mut second_to_last_size = 0;
        if full_frags > 0 {
            second_to_last_size = self.fragment_size;
            full_frags -= 1;
        }
        if second_to_last_size > 0 && last_size > 0 && last_size < HEADER_SIZE {
            second_to_last_size = self.fragment_size + last_size - HEADER_SIZE;
            last_size = HEADER_SIZE;
        }
        if 0 < second_to_last_size && second_to_last_size < HEADER_SIZE {
            return Err(Error::InvalidConfig(format!(
                "cannot split {burst_size} B into fragments of {} B: second-to-last fragment of {second_to_last_size} B",
                self.fragment_size
            )));
        }

        let mut sizes = vec![self.fragment_size; full_frags as usize];
        sizes.extend([second_to_last_size, last_size].into_iter().filter(|s| *s > 0));
        let frag_count = u16::try_from(sizes.len()).map_err(|_| {
            Error::InvalidConfig(format!(
                "{burst_size} B in fragments of {} B needs {} fragments, more than {}",
                self.fragment_size,
                sizes.len(),
                u16::MAX
            ))
        })?;

        let base = BurstHeader {
            burst_seq: self.next_burst_seq,
            timestamp: now,
            burst_size: burst_size - HEADER_SIZE * frag_count as u32,
        };
        log::debug!(
            "Burst {}: {burst_size} B in {frag_count} fragments with total payload {} B",
            base.burst_seq,
            base.burst_size
        );
        self.next_burst_seq = self.next_burst_seq.wrapping_add(1);

        Ok(sizes
            .into_iter()
            .enumerate()
            .map(|(frag_seq, size)| Fragment {
                header: FragmentationHeader::new(frag_seq as u16, frag_count, base),
                size,
            })
            .collect())
    }
}

/// Transmission counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TxStats {
    pub bursts: u64,
    pub fragments: u64,
    pub bytes: u64,
}

/// A burst handed to the transport
#[derive(Debug, Clone)]
pub struct SentBurst {
    pub size: u32,
    /// Time to wait before the next burst
    pub period: Duration,
    pub fragments: Vec<Fragment>,
}

/// Drives a burst generator and fragments every burst it yields
#[derive(Debug, Clone)]
pub struct BurstSender<G: BurstGenerator> {
    generator: G,
    fragmenter: Fragmenter,
    stats: TxStats,
}

impl<G: BurstGenerator> BurstSender<G> {
    pub fn new(generator: G, fragmenter: Fragmenter) -> Self {
        BurstSender {
            generator,
            fragmenter,
            stats: TxStats::default(),
        }
    }

    /// Generate and fragment the next burst sent at `now`. Bursts too small to hold a header
    /// are skipped. Returns `None` once the generator is exhausted.
    pub fn send_burst(&mut self, now: Duration) -> Result<Option<SentBurst>> {
        loop {
            if !self.generator.has_next_burst() {
                log::debug!("Burst generator has no next burst");
                return Ok(None);
            }
            let burst = self.generator.generate_burst();
            if burst.size < HEADER_SIZE {
                log::warn!(
                    "Skipping burst of {} B, smaller than the {HEADER_SIZE} B header",
                    burst.size
                );
                continue;
            }

            let fragments = self.fragmenter.fragment(burst.size, now)?;
            self.stats.bursts += 1;
            self.stats.fragments += fragments.len() as u64;
            self.stats.bytes += burst.size as u64;
            return Ok(Some(SentBurst {
                size: burst.size,
                period: burst.period,
                fragments,
            }));
        }
    }

    pub fn stats(&self) -> TxStats {
        self.stats
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }

    pub fn generator_mut(&mut self) -> &mut G {
        &mut self.generator
    }

    pub fn fragmenter(&self) -> &Fragmenter {
        &self.fragmenter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::{SimpleBurstGenerator, TraceFileBurstGenerator};
    use crate::random::RandomVariable;
    use std::io::Cursor;

    fn sizes(fragments: &[Fragment]) -> Vec<u32> {
        fragments.iter().map(|f| f.size).collect()
    }

    #[test]
    fn test_fragment_sizes() {
        let mut f = Fragmenter::new(1000).unwrap();
        let now = Duration::from_millis(5);
        assert_eq!(sizes(&f.fragment(2500, now).unwrap()), vec![1000, 1000, 500]);
        assert_eq!(sizes(&f.fragment(2000, now).unwrap()), vec![1000, 1000]);
        assert_eq!(sizes(&f.fragment(600, now).unwrap()), vec![600]);
        // the remainder cannot hold a header: the second-to-last fragment shrinks
        assert_eq!(sizes(&f.fragment(2010, now).unwrap()), vec![1000, 990, 20]);
    }

    #[test]
    fn test_fragment_headers() {
        let mut f = Fragmenter::new(1000).unwrap();
        let now = Duration::from_millis(42);
        let fragments = f.fragment(2500, now).unwrap();
        for (i, frag) in fragments.iter().enumerate() {
            assert_eq!(frag.header.frag_seq as usize, i);
            assert_eq!(frag.header.frag_count, 3);
            assert_eq!(frag.header.base.burst_seq, 0);
            assert_eq!(frag.header.base.timestamp, now);
            assert_eq!(frag.header.base.burst_size, 2500 - 3 * 20);
        }
        let total: u32 = fragments.iter().map(|f| f.payload_size()).sum();
        assert_eq!(total, 2440);

        let next = f.fragment(100, now).unwrap();
        assert_eq!(next[0].header.base.burst_seq, 1);
        assert_eq!(f.next_burst_seq(), 2);
    }

    #[test]
    fn test_fragments_sum_to_burst() {
        let mut f = Fragmenter::default();
        for burst_size in [20, 21, 1199, 1200, 1201, 1219, 1220, 2400, 123_456] {
            let fragments = f.fragment(burst_size, Duration::ZERO).unwrap();
            assert_eq!(fragments.iter().map(|f| f.size).sum::<u32>(), burst_size);
            assert!(fragments.iter().all(|f| f.size >= 20 && f.size <= 1200));
            assert_eq!(fragments[0].header.frag_count as usize, fragments.len());
        }
    }

    #[test]
    fn test_invalid_fragmentation() {
        assert!(Fragmenter::new(19).is_err());
        let mut f = Fragmenter::default();
        assert!(f.fragment(19, Duration::ZERO).is_err());
        // 20 B fragments leave no room for a shrunk second-to-last fragment
        let mut f = Fragmenter::new(20).unwrap();
        assert!(f.fragment(45, Duration::ZERO).is_err());
        assert!(f.fragment(20 * 70_000, Duration::ZERO).is_err());
        assert_eq!(f.next_burst_seq(), 0);
    }

    #[test]
    fn test_to_bytes() {
        let mut f = Fragmenter::new(100).unwrap();
        let fragments = f.fragment(150, Duration::from_secs(1)).unwrap();
        let datagram = fragments[1].to_bytes();
        assert_eq!(datagram.len(), 50);
        let (header, payload) = FragmentationHeader::decode(&datagram).unwrap();
        assert_eq!(header, fragments[1].header);
        assert_eq!(payload.len(), 30);
    }

    #[test]
    fn test_sender_skips_small_bursts() {
        let trace = "10,0.1\n500,0.2\n5,0.1\n";
        let g = TraceFileBurstGenerator::from_reader(Cursor::new(trace), 0.0).unwrap();
        let mut sender = BurstSender::new(g, Fragmenter::default());
        let sent = sender.send_burst(Duration::ZERO).unwrap().unwrap();
        assert_eq!(sent.size, 500);
        assert_eq!(sent.period, Duration::from_secs_f64(0.2));
        assert!(sender.send_burst(Duration::ZERO).unwrap().is_none());
        assert_eq!(
            sender.stats(),
            TxStats {
                bursts: 1,
                fragments: 1,
                bytes: 500
            }
        );
    }

    #[test]
    fn test_sender_counters() {
        let g = SimpleBurstGenerator::new(
            RandomVariable::constant(3000.0),
            RandomVariable::constant(0.01),
        );
        let mut sender = BurstSender::new(g, Fragmenter::new(1000).unwrap());
        let mut now = Duration::ZERO;
        for _ in 0..4 {
            let sent = sender.send_burst(now).unwrap().unwrap();
            now += sent.period;
        }
        assert_eq!(
            sender.stats(),
            TxStats {
                bursts: 4,
                fragments: 12,
                bytes: 12_000
            }
        );
        assert_eq!(sender.fragmenter().next_burst_seq(), 4);
    }
}
