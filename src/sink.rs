use crate::error::WireError;
use crate::header::FragmentationHeader;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use std::time::Duration;

/// A burst whose fragments have all been received
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceivedBurst {
    pub burst_seq: u32,
    /// Payload of the burst, headers excluded [B]
    pub burst_size: u32,
    pub frag_count: u16,
    pub sent_at: Duration,
    /// Arrival time of the fragment completing the burst
    pub received_at: Duration,
}

impl ReceivedBurst {
    pub fn delay(&self) -> Duration {
        self.received_at.saturating_sub(self.sent_at)
    }
}

/// Reception counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RxStats {
    pub bursts: u64,
    pub fragments: u64,
    pub bytes: u64,
}

/// Burst being assembled for one source
#[derive(Debug, Default)]
struct BurstBuffer {
    current_burst_seq: u32,
    fragments_merged: u16,
    merged_bytes: u64,
    /// Payload sizes of the fragments received ahead of their turn
    unordered: BTreeMap<u16, u64>,
}

impl BurstBuffer {
    fn new(burst_seq: u32) -> Self {
        BurstBuffer {
            current_burst_seq: burst_seq,
            ..Default::default()
        }
    }

    fn merge(&mut self, payload: u64) {
        self.merged_bytes += payload;
        self.fragments_merged += 1;
        while let Some(payload) = self.unordered.remove(&self.fragments_merged) {
            self.merged_bytes += payload;
            self.fragments_merged += 1;
        }
    }
}

/// Rebuilds bursts from their fragments, independently for each source.
///
/// Only one burst per source is assembled at a time: fragments of older bursts are dropped
/// and the first fragment of a newer burst discards the incomplete one.
#[derive(Debug)]
pub struct BurstReassembler<K: Hash + Eq> {
    buffers: HashMap<K, BurstBuffer>,
    stats: RxStats,
}

impl<K: Hash + Eq> Default for BurstReassembler<K> {
    fn default() -> Self {
        BurstReassembler {
            buffers: HashMap::new(),
            stats: RxStats::default(),
        }
    }
}

impl<K: Hash + Eq> BurstReassembler<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle a datagram received from `from` at `now`. Returns the burst it completes, if any.
    pub fn receive(
        &mut self,
        from: K,
        datagram: &[u8],
        now: Duration,
    ) -> Result<Option<ReceivedBurst>, WireError> {
        let (header, payload) = FragmentationHeader::decode(datagram)?;
        self.stats.fragments += 1;
        self.stats.bytes += datagram.len() as u64;

        let buffer = self.buffers.entry(from).or_default();
        let burst_seq = header.base.burst_seq;
        if burst_seq < buffer.current_burst_seq {
            log::debug!(
                "Ignoring fragment of previous burst {burst_seq}, current burst is {}",
                buffer.current_burst_seq
            );
            return Ok(None);
        }
        if burst_seq > buffer.current_burst_seq {
            if buffer.fragments_merged > 0 || !buffer.unordered.is_empty() {
                log::debug!(
                    "Discarding incomplete burst {} for burst {burst_seq}",
                    buffer.current_burst_seq
                );
            }
            *buffer = BurstBuffer::new(burst_seq);
        }

        if header.frag_seq < buffer.fragments_merged {
            log::debug!("Ignoring duplicate fragment {header}");
            return Ok(None);
        }
        if header.frag_seq == buffer.fragments_merged {
            buffer.merge(payload.len() as u64);
            log::trace!(
                "Fragments merged {}/{} for burst {burst_seq}",
                buffer.fragments_merged,
                header.frag_count
            );
        } else {
            buffer
                .unordered
                .entry(header.frag_seq)
                .or_insert(payload.len() as u64);
        }

        if buffer.fragments_merged != header.frag_count {
            return Ok(None);
        }
        if buffer.merged_bytes != header.base.burst_size as u64 {
            return Err(WireError::SizeMismatch {
                burst_seq,
                merged: buffer.merged_bytes,
                declared: header.base.burst_size,
            });
        }
        log::debug!(
            "Burst {burst_seq} received: {} fragments for a total of {} B",
            header.frag_count,
            header.base.burst_size
        );
        self.stats.bursts += 1;
        Ok(Some(ReceivedBurst {
            burst_seq,
            burst_size: header.base.burst_size,
            frag_count: header.frag_count,
            sent_at: header.base.timestamp,
            received_at: now,
        }))
    }

    pub fn stats(&self) -> RxStats {
        self.stats
    }

    /// Number of sources seen so far
    pub fn sources(&self) -> usize {
        self.buffers.len()
    }
}
