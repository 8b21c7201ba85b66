//! Headers stamped on every fragment of a burst.
//!
//! A fragment starts with its position in the burst and the number of fragments of the
//! burst, followed by the burst header shared by all the fragments of a burst. All integers
//! are big-endian:
//!
//! ```text
//!  0               2               4                               8
//! +---------------+---------------+-------------------------------+
//! |   frag_seq    |  frag_count   |           burst_seq           |
//! +---------------+---------------+-------------------------------+
//! |                     timestamp (ns)                            |
//! +-------------------------------+-------------------------------+
//! |          burst_size           |
//! +-------------------------------+
//! ```

use crate::error::WireError;
use bytes::{Buf, BufMut};
use std::fmt::Display;
use std::time::Duration;

/// Sequence number, transmission time and payload size of a burst
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BurstHeader {
    pub burst_seq: u32,
    pub timestamp: Duration,
    pub burst_size: u32,
}

impl BurstHeader {
    pub const SERIALIZED_SIZE: usize = 4 + 8 + 4;

    fn write(&self, buf: &mut impl BufMut) {
        buf.put_u32(self.burst_seq);
        // u64 nanoseconds cover more than 584 years
        buf.put_u64(self.timestamp.as_nanos() as u64);
        buf.put_u32(self.burst_size);
    }

    fn read(buf: &mut impl Buf) -> Self {
        let burst_seq = buf.get_u32();
        let timestamp = Duration::from_nanos(buf.get_u64());
        let burst_size = buf.get_u32();
        BurstHeader {
            burst_seq,
            timestamp,
            burst_size,
        }
    }
}

/// Header of a single fragment: its place in the burst, then the burst header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FragmentationHeader {
    pub frag_seq: u16,
    pub frag_count: u16,
    pub base: BurstHeader,
}

impl FragmentationHeader {
    pub const SERIALIZED_SIZE: usize = 2 + 2 + BurstHeader::SERIALIZED_SIZE;

    pub fn new(frag_seq: u16, frag_count: u16, base: BurstHeader) -> Self {
        FragmentationHeader {
            frag_seq,
            frag_count,
            base,
        }
    }

    pub fn serialized_size(&self) -> usize {
        Self::SERIALIZED_SIZE
    }

    pub fn is_last(&self) -> bool {
        self.frag_seq + 1 == self.frag_count
    }

    pub fn serialize(&self, buf: &mut impl BufMut) {
        buf.put_u16(self.frag_seq);
        buf.put_u16(self.frag_count);
        self.base.write(buf);
    }

    /// Read exactly `SERIALIZED_SIZE` bytes
    pub fn deserialize(buf: &mut impl Buf) -> Result<Self, WireError> {
        if buf.remaining() < Self::SERIALIZED_SIZE {
            return Err(WireError::Truncated {
                needed: Self::SERIALIZED_SIZE,
                available: buf.remaining(),
            });
        }
        let frag_seq = buf.get_u16();
        let frag_count = buf.get_u16();
        let base = BurstHeader::read(buf);
        if frag_count == 0 || frag_seq >= frag_count {
            return Err(WireError::InvalidFragment {
                frag_seq,
                frag_count,
            });
        }
        Ok(FragmentationHeader {
            frag_seq,
            frag_count,
            base,
        })
    }

    /// Split a datagram into its header and its payload
    pub fn decode(datagram: &[u8]) -> Result<(Self, &[u8]), WireError> {
        let mut buf = datagram;
        let header = FragmentationHeader::deserialize(&mut buf)?;
        Ok((header, buf))
    }
}

impl Display for FragmentationHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "(frag_seq={} frag_count={} burst_seq={} timestamp={:?} burst_size={})",
            self.frag_seq,
            self.frag_count,
            self.base.burst_seq,
            self.base.timestamp,
            self.base.burst_size
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    fn header() -> FragmentationHeader {
        FragmentationHeader::new(
            2,
            5,
            BurstHeader {
                burst_seq: 0x0102_0304,
                timestamp: Duration::from_nanos(0x1122_3344_5566_7788),
                burst_size: 4000,
            },
        )
    }

    #[test]
    fn test_layout() {
        let mut buf = BytesMut::new();
        header().serialize(&mut buf);
        assert_eq!(buf.len(), 20);
        assert_eq!(header().serialized_size(), 20);
        assert_eq!(
            &buf[..],
            &[
                0x00, 0x02, 0x00, 0x05, 0x01, 0x02, 0x03, 0x04, 0x11, 0x22, 0x33, 0x44, 0x55,
                0x66, 0x77, 0x88, 0x00, 0x00, 0x0f, 0xa0
            ]
        );
        let mut read = buf.freeze();
        assert_eq!(FragmentationHeader::deserialize(&mut read), Ok(header()));
        assert!(read.is_empty());
    }

    #[test]
    fn test_boundary_values() {
        for frag_count in [1, 2, u16::MAX] {
            for frag_seq in [0, frag_count - 1] {
                for (burst_seq, burst_size) in [(0, 0), (u32::MAX, u32::MAX), (0, u32::MAX)] {
                    for timestamp in [Duration::ZERO, Duration::from_nanos(u64::MAX)] {
                        let h = FragmentationHeader::new(
                            frag_seq,
                            frag_count,
                            BurstHeader {
                                burst_seq,
                                timestamp,
                                burst_size,
                            },
                        );
                        let mut buf = BytesMut::new();
                        h.serialize(&mut buf);
                        buf.put_u8(0xff);
                        let mut read = buf.freeze();
                        assert_eq!(FragmentationHeader::deserialize(&mut read), Ok(h));
                        assert_eq!(read.len(), 1, "{h}");
                    }
                }
            }
        }
    }

    #[test]
    fn test_decode_splits_payload() {
        let mut buf = BytesMut::new();
        header().serialize(&mut buf);
        buf.put_bytes(0, 30);
        let (h, payload) = FragmentationHeader::decode(&buf).unwrap();
        assert_eq!(h, header());
        assert_eq!(payload.len(), 30);
    }

    #[test]
    fn test_truncated() {
        let mut buf = BytesMut::new();
        header().serialize(&mut buf);
        assert_eq!(
            FragmentationHeader::decode(&buf[..19]).unwrap_err(),
            WireError::Truncated {
                needed: 20,
                available: 19
            }
        );
        assert!(FragmentationHeader::decode(&[]).is_err());
    }

    #[test]
    fn test_invalid_positions() {
        for (frag_seq, frag_count) in [(0, 0), (5, 5), (7, 3)] {
            let mut h = header();
            h.frag_seq = frag_seq;
            h.frag_count = frag_count;
            let mut buf = BytesMut::new();
            h.serialize(&mut buf);
            assert_eq!(
                FragmentationHeader::decode(&buf).unwrap_err(),
                WireError::InvalidFragment {
                    frag_seq,
                    frag_count
                }
            );
        }
    }

    #[test]
    fn test_is_last() {
        let mut h = header();
        assert!(!h.is_last());
        h.frag_seq = 4;
        assert!(h.is_last());
    }
}
