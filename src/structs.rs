use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

/// A burst of traffic: its size in bytes and the time to wait before the next one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Burst {
    pub size: u32,
    pub period: Duration,
}

impl Burst {
    pub fn new(size: u32, period: Duration) -> Self {
        Burst { size, period }
    }
}

/// Convert a sampled period (in seconds) into a duration. A negative period is a bug of the
/// model, so we abort instead of clamping it.
pub(crate) fn period_from_secs(seconds: f64) -> Duration {
    assert!(
        seconds >= 0.0 && seconds.is_finite(),
        "Period must be non-negative, instead found period={seconds}s"
    );
    Duration::from_secs_f64(seconds)
}

/// A data rate, stored in bits per second
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(try_from = "DataRateRepr")]
pub struct DataRate(u64);

#[derive(Deserialize)]
#[serde(untagged)]
enum DataRateRepr {
    Bits(f64),
    Text(String),
}

impl TryFrom<DataRateRepr> for DataRate {
    type Error = Error;

    fn try_from(repr: DataRateRepr) -> Result<DataRate, Error> {
        match repr {
            DataRateRepr::Bits(b) if b.is_finite() && b >= 0.0 => Ok(DataRate(b as u64)),
            DataRateRepr::Bits(b) => Err(Error::InvalidDataRate(b.to_string())),
            DataRateRepr::Text(s) => s.parse(),
        }
    }
}

// (suffix, multiplier to bits per second)
const UNITS: [(&str, f64); 14] = [
    ("bps", 1.0),
    ("b/s", 1.0),
    ("Bps", 8.0),
    ("B/s", 8.0),
    ("kbps", 1e3),
    ("Kbps", 1e3),
    ("kBps", 8e3),
    ("KBps", 8e3),
    ("Mbps", 1e6),
    ("MBps", 8e6),
    ("Gbps", 1e9),
    ("GBps", 8e9),
    ("Tbps", 1e12),
    ("TBps", 8e12),
];

impl DataRate {
    pub const fn from_bps(bits_per_second: u64) -> Self {
        DataRate(bits_per_second)
    }

    pub fn bps(&self) -> u64 {
        self.0
    }

    pub fn as_f64(&self) -> f64 {
        self.0 as f64
    }
}

impl FromStr for DataRate {
    type Err = Error;

    fn from_str(s: &str) -> Result<DataRate, Error> {
        let s = s.trim();
        let split = s
            .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == 'e' || c == '-' || c == '+'))
            .unwrap_or(s.len());
        let (value, unit) = s.split_at(split);
        let value: f64 = value
            .parse()
            .map_err(|_| Error::InvalidDataRate(s.to_string()))?;
        let multiplier = if unit.is_empty() {
            1.0
        } else {
            UNITS
                .iter()
                .find(|(suffix, _)| *suffix == unit.trim())
                .map(|(_, m)| *m)
                .ok_or_else(|| Error::InvalidDataRate(s.to_string()))?
        };
        let bits = value * multiplier;
        if !bits.is_finite() || bits < 0.0 {
            return Err(Error::InvalidDataRate(s.to_string()));
        }
        Ok(DataRate(bits.round() as u64))
    }
}

impl Display for DataRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            b if b >= 1_000_000_000 && b % 1_000_000_000 == 0 => {
                write!(f, "{}Gbps", b / 1_000_000_000)
            }
            b if b >= 1_000_000 && b % 1_000_000 == 0 => write!(f, "{}Mbps", b / 1_000_000),
            b if b >= 1_000 && b % 1_000 == 0 => write!(f, "{}kbps", b / 1_000),
            b => write!(f, "{b}bps"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_rate_units() {
        assert_eq!("20Mbps".parse::<DataRate>().unwrap().bps(), 20_000_000);
        assert_eq!("1.5 Gbps".parse::<DataRate>().unwrap().bps(), 1_500_000_000);
        assert_eq!("100kBps".parse::<DataRate>().unwrap().bps(), 800_000);
        assert_eq!("4000".parse::<DataRate>().unwrap().bps(), 4000);
        assert!("20 parsecs".parse::<DataRate>().is_err());
        assert!("fast".parse::<DataRate>().is_err());
    }

    #[test]
    fn test_data_rate_display() {
        assert_eq!(DataRate::from_bps(20_000_000).to_string(), "20Mbps");
        assert_eq!(DataRate::from_bps(1_500).to_string(), "1500bps");
    }

    #[test]
    #[should_panic(expected = "Period must be non-negative")]
    fn test_negative_period_aborts() {
        period_from_secs(-0.001);
    }
}
