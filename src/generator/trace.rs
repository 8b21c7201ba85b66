use crate::error::{Error, Result};
use crate::generator::BurstGenerator;
use crate::structs::*;
use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Replays the bursts of a trace file.
///
/// The trace is a comma-separated text file with one burst per line: the burst size [B] and
/// the period before the next burst [s]. Blank lines and lines starting with `#` are
/// ignored. Bursts starting before `start_time` are skipped, so several generators can read
/// the same trace at different offsets.
#[derive(Debug, Clone)]
pub struct TraceFileBurstGenerator {
    trace_file: Option<PathBuf>,
    start_time: f64,
    trace_duration: Duration,
    queue: VecDeque<Burst>,
}

impl TraceFileBurstGenerator {
    pub fn new(trace_file: impl AsRef<Path>, start_time: f64) -> Result<Self> {
        let trace_file = trace_file.as_ref().to_path_buf();
        let file = File::open(&trace_file)?;
        let mut generator = TraceFileBurstGenerator::from_reader(file, start_time)?;
        log::info!(
            "Parsed {} bursts from file {}",
            generator.queue.len(),
            trace_file.display()
        );
        generator.trace_file = Some(trace_file);
        Ok(generator)
    }

    pub fn from_reader(reader: impl Read, start_time: f64) -> Result<Self> {
        if !start_time.is_finite() || start_time < 0.0 {
            return Err(Error::InvalidConfig(format!(
                "trace start time must be non-negative, instead: {start_time}"
            )));
        }
        let queue = import_trace(reader, start_time)?;
        let trace_duration = queue.iter().map(|b| b.period).sum();
        Ok(TraceFileBurstGenerator {
            trace_file: None,
            start_time,
            trace_duration,
            queue,
        })
    }

    /// Import the trace file again, from the beginning
    pub fn reimport(&mut self) -> Result<()> {
        let path = self.trace_file.clone().ok_or_else(|| {
            Error::InvalidConfig("the trace was not imported from a file".to_string())
        })?;
        *self = TraceFileBurstGenerator::new(path, self.start_time)?;
        Ok(())
    }

    /// Duration of the imported trace, starting from the start time
    pub fn trace_duration(&self) -> Duration {
        self.trace_duration
    }

    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    pub fn trace_file(&self) -> Option<&Path> {
        self.trace_file.as_deref()
    }

    /// Number of bursts left
    pub fn remaining(&self) -> usize {
        self.queue.len()
    }
}

fn import_trace(reader: impl Read, start_time: f64) -> Result<VecDeque<Burst>> {
    let mut queue = VecDeque::new();
    let mut cumulative_start_time = 0.0;
    for (i, line) in BufReader::new(reader).lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (size, period) = parse_record(line).map_err(|reason| Error::Trace {
            line: i as u64 + 1,
            reason,
        })?;
        if cumulative_start_time >= start_time {
            queue.push_back(Burst::new(size, period));
        }
        cumulative_start_time += period.as_secs_f64();
    }
    Ok(queue)
}

/// Parse a "size,period" record
fn parse_record(line: &str) -> std::result::Result<(u32, Duration), String> {
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    let [size, period] = fields[..] else {
        return Err(format!(
            "expected burst size and period, found {} fields",
            fields.len()
        ));
    };
    let size: u32 = size
        .parse()
        .map_err(|_| format!("invalid burst size \"{size}\""))?;
    let period: f64 = period
        .parse()
        .map_err(|_| format!("invalid period \"{period}\""))?;
    if !period.is_finite() || period < 0.0 {
        return Err(format!(
            "period to next burst should be non-negative, instead: {period}"
        ));
    }
    let period = Duration::try_from_secs_f64(period)
        .map_err(|e| format!("invalid period {period}: {e}"))?;
    Ok((size, period))
}

impl BurstGenerator for TraceFileBurstGenerator {
    fn has_next_burst(&self) -> bool {
        !self.queue.is_empty()
    }

    fn generate_burst(&mut self) -> Burst {
        let burst = self.queue.pop_front().expect(
            "All bursts from the trace have already been generated, you should have checked has_next_burst",
        );
        log::debug!(
            "Generated ({}, {:?}); {} more bursts excluding the current one",
            burst.size,
            burst.period,
            self.queue.len()
        );
        burst
    }

    fn assign_streams(&mut self, _seed: u64, _stream: u64) -> u64 {
        0
    }
}
