use burstgen::config;
use burstgen::generator::{BurstGenerator, Generator, StreamAllocator};
use burstgen::random::RandomStream;
use burstgen::sender::{BurstSender, TxStats};
use burstgen::sink::{BurstReassembler, RxStats};
use burstgen::Result;
mod cmd;

use std::fs::File;
use std::io::{BufWriter, Write};
use std::process;
use std::time::Duration;

use bytes::Bytes;
use clap::Parser;
use rand::Rng;
use serde::Serialize;

/// Source address of the simulated sender
const SENDER: u32 = 1;

#[derive(Debug, Serialize)]
struct Summary {
    generator: &'static str,
    seed: u64,
    duration: f64,
    tx: TxStats,
    rx: RxStats,
    /// Fraction of the sent bursts that were not completely received
    burst_loss: f64,
    /// Average throughput of the sent bursts [bit/s]
    tx_data_rate: f64,
}

fn abort(e: impl std::fmt::Display) -> ! {
    log::error!("{e}");
    process::exit(1)
}

/// Build the generator of the configuration and assign its random streams
fn setup(
    config_path: &str,
    seed: Option<u64>,
) -> Result<(config::Configuration, Generator, StreamAllocator)> {
    let mut config = config::load_config(config_path)?;
    if let Some(s) = seed {
        log::info!("Generating with seed {s}");
        config.seed = s;
    }
    let mut generator = config.build_generator()?;
    let mut streams = StreamAllocator::new(config.seed, 0);
    streams.assign(&mut generator);
    Ok((config, generator, streams))
}

fn generate(
    config_path: &str,
    count: u64,
    seed: Option<u64>,
    outfile: Option<String>,
) -> Result<()> {
    let (_, mut generator, _) = setup(config_path, seed)?;
    let mut out: Box<dyn Write> = match &outfile {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(BufWriter::new(std::io::stdout().lock())),
    };
    let mut generated = 0;
    while generated < count && generator.has_next_burst() {
        let burst = generator.generate_burst();
        writeln!(out, "{},{}", burst.size, burst.period.as_secs_f64())?;
        generated += 1;
    }
    out.flush()?;
    if let Some(path) = outfile {
        log::info!("{generated} bursts written to {path}");
    }
    Ok(())
}

fn simulate(
    config_path: &str,
    duration: f64,
    seed: Option<u64>,
    loss: f64,
    reorder: f64,
) -> Result<Summary> {
    let (config, generator, streams) = setup(config_path, seed)?;
    let kind = generator.kind();
    let fragmenter = config.build_fragmenter()?;
    let mut sender = BurstSender::new(generator, fragmenter);
    let mut sink = BurstReassembler::new();
    // the channel draws from the first stream left by the generator
    let mut channel = RandomStream::new(streams.seed(), streams.next_stream());

    let end = Duration::try_from_secs_f64(duration).map_err(|e| {
        burstgen::Error::InvalidConfig(format!("invalid duration {duration}: {e}"))
    })?;
    let mut now = Duration::ZERO;
    while now < end {
        let Some(burst) = sender.send_burst(now)? else {
            log::info!("Generator exhausted after {now:?}");
            break;
        };
        let mut delayed: Option<Bytes> = None;
        for fragment in burst.fragments.iter() {
            if channel.gen_bool(loss) {
                log::trace!("Fragment {} lost", fragment.header);
                continue;
            }
            let datagram = fragment.to_bytes();
            if delayed.is_none() && channel.gen_bool(reorder) {
                delayed = Some(datagram);
                continue;
            }
            sink.receive(SENDER, &datagram, now)?;
            if let Some(d) = delayed.take() {
                sink.receive(SENDER, &d, now)?;
            }
        }
        if let Some(d) = delayed.take() {
            sink.receive(SENDER, &d, now)?;
        }
        now += burst.period;
    }

    let tx = sender.stats();
    let rx = sink.stats();
    let elapsed = now.min(end).as_secs_f64();
    Ok(Summary {
        generator: kind,
        seed: config.seed,
        duration: elapsed,
        tx,
        rx,
        burst_loss: if tx.bursts > 0 {
            1.0 - rx.bursts as f64 / tx.bursts as f64
        } else {
            0.0
        },
        tx_data_rate: if elapsed > 0.0 {
            tx.bytes as f64 * 8.0 / elapsed
        } else {
            0.0
        },
    })
}

/// The entry point of the application.
///
/// This function prepare the parameters of the subcommand according to the command line
fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = cmd::Args::parse();

    match args.command {
        cmd::Command::Generate {
            config,
            count,
            seed,
            outfile,
        } => {
            generate(&config, count, seed, outfile).unwrap_or_else(|e| abort(e));
        }
        cmd::Command::Simulate {
            config,
            duration,
            seed,
            loss,
            reorder,
        } => {
            for (name, p) in [("loss", loss), ("reorder", reorder)] {
                if !(0.0..=1.0).contains(&p) {
                    abort(format!("{name} must be a probability, instead: {p}"));
                }
            }
            if !duration.is_finite() || duration < 0.0 {
                abort(format!("duration must be non-negative, instead: {duration}"));
            }
            let summary =
                simulate(&config, duration, seed, loss, reorder).unwrap_or_else(|e| abort(e));
            log::info!(
                "{} bursts sent, {} received",
                summary.tx.bursts,
                summary.rx.bursts
            );
            let json = serde_json::to_string_pretty(&summary).unwrap_or_else(|e| abort(e));
            println!("{json}");
        }
    }
}
