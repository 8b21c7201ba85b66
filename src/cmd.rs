use clap::{Parser, Subcommand};

#[derive(Debug, Parser, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Print a sequence of bursts as CSV lines "size,period", the format of trace files
    Generate {
        #[arg(short, long, help = "Path to the TOML configuration of the generator")]
        config: String,
        #[arg(
            short = 'n',
            long,
            default_value_t = 100,
            help = "Maximum number of bursts to generate"
        )]
        count: u64,
        #[arg(
            short,
            long,
            default_value = None,
            help = "Seed for random number generation, overrides the configuration"
        )]
        seed: Option<u64>,
        #[arg(short, long, default_value = None, help = "Output file. By default, use stdout")]
        outfile: Option<String>,
    },
    /// Send the bursts through a lossy channel to a receiver and print statistics as JSON
    Simulate {
        #[arg(short, long, help = "Path to the TOML configuration of the generator")]
        config: String,
        #[arg(
            short,
            long,
            default_value_t = 10.0,
            help = "Simulated duration in seconds"
        )]
        duration: f64,
        #[arg(
            short,
            long,
            default_value = None,
            help = "Seed for random number generation, overrides the configuration"
        )]
        seed: Option<u64>,
        #[arg(
            long,
            default_value_t = 0.0,
            help = "Probability that a fragment is lost"
        )]
        loss: f64,
        #[arg(
            long,
            default_value_t = 0.0,
            help = "Probability that a fragment is delayed after the next one"
        )]
        reorder: f64,
    },
}
