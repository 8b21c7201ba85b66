use crate::error::{Error, Result};
use crate::generator::*;
use crate::random::{MixtureRandomVariable, RandomVariable, DEFAULT_SEED};
use crate::sender::{Fragmenter, DEFAULT_FRAGMENT_SIZE};
use crate::structs::DataRate;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// A random variable, as described in the configuration file
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case", deny_unknown_fields)]
pub enum DistributionConfig {
    Constant {
        value: f64,
    },
    Uniform {
        min: f64,
        max: f64,
    },
    Exponential {
        mean: f64,
        bound: Option<f64>,
    },
    Normal {
        mean: f64,
        std_dev: f64,
        bound: Option<f64>,
    },
    Laplace {
        location: f64,
        scale: f64,
        bound: Option<f64>,
    },
    Logistic {
        location: f64,
        scale: f64,
        bound: Option<f64>,
    },
    Mixture {
        cdf: Vec<f64>,
        components: Vec<DistributionConfig>,
    },
}

impl DistributionConfig {
    pub fn build(&self) -> Result<RandomVariable> {
        match self {
            DistributionConfig::Constant { value } => RandomVariable::checked_constant(*value),
            DistributionConfig::Uniform { min, max } => RandomVariable::uniform(*min, *max),
            DistributionConfig::Exponential { mean, bound } => {
                RandomVariable::exponential(*mean, *bound)
            }
            DistributionConfig::Normal {
                mean,
                std_dev,
                bound,
            } => RandomVariable::normal(*mean, *std_dev, *bound),
            DistributionConfig::Laplace {
                location,
                scale,
                bound,
            } => RandomVariable::laplace(*location, *scale, *bound),
            DistributionConfig::Logistic {
                location,
                scale,
                bound,
            } => RandomVariable::logistic(*location, *scale, *bound),
            DistributionConfig::Mixture { cdf, components } => {
                let variables = components
                    .iter()
                    .map(DistributionConfig::build)
                    .collect::<Result<Vec<_>>>()?;
                Ok(MixtureRandomVariable::new(cdf.clone(), variables)?.into())
            }
        }
    }
}

fn default_frame_rate() -> f64 {
    vr::DEFAULT_FRAME_RATE
}

fn default_target_data_rate() -> DataRate {
    vr::DEFAULT_TARGET_DATA_RATE
}

/// The burst generator and its parameters
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case", deny_unknown_fields)]
pub enum GeneratorConfig {
    Simple {
        burst_size: Option<DistributionConfig>,
        period: Option<DistributionConfig>,
    },
    Trace {
        trace_file: PathBuf,
        #[serde(default)]
        start_time: f64,
    },
    Vr {
        #[serde(default)]
        app: VrApp,
        #[serde(default = "default_frame_rate")]
        frame_rate: f64,
        #[serde(default = "default_target_data_rate")]
        target_data_rate: DataRate,
    },
}

fn default_seed() -> u64 {
    DEFAULT_SEED
}

fn default_fragment_size() -> u32 {
    DEFAULT_FRAGMENT_SIZE
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Configuration {
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Size of the fragments on the wire, header included [B]
    #[serde(default = "default_fragment_size")]
    pub fragment_size: u32,
    pub generator: GeneratorConfig,
}

impl Configuration {
    /// Build the configured generator. Its streams are not assigned yet.
    pub fn build_generator(&self) -> Result<Generator> {
        let generator = match &self.generator {
            GeneratorConfig::Simple { burst_size, period } => {
                let mut g = SimpleBurstGenerator::default();
                if let Some(burst_size) = burst_size {
                    g.set_burst_size(burst_size.build()?);
                }
                if let Some(period) = period {
                    g.set_period(period.build()?);
                }
                g.into()
            }
            GeneratorConfig::Trace {
                trace_file,
                start_time,
            } => TraceFileBurstGenerator::new(trace_file, *start_time)?.into(),
            GeneratorConfig::Vr {
                app,
                frame_rate,
                target_data_rate,
            } => VrBurstGenerator::new(*app, *frame_rate, *target_data_rate)?.into(),
        };
        Ok(generator)
    }

    pub fn build_fragmenter(&self) -> Result<Fragmenter> {
        Fragmenter::new(self.fragment_size)
    }

    /// Resolve relative paths against `dir`
    fn resolve_paths(&mut self, dir: &Path) {
        if let GeneratorConfig::Trace { trace_file, .. } = &mut self.generator {
            if trace_file.is_relative() {
                *trace_file = dir.join(&*trace_file);
            }
        }
    }
}

/// Parse a configuration from a TOML string
pub fn import_config(config: &str) -> Result<Configuration> {
    let config: Configuration = toml::from_str(config)?;
    log::info!("Configuration loaded");
    Ok(config)
}

/// Read a configuration file. The trace file, if any, is relative to the configuration file.
pub fn load_config(path: impl AsRef<Path>) -> Result<Configuration> {
    let path = path.as_ref();
    let mut config = import_config(&std::fs::read_to_string(path)?)?;
    if let Some(dir) = path.parent() {
        config.resolve_paths(dir);
    }
    Ok(config)
}
