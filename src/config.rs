use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, ensure};

use crate::Float;

/// Tuning of [`PathIntegrator`](crate::integrator::path::PathIntegrator).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PathTracerConfig {
    /// Lower bound on the probability that Russian roulette ends a path.
    pub min_termination_probability: Float,
    /// Paths whose throughput is at or above this are never terminated by roulette.
    pub roulette_threshold: Float,
    /// Bounces before roulette may end a path.
    pub min_bounces: u32,
    pub max_bounces: u32,
}

impl Default for PathTracerConfig {
    fn default() -> Self {
        Self {
            min_termination_probability: 0.05,
            roulette_threshold: 1.0,
            min_bounces: 3,
            max_bounces: 8,
        }
    }
}

impl PathTracerConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(
            (0.0..=1.0).contains(&self.min_termination_probability),
            "min_termination_probability must lie in [0, 1], got {}",
            self.min_termination_probability
        );
        ensure!(
            (0.0..=1.0).contains(&self.roulette_threshold),
            "roulette_threshold must lie in [0, 1], got {}",
            self.roulette_threshold
        );
        ensure!(
            self.min_bounces <= self.max_bounces,
            "min_bounces ({}) exceeds max_bounces ({})",
            self.min_bounces,
            self.max_bounces
        );
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum LightSamplingStrategy {
    /// Every light at every shading point.
    All,
    /// One light, chosen uniformly.
    Uniform,
    /// One light, chosen proportionally to its power.
    #[default]
    Power,
}

impl FromStr for LightSamplingStrategy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(Self::All),
            "uniform" => Ok(Self::Uniform),
            "power" => Ok(Self::Power),
            other => Err(anyhow!(
                "unknown light sampling strategy '{}', expected one of: all, uniform, power",
                other
            )),
        }
    }
}

impl fmt::Display for LightSamplingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = match self {
            Self::All => "all",
            Self::Uniform => "uniform",
            Self::Power => "power",
        };
        f.write_str(token)
    }
}

pub const DEFAULT_CHUNK_WIDTH: usize = 32;

#[derive(Clone, Debug, PartialEq)]
pub struct RenderConfig {
    pub integrator: PathTracerConfig,
    pub light_sampling: LightSamplingStrategy,
    /// Worker threads; zero picks one per core.
    pub threads: usize,
    /// Pixels of one row handed to a worker at a time.
    pub chunk_width: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            integrator: PathTracerConfig::default(),
            light_sampling: LightSamplingStrategy::default(),
            threads: 0,
            chunk_width: DEFAULT_CHUNK_WIDTH,
        }
    }
}

impl RenderConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        self.integrator.validate()?;
        ensure!(self.chunk_width > 0, "chunk width must be positive");
        Ok(())
    }
}
