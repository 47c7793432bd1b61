use std::net::SocketAddr;

use serde::Deserialize;
use sparsegram_core::codec::DecodeLimits;
use sparsegram_core::error::{Result, SparsegramError};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    pub version: u32,

    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub histograms: HistogramSection,
}

impl ServerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(SparsegramError::InvalidConfig(format!(
                "unsupported config version {}",
                self.version
            )));
        }
        self.server.validate()?;
        self.histograms.validate()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    #[serde(default = "default_listen")]
    pub listen: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

impl ServerSection {
    pub fn validate(&self) -> Result<()> {
        self.listen_addr().map(|_| ())
    }

    pub fn listen_addr(&self) -> Result<SocketAddr> {
        self.listen.parse().map_err(|_| {
            SparsegramError::InvalidConfig(format!(
                "server.listen must be a socket address, got {:?}",
                self.listen
            ))
        })
    }
}

/// Bounds on what the registry accepts, shared with the wire decoder.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HistogramSection {
    #[serde(default = "default_max_name_bytes")]
    pub max_name_bytes: usize,

    #[serde(default = "default_max_pairs")]
    pub max_pairs: usize,
}

impl Default for HistogramSection {
    fn default() -> Self {
        Self {
            max_name_bytes: default_max_name_bytes(),
            max_pairs: default_max_pairs(),
        }
    }
}

impl HistogramSection {
    pub fn validate(&self) -> Result<()> {
        if !(1..=65_536).contains(&self.max_name_bytes) {
            return Err(SparsegramError::InvalidConfig(
                "histograms.max_name_bytes must be between 1 and 65536".into(),
            ));
        }
        if !(1..=16_777_216).contains(&self.max_pairs) {
            return Err(SparsegramError::InvalidConfig(
                "histograms.max_pairs must be between 1 and 16777216".into(),
            ));
        }
        Ok(())
    }

    pub fn limits(&self) -> DecodeLimits {
        DecodeLimits {
            max_name_bytes: self.max_name_bytes,
            max_pairs: self.max_pairs,
        }
    }
}

fn default_listen() -> String {
    "127.0.0.1:9464".into()
}
fn default_max_name_bytes() -> usize {
    DecodeLimits::default().max_name_bytes
}
fn default_max_pairs() -> usize {
    DecodeLimits::default().max_pairs
}
