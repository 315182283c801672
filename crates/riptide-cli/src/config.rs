//! The CLI's configuration surface. Parsing and validation only — no file
//! I/O, no socket I/O, no handshake orchestration.

use anyhow::Result;
use clap::Parser;
use riptide_core::error::CoreError;
use serde::{Deserialize, Serialize};

/// Wrap an `InvalidConfig` reason the way `CoreError` is wrapped at every
/// other fallible boundary in this crate (`thiserror` in the library,
/// `anyhow` at this glue layer — see SPEC_FULL.md §10.3).
fn invalid_config(reason: impl Into<String>) -> anyhow::Error {
    anyhow::Error::new(CoreError::InvalidConfig(reason.into()))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Congestion {
    Bbr,
    Ledbat,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FecConfig {
    pub auto: bool,
    pub k: u32,
    pub n: u32,
}

impl FecConfig {
    pub fn auto() -> Self {
        FecConfig {
            auto: true,
            k: 0,
            n: 0,
        }
    }

    /// Parse `"auto"` or `"k/n"` with `0 < k < n`.
    pub fn parse(s: &str) -> Result<Self> {
        if s == "auto" {
            return Ok(FecConfig::auto());
        }
        let (k_str, n_str) = s
            .split_once('/')
            .ok_or_else(|| invalid_config("fec must be k/n or auto"))?;
        let k: u32 = k_str.parse().map_err(|_| invalid_config("fec k invalid"))?;
        let n: u32 = n_str.parse().map_err(|_| invalid_config("fec n invalid"))?;
        Ok(FecConfig { auto: false, k, n })
    }
}

/// Positional `SRC DEST` plus the flags from the external CLI contract.
#[derive(Debug, Parser)]
#[command(name = "riptide", about = "secure point-to-point file transfer")]
pub struct Args {
    pub src: String,
    pub dest: String,

    #[arg(long, default_value_t = 1400)]
    pub mtu: i64,

    #[arg(long, default_value = "auto")]
    pub fec: String,

    #[arg(long, default_value = "bbr")]
    pub congestion: String,

    #[arg(long, default_value = "")]
    pub id_key: String,

    #[arg(long, default_value = "")]
    pub peer_key: String,

    #[arg(long, default_value = "")]
    pub psk: String,

    #[arg(long, default_value = "chacha20poly1305")]
    pub cipher: String,

    #[arg(long, default_value_t = 3703)]
    pub port: u32,

    #[arg(long, default_value_t = 1)]
    pub parallel: u32,

    #[arg(long, default_value_t = false)]
    pub resume: bool,

    #[arg(long = "no-compress", default_value_t = false)]
    pub no_compress: bool,

    #[arg(long, default_value_t = false)]
    pub checksum: bool,

    #[arg(long = "dry-run", default_value_t = false)]
    pub dry_run: bool,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub src: String,
    pub dest: String,
    pub mtu: i64,
    pub fec: FecConfig,
    pub congestion: Congestion,
    pub id_key: String,
    pub peer_key: String,
    pub psk: String,
    pub cipher: String,
    pub port: u32,
    pub parallel: u32,
    pub resume: bool,
    pub no_compress: bool,
    pub checksum: bool,
    pub dry_run: bool,
}

impl TryFrom<Args> for Config {
    type Error = anyhow::Error;

    fn try_from(a: Args) -> Result<Self> {
        let fec = FecConfig::parse(&a.fec)?;
        let congestion = match a.congestion.as_str() {
            "bbr" => Congestion::Bbr,
            "ledbat" => Congestion::Ledbat,
            other => return Err(invalid_config(format!("invalid congestion: {other}"))),
        };
        let cfg = Config {
            src: a.src,
            dest: a.dest,
            mtu: a.mtu,
            fec,
            congestion,
            id_key: a.id_key,
            peer_key: a.peer_key,
            psk: a.psk,
            cipher: a.cipher,
            port: a.port,
            parallel: a.parallel,
            resume: a.resume,
            no_compress: a.no_compress,
            checksum: a.checksum,
            dry_run: a.dry_run,
        };
        validate(&cfg)?;
        Ok(cfg)
    }
}

pub fn validate(c: &Config) -> Result<()> {
    if c.mtu <= 0 {
        return Err(invalid_config("mtu must be > 0"));
    }
    if c.cipher != "chacha20poly1305" {
        return Err(invalid_config(format!("invalid cipher: {}", c.cipher)));
    }
    if c.port == 0 || c.port > 65535 {
        return Err(invalid_config("invalid port"));
    }
    if c.parallel == 0 {
        return Err(invalid_config("parallel must be > 0"));
    }
    if !c.fec.auto && (c.fec.k == 0 || c.fec.n == 0 || c.fec.k >= c.fec.n) {
        return Err(invalid_config("invalid fec ratio"));
    }
    Ok(())
}
