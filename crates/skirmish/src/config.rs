//! Server configuration.

use std::path::PathBuf;

use skirmish_room::RoomConfig;

use crate::SkirmishError;

/// Where the server listens, which maps it serves, and how its rooms
/// are seeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind_addr: String,
    /// Directory of `*.json` map layouts.
    pub maps_dir: PathBuf,
    /// Seed for room codes and every room's random source.
    pub seed: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            maps_dir: PathBuf::from("maps"),
            seed: None,
        }
    }
}

impl ServerConfig {
    /// Reads `SKIRMISH_BIND`, `SKIRMISH_MAPS_DIR`, and `SKIRMISH_SEED`,
    /// falling back to the defaults for unset variables.
    pub fn from_env() -> Result<Self, SkirmishError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, SkirmishError> {
        let mut config = Self::default();
        if let Some(addr) = lookup("SKIRMISH_BIND") {
            config.bind_addr = addr;
        }
        if let Some(dir) = lookup("SKIRMISH_MAPS_DIR") {
            config.maps_dir = PathBuf::from(dir);
        }
        if let Some(seed) = lookup("SKIRMISH_SEED") {
            let seed = seed
                .trim()
                .parse()
                .map_err(|e| SkirmishError::Config(format!("SKIRMISH_SEED={seed}: {e}")))?;
            config.seed = Some(seed);
        }
        Ok(config)
    }

    /// Room settings derived from this configuration.
    pub fn room_config(&self) -> RoomConfig {
        RoomConfig {
            seed: self.seed,
            ..RoomConfig::default()
        }
    }
}
