// Copyright 2022 The Firefly Authors.
//
// Use of this source code is governed by a BSD 3-clause
// license that can be found in the LICENSE file.

//! Reads device connectivity and geometry from the environment,
//! falling back to compiled-in defaults, so deployments can point at a
//! different device server without a rebuild.

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 7070;
const DEFAULT_CACHE_SIZE: usize = 64;
const DEFAULT_MAX_CARTRIDGES: u16 = 16;
const DEFAULT_MAX_FRAMES_PER_CARTRIDGE: u16 = 256;

/// Device connectivity and geometry, resolved once at startup.
///
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub cache_size: usize,
    pub max_cartridges: u16,
    pub max_frames_per_cartridge: u16,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            cache_size: DEFAULT_CACHE_SIZE,
            max_cartridges: DEFAULT_MAX_CARTRIDGES,
            max_frames_per_cartridge: DEFAULT_MAX_FRAMES_PER_CARTRIDGE,
        }
    }
}

impl Config {
    /// Starts from [`Config::default`] and overrides each field with
    /// its environment variable, if set and parseable. An unparseable
    /// value is logged and ignored, keeping the default.
    ///
    pub fn from_env() -> Self {
        let mut config = Config::default();

        if let Ok(host) = std::env::var("HRAMFS_HOST") {
            config.host = host;
        }
        config.port = env_override("HRAMFS_PORT", config.port);
        config.cache_size = env_override("HRAMFS_CACHE_SIZE", config.cache_size);
        config.max_cartridges = env_override("HRAMFS_MAX_CARTRIDGES", config.max_cartridges);
        config.max_frames_per_cartridge = env_override(
            "HRAMFS_MAX_FRAMES_PER_CARTRIDGE",
            config.max_frames_per_cartridge,
        );

        config
    }
}

fn env_override<T: std::str::FromStr>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(value) => value.parse().unwrap_or_else(|_| {
            log::warn!("ignoring unparseable {}={:?}", name, value);
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_documented_defaults() {
        let config = Config::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 7070);
        assert_eq!(config.cache_size, 64);
    }
}
