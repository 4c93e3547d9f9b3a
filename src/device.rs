use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ConfigError;

/// Where tensor computation runs.
///
/// Chosen once by the caller and fixed for the whole run. Training steps are
/// always sequential; `CpuParallel` shards the validation pass across threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Device {
    #[default]
    Cpu,
    /// `threads == 0` means one thread per available core.
    CpuParallel { threads: usize },
}

impl Device {
    /// Number of worker threads this device evaluates with.
    pub fn threads(&self) -> usize {
        match *self {
            Device::Cpu => 1,
            Device::CpuParallel { threads: 0 } => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            Device::CpuParallel { threads } => threads,
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cpu => write!(f, "cpu"),
            Device::CpuParallel { threads: 0 } => write!(f, "cpu-parallel"),
            Device::CpuParallel { threads } => write!(f, "cpu-parallel:{}", threads),
        }
    }
}

impl FromStr for Device {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unknown = || ConfigError::UnknownDevice(s.to_owned());
        match s.trim().to_ascii_lowercase().as_str() {
            "cpu" => Ok(Device::Cpu),
            "cpu-parallel" => Ok(Device::CpuParallel { threads: 0 }),
            other => {
                let threads = other
                    .strip_prefix("cpu-parallel:")
                    .ok_or_else(unknown)?
                    .parse::<usize>()
                    .map_err(|_| unknown())?;
                Ok(Device::CpuParallel { threads })
            }
        }
    }
}

impl Serialize for Device {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Device {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
