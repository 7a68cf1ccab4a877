use std::collections::HashMap;

use rand::Rng;
use sysinfo::{CpuRefreshKind, MemoryRefreshKind, RefreshKind, System};

const MIB: f64 = 1024.0 * 1024.0;

/// Produces one round of named gauge samples per poll tick
pub trait SampleSource: Send {
    fn sample(&mut self) -> HashMap<String, f64>;
}

/// Host memory and CPU statistics plus a random value
pub struct SystemSampler {
    system: System,
}

impl SystemSampler {
    pub fn new() -> Self {
        Self {
            system: System::new_with_specifics(
                RefreshKind::nothing()
                    .with_cpu(CpuRefreshKind::everything())
                    .with_memory(MemoryRefreshKind::everything()),
            ),
        }
    }
}

impl Default for SystemSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl SampleSource for SystemSampler {
    fn sample(&mut self) -> HashMap<String, f64> {
        self.system.refresh_cpu_all();
        self.system.refresh_memory();

        let mut samples = HashMap::new();
        samples.insert("TotalMemory".to_string(), self.system.total_memory() as f64 / MIB);
        samples.insert("FreeMemory".to_string(), self.system.free_memory() as f64 / MIB);
        samples.insert(
            "AvailableMemory".to_string(),
            self.system.available_memory() as f64 / MIB,
        );
        samples.insert("UsedMemory".to_string(), self.system.used_memory() as f64 / MIB);
        samples.insert("TotalSwap".to_string(), self.system.total_swap() as f64 / MIB);
        samples.insert("UsedSwap".to_string(), self.system.used_swap() as f64 / MIB);

        for (i, cpu) in self.system.cpus().iter().enumerate() {
            samples.insert(format!("CPUutilization{}", i + 1), cpu.cpu_usage() as f64);
        }

        samples.insert("RandomValue".to_string(), rand::thread_rng().gen::<f64>());
        samples
    }
}

/// Fixed samples, for tests and dry runs
#[derive(Debug, Clone, Default)]
pub struct StaticSampler {
    samples: HashMap<String, f64>,
}

impl StaticSampler {
    pub fn new<I, K>(samples: I) -> Self
    where
        I: IntoIterator<Item = (K, f64)>,
        K: Into<String>,
    {
        Self {
            samples: samples.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

impl SampleSource for StaticSampler {
    fn sample(&mut self) -> HashMap<String, f64> {
        self.samples.clone()
    }
}
