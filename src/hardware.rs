//! Host CPU probe used to size the pool.

use std::fmt;

#[derive(Debug, Clone)]
pub struct HardwareProbe {
    physical_cores: usize,
    logical_cores: usize,
    vendor: Option<String>,
}

impl HardwareProbe {
    /// Probe the host. Missing vendor information is not an error.
    pub fn init() -> Self {
        let probe = Self {
            physical_cores: num_cpus::get_physical(),
            logical_cores: num_cpus::get(),
            vendor: read_vendor(),
        };
        log::debug!("hardware probe: {}", probe);
        probe
    }

    /// Physical cores on the host.
    pub fn core_count(&self) -> usize {
        self.physical_cores
    }

    /// Logical CPUs available to this process.
    pub fn logical_count(&self) -> usize {
        self.logical_cores
    }

    pub fn vendor(&self) -> Option<&str> {
        self.vendor.as_deref()
    }

    /// Worker count to use when none is configured.
    pub fn suggested_workers(&self) -> usize {
        self.logical_cores.max(1)
    }

    pub fn finalize(&self) {
        log::debug!("hardware probe released ({} logical cores)", self.logical_cores);
    }
}

impl fmt::Display for HardwareProbe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} physical / {} logical cores, vendor {}",
            self.physical_cores,
            self.logical_cores,
            self.vendor.as_deref().unwrap_or("unknown")
        )
    }
}

#[cfg(target_os = "linux")]
fn read_vendor() -> Option<String> {
    match std::fs::read_to_string("/proc/cpuinfo") {
        Ok(cpuinfo) => parse_vendor(&cpuinfo),
        Err(e) => {
            log::debug!("cannot read /proc/cpuinfo: {}", e);
            None
        }
    }
}

#[cfg(not(target_os = "linux"))]
fn read_vendor() -> Option<String> {
    None
}

fn parse_vendor(cpuinfo: &str) -> Option<String> {
    cpuinfo.lines().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        let value = value.trim();
        (key.trim() == "vendor_id" && !value.is_empty()).then(|| value.to_string())
    })
}
