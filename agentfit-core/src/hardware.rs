use sysinfo::{Disks, System};

use crate::models::GIB;

/// The two memory figures the evaluator consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct MemoryReading {
    /// Installed RAM; fixed for the session.
    pub total_ram_bytes: u64,
    /// Currently free RAM; refreshed by polling.
    pub free_ram_bytes: u64,
}

impl MemoryReading {
    pub fn new(total_ram_bytes: u64, free_ram_bytes: u64) -> Self {
        MemoryReading {
            total_ram_bytes,
            free_ram_bytes,
        }
    }

    pub fn from_info(static_info: &StaticSystemInfo, dynamic_info: &DynamicSystemInfo) -> Self {
        MemoryReading::new(static_info.total_ram_bytes, dynamic_info.free_ram_bytes)
    }

    /// Replace the free figure, keeping it within the installed total when
    /// the total is known.
    pub fn with_free_override(mut self, free_ram_bytes: u64) -> Self {
        self.free_ram_bytes = if self.total_ram_bytes > 0 {
            free_ram_bytes.min(self.total_ram_bytes)
        } else {
            free_ram_bytes
        };
        self
    }

    pub fn with_total_override(mut self, total_ram_bytes: u64) -> Self {
        self.total_ram_bytes = total_ram_bytes;
        self.free_ram_bytes = self.free_ram_bytes.min(total_ram_bytes);
        self
    }

    pub fn used_ram_bytes(&self) -> u64 {
        self.total_ram_bytes.saturating_sub(self.free_ram_bytes)
    }

    pub fn total_ram_gb(&self) -> f64 {
        self.total_ram_bytes as f64 / GIB as f64
    }

    pub fn free_ram_gb(&self) -> f64 {
        self.free_ram_bytes as f64 / GIB as f64
    }
}

/// Figures given on the command line that replace detected ones. A pinned
/// free figure survives every later monitor sample.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryOverrides {
    pub total_ram_bytes: Option<u64>,
    pub free_ram_bytes: Option<u64>,
}

impl MemoryOverrides {
    pub fn apply(&self, mut reading: MemoryReading) -> MemoryReading {
        if let Some(total) = self.total_ram_bytes {
            reading = reading.with_total_override(total);
        }
        if let Some(free) = self.free_ram_bytes {
            reading = reading.with_free_override(free);
        }
        reading
    }

    pub fn is_empty(&self) -> bool {
        self.total_ram_bytes.is_none() && self.free_ram_bytes.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryPressure {
    Nominal,
    Warning,
    Critical,
}

impl MemoryPressure {
    /// `available_ratio` is reclaimable memory / total, `compressed_ratio`
    /// is compressor-held memory / total.
    pub fn classify(available_ratio: f64, compressed_ratio: f64) -> Self {
        if compressed_ratio > 0.3 || available_ratio < 0.05 {
            MemoryPressure::Critical
        } else if available_ratio < 0.15 {
            MemoryPressure::Warning
        } else {
            MemoryPressure::Nominal
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MemoryPressure::Nominal => "nominal",
            MemoryPressure::Warning => "warning",
            MemoryPressure::Critical => "critical",
        }
    }
}

/// Host facts read once at startup.
#[derive(Debug, Clone, serde::Serialize)]
pub struct StaticSystemInfo {
    pub cpu_model: String,
    /// Apple Silicon chip generation, e.g. "Apple M3 Pro". macOS only.
    pub chip: Option<String>,
    pub cpu_cores: usize,
    /// Integrated GPU core count from `system_profiler`. macOS only.
    pub gpu_cores: Option<u32>,
    pub total_ram_bytes: u64,
    pub disk_total_bytes: u64,
    pub disk_free_bytes: u64,
    pub os_version: String,
    pub architecture: String,
}

impl StaticSystemInfo {
    pub fn detect() -> Self {
        let mut sys = System::new_all();
        sys.refresh_all();

        let cpu_model = sys
            .cpus()
            .first()
            .map(|cpu| cpu.brand().trim().to_string())
            .filter(|brand| !brand.is_empty())
            .unwrap_or_else(|| "Unknown CPU".to_string());
        let (disk_total_bytes, disk_free_bytes) = root_disk_space();

        StaticSystemInfo {
            cpu_model,
            chip: system_profiler("SPHardwareDataType").as_deref().and_then(parse_chip),
            cpu_cores: sys.cpus().len(),
            gpu_cores: system_profiler("SPDisplaysDataType")
                .as_deref()
                .and_then(parse_gpu_cores),
            total_ram_bytes: sys.total_memory(),
            disk_total_bytes,
            disk_free_bytes,
            os_version: System::os_version().unwrap_or_else(|| "Unknown".to_string()),
            architecture: std::env::consts::ARCH.to_string(),
        }
    }

    /// Fixed readings for running without a real host (M3 Pro, 36 GB).
    pub fn demo() -> Self {
        StaticSystemInfo {
            cpu_model: "Apple M3 Pro".to_string(),
            chip: Some("M3 Pro".to_string()),
            cpu_cores: 12,
            gpu_cores: Some(18),
            total_ram_bytes: 36 * GIB,
            disk_total_bytes: 500 * GIB,
            disk_free_bytes: 280 * GIB,
            os_version: "15.3".to_string(),
            architecture: "aarch64".to_string(),
        }
    }

    /// Detection produced nothing usable for sizing.
    pub fn is_unavailable(&self) -> bool {
        self.total_ram_bytes == 0
    }

    pub fn total_ram_gb(&self) -> f64 {
        self.total_ram_bytes as f64 / GIB as f64
    }
}

/// Host facts that change while running; sampled on a timer.
#[derive(Debug, Clone, serde::Serialize)]
pub struct DynamicSystemInfo {
    pub free_ram_bytes: u64,
    pub memory_pressure: MemoryPressure,
    pub cpu_load_percent: f64,
    pub disk_free_bytes: u64,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl DynamicSystemInfo {
    pub fn sample(sys: &mut System) -> Self {
        sys.refresh_memory();

        let total_bytes = sys.total_memory();
        let available_bytes = sys.available_memory();
        let free_ram_bytes = if available_bytes == 0 && total_bytes > 0 {
            // sysinfo may fail to report available memory on some platforms
            // (newer macOS releases in particular).
            available_ram_fallback(sys, total_bytes)
        } else {
            available_bytes
        };

        let cores = sys.cpus().len().max(1);
        let (_, disk_free_bytes) = root_disk_space();

        DynamicSystemInfo {
            free_ram_bytes,
            memory_pressure: detect_memory_pressure(total_bytes, free_ram_bytes),
            cpu_load_percent: cpu_load_percent(System::load_average().one, cores),
            disk_free_bytes,
            timestamp: chrono::Utc::now(),
        }
    }

    /// Convenience for one-shot callers without a long-lived `System`.
    pub fn detect() -> Self {
        let mut sys = System::new();
        sys.refresh_cpu_all();
        Self::sample(&mut sys)
    }

    pub fn demo() -> Self {
        DynamicSystemInfo {
            free_ram_bytes: (18.4 * GIB as f64) as u64,
            memory_pressure: MemoryPressure::Nominal,
            cpu_load_percent: 12.5,
            disk_free_bytes: 280 * GIB,
            timestamp: chrono::Utc::now(),
        }
    }
}

/// 1-minute load average as a share of all cores, one decimal, capped at 100.
pub fn cpu_load_percent(load_avg_one: f64, cores: usize) -> f64 {
    if cores == 0 || !load_avg_one.is_finite() || load_avg_one <= 0.0 {
        return 0.0;
    }
    let pct = (load_avg_one / cores as f64 * 100.0 * 10.0).round() / 10.0;
    pct.min(100.0)
}

/// Fallback for available RAM when sysinfo returns 0.
/// Tries total - used first, then macOS vm_stat parsing.
fn available_ram_fallback(sys: &System, total_bytes: u64) -> u64 {
    let used = sys.used_memory();
    if used > 0 && used < total_bytes {
        return total_bytes - used;
    }

    if let Some(stat) = read_vm_stat() {
        let avail = stat.reclaimable_bytes();
        if avail > 0 {
            return avail;
        }
    }

    tracing::warn!("could not determine free RAM, assuming 80% of total");
    (total_bytes as f64 * 0.8) as u64
}

fn detect_memory_pressure(total_bytes: u64, free_bytes: u64) -> MemoryPressure {
    if total_bytes == 0 {
        return MemoryPressure::Nominal;
    }
    if let Some(stat) = read_vm_stat() {
        let total_pages = total_bytes as f64 / stat.page_size as f64;
        let available_ratio = (stat.free + stat.inactive) as f64 / total_pages;
        let compressed_ratio = stat.compressed as f64 / total_pages;
        return MemoryPressure::classify(available_ratio, compressed_ratio);
    }
    MemoryPressure::classify(free_bytes as f64 / total_bytes as f64, 0.0)
}

/// Page counts from macOS `vm_stat`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VmStat {
    pub page_size: u64,
    pub free: u64,
    pub inactive: u64,
    pub purgeable: u64,
    pub compressed: u64,
}

impl VmStat {
    /// Available ≈ (free + inactive + purgeable) * page_size
    pub fn reclaimable_bytes(&self) -> u64 {
        self.free
            .saturating_add(self.inactive)
            .saturating_add(self.purgeable)
            .saturating_mul(self.page_size)
    }
}

fn read_vm_stat() -> Option<VmStat> {
    if !cfg!(target_os = "macos") {
        return None;
    }
    let output = std::process::Command::new("vm_stat").output().ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8(output.stdout).ok()?;
    Some(parse_vm_stat(&text))
}

pub fn parse_vm_stat(text: &str) -> VmStat {
    // First line: "Mach Virtual Memory Statistics: (page size of NNNNN bytes)"
    let page_size: u64 = text
        .lines()
        .next()
        .and_then(|line| {
            line.split("page size of ")
                .nth(1)?
                .split(' ')
                .next()?
                .parse()
                .ok()
        })
        .unwrap_or(16384); // Apple Silicon default is 16 KB pages

    let mut stat = VmStat {
        page_size,
        ..VmStat::default()
    };
    for line in text.lines() {
        if let Some(val) = parse_vm_stat_line(line, "Pages free") {
            stat.free = val;
        } else if let Some(val) = parse_vm_stat_line(line, "Pages inactive") {
            stat.inactive = val;
        } else if let Some(val) = parse_vm_stat_line(line, "Pages purgeable") {
            stat.purgeable = val;
        } else if let Some(val) = parse_vm_stat_line(line, "Pages occupied by compressor") {
            stat.compressed = val;
        }
    }
    stat
}

/// Parse a single vm_stat line like "Pages free:    123456."
fn parse_vm_stat_line(line: &str, key: &str) -> Option<u64> {
    if !line.starts_with(key) {
        return None;
    }
    line.split(':')
        .nth(1)?
        .trim()
        .trim_end_matches('.')
        .parse()
        .ok()
}

/// Raw `system_profiler <data_type>` output. macOS only.
fn system_profiler(data_type: &str) -> Option<String> {
    if !cfg!(target_os = "macos") {
        return None;
    }
    let output = std::process::Command::new("system_profiler")
        .arg(data_type)
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8(output.stdout).ok()
}

/// Pull the "Chip:" value out of `system_profiler SPHardwareDataType`.
pub fn parse_chip(text: &str) -> Option<String> {
    text.lines()
        .find_map(|line| line.trim().strip_prefix("Chip:"))
        .map(|chip| chip.trim().to_string())
        .filter(|chip| !chip.is_empty())
}

/// Pull "Total Number of Cores:" out of `system_profiler SPDisplaysDataType`.
pub fn parse_gpu_cores(text: &str) -> Option<u32> {
    text.lines()
        .find_map(|line| line.trim().strip_prefix("Total Number of Cores:"))
        .and_then(|cores| cores.trim().parse().ok())
        .filter(|&cores| cores > 0)
}

/// (total, free) bytes of the root filesystem, or the largest disk when no
/// disk is mounted at "/".
fn root_disk_space() -> (u64, u64) {
    let disks = Disks::new_with_refreshed_list();
    let root = disks
        .list()
        .iter()
        .find(|d| d.mount_point() == std::path::Path::new("/"))
        .or_else(|| disks.list().iter().max_by_key(|d| d.total_space()));
    root.map(|d| (d.total_space(), d.available_space()))
        .unwrap_or((0, 0))
}

/// Parse a human-readable memory size into bytes.
/// Accepts "18.4G", "18.4GB", "16GiB", "512M", "1.5T", "1073741824B".
/// A bare number is read as GB. Units are binary (1G = 1024^3 bytes).
pub fn parse_memory_size(s: &str) -> Option<u64> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    // Split into numeric part and suffix
    let num_end = s
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .unwrap_or(s.len());
    let (num_str, suffix) = s.split_at(num_end);
    let value: f64 = num_str.parse().ok()?;
    if !value.is_finite() || value < 0.0 {
        return None;
    }

    let multiplier = match suffix.trim().to_lowercase().as_str() {
        "b" => 1u64,
        "k" | "kb" | "kib" => 1024,
        "m" | "mb" | "mib" => 1024 * 1024,
        "g" | "gb" | "gib" | "" => GIB,
        "t" | "tb" | "tib" => 1024 * GIB,
        _ => return None,
    };
    Some((value * multiplier as f64).round() as u64)
}
