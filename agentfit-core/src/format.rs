//! Human-readable renderings shared by the CLI tables, JSON and the TUI.

use crate::models::GIB;

const KIB: f64 = 1024.0;
const MIB: f64 = 1024.0 * 1024.0;

/// "512 B", "12 KB", "800 MB", "18.4 GB". Binary units.
pub fn format_bytes(bytes: f64) -> String {
    let gib = GIB as f64;
    if bytes < KIB {
        format!("{:.0} B", bytes)
    } else if bytes < MIB {
        format!("{:.0} KB", bytes / KIB)
    } else if bytes < gib {
        format!("{:.0} MB", bytes / MIB)
    } else {
        format!("{:.1} GB", bytes / gib)
    }
}

/// Signed headroom as "+X free" or "X deficit".
pub fn format_headroom(headroom_bytes: f64) -> String {
    if headroom_bytes >= 0.0 {
        format!("+{} free", format_bytes(headroom_bytes))
    } else {
        format!("{} deficit", format_bytes(-headroom_bytes))
    }
}

/// Compact context length, e.g. 8192 -> "8k", 2048 -> "2k", 1000 -> "1000".
pub fn format_context(context_length: u32) -> String {
    if context_length >= 1024 && context_length % 1024 == 0 {
        format!("{}k", context_length / 1024)
    } else {
        context_length.to_string()
    }
}

pub fn format_context_options(options: &[u32]) -> String {
    options
        .iter()
        .map(|&c| format_context(c))
        .collect::<Vec<_>>()
        .join("/")
}

pub fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

pub fn bytes_to_gb(bytes: f64) -> f64 {
    bytes / GIB as f64
}
