//! Histogram export interface.
//!
//! Writing arrays to disk is owned by an external collaborator; the
//! controller only composes the key each array is filed under:
//! `{kind}_{run_name}_{tag}_{host}_{pid}`, where `tag` is typically a field
//! size (`100x100`) or a beam index.

/// Receives named histogram arrays for persistence.
pub trait HistogramSink {
    fn save(&mut self, key: &str, data: &[f64]) -> std::io::Result<()>;
}

/// Compose the export key for one histogram array.
pub fn histogram_key(kind: &str, run_name: &str, tag: &str, host: &str, pid: u32) -> String {
    format!("{kind}_{run_name}_{tag}_{host}_{pid}")
}

/// Best-effort host name for export keys.
pub fn host_name() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_layout_is_stable() {
        assert_eq!(
            histogram_key("energy", "calibration_6.0_2.0", "100x100", "node07", 4242),
            "energy_calibration_6.0_2.0_100x100_node07_4242"
        );
    }

    #[test]
    fn host_name_never_empty() {
        assert!(!host_name().is_empty());
    }
}
