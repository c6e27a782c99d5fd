use std::path::Path;
use std::sync::LazyLock;

use anyhow::Result;
use chrono::{DateTime, Local};
use log::{error, info};
use regex::Regex;
use tokio::fs;

static HEX_ADDRESS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9A-Fa-f]+$").expect("static address pattern"));
static HEX_PAIR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9A-Fa-f]{2}").expect("static byte pattern"));

/// Asynchronously ensures that a directory exists, creating it if it does not.
/// This function is idempotent.
pub async fn ensure_directory_exists<P: AsRef<Path>>(path: P) -> Result<()> {
    let path = path.as_ref();
    if !path.exists() {
        if let Err(e) = fs::create_dir_all(path).await {
            error!("Failed to create directory at {:?}: {}", path, e);
            return Err(e.into());
        }
        info!("Created directory at: {:?}", path);
    }
    Ok(())
}

/// Formats a raw little-endian hex address as `AA:BB:CC:DD:EE:FF`.
/// Anything that is not a hex string longer than one byte is returned unchanged.
pub fn format_address(raw: &str) -> String {
    if raw.len() <= 2 || !HEX_ADDRESS.is_match(raw) {
        return raw.to_string();
    }
    let padded = if raw.len() % 2 == 1 {
        format!("0{}", raw)
    } else {
        raw.to_string()
    };
    let mut bytes: Vec<&str> = HEX_PAIR.find_iter(&padded).map(|m| m.as_str()).collect();
    bytes.reverse();
    bytes.join(":").to_uppercase()
}

/// Local time as `yyyy-mm-ddThh:mm:ss.sss`
pub fn format_local_time(secs: i64, micros: u32) -> String {
    match DateTime::from_timestamp(secs, micros.saturating_mul(1000)) {
        Some(utc) => utc
            .with_timezone(&Local)
            .format("%Y-%m-%dT%H:%M:%S%.3f")
            .to_string(),
        None => format!("{}.{:06}", secs, micros),
    }
}
