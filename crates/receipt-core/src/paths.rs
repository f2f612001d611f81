use crate::error::{ReceiptError, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const RECEIPTS_DIR: &str = ".receipts";
pub const CONFIG_FILE: &str = ".receipts/config.yaml";
pub const RESPONSES_FILE: &str = ".receipts/responses.yaml";
pub const TEMPLATE_FILE: &str = ".receipts/template.yaml";

pub fn receipts_dir(root: &Path) -> PathBuf {
    root.join(RECEIPTS_DIR)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn responses_path(root: &Path) -> PathBuf {
    root.join(RESPONSES_FILE)
}

pub fn template_path(root: &Path) -> PathBuf {
    root.join(TEMPLATE_FILE)
}

/// Resolve a configured directory: absolute paths win, relative ones hang off `root`.
pub fn resolve(root: &Path, configured: &str) -> PathBuf {
    let p = Path::new(configured);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        root.join(p)
    }
}

// ---------------------------------------------------------------------------
// A1 references
// ---------------------------------------------------------------------------

static A1_RE: OnceLock<Regex> = OnceLock::new();

fn a1_re() -> &'static Regex {
    A1_RE.get_or_init(|| Regex::new(r"^([A-Z]{1,3})([1-9][0-9]{0,6})$").unwrap())
}

/// Parse an `A1`-style reference into 1-based `(row, col)`.
pub fn parse_a1(reference: &str) -> Result<(u32, u32)> {
    let upper = reference.trim().to_ascii_uppercase();
    let caps = a1_re()
        .captures(&upper)
        .ok_or_else(|| ReceiptError::InvalidA1(reference.to_string()))?;
    let col = caps[1]
        .bytes()
        .fold(0u32, |acc, b| acc * 26 + u32::from(b - b'A' + 1));
    let row: u32 = caps[2]
        .parse()
        .map_err(|_| ReceiptError::InvalidA1(reference.to_string()))?;
    Ok((row, col))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_template_positions() {
        assert_eq!(parse_a1("C8").unwrap(), (8, 3));
        assert_eq!(parse_a1("H8").unwrap(), (8, 8));
        assert_eq!(parse_a1("j24").unwrap(), (24, 10));
        assert_eq!(parse_a1("AA1").unwrap(), (1, 27));
    }

    #[test]
    fn rejects_malformed_references() {
        for bad in ["", "8C", "C0", "C", "12", "C8:D9"] {
            assert!(parse_a1(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn resolve_keeps_absolute_paths() {
        let root = Path::new("/srv/receipts");
        assert_eq!(resolve(root, "outbox"), root.join("outbox"));
        assert_eq!(resolve(root, "/var/mail"), PathBuf::from("/var/mail"));
    }
}
