//! Knowledgebase loader - reads the indicator document from disk

use crate::Knowledgebase;
use kvmscan_core::{Error, Result};
use std::path::Path;
use tracing::info;

/// Load the knowledgebase from a YAML file.
///
/// A missing file or malformed document is fatal: the run cannot match
/// anything without indicators.
pub fn load_knowledgebase(path: impl AsRef<Path>) -> Result<Knowledgebase> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(Error::KnowledgebaseNotFound {
            path: path.display().to_string(),
        });
    }

    info!("Loading indicators from: {}", path.display());
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Configuration(format!("Failed to read indicators {:?}: {}", path, e))
    })?;

    let kb = Knowledgebase::from_yaml(&content)?;
    let stats = kb.stats();
    info!(
        vendors = stats.vendors,
        mac_prefixes = stats.mac_prefixes,
        mdns_names = stats.mdns_names,
        usb_devices = stats.usb_devices,
        "Loaded indicators"
    );
    Ok(kb)
}
