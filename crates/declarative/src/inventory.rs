//! Inventory scanner

use crate::context::HostControl;
use crate::error::{Error, Result};
use crate::types::InventoryEntry;

/// Read the host's full resource table.
///
/// Any failure is fatal: decisions are never made on partial inventory.
pub fn scan<H: HostControl + ?Sized>(host: &H) -> Result<Vec<InventoryEntry>> {
    let mut entries = host
        .scan()
        .map_err(|e| Error::HostQuery(format!("{e:#}")))?;
    entries.sort_by_key(|e| e.id);

    if let Some(pair) = entries.windows(2).find(|w| w[0].id == w[1].id) {
        return Err(Error::HostQuery(format!(
            "host reports id {} twice ({} and {})",
            pair[0].id, pair[0].kind, pair[1].kind
        )));
    }

    log::debug!("scanned {} resource(s)", entries.len());
    Ok(entries)
}
