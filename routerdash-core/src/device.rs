//! Device directory rules: ordering, visibility and selection policy.

use crate::model::{Device, Msisdn};

/// Sort key: lowercased trimmed alias, or the raw msisdn when unaliased
fn sort_key(d: &Device) -> String {
    let name = d.alias();
    if name.is_empty() {
        d.msisdn.clone()
    } else {
        name.to_lowercase()
    }
}

/// Stable, case-insensitive ordering by alias (msisdn fallback).
pub fn sort_devices(mut list: Vec<Device>) -> Vec<Device> {
    // sort_by_cached_key is stable, so ties keep backend order
    list.sort_by_cached_key(sort_key);
    list
}

/// Devices shown in the picker given the dormant filter
pub fn visible_devices(devices: &[Device], show_dormant: bool) -> Vec<&Device> {
    devices
        .iter()
        .filter(|d| show_dormant || !d.dormant)
        .collect()
}

/// Devices included in the all-devices RSSI view
pub fn active_devices(devices: &[Device], show_dormant: bool) -> Vec<&Device> {
    visible_devices(devices, show_dormant)
        .into_iter()
        .filter(|d| d.is_active())
        .collect()
}

/// Pick the device to select after a list refresh.
///
/// An explicit target always wins. Otherwise the first active device, then
/// the first device in sorted order.
pub fn default_selection(list: &[Device], explicit: Option<&str>) -> Option<Msisdn> {
    if let Some(target) = explicit.filter(|t| !t.is_empty()) {
        return Some(target.to_string());
    }
    list.iter()
        .find(|d| d.is_active())
        .or_else(|| list.first())
        .map(|d| d.msisdn.clone())
}

/// Outcome of checking the selection against the visible set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SelectionFix {
    /// Selection is visible (or already empty with nothing to show)
    Keep,
    /// Selection moved to this device; the page cursor goes back to 1
    Reset(Msisdn),
    /// Nothing visible; selection cleared and fetches suppressed
    Clear,
}

pub fn reconcile_selection(visible: &[&Device], current: Option<&str>) -> SelectionFix {
    let Some(first) = visible.first() else {
        return if current.is_some() {
            SelectionFix::Clear
        } else {
            SelectionFix::Keep
        };
    };

    match current {
        Some(id) if visible.iter().any(|d| d.msisdn == id) => SelectionFix::Keep,
        _ => SelectionFix::Reset(first.msisdn.clone()),
    }
}
