//! Selection and filter layer.
//!
//! Derives the operator-visible device list (search-filtered, in published
//! order) and the current selection from the fleet cache's output.

use super::fleet::DeviceState;

/// Normalize a search term: trimmed and case-folded.
pub fn normalize_query(query: &str) -> String {
    query.trim().to_lowercase()
}

/// Case-insensitive substring match of an already-normalized query.
///
/// An empty query matches everything.
pub fn matches_query(device_id: &str, normalized_query: &str) -> bool {
    normalized_query.is_empty() || device_id.to_lowercase().contains(normalized_query)
}

/// Filter a sorted device list, preserving its order.
pub fn filter_devices(devices: &[DeviceState], query: &str) -> Vec<DeviceState> {
    let query = normalize_query(query);
    devices.iter().filter(|d| matches_query(&d.device_id, &query)).cloned().collect()
}

/// Snapshot of what the operator sees.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FleetView {
    /// Filtered devices, active first then most recently seen.
    pub devices: Vec<DeviceState>,
    /// Number of devices before filtering.
    pub total: usize,
    /// Number of active devices before filtering.
    pub active: usize,
    /// The current selection, which may name an unknown device.
    pub selected: Option<String>,
    /// State of the selected device, if it is known.
    pub selected_state: Option<DeviceState>,
}

impl FleetView {
    pub fn derive(devices: &[DeviceState], query: &str, selected: Option<&str>) -> Self {
        let selected_state = selected
            .and_then(|id| devices.iter().find(|d| d.device_id == id))
            .cloned();

        Self {
            devices: filter_devices(devices, query),
            total: devices.len(),
            active: devices.iter().filter(|d| d.active).count(),
            selected: selected.map(str::to_string),
            selected_state,
        }
    }

    /// Position of the selected device in the filtered list.
    pub fn selected_index(&self) -> Option<usize> {
        let selected = self.selected.as_deref()?;
        self.devices.iter().position(|d| d.device_id == selected)
    }

    pub fn inactive(&self) -> usize {
        self.total - self.active
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::fleet::LastKnown;

    fn device(id: &str, active: bool) -> DeviceState {
        DeviceState {
            device_id: id.to_string(),
            last: LastKnown::default(),
            last_seen_ms: 0,
            active,
        }
    }

    #[test]
    fn test_substring_match_is_case_insensitive() {
        assert!(matches_query("70B3D57E", "b3d5"));
        assert!(matches_query("70B3D57E", &normalize_query(" B3D5 ")));
        assert!(!matches_query("70B3D57E", "ffff"));
    }

    #[test]
    fn test_empty_query_is_unfiltered() {
        let devices = vec![device("a", true), device("b", false)];
        assert_eq!(filter_devices(&devices, ""), devices);
        assert_eq!(filter_devices(&devices, "   "), devices);
    }

    #[test]
    fn test_filter_preserves_order() {
        let devices = vec![device("drone-2", true), device("buoy", true), device("Drone-1", false)];
        let filtered = filter_devices(&devices, "DRONE");
        let ids: Vec<_> = filtered.iter().map(|d| d.device_id.as_str()).collect();
        assert_eq!(ids, vec!["drone-2", "Drone-1"]);
    }

    #[test]
    fn test_view_with_unknown_selection() {
        let devices = vec![device("a", true), device("b", false)];
        let view = FleetView::derive(&devices, "", Some("zzz"));

        assert_eq!(view.total, 2);
        assert_eq!(view.active, 1);
        assert_eq!(view.inactive(), 1);
        assert_eq!(view.selected.as_deref(), Some("zzz"));
        assert!(view.selected_state.is_none());
        assert!(view.selected_index().is_none());
    }

    #[test]
    fn test_selected_state_survives_filtering() {
        let devices = vec![device("alpha", true), device("beta", true)];
        let view = FleetView::derive(&devices, "alp", Some("beta"));

        assert_eq!(view.devices.len(), 1);
        assert_eq!(view.selected_state.as_ref().map(|d| d.device_id.as_str()), Some("beta"));
        assert_eq!(view.selected_index(), None);
    }
}
