use std::collections::BTreeMap;

/// Reserved selector for the system default device.
///
/// Never stored in a [`DeviceList`] body, always a valid selector.
pub const DEFAULT_DEVICE_INDEX: i32 = -1;

/// Display name returned by [`AudioCapture::audio_device_name`](crate::AudioCapture::audio_device_name)
/// while the default device is selected.
pub const SYSTEM_DEFAULT_NAME: &str = "System Default";

/// A raw endpoint as reported by a backend, before ordinals are assigned.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    /// Opaque backend identifier, stable across enumerations.
    pub id: String,
    pub name: String,
    /// Playback endpoint that is opened in loopback mode.
    pub is_loopback: bool,
}

impl Endpoint {
    pub fn new(id: impl Into<String>, name: impl Into<String>, is_loopback: bool) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            is_loopback,
        }
    }
}

/// An audio device available for capture, with its ordinal in one snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioDevice {
    pub index: i32,
    pub name: String,
    pub is_loopback: bool,
    pub id: String,
}

/// What a capture session should open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceTarget {
    /// The OS default. Loopback-first backends open the default render endpoint.
    Default,
    Device(AudioDevice),
}

impl DeviceTarget {
    pub fn index(&self) -> i32 {
        match self {
            Self::Default => DEFAULT_DEVICE_INDEX,
            Self::Device(device) => device.index,
        }
    }
}

/// Stream parameters granted by the OS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamFormat {
    pub channels: u16,
    pub sample_rate: u32,
}

/// Stream parameters a caller asks for. Backends may grant something else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamRequest {
    pub sample_rate: u32,
    pub channels: u16,
    /// Preferred callback size in frames, for push backends.
    pub buffer_frames: u32,
}

/// Direction of an endpoint, as carried by default-device notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataFlow {
    Render,
    Capture,
}

/// Role of a default endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceRole {
    Console,
    Multimedia,
    Communications,
}

/// New state reported by a device state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceState {
    Active,
    Disabled,
    NotPresent,
    Unplugged,
}

/// An ordered device snapshot.
///
/// Ordinals are only valid until the next enumeration. Holders must
/// re-validate an index against a fresh list after any hot-plug event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceList {
    default_name: String,
    devices: Vec<AudioDevice>,
}

impl DeviceList {
    /// Builds a list from endpoints, assigning ordinals in iteration order.
    pub fn from_endpoints<I>(default_name: impl Into<String>, endpoints: I) -> Self
    where
        I: IntoIterator<Item = Endpoint>,
    {
        let devices = endpoints
            .into_iter()
            .enumerate()
            .map(|(i, ep)| AudioDevice {
                index: i as i32,
                name: ep.name,
                is_loopback: ep.is_loopback,
                id: ep.id,
            })
            .collect();
        Self {
            default_name: default_name.into(),
            devices,
        }
    }

    /// The degraded list used when enumeration fails.
    pub fn default_only(default_name: impl Into<String>) -> Self {
        Self {
            default_name: default_name.into(),
            devices: Vec::new(),
        }
    }

    /// Number of enumerated devices, not counting the default entry.
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn default_name(&self) -> &str {
        &self.default_name
    }

    /// Device at `index`. The default selector has no entry here.
    pub fn get(&self, index: i32) -> Option<&AudioDevice> {
        if index < 0 {
            return None;
        }
        self.devices.get(index as usize)
    }

    /// Whether `index` is a valid selector for this snapshot. `-1` always is.
    pub fn contains_index(&self, index: i32) -> bool {
        index == DEFAULT_DEVICE_INDEX || self.get(index).is_some()
    }

    /// List display name for `index`, including the default entry.
    pub fn name_of(&self, index: i32) -> Option<&str> {
        if index == DEFAULT_DEVICE_INDEX {
            return Some(&self.default_name);
        }
        self.get(index).map(|d| d.name.as_str())
    }

    /// Exact, case-sensitive name lookup. The first match wins.
    pub fn index_of_name(&self, name: &str) -> Option<i32> {
        self.devices.iter().find(|d| d.name == name).map(|d| d.index)
    }

    pub fn index_of_id(&self, id: &str) -> Option<i32> {
        self.devices.iter().find(|d| d.id == id).map(|d| d.index)
    }

    /// Resolves `index` to an open target. Out-of-range indices resolve to the default.
    pub fn target(&self, index: i32) -> DeviceTarget {
        match self.get(index) {
            Some(device) => DeviceTarget::Device(device.clone()),
            None => DeviceTarget::Default,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &AudioDevice> {
        self.devices.iter()
    }

    /// Index/name pairs for UI menus, default entry first.
    pub fn entries(&self) -> BTreeMap<i32, String> {
        let mut map = BTreeMap::new();
        map.insert(DEFAULT_DEVICE_INDEX, self.default_name.clone());
        for device in &self.devices {
            map.insert(device.index, device.name.clone());
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_list() -> DeviceList {
        DeviceList::from_endpoints(
            "Default",
            vec![
                Endpoint::new("{render-1}", "Speakers (loopback)", true),
                Endpoint::new("{capture-1}", "Microphone", false),
            ],
        )
    }

    #[test]
    fn ordinals_follow_endpoint_order() {
        let list = sample_list();

        assert_eq!(list.len(), 2);
        assert_eq!(list.get(0).map(|d| d.name.as_str()), Some("Speakers (loopback)"));
        assert_eq!(list.get(1).map(|d| d.index), Some(1));
        assert!(list.get(2).is_none());
    }

    #[test]
    fn default_index_is_always_valid() {
        let list = DeviceList::default_only("Default");

        assert!(list.contains_index(DEFAULT_DEVICE_INDEX));
        assert!(!list.contains_index(0));
        assert_eq!(list.name_of(DEFAULT_DEVICE_INDEX), Some("Default"));
        assert!(list.get(DEFAULT_DEVICE_INDEX).is_none());
    }

    #[test]
    fn name_lookup_is_case_sensitive() {
        let list = sample_list();

        assert_eq!(list.index_of_name("Microphone"), Some(1));
        assert_eq!(list.index_of_name("microphone"), None);
    }

    #[test]
    fn id_lookup() {
        let list = sample_list();

        assert_eq!(list.index_of_id("{capture-1}"), Some(1));
        assert_eq!(list.index_of_id("{gone}"), None);
    }

    #[test]
    fn out_of_range_target_is_default() {
        let list = sample_list();

        assert_eq!(list.target(5), DeviceTarget::Default);
        assert_eq!(list.target(-1), DeviceTarget::Default);
        assert_eq!(list.target(1).index(), 1);
    }

    #[test]
    fn entries_include_default_first() {
        let entries = sample_list().entries();
        let keys: Vec<i32> = entries.keys().copied().collect();

        assert_eq!(keys, vec![-1, 0, 1]);
        assert_eq!(entries[&-1], "Default");
    }
}
