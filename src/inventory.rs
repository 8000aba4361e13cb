//! Device inventory: typed devices loaded from a YAML document.
//!
//! The inventory document has a top-level `devices` mapping from device
//! name to connection parameters:
//!
//! ```yaml
//! devices:
//!   r1:
//!     device_type: ios
//!     host: 10.0.0.1
//!   r2:
//!     device_type: junos
//!     host: 10.0.0.2
//!     port: 2022
//! ```
//!
//! Credentials are never stored in the document; the caller injects a
//! [`Credentials`] struct at load time. Loading does no network I/O and
//! the resulting [`Inventory`] is read-only for the rest of the run.

use std::fmt;
use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use log::debug;
use secrecy::SecretString;
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer};

use crate::error::InventoryError;

/// Credentials shared by every device in an inventory.
///
/// Passed explicitly into the loader; the password never appears in
/// `Debug` output.
#[derive(Debug, Clone)]
pub struct Credentials {
    /// Login username.
    pub username: String,

    /// Login password.
    pub password: SecretString,
}

impl Credentials {
    /// Create credentials from a username and password.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: SecretString::from(password.into()),
        }
    }
}

/// Driver kind a device is managed with.
///
/// Only kinds with a known driver are accepted; an unrecognized
/// `device_type` in the inventory is a load-time error, not a runtime
/// surprise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceType {
    /// Cisco IOS / IOS-XE
    Ios,
    /// Cisco NX-OS
    Nxos,
    /// Juniper Junos
    Junos,
    /// Arista EOS
    Eos,
}

impl DeviceType {
    /// Parse a device type from its inventory spelling.
    ///
    /// Accepts both the short driver names and the common
    /// `vendor_os` spellings.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ios" | "cisco_ios" | "cisco_xe" => Some(Self::Ios),
            "nxos" | "nxos_ssh" | "cisco_nxos" => Some(Self::Nxos),
            "junos" | "juniper" | "juniper_junos" => Some(Self::Junos),
            "eos" | "arista_eos" => Some(Self::Eos),
            _ => None,
        }
    }

    /// Canonical driver name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ios => "ios",
            Self::Nxos => "nxos",
            Self::Junos => "junos",
            Self::Eos => "eos",
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single network device: the unit the engine fans out over.
///
/// Immutable after load.
#[derive(Debug, Clone)]
pub struct Device {
    /// Unique device name (the inventory key).
    pub name: String,

    /// Driver kind.
    pub device_type: DeviceType,

    /// Hostname or IP address.
    pub host: String,

    /// Login credentials.
    pub credentials: Credentials,

    /// Extra connection parameters passed through to the session
    /// factory (port, enable secret, ...). Scalars only.
    pub extra: IndexMap<String, String>,
}

/// Ordered mapping from device name to [`Device`].
#[derive(Debug, Clone, Default)]
pub struct Inventory {
    devices: IndexMap<String, Device>,
}

/// On-disk shape of the inventory document.
///
/// `devices` is collected as raw entries rather than a map: a map
/// target would let a repeated device name silently overwrite its
/// predecessor, and uniqueness must be validated, not assumed.
#[derive(Debug, Deserialize)]
struct RawDocument {
    #[serde(deserialize_with = "device_entries")]
    devices: Vec<(String, RawDevice)>,
}

#[derive(Debug, Deserialize)]
struct RawDevice {
    device_type: String,
    host: String,
    #[serde(flatten)]
    extra: IndexMap<String, serde_yaml::Value>,
}

impl Inventory {
    /// Build an inventory from already-constructed devices.
    ///
    /// Rejects duplicate device names.
    pub fn from_devices(
        devices: impl IntoIterator<Item = Device>,
    ) -> Result<Self, InventoryError> {
        let mut map = IndexMap::new();
        for device in devices {
            if map.contains_key(&device.name) {
                return Err(InventoryError::DuplicateDeviceName { name: device.name });
            }
            map.insert(device.name.clone(), device);
        }
        Ok(Self { devices: map })
    }

    /// Load an inventory document from a file.
    pub fn load(
        path: impl AsRef<Path>,
        credentials: &Credentials,
    ) -> Result<Self, InventoryError> {
        let path = path.as_ref();
        debug!("reading inventory from {}", path.display());
        let text = fs::read_to_string(path).map_err(|source| InventoryError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&text, credentials)
    }

    /// Parse an inventory from YAML text.
    pub fn from_yaml(text: &str, credentials: &Credentials) -> Result<Self, InventoryError> {
        let raw: RawDocument =
            serde_yaml::from_str(text).map_err(|err| InventoryError::MalformedSource {
                message: err.to_string(),
            })?;

        let mut devices = Vec::with_capacity(raw.devices.len());
        for (name, raw_device) in raw.devices {
            let device_type = DeviceType::parse(&raw_device.device_type).ok_or_else(|| {
                InventoryError::UnknownDeviceType {
                    name: name.clone(),
                    device_type: raw_device.device_type.clone(),
                }
            })?;

            let mut extra = IndexMap::new();
            for (key, value) in raw_device.extra {
                let scalar = scalar_to_string(&value).ok_or_else(|| {
                    InventoryError::MalformedSource {
                        message: format!(
                            "device '{name}': parameter '{key}' must be a scalar"
                        ),
                    }
                })?;
                extra.insert(key, scalar);
            }

            devices.push(Device {
                name,
                device_type,
                host: raw_device.host,
                credentials: credentials.clone(),
                extra,
            });
        }

        Self::from_devices(devices)
    }

    /// Look up a device by name.
    pub fn get(&self, name: &str) -> Option<&Device> {
        self.devices.get(name)
    }

    /// Number of devices.
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// True when the inventory holds no devices.
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Iterate devices in document order.
    pub fn iter(&self) -> impl Iterator<Item = &Device> {
        self.devices.values()
    }

    /// Device names in document order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.devices.keys().map(String::as_str)
    }
}

/// Collect the `devices` mapping as raw entries, keeping repeated
/// names so [`Inventory::from_devices`] can reject them by name.
fn device_entries<'de, D>(deserializer: D) -> Result<Vec<(String, RawDevice)>, D::Error>
where
    D: Deserializer<'de>,
{
    struct EntriesVisitor;

    impl<'de> Visitor<'de> for EntriesVisitor {
        type Value = Vec<(String, RawDevice)>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a mapping of device name to connection parameters")
        }

        fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
            while let Some(entry) = access.next_entry()? {
                entries.push(entry);
            }
            Ok(entries)
        }
    }

    deserializer.deserialize_map(EntriesVisitor)
}

fn scalar_to_string(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds() -> Credentials {
        Credentials::new("admin", "secret")
    }

    #[test]
    fn test_load_valid_inventory() {
        let yaml = r#"
devices:
  r1:
    device_type: ios
    host: 10.0.0.1
  r2:
    device_type: junos
    host: 10.0.0.2
    port: 2022
"#;
        let inventory = Inventory::from_yaml(yaml, &creds()).unwrap();
        assert_eq!(inventory.len(), 2);

        let r1 = inventory.get("r1").unwrap();
        assert_eq!(r1.device_type, DeviceType::Ios);
        assert_eq!(r1.host, "10.0.0.1");
        assert_eq!(r1.credentials.username, "admin");

        // scalar extras are coerced to strings
        let r2 = inventory.get("r2").unwrap();
        assert_eq!(r2.extra.get("port").map(String::as_str), Some("2022"));
    }

    #[test]
    fn test_document_order_preserved() {
        let yaml = r#"
devices:
  zulu:
    device_type: ios
    host: 10.0.0.1
  alpha:
    device_type: eos
    host: 10.0.0.2
"#;
        let inventory = Inventory::from_yaml(yaml, &creds()).unwrap();
        let names: Vec<&str> = inventory.names().collect();
        assert_eq!(names, vec!["zulu", "alpha"]);
    }

    #[test]
    fn test_unknown_device_type_rejected() {
        let yaml = r#"
devices:
  r1:
    device_type: vyos
    host: 10.0.0.1
"#;
        let err = Inventory::from_yaml(yaml, &creds()).unwrap_err();
        assert!(matches!(
            err,
            InventoryError::UnknownDeviceType { ref name, ref device_type }
                if name == "r1" && device_type == "vyos"
        ));
    }

    #[test]
    fn test_duplicate_device_name_rejected() {
        let device = Device {
            name: "r1".to_string(),
            device_type: DeviceType::Ios,
            host: "10.0.0.1".to_string(),
            credentials: creds(),
            extra: IndexMap::new(),
        };
        let err = Inventory::from_devices(vec![device.clone(), device]).unwrap_err();
        assert!(matches!(err, InventoryError::DuplicateDeviceName { ref name } if name == "r1"));
    }

    #[test]
    fn test_duplicate_yaml_device_name_rejected() {
        // the second r1 must fail the load, not silently win
        let yaml = r#"
devices:
  r1:
    device_type: ios
    host: 10.0.0.1
  r1:
    device_type: junos
    host: 10.0.0.2
"#;
        let err = Inventory::from_yaml(yaml, &creds()).unwrap_err();
        assert!(matches!(err, InventoryError::DuplicateDeviceName { ref name } if name == "r1"));
    }

    #[test]
    fn test_malformed_document_rejected() {
        let err = Inventory::from_yaml("devices: [not, a, mapping]", &creds()).unwrap_err();
        assert!(matches!(err, InventoryError::MalformedSource { .. }));
    }

    #[test]
    fn test_non_scalar_extra_rejected() {
        let yaml = r#"
devices:
  r1:
    device_type: ios
    host: 10.0.0.1
    tags:
      - core
"#;
        let err = Inventory::from_yaml(yaml, &creds()).unwrap_err();
        assert!(matches!(err, InventoryError::MalformedSource { .. }));
    }

    #[test]
    fn test_device_type_spellings() {
        assert_eq!(DeviceType::parse("cisco_ios"), Some(DeviceType::Ios));
        assert_eq!(DeviceType::parse("juniper_junos"), Some(DeviceType::Junos));
        assert_eq!(DeviceType::parse("arista_eos"), Some(DeviceType::Eos));
        assert_eq!(DeviceType::parse("nxos_ssh"), Some(DeviceType::Nxos));
        assert_eq!(DeviceType::parse("slurm"), None);
    }

    #[test]
    fn test_password_not_in_debug_output() {
        let debugged = format!("{:?}", creds());
        assert!(!debugged.contains("secret"));
    }
}
