//! Per-device-type operational command table.

use indexmap::IndexMap;

use crate::inventory::DeviceType;

/// Default command used when a device type has no table entry.
pub const DEFAULT_BACKUP_COMMAND: &str = "show running-config";

/// Maps a device type to the operational command that dumps its
/// running configuration, with a global fallback so resolution is
/// total: an unmapped type gets the fallback, never an error.
#[derive(Debug, Clone)]
pub struct CommandTable {
    commands: IndexMap<DeviceType, String>,
    fallback: String,
}

impl Default for CommandTable {
    fn default() -> Self {
        let mut commands = IndexMap::new();
        commands.insert(DeviceType::Ios, DEFAULT_BACKUP_COMMAND.to_string());
        commands.insert(DeviceType::Nxos, DEFAULT_BACKUP_COMMAND.to_string());
        commands.insert(DeviceType::Eos, DEFAULT_BACKUP_COMMAND.to_string());
        commands.insert(
            DeviceType::Junos,
            "show configuration | display set".to_string(),
        );
        Self {
            commands,
            fallback: DEFAULT_BACKUP_COMMAND.to_string(),
        }
    }
}

impl CommandTable {
    /// An empty table: every type resolves to the fallback.
    pub fn empty(fallback: impl Into<String>) -> Self {
        Self {
            commands: IndexMap::new(),
            fallback: fallback.into(),
        }
    }

    /// Set or override the command for a device type.
    pub fn set(&mut self, device_type: DeviceType, command: impl Into<String>) -> &mut Self {
        self.commands.insert(device_type, command.into());
        self
    }

    /// Resolve the command for a device type.
    pub fn command_for(&self, device_type: DeviceType) -> &str {
        self.commands
            .get(&device_type)
            .map_or(self.fallback.as_str(), String::as_str)
    }

    /// The fallback command.
    pub fn fallback(&self) -> &str {
        &self.fallback
    }
}
