//! SNMP configuration planning and rendering.
//!
//! A [`SnmpPlan`] describes the communities, contact, and location a
//! device should end up with. Rendering turns the plan (or, for replace
//! mode, the device's current [`SnmpState`]) into IOS/NX-OS style
//! `snmp-server` configuration lines via minijinja templates shipped
//! with the crate.

use indexmap::IndexMap;
use minijinja::{Environment, context};
use serde::{Deserialize, Serialize};

use crate::error::RenderError;

const SNMP_CONFIG_TEMPLATE: &str = include_str!("../templates/snmp_config.j2");
const NO_SNMP_CONFIG_TEMPLATE: &str = include_str!("../templates/no_snmp_config.j2");

/// Access mode of an SNMP community string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommunityMode {
    /// Read-only.
    Ro,
    /// Read-write.
    Rw,
}

/// One community string to configure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommunityString {
    /// Access mode.
    #[serde(rename = "type")]
    pub mode: CommunityMode,

    /// The community string itself.
    pub string: String,
}

/// Desired SNMP configuration for a device.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnmpPlan {
    /// Community strings to configure.
    pub communities: Vec<CommunityString>,

    /// SNMP contact, if any.
    pub contact: Option<String>,

    /// SNMP location, if any.
    pub location: Option<String>,

    /// Tear down the device's current SNMP config before applying the
    /// plan, instead of merging into it.
    pub replace: bool,
}

impl SnmpPlan {
    /// Plan with one or more communities and nothing else.
    pub fn with_communities(communities: Vec<CommunityString>) -> Self {
        Self {
            communities,
            ..Self::default()
        }
    }
}

/// One community as reported by a device.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnmpCommunity {
    /// Access list bound to the community, empty when none.
    #[serde(default)]
    pub acl: String,

    /// Access mode as the driver reports it (`ro`/`rw`).
    #[serde(default)]
    pub mode: String,
}

/// A device's current SNMP configuration, as returned by
/// [`DeviceSession::get_snmp`](crate::session::DeviceSession::get_snmp).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnmpState {
    /// Configured communities keyed by community string.
    #[serde(default)]
    pub communities: IndexMap<String, SnmpCommunity>,

    /// Configured contact, empty when unset.
    #[serde(default)]
    pub contact: String,

    /// Configured location, empty when unset.
    #[serde(default)]
    pub location: String,
}

fn environment() -> Result<Environment<'static>, RenderError> {
    let mut env = Environment::new();
    env.add_template("snmp_config", SNMP_CONFIG_TEMPLATE)?;
    env.add_template("no_snmp_config", NO_SNMP_CONFIG_TEMPLATE)?;
    Ok(env)
}

/// Render the target SNMP configuration for a plan.
pub fn render_snmp_config(plan: &SnmpPlan) -> Result<String, RenderError> {
    let env = environment()?;
    let rendered = env
        .get_template("snmp_config")?
        .render(context! { data => plan })?;
    Ok(rendered)
}

/// Render the teardown configuration that removes a device's current
/// SNMP state. Used by replace mode before the target config goes on.
pub fn render_snmp_teardown(state: &SnmpState) -> Result<String, RenderError> {
    let env = environment()?;
    let rendered = env
        .get_template("no_snmp_config")?
        .render(context! { data => state })?;
    Ok(rendered)
}
