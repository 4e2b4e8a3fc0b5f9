//! Device schemas: which power rails a Jetson family reports and how
//! `tegrastats` encodes them.
//!
//! Each [`DeviceSchema`] encodes exactly one [`LineConvention`]. Adding a
//! device is a new entry in the registry table, not new control flow.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{MonitorError, Result};

/// Numeric-suffix convention used by a device family's diagnostics output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineConvention {
    /// `NAME <value>mW`, optionally followed by `/<limit>mW`.
    /// Emitted by JetPack 5+ on Orin modules.
    MilliwattPair,
    /// `NAME <value>/<average>` with no unit suffix.
    /// Emitted by older JetPack releases on Nano and Xavier.
    SlashAverage,
}

impl LineConvention {
    /// Build the pattern for one rail token under this convention.
    ///
    /// The rail token must be preceded by whitespace or the line start, so
    /// `CPU` never matches inside `VDD_CPU_CV`. The single capture group
    /// grabs the raw value text; numeric validation happens in the extractor.
    fn pattern_for(self, rail: &str) -> String {
        let token = regex::escape(rail);
        match self {
            Self::MilliwattPair => format!(r"(?:^|\s){token}\s+(\S+?)mW(?:/|\s|$)"),
            Self::SlashAverage => format!(r"(?:^|\s){token}\s+([^\s/]+)/\S+"),
        }
    }
}

impl std::fmt::Display for LineConvention {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MilliwattPair => write!(f, "NAME <mW>mW/<mW>mW"),
            Self::SlashAverage => write!(f, "NAME <mW>/<avg>"),
        }
    }
}

/// A single named power rail and the compiled pattern that locates its value.
///
/// Values are always milliwatts.
#[derive(Debug, Clone)]
pub struct RailSpec {
    name: String,
    pattern: Regex,
}

impl RailSpec {
    /// Rail identifier as printed by the diagnostics tool (e.g. `"VDD_GPU_SOC"`).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Compiled matcher with exactly one capture group for the value.
    pub fn pattern(&self) -> &Regex {
        &self.pattern
    }

    /// Unit of every value captured for this rail.
    pub fn unit(&self) -> &'static str {
        "mW"
    }
}

/// Ordered set of rails for one device family.
#[derive(Debug, Clone)]
pub struct DeviceSchema {
    tag: String,
    convention: LineConvention,
    rails: Vec<RailSpec>,
}

impl DeviceSchema {
    /// Build a schema from rail names. Names must be non-empty and unique.
    pub fn new<S: AsRef<str>>(
        tag: impl Into<String>,
        convention: LineConvention,
        rail_names: &[S],
    ) -> Result<Self> {
        let tag = tag.into();
        if rail_names.is_empty() {
            return Err(MonitorError::InvalidSchema(format!(
                "schema '{tag}' declares no rails"
            )));
        }

        let mut rails: Vec<RailSpec> = Vec::with_capacity(rail_names.len());
        for raw in rail_names {
            let name = raw.as_ref().trim();
            if name.is_empty() || name.contains(char::is_whitespace) {
                return Err(MonitorError::InvalidSchema(format!(
                    "schema '{tag}' has an invalid rail name '{}'",
                    raw.as_ref()
                )));
            }
            if rails.iter().any(|r| r.name == name) {
                return Err(MonitorError::InvalidSchema(format!(
                    "schema '{tag}' declares rail '{name}' twice"
                )));
            }
            let pattern = Regex::new(&convention.pattern_for(name))
                .map_err(|e| MonitorError::InvalidSchema(format!("rail '{name}': {e}")))?;
            rails.push(RailSpec {
                name: name.to_string(),
                pattern,
            });
        }

        Ok(Self {
            tag,
            convention,
            rails,
        })
    }

    /// Device-family tag (e.g. `"agx-orin"`).
    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn convention(&self) -> LineConvention {
        self.convention
    }

    /// Rails in declaration order.
    pub fn rails(&self) -> &[RailSpec] {
        &self.rails
    }

    pub fn rail_count(&self) -> usize {
        self.rails.len()
    }

    /// Position of a rail by name.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.rails.iter().position(|r| r.name == name)
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Static description of a registered device family.
#[derive(Debug, Clone, Copy)]
pub struct DeviceInfo {
    /// Canonical tag used to select the schema.
    pub tag: &'static str,
    /// Alternative tags accepted by [`resolve`].
    pub aliases: &'static [&'static str],
    /// One-line human-readable description.
    pub description: &'static str,
    pub convention: LineConvention,
    pub rails: &'static [&'static str],
}

static REGISTRY: &[DeviceInfo] = &[
    DeviceInfo {
        tag: "agx-orin",
        aliases: &["agx"],
        description: "Jetson AGX Orin series (JetPack 5+)",
        convention: LineConvention::MilliwattPair,
        rails: &["VDD_GPU_SOC", "VDD_CPU_CV", "VIN_SYS_5V0", "VDDQ_VDD2_1V8AO"],
    },
    DeviceInfo {
        tag: "orin-nano",
        aliases: &[],
        description: "Jetson Orin Nano / Orin NX, total module input",
        convention: LineConvention::MilliwattPair,
        rails: &["VDD_IN"],
    },
    DeviceInfo {
        tag: "xavier",
        aliases: &["agx-xavier"],
        description: "Jetson AGX Xavier series",
        convention: LineConvention::SlashAverage,
        rails: &["GPU", "CPU", "SOC", "CV", "VDDRQ", "SYS5V"],
    },
    DeviceInfo {
        tag: "nano",
        aliases: &[],
        description: "Jetson Nano (POM_5V power monitors)",
        convention: LineConvention::SlashAverage,
        rails: &["POM_5V_IN", "POM_5V_GPU", "POM_5V_CPU"],
    },
];

/// All registered device families, in registry order.
pub fn registered_devices() -> &'static [DeviceInfo] {
    REGISTRY
}

/// Canonical tags of every registered device family.
pub fn known_tags() -> Vec<String> {
    REGISTRY.iter().map(|d| d.tag.to_string()).collect()
}

fn lookup(tag: &str) -> Option<&'static DeviceInfo> {
    let wanted = tag.trim().to_ascii_lowercase();
    REGISTRY
        .iter()
        .find(|d| d.tag == wanted || d.aliases.iter().any(|a| *a == wanted))
}

/// Resolve a device tag (or alias, case-insensitive) to its schema.
pub fn resolve(tag: &str) -> Result<DeviceSchema> {
    let info = lookup(tag).ok_or_else(|| MonitorError::UnknownDevice {
        tag: tag.to_string(),
        known: known_tags(),
    })?;
    DeviceSchema::new(info.tag, info.convention, info.rails)
}
