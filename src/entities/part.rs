//! Part record - catalog entry for a discrete mechanical part

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Metric thread size inside a display name ("Bolt M8x20" -> "M8")
static THREAD_IN_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bM(\d+(?:\.\d+)?)").expect("valid thread regex"));

/// Nominal diameter token inside a display name ("FLANGE DN50 PN16" -> 50)
static DN_IN_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bDN\s*(\d+)").expect("valid dn regex"));

/// Part family classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartFamily {
    Pipe,
    Flange,
    Valve,
    Bolt,
    Nut,
    Gasket,
    #[serde(other)]
    Other,
}

impl Default for PartFamily {
    fn default() -> Self {
        PartFamily::Other
    }
}

impl std::fmt::Display for PartFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PartFamily::Pipe => write!(f, "pipe"),
            PartFamily::Flange => write!(f, "flange"),
            PartFamily::Valve => write!(f, "valve"),
            PartFamily::Bolt => write!(f, "bolt"),
            PartFamily::Nut => write!(f, "nut"),
            PartFamily::Gasket => write!(f, "gasket"),
            PartFamily::Other => write!(f, "other"),
        }
    }
}

impl std::str::FromStr for PartFamily {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pipe" => Ok(PartFamily::Pipe),
            "flange" => Ok(PartFamily::Flange),
            "valve" => Ok(PartFamily::Valve),
            "bolt" => Ok(PartFamily::Bolt),
            "nut" => Ok(PartFamily::Nut),
            "gasket" => Ok(PartFamily::Gasket),
            "other" | "" => Ok(PartFamily::Other),
            _ => Err(format!(
                "Invalid family: {}. Use pipe, flange, valve, bolt, nut, gasket, or other",
                s
            )),
        }
    }
}

impl PartFamily {
    /// Guess the family from a free-text product name
    ///
    /// Keywords are checked in a fixed order so that "FLANGE BOLT" is a bolt
    /// and "VALVE FLANGE" is a flange.
    pub fn infer(name: &str) -> Self {
        let upper = name.to_uppercase();
        let has = |words: &[&str]| words.iter().any(|w| upper.contains(w));

        if has(&["BOLT", "SCREW", "STUD"]) {
            PartFamily::Bolt
        } else if has(&["NUT"]) {
            PartFamily::Nut
        } else if has(&["GASKET", "SEAL"]) {
            PartFamily::Gasket
        } else if has(&["FLANGE"]) {
            PartFamily::Flange
        } else if has(&["VALVE"]) {
            PartFamily::Valve
        } else if has(&["PIPE", "TUBE"]) {
            PartFamily::Pipe
        } else {
            PartFamily::Other
        }
    }
}

/// A catalog part (read-only to the engine)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartRecord {
    /// Catalog identifier
    pub part_id: String,

    /// Display name (defaults to the part id)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Part family
    #[serde(default)]
    pub family: PartFamily,

    /// Nominal diameter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dn: Option<u32>,

    /// Nominal pressure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pn: Option<u32>,

    /// End connection type (e.g. "RF", "M16")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_type: Option<String>,

    /// Face type (e.g. "raised_face")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub face_type: Option<String>,

    /// Free-form attributes such as `thread`
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,

    /// Path to a geometry model for this part
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_path: Option<String>,
}

impl PartRecord {
    /// Create a record with only an id and family
    pub fn new(part_id: impl Into<String>, family: PartFamily) -> Self {
        Self {
            part_id: part_id.into(),
            name: None,
            family,
            dn: None,
            pn: None,
            end_type: None,
            face_type: None,
            metadata: BTreeMap::new(),
            model_path: None,
        }
    }

    /// Build a record for a product that has no catalog entry
    pub fn from_product_name(name: &str) -> Self {
        let mut record = Self::new(name, PartFamily::infer(name));
        record.dn = DN_IN_NAME
            .captures(name)
            .and_then(|c| c[1].parse().ok());
        record
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_dn(mut self, dn: u32) -> Self {
        self.dn = Some(dn);
        self
    }

    pub fn with_pn(mut self, pn: u32) -> Self {
        self.pn = Some(pn);
        self
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Name shown to users; falls back to the part id
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.part_id)
    }

    /// Look up an attribute by field name, metadata first
    pub fn attribute(&self, field: &str) -> Option<String> {
        if let Some(value) = self.metadata.get(field) {
            return Some(value.clone());
        }
        match field {
            "part_id" => Some(self.part_id.clone()),
            "name" => Some(self.display_name().to_string()),
            "family" => Some(self.family.to_string()),
            "dn" => self.dn.map(|v| v.to_string()),
            "pn" => self.pn.map(|v| v.to_string()),
            "end_type" => self.end_type.clone(),
            "face_type" => self.face_type.clone(),
            _ => None,
        }
    }

    /// Thread or size descriptor used for thread matching
    ///
    /// Resolution order: `metadata.thread`, `end_type`, then a metric size in
    /// the display name.
    pub fn thread_descriptor(&self) -> Option<String> {
        if let Some(thread) = self.metadata.get("thread").filter(|t| !t.trim().is_empty()) {
            return Some(normalize_thread(thread));
        }
        if let Some(end) = self.end_type.as_deref().filter(|t| !t.trim().is_empty()) {
            return Some(normalize_thread(end));
        }
        THREAD_IN_NAME
            .captures(self.display_name())
            .map(|c| format!("M{}", &c[1]))
    }
}

fn normalize_thread(raw: &str) -> String {
    raw.trim().to_uppercase()
}
