use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::package::PackageSpec;

/// Body printed by conda on failure.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorReply {
    pub error: String,
    #[serde(default)]
    pub exception_name: Option<String>,
    #[serde(default)]
    pub exception_type: Option<String>,
}

/// Reply of `conda env list --json`.
#[derive(Debug, Deserialize)]
pub(crate) struct EnvList {
    pub envs: Vec<String>,
}

/// One entry of `conda list --json`.
#[derive(Debug, Clone, Deserialize)]
pub struct InstalledPackage {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub build_string: Option<String>,
}

impl From<InstalledPackage> for PackageSpec {
    fn from(p: InstalledPackage) -> Self {
        PackageSpec {
            name: p.name,
            version: Some(p.version),
        }
    }
}

/// Reply of install/remove/update.
#[derive(Debug, Deserialize)]
pub(crate) struct TransactionReply {
    #[serde(default)]
    pub actions: Option<Actions>,
    #[serde(default)]
    pub message: Option<String>,
}

/// One set of planned or performed actions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionSet {
    #[serde(rename = "PREFIX", default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(rename = "FETCH", default, skip_serializing_if = "Vec::is_empty")]
    pub fetch: Vec<Value>,
    #[serde(rename = "LINK", default, skip_serializing_if = "Vec::is_empty")]
    pub link: Vec<Value>,
    #[serde(rename = "UNLINK", default, skip_serializing_if = "Vec::is_empty")]
    pub unlink: Vec<Value>,
}

/// The `actions` of a conda reply.
///
/// Depending on the conda version this is a single object or a list of them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawActions")]
pub struct Actions(pub Vec<ActionSet>);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawActions {
    Many(Vec<ActionSet>),
    Single(ActionSet),
}

impl From<RawActions> for Actions {
    fn from(raw: RawActions) -> Self {
        match raw {
            RawActions::Many(sets) => Actions(sets),
            RawActions::Single(set) => Actions(vec![set]),
        }
    }
}

impl Actions {
    /// True if any package would be linked or unlinked.
    pub fn changes_anything(&self) -> bool {
        self.0
            .iter()
            .any(|set| !set.link.is_empty() || !set.unlink.is_empty())
    }

    pub fn extend(&mut self, other: Actions) {
        self.0.extend(other.0);
    }
}
