//! Identity of the host this relay runs on.
//!
//! The configuration endpoint keys its answer by this identity, so the serialized
//! form (camelCase field names, field order as declared) is part of the wire contract.

pub mod builder;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineIdentity {
    pub ip: String,
    pub hostname: String,
    pub os_type: String,
    pub os_version: String,
    pub os_arch: String,
}
