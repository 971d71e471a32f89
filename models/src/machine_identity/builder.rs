use crate::error::model_error::ModelError;
use crate::{ErrorLocation, MachineIdentity};

use std::net::IpAddr;
use std::panic::Location;

/// Builder for validated [`MachineIdentity`] values.
///
/// Every field is required and must be non-blank; `ip` must parse as an IPv4 or IPv6
/// address.
#[derive(Debug, Default)]
pub struct MachineIdentityBuilder {
    ip: Option<String>,
    hostname: Option<String>,
    os_type: Option<String>,
    os_version: Option<String>,
    os_arch: Option<String>,
}

impl MachineIdentityBuilder {
    pub fn with_ip(mut self, ip: impl Into<String>) -> Self {
        self.ip = Some(ip.into());
        self
    }

    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = Some(hostname.into());
        self
    }

    pub fn with_os_type(mut self, os_type: impl Into<String>) -> Self {
        self.os_type = Some(os_type.into());
        self
    }

    pub fn with_os_version(mut self, os_version: impl Into<String>) -> Self {
        self.os_version = Some(os_version.into());
        self
    }

    pub fn with_os_arch(mut self, os_arch: impl Into<String>) -> Self {
        self.os_arch = Some(os_arch.into());
        self
    }

    /// Build the identity with validation.
    #[track_caller]
    pub fn build(self) -> Result<MachineIdentity, ModelError> {
        let ip = required(self.ip, "IP address")?;

        if ip.parse::<IpAddr>().is_err() {
            return Err(ModelError::Identity {
                field: "IP address",
                message: format!("Invalid IP address: {ip}"),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        let hostname = required(self.hostname, "Hostname")?;
        let os_type = required(self.os_type, "OS type")?;
        let os_version = required(self.os_version, "OS version")?;
        let os_arch = required(self.os_arch, "OS architecture")?;

        Ok(MachineIdentity {
            ip,
            hostname,
            os_type,
            os_version,
            os_arch,
        })
    }
}

#[track_caller]
fn required(value: Option<String>, field: &'static str) -> Result<String, ModelError> {
    let value = value.ok_or_else(|| ModelError::Identity {
        field,
        message: format!("{field} is required"),
        location: ErrorLocation::from(Location::caller()),
    })?;

    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ModelError::Identity {
            field,
            message: format!("{field} cannot be empty"),
            location: ErrorLocation::from(Location::caller()),
        });
    }

    Ok(trimmed.to_string())
}
