//! Detection and encoding of the [`MachineIdentity`] used as the config lookup key.

use crate::error::SyncError;

use models::{MachineIdentity, MachineIdentityBuilder};

use std::net::{IpAddr, Ipv4Addr};
use std::sync::OnceLock;

use log::{debug, info};
use sysinfo::{Networks, System};

const UNKNOWN: &str = "unknown";

static IDENTITY: OnceLock<MachineIdentity> = OnceLock::new();

/// The identity of this machine, detected on first use and cached for the process lifetime.
pub fn machine_identity() -> Result<&'static MachineIdentity, SyncError> {
    if let Some(identity) = IDENTITY.get() {
        return Ok(identity);
    }

    let detected = detect_identity()?;
    info!(
        "[config-sync] Machine identity: {} ({}) {} {} {}",
        detected.hostname, detected.ip, detected.os_type, detected.os_version, detected.os_arch
    );

    Ok(IDENTITY.get_or_init(|| detected))
}

/// Query the OS for hostname, primary address, OS name/version and CPU architecture.
pub fn detect_identity() -> Result<MachineIdentity, SyncError> {
    let hostname = System::host_name().unwrap_or_else(|| UNKNOWN.to_string());
    let os_type = System::name().unwrap_or_else(|| std::env::consts::OS.to_string());
    let os_version = System::kernel_version()
        .or_else(System::os_version)
        .unwrap_or_else(|| UNKNOWN.to_string());

    MachineIdentityBuilder::default()
        .with_ip(primary_ip().to_string())
        .with_hostname(hostname)
        .with_os_type(os_type)
        .with_os_version(os_version)
        .with_os_arch(std::env::consts::ARCH)
        .build()
        .map_err(|e| SyncError::identity(e.to_string()))
}

/// First non-loopback IPv4 address, then first non-loopback IPv6, then loopback.
fn primary_ip() -> IpAddr {
    let networks = Networks::new_with_refreshed_list();

    let mut candidates: Vec<IpAddr> = networks
        .iter()
        .flat_map(|(_, data)| data.ip_networks().iter().map(|network| network.addr))
        .filter(|addr| !addr.is_loopback() && !addr.is_unspecified())
        .collect();

    candidates.sort_by_key(|addr| !addr.is_ipv4());

    match candidates.first() {
        Some(addr) => *addr,
        None => {
            debug!("[config-sync] No routable interface address, using loopback");
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        }
    }
}

/// Serialize the identity to JSON and percent-encode it for appending to the endpoint.
pub fn lookup_key(identity: &MachineIdentity) -> Result<String, SyncError> {
    let json = serde_json::to_string(identity)
        .map_err(|e| SyncError::identity(format!("Failed to serialize identity: {e}")))?;

    // byte_serialize writes spaces as '+' and a literal '+' as %2B, so this swap is lossless.
    let encoded: String = url::form_urlencoded::byte_serialize(json.as_bytes()).collect();
    Ok(encoded.replace('+', "%20"))
}

/// Full request URL: configured base followed by the encoded identity.
pub fn lookup_url(endpoint: &str, identity: &MachineIdentity) -> Result<String, SyncError> {
    Ok(format!("{endpoint}{}", lookup_key(identity)?))
}
