//! LAN presence advertisement via mDNS service discovery, plus the plain
//! HTTP descriptor endpoint's supporting data (§4.6, §6 `GET /api/discover`).
//!
//! Grounded on the `mdns-sd` crate usage in the marine-radar server
//! manifests (`keesverruijt-mayara`, `dirkwa-mayara-server`); this
//! codebase's own chip-timing lineage never advertises a service on the
//! LAN, so the crate is new (see DESIGN.md).

use mdns_sd::{ServiceDaemon, ServiceInfo};
use std::collections::HashMap;
use tracing::warn;

pub const SERVICE_TYPE: &str = "_sickradar._tcp.local.";

pub struct Advertiser {
    daemon: ServiceDaemon,
    fullname: String,
}

/// Starts advertising `_sickradar._tcp.local.` with the configured port
/// and the `version`/`ip`/`name` TXT records. Failure is logged at `warn`
/// and never propagates — per §4.6, "its failure is non-fatal".
pub fn start(hostname: &str, friendly_name: &str, ip: &str, port: u16, version: &str) -> Option<Advertiser> {
    let daemon = match ServiceDaemon::new() {
        Ok(d) => d,
        Err(e) => {
            warn!(error = %e, "mDNS daemon failed to start; discovery advertisement disabled");
            return None;
        }
    };

    let instance_name = format!("{hostname}-radar");
    let mut properties = HashMap::new();
    properties.insert("version".to_owned(), version.to_owned());
    properties.insert("ip".to_owned(), ip.to_owned());
    properties.insert("name".to_owned(), friendly_name.to_owned());

    let host_ipv4 = ip.to_owned();
    let service = match ServiceInfo::new(
        SERVICE_TYPE,
        &instance_name,
        &format!("{instance_name}.local."),
        host_ipv4,
        port,
        Some(properties),
    ) {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "failed to build mDNS service descriptor");
            return None;
        }
    };

    let fullname = service.get_fullname().to_owned();
    if let Err(e) = daemon.register(service) {
        warn!(error = %e, "failed to register mDNS service");
        return None;
    }

    Some(Advertiser { daemon, fullname })
}

impl Advertiser {
    pub fn stop(self) {
        if let Err(e) = self.daemon.unregister(&self.fullname) {
            warn!(error = ?e, "failed to unregister mDNS service during shutdown");
        }
        if let Err(e) = self.daemon.shutdown() {
            warn!(error = ?e, "failed to shut down mDNS daemon");
        }
    }
}
