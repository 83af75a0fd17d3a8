//! Resolved frontend construction

use lbsync_core::{
    FrontendDeclaration, FrontendEntry, LbsyncResult, ResolvedFrontend, Server, ServiceMap,
};
use tracing::debug;

/// Resolve every declaration against the service map
///
/// The output has one entry per declaration, in declaration order. A declaration whose
/// service or port is not in the map yields [`FrontendEntry::Unresolved`]. Server order
/// follows the service map's instance order.
pub fn build(
    declarations: &[FrontendDeclaration],
    services: &ServiceMap,
) -> LbsyncResult<Vec<FrontendEntry>> {
    declarations
        .iter()
        .map(|declaration| build_one(declaration, services))
        .collect()
}

fn build_one(
    declaration: &FrontendDeclaration,
    services: &ServiceMap,
) -> LbsyncResult<FrontendEntry> {
    let Some(instances) = services
        .get(&declaration.service.id)
        .and_then(|ports| ports.get(&declaration.service.port))
    else {
        debug!(
            service = %declaration.service.id,
            port = %declaration.service.port,
            domain = %declaration.frontend.domain,
            "Service port not discovered"
        );
        return Ok(FrontendEntry::Unresolved);
    };

    let servers = instances
        .iter()
        .map(|(id, endpoint)| Server {
            id: id.clone(),
            host: endpoint.host.clone(),
            port: endpoint.port,
        })
        .collect();

    Ok(FrontendEntry::Resolved(ResolvedFrontend {
        id: declaration.fingerprint()?,
        domain: declaration.frontend.domain.clone(),
        healthcheck: declaration.frontend.healthcheck.clone(),
        servers,
    }))
}
