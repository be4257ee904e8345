use crate::domain::model::{
    DeviceFacts, Discovered, Lun, Target, TargetDiscoveryBody, TargetMap, TargetPortalGroup,
    TerminalResult,
};
use crate::utils::error::{DiscoveryError, Result};
use std::collections::BTreeMap;

pub fn normalize(result: TerminalResult) -> Result<Discovered> {
    match result {
        TerminalResult::Targets(body) => normalize_targets(body).map(Discovered::Targets),
        TerminalResult::Devices(facts) => Ok(Discovered::Luns(normalize_luns(facts))),
    }
}

/// Portal group tag: whatever follows the first comma of `ip:port,tpgt`.
pub fn tpgt_of(portal: &str) -> &str {
    portal.split_once(',').map_or(portal, |(_, tpgt)| tpgt)
}

/// Targets keyed by name, each with its portals grouped by TPGT in the
/// order the job reported them.
pub fn normalize_targets(body: TargetDiscoveryBody) -> Result<TargetMap> {
    let mut targets: TargetMap = body
        .iscsi_targets
        .iscsi_target
        .into_iter()
        .map(|name| {
            let target = Target {
                name: name.clone(),
                tpgts: BTreeMap::new(),
            };
            (name, target)
        })
        .collect();

    for portal in body.discovered_targets.iscsi_details {
        let target = targets
            .get_mut(&portal.target)
            .ok_or_else(|| DiscoveryError::LookupError {
                message: format!(
                    "portal {} references unknown target {}",
                    portal.portal, portal.target
                ),
            })?;

        let tpgt = tpgt_of(&portal.portal).to_string();
        target
            .tpgts
            .entry(tpgt.clone())
            .or_insert_with(|| TargetPortalGroup {
                name: tpgt,
                portals: Vec::new(),
            })
            .portals
            .push(portal);
    }

    tracing::info!("Target results retrieved.");
    Ok(targets)
}

pub fn normalize_luns(facts: DeviceFacts) -> Vec<Lun> {
    let luns: Vec<Lun> = facts
        .ovirt_host_storages
        .into_iter()
        .flat_map(|host| host.logical_units)
        .map(|unit| Lun {
            guid: unit.id,
            size: unit.size,
            description: format!("{} {}", unit.vendor_id, unit.product_id),
            status: unit.status,
            num_paths: unit.paths,
        })
        .collect();

    tracing::info!("LUN list retrieved.");
    luns
}
