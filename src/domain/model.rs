use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// A single answer from the setup model: the variable name the playbook
/// expects and the value the user picked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    #[serde(alias = "ansible_var_name", alias = "ansibleVarName")]
    pub external_name: String,
    #[serde(default)]
    pub value: String,
}

impl Property {
    pub fn new(external_name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            external_name: external_name.into(),
            value: value.into(),
        }
    }
}

/// Section + property name. Two sections may carry the same property name
/// without shadowing each other.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PropertyKey {
    pub section: String,
    pub name: String,
}

impl PropertyKey {
    pub fn new(section: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            section: section.into(),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.section, self.name)
    }
}

/// Raw section -> property -> value layout, as loaded from an answers file.
pub type ModelSections = BTreeMap<String, BTreeMap<String, Property>>;

#[derive(Debug, Clone, Default)]
pub struct ConfigurationModel {
    index: HashMap<PropertyKey, Property>,
}

impl ConfigurationModel {
    pub fn from_sections(sections: ModelSections) -> Self {
        let index = sections
            .into_iter()
            .flat_map(|(section, props)| {
                props
                    .into_iter()
                    .map(move |(name, prop)| (PropertyKey::new(section.clone(), name), prop))
            })
            .collect();
        Self { index }
    }

    pub fn insert(&mut self, key: PropertyKey, property: Property) -> Option<Property> {
        self.index.insert(key, property)
    }

    pub fn get(&self, key: &PropertyKey) -> Option<&Property> {
        self.index.get(key)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

/// One entry of `discovered_targets.iscsi_details`. Fields beyond `target`
/// and `portal` are kept as-is so callers see everything the job reported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortalDetail {
    pub target: String,
    pub portal: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetPortalGroup {
    pub name: String,
    pub portals: Vec<PortalDetail>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Target {
    pub name: String,
    pub tpgts: BTreeMap<String, TargetPortalGroup>,
}

pub type TargetMap = BTreeMap<String, Target>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Lun {
    pub guid: String,
    pub size: u64,
    pub description: String,
    pub status: String,
    pub num_paths: u32,
}

/// Body of the discovery job's result record, under its registered key.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TargetDiscoveryResult {
    pub json: TargetDiscoveryBody,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TargetDiscoveryBody {
    pub iscsi_targets: IscsiTargets,
    pub discovered_targets: DiscoveredTargets,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct IscsiTargets {
    pub iscsi_target: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DiscoveredTargets {
    pub iscsi_details: Vec<PortalDetail>,
}

/// Body of the device job's result record, under its registered key.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DeviceListResult {
    pub ansible_facts: DeviceFacts,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DeviceFacts {
    pub ovirt_host_storages: Vec<HostStorage>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HostStorage {
    pub logical_units: Vec<LogicalUnit>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LogicalUnit {
    pub id: String,
    pub size: u64,
    pub vendor_id: String,
    pub product_id: String,
    pub status: String,
    pub paths: u32,
}

/// Terminal result of a job, already checked against that job's schema.
#[derive(Debug, Clone, PartialEq)]
pub enum TerminalResult {
    Targets(TargetDiscoveryBody),
    Devices(DeviceFacts),
}

/// Normalized output, ready to hand to a UI.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Discovered {
    Targets(TargetMap),
    Luns(Vec<Lun>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_name_in_two_sections_does_not_collide() {
        let mut sections = ModelSections::new();
        sections
            .entry("storage".to_string())
            .or_default()
            .insert("fqdn".to_string(), Property::new("he_storage_fqdn", "san.local"));
        sections
            .entry("network".to_string())
            .or_default()
            .insert("fqdn".to_string(), Property::new("he_host_name", "host.local"));

        let model = ConfigurationModel::from_sections(sections);

        assert_eq!(model.len(), 2);
        assert_eq!(
            model.get(&PropertyKey::new("network", "fqdn")).unwrap().value,
            "host.local"
        );
        assert_eq!(
            model.get(&PropertyKey::new("storage", "fqdn")).unwrap().value,
            "san.local"
        );
    }

    #[test]
    fn test_portal_detail_keeps_extra_fields() {
        let detail: PortalDetail = serde_json::from_value(serde_json::json!({
            "target": "iqn.a",
            "portal": "10.0.0.1:3260,1",
            "iface": "default"
        }))
        .unwrap();

        assert_eq!(detail.target, "iqn.a");
        assert_eq!(detail.extra.get("iface").unwrap(), "default");

        let round = serde_json::to_value(&detail).unwrap();
        assert_eq!(round["iface"], "default");
    }

    #[test]
    fn test_lun_serializes_in_camel_case() {
        let lun = Lun {
            guid: "36001405".to_string(),
            size: 1024,
            description: "LIO-ORG disk".to_string(),
            status: "free".to_string(),
            num_paths: 2,
        };
        let value = serde_json::to_value(&lun).unwrap();
        assert_eq!(value["numPaths"], 2);
    }
}
