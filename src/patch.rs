//! Patch persistence.
//!
//! A patch is the serializable description of a rack: which modules exist,
//! their parameter values, and the cables between them. Saved as JSON with
//! a version field so the format can evolve.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::dsp::SignalKind;
use crate::graph::{AdapterError, ConnectError, ModuleId, WiringAdapter};

/// Current patch format version.
pub const PATCH_VERSION: u32 = 1;

/// Errors from saving and loading patches.
#[derive(Debug, Error)]
pub enum PatchError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid patch file: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported patch version {0} (expected {PATCH_VERSION})")]
    UnsupportedVersion(u32),
    #[error(transparent)]
    Adapter(#[from] AdapterError),
    #[error(transparent)]
    Connect(#[from] ConnectError),
}

/// One end of a saved cable.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PatchPort {
    pub module: ModuleId,
    pub port: String,
}

/// A saved cable. The kind is the negotiated signal kind recorded for
/// document readers; `apply` re-derives it from the live ports.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PatchConnection {
    pub from: PatchPort,
    pub to: PatchPort,
    pub kind: SignalKind,
}

/// A saved module instance. Parameters are stored by id so patches stay
/// readable and survive parameter reordering.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PatchModule {
    pub id: ModuleId,
    #[serde(rename = "type")]
    pub type_id: String,
    pub params: BTreeMap<String, f32>,
}

/// A complete serializable rack description.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Patch {
    pub version: u32,
    pub modules: Vec<PatchModule>,
    pub connections: Vec<PatchConnection>,
}

impl Patch {
    /// Snapshots the adapter's rack into a patch.
    pub fn capture(adapter: &WiringAdapter) -> Self {
        let modules = adapter
            .module_ids()
            .iter()
            .filter_map(|&id| {
                let entry = adapter.module(id)?;
                let params = entry
                    .parameters
                    .iter()
                    .zip(&entry.values)
                    .map(|(p, &v)| (p.id.to_string(), v))
                    .collect();
                Some(PatchModule {
                    id,
                    type_id: entry.type_id.to_string(),
                    params,
                })
            })
            .collect();

        let connections = adapter
            .connections()
            .iter()
            .map(|c| PatchConnection {
                from: PatchPort {
                    module: c.from.module,
                    port: c.from.name.to_string(),
                },
                to: PatchPort {
                    module: c.to.module,
                    port: c.to.name.to_string(),
                },
                kind: c.kind,
            })
            .collect();

        Self {
            version: PATCH_VERSION,
            modules,
            connections,
        }
    }

    /// Rebuilds the rack described by this patch onto the adapter,
    /// replacing whatever it currently holds.
    ///
    /// Saved module ids are not reused; connections are remapped onto the
    /// freshly assigned ids.
    pub fn apply(&self, adapter: &mut WiringAdapter) -> Result<(), PatchError> {
        if self.version != PATCH_VERSION {
            return Err(PatchError::UnsupportedVersion(self.version));
        }

        adapter.clear();

        let mut remap: BTreeMap<ModuleId, ModuleId> = BTreeMap::new();
        for saved in &self.modules {
            let module = adapter.add_module(&saved.type_id)?;
            remap.insert(saved.id, module);
            for (param, &value) in &saved.params {
                adapter.set_parameter(module, param, value)?;
            }
        }

        for cable in &self.connections {
            let from_module = *remap
                .get(&cable.from.module)
                .ok_or(AdapterError::UnknownModule(cable.from.module))?;
            let to_module = *remap
                .get(&cable.to.module)
                .ok_or(AdapterError::UnknownModule(cable.to.module))?;
            let from = adapter.port(from_module, &cable.from.port)?;
            let to = adapter.port(to_module, &cable.to.port)?;
            adapter.connect(from, to)?;
        }

        info!(
            modules = self.modules.len(),
            connections = self.connections.len(),
            "patch applied"
        );
        Ok(())
    }

    /// Saves the patch as pretty-printed JSON.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), PatchError> {
        let file = File::create(path.as_ref())?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)?;
        info!(path = %path.as_ref().display(), "patch saved");
        Ok(())
    }

    /// Loads a patch from a JSON file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, PatchError> {
        let file = File::open(path.as_ref())?;
        let patch: Patch = serde_json::from_reader(BufReader::new(file))?;
        if patch.version != PATCH_VERSION {
            return Err(PatchError::UnsupportedVersion(patch.version));
        }
        Ok(patch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::channels::EngineChannels;
    use crate::graph::PortId;
    use crate::modules::default_registry;

    fn adapter() -> WiringAdapter {
        let (ui, _render) = EngineChannels::with_defaults().split();
        WiringAdapter::new(default_registry(), ui, 48000.0, 128)
    }

    fn build_rack(adapter: &mut WiringAdapter) -> (ModuleId, ModuleId) {
        let osc = adapter.add_module("osc.vco").unwrap();
        let filter = adapter.add_module("filter.ladder").unwrap();
        adapter.set_parameter(osc, "frequency", 330.0).unwrap();
        adapter.set_parameter(filter, "cutoff", 2500.0).unwrap();
        adapter
            .connect(PortId::new(osc, "out"), PortId::new(filter, "in"))
            .unwrap();
        (osc, filter)
    }

    #[test]
    fn test_capture_records_modules_and_cables() {
        let mut adapter = adapter();
        build_rack(&mut adapter);

        let patch = Patch::capture(&adapter);
        assert_eq!(patch.version, PATCH_VERSION);
        assert_eq!(patch.modules.len(), 2);
        assert_eq!(patch.connections.len(), 1);
        assert_eq!(patch.modules[0].type_id, "osc.vco");
        assert_eq!(patch.modules[0].params["frequency"], 330.0);
        assert_eq!(patch.connections[0].from.port, "out");
        assert_eq!(patch.connections[0].to.port, "in");
        assert_eq!(patch.connections[0].kind, SignalKind::Audio);
    }

    #[test]
    fn test_apply_rebuilds_rack() {
        let mut source = adapter();
        build_rack(&mut source);
        let patch = Patch::capture(&source);

        let mut target = adapter();
        patch.apply(&mut target).unwrap();

        assert_eq!(target.module_ids().len(), 2);
        assert_eq!(target.connections().len(), 1);

        let osc = target.module_ids()[0];
        let entry = target.module(osc).unwrap();
        assert_eq!(entry.type_id, "osc.vco");
        let freq_index = entry
            .parameters
            .iter()
            .position(|p| p.id == "frequency")
            .unwrap();
        assert_eq!(entry.values[freq_index], 330.0);
    }

    #[test]
    fn test_round_trip_through_json() {
        let mut source = adapter();
        build_rack(&mut source);
        let patch = Patch::capture(&source);

        let json = serde_json::to_string(&patch).unwrap();
        let restored: Patch = serde_json::from_str(&json).unwrap();
        assert_eq!(patch, restored);
    }

    #[test]
    fn test_apply_replaces_existing_rack() {
        let mut source = adapter();
        build_rack(&mut source);
        let patch = Patch::capture(&source);

        let mut target = adapter();
        target.add_module("seq.step16").unwrap();
        patch.apply(&mut target).unwrap();

        assert_eq!(target.module_ids().len(), 2);
        assert!(target
            .module_ids()
            .iter()
            .all(|&m| target.module(m).unwrap().type_id != "seq.step16"));
    }

    #[test]
    fn test_unknown_module_type_fails_cleanly() {
        let patch = Patch {
            version: PATCH_VERSION,
            modules: vec![PatchModule {
                id: 1,
                type_id: "no.such.unit".into(),
                params: BTreeMap::new(),
            }],
            connections: vec![],
        };
        let mut target = adapter();
        let err = patch.apply(&mut target).unwrap_err();
        assert!(matches!(
            err,
            PatchError::Adapter(AdapterError::UnknownModuleType(_))
        ));
    }

    #[test]
    fn test_version_mismatch_is_rejected() {
        let patch = Patch {
            version: PATCH_VERSION + 1,
            modules: vec![],
            connections: vec![],
        };
        let mut target = adapter();
        assert!(matches!(
            patch.apply(&mut target),
            Err(PatchError::UnsupportedVersion(_))
        ));
    }

    #[test]
    fn test_file_round_trip() {
        let mut source = adapter();
        build_rack(&mut source);
        let patch = Patch::capture(&source);

        let dir = std::env::temp_dir().join("rack_core_patch_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("patch.json");
        patch.save_to_file(&path).unwrap();
        let loaded = Patch::load_from_file(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(patch, loaded);
    }
}
