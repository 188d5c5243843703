//! Persistence and snapshot storage: volumes, claim templates, mounts.

use grid_core::constants::*;
use grid_core::model::{PersistenceSpec, PersistentStorageSpec};
use grid_core::Workload;
use k8s_openapi::api::core::v1::{EnvVar, PersistentVolumeClaim, Volume, VolumeMount};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

use crate::env::var;

/// How storage may be backed for a principal kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBacking {
    /// Claims become volume claim templates; volumes win when both are set.
    ClaimsOrVolumes,
    /// Only plain volumes are honoured (Jobs have no claim templates).
    VolumesOnly,
}

struct Slot<'a> {
    storage: &'a PersistentStorageSpec,
    volume_name: &'static str,
    mount_path: &'static str,
    env_name: &'static str,
}

fn slots(p: &PersistenceSpec) -> Vec<Slot<'_>> {
    let mut out = vec![Slot {
        storage: &p.storage,
        volume_name: VOLUME_NAME_PERSISTENCE,
        mount_path: VOLUME_MOUNT_PATH_PERSISTENCE,
        env_name: ENV_PERSISTENCE_DIR,
    }];
    if let Some(s) = &p.snapshots {
        out.push(Slot {
            storage: s,
            volume_name: VOLUME_NAME_SNAPSHOTS,
            mount_path: VOLUME_MOUNT_PATH_SNAPSHOTS,
            env_name: ENV_SNAPSHOT_DIR,
        });
    }
    out
}

fn mounted(storage: &PersistentStorageSpec, backing: StorageBacking) -> bool {
    match backing {
        StorageBacking::ClaimsOrVolumes => storage.is_configured(),
        StorageBacking::VolumesOnly => storage.volume.is_some(),
    }
}

/// Pod volumes for storage configured as plain volumes.
pub fn volumes(p: Option<&PersistenceSpec>) -> Vec<Volume> {
    let Some(p) = p else { return Vec::new() };
    slots(p)
        .into_iter()
        .filter_map(|s| {
            s.storage.volume.as_ref().map(|v| Volume { name: s.volume_name.to_string(), ..v.clone() })
        })
        .collect()
}

/// Claim templates for storage configured as claims without a volume.
pub fn claim_templates<W: Workload>(w: &W, p: Option<&PersistenceSpec>) -> Vec<PersistentVolumeClaim> {
    let Some(p) = p else { return Vec::new() };
    let mut labels = w.common_labels();
    labels.insert(LABEL_COMPONENT.into(), COMPONENT_PVC.into());
    slots(p)
        .into_iter()
        .filter(|s| s.storage.volume.is_none())
        .filter_map(|s| {
            s.storage.persistent_volume_claim.as_ref().map(|spec| PersistentVolumeClaim {
                metadata: ObjectMeta {
                    name: Some(s.volume_name.to_string()),
                    labels: Some(labels.clone()),
                    ..Default::default()
                },
                spec: Some(spec.clone()),
                ..Default::default()
            })
        })
        .collect()
}

/// Mounts and location variables for a container using the storage.
pub fn mounts_and_env(p: Option<&PersistenceSpec>, backing: StorageBacking) -> (Vec<VolumeMount>, Vec<EnvVar>) {
    let mut mounts = Vec::new();
    let mut env = Vec::new();
    let Some(p) = p else { return (mounts, env) };
    for s in slots(p).into_iter().filter(|s| mounted(s.storage, backing)) {
        env.push(var(s.env_name, s.mount_path));
        mounts.push(VolumeMount { name: s.volume_name.to_string(), mount_path: s.mount_path.to_string(), ..Default::default() });
    }
    (mounts, env)
}

#[cfg(test)]
mod tests {
    use super::*;
    use grid_core::model::GridCluster;
    use k8s_openapi::api::core::v1::{EmptyDirVolumeSource, PersistentVolumeClaimSpec};

    fn claim() -> PersistentStorageSpec {
        PersistentStorageSpec {
            persistent_volume_claim: Some(PersistentVolumeClaimSpec {
                volume_name: Some("pv-1".into()),
                ..Default::default()
            }),
            volume: None,
        }
    }

    fn empty_dir() -> Volume {
        Volume { empty_dir: Some(EmptyDirVolumeSource::default()), ..Default::default() }
    }

    #[test]
    fn claim_becomes_template_and_mount() {
        let mut c = GridCluster::default();
        c.metadata.name = Some("storage".into());
        let p = PersistenceSpec { storage: claim(), ..Default::default() };
        let pvcs = claim_templates(&c, Some(&p));
        assert_eq!(pvcs.len(), 1);
        assert_eq!(pvcs[0].metadata.name.as_deref(), Some(VOLUME_NAME_PERSISTENCE));
        let labels = pvcs[0].metadata.labels.as_ref().unwrap();
        assert_eq!(labels.get(LABEL_COMPONENT).map(String::as_str), Some(COMPONENT_PVC));
        assert!(volumes(Some(&p)).is_empty());

        let (mounts, env) = mounts_and_env(Some(&p), StorageBacking::ClaimsOrVolumes);
        assert_eq!(mounts[0].mount_path, VOLUME_MOUNT_PATH_PERSISTENCE);
        assert_eq!(env[0].name, ENV_PERSISTENCE_DIR);

        let (mounts, _) = mounts_and_env(Some(&p), StorageBacking::VolumesOnly);
        assert!(mounts.is_empty());
    }

    #[test]
    fn volume_wins_over_claim() {
        let c = GridCluster::default();
        let p = PersistenceSpec {
            snapshots: Some(PersistentStorageSpec { volume: Some(empty_dir()), ..claim() }),
            ..Default::default()
        };
        assert!(claim_templates(&c, Some(&p)).is_empty());
        let vols = volumes(Some(&p));
        assert_eq!(vols.len(), 1);
        assert_eq!(vols[0].name, VOLUME_NAME_SNAPSHOTS);
        assert!(vols[0].empty_dir.is_some());
        let (mounts, env) = mounts_and_env(Some(&p), StorageBacking::VolumesOnly);
        assert_eq!(mounts.len(), 1);
        assert_eq!(env[0].name, ENV_SNAPSHOT_DIR);
    }
}
