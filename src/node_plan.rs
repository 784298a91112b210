//! Node plan building — merges addressing with run-level parameters.
//!
//! Everything shared across the batch (compute sizing, credentials,
//! nameservers, image) is resolved exactly once into [`RunParams`];
//! `build` then pairs each network identity with a node index, name and
//! output directory. Size and credential failures belong to
//! run-parameter resolution; `build` itself only rejects an index span
//! that would overflow, before any record exists.

use std::fmt;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::addressing::NetworkIdentity;
use crate::error::PlanError;
use crate::units::{self, GIB, MIB};

/// Per-node VM sizing, identical for every node in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ComputeSpec {
    pub vcpus: u32,
    pub memory_bytes: u64,
    pub disk_bytes: u64,
}

impl ComputeSpec {
    pub fn resolve(vcpus: u32, memory: &str, disk: &str) -> Result<Self, PlanError> {
        Ok(ComputeSpec {
            vcpus,
            memory_bytes: units::parse_memory(memory)?,
            disk_bytes: units::parse_disk(disk)?,
        })
    }

    /// Memory in MiB, the unit `virt-install --memory` takes.
    pub fn memory_mib(&self) -> u64 {
        self.memory_bytes / MIB
    }

    /// Disk size in whole GB for `virt-install --disk size=`, never
    /// below 1 (a sub-gigabyte request still needs an image).
    pub fn disk_gb(&self) -> u64 {
        (self.disk_bytes / GIB).max(1)
    }
}

/// Shared root credentials, resolved at most once per run.
#[derive(Clone)]
pub struct Credentials {
    pub root_password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("root_password", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    /// Use the supplied password, or call the prompt collaborator once.
    /// An empty or failed prompt is a missing-credential error.
    pub fn resolve(
        supplied: Option<String>,
        prompt: impl FnOnce() -> anyhow::Result<String>,
    ) -> Result<Self, PlanError> {
        let root_password = match supplied {
            Some(password) => password,
            None => prompt().map_err(|_| PlanError::MissingCredential)?,
        };
        if root_password.is_empty() {
            return Err(PlanError::MissingCredential);
        }
        Ok(Credentials { root_password })
    }
}

/// Run-level parameters, immutable once constructed.
#[derive(Debug, Clone)]
pub struct RunParams {
    pub node_base: u32,
    pub compute: ComputeSpec,
    pub credentials: Credentials,
    pub nameservers: Vec<Ipv4Addr>,
    /// Absolute path of the backing cloud image.
    pub image: PathBuf,
    /// Root directory for per-node config directories.
    pub output_root: PathBuf,
    /// Host directory under which per-node disk/ISO images live.
    pub vm_image_root: PathBuf,
    pub os_variant: String,
    pub bridge: String,
}

/// Fully resolved description of one node's provisioning artifacts.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub node_index: u32,
    pub node_name: String,
    pub network: NetworkIdentity,
    pub compute: ComputeSpec,
    pub credentials: Credentials,
    pub nameservers: Vec<Ipv4Addr>,
    pub image_reference: PathBuf,
    pub output_directory: PathBuf,
}

pub fn node_name(index: u32) -> String {
    format!("node{index}")
}

/// Reject a node_base/count pair whose last node index would not fit
/// in a 32-bit index.
pub fn check_index_span(node_base: u32, count: u32) -> Result<(), PlanError> {
    match count {
        0 => Ok(()),
        n => node_base
            .checked_add(n - 1)
            .map(drop)
            .ok_or(PlanError::NodeIndexOverflow { node_base, count: n }),
    }
}

/// Pair each identity with its node index and derived paths, in input
/// order. Identity `i` becomes node `node_base + i`.
pub fn build(
    identities: Vec<NetworkIdentity>,
    params: &RunParams,
) -> Result<Vec<NodeConfig>, PlanError> {
    check_index_span(params.node_base, identities.len() as u32)?;
    let configs = identities
        .into_iter()
        .enumerate()
        .map(|(offset, network)| {
            let node_index = params.node_base + offset as u32;
            let node_name = node_name(node_index);
            let output_directory = params.output_root.join(&node_name);
            NodeConfig {
                node_index,
                node_name,
                network,
                compute: params.compute,
                credentials: params.credentials.clone(),
                nameservers: params.nameservers.clone(),
                image_reference: params.image.clone(),
                output_directory,
            }
        })
        .collect();
    Ok(configs)
}

impl NodeConfig {
    /// Host directory for this node's disk and seed images.
    pub fn vm_image_dir(&self, params: &RunParams) -> PathBuf {
        params.vm_image_root.join(&self.node_name)
    }
}

/// Resolve the backing image to an absolute path, joining relative
/// image names onto the image directory first.
pub fn resolve_image(image: &str, image_dir: &str) -> anyhow::Result<PathBuf> {
    let path = Path::new(image);
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        Path::new(image_dir).join(path)
    };
    Ok(std::path::absolute(joined)?)
}
