//! Artifact rendering — cloud-init seed documents and the boot script.
//!
//! Consumes fully-resolved [`NodeConfig`] records; by the time anything
//! here runs, the whole batch has already validated, so a write failure
//! is an I/O problem, not a planning one.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::node_plan::{NodeConfig, RunParams};

const NETPLAN_PATH: &str = "/etc/netplan/00-local.yaml";
const SSHD_OVERRIDE_PATH: &str = "/etc/ssh/sshd_config.d/00-local.conf";

#[derive(Serialize)]
struct UserData<'a> {
    disable_root: bool,
    hostname: &'a str,
    chpasswd: Chpasswd,
    ssh_pwauth: bool,
    packages: Vec<&'static str>,
    write_files: Vec<WriteFile>,
    runcmd: Vec<&'static str>,
}

#[derive(Serialize)]
struct Chpasswd {
    list: String,
    expire: bool,
}

#[derive(Serialize)]
struct WriteFile {
    path: &'static str,
    content: String,
}

#[derive(Serialize)]
struct Netplan {
    network: NetplanNetwork,
}

#[derive(Serialize)]
struct NetplanNetwork {
    version: u8,
    ethernets: BTreeMap<String, Ethernet>,
}

#[derive(Serialize)]
struct Ethernet {
    dhcp4: bool,
    addresses: Vec<String>,
    gateway4: String,
    nameservers: NameserverBlock,
}

#[derive(Serialize)]
struct NameserverBlock {
    addresses: Vec<String>,
}

/// The `#cloud-config` user-data document: root login over SSH with the
/// shared password, a static netplan for the node's interface, and
/// cleanup of the distribution-default netplan/sshd overrides so only
/// ours apply.
pub fn user_data(node: &NodeConfig) -> Result<String> {
    let net = &node.network;
    let netplan = Netplan {
        network: NetplanNetwork {
            version: 2,
            ethernets: BTreeMap::from([(
                net.interface_name.clone(),
                Ethernet {
                    dhcp4: false,
                    addresses: vec![format!("{}/{}", net.address, net.prefix_length)],
                    gateway4: net.gateway.to_string(),
                    nameservers: NameserverBlock {
                        addresses: node.nameservers.iter().map(|ns| ns.to_string()).collect(),
                    },
                },
            )]),
        },
    };

    let doc = UserData {
        disable_root: false,
        hostname: &node.node_name,
        chpasswd: Chpasswd {
            list: format!("root:{}\n", node.credentials.root_password),
            expire: false,
        },
        ssh_pwauth: true,
        packages: vec!["nfs-common"],
        write_files: vec![
            WriteFile {
                path: NETPLAN_PATH,
                content: serde_yaml::to_string(&netplan).context("serializing netplan")?,
            },
            WriteFile {
                path: SSHD_OVERRIDE_PATH,
                content: "PermitRootLogin yes\nPasswordAuthentication yes\n".to_string(),
            },
        ],
        runcmd: vec![
            "rm -f /etc/netplan/50-cloud-init.yaml",
            "netplan apply",
            "rm -f /etc/ssh/sshd_config.d/50-cloud-init.conf",
            "rm -f /etc/ssh/sshd_config.d/60-cloudimg-settings.conf",
        ],
    };

    let body = serde_yaml::to_string(&doc).context("serializing user-data")?;
    Ok(format!("#cloud-config\n{body}"))
}

/// Instance metadata: identity only.
pub fn meta_data(node: &NodeConfig) -> String {
    format!(
        "instance-id: {name}\nlocal-hostname: {name}\n",
        name = node.node_name
    )
}

/// Boot script: builds the seed ISO from the cloud-init pair if absent
/// (genisoimage), then imports the VM with virt-install.
pub fn virt_install_script(node: &NodeConfig, params: &RunParams) -> String {
    let vm_image_dir = node.vm_image_dir(params);
    format!(
        r#"#!/bin/bash
# Determine absolute path of this script's directory (node config directory)
CONFIG_DIR="$(readlink -f "$(dirname "$0")")"
USER_DATA="$CONFIG_DIR/user-data"
META_DATA="$CONFIG_DIR/meta-data"

VM_IMAGE_DIR="{vm_image_dir}"
DISK_PATH="${{VM_IMAGE_DIR}}/{name}.qcow2"
ISO_PATH="${{VM_IMAGE_DIR}}/seed-{name}.iso"

if [ ! -d "${{VM_IMAGE_DIR}}" ]; then
    mkdir -p "${{VM_IMAGE_DIR}}"
fi

if [ ! -f "${{ISO_PATH}}" ]; then
    echo "Generating seed ISO at ${{ISO_PATH}}..."
    if ! command -v genisoimage >/dev/null 2>&1; then
        echo "Error: genisoimage is not installed. Please install it with: sudo apt install genisoimage" >&2
        exit 1
    fi
    genisoimage -output "${{ISO_PATH}}" -volid cidata -joliet -rock "$USER_DATA" "$META_DATA"
fi

virt-install --name {name} \
  --memory {memory} --vcpus {vcpus} \
  --disk path="${{DISK_PATH}}",size={disk},backing_store="{image}" \
  --disk path="${{ISO_PATH}}",device=cdrom \
  --os-variant {os_variant} --import \
  --network bridge={bridge},model=virtio --graphics none
"#,
        vm_image_dir = vm_image_dir.display(),
        name = node.node_name,
        memory = node.compute.memory_mib(),
        vcpus = node.compute.vcpus,
        disk = node.compute.disk_gb(),
        image = node.image_reference.display(),
        os_variant = params.os_variant,
        bridge = params.bridge,
    )
}

/// Render and write all three artifacts into the node's config
/// directory. The boot script is marked executable.
pub fn write_node(node: &NodeConfig, params: &RunParams) -> Result<PathBuf> {
    fs::create_dir_all(&node.output_directory)
        .with_context(|| format!("creating {}", node.output_directory.display()))?;

    let write = |file: &str, content: String| -> Result<PathBuf> {
        let path = node.output_directory.join(file);
        fs::write(&path, content).with_context(|| format!("writing {}", path.display()))?;
        Ok(path)
    };

    write("user-data", user_data(node)?)?;
    write("meta-data", meta_data(node))?;
    let script = write("virt-install.sh", virt_install_script(node, params))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755))
            .with_context(|| format!("marking {} executable", script.display()))?;
    }

    Ok(script)
}
