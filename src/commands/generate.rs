//! `nodeseed generate` — plan the batch and write every artifact.
//!
//! All validation (pattern, gateway, sizes, credentials) completes
//! before the first file is touched; a failed run leaves the output
//! directory untouched.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::net::Ipv4Addr;

use crate::node_plan::{self, ComputeSpec, Credentials, RunParams};
use crate::{addressing, config, render};

const DEFAULT_IMAGE: &str = "ubuntu-24.04-server-cloudimg-amd64.img";
const DEFAULT_IMAGE_DIR: &str = "cloud";
const DEFAULT_NAMESERVERS: &str = "8.8.8.8,8.8.4.4";
const DEFAULT_INTERFACE: &str = "enp1s0";
const DEFAULT_OS_VARIANT: &str = "ubuntu24.04";
const DEFAULT_BRIDGE: &str = "br0";
const DEFAULT_VM_IMAGE_ROOT: &str = "/var/lib/libvirt/images";

#[derive(Args, Debug)]
pub struct GenerateOpts {
    /// IP pattern in the form 'CIDR' plus a direction sign, e.g. '192.168.1.100/24+'
    #[arg(long)]
    pub ip_pattern: String,

    /// Router (gateway4) address shared by all nodes, e.g. '192.168.1.1'
    #[arg(long)]
    pub router: String,

    /// Number of nodes to generate
    #[arg(long)]
    pub nodes: u32,

    /// Starting node number
    #[arg(long, default_value_t = 1)]
    pub node_base: u32,

    /// Number of vCPUs per node
    #[arg(long, default_value_t = 2)]
    pub cpu: u32,

    /// Memory per node, optionally suffixed (2048M, 2G); bare numbers are megabytes
    #[arg(long, default_value = "2048")]
    pub memory: String,

    /// Disk size per node, optionally suffixed (10G, 10240M); bare numbers are gigabytes
    #[arg(long, default_value = "10G")]
    pub disk_size: String,

    /// Cloud image file name or absolute path
    #[arg(long)]
    pub image: Option<String>,

    /// Directory holding cloud images, joined with a relative --image
    #[arg(long)]
    pub image_dir: Option<String>,

    /// Root password for nodes; prompted if omitted
    #[arg(long)]
    pub root_password: Option<String>,

    /// Comma separated list of nameservers
    #[arg(long)]
    pub nameservers: Option<String>,

    /// Guest NIC name the static address is bound to
    #[arg(long)]
    pub interface: Option<String>,

    /// virt-install --os-variant value
    #[arg(long)]
    pub os_variant: Option<String>,

    /// Host bridge for the guest network
    #[arg(long)]
    pub bridge: Option<String>,

    /// Host directory under which per-node disk and seed images live
    #[arg(long)]
    pub vm_image_root: Option<String>,

    /// Output directory for configuration files
    #[arg(long, default_value = "config/nodes")]
    pub output_dir: String,
}

pub fn run(opts: GenerateOpts) -> Result<()> {
    let defaults = config::load()?;

    let interface = pick(opts.interface, defaults.interface, DEFAULT_INTERFACE);
    let os_variant = pick(opts.os_variant, defaults.os_variant, DEFAULT_OS_VARIANT);
    let bridge = pick(opts.bridge, defaults.bridge, DEFAULT_BRIDGE);
    let vm_image_root = pick(opts.vm_image_root, defaults.vm_image_root, DEFAULT_VM_IMAGE_ROOT);
    let image = pick(opts.image, defaults.image, DEFAULT_IMAGE);
    let image_dir = pick(opts.image_dir, defaults.image_dir, DEFAULT_IMAGE_DIR);
    let nameservers = pick(opts.nameservers, defaults.nameservers, DEFAULT_NAMESERVERS);
    let nameservers = parse_nameservers(&nameservers)?;

    let compute = ComputeSpec::resolve(opts.cpu, &opts.memory, &opts.disk_size)?;

    println!(
        "{} Planning {} node(s) from {}",
        ">>".blue().bold(),
        opts.nodes,
        opts.ip_pattern
    );
    let identities = addressing::plan(&opts.ip_pattern, opts.nodes, &opts.router, &interface)?;
    if let (Some(first), Some(last)) = (identities.first(), identities.last()) {
        println!(
            "{} Addresses {} through {}",
            "ok".green().bold(),
            first.address,
            last.address
        );
    }

    // Index math is validated before anyone is prompted for a password.
    node_plan::check_index_span(opts.node_base, opts.nodes)?;

    let credentials = Credentials::resolve(opts.root_password, prompt_password)?;

    let params = RunParams {
        node_base: opts.node_base,
        compute,
        credentials,
        nameservers,
        image: node_plan::resolve_image(&image, &image_dir)?,
        output_root: opts.output_dir.into(),
        vm_image_root: vm_image_root.into(),
        os_variant,
        bridge,
    };

    let configs = node_plan::build(identities, &params)?;

    println!();
    for node in &configs {
        let script = render::write_node(node, &params)?;
        println!(
            "{} Configuration for {} written to {}",
            "ok".green().bold(),
            node.node_name,
            node.output_directory.display()
        );
        tracing::debug!(script = %script.display(), address = %node.network.address, "node rendered");
    }

    println!();
    println!(
        "{} {} node(s) generated. Run each virt-install.sh on the virtualization host.",
        "ok".green().bold(),
        configs.len()
    );
    println!(
        "{} VM images will be placed under {}",
        "::".blue().bold(),
        params.vm_image_root.display()
    );

    Ok(())
}

fn pick(flag: Option<String>, config: Option<String>, fallback: &str) -> String {
    flag.or(config).unwrap_or_else(|| fallback.to_string())
}

fn parse_nameservers(list: &str) -> Result<Vec<Ipv4Addr>> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<Ipv4Addr>()
                .with_context(|| format!("invalid nameserver address '{s}'"))
        })
        .collect()
}

fn prompt_password() -> Result<String> {
    let prompt = format!("{} Enter root password: ", "??".blue().bold());
    rpassword::prompt_password(prompt).context("reading root password")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nameserver_list_parses_with_whitespace() {
        let parsed = parse_nameservers("8.8.8.8, 8.8.4.4").unwrap();
        assert_eq!(
            parsed,
            vec![Ipv4Addr::new(8, 8, 8, 8), Ipv4Addr::new(8, 8, 4, 4)]
        );
    }

    #[test]
    fn bad_nameserver_is_rejected() {
        assert!(parse_nameservers("8.8.8.8,example.com").is_err());
    }

    #[test]
    fn flags_beat_config_beats_fallback() {
        assert_eq!(pick(Some("a".into()), Some("b".into()), "c"), "a");
        assert_eq!(pick(None, Some("b".into()), "c"), "b");
        assert_eq!(pick(None, None, "c"), "c");
    }
}
