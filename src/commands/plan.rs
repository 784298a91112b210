//! `nodeseed plan` — print the address plan without writing anything.
//!
//! The dry run never prompts for a password and never touches the
//! filesystem; it exercises exactly the validation `generate` would.

use anyhow::{bail, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use std::fmt::Write as _;
use std::net::Ipv4Addr;

use crate::addressing::NetworkIdentity;
use crate::error::PlanError;
use crate::{addressing, config, node_plan};

#[derive(Args, Debug)]
pub struct PlanOpts {
    /// IP pattern in the form 'CIDR' plus a direction sign, e.g. '192.168.1.100/24+'
    #[arg(long)]
    pub ip_pattern: String,

    /// Router (gateway4) address shared by all nodes
    #[arg(long)]
    pub router: String,

    /// Number of nodes to plan
    #[arg(long)]
    pub nodes: u32,

    /// Starting node number
    #[arg(long, default_value_t = 1)]
    pub node_base: u32,

    /// Guest NIC name the static address is bound to
    #[arg(long)]
    pub interface: Option<String>,

    /// Output format (table or json)
    #[arg(long, default_value = "table")]
    pub format: String,
}

#[derive(Debug, Serialize)]
struct PlanRow {
    node_index: u32,
    node_name: String,
    address: Ipv4Addr,
    prefix_length: u8,
    gateway: Ipv4Addr,
    interface: String,
}

pub fn run(opts: PlanOpts) -> Result<()> {
    let defaults = config::load()?;
    let interface = opts
        .interface
        .or(defaults.interface)
        .unwrap_or_else(|| "enp1s0".to_string());

    let identities = addressing::plan(&opts.ip_pattern, opts.nodes, &opts.router, &interface)?;
    let rows = plan_rows(&identities, opts.node_base)?;
    print!("{}", format_rows(&rows, &opts.format)?);

    Ok(())
}

fn plan_rows(identities: &[NetworkIdentity], node_base: u32) -> Result<Vec<PlanRow>, PlanError> {
    node_plan::check_index_span(node_base, identities.len() as u32)?;
    Ok(identities
        .iter()
        .enumerate()
        .map(|(offset, identity)| {
            let node_index = node_base + offset as u32;
            PlanRow {
                node_index,
                node_name: node_plan::node_name(node_index),
                address: identity.address,
                prefix_length: identity.prefix_length,
                gateway: identity.gateway,
                interface: identity.interface_name.clone(),
            }
        })
        .collect())
}

fn format_rows(rows: &[PlanRow], format: &str) -> Result<String> {
    match format {
        "json" => {
            let mut out = serde_json::to_string_pretty(rows)?;
            out.push('\n');
            Ok(out)
        }
        "table" => Ok(render_table(rows)),
        other => bail!("unknown format '{}' (expected 'table' or 'json')", other),
    }
}

fn render_table(rows: &[PlanRow]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<6} {:<10} {:<18} {:<15} {}",
        "NODE".bold(),
        "NAME".bold(),
        "ADDRESS".bold(),
        "GATEWAY".bold(),
        "INTERFACE".bold()
    );
    for row in rows {
        let _ = writeln!(
            out,
            "{:<6} {:<10} {:<18} {:<15} {}",
            row.node_index,
            row.node_name,
            format!("{}/{}", row.address, row.prefix_length),
            row.gateway,
            row.interface
        );
    }
    out
}
