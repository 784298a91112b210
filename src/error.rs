use std::net::Ipv4Addr;

use thiserror::Error;

/// Everything the planning core can reject. All variants are detected
/// before any artifact is written, so a failed run produces nothing.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("malformed ip pattern '{pattern}': {reason}")]
    MalformedPattern { pattern: String, reason: String },

    #[error("invalid gateway address '{0}'")]
    InvalidGateway(String),

    #[error("node count must be at least 1")]
    InvalidNodeCount,

    #[error("node index overflow: node base {node_base} plus {count} node(s) does not fit in a 32-bit index")]
    NodeIndexOverflow { node_base: u32, count: u32 },

    #[error("address range exhausted at node offset {offset}: no usable host left in {network}/{prefix_length}")]
    RangeExhausted {
        offset: u32,
        network: Ipv4Addr,
        prefix_length: u8,
    },

    #[error("invalid {kind} size '{value}': expected a number optionally suffixed with M/MB or G/GB")]
    InvalidSize { kind: &'static str, value: String },

    #[error("no root password available after prompting")]
    MissingCredential,
}
