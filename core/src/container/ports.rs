//! Port grammar for `--expose` and `-p`.

use serde::Serialize;

use crate::error::{ApiError, Result};

const PROTOCOLS: &[&str] = &["tcp", "udp", "sctp"];

/// One `HostConfig.PortBindings` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PortBinding {
    pub host_ip: String,
    pub host_port: String,
}

/// Split a trailing `/proto`, defaulting to `tcp`.
fn split_protocol(spec: &str) -> Result<(&str, &str)> {
    match spec.rsplit_once('/') {
        Some((port, proto)) if PROTOCOLS.contains(&proto) => Ok((port, proto)),
        Some((_, proto)) => Err(ApiError::Argument(format!(
            "unknown protocol '{proto}' in '{spec}', expected tcp, udp or sctp"
        ))),
        None => Ok((spec, "tcp")),
    }
}

fn parse_port(port: &str, spec: &str) -> Result<u16> {
    port.parse()
        .map_err(|_| ApiError::Argument(format!("invalid port '{port}' in '{spec}'")))
}

/// Expand `port[-port][/proto]` into `port/proto` keys, one per port.
pub fn parse_exposed(spec: &str) -> Result<Vec<String>> {
    if spec.contains(':') {
        return Err(ApiError::Argument(format!(
            "invalid exposed port '{spec}', host bindings belong to publish"
        )));
    }
    let (ports, proto) = split_protocol(spec)?;
    let (start, end) = match ports.split_once('-') {
        Some((start, end)) => (parse_port(start, spec)?, parse_port(end, spec)?),
        None => {
            let port = parse_port(ports, spec)?;
            (port, port)
        }
    };
    if start > end {
        return Err(ApiError::Argument(format!("descending port range in '{spec}'")));
    }
    Ok((start..=end).map(|port| format!("{port}/{proto}")).collect())
}

/// Parse `[ip:][hostPort:]containerPort[/proto]` into the exposed key and
/// its binding. Missing ip and host port become empty strings.
pub fn parse_published(spec: &str) -> Result<(String, PortBinding)> {
    let (addr, proto) = split_protocol(spec)?;
    let parts: Vec<&str> = addr.split(':').collect();
    let (host_ip, host_port, container) = match parts.as_slice() {
        [container] => ("", "", *container),
        [host_port, container] => ("", *host_port, *container),
        [ip, host_port, container] => (*ip, *host_port, *container),
        _ => {
            return Err(ApiError::Argument(format!(
                "invalid published port '{spec}', expected [ip:][hostPort:]containerPort[/proto]"
            )))
        }
    };
    let container = parse_port(container, spec)?;
    if !host_port.is_empty() {
        parse_port(host_port, spec)?;
    }
    Ok((
        format!("{container}/{proto}"),
        PortBinding {
            host_ip: host_ip.to_string(),
            host_port: host_port.to_string(),
        },
    ))
}
