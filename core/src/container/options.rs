//! Parsers for the option values `docker run` accepts as strings.

use serde::Serialize;

use crate::error::{ApiError, Result};

/// Parse `<digits>[b|k|m|g]` into bytes. Multipliers are decimal
/// (1000-based); the suffix is case-insensitive and defaults to bytes.
pub fn parse_memory(value: &str) -> Result<u64> {
    let value = value.trim();
    let (digits, unit) = match value.char_indices().last() {
        Some((idx, c)) if c.is_ascii_alphabetic() => (&value[..idx], Some(c)),
        _ => (value, None),
    };
    let multiplier: u64 = match unit.map(|c| c.to_ascii_lowercase()) {
        None | Some('b') => 1,
        Some('k') => 1_000,
        Some('m') => 1_000_000,
        Some('g') => 1_000_000_000,
        Some(other) => {
            return Err(ApiError::Argument(format!(
                "unknown memory unit '{other}' in '{value}', expected b, k, m or g"
            )))
        }
    };
    let amount: u64 = digits
        .parse()
        .map_err(|_| ApiError::Argument(format!("invalid memory amount '{value}'")))?;
    amount
        .checked_mul(multiplier)
        .ok_or_else(|| ApiError::Argument(format!("memory amount '{value}' is too large")))
}

/// Parse a cpu-shares weight.
pub fn parse_cpu_shares(value: &str) -> Result<u64> {
    value
        .trim()
        .parse()
        .map_err(|_| ApiError::Argument(format!("invalid cpu shares '{value}'")))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RestartPolicy {
    pub name: String,
    pub maximum_retry_count: u32,
}

impl RestartPolicy {
    /// Parse `name[:count]`. Only `on-failure` takes a count.
    pub fn parse(spec: &str) -> Result<Self> {
        let (name, count) = match spec.split_once(':') {
            Some((name, count)) => (name, Some(count)),
            None => (spec, None),
        };
        let maximum_retry_count = match (name, count) {
            ("always" | "no", None) => 0,
            ("always" | "no", Some(_)) => {
                return Err(ApiError::Argument(format!(
                    "restart policy '{name}' does not take a retry count"
                )))
            }
            ("on-failure", None) => 0,
            ("on-failure", Some(count)) => count.parse().map_err(|_| {
                ApiError::Argument(format!("invalid retry count '{count}' in '{spec}'"))
            })?,
            _ => {
                return Err(ApiError::Argument(format!(
                    "unknown restart policy '{spec}', expected no, always or on-failure[:count]"
                )))
            }
        };
        Ok(Self {
            name: name.to_string(),
            maximum_retry_count,
        })
    }
}

/// Validate a network mode: `bridge`, `none`, `host` or `container:<name>`.
pub fn parse_network_mode(mode: &str) -> Result<String> {
    match mode {
        "bridge" | "none" | "host" => Ok(mode.to_string()),
        _ => match mode.strip_prefix("container:") {
            Some(name) if !name.is_empty() => Ok(mode.to_string()),
            Some(_) => Err(ApiError::Argument(
                "network mode 'container:' needs a container name".to_string(),
            )),
            None => Err(ApiError::Argument(format!(
                "unknown network mode '{mode}', expected bridge, none, host or container:<name>"
            ))),
        },
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeviceMapping {
    pub path_on_host: String,
    pub path_in_container: String,
    pub cgroup_permissions: String,
}

impl DeviceMapping {
    /// Parse `src`, `src:dst` or `src:dst:perms`; permissions default to `rwm`.
    pub fn parse(spec: &str) -> Result<Self> {
        let parts: Vec<&str> = spec.split(':').collect();
        let (host, container, perms) = match parts.as_slice() {
            [path] => (*path, *path, "rwm"),
            [host, container] => (*host, *container, "rwm"),
            [host, container, perms] => (*host, *container, *perms),
            _ => {
                return Err(ApiError::Argument(format!(
                    "invalid device '{spec}', expected src[:dst[:perms]]"
                )))
            }
        };
        Ok(Self {
            path_on_host: host.to_string(),
            path_in_container: container.to_string(),
            cgroup_permissions: perms.to_string(),
        })
    }
}

/// A `-v` argument: an internal volume or a host bind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeSpec {
    pub host: Option<String>,
    pub container: String,
    pub mode: Option<String>,
}

impl VolumeSpec {
    /// Parse `container`, `host:container` or `host:container:ro|rw`.
    /// Mounting over `/` is rejected.
    pub fn parse(spec: &str) -> Result<Self> {
        let parts: Vec<&str> = spec.split(':').collect();
        let volume = match parts.as_slice() {
            [container] => Self {
                host: None,
                container: container.to_string(),
                mode: None,
            },
            [host, container] => Self {
                host: Some(host.to_string()),
                container: container.to_string(),
                mode: None,
            },
            [host, container, mode @ ("ro" | "rw")] => Self {
                host: Some(host.to_string()),
                container: container.to_string(),
                mode: Some(mode.to_string()),
            },
            _ => {
                return Err(ApiError::Argument(format!(
                    "invalid volume '{spec}', expected [host:]container[:ro|rw]"
                )))
            }
        };
        if volume.container.is_empty() || volume.host.as_deref() == Some("") {
            return Err(ApiError::Argument(format!("invalid volume '{spec}', empty path")));
        }
        if volume.container == "/" {
            return Err(ApiError::Argument(format!(
                "invalid volume '{spec}', cannot mount over /"
            )));
        }
        Ok(volume)
    }

    /// Entry for `HostConfig.Binds`, present only for host binds.
    pub fn bind(&self) -> Option<String> {
        let host = self.host.as_ref()?;
        Some(match &self.mode {
            Some(mode) => format!("{host}:{}:{mode}", self.container),
            None => format!("{host}:{}", self.container),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_units_are_decimal() {
        assert_eq!(parse_memory("512").unwrap(), 512);
        assert_eq!(parse_memory("1b").unwrap(), 1);
        assert_eq!(parse_memory("1k").unwrap(), 1_000);
        assert_eq!(parse_memory("1m").unwrap(), 1_000_000);
        assert_eq!(parse_memory("1g").unwrap(), 1_000_000_000);
        assert_eq!(parse_memory("2G").unwrap(), 2_000_000_000);
    }

    #[test]
    fn memory_rejects_bad_input() {
        for bad in ["1x", "", "k", "1.5g", "-1m", "99999999999999999999g"] {
            assert!(
                matches!(parse_memory(bad), Err(ApiError::Argument(_))),
                "accepted {bad:?}"
            );
        }
    }

    #[test]
    fn restart_policies() {
        assert_eq!(
            RestartPolicy::parse("on-failure:4").unwrap(),
            RestartPolicy { name: "on-failure".to_string(), maximum_retry_count: 4 }
        );
        assert_eq!(RestartPolicy::parse("on-failure").unwrap().maximum_retry_count, 0);
        assert_eq!(RestartPolicy::parse("always").unwrap().name, "always");
        assert_eq!(RestartPolicy::parse("no").unwrap().name, "no");
        for bad in ["always:4", "no:1", "on-failure:x", "sometimes", ""] {
            assert!(
                matches!(RestartPolicy::parse(bad), Err(ApiError::Argument(_))),
                "accepted {bad:?}"
            );
        }
    }

    #[test]
    fn restart_policy_wire_shape() {
        let value = serde_json::to_value(RestartPolicy::parse("on-failure:4").unwrap()).unwrap();
        assert_eq!(value, serde_json::json!({"Name": "on-failure", "MaximumRetryCount": 4}));
    }

    #[test]
    fn network_modes() {
        for ok in ["bridge", "none", "host", "container:db"] {
            assert_eq!(parse_network_mode(ok).unwrap(), ok);
        }
        for bad in ["container:", "overlay", ""] {
            assert!(matches!(parse_network_mode(bad), Err(ApiError::Argument(_))));
        }
    }

    #[test]
    fn device_segments() {
        let one = DeviceMapping::parse("/dev/snd").unwrap();
        assert_eq!(one.path_in_container, "/dev/snd");
        assert_eq!(one.cgroup_permissions, "rwm");

        let two = DeviceMapping::parse("/dev/sda:/dev/xvda").unwrap();
        assert_eq!(two.path_on_host, "/dev/sda");
        assert_eq!(two.path_in_container, "/dev/xvda");
        assert_eq!(two.cgroup_permissions, "rwm");

        let three = DeviceMapping::parse("/dev/sda:/dev/xvda:r").unwrap();
        assert_eq!(three.cgroup_permissions, "r");

        assert!(matches!(DeviceMapping::parse("a:b:c:d"), Err(ApiError::Argument(_))));
    }

    #[test]
    fn volume_specs() {
        let internal = VolumeSpec::parse("/data").unwrap();
        assert_eq!(internal.bind(), None);

        let bind = VolumeSpec::parse("/host:/container").unwrap();
        assert_eq!(bind.bind().as_deref(), Some("/host:/container"));

        let ro = VolumeSpec::parse("/host:/container:ro").unwrap();
        assert_eq!(ro.bind().as_deref(), Some("/host:/container:ro"));

        for bad in ["/", "/host:/", ":/x", "/a:/b:rx", "/a:/b:ro:z", ""] {
            assert!(
                matches!(VolumeSpec::parse(bad), Err(ApiError::Argument(_))),
                "accepted {bad:?}"
            );
        }
    }
}
