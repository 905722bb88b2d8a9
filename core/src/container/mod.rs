//! Fluent builder for the container-create configuration document.
//!
//! # Overview
//! `ContainerConfig` accumulates the JSON document the engine expects on
//! `POST /containers/create`, either through method calls or from a
//! `docker run`-style command line (see `cli`).
//!
//! # Design
//! - The document always holds a `HostConfig` mapping, from construction on.
//! - Setters that cannot fail return `&mut Self`; setters that validate
//!   their input return `Result<&mut Self>`. A multi-value call that hits a
//!   bad entry keeps the entries applied before it.
//! - The container name travels as a query parameter, so it is kept beside
//!   the document rather than inside it.

mod cli;
pub mod options;
pub mod ports;

use std::fs;
use std::path::Path;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{ApiError, Result};

use self::options::{parse_cpu_shares, parse_memory, parse_network_mode};
pub use self::options::{DeviceMapping, RestartPolicy, VolumeSpec};
pub use self::ports::PortBinding;

pub const HOST_CONFIG: &str = "HostConfig";

/// Standard stream named by `--attach`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdin,
    Stdout,
    Stderr,
}

impl Stream {
    pub fn parse(name: &str) -> Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "stdin" => Ok(Stream::Stdin),
            "stdout" => Ok(Stream::Stdout),
            "stderr" => Ok(Stream::Stderr),
            _ => Err(ApiError::Argument(format!(
                "cannot attach to '{name}', expected stdin, stdout or stderr"
            ))),
        }
    }

    fn key(self) -> &'static str {
        match self {
            Stream::Stdin => "AttachStdin",
            Stream::Stdout => "AttachStdout",
            Stream::Stderr => "AttachStderr",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContainerConfig {
    document: Map<String, Value>,
    name: Option<String>,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ContainerConfig {
    pub fn new() -> Self {
        let mut document = Map::new();
        document.insert(HOST_CONFIG.to_string(), Value::Object(Map::new()));
        Self { document, name: None }
    }

    /// Start from an existing document. A missing `HostConfig` is added; one
    /// that is not a mapping is rejected.
    pub fn from_document(mut document: Map<String, Value>) -> Result<Self> {
        match document.get(HOST_CONFIG) {
            None => {
                document.insert(HOST_CONFIG.to_string(), Value::Object(Map::new()));
            }
            Some(Value::Object(_)) => {}
            Some(other) => {
                return Err(ApiError::Argument(format!(
                    "HostConfig must be a mapping, got {other}"
                )))
            }
        }
        Ok(Self { document, name: None })
    }

    /// Build a configuration from a `docker run` command line.
    pub fn from_cli(line: &str) -> Result<Self> {
        let mut config = Self::new();
        config.apply_cli(line)?;
        Ok(config)
    }

    /// Apply a `docker run` command line on top of the current state.
    pub fn apply_cli(&mut self, line: &str) -> Result<&mut Self> {
        cli::apply(self, line)?;
        Ok(self)
    }

    pub fn document(&self) -> &Map<String, Value> {
        &self.document
    }

    pub fn into_document(self) -> Map<String, Value> {
        self.document
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn with_host<R>(&mut self, f: impl FnOnce(&mut Map<String, Value>) -> R) -> R {
        with_object(&mut self.document, HOST_CONFIG, f)
    }

    fn set(&mut self, key: &str, value: impl Into<Value>) -> &mut Self {
        self.document.insert(key.to_string(), value.into());
        self
    }

    fn set_host(&mut self, key: &str, value: impl Into<Value>) -> &mut Self {
        self.with_host(|host| host.insert(key.to_string(), value.into()));
        self
    }

    fn append_host<I, S>(&mut self, key: &str, values: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let values = values.into_iter().map(|v| Value::from(v.as_ref()));
        self.with_host(|host| with_array(host, key, |list| list.extend(values)));
        self
    }

    pub fn image(&mut self, image: &str) -> &mut Self {
        self.set("Image", image)
    }

    pub fn set_name(&mut self, name: &str) -> &mut Self {
        self.name = Some(name.to_string());
        self
    }

    /// Set the command. A single argument is split with shell quoting rules.
    pub fn cmd<I, S>(&mut self, args: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let args = shell_args(args)?;
        Ok(self.set_cmd(args))
    }

    /// Set the command vector as given, without splitting.
    pub fn set_cmd(&mut self, args: Vec<String>) -> &mut Self {
        self.set("Cmd", args)
    }

    /// Set the entrypoint. A single argument is split like `cmd`.
    pub fn entrypoint<I, S>(&mut self, args: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let args = shell_args(args)?;
        Ok(self.set("Entrypoint", args))
    }

    /// Append `NAME=value` entries to `Env`. A bare name takes its value from
    /// the process environment (empty when unset).
    pub fn env<I, S>(&mut self, vars: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let entries: Vec<Value> = vars.into_iter().map(|v| Value::from(expand_env(v.as_ref()))).collect();
        with_array(&mut self.document, "Env", |list| list.extend(entries));
        self
    }

    /// Append the entries of each env file to `Env`. Blank lines and `#`
    /// comments are skipped.
    pub fn env_file<I, P>(&mut self, paths: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        for path in paths {
            let path = path.as_ref();
            if !path.is_file() {
                return Err(ApiError::Argument(format!(
                    "env file not found: {}",
                    path.display()
                )));
            }
            let contents = fs::read_to_string(path)?;
            let mut entries = Vec::new();
            for line in contents.lines().map(str::trim) {
                if line.is_empty() || line.starts_with('#') {
                    continue;
                }
                if let Some((key, _)) = line.split_once('=') {
                    if key.chars().any(char::is_whitespace) {
                        return Err(ApiError::Argument(format!(
                            "variable '{key}' in {} contains whitespace",
                            path.display()
                        )));
                    }
                }
                entries.push(Value::from(expand_env(line)));
            }
            with_array(&mut self.document, "Env", |list| list.extend(entries));
        }
        Ok(self)
    }

    /// Add `port/proto` keys to `ExposedPorts`; ranges expand to one key per
    /// port. Re-adding a key is a no-op.
    pub fn expose<I, S>(&mut self, ports: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for spec in ports {
            for key in ports::parse_exposed(spec.as_ref())? {
                self.expose_key(key);
            }
        }
        Ok(self)
    }

    fn expose_key(&mut self, key: String) {
        with_object(&mut self.document, "ExposedPorts", |exposed| {
            exposed.entry(key).or_insert_with(|| Value::Object(Map::new()));
        });
    }

    /// Publish container ports, exposing them and appending one binding per
    /// entry to `HostConfig.PortBindings`.
    pub fn publish<I, S>(&mut self, ports: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for spec in ports {
            let (key, binding) = ports::parse_published(spec.as_ref())?;
            let binding = to_value(&binding)?;
            self.expose_key(key.clone());
            self.with_host(|host| {
                with_object(host, "PortBindings", |bindings| {
                    with_array(bindings, &key, |list| list.push(binding))
                })
            });
        }
        Ok(self)
    }

    pub fn publish_all(&mut self, enabled: bool) -> &mut Self {
        self.set_host("PublishAllPorts", enabled)
    }

    /// Declare volumes; `host:container` specs also append to `HostConfig.Binds`.
    pub fn volume<I, S>(&mut self, specs: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for spec in specs {
            let volume = VolumeSpec::parse(spec.as_ref())?;
            with_object(&mut self.document, "Volumes", |volumes| {
                volumes.insert(volume.container.clone(), Value::Object(Map::new()))
            });
            if let Some(bind) = volume.bind() {
                self.with_host(|host| with_array(host, "Binds", |list| list.push(Value::from(bind))));
            }
        }
        Ok(self)
    }

    pub fn device<I, S>(&mut self, specs: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for spec in specs {
            let device = to_value(&DeviceMapping::parse(spec.as_ref())?)?;
            self.with_host(|host| with_array(host, "Devices", |list| list.push(device)));
        }
        Ok(self)
    }

    /// Set `Memory` from a `<n>[b|k|m|g]` string.
    pub fn memory(&mut self, value: &str) -> Result<&mut Self> {
        let bytes = parse_memory(value)?;
        Ok(self.set("Memory", bytes))
    }

    pub fn cpu_shares(&mut self, value: &str) -> Result<&mut Self> {
        let shares = parse_cpu_shares(value)?;
        Ok(self.set("CpuShares", shares))
    }

    pub fn cpuset(&mut self, cpus: &str) -> &mut Self {
        self.set("Cpuset", cpus)
    }

    pub fn hostname(&mut self, hostname: &str) -> &mut Self {
        self.set("Hostname", hostname)
    }

    pub fn user(&mut self, user: &str) -> &mut Self {
        self.set("User", user)
    }

    pub fn workdir(&mut self, dir: &str) -> &mut Self {
        self.set("WorkingDir", dir)
    }

    pub fn tty(&mut self, enabled: bool) -> &mut Self {
        self.set("Tty", enabled)
    }

    /// Keep stdin open and attached.
    pub fn interactive(&mut self, enabled: bool) -> &mut Self {
        self.set("OpenStdin", enabled)
            .set("AttachStdin", enabled)
            .set("StdinOnce", enabled)
    }

    pub fn attach(&mut self, stream: &str) -> Result<&mut Self> {
        let stream = Stream::parse(stream)?;
        Ok(self.set(stream.key(), true))
    }

    /// Run in the background: no stream is attached.
    pub fn detach(&mut self, enabled: bool) -> &mut Self {
        if enabled {
            for stream in [Stream::Stdin, Stream::Stdout, Stream::Stderr] {
                self.set(stream.key(), false);
            }
            self.set("StdinOnce", false);
        }
        self
    }

    pub fn restart(&mut self, policy: &str) -> Result<&mut Self> {
        let policy = to_value(&RestartPolicy::parse(policy)?)?;
        Ok(self.set_host("RestartPolicy", policy))
    }

    pub fn net(&mut self, mode: &str) -> Result<&mut Self> {
        let mode = parse_network_mode(mode)?;
        Ok(self.set_host("NetworkMode", mode))
    }

    pub fn privileged(&mut self, enabled: bool) -> &mut Self {
        self.set_host("Privileged", enabled)
    }

    pub fn rm(&mut self, enabled: bool) -> &mut Self {
        self.set_host("AutoRemove", enabled)
    }

    pub fn cap_add<I: IntoIterator<Item = S>, S: AsRef<str>>(&mut self, caps: I) -> &mut Self {
        self.append_host("CapAdd", caps)
    }

    pub fn cap_drop<I: IntoIterator<Item = S>, S: AsRef<str>>(&mut self, caps: I) -> &mut Self {
        self.append_host("CapDrop", caps)
    }

    pub fn dns<I: IntoIterator<Item = S>, S: AsRef<str>>(&mut self, servers: I) -> &mut Self {
        self.append_host("Dns", servers)
    }

    pub fn dns_search<I: IntoIterator<Item = S>, S: AsRef<str>>(&mut self, domains: I) -> &mut Self {
        self.append_host("DnsSearch", domains)
    }

    pub fn link<I: IntoIterator<Item = S>, S: AsRef<str>>(&mut self, links: I) -> &mut Self {
        self.append_host("Links", links)
    }

    pub fn security_opt<I: IntoIterator<Item = S>, S: AsRef<str>>(&mut self, opts: I) -> &mut Self {
        self.append_host("SecurityOpt", opts)
    }

    pub fn volumes_from<I: IntoIterator<Item = S>, S: AsRef<str>>(&mut self, containers: I) -> &mut Self {
        self.append_host("VolumesFrom", containers)
    }

    pub fn add_host<I: IntoIterator<Item = S>, S: AsRef<str>>(&mut self, hosts: I) -> &mut Self {
        self.append_host("ExtraHosts", hosts)
    }

    /// Append `key=value` pairs to `HostConfig.LxcConf`.
    pub fn lxc_conf<I, S>(&mut self, entries: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for entry in entries {
            let entry = entry.as_ref();
            let Some((key, value)) = entry.split_once('=') else {
                return Err(ApiError::Argument(format!(
                    "invalid lxc option '{entry}', expected key=value"
                )));
            };
            let pair = serde_json::json!({"Key": key, "Value": value});
            self.with_host(|host| with_array(host, "LxcConf", |list| list.push(pair)));
        }
        Ok(self)
    }
}

/// Run `f` on the mapping stored under `key`. A missing or non-mapping
/// value is replaced by a fresh mapping.
fn with_object<R>(
    map: &mut Map<String, Value>,
    key: &str,
    f: impl FnOnce(&mut Map<String, Value>) -> R,
) -> R {
    match map.entry(key).or_insert_with(|| Value::Object(Map::new())) {
        Value::Object(inner) => f(inner),
        slot => {
            let mut inner = Map::new();
            let result = f(&mut inner);
            *slot = Value::Object(inner);
            result
        }
    }
}

/// Run `f` on the list stored under `key`. A missing or non-list value is
/// replaced by a fresh list.
fn with_array<R>(map: &mut Map<String, Value>, key: &str, f: impl FnOnce(&mut Vec<Value>) -> R) -> R {
    match map.entry(key).or_insert_with(|| Value::Array(Vec::new())) {
        Value::Array(inner) => f(inner),
        slot => {
            let mut inner = Vec::new();
            let result = f(&mut inner);
            *slot = Value::Array(inner);
            result
        }
    }
}

fn to_value(value: &impl Serialize) -> Result<Value> {
    serde_json::to_value(value).map_err(|e| ApiError::Serialization(e.to_string()))
}

fn shell_args<I, S>(args: I) -> Result<Vec<String>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let args: Vec<String> = args.into_iter().map(|a| a.as_ref().to_string()).collect();
    match args.as_slice() {
        [single] => shell_words::split(single)
            .map_err(|e| ApiError::Argument(format!("cannot split command '{single}': {e}"))),
        _ => Ok(args),
    }
}

fn expand_env(entry: &str) -> String {
    if entry.contains('=') {
        entry.to_string()
    } else {
        format!("{entry}={}", std::env::var(entry).unwrap_or_default())
    }
}
