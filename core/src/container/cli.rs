//! `docker run` command-line grammar.
//!
//! `[docker] [run|create] [flags...] <image> [command...]` is tokenized with
//! shell quoting rules and walked left to right. Flags resolve through a
//! fixed table to an operation tag; the first positional token is the image
//! and everything after it goes to `ContainerConfig::cmd`.

use tracing::debug;

use super::ContainerConfig;
use crate::error::{ApiError, Result};

/// Flags that take no value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Switch {
    Detach,
    Interactive,
    Privileged,
    PublishAll,
    Rm,
    Tty,
}

/// Flags that take one value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Setting {
    AddHost,
    Attach,
    CapAdd,
    CapDrop,
    CpuShares,
    Cpuset,
    Device,
    Dns,
    DnsSearch,
    Entrypoint,
    Env,
    EnvFile,
    Expose,
    Hostname,
    Link,
    LxcConf,
    Memory,
    Name,
    Net,
    Publish,
    Restart,
    SecurityOpt,
    User,
    Volume,
    VolumesFrom,
    Workdir,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Switch(Switch),
    Setting(Setting),
}

struct Flag {
    long: &'static str,
    short: Option<char>,
    op: Op,
}

const fn switch(long: &'static str, short: Option<char>, switch: Switch) -> Flag {
    Flag { long, short, op: Op::Switch(switch) }
}

const fn setting(long: &'static str, short: Option<char>, setting: Setting) -> Flag {
    Flag { long, short, op: Op::Setting(setting) }
}

const FLAGS: &[Flag] = &[
    setting("add-host", None, Setting::AddHost),
    setting("attach", Some('a'), Setting::Attach),
    setting("cap-add", None, Setting::CapAdd),
    setting("cap-drop", None, Setting::CapDrop),
    setting("cpu-shares", Some('c'), Setting::CpuShares),
    setting("cpuset", None, Setting::Cpuset),
    switch("detach", Some('d'), Switch::Detach),
    setting("device", None, Setting::Device),
    setting("dns", None, Setting::Dns),
    setting("dns-search", None, Setting::DnsSearch),
    setting("entrypoint", None, Setting::Entrypoint),
    setting("env", Some('e'), Setting::Env),
    setting("env-file", None, Setting::EnvFile),
    setting("expose", None, Setting::Expose),
    setting("hostname", Some('h'), Setting::Hostname),
    switch("interactive", Some('i'), Switch::Interactive),
    setting("link", None, Setting::Link),
    setting("lxc-conf", None, Setting::LxcConf),
    setting("memory", Some('m'), Setting::Memory),
    setting("name", None, Setting::Name),
    setting("net", None, Setting::Net),
    setting("network", None, Setting::Net),
    switch("privileged", None, Switch::Privileged),
    setting("publish", Some('p'), Setting::Publish),
    switch("publish-all", Some('P'), Switch::PublishAll),
    setting("restart", None, Setting::Restart),
    switch("rm", None, Switch::Rm),
    setting("security-opt", None, Setting::SecurityOpt),
    switch("tty", Some('t'), Switch::Tty),
    setting("user", Some('u'), Setting::User),
    setting("volume", Some('v'), Setting::Volume),
    setting("volumes-from", None, Setting::VolumesFrom),
    setting("workdir", Some('w'), Setting::Workdir),
];

const PREAMBLE: &[&str] = &["docker", "run", "create"];

fn lookup_long(name: &str) -> Result<Op> {
    let name = name.replace('_', "-");
    FLAGS
        .iter()
        .find(|flag| flag.long == name)
        .map(|flag| flag.op)
        .ok_or_else(|| ApiError::Argument(format!("unknown option --{name}")))
}

fn lookup_short(letter: char) -> Result<Op> {
    FLAGS
        .iter()
        .find(|flag| flag.short == Some(letter))
        .map(|flag| flag.op)
        .ok_or_else(|| ApiError::Argument(format!("unknown option -{letter}")))
}

fn parse_bool(flag: &str, value: &str) -> Result<bool> {
    match value {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(ApiError::Argument(format!(
            "option {flag} expects true or false, got '{value}'"
        ))),
    }
}

fn next_value(tokens: &mut impl Iterator<Item = String>, flag: &str) -> Result<String> {
    tokens
        .next()
        .ok_or_else(|| ApiError::Argument(format!("option {flag} requires a value")))
}

fn apply_switch(config: &mut ContainerConfig, switch: Switch, enabled: bool) {
    match switch {
        Switch::Detach => config.detach(enabled),
        Switch::Interactive => config.interactive(enabled),
        Switch::Privileged => config.privileged(enabled),
        Switch::PublishAll => config.publish_all(enabled),
        Switch::Rm => config.rm(enabled),
        Switch::Tty => config.tty(enabled),
    };
}

fn apply_setting(config: &mut ContainerConfig, setting: Setting, value: &str) -> Result<()> {
    let one = [value];
    match setting {
        Setting::AddHost => {
            config.add_host(one);
        }
        Setting::Attach => {
            config.attach(value)?;
        }
        Setting::CapAdd => {
            config.cap_add(one);
        }
        Setting::CapDrop => {
            config.cap_drop(one);
        }
        Setting::CpuShares => {
            config.cpu_shares(value)?;
        }
        Setting::Cpuset => {
            config.cpuset(value);
        }
        Setting::Device => {
            config.device(one)?;
        }
        Setting::Dns => {
            config.dns(one);
        }
        Setting::DnsSearch => {
            config.dns_search(one);
        }
        Setting::Entrypoint => {
            config.entrypoint(one)?;
        }
        Setting::Env => {
            config.env(one);
        }
        Setting::EnvFile => {
            config.env_file(one)?;
        }
        Setting::Expose => {
            config.expose(one)?;
        }
        Setting::Hostname => {
            config.hostname(value);
        }
        Setting::Link => {
            config.link(one);
        }
        Setting::LxcConf => {
            config.lxc_conf(one)?;
        }
        Setting::Memory => {
            config.memory(value)?;
        }
        Setting::Name => {
            config.set_name(value);
        }
        Setting::Net => {
            config.net(value)?;
        }
        Setting::Publish => {
            config.publish(one)?;
        }
        Setting::Restart => {
            config.restart(value)?;
        }
        Setting::SecurityOpt => {
            config.security_opt(one);
        }
        Setting::User => {
            config.user(value);
        }
        Setting::Volume => {
            config.volume(one)?;
        }
        Setting::VolumesFrom => {
            config.volumes_from(one);
        }
        Setting::Workdir => {
            config.workdir(value);
        }
    }
    Ok(())
}

/// Interpret `line` against `config`.
pub(super) fn apply(config: &mut ContainerConfig, line: &str) -> Result<()> {
    let tokens = shell_words::split(line)
        .map_err(|e| ApiError::Argument(format!("cannot tokenize '{line}': {e}")))?;
    let mut tokens = tokens.into_iter();

    while let Some(token) = tokens.next() {
        if let Some(long) = token.strip_prefix("--") {
            if long.is_empty() {
                continue;
            }
            let (name, inline) = match long.split_once('=') {
                Some((name, value)) => (name, Some(value)),
                None => (long, None),
            };
            debug!(option = name, "applying long option");
            match lookup_long(name)? {
                Op::Switch(switch) => {
                    let enabled = match inline {
                        Some(value) => parse_bool(&token, value)?,
                        None => true,
                    };
                    apply_switch(config, switch, enabled);
                }
                Op::Setting(setting) => {
                    let value = match inline {
                        Some(value) => value.to_string(),
                        None => next_value(&mut tokens, &token)?,
                    };
                    apply_setting(config, setting, &value)?;
                }
            }
        } else if let Some(letters) = token.strip_prefix('-').filter(|rest| !rest.is_empty()) {
            for (idx, letter) in letters.char_indices() {
                debug!(option = %letter, "applying short option");
                match lookup_short(letter)? {
                    Op::Switch(switch) => apply_switch(config, switch, true),
                    Op::Setting(setting) => {
                        let attached = &letters[idx + letter.len_utf8()..];
                        let value = if attached.is_empty() {
                            next_value(&mut tokens, &format!("-{letter}"))?
                        } else {
                            attached.to_string()
                        };
                        apply_setting(config, setting, &value)?;
                        break;
                    }
                }
            }
        } else if PREAMBLE.contains(&token.as_str()) {
            continue;
        } else {
            debug!(image = %token, "image found");
            config.image(&token);
            let command: Vec<String> = tokens.by_ref().collect();
            if !command.is_empty() {
                config.cmd(command)?;
            }
            break;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::container::HOST_CONFIG;

    #[test]
    fn full_run_line() {
        let config = ContainerConfig::from_cli(
            "docker run -d --name web -p 8080:80 -p 8081:80 -e FOO=bar \
             -v /srv/www:/usr/share/nginx/html --restart=on-failure:3 \
             nginx:latest nginx -g 'daemon off;'",
        )
        .unwrap();

        let doc = config.document();
        assert_eq!(config.name(), Some("web"));
        assert_eq!(doc["Image"], "nginx:latest");
        assert_eq!(doc["Cmd"], json!(["nginx", "-g", "daemon off;"]));
        assert_eq!(doc["Env"], json!(["FOO=bar"]));
        assert_eq!(doc["AttachStdout"], false);
        assert_eq!(doc["ExposedPorts"], json!({"80/tcp": {}}));
        assert_eq!(doc["Volumes"], json!({"/usr/share/nginx/html": {}}));

        let host = &doc[HOST_CONFIG];
        assert_eq!(host["PortBindings"]["80/tcp"].as_array().unwrap().len(), 2);
        assert_eq!(host["Binds"], json!(["/srv/www:/usr/share/nginx/html"]));
        assert_eq!(host["RestartPolicy"], json!({"Name": "on-failure", "MaximumRetryCount": 3}));
    }

    #[test]
    fn combined_short_switches() {
        let config = ContainerConfig::from_cli("run -it ubuntu bash").unwrap();
        let doc = config.document();
        assert_eq!(doc["Tty"], true);
        assert_eq!(doc["OpenStdin"], true);
        assert_eq!(doc["Image"], "ubuntu");
        assert_eq!(doc["Cmd"], json!(["bash"]));
    }

    #[test]
    fn short_switch_does_not_swallow_the_image() {
        let config = ContainerConfig::from_cli("-d redis").unwrap();
        assert_eq!(config.document()["Image"], "redis");
        assert!(config.document().get("Cmd").is_none());
    }

    #[test]
    fn attached_short_value_and_underscored_long_flag() {
        let config = ContainerConfig::from_cli("-p8080:80 --cap_add=NET_ADMIN busybox").unwrap();
        let host = &config.document()[HOST_CONFIG];
        assert_eq!(host["PortBindings"]["80/tcp"][0]["HostPort"], "8080");
        assert_eq!(host["CapAdd"], json!(["NET_ADMIN"]));
    }

    #[test]
    fn long_switch_with_explicit_value() {
        let config = ContainerConfig::from_cli("create --privileged=false --rm busybox").unwrap();
        let host = &config.document()[HOST_CONFIG];
        assert_eq!(host["Privileged"], false);
        assert_eq!(host["AutoRemove"], true);

        let err = ContainerConfig::from_cli("--privileged=maybe busybox").unwrap_err();
        assert!(matches!(err, ApiError::Argument(_)));
    }

    #[test]
    fn command_tokens_are_kept_verbatim() {
        let config = ContainerConfig::from_cli(r#"busybox sh -c "echo hi; ls -l""#).unwrap();
        assert_eq!(config.document()["Cmd"], json!(["sh", "-c", "echo hi; ls -l"]));
    }

    #[test]
    fn single_quoted_command_is_split_like_cmd() {
        let from_line = ContainerConfig::from_cli(r#"busybox "echo hi""#).unwrap();
        let mut direct = ContainerConfig::new();
        direct.image("busybox").cmd(["echo hi"]).unwrap();

        assert_eq!(from_line.document()["Cmd"], json!(["echo", "hi"]));
        assert_eq!(from_line.document()["Cmd"], direct.document()["Cmd"]);
    }

    #[test]
    fn unterminated_quote_inside_command_token_is_rejected() {
        let err = ContainerConfig::from_cli(r#"busybox "echo 'oops""#).unwrap_err();
        assert!(matches!(err, ApiError::Argument(_)));
    }

    #[test]
    fn flags_after_image_belong_to_the_command() {
        let config = ContainerConfig::from_cli("alpine ls -la /").unwrap();
        assert_eq!(config.document()["Cmd"], json!(["ls", "-la", "/"]));
    }

    #[test]
    fn rejects_unknown_and_incomplete_options() {
        for line in ["--bogus busybox", "-Z busybox", "-p", "--name"] {
            let result = ContainerConfig::from_cli(line);
            assert!(matches!(result, Err(ApiError::Argument(_))), "accepted {line:?}");
        }
    }

    #[test]
    fn option_letters_after_the_image_are_command_tokens() {
        let config = ContainerConfig::from_cli("busybox -p").unwrap();
        assert_eq!(config.document()["Cmd"], json!(["-p"]));
    }

    #[test]
    fn validation_errors_surface_from_the_builder() {
        let err = ContainerConfig::from_cli("-v /:/ busybox").unwrap_err();
        assert!(matches!(err, ApiError::Argument(_)));
        let err = ContainerConfig::from_cli("--restart=always:2 busybox").unwrap_err();
        assert!(matches!(err, ApiError::Argument(_)));
        let err = ContainerConfig::from_cli("-m 1x busybox").unwrap_err();
        assert!(matches!(err, ApiError::Argument(_)));
    }

    #[test]
    fn every_flag_resolves() {
        for flag in FLAGS {
            assert_eq!(lookup_long(flag.long).unwrap(), flag.op);
            if let Some(letter) = flag.short {
                assert_eq!(lookup_short(letter).unwrap(), flag.op);
            }
        }
    }
}
