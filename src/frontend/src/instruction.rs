//! Typed Dockerfile instructions.
//!
//! [`classify`] maps one raw command onto exactly one [`Instruction`]
//! variant. Unrecognized keywords are skipped with a warning.

use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use stagefile_core::error::{Result, StagefileError};

use crate::syntax::RawCommand;

/// Keywords that accept no `--flag` options.
const FLAGLESS_KEYWORDS: &[&str] = &[
    "ARG",
    "CMD",
    "ENTRYPOINT",
    "ENV",
    "EXPOSE",
    "LABEL",
    "MAINTAINER",
    "ONBUILD",
    "SHELL",
    "STOPSIGNAL",
    "USER",
    "VOLUME",
    "WORKDIR",
];

/// A single Dockerfile instruction inside a stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Instruction {
    /// `ADD [--chown=<user>] [--chmod=<perms>] [--link] [--checksum=<digest>] [--keep-git-dir] [--exclude=<glob>]... <src>... <dst>`
    Add {
        src: Vec<String>,
        dst: String,
        chown: String,
        chmod: String,
        link: bool,
        checksum: String,
        keep_git_dir: bool,
        exclude: Vec<String>,
    },
    /// `ARG <name>[=<default>] ...`
    Arg { args: Vec<ArgDefinition> },
    /// `CMD ["exec", "form"]` or `CMD command`
    Cmd {
        cmd: Vec<String>,
        prepend_shell: bool,
    },
    /// `COPY [--from=<stage>] [--chown=<user>] [--chmod=<perms>] [--link] [--parents] [--exclude=<glob>]... <src>... <dst>`
    Copy {
        /// Stage reference; empty when copying from the build context
        from: String,
        src: Vec<String>,
        dst: String,
        chown: String,
        chmod: String,
        link: bool,
        parents: bool,
        exclude: Vec<String>,
    },
    /// `ENTRYPOINT ["exec", "form"]` or `ENTRYPOINT command`
    Entrypoint {
        cmd: Vec<String>,
        prepend_shell: bool,
    },
    /// `ENV <key>=<value> ...` or `ENV <key> <value>`
    Env { envs: IndexMap<String, String> },
    /// `EXPOSE <port>[/<proto>] ...`
    Expose { ports: Vec<String> },
    /// `HEALTHCHECK [options] CMD <command>` or `HEALTHCHECK NONE`
    Healthcheck { health: HealthConfig },
    /// `LABEL <key>=<value> ...`
    Label { labels: IndexMap<String, String> },
    /// `MAINTAINER <name>`
    Maintainer { maintainer: String },
    /// `ONBUILD <instruction>`
    OnBuild { expression: String },
    /// `RUN [--mount=...] [--network=...] [--security=...] <command>`
    Run {
        cmd: Vec<String>,
        prepend_shell: bool,
        mounts: Vec<Mount>,
        network: NetworkMode,
        security: SecurityMode,
    },
    /// `SHELL ["executable", "parameters"]`
    Shell { shell: Vec<String> },
    /// `STOPSIGNAL <signal>`
    StopSignal { signal: String },
    /// `USER <user>[:<group>]`
    User { user: String },
    /// `VOLUME <path> ...`
    Volume { volumes: Vec<String> },
    /// `WORKDIR <path>`
    Workdir { path: String },
}

impl Instruction {
    /// Upper-case Dockerfile keyword of this instruction.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Add { .. } => "ADD",
            Self::Arg { .. } => "ARG",
            Self::Cmd { .. } => "CMD",
            Self::Copy { .. } => "COPY",
            Self::Entrypoint { .. } => "ENTRYPOINT",
            Self::Env { .. } => "ENV",
            Self::Expose { .. } => "EXPOSE",
            Self::Healthcheck { .. } => "HEALTHCHECK",
            Self::Label { .. } => "LABEL",
            Self::Maintainer { .. } => "MAINTAINER",
            Self::OnBuild { .. } => "ONBUILD",
            Self::Run { .. } => "RUN",
            Self::Shell { .. } => "SHELL",
            Self::StopSignal { .. } => "STOPSIGNAL",
            Self::User { .. } => "USER",
            Self::Volume { .. } => "VOLUME",
            Self::Workdir { .. } => "WORKDIR",
        }
    }

    /// Stage references carried by this instruction (`COPY --from`, mount `from`).
    pub fn stage_references(&self) -> Vec<&str> {
        match self {
            Self::Copy { from, .. } if !from.is_empty() => vec![from.as_str()],
            Self::Run { mounts, .. } => mounts
                .iter()
                .filter(|mount| !mount.from.is_empty())
                .map(|mount| mount.from.as_str())
                .collect(),
            _ => Vec::new(),
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind())?;
        match self {
            Self::Add { src, dst, .. } => write!(f, " {} {}", src.join(" "), dst),
            Self::Copy { from, src, dst, .. } => {
                if !from.is_empty() {
                    write!(f, " --from={from}")?;
                }
                write!(f, " {} {}", src.join(" "), dst)
            }
            Self::Arg { args } => {
                for arg in args {
                    write!(f, " {arg}")?;
                }
                Ok(())
            }
            Self::Cmd { cmd, prepend_shell }
            | Self::Entrypoint { cmd, prepend_shell }
            | Self::Run {
                cmd, prepend_shell, ..
            } => {
                if *prepend_shell {
                    write!(f, " {}", cmd.join(" "))
                } else {
                    write!(f, " {cmd:?}")
                }
            }
            Self::Env { envs: pairs } | Self::Label { labels: pairs } => {
                for (key, value) in pairs {
                    write!(f, " {key}={value}")?;
                }
                Ok(())
            }
            Self::Expose { ports } => write!(f, " {}", ports.join(" ")),
            Self::Healthcheck { health } => write!(f, " {:?}", health.test),
            Self::Maintainer { maintainer } => write!(f, " {maintainer}"),
            Self::OnBuild { expression } => write!(f, " {expression}"),
            Self::Shell { shell } => write!(f, " {shell:?}"),
            Self::StopSignal { signal } => write!(f, " {signal}"),
            Self::User { user } => write!(f, " {user}"),
            Self::Volume { volumes } => write!(f, " {}", volumes.join(" ")),
            Self::Workdir { path } => write!(f, " {path}"),
        }
    }
}

/// One `ARG` declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArgDefinition {
    pub key: String,
    pub value: Option<String>,
}

impl fmt::Display for ArgDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, "{}={}", self.key, value),
            None => write!(f, "{}", self.key),
        }
    }
}

/// Health check settings. Durations are kept as written.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthConfig {
    /// `["NONE"]`, `["CMD", args...]` or `["CMD-SHELL", command]`
    pub test: Vec<String>,
    pub interval: Option<String>,
    pub timeout: Option<String>,
    pub start_period: Option<String>,
    pub start_interval: Option<String>,
    pub retries: Option<u32>,
}

/// A `RUN --mount=...` declaration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mount {
    pub mount_type: MountType,
    /// Stage reference the mount is sourced from; empty for the build context
    pub from: String,
    pub source: String,
    pub target: String,
    pub read_only: bool,
    /// Remaining mount-specific options (id, sharing, mode, uid, gid, size, ...)
    pub options: IndexMap<String, String>,
}

/// Mount kind for `RUN --mount`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MountType {
    #[default]
    Bind,
    Cache,
    Tmpfs,
    Secret,
    Ssh,
}

impl fmt::Display for MountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bind => write!(f, "bind"),
            Self::Cache => write!(f, "cache"),
            Self::Tmpfs => write!(f, "tmpfs"),
            Self::Secret => write!(f, "secret"),
            Self::Ssh => write!(f, "ssh"),
        }
    }
}

impl FromStr for MountType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bind" => Ok(Self::Bind),
            "cache" => Ok(Self::Cache),
            "tmpfs" => Ok(Self::Tmpfs),
            "secret" => Ok(Self::Secret),
            "ssh" => Ok(Self::Ssh),
            _ => Err(format!(
                "unsupported mount type '{s}' (supported: bind, cache, tmpfs, secret, ssh)"
            )),
        }
    }
}

/// Network mode for `RUN --network`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkMode {
    #[default]
    Default,
    None,
    Host,
}

impl fmt::Display for NetworkMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => write!(f, "default"),
            Self::None => write!(f, "none"),
            Self::Host => write!(f, "host"),
        }
    }
}

impl FromStr for NetworkMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "default" => Ok(Self::Default),
            "none" => Ok(Self::None),
            "host" => Ok(Self::Host),
            _ => Err(format!(
                "unsupported network mode '{s}' (supported: default, none, host)"
            )),
        }
    }
}

/// Security mode for `RUN --security`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecurityMode {
    #[default]
    Sandbox,
    Insecure,
}

impl fmt::Display for SecurityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sandbox => write!(f, "sandbox"),
            Self::Insecure => write!(f, "insecure"),
        }
    }
}

impl FromStr for SecurityMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "sandbox" => Ok(Self::Sandbox),
            "insecure" => Ok(Self::Insecure),
            _ => Err(format!(
                "unsupported security mode '{s}' (supported: sandbox, insecure)"
            )),
        }
    }
}

/// Classify a raw command.
///
/// Returns `Ok(None)` for keywords outside the supported set.
///
/// # Panics
///
/// Panics if a `COPY`/`ADD` command carries fewer than two arguments; the
/// syntax parser never produces one.
pub fn classify(command: &RawCommand) -> Result<Option<Instruction>> {
    let line = command.line;

    if FLAGLESS_KEYWORDS.contains(&command.keyword.as_str()) {
        check_flags(command, &[])?;
    }

    let instruction = match command.keyword.as_str() {
        "ADD" => {
            check_flags(
                command,
                &["chown", "chmod", "link", "checksum", "keep-git-dir", "exclude"],
            )?;
            let (src, dst) = split_sources_and_dest(command);
            Instruction::Add {
                src,
                dst,
                chown: flag_string(command, "chown"),
                chmod: flag_string(command, "chmod"),
                link: command.flag("link").is_some(),
                checksum: flag_string(command, "checksum"),
                keep_git_dir: command.flag("keep-git-dir").is_some(),
                exclude: flag_list(command, "exclude"),
            }
        }
        "ARG" => Instruction::Arg {
            args: parse_arg_definitions(command)?,
        },
        "CMD" => Instruction::Cmd {
            cmd: command.args.clone(),
            prepend_shell: !command.json,
        },
        "COPY" => {
            check_flags(
                command,
                &["from", "chown", "chmod", "link", "parents", "exclude"],
            )?;
            let (src, dst) = split_sources_and_dest(command);
            Instruction::Copy {
                from: flag_string(command, "from"),
                src,
                dst,
                chown: flag_string(command, "chown"),
                chmod: flag_string(command, "chmod"),
                link: command.flag("link").is_some(),
                parents: command.flag("parents").is_some(),
                exclude: flag_list(command, "exclude"),
            }
        }
        "ENTRYPOINT" => Instruction::Entrypoint {
            cmd: command.args.clone(),
            prepend_shell: !command.json,
        },
        "ENV" => Instruction::Env {
            envs: fold_pairs(&command.args),
        },
        "EXPOSE" => Instruction::Expose {
            ports: command.args.clone(),
        },
        "HEALTHCHECK" => Instruction::Healthcheck {
            health: parse_health_config(command)?,
        },
        "LABEL" => Instruction::Label {
            labels: fold_pairs(&command.args),
        },
        "MAINTAINER" => Instruction::Maintainer {
            maintainer: command.original.clone(),
        },
        "ONBUILD" => Instruction::OnBuild {
            expression: command.original.clone(),
        },
        "RUN" => {
            check_flags(command, &["mount", "network", "security"])?;
            let mounts = command
                .flag_values("mount")
                .map(|value| parse_mount(value, line))
                .collect::<Result<Vec<_>>>()?;
            Instruction::Run {
                cmd: command.args.clone(),
                prepend_shell: !command.json,
                mounts,
                network: parse_flag_enum(command, "network")?,
                security: parse_flag_enum(command, "security")?,
            }
        }
        "SHELL" => Instruction::Shell {
            shell: command.args.clone(),
        },
        "STOPSIGNAL" => Instruction::StopSignal {
            signal: single_argument(command)?,
        },
        "USER" => Instruction::User {
            user: single_argument(command)?,
        },
        "VOLUME" => Instruction::Volume {
            volumes: command.args.clone(),
        },
        "WORKDIR" => Instruction::Workdir {
            path: command.args.join(" "),
        },
        other => {
            tracing::warn!(
                line,
                instruction = other,
                "Unsupported Dockerfile instruction, skipping"
            );
            return Ok(None);
        }
    };

    Ok(Some(instruction))
}

/// Parse the `NAME[=default]` words of an `ARG` command.
pub fn parse_arg_definitions(command: &RawCommand) -> Result<Vec<ArgDefinition>> {
    command
        .args
        .iter()
        .map(|word| {
            let (key, value) = match word.split_once('=') {
                Some((key, value)) => (key, Some(value.to_string())),
                None => (word.as_str(), None),
            };
            if key.is_empty() {
                return Err(StagefileError::instruction(
                    command.line,
                    "ARG names can not be blank",
                ));
            }
            Ok(ArgDefinition {
                key: key.to_string(),
                value,
            })
        })
        .collect()
}

// --- Helpers ---

/// All arguments but the last are sources; the last is the destination.
fn split_sources_and_dest(command: &RawCommand) -> (Vec<String>, String) {
    match command.args.split_last() {
        Some((dst, src)) if !src.is_empty() => (src.to_vec(), dst.clone()),
        _ => panic!(
            "unexpected {} sources and destination at line {}: {:?}",
            command.keyword, command.line, command.args
        ),
    }
}

/// Fold flattened `[k1, v1, k2, v2, ...]` pairs; a repeated key keeps its last value.
fn fold_pairs(args: &[String]) -> IndexMap<String, String> {
    args.chunks_exact(2)
        .map(|pair| (pair[0].clone(), pair[1].clone()))
        .collect()
}

fn check_flags(command: &RawCommand, allowed: &[&str]) -> Result<()> {
    match command
        .flags
        .iter()
        .find(|flag| !allowed.contains(&flag.name.as_str()))
    {
        Some(flag) => Err(StagefileError::instruction(
            command.line,
            format!("unknown flag: --{}", flag.name),
        )),
        None => Ok(()),
    }
}

fn flag_string(command: &RawCommand, name: &str) -> String {
    command.flag(name).unwrap_or_default().to_string()
}

fn flag_list(command: &RawCommand, name: &str) -> Vec<String> {
    command.flag_values(name).map(str::to_string).collect()
}

fn optional_flag(command: &RawCommand, name: &str) -> Option<String> {
    command
        .flag(name)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn parse_flag_enum<T>(command: &RawCommand, name: &str) -> Result<T>
where
    T: FromStr<Err = String> + Default,
{
    match command.flag(name) {
        Some(value) => value
            .parse()
            .map_err(|e: String| StagefileError::instruction(command.line, e)),
        None => Ok(T::default()),
    }
}

fn single_argument(command: &RawCommand) -> Result<String> {
    match command.args.as_slice() {
        [arg] => Ok(arg.clone()),
        _ => Err(StagefileError::instruction(
            command.line,
            format!("{} requires exactly one argument", command.keyword),
        )),
    }
}

fn parse_health_config(command: &RawCommand) -> Result<HealthConfig> {
    check_flags(
        command,
        &["interval", "timeout", "start-period", "start-interval", "retries"],
    )?;

    let kind = command.args.first().map(String::as_str).unwrap_or("NONE");
    let rest = command.args.get(1..).unwrap_or_default();
    let test = if kind == "NONE" {
        vec!["NONE".to_string()]
    } else if command.json {
        std::iter::once("CMD".to_string())
            .chain(rest.iter().cloned())
            .collect()
    } else {
        vec!["CMD-SHELL".to_string(), rest.join(" ")]
    };

    let retries = command
        .flag("retries")
        .map(|value| {
            value.parse::<u32>().map_err(|_| {
                StagefileError::instruction(
                    command.line,
                    format!("invalid --retries value: {value}"),
                )
            })
        })
        .transpose()?;

    Ok(HealthConfig {
        test,
        interval: optional_flag(command, "interval"),
        timeout: optional_flag(command, "timeout"),
        start_period: optional_flag(command, "start-period"),
        start_interval: optional_flag(command, "start-interval"),
        retries,
    })
}

/// Parse a `--mount` value: comma-separated `key=value` fields.
fn parse_mount(value: &str, line: usize) -> Result<Mount> {
    let mut mount_type = MountType::default();
    let mut fields = Vec::new();

    for part in value.split(',') {
        let (key, val) = match part.split_once('=') {
            Some((key, val)) => (key.trim(), Some(val.trim())),
            None => (part.trim(), None),
        };
        if key.is_empty() {
            continue;
        }
        if key.eq_ignore_ascii_case("type") {
            mount_type = val
                .unwrap_or_default()
                .parse()
                .map_err(|e: String| StagefileError::instruction(line, e))?;
        } else {
            fields.push((key.to_ascii_lowercase(), val));
        }
    }

    // Bind mounts are read-only unless `rw` is given
    let mut mount = Mount {
        mount_type,
        read_only: mount_type == MountType::Bind,
        ..Mount::default()
    };

    for (key, val) in fields {
        match key.as_str() {
            "from" => mount.from = val.unwrap_or_default().to_string(),
            "source" | "src" => mount.source = val.unwrap_or_default().to_string(),
            "target" | "dst" | "destination" => mount.target = val.unwrap_or_default().to_string(),
            "ro" | "readonly" => mount.read_only = parse_bool_option(&key, val, line)?,
            "rw" | "readwrite" => mount.read_only = !parse_bool_option(&key, val, line)?,
            _ => {
                mount
                    .options
                    .insert(key, val.unwrap_or_default().to_string());
            }
        }
    }

    if mount.target.is_empty()
        && matches!(
            mount.mount_type,
            MountType::Bind | MountType::Cache | MountType::Tmpfs
        )
    {
        return Err(StagefileError::instruction(
            line,
            format!("mount target is required for {} mounts", mount.mount_type),
        ));
    }

    Ok(mount)
}

fn parse_bool_option(key: &str, value: Option<&str>, line: usize) -> Result<bool> {
    match value {
        None => Ok(true),
        Some(value) => value.parse().map_err(|_| {
            StagefileError::instruction(line, format!("invalid value for {key}: {value}"))
        }),
    }
}
