//! File configuration for CLI defaults.
//!
//! Values here sit between the built-in defaults and explicitly passed flags.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use dljob_core::connector::{ConnectOptions, ModePolicy};
use dljob_core::download::{AUTOSAVE_INTERVAL, CONNECT_TIMEOUT_SECS, DEFAULT_WORKERS, PoolOptions};

use crate::cli::Args;

/// `key = value` file configuration.
#[derive(Debug, Clone, Default)]
pub struct FileConfig {
    /// Default worker count (same range as CLI).
    pub threads: Option<u8>,
    /// Default autosave interval in seconds.
    pub autosave_secs: Option<u64>,
    /// Default connect timeout in seconds.
    pub connect_timeout_secs: Option<u64>,
    /// Apply remote permission bits to written files.
    pub preserve_mode: Option<bool>,
    /// Default verbosity mode.
    pub verbosity: Option<VerbositySetting>,
}

impl FileConfig {
    /// Validates config values against runtime and CLI constraints.
    pub fn validate(&self) -> Result<()> {
        if let Some(threads) = self.threads
            && !(1..=64).contains(&threads)
        {
            bail!("Invalid config value for `threads`: {threads}. Expected range: 1..=64");
        }
        validate_secs("autosave_secs", self.autosave_secs, 3600)?;
        validate_secs("connect_timeout_secs", self.connect_timeout_secs, 3600)?;
        Ok(())
    }
}

fn validate_secs(field: &str, value: Option<u64>, max: u64) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    if !(1..=max).contains(&value) {
        bail!("Invalid config value for `{field}`: {value}. Expected range: 1..={max}");
    }
    Ok(())
}

/// Supported config verbosity labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerbositySetting {
    Default,
    Verbose,
    Quiet,
    Debug,
}

impl VerbositySetting {
    /// Log level used when neither `RUST_LOG` nor `-v`/`-q` are given.
    #[must_use]
    pub fn default_level(self) -> &'static str {
        match self {
            Self::Default => "info",
            Self::Verbose => "debug",
            Self::Quiet => "error",
            Self::Debug => "trace",
        }
    }
}

/// Loaded config metadata.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// Resolved config path if a base directory is known.
    pub path: Option<PathBuf>,
    /// Parsed file config when a config file exists and was valid.
    pub config: Option<FileConfig>,
}

/// Resolves default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/dljob/config.toml`
/// 2. `$HOME/.config/dljob/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(PathBuf::from(xdg_config_home).join("dljob").join("config.toml"));
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("dljob")
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads config from the default path if present.
pub fn load_default_file_config() -> Result<LoadedConfig> {
    let path = resolve_default_config_path();
    let config = match path.as_deref() {
        Some(path_ref) if path_ref.exists() => Some(load_file_config(path_ref)?),
        _ => None,
    };
    Ok(LoadedConfig { path, config })
}

fn load_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

/// Effective run settings after merging flags, file config and defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSettings {
    pub workers: usize,
    pub autosave_interval: Duration,
    pub connect_timeout: Duration,
    pub mode_policy: ModePolicy,
    /// Level used when `RUST_LOG` is unset.
    pub default_log_level: &'static str,
}

impl RunSettings {
    /// Explicit flags win over the file config, which wins over built-in defaults.
    #[must_use]
    pub fn resolve(args: &Args, file: Option<&FileConfig>) -> Self {
        let file = file.cloned().unwrap_or_default();

        let workers = args
            .threads
            .or(file.threads)
            .map_or(DEFAULT_WORKERS, usize::from);
        let autosave_interval = args
            .autosave_secs
            .or(file.autosave_secs)
            .map_or(AUTOSAVE_INTERVAL, Duration::from_secs);
        let connect_timeout = Duration::from_secs(
            args.connect_timeout_secs
                .or(file.connect_timeout_secs)
                .unwrap_or(CONNECT_TIMEOUT_SECS),
        );
        let mode_policy = if args.preserve_mode || file.preserve_mode.unwrap_or(false) {
            ModePolicy::Preserve
        } else {
            ModePolicy::Ignore
        };

        let default_log_level = if args.quiet {
            "error"
        } else {
            match args.verbose {
                0 => file
                    .verbosity
                    .unwrap_or(VerbositySetting::Default)
                    .default_level(),
                1 => "debug",
                _ => "trace",
            }
        };

        Self {
            workers,
            autosave_interval,
            connect_timeout,
            mode_policy,
            default_log_level,
        }
    }

    /// Connector options for the registry.
    #[must_use]
    pub fn connect_options(&self) -> ConnectOptions {
        ConnectOptions {
            connect_timeout: self.connect_timeout,
            mode_policy: self.mode_policy,
        }
    }

    /// Worker pool options.
    #[must_use]
    pub fn pool_options(&self) -> PoolOptions {
        PoolOptions {
            workers: self.workers,
            autosave_interval: self.autosave_interval,
        }
    }
}

fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let mut cfg = FileConfig::default();
    for (line_index, raw_line) in raw.lines().enumerate() {
        let line_number = line_index + 1;
        let line = strip_inline_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }

        let Some((raw_key, raw_value)) = line.split_once('=') else {
            bail!("Invalid config syntax on line {line_number}: expected key = value");
        };

        let key = raw_key.trim();
        let value = raw_value.trim();
        let context = || format!("Invalid `{key}` value on line {line_number}");

        match key {
            "threads" => cfg.threads = Some(parse_integer_u8(value).with_context(context)?),
            "autosave_secs" => {
                cfg.autosave_secs = Some(parse_integer_u64(value).with_context(context)?);
            }
            "connect_timeout_secs" => {
                cfg.connect_timeout_secs = Some(parse_integer_u64(value).with_context(context)?);
            }
            "preserve_mode" => cfg.preserve_mode = Some(parse_boolean(value).with_context(context)?),
            "verbosity" => {
                let parsed = parse_string_literal(value).with_context(context)?;
                cfg.verbosity = Some(parse_verbosity(&parsed).with_context(|| {
                    format!("Invalid `verbosity` value '{parsed}' on line {line_number}")
                })?);
            }
            unknown => {
                bail!("Unknown configuration key: '{unknown}' on line {line_number}");
            }
        }
    }
    cfg.validate()?;
    Ok(cfg)
}

fn strip_inline_comment(line: &str) -> &str {
    let mut in_string = false;
    for (index, ch) in line.char_indices() {
        match ch {
            '"' => in_string = !in_string,
            '#' if !in_string => return &line[..index],
            _ => {}
        }
    }
    line
}

fn parse_string_literal(raw_value: &str) -> Result<String> {
    if raw_value.len() < 2 || !raw_value.starts_with('"') || !raw_value.ends_with('"') {
        bail!("Expected double-quoted string");
    }
    Ok(raw_value[1..raw_value.len() - 1].to_string())
}

fn parse_integer_u8(raw_value: &str) -> Result<u8> {
    let token = raw_value.trim();
    if token.is_empty() {
        bail!("Expected integer value");
    }
    let value = token.parse::<u16>()?;
    u8::try_from(value).map_err(|_| anyhow::anyhow!("Integer value out of range for u8"))
}

fn parse_integer_u64(raw_value: &str) -> Result<u64> {
    let token = raw_value.trim();
    if token.is_empty() {
        bail!("Expected integer value");
    }
    let value = token.parse::<i128>()?;
    if value < 0 {
        bail!("Expected non-negative integer");
    }
    u64::try_from(value).map_err(|_| anyhow::anyhow!("Integer value out of range for u64"))
}

fn parse_verbosity(value: &str) -> Result<VerbositySetting> {
    match value {
        "default" => Ok(VerbositySetting::Default),
        "verbose" => Ok(VerbositySetting::Verbose),
        "quiet" => Ok(VerbositySetting::Quiet),
        "debug" => Ok(VerbositySetting::Debug),
        _ => bail!("Expected one of: default, verbose, quiet, debug"),
    }
}

fn parse_boolean(raw_value: &str) -> Result<bool> {
    match raw_value.trim() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => bail!("Expected 'true' or 'false'"),
    }
}
