//! Typed provisioning settings.
//!
//! Settings are assembled from layers: the embedded `defaults/settings.toml`,
//! an optional operator file, then CLI flags and interactive answers. Every
//! field is optional while layering; [`Settings::from_layer`] checks that the
//! merged result is complete and valid before anything is run.

use std::fs;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

use ipnetwork::Ipv4Network;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::ProvisionError;
use crate::secret::Secret;
use crate::validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CertKind {
    SelfSigned,
    Letsencrypt,
}

/// How the server certificate is obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CertMode {
    SelfSigned,
    LetsEncrypt { email: String },
}

impl CertMode {
    pub fn label(&self) -> &'static str {
        match self {
            Self::SelfSigned => "self-signed",
            Self::LetsEncrypt { .. } => "letsencrypt",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserEntry {
    pub name: String,
    #[serde(default)]
    pub password: Option<Secret>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VpnUser {
    pub name: String,
    pub password: Secret,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PathsLayer {
    pub ipsec_conf: Option<PathBuf>,
    pub ipsec_secrets: Option<PathBuf>,
    pub ipsec_dir: Option<PathBuf>,
    pub before_rules: Option<PathBuf>,
    pub sysctl_conf: Option<PathBuf>,
    pub letsencrypt_live: Option<PathBuf>,
    pub pki_dir: Option<PathBuf>,
}

/// Files and directories the provisioner reads and writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostPaths {
    pub ipsec_conf: PathBuf,
    pub ipsec_secrets: PathBuf,
    pub ipsec_dir: PathBuf,
    pub before_rules: PathBuf,
    pub sysctl_conf: PathBuf,
    pub letsencrypt_live: PathBuf,
    pub pki_dir: PathBuf,
}

/// One layer of settings; unset fields fall through to the layer below.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SettingsLayer {
    pub domain: Option<String>,
    pub email: Option<String>,
    pub cert: Option<CertKind>,
    pub subnet: Option<Ipv4Network>,
    pub dns: Option<Vec<IpAddr>>,
    pub interface: Option<String>,
    pub service: Option<String>,
    pub ike: Option<String>,
    pub esp: Option<String>,
    pub packages: Option<Vec<String>>,
    pub letsencrypt_packages: Option<Vec<String>>,
    #[serde(default)]
    pub users: Vec<UserEntry>,
    #[serde(default)]
    pub paths: PathsLayer,
}

/// Errors returned when loading settings files.
#[derive(Debug, Error)]
pub enum SettingsLoadError {
    #[error("failed to read settings file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse settings file {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
}

macro_rules! overlay {
    ($base:expr, $over:expr, $($field:ident),+ $(,)?) => {
        $( if $over.$field.is_some() { $base.$field = $over.$field; } )+
    };
}

impl SettingsLayer {
    /// Return `self` with every field set in `over` replaced.
    pub fn merge(mut self, over: SettingsLayer) -> SettingsLayer {
        overlay!(
            self, over, domain, email, cert, subnet, dns, interface, service, ike, esp, packages,
            letsencrypt_packages
        );
        overlay!(
            self.paths,
            over.paths,
            ipsec_conf,
            ipsec_secrets,
            ipsec_dir,
            before_rules,
            sysctl_conf,
            letsencrypt_live,
            pki_dir
        );
        if !over.users.is_empty() {
            self.users = over.users;
        }
        self
    }
}

/// Load a settings layer from a TOML file.
pub fn load_settings(path: &Path) -> Result<SettingsLayer, SettingsLoadError> {
    let raw = fs::read_to_string(path).map_err(|source| SettingsLoadError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_settings(&raw, path.display().to_string())
}

/// Built-in defaults shipped with the binary.
pub fn embedded_defaults() -> Result<SettingsLayer, SettingsLoadError> {
    let embedded = include_str!(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/defaults/settings.toml"
    ));
    parse_settings(embedded, "embedded defaults".to_string())
}

/// Embedded defaults, overlaid with `path` when given. Also returns a label
/// describing where the settings came from.
pub fn resolve_layers(path: Option<&Path>) -> Result<(SettingsLayer, String), SettingsLoadError> {
    let defaults = embedded_defaults()?;
    match path {
        Some(path) => {
            let file = load_settings(path)?;
            Ok((defaults.merge(file), format!("file:{}", path.display())))
        }
        None => Ok((defaults, "embedded".to_string())),
    }
}

fn parse_settings(raw: &str, path: String) -> Result<SettingsLayer, SettingsLoadError> {
    toml::from_str(raw).map_err(|source| SettingsLoadError::Parse { path, source })
}

/// Everything about the server that does not involve credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    pub domain: String,
    pub cert_mode: CertMode,
    pub subnet: Ipv4Network,
    pub dns: Vec<IpAddr>,
    pub interface: Option<String>,
    pub service: String,
    pub ike: String,
    pub esp: String,
    pub packages: Vec<String>,
    pub paths: HostPaths,
}

/// Complete, validated settings for one provisioning run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub server: ServerSettings,
    pub users: Vec<VpnUser>,
}

impl ServerSettings {
    pub fn from_layer(layer: &SettingsLayer) -> Result<Self, ProvisionError> {
        let domain = layer.domain.clone().unwrap_or_default();
        validate::domain(&domain)?;

        let cert_mode = match layer.cert.unwrap_or(CertKind::SelfSigned) {
            CertKind::SelfSigned => CertMode::SelfSigned,
            CertKind::Letsencrypt => {
                validate::email(layer.email.as_deref())?;
                CertMode::LetsEncrypt {
                    email: layer.email.clone().unwrap_or_default().trim().to_string(),
                }
            }
        };

        let subnet = required(layer.subnet, "subnet")?;
        validate::subnet(&subnet)?;

        let dns = layer.dns.clone().unwrap_or_default();
        if dns.is_empty() {
            return Err(ProvisionError::invalid("at least one DNS server is required"));
        }

        if let Some(iface) = &layer.interface {
            validate::interface(iface)?;
        }

        let service = required(layer.service.clone(), "service")?;
        let ike = required(layer.ike.clone(), "ike")?;
        validate::cipher_suite("ike", &ike)?;
        let esp = required(layer.esp.clone(), "esp")?;
        validate::cipher_suite("esp", &esp)?;

        let mut packages = layer.packages.clone().unwrap_or_default();
        if matches!(cert_mode, CertMode::LetsEncrypt { .. }) {
            packages.extend(layer.letsencrypt_packages.clone().unwrap_or_default());
        }

        Ok(Self {
            domain,
            cert_mode,
            subnet,
            dns,
            interface: layer.interface.clone(),
            service,
            ike,
            esp,
            packages,
            paths: host_paths(&layer.paths)?,
        })
    }
}

impl Settings {
    pub fn from_layer(layer: &SettingsLayer) -> Result<Self, ProvisionError> {
        let server = ServerSettings::from_layer(layer)?;

        if layer.users.is_empty() {
            return Err(ProvisionError::invalid("at least one VPN user is required"));
        }
        let mut users = Vec::with_capacity(layer.users.len());
        for entry in &layer.users {
            validate::username(&entry.name)?;
            validate::password(&entry.name, entry.password.as_ref())?;
            if users.iter().any(|u: &VpnUser| u.name == entry.name) {
                return Err(ProvisionError::invalid(format!(
                    "user '{}' is listed more than once",
                    entry.name
                )));
            }
            if let Some(password) = &entry.password {
                users.push(VpnUser {
                    name: entry.name.clone(),
                    password: password.clone(),
                });
            }
        }

        Ok(Self { server, users })
    }
}

fn required<T>(value: Option<T>, name: &str) -> Result<T, ProvisionError> {
    value.ok_or_else(|| ProvisionError::invalid(format!("setting '{name}' is required")))
}

fn host_paths(layer: &PathsLayer) -> Result<HostPaths, ProvisionError> {
    Ok(HostPaths {
        ipsec_conf: required(layer.ipsec_conf.clone(), "paths.ipsec_conf")?,
        ipsec_secrets: required(layer.ipsec_secrets.clone(), "paths.ipsec_secrets")?,
        ipsec_dir: required(layer.ipsec_dir.clone(), "paths.ipsec_dir")?,
        before_rules: required(layer.before_rules.clone(), "paths.before_rules")?,
        sysctl_conf: required(layer.sysctl_conf.clone(), "paths.sysctl_conf")?,
        letsencrypt_live: required(layer.letsencrypt_live.clone(), "paths.letsencrypt_live")?,
        pki_dir: required(layer.pki_dir.clone(), "paths.pki_dir")?,
    })
}
