//! The end-to-end provisioning run.

use std::path::PathBuf;

use serde::Serialize;
use tracing::{debug, info};
use ufw_patch_core::{write_atomic, write_secret_file, MissingAnchor, PersistOptions, PersistOutcome};

use crate::certs::{obtain_certificates, InstalledCerts};
use crate::error::ProvisionError;
use crate::firewall::{self, FileResult, FirewallFiles, RouteParams};
use crate::host;
use crate::interface::resolve_interface;
use crate::render::{key_file, render_ipsec_conf, render_ipsec_secrets, IpsecConf, IpsecSecrets};
use crate::runner::CommandRunner;
use crate::settings::{CertMode, Settings};

const SSH_RULE: &str = "OpenSSH";
const IKE_RULE: &str = "500,4500/udp";
const HTTP_RULE: &str = "80/tcp";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProvisionOptions {
    pub backup: bool,
    pub missing_anchor: MissingAnchor,
}

impl Default for ProvisionOptions {
    fn default() -> Self {
        Self {
            backup: true,
            missing_anchor: MissingAnchor::Fail,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WrittenFile {
    pub path: PathBuf,
    pub persisted: PersistOutcome,
}

/// What a successful run did. Holds user names but never passwords.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProvisionSummary {
    pub domain: String,
    pub cert_mode: &'static str,
    pub users: Vec<String>,
    pub interface: String,
    pub certs: InstalledCerts,
    pub config_files: Vec<WrittenFile>,
    pub firewall: Vec<FileResult>,
}

impl ProvisionSummary {
    /// Every backup made during the run.
    pub fn backups(&self) -> Vec<&PathBuf> {
        self.config_files
            .iter()
            .map(|f| &f.persisted)
            .chain(self.firewall.iter().map(|f| &f.persisted))
            .filter_map(|outcome| match outcome {
                PersistOutcome::Written { backup } => backup.as_ref(),
                PersistOutcome::Unchanged => None,
            })
            .collect()
    }
}

/// Run every step in order, stopping at the first failure.
///
/// `settings` is already validated. Before anything on the host changes,
/// the outbound interface is resolved and both UFW files are planned in
/// memory, so a missing interface or anchor aborts with the host untouched.
pub fn provision(
    settings: &Settings,
    runner: &dyn CommandRunner,
    options: ProvisionOptions,
) -> Result<ProvisionSummary, ProvisionError> {
    let server = &settings.server;
    info!(domain = %server.domain, cert = server.cert_mode.label(), "provisioning");

    let interface = resolve_interface(runner, server.interface.as_deref())?;
    let files = FirewallFiles {
        before_rules: server.paths.before_rules.clone(),
        sysctl_conf: server.paths.sysctl_conf.clone(),
    };
    let route = RouteParams {
        subnet: server.subnet,
        interface: interface.clone(),
    };
    let preflight = firewall::plan(&files, &route, options.missing_anchor)?;
    debug!(
        changed = preflight.iter().filter(|p| p.changed()).count(),
        "firewall preflight"
    );

    host::install_packages(runner, &server.packages)?;

    let mut allow = vec![SSH_RULE, IKE_RULE];
    if matches!(server.cert_mode, CertMode::LetsEncrypt { .. }) {
        allow.push(HTTP_RULE);
    }
    host::ufw_allow(runner, &allow)?;

    let certs = obtain_certificates(runner, server, options.backup)?;

    let conf = render_ipsec_conf(&IpsecConf::from_settings(server));
    let conf_outcome = write_atomic(
        &server.paths.ipsec_conf,
        conf.as_bytes(),
        PersistOptions {
            backup: options.backup,
            mode: Some(0o644),
        },
    )?;
    let secrets = render_ipsec_secrets(&IpsecSecrets {
        key_file: key_file(&server.cert_mode),
        users: &settings.users,
    });
    let secrets_outcome =
        write_secret_file(&server.paths.ipsec_secrets, secrets.as_bytes(), options.backup)?;

    host::restart_service(runner, &server.service)?;

    let patched = firewall::apply(&files, &route, options.missing_anchor, options.backup)?;

    host::ufw_reload(runner)?;

    info!(domain = %server.domain, "provisioning complete");
    Ok(ProvisionSummary {
        domain: server.domain.clone(),
        cert_mode: server.cert_mode.label(),
        users: settings.users.iter().map(|u| u.name.clone()).collect(),
        interface,
        certs,
        config_files: vec![
            WrittenFile {
                path: server.paths.ipsec_conf.clone(),
                persisted: conf_outcome,
            },
            WrittenFile {
                path: server.paths.ipsec_secrets.clone(),
                persisted: secrets_outcome,
            },
        ],
        firewall: patched,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::{CommandOutput, RecordingRunner};
    use crate::secret::Secret;
    use crate::settings::{embedded_defaults, PathsLayer, UserEntry};
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;

    const RULES: &str = "*filter\n:ufw-not-local - [0:0]\n# End required lines\nCOMMIT\n";

    fn settings_in(dir: &Path) -> Settings {
        let mut layer = embedded_defaults().expect("defaults");
        layer.domain = Some("vpn.example.com".to_string());
        layer.interface = Some("ens3".to_string());
        layer.users = vec![UserEntry {
            name: "alice".to_string(),
            password: Some(Secret::new("correct horse")),
        }];
        layer.paths = PathsLayer {
            ipsec_conf: Some(dir.join("ipsec.conf")),
            ipsec_secrets: Some(dir.join("ipsec.secrets")),
            ipsec_dir: Some(dir.join("ipsec.d")),
            before_rules: Some(dir.join("before.rules")),
            sysctl_conf: Some(dir.join("sysctl.conf")),
            letsencrypt_live: Some(dir.join("live")),
            pki_dir: Some(dir.join("pki")),
        };
        fs::write(dir.join("before.rules"), RULES).expect("rules");
        fs::write(dir.join("sysctl.conf"), "#net/ipv4/ip_forward=1\n").expect("sysctl");
        Settings::from_layer(&layer).expect("valid settings")
    }

    fn pki_runner() -> RecordingRunner {
        let runner = RecordingRunner::new();
        runner.respond(["pki"], CommandOutput::success("PEM\n"));
        runner
    }

    #[test]
    fn full_run_writes_everything_in_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        let settings = settings_in(dir.path());
        let runner = pki_runner();

        let summary = provision(&settings, &runner, ProvisionOptions::default()).expect("run");

        let calls = runner.call_lines();
        let pos = |needle: &str| {
            calls
                .iter()
                .position(|c| c.contains(needle))
                .unwrap_or_else(|| panic!("no call containing {needle}: {calls:?}"))
        };
        assert!(pos("apt-get update") < pos("ufw allow OpenSSH"));
        assert!(pos("ufw allow 500,4500/udp") < pos("pki --gen"));
        assert!(pos("pki --issue") < pos("systemctl restart"));
        assert!(pos("systemctl restart") < pos("ufw disable"));
        assert!(!calls.iter().any(|c| c.contains("80/tcp")));

        let rules = fs::read_to_string(dir.path().join("before.rules")).expect("rules");
        assert!(rules.starts_with("*nat\n"));
        assert!(rules.contains("-o ens3 -j MASQUERADE"));

        let mode = fs::metadata(dir.path().join("ipsec.secrets"))
            .expect("secrets")
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);

        assert_eq!(summary.users, vec!["alice"]);
        assert_eq!(summary.interface, "ens3");
        assert_eq!(summary.backups().len(), 2);
    }

    #[test]
    fn summary_never_contains_the_password() {
        let dir = tempfile::tempdir().expect("tempdir");
        let settings = settings_in(dir.path());
        let summary =
            provision(&settings, &pki_runner(), ProvisionOptions::default()).expect("run");

        let json = serde_json::to_string(&summary).expect("json");
        assert!(!json.contains("correct horse"));
        assert!(!format!("{summary:?}").contains("correct horse"));
    }

    #[test]
    fn failing_install_stops_before_any_file_is_written() {
        let dir = tempfile::tempdir().expect("tempdir");
        let settings = settings_in(dir.path());
        let runner = pki_runner();
        runner.respond(["apt-get", "install"], CommandOutput::failure(100, "E: no space"));

        let err = provision(&settings, &runner, ProvisionOptions::default()).unwrap_err();
        assert!(matches!(err, ProvisionError::Command(_)));
        assert!(!dir.path().join("ipsec.conf").exists());
        assert_eq!(
            fs::read_to_string(dir.path().join("before.rules")).expect("rules"),
            RULES
        );
        assert!(!runner.call_lines().iter().any(|c| c.starts_with("systemctl")));
    }

    #[test]
    fn missing_anchor_aborts_before_any_command_runs() {
        let dir = tempfile::tempdir().expect("tempdir");
        let settings = settings_in(dir.path());
        let rules = "# no tables here\n";
        fs::write(dir.path().join("before.rules"), rules).expect("rules");
        let runner = pki_runner();

        let err = provision(&settings, &runner, ProvisionOptions::default()).unwrap_err();
        assert!(matches!(err, ProvisionError::Patch { .. }), "{err}");
        assert!(runner.call_lines().is_empty(), "{:?}", runner.call_lines());
        assert!(!dir.path().join("ipsec.conf").exists());
        assert!(!dir.path().join("ipsec.secrets").exists());
        assert_eq!(
            fs::read_to_string(dir.path().join("before.rules")).expect("rules"),
            rules
        );
    }

    #[test]
    fn rerun_leaves_firewall_files_unchanged() {
        let dir = tempfile::tempdir().expect("tempdir");
        let settings = settings_in(dir.path());
        let options = ProvisionOptions {
            backup: false,
            ..ProvisionOptions::default()
        };

        provision(&settings, &pki_runner(), options).expect("first");
        let first = fs::read(dir.path().join("before.rules")).expect("rules");
        let summary = provision(&settings, &pki_runner(), options).expect("second");

        assert_eq!(fs::read(dir.path().join("before.rules")).expect("rules"), first);
        assert!(summary
            .firewall
            .iter()
            .all(|f| f.persisted == PersistOutcome::Unchanged));
    }
}
