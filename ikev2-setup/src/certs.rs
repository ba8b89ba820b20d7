//! Server certificate acquisition.
//!
//! Self-signed mode drives strongSwan's `pki` tool; each invocation prints PEM
//! on stdout, which is captured and written here. Let's Encrypt mode runs
//! `certbot` in standalone mode and copies the issued files. Either way the
//! results land in `<ipsec_dir>/{cacerts,certs,private}` where charon looks
//! for them.

use std::fs::{self, DirBuilder};
use std::os::unix::fs::DirBuilderExt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;
use ufw_patch_core::{write_atomic, write_secret_file, PersistOptions};

use crate::error::ProvisionError;
use crate::render::{
    LETSENCRYPT_CERT, LETSENCRYPT_CHAIN, LETSENCRYPT_KEY, SELF_SIGNED_CA, SELF_SIGNED_CERT,
    SELF_SIGNED_KEY,
};
use crate::runner::{run_checked, CommandRunner, CommandSpec};
use crate::settings::{CertMode, ServerSettings};

const CA_KEY: &str = "ca-key.pem";
const CA_DN: &str = "CN=VPN root CA";
const KEY_SIZE: &str = "4096";
const CA_LIFETIME_DAYS: &str = "3650";
const SERVER_LIFETIME_DAYS: &str = "1825";

/// Where the installed certificate material ended up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstalledCerts {
    /// CA certificate clients must trust (self-signed mode only).
    pub ca_cert: Option<PathBuf>,
    pub chain: Option<PathBuf>,
    pub server_cert: PathBuf,
    pub server_key: PathBuf,
}

pub fn obtain_certificates(
    runner: &dyn CommandRunner,
    server: &ServerSettings,
    backup: bool,
) -> Result<InstalledCerts, ProvisionError> {
    match &server.cert_mode {
        CertMode::SelfSigned => self_signed(runner, server, backup),
        CertMode::LetsEncrypt { email } => letsencrypt(runner, server, email, backup),
    }
}

struct IpsecDirs {
    cacerts: PathBuf,
    certs: PathBuf,
    private: PathBuf,
}

fn ipsec_dirs(base: &Path) -> Result<IpsecDirs, ProvisionError> {
    let dirs = IpsecDirs {
        cacerts: base.join("cacerts"),
        certs: base.join("certs"),
        private: base.join("private"),
    };
    make_dir(&dirs.cacerts, 0o755)?;
    make_dir(&dirs.certs, 0o755)?;
    make_dir(&dirs.private, 0o700)?;
    Ok(dirs)
}

fn make_dir(path: &Path, mode: u32) -> Result<(), ProvisionError> {
    DirBuilder::new()
        .recursive(true)
        .mode(mode)
        .create(path)
        .map_err(|e| ProvisionError::io(path, e))
}

fn self_signed(
    runner: &dyn CommandRunner,
    server: &ServerSettings,
    backup: bool,
) -> Result<InstalledCerts, ProvisionError> {
    let work = ipsec_dirs(&server.paths.pki_dir)?;
    let ca_key = work.private.join(CA_KEY);
    let ca_cert = work.cacerts.join(SELF_SIGNED_CA);
    let server_key = work.private.join(SELF_SIGNED_KEY);
    let server_cert = work.certs.join(SELF_SIGNED_CERT);

    if [&ca_key, &ca_cert].iter().all(|p| p.exists()) {
        info!(ca = %ca_cert.display(), "reusing existing CA");
    } else {
        let key = pki(runner, &gen_key(), &ca_key)?;
        write_secret_file(&ca_key, &key, false)?;
        let cert = pki(
            runner,
            &CommandSpec::new("pki")
                .args(["--self", "--ca", "--lifetime", CA_LIFETIME_DAYS, "--in"])
                .arg(ca_key.display().to_string())
                .args(["--type", "rsa", "--dn", CA_DN, "--outform", "pem"]),
            &ca_cert,
        )?;
        write_atomic(&ca_cert, &cert, public_file(false))?;
    }

    let key = pki(runner, &gen_key(), &server_key)?;
    write_secret_file(&server_key, &key, false)?;

    let public = pki(
        runner,
        &CommandSpec::new("pki")
            .args(["--pub", "--in"])
            .arg(server_key.display().to_string())
            .args(["--type", "rsa"]),
        &server_cert,
    )?;
    let cert = pki(
        runner,
        &CommandSpec::new("pki")
            .args(["--issue", "--lifetime", SERVER_LIFETIME_DAYS, "--cacert"])
            .arg(ca_cert.display().to_string())
            .arg("--cakey")
            .arg(ca_key.display().to_string())
            .arg("--dn")
            .arg(format!("CN={}", server.domain))
            .arg("--san")
            .arg(server.domain.clone())
            .args([
                "--flag",
                "serverAuth",
                "--flag",
                "ikeIntermediate",
                "--outform",
                "pem",
            ])
            .stdin(public),
        &server_cert,
    )?;
    write_atomic(&server_cert, &cert, public_file(false))?;

    let dest = ipsec_dirs(&server.paths.ipsec_dir)?;
    let installed = InstalledCerts {
        ca_cert: Some(install(&ca_cert, &dest.cacerts.join(SELF_SIGNED_CA), false, backup)?),
        chain: None,
        server_cert: install(&server_cert, &dest.certs.join(SELF_SIGNED_CERT), false, backup)?,
        server_key: install(&server_key, &dest.private.join(SELF_SIGNED_KEY), true, backup)?,
    };
    info!(cert = %installed.server_cert.display(), "self-signed certificate installed");
    Ok(installed)
}

fn gen_key() -> CommandSpec {
    CommandSpec::new("pki").args([
        "--gen", "--type", "rsa", "--size", KEY_SIZE, "--outform", "pem",
    ])
}

/// Run a `pki` step and return its stdout, which must not be empty.
fn pki(
    runner: &dyn CommandRunner,
    spec: &CommandSpec,
    produces: &Path,
) -> Result<Vec<u8>, ProvisionError> {
    let output = run_checked(runner, spec)?;
    if output.stdout.iter().all(u8::is_ascii_whitespace) {
        return Err(ProvisionError::PostconditionMissing {
            step: spec.to_string(),
            path: produces.to_path_buf(),
        });
    }
    Ok(output.stdout)
}

fn letsencrypt(
    runner: &dyn CommandRunner,
    server: &ServerSettings,
    email: &str,
    backup: bool,
) -> Result<InstalledCerts, ProvisionError> {
    let spec = CommandSpec::new("certbot").args([
        "certonly",
        "--standalone",
        "--non-interactive",
        "--agree-tos",
        "-m",
        email,
        "-d",
        server.domain.as_str(),
    ]);
    run_checked(runner, &spec)?;

    let live = server.paths.letsencrypt_live.join(&server.domain);
    let issued = |name: &str| -> Result<PathBuf, ProvisionError> {
        let path = live.join(name);
        if path.is_file() {
            Ok(path)
        } else {
            Err(ProvisionError::PostconditionMissing {
                step: "certbot certonly".to_string(),
                path,
            })
        }
    };
    let cert = issued(LETSENCRYPT_CERT)?;
    let key = issued(LETSENCRYPT_KEY)?;
    let chain = issued(LETSENCRYPT_CHAIN)?;

    let dest = ipsec_dirs(&server.paths.ipsec_dir)?;
    let installed = InstalledCerts {
        ca_cert: None,
        chain: Some(install(&chain, &dest.cacerts.join(LETSENCRYPT_CHAIN), false, backup)?),
        server_cert: install(&cert, &dest.certs.join(LETSENCRYPT_CERT), false, backup)?,
        server_key: install(&key, &dest.private.join(LETSENCRYPT_KEY), true, backup)?,
    };
    info!(cert = %installed.server_cert.display(), "Let's Encrypt certificate installed");
    Ok(installed)
}

fn public_file(backup: bool) -> PersistOptions {
    PersistOptions {
        backup,
        mode: Some(0o644),
    }
}

fn install(from: &Path, to: &Path, secret: bool, backup: bool) -> Result<PathBuf, ProvisionError> {
    let bytes = fs::read(from).map_err(|e| ProvisionError::io(from, e))?;
    if secret {
        write_secret_file(to, &bytes, backup)?;
    } else {
        write_atomic(to, &bytes, public_file(backup))?;
    }
    Ok(to.to_path_buf())
}
