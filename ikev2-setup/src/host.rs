//! Package manager, firewall and service manager invocations.

use crate::runner::{run_checked, CommandError, CommandRunner, CommandSpec};

pub fn install_packages(
    runner: &dyn CommandRunner,
    packages: &[String],
) -> Result<(), CommandError> {
    run_checked(runner, &apt().arg("update"))?;
    if packages.is_empty() {
        return Ok(());
    }
    run_checked(
        runner,
        &apt().args(["install", "-y"]).args(packages.iter().cloned()),
    )?;
    Ok(())
}

fn apt() -> CommandSpec {
    CommandSpec::new("apt-get").env("DEBIAN_FRONTEND", "noninteractive")
}

/// `ufw allow <rule>` for each rule, e.g. `OpenSSH` or `500,4500/udp`.
pub fn ufw_allow(runner: &dyn CommandRunner, rules: &[&str]) -> Result<(), CommandError> {
    for rule in rules {
        run_checked(runner, &CommandSpec::new("ufw").args(["allow", *rule]))?;
    }
    Ok(())
}

/// Disable then force-enable UFW so edited rule files are reloaded.
pub fn ufw_reload(runner: &dyn CommandRunner) -> Result<(), CommandError> {
    run_checked(runner, &CommandSpec::new("ufw").arg("disable"))?;
    run_checked(runner, &CommandSpec::new("ufw").args(["--force", "enable"]))?;
    Ok(())
}

pub fn restart_service(runner: &dyn CommandRunner, service: &str) -> Result<(), CommandError> {
    run_checked(runner, &CommandSpec::new("systemctl").args(["enable", service]))?;
    run_checked(runner, &CommandSpec::new("systemctl").args(["restart", service]))?;
    Ok(())
}
