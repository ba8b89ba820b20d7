use tracing::info;

use crate::error::ProvisionError;
use crate::runner::{run_checked, CommandRunner, CommandSpec};
use crate::validate;

/// Interface that carries the default route.
///
/// An explicitly configured name is used as-is. Otherwise the `dev` field of
/// `ip route show default` is taken; failing to find one is fatal rather than
/// guessing `eth0`.
pub fn resolve_interface(
    runner: &dyn CommandRunner,
    configured: Option<&str>,
) -> Result<String, ProvisionError> {
    if let Some(name) = configured {
        validate::interface(name)?;
        return Ok(name.to_string());
    }

    let output = run_checked(
        runner,
        &CommandSpec::new("ip").args(["route", "show", "default"]),
    )?;
    let text = output.stdout_text();
    let iface = parse_default_dev(&text).ok_or_else(|| {
        ProvisionError::InterfaceUndetected(format!(
            "no 'dev' in `ip route show default` output: {:?}",
            text.trim()
        ))
    })?;
    validate::interface(&iface)
        .map_err(|_| ProvisionError::InterfaceUndetected(format!("unexpected name '{iface}'")))?;
    info!(interface = %iface, "detected default interface");
    Ok(iface)
}

/// The word after `dev` on the first default route line.
fn parse_default_dev(output: &str) -> Option<String> {
    output
        .lines()
        .filter(|line| line.trim_start().starts_with("default"))
        .find_map(|line| {
            let mut words = line.split_whitespace();
            words.find(|w| *w == "dev")?;
            words.next().map(ToOwned::to_owned)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::{CommandOutput, RecordingRunner};

    #[test]
    fn parses_dev_from_default_route() {
        let output = "default via 192.168.101.1 dev wlp2s0 proto dhcp src 192.168.101.202 metric 600 \n";
        assert_eq!(parse_default_dev(output), Some("wlp2s0".to_string()));
    }

    #[test]
    fn configured_interface_skips_detection() {
        let runner = RecordingRunner::new();
        let iface = resolve_interface(&runner, Some("ens3")).expect("configured");
        assert_eq!(iface, "ens3");
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn detection_failure_is_fatal() {
        let runner = RecordingRunner::new();
        runner.respond(["ip", "route"], CommandOutput::success(""));
        let err = resolve_interface(&runner, None).unwrap_err();
        assert!(matches!(err, ProvisionError::InterfaceUndetected(_)));
    }

    #[test]
    fn detects_from_ip_route() {
        let runner = RecordingRunner::new();
        runner.respond(
            ["ip", "route", "show", "default"],
            CommandOutput::success("default via 203.0.113.1 dev ens3 proto static\n"),
        );
        assert_eq!(resolve_interface(&runner, None).expect("detect"), "ens3");
    }
}
