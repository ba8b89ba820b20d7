use anyhow::{Context, Result};
use ikev2_setup::firewall::{self, FirewallFiles, RouteParams};
use ikev2_setup::report::{render_plans, render_results};
use ikev2_setup::validate;
use serde_json::json;
use ufw_patch_core::MissingAnchor;

use crate::cli::{FirewallArgs, OutputFormat, PatchArgs};

pub fn run_patch(args: PatchArgs) -> Result<()> {
    let (files, route) = firewall_inputs(&args.files)?;
    let policy = if args.append_missing_anchor {
        MissingAnchor::Append
    } else {
        MissingAnchor::Fail
    };

    if args.dry_run {
        let plans = firewall::plan(&files, &route, policy).context("patch failed")?;
        match args.format {
            OutputFormat::Text => println!("{}", render_plans(&plans)),
            OutputFormat::Json => {
                let payload: Vec<_> = plans
                    .iter()
                    .map(|p| {
                        json!({
                            "path": p.path,
                            "report": p.report,
                            "diff": p.diff(),
                        })
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&payload)?);
            }
        }
        return Ok(());
    }

    let results =
        firewall::apply(&files, &route, policy, !args.no_backup).context("patch failed")?;
    match args.format {
        OutputFormat::Text => println!("{}", render_results(&results)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&results)?),
    }
    Ok(())
}

pub fn firewall_inputs(args: &FirewallArgs) -> Result<(FirewallFiles, RouteParams)> {
    validate::interface(&args.interface)?;
    validate::subnet(&args.subnet)?;
    Ok((
        FirewallFiles {
            before_rules: args.before_rules.clone(),
            sysctl_conf: args.sysctl.clone(),
        },
        RouteParams {
            subnet: args.subnet,
            interface: args.interface.clone(),
        },
    ))
}
