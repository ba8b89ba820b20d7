use anyhow::{bail, Result};
use ikev2_setup::firewall;
use ikev2_setup::report::render_checks;

use crate::cli::{CheckArgs, OutputFormat};
use crate::patch_cmd::firewall_inputs;

pub fn run_check(args: CheckArgs) -> Result<()> {
    let (files, route) = firewall_inputs(&args.files)?;
    let checks = firewall::check(&files, &route)?;

    match args.format {
        OutputFormat::Text => println!("{}", render_checks(&checks)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&checks)?),
    }

    let missing: usize = checks.iter().map(|c| c.missing()).sum();
    if args.strict && missing > 0 {
        bail!("check failed in strict mode: {missing} missing");
    }
    Ok(())
}
