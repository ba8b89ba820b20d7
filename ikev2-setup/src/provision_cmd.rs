use anyhow::{Context, Result};
use ikev2_setup::prompt::{fill_missing, StdinPrompter};
use ikev2_setup::provision::{provision, ProvisionOptions};
use ikev2_setup::report::render_summary;
use ikev2_setup::runner::SystemRunner;
use ikev2_setup::settings::{resolve_layers, CertKind, Settings, SettingsLayer, UserEntry};
use tracing::info;
use ufw_patch_core::MissingAnchor;

use crate::cli::{OutputFormat, ProvisionArgs};

pub fn run_provision(args: ProvisionArgs) -> Result<()> {
    let (layer, source) = resolve_layers(args.config.as_deref())?;
    info!(source = %source, "settings loaded");

    let mut layer = apply_flags(layer, &args);
    fill_missing(&mut layer, &mut StdinPrompter)?;
    let settings = Settings::from_layer(&layer).context("refusing to provision")?;

    let options = ProvisionOptions {
        backup: !args.no_backup,
        missing_anchor: if args.append_missing_anchor {
            MissingAnchor::Append
        } else {
            MissingAnchor::Fail
        },
    };
    let summary = provision(&settings, &SystemRunner, options)
        .with_context(|| format!("provisioning {} failed", settings.server.domain))?;

    match args.format {
        OutputFormat::Text => println!("{}", render_summary(&summary)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
    }
    Ok(())
}

/// Overlay command-line flags on the loaded settings.
fn apply_flags(layer: SettingsLayer, args: &ProvisionArgs) -> SettingsLayer {
    let users = match &args.user {
        Some(name) => {
            let password = layer
                .users
                .iter()
                .find(|u| &u.name == name)
                .and_then(|u| u.password.clone());
            vec![UserEntry {
                name: name.clone(),
                password,
            }]
        }
        None => Vec::new(),
    };
    let flags = SettingsLayer {
        domain: args.domain.clone(),
        email: args.email.clone(),
        cert: args.letsencrypt.then_some(CertKind::Letsencrypt),
        subnet: args.subnet,
        interface: args.interface.clone(),
        users,
        ..SettingsLayer::default()
    };
    layer.merge(flags)
}
