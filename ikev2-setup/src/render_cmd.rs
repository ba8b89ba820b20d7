use anyhow::{Context, Result};
use ikev2_setup::render::{render_ipsec_conf, IpsecConf};
use ikev2_setup::settings::{resolve_layers, CertKind, ServerSettings, SettingsLayer};
use tracing::info;

use crate::cli::RenderArgs;

pub fn run_render(args: RenderArgs) -> Result<()> {
    let (layer, source) = resolve_layers(args.config.as_deref())?;
    info!(source = %source, "settings loaded");

    let layer = layer.merge(SettingsLayer {
        domain: args.domain,
        email: args.email,
        cert: args.letsencrypt.then_some(CertKind::Letsencrypt),
        subnet: args.subnet,
        ..SettingsLayer::default()
    });
    let server = ServerSettings::from_layer(&layer).context("cannot render ipsec.conf")?;
    print!("{}", render_ipsec_conf(&IpsecConf::from_settings(&server)));
    Ok(())
}
