use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, ValueEnum};
use ipnetwork::Ipv4Network;

#[derive(Parser, Debug)]
#[command(name = "ikev2-setup")]
#[command(about = "Provision a strongSwan IKEv2 VPN server behind UFW")]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(clap::Subcommand, Debug)]
pub enum Command {
    /// Install, configure and start the VPN server on this host.
    Provision(ProvisionArgs),
    /// Add the VPN NAT/forward rules and sysctl toggles to UFW files.
    Patch(PatchArgs),
    /// Report which rules and toggles are already present.
    Check(CheckArgs),
    /// Print the ipsec.conf that provisioning would write.
    Render(RenderArgs),
}

#[derive(Clone, Copy, Debug, ValueEnum, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Args, Debug)]
pub struct ProvisionArgs {
    /// Settings file overriding the built-in defaults.
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Public DNS name or IP address of the server.
    #[arg(long)]
    pub domain: Option<String>,
    /// VPN user to create; the password is prompted for.
    #[arg(long)]
    pub user: Option<String>,
    /// Contact email for Let's Encrypt.
    #[arg(long)]
    pub email: Option<String>,
    /// Use certbot instead of a self-signed CA.
    #[arg(long)]
    pub letsencrypt: bool,
    /// Outbound interface; detected from the default route when omitted.
    #[arg(long)]
    pub interface: Option<String>,
    /// Address pool handed to clients.
    #[arg(long)]
    pub subnet: Option<Ipv4Network>,
    /// Do not keep .bak copies of replaced files.
    #[arg(long)]
    pub no_backup: bool,
    /// Append a block at the end of the file when its anchor is missing.
    #[arg(long)]
    pub append_missing_anchor: bool,
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

/// Paths and routing parameters shared by `patch` and `check`.
#[derive(Args, Debug)]
pub struct FirewallArgs {
    #[arg(long, default_value = "/etc/ufw/before.rules")]
    pub before_rules: PathBuf,
    #[arg(long, default_value = "/etc/ufw/sysctl.conf")]
    pub sysctl: PathBuf,
    /// Outbound interface used in the NAT and mangle rules.
    #[arg(long)]
    pub interface: String,
    #[arg(long, default_value = "10.10.10.0/24")]
    pub subnet: Ipv4Network,
}

#[derive(Args, Debug)]
pub struct PatchArgs {
    #[command(flatten)]
    pub files: FirewallArgs,
    #[arg(long)]
    pub append_missing_anchor: bool,
    /// Print a unified diff and write nothing.
    #[arg(long)]
    pub dry_run: bool,
    #[arg(long)]
    pub no_backup: bool,
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Args, Debug)]
pub struct CheckArgs {
    #[command(flatten)]
    pub files: FirewallArgs,
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
    /// Fail when any rule or toggle is missing.
    #[arg(long)]
    pub strict: bool,
}

#[derive(Args, Debug)]
pub struct RenderArgs {
    #[arg(long)]
    pub config: Option<PathBuf>,
    #[arg(long)]
    pub domain: Option<String>,
    #[arg(long)]
    pub letsencrypt: bool,
    #[arg(long)]
    pub email: Option<String>,
    #[arg(long)]
    pub subnet: Option<Ipv4Network>,
}
