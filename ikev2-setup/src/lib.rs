//! strongSwan IKEv2 server provisioning for Debian and Ubuntu hosts.
//!
//! The heavy lifting on firewall files is done by `ufw-patch-core`; this
//! crate supplies the VPN-specific parts around it:
//!
//! - [`settings`]: layered TOML settings and their validation
//! - [`prompt`]: interactive fill-in of domain, user and password
//! - [`runner`]: checked execution of external programs
//! - [`host`]: apt, ufw and systemctl steps
//! - [`certs`]: self-signed (`pki`) or Let's Encrypt (`certbot`) certificates
//! - [`render`]: `ipsec.conf` and `ipsec.secrets` templates
//! - [`rules`]: the NAT, mangle and forward blocks plus sysctl toggles
//! - [`firewall`]: planning, checking and writing the UFW file patches
//! - [`interface`]: default-route interface detection
//! - [`provision`]: the ordered end-to-end run
//! - [`report`]: terminal rendering of outcomes
//!
//! # Example
//!
//! ```ignore
//! use ikev2_setup::firewall::{check, FirewallFiles, RouteParams};
//!
//! let files = FirewallFiles {
//!     before_rules: "/etc/ufw/before.rules".into(),
//!     sysctl_conf: "/etc/ufw/sysctl.conf".into(),
//! };
//! let route = RouteParams {
//!     subnet: "10.10.10.0/24".parse()?,
//!     interface: "ens3".to_string(),
//! };
//! for file in check(&files, &route)? {
//!     println!("{}: {} missing", file.path.display(), file.missing());
//! }
//! ```

pub mod certs;
pub mod error;
pub mod firewall;
pub mod host;
pub mod interface;
pub mod prompt;
pub mod provision;
pub mod render;
pub mod report;
pub mod rules;
pub mod runner;
pub mod secret;
pub mod settings;
pub mod validate;
