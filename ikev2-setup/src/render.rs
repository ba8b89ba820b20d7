//! Fixed templates for `ipsec.conf` and `ipsec.secrets`.

use std::net::IpAddr;

use ipnetwork::Ipv4Network;

use crate::settings::{CertMode, ServerSettings, VpnUser};

pub const SELF_SIGNED_CERT: &str = "server-cert.pem";
pub const SELF_SIGNED_KEY: &str = "server-key.pem";
pub const SELF_SIGNED_CA: &str = "ca-cert.pem";
pub const LETSENCRYPT_CERT: &str = "fullchain.pem";
pub const LETSENCRYPT_KEY: &str = "privkey.pem";
pub const LETSENCRYPT_CHAIN: &str = "chain.pem";

/// Inputs for the `conn ikev2-vpn` stanza.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpsecConf<'a> {
    pub domain: &'a str,
    pub cert_file: &'a str,
    pub subnet: &'a Ipv4Network,
    pub dns: &'a [IpAddr],
    pub ike: &'a str,
    pub esp: &'a str,
}

impl<'a> IpsecConf<'a> {
    pub fn from_settings(server: &'a ServerSettings) -> Self {
        Self {
            domain: &server.domain,
            cert_file: cert_file(&server.cert_mode),
            subnet: &server.subnet,
            dns: &server.dns,
            ike: &server.ike,
            esp: &server.esp,
        }
    }
}

/// Inputs for `ipsec.secrets`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpsecSecrets<'a> {
    pub key_file: &'a str,
    pub users: &'a [VpnUser],
}

pub fn cert_file(mode: &CertMode) -> &'static str {
    match mode {
        CertMode::SelfSigned => SELF_SIGNED_CERT,
        CertMode::LetsEncrypt { .. } => LETSENCRYPT_CERT,
    }
}

pub fn key_file(mode: &CertMode) -> &'static str {
    match mode {
        CertMode::SelfSigned => SELF_SIGNED_KEY,
        CertMode::LetsEncrypt { .. } => LETSENCRYPT_KEY,
    }
}

pub fn render_ipsec_conf(conf: &IpsecConf<'_>) -> String {
    let dns = conf
        .dns
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",");

    let mut conn: Vec<(&str, String)> = [
        ("auto", "add"),
        ("compress", "no"),
        ("type", "tunnel"),
        ("keyexchange", "ikev2"),
        ("fragmentation", "yes"),
        ("forceencaps", "yes"),
        ("dpdaction", "clear"),
        ("dpddelay", "300s"),
        ("rekey", "no"),
        ("left", "%any"),
    ]
    .into_iter()
    .map(|(key, value)| (key, value.to_string()))
    .collect();
    conn.extend([
        ("leftid", format!("@{}", conf.domain)),
        ("leftcert", conf.cert_file.to_string()),
        ("leftsendcert", "always".to_string()),
        ("leftsubnet", "0.0.0.0/0".to_string()),
        ("right", "%any".to_string()),
        ("rightid", "%any".to_string()),
        ("rightauth", "eap-mschapv2".to_string()),
        ("rightsourceip", conf.subnet.to_string()),
        ("rightdns", dns),
        ("rightsendcert", "never".to_string()),
        ("eap_identity", "%identity".to_string()),
        ("ike", conf.ike.to_string()),
        ("esp", conf.esp.to_string()),
    ]);

    let mut out = vec![
        "config setup".to_string(),
        "    charondebug=\"ike 1, knl 1, cfg 0\"".to_string(),
        "    uniqueids=no".to_string(),
        String::new(),
        "conn ikev2-vpn".to_string(),
    ];
    out.extend(conn.into_iter().map(|(key, value)| format!("    {key}={value}")));
    out.push(String::new());
    out.join("\n")
}

/// Server key reference followed by one EAP line per user.
pub fn render_ipsec_secrets(secrets: &IpsecSecrets<'_>) -> String {
    let mut out = vec![format!(": RSA \"{}\"", secrets.key_file)];
    out.extend(
        secrets
            .users
            .iter()
            .map(|user| format!("{} : EAP \"{}\"", user.name, user.password.expose())),
    );
    out.push(String::new());
    out.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secret::Secret;
    use pretty_assertions::assert_eq;

    #[test]
    fn conf_contains_substituted_fields() {
        let subnet: Ipv4Network = "10.10.10.0/24".parse().expect("cidr");
        let dns: Vec<IpAddr> = vec!["1.1.1.1".parse().expect("ip"), "9.9.9.9".parse().expect("ip")];
        let text = render_ipsec_conf(&IpsecConf {
            domain: "vpn.example.com",
            cert_file: LETSENCRYPT_CERT,
            subnet: &subnet,
            dns: &dns,
            ike: "aes256-sha256-modp2048!",
            esp: "aes256-sha256!",
        });

        let lines: Vec<&str> = text.lines().map(str::trim).collect();
        for expected in [
            "conn ikev2-vpn",
            "leftid=@vpn.example.com",
            "leftcert=fullchain.pem",
            "rightsourceip=10.10.10.0/24",
            "rightdns=1.1.1.1,9.9.9.9",
            "rightauth=eap-mschapv2",
            "ike=aes256-sha256-modp2048!",
            "esp=aes256-sha256!",
        ] {
            assert!(lines.contains(&expected), "missing {expected}");
        }
    }

    #[test]
    fn conf_layout_is_stable() {
        let subnet: Ipv4Network = "10.10.10.0/24".parse().expect("cidr");
        let dns: Vec<IpAddr> = vec!["8.8.8.8".parse().expect("ip")];
        let text = render_ipsec_conf(&IpsecConf {
            domain: "vpn.example.com",
            cert_file: SELF_SIGNED_CERT,
            subnet: &subnet,
            dns: &dns,
            ike: "aes256-sha256-modp2048!",
            esp: "aes256-sha256!",
        });

        assert!(text.starts_with("config setup\n    charondebug="));
        assert!(text.contains("    uniqueids=no\n\nconn ikev2-vpn\n    auto=add\n"));
        assert!(text.contains("    left=%any\n    leftid=@vpn.example.com\n"));
        assert!(text.ends_with("    ike=aes256-sha256-modp2048!\n    esp=aes256-sha256!\n"));
        let body: Vec<&str> = text.lines().skip_while(|l| *l != "conn ikev2-vpn").skip(1).collect();
        assert_eq!(body.len(), 23);
        assert!(body.iter().all(|l| l.starts_with("    ")));
    }

    #[test]
    fn secrets_list_every_user() {
        let users = vec![
            VpnUser {
                name: "alice".to_string(),
                password: Secret::new("one"),
            },
            VpnUser {
                name: "bob".to_string(),
                password: Secret::new("two"),
            },
        ];
        let text = render_ipsec_secrets(&IpsecSecrets {
            key_file: SELF_SIGNED_KEY,
            users: &users,
        });
        assert_eq!(
            text,
            ": RSA \"server-key.pem\"\nalice : EAP \"one\"\nbob : EAP \"two\"\n"
        );
    }
}
