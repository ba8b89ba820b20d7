//! Input checks run before anything on the host is touched.

use ipnetwork::Ipv4Network;

use crate::error::ProvisionError;
use crate::secret::Secret;

pub fn domain(value: &str) -> Result<(), ProvisionError> {
    if value.trim().is_empty() {
        return Err(ProvisionError::invalid("domain must not be empty"));
    }
    let ok = value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | ':'));
    if !ok || value.starts_with(['.', '-']) {
        return Err(ProvisionError::invalid(format!(
            "domain '{value}' is not a valid host name or IP address"
        )));
    }
    Ok(())
}

pub fn username(value: &str) -> Result<(), ProvisionError> {
    if value.trim().is_empty() {
        return Err(ProvisionError::invalid("username must not be empty"));
    }
    if value
        .chars()
        .any(|c| c.is_whitespace() || c.is_control() || matches!(c, '"' | ':' | '#'))
    {
        return Err(ProvisionError::invalid(format!(
            "username '{value}' must not contain whitespace, quotes, ':' or '#'"
        )));
    }
    Ok(())
}

pub fn password(user: &str, value: Option<&Secret>) -> Result<(), ProvisionError> {
    let Some(value) = value.filter(|v| !v.is_blank()) else {
        return Err(ProvisionError::invalid(format!(
            "password for user '{user}' must not be empty"
        )));
    };
    if value
        .expose()
        .chars()
        .any(|c| c == '"' || c == '\n' || c == '\r')
    {
        return Err(ProvisionError::invalid(format!(
            "password for user '{user}' must not contain double quotes or line breaks"
        )));
    }
    Ok(())
}

pub fn email(value: Option<&str>) -> Result<(), ProvisionError> {
    match value.map(str::trim) {
        None | Some("") => Err(ProvisionError::invalid(
            "an email address is required for Let's Encrypt",
        )),
        Some(v) if !v.contains('@') || v.contains(char::is_whitespace) => Err(
            ProvisionError::invalid(format!("email '{v}' is not a valid address")),
        ),
        Some(_) => Ok(()),
    }
}

pub fn interface(value: &str) -> Result<(), ProvisionError> {
    let mut chars = value.chars();
    let first_ok = chars.next().is_some_and(|c| c.is_ascii_alphabetic());
    let rest_ok = chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | '@'));
    if !first_ok || !rest_ok || value.len() > 15 {
        return Err(ProvisionError::invalid(format!(
            "interface '{value}' is not a valid network interface name"
        )));
    }
    Ok(())
}

pub fn subnet(value: &Ipv4Network) -> Result<(), ProvisionError> {
    if value.ip() != value.network() {
        return Err(ProvisionError::invalid(format!(
            "subnet {value} has host bits set; did you mean {}/{}?",
            value.network(),
            value.prefix()
        )));
    }
    Ok(())
}

pub fn cipher_suite(kind: &str, value: &str) -> Result<(), ProvisionError> {
    if value.trim().is_empty() || value.contains(char::is_whitespace) {
        return Err(ProvisionError::invalid(format!(
            "{kind} cipher suite must be a non-empty comma separated list"
        )));
    }
    Ok(())
}
