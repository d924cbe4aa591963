//! Input validators for hosts, credentials, names and shell commands.
//!
//! All functions are synchronous and take data in, returning the normalized
//! value or a `ValidationError`. Zero imports from `tokio`, `std::fs`,
//! `crate::infra`, `crate::commands`, or `crate::application`.

use std::net::IpAddr;
use std::sync::LazyLock;

use regex::Regex;

use crate::domain::error::ValidationError;

pub static HOSTNAME_LABEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"^[a-zA-Z0-9]([a-zA-Z0-9-]*[a-zA-Z0-9])?$").expect("valid regex")
});

pub static USERNAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"^[a-zA-Z0-9._@-]+$").expect("valid regex")
});

pub static VM_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9-]*$").expect("valid regex")
});

pub static IDRAC_USER_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"^[a-zA-Z0-9_-]+$").expect("valid regex")
});

/// Patterns rejected even when shell operators are allowed.
static DANGEROUS_COMMAND_RE: LazyLock<[(Regex, &'static str); 4]> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    let re = |p: &str| Regex::new(p).expect("valid regex");
    [
        (re(r"\$\("), "$("),
        (re(r"`"), "`"),
        (re(r";\s*rm"), "; rm"),
        (re(r">\s*/dev/"), "> /dev/"),
    ]
});

/// Operators rejected unless the caller opts in to shell syntax.
pub const SHELL_OPERATORS: &[&str] = &["&&", "||", ";", "|", ">", "<", "$"];

pub const GITHUB_TOKEN_PREFIXES: &[&str] = &["ghp_", "github_pat_", "ghs_", "ghr_"];

const FILENAME_FORBIDDEN: &[char] = &['<', '>', ':', '"', '|', '?', '*', '\0', '\\', '/'];

/// Validate an IPv4 or IPv6 address.
///
/// # Errors
///
/// Returns an error if `ip` is empty or not an address.
pub fn validate_ip_address(ip: &str) -> Result<IpAddr, ValidationError> {
    let ip = ip.trim();
    if ip.is_empty() {
        return Err(ValidationError::Empty {
            field: "IP address",
        });
    }
    ip.parse().map_err(|_| ValidationError::Invalid {
        field: "IP address",
        value: ip.to_string(),
    })
}

/// Validate an RFC 1123 hostname. A single trailing dot is accepted and
/// stripped from the returned value.
///
/// # Errors
///
/// Returns an error if the hostname is empty, longer than 253 characters,
/// or contains a malformed label.
pub fn validate_hostname(hostname: &str) -> Result<String, ValidationError> {
    let trimmed = hostname.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Empty { field: "hostname" });
    }
    if trimmed.len() > 253 {
        return Err(ValidationError::TooLong {
            field: "hostname",
            len: trimmed.len(),
            max: 253,
        });
    }
    let host = trimmed.strip_suffix('.').unwrap_or(trimmed);
    let valid = !host.is_empty()
        && host
            .split('.')
            .all(|label| label.len() <= 63 && HOSTNAME_LABEL_RE.is_match(label));
    if !valid {
        return Err(ValidationError::Invalid {
            field: "hostname",
            value: trimmed.to_string(),
        });
    }
    Ok(host.to_string())
}

/// Accept either an IP address or a hostname.
///
/// # Errors
///
/// Returns the hostname error when `host` is neither.
pub fn validate_host(host: &str) -> Result<String, ValidationError> {
    if let Ok(ip) = validate_ip_address(host) {
        return Ok(ip.to_string());
    }
    validate_hostname(host)
}

/// Validate a TCP port given as text.
///
/// # Errors
///
/// Returns an error if `port` is not numeric or outside 1..=65535.
pub fn validate_port(port: &str) -> Result<u16, ValidationError> {
    let value: i64 = port.trim().parse().map_err(|_| ValidationError::Invalid {
        field: "port",
        value: port.to_string(),
    })?;
    u16::try_from(value)
        .ok()
        .filter(|p| *p >= 1)
        .ok_or(ValidationError::OutOfRange {
            field: "port",
            value,
            min: 1,
            max: 65535,
        })
}

/// Validate a login name (`user`, `root@pam`, `first.last`).
///
/// # Errors
///
/// Returns an error if the name is empty, longer than 255 characters, or
/// contains characters outside `[a-zA-Z0-9._@-]`.
pub fn validate_username(username: &str) -> Result<String, ValidationError> {
    let username = username.trim();
    if username.is_empty() {
        return Err(ValidationError::Empty { field: "username" });
    }
    if username.len() > 255 {
        return Err(ValidationError::TooLong {
            field: "username",
            len: username.len(),
            max: 255,
        });
    }
    if !USERNAME_RE.is_match(username) {
        return Err(ValidationError::Invalid {
            field: "username",
            value: username.to_string(),
        });
    }
    Ok(username.to_string())
}

/// Validate a VM name: alphanumeric start, then alphanumerics or hyphens.
///
/// # Errors
///
/// Returns an error if the name is empty, longer than 63 characters, or
/// malformed.
pub fn validate_vm_name(name: &str) -> Result<String, ValidationError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ValidationError::Empty { field: "VM name" });
    }
    if name.len() > 63 {
        return Err(ValidationError::TooLong {
            field: "VM name",
            len: name.len(),
            max: 63,
        });
    }
    if !VM_NAME_RE.is_match(name) {
        return Err(ValidationError::Invalid {
            field: "VM name",
            value: name.to_string(),
        });
    }
    Ok(name.to_string())
}

/// Reject command strings that could smuggle extra shell commands.
///
/// Command substitution, backticks, `; rm` and redirection into `/dev/` are
/// always refused. With `allow_shell == false` the plain shell operators in
/// [`SHELL_OPERATORS`] are refused too.
///
/// # Errors
///
/// Returns the first forbidden pattern found.
pub fn validate_command(command: &str, allow_shell: bool) -> Result<String, ValidationError> {
    let command = command.trim();
    if command.is_empty() {
        return Err(ValidationError::Empty { field: "command" });
    }
    for (re, label) in DANGEROUS_COMMAND_RE.iter() {
        if re.is_match(command) {
            return Err(ValidationError::ForbiddenPattern {
                pattern: (*label).to_string(),
            });
        }
    }
    if !allow_shell {
        if let Some(op) = SHELL_OPERATORS.iter().find(|op| command.contains(**op)) {
            return Err(ValidationError::ForbiddenPattern {
                pattern: (*op).to_string(),
            });
        }
    }
    Ok(command.to_string())
}

/// Validate iDRAC login credentials.
///
/// # Errors
///
/// Returns an error if the username is malformed or the password is shorter
/// than 8 characters.
pub fn validate_idrac_credentials(username: &str, password: &str) -> Result<(), ValidationError> {
    if username.is_empty() {
        return Err(ValidationError::Empty {
            field: "iDRAC username",
        });
    }
    if !IDRAC_USER_RE.is_match(username) {
        return Err(ValidationError::Invalid {
            field: "iDRAC username",
            value: username.to_string(),
        });
    }
    if password.chars().count() < 8 {
        return Err(ValidationError::PasswordTooShort { min: 8 });
    }
    Ok(())
}

/// Proxmox node names follow hostname rules.
///
/// # Errors
///
/// Returns an error if the node name is not a valid hostname.
pub fn validate_proxmox_node(node: &str) -> Result<String, ValidationError> {
    if node.trim().is_empty() {
        return Err(ValidationError::Empty {
            field: "Proxmox node",
        });
    }
    validate_hostname(node).map_err(|_| ValidationError::Invalid {
        field: "Proxmox node",
        value: node.to_string(),
    })
}

/// Check a GitHub token for a known prefix and plausible length.
///
/// # Errors
///
/// Returns an error if the prefix is unknown or the token is shorter than
/// 40 characters.
pub fn validate_github_token(token: &str) -> Result<(), ValidationError> {
    if token.is_empty() {
        return Err(ValidationError::Empty {
            field: "GitHub token",
        });
    }
    let known = GITHUB_TOKEN_PREFIXES.iter().any(|p| token.starts_with(p));
    if !known || token.len() < 40 {
        return Err(ValidationError::Invalid {
            field: "GitHub token",
            value: format!("{}...", token.chars().take(4).collect::<String>()),
        });
    }
    Ok(())
}

/// Make `filename` safe to use as a single path component.
///
/// Forbidden characters become `_`, leading/trailing dots and spaces are
/// trimmed, and names longer than `max_len` are truncated while keeping a
/// short extension (up to 10 characters) intact.
#[must_use]
pub fn sanitize_filename(filename: &str, max_len: usize) -> String {
    let replaced: String = filename
        .chars()
        .map(|c| if FILENAME_FORBIDDEN.contains(&c) { '_' } else { c })
        .collect();
    let trimmed = replaced.trim_matches(|c| c == '.' || c == ' ');
    if trimmed.is_empty() {
        return "unnamed".to_string();
    }

    let chars: Vec<char> = trimmed.chars().collect();
    if chars.len() <= max_len {
        return trimmed.to_string();
    }

    // Extension is the last `.xyz` that isn't the first character.
    let ext_start = chars.iter().rposition(|c| *c == '.').filter(|i| *i > 0);
    match ext_start {
        Some(i) if chars.len() - i <= 10 && chars.len() - i < max_len => {
            let ext_len = chars.len() - i;
            let stem: String = chars[..max_len - ext_len].iter().collect();
            let ext: String = chars[i..].iter().collect();
            format!("{stem}{ext}")
        }
        _ => chars[..max_len].iter().collect(),
    }
}
