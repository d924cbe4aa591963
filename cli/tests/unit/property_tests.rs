//! Property-based tests for the input validators and date helpers.

use chrono::{Duration, NaiveDate};
use proptest::prelude::*;
use timeshift_cli::domain::time::{calculate_cert_valid_date, validate_date_format};
use timeshift_cli::domain::validate::{
    SHELL_OPERATORS, sanitize_filename, validate_command, validate_hostname, validate_port,
    validate_vm_name,
};

proptest! {
    /// Every port in range is accepted and round-trips to the same number.
    #[test]
    fn prop_ports_in_range_accepted(port in 1u32..=65535) {
        prop_assert_eq!(u32::from(validate_port(&port.to_string()).unwrap_or(0)), port);
    }

    /// Zero and anything above 65535 is rejected.
    #[test]
    fn prop_ports_out_of_range_rejected(port in prop_oneof![Just(0i64), 65536i64..1_000_000, -1_000i64..0]) {
        prop_assert!(validate_port(&port.to_string()).is_err());
    }

    /// Names of letters, digits and inner hyphens are valid VM names.
    #[test]
    fn prop_vm_names_accepted(name in "[a-zA-Z0-9][a-zA-Z0-9-]{0,40}") {
        prop_assert_eq!(validate_vm_name(&name).ok(), Some(name));
    }

    /// Any character outside the VM name alphabet makes the name invalid.
    #[test]
    fn prop_vm_names_with_symbols_rejected(
        head in "[a-z]{1,10}",
        symbol in "[ _.!@#/]",
        tail in "[a-z]{0,10}",
    ) {
        let name = format!("{head}{symbol}{tail}");
        prop_assert!(validate_vm_name(&name).is_err(), "accepted {name}");
    }

    /// A plain command gains a shell operator and is then refused unless
    /// shell syntax is allowed.
    #[test]
    fn prop_shell_operators_rejected(
        cmd in "[a-z]{1,10}( [a-z0-9-]{1,10}){0,3}",
        op in proptest::sample::select(SHELL_OPERATORS),
        rest in "[a-z]{1,10}",
    ) {
        prop_assert!(validate_command(&cmd, false).is_ok());
        let joined = format!("{cmd} {op} {rest}");
        prop_assert!(validate_command(&joined, false).is_err(), "accepted {joined}");
    }

    /// Command substitution is refused even with shell syntax allowed.
    #[test]
    fn prop_command_substitution_always_rejected(cmd in "[a-z]{1,10}", inner in "[a-z]{1,10}") {
        let substituted = format!("{cmd} $({inner})");
        let backticked = format!("{cmd} `{inner}`");
        prop_assert!(validate_command(&substituted, true).is_err());
        prop_assert!(validate_command(&backticked, true).is_err());
    }

    /// Dotted hostnames made of well-formed labels are accepted, with a
    /// trailing dot stripped.
    #[test]
    fn prop_hostnames_accepted(labels in proptest::collection::vec("[a-z0-9]([a-z0-9-]{0,20}[a-z0-9])?", 1..5)) {
        let host = labels.join(".");
        prop_assert_eq!(validate_hostname(&format!("{host}.")).ok(), Some(host));
    }

    /// A label starting or ending with a hyphen is invalid.
    #[test]
    fn prop_hostnames_with_edge_hyphens_rejected(label in "[a-z]{1,10}", domain in "[a-z]{2,6}") {
        let leading = format!("-{label}.{domain}");
        let trailing = format!("{label}-.{domain}");
        prop_assert!(validate_hostname(&leading).is_err());
        prop_assert!(validate_hostname(&trailing).is_err());
    }

    /// The valid date lies exactly `days` before the expiry.
    #[test]
    fn prop_cert_valid_date_is_days_before_expiry(offset in 0i64..20_000, days in 0i64..3_650) {
        let base = NaiveDate::from_ymd_opt(1990, 1, 1).unwrap_or_default();
        let expiry = base + Duration::days(offset);
        let expiry_str = expiry.format("%Y-%m-%d").to_string();

        let valid = calculate_cert_valid_date(&expiry_str, days);

        let parsed = valid.as_deref().map(validate_date_format);
        prop_assert_eq!(parsed.and_then(Result::ok), Some(expiry - Duration::days(days)));
    }

    /// Sanitized names are never empty, never longer than the limit and
    /// never contain a path separator.
    #[test]
    fn prop_sanitized_filenames_are_single_components(name in ".{0,80}", max_len in 12usize..64) {
        let clean = sanitize_filename(&name, max_len);
        prop_assert!(!clean.is_empty());
        prop_assert!(clean.chars().count() <= max_len, "{clean} longer than {max_len}");
        prop_assert!(!clean.contains('/') && !clean.contains('\\'));
    }
}

#[test]
fn cert_valid_date_rejects_malformed_expiry() {
    assert_eq!(calculate_cert_valid_date("2024-6-30", 30), None);
    assert_eq!(calculate_cert_valid_date("30/06/2024", 30), None);
    assert_eq!(
        calculate_cert_valid_date("2024-06-30", 30).as_deref(),
        Some("2024-05-31")
    );
}
