//! Anchored address grammars for the `email` (RFC 5321) and `idn-email`
//! (RFC 6531) formats. Each grammar compiles once per process and is
//! matched against the whole candidate, never searched.

use std::sync::LazyLock;

use regex::Regex;

// RFC 5321: Mailbox = Local-part "@" ( Domain / address-literal ).
// Local-part is a Dot-string of atext atoms or a Quoted-string; Domain is
// dot-separated let-dig/hyphen labels; address-literal is bracketed dtext.
static RFC5321: LazyLock<Regex> = LazyLock::new(|| {
    let atom = "[A-Za-z0-9!#$%&'*+/=?^_`{|}~-]+";
    let dot_string = format!("{atom}(?:\\.{atom})*");
    let quoted_string = r#""(?:[ !#-\[\]-~]|\\[ -~])*""#;
    let label = "[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?";
    let domain = format!("{label}(?:\\.{label})*");
    let address_literal = r"\[[!-Z^-~]+\]";
    compile(&format!(
        "^(?:{dot_string}|{quoted_string})@(?:{domain}|{address_literal})$"
    ))
});

// RFC 6531 widens atext and domain labels with UTF8-non-ascii; the ASCII
// skeleton is unchanged.
static RFC6531: LazyLock<Regex> = LazyLock::new(|| {
    let atext = "(?:[A-Za-z0-9!#$%&'*+/=?^_`{|}~-]|[^\\x00-\\x7F])";
    let atom = format!("{atext}+");
    let dot_string = format!("{atom}(?:\\.{atom})*");
    let quoted_string = r#""(?:[ !#-\[\]-~]|[^\x00-\x7F]|\\[ -~])*""#;
    let let_dig = "(?:[A-Za-z0-9]|[^\\x00-\\x7F])";
    let label = format!("{let_dig}(?:(?:[A-Za-z0-9-]|[^\\x00-\\x7F])*{let_dig})?");
    let domain = format!("{label}(?:\\.{label})*");
    let address_literal = r"\[[!-Z^-~]+\]";
    compile(&format!(
        "^(?:{dot_string}|{quoted_string})@(?:{domain}|{address_literal})$"
    ))
});

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("static address grammar must compile")
}

pub(crate) fn is_rfc5321_email(value: &str) -> bool {
    RFC5321.is_match(value)
}

pub(crate) fn is_rfc6531_email(value: &str) -> bool {
    RFC6531.is_match(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_address_passes_both_grammars() {
        assert!(is_rfc5321_email("simple@example.com"));
        assert!(is_rfc6531_email("simple@example.com"));
    }

    #[test]
    fn internationalized_address_needs_the_wide_grammar() {
        assert!(!is_rfc5321_email("用户@例子.广告"));
        assert!(is_rfc6531_email("用户@例子.广告"));
    }

    #[test]
    fn dot_string_atoms_cannot_be_empty() {
        for bad in ["", "@example.com", "a@", ".lead@example.com", "tail.@example.com", "a..b@example.com"] {
            assert!(!is_rfc5321_email(bad), "{bad:?} should fail");
            assert!(!is_rfc6531_email(bad), "{bad:?} should fail");
        }
    }

    #[test]
    fn quoted_local_parts_are_allowed() {
        assert!(is_rfc5321_email(r#""odd local"@example.com"#));
        assert!(is_rfc5321_email(r#""very\ odd"@example.com"#));
    }

    #[test]
    fn address_literal_domains_are_allowed() {
        assert!(is_rfc5321_email("postmaster@[192.0.2.1]"));
        assert!(is_rfc5321_email("postmaster@[IPv6:2001:db8::1]"));
        assert!(is_rfc6531_email("postmaster@[IPv6:2001:db8::1]"));
    }

    #[test]
    fn domain_labels_cannot_start_or_end_with_hyphen() {
        assert!(!is_rfc5321_email("user@-example.com"));
        assert!(!is_rfc5321_email("user@example-.com"));
        assert!(is_rfc5321_email("user@ex-ample.com"));
    }

    #[test]
    fn whole_string_must_match() {
        assert!(!is_rfc5321_email("user@example.com extra"));
        assert!(!is_rfc5321_email(" user@example.com"));
    }
}
