//! Sender identifier → deliverable address.
//!
//! Argentine mobile numbers arrive in webhooks as `549` + area code + number
//! (13 digits), but the Cloud API only delivers to them without the mobile
//! marker `9`: `54` + area code + number.

const COUNTRY_CODE: &str = "54";
const MOBILE_MARKER: char = '9';
const MOBILE_ID_LEN: usize = 13;

/// Canonicalize a raw sender identifier into the address the outbound
/// channel accepts. Identifiers that do not match the mobile pattern are
/// returned unchanged. Pure and idempotent.
#[must_use]
pub fn normalize_phone(identifier: &str) -> String {
    if let Some(rest) = identifier.strip_prefix(COUNTRY_CODE)
        && let Some(national) = rest.strip_prefix(MOBILE_MARKER)
        && identifier.len() == MOBILE_ID_LEN
        && identifier.bytes().all(|b| b.is_ascii_digit())
    {
        return format!("{COUNTRY_CODE}{national}");
    }
    identifier.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_mobile_marker() {
        assert_eq!(normalize_phone("5491122334455"), "541122334455");
    }

    #[test]
    fn idempotent() {
        for id in ["5491122334455", "541122334455", "15551234567", "", "549abc"] {
            let once = normalize_phone(id);
            assert_eq!(normalize_phone(&once), once, "input {id}");
        }
    }

    #[test]
    fn leaves_non_matching_ids_alone() {
        // Wrong length.
        assert_eq!(normalize_phone("549112233445"), "549112233445");
        assert_eq!(normalize_phone("54911223344556"), "54911223344556");
        // Other country.
        assert_eq!(normalize_phone("5591122334455"), "5591122334455");
        // Already deliverable.
        assert_eq!(normalize_phone("541122334455"), "541122334455");
        // Not digits.
        assert_eq!(normalize_phone("549112233445x"), "549112233445x");
        assert_eq!(normalize_phone(""), "");
    }
}
