//! Garde validation utilities.

use crate::domain::DomainError;
use garde::Report;

/// Maps a garde report to the offending field that comes first in `field_order`.
///
/// Garde does not report errors in declaration order, so callers pass the
/// order their fields are checked in. Fields missing from `field_order` rank last.
pub fn first_violation(report: &Report, field_order: &[&str]) -> DomainError {
    let field = report
        .iter()
        .map(|(path, _)| path.to_string())
        .min_by_key(|field| {
            let rank = field_order
                .iter()
                .position(|name| *name == field.as_str())
                .unwrap_or(field_order.len());
            (rank, field.clone())
        })
        .unwrap_or_default();
    DomainError::FieldTooLong(field)
}

#[cfg(test)]
mod tests {
    use super::*;
    use garde::Validate;

    const FIELD_ORDER: [&str; 3] = ["zeta", "mid", "alpha"];

    #[derive(Validate)]
    struct TestRequest {
        #[garde(length(max = 2))]
        zeta: String,
        #[garde(length(max = 2))]
        mid: String,
        #[garde(length(max = 2))]
        alpha: String,
    }

    fn request(zeta: &str, mid: &str, alpha: &str) -> TestRequest {
        TestRequest {
            zeta: zeta.to_string(),
            mid: mid.to_string(),
            alpha: alpha.to_string(),
        }
    }

    fn reported(request: &TestRequest, order: &[&str]) -> String {
        let report = request.validate().unwrap_err();
        match first_violation(&report, order) {
            DomainError::FieldTooLong(field) => field,
            other => panic!("expected FieldTooLong, got {:?}", other),
        }
    }

    #[test]
    fn test_first_violation_follows_field_order_not_alphabet() {
        assert_eq!(reported(&request("abc", "ok", "abc"), &FIELD_ORDER), "zeta");
    }

    #[test]
    fn test_first_violation_skips_valid_fields() {
        assert_eq!(reported(&request("ok", "abc", "abc"), &FIELD_ORDER), "mid");
        assert_eq!(reported(&request("ok", "ok", "abc"), &FIELD_ORDER), "alpha");
    }

    #[test]
    fn test_unlisted_fields_rank_last() {
        assert_eq!(reported(&request("abc", "abc", "abc"), &["mid"]), "mid");
        assert_eq!(reported(&request("abc", "ok", "abc"), &["mid"]), "alpha");
    }
}
