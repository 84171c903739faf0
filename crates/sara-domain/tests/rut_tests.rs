use proptest::prelude::*;
use sara_domain::{Rut, RutError};

proptest! {
    #[test]
    fn prop_display_parses_back(body in 1u32..=99_999_999) {
        let rut = Rut::from_body(body).unwrap();
        let parsed = Rut::parse(&rut.to_string()).unwrap();
        prop_assert_eq!(parsed, rut);
    }

    #[test]
    fn prop_compact_and_dotted_agree(body in 1u32..=99_999_999) {
        let rut = Rut::from_body(body).unwrap();
        let compact = format!("{}{}", body, rut.verifier());
        prop_assert_eq!(Rut::parse(&compact).unwrap(), rut);
    }

    #[test]
    fn prop_any_other_digit_is_rejected(body in 1u32..=99_999_999, digit in 0u32..=10) {
        let rut = Rut::from_body(body).unwrap();
        let candidate = if digit == 10 { 'K' } else { char::from_digit(digit, 10).unwrap() };
        prop_assume!(candidate != rut.verifier());
        let result = Rut::parse(&format!("{body}-{candidate}"));
        let is_mismatch = matches!(result, Err(RutError::CheckDigitMismatch { .. }));
        prop_assert!(is_mismatch);
    }
}

#[test]
fn rut_serde_uses_dotted_form() {
    let rut = Rut::parse("11111111-1").unwrap();
    assert_eq!(serde_json::to_string(&rut).unwrap(), "\"11.111.111-1\"");
    let back: Rut = serde_json::from_str("\"11111111-1\"").unwrap();
    assert_eq!(back, rut);
    assert!(serde_json::from_str::<Rut>("\"11111111-2\"").is_err());
}
