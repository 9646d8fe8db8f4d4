use chrono::{Datelike, Utc};
use payment_gateway::creditcard::{self, CardError, Issuer};
use payment_gateway::domain::payment::CardInfo;

fn future_year() -> i32 {
    (Utc::now().year() % 100) + 1
}

fn base_card() -> CardInfo {
    CardInfo {
        card_name: "Mario Arizaj".to_string(),
        card_number: "378282246310005".to_string(),
        expiry_month: 10,
        expiry_year: future_year(),
        cvv: "123".to_string(),
    }
}

#[test]
fn recognises_issuers() {
    let cases = [
        ("378282246310005", Issuer::Amex),
        ("5555555555554444", Issuer::Mastercard),
        ("2221001234567896", Issuer::Mastercard),
        ("4026111111111115", Issuer::VisaElectron),
        ("4111111111111111", Issuer::Visa),
    ];
    for (number, expected) in cases {
        assert_eq!(creditcard::issuer(number), Ok(expected), "{number}");
    }
}

#[test]
fn issuer_names_are_stable() {
    assert_eq!(Issuer::Amex.name(), "amex");
    assert_eq!(Issuer::Mastercard.name(), "mastercard");
    assert_eq!(Issuer::VisaElectron.name(), "visa electron");
    assert_eq!(Issuer::Visa.name(), "visa");
}

#[test]
fn rejects_unsupported_issuer() {
    // Discover is not a recognised scheme.
    assert_eq!(
        creditcard::issuer("6011111111111117"),
        Err(CardError::UnknownIssuer)
    );
}

#[test]
fn rejects_non_digit_prefix() {
    assert_eq!(
        creditcard::issuer("a011111111111117"),
        Err(CardError::UnknownIssuer)
    );
    // A non-digit inside a wider window poisons the whole prefix scan,
    // even though the two-digit amex window already matched.
    assert_eq!(
        creditcard::issuer("37x8282246310005"),
        Err(CardError::UnknownIssuer)
    );
}

#[test]
fn expiry_in_the_future_is_valid() {
    assert_eq!(creditcard::validate_expiration(10, future_year()), Ok(()));
}

#[test]
fn expiry_in_the_current_month_is_valid() {
    let now = Utc::now();
    assert_eq!(
        creditcard::validate_expiration(now.month() as i32, now.year() % 100),
        Ok(())
    );
}

#[test]
fn expired_year_is_rejected() {
    assert_eq!(
        creditcard::validate_expiration(10, Utc::now().year() % 100 - 1),
        Err(CardError::Expired)
    );
}

#[test]
fn expired_month_is_rejected() {
    let now = Utc::now();
    let (month, year) = if now.month() == 1 {
        (12, now.year() % 100 - 1)
    } else {
        (now.month() as i32 - 1, now.year() % 100)
    };
    assert_eq!(
        creditcard::validate_expiration(month, year),
        Err(CardError::Expired)
    );
}

#[test]
fn out_of_range_month_is_rejected() {
    assert_eq!(
        creditcard::validate_expiration(13, future_year()),
        Err(CardError::InvalidMonth)
    );
    assert_eq!(
        creditcard::validate_expiration(0, future_year()),
        Err(CardError::InvalidMonth)
    );
}

#[test]
fn cvv_length_must_be_three_or_four() {
    assert_eq!(creditcard::validate_cvv("123"), Ok(()));
    assert_eq!(creditcard::validate_cvv("1234"), Ok(()));
    assert_eq!(creditcard::validate_cvv("12"), Err(CardError::InvalidCvv));
    assert_eq!(creditcard::validate_cvv("12345"), Err(CardError::InvalidCvv));
}

#[test]
fn luhn_rejects_bad_checksums_and_lengths() {
    assert!(creditcard::valid_number("378282246310005"));
    assert!(!creditcard::valid_number("49927398717"));
    assert!(!creditcard::valid_number("378282246310006"));
    assert!(!creditcard::valid_number("40128888888818810000"));
}

#[test]
fn full_validation_accepts_a_good_card() {
    assert_eq!(creditcard::validate(&base_card()), Ok(()));
}

#[test]
fn first_failing_rule_wins() {
    // Unknown issuer is reported before the bad CVV.
    let mut card = base_card();
    card.card_number = "6011111111111117".to_string();
    card.cvv = "12".to_string();
    assert_eq!(creditcard::validate(&card), Err(CardError::UnknownIssuer));

    // Expiry is reported before the bad CVV.
    let mut card = base_card();
    card.expiry_year = Utc::now().year() % 100 - 1;
    card.cvv = "12".to_string();
    assert_eq!(creditcard::validate(&card), Err(CardError::Expired));

    // CVV is reported before the Luhn failure.
    let mut card = base_card();
    card.card_number = "378282246310006".to_string();
    card.cvv = "12".to_string();
    assert_eq!(creditcard::validate(&card), Err(CardError::InvalidCvv));

    let mut card = base_card();
    card.card_number = "378282246310006".to_string();
    assert_eq!(creditcard::validate(&card), Err(CardError::InvalidNumber));
}

#[test]
fn validation_error_messages_are_stable() {
    assert_eq!(
        CardError::UnknownIssuer.to_string(),
        "unknown credit card issuer"
    );
    assert_eq!(CardError::Expired.to_string(), "credit card has expired");
    assert_eq!(CardError::InvalidMonth.to_string(), "invalid month");
    assert_eq!(CardError::InvalidCvv.to_string(), "invalid CVV");
    assert_eq!(
        CardError::InvalidNumber.to_string(),
        "invalid credit card number"
    );
}
