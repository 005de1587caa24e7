//! UPI id validation and `upi://pay` deep links. No payment is executed here.

use std::sync::OnceLock;

use regex::Regex;
use rust_decimal::Decimal;
use serde::Serialize;
use url::form_urlencoded;

use crate::error::{Error, Result};

pub const CURRENCY: &str = "INR";

const USERNAME_MIN: usize = 3;

const PROVIDERS: &[(&str, &str)] = &[
    ("paytm", "Paytm"),
    ("phonepe", "PhonePe"),
    ("gpay", "Google Pay"),
    ("amazonpay", "Amazon Pay"),
    ("mobikwik", "MobiKwik"),
    ("freecharge", "FreeCharge"),
    ("airtel", "Airtel Money"),
    ("jio", "JioMoney"),
    ("sbi", "SBI Pay"),
    ("icici", "iMobile Pay"),
    ("hdfc", "HDFC Bank"),
    ("axis", "Axis Bank"),
    ("kotak", "Kotak Bank"),
    ("ybl", "PhonePe"),
    ("okhdfcbank", "HDFC Bank"),
    ("okaxis", "Axis Bank"),
    ("oksbi", "SBI Pay"),
    ("okicici", "ICICI Bank"),
];

const BANKS: &[&str] = &[
    "sbi", "icici", "hdfc", "axis", "kotak", "okhdfcbank", "okaxis", "oksbi", "okicici",
];
const WALLETS: &[&str] = &["paytm", "phonepe", "mobikwik", "freecharge", "amazonpay"];
const TELECOMS: &[&str] = &["airtel", "jio"];

static UPI_RE: OnceLock<Regex> = OnceLock::new();

fn upi_regex() -> &'static Regex {
    UPI_RE.get_or_init(|| {
        Regex::new(r"^[\w.-]+@[\w.-]+$")
            .unwrap_or_else(|error| panic!("UPI regex failed to compile: {error}"))
    })
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct UpiId {
    pub username: String,
    pub provider: String,
    pub provider_name: String,
    pub formatted: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ProviderInfo {
    pub provider_code: String,
    pub provider_name: String,
    pub is_bank: bool,
    pub is_wallet: bool,
    pub is_telecom: bool,
}

pub fn validate_upi_id(upi_id: &str) -> Result<UpiId> {
    if upi_id.is_empty() {
        return Err(Error::Validation("UPI ID is required".to_string()));
    }
    if !upi_regex().is_match(upi_id) {
        return Err(Error::Validation(
            "invalid UPI ID format, expected user@provider".to_string(),
        ));
    }
    let (username, provider) = upi_id
        .split_once('@')
        .ok_or_else(|| Error::Validation("invalid UPI ID format".to_string()))?;
    if username.chars().count() < USERNAME_MIN {
        return Err(Error::Validation(format!(
            "UPI username should be at least {USERNAME_MIN} characters"
        )));
    }
    Ok(UpiId {
        username: username.to_string(),
        provider: provider.to_string(),
        provider_name: provider_name(provider),
        formatted: upi_id.to_lowercase(),
    })
}

fn provider_name(provider: &str) -> String {
    let code = provider.to_lowercase();
    PROVIDERS
        .iter()
        .find(|(known, _)| *known == code)
        .map(|(_, name)| name.to_string())
        .unwrap_or_else(|| title_case(provider))
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

pub fn provider_info(upi_id: &str) -> Result<ProviderInfo> {
    let parsed = validate_upi_id(upi_id)?;
    let code = parsed.provider.to_lowercase();
    Ok(ProviderInfo {
        is_bank: BANKS.contains(&code.as_str()),
        is_wallet: WALLETS.contains(&code.as_str()),
        is_telecom: TELECOMS.contains(&code.as_str()),
        provider_name: parsed.provider_name,
        provider_code: code,
    })
}

/// `upi://pay` link asking for `amount` to be paid to `upi_id`.
pub fn payment_link(
    upi_id: &str,
    amount: Decimal,
    note: Option<&str>,
    reference: Option<&str>,
) -> Result<String> {
    validate_upi_id(upi_id)?;
    let mut query = form_urlencoded::Serializer::new(String::new());
    query.append_pair("pa", upi_id);
    query.append_pair("am", &amount.round_dp(2).to_string());
    if let Some(note) = note {
        query.append_pair("tn", note);
    }
    if let Some(reference) = reference {
        query.append_pair("tr", reference);
    }
    query.append_pair("cu", CURRENCY);
    Ok(format!("upi://pay?{}", query.finish()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn accepts_known_provider() {
        let upi = validate_upi_id("Ravi.K@okHDFCbank").unwrap();
        assert_eq!(upi.username, "Ravi.K");
        assert_eq!(upi.provider_name, "HDFC Bank");
        assert_eq!(upi.formatted, "ravi.k@okhdfcbank");
    }

    #[test]
    fn unknown_provider_is_title_cased() {
        assert_eq!(validate_upi_id("9876543210@newbank").unwrap().provider_name, "Newbank");
    }

    #[test]
    fn rejects_malformed_ids() {
        for bad in ["", "no-at-sign", "a@b@c", "ab@paytm", "user@", "us er@ybl"] {
            assert!(validate_upi_id(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn classifies_providers() {
        let info = provider_info("shop@paytm").unwrap();
        assert!(info.is_wallet && !info.is_bank && !info.is_telecom);
        assert!(provider_info("shop@oksbi").unwrap().is_bank);
        assert!(provider_info("shop@jio").unwrap().is_telecom);
    }

    #[test]
    fn builds_payment_link() {
        let link = payment_link("ann@ybl", dec!(100.50), Some("Goa trip"), Some("FS1ab")).unwrap();
        assert_eq!(
            link,
            "upi://pay?pa=ann%40ybl&am=100.50&tn=Goa+trip&tr=FS1ab&cu=INR"
        );
        assert!(payment_link("nope", dec!(1), None, None).is_err());
    }
}
