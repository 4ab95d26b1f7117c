//! Payment request/response types and their validation.

use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{GuardError, GuardResult};

/// Daraja limit on `AccountReference`.
pub const MAX_ACCOUNT_REFERENCE_LEN: usize = 12;
/// Daraja limit on `TransactionDesc`.
pub const MAX_DESCRIPTION_LEN: usize = 13;
/// Daraja per-transaction ceiling for STK push, in shillings.
pub const MAX_AMOUNT: u64 = 250_000;
const DEFAULT_DESCRIPTION: &str = "Payment";

/// A payment as submitted by the rest of the application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRequest {
    /// Payer MSISDN in any common Kenyan format.
    pub payer_phone: String,
    /// Amount in shillings; must be positive.
    pub amount: f64,
    /// Shown to the payer and echoed in the callback.
    pub account_reference: String,
    #[serde(default)]
    pub transaction_desc: Option<String>,
}

/// A request that passed validation, in provider wire units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedPayment {
    /// `254XXXXXXXXX`.
    pub phone: String,
    /// Whole shillings, rounded up.
    pub amount: u64,
    pub account_reference: String,
    pub description: String,
}

impl PaymentRequest {
    /// Check required fields and normalise them for the provider.
    pub fn validate(&self) -> GuardResult<ValidatedPayment> {
        if self.payer_phone.trim().is_empty() {
            return Err(GuardError::Validation("payer phone is required".into()));
        }
        let phone = normalize_phone(&self.payer_phone).ok_or_else(|| {
            GuardError::Validation("payer phone is not a valid Kenyan mobile number".into())
        })?;

        if !self.amount.is_finite() || self.amount <= 0.0 {
            return Err(GuardError::Validation("amount must be a positive number".into()));
        }
        let amount = self.amount.ceil();
        if amount > MAX_AMOUNT as f64 {
            return Err(GuardError::Validation(format!(
                "amount exceeds the {} shilling limit",
                MAX_AMOUNT
            )));
        }

        let account_reference = self.account_reference.trim();
        if account_reference.is_empty() {
            return Err(GuardError::Validation("account reference is required".into()));
        }
        if account_reference.chars().count() > MAX_ACCOUNT_REFERENCE_LEN {
            return Err(GuardError::Validation(format!(
                "account reference exceeds {} characters",
                MAX_ACCOUNT_REFERENCE_LEN
            )));
        }

        let description = match self.transaction_desc.as_deref().map(str::trim) {
            Some(desc) if !desc.is_empty() => desc.chars().take(MAX_DESCRIPTION_LEN).collect(),
            _ => DEFAULT_DESCRIPTION.to_string(),
        };

        Ok(ValidatedPayment {
            phone,
            amount: amount as u64,
            account_reference: account_reference.to_string(),
            description,
        })
    }
}

/// Normalise a Kenyan mobile number to `254XXXXXXXXX`.
///
/// Accepts `07…`, `01…`, `7…`, `1…`, `254…` and `+254…`, with spaces or
/// dashes.
pub fn normalize_phone(raw: &str) -> Option<String> {
    let cleaned: String = raw
        .trim()
        .trim_start_matches('+')
        .chars()
        .filter(|c| !matches!(c, ' ' | '-'))
        .collect();

    if cleaned.is_empty() || !cleaned.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let subscriber = match cleaned.len() {
        12 if cleaned.starts_with("254") => &cleaned[3..],
        10 if cleaned.starts_with('0') => &cleaned[1..],
        9 => cleaned.as_str(),
        _ => return None,
    };

    if subscriber.starts_with('7') || subscriber.starts_with('1') {
        Some(format!("254{}", subscriber))
    } else {
        None
    }
}

/// STK push acknowledgement returned by the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentResponse {
    #[serde(rename = "MerchantRequestID")]
    pub merchant_request_id: String,
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: String,
    #[serde(rename = "ResponseCode")]
    pub response_code: String,
    #[serde(rename = "ResponseDescription")]
    pub response_description: String,
    #[serde(rename = "CustomerMessage", default)]
    pub customer_message: String,
}

impl PaymentResponse {
    /// `ResponseCode == "0"` means the push was sent to the handset.
    pub fn is_accepted(&self) -> bool {
        self.response_code.trim() == "0"
    }
}

/// An OAuth bearer token as issued by the provider.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub token: String,
    pub expires_in: Duration,
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &"<redacted>")
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// Wire shape of the OAuth response. `expires_in` arrives as a string.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    #[serde(deserialize_with = "u64_from_str_or_int")]
    pub expires_in: u64,
}

/// Error body the provider sends with 4xx/5xx statuses.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ProviderErrorBody {
    #[serde(rename = "errorCode", default)]
    pub error_code: Option<String>,
    #[serde(rename = "errorMessage", default)]
    pub error_message: Option<String>,
}

/// Wire shape of the STK push request.
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct StkPushBody<'a> {
    pub business_short_code: &'a str,
    pub password: String,
    pub timestamp: String,
    pub transaction_type: &'static str,
    pub amount: u64,
    pub party_a: &'a str,
    pub party_b: &'a str,
    pub phone_number: &'a str,
    #[serde(rename = "CallBackURL")]
    pub call_back_url: &'a str,
    pub account_reference: &'a str,
    pub transaction_desc: &'a str,
}

fn u64_from_str_or_int<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(u64),
        Str(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Int(v) => Ok(v),
        Raw::Str(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(phone: &str, amount: f64, reference: &str) -> PaymentRequest {
        PaymentRequest {
            payer_phone: phone.into(),
            amount,
            account_reference: reference.into(),
            transaction_desc: None,
        }
    }

    #[test]
    fn test_phone_normalisation() {
        let cases = [
            ("0712345678", Some("254712345678")),
            ("+254712345678", Some("254712345678")),
            ("254 712 345 678", Some("254712345678")),
            ("712345678", Some("254712345678")),
            ("0110-123456", Some("254110123456")),
            ("0812345678", None),
            ("07123", None),
            ("07123456ab", None),
            ("", None),
        ];
        for (input, expected) in cases {
            assert_eq!(normalize_phone(input).as_deref(), expected, "input {input:?}");
        }
    }

    #[test]
    fn test_non_positive_amounts_rejected() {
        for amount in [0.0, -1.0, -0.01, f64::NAN, f64::INFINITY] {
            let err = request("0712345678", amount, "INV1").validate().unwrap_err();
            assert!(matches!(err, GuardError::Validation(_)), "amount {amount}");
        }
    }

    #[test]
    fn test_missing_fields_rejected() {
        assert!(matches!(
            request("", 10.0, "INV1").validate(),
            Err(GuardError::Validation(_))
        ));
        assert!(matches!(
            request("0712345678", 10.0, "  ").validate(),
            Err(GuardError::Validation(_))
        ));
        assert!(matches!(
            request("0712345678", 10.0, "THIRTEEN-CHAR").validate(),
            Err(GuardError::Validation(_))
        ));
    }

    #[test]
    fn test_amount_ceiling() {
        for amount in [250_000.5, 1e300, f64::MAX] {
            let err = request("0712345678", amount, "INV1").validate().unwrap_err();
            assert!(err.to_string().contains("250000"), "{amount}: {err}");
        }
        let payment = request("0712345678", 250_000.0, "INV1").validate().unwrap();
        assert_eq!(payment.amount, MAX_AMOUNT);
    }

    #[test]
    fn test_valid_request() {
        let mut req = request("0712345678", 99.2, " INV-42 ");
        req.transaction_desc = Some("Order 42 for shop Kilimani".into());
        let payment = req.validate().unwrap();
        assert_eq!(payment.phone, "254712345678");
        assert_eq!(payment.amount, 100);
        assert_eq!(payment.account_reference, "INV-42");
        assert_eq!(payment.description.chars().count(), MAX_DESCRIPTION_LEN);
    }

    #[test]
    fn test_token_response_accepts_string_expiry() {
        let parsed: TokenResponse =
            serde_json::from_str(r#"{"access_token":"abc","expires_in":"3599"}"#).unwrap();
        assert_eq!(parsed.expires_in, 3599);
        let parsed: TokenResponse =
            serde_json::from_str(r#"{"access_token":"abc","expires_in":3599}"#).unwrap();
        assert_eq!(parsed.expires_in, 3599);
    }

    #[test]
    fn test_stk_body_field_names() {
        let body = StkPushBody {
            business_short_code: "174379",
            password: "pw".into(),
            timestamp: "20240101120000".into(),
            transaction_type: "CustomerPayBillOnline",
            amount: 10,
            party_a: "254712345678",
            party_b: "174379",
            phone_number: "254712345678",
            call_back_url: "https://example.com/cb",
            account_reference: "INV1",
            transaction_desc: "Payment",
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["BusinessShortCode"], "174379");
        assert_eq!(json["PartyA"], "254712345678");
        assert_eq!(json["CallBackURL"], "https://example.com/cb");
        assert_eq!(json["TransactionDesc"], "Payment");
    }

    #[test]
    fn test_access_token_debug_redacts() {
        let token = AccessToken {
            token: "secret-token".into(),
            expires_in: Duration::from_secs(3599),
        };
        assert!(!format!("{:?}", token).contains("secret-token"));
    }
}
