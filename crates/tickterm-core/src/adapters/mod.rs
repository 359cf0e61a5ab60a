//! Provider adapters.
//!
//! Each adapter turns one provider's HTTP API into the [`DataSource`]
//! contract. Status classification and circuit-breaker bookkeeping are shared
//! through [`send`].
//!
//! [`DataSource`]: crate::data_source::DataSource

mod fmp;
mod fred;
mod mock;

pub use fmp::FmpAdapter;
pub use fred::FredAdapter;
pub use mock::MockSource;

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::circuit_breaker::CircuitBreaker;
use crate::data_source::FetchError;
use crate::http_client::{HttpClient, HttpRequest, HttpResponse};
use crate::ProviderId;

/// Issues `request` and returns the body of a successful response.
///
/// Transport failures and 5xx responses count against the breaker; other
/// statuses are classified by [`classify_status`].
pub(crate) async fn send(
    provider: ProviderId,
    http_client: &dyn HttpClient,
    breaker: &CircuitBreaker,
    request: HttpRequest,
) -> Result<String, FetchError> {
    breaker.check()?;

    let url = request.url.clone();
    let response = match http_client.execute(request).await {
        Ok(response) => response,
        Err(error) => {
            breaker.record_failure();
            tracing::warn!(
                provider = %provider,
                url = %url,
                timed_out = error.timed_out(),
                "transport failure"
            );
            return Err(FetchError::unavailable(format!(
                "{provider} transport error: {}",
                error.message()
            )));
        }
    };

    if response.is_success() {
        breaker.record_success();
        return Ok(response.body);
    }

    if response.status >= 500 {
        breaker.record_failure();
    } else {
        breaker.record_success();
    }
    tracing::warn!(
        provider = %provider,
        url = %url,
        status = response.status,
        "provider returned an error status"
    );
    Err(classify_status(provider, &response))
}

/// Maps a non-success response onto the fetch error taxonomy.
pub(crate) fn classify_status(provider: ProviderId, response: &HttpResponse) -> FetchError {
    match response.status {
        429 => {
            let error = FetchError::rate_limited(format!("{provider} rate limit reached"));
            match response.retry_after {
                Some(delay) => error.with_retry_after(delay),
                None => error,
            }
        }
        401 | 402 | 403 => FetchError::invalid_key(format!(
            "{provider} rejected the API key (status {})",
            response.status
        )),
        400 if response.body.to_ascii_lowercase().contains("api_key") => {
            FetchError::invalid_key(format!("{provider} rejected the API key"))
        }
        400 | 404 => FetchError::not_found(format!(
            "{provider} has no data for the request (status {})",
            response.status
        )),
        status => FetchError::unavailable(format!("{provider} returned status {status}")),
    }
}

pub(crate) fn parse_json<T: DeserializeOwned>(
    provider: ProviderId,
    body: &str,
) -> Result<T, FetchError> {
    serde_json::from_str(body)
        .map_err(|e| FetchError::unavailable(format!("malformed {provider} response: {e}")))
}

/// Decimal from a JSON number or numeric string; anything else is `None`.
pub(crate) fn decimal_value(value: Option<&Value>) -> Option<Decimal> {
    match value? {
        Value::Number(number) => number
            .to_string()
            .parse::<Decimal>()
            .ok()
            .or_else(|| number.as_f64().and_then(Decimal::from_f64)),
        Value::String(text) => text.trim().parse::<Decimal>().ok(),
        _ => None,
    }
}

pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|text| text.trim().to_owned())
        .filter(|text| !text.is_empty())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::data_source::FetchErrorKind;

    #[test]
    fn status_codes_map_onto_error_kinds() {
        let cases = [
            (404, "", FetchErrorKind::NotFound),
            (401, "", FetchErrorKind::InvalidKey),
            (403, "", FetchErrorKind::InvalidKey),
            (
                400,
                "Bad Request. The value for variable api_key is not registered.",
                FetchErrorKind::InvalidKey,
            ),
            (400, "Bad Request. series does not exist.", FetchErrorKind::NotFound),
            (503, "", FetchErrorKind::Unavailable),
        ];

        for (status, body, expected) in cases {
            let response = HttpResponse::with_status(status, body);
            assert_eq!(
                classify_status(ProviderId::Fmp, &response).kind(),
                expected,
                "status {status}"
            );
        }
    }

    #[test]
    fn rate_limit_keeps_the_retry_after_header() {
        let response = HttpResponse {
            status: 429,
            body: String::new(),
            retry_after: Some(Duration::from_secs(3)),
        };
        let error = classify_status(ProviderId::Fmp, &response);
        assert_eq!(error.kind(), FetchErrorKind::RateLimited);
        assert_eq!(error.retry_after(), Some(Duration::from_secs(3)));
    }

    #[test]
    fn decimal_value_accepts_numbers_and_numeric_strings() {
        assert_eq!(
            decimal_value(Some(&json!(391035000000_u64))),
            Some(Decimal::from(391_035_000_000_u64))
        );
        assert_eq!(decimal_value(Some(&json!("4.25"))), "4.25".parse().ok());
        assert_eq!(decimal_value(Some(&json!("."))), None);
        assert_eq!(decimal_value(Some(&Value::Null)), None);
        assert_eq!(decimal_value(None), None);
    }
}
