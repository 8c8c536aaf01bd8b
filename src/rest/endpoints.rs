//! Typed helpers for the ledger endpoints.
//!
//! The client does not interpret ledger semantics; each helper only shapes
//! the parameters and returns the response body.

use serde_json::{json, Value};

use crate::auth::ApiKey;
use crate::error::ClientResult;
use crate::protocol::Params;

use super::RestClient;

fn params(value: Value) -> Option<Params> {
    match value {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

impl RestClient {
    /// Create an API key from an account's email and password.
    pub async fn api_key_create(
        &self,
        email: &str,
        password: &str,
        device_name: &str,
    ) -> ClientResult<String> {
        let params = params(json!({
            "email": email,
            "password": password,
            "device_name": device_name,
        }));
        Ok(self.call("api_key_create", params, None).await?.body)
    }

    /// Fetch the info of the user owning `api_key`.
    pub async fn user_info(&self, api_key: &ApiKey) -> ClientResult<String> {
        let params = params(json!({ "email": null }));
        Ok(self.call("user_info", params, Some(api_key)).await?.body)
    }

    /// Create a transaction. `amount` is in cents.
    pub async fn transaction_create(
        &self,
        api_key: &ApiKey,
        action: &str,
        recipient: &str,
        amount: i64,
        attachment: &str,
    ) -> ClientResult<String> {
        let params = params(json!({
            "action": action,
            "recipient": recipient,
            "amount": amount,
            "attachment": attachment,
        }));
        Ok(self
            .call("transaction_create", params, Some(api_key))
            .await?
            .body)
    }

    /// Fetch a transaction by its unique token.
    pub async fn transaction_info(&self, api_key: &ApiKey, token: &str) -> ClientResult<String> {
        let params = params(json!({ "token": token }));
        Ok(self
            .call("transaction_info", params, Some(api_key))
            .await?
            .body)
    }
}
