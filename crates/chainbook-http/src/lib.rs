//! HTTP implementation of the chainbook directory service.
//!
//! The directory is a plain JSON request/response API:
//!
//! ```text
//! POST {base}/auth/challenge                    → { "challenge": … }
//! POST {base}/auth/verify                       → { "session_token": … }
//! GET  {base}/accounts/{address}/contacts       → { "contacts": […] }
//! POST {base}/accounts/{address}/contacts       → 204
//! ```
//!
//! Post-authentication calls carry the session token as a bearer
//! header. A token-rejected response (401/403) on those calls is folded
//! into [`ChainbookError::Transport`], exactly like any other failure
//! of that call: the caller retries locally and never re-authenticates
//! automatically. Only `/auth/verify` treats 401/403 specially — there
//! it means the signature was refused, a normal protocol outcome.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use chainbook_types::config::ClientConfig;
use chainbook_types::{
    Address, ChainbookError, DirectoryApi, Result, SessionToken, Signature, VerifyOutcome,
};

// ---------------------------------------------------------------------------
// Wire DTOs
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct ChallengeRequest {
    account: Address,
}

#[derive(Deserialize)]
struct ChallengeResponse {
    challenge: String,
}

#[derive(Serialize)]
struct VerifyRequest {
    account: Address,
    challenge: String,
    /// Hex-encoded signature bytes.
    signature: String,
}

#[derive(Deserialize)]
struct VerifyResponse {
    session_token: SessionToken,
}

#[derive(Deserialize)]
struct ContactsResponse {
    contacts: Vec<Address>,
}

#[derive(Serialize)]
struct AddContactRequest {
    contact: Address,
}

// ---------------------------------------------------------------------------
// HttpDirectory
// ---------------------------------------------------------------------------

/// Directory-service client over JSON/HTTP.
pub struct HttpDirectory {
    base_url: String,
    http: reqwest::Client,
}

impl HttpDirectory {
    /// Builds a client from the given configuration.
    ///
    /// # Errors
    ///
    /// [`ChainbookError::ConfigError`] for an invalid configuration,
    /// [`ChainbookError::Transport`] if the HTTP client cannot be
    /// initialized.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        config.validate()?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(|e| ChainbookError::Transport {
                reason: format!("HTTP client init failed: {e}"),
            })?;

        Ok(Self {
            base_url: config.directory_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn contacts_url(&self, account: Address) -> String {
        self.url(&format!("/accounts/{account}/contacts"))
    }
}

/// Maps a reqwest failure to the transport error kind.
fn transport(context: &str, error: reqwest::Error) -> ChainbookError {
    ChainbookError::Transport {
        reason: format!("{context}: {error}"),
    }
}

/// Maps a non-success response status to the transport error kind.
fn status_error(context: &str, status: reqwest::StatusCode) -> ChainbookError {
    ChainbookError::Transport {
        reason: format!("{context}: directory answered {status}"),
    }
}

#[async_trait]
impl DirectoryApi for HttpDirectory {
    async fn issue_challenge(&self, account: Address) -> Result<String> {
        let response = self
            .http
            .post(self.url("/auth/challenge"))
            .json(&ChallengeRequest { account })
            .send()
            .await
            .map_err(|e| transport("challenge request", e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_error("challenge request", status));
        }

        let body: ChallengeResponse = response
            .json()
            .await
            .map_err(|e| transport("challenge response", e))?;
        tracing::debug!(%account, "challenge issued");
        Ok(body.challenge)
    }

    async fn verify_signature(
        &self,
        account: Address,
        challenge: &str,
        signature: &Signature,
    ) -> Result<VerifyOutcome> {
        let response = self
            .http
            .post(self.url("/auth/verify"))
            .json(&VerifyRequest {
                account,
                challenge: challenge.to_string(),
                signature: signature.to_string(),
            })
            .send()
            .await
            .map_err(|e| transport("verification request", e))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            tracing::info!(%account, "directory rejected the challenge signature");
            return Ok(VerifyOutcome::Rejected);
        }
        if !status.is_success() {
            return Err(status_error("verification request", status));
        }

        let body: VerifyResponse = response
            .json()
            .await
            .map_err(|e| transport("verification response", e))?;
        tracing::info!(%account, "directory issued a session");
        Ok(VerifyOutcome::Authorized(body.session_token))
    }

    async fn get_contacts(&self, account: Address, token: &SessionToken) -> Result<Vec<Address>> {
        let response = self
            .http
            .get(self.contacts_url(account))
            .bearer_auth(token.as_str())
            .send()
            .await
            .map_err(|e| transport("contact fetch", e))?;

        // Token-rejected is treated like any other failed fetch:
        // retryable, no automatic re-authentication.
        let status = response.status();
        if !status.is_success() {
            return Err(status_error("contact fetch", status));
        }

        let body: ContactsResponse = response
            .json()
            .await
            .map_err(|e| transport("contact response", e))?;
        Ok(body.contacts)
    }

    async fn add_contact(
        &self,
        account: Address,
        token: &SessionToken,
        contact: Address,
    ) -> Result<()> {
        let response = self
            .http
            .post(self.contacts_url(account))
            .bearer_auth(token.as_str())
            .json(&AddContactRequest { contact })
            .send()
            .await
            .map_err(|e| transport("add contact", e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_error("add contact", status));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(byte: u8) -> Address {
        Address::new([byte; 20])
    }

    #[test]
    fn builds_from_valid_config() {
        let config = ClientConfig::default();
        assert!(HttpDirectory::new(&config).is_ok());
    }

    #[test]
    fn rejects_invalid_config() {
        let config = ClientConfig {
            directory_url: String::new(),
            ..ClientConfig::default()
        };
        assert!(matches!(
            HttpDirectory::new(&config),
            Err(ChainbookError::ConfigError { .. })
        ));
    }

    #[test]
    fn base_url_trailing_slash_is_normalized() -> Result<()> {
        let config = ClientConfig {
            directory_url: "http://directory.example/".into(),
            ..ClientConfig::default()
        };
        let directory = HttpDirectory::new(&config)?;
        assert_eq!(
            directory.contacts_url(addr(0xAB)),
            format!("http://directory.example/accounts/{}/contacts", addr(0xAB))
        );
        Ok(())
    }

    #[test]
    fn challenge_request_wire_shape() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let json = serde_json::to_value(ChallengeRequest { account: addr(0xAB) })?;
        assert_eq!(json["account"], addr(0xAB).to_string());
        Ok(())
    }

    #[test]
    fn verify_request_carries_hex_signature() -> std::result::Result<(), Box<dyn std::error::Error>>
    {
        let request = VerifyRequest {
            account: addr(0xAB),
            challenge: "nonce-1".into(),
            signature: Signature::new(vec![0xDE, 0xAD]).to_string(),
        };
        let json = serde_json::to_value(&request)?;
        assert_eq!(json["signature"], "0xdead");
        assert_eq!(json["challenge"], "nonce-1");
        Ok(())
    }

    #[test]
    fn contacts_response_parses_addresses() -> std::result::Result<(), Box<dyn std::error::Error>>
    {
        let json = format!(r#"{{ "contacts": ["{}", "{}"] }}"#, addr(1), addr(2));
        let parsed: ContactsResponse = serde_json::from_str(&json)?;
        assert_eq!(parsed.contacts, vec![addr(1), addr(2)]);
        Ok(())
    }

    #[test]
    fn verify_response_parses_token() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let parsed: VerifyResponse = serde_json::from_str(r#"{ "session_token": "s-1" }"#)?;
        assert_eq!(parsed.session_token, SessionToken::new("s-1"));
        Ok(())
    }
}
