//! Authenticated HTTP client — login, token cache, transparent re-login.
//!
//! Request bodies are serialized immediately before each send. The second
//! factor body embeds the [`OneTimeCode`] itself, so every login attempt,
//! including the one triggered by a refused token, carries a freshly
//! generated code.

use std::sync::{Mutex, MutexGuard, PoisonError};

use rentbridge_app::ports::Credentials;
use rentbridge_domain::credential::OneTimeCode;
use rentbridge_domain::error::AuthenticationError;
use reqwest::StatusCode;
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;
use serde::de::DeserializeOwned;
use url::Url;

use crate::config::SmartRentConfig;
use crate::error::SmartRentError;
use crate::wire::{Body, SessionRequest, SessionResponse, TfaRequest};

const SESSIONS_PATH: &str = "/api/v1/sessions";
const TFA_PATH: &str = "/api/v1/sessions/tfa";

pub struct AuthenticatedClient {
    http: reqwest::Client,
    base: Url,
    credentials: Credentials,
    code: OneTimeCode,
    token: Mutex<Option<String>>,
}

impl AuthenticatedClient {
    /// A client that has not logged in yet.
    ///
    /// # Errors
    ///
    /// Returns [`SmartRentError::Url`] for a malformed base URL, or
    /// [`SmartRentError::Http`] if the HTTP client cannot be built.
    pub fn new(
        config: &SmartRentConfig,
        credentials: Credentials,
        code: OneTimeCode,
    ) -> Result<Self, SmartRentError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .user_agent(concat!("rentbridge/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            base: config.api_base()?,
            credentials,
            code,
            token: Mutex::new(None),
        })
    }

    /// Run the login flow and cache the resulting access token.
    ///
    /// # Errors
    ///
    /// [`AuthenticationError::InvalidCredentials`] if the password step is
    /// refused, [`AuthenticationError::InvalidCode`] if the second factor is,
    /// or a transport failure.
    #[tracing::instrument(skip(self), fields(email = %self.credentials.email))]
    pub async fn login(&self) -> Result<String, AuthenticationError> {
        let session: SessionResponse = self
            .post(
                SESSIONS_PATH,
                &SessionRequest {
                    email: &self.credentials.email,
                    password: &self.credentials.password,
                },
            )
            .await
            .map_err(|err| err.into_authentication(AuthenticationError::InvalidCredentials))?;

        let session = match session.tfa_api_token {
            Some(tfa_api_token) => {
                tracing::debug!("second factor requested");
                self.post(
                    TFA_PATH,
                    &TfaRequest {
                        tfa_api_token: &tfa_api_token,
                        token: &self.code,
                    },
                )
                .await
                .map_err(|err| err.into_authentication(AuthenticationError::InvalidCode))?
            }
            None => session,
        };

        let token = session
            .access_token
            .ok_or_else(|| SmartRentError::MissingToken.into_domain())?;
        *self.lock_token() = Some(token.clone());
        tracing::info!("logged in");
        Ok(token)
    }

    /// The cached access token, logging in first if there is none.
    ///
    /// # Errors
    ///
    /// Returns [`SmartRentError::Reauthentication`] if the login fails.
    pub async fn access_token(&self) -> Result<String, SmartRentError> {
        let cached = self.lock_token().clone();
        match cached {
            Some(token) => Ok(token),
            None => self.refresh().await,
        }
    }

    /// Drop the cached token and log in again.
    ///
    /// # Errors
    ///
    /// Returns [`SmartRentError::Reauthentication`] if the login fails.
    pub async fn refresh(&self) -> Result<String, SmartRentError> {
        self.lock_token().take();
        self.login().await.map_err(SmartRentError::Reauthentication)
    }

    /// `GET path` with the access token, logging in again once if the token
    /// is refused.
    ///
    /// # Errors
    ///
    /// Returns the HTTP, status or decoding failure of the final attempt.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, SmartRentError> {
        let url = self.base.join(path)?;
        let token = self.access_token().await?;
        match self.get_with(&url, &token).await {
            Err(SmartRentError::Unauthorized) => {
                tracing::info!(path, "access token refused, logging in again");
                let token = self.refresh().await?;
                self.get_with(&url, &token).await
            }
            other => other,
        }
    }

    async fn get_with<T: DeserializeOwned>(&self, url: &Url, token: &str) -> Result<T, SmartRentError> {
        let response = self.http.get(url.clone()).bearer_auth(token).send().await?;
        decode(response).await
    }

    async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, SmartRentError>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let url = self.base.join(path)?;
        let body = serde_json::to_vec(body)?;
        let response = self
            .http
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;
        decode(response).await
    }

    fn lock_token(&self) -> MutexGuard<'_, Option<String>> {
        self.token.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, SmartRentError> {
    let status = response.status();
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(SmartRentError::Unauthorized);
    }
    if !status.is_success() {
        return Err(SmartRentError::Status {
            status: status.as_u16(),
        });
    }
    let bytes = response.bytes().await?;
    let body: Body<T> = serde_json::from_slice(&bytes)?;
    Ok(body.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rentbridge_domain::credential::CodeGenerator;
    use std::sync::Arc;

    fn code() -> OneTimeCode {
        OneTimeCode::new(Arc::new(CodeGenerator::from_base32("JBSWY3DPEHPK3PXP").unwrap()))
    }

    #[test]
    fn should_render_code_into_tfa_body() {
        let code = code();
        let body = serde_json::to_value(TfaRequest {
            tfa_api_token: "challenge",
            token: &code,
        })
        .unwrap();

        assert_eq!(body["tfa_api_token"], "challenge");
        let rendered = body["token"].as_str().unwrap();
        assert_eq!(rendered.len(), 6);
        assert!(rendered.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn should_build_client_from_default_config() {
        let client = AuthenticatedClient::new(
            &SmartRentConfig::default(),
            Credentials::new("me@example.com", "hunter2"),
            code(),
        )
        .unwrap();
        assert_eq!(
            client.base.join(SESSIONS_PATH).unwrap().as_str(),
            "https://control.smartrent.com/api/v1/sessions"
        );
        assert!(client.lock_token().is_none());
    }

    #[test]
    fn should_reject_malformed_base_url() {
        let config = SmartRentConfig {
            api_url: "::".to_string(),
            ..SmartRentConfig::default()
        };
        let result = AuthenticatedClient::new(&config, Credentials::new("a", "b"), code());
        assert!(matches!(result, Err(SmartRentError::Url(_))));
    }
}
