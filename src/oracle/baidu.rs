//! Baidu AI OCR as an orientation oracle.
//!
//! The OCR endpoints return a `direction` field alongside the recognised text
//! when called with `detect_direction=true`. Only that field is used.
//!
//! ## Authentication
//!
//! An OAuth access token is obtained from `/oauth/2.0/token` with the
//! client-credentials grant (`client_id` = API key, `client_secret` = secret
//! key). Tokens live for 30 days, so one is fetched lazily on the first call
//! and cached for the lifetime of the oracle. When an OCR call reports the
//! token as invalid or expired (codes 110/111) the cache is cleared and the
//! error is reported as transient; the retry fetches a fresh token.
//!
//! ## Endpoint fallback
//!
//! Accounts often have quota on only some of the OCR products. Each call walks
//! the configured endpoint list in order and stops at the first one that
//! reports a direction. Errors other than token and QPS errors move on to the
//! next endpoint.
//!
//! ## Direction mapping
//!
//! `direction` counts counter-clockwise quarter turns of the page content
//! (0 = upright, 1 = 90°, 2 = 180°, 3 = 270°; -1 = undefined). Rotating the
//! page clockwise by the same amount makes it upright, so the value maps
//! directly onto [`Rotation`].

use super::{Orientation, OrientationOracle, Rotation};
use crate::config::{Credentials, RotateConfig};
use crate::error::{AutoRotateError, OracleError};
use crate::pipeline::encode;
use crate::pipeline::render::PageImage;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Production API host.
pub const DEFAULT_API_BASE: &str = "https://aip.baidubce.com";

/// OCR products tried in order until one reports a direction.
pub const DEFAULT_ENDPOINTS: &[&str] = &[
    "general_basic",
    "general",
    "accurate_basic",
    "accurate",
    "webimage",
    "webimage_loc",
];

const TOKEN_PATH: &str = "/oauth/2.0/token";
const OCR_PATH: &str = "/rest/2.0/ocr/v1";

const CODE_TOKEN_INVALID: i64 = 110;
const CODE_TOKEN_EXPIRED: i64 = 111;
const CODE_QPS_LIMIT: i64 = 18;

/// Codes meaning "our side is struggling, try again later".
const SERVER_SIDE_CODES: &[i64] = &[1, 2, 4, 282000];

/// Orientation oracle backed by the Baidu OCR REST API.
pub struct BaiduOracle {
    client: reqwest::Client,
    credentials: Credentials,
    api_base: String,
    endpoints: Vec<String>,
    jpeg_quality: u8,
    timeout_secs: u64,
    token: Mutex<Option<String>>,
}

impl BaiduOracle {
    /// Build an oracle from the run configuration.
    ///
    /// Fails if either half of the key pair is missing.
    pub fn from_config(config: &RotateConfig) -> Result<Self, AutoRotateError> {
        let credentials = config.credentials.clone();
        if credentials.api_key.trim().is_empty() {
            return Err(AutoRotateError::MissingSetting {
                field: "api_key",
                flag: "api-key",
                env: "PDF_AUTOROTATE_API_KEY",
            });
        }
        if credentials.secret_key.trim().is_empty() {
            return Err(AutoRotateError::MissingSetting {
                field: "secret_key",
                flag: "secret-key",
                env: "PDF_AUTOROTATE_SECRET_KEY",
            });
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.api_timeout_secs))
            .build()
            .map_err(|e| AutoRotateError::Internal(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            credentials,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            endpoints: config.endpoints.clone(),
            jpeg_quality: config.jpeg_quality,
            timeout_secs: config.api_timeout_secs,
            token: Mutex::new(None),
        })
    }

    /// Return the cached access token, fetching one if needed.
    async fn access_token(&self) -> Result<String, OracleError> {
        let mut cached = self.token.lock().await;
        if let Some(ref token) = *cached {
            return Ok(token.clone());
        }
        let token = self.fetch_token().await?;
        *cached = Some(token.clone());
        Ok(token)
    }

    async fn invalidate_token(&self) {
        *self.token.lock().await = None;
    }

    async fn fetch_token(&self) -> Result<String, OracleError> {
        let url = format!("{}{}", self.api_base, TOKEN_PATH);
        info!("Requesting oracle access token");

        let response = self
            .client
            .post(&url)
            .query(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.credentials.api_key.as_str()),
                ("client_secret", self.credentials.secret_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| map_reqwest_error(e, self.timeout_secs))?;

        // A rejected key pair comes back as HTTP 401 with a JSON body, so the
        // body is parsed regardless of status.
        let status = response.status();
        let body: TokenResponse = response.json().await.map_err(|e| {
            if status.is_success() {
                OracleError::MalformedResponse {
                    detail: format!("token response: {e}"),
                }
            } else {
                OracleError::Status {
                    status: status.as_u16(),
                    detail: e.to_string(),
                }
            }
        })?;

        interpret_token(body)
    }

    async fn call_endpoint(
        &self,
        endpoint: &str,
        token: &str,
        image_b64: &str,
    ) -> Result<DetectResponse, OracleError> {
        let url = format!("{}{}/{}", self.api_base, OCR_PATH, endpoint);

        let response = self
            .client
            .post(&url)
            .query(&[("access_token", token)])
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&[("image", image_b64), ("detect_direction", "true")])
            .send()
            .await
            .map_err(|e| map_reqwest_error(e, self.timeout_secs))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(OracleError::Status {
                status: status.as_u16(),
                detail,
            });
        }

        response
            .json::<DetectResponse>()
            .await
            .map_err(|e| OracleError::MalformedResponse {
                detail: format!("{endpoint}: {e}"),
            })
    }
}

#[async_trait]
impl OrientationOracle for BaiduOracle {
    fn name(&self) -> &str {
        "baidu"
    }

    async fn detect(&self, page: &PageImage) -> Result<Orientation, OracleError> {
        let image_b64 = encode::encode_jpeg_base64(&page.image, self.jpeg_quality).map_err(|e| {
            OracleError::Encode {
                detail: e.to_string(),
            }
        })?;
        let token = self.access_token().await?;

        let mut last_code = None;
        let mut last_message = String::new();
        let mut all_server_side = true;

        for endpoint in &self.endpoints {
            let response = self.call_endpoint(endpoint, &token, &image_b64).await?;

            match interpret_detect(&response) {
                EndpointOutcome::Answered(orientation) => {
                    debug!(
                        "Page {}: {} answered {:?}",
                        page.page_num, endpoint, orientation
                    );
                    return Ok(orientation);
                }
                EndpointOutcome::Fatal(err) => {
                    if matches!(err, OracleError::TokenExpired { .. }) {
                        self.invalidate_token().await;
                    }
                    return Err(err);
                }
                EndpointOutcome::Unavailable { code, message } => {
                    warn!(
                        "Endpoint {} unavailable (code {:?}: {}), trying next",
                        endpoint, code, message
                    );
                    all_server_side &= code.is_some_and(|c| SERVER_SIDE_CODES.contains(&c));
                    last_code = code;
                    last_message = message;
                }
            }
        }

        Err(OracleError::NoEndpointAvailable {
            tried: self.endpoints.len(),
            last_code,
            last_message,
            transient: all_server_side,
        })
    }
}

// ── Wire types ───────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DetectResponse {
    direction: Option<i64>,
    error_code: Option<i64>,
    error_msg: Option<String>,
}

#[derive(Debug)]
enum EndpointOutcome {
    /// The endpoint reported a direction.
    Answered(Orientation),
    /// Stop walking the chain and surface this error.
    Fatal(OracleError),
    /// This endpoint cannot answer; try the next one.
    Unavailable { code: Option<i64>, message: String },
}

fn interpret_token(body: TokenResponse) -> Result<String, OracleError> {
    match body.access_token {
        Some(token) if !token.is_empty() => Ok(token),
        _ => Err(OracleError::TokenRequest {
            detail: format!(
                "{}: {}",
                body.error.as_deref().unwrap_or("no access_token"),
                body.error_description.as_deref().unwrap_or("")
            ),
        }),
    }
}

fn interpret_detect(body: &DetectResponse) -> EndpointOutcome {
    if let Some(direction) = body.direction {
        return EndpointOutcome::Answered(orientation_from_direction(direction));
    }

    let message = body.error_msg.clone().unwrap_or_default();
    match body.error_code {
        Some(code @ (CODE_TOKEN_INVALID | CODE_TOKEN_EXPIRED)) => {
            EndpointOutcome::Fatal(OracleError::TokenExpired { code })
        }
        Some(CODE_QPS_LIMIT) => EndpointOutcome::Fatal(OracleError::RateLimited { detail: message }),
        code => EndpointOutcome::Unavailable { code, message },
    }
}

/// Map a `direction` value onto the clockwise correction it calls for.
pub fn orientation_from_direction(direction: i64) -> Orientation {
    match direction {
        0 => Orientation::Detected(Rotation::Deg0),
        1 => Orientation::Detected(Rotation::Deg90),
        2 => Orientation::Detected(Rotation::Deg180),
        3 => Orientation::Detected(Rotation::Deg270),
        _ => Orientation::Undetermined,
    }
}

fn map_reqwest_error(e: reqwest::Error, timeout_secs: u64) -> OracleError {
    if e.is_timeout() {
        OracleError::Timeout { secs: timeout_secs }
    } else {
        OracleError::Http {
            detail: e.to_string(),
        }
    }
}
