//! Orientation detection for one page: timeout, retry, and give-up.
//!
//! This is the only stage with network I/O. A single bad page never aborts
//! the file: when the oracle keeps failing, the page is reported with an
//! error and passed through unrotated.

use crate::error::{OracleError, PageError};
use crate::oracle::{OrientationOracle, Rotation};
use crate::pipeline::render::PageImage;
use crate::report::PageReport;
use crate::retry::{RetryDecision, RetryPolicy, RetryState};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

/// Ask the oracle for a page's orientation, retrying transient failures.
///
/// `timeout_secs` bounds each whole oracle call, endpoint walk included
/// (see [`crate::config::RotateConfig::oracle_timeout_secs`]).
///
/// Always returns a `PageReport`; callers check `report.error` to see
/// whether the page was classified.
pub async fn detect_page(
    oracle: &Arc<dyn OrientationOracle>,
    page: &PageImage,
    policy: RetryPolicy,
    timeout_secs: u64,
) -> PageReport {
    let start = Instant::now();
    let mut state = RetryState::new(policy);
    let call_timeout = Duration::from_secs(timeout_secs);

    loop {
        state.begin_attempt();

        let result = match timeout(call_timeout, oracle.detect(page)).await {
            Ok(r) => r,
            Err(_) => Err(OracleError::Timeout { secs: timeout_secs }),
        };

        let err = match result {
            Ok(orientation) => {
                let applied = orientation.correction();
                debug!(
                    "Page {}: {:?} after {} attempt(s) via {}",
                    page.page_num,
                    orientation,
                    state.attempts(),
                    oracle.name()
                );
                return PageReport {
                    page_num: page.page_num,
                    orientation: Some(orientation),
                    applied,
                    attempts: state.attempts(),
                    duration_ms: start.elapsed().as_millis() as u64,
                    error: None,
                };
            }
            Err(e) => e,
        };

        warn!(
            "Page {}: attempt {} failed: {}",
            page.page_num,
            state.attempts(),
            err
        );

        match state.on_failure(&err) {
            RetryDecision::RetryAfter(delay) => sleep(delay).await,
            RetryDecision::GiveUp | RetryDecision::Exhausted => {
                return PageReport {
                    page_num: page.page_num,
                    orientation: None,
                    applied: Rotation::Deg0,
                    attempts: state.attempts(),
                    duration_ms: start.elapsed().as_millis() as u64,
                    error: Some(PageError::DetectionFailed {
                        page: page.page_num,
                        attempts: state.attempts(),
                        detail: err.to_string(),
                    }),
                };
            }
        }
    }
}
