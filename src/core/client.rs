//! Typed operations against the vendor API. Every operation performs one
//! HTTP call through the executor, logging in first if no token is held,
//! and reshapes the response body into display records.

use reqwest::{Method, Response, StatusCode};
use serde_json::{json, Value};

use crate::config::Settings;
use crate::core::auth::{
    extract_token, extract_user_id, Credentials, Redactor, LOGIN_PATTERNS,
};
use crate::core::executor::{Executor, RetryPolicy};
use crate::domain::model::{Geofence, HardwareInfo, LiveTrackingState, Position, Tracker};
use crate::utils::error::{ApiError, Result};

pub struct TrackerClient {
    executor: Executor,
    credentials: Credentials,
    user_id: Option<String>,
}

impl TrackerClient {
    pub fn new(settings: &Settings, credentials: Credentials) -> Result<Self> {
        let redactor = Redactor::default();
        redactor.add_secret(&credentials.password);

        let policy = RetryPolicy {
            max_retries: settings.max_retries,
            base_backoff_ms: settings.base_backoff_ms,
        };
        let executor = Executor::new(&settings.base_url, policy, redactor)?;

        Ok(Self {
            executor,
            credentials,
            user_id: None,
        })
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.executor.has_token()
    }

    /// Try each login shape in order until one yields a token. A 401/403 on
    /// the final shape means the credentials are bad; retry exhaustion keeps
    /// its own error so the rate-limit and network exit codes survive. Other
    /// failures just move on to the next shape.
    pub async fn login(&mut self) -> Result<()> {
        let last = LOGIN_PATTERNS.len() - 1;

        for (index, pattern) in LOGIN_PATTERNS.iter().enumerate() {
            tracing::debug!("Trying login pattern: {}", pattern.endpoint);
            let body = pattern.body(&self.credentials);

            let response = match self
                .executor
                .execute(Method::POST, pattern.endpoint, &[], Some(&body))
                .await
            {
                Ok(response) => response,
                Err(
                    err @ (ApiError::RateLimited
                    | ApiError::Network(_)
                    | ApiError::Server { .. }),
                ) => return Err(err),
                Err(err) => {
                    tracing::debug!(
                        "Login attempt on {} failed: {}",
                        pattern.endpoint,
                        self.executor.redactor().redact(&err.to_string())
                    );
                    continue;
                }
            };

            let status = response.status();
            if status == StatusCode::OK {
                let data: Value = response.json().await?;
                if let Some(token) = extract_token(&data) {
                    self.user_id = extract_user_id(&data);
                    self.executor.set_token(&token);
                    tracing::debug!("Login successful via {}", pattern.endpoint);
                    return Ok(());
                }
                tracing::debug!("200 from {} but no token in response", pattern.endpoint);
            } else if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN)
                && index == last
            {
                let message = response
                    .json::<Value>()
                    .await
                    .ok()
                    .and_then(|data| {
                        data.get("message")
                            .and_then(Value::as_str)
                            .map(str::to_string)
                    })
                    .unwrap_or_else(|| "Invalid credentials".to_string());
                return Err(ApiError::Auth(message));
            } else {
                tracing::debug!("Login failed with status {} on {}", status, pattern.endpoint);
            }
        }

        Err(ApiError::Auth("all login patterns failed".into()))
    }

    async fn ensure_authenticated(&mut self) -> Result<()> {
        if !self.executor.has_token() {
            self.login().await?;
        }
        Ok(())
    }

    pub async fn trackers(&mut self) -> Result<Vec<Tracker>> {
        self.ensure_authenticated().await?;
        let user_id = self
            .user_id
            .clone()
            .ok_or_else(|| ApiError::Auth("login response carried no user id".into()))?;

        let response = self
            .executor
            .execute(Method::GET, &format!("/user/{user_id}/trackers"), &[], None)
            .await?;
        let data = read_json(response).await?;

        Ok(data
            .as_array()
            .map(|items| items.iter().map(Tracker::from_api).collect())
            .unwrap_or_default())
    }

    pub async fn hardware_info(&mut self, tracker_id: &str) -> Result<HardwareInfo> {
        self.ensure_authenticated().await?;
        let response = self
            .executor
            .execute(Method::GET, &format!("/tracker/{tracker_id}"), &[], None)
            .await?;
        let data = read_json(response).await?;
        Ok(HardwareInfo::from_api(tracker_id, &data))
    }

    pub async fn latest_position(&mut self, tracker_id: &str) -> Result<Position> {
        self.ensure_authenticated().await?;
        let response = self
            .executor
            .execute(
                Method::GET,
                &format!("/tracker/{tracker_id}/positions/latest"),
                &[],
                None,
            )
            .await?;
        let data = read_json(response).await?;
        Ok(Position::from_api(&data))
    }

    /// Fetch position history. `max_points` is passed to the server as a
    /// segment hint, and enforced client-side with uniform-stride
    /// downsampling when the server returns more points anyway.
    pub async fn position_history(
        &mut self,
        tracker_id: &str,
        from_time: &str,
        to_time: &str,
        max_points: Option<usize>,
    ) -> Result<Vec<Position>> {
        self.ensure_authenticated().await?;

        let mut query: Vec<(&str, String)> = vec![
            ("time_from", from_time.to_string()),
            ("time_to", to_time.to_string()),
        ];
        if let Some(max) = max_points {
            query.push(("format", "json_segments".to_string()));
            query.push(("segments", max.to_string()));
        }

        let response = self
            .executor
            .execute(
                Method::GET,
                &format!("/tracker/{tracker_id}/positions"),
                &query,
                None,
            )
            .await?;
        let data = read_json(response).await?;

        let mut positions = parse_positions(&data);
        if let Some(max) = max_points {
            positions = downsample(positions, max);
        }
        Ok(positions)
    }

    pub async fn geofences(&mut self, tracker_id: &str) -> Result<Vec<Geofence>> {
        self.ensure_authenticated().await?;
        let response = self
            .executor
            .execute(
                Method::GET,
                &format!("/tracker/{tracker_id}/geofences"),
                &[],
                None,
            )
            .await?;
        let data = read_json(response).await?;

        Ok(data
            .as_array()
            .map(|items| items.iter().map(Geofence::from_api).collect())
            .unwrap_or_default())
    }

    pub async fn set_live_tracking(
        &mut self,
        tracker_id: &str,
        enabled: bool,
    ) -> Result<LiveTrackingState> {
        self.ensure_authenticated().await?;
        let body = json!({ "live_tracking": enabled });
        let response = self
            .executor
            .execute(
                Method::PUT,
                &format!("/tracker/{tracker_id}/live_tracking"),
                &[],
                Some(&body),
            )
            .await?;
        read_json(response).await?;
        Ok(LiveTrackingState::new(tracker_id, enabled))
    }

    /// No read endpoint for live mode is known, so this reports an explicit
    /// unknown state without a network call.
    pub fn live_tracking_state(&self, tracker_id: &str) -> LiveTrackingState {
        LiveTrackingState::unknown(tracker_id)
    }
}

/// Map a non-200 data response to an API error, otherwise decode JSON.
async fn read_json(response: Response) -> Result<Value> {
    let status = response.status();
    if status != StatusCode::OK {
        let message = response
            .json::<Value>()
            .await
            .ok()
            .and_then(|data| {
                data.get("message")
                    .and_then(Value::as_str)
                    .map(str::to_string)
            })
            .unwrap_or_default();
        return Err(ApiError::Api {
            status: status.as_u16(),
            message,
        });
    }
    Ok(response.json().await?)
}

/// History responses come back as a bare array, `{"positions": [...]}`, or
/// a single object depending on the endpoint variant hit.
fn parse_positions(data: &Value) -> Vec<Position> {
    match data {
        Value::Array(items) => items.iter().map(Position::from_api).collect(),
        Value::Object(map) => match map.get("positions").and_then(Value::as_array) {
            Some(items) => items.iter().map(Position::from_api).collect(),
            None => vec![Position::from_api(data)],
        },
        _ => Vec::new(),
    }
}

/// Keep every `len / max_points`-th point, capped at `max_points`. When the
/// stride rounds down to 1 the head of the list is kept so the cap still
/// holds.
pub fn downsample<T>(mut points: Vec<T>, max_points: usize) -> Vec<T> {
    if max_points == 0 || points.len() <= max_points {
        return points;
    }
    let stride = points.len() / max_points;
    if stride > 1 {
        points.into_iter().step_by(stride).take(max_points).collect()
    } else {
        points.truncate(max_points);
        points
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn downsample_takes_every_nth_point() {
        let points: Vec<usize> = (0..250).collect();
        let sampled = downsample(points, 100);

        assert!(sampled.len() <= 100);
        // stride = 250 / 100 = 2
        assert_eq!(sampled[0], 0);
        assert_eq!(sampled[1], 2);
        assert_eq!(sampled[99], 198);
        for window in sampled.windows(2) {
            assert_eq!(window[1] - window[0], 2);
        }
    }

    #[test]
    fn downsample_caps_when_stride_rounds_to_one() {
        let points: Vec<usize> = (0..150).collect();
        let sampled = downsample(points, 100);
        assert_eq!(sampled.len(), 100);
        assert_eq!(sampled[99], 99);
    }

    #[test]
    fn downsample_leaves_small_inputs_alone() {
        let points: Vec<usize> = (0..50).collect();
        assert_eq!(downsample(points.clone(), 100), points);
        assert_eq!(downsample(points.clone(), 0), points);
    }

    #[test]
    fn parse_positions_handles_all_observed_shapes() {
        let bare = json!([{"lat": 1.0, "lng": 2.0}, {"lat": 3.0, "lng": 4.0}]);
        assert_eq!(parse_positions(&bare).len(), 2);

        let wrapped = json!({"positions": [{"lat": 1.0, "lng": 2.0}]});
        assert_eq!(parse_positions(&wrapped).len(), 1);

        let single = json!({"lat": 1.0, "lng": 2.0});
        let parsed = parse_positions(&single);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].lat, Some(1.0));

        assert!(parse_positions(&json!(null)).is_empty());
    }
}
