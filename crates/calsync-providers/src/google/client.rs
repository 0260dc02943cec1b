//! Google Calendar API client.
//!
//! Thin HTTP client for the `events.list` and `events.insert` endpoints of
//! the Calendar API v3. Tokens are passed per call, so one client serves
//! every session token over its lifetime.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{ProviderError, ProviderResult};
use crate::provider::{BoxFuture, CalendarService, EventQuery};
use crate::remote_event::{
    NewEvent, RemoteConferenceData, RemoteEntryPoint, RemoteEvent, RemoteEventTime,
};

use super::config::GoogleConfig;

/// Base URL for Google Calendar API v3.
const CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3";

/// Conference solution requested for created events.
const HANGOUTS_MEET: &str = "hangoutsMeet";

/// Google Calendar API client.
#[derive(Debug, Clone)]
pub struct GoogleCalendarClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl GoogleCalendarClient {
    pub fn new(config: &GoogleConfig) -> ProviderResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| {
                ProviderError::configuration("failed to create HTTP client").with_source(e)
            })?;

        Ok(Self {
            http_client,
            base_url: CALENDAR_API_BASE.to_string(),
        })
    }

    /// Points the client at another API root.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn events_url(&self, calendar_id: &str) -> String {
        format!(
            "{}/calendars/{}/events",
            self.base_url,
            urlencoding::encode(calendar_id)
        )
    }

    /// Lists every event matching `query`, following pagination.
    pub async fn fetch_events(
        &self,
        access_token: &str,
        calendar_id: &str,
        query: &EventQuery,
    ) -> ProviderResult<Vec<RemoteEvent>> {
        let mut all_events = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let page = self
                .list_events_page(access_token, calendar_id, query, page_token.as_deref())
                .await?;

            all_events.extend(page.items.into_iter().filter_map(convert_event));

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        debug!(
            "fetched {} events from calendar {}",
            all_events.len(),
            calendar_id
        );
        Ok(all_events)
    }

    async fn list_events_page(
        &self,
        access_token: &str,
        calendar_id: &str,
        query: &EventQuery,
        page_token: Option<&str>,
    ) -> ProviderResult<EventListResponse> {
        let mut request = self
            .http_client
            .get(self.events_url(calendar_id))
            .bearer_auth(access_token)
            .query(&[
                ("timeMin", query.window.start.to_rfc3339()),
                ("timeMax", query.window.end.to_rfc3339()),
                ("singleEvents", query.single_events.to_string()),
                ("showDeleted", query.show_deleted.to_string()),
            ]);

        // orderBy=startTime is only accepted together with singleEvents
        if query.single_events {
            request = request.query(&[("orderBy", query.order_by.as_str())]);
        }

        if let Some(token) = page_token {
            request = request.query(&[("pageToken", token)]);
        }

        let response = request.send().await.map_err(map_send_error)?;
        let body = read_success_body(response).await?;

        serde_json::from_str(&body).map_err(|e| {
            ProviderError::invalid_response(format!("failed to parse response: {}", e))
        })
    }

    /// Inserts an event, asking Google to attach a Meet conference when the
    /// event carries a conference request id.
    pub async fn create_event(
        &self,
        access_token: &str,
        calendar_id: &str,
        event: &NewEvent,
    ) -> ProviderResult<RemoteEvent> {
        let body = ApiNewEvent::from(event);

        let response = self
            .http_client
            .post(self.events_url(calendar_id))
            .bearer_auth(access_token)
            .query(&[("conferenceDataVersion", "1")])
            .json(&body)
            .send()
            .await
            .map_err(map_send_error)?;
        let body = read_success_body(response).await?;

        let created: ApiEvent = serde_json::from_str(&body).map_err(|e| {
            ProviderError::invalid_response(format!("failed to parse created event: {}", e))
        })?;

        convert_event(created)
            .ok_or_else(|| ProviderError::invalid_response("created event is missing fields"))
    }
}

impl CalendarService for GoogleCalendarClient {
    fn name(&self) -> &str {
        "google"
    }

    fn list_events<'a>(
        &'a self,
        access_token: &'a str,
        calendar_id: &'a str,
        query: &'a EventQuery,
    ) -> BoxFuture<'a, ProviderResult<Vec<RemoteEvent>>> {
        Box::pin(async move {
            self.fetch_events(access_token, calendar_id, query)
                .await
                .map_err(|e| e.with_provider("google"))
        })
    }

    fn insert_event<'a>(
        &'a self,
        access_token: &'a str,
        calendar_id: &'a str,
        event: &'a NewEvent,
    ) -> BoxFuture<'a, ProviderResult<RemoteEvent>> {
        Box::pin(async move {
            self.create_event(access_token, calendar_id, event)
                .await
                .map_err(|e| e.with_provider("google"))
        })
    }
}

fn map_send_error(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::network("request timeout")
    } else if e.is_connect() {
        ProviderError::network(format!("connection failed: {}", e))
    } else {
        ProviderError::network(format!("request failed: {}", e))
    }
}

/// Maps error statuses to provider errors and returns the body otherwise.
async fn read_success_body(response: reqwest::Response) -> ProviderResult<String> {
    let status = response.status();

    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get("Retry-After")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok());
        return Err(ProviderError::rate_limited(format!(
            "rate limit exceeded{}",
            retry_after
                .map(|s| format!(", retry after {} seconds", s))
                .unwrap_or_default()
        )));
    }

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(status_error(status.as_u16(), &body));
    }

    response
        .text()
        .await
        .map_err(|e| ProviderError::network(format!("failed to read response: {}", e)))
}

fn status_error(status: u16, body: &str) -> ProviderError {
    match status {
        401 => ProviderError::authentication("access token expired or invalid"),
        403 => ProviderError::authorization("access denied to calendar"),
        404 => ProviderError::not_found("calendar not found"),
        400 => ProviderError::bad_request(format!("bad request: {}", body)),
        500..=599 => ProviderError::server(format!("API error ({}): {}", status, body)),
        _ => ProviderError::invalid_response(format!("unexpected status {}: {}", status, body)),
    }
}

/// Converts an API event, dropping cancelled events and unparseable times.
fn convert_event(event: ApiEvent) -> Option<RemoteEvent> {
    if event.status.as_deref() == Some("cancelled") {
        return None;
    }

    let id = event.id?;
    let start = parse_event_time(&event.start, &id, "start")?;
    let end = parse_event_time(&event.end, &id, "end")?;

    let conference_data = event.conference_data.map(|cd| RemoteConferenceData {
        solution_name: cd.conference_solution.map(|cs| cs.name),
        entry_points: cd
            .entry_points
            .unwrap_or_default()
            .into_iter()
            .map(|ep| RemoteEntryPoint {
                entry_point_type: ep.entry_point_type,
                uri: ep.uri,
                label: ep.label,
            })
            .collect(),
    });

    Some(RemoteEvent {
        id,
        summary: event.summary,
        start,
        end,
        status: event.status,
        html_link: event.html_link,
        conference_data,
    })
}

fn parse_event_time(time: &ApiEventTime, id: &str, which: &str) -> Option<RemoteEventTime> {
    match (&time.date_time, &time.date) {
        (Some(dt), _) => DateTime::parse_from_rfc3339(dt)
            .map(|parsed| RemoteEventTime::DateTime(parsed.with_timezone(&Utc)))
            .map_err(|e| warn!("event {}: failed to parse {} time: {}", id, which, e))
            .ok(),
        (None, Some(date)) => NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .map(RemoteEventTime::Date)
            .map_err(|e| warn!("event {}: failed to parse {} date: {}", id, which, e))
            .ok(),
        (None, None) => {
            warn!("event {} has no {} time", id, which);
            None
        }
    }
}

/// Response from the events.list endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventListResponse {
    #[serde(default)]
    items: Vec<ApiEvent>,
    next_page_token: Option<String>,
}

/// A single event from the Google Calendar API.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiEvent {
    id: Option<String>,
    summary: Option<String>,
    #[serde(default)]
    start: ApiEventTime,
    #[serde(default)]
    end: ApiEventTime,
    html_link: Option<String>,
    status: Option<String>,
    conference_data: Option<ApiConferenceData>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiEventTime {
    date: Option<String>,
    date_time: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiConferenceData {
    conference_solution: Option<ApiConferenceSolution>,
    entry_points: Option<Vec<ApiEntryPoint>>,
}

#[derive(Debug, Deserialize)]
struct ApiConferenceSolution {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiEntryPoint {
    entry_point_type: String,
    uri: Option<String>,
    label: Option<String>,
}

/// Body of an events.insert request.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiNewEvent {
    summary: String,
    start: ApiNewEventTime,
    end: ApiNewEventTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    conference_data: Option<ApiConferenceRequest>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiNewEventTime {
    date_time: String,
    time_zone: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiConferenceRequest {
    create_request: ApiCreateConferenceRequest,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiCreateConferenceRequest {
    request_id: String,
    conference_solution_key: ApiConferenceSolutionKey,
}

#[derive(Debug, Serialize)]
struct ApiConferenceSolutionKey {
    #[serde(rename = "type")]
    kind: String,
}

impl From<&NewEvent> for ApiNewEvent {
    fn from(event: &NewEvent) -> Self {
        let time = |dt: DateTime<Utc>| ApiNewEventTime {
            date_time: dt.to_rfc3339(),
            time_zone: event.time_zone.clone(),
        };

        Self {
            summary: event.summary.clone(),
            start: time(event.start),
            end: time(event.end),
            conference_data: event.conference_request_id.as_ref().map(|request_id| {
                ApiConferenceRequest {
                    create_request: ApiCreateConferenceRequest {
                        request_id: request_id.clone(),
                        conference_solution_key: ApiConferenceSolutionKey {
                            kind: HANGOUTS_MEET.to_string(),
                        },
                    },
                }
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ProviderErrorCode;
    use chrono::TimeZone;

    #[test]
    fn parse_event_list_response() {
        let json = r#"{
            "items": [
                {
                    "id": "event1",
                    "summary": "Test Meeting",
                    "start": {"dateTime": "2024-03-15T10:00:00Z"},
                    "end": {"dateTime": "2024-03-15T11:00:00Z"},
                    "status": "confirmed"
                }
            ],
            "nextPageToken": "page2"
        }"#;

        let response: EventListResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.items.len(), 1);
        assert_eq!(response.next_page_token.as_deref(), Some("page2"));

        let event = convert_event(response.items.into_iter().next().unwrap()).unwrap();
        assert_eq!(event.summary.as_deref(), Some("Test Meeting"));
        assert_eq!(
            event.start,
            RemoteEventTime::DateTime(Utc.with_ymd_and_hms(2024, 3, 15, 10, 0, 0).unwrap())
        );
    }

    #[test]
    fn offset_times_are_normalized_to_utc() {
        let json = r#"{
            "id": "event1",
            "start": {"dateTime": "2024-03-15T10:00:00+01:00", "timeZone": "Europe/Paris"},
            "end": {"dateTime": "2024-03-15T11:00:00+01:00"}
        }"#;
        let event = convert_event(serde_json::from_str(json).unwrap()).unwrap();
        assert_eq!(
            event.start.to_utc(),
            Utc.with_ymd_and_hms(2024, 3, 15, 9, 0, 0).unwrap()
        );
    }

    #[test]
    fn parse_all_day_event() {
        let json = r#"{
            "id": "event1",
            "summary": "All Day Event",
            "start": {"date": "2024-03-15"},
            "end": {"date": "2024-03-16"}
        }"#;

        let event = convert_event(serde_json::from_str(json).unwrap()).unwrap();
        assert!(event.start.is_all_day());
        assert_eq!(
            event.end,
            RemoteEventTime::Date(NaiveDate::from_ymd_opt(2024, 3, 16).unwrap())
        );
    }

    #[test]
    fn parse_event_with_conference() {
        let json = r#"{
            "id": "event1",
            "summary": "Standup",
            "start": {"dateTime": "2024-03-15T10:00:00Z"},
            "end": {"dateTime": "2024-03-15T11:00:00Z"},
            "conferenceData": {
                "conferenceSolution": {"name": "Google Meet"},
                "entryPoints": [
                    {"entryPointType": "video", "uri": "https://meet.google.com/abc-defg-hij"}
                ]
            }
        }"#;

        let event = convert_event(serde_json::from_str(json).unwrap()).unwrap();
        assert_eq!(
            event.conference_link(),
            Some("https://meet.google.com/abc-defg-hij")
        );
        assert_eq!(
            event.to_calendar_event().title,
            "Standup (https://meet.google.com/abc-defg-hij)"
        );
    }

    #[test]
    fn cancelled_and_incomplete_events_are_skipped() {
        let cancelled = r#"{
            "id": "event1",
            "status": "cancelled",
            "start": {"dateTime": "2024-03-15T10:00:00Z"},
            "end": {"dateTime": "2024-03-15T11:00:00Z"}
        }"#;
        assert!(convert_event(serde_json::from_str(cancelled).unwrap()).is_none());

        let no_id = r#"{
            "start": {"dateTime": "2024-03-15T10:00:00Z"},
            "end": {"dateTime": "2024-03-15T11:00:00Z"}
        }"#;
        assert!(convert_event(serde_json::from_str(no_id).unwrap()).is_none());

        let no_end = r#"{"id": "event1", "start": {"dateTime": "2024-03-15T10:00:00Z"}}"#;
        assert!(convert_event(serde_json::from_str(no_end).unwrap()).is_none());

        let bad_time = r#"{
            "id": "event1",
            "start": {"dateTime": "yesterday"},
            "end": {"dateTime": "2024-03-15T11:00:00Z"}
        }"#;
        assert!(convert_event(serde_json::from_str(bad_time).unwrap()).is_none());
    }

    #[test]
    fn insert_body_requests_meet_conference() {
        let event = NewEvent::new(
            "Planning",
            Utc.with_ymd_and_hms(2024, 3, 15, 10, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 15, 11, 0, 0).unwrap(),
        )
        .with_conference_request("meet-1234");

        let body = serde_json::to_value(ApiNewEvent::from(&event)).unwrap();
        assert_eq!(body["summary"], "Planning");
        assert_eq!(body["start"]["dateTime"], "2024-03-15T10:00:00+00:00");
        assert_eq!(body["start"]["timeZone"], "UTC");
        assert_eq!(body["end"]["dateTime"], "2024-03-15T11:00:00+00:00");
        assert_eq!(
            body["conferenceData"]["createRequest"]["requestId"],
            "meet-1234"
        );
        assert_eq!(
            body["conferenceData"]["createRequest"]["conferenceSolutionKey"]["type"],
            "hangoutsMeet"
        );
    }

    #[test]
    fn insert_body_without_conference_request() {
        let event = NewEvent::new(
            "Focus",
            Utc.with_ymd_and_hms(2024, 3, 15, 10, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 15, 11, 0, 0).unwrap(),
        );
        let body = serde_json::to_value(ApiNewEvent::from(&event)).unwrap();
        assert!(body.get("conferenceData").is_none());
    }

    #[test]
    fn status_codes_map_to_error_codes() {
        assert_eq!(
            status_error(401, "").code(),
            ProviderErrorCode::AuthenticationFailed
        );
        assert_eq!(
            status_error(403, "").code(),
            ProviderErrorCode::AuthorizationFailed
        );
        assert_eq!(status_error(404, "").code(), ProviderErrorCode::NotFound);
        assert_eq!(status_error(400, "").code(), ProviderErrorCode::BadRequest);
        assert_eq!(status_error(503, "").code(), ProviderErrorCode::ServerError);
        assert!(status_error(503, "").is_retryable());
        assert_eq!(
            status_error(302, "").code(),
            ProviderErrorCode::InvalidResponse
        );
    }

    #[test]
    fn events_url_encodes_calendar_id() {
        let config = GoogleConfig::new(crate::OAuthCredentials::new(
            "test.apps.googleusercontent.com",
            "secret",
        ));
        let client = GoogleCalendarClient::new(&config).unwrap();
        assert_eq!(
            client.events_url("team@example.com"),
            "https://www.googleapis.com/calendar/v3/calendars/team%40example.com/events"
        );
    }
}
