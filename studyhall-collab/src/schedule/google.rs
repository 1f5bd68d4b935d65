use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::{
    CalendarInfo, EventPayload, EventTime, GoogleApi, GoogleError, TaskListInfo, TaskPayload,
    TimeWindow,
};

const CALENDAR_LIST_URL: &str = "https://www.googleapis.com/calendar/v3/users/me/calendarList";
const TASK_LISTS_URL: &str = "https://tasks.googleapis.com/tasks/v1/users/@me/lists";

/// How many tasks a single list fetch returns at most
const TASKS_PAGE_LIMIT: &str = "100";

/// Talks to the Google Calendar v3 and Tasks v1 REST APIs with a user's
/// access token. Holds no state besides the HTTP client.
pub struct GoogleRestApi {
    http: reqwest::Client,
}

impl GoogleRestApi {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }

    async fn get_json<T>(
        &self,
        url: &str,
        access_token: &str,
        query: &[(&str, String)],
    ) -> Result<T, GoogleError>
    where
        T: DeserializeOwned,
    {
        let response = self
            .http
            .get(url)
            .bearer_auth(access_token)
            .query(query)
            .send()
            .await
            .map_err(|e| GoogleError::Http(e.to_string()))?;

        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GoogleError::Status(status.as_u16(), body));
        }

        response
            .json()
            .await
            .map_err(|e| GoogleError::Decode(e.to_string()))
    }
}

impl Default for GoogleRestApi {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GoogleApi for GoogleRestApi {
    async fn calendars(&self, access_token: &str) -> Result<Vec<CalendarInfo>, GoogleError> {
        let page: Paged<WireCalendar> = self
            .get_json(CALENDAR_LIST_URL, access_token, &[])
            .await?;

        Ok(page.items.into_iter().map(Into::into).collect())
    }

    async fn events(
        &self,
        access_token: &str,
        calendar_id: &str,
        window: &TimeWindow,
    ) -> Result<Vec<EventPayload>, GoogleError> {
        let url = format!(
            "https://www.googleapis.com/calendar/v3/calendars/{}/events",
            encode_path_segment(calendar_id)
        );

        let mut query = vec![
            ("timeMin", window.min_or_now().to_rfc3339()),
            // Recurring events come back expanded so sorting by start works
            ("singleEvents", "true".to_string()),
            ("orderBy", "startTime".to_string()),
        ];

        if let Some(time_max) = window.time_max {
            query.push(("timeMax", time_max.to_rfc3339()));
        }

        let page: Paged<WireEvent> = self.get_json(&url, access_token, &query).await?;

        Ok(page.items.into_iter().filter_map(WireEvent::into_payload).collect())
    }

    async fn task_lists(&self, access_token: &str) -> Result<Vec<TaskListInfo>, GoogleError> {
        let page: Paged<WireTaskList> = self.get_json(TASK_LISTS_URL, access_token, &[]).await?;

        Ok(page.items.into_iter().map(Into::into).collect())
    }

    async fn tasks(
        &self,
        access_token: &str,
        list_id: &str,
        window: &TimeWindow,
    ) -> Result<Vec<TaskPayload>, GoogleError> {
        let url = format!(
            "https://tasks.googleapis.com/tasks/v1/lists/{}/tasks",
            encode_path_segment(list_id)
        );

        let mut query = vec![
            ("showCompleted", "false".to_string()),
            ("maxResults", TASKS_PAGE_LIMIT.to_string()),
        ];

        if let Some(time_min) = window.time_min {
            query.push(("dueMin", time_min.to_rfc3339()));
        }

        if let Some(time_max) = window.time_max {
            query.push(("dueMax", time_max.to_rfc3339()));
        }

        let page: Paged<WireTask> = self.get_json(&url, access_token, &query).await?;

        Ok(page.items.into_iter().map(Into::into).collect())
    }
}

/// Calendar ids contain characters like `@` and `#`
fn encode_path_segment(segment: &str) -> String {
    url::form_urlencoded::byte_serialize(segment.as_bytes()).collect()
}

#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct Paged<T> {
    #[serde(default)]
    items: Vec<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireCalendar {
    id: String,
    summary: String,
    background_color: Option<String>,
}

impl From<WireCalendar> for CalendarInfo {
    fn from(wire: WireCalendar) -> Self {
        CalendarInfo {
            id: wire.id,
            title: wire.summary,
            color: wire.background_color,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireEvent {
    id: String,
    summary: Option<String>,
    description: Option<String>,
    location: Option<String>,
    html_link: Option<String>,
    start: Option<WireEventTime>,
    end: Option<WireEventTime>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireEventTime {
    date_time: Option<DateTime<Utc>>,
    date: Option<NaiveDate>,
}

impl WireEventTime {
    fn into_event_time(self) -> Option<EventTime> {
        self.date_time
            .map(EventTime::Timed)
            .or(self.date.map(EventTime::AllDay))
    }
}

impl WireEvent {
    /// Events without a start (cancelled placeholders) are dropped
    fn into_payload(self) -> Option<EventPayload> {
        let start = self.start.and_then(WireEventTime::into_event_time)?;

        Some(EventPayload {
            id: self.id,
            title: self.summary.unwrap_or_default(),
            description: self.description,
            location: self.location,
            html_link: self.html_link,
            start,
            end: self.end.and_then(WireEventTime::into_event_time),
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireTaskList {
    id: String,
    title: String,
}

impl From<WireTaskList> for TaskListInfo {
    fn from(wire: WireTaskList) -> Self {
        TaskListInfo {
            id: wire.id,
            title: wire.title,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireTask {
    id: String,
    #[serde(default)]
    title: String,
    notes: Option<String>,
    due: Option<DateTime<Utc>>,
    #[serde(default)]
    status: String,
}

impl From<WireTask> for TaskPayload {
    fn from(wire: WireTask) -> Self {
        TaskPayload {
            id: wire.id,
            title: wire.title,
            notes: wire.notes,
            due: wire.due,
            status: wire.status,
        }
    }
}
