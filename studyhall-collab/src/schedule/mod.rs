mod google;
pub use google::*;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use futures_util::future::join_all;
use thiserror::Error;

use crate::{auth::Provider, Database, DatabaseError, PrimaryKey};

#[derive(Debug, Error)]
pub enum ScheduleError {
    /// The user has no linked Google account, or the account carries no
    /// access token
    #[error("Google account is not connected")]
    NotConnected,
    /// Enumerating the user's calendars or task lists failed outright
    #[error("Google API error: {0}")]
    Provider(String),
    /// Something else went wrong with the database
    #[error(transparent)]
    Db(#[from] DatabaseError),
}

#[derive(Debug, Error)]
pub enum GoogleError {
    #[error("Request failed: {0}")]
    Http(String),
    #[error("Google returned status {0}: {1}")]
    Status(u16, String),
    #[error("Failed to decode response: {0}")]
    Decode(String),
}

/// The requested time range. When no lower bound is given, fetches start
/// from the moment of the request.
#[derive(Debug, Clone, Default)]
pub struct TimeWindow {
    pub time_min: Option<DateTime<Utc>>,
    pub time_max: Option<DateTime<Utc>>,
}

impl TimeWindow {
    pub fn min_or_now(&self) -> DateTime<Utc> {
        self.time_min.unwrap_or_else(Utc::now)
    }
}

/// A calendar visible to the linked account
#[derive(Debug, Clone)]
pub struct CalendarInfo {
    pub id: String,
    pub title: String,
    pub color: Option<String>,
}

/// A task list belonging to the linked account
#[derive(Debug, Clone)]
pub struct TaskListInfo {
    pub id: String,
    pub title: String,
}

/// When an event starts or ends. All-day events only carry a date, and
/// compare as the start of that day in UTC so they interleave predictably
/// with timed events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventTime {
    AllDay(NaiveDate),
    Timed(DateTime<Utc>),
}

impl EventTime {
    pub fn instant(&self) -> DateTime<Utc> {
        match self {
            Self::AllDay(date) => date.and_time(NaiveTime::MIN).and_utc(),
            Self::Timed(at) => *at,
        }
    }

    pub fn is_all_day(&self) -> bool {
        matches!(self, Self::AllDay(_))
    }
}

/// An event as returned by a single calendar, before source tagging
#[derive(Debug, Clone)]
pub struct EventPayload {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub html_link: Option<String>,
    pub start: EventTime,
    pub end: Option<EventTime>,
}

/// A task as returned by a single task list, before source tagging
#[derive(Debug, Clone)]
pub struct TaskPayload {
    pub id: String,
    pub title: String,
    pub notes: Option<String>,
    pub due: Option<DateTime<Utc>>,
    pub status: String,
}

/// An event tagged with the calendar it came from
#[derive(Debug, Clone)]
pub struct CalendarEvent {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub html_link: Option<String>,
    pub start: EventTime,
    pub end: Option<EventTime>,
    pub calendar_id: String,
    pub calendar_title: String,
    pub color: Option<String>,
}

impl CalendarEvent {
    fn tagged(payload: EventPayload, calendar: &CalendarInfo) -> Self {
        Self {
            id: payload.id,
            title: payload.title,
            description: payload.description,
            location: payload.location,
            html_link: payload.html_link,
            start: payload.start,
            end: payload.end,
            calendar_id: calendar.id.clone(),
            calendar_title: calendar.title.clone(),
            color: calendar.color.clone(),
        }
    }
}

/// A task tagged with the list it came from
#[derive(Debug, Clone)]
pub struct TaskItem {
    pub id: String,
    pub title: String,
    pub notes: Option<String>,
    pub due: Option<DateTime<Utc>>,
    pub status: String,
    pub list_id: String,
    pub list_title: String,
}

impl TaskItem {
    fn tagged(payload: TaskPayload, list: &TaskListInfo) -> Self {
        Self {
            id: payload.id,
            title: payload.title,
            notes: payload.notes,
            due: payload.due,
            status: payload.status,
            list_id: list.id.clone(),
            list_title: list.title.clone(),
        }
    }
}

/// One entry of the merged feed
#[derive(Debug, Clone)]
pub enum ScheduleItem {
    Event(CalendarEvent),
    Task(TaskItem),
}

impl ScheduleItem {
    /// The single comparable instant the feed is ordered by. Tasks without a
    /// due date have none, and sort after everything dated.
    pub fn starts_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Event(event) => Some(event.start.instant()),
            Self::Task(task) => task.due,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Self::Event(event) => &event.title,
            Self::Task(task) => &task.title,
        }
    }
}

/// A fetch from one calendar or task list that failed without taking the
/// rest of the response down with it
#[derive(Debug, Clone)]
pub struct SourceError {
    pub source_id: String,
    pub source_title: String,
    pub error: String,
}

#[derive(Debug)]
pub struct CalendarData {
    pub events: Vec<CalendarEvent>,
    pub calendars: Vec<CalendarInfo>,
    pub errors: Vec<SourceError>,
}

#[derive(Debug)]
pub struct TaskData {
    pub tasks: Vec<TaskItem>,
    pub errors: Vec<SourceError>,
}

#[derive(Debug)]
pub struct ScheduleFeed {
    pub items: Vec<ScheduleItem>,
    pub errors: Vec<SourceError>,
}

/// Represents a type that can talk to the Google Calendar and Tasks APIs on
/// behalf of an access token
#[async_trait]
pub trait GoogleApi: Send + Sync {
    async fn calendars(&self, access_token: &str) -> Result<Vec<CalendarInfo>, GoogleError>;
    async fn events(
        &self,
        access_token: &str,
        calendar_id: &str,
        window: &TimeWindow,
    ) -> Result<Vec<EventPayload>, GoogleError>;
    async fn task_lists(&self, access_token: &str) -> Result<Vec<TaskListInfo>, GoogleError>;
    async fn tasks(
        &self,
        access_token: &str,
        list_id: &str,
        window: &TimeWindow,
    ) -> Result<Vec<TaskPayload>, GoogleError>;
}

/// Fans out to every calendar and task list the linked Google account can
/// see, and merges the results into one feed. Stateless; nothing fetched
/// here is ever persisted.
pub struct Schedule {
    db: Arc<dyn Database>,
    google: Arc<dyn GoogleApi>,
}

impl Schedule {
    pub fn new(db: &Arc<dyn Database>, google: Arc<dyn GoogleApi>) -> Self {
        Self {
            db: db.clone(),
            google,
        }
    }

    async fn access_token(&self, user_id: PrimaryKey) -> Result<String, ScheduleError> {
        let account = self
            .db
            .account_for_user(user_id, Provider::Google.as_str())
            .await
            .map_err(|e| {
                if e.is_not_found() {
                    ScheduleError::NotConnected
                } else {
                    ScheduleError::Db(e)
                }
            })?;

        account.access_token.ok_or(ScheduleError::NotConnected)
    }

    /// All events across the account's calendars, tagged with their source
    /// calendar and sorted by start ascending. A calendar whose fetch fails
    /// becomes an entry in `errors` instead of failing the whole response.
    pub async fn calendar_data(
        &self,
        user_id: PrimaryKey,
        window: &TimeWindow,
    ) -> Result<CalendarData, ScheduleError> {
        let token = self.access_token(user_id).await?;

        let calendars = self
            .google
            .calendars(&token)
            .await
            .map_err(|e| ScheduleError::Provider(e.to_string()))?;

        let fetches = calendars.iter().map(|calendar| {
            let google = self.google.clone();
            let token = token.clone();
            let window = window.clone();
            let calendar = calendar.clone();

            async move {
                let result = google.events(&token, &calendar.id, &window).await;
                (calendar, result)
            }
        });

        let mut events = Vec::new();
        let mut errors = Vec::new();

        for (calendar, result) in join_all(fetches).await {
            match result {
                Ok(payloads) => events.extend(
                    payloads
                        .into_iter()
                        .map(|p| CalendarEvent::tagged(p, &calendar)),
                ),
                Err(e) => errors.push(SourceError {
                    source_id: calendar.id,
                    source_title: calendar.title,
                    error: e.to_string(),
                }),
            }
        }

        events.sort_by_key(|event| event.start.instant());

        Ok(CalendarData {
            events,
            calendars,
            errors,
        })
    }

    /// All pending tasks across the account's task lists, tagged with their
    /// source list. Failures are isolated per list, as with calendars.
    pub async fn tasks(
        &self,
        user_id: PrimaryKey,
        window: &TimeWindow,
    ) -> Result<TaskData, ScheduleError> {
        let token = self.access_token(user_id).await?;

        let lists = self
            .google
            .task_lists(&token)
            .await
            .map_err(|e| ScheduleError::Provider(e.to_string()))?;

        let fetches = lists.iter().map(|list| {
            let google = self.google.clone();
            let token = token.clone();
            let window = window.clone();
            let list = list.clone();

            async move {
                let result = google.tasks(&token, &list.id, &window).await;
                (list, result)
            }
        });

        let mut tasks = Vec::new();
        let mut errors = Vec::new();

        for (list, result) in join_all(fetches).await {
            match result {
                Ok(payloads) => {
                    tasks.extend(payloads.into_iter().map(|p| TaskItem::tagged(p, &list)))
                }
                Err(e) => errors.push(SourceError {
                    source_id: list.id,
                    source_title: list.title,
                    error: e.to_string(),
                }),
            }
        }

        Ok(TaskData { tasks, errors })
    }

    /// Events and tasks merged into one feed, ordered by their comparable
    /// instant ascending. Tasks without a due date come last.
    pub async fn feed(
        &self,
        user_id: PrimaryKey,
        window: &TimeWindow,
    ) -> Result<ScheduleFeed, ScheduleError> {
        let (calendar, tasks) =
            tokio::join!(self.calendar_data(user_id, window), self.tasks(user_id, window));

        let calendar = calendar?;
        let tasks = tasks?;

        let mut items: Vec<_> = calendar
            .events
            .into_iter()
            .map(ScheduleItem::Event)
            .chain(tasks.tasks.into_iter().map(ScheduleItem::Task))
            .collect();

        items.sort_by_key(|item| (item.starts_at().is_none(), item.starts_at()));

        let errors = calendar.errors.into_iter().chain(tasks.errors).collect();

        Ok(ScheduleFeed { items, errors })
    }
}

#[cfg(test)]
mod test {
    use std::{collections::HashMap, sync::Arc};

    use chrono::TimeZone;

    use super::*;
    use crate::{db::memory::MemoryDatabase, NewAccount, NewUser, UserData};

    #[derive(Default)]
    struct MockGoogle {
        calendars: Vec<CalendarInfo>,
        events: HashMap<String, Result<Vec<EventPayload>, String>>,
        lists: Vec<TaskListInfo>,
        tasks: HashMap<String, Vec<TaskPayload>>,
    }

    #[async_trait]
    impl GoogleApi for MockGoogle {
        async fn calendars(&self, _token: &str) -> Result<Vec<CalendarInfo>, GoogleError> {
            Ok(self.calendars.clone())
        }

        async fn events(
            &self,
            _token: &str,
            calendar_id: &str,
            _window: &TimeWindow,
        ) -> Result<Vec<EventPayload>, GoogleError> {
            match self.events.get(calendar_id) {
                Some(Ok(events)) => Ok(events.clone()),
                Some(Err(message)) => Err(GoogleError::Status(500, message.clone())),
                None => Ok(vec![]),
            }
        }

        async fn task_lists(&self, _token: &str) -> Result<Vec<TaskListInfo>, GoogleError> {
            Ok(self.lists.clone())
        }

        async fn tasks(
            &self,
            _token: &str,
            list_id: &str,
            _window: &TimeWindow,
        ) -> Result<Vec<TaskPayload>, GoogleError> {
            Ok(self.tasks.get(list_id).cloned().unwrap_or_default())
        }
    }

    fn calendar(id: &str, title: &str) -> CalendarInfo {
        CalendarInfo {
            id: id.to_string(),
            title: title.to_string(),
            color: Some("#9a9cff".to_string()),
        }
    }

    fn event(id: &str, title: &str, start: EventTime) -> EventPayload {
        EventPayload {
            id: id.to_string(),
            title: title.to_string(),
            description: None,
            location: None,
            html_link: None,
            start,
            end: None,
        }
    }

    fn task(id: &str, title: &str, due: Option<DateTime<Utc>>) -> TaskPayload {
        TaskPayload {
            id: id.to_string(),
            title: title.to_string(),
            notes: None,
            due,
            status: "needsAction".to_string(),
        }
    }

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 14, hour, 0, 0).unwrap()
    }

    async fn linked_user(db: &Arc<MemoryDatabase>, token: Option<&str>) -> UserData {
        let user = db
            .create_user(NewUser {
                username: "alice".to_string(),
                display_name: "alice".to_string(),
                email: None,
                avatar_url: None,
            })
            .await
            .unwrap();

        db.create_account(NewAccount {
            user_id: user.id,
            provider: "google".to_string(),
            provider_account_id: "g-1".to_string(),
            access_token: token.map(str::to_string),
            refresh_token: None,
            scope: None,
            expires_at: None,
        })
        .await
        .unwrap();

        user
    }

    fn schedule(db: &Arc<MemoryDatabase>, google: MockGoogle) -> Schedule {
        let db: Arc<dyn Database> = db.clone();
        Schedule::new(&db, Arc::new(google))
    }

    #[tokio::test]
    async fn test_events_are_tagged_and_sorted_across_calendars() {
        let db = Arc::new(MemoryDatabase::default());
        let user = linked_user(&db, Some("tok")).await;

        let google = MockGoogle {
            calendars: vec![calendar("work", "Work"), calendar("home", "Home")],
            events: HashMap::from([
                (
                    "work".to_string(),
                    Ok(vec![event("e2", "Standup", EventTime::Timed(at(15)))]),
                ),
                (
                    "home".to_string(),
                    Ok(vec![event("e1", "Dentist", EventTime::Timed(at(9)))]),
                ),
            ]),
            ..Default::default()
        };

        let data = schedule(&db, google)
            .calendar_data(user.id, &TimeWindow::default())
            .await
            .unwrap();

        assert_eq!(data.calendars.len(), 2);
        assert!(data.errors.is_empty());
        assert_eq!(data.events.len(), 2);

        // Ascending by start, each tagged with its source calendar
        assert_eq!(data.events[0].title, "Dentist");
        assert_eq!(data.events[0].calendar_id, "home");
        assert_eq!(data.events[0].calendar_title, "Home");
        assert_eq!(data.events[1].title, "Standup");
        assert_eq!(data.events[1].calendar_id, "work");
    }

    #[tokio::test]
    async fn test_all_day_events_sort_before_timed_events_that_day() {
        let db = Arc::new(MemoryDatabase::default());
        let user = linked_user(&db, Some("tok")).await;

        let all_day = EventTime::AllDay(NaiveDate::from_ymd_opt(2025, 3, 14).unwrap());

        let google = MockGoogle {
            calendars: vec![calendar("work", "Work")],
            events: HashMap::from([(
                "work".to_string(),
                Ok(vec![
                    event("e1", "Meeting", EventTime::Timed(at(9))),
                    event("e2", "Conference", all_day),
                ]),
            )]),
            ..Default::default()
        };

        let data = schedule(&db, google)
            .calendar_data(user.id, &TimeWindow::default())
            .await
            .unwrap();

        assert_eq!(data.events[0].title, "Conference");
        assert!(data.events[0].start.is_all_day());
        assert_eq!(data.events[1].title, "Meeting");
    }

    #[tokio::test]
    async fn test_failing_calendar_is_isolated() {
        let db = Arc::new(MemoryDatabase::default());
        let user = linked_user(&db, Some("tok")).await;

        let google = MockGoogle {
            calendars: vec![calendar("ok", "Ok"), calendar("bad", "Bad")],
            events: HashMap::from([
                (
                    "ok".to_string(),
                    Ok(vec![event("e1", "Kept", EventTime::Timed(at(9)))]),
                ),
                ("bad".to_string(), Err("backend error".to_string())),
            ]),
            ..Default::default()
        };

        let data = schedule(&db, google)
            .calendar_data(user.id, &TimeWindow::default())
            .await
            .unwrap();

        assert_eq!(data.events.len(), 1);
        assert_eq!(data.events[0].title, "Kept");
        assert_eq!(data.errors.len(), 1);
        assert_eq!(data.errors[0].source_id, "bad");
        assert!(data.errors[0].error.contains("backend error"));
    }

    #[tokio::test]
    async fn test_tasks_are_tagged_with_their_list() {
        let db = Arc::new(MemoryDatabase::default());
        let user = linked_user(&db, Some("tok")).await;

        let google = MockGoogle {
            lists: vec![TaskListInfo {
                id: "inbox".to_string(),
                title: "Inbox".to_string(),
            }],
            tasks: HashMap::from([(
                "inbox".to_string(),
                vec![task("t1", "Read chapter 4", Some(at(18)))],
            )]),
            ..Default::default()
        };

        let data = schedule(&db, google)
            .tasks(user.id, &TimeWindow::default())
            .await
            .unwrap();

        assert_eq!(data.tasks.len(), 1);
        assert_eq!(data.tasks[0].list_id, "inbox");
        assert_eq!(data.tasks[0].list_title, "Inbox");
    }

    #[tokio::test]
    async fn test_feed_interleaves_events_and_tasks() {
        let db = Arc::new(MemoryDatabase::default());
        let user = linked_user(&db, Some("tok")).await;

        let google = MockGoogle {
            calendars: vec![calendar("work", "Work")],
            events: HashMap::from([(
                "work".to_string(),
                Ok(vec![
                    event("e1", "Morning", EventTime::Timed(at(8))),
                    event("e2", "Evening", EventTime::Timed(at(20))),
                ]),
            )]),
            lists: vec![TaskListInfo {
                id: "inbox".to_string(),
                title: "Inbox".to_string(),
            }],
            tasks: HashMap::from([(
                "inbox".to_string(),
                vec![
                    task("t1", "Midday", Some(at(12))),
                    task("t2", "Someday", None),
                ],
            )]),
            ..Default::default()
        };

        let feed = schedule(&db, google)
            .feed(user.id, &TimeWindow::default())
            .await
            .unwrap();

        let titles: Vec<_> = feed.items.iter().map(|i| i.title()).collect();
        assert_eq!(titles, vec!["Morning", "Midday", "Evening", "Someday"]);

        assert!(matches!(&feed.items[1], ScheduleItem::Task(_)));
        assert!(feed.items[3].starts_at().is_none());
    }

    #[tokio::test]
    async fn test_unlinked_user_is_not_connected() {
        let db = Arc::new(MemoryDatabase::default());
        let user = db
            .create_user(NewUser {
                username: "bob".to_string(),
                display_name: "bob".to_string(),
                email: None,
                avatar_url: None,
            })
            .await
            .unwrap();

        let result = schedule(&db, MockGoogle::default())
            .calendar_data(user.id, &TimeWindow::default())
            .await;

        assert!(matches!(result, Err(ScheduleError::NotConnected)));
    }

    #[tokio::test]
    async fn test_missing_access_token_is_not_connected() {
        let db = Arc::new(MemoryDatabase::default());
        let user = linked_user(&db, None).await;

        let result = schedule(&db, MockGoogle::default())
            .tasks(user.id, &TimeWindow::default())
            .await;

        assert!(matches!(result, Err(ScheduleError::NotConnected)));
    }

    #[test]
    fn test_all_day_instant_is_start_of_day() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 14).unwrap();
        let instant = EventTime::AllDay(date).instant();

        assert_eq!(instant, Utc.with_ymd_and_hms(2025, 3, 14, 0, 0, 0).unwrap());
        assert!(instant < EventTime::Timed(at(9)).instant());
    }
}
