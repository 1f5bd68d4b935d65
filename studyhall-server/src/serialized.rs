//! All schemas that are exposed from endpoints are defined here
//! along with the conversion impls

use chrono::{DateTime, Utc};
use serde::Serialize;
use studyhall_collab::{
    CalendarData as CollabCalendarData, CalendarEvent, CalendarInfo, MessageData, RoomData,
    RoomMemberData, ScheduleFeed, ScheduleItem, SessionData, SourceError, TaskData, TaskItem,
    UserData,
};
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct User {
    id: i32,
    username: String,
    display_name: String,
    email: Option<String>,
    avatar_url: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginUrl {
    pub url: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResult {
    token: String,
    user: User,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Room {
    id: i32,
    name: String,
    created_by: i32,
    members: Vec<RoomMember>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RoomMember {
    id: i32,
    owner: bool,
    user: User,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Message {
    id: i32,
    room_id: i32,
    content: String,
    created_at: DateTime<Utc>,
    user: User,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Calendar {
    id: String,
    title: String,
    color: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Event {
    id: String,
    title: String,
    description: Option<String>,
    location: Option<String>,
    html_link: Option<String>,
    starts_at: DateTime<Utc>,
    all_day: bool,
    calendar_id: String,
    calendar_title: String,
    color: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Task {
    id: String,
    title: String,
    notes: Option<String>,
    due: Option<DateTime<Utc>>,
    status: String,
    list_id: String,
    list_title: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SourceFailure {
    source_id: String,
    source_title: String,
    error: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CalendarResponse {
    events: Vec<Event>,
    calendars: Vec<Calendar>,
    errors: Vec<SourceFailure>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TasksResponse {
    tasks: Vec<Task>,
    errors: Vec<SourceFailure>,
}

/// One entry of the merged feed, discriminated by `type`
#[derive(Debug, Serialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeedEntry {
    Event(Event),
    Task(Task),
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FeedResponse {
    items: Vec<FeedEntry>,
    errors: Vec<SourceFailure>,
}

/// Helper trait to convert any type into a serialized version
pub trait ToSerialized<T>
where
    T: Serialize,
{
    fn to_serialized(&self) -> T;
}

impl<I, O> ToSerialized<Vec<O>> for Vec<I>
where
    I: ToSerialized<O>,
    O: Serialize,
{
    fn to_serialized(&self) -> Vec<O> {
        self.iter().map(|x| x.to_serialized()).collect()
    }
}

impl ToSerialized<User> for UserData {
    fn to_serialized(&self) -> User {
        User {
            id: self.id,
            username: self.username.clone(),
            display_name: self.display_name.clone(),
            email: self.email.clone(),
            avatar_url: self.avatar_url.clone(),
        }
    }
}

impl ToSerialized<LoginResult> for SessionData {
    fn to_serialized(&self) -> LoginResult {
        LoginResult {
            token: self.token.clone(),
            user: self.user.to_serialized(),
        }
    }
}

impl ToSerialized<Room> for RoomData {
    fn to_serialized(&self) -> Room {
        Room {
            id: self.id,
            name: self.name.clone(),
            created_by: self.created_by,
            members: self.members.to_serialized(),
        }
    }
}

impl ToSerialized<RoomMember> for RoomMemberData {
    fn to_serialized(&self) -> RoomMember {
        RoomMember {
            id: self.id,
            owner: self.owner,
            user: self.user.to_serialized(),
        }
    }
}

impl ToSerialized<Message> for MessageData {
    fn to_serialized(&self) -> Message {
        Message {
            id: self.id,
            room_id: self.room_id,
            content: self.content.clone(),
            created_at: self.created_at,
            user: self.user.to_serialized(),
        }
    }
}

impl ToSerialized<Calendar> for CalendarInfo {
    fn to_serialized(&self) -> Calendar {
        Calendar {
            id: self.id.clone(),
            title: self.title.clone(),
            color: self.color.clone(),
        }
    }
}

impl ToSerialized<Event> for CalendarEvent {
    fn to_serialized(&self) -> Event {
        Event {
            id: self.id.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            location: self.location.clone(),
            html_link: self.html_link.clone(),
            starts_at: self.start.instant(),
            all_day: self.start.is_all_day(),
            calendar_id: self.calendar_id.clone(),
            calendar_title: self.calendar_title.clone(),
            color: self.color.clone(),
        }
    }
}

impl ToSerialized<Task> for TaskItem {
    fn to_serialized(&self) -> Task {
        Task {
            id: self.id.clone(),
            title: self.title.clone(),
            notes: self.notes.clone(),
            due: self.due,
            status: self.status.clone(),
            list_id: self.list_id.clone(),
            list_title: self.list_title.clone(),
        }
    }
}

impl ToSerialized<SourceFailure> for SourceError {
    fn to_serialized(&self) -> SourceFailure {
        SourceFailure {
            source_id: self.source_id.clone(),
            source_title: self.source_title.clone(),
            error: self.error.clone(),
        }
    }
}

impl ToSerialized<CalendarResponse> for CollabCalendarData {
    fn to_serialized(&self) -> CalendarResponse {
        CalendarResponse {
            events: self.events.to_serialized(),
            calendars: self.calendars.to_serialized(),
            errors: self.errors.to_serialized(),
        }
    }
}

impl ToSerialized<TasksResponse> for TaskData {
    fn to_serialized(&self) -> TasksResponse {
        TasksResponse {
            tasks: self.tasks.to_serialized(),
            errors: self.errors.to_serialized(),
        }
    }
}

impl ToSerialized<FeedEntry> for ScheduleItem {
    fn to_serialized(&self) -> FeedEntry {
        match self {
            ScheduleItem::Event(event) => FeedEntry::Event(event.to_serialized()),
            ScheduleItem::Task(task) => FeedEntry::Task(task.to_serialized()),
        }
    }
}

impl ToSerialized<FeedResponse> for ScheduleFeed {
    fn to_serialized(&self) -> FeedResponse {
        FeedResponse {
            items: self.items.to_serialized(),
            errors: self.errors.to_serialized(),
        }
    }
}
