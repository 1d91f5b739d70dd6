//! Domain DTOs for the Chatwork API.
//!
//! # Design
//! Response records mirror the service's JSON and are never mutated locally;
//! every id is assigned by the server. Request options are one struct per
//! endpoint with named optional fields, so an unknown field is a compile
//! error rather than a silently ignored form key.
//!
//! Enumerated request values parse case-insensitively through `FromStr`,
//! which is where an out-of-set value becomes `ApiError::InvalidParameter`.

use std::fmt;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize};

use crate::encode::{AccountIds, Deadline, QueryValue};
use crate::error::ApiError;
use crate::validate::parse_choice;

macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $name:ident, param = $param:literal $(, blank = $blank:ident)? {
            $($variant:ident => $wire:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
        pub enum $name {
            $(#[serde(rename = $wire)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];
            pub const NAMES: &'static [&'static str] = &[$($wire),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $wire),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl QueryValue for $name {
            fn query_value(&self) -> Option<String> {
                Some(self.as_str().to_string())
            }
        }

        impl FromStr for $name {
            type Err = ApiError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                $(
                    if s.trim().is_empty() {
                        return Ok($name::$blank);
                    }
                )?
                let index = parse_choice($param, s, Self::NAMES)?;
                Ok(Self::ALL[index])
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                raw.parse().map_err(de::Error::custom)
            }
        }
    };
}

wire_enum! {
    /// Completion state of a task.
    TaskStatus, param = "status" {
        Open => "open",
        Done => "done",
    }
}

wire_enum! {
    /// How a task deadline is interpreted. A blank value reads as `time`.
    TaskLimitType, param = "limit_type", blank = Time {
        None => "none",
        Date => "date",
        Time => "time",
    }
}

impl Default for TaskLimitType {
    fn default() -> Self {
        TaskLimitType::Time
    }
}

wire_enum! {
    /// What leaving a room does: `leave` drops membership, `delete` removes
    /// the room for everyone.
    RoomAction, param = "action_type" {
        Leave => "leave",
        Delete => "delete",
    }
}

wire_enum! {
    IconPreset, param = "icon_preset" {
        Group => "group",
        Check => "check",
        Document => "document",
        Meeting => "meeting",
        Event => "event",
        Project => "project",
        Business => "business",
        Study => "study",
        Security => "security",
        Star => "star",
        Idea => "idea",
        Heart => "heart",
        Magcup => "magcup",
        Beer => "beer",
        Music => "music",
        Sports => "sports",
        Travel => "travel",
    }
}

wire_enum! {
    RoomRole, param = "role" {
        Admin => "admin",
        Member => "member",
        Readonly => "readonly",
    }
}

wire_enum! {
    RoomType, param = "type" {
        My => "my",
        Direct => "direct",
        Group => "group",
    }
}

// ---------------------------------------------------------------------------
// Response records
// ---------------------------------------------------------------------------

/// Account reference embedded in messages, tasks and files.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Account {
    pub account_id: u64,
    pub name: String,
    #[serde(default)]
    pub avatar_image_url: String,
}

/// The calling account, from `GET /me`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Me {
    pub account_id: u64,
    pub room_id: u64,
    pub name: String,
    #[serde(default)]
    pub chatwork_id: String,
    #[serde(default)]
    pub organization_id: u64,
    #[serde(default)]
    pub organization_name: String,
    #[serde(default)]
    pub department: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub introduction: String,
    #[serde(default)]
    pub mail: String,
    #[serde(default)]
    pub tel_organization: String,
    #[serde(default)]
    pub tel_extension: String,
    #[serde(default)]
    pub tel_mobile: String,
    #[serde(default)]
    pub skype: String,
    #[serde(default)]
    pub facebook: String,
    #[serde(default)]
    pub twitter: String,
    #[serde(default)]
    pub avatar_image_url: String,
    #[serde(default)]
    pub login_mail: String,
}

/// Unread, mention and task counters for the caller.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MyStatus {
    pub unread_room_num: u64,
    pub mention_room_num: u64,
    pub mytask_room_num: u64,
    pub unread_num: u64,
    pub mention_num: u64,
    pub mytask_num: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoomSummary {
    pub room_id: u64,
    pub name: String,
    #[serde(default)]
    pub icon_path: String,
}

/// A task assigned to the caller, across rooms.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MyTask {
    pub task_id: u64,
    pub room: RoomSummary,
    pub assigned_by_account: Account,
    pub message_id: String,
    pub body: String,
    #[serde(default)]
    pub limit_time: i64,
    pub status: TaskStatus,
    #[serde(default)]
    pub limit_type: TaskLimitType,
}

/// A task inside one room.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Task {
    pub task_id: u64,
    pub account: Account,
    pub assigned_by_account: Account,
    pub message_id: String,
    pub body: String,
    #[serde(default)]
    pub limit_time: i64,
    pub status: TaskStatus,
    #[serde(default)]
    pub limit_type: TaskLimitType,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Contact {
    pub account_id: u64,
    pub room_id: u64,
    pub name: String,
    #[serde(default)]
    pub chatwork_id: String,
    #[serde(default)]
    pub organization_id: u64,
    #[serde(default)]
    pub organization_name: String,
    #[serde(default)]
    pub department: String,
    #[serde(default)]
    pub avatar_image_url: String,
}

/// A chat room. `description` is only filled by `GET /rooms/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Room {
    pub room_id: u64,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: RoomType,
    pub role: RoomRole,
    #[serde(default)]
    pub sticky: bool,
    #[serde(default)]
    pub unread_num: u64,
    #[serde(default)]
    pub mention_num: u64,
    #[serde(default)]
    pub mytask_num: u64,
    #[serde(default)]
    pub message_num: u64,
    #[serde(default)]
    pub file_num: u64,
    #[serde(default)]
    pub task_num: u64,
    #[serde(default)]
    pub icon_path: String,
    #[serde(default)]
    pub last_update_time: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Member {
    pub account_id: u64,
    pub role: RoomRole,
    pub name: String,
    #[serde(default)]
    pub chatwork_id: String,
    #[serde(default)]
    pub organization_id: u64,
    #[serde(default)]
    pub organization_name: String,
    #[serde(default)]
    pub department: String,
    #[serde(default)]
    pub avatar_image_url: String,
}

/// Account ids per role after a membership change.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MemberRoles {
    #[serde(default)]
    pub admin: Vec<u64>,
    #[serde(default)]
    pub member: Vec<u64>,
    #[serde(default)]
    pub readonly: Vec<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub message_id: String,
    pub account: Account,
    pub body: String,
    pub send_time: i64,
    #[serde(default)]
    pub update_time: i64,
}

/// An uploaded file. `download_url` is only present when requested and
/// expires shortly after it is issued.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct File {
    pub file_id: u64,
    pub account: Account,
    pub message_id: String,
    pub filename: String,
    pub filesize: u64,
    pub upload_time: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
}

/// A room's invitation link. `url` is absent once the link is deleted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InvitationLink {
    pub public: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default)]
    pub need_acceptance: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A pending contact request addressed to the caller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IncomingRequest {
    pub request_id: u64,
    pub account_id: u64,
    #[serde(default)]
    pub message: String,
    pub name: String,
    #[serde(default)]
    pub chatwork_id: String,
    #[serde(default)]
    pub organization_id: u64,
    #[serde(default)]
    pub organization_name: String,
    #[serde(default)]
    pub department: String,
    #[serde(default)]
    pub avatar_image_url: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoomId {
    pub room_id: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageId {
    pub message_id: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskId {
    pub task_id: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskIds {
    pub task_ids: Vec<u64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileId {
    pub file_id: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct UnreadCounts {
    pub unread_num: u64,
    pub mention_num: u64,
}

// ---------------------------------------------------------------------------
// Request options
// ---------------------------------------------------------------------------

/// Filters for `GET /my/tasks`.
#[derive(Debug, Clone, Default)]
pub struct MyTasksQuery {
    pub assigned_by_account_id: Option<u64>,
    pub status: Option<TaskStatus>,
}

/// Filters for `GET /rooms/{room_id}/tasks`.
#[derive(Debug, Clone, Default)]
pub struct RoomTasksQuery {
    pub account_id: Option<u64>,
    pub assigned_by_account_id: Option<u64>,
    pub status: Option<TaskStatus>,
}

/// Payload for `POST /rooms`. `name` and `members_admin_ids` are required.
#[derive(Debug, Clone, Default)]
pub struct CreateRoom {
    pub name: String,
    pub members_admin_ids: AccountIds,
    pub members_member_ids: AccountIds,
    pub members_readonly_ids: AccountIds,
    pub description: Option<String>,
    pub icon_preset: Option<IconPreset>,
    /// Create an invitation link along with the room.
    pub link: Option<bool>,
    pub link_code: Option<String>,
    pub link_need_acceptance: Option<bool>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateRoom {
    pub name: Option<String>,
    pub description: Option<String>,
    pub icon_preset: Option<IconPreset>,
}

/// Payload for `PUT /rooms/{room_id}/members`; replaces the whole member
/// list.
#[derive(Debug, Clone, Default)]
pub struct UpdateMembers {
    pub members_admin_ids: AccountIds,
    pub members_member_ids: AccountIds,
    pub members_readonly_ids: AccountIds,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SendMessage {
    pub body: String,
    /// Leave the posted message unread for the sender.
    #[serde(default)]
    pub self_unread: Option<bool>,
}

/// Payload for `POST /rooms/{room_id}/tasks`. Without `limit_type` the
/// deadline is read as a time.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateTask {
    pub body: String,
    pub to_ids: AccountIds,
    #[serde(default)]
    pub limit: Option<Deadline>,
    #[serde(default)]
    pub limit_type: Option<TaskLimitType>,
}

#[derive(Debug, Clone, Default)]
pub struct UploadFile {
    pub filename: String,
    pub content: Vec<u8>,
    /// Defaults to `application/octet-stream`.
    pub content_type: Option<String>,
    /// Message posted with the file.
    pub message: Option<String>,
}

/// Payload for creating or replacing a room's invitation link.
#[derive(Debug, Clone, Default)]
pub struct LinkOptions {
    /// Path segment of the link; the server picks one when absent.
    pub code: Option<String>,
    pub description: Option<String>,
    pub need_acceptance: Option<bool>,
}
