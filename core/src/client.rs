//! Stateless request builder and response mapper for the Chatwork API.
//!
//! # Design
//! `ChatworkClient` holds only the API token and base URL and carries no
//! mutable state between calls. Every endpoint is a `build_*` method that
//! validates its parameters and returns a `Call<T>`: the finished
//! `HttpRequest` plus what is needed to map the response (result type,
//! the resource named by a 404, and how to read an empty body). The host
//! executes the round trip, either by hand (`call.request` then
//! `call.parse`) or through a `Transport` (`call.send`).

use std::fmt;
use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::ClientConfig;
use crate::encode::{Form, Multipart, Query};
use crate::error::{classify, ApiError, Resource};
use crate::http::{HttpMethod, HttpRequest, HttpResponse, Transport, FORM_CONTENT_TYPE, TOKEN_HEADER};
use crate::types::*;
use crate::validate::{require_id, require_ids, require_str};

/// Production API root.
pub const DEFAULT_BASE_URL: &str = "https://api.chatwork.com/v2";

/// A built request together with the rules for reading its response.
#[derive(Debug)]
pub struct Call<T> {
    pub request: HttpRequest,
    resource: Resource,
    empty_body: &'static str,
    result: PhantomData<fn() -> T>,
}

impl<T> Call<T> {
    fn new(request: HttpRequest, resource: Resource) -> Self {
        Self {
            request,
            resource,
            empty_body: "null",
            result: PhantomData,
        }
    }

    /// The resource a 404 from this call refers to.
    pub fn resource(&self) -> Resource {
        self.resource
    }
}

impl<U> Call<Vec<U>> {
    /// List endpoints answer "nothing new" with an empty body.
    fn empty_as_list(mut self) -> Self {
        self.empty_body = "[]";
        self
    }
}

impl<T: DeserializeOwned> Call<T> {
    /// Map a response for this call onto its result or an `ApiError`.
    pub fn parse(&self, response: HttpResponse) -> Result<T, ApiError> {
        debug!(
            status = response.status,
            url = %self.request.url,
            "received chatwork response"
        );
        classify(&response, self.resource)?;
        let body = if response.body.trim().is_empty() {
            self.empty_body
        } else {
            response.body.as_str()
        };
        serde_json::from_str(body).map_err(|e| ApiError::Deserialization(e.to_string()))
    }

    /// Execute the request once through `transport` and map the response.
    pub fn send<X: Transport + ?Sized>(&self, transport: &X) -> Result<T, ApiError> {
        let response = transport.execute(&self.request)?;
        self.parse(response)
    }
}

enum Payload {
    Empty,
    Form(Form),
    Multipart(Multipart),
}

/// Synchronous, stateless client for the Chatwork API.
#[derive(Clone)]
pub struct ChatworkClient {
    token: String,
    base_url: String,
}

impl fmt::Debug for ChatworkClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatworkClient")
            .field("token", &"<redacted>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl ChatworkClient {
    pub fn new(token: impl Into<String>) -> Self {
        Self::with_base_url(token, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(token: impl Into<String>, base_url: &str) -> Self {
        Self {
            token: token.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::with_base_url(config.token.clone(), &config.base_url)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // -- account ------------------------------------------------------------

    pub fn build_get_me(&self) -> Result<Call<Me>, ApiError> {
        self.call(HttpMethod::Get, "/me".to_string(), Payload::Empty, Resource::Generic)
    }

    pub fn build_get_my_status(&self) -> Result<Call<MyStatus>, ApiError> {
        self.call(
            HttpMethod::Get,
            "/my/status".to_string(),
            Payload::Empty,
            Resource::Generic,
        )
    }

    pub fn build_get_my_tasks(&self, query: &MyTasksQuery) -> Result<Call<Vec<MyTask>>, ApiError> {
        let query = Query::new()
            .param("assigned_by_account_id", query.assigned_by_account_id)
            .param("status", query.status);
        self.call(
            HttpMethod::Get,
            format!("/my/tasks{}", query.finish()),
            Payload::Empty,
            Resource::Task,
        )
        .map(Call::empty_as_list)
    }

    pub fn build_get_contacts(&self) -> Result<Call<Vec<Contact>>, ApiError> {
        self.call(
            HttpMethod::Get,
            "/contacts".to_string(),
            Payload::Empty,
            Resource::Contact,
        )
        .map(Call::empty_as_list)
    }

    // -- rooms --------------------------------------------------------------

    pub fn build_get_rooms(&self) -> Result<Call<Vec<Room>>, ApiError> {
        self.call(HttpMethod::Get, "/rooms".to_string(), Payload::Empty, Resource::Room)
            .map(Call::empty_as_list)
    }

    pub fn build_create_room(&self, input: &CreateRoom) -> Result<Call<RoomId>, ApiError> {
        let name = require_str("name", &input.name)?;
        let admins = require_ids("members_admin_ids", &input.members_admin_ids)?;
        let form = Form::new()
            .field("name", name)
            .ids("members_admin_ids", admins)
            .ids("members_member_ids", &input.members_member_ids)
            .ids("members_readonly_ids", &input.members_readonly_ids)
            .optional("description", input.description.as_deref())
            .optional("icon_preset", input.icon_preset)
            .flag("link", input.link)
            .optional("link_code", input.link_code.as_deref())
            .flag("link_need_acceptance", input.link_need_acceptance);
        self.call(
            HttpMethod::Post,
            "/rooms".to_string(),
            Payload::Form(form),
            Resource::Room,
        )
    }

    pub fn build_get_room(&self, room_id: u64) -> Result<Call<Room>, ApiError> {
        let room_id = require_id("room_id", room_id)?;
        self.call(
            HttpMethod::Get,
            format!("/rooms/{room_id}"),
            Payload::Empty,
            Resource::Room,
        )
    }

    pub fn build_update_room(&self, room_id: u64, input: &UpdateRoom) -> Result<Call<RoomId>, ApiError> {
        let room_id = require_id("room_id", room_id)?;
        let form = Form::new()
            .optional("description", input.description.as_deref())
            .optional("icon_preset", input.icon_preset)
            .optional("name", input.name.as_deref());
        self.call(
            HttpMethod::Put,
            format!("/rooms/{room_id}"),
            Payload::Form(form),
            Resource::Room,
        )
    }

    /// Leave the room, or delete it for every member.
    pub fn build_delete_room(&self, room_id: u64, action: RoomAction) -> Result<Call<()>, ApiError> {
        let room_id = require_id("room_id", room_id)?;
        let form = Form::new().field("action_type", action);
        self.call(
            HttpMethod::Delete,
            format!("/rooms/{room_id}"),
            Payload::Form(form),
            Resource::Room,
        )
    }

    pub fn build_get_members(&self, room_id: u64) -> Result<Call<Vec<Member>>, ApiError> {
        let room_id = require_id("room_id", room_id)?;
        self.call(
            HttpMethod::Get,
            format!("/rooms/{room_id}/members"),
            Payload::Empty,
            Resource::Room,
        )
        .map(Call::empty_as_list)
    }

    pub fn build_update_members(
        &self,
        room_id: u64,
        input: &UpdateMembers,
    ) -> Result<Call<MemberRoles>, ApiError> {
        let room_id = require_id("room_id", room_id)?;
        let admins = require_ids("members_admin_ids", &input.members_admin_ids)?;
        let form = Form::new()
            .ids("members_admin_ids", admins)
            .ids("members_member_ids", &input.members_member_ids)
            .ids("members_readonly_ids", &input.members_readonly_ids);
        self.call(
            HttpMethod::Put,
            format!("/rooms/{room_id}/members"),
            Payload::Form(form),
            Resource::Room,
        )
    }

    // -- messages -----------------------------------------------------------

    /// Messages posted since the last fetch; `force` returns the latest 100
    /// regardless.
    pub fn build_get_messages(&self, room_id: u64, force: bool) -> Result<Call<Vec<Message>>, ApiError> {
        let room_id = require_id("room_id", room_id)?;
        let query = Query::new().param("force", force);
        self.call(
            HttpMethod::Get,
            format!("/rooms/{room_id}/messages{}", query.finish()),
            Payload::Empty,
            Resource::Message,
        )
        .map(Call::empty_as_list)
    }

    pub fn build_send_message(&self, room_id: u64, input: &SendMessage) -> Result<Call<MessageId>, ApiError> {
        let room_id = require_id("room_id", room_id)?;
        let body = require_str("body", &input.body)?;
        let form = Form::new()
            .field("body", body)
            .flag("self_unread", input.self_unread);
        self.call(
            HttpMethod::Post,
            format!("/rooms/{room_id}/messages"),
            Payload::Form(form),
            Resource::Message,
        )
    }

    /// Mark messages read up to `message_id`, or all of them when `None`.
    pub fn build_mark_read(
        &self,
        room_id: u64,
        message_id: Option<&str>,
    ) -> Result<Call<UnreadCounts>, ApiError> {
        let room_id = require_id("room_id", room_id)?;
        let form = Form::new().optional("message_id", message_id.filter(|id| !id.trim().is_empty()));
        self.call(
            HttpMethod::Put,
            format!("/rooms/{room_id}/messages/read"),
            Payload::Form(form),
            Resource::Message,
        )
    }

    /// Mark messages unread from `message_id` onwards.
    pub fn build_mark_unread(&self, room_id: u64, message_id: &str) -> Result<Call<UnreadCounts>, ApiError> {
        let room_id = require_id("room_id", room_id)?;
        let message_id = require_str("message_id", message_id)?;
        let form = Form::new().field("message_id", message_id);
        self.call(
            HttpMethod::Put,
            format!("/rooms/{room_id}/messages/unread"),
            Payload::Form(form),
            Resource::Message,
        )
    }

    pub fn build_get_message(&self, room_id: u64, message_id: &str) -> Result<Call<Message>, ApiError> {
        let room_id = require_id("room_id", room_id)?;
        let message_id = require_str("message_id", message_id)?;
        self.call(
            HttpMethod::Get,
            format!("/rooms/{room_id}/messages/{}", urlencoding::encode(message_id)),
            Payload::Empty,
            Resource::Message,
        )
    }

    pub fn build_update_message(
        &self,
        room_id: u64,
        message_id: &str,
        body: &str,
    ) -> Result<Call<MessageId>, ApiError> {
        let room_id = require_id("room_id", room_id)?;
        let message_id = require_str("message_id", message_id)?;
        let body = require_str("body", body)?;
        let form = Form::new().field("body", body);
        self.call(
            HttpMethod::Put,
            format!("/rooms/{room_id}/messages/{}", urlencoding::encode(message_id)),
            Payload::Form(form),
            Resource::Message,
        )
    }

    pub fn build_delete_message(&self, room_id: u64, message_id: &str) -> Result<Call<MessageId>, ApiError> {
        let room_id = require_id("room_id", room_id)?;
        let message_id = require_str("message_id", message_id)?;
        self.call(
            HttpMethod::Delete,
            format!("/rooms/{room_id}/messages/{}", urlencoding::encode(message_id)),
            Payload::Empty,
            Resource::Message,
        )
    }

    /// Post `body` into the caller's own chat: one `GET /me`, then one
    /// message post to the room it names.
    pub fn send_message_to_my_chat<X: Transport + ?Sized>(
        &self,
        transport: &X,
        body: &str,
    ) -> Result<MessageId, ApiError> {
        let input = SendMessage {
            body: require_str("body", body)?.to_string(),
            self_unread: None,
        };
        let me = self.build_get_me()?.send(transport)?;
        self.build_send_message(me.room_id, &input)?.send(transport)
    }

    // -- tasks --------------------------------------------------------------

    pub fn build_get_room_tasks(
        &self,
        room_id: u64,
        query: &RoomTasksQuery,
    ) -> Result<Call<Vec<Task>>, ApiError> {
        let room_id = require_id("room_id", room_id)?;
        let query = Query::new()
            .param("account_id", query.account_id)
            .param("assigned_by_account_id", query.assigned_by_account_id)
            .param("status", query.status);
        self.call(
            HttpMethod::Get,
            format!("/rooms/{room_id}/tasks{}", query.finish()),
            Payload::Empty,
            Resource::Task,
        )
        .map(Call::empty_as_list)
    }

    pub fn build_create_task(&self, room_id: u64, input: &CreateTask) -> Result<Call<TaskIds>, ApiError> {
        let room_id = require_id("room_id", room_id)?;
        let body = require_str("body", &input.body)?;
        let to_ids = require_ids("to_ids", &input.to_ids)?;
        let form = Form::new()
            .field("body", body)
            .ids("to_ids", to_ids)
            .optional("limit", input.limit)
            .field("limit_type", input.limit_type.unwrap_or_default());
        self.call(
            HttpMethod::Post,
            format!("/rooms/{room_id}/tasks"),
            Payload::Form(form),
            Resource::Task,
        )
    }

    pub fn build_get_task(&self, room_id: u64, task_id: u64) -> Result<Call<Task>, ApiError> {
        let room_id = require_id("room_id", room_id)?;
        let task_id = require_id("task_id", task_id)?;
        self.call(
            HttpMethod::Get,
            format!("/rooms/{room_id}/tasks/{task_id}"),
            Payload::Empty,
            Resource::Task,
        )
    }

    pub fn build_update_task_status(
        &self,
        room_id: u64,
        task_id: u64,
        status: TaskStatus,
    ) -> Result<Call<TaskId>, ApiError> {
        let room_id = require_id("room_id", room_id)?;
        let task_id = require_id("task_id", task_id)?;
        let form = Form::new().field("body", status);
        self.call(
            HttpMethod::Put,
            format!("/rooms/{room_id}/tasks/{task_id}/status"),
            Payload::Form(form),
            Resource::Task,
        )
    }

    // -- files --------------------------------------------------------------

    pub fn build_get_files(&self, room_id: u64, account_id: Option<u64>) -> Result<Call<Vec<File>>, ApiError> {
        let room_id = require_id("room_id", room_id)?;
        let query = Query::new().param("account_id", account_id);
        self.call(
            HttpMethod::Get,
            format!("/rooms/{room_id}/files{}", query.finish()),
            Payload::Empty,
            Resource::File,
        )
        .map(Call::empty_as_list)
    }

    pub fn build_upload_file(&self, room_id: u64, input: &UploadFile) -> Result<Call<FileId>, ApiError> {
        let room_id = require_id("room_id", room_id)?;
        let filename = require_str("file", &input.filename)?;
        let content_type = input
            .content_type
            .as_deref()
            .filter(|ct| !ct.trim().is_empty())
            .unwrap_or("application/octet-stream");
        let mut multipart = Multipart::new().file("file", filename, content_type, &input.content);
        if let Some(message) = input.message.as_deref().filter(|m| !m.is_empty()) {
            multipart = multipart.text("message", message);
        }
        self.call(
            HttpMethod::Post,
            format!("/rooms/{room_id}/files"),
            Payload::Multipart(multipart),
            Resource::File,
        )
    }

    /// File metadata; with `create_download_url` the record carries a link
    /// that stays valid for about 30 seconds.
    pub fn build_get_file(
        &self,
        room_id: u64,
        file_id: u64,
        create_download_url: bool,
    ) -> Result<Call<File>, ApiError> {
        let room_id = require_id("room_id", room_id)?;
        let file_id = require_id("file_id", file_id)?;
        let query = Query::new().param("create_download_url", create_download_url);
        self.call(
            HttpMethod::Get,
            format!("/rooms/{room_id}/files/{file_id}{}", query.finish()),
            Payload::Empty,
            Resource::File,
        )
    }

    // -- invitation links ---------------------------------------------------

    pub fn build_get_link(&self, room_id: u64) -> Result<Call<InvitationLink>, ApiError> {
        let room_id = require_id("room_id", room_id)?;
        self.call(
            HttpMethod::Get,
            format!("/rooms/{room_id}/link"),
            Payload::Empty,
            Resource::Room,
        )
    }

    pub fn build_create_link(&self, room_id: u64, input: &LinkOptions) -> Result<Call<InvitationLink>, ApiError> {
        self.link_request(HttpMethod::Post, room_id, input)
    }

    pub fn build_update_link(&self, room_id: u64, input: &LinkOptions) -> Result<Call<InvitationLink>, ApiError> {
        self.link_request(HttpMethod::Put, room_id, input)
    }

    pub fn build_delete_link(&self, room_id: u64) -> Result<Call<InvitationLink>, ApiError> {
        let room_id = require_id("room_id", room_id)?;
        self.call(
            HttpMethod::Delete,
            format!("/rooms/{room_id}/link"),
            Payload::Empty,
            Resource::Room,
        )
    }

    fn link_request(
        &self,
        method: HttpMethod,
        room_id: u64,
        input: &LinkOptions,
    ) -> Result<Call<InvitationLink>, ApiError> {
        let room_id = require_id("room_id", room_id)?;
        let form = Form::new()
            .optional("code", input.code.as_deref())
            .optional("description", input.description.as_deref())
            .flag("need_acceptance", input.need_acceptance);
        self.call(
            method,
            format!("/rooms/{room_id}/link"),
            Payload::Form(form),
            Resource::Room,
        )
    }

    // -- contact requests ---------------------------------------------------

    pub fn build_get_incoming_requests(&self) -> Result<Call<Vec<IncomingRequest>>, ApiError> {
        self.call(
            HttpMethod::Get,
            "/incoming_requests".to_string(),
            Payload::Empty,
            Resource::Contact,
        )
        .map(Call::empty_as_list)
    }

    pub fn build_approve_request(&self, request_id: u64) -> Result<Call<Contact>, ApiError> {
        let request_id = require_id("request_id", request_id)?;
        self.call(
            HttpMethod::Put,
            format!("/incoming_requests/{request_id}"),
            Payload::Empty,
            Resource::Contact,
        )
    }

    pub fn build_reject_request(&self, request_id: u64) -> Result<Call<()>, ApiError> {
        let request_id = require_id("request_id", request_id)?;
        self.call(
            HttpMethod::Delete,
            format!("/incoming_requests/{request_id}"),
            Payload::Empty,
            Resource::Contact,
        )
    }

    fn call<T>(
        &self,
        method: HttpMethod,
        path: String,
        payload: Payload,
        resource: Resource,
    ) -> Result<Call<T>, ApiError> {
        let token = require_str("token", &self.token)?;
        let mut headers = vec![(TOKEN_HEADER.to_string(), token.to_string())];
        let body = match payload {
            Payload::Empty => None,
            Payload::Form(form) => {
                headers.push(("Content-Type".to_string(), FORM_CONTENT_TYPE.to_string()));
                Some(form.encode().into_bytes())
            }
            Payload::Multipart(multipart) => {
                headers.push(("Content-Type".to_string(), multipart.content_type()));
                Some(multipart.finish())
            }
        };
        let url = format!("{}{path}", self.base_url);
        debug!(method = method.as_str(), %url, "built chatwork request");
        Ok(Call::new(
            HttpRequest {
                method,
                url,
                headers,
                body,
            },
            resource,
        ))
    }
}
