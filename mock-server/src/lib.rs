//! In-memory stand-in for the Chatwork v2 API.
//!
//! Covers the account, contact, room, member, message, task, file and
//! invitation-link endpoints. Requests are authenticated by the
//! `X-ChatWorkToken` header; the token `RATE_LIMITED_TOKEN` always gets a
//! 429. Form bodies are checked the way the real service checks them,
//! including rejecting deadlines that are not plain digits.

use std::{collections::BTreeMap, sync::Arc};

use axum::{
    extract::{Multipart, Path, Query, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, put},
    Form, Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::{net::TcpListener, sync::RwLock};
use tracing::debug;

pub const TOKEN_HEADER: &str = "x-chatworktoken";
pub const TOKEN: &str = "test-token";
pub const RATE_LIMITED_TOKEN: &str = "rate-limited";
pub const RATE_LIMIT_RESET: u64 = 1_390_941_626;

pub const MY_ACCOUNT_ID: u64 = 1;
pub const MY_ROOM_ID: u64 = 1;
const BASE_TIME: i64 = 1_384_242_850;
const DIRECT_ROOM_BASE: u64 = 1000;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AccountView {
    pub account_id: u64,
    pub name: String,
    pub avatar_image_url: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RoomView {
    pub room_id: u64,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub role: String,
    pub sticky: bool,
    pub unread_num: u64,
    pub mention_num: u64,
    pub mytask_num: u64,
    pub message_num: u64,
    pub file_num: u64,
    pub task_num: u64,
    pub icon_path: String,
    pub last_update_time: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MemberView {
    pub account_id: u64,
    pub role: String,
    pub name: String,
    pub chatwork_id: String,
    pub organization_id: u64,
    pub organization_name: String,
    pub department: String,
    pub avatar_image_url: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MessageView {
    pub message_id: String,
    pub account: AccountView,
    pub body: String,
    pub send_time: i64,
    pub update_time: i64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TaskView {
    pub task_id: u64,
    pub account: AccountView,
    pub assigned_by_account: AccountView,
    pub message_id: String,
    pub body: String,
    pub limit_time: i64,
    pub status: String,
    pub limit_type: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FileView {
    pub file_id: u64,
    pub account: AccountView,
    pub message_id: String,
    pub filename: String,
    pub filesize: u64,
    pub upload_time: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LinkView {
    pub public: bool,
    pub url: String,
    pub need_acceptance: bool,
    pub description: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ContactView {
    pub account_id: u64,
    pub room_id: u64,
    pub name: String,
    pub chatwork_id: String,
    pub organization_id: u64,
    pub organization_name: String,
    pub department: String,
    pub avatar_image_url: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RequestView {
    pub request_id: u64,
    pub account_id: u64,
    pub message: String,
    pub name: String,
    pub chatwork_id: String,
    pub organization_id: u64,
    pub organization_name: String,
    pub department: String,
    pub avatar_image_url: String,
}

#[derive(Debug)]
struct RoomRecord {
    name: String,
    kind: &'static str,
    description: String,
    icon: String,
    members: Vec<(u64, &'static str)>,
    messages: Vec<MessageView>,
    seen: usize,
    tasks: Vec<TaskView>,
    files: Vec<FileView>,
    link: Option<LinkView>,
}

impl RoomRecord {
    fn new(
        name: String,
        kind: &'static str,
        description: String,
        members: Vec<(u64, &'static str)>,
    ) -> Self {
        Self {
            name,
            kind,
            description,
            icon: kind.to_string(),
            members,
            messages: Vec::new(),
            seen: 0,
            tasks: Vec::new(),
            files: Vec::new(),
            link: None,
        }
    }

    fn icon_path(&self) -> String {
        format!("https://appdata.chatwork.com/icon/ico_{}.png", self.icon)
    }

    fn unread(&self) -> u64 {
        (self.messages.len() - self.seen) as u64
    }

    fn my_open_tasks(&self) -> u64 {
        self.tasks
            .iter()
            .filter(|t| t.account.account_id == MY_ACCOUNT_ID && t.status == "open")
            .count() as u64
    }

    fn my_role(&self) -> &'static str {
        self.members
            .iter()
            .find(|(id, _)| *id == MY_ACCOUNT_ID)
            .map_or("member", |(_, role)| *role)
    }

    fn view(&self, room_id: u64, with_description: bool) -> RoomView {
        RoomView {
            room_id,
            name: self.name.clone(),
            kind: self.kind.to_string(),
            role: self.my_role().to_string(),
            sticky: false,
            unread_num: self.unread(),
            mention_num: 0,
            mytask_num: self.my_open_tasks(),
            message_num: self.messages.len() as u64,
            file_num: self.files.len() as u64,
            task_num: self.tasks.len() as u64,
            icon_path: self.icon_path(),
            last_update_time: self.messages.last().map_or(BASE_TIME, |m| m.send_time),
            description: with_description.then(|| self.description.clone()),
        }
    }

    fn unread_counts(&self) -> serde_json::Value {
        json!({ "unread_num": self.unread(), "mention_num": 0 })
    }

    fn message_index(&self, message_id: &str) -> Result<usize, Failure> {
        self.messages
            .iter()
            .position(|m| m.message_id == message_id)
            .ok_or_else(|| Failure::not_found("message"))
    }
}

#[derive(Debug)]
pub struct Db {
    rooms: BTreeMap<u64, RoomRecord>,
    contacts: Vec<ContactView>,
    requests: BTreeMap<u64, RequestView>,
    next_room_id: u64,
    next_message_id: u64,
    next_task_id: u64,
    next_file_id: u64,
}

impl Default for Db {
    fn default() -> Self {
        let mut rooms = BTreeMap::new();
        rooms.insert(
            MY_ROOM_ID,
            RoomRecord::new(
                "My Chat".to_string(),
                "my",
                String::new(),
                vec![(MY_ACCOUNT_ID, "admin")],
            ),
        );
        let requests = [(1, 5), (2, 6)]
            .into_iter()
            .map(|(request_id, account_id)| {
                let profile = account(account_id);
                let request = RequestView {
                    request_id,
                    account_id,
                    message: format!("Hello, this is {}", profile.name),
                    name: profile.name,
                    chatwork_id: format!("user{account_id}"),
                    organization_id: 0,
                    organization_name: String::new(),
                    department: String::new(),
                    avatar_image_url: profile.avatar_image_url,
                };
                (request_id, request)
            })
            .collect();
        Self {
            rooms,
            contacts: vec![contact(2)],
            requests,
            next_room_id: MY_ROOM_ID + 1,
            next_message_id: 1,
            next_task_id: 1,
            next_file_id: 1,
        }
    }
}

impl Db {
    fn room(&self, room_id: u64) -> Result<&RoomRecord, Failure> {
        self.rooms.get(&room_id).ok_or_else(|| Failure::not_found("room"))
    }

    fn room_mut(&mut self, room_id: u64) -> Result<&mut RoomRecord, Failure> {
        self.rooms
            .get_mut(&room_id)
            .ok_or_else(|| Failure::not_found("room"))
    }
}

#[derive(Clone)]
pub struct AppState {
    token: Arc<str>,
    db: Arc<RwLock<Db>>,
}

/// A failed call: status plus Chatwork's `{"errors": [...]}` body.
pub struct Failure(StatusCode, String);

impl Failure {
    fn bad_request(message: impl Into<String>) -> Self {
        Failure(StatusCode::BAD_REQUEST, message.into())
    }

    fn not_found(what: &str) -> Self {
        Failure(StatusCode::NOT_FOUND, format!("{what} not found"))
    }
}

impl IntoResponse for Failure {
    fn into_response(self) -> Response {
        (self.0, Json(json!({ "errors": [self.1] }))).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, Failure>;

fn me() -> AccountView {
    AccountView {
        account_id: MY_ACCOUNT_ID,
        name: "Mock User".to_string(),
        avatar_image_url: "https://example.com/mock.png".to_string(),
    }
}

fn account(account_id: u64) -> AccountView {
    if account_id == MY_ACCOUNT_ID {
        return me();
    }
    AccountView {
        account_id,
        name: format!("User {account_id}"),
        avatar_image_url: String::new(),
    }
}

fn contact(account_id: u64) -> ContactView {
    let profile = account(account_id);
    ContactView {
        account_id,
        room_id: DIRECT_ROOM_BASE + account_id,
        name: profile.name,
        chatwork_id: format!("user{account_id}"),
        organization_id: 0,
        organization_name: String::new(),
        department: String::new(),
        avatar_image_url: profile.avatar_image_url,
    }
}

fn required<'a>(name: &str, value: &'a Option<String>) -> Result<&'a str, Failure> {
    value
        .as_deref()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| Failure::bad_request(format!("Parameter {name} is required")))
}

fn parse_ids(name: &str, value: &str) -> Result<Vec<u64>, Failure> {
    value
        .split(',')
        .map(|id| {
            id.parse::<u64>()
                .map_err(|_| Failure::bad_request(format!("Parameter {name} must be a list of account ids")))
        })
        .collect()
}

fn parse_flag(name: &str, value: &Option<String>) -> Result<bool, Failure> {
    match value.as_deref() {
        None | Some("0") => Ok(false),
        Some("1") => Ok(true),
        Some(_) => Err(Failure::bad_request(format!("Parameter {name} must be 0 or 1"))),
    }
}

/// Admins are required; member and readonly lists may be blank.
fn parse_roles(
    admins: &Option<String>,
    members: &Option<String>,
    readonly: &Option<String>,
) -> Result<Vec<(u64, &'static str)>, Failure> {
    let mut roles: Vec<(u64, &'static str)> =
        parse_ids("members_admin_ids", required("members_admin_ids", admins)?)?
            .into_iter()
            .map(|id| (id, "admin"))
            .collect();
    for (field, role, value) in [
        ("members_member_ids", "member", members),
        ("members_readonly_ids", "readonly", readonly),
    ] {
        if let Some(ids) = value.as_deref().filter(|v| !v.is_empty()) {
            roles.extend(parse_ids(field, ids)?.into_iter().map(|id| (id, role)));
        }
    }
    Ok(roles)
}

pub fn app() -> Router {
    app_with_token(TOKEN)
}

pub fn app_with_token(token: &str) -> Router {
    let state = AppState {
        token: Arc::from(token),
        db: Arc::new(RwLock::new(Db::default())),
    };
    Router::new()
        .route("/me", get(get_me))
        .route("/my/status", get(get_my_status))
        .route("/my/tasks", get(list_my_tasks))
        .route("/contacts", get(list_contacts))
        .route("/incoming_requests", get(list_requests))
        .route(
            "/incoming_requests/{request_id}",
            put(approve_request).delete(reject_request),
        )
        .route("/rooms", get(list_rooms).post(create_room))
        .route(
            "/rooms/{room_id}",
            get(get_room).put(update_room).delete(delete_room),
        )
        .route(
            "/rooms/{room_id}/members",
            get(list_members).put(update_members),
        )
        .route(
            "/rooms/{room_id}/messages",
            get(list_messages).post(post_message),
        )
        .route("/rooms/{room_id}/messages/read", put(mark_read))
        .route("/rooms/{room_id}/messages/unread", put(mark_unread))
        .route(
            "/rooms/{room_id}/messages/{message_id}",
            get(get_message).put(update_message).delete(delete_message),
        )
        .route("/rooms/{room_id}/tasks", get(list_tasks).post(create_task))
        .route("/rooms/{room_id}/tasks/{task_id}", get(get_task))
        .route(
            "/rooms/{room_id}/tasks/{task_id}/status",
            put(update_task_status),
        )
        .route("/rooms/{room_id}/files", get(list_files).post(upload_file))
        .route("/rooms/{room_id}/files/{file_id}", get(get_file))
        .route(
            "/rooms/{room_id}/link",
            get(get_link)
                .post(create_link)
                .put(update_link)
                .delete(delete_link),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), authenticate))
        .with_state(state)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn authenticate(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let token = request
        .headers()
        .get(TOKEN_HEADER)
        .and_then(|value| value.to_str().ok());
    match token {
        Some(RATE_LIMITED_TOKEN) => (
            StatusCode::TOO_MANY_REQUESTS,
            [("x-ratelimit-reset", RATE_LIMIT_RESET.to_string())],
            Json(json!({ "errors": ["Rate limit exceeded"] })),
        )
            .into_response(),
        Some(token) if token == &*state.token => next.run(request).await,
        _ => Failure(StatusCode::UNAUTHORIZED, "Invalid API token".to_string()).into_response(),
    }
}

// --- account ---

async fn get_me() -> Json<serde_json::Value> {
    Json(json!({
        "account_id": MY_ACCOUNT_ID,
        "room_id": MY_ROOM_ID,
        "name": "Mock User",
        "chatwork_id": "mock",
        "organization_id": 101,
        "organization_name": "Mock Inc.",
        "department": "Engineering",
        "avatar_image_url": "https://example.com/mock.png",
    }))
}

async fn get_my_status(State(state): State<AppState>) -> Json<serde_json::Value> {
    let db = state.db.read().await;
    let rooms = || db.rooms.values();
    Json(json!({
        "unread_room_num": rooms().filter(|r| r.unread() > 0).count(),
        "mention_room_num": 0,
        "mytask_room_num": rooms().filter(|r| r.my_open_tasks() > 0).count(),
        "unread_num": rooms().map(RoomRecord::unread).sum::<u64>(),
        "mention_num": 0,
        "mytask_num": rooms().map(RoomRecord::my_open_tasks).sum::<u64>(),
    }))
}

#[derive(Deserialize)]
pub struct MyTaskFilter {
    pub assigned_by_account_id: Option<u64>,
    pub status: Option<String>,
}

async fn list_my_tasks(
    State(state): State<AppState>,
    Query(filter): Query<MyTaskFilter>,
) -> Json<Vec<serde_json::Value>> {
    let db = state.db.read().await;
    let tasks = db
        .rooms
        .iter()
        .flat_map(|(room_id, room)| room.tasks.iter().map(move |task| (*room_id, room, task)))
        .filter(|(_, _, t)| t.account.account_id == MY_ACCOUNT_ID)
        .filter(|(_, _, t)| {
            filter
                .assigned_by_account_id
                .map_or(true, |id| t.assigned_by_account.account_id == id)
        })
        .filter(|(_, _, t)| filter.status.as_deref().map_or(true, |s| t.status == s))
        .map(|(room_id, room, t)| {
            json!({
                "task_id": t.task_id,
                "room": { "room_id": room_id, "name": room.name, "icon_path": room.icon_path() },
                "assigned_by_account": t.assigned_by_account,
                "message_id": t.message_id,
                "body": t.body,
                "limit_time": t.limit_time,
                "status": t.status,
                "limit_type": t.limit_type,
            })
        })
        .collect();
    Json(tasks)
}

async fn list_contacts(State(state): State<AppState>) -> Json<Vec<ContactView>> {
    Json(state.db.read().await.contacts.clone())
}

// --- contact requests ---

async fn list_requests(State(state): State<AppState>) -> Json<Vec<RequestView>> {
    Json(state.db.read().await.requests.values().cloned().collect())
}

async fn approve_request(
    State(state): State<AppState>,
    Path(request_id): Path<u64>,
) -> ApiResult<ContactView> {
    let mut db = state.db.write().await;
    let request = db
        .requests
        .remove(&request_id)
        .ok_or_else(|| Failure::not_found("request"))?;
    let contact = contact(request.account_id);
    db.contacts.push(contact.clone());
    Ok(Json(contact))
}

async fn reject_request(
    State(state): State<AppState>,
    Path(request_id): Path<u64>,
) -> Result<StatusCode, Failure> {
    let mut db = state.db.write().await;
    db.requests
        .remove(&request_id)
        .ok_or_else(|| Failure::not_found("request"))?;
    Ok(StatusCode::NO_CONTENT)
}

// --- rooms ---

async fn list_rooms(State(state): State<AppState>) -> Json<Vec<RoomView>> {
    let db = state.db.read().await;
    Json(
        db.rooms
            .iter()
            .map(|(id, room)| room.view(*id, false))
            .collect(),
    )
}

#[derive(Deserialize)]
pub struct CreateRoomForm {
    pub name: Option<String>,
    pub description: Option<String>,
    pub icon_preset: Option<String>,
    pub members_admin_ids: Option<String>,
    pub members_member_ids: Option<String>,
    pub members_readonly_ids: Option<String>,
}

async fn create_room(
    State(state): State<AppState>,
    Form(input): Form<CreateRoomForm>,
) -> ApiResult<serde_json::Value> {
    let name = required("name", &input.name)?.to_string();
    let members = parse_roles(
        &input.members_admin_ids,
        &input.members_member_ids,
        &input.members_readonly_ids,
    )?;
    debug!(%name, icon = ?input.icon_preset, "creating room");

    let mut room = RoomRecord::new(name, "group", input.description.unwrap_or_default(), members);
    if let Some(icon) = input.icon_preset {
        room.icon = icon;
    }
    let mut db = state.db.write().await;
    let room_id = db.next_room_id;
    db.next_room_id += 1;
    db.rooms.insert(room_id, room);
    Ok(Json(json!({ "room_id": room_id })))
}

async fn get_room(State(state): State<AppState>, Path(room_id): Path<u64>) -> ApiResult<RoomView> {
    let db = state.db.read().await;
    Ok(Json(db.room(room_id)?.view(room_id, true)))
}

#[derive(Deserialize)]
pub struct UpdateRoomForm {
    pub name: Option<String>,
    pub description: Option<String>,
    pub icon_preset: Option<String>,
}

async fn update_room(
    State(state): State<AppState>,
    Path(room_id): Path<u64>,
    Form(input): Form<UpdateRoomForm>,
) -> ApiResult<serde_json::Value> {
    let mut db = state.db.write().await;
    let room = db.room_mut(room_id)?;
    if let Some(name) = input.name.filter(|n| !n.trim().is_empty()) {
        room.name = name;
    }
    if let Some(description) = input.description {
        room.description = description;
    }
    if let Some(icon) = input.icon_preset {
        room.icon = icon;
    }
    Ok(Json(json!({ "room_id": room_id })))
}

#[derive(Deserialize)]
pub struct DeleteRoomForm {
    pub action_type: Option<String>,
}

async fn delete_room(
    State(state): State<AppState>,
    Path(room_id): Path<u64>,
    Form(input): Form<DeleteRoomForm>,
) -> Result<StatusCode, Failure> {
    let action = required("action_type", &input.action_type)?;
    if action != "leave" && action != "delete" {
        return Err(Failure::bad_request("Parameter action_type must be leave or delete"));
    }
    let mut db = state.db.write().await;
    db.room(room_id)?;
    debug!(room_id, action, "removing room");
    db.rooms.remove(&room_id);
    Ok(StatusCode::NO_CONTENT)
}

// --- members ---

async fn list_members(
    State(state): State<AppState>,
    Path(room_id): Path<u64>,
) -> ApiResult<Vec<MemberView>> {
    let db = state.db.read().await;
    let members = db
        .room(room_id)?
        .members
        .iter()
        .map(|(account_id, role)| {
            let profile = account(*account_id);
            MemberView {
                account_id: *account_id,
                role: role.to_string(),
                name: profile.name,
                chatwork_id: format!("user{account_id}"),
                organization_id: 0,
                organization_name: String::new(),
                department: String::new(),
                avatar_image_url: profile.avatar_image_url,
            }
        })
        .collect();
    Ok(Json(members))
}

#[derive(Deserialize)]
pub struct MembersForm {
    pub members_admin_ids: Option<String>,
    pub members_member_ids: Option<String>,
    pub members_readonly_ids: Option<String>,
}

async fn update_members(
    State(state): State<AppState>,
    Path(room_id): Path<u64>,
    Form(input): Form<MembersForm>,
) -> ApiResult<serde_json::Value> {
    let members = parse_roles(
        &input.members_admin_ids,
        &input.members_member_ids,
        &input.members_readonly_ids,
    )?;
    let mut db = state.db.write().await;
    let room = db.room_mut(room_id)?;
    let ids = |role: &str| -> Vec<u64> {
        members
            .iter()
            .filter(|(_, r)| *r == role)
            .map(|(id, _)| *id)
            .collect()
    };
    let roles = json!({
        "admin": ids("admin"),
        "member": ids("member"),
        "readonly": ids("readonly"),
    });
    room.members = members;
    Ok(Json(roles))
}

// --- messages ---

#[derive(Deserialize)]
pub struct MessagesQuery {
    pub force: Option<u8>,
}

async fn list_messages(
    State(state): State<AppState>,
    Path(room_id): Path<u64>,
    Query(query): Query<MessagesQuery>,
) -> Result<Response, Failure> {
    let mut db = state.db.write().await;
    let room = db.room_mut(room_id)?;
    let start = if query.force == Some(1) {
        room.messages.len().saturating_sub(100)
    } else {
        room.seen
    };
    let messages = room.messages[start..].to_vec();
    room.seen = room.messages.len();
    if messages.is_empty() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }
    Ok(Json(messages).into_response())
}

#[derive(Deserialize)]
pub struct MessageForm {
    pub body: Option<String>,
    pub self_unread: Option<String>,
}

/// Append a message from the caller and return its id.
fn push_message(db: &mut Db, room_id: u64, body: String, self_unread: bool) -> Result<String, Failure> {
    let message_id = db.next_message_id;
    let room = db
        .rooms
        .get_mut(&room_id)
        .ok_or_else(|| Failure::not_found("room"))?;
    db.next_message_id += 1;
    room.messages.push(MessageView {
        message_id: message_id.to_string(),
        account: me(),
        body,
        send_time: BASE_TIME + message_id as i64,
        update_time: 0,
    });
    if !self_unread {
        room.seen = room.messages.len();
    }
    Ok(message_id.to_string())
}

async fn post_message(
    State(state): State<AppState>,
    Path(room_id): Path<u64>,
    Form(input): Form<MessageForm>,
) -> ApiResult<serde_json::Value> {
    let body = required("body", &input.body)?.to_string();
    let self_unread = parse_flag("self_unread", &input.self_unread)?;

    let mut db = state.db.write().await;
    let message_id = push_message(&mut db, room_id, body, self_unread)?;
    Ok(Json(json!({ "message_id": message_id })))
}

#[derive(Deserialize)]
pub struct ReadForm {
    pub message_id: Option<String>,
}

async fn mark_read(
    State(state): State<AppState>,
    Path(room_id): Path<u64>,
    Form(input): Form<ReadForm>,
) -> ApiResult<serde_json::Value> {
    let mut db = state.db.write().await;
    let room = db.room_mut(room_id)?;
    room.seen = match input.message_id.as_deref().filter(|id| !id.is_empty()) {
        Some(message_id) => room.message_index(message_id)? + 1,
        None => room.messages.len(),
    };
    Ok(Json(room.unread_counts()))
}

async fn mark_unread(
    State(state): State<AppState>,
    Path(room_id): Path<u64>,
    Form(input): Form<ReadForm>,
) -> ApiResult<serde_json::Value> {
    let message_id = required("message_id", &input.message_id)?;
    let mut db = state.db.write().await;
    let room = db.room_mut(room_id)?;
    room.seen = room.message_index(message_id)?;
    Ok(Json(room.unread_counts()))
}

async fn get_message(
    State(state): State<AppState>,
    Path((room_id, message_id)): Path<(u64, String)>,
) -> ApiResult<MessageView> {
    let db = state.db.read().await;
    let room = db.room(room_id)?;
    let index = room.message_index(&message_id)?;
    Ok(Json(room.messages[index].clone()))
}

#[derive(Deserialize)]
pub struct BodyForm {
    pub body: Option<String>,
}

async fn update_message(
    State(state): State<AppState>,
    Path((room_id, message_id)): Path<(u64, String)>,
    Form(input): Form<BodyForm>,
) -> ApiResult<serde_json::Value> {
    let body = required("body", &input.body)?.to_string();
    let mut db = state.db.write().await;
    let room = db.room_mut(room_id)?;
    let index = room.message_index(&message_id)?;
    let message = &mut room.messages[index];
    message.body = body;
    message.update_time = message.send_time + 60;
    Ok(Json(json!({ "message_id": message_id })))
}

async fn delete_message(
    State(state): State<AppState>,
    Path((room_id, message_id)): Path<(u64, String)>,
) -> ApiResult<serde_json::Value> {
    let mut db = state.db.write().await;
    let room = db.room_mut(room_id)?;
    let index = room.message_index(&message_id)?;
    room.messages.remove(index);
    room.seen = room.seen.min(room.messages.len());
    Ok(Json(json!({ "message_id": message_id })))
}

// --- tasks ---

#[derive(Deserialize)]
pub struct TaskFilter {
    pub account_id: Option<u64>,
    pub assigned_by_account_id: Option<u64>,
    pub status: Option<String>,
}

async fn list_tasks(
    State(state): State<AppState>,
    Path(room_id): Path<u64>,
    Query(filter): Query<TaskFilter>,
) -> ApiResult<Vec<TaskView>> {
    let db = state.db.read().await;
    let tasks = db
        .room(room_id)?
        .tasks
        .iter()
        .filter(|t| filter.account_id.map_or(true, |id| t.account.account_id == id))
        .filter(|t| {
            filter
                .assigned_by_account_id
                .map_or(true, |id| t.assigned_by_account.account_id == id)
        })
        .filter(|t| filter.status.as_deref().map_or(true, |s| t.status == s))
        .cloned()
        .collect();
    Ok(Json(tasks))
}

#[derive(Deserialize)]
pub struct TaskForm {
    pub body: Option<String>,
    pub to_ids: Option<String>,
    pub limit: Option<String>,
    pub limit_type: Option<String>,
}

async fn create_task(
    State(state): State<AppState>,
    Path(room_id): Path<u64>,
    Form(input): Form<TaskForm>,
) -> ApiResult<serde_json::Value> {
    let body = required("body", &input.body)?.to_string();
    let to_ids = parse_ids("to_ids", required("to_ids", &input.to_ids)?)?;
    let limit_time = match input.limit.as_deref() {
        None => 0,
        Some(limit) if !limit.is_empty() && limit.bytes().all(|b| b.is_ascii_digit()) => limit
            .parse::<i64>()
            .map_err(|_| Failure::bad_request("Parameter limit is out of range"))?,
        Some(_) => return Err(Failure::bad_request("Parameter limit must be an integer")),
    };
    let limit_type = input.limit_type.unwrap_or_else(|| "time".to_string());
    if !["none", "date", "time"].contains(&limit_type.as_str()) {
        return Err(Failure::bad_request("Parameter limit_type is invalid"));
    }

    let mut guard = state.db.write().await;
    let db = &mut *guard;
    let room = db
        .rooms
        .get_mut(&room_id)
        .ok_or_else(|| Failure::not_found("room"))?;
    let first_id = db.next_task_id;
    db.next_task_id += to_ids.len() as u64;
    let mut task_ids = Vec::with_capacity(to_ids.len());
    for (offset, assignee) in to_ids.into_iter().enumerate() {
        let task_id = first_id + offset as u64;
        room.tasks.push(TaskView {
            task_id,
            account: account(assignee),
            assigned_by_account: me(),
            message_id: String::new(),
            body: body.clone(),
            limit_time,
            status: "open".to_string(),
            limit_type: limit_type.clone(),
        });
        task_ids.push(task_id);
    }
    Ok(Json(json!({ "task_ids": task_ids })))
}

async fn get_task(
    State(state): State<AppState>,
    Path((room_id, task_id)): Path<(u64, u64)>,
) -> ApiResult<TaskView> {
    let db = state.db.read().await;
    db.room(room_id)?
        .tasks
        .iter()
        .find(|t| t.task_id == task_id)
        .cloned()
        .map(Json)
        .ok_or_else(|| Failure::not_found("task"))
}

async fn update_task_status(
    State(state): State<AppState>,
    Path((room_id, task_id)): Path<(u64, u64)>,
    Form(input): Form<BodyForm>,
) -> ApiResult<serde_json::Value> {
    let status = required("body", &input.body)?;
    if status != "open" && status != "done" {
        return Err(Failure::bad_request("Parameter body must be open or done"));
    }
    let mut db = state.db.write().await;
    let task = db
        .room_mut(room_id)?
        .tasks
        .iter_mut()
        .find(|t| t.task_id == task_id)
        .ok_or_else(|| Failure::not_found("task"))?;
    task.status = status.to_string();
    Ok(Json(json!({ "task_id": task_id })))
}

// --- files ---

#[derive(Deserialize)]
pub struct FileFilter {
    pub account_id: Option<u64>,
}

async fn list_files(
    State(state): State<AppState>,
    Path(room_id): Path<u64>,
    Query(filter): Query<FileFilter>,
) -> ApiResult<Vec<FileView>> {
    let db = state.db.read().await;
    let files = db
        .room(room_id)?
        .files
        .iter()
        .filter(|f| filter.account_id.map_or(true, |id| f.account.account_id == id))
        .cloned()
        .collect();
    Ok(Json(files))
}

async fn upload_file(
    State(state): State<AppState>,
    Path(room_id): Path<u64>,
    mut multipart: Multipart,
) -> ApiResult<serde_json::Value> {
    let mut upload = None;
    let mut message = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Failure::bad_request(format!("Multipart error: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| Failure::bad_request(format!("Failed to read file: {e}")))?;
                upload = Some((filename, data.len() as u64));
            }
            "message" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| Failure::bad_request(format!("Failed to read message: {e}")))?;
                message = Some(text);
            }
            _ => {}
        }
    }
    let (filename, filesize) = upload
        .filter(|(name, _)| !name.is_empty())
        .ok_or_else(|| Failure::bad_request("Parameter file is required"))?;

    let mut db = state.db.write().await;
    db.room(room_id)?;
    let file_id = db.next_file_id;
    db.next_file_id += 1;
    let body = format!(
        "{}[download:{file_id}]{filename}[/download]",
        message.unwrap_or_default()
    );
    let message_id = push_message(&mut db, room_id, body, false)?;
    debug!(room_id, file_id, %filename, filesize, "file uploaded");

    let room = db.room_mut(room_id)?;
    room.files.push(FileView {
        file_id,
        account: me(),
        message_id,
        filename,
        filesize,
        upload_time: BASE_TIME + file_id as i64,
        download_url: None,
    });
    Ok(Json(json!({ "file_id": file_id })))
}

#[derive(Deserialize)]
pub struct FileQuery {
    pub create_download_url: Option<u8>,
}

async fn get_file(
    State(state): State<AppState>,
    Path((room_id, file_id)): Path<(u64, u64)>,
    Query(query): Query<FileQuery>,
) -> ApiResult<FileView> {
    let db = state.db.read().await;
    let mut file = db
        .room(room_id)?
        .files
        .iter()
        .find(|f| f.file_id == file_id)
        .cloned()
        .ok_or_else(|| Failure::not_found("file"))?;
    if query.create_download_url == Some(1) {
        file.download_url = Some(format!(
            "https://download.example.chatwork.com/{room_id}/{file_id}/{}",
            file.filename
        ));
    }
    Ok(Json(file))
}

// --- invitation links ---

#[derive(Deserialize)]
pub struct LinkForm {
    pub code: Option<String>,
    pub description: Option<String>,
    pub need_acceptance: Option<String>,
}

async fn get_link(
    State(state): State<AppState>,
    Path(room_id): Path<u64>,
) -> Result<Json<serde_json::Value>, Failure> {
    let db = state.db.read().await;
    Ok(Json(match &db.room(room_id)?.link {
        Some(link) => json!(link),
        None => json!({ "public": false }),
    }))
}

async fn create_link(
    State(state): State<AppState>,
    Path(room_id): Path<u64>,
    Form(input): Form<LinkForm>,
) -> ApiResult<LinkView> {
    let need_acceptance = parse_flag("need_acceptance", &input.need_acceptance)?;
    let mut db = state.db.write().await;
    let room = db.room_mut(room_id)?;
    if room.link.is_some() {
        return Err(Failure::bad_request("Invitation link already exists"));
    }
    let code = input.code.unwrap_or_else(|| format!("room{room_id}"));
    let link = LinkView {
        public: true,
        url: format!("https://example.chatwork.com/g/{code}"),
        need_acceptance,
        description: input.description.unwrap_or_default(),
    };
    room.link = Some(link.clone());
    Ok(Json(link))
}

async fn update_link(
    State(state): State<AppState>,
    Path(room_id): Path<u64>,
    Form(input): Form<LinkForm>,
) -> ApiResult<LinkView> {
    let need_acceptance = match input.need_acceptance {
        Some(_) => Some(parse_flag("need_acceptance", &input.need_acceptance)?),
        None => None,
    };
    let mut db = state.db.write().await;
    let link = db
        .room_mut(room_id)?
        .link
        .as_mut()
        .ok_or_else(|| Failure::bad_request("Invitation link does not exist"))?;
    if let Some(code) = input.code {
        link.url = format!("https://example.chatwork.com/g/{code}");
    }
    if let Some(description) = input.description {
        link.description = description;
    }
    if let Some(need_acceptance) = need_acceptance {
        link.need_acceptance = need_acceptance;
    }
    Ok(Json(link.clone()))
}

async fn delete_link(
    State(state): State<AppState>,
    Path(room_id): Path<u64>,
) -> ApiResult<serde_json::Value> {
    let mut db = state.db.write().await;
    if db.room_mut(room_id)?.link.take().is_none() {
        return Err(Failure::bad_request("Invitation link does not exist"));
    }
    Ok(Json(json!({ "public": false })))
}
