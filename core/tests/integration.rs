//! End-to-end tests against the live mock server.
//!
//! # Design
//! Starts the mock server on a random port, then drives the client over real
//! HTTP through `UreqTransport`. Validates that request building, form
//! encoding and response mapping agree with an actual server.

#![cfg(feature = "ureq")]

use chatwork_core::{
    AccountIds, ApiError, ChatworkClient, CreateRoom, CreateTask, IconPreset, LinkOptions,
    MemberRoles, MyTasksQuery, Resource, RoomAction, RoomRole, RoomTasksQuery, SendMessage,
    TaskLimitType, TaskStatus, UpdateMembers, UpdateRoom, UploadFile, UreqTransport,
};

/// Start the mock server on an ephemeral port and return its base URL.
fn start_server() -> String {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run(listener).await
        })
        .unwrap();
    });

    format!("http://{addr}")
}

#[test]
fn room_message_task_lifecycle() {
    let base_url = start_server();
    let client = ChatworkClient::with_base_url(mock_server::TOKEN, &base_url);
    let transport = UreqTransport::new();

    // Step 1: who am I.
    let me = client.build_get_me().unwrap().send(&transport).unwrap();
    assert_eq!(me.account_id, mock_server::MY_ACCOUNT_ID);

    // Step 2: create a room with a list of admins.
    let created = client
        .build_create_room(&CreateRoom {
            name: "Website renewal project".to_string(),
            members_admin_ids: AccountIds::from(vec![1, 2, 3]),
            description: Some("kickoff & planning".to_string()),
            ..Default::default()
        })
        .unwrap()
        .send(&transport)
        .unwrap();
    let room_id = created.room_id;

    let room = client.build_get_room(room_id).unwrap().send(&transport).unwrap();
    assert_eq!(room.name, "Website renewal project");
    assert_eq!(room.description.as_deref(), Some("kickoff & planning"));

    let rooms = client.build_get_rooms().unwrap().send(&transport).unwrap();
    assert_eq!(rooms.len(), 2);

    // Step 3: post a message that stays unread, then read it back.
    let posted = client
        .build_send_message(
            room_id,
            &SendMessage {
                body: "Hello, team!".to_string(),
                self_unread: Some(true),
            },
        )
        .unwrap()
        .send(&transport)
        .unwrap();

    let messages = client
        .build_get_messages(room_id, false)
        .unwrap()
        .send(&transport)
        .unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].message_id, posted.message_id);
    assert_eq!(messages[0].body, "Hello, team!");

    // Nothing new since the last fetch: 204 maps to an empty list.
    let messages = client
        .build_get_messages(room_id, false)
        .unwrap()
        .send(&transport)
        .unwrap();
    assert!(messages.is_empty());

    let messages = client
        .build_get_messages(room_id, true)
        .unwrap()
        .send(&transport)
        .unwrap();
    assert_eq!(messages.len(), 1);

    // Step 4: edit and delete the message.
    client
        .build_update_message(room_id, &posted.message_id, "Hello again")
        .unwrap()
        .send(&transport)
        .unwrap();
    let message = client
        .build_get_message(room_id, &posted.message_id)
        .unwrap()
        .send(&transport)
        .unwrap();
    assert_eq!(message.body, "Hello again");

    client
        .build_delete_message(room_id, &posted.message_id)
        .unwrap()
        .send(&transport)
        .unwrap();
    let err = client
        .build_get_message(room_id, &posted.message_id)
        .unwrap()
        .send(&transport)
        .unwrap_err();
    assert!(matches!(err, ApiError::NotFound { resource: Resource::Message }));

    // Step 5: a task with an exponent deadline reaches the server as digits.
    let task_ids = client
        .build_create_task(
            room_id,
            &CreateTask {
                body: "Review the draft".to_string(),
                to_ids: AccountIds::from(vec![2, 3]),
                limit: Some("1.7e9".parse().unwrap()),
                limit_type: Some(TaskLimitType::Date),
            },
        )
        .unwrap()
        .send(&transport)
        .unwrap();
    assert_eq!(task_ids.task_ids.len(), 2);

    let task = client
        .build_get_task(room_id, task_ids.task_ids[0])
        .unwrap()
        .send(&transport)
        .unwrap();
    assert_eq!(task.limit_time, 1_700_000_000);
    assert_eq!(task.limit_type, TaskLimitType::Date);
    assert_eq!(task.status, TaskStatus::Open);

    client
        .build_update_task_status(room_id, task.task_id, TaskStatus::Done)
        .unwrap()
        .send(&transport)
        .unwrap();

    let open = client
        .build_get_room_tasks(
            room_id,
            &RoomTasksQuery {
                status: Some(TaskStatus::Open),
                ..Default::default()
            },
        )
        .unwrap()
        .send(&transport)
        .unwrap();
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].task_id, task_ids.task_ids[1]);

    let err = client
        .build_get_task(room_id, 9999)
        .unwrap()
        .send(&transport)
        .unwrap_err();
    assert!(matches!(err, ApiError::NotFound { resource: Resource::Task }));

    // Step 6: invitation link create, update, delete.
    let link = client
        .build_create_link(
            room_id,
            &LinkOptions {
                code: Some("renewal".to_string()),
                description: Some("Join us".to_string()),
                need_acceptance: Some(true),
            },
        )
        .unwrap()
        .send(&transport)
        .unwrap();
    assert!(link.public);
    assert!(link.need_acceptance);
    assert!(link.url.as_deref().unwrap().ends_with("/g/renewal"));

    let link = client
        .build_update_link(
            room_id,
            &LinkOptions {
                need_acceptance: Some(false),
                ..Default::default()
            },
        )
        .unwrap()
        .send(&transport)
        .unwrap();
    assert!(!link.need_acceptance);

    let link = client.build_delete_link(room_id).unwrap().send(&transport).unwrap();
    assert!(!link.public);

    // Creating a second link over an existing one is a 400.
    client
        .build_create_link(room_id, &LinkOptions::default())
        .unwrap()
        .send(&transport)
        .unwrap();
    let err = client
        .build_create_link(room_id, &LinkOptions::default())
        .unwrap()
        .send(&transport)
        .unwrap_err();
    assert!(matches!(err, ApiError::IncorrectParameters { errors } if !errors.is_empty()));
}

#[test]
fn send_message_to_my_chat() {
    let base_url = start_server();
    let client = ChatworkClient::with_base_url(mock_server::TOKEN, &base_url);
    let transport = UreqTransport::new();

    let id = client
        .send_message_to_my_chat(&transport, "note to self")
        .unwrap();
    let message = client
        .build_get_message(mock_server::MY_ROOM_ID, &id.message_id)
        .unwrap()
        .send(&transport)
        .unwrap();
    assert_eq!(message.body, "note to self");
}

#[test]
fn remote_errors_map_from_status() {
    let base_url = start_server();
    let transport = UreqTransport::new();

    let wrong_token = ChatworkClient::with_base_url("wrong", &base_url);
    let err = wrong_token.build_get_me().unwrap().send(&transport).unwrap_err();
    assert!(matches!(err, ApiError::Unauthorized));
    assert!(!err.is_local());

    let limited = ChatworkClient::with_base_url(mock_server::RATE_LIMITED_TOKEN, &base_url);
    let err = limited.build_get_rooms().unwrap().send(&transport).unwrap_err();
    assert!(matches!(
        err,
        ApiError::RateLimited { reset: Some(reset) } if reset == mock_server::RATE_LIMIT_RESET
    ));

    let client = ChatworkClient::with_base_url(mock_server::TOKEN, &base_url);
    let err = client.build_get_room(424242).unwrap().send(&transport).unwrap_err();
    assert!(matches!(err, ApiError::NotFound { resource: Resource::Room }));
}

#[test]
fn unreachable_host_is_a_transport_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = ChatworkClient::with_base_url("token", &format!("http://{addr}"));
    let err = client
        .build_get_me()
        .unwrap()
        .send(&UreqTransport::new())
        .unwrap_err();
    assert!(matches!(err, ApiError::Transport(_)));
}

/// Create a group room administered by the caller and return its id.
fn create_room(client: &ChatworkClient, transport: &UreqTransport, name: &str) -> u64 {
    client
        .build_create_room(&CreateRoom {
            name: name.to_string(),
            members_admin_ids: AccountIds::from(1),
            ..Default::default()
        })
        .unwrap()
        .send(transport)
        .unwrap()
        .room_id
}

#[test]
fn room_settings_and_members() {
    let base_url = start_server();
    let client = ChatworkClient::with_base_url(mock_server::TOKEN, &base_url);
    let transport = UreqTransport::new();
    let room_id = create_room(&client, &transport, "Planning");

    client
        .build_update_room(
            room_id,
            &UpdateRoom {
                name: Some("Planning 2.0".to_string()),
                icon_preset: Some(IconPreset::Idea),
                ..Default::default()
            },
        )
        .unwrap()
        .send(&transport)
        .unwrap();
    let room = client.build_get_room(room_id).unwrap().send(&transport).unwrap();
    assert_eq!(room.name, "Planning 2.0");
    assert!(room.icon_path.ends_with("ico_idea.png"));

    // Three role lists travel as comma-joined form fields.
    let roles = client
        .build_update_members(
            room_id,
            &UpdateMembers {
                members_admin_ids: AccountIds::from(vec![1, 2]),
                members_member_ids: AccountIds::from(vec![3, 4]),
                members_readonly_ids: AccountIds::from(5),
            },
        )
        .unwrap()
        .send(&transport)
        .unwrap();
    assert_eq!(
        roles,
        MemberRoles {
            admin: vec![1, 2],
            member: vec![3, 4],
            readonly: vec![5],
        }
    );

    let members = client.build_get_members(room_id).unwrap().send(&transport).unwrap();
    assert_eq!(members.len(), 5);
    assert_eq!(members[4].account_id, 5);
    assert_eq!(members[4].role, RoomRole::Readonly);

    // Leaving sends action_type in a DELETE body and decodes an empty reply.
    client
        .build_delete_room(room_id, RoomAction::Leave)
        .unwrap()
        .send(&transport)
        .unwrap();
    let err = client.build_get_room(room_id).unwrap().send(&transport).unwrap_err();
    assert!(matches!(err, ApiError::NotFound { resource: Resource::Room }));
}

#[test]
fn read_state_and_my_tasks() {
    let base_url = start_server();
    let client = ChatworkClient::with_base_url(mock_server::TOKEN, &base_url);
    let transport = UreqTransport::new();
    let room_id = create_room(&client, &transport, "Inbox");

    let mut ids = Vec::new();
    for body in ["one", "two", "three"] {
        let input = SendMessage {
            body: body.to_string(),
            self_unread: Some(true),
        };
        ids.push(
            client
                .build_send_message(room_id, &input)
                .unwrap()
                .send(&transport)
                .unwrap()
                .message_id,
        );
    }

    let counts = client
        .build_mark_read(room_id, Some(ids[0].as_str()))
        .unwrap()
        .send(&transport)
        .unwrap();
    assert_eq!(counts.unread_num, 2);
    let counts = client
        .build_mark_unread(room_id, &ids[0])
        .unwrap()
        .send(&transport)
        .unwrap();
    assert_eq!(counts.unread_num, 3);
    let counts = client.build_mark_read(room_id, None).unwrap().send(&transport).unwrap();
    assert_eq!(counts.unread_num, 0);

    client
        .build_create_task(
            room_id,
            &CreateTask {
                body: "Reply to client".to_string(),
                to_ids: AccountIds::from(vec![1, 2]),
                limit: None,
                limit_type: Some(TaskLimitType::None),
            },
        )
        .unwrap()
        .send(&transport)
        .unwrap();

    let mine = client
        .build_get_my_tasks(&MyTasksQuery {
            assigned_by_account_id: Some(mock_server::MY_ACCOUNT_ID),
            status: Some(TaskStatus::Open),
        })
        .unwrap()
        .send(&transport)
        .unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].room.room_id, room_id);
    assert_eq!(mine[0].room.name, "Inbox");
    assert_eq!(mine[0].limit_type, TaskLimitType::None);

    let others = client
        .build_get_my_tasks(&MyTasksQuery {
            assigned_by_account_id: Some(99),
            status: None,
        })
        .unwrap()
        .send(&transport)
        .unwrap();
    assert!(others.is_empty());

    let status = client.build_get_my_status().unwrap().send(&transport).unwrap();
    assert_eq!(status.mytask_num, 1);
    assert_eq!(status.mytask_room_num, 1);
    assert_eq!(status.unread_num, 0);
}

#[test]
fn contact_requests_round_trip() {
    let base_url = start_server();
    let client = ChatworkClient::with_base_url(mock_server::TOKEN, &base_url);
    let transport = UreqTransport::new();

    let pending = client
        .build_get_incoming_requests()
        .unwrap()
        .send(&transport)
        .unwrap();
    assert_eq!(pending.len(), 2);

    let contact = client
        .build_approve_request(pending[0].request_id)
        .unwrap()
        .send(&transport)
        .unwrap();
    assert_eq!(contact.account_id, pending[0].account_id);

    client
        .build_reject_request(pending[1].request_id)
        .unwrap()
        .send(&transport)
        .unwrap();

    let pending = client
        .build_get_incoming_requests()
        .unwrap()
        .send(&transport)
        .unwrap();
    assert!(pending.is_empty());

    let contacts = client.build_get_contacts().unwrap().send(&transport).unwrap();
    assert!(contacts.iter().any(|c| c.account_id == contact.account_id));

    let err = client
        .build_approve_request(contact.account_id + 100)
        .unwrap()
        .send(&transport)
        .unwrap_err();
    assert!(matches!(err, ApiError::NotFound { resource: Resource::Contact }));
}

#[test]
fn upload_then_fetch_file() {
    let base_url = start_server();
    let client = ChatworkClient::with_base_url(mock_server::TOKEN, &base_url);
    let agent = ureq::Agent::config_builder()
        .http_status_as_error(false)
        .build()
        .new_agent();
    let transport = UreqTransport::with_agent(agent);
    let room_id = create_room(&client, &transport, "Reports");

    let uploaded = client
        .build_upload_file(
            room_id,
            &UploadFile {
                filename: "q3 report.txt".to_string(),
                content: b"quarterly numbers\r\n--not-a-boundary".to_vec(),
                content_type: Some("text/plain".to_string()),
                message: Some("see attached".to_string()),
            },
        )
        .unwrap()
        .send(&transport)
        .unwrap();

    let files = client.build_get_files(room_id, None).unwrap().send(&transport).unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].file_id, uploaded.file_id);
    let none = client
        .build_get_files(room_id, Some(99))
        .unwrap()
        .send(&transport)
        .unwrap();
    assert!(none.is_empty());

    let file = client
        .build_get_file(room_id, uploaded.file_id, false)
        .unwrap()
        .send(&transport)
        .unwrap();
    assert_eq!(file.filename, "q3 report.txt");
    assert_eq!(file.filesize, 35);
    assert!(file.download_url.is_none());

    let file = client
        .build_get_file(room_id, uploaded.file_id, true)
        .unwrap()
        .send(&transport)
        .unwrap();
    assert!(file.download_url.is_some());

    let message = client
        .build_get_message(room_id, &file.message_id)
        .unwrap()
        .send(&transport)
        .unwrap();
    assert!(message.body.starts_with("see attached"));

    let err = client
        .build_get_file(room_id, uploaded.file_id + 1, false)
        .unwrap()
        .send(&transport)
        .unwrap_err();
    assert!(matches!(err, ApiError::NotFound { resource: Resource::File }));
}
