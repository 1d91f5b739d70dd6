//! Verify build/parse methods against JSON test vectors stored in `test-vectors/`.
//!
//! Each vector file describes inputs, expected requests, simulated responses,
//! and expected parse results. Form bodies are compared as strings because
//! field order is part of the wire contract.

use chatwork_core::{
    ApiError, ChatworkClient, CreateTask, HttpMethod, HttpResponse, MessageId, Resource,
    SendMessage,
};

const BASE_URL: &str = "http://localhost:3000";
const TOKEN: &str = "vector-token";

fn client() -> ChatworkClient {
    ChatworkClient::with_base_url(TOKEN, BASE_URL)
}

/// Parse the method string from test vectors into `HttpMethod`.
fn parse_method(s: &str) -> HttpMethod {
    match s {
        "GET" => HttpMethod::Get,
        "POST" => HttpMethod::Post,
        "PUT" => HttpMethod::Put,
        "DELETE" => HttpMethod::Delete,
        other => panic!("unknown method: {other}"),
    }
}

fn header_pairs(value: &serde_json::Value) -> Vec<(String, String)> {
    value
        .as_array()
        .unwrap()
        .iter()
        .map(|h| {
            let arr = h.as_array().unwrap();
            (arr[0].as_str().unwrap().to_string(), arr[1].as_str().unwrap().to_string())
        })
        .collect()
}

fn simulated(sim: &serde_json::Value) -> HttpResponse {
    HttpResponse {
        status: sim["status"].as_u64().unwrap() as u16,
        headers: Vec::new(),
        body: sim["body"].as_str().unwrap().to_string(),
    }
}

// ---------------------------------------------------------------------------
// Send message
// ---------------------------------------------------------------------------

#[test]
fn send_message_test_vectors() {
    let raw = include_str!("../../test-vectors/send_message.json");
    let vectors: serde_json::Value = serde_json::from_str(raw).unwrap();

    let c = client();
    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let room_id = case["room_id"].as_u64().unwrap();
        let input: SendMessage = serde_json::from_value(case["input"].clone()).unwrap();
        let expected_req = &case["expected_request"];

        // Verify build
        let call = c.build_send_message(room_id, &input).unwrap();
        let req = &call.request;
        assert_eq!(req.method, parse_method(expected_req["method"].as_str().unwrap()), "{name}: method");
        assert_eq!(req.url, format!("{BASE_URL}{}", expected_req["path"].as_str().unwrap()), "{name}: url");
        assert_eq!(req.headers, header_pairs(&expected_req["headers"]), "{name}: headers");
        assert_eq!(req.body_str(), expected_req["body"].as_str(), "{name}: body");

        // Verify parse
        let id = call.parse(simulated(&case["simulated_response"])).unwrap();
        let expected: MessageId = serde_json::from_value(case["expected_result"].clone()).unwrap();
        assert_eq!(id, expected, "{name}: parsed result");
    }
}

// ---------------------------------------------------------------------------
// Create task
// ---------------------------------------------------------------------------

#[test]
fn create_task_test_vectors() {
    let raw = include_str!("../../test-vectors/create_task.json");
    let vectors: serde_json::Value = serde_json::from_str(raw).unwrap();

    let c = client();
    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let room_id = case["room_id"].as_u64().unwrap();
        let input: CreateTask = serde_json::from_value(case["input"].clone()).unwrap();
        let expected_req = &case["expected_request"];

        let call = c.build_create_task(room_id, &input).unwrap();
        let req = &call.request;
        assert_eq!(req.method, parse_method(expected_req["method"].as_str().unwrap()), "{name}: method");
        assert_eq!(req.url, format!("{BASE_URL}{}", expected_req["path"].as_str().unwrap()), "{name}: url");
        assert_eq!(req.body_str(), expected_req["body"].as_str(), "{name}: body");

        let ids = call.parse(simulated(&case["simulated_response"])).unwrap();
        let expected: Vec<u64> = serde_json::from_value(case["expected_result"].clone()).unwrap();
        assert_eq!(ids.task_ids, expected, "{name}: parsed result");
    }
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

#[test]
fn error_test_vectors() {
    let raw = include_str!("../../test-vectors/errors.json");
    let vectors: serde_json::Value = serde_json::from_str(raw).unwrap();

    let call = client().build_get_message(5, "99").unwrap();
    assert_eq!(call.resource(), Resource::Message);

    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let response = HttpResponse {
            status: case["status"].as_u64().unwrap() as u16,
            headers: header_pairs(&case["headers"]),
            body: case["body"].as_str().unwrap().to_string(),
        };
        let expected = &case["expected"];
        let err = call.parse(response).unwrap_err();
        assert!(!err.is_local(), "{name}: remote error");

        match (expected["kind"].as_str().unwrap(), err) {
            ("incorrect_parameters", ApiError::IncorrectParameters { errors }) => {
                let want: Vec<String> = serde_json::from_value(expected["errors"].clone()).unwrap();
                assert_eq!(errors, want, "{name}: messages");
            }
            ("unauthorized", ApiError::Unauthorized) => {}
            ("forbidden", ApiError::Forbidden) => {}
            ("not_found", ApiError::NotFound { resource }) => {
                assert_eq!(resource.noun(), expected["resource"].as_str().unwrap(), "{name}: resource");
            }
            ("rate_limited", ApiError::RateLimited { reset }) => {
                assert_eq!(reset, expected["reset"].as_u64(), "{name}: reset");
            }
            ("unknown", ApiError::UnknownError { status, body }) => {
                assert_eq!(u64::from(status), expected["status"].as_u64().unwrap(), "{name}: status");
                assert_eq!(body, expected["body"].as_str().unwrap(), "{name}: body");
            }
            (kind, other) => panic!("{name}: expected {kind}, got {other:?}"),
        }
    }
}
