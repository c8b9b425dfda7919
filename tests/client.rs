use chrono::{DateTime, TimeZone, Utc};
use mockito::{Matcher, Server};
use pretty_assertions::assert_eq;
use serde_json::json;

use standup_cli::api::{ApiClient, Identity, Team, UpdateKind};
use standup_cli::commands;
use standup_cli::error::ApiError;
use standup_cli::settings::{Settings, SettingsStore};
use standup_cli::signing::{build_auth, http_date, JSON_CONTENT_TYPE};

const ID: u64 = 42;
const SECRET: &str = "s3cr3t";

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap()
}

fn identity() -> Identity {
    Identity { id: ID, secret: SECRET.into() }
}

fn logged_in(teams: Vec<Team>) -> Settings {
    Settings {
        id: Some(ID),
        token: Some(SECRET.into()),
        teams: Some(teams),
    }
}

fn team(id: u64, name: &str) -> Team {
    Team { id, name: name.into() }
}

#[test]
fn login_caches_teams_from_signed_request() {
    let mut server = Server::new();
    let path = "/api/external/v1/teams";
    let mock = server
        .mock("GET", path)
        .match_header("accept", "application/json")
        .match_header("date", http_date(now()).as_str())
        .match_header(
            "authorization",
            build_auth("", path, &http_date(now()), ID, SECRET).as_str(),
        )
        .with_status(200)
        .with_body(r#"[{"id": 7, "name": "Platform", "slug": "platform"}, {"id": 9, "name": "Web"}]"#)
        .create();

    let dir = tempfile::tempdir().unwrap();
    let store = SettingsStore::at(dir.path().join("settings.json"));
    let client = ApiClient::new(server.url()).unwrap();

    let teams = commands::login(&client, &store, identity(), now()).unwrap();
    mock.assert();

    assert_eq!(teams, vec![team(7, "Platform"), team(9, "Web")]);
    assert_eq!(store.load().unwrap(), logged_in(teams));
}

#[test]
fn rejected_login_surfaces_message_and_keeps_teams_unwritten() {
    let mut server = Server::new();
    let mock = server
        .mock("GET", "/api/external/v1/teams")
        .with_status(401)
        .with_body(r#"{"message":"bad signature"}"#)
        .create();

    let dir = tempfile::tempdir().unwrap();
    let store = SettingsStore::at(dir.path().join("settings.json"));
    let client = ApiClient::new(server.url()).unwrap();

    let err = commands::login(&client, &store, identity(), now()).unwrap_err();
    mock.assert();

    assert_eq!(err.to_string(), "bad signature");
    assert!(matches!(
        err.downcast_ref::<ApiError>(),
        Some(ApiError::AuthenticationRejected(_))
    ));
    let saved = store.load().unwrap();
    assert_eq!(saved.teams, None);
    assert_eq!(saved.id, Some(ID));
}

#[test]
fn show_keeps_only_the_callers_messages() {
    let mut server = Server::new();
    let query = "start_date=2024-03-07&end_date=2024-03-10";
    let signed_path = format!("/api/external/v1/teams/3/digests?{}", query);
    let mock = server
        .mock("GET", Matcher::Regex(r"^/api/external/v1/teams/3/digests".into()))
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("start_date".into(), "2024-03-07".into()),
            Matcher::UrlEncoded("end_date".into(), "2024-03-10".into()),
        ]))
        .match_header(
            "authorization",
            build_auth("", &signed_path, &http_date(now()), ID, SECRET).as_str(),
        )
        .with_status(200)
        .with_body(
            json!([
                {"date": "2024-03-08", "messages": [
                    {"user_id": 42, "user_name": "Ada", "message": "wrote the parser"},
                    {"user_id": 5, "user_name": "Bo", "message": "on call"}
                ]},
                {"date": "2024-03-09", "messages": [
                    {"user_id": 5, "user_name": "Bo", "message": "still on call"},
                    {"user_id": 42, "user_name": "Ada", "message": "fixed the lexer"}
                ]}
            ])
            .to_string(),
        )
        .create();

    let client = ApiClient::new(server.url()).unwrap();
    let settings = logged_in(vec![team(3, "Core")]);

    let outcomes = commands::show(&client, &settings, 3, false, now()).unwrap();
    mock.assert();

    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].team_id, 3);
    let view = outcomes[0].result.as_ref().unwrap();
    assert_eq!(
        serde_json::to_value(view).unwrap(),
        json!({
            "2024-03-08": [{"Ada": "wrote the parser"}],
            "2024-03-09": [{"Ada": "fixed the lexer"}],
        })
    );
}

#[test]
fn show_without_login_sends_nothing() {
    let mut server = Server::new();
    let mock = server.mock("GET", Matcher::Any).expect(0).create();

    let client = ApiClient::new(server.url()).unwrap();
    let settings = Settings {
        teams: Some(vec![team(3, "Core")]),
        ..Default::default()
    };

    let err = commands::show(&client, &settings, 1, true, now()).unwrap_err();
    assert!(matches!(err, ApiError::Unauthenticated));
    mock.assert();
}

#[test]
fn update_reports_each_team_independently() {
    let mut server = Server::new();
    let ok_path = "/api/external/v1/teams/1/messages";
    let ok = server
        .mock("POST", ok_path)
        .match_header("content-type", JSON_CONTENT_TYPE)
        .match_header(
            "authorization",
            build_auth(JSON_CONTENT_TYPE, ok_path, &http_date(now()), ID, SECRET).as_str(),
        )
        .match_body(Matcher::Json(json!({
            "messages": [{"type": "done", "msg": "released 1.2"}]
        })))
        .with_status(201)
        .with_body(r#"{"working": [], "done": ["released 1.2"], "blocked": [], "id": 11}"#)
        .create();
    let missing = server
        .mock("POST", "/api/external/v1/teams/2/messages")
        .with_status(404)
        .with_body(r#"{"error":"team not found"}"#)
        .create();

    let client = ApiClient::new(server.url()).unwrap();
    let settings = logged_in(vec![team(1, "Core"), team(2, "Web")]);

    let outcomes = commands::update(
        &client,
        &settings,
        &[],
        UpdateKind::Done,
        "released 1.2",
        now(),
    )
    .unwrap();
    ok.assert();
    missing.assert();

    assert_eq!(outcomes.len(), 2);
    let summary = outcomes[0].result.as_ref().unwrap();
    assert_eq!(summary.done, json!(["released 1.2"]));

    let err = outcomes[1].result.as_ref().unwrap_err();
    assert_eq!(err.to_string(), r#"{"error":"team not found"}"#);
}

#[test]
fn update_to_unknown_teams_is_rejected_before_sending() {
    let mut server = Server::new();
    let mock = server.mock("POST", Matcher::Any).expect(0).create();

    let client = ApiClient::new(server.url()).unwrap();
    let settings = logged_in(vec![team(1, "Core")]);

    let err = commands::update(&client, &settings, &[99], UpdateKind::Working, "x", now())
        .unwrap_err();
    assert_eq!(err.to_string(), "No valid teams entered.");
    mock.assert();
}

#[test]
fn server_errors_are_reported_generically() {
    let mut server = Server::new();
    let _mock = server
        .mock("GET", "/api/external/v1/teams")
        .with_status(500)
        .with_body("boom")
        .create();

    let client = ApiClient::new(server.url()).unwrap();
    let err = client.teams(&identity(), now()).unwrap_err();
    assert_eq!(err.to_string(), "Unknown Error");
}

#[test]
fn show_passes_null_messages_through() {
    let mut server = Server::new();
    let mock = server
        .mock("GET", Matcher::Regex(r"^/api/external/v1/teams/3/digests".into()))
        .with_status(200)
        .with_body(
            json!([
                {"date": "2024-03-09", "messages": [
                    {"user_id": 42, "user_name": "Ada", "message": "mine"},
                    {"user_id": 5, "user_name": "Bo", "message": null}
                ]}
            ])
            .to_string(),
        )
        .expect(2)
        .create();

    let client = ApiClient::new(server.url()).unwrap();
    let settings = logged_in(vec![team(3, "Core")]);

    let own = commands::show(&client, &settings, 1, false, now()).unwrap();
    assert_eq!(
        serde_json::to_value(own[0].result.as_ref().unwrap()).unwrap(),
        json!({"2024-03-09": [{"Ada": "mine"}]})
    );

    let everyone = commands::show(&client, &settings, 1, true, now()).unwrap();
    assert_eq!(
        serde_json::to_value(everyone[0].result.as_ref().unwrap()).unwrap(),
        json!({"2024-03-09": [{"Ada": "mine"}, {"Bo": null}]})
    );
    mock.assert();
}

#[test]
fn show_without_cached_teams_asks_for_login() {
    let mut server = Server::new();
    let mock = server.mock("GET", Matcher::Any).expect(0).create();

    let client = ApiClient::new(server.url()).unwrap();
    let settings = Settings {
        id: Some(ID),
        token: Some(SECRET.into()),
        teams: None,
    };

    let err = commands::show(&client, &settings, 1, false, now()).unwrap_err();
    assert!(matches!(err, ApiError::NoTeams));
    assert_eq!(err.to_string(), "No teams cached, please login.");
    mock.assert();
}

#[test]
fn unreachable_server_is_reported_generically() {
    // Grab a free port, then close it so nothing is listening there.
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    let client = ApiClient::new(format!("http://127.0.0.1:{}", port)).unwrap();

    let err = client.teams(&identity(), now()).unwrap_err();
    assert!(matches!(err, ApiError::Transport(_)));
    assert_eq!(err.to_string(), "Unknown Error");
}

#[test]
fn undecodable_success_body_is_reported_generically() {
    let mut server = Server::new();
    let _mock = server
        .mock("GET", "/api/external/v1/teams")
        .with_status(200)
        .with_body("<html>maintenance</html>")
        .create();

    let client = ApiClient::new(server.url()).unwrap();
    let err = client.teams(&identity(), now()).unwrap_err();
    assert!(matches!(err, ApiError::Unknown { status } if status == 200));
    assert_eq!(err.to_string(), "Unknown Error");
}
