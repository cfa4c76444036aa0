use devloop_events::Action;
use devloop_server::{AppConfig, ServerError};
use devloop_test_utils::{is_state, recv_until, registry_with_script, setup_unit, ScriptedAgent};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::io::Write;

fn config_file(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn file_values_layer_over_defaults() {
    let file = config_file(
        r#"
agent = "ScriptedAgent"
max_iterations = 7
llm_api_key = "sk-test"
"#,
    );
    let config = AppConfig::from_file(file.path()).unwrap();

    assert_eq!(config.agent, "ScriptedAgent");
    assert_eq!(config.max_iterations, 7);
    assert_eq!(config.llm_api_key.as_deref(), Some("sk-test"));
    assert_eq!(config.llm_model, AppConfig::default().llm_model);
}

#[test]
fn missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = AppConfig::from_file(&dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, ServerError::Io(_)));
}

#[test]
fn redacted_dump_round_trips_without_key() {
    let file = config_file("llm_api_key = \"sk-secret\"\n");
    let config = AppConfig::from_file(file.path()).unwrap();
    let dump = config.to_toml_redacted().unwrap();

    assert!(!dump.contains("sk-secret"));
    let reparsed = AppConfig::from_toml_str(&dump).unwrap();
    assert_eq!(reparsed.llm_api_key.as_deref(), Some("********"));
    assert_eq!(reparsed.max_chars, config.max_chars);
}

#[tokio::test]
async fn empty_client_args_fall_back_to_file_config() {
    let file = config_file("agent = \"ScriptedAgent\"\n");
    let config = AppConfig::from_file(file.path()).unwrap();
    let script = ScriptedAgent::actions(vec![Action::message("from script", false)]);
    let (unit, _sessions, mut rx) = setup_unit(registry_with_script(script), config);

    unit.handle_client_message(json!({"action": "initialize", "args": {"AGENT": ""}}))
        .await
        .unwrap();
    recv_until(&mut rx, |m| is_state(m, "init")).await;
    assert_eq!(unit.controller().unwrap().agent_name(), "ScriptedAgent");

    unit.handle_client_message(json!({"action": "message", "args": {"content": "hi"}}))
        .await
        .unwrap();
    let messages = recv_until(&mut rx, |m| is_state(m, "finished")).await;
    assert!(messages.iter().any(|m| m["message"] == "from script"));
}

#[tokio::test]
async fn unknown_agent_reports_controller_error() {
    let (unit, _sessions, mut rx) = setup_unit(
        registry_with_script(ScriptedAgent::actions(vec![])),
        AppConfig::new(),
    );
    unit.handle_client_message(json!({"action": "initialize", "args": {"AGENT": "Ghost"}}))
        .await
        .unwrap();

    let reply = rx.recv().await.unwrap();
    assert_eq!(reply["error"], true);
    assert_eq!(reply["message"], devloop_server::unit::CONTROLLER_ERROR);
    assert!(unit.controller().is_none());
}
