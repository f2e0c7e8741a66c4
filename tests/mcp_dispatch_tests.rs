//! Tool dispatch integration tests
//!
//! Drive the memory system through tool names and JSON arguments, the way
//! an MCP client or `memoria call` does.

mod common;

use memoria::mcp::{error_payload, TOOL_NAMES};
use memoria::utils::time::days_ahead;
use memoria::ToolDispatcher;
use serde_json::json;

async fn dispatcher(client: &str) -> ToolDispatcher {
    let (system, _) = common::mock_system().await;
    ToolDispatcher::new(system).with_client_id(client)
}

#[tokio::test]
async fn test_huge_day_windows_are_rejected() {
    let d = dispatcher("desktop").await;
    for (tool, args) in [
        ("get_upcoming_schedule", json!({ "days_ahead": 1_000_000_000i64 })),
        ("get_tool_usage_summary", json!({ "days": 1_000_000_000i64 })),
        ("reflect_on_tool_usage", json!({ "days": 1_000_000_000i64 })),
    ] {
        let err = d.call(tool, args).await.unwrap_err();
        assert_eq!(error_payload(&err)["error_type"], "invalid_input", "{}", tool);
    }

    // The dispatcher keeps serving after the rejections
    let schedule = d.call("get_upcoming_schedule", json!({ "days_ahead": 7 })).await.unwrap();
    assert_eq!(schedule["period_days"], 7);
}

#[tokio::test]
async fn test_memory_tools_round_trip_through_search() {
    let d = dispatcher("desktop").await;

    let created = d
        .call(
            "create_memory",
            json!({ "content": "Allergic to peanuts", "memory_type": "safety", "importance_level": 10, "tags": ["health"] }),
        )
        .await
        .unwrap();
    let memory_id = created["memory_id"].as_str().unwrap().to_string();
    d.system().wait_for_embeddings().await;

    let found = d
        .call("search_memories", json!({ "query": "peanuts allergy", "database_filter": "ai_memories" }))
        .await
        .unwrap();
    assert_eq!(found["status"], "success");
    assert_eq!(found["search_type"], "semantic");
    assert_eq!(found["count"], 1);
    assert_eq!(found["results"][0]["type"], "ai_memory");
    assert_eq!(found["results"][0]["data"]["memory_id"], memory_id.as_str());

    let updated = d
        .call("update_memory", json!({ "memory_id": memory_id, "importance_level": 9 }))
        .await
        .unwrap();
    assert_eq!(updated["memory"]["importance_level"], 9);
    assert_eq!(updated["memory"]["content"], "Allergic to peanuts");
}

#[tokio::test]
async fn test_conversation_tools() {
    let d = dispatcher("desktop").await;

    let first = d
        .call("store_conversation", json!({ "content": "Plan my trip", "session_id": "s1" }))
        .await
        .unwrap();
    assert_eq!(first["duplicate"], false);
    let again = d
        .call("store_conversation", json!({ "content": "Plan my trip", "session_id": "s1" }))
        .await
        .unwrap();
    assert_eq!(again["duplicate"], true);

    d.call(
        "store_conversation",
        json!({ "content": "Where to?", "role": "assistant", "session_id": "s1" }),
    )
    .await
    .unwrap();

    let recent = d
        .call("get_recent_context", json!({ "session_id": "s1" }))
        .await
        .unwrap();
    assert_eq!(recent["count"], 2);
    assert_eq!(recent["messages"][1]["role"], "assistant");
}

#[tokio::test]
async fn test_schedule_tools() {
    let d = dispatcher("desktop").await;

    let appointment = d
        .call(
            "create_appointment",
            json!({ "title": "Dentist", "scheduled_datetime": days_ahead(2).unwrap(), "location": "Main St" }),
        )
        .await
        .unwrap();
    assert!(appointment["appointment_id"].is_string());

    let reminder = d
        .call("create_reminder", json!({ "content": "Buy cake", "due_datetime": days_ahead(1).unwrap() }))
        .await
        .unwrap();
    let reminder_id = reminder["reminder_id"].as_str().unwrap().to_string();

    let schedule = d.call("get_upcoming_schedule", json!({})).await.unwrap();
    assert_eq!(schedule["period_days"], 7);
    assert_eq!(schedule["appointments"].as_array().unwrap().len(), 1);
    assert_eq!(schedule["active_reminders"].as_array().unwrap().len(), 1);

    let done = d
        .call("complete_reminder", json!({ "reminder_id": reminder_id }))
        .await
        .unwrap();
    assert_eq!(done["completed"], true);

    let err = d
        .call("complete_reminder", json!({ "reminder_id": "missing" }))
        .await
        .unwrap_err();
    let payload = error_payload(&err);
    assert_eq!(payload["status"], "error");
    assert_eq!(payload["error_type"], "not_found");
}

#[tokio::test]
async fn test_project_tools() {
    let d = dispatcher("editor").await;

    let session = d
        .call(
            "save_development_session",
            json!({ "workspace_path": "/work/app", "active_files": ["src/main.rs"], "git_branch": "main" }),
        )
        .await
        .unwrap();
    let session_id = session["session_id"].as_str().unwrap().to_string();

    d.call(
        "store_development_conversation",
        json!({ "content": "Moved parsing into its own function", "session_id": session_id }),
    )
    .await
    .unwrap();
    d.call(
        "store_project_insight",
        json!({ "content": "The compiler pass needs a refactor", "importance_level": 9, "related_files": ["src/pass.rs"] }),
    )
    .await
    .unwrap();
    d.call(
        "link_code_context",
        json!({ "file_path": "src/pass.rs", "description": "Compiler pass entry", "function_name": "run" }),
    )
    .await
    .unwrap();
    d.system().wait_for_embeddings().await;

    let continuity = d
        .call("get_project_continuity", json!({ "workspace_path": "/work/app" }))
        .await
        .unwrap();
    assert_eq!(continuity["recent_sessions"][0]["session_id"], session_id.as_str());
    assert_eq!(continuity["important_insights"].as_array().unwrap().len(), 1);
    assert_eq!(continuity["recent_code_context"].as_array().unwrap().len(), 1);

    let history = d
        .call("search_project_history", json!({ "query": "compiler refactor" }))
        .await
        .unwrap();
    assert!(history["count"].as_u64().unwrap() >= 1);
    let kinds: Vec<&str> = history["results"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|r| r["type"].as_str())
        .collect();
    assert!(kinds.iter().all(|k| ["project_insight", "development_conversation", "code_context"].contains(k)));
}

#[tokio::test]
async fn test_calls_are_logged_and_summarized() {
    let d = dispatcher("desktop").await;
    for _ in 0..3 {
        d.call("get_recent_context", json!({})).await.unwrap();
    }
    let err = d.call("create_memory", json!({ "importance_level": 3 })).await.unwrap_err();
    assert_eq!(err.kind(), "invalid_input");

    let history = d
        .call("get_tool_call_history", json!({ "tool_name": "get_recent_context" }))
        .await
        .unwrap();
    assert_eq!(history["count"], 3);
    assert_eq!(history["tool_calls"][0]["client_id"], "desktop");
    assert!(history["tool_calls"][0]["execution_time_ms"].is_number());

    let failed = d
        .call("get_tool_call_history", json!({ "tool_name": "create_memory" }))
        .await
        .unwrap();
    assert_eq!(failed["tool_calls"][0]["status"], "error");

    let summary = d.call("get_tool_usage_summary", json!({ "days": 1 })).await.unwrap();
    assert_eq!(summary["most_used_tools"][0]["tool_name"], "get_recent_context");
}

#[tokio::test]
async fn test_reflection_is_stored_as_insight() {
    let d = dispatcher("desktop").await;
    for _ in 0..4 {
        d.call("get_recent_context", json!({})).await.unwrap();
    }
    d.call("complete_reminder", json!({ "reminder_id": "nope" })).await.unwrap_err();

    let reflection = d
        .call("reflect_on_tool_usage", json!({ "days": 1, "client_id": "desktop" }))
        .await
        .unwrap();
    assert_eq!(reflection["stats"]["total_calls"], 5);
    assert_eq!(reflection["stats"]["success_rate"], 80.0);
    assert!(reflection["reflection"]["content"].is_string());

    let other_client = d
        .call("reflect_on_tool_usage", json!({ "days": 1, "client_id": "someone-else" }))
        .await
        .unwrap();
    assert_eq!(other_client["stats"]["total_calls"], 0);

    let insights = d
        .call("get_ai_insights", json!({ "insight_type": "tool_usage_analysis" }))
        .await
        .unwrap();
    assert_eq!(insights["count"], 2);
    assert_eq!(insights["insights"][0]["reflection_type"], "tool_usage_analysis");
}

#[tokio::test]
async fn test_health_and_maintenance_tools() {
    let d = dispatcher("desktop").await;

    let health = d.call("get_system_health", json!(null)).await.unwrap();
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["embedding_service"]["model"], "mock-keywords");

    let report = d
        .call("run_database_maintenance", json!({ "force": true }))
        .await
        .unwrap();
    assert_eq!(report["status"], "success");
    assert_eq!(report["skipped"], false);
}

#[tokio::test]
async fn test_every_tool_name_is_dispatched() {
    let d = dispatcher("desktop").await;
    for name in TOOL_NAMES {
        // Missing required arguments are rejected, never reported as unknown
        if let Err(e) = d.call(name, json!({})).await {
            assert!(!e.to_string().contains("Unknown tool"), "{} not dispatched", name);
        }
    }
}

#[tokio::test]
async fn test_logged_time_covers_slow_query_embedding() {
    let embedder = std::sync::Arc::new(
        common::mocks::MockEmbedder::new().with_delay_for("coffee", std::time::Duration::from_millis(200)),
    );
    let system = common::memory_system(embedder).await;
    let d = ToolDispatcher::new(system).with_client_id("desktop");

    d.call("search_memories", json!({ "query": "coffee" })).await.unwrap();

    let history = d
        .call("get_tool_call_history", json!({ "tool_name": "search_memories" }))
        .await
        .unwrap();
    let elapsed = history["tool_calls"][0]["execution_time_ms"].as_f64().unwrap();
    assert!(elapsed >= 200.0, "execution_time_ms was {}", elapsed);
}

#[tokio::test]
async fn test_repeated_user_turn_keeps_assistant_in_same_conversation() {
    let d = dispatcher("desktop").await;

    let first = d
        .call(
            "store_conversation",
            json!({ "user_message": "Any flights to Lisbon?", "assistant_response": "Two tomorrow", "session_id": "trip" }),
        )
        .await
        .unwrap();
    let conversation_id = first["conversation_id"].as_str().unwrap().to_string();

    let second = d
        .call(
            "store_conversation",
            json!({ "user_message": "Any flights to Lisbon?", "assistant_response": "One left now", "session_id": "trip" }),
        )
        .await
        .unwrap();
    assert_eq!(second["user"]["duplicate"], true);
    assert_eq!(second["assistant"]["duplicate"], false);
    assert_eq!(second["conversation_id"], conversation_id.as_str());
    assert_eq!(second["assistant"]["conversation_id"], conversation_id.as_str());

    let messages = d.system().get_recent_context(10, Some("trip")).await.unwrap();
    assert_eq!(messages.len(), 3);
    assert!(messages.iter().all(|m| m.conversation_id == conversation_id));
}
