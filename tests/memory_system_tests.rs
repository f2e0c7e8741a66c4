//! MemorySystem integration tests
//!
//! Exercise the facade end to end over in-memory and file-backed stores.

mod common;

use common::mocks::MockEmbedder;
use memoria::memory::context::{build_prompt_context, remember_exchange, ContextBudget};
use memoria::memory::HealthStatus;
use memoria::types::{
    MemoryUpdate, MessageRole, NewAppointment, NewCodeContext, NewDevelopmentConversation, NewDevelopmentSession,
    NewMemory, NewMessage, NewProjectInsight, NewReminder,
};
use memoria::utils::time::days_ahead;
use memoria::db::MemoryFilter;
use memoria::AppError;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

#[tokio::test]
async fn test_duplicate_message_in_session_is_not_stored_twice() {
    let (system, _) = common::mock_system().await;

    let first = system
        .store_conversation(NewMessage::new(MessageRole::User, "I'd like a latte").in_session("s1"))
        .await
        .unwrap();
    let second = system
        .store_conversation(NewMessage::new(MessageRole::User, "I'd like a latte").in_session("s1"))
        .await
        .unwrap();

    assert!(!first.duplicate);
    assert!(second.duplicate);
    assert_eq!(second.message_id, first.message_id);
    assert_eq!(system.get_recent_context(10, Some("s1")).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_same_message_without_session_is_stored_again() {
    let (system, _) = common::mock_system().await;

    for _ in 0..2 {
        let outcome = system
            .store_conversation(NewMessage::new(MessageRole::User, "hello"))
            .await
            .unwrap();
        assert!(!outcome.duplicate);
    }
    assert_eq!(system.get_recent_context(10, None).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_empty_message_rejected() {
    let (system, _) = common::mock_system().await;
    let err = system
        .store_conversation(NewMessage::new(MessageRole::User, "   "))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidInput(_)));
}

#[tokio::test]
async fn test_recent_context_is_chronological() {
    let (system, _) = common::mock_system().await;
    let (user, assistant) = remember_exchange(&system, "book a flight", "Which airport?", "trip")
        .await
        .unwrap();
    assert_eq!(user.conversation_id, assistant.conversation_id);

    let context = system.get_recent_context(10, Some("trip")).await.unwrap();
    assert_eq!(context.len(), 2);
    assert_eq!(context[0].role, MessageRole::User);
    assert_eq!(context[1].content, "Which airport?");
}

#[tokio::test]
async fn test_memory_lifecycle() {
    let (system, embedder) = common::mock_system().await;

    let id = system
        .create_memory(NewMemory::new("Allergic to peanuts").of_type("safety").importance(10))
        .await
        .unwrap();
    system.wait_for_embeddings().await;
    assert!(embedder.call_count() >= 1);

    let updated = system
        .update_memory(
            &id,
            MemoryUpdate {
                tags: Some(vec!["health".into()]),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.tags, vec!["health"]);
    assert_eq!(updated.importance_level, 10);
    assert_eq!(updated.content, "Allergic to peanuts");

    let err = system.update_memory(&id, MemoryUpdate::default()).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidInput(_)));

    let err = system
        .update_memory(
            "no-such-memory",
            MemoryUpdate {
                content: Some("x".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let recalled = system.retrieve_memories("peanuts allergy", 5).await.unwrap();
    assert_eq!(recalled.len(), 1);
    assert_eq!(recalled[0].memory_id, id);
}

#[tokio::test]
async fn test_content_update_is_found_by_new_topic_only() {
    let (system, _) = common::mock_system().await;
    let id = system.create_memory(NewMemory::new("Likes a flat white coffee")).await.unwrap();
    system.wait_for_embeddings().await;

    system
        .update_memory(
            &id,
            MemoryUpdate {
                content: Some("Writes rust code every morning".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    system.wait_for_embeddings().await;

    let recalled = system.retrieve_memories("rust compiler", 5).await.unwrap();
    assert_eq!(recalled.len(), 1);
    assert_eq!(recalled[0].memory_id, id);
    assert!(system.retrieve_memories("coffee", 5).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_slow_embedding_of_old_content_does_not_overwrite_new_one() {
    let embedder = Arc::new(MockEmbedder::new().with_delay_for("coffee", Duration::from_millis(300)));
    let system = common::memory_system(embedder.clone()).await;

    let id = system.create_memory(NewMemory::new("likes coffee")).await.unwrap();
    system
        .update_memory(
            &id,
            MemoryUpdate {
                content: Some("writes rust code".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    system.wait_for_embeddings().await;
    assert_eq!(embedder.call_count(), 2);

    let stored = system
        .stores()
        .memories
        .memories_with_embeddings(&MemoryFilter::default())
        .await
        .unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].0.content, "writes rust code");
    assert_eq!(stored[0].1, MockEmbedder::vector_for("writes rust code"));

    assert!(system.retrieve_memories("espresso latte", 5).await.unwrap().is_empty());
    assert_eq!(system.retrieve_memories("rust", 5).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_importance_out_of_range_rejected() {
    let (system, _) = common::mock_system().await;
    let err = system
        .create_memory(NewMemory::new("too important").importance(11))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidInput(_)));
}

#[tokio::test]
async fn test_schedule_flow() {
    let (system, _) = common::mock_system().await;

    let (appointment_id, _) = system
        .create_appointment(NewAppointment {
            title: "Dentist".into(),
            scheduled_datetime: days_ahead(2).unwrap(),
            location: Some("Main St".into()),
            ..Default::default()
        })
        .await
        .unwrap();
    system
        .create_appointment(NewAppointment {
            title: "Conference".into(),
            scheduled_datetime: days_ahead(30).unwrap(),
            ..Default::default()
        })
        .await
        .unwrap();
    let (reminder_id, _) = system
        .create_reminder(NewReminder {
            content: "Buy birthday gift".into(),
            due_datetime: days_ahead(1).unwrap(),
            ..Default::default()
        })
        .await
        .unwrap();

    let upcoming = system.get_upcoming_schedule(7).await.unwrap();
    assert_eq!(upcoming.appointments.len(), 1);
    assert_eq!(upcoming.appointments[0].appointment_id, appointment_id);
    assert_eq!(upcoming.active_reminders.len(), 1);

    system.complete_reminder(&reminder_id).await.unwrap();
    assert!(system.get_upcoming_schedule(7).await.unwrap().active_reminders.is_empty());

    assert!(matches!(
        system.complete_reminder("missing").await.unwrap_err(),
        AppError::NotFound(_)
    ));
    assert!(matches!(
        system.get_upcoming_schedule(-1).await.unwrap_err(),
        AppError::InvalidInput(_)
    ));
}

#[tokio::test]
async fn test_invalid_datetime_rejected() {
    let (system, _) = common::mock_system().await;
    let err = system
        .create_reminder(NewReminder {
            content: "Call mom".into(),
            due_datetime: "next tuesday-ish".into(),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidInput(_)));
}

#[tokio::test]
async fn test_project_continuity() {
    let (system, _) = common::mock_system().await;

    let session_id = system
        .save_development_session(NewDevelopmentSession {
            workspace_path: "/work/memoria".into(),
            active_files: vec!["src/lib.rs".into()],
            git_branch: Some("main".into()),
            session_summary: Some("Refactor search".into()),
        })
        .await
        .unwrap();
    system
        .store_development_conversation(NewDevelopmentConversation {
            content: "Decided to refactor the compiler pass".into(),
            session_id: Some(session_id.clone()),
            decisions_made: Some("split into two functions".into()),
            ..Default::default()
        })
        .await
        .unwrap();
    system
        .store_project_insight(NewProjectInsight {
            content: "Search code should stay async".into(),
            importance_level: 9,
            ..Default::default()
        })
        .await
        .unwrap();
    system
        .link_code_context(NewCodeContext {
            file_path: "src/search/mod.rs".into(),
            description: "Ranks rust code results".into(),
            function_name: Some("semantic_search".into()),
            ..Default::default()
        })
        .await
        .unwrap();
    system.wait_for_embeddings().await;

    let continuity = system.get_project_continuity(Some("/work/memoria"), 5).await.unwrap();
    assert_eq!(continuity.recent_sessions.len(), 1);
    assert_eq!(continuity.recent_sessions[0].session_id, session_id);
    assert_eq!(continuity.recent_conversations.len(), 1);
    assert_eq!(continuity.important_insights.len(), 1);
    assert_eq!(continuity.recent_code_context.len(), 1);

    let err = system
        .store_development_conversation(NewDevelopmentConversation {
            content: "orphan".into(),
            session_id: Some("unknown-session".into()),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_prompt_context_includes_memories_and_history() {
    let (system, _) = common::mock_system().await;
    system
        .create_memory(NewMemory::new("Takes oat milk in coffee").importance(8))
        .await
        .unwrap();
    remember_exchange(&system, "morning!", "Good morning", "s").await.unwrap();
    system.wait_for_embeddings().await;

    let context = build_prompt_context(&system, "You are helpful.", "coffee order", &ContextBudget::for_session("s"))
        .await
        .unwrap();
    assert_eq!(context.memories.len(), 1);
    assert_eq!(context.history.len(), 2);
    assert!(context.system_prompt.starts_with("You are helpful."));
    assert!(context.system_prompt.contains("oat milk"));
    assert!(context.system_prompt.contains("assistant: Good morning"));
}

#[tokio::test]
async fn test_file_backed_data_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let memory_id = {
        let system = common::file_system(dir.path(), Arc::new(MockEmbedder::new())).await;
        let id = system
            .create_memory(NewMemory::new("Favorite tea is oolong"))
            .await
            .unwrap();
        system.wait_for_embeddings().await;
        id
    };

    for db in ["conversations.db", "ai_memories.db", "schedule.db", "vscode_project.db", "mcp_tool_calls.db"] {
        assert!(dir.path().join(db).exists(), "{} missing", db);
    }

    let system = common::file_system(dir.path(), Arc::new(MockEmbedder::new())).await;
    let memory = system.get_memory(&memory_id).await.unwrap().unwrap();
    assert_eq!(memory.content, "Favorite tea is oolong");
}

#[tokio::test]
async fn test_health_reports_embedding_state() {
    let (system, _) = common::mock_system().await;
    let health = system.get_system_health().await;
    assert_eq!(health.status, HealthStatus::Healthy);
    assert_eq!(health.embedding_service.status, "healthy");
    assert_eq!(health.embedding_service.dimensions, Some(5));
    assert_eq!(health.databases.len(), 5);

    let failing = common::memory_system(Arc::new(MockEmbedder::failing())).await;
    let health = failing.get_system_health().await;
    assert_eq!(health.status, HealthStatus::Degraded);
    assert_eq!(health.embedding_service.status, "unavailable");
    assert!(!health.issues.is_empty());
}
