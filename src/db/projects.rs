use super::client::{blob, int, json, opt_json, opt_text, text, RowExt, SqliteClient};
use crate::types::{
    validate_importance, AppError, CodeContext, DevelopmentConversation, DevelopmentSession,
    NewCodeContext, NewDevelopmentConversation, NewDevelopmentSession, NewProjectInsight,
    ProjectContinuity, ProjectInsight, Result, HIGH_IMPORTANCE,
};
use crate::utils::time::now_timestamp;
use libsql::{Row, Value};
use uuid::Uuid;

/// Summary recorded on sessions created for an unattached development conversation.
pub const AUTO_DEV_SESSION_SUMMARY: &str = "Auto-created session for development conversation";

const SESSION_COLUMNS: &str = "session_id, start_timestamp, end_timestamp, workspace_path, \
     active_files, git_branch, session_summary";

const DEV_CONVERSATION_COLUMNS: &str = "conversation_id, session_id, timestamp, chat_context_id, \
     conversation_content, decisions_made, code_changes, source_metadata";

const INSIGHT_COLUMNS: &str = "insight_id, timestamp_created, timestamp_updated, insight_type, \
     content, related_files, source_conversation_id, importance_level";

const CODE_CONTEXT_COLUMNS: &str = "context_id, timestamp, file_path, function_name, description, \
     purpose, related_insights";

/// Development sessions, conversations, insights and code context (`vscode_project.db`).
#[derive(Clone)]
pub struct ProjectStore {
    db: SqliteClient,
}

impl ProjectStore {
    pub async fn new(db: SqliteClient) -> Result<Self> {
        let store = Self { db };
        store.initialize_schema().await?;
        Ok(store)
    }

    pub fn client(&self) -> &SqliteClient {
        &self.db
    }

    async fn initialize_schema(&self) -> Result<()> {
        self.db
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS project_sessions (
                    session_id TEXT PRIMARY KEY,
                    start_timestamp TEXT NOT NULL,
                    end_timestamp TEXT,
                    workspace_path TEXT NOT NULL,
                    active_files TEXT,
                    git_branch TEXT,
                    session_summary TEXT
                );
                CREATE TABLE IF NOT EXISTS project_insights (
                    insight_id TEXT PRIMARY KEY,
                    timestamp_created TEXT NOT NULL,
                    timestamp_updated TEXT NOT NULL,
                    insight_type TEXT NOT NULL,
                    content TEXT NOT NULL,
                    related_files TEXT,
                    source_conversation_id TEXT,
                    importance_level INTEGER DEFAULT 5,
                    embedding BLOB
                );
                CREATE TABLE IF NOT EXISTS code_context (
                    context_id TEXT PRIMARY KEY,
                    timestamp TEXT NOT NULL,
                    file_path TEXT NOT NULL,
                    function_name TEXT,
                    description TEXT NOT NULL,
                    purpose TEXT,
                    related_insights TEXT,
                    embedding BLOB
                );
                CREATE TABLE IF NOT EXISTS development_conversations (
                    conversation_id TEXT PRIMARY KEY,
                    session_id TEXT NOT NULL,
                    timestamp TEXT NOT NULL,
                    chat_context_id TEXT,
                    conversation_content TEXT NOT NULL,
                    decisions_made TEXT,
                    code_changes TEXT,
                    source_metadata TEXT,
                    embedding BLOB,
                    FOREIGN KEY (session_id) REFERENCES project_sessions(session_id)
                );
                CREATE INDEX IF NOT EXISTS idx_project_sessions_workspace ON project_sessions(workspace_path);
                CREATE INDEX IF NOT EXISTS idx_insights_importance ON project_insights(importance_level);
                CREATE INDEX IF NOT EXISTS idx_code_context_file ON code_context(file_path);
                CREATE INDEX IF NOT EXISTS idx_dev_conversations_session ON development_conversations(session_id);",
            )
            .await
    }

    pub async fn save_development_session(&self, session: &NewDevelopmentSession) -> Result<String> {
        if session.workspace_path.trim().is_empty() {
            return Err(AppError::InvalidInput("workspace_path must not be empty".to_string()));
        }
        let session_id = Uuid::new_v4().to_string();
        self.db
            .execute(
                "INSERT INTO project_sessions
                 (session_id, start_timestamp, workspace_path, active_files, git_branch, session_summary)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                vec![
                    text(session_id.as_str()),
                    text(now_timestamp()),
                    text(session.workspace_path.as_str()),
                    json(&session.active_files)?,
                    opt_text(session.git_branch.as_deref()),
                    opt_text(session.session_summary.as_deref()),
                ],
            )
            .await?;
        Ok(session_id)
    }

    /// Store a development conversation; without a session one is created
    /// for the current working directory.
    pub async fn store_development_conversation(&self, conversation: &NewDevelopmentConversation) -> Result<String> {
        if conversation.content.trim().is_empty() {
            return Err(AppError::InvalidInput("content must not be empty".to_string()));
        }

        let session_id = match conversation.session_id {
            Some(ref id) if self.session_exists(id).await? => id.clone(),
            Some(ref id) => {
                return Err(AppError::NotFound(format!("Development session {} not found", id)))
            }
            None => {
                let workspace = std::env::current_dir()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|_| ".".to_string());
                self.save_development_session(&NewDevelopmentSession {
                    workspace_path: workspace,
                    session_summary: Some(AUTO_DEV_SESSION_SUMMARY.to_string()),
                    ..Default::default()
                })
                .await?
            }
        };

        let conversation_id = Uuid::new_v4().to_string();
        self.db
            .execute(
                "INSERT INTO development_conversations
                 (conversation_id, session_id, timestamp, chat_context_id, conversation_content,
                  decisions_made, code_changes, source_metadata)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                vec![
                    text(conversation_id.as_str()),
                    text(session_id),
                    text(now_timestamp()),
                    opt_text(conversation.chat_context_id.as_deref()),
                    text(conversation.content.as_str()),
                    opt_text(conversation.decisions_made.as_deref()),
                    opt_json(conversation.code_changes.as_ref())?,
                    opt_json(conversation.source_metadata.as_ref())?,
                ],
            )
            .await?;
        Ok(conversation_id)
    }

    async fn session_exists(&self, session_id: &str) -> Result<bool> {
        let n = self
            .db
            .count(
                "SELECT COUNT(*) FROM project_sessions WHERE session_id = ?1",
                vec![text(session_id)],
            )
            .await?;
        Ok(n > 0)
    }

    pub async fn store_project_insight(&self, insight: &NewProjectInsight) -> Result<String> {
        if insight.content.trim().is_empty() {
            return Err(AppError::InvalidInput("content must not be empty".to_string()));
        }
        validate_importance("importance_level", insight.importance_level)?;

        let insight_id = Uuid::new_v4().to_string();
        self.db
            .execute(
                "INSERT INTO project_insights
                 (insight_id, timestamp_created, timestamp_updated, insight_type, content,
                  related_files, source_conversation_id, importance_level)
                 VALUES (?1, ?2, ?2, ?3, ?4, ?5, ?6, ?7)",
                vec![
                    text(insight_id.as_str()),
                    text(now_timestamp()),
                    text(insight.insight_type.as_str()),
                    text(insight.content.as_str()),
                    json(&insight.related_files)?,
                    opt_text(insight.source_conversation_id.as_deref()),
                    int(insight.importance_level),
                ],
            )
            .await?;
        Ok(insight_id)
    }

    pub async fn link_code_context(&self, context: &NewCodeContext) -> Result<String> {
        if context.file_path.trim().is_empty() {
            return Err(AppError::InvalidInput("file_path must not be empty".to_string()));
        }
        if context.description.trim().is_empty() {
            return Err(AppError::InvalidInput("description must not be empty".to_string()));
        }

        let context_id = Uuid::new_v4().to_string();
        self.db
            .execute(
                "INSERT INTO code_context
                 (context_id, timestamp, file_path, function_name, description, purpose, related_insights)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                vec![
                    text(context_id.as_str()),
                    text(now_timestamp()),
                    text(context.file_path.as_str()),
                    opt_text(context.function_name.as_deref()),
                    text(context.description.as_str()),
                    opt_text(context.purpose.as_deref()),
                    json(&context.related_insights)?,
                ],
            )
            .await?;
        Ok(context_id)
    }

    /// Everything needed to pick a project back up.
    pub async fn get_project_continuity(&self, workspace_path: Option<&str>, limit: usize) -> Result<ProjectContinuity> {
        let limit = int(limit as i64);

        let recent_sessions = match workspace_path {
            Some(path) => {
                self.db
                    .query_map(
                        &format!(
                            "SELECT {} FROM project_sessions WHERE workspace_path = ?1
                             ORDER BY start_timestamp DESC LIMIT ?2",
                            SESSION_COLUMNS
                        ),
                        vec![text(path), limit.clone()],
                        map_session,
                    )
                    .await?
            }
            None => {
                self.db
                    .query_map(
                        &format!(
                            "SELECT {} FROM project_sessions ORDER BY start_timestamp DESC LIMIT ?1",
                            SESSION_COLUMNS
                        ),
                        vec![limit.clone()],
                        map_session,
                    )
                    .await?
            }
        };

        let recent_conversations = self
            .db
            .query_map(
                &format!(
                    "SELECT {} FROM development_conversations ORDER BY timestamp DESC LIMIT ?1",
                    DEV_CONVERSATION_COLUMNS
                ),
                vec![limit.clone()],
                map_dev_conversation,
            )
            .await?;

        let important_insights = self
            .db
            .query_map(
                &format!(
                    "SELECT {} FROM project_insights WHERE importance_level >= ?1
                     ORDER BY importance_level DESC, timestamp_created DESC LIMIT ?2",
                    INSIGHT_COLUMNS
                ),
                vec![int(HIGH_IMPORTANCE), limit.clone()],
                map_insight,
            )
            .await?;

        let recent_code_context = self
            .db
            .query_map(
                &format!(
                    "SELECT {} FROM code_context ORDER BY timestamp DESC LIMIT ?1",
                    CODE_CONTEXT_COLUMNS
                ),
                vec![limit],
                map_code_context,
            )
            .await?;

        Ok(ProjectContinuity {
            workspace_path: workspace_path.map(str::to_string),
            recent_sessions,
            recent_conversations,
            important_insights,
            recent_code_context,
        })
    }

    pub async fn insights_with_embeddings(&self) -> Result<Vec<(ProjectInsight, Vec<f32>)>> {
        self.db
            .query_map(
                &format!(
                    "SELECT {}, embedding FROM project_insights WHERE embedding IS NOT NULL",
                    INSIGHT_COLUMNS
                ),
                vec![],
                |row| Ok((map_insight(row)?, row.embedding(8)?.unwrap_or_default())),
            )
            .await
    }

    pub async fn dev_conversations_with_embeddings(&self) -> Result<Vec<(DevelopmentConversation, Vec<f32>)>> {
        self.db
            .query_map(
                &format!(
                    "SELECT {}, embedding FROM development_conversations WHERE embedding IS NOT NULL",
                    DEV_CONVERSATION_COLUMNS
                ),
                vec![],
                |row| Ok((map_dev_conversation(row)?, row.embedding(8)?.unwrap_or_default())),
            )
            .await
    }

    pub async fn code_context_with_embeddings(&self) -> Result<Vec<(CodeContext, Vec<f32>)>> {
        self.db
            .query_map(
                &format!(
                    "SELECT {}, embedding FROM code_context WHERE embedding IS NOT NULL",
                    CODE_CONTEXT_COLUMNS
                ),
                vec![],
                |row| Ok((map_code_context(row)?, row.embedding(7)?.unwrap_or_default())),
            )
            .await
    }

    pub async fn search_insights_text(&self, words: &[String], limit: usize) -> Result<Vec<ProjectInsight>> {
        let (clause, mut params) = like_any("content", words);
        params.push(int(limit as i64));
        self.db
            .query_map(
                &format!(
                    "SELECT {} FROM project_insights WHERE {}
                     ORDER BY importance_level DESC LIMIT ?{}",
                    INSIGHT_COLUMNS,
                    clause,
                    params.len()
                ),
                params,
                map_insight,
            )
            .await
    }

    pub async fn search_dev_conversations_text(&self, words: &[String], limit: usize) -> Result<Vec<DevelopmentConversation>> {
        let (clause, mut params) = like_any("conversation_content", words);
        params.push(int(limit as i64));
        self.db
            .query_map(
                &format!(
                    "SELECT {} FROM development_conversations WHERE {}
                     ORDER BY timestamp DESC LIMIT ?{}",
                    DEV_CONVERSATION_COLUMNS,
                    clause,
                    params.len()
                ),
                params,
                map_dev_conversation,
            )
            .await
    }

    pub async fn search_code_context_text(&self, words: &[String], limit: usize) -> Result<Vec<CodeContext>> {
        let (clause, mut params) = like_any("description", words);
        params.push(int(limit as i64));
        self.db
            .query_map(
                &format!(
                    "SELECT {} FROM code_context WHERE {}
                     ORDER BY timestamp DESC LIMIT ?{}",
                    CODE_CONTEXT_COLUMNS,
                    clause,
                    params.len()
                ),
                params,
                map_code_context,
            )
            .await
    }

    pub async fn set_insight_embedding(&self, insight_id: &str, embedding: Vec<u8>) -> Result<()> {
        self.db
            .execute(
                "UPDATE project_insights SET embedding = ?1 WHERE insight_id = ?2",
                vec![blob(embedding), text(insight_id)],
            )
            .await?;
        Ok(())
    }

    pub async fn set_dev_conversation_embedding(&self, conversation_id: &str, embedding: Vec<u8>) -> Result<()> {
        self.db
            .execute(
                "UPDATE development_conversations SET embedding = ?1 WHERE conversation_id = ?2",
                vec![blob(embedding), text(conversation_id)],
            )
            .await?;
        Ok(())
    }

    pub async fn set_code_context_embedding(&self, context_id: &str, embedding: Vec<u8>) -> Result<()> {
        self.db
            .execute(
                "UPDATE code_context SET embedding = ?1 WHERE context_id = ?2",
                vec![blob(embedding), text(context_id)],
            )
            .await?;
        Ok(())
    }

    pub async fn session_count(&self) -> Result<i64> {
        self.db.count("SELECT COUNT(*) FROM project_sessions", vec![]).await
    }

    pub async fn insight_count(&self) -> Result<i64> {
        self.db.count("SELECT COUNT(*) FROM project_insights", vec![]).await
    }
}

/// `(col LIKE ?1 OR col LIKE ?2 ...)`; an empty word list matches nothing.
fn like_any(column: &str, words: &[String]) -> (String, Vec<Value>) {
    if words.is_empty() {
        return ("0 = 1".to_string(), Vec::new());
    }
    let mut params = Vec::with_capacity(words.len());
    let clauses: Vec<String> = words
        .iter()
        .map(|word| {
            params.push(text(format!("%{}%", word)));
            format!("LOWER({}) LIKE ?{}", column, params.len())
        })
        .collect();
    (format!("({})", clauses.join(" OR ")), params)
}

fn map_session(row: &Row) -> Result<DevelopmentSession> {
    Ok(DevelopmentSession {
        session_id: row.text(0)?,
        start_timestamp: row.text(1)?,
        end_timestamp: row.opt_text(2)?,
        workspace_path: row.text(3)?,
        active_files: row.string_list(4)?,
        git_branch: row.opt_text(5)?,
        session_summary: row.opt_text(6)?,
    })
}

fn map_dev_conversation(row: &Row) -> Result<DevelopmentConversation> {
    Ok(DevelopmentConversation {
        conversation_id: row.text(0)?,
        session_id: row.text(1)?,
        timestamp: row.text(2)?,
        chat_context_id: row.opt_text(3)?,
        conversation_content: row.text(4)?,
        decisions_made: row.opt_text(5)?,
        code_changes: row.opt_json(6)?,
        source_metadata: row.opt_json(7)?,
    })
}

fn map_insight(row: &Row) -> Result<ProjectInsight> {
    Ok(ProjectInsight {
        insight_id: row.text(0)?,
        timestamp_created: row.text(1)?,
        timestamp_updated: row.text(2)?,
        insight_type: row.text(3)?,
        content: row.text(4)?,
        related_files: row.string_list(5)?,
        source_conversation_id: row.opt_text(6)?,
        importance_level: row.opt_int(7)?.unwrap_or(crate::types::DEFAULT_IMPORTANCE),
    })
}

fn map_code_context(row: &Row) -> Result<CodeContext> {
    Ok(CodeContext {
        context_id: row.text(0)?,
        timestamp: row.text(1)?,
        file_path: row.text(2)?,
        function_name: row.opt_text(3)?,
        description: row.text(4)?,
        purpose: row.opt_text(5)?,
        related_insights: row.string_list(6)?,
    })
}
