use super::{Conversation, Message, NewMessage, Role, Storage};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::path::Path;
use std::str::FromStr;

const MESSAGE_COLUMNS: &str = "id, conversation_id, role, content, timestamp, image_data, \
     generation_id, tokens_prompt, tokens_completion, total_cost";

#[derive(Clone)]
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Open (or create) the database at `path`. `":memory:"` gives a private
    /// in-memory database held on a single connection.
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let pool = if path.as_os_str() == ":memory:" {
            let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await
                .context("Failed to open in-memory SQLite database")?
        } else {
            // Create parent directory if it doesn't exist
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    tokio::fs::create_dir_all(parent).await?;
                }
            }

            let options = SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true)
                .foreign_keys(true);
            SqlitePool::connect_with(options)
                .await
                .context("Failed to connect to SQLite database")?
        };

        // Run migrations
        sqlx::migrate!("./migrations/sqlite")
            .run(&pool)
            .await
            .context("Failed to run database migrations")?;

        Ok(Self { pool })
    }
}

fn conversation_from_row(r: &SqliteRow) -> Conversation {
    Conversation {
        id: r.get("id"),
        name: r.get("name"),
        created_at: r
            .get::<Option<chrono::DateTime<Utc>>, _>("created_at")
            .unwrap_or_default(),
    }
}

fn message_from_row(r: &SqliteRow) -> Result<Message> {
    let role: String = r.get("role");
    Ok(Message {
        id: r.get("id"),
        conversation_id: r.get("conversation_id"),
        role: role.parse()?,
        content: r.get("content"),
        timestamp: r
            .get::<Option<chrono::DateTime<Utc>>, _>("timestamp")
            .unwrap_or_default(),
        image_data: r.get("image_data"),
        generation_id: r.get("generation_id"),
        tokens_prompt: r.get("tokens_prompt"),
        tokens_completion: r.get("tokens_completion"),
        total_cost: r.get("total_cost"),
    })
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn create_conversation(&self, name: &str) -> Result<Conversation> {
        let created_at = Utc::now();
        let result = sqlx::query("INSERT INTO conversation (name, created_at) VALUES (?, ?)")
            .bind(name)
            .bind(created_at)
            .execute(&self.pool)
            .await?;

        Ok(Conversation {
            id: result.last_insert_rowid(),
            name: name.to_string(),
            created_at,
        })
    }

    async fn get_conversation(&self, id: i64) -> Result<Option<Conversation>> {
        let row = sqlx::query("SELECT id, name, created_at FROM conversation WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(conversation_from_row))
    }

    async fn list_conversations(&self) -> Result<Vec<Conversation>> {
        let rows = sqlx::query("SELECT id, name, created_at FROM conversation ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(conversation_from_row).collect())
    }

    async fn delete_conversation(&self, id: i64) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM chat_message WHERE conversation_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM conversation WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    async fn add_message(&self, message: NewMessage) -> Result<Message> {
        let result = sqlx::query(
            "INSERT INTO chat_message (conversation_id, role, content, timestamp, image_data,
             generation_id, tokens_prompt, tokens_completion, total_cost)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(message.conversation_id)
        .bind(message.role.as_str())
        .bind(&message.content)
        .bind(message.timestamp)
        .bind(&message.image_data)
        .bind(&message.generation_id)
        .bind(message.tokens_prompt)
        .bind(message.tokens_completion)
        .bind(message.total_cost)
        .execute(&self.pool)
        .await
        .with_context(|| {
            format!(
                "Failed to store message for conversation {}",
                message.conversation_id
            )
        })?;

        Ok(Message {
            id: result.last_insert_rowid(),
            conversation_id: message.conversation_id,
            role: message.role,
            content: message.content,
            timestamp: message.timestamp,
            image_data: message.image_data,
            generation_id: message.generation_id,
            tokens_prompt: message.tokens_prompt,
            tokens_completion: message.tokens_completion,
            total_cost: message.total_cost,
        })
    }

    async fn get_messages(&self, conversation_id: i64) -> Result<Vec<Message>> {
        let rows = sqlx::query(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM chat_message
             WHERE conversation_id = ?
             ORDER BY timestamp, id"
        ))
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(message_from_row).collect()
    }

    async fn get_all_messages(&self) -> Result<Vec<Message>> {
        let rows = sqlx::query(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM chat_message ORDER BY timestamp, id"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(message_from_row).collect()
    }

    async fn delete_conversation_messages(&self, conversation_id: i64) -> Result<u64> {
        let result = sqlx::query("DELETE FROM chat_message WHERE conversation_id = ?")
            .bind(conversation_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn delete_all_messages(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM chat_message")
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn clear(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM chat_message")
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM conversation")
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn storage() -> SqliteStorage {
        SqliteStorage::new(":memory:")
            .await
            .expect("Failed to create storage")
    }

    #[tokio::test]
    async fn test_in_memory_databases_are_private() {
        let one = storage().await;
        let two = storage().await;

        let conversation = one.create_conversation("only here").await.unwrap();
        one.add_message(NewMessage::new(conversation.id, Role::User, "kept"))
            .await
            .unwrap();

        // Same pool, so the data outlives the first query
        assert_eq!(one.get_messages(conversation.id).await.unwrap().len(), 1);
        assert!(two.list_conversations().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_messages_are_ordered_and_scoped() {
        let storage = storage().await;
        let first = storage.create_conversation("first").await.unwrap();
        let second = storage.create_conversation("second").await.unwrap();

        storage
            .add_message(NewMessage::new(first.id, Role::User, "hello"))
            .await
            .unwrap();
        storage
            .add_message(NewMessage::new(second.id, Role::User, "elsewhere"))
            .await
            .unwrap();
        storage
            .add_message(NewMessage::new(first.id, Role::Assistant, "hi"))
            .await
            .unwrap();

        let messages = storage.get_messages(first.id).await.unwrap();
        let contents: Vec<&str> = messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["hello", "hi"]);
        assert_eq!(messages[1].role, Role::Assistant);

        assert_eq!(storage.get_all_messages().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_delete_conversation_cascades() {
        let storage = storage().await;
        let doomed = storage.create_conversation("doomed").await.unwrap();
        let kept = storage.create_conversation("kept").await.unwrap();

        storage
            .add_message(NewMessage::new(doomed.id, Role::User, "bye"))
            .await
            .unwrap();
        storage
            .add_message(NewMessage::new(kept.id, Role::User, "stay"))
            .await
            .unwrap();

        assert!(storage.delete_conversation(doomed.id).await.unwrap());
        assert!(!storage.delete_conversation(doomed.id).await.unwrap());

        assert!(storage.get_conversation(doomed.id).await.unwrap().is_none());
        assert!(storage.get_messages(doomed.id).await.unwrap().is_empty());
        assert_eq!(storage.get_messages(kept.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_usage_metadata_round_trips() {
        let storage = storage().await;
        let conversation = storage.create_conversation("usage").await.unwrap();

        let mut message = NewMessage::new(conversation.id, Role::Assistant, "answer");
        message.generation_id = Some("msg_01".to_string());
        message.tokens_prompt = Some(12);
        message.tokens_completion = Some(34);
        message.total_cost = Some(0.000_045);
        storage.add_message(message).await.unwrap();

        let stored = &storage.get_messages(conversation.id).await.unwrap()[0];
        assert_eq!(stored.generation_id.as_deref(), Some("msg_01"));
        assert_eq!(stored.tokens_prompt, Some(12));
        assert_eq!(stored.tokens_completion, Some(34));
        assert_eq!(stored.total_cost, Some(0.000_045));
        assert!(stored.image_data.is_none());
    }

    #[tokio::test]
    async fn test_message_requires_existing_conversation() {
        let storage = storage().await;
        let result = storage
            .add_message(NewMessage::new(42, Role::User, "orphan"))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_file_database_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("chat.db");

        {
            let storage = SqliteStorage::new(&path).await.unwrap();
            let conversation = storage.create_conversation("saved").await.unwrap();
            storage
                .add_message(NewMessage::new(conversation.id, Role::User, "persist me"))
                .await
                .unwrap();
        }

        let reopened = SqliteStorage::new(&path).await.unwrap();
        let conversations = reopened.list_conversations().await.unwrap();
        assert_eq!(conversations.len(), 1);
        assert_eq!(conversations[0].name, "saved");
        assert_eq!(reopened.get_all_messages().await.unwrap().len(), 1);
    }
}
