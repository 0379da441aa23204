//! Postgres-backed relationship store.
//!
//! ## Conditional writes
//!
//! Preconditions are pushed into the statement so the check and the write are
//! one atomic round-trip:
//!
//! | `Expected`      | Statement                                           |
//! |-----------------|-----------------------------------------------------|
//! | `Any`           | `INSERT … ON CONFLICT (pk) DO UPDATE SET …`         |
//! | `Absent`        | `INSERT … ON CONFLICT DO NOTHING`                   |
//! | `Status(s)`     | `UPDATE … WHERE pk AND status = s`                  |
//!
//! Edge preconditions also compare the `version` column, which every rewrite
//! of an edge increments.
//!
//! Zero affected rows on `Absent`/`Status` means the precondition failed and is
//! reported as [`StoreError::Conflict`].
//!
//! ## Error Mapping
//!
//! | SQLx Error                   | StoreError    |
//! |------------------------------|---------------|
//! | Database, code `23505`       | `Conflict`    |
//! | Database (other)             | `Unavailable` |
//! | ColumnDecode / Decode        | `Corrupt`     |
//! | PoolClosed / Io / timeout    | `Unavailable` |
//!
//! ## Runtime
//!
//! The [`RelationshipStore`] trait is synchronous. Calls are bridged onto the
//! ambient tokio runtime with `block_in_place`, so the store must be used from a
//! multi-threaded runtime. Calls made outside a runtime, or from a
//! current-thread runtime, fail with [`StoreError::Unavailable`].

use std::collections::BTreeSet;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;
use tracing::instrument;
use uuid::Uuid;

use kindred_core::{Expected, InviteId, MessageId, RelationshipId, UserId};
use kindred_interactions::{
    EdgeKey, EdgeRevision, EdgeStatus, InteractionEdge, Invite, InviteKey, InviteStatus, Relationship,
    RelationshipStatus, SeedMessage,
};

use super::r#trait::{RelationshipStore, StoreError};
use crate::config::EngineConfig;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS interaction_edges (
    sender_id       UUID        NOT NULL,
    receiver_id     UUID        NOT NULL,
    kind            TEXT        NOT NULL,
    status          TEXT        NOT NULL,
    message         TEXT,
    relationship_id UUID,
    version         BIGINT      NOT NULL,
    created_at      TIMESTAMPTZ NOT NULL,
    updated_at      TIMESTAMPTZ NOT NULL,
    PRIMARY KEY (sender_id, receiver_id)
);
CREATE INDEX IF NOT EXISTS interaction_edges_receiver_idx
    ON interaction_edges (receiver_id, updated_at DESC);
CREATE INDEX IF NOT EXISTS interaction_edges_status_idx
    ON interaction_edges (sender_id, status);

CREATE TABLE IF NOT EXISTS relationships (
    id         UUID        PRIMARY KEY,
    kind       TEXT        NOT NULL,
    status     TEXT        NOT NULL,
    members    UUID[]      NOT NULL,
    created_at TIMESTAMPTZ NOT NULL
);
CREATE INDEX IF NOT EXISTS relationships_members_idx
    ON relationships USING GIN (members);

CREATE TABLE IF NOT EXISTS seed_messages (
    id              UUID        PRIMARY KEY,
    relationship_id UUID        NOT NULL,
    author_id       UUID        NOT NULL,
    content         TEXT        NOT NULL,
    created_at      TIMESTAMPTZ NOT NULL
);
CREATE INDEX IF NOT EXISTS seed_messages_relationship_idx
    ON seed_messages (relationship_id, created_at);

CREATE TABLE IF NOT EXISTS invites (
    subject_id      UUID        NOT NULL,
    invite_id       UUID        NOT NULL,
    record          TEXT        NOT NULL,
    inviter_id      UUID        NOT NULL,
    approver_id     UUID        NOT NULL,
    invitee_id      UUID        NOT NULL,
    status          TEXT        NOT NULL,
    relationship_id UUID,
    created_at      TIMESTAMPTZ NOT NULL,
    updated_at      TIMESTAMPTZ NOT NULL,
    PRIMARY KEY (subject_id, invite_id)
);
CREATE INDEX IF NOT EXISTS invites_approver_idx
    ON invites (approver_id, updated_at DESC);
CREATE INDEX IF NOT EXISTS invites_status_idx
    ON invites (status);
"#;

const EDGE_COLUMNS: &str =
    "sender_id, receiver_id, kind, status, message, relationship_id, version, created_at, updated_at";

const INVITE_COLUMNS: &str = "subject_id, invite_id, record, inviter_id, approver_id, invitee_id, \
     status, relationship_id, created_at, updated_at";

/// Postgres-backed [`RelationshipStore`].
#[derive(Debug, Clone)]
pub struct PostgresRelationshipStore {
    pool: Arc<PgPool>,
    timeout: Duration,
}

impl PostgresRelationshipStore {
    pub fn new(pool: PgPool, timeout: Duration) -> Self {
        Self {
            pool: Arc::new(pool),
            timeout,
        }
    }

    /// Connect to `database_url` with a small default pool.
    pub async fn connect(database_url: &str, timeout: Duration) -> Result<Self, StoreError> {
        let pool = pool_options(timeout)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool, timeout))
    }

    /// Store for `config.database_url`, or `None` when no database is configured.
    ///
    /// Connections are opened lazily on first use, each call bounded by
    /// `config.store_timeout`. Must be called within a tokio runtime.
    pub fn from_config(config: &EngineConfig) -> Result<Option<Self>, StoreError> {
        let Some(url) = config.database_url.as_deref() else {
            return Ok(None);
        };
        let pool = pool_options(config.store_timeout)
            .connect_lazy(url)
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Some(Self::new(pool, config.store_timeout)))
    }

    /// Deadline applied to every store call.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Apply the embedded schema. Idempotent.
    #[instrument(skip(self))]
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(self.pool.as_ref())
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        Ok(())
    }

    /// Run one store call on the ambient runtime, bounded by the configured timeout.
    fn run<T, F>(&self, operation: &'static str, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        let handle = tokio::runtime::Handle::try_current().map_err(|_| {
            StoreError::Unavailable(
                "PostgresRelationshipStore requires a tokio runtime".to_string(),
            )
        })?;
        // block_in_place panics on a current-thread runtime.
        if handle.runtime_flavor() == tokio::runtime::RuntimeFlavor::CurrentThread {
            return Err(StoreError::Unavailable(format!(
                "{operation} requires a multi-threaded tokio runtime"
            )));
        }
        let timeout = self.timeout;

        tokio::task::block_in_place(|| {
            handle.block_on(async {
                match tokio::time::timeout(timeout, fut).await {
                    Ok(result) => result,
                    Err(_) => Err(StoreError::Unavailable(format!(
                        "{operation} timed out after {}ms",
                        timeout.as_millis()
                    ))),
                }
            })
        })
    }

    async fn fetch_edges(
        &self,
        operation: &'static str,
        sql: String,
        user: UserId,
        status: Option<EdgeStatus>,
    ) -> Result<Vec<InteractionEdge>, StoreError> {
        let mut query = sqlx::query(&sql).bind(*user.as_uuid());
        if let Some(status) = status {
            query = query.bind(status.as_str());
        }
        let rows = query
            .fetch_all(self.pool.as_ref())
            .await
            .map_err(|e| map_sqlx_error(operation, e))?;
        rows.iter().map(edge_from_row).collect()
    }

    async fn write_edge(
        &self,
        edge: InteractionEdge,
        expected: Expected<EdgeRevision>,
    ) -> Result<(), StoreError> {
        let key = edge.key();
        let version = version_to_column(edge.version())?;
        let query = match expected {
            Expected::Status(revision) => sqlx::query(
                "UPDATE interaction_edges SET \
                 kind = $3, status = $4, message = $5, relationship_id = $6, version = $7, \
                 updated_at = $8 \
                 WHERE sender_id = $1 AND receiver_id = $2 AND status = $9 AND version = $10",
            )
            .bind(*key.sender.as_uuid())
            .bind(*key.receiver.as_uuid())
            .bind(edge.kind().as_str())
            .bind(edge.status().as_str())
            .bind(edge.message().map(str::to_string))
            .bind(edge.relationship_id().map(Uuid::from))
            .bind(version)
            .bind(edge.updated_at())
            .bind(revision.status.as_str())
            .bind(version_to_column(revision.version)?),
            Expected::Any | Expected::Absent => {
                let sql = if matches!(expected, Expected::Any) {
                    "INSERT INTO interaction_edges (sender_id, receiver_id, kind, status, message, \
                     relationship_id, version, created_at, updated_at) \
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
                     ON CONFLICT (sender_id, receiver_id) DO UPDATE SET \
                     kind = EXCLUDED.kind, status = EXCLUDED.status, message = EXCLUDED.message, \
                     relationship_id = EXCLUDED.relationship_id, version = EXCLUDED.version, \
                     updated_at = EXCLUDED.updated_at"
                } else {
                    "INSERT INTO interaction_edges (sender_id, receiver_id, kind, status, message, \
                     relationship_id, version, created_at, updated_at) \
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) ON CONFLICT DO NOTHING"
                };
                sqlx::query(sql)
                    .bind(*key.sender.as_uuid())
                    .bind(*key.receiver.as_uuid())
                    .bind(edge.kind().as_str())
                    .bind(edge.status().as_str())
                    .bind(edge.message().map(str::to_string))
                    .bind(edge.relationship_id().map(Uuid::from))
                    .bind(version)
                    .bind(edge.created_at())
                    .bind(edge.updated_at())
            }
        };

        let result = query
            .execute(self.pool.as_ref())
            .await
            .map_err(|e| map_sqlx_error("put_edge", e))?;
        ensure_applied(result.rows_affected(), expected, || key.to_string())
    }

    async fn write_relationship(
        &self,
        relationship: Relationship,
        expected: Expected<RelationshipStatus>,
    ) -> Result<(), StoreError> {
        let id = relationship.relationship_id();
        let members: Vec<Uuid> = relationship.members().iter().map(|m| *m.as_uuid()).collect();
        let query = match expected {
            Expected::Status(status) => sqlx::query(
                "UPDATE relationships SET status = $2, members = $3 \
                 WHERE id = $1 AND status = $4",
            )
            .bind(*id.as_uuid())
            .bind(relationship.status().as_str())
            .bind(members)
            .bind(status.as_str()),
            Expected::Any | Expected::Absent => {
                let sql = if matches!(expected, Expected::Any) {
                    "INSERT INTO relationships (id, kind, status, members, created_at) \
                     VALUES ($1, $2, $3, $4, $5) \
                     ON CONFLICT (id) DO UPDATE SET \
                     status = EXCLUDED.status, members = EXCLUDED.members"
                } else {
                    "INSERT INTO relationships (id, kind, status, members, created_at) \
                     VALUES ($1, $2, $3, $4, $5) ON CONFLICT DO NOTHING"
                };
                sqlx::query(sql)
                    .bind(*id.as_uuid())
                    .bind(relationship.kind().as_str())
                    .bind(relationship.status().as_str())
                    .bind(members)
                    .bind(relationship.created_at())
            }
        };

        let result = query
            .execute(self.pool.as_ref())
            .await
            .map_err(|e| map_sqlx_error("put_relationship", e))?;
        ensure_applied(result.rows_affected(), expected, || format!("relationship {id}"))
    }

    async fn write_invite(
        &self,
        invite: Invite,
        expected: Expected<InviteStatus>,
    ) -> Result<(), StoreError> {
        let key = invite.key();
        let query = match expected {
            Expected::Status(status) => sqlx::query(
                "UPDATE invites SET status = $3, relationship_id = $4, updated_at = $5 \
                 WHERE subject_id = $1 AND invite_id = $2 AND status = $6",
            )
            .bind(*key.subject.as_uuid())
            .bind(*key.invite_id.as_uuid())
            .bind(invite.status().as_str())
            .bind(invite.relationship_id().map(Uuid::from))
            .bind(invite.updated_at())
            .bind(status.as_str()),
            Expected::Any | Expected::Absent => {
                let sql = if matches!(expected, Expected::Any) {
                    "INSERT INTO invites (subject_id, invite_id, record, inviter_id, approver_id, \
                     invitee_id, status, relationship_id, created_at, updated_at) \
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
                     ON CONFLICT (subject_id, invite_id) DO UPDATE SET \
                     status = EXCLUDED.status, relationship_id = EXCLUDED.relationship_id, \
                     updated_at = EXCLUDED.updated_at"
                } else {
                    "INSERT INTO invites (subject_id, invite_id, record, inviter_id, approver_id, \
                     invitee_id, status, relationship_id, created_at, updated_at) \
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) ON CONFLICT DO NOTHING"
                };
                sqlx::query(sql)
                    .bind(*key.subject.as_uuid())
                    .bind(*key.invite_id.as_uuid())
                    .bind(invite.record().as_str())
                    .bind(*invite.inviter().as_uuid())
                    .bind(*invite.approver().as_uuid())
                    .bind(*invite.invitee().as_uuid())
                    .bind(invite.status().as_str())
                    .bind(invite.relationship_id().map(Uuid::from))
                    .bind(invite.created_at())
                    .bind(invite.updated_at())
            }
        };

        let result = query
            .execute(self.pool.as_ref())
            .await
            .map_err(|e| map_sqlx_error("put_invite", e))?;
        ensure_applied(result.rows_affected(), expected, || {
            format!("invite {} under {}", key.invite_id, key.subject)
        })
    }

    async fn fetch_invites(
        &self,
        operation: &'static str,
        sql: String,
        user: UserId,
    ) -> Result<Vec<Invite>, StoreError> {
        let rows = sqlx::query(&sql)
            .bind(*user.as_uuid())
            .fetch_all(self.pool.as_ref())
            .await
            .map_err(|e| map_sqlx_error(operation, e))?;
        rows.iter().map(invite_from_row).collect()
    }

    async fn fetch_messages(
        &self,
        relationship_id: RelationshipId,
        latest_only: bool,
    ) -> Result<Vec<SeedMessage>, StoreError> {
        let sql = if latest_only {
            "SELECT id, relationship_id, author_id, content, created_at FROM seed_messages \
             WHERE relationship_id = $1 ORDER BY created_at DESC LIMIT 1"
        } else {
            "SELECT id, relationship_id, author_id, content, created_at FROM seed_messages \
             WHERE relationship_id = $1 ORDER BY created_at ASC"
        };
        let rows = sqlx::query(sql)
            .bind(*relationship_id.as_uuid())
            .fetch_all(self.pool.as_ref())
            .await
            .map_err(|e| map_sqlx_error("messages", e))?;
        rows.iter().map(message_from_row).collect()
    }
}

impl RelationshipStore for PostgresRelationshipStore {
    fn get_edge(&self, key: EdgeKey) -> Result<Option<InteractionEdge>, StoreError> {
        self.run("get_edge", async {
            let row = sqlx::query(&format!(
                "SELECT {EDGE_COLUMNS} FROM interaction_edges \
                 WHERE sender_id = $1 AND receiver_id = $2"
            ))
            .bind(*key.sender.as_uuid())
            .bind(*key.receiver.as_uuid())
            .fetch_optional(self.pool.as_ref())
            .await
            .map_err(|e| map_sqlx_error("get_edge", e))?;
            row.as_ref().map(edge_from_row).transpose()
        })
    }

    fn put_edge(
        &self,
        edge: InteractionEdge,
        expected: Expected<EdgeRevision>,
    ) -> Result<(), StoreError> {
        self.run("put_edge", self.write_edge(edge, expected))
    }

    fn edges_sent(&self, sender: UserId) -> Result<Vec<InteractionEdge>, StoreError> {
        let sql = format!(
            "SELECT {EDGE_COLUMNS} FROM interaction_edges WHERE sender_id = $1 \
             ORDER BY updated_at DESC, created_at DESC"
        );
        self.run("edges_sent", self.fetch_edges("edges_sent", sql, sender, None))
    }

    fn edges_received(&self, receiver: UserId) -> Result<Vec<InteractionEdge>, StoreError> {
        let sql = format!(
            "SELECT {EDGE_COLUMNS} FROM interaction_edges WHERE receiver_id = $1 \
             ORDER BY updated_at DESC, created_at DESC"
        );
        self.run(
            "edges_received",
            self.fetch_edges("edges_received", sql, receiver, None),
        )
    }

    fn edges_by_status(
        &self,
        sender: UserId,
        status: EdgeStatus,
    ) -> Result<Vec<InteractionEdge>, StoreError> {
        let sql = format!(
            "SELECT {EDGE_COLUMNS} FROM interaction_edges WHERE sender_id = $1 AND status = $2 \
             ORDER BY updated_at DESC, created_at DESC"
        );
        self.run(
            "edges_by_status",
            self.fetch_edges("edges_by_status", sql, sender, Some(status)),
        )
    }

    fn get_relationship(&self, id: RelationshipId) -> Result<Option<Relationship>, StoreError> {
        self.run("get_relationship", async {
            let row = sqlx::query(
                "SELECT id, kind, status, members, created_at FROM relationships WHERE id = $1",
            )
            .bind(*id.as_uuid())
            .fetch_optional(self.pool.as_ref())
            .await
            .map_err(|e| map_sqlx_error("get_relationship", e))?;
            row.as_ref().map(relationship_from_row).transpose()
        })
    }

    fn put_relationship(
        &self,
        relationship: Relationship,
        expected: Expected<RelationshipStatus>,
    ) -> Result<(), StoreError> {
        self.run(
            "put_relationship",
            self.write_relationship(relationship, expected),
        )
    }

    fn put_message(&self, message: SeedMessage) -> Result<(), StoreError> {
        self.run("put_message", async {
            let result = sqlx::query(
                "INSERT INTO seed_messages (id, relationship_id, author_id, content, created_at) \
                 VALUES ($1, $2, $3, $4, $5) ON CONFLICT DO NOTHING",
            )
            .bind(*message.id.as_uuid())
            .bind(*message.relationship_id.as_uuid())
            .bind(*message.author.as_uuid())
            .bind(&message.content)
            .bind(message.created_at)
            .execute(self.pool.as_ref())
            .await
            .map_err(|e| map_sqlx_error("put_message", e))?;
            ensure_applied(result.rows_affected(), Expected::<()>::Absent, || {
                format!("message {}", message.id)
            })
        })
    }

    fn messages(&self, relationship_id: RelationshipId) -> Result<Vec<SeedMessage>, StoreError> {
        self.run("messages", self.fetch_messages(relationship_id, false))
    }

    fn latest_message(
        &self,
        relationship_id: RelationshipId,
    ) -> Result<Option<SeedMessage>, StoreError> {
        self.run("latest_message", async {
            Ok(self.fetch_messages(relationship_id, true).await?.pop())
        })
    }

    fn get_invite(&self, key: InviteKey) -> Result<Option<Invite>, StoreError> {
        self.run("get_invite", async {
            let row = sqlx::query(&format!(
                "SELECT {INVITE_COLUMNS} FROM invites WHERE subject_id = $1 AND invite_id = $2"
            ))
            .bind(*key.subject.as_uuid())
            .bind(*key.invite_id.as_uuid())
            .fetch_optional(self.pool.as_ref())
            .await
            .map_err(|e| map_sqlx_error("get_invite", e))?;
            row.as_ref().map(invite_from_row).transpose()
        })
    }

    fn put_invite(&self, invite: Invite, expected: Expected<InviteStatus>) -> Result<(), StoreError> {
        self.run("put_invite", self.write_invite(invite, expected))
    }

    fn invites_by_approver(&self, approver: UserId) -> Result<Vec<Invite>, StoreError> {
        let sql = format!(
            "SELECT {INVITE_COLUMNS} FROM invites WHERE approver_id = $1 AND record = 'proposal' \
             ORDER BY updated_at DESC, created_at DESC"
        );
        self.run(
            "invites_by_approver",
            self.fetch_invites("invites_by_approver", sql, approver),
        )
    }

    fn invites_by_subject(&self, subject: UserId) -> Result<Vec<Invite>, StoreError> {
        let sql = format!(
            "SELECT {INVITE_COLUMNS} FROM invites WHERE subject_id = $1 \
             ORDER BY updated_at DESC, created_at DESC"
        );
        self.run(
            "invites_by_subject",
            self.fetch_invites("invites_by_subject", sql, subject),
        )
    }
}

fn ensure_applied<S>(
    rows_affected: u64,
    expected: Expected<S>,
    describe: impl FnOnce() -> String,
) -> Result<(), StoreError>
where
    S: core::fmt::Debug,
{
    if rows_affected == 0 && !matches!(expected, Expected::Any) {
        return Err(StoreError::Conflict(format!(
            "{} (expected: {expected:?})",
            describe()
        )));
    }
    Ok(())
}

fn pool_options(timeout: Duration) -> sqlx::postgres::PgPoolOptions {
    sqlx::postgres::PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(timeout)
}

fn version_to_column(version: u64) -> Result<i64, StoreError> {
    i64::try_from(version).map_err(|_| StoreError::Corrupt(format!("edge version {version} out of range")))
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {operation}: {}", db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => StoreError::Conflict(msg),
                _ => StoreError::Unavailable(msg),
            }
        }
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
            StoreError::Corrupt(format!("decode failed in {operation}: {err}"))
        }
        other => StoreError::Unavailable(format!("{operation}: {other}")),
    }
}

fn parse_column<T>(row: &PgRow, column: &str) -> Result<T, StoreError>
where
    T: FromStr<Err = kindred_core::DomainError>,
{
    let raw: String = row
        .try_get(column)
        .map_err(|e| map_sqlx_error("decode", e))?;
    raw.parse()
        .map_err(|e| StoreError::Corrupt(format!("{column}: {e}")))
}

fn get<'r, T>(row: &'r PgRow, column: &str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    row.try_get(column).map_err(|e| map_sqlx_error("decode", e))
}

fn edge_from_row(row: &PgRow) -> Result<InteractionEdge, StoreError> {
    let key = EdgeKey::new(
        UserId::from_uuid(get(row, "sender_id")?),
        UserId::from_uuid(get(row, "receiver_id")?),
    );
    let relationship_id: Option<Uuid> = get(row, "relationship_id")?;
    let version: i64 = get(row, "version")?;
    let version = u64::try_from(version)
        .map_err(|_| StoreError::Corrupt(format!("edge {key} has negative version {version}")))?;
    Ok(InteractionEdge::from_parts(
        key,
        parse_column(row, "kind")?,
        parse_column(row, "status")?,
        get(row, "message")?,
        relationship_id.map(RelationshipId::from_uuid),
        version,
        get(row, "created_at")?,
        get(row, "updated_at")?,
    ))
}

fn relationship_from_row(row: &PgRow) -> Result<Relationship, StoreError> {
    let members: Vec<Uuid> = get(row, "members")?;
    let members: BTreeSet<UserId> = members.into_iter().map(UserId::from_uuid).collect();
    Relationship::from_parts(
        RelationshipId::from_uuid(get(row, "id")?),
        parse_column(row, "kind")?,
        parse_column(row, "status")?,
        members,
        get(row, "created_at")?,
    )
    .map_err(|e| StoreError::Corrupt(e.to_string()))
}

fn message_from_row(row: &PgRow) -> Result<SeedMessage, StoreError> {
    Ok(SeedMessage {
        id: MessageId::from_uuid(get(row, "id")?),
        relationship_id: RelationshipId::from_uuid(get(row, "relationship_id")?),
        author: UserId::from_uuid(get(row, "author_id")?),
        content: get(row, "content")?,
        created_at: get(row, "created_at")?,
    })
}

fn invite_from_row(row: &PgRow) -> Result<Invite, StoreError> {
    let relationship_id: Option<Uuid> = get(row, "relationship_id")?;
    Ok(Invite::from_parts(
        InviteKey {
            subject: UserId::from_uuid(get(row, "subject_id")?),
            invite_id: InviteId::from_uuid(get(row, "invite_id")?),
        },
        parse_column(row, "record")?,
        UserId::from_uuid(get(row, "inviter_id")?),
        UserId::from_uuid(get(row, "approver_id")?),
        UserId::from_uuid(get(row, "invitee_id")?),
        parse_column(row, "status")?,
        relationship_id.map(RelationshipId::from_uuid),
        get(row, "created_at")?,
        get(row, "updated_at")?,
    ))
}
