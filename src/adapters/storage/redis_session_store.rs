//! Redis-backed session store for multi-process deployments.
//!
//! Each session is two keys: the JSON record and a version counter. Every
//! mutation is an optimistic compare-and-set loop:
//! 1. MGET the record and its version
//! 2. Compute the new record locally (merge, caller update, snapshot, rollback)
//! 3. Commit with a Lua script that writes record and version only if the
//!    version is unchanged
//!
//! A lost race re-reads and recomputes, so concurrent writers never drop
//! each other's updates. Both keys expire after the configured TTL.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Script};
use tracing::{debug, warn};

use crate::config::RedisConfig;
use crate::domain::foundation::{SessionId, Timestamp};
use crate::domain::session::{SessionPatch, SessionState};
use crate::ports::{SessionStore, SessionStoreError};

/// KEYS[1] record, KEYS[2] version.
/// ARGV[1] expected version, ARGV[2] record JSON, ARGV[3] TTL seconds (0 = none).
const COMMIT_SCRIPT: &str = r#"
local current = redis.call('GET', KEYS[2])
if current == false then current = '0' end
if current ~= ARGV[1] then return 0 end
local next_version = tostring(tonumber(current) + 1)
local ttl = tonumber(ARGV[3])
if ttl > 0 then
  redis.call('SET', KEYS[1], ARGV[2], 'EX', ttl)
  redis.call('SET', KEYS[2], next_version, 'EX', ttl)
else
  redis.call('SET', KEYS[1], ARGV[2])
  redis.call('SET', KEYS[2], next_version)
end
return 1
"#;

/// Redis-backed session store.
#[derive(Clone)]
pub struct RedisSessionStore {
    conn: MultiplexedConnection,
    commit: Script,
    key_prefix: String,
    ttl_secs: u64,
    max_cas_retries: u32,
}

impl RedisSessionStore {
    /// Create a store over an existing connection.
    pub fn new(conn: MultiplexedConnection, config: &RedisConfig) -> Self {
        Self {
            conn,
            commit: Script::new(COMMIT_SCRIPT),
            key_prefix: config.key_prefix.clone(),
            ttl_secs: config.session_ttl_secs,
            max_cas_retries: config.max_cas_retries,
        }
    }

    /// Open a connection from config and create the store.
    pub async fn connect(config: &RedisConfig) -> Result<Self, SessionStoreError> {
        let client = redis::Client::open(config.url.as_str()).map_err(backend)?;
        let conn = client
            .get_multiplexed_tokio_connection()
            .await
            .map_err(backend)?;
        Ok(Self::new(conn, config))
    }

    fn record_key(&self, session_id: &SessionId) -> String {
        record_key(&self.key_prefix, session_id)
    }

    fn version_key(&self, session_id: &SessionId) -> String {
        format!("{}:version", self.record_key(session_id))
    }

    /// Reads the record and its version in one round trip.
    async fn load(
        &self,
        session_id: &SessionId,
    ) -> Result<(Option<SessionState>, i64), SessionStoreError> {
        let mut conn = self.conn.clone();
        let (raw, version): (Option<String>, Option<i64>) = redis::cmd("MGET")
            .arg(self.record_key(session_id))
            .arg(self.version_key(session_id))
            .query_async(&mut conn)
            .await
            .map_err(backend)?;
        let state = raw.as_deref().map(decode).transpose()?;
        Ok((state, version.unwrap_or(0)))
    }

    /// Runs `compute` inside the CAS loop and returns the live record.
    ///
    /// `compute` returns `Ok(None)` to leave the record as it is.
    async fn mutate<F>(
        &self,
        session_id: &SessionId,
        mut compute: F,
    ) -> Result<SessionState, SessionStoreError>
    where
        F: FnMut(Option<&SessionState>) -> Result<Option<SessionState>, SessionStoreError> + Send,
    {
        for attempt in 0..=self.max_cas_retries {
            let (current, version) = self.load(session_id).await?;
            let next = match compute(current.as_ref())? {
                Some(next) => next,
                None => return current.ok_or_else(|| SessionStoreError::NotFound(session_id.clone())),
            };
            let payload = serde_json::to_string(&next)
                .map_err(|e| SessionStoreError::Serialization(e.to_string()))?;

            let mut conn = self.conn.clone();
            let committed: i64 = self
                .commit
                .key(self.record_key(session_id))
                .key(self.version_key(session_id))
                .arg(version.to_string())
                .arg(payload)
                .arg(self.ttl_secs)
                .invoke_async(&mut conn)
                .await
                .map_err(backend)?;

            if committed == 1 {
                return Ok(next);
            }
            debug!(session_id = %session_id, attempt, "Session CAS conflict, retrying");
        }

        warn!(session_id = %session_id, retries = self.max_cas_retries, "Session CAS retries exhausted");
        Err(SessionStoreError::Conflict(session_id.clone()))
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn get(&self, session_id: &SessionId) -> Result<Option<SessionState>, SessionStoreError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn
            .get(self.record_key(session_id))
            .await
            .map_err(backend)?;
        raw.as_deref().map(decode).transpose()
    }

    async fn set(&self, session_id: &SessionId, state: SessionState) -> Result<(), SessionStoreError> {
        self.mutate(session_id, |current| {
            Ok(Some(state.clone().committed_over(current, Timestamp::now())))
        })
        .await
        .map(|_| ())
    }

    async fn patch(
        &self,
        session_id: &SessionId,
        patch: SessionPatch,
    ) -> Result<SessionState, SessionStoreError> {
        self.mutate(session_id, |current| {
            let current = current.ok_or_else(|| SessionStoreError::NotFound(session_id.clone()))?;
            Ok(Some(
                patch
                    .apply_to(current)
                    .committed_over(Some(current), Timestamp::now()),
            ))
        })
        .await
    }

    async fn update(
        &self,
        session_id: &SessionId,
        update: &mut (dyn for<'s> FnMut(&'s SessionState) -> Option<SessionPatch> + Send),
    ) -> Result<SessionState, SessionStoreError> {
        self.mutate(session_id, |current| {
            let current = current.ok_or_else(|| SessionStoreError::NotFound(session_id.clone()))?;
            Ok(update(current).map(|patch| {
                patch
                    .apply_to(current)
                    .committed_over(Some(current), Timestamp::now())
            }))
        })
        .await
    }

    async fn rollback(
        &self,
        session_id: &SessionId,
        steps: usize,
    ) -> Result<SessionState, SessionStoreError> {
        self.mutate(session_id, |current| {
            let current = current.ok_or_else(|| SessionStoreError::NotFound(session_id.clone()))?;
            Ok(current.rolled_back(steps, Timestamp::now()))
        })
        .await
    }

    async fn rollback_if_current(
        &self,
        session_id: &SessionId,
        revision: u64,
    ) -> Result<Option<SessionState>, SessionStoreError> {
        let mut stale = false;
        let state = self
            .mutate(session_id, |current| {
                let current = current.ok_or_else(|| SessionStoreError::NotFound(session_id.clone()))?;
                stale = current.revision != revision;
                if stale {
                    return Ok(None);
                }
                Ok(current.rolled_back(1, Timestamp::now()))
            })
            .await?;
        Ok((!stale).then_some(state))
    }

    async fn delete(&self, session_id: &SessionId) -> Result<(), SessionStoreError> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(vec![self.record_key(session_id), self.version_key(session_id)])
            .await
            .map_err(backend)
    }
}

impl std::fmt::Debug for RedisSessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisSessionStore")
            .field("key_prefix", &self.key_prefix)
            .field("ttl_secs", &self.ttl_secs)
            .field("max_cas_retries", &self.max_cas_retries)
            .finish_non_exhaustive()
    }
}

fn record_key(prefix: &str, session_id: &SessionId) -> String {
    format!("{}:session:{}", prefix, session_id)
}

fn decode(raw: &str) -> Result<SessionState, SessionStoreError> {
    serde_json::from_str(raw).map_err(|e| SessionStoreError::Serialization(e.to_string()))
}

fn backend(err: redis::RedisError) -> SessionStoreError {
    SessionStoreError::Backend(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::agent::SessionPhase;
    use crate::domain::foundation::UserId;

    #[test]
    fn record_key_is_prefixed() {
        let sid = SessionId::new("abc").unwrap();
        assert_eq!(record_key("bedtime", &sid), "bedtime:session:abc");
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(matches!(decode("not json"), Err(SessionStoreError::Serialization(_))));
    }

    #[test]
    fn decode_reads_stored_record() {
        let state = SessionState::new(SessionId::new("abc").unwrap(), UserId::new("u").unwrap());
        let json = serde_json::to_string(&state).unwrap();
        assert_eq!(decode(&json).unwrap(), state);
    }

    // Requires a running Redis at REDIS_URL.
    #[tokio::test]
    #[ignore]
    async fn cas_loop_against_live_redis() {
        let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1/".to_string());
        let config = RedisConfig {
            url,
            key_prefix: format!("test-{}", uuid::Uuid::new_v4()),
            ..RedisConfig::default()
        };
        let store = RedisSessionStore::connect(&config).await.unwrap();
        let sid = SessionId::new("live").unwrap();

        store
            .set(&sid, SessionState::new(sid.clone(), UserId::new("u").unwrap()))
            .await
            .unwrap();
        let patched = store
            .patch(&sid, SessionPatch::new().phase(SessionPhase::Onboarding))
            .await
            .unwrap();
        assert_eq!(patched.history.len(), 1);

        let bumped = store
            .update(&sid, &mut |live: &SessionState| {
                Some(SessionPatch::new().context_value("turns", live.history.len() as u64))
            })
            .await
            .unwrap();
        assert_eq!(bumped.context.counter("turns"), 1);
        assert!(store
            .rollback_if_current(&sid, patched.revision)
            .await
            .unwrap()
            .is_none());

        let restored = store.rollback(&sid, 5).await.unwrap();
        assert_eq!(restored.phase, SessionPhase::Idle);
        store.delete(&sid).await.unwrap();
        assert!(store.get(&sid).await.unwrap().is_none());
    }
}
