//! Paste store backed by a Redis-compatible server.
//!
//! One connection is opened on first use and shared behind a mutex. A
//! failed or abandoned exchange drops it, and the next call connects again.
//! Calls are never retried.

use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{store_lifetime, PasteStore, RedisConfig, StoreError};
use crate::connection::ConnectionHandler;
use crate::paste::record::{paste_key, views_key, PasteRecord};
use crate::protocol::RespValue;

pub struct RedisStore {
    config: RedisConfig,
    eviction_grace: Option<Duration>,
    conn: Mutex<Option<ConnectionHandler>>,
}

impl RedisStore {
    /// Does not connect; the first call does.
    pub fn new(config: RedisConfig, eviction_grace: Option<Duration>) -> Self {
        Self {
            config,
            eviction_grace,
            conn: Mutex::new(None),
        }
    }

    async fn open(&self) -> Result<ConnectionHandler, StoreError> {
        let mut conn = ConnectionHandler::connect(&self.config.addr).await?;

        if let Some(password) = &self.config.password {
            let reply = conn
                .request(RespValue::command(["AUTH".to_string(), password.clone()]))
                .await?;
            expect_ok(&reply, "AUTH")?;
        }
        if self.config.db != 0 {
            let reply = conn
                .request(RespValue::command(["SELECT".to_string(), self.config.db.to_string()]))
                .await?;
            expect_ok(&reply, "SELECT")?;
        }

        debug!(server = %conn.peer_addr(), db = self.config.db, "Redis store connected");
        Ok(conn)
    }

    /// Sends `commands` as one pipeline on the shared connection.
    ///
    /// The connection is taken out of its slot for the exchange and only put
    /// back after every reply was read. A caller dropped mid-exchange drops
    /// the connection with it, so unread replies never reach the next caller.
    async fn execute(&self, commands: Vec<RespValue>) -> Result<Vec<RespValue>, StoreError> {
        let mut guard = self.conn.lock().await;

        let mut conn = match guard.take() {
            Some(conn) => conn,
            None => self.open().await?,
        };

        match conn.pipeline(commands).await {
            Ok(replies) => {
                *guard = Some(conn);
                Ok(replies)
            }
            Err(e) => {
                warn!(server = %self.config.addr, error = %e, "Redis exchange failed, dropping connection");
                Err(e.into())
            }
        }
    }

    async fn execute_one(&self, command: RespValue) -> Result<RespValue, StoreError> {
        self.execute(vec![command])
            .await?
            .pop()
            .ok_or_else(|| StoreError::Server("missing reply".into()))
    }
}

fn expect_ok(reply: &RespValue, command: &str) -> Result<(), StoreError> {
    if reply.is_status("OK") {
        Ok(())
    } else {
        Err(StoreError::Server(format!("{} failed: {}", command, reply)))
    }
}

/// Redis refuses expiries whose absolute time overflows its signed 64-bit
/// millisecond clock. Lifetimes past this are written without one.
const MAX_PX_MILLIS: u128 = (i64::MAX / 2) as u128;

fn set_command(key: String, value: Vec<u8>, lifetime: Option<Duration>) -> RespValue {
    let mut args: Vec<bytes::Bytes> = vec!["SET".into(), key.into(), value.into()];
    let px = lifetime
        .map(|lifetime| lifetime.as_millis().max(1))
        .filter(|&ms| ms <= MAX_PX_MILLIS);
    if let Some(ms) = px {
        args.push("PX".into());
        args.push(ms.to_string().into());
    }
    RespValue::command(args)
}

#[async_trait]
impl PasteStore for RedisStore {
    async fn get(&self, id: &str) -> Result<Option<PasteRecord>, StoreError> {
        match self.execute_one(RespValue::command(["GET".to_string(), paste_key(id)])).await? {
            RespValue::Null => Ok(None),
            RespValue::BulkString(raw) => Ok(Some(PasteRecord::from_json(&raw)?)),
            other => Err(StoreError::Server(format!("GET returned {}", other))),
        }
    }

    async fn put(&self, id: &str, record: &PasteRecord) -> Result<(), StoreError> {
        let lifetime = store_lifetime(record, self.eviction_grace);

        let mut commands = vec![
            RespValue::command(["MULTI"]),
            set_command(paste_key(id), record.to_json()?, lifetime),
        ];
        if record.max_views.is_some() {
            commands.push(set_command(views_key(id), b"0".to_vec(), lifetime));
        }
        commands.push(RespValue::command(["EXEC"]));

        let mut replies = self.execute(commands).await?;
        if let Some(err) = replies.iter().find(|reply| reply.is_error()) {
            return Err(StoreError::Server(err.to_string()));
        }

        let results = replies
            .pop()
            .and_then(RespValue::into_array)
            .ok_or_else(|| StoreError::Server("transaction aborted".into()))?;
        for result in &results {
            expect_ok(result, "SET")?;
        }
        Ok(())
    }

    async fn increment_view_count(&self, id: &str) -> Result<i64, StoreError> {
        let reply = self
            .execute_one(RespValue::command(["INCR".to_string(), views_key(id)]))
            .await?;
        match reply {
            RespValue::Integer(n) => Ok(n),
            other => Err(StoreError::Counter(other.to_string())),
        }
    }

    async fn get_view_count(&self, id: &str) -> Result<i64, StoreError> {
        let reply = self
            .execute_one(RespValue::command(["GET".to_string(), views_key(id)]))
            .await?;
        if reply.is_null() {
            return Ok(0);
        }
        reply
            .as_integer()
            .ok_or_else(|| StoreError::Counter(reply.to_string()))
    }

    async fn health_check(&self) -> bool {
        match self.execute_one(RespValue::command(["PING"])).await {
            Ok(reply) => reply.is_status("PONG"),
            Err(e) => {
                warn!(error = %e, "Redis health check failed");
                false
            }
        }
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::RespParser;
    use bytes::{Bytes, BytesMut};
    use std::collections::HashMap;
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    /// Just enough of a Redis server to exercise the client: GET, SET (PX
    /// ignored), INCR, PING, AUTH, SELECT and MULTI/EXEC queueing.
    async fn fake_redis(password: Option<&'static str>) -> (SocketAddr, Arc<AtomicUsize>) {
        fake_redis_with_delay(password, Duration::ZERO).await
    }

    /// Like [`fake_redis`], but every reply is held back for `delay`.
    async fn fake_redis_with_delay(
        password: Option<&'static str>,
        delay: Duration,
    ) -> (SocketAddr, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let connections = Arc::new(AtomicUsize::new(0));
        let data = Arc::new(std::sync::Mutex::new(HashMap::<Bytes, Bytes>::new()));

        let counter = Arc::clone(&connections);
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(serve(socket, Arc::clone(&data), password, delay));
            }
        });

        (addr, connections)
    }

    async fn serve(
        mut socket: TcpStream,
        data: Arc<std::sync::Mutex<HashMap<Bytes, Bytes>>>,
        password: Option<&'static str>,
        delay: Duration,
    ) {
        let mut buf = BytesMut::new();
        let mut parser = RespParser::new();
        let mut queued: Option<Vec<Vec<Bytes>>> = None;
        let mut authed = password.is_none();

        loop {
            while let Ok(Some((value, consumed))) = parser.parse(&buf) {
                let _ = buf.split_to(consumed);
                let args: Vec<Bytes> = value
                    .into_array()
                    .unwrap()
                    .into_iter()
                    .map(|v| Bytes::copy_from_slice(v.as_bytes().unwrap()))
                    .collect();
                let name = String::from_utf8_lossy(&args[0]).to_uppercase();

                let reply = if name == "AUTH" {
                    authed = password.is_some_and(|p| args[1] == p.as_bytes());
                    if authed {
                        RespValue::SimpleString("OK".into())
                    } else {
                        RespValue::Error("WRONGPASS invalid password".into())
                    }
                } else if !authed {
                    RespValue::Error("NOAUTH Authentication required.".into())
                } else if name == "MULTI" {
                    queued = Some(Vec::new());
                    RespValue::SimpleString("OK".into())
                } else if name == "EXEC" {
                    let commands = queued.take().unwrap_or_default();
                    RespValue::Array(commands.iter().map(|c| apply(&data, c)).collect())
                } else if let Some(queue) = queued.as_mut() {
                    queue.push(args);
                    RespValue::SimpleString("QUEUED".into())
                } else {
                    apply(&data, &args)
                };

                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                if socket.write_all(&reply.serialize()).await.is_err() {
                    return;
                }
            }

            if socket.read_buf(&mut buf).await.unwrap_or(0) == 0 {
                return;
            }
        }
    }

    fn apply(data: &std::sync::Mutex<HashMap<Bytes, Bytes>>, args: &[Bytes]) -> RespValue {
        let mut data = data.lock().unwrap();
        match String::from_utf8_lossy(&args[0]).to_uppercase().as_str() {
            "PING" => RespValue::SimpleString("PONG".into()),
            "SELECT" => RespValue::SimpleString("OK".into()),
            "GET" => data
                .get(&args[1])
                .cloned()
                .map(RespValue::BulkString)
                .unwrap_or(RespValue::Null),
            "SET" => {
                data.insert(args[1].clone(), args[2].clone());
                RespValue::SimpleString("OK".into())
            }
            "INCR" => {
                let current: i64 = data
                    .get(&args[1])
                    .map(|v| std::str::from_utf8(v).unwrap().parse().unwrap())
                    .unwrap_or(0);
                data.insert(args[1].clone(), Bytes::from((current + 1).to_string()));
                RespValue::Integer(current + 1)
            }
            other => RespValue::Error(format!("ERR unknown command '{}'", other)),
        }
    }

    fn store_for(addr: SocketAddr, password: Option<&str>, db: u32) -> RedisStore {
        RedisStore::new(
            RedisConfig {
                addr: addr.to_string(),
                password: password.map(str::to_string),
                db,
            },
            Some(Duration::from_secs(60)),
        )
    }

    #[tokio::test]
    async fn test_put_get_roundtrip() {
        let (addr, _) = fake_redis(None).await;
        let store = store_for(addr, None, 0);
        let record = PasteRecord::new("hello redis".into(), 42, Some(10), Some(2));

        store.put("abc", &record).await.unwrap();

        assert_eq!(store.get("abc").await.unwrap(), Some(record));
        assert_eq!(store.get("nope").await.unwrap(), None);
        assert_eq!(store.get_view_count("abc").await.unwrap(), 0);
        assert_eq!(store.get_view_count("nope").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_increment_and_read_counter() {
        let (addr, _) = fake_redis(None).await;
        let store = store_for(addr, None, 3);

        store
            .put("p", &PasteRecord::new("x".into(), 0, None, Some(5)))
            .await
            .unwrap();
        assert_eq!(store.increment_view_count("p").await.unwrap(), 1);
        assert_eq!(store.increment_view_count("p").await.unwrap(), 2);
        assert_eq!(store.get_view_count("p").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_connection_is_reused() {
        let (addr, connections) = fake_redis(None).await;
        let store = store_for(addr, None, 0);

        assert!(store.health_check().await);
        assert!(store.health_check().await);
        store.get("a").await.unwrap();

        assert_eq!(connections.load(Ordering::SeqCst), 1);
        assert_eq!(store.backend(), "redis");
    }

    #[tokio::test]
    async fn test_auth() {
        let (addr, _) = fake_redis(Some("s3cret")).await;

        let good = store_for(addr, Some("s3cret"), 0);
        assert!(good.health_check().await);

        let bad = store_for(addr, Some("wrong"), 0);
        assert!(!bad.health_check().await);
        assert!(matches!(
            bad.put("a", &PasteRecord::new("x".into(), 0, None, None)).await,
            Err(StoreError::Server(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_server() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let store = store_for(addr, None, 0);
        assert!(!store.health_check().await);
        assert!(matches!(
            store.put("a", &PasteRecord::new("x".into(), 0, None, None)).await,
            Err(StoreError::Connection(_))
        ));
        assert!(store.get("a").await.is_err());
    }

    #[test]
    fn test_set_command_lifetime() {
        let cmd = set_command("k".into(), b"v".to_vec(), Some(Duration::from_secs(2)));
        assert_eq!(
            cmd,
            RespValue::command(["SET", "k", "v", "PX", "2000"])
        );

        let cmd = set_command("k".into(), b"v".to_vec(), None);
        assert_eq!(cmd, RespValue::command(["SET", "k", "v"]));

        let forever = Duration::from_secs(10_000_000_000_000_000_000);
        let cmd = set_command("k".into(), b"v".to_vec(), Some(forever));
        assert_eq!(cmd, RespValue::command(["SET", "k", "v"]));
    }

    #[tokio::test]
    async fn test_huge_ttl_is_stored_without_expiry() {
        let (addr, _) = fake_redis(None).await;
        let store = store_for(addr, None, 0);
        let record = PasteRecord::new("x".into(), 0, Some(10_000_000_000_000_000_000), Some(1));

        store.put("far", &record).await.unwrap();
        assert_eq!(store.get("far").await.unwrap(), Some(record));
    }

    #[tokio::test]
    async fn test_abandoned_read_does_not_leak_reply() {
        let (addr, connections) = fake_redis_with_delay(None, Duration::from_millis(100)).await;
        let store = store_for(addr, None, 0);

        store
            .put("secret", &PasteRecord::new("TOP SECRET".into(), 0, None, None))
            .await
            .unwrap();
        store
            .put("public", &PasteRecord::new("public text".into(), 0, None, None))
            .await
            .unwrap();

        let abandoned = tokio::time::timeout(Duration::from_millis(20), store.get("secret")).await;
        assert!(abandoned.is_err());
        tokio::time::sleep(Duration::from_millis(150)).await;

        let record = store.get("public").await.unwrap().unwrap();
        assert_eq!(record.content, "public text");
        assert_eq!(connections.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_abandoned_put_does_not_leave_transaction_open() {
        let (addr, _) = fake_redis_with_delay(None, Duration::from_millis(50)).await;
        let store = store_for(addr, None, 0);
        let record = PasteRecord::new("x".into(), 0, None, Some(1));

        let abandoned =
            tokio::time::timeout(Duration::from_millis(10), store.put("half", &record)).await;
        assert!(abandoned.is_err());

        assert_eq!(store.increment_view_count("other").await.unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_readers_with_one_abandoned() {
        use crate::paste::{CreatePaste, PasteService};
        use crate::store::StoreHandle;

        let (addr, _) = fake_redis_with_delay(None, Duration::from_millis(5)).await;
        let store: Arc<dyn PasteStore> = Arc::new(store_for(addr, None, 0));
        let service = PasteService::new(Arc::new(StoreHandle::from_store(store)));
        let input = CreatePaste {
            content: "race".into(),
            ttl_seconds: None,
            max_views: Some(3),
        };
        let id = service.create(input, 0).await.unwrap();

        // Gives up while its first round trips are in flight.
        let abandoned = tokio::time::timeout(Duration::from_millis(7), service.read(&id, 0)).await;
        assert!(abandoned.is_err());

        let handles: Vec<_> = (0..12)
            .map(|_| {
                let service = service.clone();
                let id = id.clone();
                tokio::spawn(async move { service.read(&id, 0).await.ok() })
            })
            .collect();

        let mut remaining = Vec::new();
        for handle in handles {
            if let Some(view) = handle.await.unwrap() {
                assert_eq!(view.content, "race");
                remaining.push(view.remaining_views.unwrap());
            }
        }
        remaining.sort_unstable();
        let admitted = remaining.len();
        remaining.dedup();

        assert_eq!(remaining.len(), admitted, "duplicate counts {:?}", remaining);
        assert!((2..=3).contains(&admitted), "admitted {:?}", remaining);
        assert!(remaining.iter().all(|&r| r < 3));
    }
}
