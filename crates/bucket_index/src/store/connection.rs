use std::{
    fmt::Debug,
    future::Future,
    io,
    sync::{
        atomic::{AtomicU8, Ordering},
        Arc,
    },
    time::Duration,
};

use futures::{future::BoxFuture, FutureExt};
use vendor::{debug, prelude::lock::RwLock};

use crate::error::{IndexError, Result};

pub type Connector<S> =
    Box<dyn FnOnce() -> BoxFuture<'static, io::Result<S>> + Send + Sync + 'static>;

/// Lifecycle of a [Connection].
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    Unconnected = 0,
    Connecting = 1,
    Ready = 2,
    Closed = 3,
}

impl ConnState {
    #[inline]
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Unconnected,
            1 => Self::Connecting,
            2 => Self::Ready,
            _ => Self::Closed,
        }
    }
}

/// Store handle that is either injected ready-made or created lazily by a
/// connector invoked at most once.
///
/// The first caller of [get](Connection::get) moves the state from
/// `Unconnected` to `Connecting` and runs the connector, concurrent callers
/// wait until the state leaves `Connecting` (or `wait_timeout` passes). A
/// successful connect ends in `Ready`, a failed one in `Closed`: the
/// connector is gone either way and is never invoked again.
///
/// Waiting callers sleep on the tokio timer, so the runtime driving a
/// lazy connection must be built with time enabled (`enable_time` or
/// `enable_all`). Injected stores never wait.
/// ## Example
/// ```rust
/// use bucket_index::store::{connection::Connection, memory::MemoryBackend};
///
/// let conn = Connection::lazy(|| async { Ok::<_, std::io::Error>(MemoryBackend::standalone()) });
/// assert_eq!(conn.state(), bucket_index::store::connection::ConnState::Unconnected);
/// ```
pub struct Connection<S> {
    state: AtomicU8,
    conn: RwLock<Option<Arc<S>>>,
    connector: RwLock<Option<Connector<S>>>,
    wait_timeout: Duration,
}

impl<S> Debug for Connection<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("state", &ConnState::from_u8(self.state.load(Ordering::Acquire)))
            .field("wait_timeout", &self.wait_timeout)
            .finish()
    }
}

impl<S: Send + Sync + 'static> Connection<S> {
    /// Wrap an already connected store.
    pub fn ready(store: Arc<S>) -> Self {
        Self {
            state: AtomicU8::new(ConnState::Ready as u8),
            conn: RwLock::new(Some(store)),
            connector: RwLock::new(None),
            wait_timeout: Duration::from_secs(10),
        }
    }

    pub fn lazy<F, Fut>(connector: F) -> Self
    where
        F: FnOnce() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = io::Result<S>> + Send + 'static,
    {
        let connector: Connector<S> = Box::new(move || connector().boxed());
        Self {
            state: AtomicU8::new(ConnState::Unconnected as u8),
            conn: RwLock::new(None),
            connector: RwLock::new(Some(connector)),
            wait_timeout: Duration::from_secs(10),
        }
    }

    /// How long callers wait for a concurrent connect to finish.
    pub fn wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = timeout;
        self
    }

    #[inline]
    pub fn state(&self) -> ConnState {
        ConnState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// The connected store, connecting first if nobody did yet.
    pub async fn get(&self) -> Result<Arc<S>> {
        let acquired = self
            .state
            .compare_exchange(
                ConnState::Unconnected as u8,
                ConnState::Connecting as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok();
        if acquired {
            return self.do_connect().await;
        }
        self.wait_ready().await
    }

    /// Drop the store, later `get` calls fail with `Closed`.
    pub fn close(&self) {
        self.state.store(ConnState::Closed as u8, Ordering::Release);
        self.conn.write().take();
        self.connector.write().take();
        debug!("connection closed");
    }

    async fn do_connect(&self) -> Result<Arc<S>> {
        let connector = self.connector.write().take();
        let Some(connector) = connector else {
            self.state.store(ConnState::Closed as u8, Ordering::Release);
            return Err(IndexError::Closed);
        };
        debug!("connecting store");
        match connector().await {
            Ok(store) => {
                let store = Arc::new(store);
                *self.conn.write() = Some(store.clone());
                // lost against a concurrent `close`
                if self
                    .state
                    .compare_exchange(
                        ConnState::Connecting as u8,
                        ConnState::Ready as u8,
                        Ordering::AcqRel,
                        Ordering::Acquire,
                    )
                    .is_err()
                {
                    self.conn.write().take();
                    return Err(IndexError::Closed);
                }
                debug!("store connected");
                Ok(store)
            }
            Err(e) => {
                self.state.store(ConnState::Closed as u8, Ordering::Release);
                debug!("failed to connect store"; "error" => %e);
                Err(IndexError::BackendUnavailable(e))
            }
        }
    }

    fn current(&self) -> Option<Result<Arc<S>>> {
        match self.state() {
            ConnState::Ready => Some(self.conn.read().clone().ok_or(IndexError::Closed)),
            ConnState::Closed => Some(Err(IndexError::Closed)),
            _ => None,
        }
    }

    /// Poll the state in tenths of `wait_timeout`, yielding to the runtime
    /// in between.
    async fn wait_ready(&self) -> Result<Arc<S>> {
        let step = self.wait_timeout / 10;
        for _ in 0..10 {
            if let Some(resolved) = self.current() {
                return resolved;
            }
            tokio::time::sleep(step).await;
        }
        self.current().unwrap_or_else(|| {
            Err(IndexError::BackendUnavailable(io::Error::new(
                io::ErrorKind::WouldBlock,
                "store is still connecting, retry later",
            )))
        })
    }
}

#[cfg(all(test, feature = "memory"))]
mod tests {
    use std::{
        io,
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        },
        time::Duration,
    };

    use tokio::runtime::Builder;

    use super::{ConnState, Connection};
    use crate::{error::IndexError, store::memory::MemoryBackend};

    #[test]
    fn connector_runs_once() {
        let rt = Builder::new_current_thread().enable_all().build().unwrap();
        rt.block_on(async {
            let invoked = Arc::new(AtomicUsize::new(0));
            let counter = invoked.clone();
            let conn = Connection::lazy(move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                Ok::<_, io::Error>(MemoryBackend::standalone())
            })
            .wait_timeout(Duration::from_secs(1));
            assert_eq!(conn.state(), ConnState::Unconnected);
            assert!(format!("{conn:?}").contains("Unconnected"));

            let stores = futures::future::join_all((0..5).map(|_| conn.get())).await;
            let first = stores[0].as_ref().unwrap();
            for store in &stores {
                assert!(Arc::ptr_eq(first, store.as_ref().unwrap()));
            }
            assert_eq!(invoked.load(Ordering::SeqCst), 1);
            assert_eq!(conn.state(), ConnState::Ready);

            conn.close();
            assert_eq!(conn.state(), ConnState::Closed);
            assert!(matches!(conn.get().await, Err(IndexError::Closed)));
        });
    }

    #[test]
    fn failed_connect_closes() {
        let rt = Builder::new_current_thread().enable_all().build().unwrap();
        rt.block_on(async {
            let conn: Connection<MemoryBackend> = Connection::lazy(|| async {
                Err::<MemoryBackend, _>(io::Error::new(io::ErrorKind::ConnectionRefused, "refused"))
            });
            assert!(matches!(conn.get().await, Err(IndexError::BackendUnavailable(_))));
            assert_eq!(conn.state(), ConnState::Closed);
            assert!(matches!(conn.get().await, Err(IndexError::Closed)));
        });
    }

    #[test]
    fn injected_store_is_ready() {
        let rt = Builder::new_current_thread().enable_all().build().unwrap();
        rt.block_on(async {
            let store = Arc::new(MemoryBackend::standalone());
            let conn = Connection::ready(store.clone());
            assert_eq!(conn.state(), ConnState::Ready);
            assert!(Arc::ptr_eq(&conn.get().await.unwrap(), &store));
        });
    }
}
