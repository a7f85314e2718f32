//! Connection pool management.
//!
//! The router owns one primary pool and zero or more replica pools. Pools
//! themselves come from a [`PoolFactory`], the seam to the SQL Server client
//! library; the router only decides when pools are created, closed and which
//! one serves a request.

use crate::config::{ConnectionCredentials, PoolConnectOptions, SqlServerOptions};
use crate::error::{DriverError, DriverResult, pool_creation_suggestion};
use futures_util::future::join_all;
use rand::Rng;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Callback receiving asynchronous errors raised by an established pool.
pub type PoolErrorHandler = Arc<dyn Fn(&DriverError) + Send + Sync>;

/// Handler used when none is configured: logs and carries on.
pub fn default_pool_error_handler() -> PoolErrorHandler {
    Arc::new(|error: &DriverError| {
        warn!(error = %error, "SQL Server pool error");
    })
}

/// Opaque handle to the physical connections of one endpoint.
pub trait ConnectionPool: Send + Sync + 'static {
    /// Close every connection of the pool.
    fn close(&self) -> impl Future<Output = DriverResult<()>> + Send;
}

/// Creates pools; implemented on top of the SQL Server client library.
pub trait PoolFactory: Send + Sync {
    type Pool: ConnectionPool;

    /// Open a pool for one endpoint. `on_error` must receive every asynchronous pool error.
    fn create_pool(
        &self,
        options: PoolConnectOptions,
        on_error: PoolErrorHandler,
    ) -> impl Future<Output = DriverResult<Self::Pool>> + Send;
}

/// Lifecycle state of a router.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouterState {
    Disconnected,
    Connecting,
    Connected,
}

/// Owns the primary and replica pools and routes writes and reads to them.
///
/// `connect` and `disconnect` take `&mut self`, so they are never concurrent on one router.
pub struct ReplicaPoolRouter<F: PoolFactory> {
    factory: F,
    options: SqlServerOptions,
    master: Option<Arc<F::Pool>>,
    slaves: Vec<Arc<F::Pool>>,
    database: Option<String>,
    state: RouterState,
}

impl<F: PoolFactory> ReplicaPoolRouter<F> {
    pub fn new(factory: F, options: SqlServerOptions) -> Self {
        Self {
            factory,
            options,
            master: None,
            slaves: Vec::new(),
            database: None,
            state: RouterState::Disconnected,
        }
    }

    pub fn state(&self) -> RouterState {
        self.state
    }

    /// Database of the primary endpoint, recorded on connect.
    pub fn database(&self) -> Option<&str> {
        self.database.as_deref()
    }

    pub fn replica_count(&self) -> usize {
        self.slaves.len()
    }

    pub fn options(&self) -> &SqlServerOptions {
        &self.options
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    /// Create the primary pool and, with replication configured, every replica pool.
    ///
    /// All creations run concurrently. If any fails, the pools that were created are
    /// closed again and the first failure is returned, primary first.
    pub async fn connect(&mut self) -> DriverResult<()> {
        if self.master.is_some() {
            return Err(DriverError::invalid_input(
                "Router is already connected. Call disconnect() first.",
            ));
        }

        self.state = RouterState::Connecting;
        let handler = self
            .options
            .pool_error_handler
            .clone()
            .unwrap_or_else(default_pool_error_handler);

        let (master, slaves) = match &self.options.replication {
            Some(replication) => {
                info!(
                    endpoint = %replication.master.endpoint(),
                    replicas = replication.slaves.len(),
                    "Connecting to SQL Server with replication"
                );
                let slave_futures = replication
                    .slaves
                    .iter()
                    .map(|slave| create_pool(&self.factory, &self.options, slave, handler.clone()));
                tokio::join!(
                    create_pool(&self.factory, &self.options, &replication.master, handler.clone()),
                    join_all(slave_futures)
                )
            }
            None => {
                info!(
                    endpoint = %self.options.credentials.endpoint(),
                    "Connecting to SQL Server"
                );
                let master =
                    create_pool(&self.factory, &self.options, &self.options.credentials, handler)
                        .await;
                (master, Vec::new())
            }
        };

        let mut created = Vec::new();
        let mut first_error = None;
        let master = match master {
            Ok(pool) => {
                let pool = Arc::new(pool);
                created.push(pool.clone());
                Some(pool)
            }
            Err(e) => {
                first_error = Some(e);
                None
            }
        };
        let mut replicas = Vec::with_capacity(slaves.len());
        for result in slaves {
            match result {
                Ok(pool) => {
                    let pool = Arc::new(pool);
                    created.push(pool.clone());
                    replicas.push(pool);
                }
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }

        if let Some(error) = first_error {
            warn!(
                error = %error,
                created = created.len(),
                "Pool creation failed, closing pools created so far"
            );
            for result in join_all(created.iter().map(|pool| pool.close())).await {
                if let Err(e) = result {
                    warn!(error = %e, "Failed to close partially created pool");
                }
            }
            self.state = RouterState::Disconnected;
            return Err(error);
        }

        self.master = master;
        self.slaves = replicas;
        self.database = self.options.primary_credentials().database.clone();
        self.state = RouterState::Connected;

        info!(
            database = ?self.database,
            replicas = self.slaves.len(),
            "Connected successfully"
        );
        Ok(())
    }

    /// Pool serving writes.
    pub async fn obtain_master_connection(&self) -> DriverResult<Arc<F::Pool>> {
        self.master
            .clone()
            .ok_or(DriverError::ConnectionNotEstablished)
    }

    /// Pool serving reads: a random replica, or the primary when there are none.
    ///
    /// Every call picks independently, there is no session affinity.
    pub async fn obtain_slave_connection(&self) -> DriverResult<Arc<F::Pool>> {
        match self.pick_slave() {
            Some(pool) => Ok(pool),
            None => self.obtain_master_connection().await,
        }
    }

    fn pick_slave(&self) -> Option<Arc<F::Pool>> {
        if self.slaves.is_empty() {
            return None;
        }
        let index = rand::thread_rng().gen_range(0..self.slaves.len());
        debug!(replica = index, "Selected replica pool");
        self.slaves.get(index).cloned()
    }

    /// Close the primary, then all replicas concurrently, and forget them.
    ///
    /// State is cleared even when a close fails; the first close error is returned.
    pub async fn disconnect(&mut self) -> DriverResult<()> {
        let Some(master) = self.master.take() else {
            return Err(DriverError::ConnectionNotEstablished);
        };
        let slaves = std::mem::take(&mut self.slaves);
        self.database = None;
        self.state = RouterState::Disconnected;

        info!(replicas = slaves.len(), "Closing SQL Server pools");

        let master_result = master.close().await;
        let slave_results = join_all(slaves.iter().map(|pool| pool.close())).await;

        master_result?;
        for result in slave_results {
            result?;
        }

        info!("All pools closed");
        Ok(())
    }
}

impl<F: PoolFactory> std::fmt::Debug for ReplicaPoolRouter<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplicaPoolRouter")
            .field("state", &self.state)
            .field("database", &self.database)
            .field("has_master", &self.master.is_some())
            .field("replicas", &self.slaves.len())
            .finish()
    }
}

/// Create one pool, turning client failures into `PoolCreation` errors.
async fn create_pool<F: PoolFactory>(
    factory: &F,
    options: &SqlServerOptions,
    credentials: &ConnectionCredentials,
    handler: PoolErrorHandler,
) -> DriverResult<F::Pool> {
    let endpoint = credentials.endpoint();
    debug!(endpoint = %endpoint, "Creating SQL Server pool");

    factory
        .create_pool(options.connect_options(credentials), handler)
        .await
        .map_err(|e| match e {
            DriverError::PoolCreation { .. } => e,
            other => {
                let message = other.to_string();
                let suggestion = pool_creation_suggestion(&message);
                DriverError::pool_creation(endpoint, message, suggestion)
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct NoopPool;

    impl ConnectionPool for NoopPool {
        async fn close(&self) -> DriverResult<()> {
            Ok(())
        }
    }

    struct NoopFactory {
        fail: bool,
    }

    impl PoolFactory for NoopFactory {
        type Pool = NoopPool;

        async fn create_pool(
            &self,
            _options: PoolConnectOptions,
            _on_error: PoolErrorHandler,
        ) -> DriverResult<NoopPool> {
            if self.fail {
                Err(DriverError::internal("Login failed for user 'sa'"))
            } else {
                Ok(NoopPool)
            }
        }
    }

    fn options() -> SqlServerOptions {
        SqlServerOptions::new(ConnectionCredentials::new("localhost").with_database("app"))
    }

    #[tokio::test]
    async fn test_router_lifecycle() {
        let mut router = ReplicaPoolRouter::new(NoopFactory { fail: false }, options());
        assert_eq!(router.state(), RouterState::Disconnected);

        router.connect().await.unwrap();
        assert_eq!(router.state(), RouterState::Connected);
        assert_eq!(router.database(), Some("app"));
        assert!(router.obtain_master_connection().await.is_ok());

        router.disconnect().await.unwrap();
        assert_eq!(router.state(), RouterState::Disconnected);
        assert!(router.database().is_none());
    }

    #[tokio::test]
    async fn test_connect_twice_rejected() {
        let mut router = ReplicaPoolRouter::new(NoopFactory { fail: false }, options());
        router.connect().await.unwrap();
        assert!(router.connect().await.is_err());
        assert_eq!(router.state(), RouterState::Connected);
    }

    #[tokio::test]
    async fn test_factory_errors_become_pool_creation() {
        let mut router = ReplicaPoolRouter::new(NoopFactory { fail: true }, options());
        let err = router.connect().await.unwrap_err();

        match &err {
            DriverError::PoolCreation { endpoint, .. } => assert_eq!(endpoint, "localhost:1433"),
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(err.suggestion().unwrap().contains("password"));
        assert_eq!(router.state(), RouterState::Disconnected);
    }

    #[test]
    fn test_disconnect_without_pools_fails() {
        let mut router = ReplicaPoolRouter::new(NoopFactory { fail: false }, options());
        let err = tokio_test::block_on(router.disconnect()).unwrap_err();
        assert!(matches!(err, DriverError::ConnectionNotEstablished));
        assert!(tokio_test::block_on(router.obtain_slave_connection()).is_err());
    }

    #[test]
    fn test_default_handler_does_not_panic() {
        let seen = Arc::new(Mutex::new(0));
        let counter = seen.clone();
        let custom: PoolErrorHandler = Arc::new(move |_: &DriverError| *counter.lock().unwrap() += 1);

        default_pool_error_handler()(&DriverError::pool_runtime("socket hang up"));
        custom(&DriverError::pool_runtime("socket hang up"));
        assert_eq!(*seen.lock().unwrap(), 1);
    }
}
