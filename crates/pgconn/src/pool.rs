//! Connection pool utilities

use crate::config::{ConnOptions, DbConfig};
use crate::conn::DbConn;
use crate::error::{ConnError, ConnResult};
use deadpool_postgres::{Manager, ManagerConfig, Pool, PoolBuilder, RecyclingMethod};
use tokio_postgres::NoTls;
use tokio_postgres::Socket;
use tokio_postgres::tls::{MakeTlsConnect, TlsConnect};

/// Create a `NoTls` connection pool sized by `config.options.pool_max_size`.
///
/// ```ignore
/// let pool = pgconn::create_pool(&DbConfig::from_env()?)?;
/// let conn = DbConn::from_pool(&pool, &ConnOptions::default()).await?;
/// ```
pub fn create_pool(config: &DbConfig) -> ConnResult<Pool> {
    create_pool_with_tls(config, NoTls)
}

/// Create a connection pool using a custom TLS connector.
pub fn create_pool_with_tls<T>(config: &DbConfig, tls: T) -> ConnResult<Pool>
where
    T: MakeTlsConnect<Socket> + Clone + Sync + Send + 'static,
    T::Stream: Sync + Send,
    T::TlsConnect: Sync + Send,
    <T::TlsConnect as TlsConnect<Socket>>::Future: Send,
{
    let max_size = config.options.pool_max_size;
    create_pool_with_manager_config(config, tls, default_manager_config(), |b| {
        b.max_size(max_size)
    })
}

/// Create a connection pool with injected `ManagerConfig` and `PoolBuilder` tuning.
pub fn create_pool_with_manager_config<T>(
    config: &DbConfig,
    tls: T,
    manager_config: ManagerConfig,
    configure_pool: impl FnOnce(PoolBuilder) -> PoolBuilder,
) -> ConnResult<Pool>
where
    T: MakeTlsConnect<Socket> + Clone + Sync + Send + 'static,
    T::Stream: Sync + Send,
    T::TlsConnect: Sync + Send,
    <T::TlsConnect as TlsConnect<Socket>>::Future: Send,
{
    if config.options.pool_max_size == 0 {
        return Err(ConnError::config("pool_max_size must be at least 1"));
    }
    let pg_config = config.to_pg_config()?;
    let mgr = Manager::from_config(pg_config, tls, manager_config);
    configure_pool(Pool::builder(mgr))
        .build()
        .map_err(|e| ConnError::Pool(e.to_string()))
}

fn default_manager_config() -> ManagerConfig {
    ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    }
}

impl DbConn<deadpool_postgres::Client> {
    /// Check a client out of `pool` and wrap it.
    ///
    /// The client returns to the pool when the `DbConn` is dropped. Keyed
    /// statements live as long as this `DbConn`; the pooled connection's own
    /// prepared statements are reused through deadpool's cache.
    pub async fn from_pool(pool: &Pool, options: &ConnOptions) -> ConnResult<Self> {
        let client = pool.get().await?;
        Ok(Self::with_options(client, options))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_builds_without_connecting() {
        let cfg = DbConfig::new("postgres://localhost/app")
            .options(ConnOptions::new().pool_max_size(4));
        let pool = create_pool(&cfg).unwrap();
        assert_eq!(pool.status().max_size, 4);
    }

    #[test]
    fn zero_sized_pool_is_config_error() {
        let cfg = DbConfig::new("postgres://localhost/app")
            .options(ConnOptions::new().pool_max_size(0));
        assert!(matches!(create_pool(&cfg), Err(ConnError::Config(_))));
    }

    #[test]
    fn bad_dsn_is_config_error() {
        assert!(matches!(
            create_pool(&DbConfig::new("postgres://host:xx/db")),
            Err(ConnError::Config(_))
        ));
    }
}
