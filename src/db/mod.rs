pub mod cache;
pub mod memory;
pub mod postgres;
pub mod redis;
pub mod store;

pub use cache::{Cache, CacheBackend, CacheKey, CachePrefix};
pub use memory::MemoryCache;
pub use postgres::{create_pool, PgContentStore};
pub use redis::{create_redis_client, RedisCache};
pub use store::{ContentStore, PoolStats};
