//! The Job Store & Queue Broker: a thin abstraction over a key/value +
//! sorted-set service, backed by Redis in production and by an in-memory
//! fake in tests.

pub mod fake;
pub mod redis_store;
pub mod store;

pub use fake::FakeStore;
pub use redis_store::RedisStore;
pub use store::BaseStore;
