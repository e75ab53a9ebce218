//! Profile cache adapters.
//!
//! [`RedisProfileCache`] stores JSON-encoded profiles under namespaced keys
//! with a jittered TTL so entries written together do not expire together.
//! Fills are fenced by a per-user generation key.

mod redis_profile_cache;

pub use redis_profile_cache::{
    CacheTtl, RedisProfileCache, profile_cache_key, profile_generation_key,
};
