//! Redis-backed `ProfileCache` using a `bb8` connection pool.
//!
//! Each user has an entry key and a generation key. Invalidation bumps the
//! generation and deletes the entry in one `MULTI` block; fills run as a Lua
//! script that compares the generation before writing, so the check and the
//! write cannot interleave with an invalidation.
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use bb8_redis::RedisConnectionManager;
use bb8_redis::bb8::Pool;
use bb8_redis::redis;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::domain::ports::{CacheGeneration, CacheLookup, ProfileCache, ProfileCacheError};
use crate::domain::{Profile, UserId};

const KEY_PREFIX: &str = "profile:v1:";
const GENERATION_PREFIX: &str = "profile:v1:gen:";
/// Generation keys outlive any entry and any in-flight request.
const GENERATION_TTL_SECS: u64 = 86_400;

const FILL_SCRIPT: &str = r"
local current = redis.call('GET', KEYS[1])
if current == false then current = '0' end
if current ~= ARGV[1] then return 0 end
redis.call('SET', KEYS[2], ARGV[2], 'EX', ARGV[3])
return 1
";

/// Build the cache key for a user.
///
/// # Examples
/// ```
/// use profile_service::domain::UserId;
/// use profile_service::outbound::cache::profile_cache_key;
///
/// let user = UserId::new("11111111-1111-1111-1111-111111111111").expect("valid id");
/// assert_eq!(
///     profile_cache_key(&user),
///     "profile:v1:11111111-1111-1111-1111-111111111111"
/// );
/// ```
pub fn profile_cache_key(user_id: &UserId) -> String {
    format!("{KEY_PREFIX}{user_id}")
}

/// Build the generation key guarding a user's entry.
pub fn profile_generation_key(user_id: &UserId) -> String {
    format!("{GENERATION_PREFIX}{user_id}")
}

/// Base TTL plus up to ten percent of random extension.
#[derive(Debug)]
pub struct CacheTtl {
    base: Duration,
    rng: Mutex<SmallRng>,
}

impl CacheTtl {
    /// TTL policy with the given base duration.
    pub fn new(base: Duration) -> Self {
        Self {
            base,
            rng: Mutex::new(SmallRng::from_entropy()),
        }
    }

    /// Draw the TTL for one write, in whole seconds and never below one.
    pub fn next_secs(&self) -> u64 {
        let base = self.base.as_secs().max(1);
        let spread = base / 10;
        if spread == 0 {
            return base;
        }
        let jitter = match self.rng.lock() {
            Ok(mut rng) => rng.gen_range(0..=spread),
            Err(poisoned) => poisoned.into_inner().gen_range(0..=spread),
        };
        base + jitter
    }
}

/// [`ProfileCache`] backed by Redis.
pub struct RedisProfileCache {
    pool: Pool<RedisConnectionManager>,
    ttl: CacheTtl,
}

impl RedisProfileCache {
    /// Connect a pool to `redis_url`.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileCacheError::Backend`] when the URL is invalid or the
    /// pool cannot be built.
    pub async fn connect(redis_url: &str, ttl: Duration) -> Result<Self, ProfileCacheError> {
        let manager = RedisConnectionManager::new(redis_url)
            .map_err(|err| ProfileCacheError::backend(err.to_string()))?;
        let pool = Pool::builder()
            .max_size(8)
            .connection_timeout(Duration::from_secs(2))
            .build(manager)
            .await
            .map_err(|err| ProfileCacheError::backend(err.to_string()))?;
        Ok(Self::new(pool, ttl))
    }

    /// Wrap an existing pool.
    pub fn new(pool: Pool<RedisConnectionManager>, ttl: Duration) -> Self {
        Self {
            pool,
            ttl: CacheTtl::new(ttl),
        }
    }
}

fn backend_error(err: impl std::fmt::Display) -> ProfileCacheError {
    ProfileCacheError::backend(err.to_string())
}

#[async_trait]
impl ProfileCache for RedisProfileCache {
    async fn get(&self, user_id: &UserId) -> Result<CacheLookup, ProfileCacheError> {
        let mut conn = self.pool.get().await.map_err(backend_error)?;
        let (raw, generation): (Option<String>, Option<u64>) = redis::cmd("MGET")
            .arg(profile_cache_key(user_id))
            .arg(profile_generation_key(user_id))
            .query_async(&mut *conn)
            .await
            .map_err(backend_error)?;
        match raw {
            Some(payload) => serde_json::from_str(&payload)
                .map(CacheLookup::Hit)
                .map_err(|err| ProfileCacheError::serialization(err.to_string())),
            None => Ok(CacheLookup::Miss(CacheGeneration::new(
                generation.unwrap_or_default(),
            ))),
        }
    }

    async fn fill(
        &self,
        profile: &Profile,
        observed: CacheGeneration,
    ) -> Result<bool, ProfileCacheError> {
        let payload = serde_json::to_string(profile)
            .map_err(|err| ProfileCacheError::serialization(err.to_string()))?;
        let mut conn = self.pool.get().await.map_err(backend_error)?;
        let written: i64 = redis::cmd("EVAL")
            .arg(FILL_SCRIPT)
            .arg(2)
            .arg(profile_generation_key(profile.user_id()))
            .arg(profile_cache_key(profile.user_id()))
            .arg(observed.get())
            .arg(payload)
            .arg(self.ttl.next_secs())
            .query_async(&mut *conn)
            .await
            .map_err(backend_error)?;
        Ok(written == 1)
    }

    async fn invalidate(&self, user_id: &UserId) -> Result<(), ProfileCacheError> {
        let mut conn = self.pool.get().await.map_err(backend_error)?;
        let generation_key = profile_generation_key(user_id);
        let () = redis::pipe()
            .atomic()
            .cmd("INCR")
            .arg(&generation_key)
            .ignore()
            .cmd("EXPIRE")
            .arg(&generation_key)
            .arg(GENERATION_TTL_SECS)
            .ignore()
            .cmd("DEL")
            .arg(profile_cache_key(user_id))
            .ignore()
            .query_async(&mut *conn)
            .await
            .map_err(backend_error)?;
        Ok(())
    }
}
