use std::env;

use diesel::pg::PgConnection;
use diesel::r2d2::ConnectionManager;
use dotenv::dotenv;

use crate::db::pg::PgPool;

const MIN_SECRET_LEN: usize = 16;
/// Two weeks.
pub const DEFAULT_TOKEN_TTL_SECS: i64 = 14 * 24 * 60 * 60;
/// One year.
pub const MAX_TOKEN_TTL_SECS: i64 = 365 * 24 * 60 * 60;

error_chain! {
    foreign_links {
        Var(::std::env::VarError);
        R2D2(::r2d2::Error);
        ParseInt(::std::num::ParseIntError);
    }

    errors {
        WeakSecret(len: usize) {
            description("SECRET_KEY is too short")
            display("SECRET_KEY must be at least {} bytes, got {}", MIN_SECRET_LEN, len)
        }
        BadTtl(secs: i64) {
            description("TOKEN_TTL_SECS is out of range")
            display("TOKEN_TTL_SECS must be between 1 and {}, got {}", MAX_TOKEN_TTL_SECS, secs)
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Without it the service runs on the in-process store.
    pub database_url: Option<String>,
    pub secret_key: String,
    pub token_ttl_secs: i64,
}

impl Config {
    pub fn from_env() -> Result<Config> {
        dotenv().ok();
        Config::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Config>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").filter(|url| !url.is_empty());
        let secret_key = lookup("SECRET_KEY").ok_or(env::VarError::NotPresent)?;
        if secret_key.len() < MIN_SECRET_LEN {
            bail!(ErrorKind::WeakSecret(secret_key.len()));
        }
        let token_ttl_secs = match lookup("TOKEN_TTL_SECS") {
            Some(raw) => raw.trim().parse::<i64>()?,
            None => DEFAULT_TOKEN_TTL_SECS,
        };
        if token_ttl_secs <= 0 || token_ttl_secs > MAX_TOKEN_TTL_SECS {
            bail!(ErrorKind::BadTtl(token_ttl_secs));
        }
        Ok(Config {
            database_url,
            secret_key,
            token_ttl_secs,
        })
    }
}

pub fn init_pool(database_url: &str) -> Result<PgPool> {
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    Ok(PgPool::new(manager)?)
}
