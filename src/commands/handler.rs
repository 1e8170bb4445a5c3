//! Command Handler
//!
//! Turns a parsed RESP request into a call on the [`Keyspace`] and the result
//! back into a RESP reply.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       CommandHandler                         │
//! │                                                              │
//! │  ┌────────────┐    ┌────────────┐    ┌─────────────────┐     │
//! │  │ arguments()│───>│   arity    │───>│  cmd_xxx(args)  │     │
//! │  │  + upcase  │    │   check    │    │  -> KvResult    │     │
//! │  └────────────┘    └────────────┘    └────────┬────────┘     │
//! │                                               │              │
//! │                                               ▼              │
//! │                                     Keyspace (locks + store) │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Arity follows the usual convention and counts the command name: `N`
//! means exactly N arguments, `-N` means at least N. Commands with optional
//! trailing arguments check their upper bound themselves.
//!
//! Every [`KvError`] becomes an error reply carrying its message. Mutations
//! with no natural result reply `+OK`.

use super::settings::ServerSettings;
use crate::config::Config;
use crate::error::{KvError, KvResult};
use crate::keyspace::{ExpireCondition, InsertPosition, Keyspace, ListEnd};
use crate::protocol::RespValue;
use bytes::Bytes;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Static description of one command.
#[derive(Debug, Clone, Copy)]
pub struct CommandDef {
    pub name: &'static str,
    pub arity: i32,
    pub summary: &'static str,
}

impl CommandDef {
    /// Checks an argument count, command name included.
    pub fn accepts(&self, argc: usize) -> bool {
        let argc = argc as i64;
        let arity = i64::from(self.arity);
        if arity >= 0 {
            argc == arity
        } else {
            argc >= -arity
        }
    }

    /// One line of `HELP` output.
    pub fn usage(&self) -> String {
        format!("{} - {}", self.name, self.summary)
    }
}

const fn def(name: &'static str, arity: i32, summary: &'static str) -> CommandDef {
    CommandDef {
        name,
        arity,
        summary,
    }
}

/// Every command the server understands.
pub const COMMANDS: &[CommandDef] = &[
    // Connection and server
    def("PING", -1, "PING [message]"),
    def("ECHO", 2, "ECHO message"),
    def("QUIT", 1, "QUIT"),
    def("DBSIZE", 1, "DBSIZE"),
    def("FLUSHDB", -1, "FLUSHDB"),
    def("FLUSHALL", -1, "FLUSHALL"),
    def("INFO", -1, "INFO [section]"),
    def("COMMAND", -1, "COMMAND [COUNT | INFO name ...]"),
    def("HELP", -1, "HELP [command]"),
    def("CONFIG", -3, "CONFIG GET pattern | CONFIG SET parameter value"),
    // Generic
    def("COPY", 3, "COPY source destination"),
    def("DEL", -2, "DEL key [key ...]"),
    def("EXISTS", -2, "EXISTS key [key ...]"),
    def("EXPIRE", -3, "EXPIRE key seconds [NX | XX | GT | LT]"),
    def("EXPIREAT", -3, "EXPIREAT key unix-seconds [NX | XX | GT | LT]"),
    def("EXPIRETIME", 2, "EXPIRETIME key"),
    def("TTL", 2, "TTL key"),
    def("PERSIST", 2, "PERSIST key"),
    def("KEYS", 2, "KEYS regex"),
    def("TYPE", 2, "TYPE key"),
    // Strings
    def("GET", 2, "GET key"),
    def("SET", -3, "SET key value [EX seconds]"),
    def("SETEX", 4, "SETEX key seconds value"),
    def("APPEND", 3, "APPEND key value"),
    def("STRLEN", 2, "STRLEN key"),
    def("INCR", 2, "INCR key"),
    def("INCRBY", 3, "INCRBY key increment"),
    def("DECR", 2, "DECR key"),
    def("DECRBY", 3, "DECRBY key decrement"),
    def("INCRBYFLOAT", 3, "INCRBYFLOAT key increment"),
    def("GETDEL", 2, "GETDEL key"),
    def("GETEX", 3, "GETEX key seconds"),
    def("GETRANGE", 4, "GETRANGE key start end"),
    def("GETSET", 3, "GETSET key value"),
    def("LCS", -3, "LCS key1 key2 [LEN]"),
    def("MGET", -2, "MGET key [key ...]"),
    def("MSET", -3, "MSET key value [key value ...]"),
    def("SETRANGE", 4, "SETRANGE key offset value"),
    // Hashes
    def("HSET", -4, "HSET key field value [field value ...]"),
    def("HGET", 3, "HGET key field"),
    def("HEXISTS", 3, "HEXISTS key field"),
    def("HDEL", 3, "HDEL key field"),
    def("HGETALL", 2, "HGETALL key"),
    def("HLEN", 2, "HLEN key"),
    def("HEXPIRE", -3, "HEXPIRE key seconds [NX | XX | GT | LT]"),
    // Lists
    def("LPUSH", -3, "LPUSH key value [value ...]"),
    def("RPUSH", -3, "RPUSH key value [value ...]"),
    def("LPOP", -2, "LPOP key [count]"),
    def("RPOP", -2, "RPOP key [count]"),
    def("LLEN", 2, "LLEN key"),
    def("LINDEX", 3, "LINDEX key index"),
    def("LSET", 4, "LSET key index value"),
    def("LRANGE", 4, "LRANGE key start stop"),
    def("LTRIM", 4, "LTRIM key start stop"),
    def("LINSERT", 5, "LINSERT key BEFORE | AFTER pivot value"),
    def("LREM", 4, "LREM key count value"),
    def("LMOVE", 5, "LMOVE source destination LEFT | RIGHT LEFT | RIGHT"),
    // Sets
    def("SADD", -3, "SADD key member [member ...]"),
    def("SREM", -3, "SREM key member [member ...]"),
    def("SCARD", 2, "SCARD key"),
    def("SISMEMBER", 3, "SISMEMBER key member"),
    def("SMEMBERS", 2, "SMEMBERS key"),
    def("SDIFF", -2, "SDIFF key [key ...]"),
];

/// Looks up a command by its upper-case name.
pub fn lookup(name: &str) -> Option<&'static CommandDef> {
    COMMANDS.iter().find(|def| def.name == name)
}

/// True when `request` is a `QUIT`, in any letter case.
pub fn is_quit(request: &RespValue) -> bool {
    match request {
        RespValue::Array(items) => items
            .first()
            .and_then(RespValue::as_str)
            .is_some_and(|name| name.eq_ignore_ascii_case("QUIT")),
        _ => false,
    }
}

type Reply = KvResult<RespValue>;

/// Executes requests against a shared [`Keyspace`].
///
/// Cheap to clone; every connection gets its own copy.
#[derive(Debug, Clone)]
pub struct CommandHandler {
    keyspace: Arc<Keyspace>,
    settings: Arc<ServerSettings>,
    start_time: Instant,
    processed: Arc<AtomicU64>,
}

impl CommandHandler {
    /// Creates a handler whose `CONFIG` table holds the default flags and
    /// the keyspace's real capacity.
    pub fn new(keyspace: Arc<Keyspace>) -> Self {
        let config = Config {
            max_keys: keyspace.engine().max_keys(),
            ..Config::default()
        };
        Self::with_config(keyspace, &config)
    }

    /// Creates a handler reporting `config` through `CONFIG GET`.
    pub fn with_config(keyspace: Arc<Keyspace>, config: &Config) -> Self {
        Self {
            keyspace,
            settings: Arc::new(ServerSettings::from_config(config)),
            start_time: Instant::now(),
            processed: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn keyspace(&self) -> &Arc<Keyspace> {
        &self.keyspace
    }

    /// Number of requests executed by this handler and its clones.
    pub fn commands_processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    /// Executes one request and returns the reply to send.
    ///
    /// # Arguments
    ///
    /// * `request` - a parsed RESP array whose first element is the name
    pub fn execute(&self, request: RespValue) -> RespValue {
        self.processed.fetch_add(1, Ordering::Relaxed);

        let mut args = match arguments(request) {
            Ok(args) => args,
            Err(err) => return err.into(),
        };
        let Some(first) = args.first_mut() else {
            return RespValue::error("ERR empty command");
        };
        first.make_ascii_uppercase();

        let Some(def) = lookup(&args[0]) else {
            debug!(command = %args[0], "unknown command");
            return KvError::UnknownCommand(args[0].clone()).into();
        };
        if !def.accepts(args.len()) {
            return KvError::WrongArgumentCount.into();
        }

        self.dispatch(def.name, &args[1..])
            .unwrap_or_else(RespValue::from)
    }

    fn dispatch(&self, name: &str, args: &[String]) -> Reply {
        match name {
            "PING" => cmd_ping(args),
            "ECHO" => Ok(bulk(&args[0])),
            "QUIT" => Ok(RespValue::ok()),
            "DBSIZE" => Ok(RespValue::integer(self.keyspace.dbsize() as i64)),
            "FLUSHDB" | "FLUSHALL" => self.cmd_flush(),
            "INFO" => Ok(self.cmd_info()),
            "COMMAND" => cmd_command(args),
            "HELP" => cmd_help(args),
            "CONFIG" => self.cmd_config(args),

            "COPY" => self.cmd_copy(args),
            "DEL" => Ok(RespValue::integer(self.keyspace.delete(args))),
            "EXISTS" => Ok(RespValue::integer(self.keyspace.exists(args))),
            "EXPIRE" => self.cmd_expire(args),
            "EXPIREAT" => self.cmd_expireat(args),
            "EXPIRETIME" => self.cmd_expiretime(args),
            "TTL" => Ok(RespValue::integer(self.keyspace.ttl(&args[0]))),
            "PERSIST" => Ok(flag(self.keyspace.persist(&args[0]))),
            "KEYS" => self.cmd_keys(args),
            "TYPE" => Ok(RespValue::simple_string(self.keyspace.key_type(&args[0]))),

            "GET" => self.cmd_get(args),
            "SET" => self.cmd_set(args),
            "SETEX" => self.cmd_setex(args),
            "APPEND" => self.cmd_append(args),
            "STRLEN" => self.cmd_strlen(args),
            "INCR" => self.cmd_incr(args),
            "INCRBY" => self.cmd_incrby(args),
            "DECR" => self.cmd_decr(args),
            "DECRBY" => self.cmd_decrby(args),
            "INCRBYFLOAT" => self.cmd_incrbyfloat(args),
            "GETDEL" => self.cmd_getdel(args),
            "GETEX" => self.cmd_getex(args),
            "GETRANGE" => self.cmd_getrange(args),
            "GETSET" => self.cmd_getset(args),
            "LCS" => self.cmd_lcs(args),
            "MGET" => self.cmd_mget(args),
            "MSET" => self.cmd_mset(args),
            "SETRANGE" => self.cmd_setrange(args),

            "HSET" => self.cmd_hset(args),
            "HGET" => self.cmd_hget(args),
            "HEXISTS" => self.cmd_hexists(args),
            "HDEL" => self.cmd_hdel(args),
            "HGETALL" => self.cmd_hgetall(args),
            "HLEN" => self.cmd_hlen(args),
            "HEXPIRE" => self.cmd_hexpire(args),

            "LPUSH" => self.cmd_push(args, ListEnd::Left),
            "RPUSH" => self.cmd_push(args, ListEnd::Right),
            "LPOP" => self.cmd_pop(args, ListEnd::Left),
            "RPOP" => self.cmd_pop(args, ListEnd::Right),
            "LLEN" => self.cmd_llen(args),
            "LINDEX" => self.cmd_lindex(args),
            "LSET" => self.cmd_lset(args),
            "LRANGE" => self.cmd_lrange(args),
            "LTRIM" => self.cmd_ltrim(args),
            "LINSERT" => self.cmd_linsert(args),
            "LREM" => self.cmd_lrem(args),
            "LMOVE" => self.cmd_lmove(args),

            "SADD" => self.cmd_sadd(args),
            "SREM" => self.cmd_srem(args),
            "SCARD" => self.cmd_scard(args),
            "SISMEMBER" => self.cmd_sismember(args),
            "SMEMBERS" => self.cmd_smembers(args),
            "SDIFF" => self.cmd_sdiff(args),

            other => Err(KvError::UnknownCommand(other.to_string())),
        }
    }

    // ========================================================================
    // Server
    // ========================================================================

    /// CONFIG GET pattern | CONFIG SET parameter value
    fn cmd_config(&self, args: &[String]) -> Reply {
        match (args[0].to_ascii_uppercase().as_str(), &args[1..]) {
            ("GET", [pattern]) => {
                let pairs = self.settings.get(pattern)?;
                Ok(RespValue::from_strings(
                    pairs.into_iter().flat_map(|(name, value)| [name, value]),
                ))
            }
            ("SET", [name, value]) => {
                self.settings.set(name, value)?;
                Ok(RespValue::ok())
            }
            ("GET" | "SET", _) => Err(KvError::WrongArgumentCount),
            _ => Err(KvError::UnknownSubcommand(args[0].clone())),
        }
    }

    fn cmd_flush(&self) -> Reply {
        self.keyspace.flush();
        Ok(RespValue::ok())
    }

    fn cmd_info(&self) -> RespValue {
        let engine = self.keyspace.engine();
        let stats = engine.stats();

        let info = format!(
            "# Server\r\n\
             tidekv_version:{}\r\n\
             os:{}\r\n\
             uptime_in_seconds:{}\r\n\
             \r\n\
             # Stats\r\n\
             total_commands_processed:{}\r\n\
             keyspace_hits:{}\r\n\
             keyspace_misses:{}\r\n\
             expired_keys:{}\r\n\
             evicted_keys:{}\r\n\
             active_expiry:{}\r\n\
             \r\n\
             # Memory\r\n\
             used_memory:{}\r\n\
             maxkeys:{}\r\n\
             \r\n\
             # Keyspace\r\n\
             db0:keys={}\r\n",
            crate::VERSION,
            std::env::consts::OS,
            self.start_time.elapsed().as_secs(),
            self.commands_processed(),
            stats.hits,
            stats.misses,
            stats.expired,
            stats.evicted,
            u8::from(self.keyspace.sweeper().is_running()),
            engine.used_memory(),
            engine.max_keys(),
            stats.keys,
        );

        RespValue::bulk_string(Bytes::from(info))
    }

    // ========================================================================
    // Generic
    // ========================================================================

    fn cmd_copy(&self, args: &[String]) -> Reply {
        let copied = self.keyspace.copy(&args[0], &args[1])?;
        Ok(RespValue::integer(copied))
    }

    fn cmd_expire(&self, args: &[String]) -> Reply {
        let (seconds, condition) = expire_args(args)?;
        self.keyspace.expire(&args[0], seconds, condition)?;
        Ok(RespValue::ok())
    }

    fn cmd_expireat(&self, args: &[String]) -> Reply {
        let (at, condition) = expire_args(args)?;
        self.keyspace.expire_at(&args[0], at, condition)?;
        Ok(RespValue::ok())
    }

    fn cmd_expiretime(&self, args: &[String]) -> Reply {
        let at = self.keyspace.expire_time(&args[0])?;
        Ok(RespValue::integer(at))
    }

    fn cmd_keys(&self, args: &[String]) -> Reply {
        let keys = self.keyspace.keys(&args[0])?;
        Ok(RespValue::from_strings(keys))
    }

    // ========================================================================
    // Strings
    // ========================================================================

    fn cmd_get(&self, args: &[String]) -> Reply {
        self.keyspace.get(&args[0]).map(RespValue::from_string)
    }

    /// SET key value [EX seconds]
    fn cmd_set(&self, args: &[String]) -> Reply {
        match &args[2..] {
            [] => self.keyspace.set(&args[0], args[1].clone()),
            [option, seconds] if option.eq_ignore_ascii_case("EX") => {
                let seconds = parse_i64(seconds, KvError::InvalidExpireTime)?;
                if seconds <= 0 {
                    return Err(KvError::InvalidExpireTime);
                }
                self.keyspace.set_ex(&args[0], seconds, args[1].clone());
            }
            _ => return Err(KvError::Syntax),
        }
        Ok(RespValue::ok())
    }

    fn cmd_setex(&self, args: &[String]) -> Reply {
        let seconds = parse_i64(&args[1], KvError::InvalidTimeSeconds)?;
        self.keyspace.set_ex(&args[0], seconds, args[2].clone());
        Ok(RespValue::ok())
    }

    fn cmd_append(&self, args: &[String]) -> Reply {
        let len = self.keyspace.append(&args[0], &args[1])?;
        Ok(RespValue::integer(len as i64))
    }

    fn cmd_strlen(&self, args: &[String]) -> Reply {
        let len = self.keyspace.strlen(&args[0])?;
        Ok(RespValue::integer(len as i64))
    }

    fn cmd_incr(&self, args: &[String]) -> Reply {
        self.keyspace.incr(&args[0]).map(RespValue::integer)
    }

    fn cmd_incrby(&self, args: &[String]) -> Reply {
        let delta = parse_i64(&args[1], KvError::InvalidIncrement)?;
        self.keyspace.incr_by(&args[0], delta).map(RespValue::integer)
    }

    fn cmd_decr(&self, args: &[String]) -> Reply {
        self.keyspace.decr(&args[0]).map(RespValue::integer)
    }

    fn cmd_decrby(&self, args: &[String]) -> Reply {
        let delta = parse_i64(&args[1], KvError::InvalidDecrement)?;
        self.keyspace.decr_by(&args[0], delta).map(RespValue::integer)
    }

    fn cmd_incrbyfloat(&self, args: &[String]) -> Reply {
        let delta: f64 = args[1].trim().parse().map_err(|_| KvError::NotAFloat)?;
        let value = self.keyspace.incr_by_float(&args[0], delta)?;
        Ok(RespValue::from_string(value.to_string()))
    }

    fn cmd_getdel(&self, args: &[String]) -> Reply {
        null_if_missing(self.keyspace.get_del(&args[0]))
    }

    fn cmd_getex(&self, args: &[String]) -> Reply {
        let seconds = parse_i64(&args[1], KvError::InvalidExpireTime)?;
        null_if_missing(self.keyspace.get_ex(&args[0], seconds))
    }

    fn cmd_getrange(&self, args: &[String]) -> Reply {
        let start = parse_i64(&args[1], KvError::InvalidStartIndex)?;
        let end = parse_i64(&args[2], KvError::InvalidEndIndex)?;
        null_if_missing(self.keyspace.get_range(&args[0], start, end))
    }

    fn cmd_getset(&self, args: &[String]) -> Reply {
        self.keyspace
            .get_set(&args[0], args[1].clone())
            .map(RespValue::from_string)
    }

    /// LCS key1 key2 [LEN]
    fn cmd_lcs(&self, args: &[String]) -> Reply {
        match &args[2..] {
            [] => self
                .keyspace
                .lcs(&args[0], &args[1])
                .map(RespValue::from_string),
            [option] if option.eq_ignore_ascii_case("LEN") => {
                let len = self.keyspace.lcs_len(&args[0], &args[1])?;
                Ok(RespValue::integer(len as i64))
            }
            [_] => Err(KvError::Syntax),
            _ => Err(KvError::WrongArgumentCount),
        }
    }

    fn cmd_mget(&self, args: &[String]) -> Reply {
        let values = self
            .keyspace
            .mget(args)
            .into_iter()
            .map(RespValue::optional)
            .collect();
        Ok(RespValue::array(values))
    }

    fn cmd_mset(&self, args: &[String]) -> Reply {
        self.keyspace.mset(pairs(args)?);
        Ok(RespValue::ok())
    }

    fn cmd_setrange(&self, args: &[String]) -> Reply {
        let offset = parse_i64(&args[1], KvError::InvalidOffset)?;
        let len = self.keyspace.set_range(&args[0], offset, &args[2])?;
        Ok(RespValue::integer(len as i64))
    }

    // ========================================================================
    // Hashes
    // ========================================================================

    fn cmd_hset(&self, args: &[String]) -> Reply {
        let added = self.keyspace.hset(&args[0], pairs(&args[1..])?)?;
        Ok(RespValue::integer(added))
    }

    fn cmd_hget(&self, args: &[String]) -> Reply {
        self.keyspace
            .hget(&args[0], &args[1])
            .map(RespValue::from_string)
    }

    fn cmd_hexists(&self, args: &[String]) -> Reply {
        self.keyspace.hexists(&args[0], &args[1]).map(flag)
    }

    fn cmd_hdel(&self, args: &[String]) -> Reply {
        self.keyspace.hdel(&args[0], &args[1])?;
        Ok(RespValue::ok())
    }

    fn cmd_hgetall(&self, args: &[String]) -> Reply {
        let pairs = self.keyspace.hgetall(&args[0])?;
        Ok(RespValue::from_strings(
            pairs.into_iter().flat_map(|(field, value)| [field, value]),
        ))
    }

    fn cmd_hlen(&self, args: &[String]) -> Reply {
        let len = self.keyspace.hlen(&args[0])?;
        Ok(RespValue::integer(len as i64))
    }

    fn cmd_hexpire(&self, args: &[String]) -> Reply {
        let (seconds, condition) = expire_args(args)?;
        self.keyspace.hexpire(&args[0], seconds, condition)?;
        Ok(RespValue::ok())
    }

    // ========================================================================
    // Lists
    // ========================================================================

    fn cmd_push(&self, args: &[String], end: ListEnd) -> Reply {
        let values = args[1..].to_vec();
        let len = match end {
            ListEnd::Left => self.keyspace.lpush(&args[0], values)?,
            ListEnd::Right => self.keyspace.rpush(&args[0], values)?,
        };
        Ok(RespValue::integer(len as i64))
    }

    /// LPOP / RPOP key [count]
    fn cmd_pop(&self, args: &[String], end: ListEnd) -> Reply {
        let count = match &args[1..] {
            [] => 1,
            [count] => parse_i64(count, KvError::InvalidCount)?,
            _ => return Err(KvError::WrongArgumentCount),
        };
        let values = match end {
            ListEnd::Left => self.keyspace.lpop(&args[0], count)?,
            ListEnd::Right => self.keyspace.rpop(&args[0], count)?,
        };
        Ok(RespValue::from_strings(values))
    }

    fn cmd_llen(&self, args: &[String]) -> Reply {
        let len = self.keyspace.llen(&args[0])?;
        Ok(RespValue::integer(len as i64))
    }

    fn cmd_lindex(&self, args: &[String]) -> Reply {
        let index = parse_i64(&args[1], KvError::NotAnInteger)?;
        self.keyspace
            .lindex(&args[0], index)
            .map(RespValue::from_string)
    }

    fn cmd_lset(&self, args: &[String]) -> Reply {
        let index = parse_i64(&args[1], KvError::NotAnInteger)?;
        self.keyspace.lset(&args[0], index, args[2].clone())?;
        Ok(RespValue::ok())
    }

    fn cmd_lrange(&self, args: &[String]) -> Reply {
        let (start, end) = range_args(&args[1], &args[2])?;
        let values = self.keyspace.lrange(&args[0], start, end)?;
        Ok(RespValue::from_strings(values))
    }

    fn cmd_ltrim(&self, args: &[String]) -> Reply {
        let (start, end) = range_args(&args[1], &args[2])?;
        self.keyspace.ltrim(&args[0], start, end)?;
        Ok(RespValue::ok())
    }

    fn cmd_linsert(&self, args: &[String]) -> Reply {
        let position: InsertPosition = args[1].parse()?;
        let len = self
            .keyspace
            .linsert(&args[0], position, &args[2], args[3].clone())?;
        Ok(RespValue::integer(len))
    }

    fn cmd_lrem(&self, args: &[String]) -> Reply {
        let count = parse_i64(&args[1], KvError::NotAnInteger)?;
        let removed = self.keyspace.lrem(&args[0], count, &args[2])?;
        Ok(RespValue::integer(removed as i64))
    }

    fn cmd_lmove(&self, args: &[String]) -> Reply {
        let from: ListEnd = args[2].parse()?;
        let to: ListEnd = args[3].parse()?;
        self.keyspace
            .lmove(&args[0], &args[1], from, to)
            .map(RespValue::from_string)
    }

    // ========================================================================
    // Sets
    // ========================================================================

    fn cmd_sadd(&self, args: &[String]) -> Reply {
        let added = self.keyspace.sadd(&args[0], args[1..].to_vec())?;
        Ok(RespValue::integer(added))
    }

    fn cmd_srem(&self, args: &[String]) -> Reply {
        let removed = self.keyspace.srem(&args[0], &args[1..])?;
        Ok(RespValue::integer(removed))
    }

    fn cmd_scard(&self, args: &[String]) -> Reply {
        let len = self.keyspace.scard(&args[0])?;
        Ok(RespValue::integer(len as i64))
    }

    fn cmd_sismember(&self, args: &[String]) -> Reply {
        self.keyspace.sismember(&args[0], &args[1]).map(flag)
    }

    fn cmd_smembers(&self, args: &[String]) -> Reply {
        let members = self.keyspace.smembers(&args[0])?;
        Ok(RespValue::from_strings(members))
    }

    fn cmd_sdiff(&self, args: &[String]) -> Reply {
        let members = self.keyspace.sdiff(args)?;
        Ok(RespValue::from_strings(members))
    }
}

// ============================================================================
// Commands that need no keyspace
// ============================================================================

fn cmd_ping(args: &[String]) -> Reply {
    match args {
        [] => Ok(RespValue::pong()),
        [message] => Ok(bulk(message)),
        _ => Err(KvError::WrongArgumentCount),
    }
}

/// COMMAND, COMMAND COUNT, COMMAND INFO name [name ...]
fn cmd_command(args: &[String]) -> Reply {
    let Some(sub) = args.first() else {
        return Ok(RespValue::from_strings(COMMANDS.iter().map(|c| c.name)));
    };

    match sub.to_ascii_uppercase().as_str() {
        "COUNT" => Ok(RespValue::integer(COMMANDS.len() as i64)),
        "INFO" => {
            let entries = args[1..]
                .iter()
                .map(|name| match lookup(&name.to_ascii_uppercase()) {
                    Some(def) => RespValue::array(vec![
                        bulk(def.name),
                        RespValue::integer(i64::from(def.arity)),
                        bulk(def.summary),
                    ]),
                    None => RespValue::null(),
                })
                .collect();
            Ok(RespValue::array(entries))
        }
        _ => Err(KvError::Syntax),
    }
}

// ============================================================================
// Argument helpers
// ============================================================================

/// Flattens a request into owned strings. Bulk strings that are not valid
/// UTF-8 are converted lossily.
/// HELP [command]
fn cmd_help(args: &[String]) -> Reply {
    let text = match args {
        [] => COMMANDS
            .iter()
            .map(CommandDef::usage)
            .collect::<Vec<_>>()
            .join("\n"),
        [name] => {
            let name = name.to_ascii_uppercase();
            match lookup(&name) {
                Some(def) => def.usage(),
                None => return Err(KvError::UnknownCommand(name)),
            }
        }
        _ => return Err(KvError::WrongArgumentCount),
    };
    Ok(RespValue::bulk_string(Bytes::from(text)))
}

fn arguments(request: RespValue) -> KvResult<Vec<String>> {
    let items = request.into_array().ok_or(KvError::Syntax)?;
    items
        .into_iter()
        .map(|item| match item {
            RespValue::BulkString(bytes) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
            RespValue::SimpleString(s) => Ok(s),
            RespValue::Integer(n) => Ok(n.to_string()),
            _ => Err(KvError::Syntax),
        })
        .collect()
}

fn parse_i64(arg: &str, err: KvError) -> KvResult<i64> {
    arg.parse().map_err(|_| err)
}

fn range_args(start: &str, end: &str) -> KvResult<(i64, i64)> {
    Ok((
        parse_i64(start, KvError::NotAnInteger)?,
        parse_i64(end, KvError::NotAnInteger)?,
    ))
}

/// `key number [condition]` shared by the EXPIRE family.
fn expire_args(args: &[String]) -> KvResult<(i64, ExpireCondition)> {
    let condition = match &args[2..] {
        [] => ExpireCondition::Always,
        [flag] => flag.parse()?,
        _ => return Err(KvError::WrongArgumentCount),
    };
    let number = parse_i64(&args[1], KvError::InvalidExpireTime)?;
    Ok((number, condition))
}

/// Pairs up `k1 v1 k2 v2 ...`; an odd count is an arity error.
fn pairs(args: &[String]) -> KvResult<Vec<(String, String)>> {
    if args.len() % 2 != 0 {
        return Err(KvError::WrongArgumentCount);
    }
    Ok(args
        .chunks_exact(2)
        .map(|pair| (pair[0].clone(), pair[1].clone()))
        .collect())
}

fn null_if_missing(result: KvResult<String>) -> Reply {
    match result {
        Ok(value) => Ok(RespValue::from_string(value)),
        Err(KvError::StringNotFound) => Ok(RespValue::null()),
        Err(err) => Err(err),
    }
}

fn bulk(s: &str) -> RespValue {
    RespValue::bulk_string(Bytes::copy_from_slice(s.as_bytes()))
}

fn flag(value: bool) -> RespValue {
    RespValue::integer(i64::from(value))
}
