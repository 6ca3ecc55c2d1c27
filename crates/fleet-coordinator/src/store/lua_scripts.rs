//! Lua scripts for holder-checked lease operations.
//!
//! Renewal and release must only touch the leadership record while it still
//! names the caller. Running the comparison and the mutation inside one
//! script makes them atomic on the server, so a successor's lease acquired
//! after ours expired can never be extended or deleted by us.

/// Lua script for compare-and-expire.
///
/// Arguments:
/// - KEYS[1]: Key (e.g., `fleet:leader`)
/// - ARGV[1]: Expected value (holder identity)
/// - ARGV[2]: New TTL in milliseconds
///
/// Returns:
/// - 1: Value matched and expiry was extended
/// - 0: Key absent or held by someone else
pub const EXPIRE_IF_EQUALS: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    return redis.call('PEXPIRE', KEYS[1], ARGV[2])
end
return 0
"#;

/// Lua script for compare-and-delete.
///
/// Arguments:
/// - KEYS[1]: Key (e.g., `fleet:leader`)
/// - ARGV[1]: Expected value (holder identity)
///
/// Returns:
/// - 1: Value matched and the key was deleted
/// - 0: Key absent or held by someone else
pub const DELETE_IF_EQUALS: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    return redis.call('DEL', KEYS[1])
end
return 0
"#;
