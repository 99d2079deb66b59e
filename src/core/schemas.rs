//! Database schema for the persisted entry point.
//!
//! One SQLite database holds everything needed to rebuild a `Diamond`:
//! 1. diamond_meta: entry-point address and owner.
//! 2. modules: deployed module specs (code is rebuilt from these on load).
//! 3. routes: selector -> module, with loupe ordering.
//! 4. storage_words: non-zero storage slots.
//! 5. consumed_inits: init routes that have already run.

pub const DIAMOND_DB_NAME: &str = "diamond.db";
pub const DIAMOND_EVENTS_NAME: &str = "diamond.events.jsonl";

pub const DIAMOND_DB_SCHEMA_META: &str = "
    CREATE TABLE IF NOT EXISTS diamond_meta (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    )
";

pub const DIAMOND_DB_SCHEMA_MODULES: &str = "
    CREATE TABLE IF NOT EXISTS modules (
        address TEXT PRIMARY KEY,
        name TEXT NOT NULL UNIQUE,
        kind TEXT NOT NULL,
        spec_json TEXT NOT NULL,
        deployed_at TEXT NOT NULL
    )
";

pub const DIAMOND_DB_SCHEMA_ROUTES: &str = "
    CREATE TABLE IF NOT EXISTS routes (
        selector TEXT PRIMARY KEY,
        module TEXT NOT NULL,
        facet_pos INTEGER NOT NULL,
        selector_pos INTEGER NOT NULL,
        FOREIGN KEY(module) REFERENCES modules(address)
    )
";
pub const DIAMOND_DB_SCHEMA_ROUTES_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_routes_module ON routes(module)";

pub const DIAMOND_DB_SCHEMA_STORAGE: &str = "
    CREATE TABLE IF NOT EXISTS storage_words (
        slot TEXT PRIMARY KEY,
        word TEXT NOT NULL
    )
";

pub const DIAMOND_DB_SCHEMA_CONSUMED_INITS: &str = "
    CREATE TABLE IF NOT EXISTS consumed_inits (
        module TEXT NOT NULL,
        selector TEXT NOT NULL,
        PRIMARY KEY(module, selector)
    )
";

pub fn all() -> [&'static str; 6] {
    [
        DIAMOND_DB_SCHEMA_META,
        DIAMOND_DB_SCHEMA_MODULES,
        DIAMOND_DB_SCHEMA_ROUTES,
        DIAMOND_DB_SCHEMA_ROUTES_INDEX,
        DIAMOND_DB_SCHEMA_STORAGE,
        DIAMOND_DB_SCHEMA_CONSUMED_INITS,
    ]
}
