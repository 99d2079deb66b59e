use crate::core::abi::{Word, parse_hex_bytes};
use crate::core::diamond::Diamond;
use crate::core::error::DiamondError;
use crate::core::facet::ModuleHost;
use crate::core::registry::{FacetRoutes, SelectorRegistry};
use crate::core::schemas;
use crate::core::selector::{Address, Selector};
use crate::core::slot::Slot;
use crate::core::storage::Storage;
use crate::core::time;
use crate::plugins::ModuleSpec;
use rusqlite::{Connection, OptionalExtension, params};
use std::collections::BTreeSet;
use std::path::Path;

pub fn db_connect(db_path: &Path) -> Result<Connection, DiamondError> {
    let conn = Connection::open(db_path)?;
    conn.busy_timeout(std::time::Duration::from_secs(5))?;
    conn.query_row("PRAGMA journal_mode=WAL;", [], |_| Ok(()))?;
    conn.execute("PRAGMA foreign_keys=ON;", [])?;
    Ok(conn)
}

pub fn initialize_diamond_db(conn: &Connection) -> Result<(), DiamondError> {
    for statement in schemas::all() {
        conn.execute(statement, [])?;
    }
    Ok(())
}

fn read_meta(conn: &Connection, key: &str) -> Result<Option<String>, DiamondError> {
    Ok(conn
        .query_row(
            "SELECT value FROM diamond_meta WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()?)
}

fn parse_word_hex(raw: &str) -> Result<Word, DiamondError> {
    let bytes = parse_hex_bytes(raw)?;
    let word: Word = bytes
        .as_slice()
        .try_into()
        .map_err(|_| DiamondError::ValidationError(format!("stored word '{}' is not 32 bytes", raw)))?;
    Ok(word)
}

/// Loads the persisted diamond and the specs of every deployed module.
///
/// Returns `None` when nothing has been deployed yet.
pub fn load_diamond(conn: &Connection) -> Result<Option<(Diamond, Vec<ModuleSpec>)>, DiamondError> {
    let (Some(address), Some(owner)) = (read_meta(conn, "address")?, read_meta(conn, "owner")?)
    else {
        return Ok(None);
    };
    let address: Address = address.parse()?;
    let owner: Address = owner.parse()?;

    let mut stmt = conn.prepare("SELECT address, spec_json FROM modules ORDER BY rowid")?;
    let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;
    let mut host = ModuleHost::new();
    let mut specs = Vec::new();
    for row in rows {
        let (module, spec_json) = row?;
        let spec: ModuleSpec = serde_json::from_str(&spec_json)?;
        let module: Address = module.parse()?;
        if module != spec.address() {
            return Err(DiamondError::ValidationError(format!(
                "module {} is stored at {} but its spec derives {}",
                spec.name(),
                module,
                spec.address()
            )));
        }
        host.deploy(module, spec.instantiate()?)?;
        specs.push(spec);
    }

    let mut stmt =
        conn.prepare("SELECT selector, module FROM routes ORDER BY facet_pos, selector_pos")?;
    let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;
    let mut facets: Vec<FacetRoutes> = Vec::new();
    for row in rows {
        let (selector, module) = row?;
        let selector: Selector = selector.parse()?;
        let module: Address = module.parse()?;
        match facets.last_mut() {
            Some(last) if last.address == module => last.selectors.push(selector),
            _ => facets.push(FacetRoutes {
                address: module,
                selectors: vec![selector],
            }),
        }
    }
    let registry = SelectorRegistry::from_facets(facets);

    let mut stmt = conn.prepare("SELECT slot, word FROM storage_words")?;
    let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;
    let mut storage = Storage::new();
    for row in rows {
        let (slot, word) = row?;
        let slot: Slot = slot.parse()?;
        storage.write(slot, parse_word_hex(&word)?);
    }

    let mut stmt = conn.prepare("SELECT module, selector FROM consumed_inits")?;
    let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;
    let mut consumed = BTreeSet::new();
    for row in rows {
        let (module, selector) = row?;
        consumed.insert((module.parse::<Address>()?, selector.parse::<Selector>()?));
    }

    let diamond = Diamond::restore(address, owner, host, registry, storage, consumed);
    Ok(Some((diamond, specs)))
}

/// Writes the full diamond state. Call inside a transaction.
pub fn save_diamond(
    conn: &Connection,
    diamond: &Diamond,
    specs: &[ModuleSpec],
) -> Result<(), DiamondError> {
    conn.execute(
        "INSERT OR REPLACE INTO diamond_meta(key, value) VALUES('address', ?1)",
        params![diamond.address().to_string()],
    )?;
    conn.execute(
        "INSERT OR REPLACE INTO diamond_meta(key, value) VALUES('owner', ?1)",
        params![diamond.owner().to_string()],
    )?;

    let now = time::now_epoch_z();
    for spec in specs {
        conn.execute(
            "INSERT OR IGNORE INTO modules(address, name, kind, spec_json, deployed_at) VALUES(?1, ?2, ?3, ?4, ?5)",
            params![
                spec.address().to_string(),
                spec.name(),
                spec.kind(),
                serde_json::to_string(spec)?,
                now
            ],
        )?;
    }

    conn.execute("DELETE FROM routes", [])?;
    for (facet_pos, facet) in diamond.registry().facets().iter().enumerate() {
        for (selector_pos, selector) in facet.selectors.iter().enumerate() {
            conn.execute(
                "INSERT INTO routes(selector, module, facet_pos, selector_pos) VALUES(?1, ?2, ?3, ?4)",
                params![
                    selector.to_string(),
                    facet.address.to_string(),
                    facet_pos as i64,
                    selector_pos as i64
                ],
            )?;
        }
    }

    conn.execute("DELETE FROM storage_words", [])?;
    for (slot, word) in diamond.storage().iter() {
        conn.execute(
            "INSERT INTO storage_words(slot, word) VALUES(?1, ?2)",
            params![slot.to_string(), format!("0x{}", hex::encode(word))],
        )?;
    }

    for (module, selector) in diamond.consumed_inits() {
        conn.execute(
            "INSERT OR IGNORE INTO consumed_inits(module, selector) VALUES(?1, ?2)",
            params![module.to_string(), selector.to_string()],
        )?;
    }
    Ok(())
}
