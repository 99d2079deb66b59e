use crate::core::db;
use crate::core::diamond::Diamond;
use crate::core::error::DiamondError;
use crate::core::selector::Address;
use crate::core::store::Store;
use crate::core::time;
use crate::plugins::ModuleSpec;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::sync::{Mutex, MutexGuard};

static DIAMOND_LOCK: Mutex<()> = Mutex::new(());

fn lock_diamond() -> Result<MutexGuard<'static, ()>, DiamondError> {
    DIAMOND_LOCK
        .lock()
        .map_err(|_| DiamondError::ValidationError("diamond lock poisoned".to_string()))
}

/// The broker is the only path to a persisted diamond.
///
/// Each operation runs under a process-wide lock against a freshly loaded
/// diamond; its result is written back in a single SQLite transaction only
/// if the operation succeeded. Every mutating operation, successful or not,
/// is appended to the audit log once its outcome is settled. The audit
/// write never changes that outcome.
///
/// `inspect` is the read path: it loads, runs, and neither saves nor audits.
pub struct DiamondBroker {
    store: Store,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct DiamondEvent {
    pub ts: String,
    pub event_id: String,
    pub actor: String,
    pub op: String,
    pub status: String,
    pub registry_fingerprint: Option<String>,
    pub detail: serde_json::Value,
}

/// A loaded diamond plus the specs of modules deployed during this session.
pub struct Session {
    pub diamond: Diamond,
    specs: Vec<ModuleSpec>,
}

impl Session {
    pub fn specs(&self) -> &[ModuleSpec] {
        &self.specs
    }

    /// Deploys a built-in module at its name-derived address.
    pub fn deploy(&mut self, spec: ModuleSpec) -> Result<Address, DiamondError> {
        let address = spec.address();
        self.diamond.deploy_module(address, spec.instantiate()?)?;
        self.specs.push(spec);
        Ok(address)
    }

    /// Deploys `spec` unless a module with the same address already exists.
    pub fn ensure_deployed(&mut self, spec: ModuleSpec) -> Result<Address, DiamondError> {
        let address = spec.address();
        if self.diamond.host().has_code(&address) {
            return Ok(address);
        }
        self.deploy(spec)
    }
}

impl DiamondBroker {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Creates the entry point. Fails if the store already holds one.
    pub fn create<F, R>(
        &self,
        address: Address,
        owner: Address,
        actor: &str,
        f: F,
    ) -> Result<R, DiamondError>
    where
        F: FnOnce(&mut Session) -> Result<R, DiamondError>,
    {
        self.run(actor, "diamond.create", |loaded| {
            if loaded.is_some() {
                return Err(DiamondError::ValidationError(format!(
                    "store {} already holds a diamond",
                    self.store.root.display()
                )));
            }
            let mut session = Session {
                diamond: Diamond::new(address, owner, Default::default()),
                specs: Vec::new(),
            };
            let result = f(&mut session)?;
            Ok((session, result))
        })
    }

    /// Runs `f` against the persisted diamond.
    pub fn with_diamond<F, R>(&self, actor: &str, op: &str, f: F) -> Result<R, DiamondError>
    where
        F: FnOnce(&mut Session) -> Result<R, DiamondError>,
    {
        self.run(actor, op, |loaded| {
            let (diamond, specs) = loaded.ok_or_else(|| self.not_found())?;
            let mut session = Session { diamond, specs };
            let result = f(&mut session)?;
            Ok((session, result))
        })
    }

    /// Runs `f` against the persisted diamond without writing anything back.
    ///
    /// A missing store is `NotFound` and is not created.
    pub fn inspect<F, R>(&self, f: F) -> Result<R, DiamondError>
    where
        F: FnOnce(&Diamond) -> Result<R, DiamondError>,
    {
        let _lock = lock_diamond()?;
        let db_path = self.store.db_path();
        if !db_path.exists() {
            return Err(self.not_found());
        }
        let conn = db::db_connect(&db_path)?;
        let (diamond, _) = db::load_diamond(&conn)?.ok_or_else(|| self.not_found())?;
        f(&diamond)
    }

    fn not_found(&self) -> DiamondError {
        DiamondError::NotFound(format!(
            "no diamond in {} (run `diamond deploy` first)",
            self.store.root.display()
        ))
    }

    fn run<F, R>(&self, actor: &str, op: &str, f: F) -> Result<R, DiamondError>
    where
        F: FnOnce(Option<(Diamond, Vec<ModuleSpec>)>) -> Result<(Session, R), DiamondError>,
    {
        let _lock = lock_diamond()?;

        fs::create_dir_all(&self.store.root)?;
        let mut conn = db::db_connect(&self.store.db_path())?;
        db::initialize_diamond_db(&conn)?;

        let outcome = db::load_diamond(&conn).and_then(f).and_then(|(session, result)| {
            let tx = conn.transaction()?;
            db::save_diamond(&tx, &session.diamond, &session.specs)?;
            tx.commit()?;
            Ok((session.diamond.registry().fingerprint(), result))
        });

        match outcome {
            Ok((fingerprint, result)) => {
                self.audit(actor, op, "success", Some(fingerprint), serde_json::Value::Null);
                Ok(result)
            }
            Err(err) => {
                self.audit(
                    actor,
                    op,
                    "error",
                    None,
                    serde_json::json!({ "error": err.to_string() }),
                );
                Err(err)
            }
        }
    }

    /// The outcome is already committed or rejected; a failed audit write
    /// is reported on stderr and does not change it.
    fn audit(
        &self,
        actor: &str,
        op: &str,
        status: &str,
        registry_fingerprint: Option<String>,
        detail: serde_json::Value,
    ) {
        if let Err(e) = self.log_event(actor, op, status, registry_fingerprint, detail) {
            eprintln!(
                "diamond: failed to append {} event for {} to {}: {}",
                status,
                op,
                self.store.events_path().display(),
                e
            );
        }
    }

    fn log_event(
        &self,
        actor: &str,
        op: &str,
        status: &str,
        registry_fingerprint: Option<String>,
        detail: serde_json::Value,
    ) -> Result<(), DiamondError> {
        let ev = DiamondEvent {
            ts: time::now_epoch_z(),
            event_id: time::new_event_id(),
            actor: actor.to_string(),
            op: op.to_string(),
            status: status.to_string(),
            registry_fingerprint,
            detail,
        };

        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.store.events_path())?;
        writeln!(f, "{}", serde_json::to_string(&ev)?)?;
        Ok(())
    }

    /// Last `n` audit events, oldest first.
    pub fn recent_events(&self, n: usize) -> Result<Vec<DiamondEvent>, DiamondError> {
        let path = self.store.events_path();
        if !path.exists() {
            return Ok(vec![]);
        }
        let content = fs::read_to_string(path)?;
        let lines: Vec<&str> = content.lines().filter(|l| !l.trim().is_empty()).collect();
        let start = lines.len().saturating_sub(n);
        lines[start..]
            .iter()
            .map(|line| serde_json::from_str(line).map_err(DiamondError::from))
            .collect()
    }
}
