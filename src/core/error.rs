use crate::core::selector::{Address, Selector};
use std::io;
use thiserror::Error;

/// Failure raised by a facet while executing a dispatched call.
///
/// These surface unmodified through dispatch and as the source of
/// [`DiamondError::InitPayloadFailed`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FacetError {
    #[error("reverted: {0}")]
    Revert(String),
    #[error("selector {0} is not implemented by this module")]
    Unsupported(Selector),
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
}

#[derive(Error, Debug)]
pub enum DiamondError {
    // Cut validation.
    #[error("selector {0} is already registered")]
    DuplicateSelector(Selector),
    #[error("selector {0} is not registered")]
    SelectorNotFound(Selector),
    #[error("module address must not be the zero address")]
    ZeroAddressModule,
    #[error("selector {selector} already routes to {module}; replace needs a different module")]
    AmbiguousReplace { selector: Selector, module: Address },
    #[error("selector {0} is referenced by more than one entry in the same cut")]
    ConflictingCut(Selector),
    #[error("cut entry for {0} lists no selectors")]
    EmptySelectorSet(Address),
    #[error("remove entries must target the zero address, got {0}")]
    RemoveTargetNotZero(Address),
    #[error("no module code deployed at {0}")]
    ModuleCodeMissing(Address),
    #[error("a module is already deployed at {0}")]
    ModuleAlreadyDeployed(Address),

    // Access.
    #[error("caller {caller} is not the owner")]
    NotOwner { caller: Address },

    // Init.
    #[error("init call to {module} failed: {source}")]
    InitPayloadFailed {
        module: Address,
        #[source]
        source: FacetError,
    },
    #[error("init {selector} on {module} has already been consumed")]
    InitAlreadyConsumed { module: Address, selector: Selector },

    // Dispatch.
    #[error("function does not exist: {0}")]
    FunctionNotFound(Selector),
    #[error("call to {module} failed: {source}")]
    Facet {
        module: Address,
        #[source]
        source: FacetError,
    },

    // Identifiers and namespaces.
    #[error("invalid function signature: {0}")]
    InvalidSignature(String),
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),
    #[error("namespace {0} is already registered")]
    NamespaceConflict(String),
    #[error("namespace {name} overlaps storage of namespace {other}")]
    NamespaceOverlap { name: String, other: String },
    #[error("unknown namespace: {0}")]
    UnknownNamespace(String),

    // Host layer.
    #[error("SQLite error: {0}")]
    RusqliteError(#[from] rusqlite::Error),
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("Config error: {0}")]
    ConfigError(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Not found: {0}")]
    NotFound(String),
}
