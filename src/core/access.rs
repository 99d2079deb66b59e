use crate::core::error::DiamondError;
use crate::core::selector::Address;

/// Single-owner authorization for registry mutations.
///
/// The owner is fixed when the entry point is constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessGate {
    owner: Address,
}

impl AccessGate {
    pub fn new(owner: Address) -> Self {
        Self { owner }
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn ensure_owner(&self, caller: &Address) -> Result<(), DiamondError> {
        if *caller != self.owner {
            return Err(DiamondError::NotOwner { caller: *caller });
        }
        Ok(())
    }
}
