//! Per-toggle optimistic update tracking
//!
//! Every character toggle applies its membership change immediately and then
//! moves from [`ToggleState::Pending`] to [`ToggleState::Committed`] or
//! [`ToggleState::RolledBack`] once the remote write settles. Rollback is a
//! compare-and-revert: it only undoes the change if the list still reflects
//! it, so a newer toggle of the same character is never clobbered.

use remote_table::FavouriteCharacterRow;
use tokio::sync::oneshot;

use crate::models::Character;

/// Lifecycle of one toggle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleState {
    /// Optimistic change applied, remote write in flight
    Pending,

    /// Remote write succeeded
    Committed,

    /// Remote write failed
    RolledBack,
}

impl ToggleState {
    /// Advance a pending toggle with the remote write's outcome
    ///
    /// Terminal states are left unchanged.
    pub fn resolve(self, remote_succeeded: bool) -> Self {
        match self {
            ToggleState::Pending if remote_succeeded => ToggleState::Committed,
            ToggleState::Pending => ToggleState::RolledBack,
            terminal => terminal,
        }
    }

    /// Whether the toggle has settled
    pub fn is_terminal(self) -> bool {
        !matches!(self, ToggleState::Pending)
    }
}

/// What a failed toggle should do to the in-memory list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollbackDecision {
    /// Put the character back (a removal failed)
    Restore,

    /// Take the character out again (an insertion failed)
    Remove,

    /// Membership already moved on; leave the list alone
    Skip,
}

impl RollbackDecision {
    /// Decide from membership before the toggle and membership right now
    pub fn decide(existed_before: bool, present_now: bool) -> Self {
        match (existed_before, present_now) {
            (true, false) => RollbackDecision::Restore,
            (false, true) => RollbackDecision::Remove,
            _ => RollbackDecision::Skip,
        }
    }
}

/// Remote operation a toggle must perform
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteWrite {
    /// Insert a new row
    Insert(FavouriteCharacterRow),

    /// Delete the row keyed by device and character
    Delete {
        /// Owning installation
        device_id: String,
        /// Character to remove
        character_id: String,
    },
}

/// A toggle whose optimistic change has been applied
#[derive(Debug, Clone)]
pub struct CharacterToggle {
    /// The toggled character
    pub character: Character,
    /// Membership before the toggle
    pub existed: bool,
    /// Current state
    pub state: ToggleState,
}

impl CharacterToggle {
    /// Start tracking a toggle
    pub fn new(character: Character, existed: bool) -> Self {
        Self { character, existed, state: ToggleState::Pending }
    }

    /// The write that makes the remote table match the optimistic change
    pub fn remote_write(&self, device_id: &str) -> RemoteWrite {
        if self.existed {
            RemoteWrite::Delete {
                device_id: device_id.to_string(),
                character_id: self.character.id.clone(),
            }
        } else {
            RemoteWrite::Insert(self.character.to_row(device_id))
        }
    }

    /// Record the remote outcome
    pub fn settle(&mut self, remote_succeeded: bool) -> ToggleState {
        self.state = self.state.resolve(remote_succeeded);
        self.state
    }
}

/// Completion future for a character toggle
///
/// Dropping the handle does not cancel the remote write.
#[derive(Debug)]
pub struct ToggleHandle {
    character_id: String,
    rx: oneshot::Receiver<ToggleState>,
}

impl ToggleHandle {
    pub(crate) fn new(character_id: String, rx: oneshot::Receiver<ToggleState>) -> Self {
        Self { character_id, rx }
    }

    /// Id of the toggled character
    pub fn character_id(&self) -> &str {
        &self.character_id
    }

    /// Wait for the toggle to settle
    ///
    /// Returns [`ToggleState::Pending`] if the background task went away
    /// without reporting.
    pub async fn wait(self) -> ToggleState {
        self.rx.await.unwrap_or(ToggleState::Pending)
    }
}

/// Completion future for a local persistence write
#[derive(Debug)]
pub struct PersistHandle {
    rx: oneshot::Receiver<bool>,
}

impl PersistHandle {
    pub(crate) fn new(rx: oneshot::Receiver<bool>) -> Self {
        Self { rx }
    }

    /// Wait for the write; `true` if it succeeded
    pub async fn wait(self) -> bool {
        self.rx.await.unwrap_or(false)
    }
}
