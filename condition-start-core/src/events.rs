use crate::types::{DefinitionRef, Timestamp};
use serde::{Deserialize, Serialize};

/// Runtime events written when correlation creates an instance. The
/// execution engine appends to the same log once it takes over.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum RuntimeEvent {
    /// Instance row created for a definition, before any data is applied.
    InstanceCreated {
        definition: DefinitionRef,
        business_key: Option<String>,
        at: Timestamp,
    },
    /// Initial variables applied. Names only; values live on the instance.
    VariablesApplied {
        names: Vec<String>,
        variables_hash: [u8; 32],
    },
    /// Instance started at the matched start event.
    InstanceStarted { start_activity_id: String },
}
