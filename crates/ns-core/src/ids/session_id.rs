use serde::{Deserialize, Serialize};

use super::id_macro::impl_id;

/// Identifier of one discovery request.
///
/// Timer and pump tasks carry the id of the session that spawned them so
/// late events for a discarded session can be recognised and dropped.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScanSessionId(String);

impl_id!(ScanSessionId);
