use serde::Deserialize;
use serde::Serialize;

use crate::EqualityKind;

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct ObserveConfig {
    /// Equality used by bindings that do not supply their own
    #[serde(default)]
    pub equality: EqualityKind,
}
