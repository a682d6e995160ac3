use serde_json::Value;

/// What to persist from a raw fetcher result
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    Data(Value),
    Error(Value),
    /// Nothing to persist; only bookkeeping is updated
    Discard,
}

/// Classifies a raw fetcher result.
///
/// Rules, in order:
/// 1. `null` is discarded.
/// 2. An object carrying `payload_field` is an envelope: a non-null payload is
///    data, a null payload makes the whole object the error value.
/// 3. Anything else is data as a whole.
pub fn classify(
    raw: &Value,
    payload_field: &str,
) -> Classification {
    match raw {
        Value::Null => Classification::Discard,
        Value::Object(map) => match map.get(payload_field) {
            Some(Value::Null) => Classification::Error(raw.clone()),
            Some(payload) => Classification::Data(payload.clone()),
            None => Classification::Data(raw.clone()),
        },
        other => Classification::Data(other.clone()),
    }
}
