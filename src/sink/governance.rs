use super::SinkError;
use crate::domain::LogEntry;
use serde_json::Value;
use tracing::debug;

/// Default ceiling for one serialized entry, below the API's hard limit.
pub const DEFAULT_MAX_ENTRY_SIZE: usize = 250_000;

/// Brings an entry under `max_size` bytes by cutting its payload message.
///
/// The message loses as many bytes as the entry overflows; escaping only ever
/// makes a character longer once serialized, so one cut is enough whenever
/// the message is long enough to absorb the overflow.
pub fn fit_entry(mut entry: LogEntry, max_size: usize) -> Result<LogEntry, SinkError> {
    let size = entry.serialized_size()?;
    if size <= max_size {
        return Ok(entry);
    }
    let overflow = size - max_size;

    let Some(Value::String(message)) = entry.json_payload.get_mut("message") else {
        return Err(SinkError::EntryTooLarge {
            size,
            max: max_size,
        });
    };
    if message.len() < overflow {
        return Err(SinkError::EntryTooLarge {
            size,
            max: max_size,
        });
    }

    let mut cut = message.len() - overflow;
    while !message.is_char_boundary(cut) {
        cut -= 1;
    }
    message.truncate(cut);
    debug!(original = size, limit = max_size, "Truncated oversized log entry");

    let truncated = entry.serialized_size()?;
    if truncated > max_size {
        return Err(SinkError::EntryTooLarge {
            size: truncated,
            max: max_size,
        });
    }
    Ok(entry)
}
