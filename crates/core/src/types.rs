/// Workspace (project) identifier, used as the first path segment of a run.
pub type WorkspaceId = String;

/// Run identifier (first 8 characters of a UUID v4).
pub type RunId = String;

/// Workflow node identifier as assigned by the canvas.
pub type NodeId = String;

/// Format of every timestamp persisted in run files.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Current local time rendered with [`TIMESTAMP_FORMAT`].
pub fn now_timestamp() -> String {
    chrono::Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a persisted timestamp. Returns `None` for anything not in
/// [`TIMESTAMP_FORMAT`].
pub fn parse_timestamp(value: &str) -> Option<chrono::NaiveDateTime> {
    chrono::NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_timestamp_round_trips_through_parse() {
        let now = now_timestamp();
        assert!(parse_timestamp(&now).is_some());
    }

    #[test]
    fn parse_rejects_iso_with_t_separator() {
        assert!(parse_timestamp("2024-01-02T03:04:05").is_none());
        assert!(parse_timestamp("2024-01-02 03:04:05").is_some());
    }
}
