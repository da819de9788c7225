//! Participant connection records.

use chrono::{DateTime, Utc};

/// One participant's attachment to the chat channel.
///
/// Assigned by the transport when the participant joins and never changed
/// afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    connection_id: String,
    creation_time: DateTime<Utc>,
    custom_data: String,
}

impl Connection {
    /// Create a connection record.
    pub fn new(
        connection_id: impl Into<String>,
        creation_time: DateTime<Utc>,
        custom_data: impl Into<String>,
    ) -> Self {
        Self {
            connection_id: connection_id.into(),
            creation_time,
            custom_data: custom_data.into(),
        }
    }

    /// Unique identifier within the channel.
    pub fn connection_id(&self) -> &str {
        &self.connection_id
    }

    /// Time the transport created the connection.
    pub fn creation_time(&self) -> DateTime<Utc> {
        self.creation_time
    }

    /// Application metadata attached at join time.
    pub fn custom_data(&self) -> &str {
        &self.custom_data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_connection_accessors() {
        let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let conn = Connection::new("c1", t0, "alias=Alice");

        assert_eq!(conn.connection_id(), "c1");
        assert_eq!(conn.creation_time(), t0);
        assert_eq!(conn.custom_data(), "alias=Alice");
    }

    #[test]
    fn test_connection_equality_is_by_value() {
        let t0 = Utc::now();
        assert_eq!(Connection::new("c1", t0, ""), Connection::new("c1", t0, ""));
        assert_ne!(Connection::new("c1", t0, ""), Connection::new("c2", t0, ""));
    }
}
