pub struct NotificationTemplates;

pub const INCIDENT_PREFIX: &str = "🚨 New Incident Report\n\n";

impl NotificationTemplates {
    /// Body of a relayed notification. Incident reports get a header line;
    /// every other type goes out as written.
    pub fn relay_message(kind: &str, message: &str) -> String {
        if kind == "incident" {
            format!("{}{}", INCIDENT_PREFIX, message)
        } else {
            message.to_string()
        }
    }
}
