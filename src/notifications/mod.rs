pub mod templates;
pub mod whatsapp;

pub use templates::NotificationTemplates;
pub use whatsapp::{NotifyError, WhatsAppNotifier};
