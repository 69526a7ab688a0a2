pub mod emergency_alert;
pub mod operator;
pub mod site;

pub use emergency_alert::Entity as EmergencyAlerts;
pub use operator::Entity as Operators;
pub use site::Entity as Sites;
