use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter};
use crate::entities::{emergency_alert, site, EmergencyAlerts, Sites};

pub async fn init_metrics(db: &DatabaseConnection) {
    let site_count = Sites::find()
        .filter(site::Column::Status.eq(site::STATUS_ACTIVE))
        .count(db)
        .await
        .unwrap_or(0);
    metrics::gauge!("guardpost_sites_total").set(site_count as f64);

    let pending = EmergencyAlerts::find()
        .filter(emergency_alert::Column::Acknowledged.eq(false))
        .count(db)
        .await
        .unwrap_or(0);
    metrics::gauge!("guardpost_alerts_pending").set(pending as f64);

    tracing::info!(
        "Initialized metrics: ActiveSites={}, PendingAlerts={}",
        site_count, pending
    );
}

pub fn increment_sites() {
    metrics::gauge!("guardpost_sites_total").increment(1.0);
}

pub fn increment_alerts_ingested(kind: &str) {
    metrics::counter!("guardpost_alerts_ingested_total", "type" => kind.to_string()).increment(1);
    metrics::gauge!("guardpost_alerts_pending").increment(1.0);
}

pub fn increment_alerts_rejected(reason: &'static str) {
    metrics::counter!("guardpost_alerts_rejected_total", "reason" => reason).increment(1);
}

pub fn record_acknowledgment(seconds: f64) {
    metrics::counter!("guardpost_alerts_acknowledged_total").increment(1);
    metrics::gauge!("guardpost_alerts_pending").decrement(1.0);
    metrics::histogram!("guardpost_alert_acknowledgment_duration_seconds").record(seconds);
}

pub fn increment_chimes() {
    metrics::counter!("guardpost_alert_chimes_total").increment(1);
}

pub fn set_feed_subscribers(count: usize) {
    metrics::gauge!("guardpost_feed_subscribers").set(count as f64);
}

pub fn increment_notifications_sent(channel: &str) {
    metrics::counter!("guardpost_notifications_sent_total", "channel" => channel.to_string()).increment(1);
}

pub fn increment_notifications_failed(channel: &str) {
    metrics::counter!("guardpost_notifications_failed_total", "channel" => channel.to_string()).increment(1);
}

pub fn decrement_sites() {
    metrics::gauge!("guardpost_sites_total").decrement(1.0);
}
