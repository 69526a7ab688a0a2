use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use futures::stream::{self, Stream};
use serde_json::json;
use tracing::field::display;
use uuid::Uuid;

use super::AppState;
use crate::board::{observe_acknowledgement, AlertBoard, BoardEvent};
use crate::store::StoreError;

// GET /alerts
pub async fn list_alerts(Extension(state): Extension<AppState>) -> Response {
    match state.alerts.list_alerts().await {
        Ok(alerts) => {
            tracing::Span::current()
                .record("table", "emergency_alerts")
                .record("action", "list_alerts");
            (StatusCode::OK, Json(alerts)).into_response()
        }
        Err(e) => {
            tracing::Span::current()
                .record("table", "emergency_alerts")
                .record("action", "list_alerts_error")
                .record("error", display(&e));
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Failed to fetch alerts"})),
            )
                .into_response()
        }
    }
}

// GET /alerts/:id
pub async fn get_alert(
    Extension(state): Extension<AppState>,
    Path(alert_id): Path<Uuid>,
) -> Response {
    tracing::Span::current().record("alert_id", display(alert_id));

    match state.alerts.find_alert(alert_id).await {
        Ok(Some(alert)) => (StatusCode::OK, Json(alert)).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({"error": "Alert not found"})),
        )
            .into_response(),
        Err(e) => {
            tracing::Span::current()
                .record("table", "emergency_alerts")
                .record("action", "get_alert_error")
                .record("error", display(&e));
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Failed to fetch alert"})),
            )
                .into_response()
        }
    }
}

// POST /alerts/:id/acknowledge
pub async fn acknowledge_alert(
    Extension(state): Extension<AppState>,
    Path(alert_id): Path<Uuid>,
) -> Response {
    tracing::Span::current().record("alert_id", display(alert_id));

    match state.alerts.acknowledge_alert(alert_id).await {
        Ok(ack) => {
            observe_acknowledgement(&ack);
            tracing::Span::current()
                .record("table", "emergency_alerts")
                .record("action", "acknowledge_alert")
                .record("site_id", display(ack.alert.site_id))
                .record(
                    "business_event",
                    if ack.transitioned {
                        "Emergency alert acknowledged"
                    } else {
                        "Emergency alert already acknowledged"
                    },
                )
                .record("error", tracing::field::Empty);

            (StatusCode::OK, Json(ack.alert)).into_response()
        }
        Err(StoreError::AlertNotFound(_)) => (
            StatusCode::NOT_FOUND,
            Json(json!({"error": "Alert not found"})),
        )
            .into_response(),
        Err(e) => {
            tracing::Span::current()
                .record("table", "emergency_alerts")
                .record("action", "acknowledge_alert_error")
                .record("error", display(&e));
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Failed to acknowledge alert"})),
            )
                .into_response()
        }
    }
}

enum StreamPhase {
    Start(AlertBoard),
    Live(AlertBoard),
    Resync(AlertBoard),
    Done,
}

fn snapshot_event(board: &AlertBoard) -> Result<Event, axum::Error> {
    Event::default().event("snapshot").json_data(board.alerts())
}

fn error_event(message: &str) -> Result<Event, axum::Error> {
    Event::default()
        .event("error")
        .json_data(json!({"error": message}))
}

fn board_events(board: AlertBoard) -> impl Stream<Item = Result<Event, axum::Error>> {
    stream::unfold(StreamPhase::Start(board), |phase| async move {
        match phase {
            StreamPhase::Start(mut board) => {
                if let Err(e) = board.load_history().await {
                    return Some((error_event(e.operator_message()), StreamPhase::Done));
                }
                if let Err(e) = board.subscribe() {
                    return Some((error_event(e.operator_message()), StreamPhase::Done));
                }
                Some((snapshot_event(&board), StreamPhase::Live(board)))
            }
            StreamPhase::Live(mut board) => match board.next_event().await? {
                BoardEvent::Arrived { alert, chime } => {
                    let event = Event::default()
                        .event("alert")
                        .json_data(json!({"alert": alert, "chime": chime}));
                    Some((event, StreamPhase::Live(board)))
                }
                BoardEvent::Lagged(missed) => {
                    let event = Event::default()
                        .event("lagged")
                        .json_data(json!({"missed": missed}));
                    Some((event, StreamPhase::Resync(board)))
                }
            },
            StreamPhase::Resync(mut board) => match board.refresh().await.map(|_| ()) {
                Ok(()) => Some((snapshot_event(&board), StreamPhase::Live(board))),
                Err(e) => Some((error_event(e.operator_message()), StreamPhase::Done)),
            },
            StreamPhase::Done => None,
        }
    })
}

// GET /alerts/stream
pub async fn alert_stream(
    Extension(state): Extension<AppState>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    tracing::Span::current()
        .record("table", "emergency_alerts")
        .record("action", "open_alert_stream");

    let board = AlertBoard::with_cancel(
        state.alerts.clone(),
        state.feed.clone(),
        state.shutdown.child_token(),
    );
    Sse::new(board_events(board)).keep_alive(KeepAlive::default())
}
