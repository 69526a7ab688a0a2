use clap::Parser;
use guardpost_server::board::{AlertBoard, BoardEvent};
use guardpost_server::model::AlertView;
use guardpost_server::realtime::{AlertFeed, RedisFanout};
use guardpost_server::store::SeaOrmStore;
use guardpost_server::telemetry;
use sea_orm::Database;
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "console", about = "Live emergency alert board")]
struct Args {
    #[arg(long, env = "DATABASE_URL")]
    database_url: String,

    /// Live alerts arrive through Redis; without it only history is shown.
    #[arg(long, env = "REDIS_URL")]
    redis_url: Option<String>,
}

fn describe(index: usize, view: &AlertView) -> String {
    let alert = &view.alert;
    let site = view
        .site
        .as_ref()
        .and_then(|s| s.site_name.as_deref())
        .unwrap_or("Unknown site");
    let location = alert
        .coordinates()
        .map(|c| c.map_url())
        .unwrap_or_else(|| "no location".to_string());
    format!(
        "{:>3}  [{}] {:<7} {}  {}  {}  {}",
        index + 1,
        if alert.acknowledged { "x" } else { " " },
        alert.kind.as_str().to_uppercase(),
        alert.timestamp.format("%Y-%m-%d %H:%M:%S"),
        site,
        location,
        alert.id,
    )
}

fn print_board(board: &AlertBoard) {
    println!("--- {} alerts ---", board.alerts().len());
    for (i, view) in board.alerts().iter().enumerate() {
        println!("{}", describe(i, view));
    }
}

fn resolve_target(board: &AlertBoard, arg: &str) -> Option<Uuid> {
    if let Ok(id) = Uuid::parse_str(arg) {
        return Some(id);
    }
    let position: usize = arg.parse().ok()?;
    board.alerts().get(position.checked_sub(1)?).map(|a| a.id())
}

async fn handle_command(board: &mut AlertBoard, line: &str) -> bool {
    let mut parts = line.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some("quit"), _) | (Some("q"), _) => return false,
        (Some("list"), _) | (Some("ls"), _) => print_board(board),
        (Some("refresh"), _) => match board.refresh().await.map(|_| ()) {
            Ok(()) => print_board(board),
            Err(e) => println!("{}", e.operator_message()),
        },
        (Some("ack"), Some(target)) => match resolve_target(board, target) {
            Some(id) => match board.acknowledge(id).await {
                Ok(()) => println!("Acknowledged {}", id),
                Err(e) => println!("{}", e.operator_message()),
            },
            None => println!("No alert matches '{}'", target),
        },
        (Some(_), _) => println!("Commands: list, refresh, ack <n|id>, quit"),
        (None, _) => {}
    }
    true
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    telemetry::init_with_default_filter("guardpost-console", "warn");

    let db = Database::connect(&args.database_url)
        .await
        .expect("Failed to connect to database");
    let store = Arc::new(SeaOrmStore::new(db));
    let feed = AlertFeed::default();
    let mut board = AlertBoard::new(store, feed.clone());

    if let Some(url) = &args.redis_url {
        let client = redis::Client::open(url.as_str()).expect("Invalid Redis URL");
        RedisFanout::new(client).spawn_relay(feed, board.cancel_token());
    } else {
        tracing::warn!("REDIS_URL not set; new alerts will only appear after 'refresh'");
    }

    if let Err(e) = board.load_history().await {
        eprintln!("{}", e.operator_message());
        std::process::exit(1);
    }
    print_board(&board);
    if let Err(e) = board.subscribe() {
        eprintln!("{}", e.operator_message());
        std::process::exit(1);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            event = board.next_event() => match event {
                Some(BoardEvent::Arrived { alert, chime }) => {
                    if chime {
                        print!("\x07");
                    }
                    println!("NEW {}", describe(0, &alert));
                    let _ = std::io::stdout().flush();
                }
                Some(BoardEvent::Lagged(missed)) => {
                    println!("Missed {} live alerts, reloading", missed);
                    match board.refresh().await.map(|_| ()) {
                        Ok(()) => print_board(&board),
                        Err(e) => println!("{}", e.operator_message()),
                    }
                }
                None => break,
            },
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if !handle_command(&mut board, &line).await {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::error!("failed to read stdin: {}", e);
                    break;
                }
            },
        }
    }

    board.teardown();
}
