use clap::Parser;
use guardpost_server::config::DEFAULT_GEOLOCATION_TIMEOUT_MS;
use guardpost_server::model::{AlertKind, Coordinates};
use guardpost_server::portal::{
    FixedLocation, Geolocator, HttpPortalBackend, NoLocation, PortalSession, TriggerError,
};
use guardpost_server::telemetry;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "panic-button", about = "Raise an emergency alert from a site link")]
struct Args {
    /// Emergency link token of the site.
    token: String,

    /// danger or contact.
    #[arg(long = "type", default_value = "danger")]
    kind: AlertKind,

    #[arg(long, env = "GUARDPOST_URL", default_value = "http://localhost:8000")]
    server: String,

    /// Fixed position of this device, if known.
    #[arg(long, allow_negative_numbers = true, requires = "lng")]
    lat: Option<f64>,

    #[arg(long, allow_negative_numbers = true, requires = "lat")]
    lng: Option<f64>,

    #[arg(long, env = "PORTAL_GEOLOCATION_TIMEOUT_MS", default_value_t = DEFAULT_GEOLOCATION_TIMEOUT_MS)]
    geolocation_timeout_ms: u64,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    telemetry::init_with_default_filter("guardpost-panic-button", "info");

    let geolocator: Arc<dyn Geolocator> = match (args.lat, args.lng) {
        (Some(lat), Some(lng)) => match Coordinates::new(lat, lng) {
            Ok(here) => Arc::new(FixedLocation(here)),
            Err(e) => {
                eprintln!("{}", e);
                return ExitCode::FAILURE;
            }
        },
        _ => Arc::new(NoLocation),
    };

    let backend = match HttpPortalBackend::new(&args.server) {
        Ok(backend) => backend,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let session = PortalSession::open(
        Arc::new(backend),
        geolocator,
        args.token,
        Duration::from_millis(args.geolocation_timeout_ms),
    )
    .await;

    let Some(site) = session.site() else {
        eprintln!("Invalid emergency link");
        return ExitCode::FAILURE;
    };
    println!(
        "{} ({})",
        site.site_name.as_deref().unwrap_or("Unnamed site"),
        site.contact_name.as_deref().unwrap_or("no contact")
    );

    match session.trigger(args.kind).await {
        Ok(()) => {
            println!("Emergency alert sent. Help is on the way.");
            ExitCode::SUCCESS
        }
        Err(TriggerError::Submit(e)) => {
            eprintln!("Failed to send emergency alert: {}", e);
            println!("Call one of these numbers:");
            for number in &site.emergency_numbers {
                println!("  {:<20} {}", number.name, number.number);
            }
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}
