use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use futures::StreamExt;
use popi_guidance::directions::StraightLineDirections;
use popi_guidance::geolocation::{SimulatedGeolocation, Walk};
use popi_guidance::places::InMemoryPlaces;
use popi_guidance::state_machine::navigation::output::NavigationEvent;
use popi_guidance::store::JsonFileStore;
use popi_guidance::{
    Coordinate, EngineConfig, Navigator, NavigatorConfig, PointOfInterest, Sources, Timestamp,
    TravelMode,
};
use tokio::time::interval;
use tracing::{debug, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let state_path =
        std::env::var("POPI_STATE_PATH").unwrap_or_else(|_| "popi-last-position.json".to_string());
    let mode: TravelMode = match std::env::var("POPI_TRAVEL_MODE") {
        Ok(mode) => mode.parse()?,
        Err(_) => TravelMode::Walking,
    };
    let seed: u64 = match std::env::var("POPI_SEED") {
        Ok(seed) => seed.parse()?,
        Err(_) => 7,
    };
    let tick = match std::env::var("POPI_TICK_MS") {
        Ok(ms) => Duration::from_millis(ms.parse()?),
        Err(_) => Duration::from_millis(100),
    };

    let config = NavigatorConfig::builder()
        .engine(EngineConfig::default())
        .build();
    let origin = config.engine.default_center;
    let destination = Coordinate::new(20.6622, -103.3478)?;

    let mut cafe = PointOfInterest::new(1u64, destination, "Cafe Luna");
    cafe.address = "Av. Chapultepec 120".to_string();
    let places = vec![
        cafe,
        PointOfInterest::new(2u64, Coordinate::new(20.6570, -103.3530)?, "Hotel Sol"),
    ];

    let geolocation = Arc::new(SimulatedGeolocation::new());
    let sources = Sources {
        geolocation: Arc::clone(&geolocation),
        directions: Arc::new(StraightLineDirections::default()),
        places: Arc::new(InMemoryPlaces::new(places)),
        store: Arc::new(JsonFileStore::new(&state_path)),
    };

    info!(
        state_path = %state_path,
        %mode,
        seed,
        "Simulating a walk to Cafe Luna"
    );

    let (mut navigator, handle, mut events) = Navigator::new(config, sources, seed);
    navigator.start().await?;
    handle.set_travel_mode(mode)?;

    let speed_mps = match mode {
        TravelMode::Walking => 1.4,
        TravelMode::Driving => 11.0,
    };
    let walker = handle.clone();
    tokio::spawn(async move {
        let walk = Walk::builder()
            .path(vec![origin, destination])
            .speed_mps(speed_mps)
            .accuracy_m(12.0)
            .start(Timestamp::now())
            .build();
        let mut samples = pin!(walk.samples());
        let mut ticker = interval(tick);
        while let Some(sample) = samples.next().await {
            ticker.tick().await;
            geolocation.push(Ok(sample));
        }

        // Linger at the door so the arrival flow plays out.
        tokio::time::sleep(tick * 10).await;
        if walker.shutdown().is_err() {
            warn!("Navigator already gone");
        }
    });

    let selector = handle.clone();
    tokio::spawn(async move {
        let mut selected = false;
        while let Some(event) = events.recv().await {
            log_event(&event);
            if let NavigationEvent::PlacesChanged(places) = &event
                && !selected
                && let Some(place) = places.iter().find(|p| p.coordinate == destination)
            {
                selected = selector.select_place(place.id.clone()).is_ok();
            }
        }
    });

    navigator.run().await?;
    info!("Simulation finished");
    Ok(())
}

fn log_event(event: &NavigationEvent) {
    match event {
        NavigationEvent::PositionChanged(position) => info!(
            lat = position.coordinate.latitude(),
            lon = position.coordinate.longitude(),
            accuracy_m = ?position.accuracy_m,
            speed_kmh = ?position.speed_kmh(),
            "Position"
        ),
        NavigationEvent::GuidanceChanged(Some(guidance)) => info!(
            text = %guidance.text,
            secondary = ?guidance.secondary,
            eta_min = ?guidance.eta_min,
            "Guidance"
        ),
        NavigationEvent::AlertChanged(Some(alert)) => info!(
            place = %alert.place.name,
            distance_m = alert.distance_m,
            "Nearby"
        ),
        NavigationEvent::AccessCodeShown(code) => {
            info!(place_id = %code.place_id, code = %code, "Arrived, access code issued")
        }
        NavigationEvent::RouteChanged(Some(summary)) => info!(
            distance_m = summary.distance_m,
            duration = ?summary.duration_text,
            "Route ready"
        ),
        NavigationEvent::SelectionChanged(Some(place)) => info!(place = %place.name, "Selected"),
        NavigationEvent::StatusChanged(Some(status)) => warn!(%status, "Status"),
        other => debug!(event = ?other, "Navigation event"),
    }
}
