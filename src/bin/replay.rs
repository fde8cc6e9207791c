use std::collections::VecDeque;
use std::io::{BufRead, BufReader};

use anyhow::{Context, Result, anyhow};
use popi_guidance::directions::StraightLineDirections;
use popi_guidance::places::{InMemoryPlaces, PlacesResponse};
use popi_guidance::state_machine::navigation::input::NavigationInput;
use popi_guidance::state_machine::navigation::output::{Effect, NavigationOutput};
use popi_guidance::state_machine::wrappers::input::SystemInput;
use popi_guidance::{
    EngineConfig, NavigationMachine, PlaceId, PositionSample, StateMachine, Timestamp, TravelMode,
};
use tracing::{debug, info};

/// Performs the machine's effects synchronously against offline services so a replay is
/// reproducible run to run.
struct OfflineWorld {
    directions: StraightLineDirections,
    places: InMemoryPlaces,
    /// Selected as soon as a listing contains it.
    select: Option<PlaceId>,
}

impl OfflineWorld {
    fn resolve(&mut self, effect: Effect) -> Vec<NavigationInput> {
        match effect {
            Effect::FetchRoute {
                request,
                origin,
                destination,
                mode,
            } => vec![NavigationInput::RouteResolved {
                request,
                result: self.directions.route_between(origin, destination, mode),
            }],
            Effect::FetchPlaces {
                request,
                center,
                radius_km,
            } => {
                let places = self.places.nearby(&center, radius_km);
                let listed = self
                    .select
                    .as_ref()
                    .is_some_and(|id| places.iter().any(|p| &p.id == id));

                let mut inputs = vec![NavigationInput::PlacesResolved {
                    request,
                    result: Ok(places),
                }];
                if let Some(id) = self.select.take_if(|_| listed) {
                    inputs.push(NavigationInput::SelectPlace(id));
                }
                inputs
            }
            Effect::RequestFix(purpose) => {
                debug!(?purpose, "One-shot fixes are not replayed");
                Vec::new()
            }
            Effect::PersistPosition(_) => Vec::new(),
        }
    }
}

fn drive(
    machine: &mut NavigationMachine,
    world: &mut OfflineWorld,
    now: Timestamp,
    input: NavigationInput,
) {
    let mut queue = VecDeque::from([input]);
    while let Some(input) = queue.pop_front() {
        machine.process_input(SystemInput::System(now));
        machine.process_input(SystemInput::Input(input));
        while let Some(output) = machine.poll_output() {
            match output {
                NavigationOutput::Event(event) => println!("{now} {event:?}"),
                NavigationOutput::Effect(effect) => queue.extend(world.resolve(effect)),
            }
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let samples_path = std::env::args()
        .nth(1)
        .ok_or_else(|| anyhow!("usage: popi-replay <samples.jsonl>"))?;
    let mode: TravelMode = match std::env::var("POPI_TRAVEL_MODE") {
        Ok(mode) => mode.parse()?,
        Err(_) => TravelMode::Walking,
    };
    let seed: u64 = match std::env::var("POPI_SEED") {
        Ok(seed) => seed.parse()?,
        Err(_) => 7,
    };

    let places = match std::env::var("POPI_PLACES_PATH") {
        Ok(path) => {
            let bytes = std::fs::read(&path).with_context(|| format!("reading {path}"))?;
            PlacesResponse::from_slice(&bytes)?.into_places()?
        }
        Err(_) => Vec::new(),
    };
    info!(
        samples = %samples_path,
        places = places.len(),
        %mode,
        seed,
        "Replaying recorded samples"
    );

    let mut world = OfflineWorld {
        directions: StraightLineDirections::default(),
        places: InMemoryPlaces::new(places),
        select: std::env::var("POPI_SELECT").ok().map(PlaceId::from),
    };
    let mut machine = NavigationMachine::new(EngineConfig::default(), seed);

    let file =
        std::fs::File::open(&samples_path).with_context(|| format!("opening {samples_path}"))?;
    let mut started = false;
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let sample: PositionSample = serde_json::from_str(&line)
            .with_context(|| format!("{samples_path}:{}", index + 1))?;
        let now = sample.captured_at;

        if !started {
            started = true;
            drive(&mut machine, &mut world, now, NavigationInput::SetTravelMode(mode));
            drive(&mut machine, &mut world, now, NavigationInput::Started);
        }
        drive(&mut machine, &mut world, now, NavigationInput::Sample(sample));
    }

    info!(
        position = ?machine.position().map(|p| p.coordinate),
        selected = ?machine.selected().map(|p| p.id.clone()),
        "Replay finished"
    );
    Ok(())
}
