use mental_poker::bots::CautiousBot;
use mental_poker::config::GameConfig;
use mental_poker::message::{Envelope, GameId, PeerId};
use mental_poker::protocols::cheat::MoveSource;
use mental_poker::registry::{GameFactory, GameRegistry, CHEAT, RANDOM_NUMBER};
use mental_poker::runner::RunnerStatus;

use anyhow::{anyhow, Result};
use tracing_subscriber::EnvFilter;

type Curve = ark_bn254::G1Projective;

const PLAYERS: [&str; 3] = ["andrija", "kobi", "nico"];

/// Stands in for the transport: every envelope goes through JSON to every
/// registry, the sender included.
fn broadcast(registries: &mut [GameRegistry<Curve>], envelopes: Vec<Envelope>) -> Result<()> {
    for envelope in envelopes {
        let wire = envelope.to_json()?;
        for registry in registries.iter_mut() {
            registry.handle(Envelope::from_json(&wire)?)?;
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => GameConfig::from_json_str(&std::fs::read_to_string(path)?)?,
        None => GameConfig {
            salt_length: 32,
            max_challenges: 20,
            ..GameConfig::default()
        },
    };

    // SET UP THE TABLE --------------
    let participants: Vec<PeerId> = PLAYERS.iter().map(|p| PeerId::from(*p)).collect();
    let mut registries = PLAYERS
        .iter()
        .map(|name| {
            let factory = GameFactory::<Curve>::new(config.clone(), |_: &PeerId| {
                Box::new(CautiousBot::new(36)) as Box<dyn MoveSource>
            })?;
            Ok(GameRegistry::new(PeerId::from(*name), factory))
        })
        .collect::<Result<Vec<_>>>()?;

    // Andrija opens a coin toss and a game of cheat at the same time.
    let coin = GameId::from("coin");
    let cheat = GameId::from("cheat-1");
    let opening = vec![
        registries[0].open(coin.clone(), RANDOM_NUMBER, participants.clone()),
        registries[0].open(cheat.clone(), CHEAT, participants),
    ];
    broadcast(&mut registries, opening)?;

    // PLAY --------------
    let mut rounds = 0;
    while !registries.iter().all(GameRegistry::is_idle) {
        if rounds == config.max_rounds {
            return Err(anyhow!("games still running after {} rounds", rounds));
        }
        let outgoing = registries
            .iter_mut()
            .flat_map(|r| r.step_all())
            .collect::<Vec<_>>();
        broadcast(&mut registries, outgoing)?;
        rounds += 1;
    }

    // RESULTS --------------
    println!("Finished after {} rounds", rounds);
    for registry in registries.iter_mut() {
        for (game, status) in registry.remove_finished() {
            let verdict = match status {
                RunnerStatus::Finished(message) => message,
                RunnerStatus::Aborted(reason) => format!("aborted: {}", reason),
                RunnerStatus::Cancelled => "cancelled".to_string(),
                RunnerStatus::Running => "still running".to_string(),
            };
            println!("{:<8} {:<8} {}", registry.me().0, game.0, verdict);
        }
    }

    Ok(())
}
