use subbrawl_core::events::SimEvent;
use subbrawl_server::{settings, Audience, SimServer, StreamRecord};
use subbrawl_sim::SimConfig;

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json = matches!(std::env::var("LOG_FORMAT").as_deref(), Ok("json"));
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .json()
            .with_current_span(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .init();
    }

    std::panic::set_hook(Box::new(|info| {
        let backtrace = std::backtrace::Backtrace::capture();
        tracing::error!(%info, ?backtrace, "panic");
    }));
}

#[tokio::main]
async fn main() {
    // Load .env locally; safe to ignore when not present.
    let _ = dotenvy::dotenv();
    init_tracing();

    let game = match settings::load_game_config() {
        Ok(game) => game,
        Err(e) => {
            tracing::error!(error = %e, "failed to load game config");
            return;
        }
    };
    let config = SimConfig {
        seed: settings::seed(),
        game,
    };

    let server = match SimServer::start(config, settings::queue_capacity()) {
        Ok(server) => server,
        Err(e) => {
            tracing::error!(error = %e, "failed to start simulation");
            return;
        }
    };

    // Observer stream: log combat outcomes as they happen.
    let mut observer = server.handle().subscribe(Audience::Observer);
    tokio::spawn(async move {
        while let Some(record) = observer.recv().await {
            let StreamRecord::Event(envelope) = record.as_ref() else {
                continue;
            };
            match &envelope.event {
                SimEvent::Explosion {
                    torpedo_id,
                    victims,
                    ..
                } => {
                    tracing::info!(tick = envelope.tick, %torpedo_id, victims = victims.len(), "explosion");
                }
                SimEvent::SubmarineLost { sub_id, cause } => {
                    tracing::info!(tick = envelope.tick, %sub_id, ?cause, "submarine lost");
                }
                _ => {}
            }
        }
        if observer.dropped() > 0 {
            tracing::warn!(dropped = observer.dropped(), "observer stream fell behind");
        }
    });

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
    tracing::info!("shutting down");

    match tokio::task::spawn_blocking(move || server.shutdown()).await {
        Ok(stats) => tracing::info!(?stats, "simulation stopped"),
        Err(e) => tracing::error!(error = %e, "shutdown task failed"),
    }
}
