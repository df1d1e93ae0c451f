use clap::Parser;
use door_relay::config::{self, Config};
use door_relay::http;
use door_relay::input::mqtt::DoorIngest;
use door_relay::input::simulation::run_door_simulation;
use door_relay::relay::Dispatcher;
use door_relay::state::StateStore;
use log::{error, info};
use std::net::IpAddr;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "door-relay")]
#[command(about = "Relay MQTT door sensor events to web clients")]
struct Cli {
    /// Address to bind the HTTP server to
    #[arg(long, env = "HTTP_HOST")]
    host: Option<IpAddr>,

    /// HTTP port
    #[arg(long, env = "HTTP_PORT")]
    port: Option<u16>,

    /// MQTT broker host
    #[arg(long, env = "MQTT_BROKER_HOST")]
    broker_host: Option<String>,

    /// MQTT broker port
    #[arg(long, env = "MQTT_BROKER_PORT")]
    broker_port: Option<u16>,

    /// Door sensor topic
    #[arg(long, env = "MQTT_TOPIC")]
    topic: Option<String>,

    /// Toggle the door every N seconds instead of waiting for a sensor
    #[arg(long, env = "SIMULATE_INTERVAL_SECS")]
    simulate_secs: Option<u64>,
}

impl Cli {
    fn apply(self, config: &mut Config) {
        if let Some(host) = self.host {
            config.http.host = host;
        }
        if let Some(port) = self.port {
            config.http.port = port;
        }
        if let Some(host) = self.broker_host {
            config.mqtt.broker_host = host;
        }
        if let Some(port) = self.broker_port {
            config.mqtt.broker_port = port;
        }
        if let Some(topic) = self.topic {
            config.mqtt.topic = topic;
        }
        if let Some(secs) = self.simulate_secs {
            config.simulation.interval_secs = Some(secs);
        }
    }
}

fn init_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}

#[tokio::main]
async fn main() {
    config::load_dotenv();
    init_logger();
    info!("Starting door relay");

    let mut config = Config::from_env();
    Cli::parse().apply(&mut config);
    info!("Configuration loaded:");
    info!("  MQTT Broker: {}:{}", config.mqtt.broker_host, config.mqtt.broker_port);
    info!("  Topic: {}", config.mqtt.topic);
    info!("  HTTP: {}", config.http.bind_addr());

    let shutdown = CancellationToken::new();
    let dispatcher = Arc::new(Dispatcher::new(StateStore::new(), config.http.stream_buffer));

    let ingest = DoorIngest::new(config.mqtt.topic.clone(), dispatcher.clone())
        .start(config.mqtt.clone(), shutdown.clone());

    let simulation = config.simulation.interval().map(|period| {
        info!("[Sim] Toggling door every {:?}", period);
        run_door_simulation(dispatcher.clone(), period, shutdown.clone())
    });

    let http_config = config.http.clone();
    let http_dispatcher = dispatcher.clone();
    let http_shutdown = shutdown.clone();
    let mut server = tokio::spawn(async move {
        http::serve(&http_config, http_dispatcher, http_shutdown).await
    });

    // Wait for shutdown signal or an early server exit
    tokio::select! {
        result = signal::ctrl_c() => match result {
            Ok(()) => info!("Received shutdown signal"),
            Err(e) => error!("Failed to listen for shutdown signal: {}", e),
        },
        result = &mut server => {
            match result {
                Ok(Ok(())) => info!("HTTP server exited"),
                Ok(Err(e)) => error!("HTTP server error: {}", e),
                Err(e) => error!("HTTP server task failed: {}", e),
            }
            shutdown.cancel();
            ingest.abort();
            std::process::exit(1);
        }
    }

    info!("Shutting down gracefully...");
    shutdown.cancel();

    if let Ok(Err(e)) = server.await {
        error!("HTTP server error during shutdown: {}", e);
    }
    let _ = ingest.await;
    if let Some(simulation) = simulation {
        let _ = simulation.await;
    }

    info!("Door relay stopped");
}
