// EnigmaIOT Bridge - MQTT output adapter runner
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! # EnigmaIOT Bridge
//!
//! Runs the MQTT output adapter against a real broker. Node events are read
//! from stdin (one JSON object per line), downlink commands are printed to
//! stdout.
//!
//! ## Usage
//!
//! ```bash
//! # Store broker settings in mqtt.json
//! enigmaiot-bridge provision --server broker.lan --user gw --pass secret
//!
//! # Run with the stored settings
//! enigmaiot-bridge --network eiot < events.jsonl
//!
//! # TLS with a pinned CA
//! enigmaiot-bridge --host broker.example.org --ca isrg-root-x1.pem
//! ```

mod feed;

use clap::{Parser, Subcommand};
use enigmaiot::MacAddress;
use enigmaiot_gateway::{
    BrokerConfig, Downlink, GatewayConfig, GatewayOutput, MemoryPortal, MqttOutput, RumqttLink,
    TlsConfig,
};
use feed::{downlink_line, NodeEvent};
use std::io::BufRead;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::mpsc::{self, TryRecvError};
use std::thread;
use std::time::Duration;
use tracing::{error, info, warn, Level};
use tracing_subscriber::EnvFilter;

/// EnigmaIOT MQTT gateway bridge
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// EnigmaIOT network name (topic root)
    #[arg(short, long, default_value = "EnigmaIOT")]
    network: String,

    /// Gateway MAC address, used as MQTT client id
    #[arg(short, long, default_value = "02:00:00:00:00:01")]
    gateway: MacAddress,

    /// Broker host; read from the config file when omitted
    #[arg(long)]
    host: Option<String>,

    /// Broker port (1883, or 8883 with --ca)
    #[arg(short, long)]
    port: Option<u16>,

    /// Broker user name
    #[arg(short, long, default_value = "")]
    user: String,

    /// Broker password
    #[arg(long, default_value = "")]
    pass: String,

    /// Persisted broker config
    #[arg(short, long, default_value = "mqtt.json")]
    config: PathBuf,

    /// Pinned CA certificate (PEM); enables TLS
    #[arg(long)]
    ca: Option<PathBuf>,

    /// SNTP server used before TLS connects
    #[arg(long, default_value = "pool.ntp.org")]
    ntp_server: String,

    /// Pump interval in milliseconds
    #[arg(long, default_value = "20")]
    tick_ms: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Save broker settings to the config file
    Provision {
        /// Broker host
        #[arg(long)]
        server: String,

        /// Broker port
        #[arg(long, default_value = "1883")]
        port: u16,

        /// Broker user name
        #[arg(long, default_value = "")]
        user: String,

        /// Broker password
        #[arg(long, default_value = "")]
        pass: String,
    },
}

fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = match log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        };
        EnvFilter::from_default_env().add_directive(level.into())
    });

    // Also captures `log` records from the library crates
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn gateway_config(args: &Args) -> GatewayConfig {
    let mut config =
        GatewayConfig::new(args.network.clone(), args.gateway).with_config_path(&args.config);

    if let Some(ca) = &args.ca {
        config = config.with_tls(
            TlsConfig::new()
                .with_ca(ca)
                .with_ntp_server(&args.ntp_server),
        );
    }
    if let Some(host) = &args.host {
        let port = args
            .port
            .unwrap_or_else(|| BrokerConfig::default_port(config.tls_enabled()));
        config = config.with_broker(
            BrokerConfig::new(host.clone(), port).with_credentials(&args.user, &args.pass),
        );
    }
    config
}

fn provision(args: &Args, server: &str, port: u16, user: &str, pass: &str) -> ExitCode {
    let mut output = MqttOutput::new(gateway_config(args), RumqttLink::new());
    let mut portal = MemoryPortal::new();

    output.config_manager_start(&mut portal);
    portal.set_value("mqtt_server", server);
    portal.set_value("mqtt_port", port.to_string());
    portal.set_value("mqtt_user", user);
    portal.set_value("mqtt_pass", pass);

    match output.config_manager_exit(true, &portal) {
        Ok(()) => {
            info!("Broker settings saved to {}", args.config.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Provisioning failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> ExitCode {
    let mut output = MqttOutput::new(gateway_config(args), RumqttLink::new());
    output.set_downlink_callback(Box::new(|downlink: &Downlink| {
        println!("{}", downlink_line(downlink))
    }));

    if let Err(e) = output.begin() {
        error!("Failed to start MQTT output: {}", e);
        return ExitCode::FAILURE;
    }

    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            match line {
                Ok(line) if line.trim().is_empty() => continue,
                Ok(line) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!("stdin read failed: {}", e);
                    break;
                }
            }
        }
    });

    let tick = Duration::from_millis(args.tick_ms.max(1));
    loop {
        loop {
            match rx.try_recv() {
                Ok(line) => {
                    let result = NodeEvent::parse(&line).and_then(|event| event.apply(&mut output));
                    if let Err(e) = result {
                        warn!("Skipping node event: {}", e);
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    info!("Node feed closed, shutting down");
                    if let Err(e) = output.end() {
                        warn!("Shutdown: {}", e);
                    }
                    let stats = output.stats();
                    info!(
                        "Published {} records, {} refused, {} downlinks",
                        stats.published, stats.enqueue_failures, stats.downlinks
                    );
                    return ExitCode::SUCCESS;
                }
            }
        }

        output.tick();
        thread::sleep(tick);
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(&args.log_level);

    info!("EnigmaIOT Bridge v{}", env!("CARGO_PKG_VERSION"));

    match &args.command {
        Some(Command::Provision {
            server,
            port,
            user,
            pass,
        }) => provision(&args, server, *port, user, pass),
        None => run(&args),
    }
}
