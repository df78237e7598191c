/********************************************************************************
 * Copyright (c) 2024 Contributors to the Eclipse Foundation
 *
 * See the NOTICE file(s) distributed with this work for additional
 * information regarding copyright ownership.
 *
 * This program and the accompanying materials are made available under the
 * terms of the Apache License Version 2.0 which is available at
 * https://www.apache.org/licenses/LICENSE-2.0
 *
 * SPDX-License-Identifier: Apache-2.0
 ********************************************************************************/

mod config;
mod loopback;

use crate::config::LoopbackConfig;
use crate::loopback::{LoggingDriver, LoopbackLink, LoopbackRouter};
use clap::Parser;
use qrtr_bridge::{DriverRegistration, DriverRegistry, QrtrBridge};
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "qrtr-loopback")]
#[command(about = "Runs a QRTR bridge against an in-process loopback link and router")]
struct Cli {
    /// JSON5 configuration file; built-in defaults are used when omitted.
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// tracing filter directive, overridden by RUST_LOG when set.
    #[arg(long, default_value = "info")]
    log_filter: String,
}

fn setup_tracing(filter: &str) -> Result<(), Box<dyn Error + Send + Sync>> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(filter)?,
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()?;
    Ok(())
}

async fn run(config: LoopbackConfig) -> Result<(), Box<dyn Error>> {
    let drivers = Arc::new(DriverRegistry::new());
    for driver in &config.drivers {
        drivers
            .register(DriverRegistration::new(
                &driver.name,
                driver.id_table(),
                Arc::new(LoggingDriver::new(&driver.name, driver.fail_probe)),
            ))
            .await;
    }

    let link = Arc::new(LoopbackLink::default());
    let router = Arc::new(LoopbackRouter::default());
    let bridge = QrtrBridge::probe(&config.bridge, link.clone(), router.clone(), drivers).await?;

    for service in &config.services {
        router.announce(service.node, service.port, service.service, service.instance);
    }
    bridge.flush().await?;

    for handle in bridge.registry().find_all_matching(|_| true) {
        info!(
            handle = %handle.name(),
            modalias = %handle.modalias(),
            driver = ?handle.bound_driver(),
            "service handle"
        );
    }

    for message in &config.messages {
        router.deliver(message.as_bytes()).await?;
        link.pump(&bridge);
    }

    if let Some(first) = config.services.first() {
        router.withdraw(first.port);
        bridge.flush().await?;
    }

    bridge.remove().await;
    info!(
        bridge = %bridge.name(),
        ingested = router.ingested(),
        "loopback finished"
    );
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(err) = setup_tracing(&cli.log_filter) {
        eprintln!("qrtr-loopback: unable to set up logging: {err}");
        return ExitCode::from(2);
    }

    let config = match cli.config.as_deref().map(LoopbackConfig::load) {
        Some(Ok(config)) => config,
        Some(Err(err)) => {
            error!(err = %err, "unable to load configuration");
            return ExitCode::from(2);
        }
        None => LoopbackConfig::default(),
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            error!(err = %err, "unable to build runtime");
            return ExitCode::from(2);
        }
    };

    match runtime.block_on(run(config)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(err = %err, "loopback failed");
            ExitCode::from(1)
        }
    }
}
