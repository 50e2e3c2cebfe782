// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CRS agent process.
//!
//! Connects to the native host's command socket, registers for runtime
//! callbacks, authenticates with the CRS cloud service, and pumps
//! observations through the pipeline until a shutdown signal drains it.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use std::sync::Arc;
use std::time::Duration;

use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info, warn};

use crs_agent::host::{HostClient, HostConnection};
use crs_agent::jfr::{ChunkRepository, JfrMonitor};
use crs_agent::lifecycle::LifecycleController;
use crs_agent::monitors::{
    ClassLoadMonitor, ClassSourceObserver, CrsLogMonitor, FirstCallMonitor, JarLoadMonitor,
    VmLogMonitor,
};
use crs_agent::services::server_requests::ServerRequestListener;
use crs_agent::{env, logging};
use crs_analyzer::JarAnalyzer;
use crs_core::{
    filter_inventory, ArtifactIdAllocator, Clock, Options, PerformanceMetrics, SystemClock,
    VmInstance, VmState,
};
use crs_wire::{HostCommand, HostEventType, HostNotification};

/// Startup budget for the main-method probe.
const MAIN_METHOD_BUDGET: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if let Some(arg) = args.first() {
        match arg.as_str() {
            "--version" | "-V" | "-v" => {
                println!("crs-agent {}", env::agent_version_string());
                return Ok(());
            }
            "--help" | "-h" | "help" => {
                println!("crs-agent {}", env::agent_version_string());
                println!("CRS telemetry agent - streams runtime observations to the CRS service");
                println!();
                println!("USAGE:");
                println!("    crs-agent [key=value]...");
                println!();
                println!("The agent is typically launched by the managed runtime's native");
                println!("host. Options may also be supplied through AZ_CRS_ARGUMENTS.");
                return Ok(());
            }
            _ => {}
        }
    }

    let options = match Options::parse(env::option_tokens(args.into_iter())) {
        Ok(options) => options,
        Err(e) => {
            eprintln!("[CRS.error] {e}");
            std::process::exit(1);
        }
    };

    let log_dir = options
        .file_system_buffer_location
        .clone()
        .unwrap_or_else(|| std::env::temp_dir().join("crs-agent"));
    let (_log_guard, log_path) = logging::init(&options, &log_dir)?;
    for key in &options.unknown {
        warn!(key = %key, "unrecognized option ignored");
    }

    let metrics = Arc::new(PerformanceMetrics::new());
    let controller = Arc::new(LifecycleController::new(&options, Arc::clone(&metrics))?);

    // Host adapter, when the native host offered a socket.
    let host = match (env::host_socket(), env::host_secret()) {
        (Some(path), Some(secret)) => match HostClient::connect(&path, &secret).await {
            Ok(connection) => Some(connection),
            Err(e) => {
                error!("[CRS.error] host connection failed: {e}");
                return Err(e.into());
            }
        },
        _ => {
            info!("no host socket configured, running without runtime callbacks");
            None
        }
    };

    // Startup gate: wait for the application's main method.
    if let Some(connection) = &host {
        if controller.wait_for_main_method(&connection.client, MAIN_METHOD_BUDGET).await.is_none()
        {
            info!("main method probe inconclusive, starting anyway");
        }
    }

    if let Err(e) = controller.start().await {
        error!("[CRS.error] agent disabled: {e}");
        return Err(e.into());
    }
    let vm_id = controller.connection().vm_id().unwrap_or_default();
    let clock = SystemClock;
    let artifact_ids = Arc::new(ArtifactIdAllocator::new());

    // Register the instance record: filtered environment inventory and
    // the RUNNING state, patched over the registration.
    let mut instance =
        VmInstance::new(env::AGENT_VERSION, env::AGENT_REVISION, clock.epoch_ms());
    instance.vm_id = Some(vm_id.clone());
    instance.state = VmState::Running;
    instance.inventory = filter_inventory(
        std::env::vars().map(|(k, v)| (k, serde_json::Value::from(v))).collect(),
        &options.environment_filter,
    );
    match serde_json::to_value(&instance) {
        Ok(patch) => {
            if let Err(e) = controller.connection().patch_instance(&patch).await {
                warn!(error = %e, "instance patch failed");
            }
        }
        Err(e) => warn!(error = %e, "instance serialization failed"),
    }

    // Producers. Temp files for nested jars are retained because the
    // server-request service is running.
    let analyzer = Arc::new(match options.file_system_buffer_size {
        Some(page_size) => JarAnalyzer::with_page_size(true, page_size),
        None => JarAnalyzer::new(true),
    });
    let jar_monitor = Arc::new(JarLoadMonitor::new(
        analyzer,
        controller.events(),
        controller.uploads(),
        Some(controller.server_requests().codec()),
        Arc::clone(&artifact_ids),
        vm_id.clone(),
        clock.clone(),
        controller.shutdown_signal(),
    ));
    controller
        .server_requests()
        .register_listener(Arc::clone(&jar_monitor) as Arc<dyn ServerRequestListener>);

    let class_monitor = Arc::new(ClassLoadMonitor::new(
        controller.events(),
        Arc::clone(&jar_monitor) as Arc<dyn ClassSourceObserver>,
        vm_id.clone(),
        clock.clone(),
    ));
    let first_call_monitor =
        Arc::new(FirstCallMonitor::new(controller.events(), vm_id.clone(), clock.clone()));
    let vm_log_monitor = Arc::new(VmLogMonitor::new(
        controller.events(),
        controller.uploads(),
        &artifact_ids,
        vm_id.clone(),
        clock.clone(),
    ));
    let crs_log_monitor = Arc::new(CrsLogMonitor::new(
        controller.uploads(),
        &artifact_ids,
        log_path,
        &clock,
    ));

    // Register for runtime callbacks.
    if let Some(connection) = &host {
        let client = &connection.client;
        client
            .expect_ok(HostCommand::RegisterAgent {
                class_name: format!("crs-agent/{}", env::agent_version_string()),
            })
            .await?;
        let capabilities = client.get_capabilities().await.unwrap_or_default();
        info!(?capabilities, "host capabilities");
        for event_type in [
            HostEventType::ClassLoad,
            HostEventType::FirstCall,
            HostEventType::ToJavaCall,
            HostEventType::VmLogEntry,
        ] {
            client
                .expect_ok(HostCommand::EnableEventNotifications { event_type, enabled: true })
                .await?;
        }
    }

    let jfr_backup_dir = options
        .backup_jfr_chunks
        .then(|| options.file_system_buffer_location.clone().unwrap_or_else(|| log_dir.clone()));
    let jfr_monitor = host.as_ref().map(|connection| {
        JfrMonitor::with_backup_dir(
            controller.uploads(),
            Arc::clone(&connection.client) as Arc<dyn ChunkRepository>,
            Arc::clone(&artifact_ids),
            jfr_backup_dir.clone(),
        )
    });

    // Route host notifications to the producers until shutdown.
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    let router = host.map(|connection| {
        let HostConnection { client: _, notifications, pump: _ } = connection;
        tokio::spawn(route_notifications(
            notifications,
            Arc::clone(&controller),
            Arc::clone(&class_monitor),
            Arc::clone(&first_call_monitor),
            Arc::clone(&vm_log_monitor),
            jfr_monitor.clone(),
        ))
    });

    // The router ends when the host closes the socket or asks for
    // shutdown; signals end the agent from outside.
    tokio::select! {
        _ = sigterm.recv() => info!("SIGTERM received"),
        _ = sigint.recv() => info!("SIGINT received"),
        _ = async move {
            match router {
                Some(router) => {
                    let _ = router.await;
                }
                None => std::future::pending::<()>().await,
            }
        } => info!("host routing finished"),
    }

    if let Some(jfr) = &jfr_monitor {
        jfr.stop_accepting();
    }
    vm_log_monitor.flush_tail();
    crs_log_monitor.flush();
    let drained = controller.shutdown().await;
    jar_monitor.release_all();
    if !drained {
        warn!("terminated with undelivered work");
    }
    info!(counters = ?metrics.snapshot(), "final pipeline counters");
    Ok(())
}

/// Dispatch host notifications to the producers. Blocking analysis work
/// is pushed onto the blocking pool so the pump never stalls.
async fn route_notifications(
    mut notifications: tokio::sync::mpsc::Receiver<HostNotification>,
    controller: Arc<LifecycleController>,
    class_monitor: Arc<ClassLoadMonitor<SystemClock>>,
    first_call_monitor: Arc<FirstCallMonitor<SystemClock>>,
    vm_log_monitor: Arc<VmLogMonitor<SystemClock>>,
    jfr_monitor: Option<Arc<JfrMonitor>>,
) {
    while let Some(notification) = notifications.recv().await {
        match notification {
            HostNotification::ClassLoad { class_name, loader_name, source_url } => {
                let monitor = Arc::clone(&class_monitor);
                tokio::task::spawn_blocking(move || {
                    monitor.on_class_load(
                        &class_name,
                        loader_name.as_deref(),
                        source_url.as_deref(),
                    );
                });
            }
            HostNotification::FirstCall { class_name, method_name } => {
                first_call_monitor.on_first_call(&class_name, &method_name);
            }
            HostNotification::ToJavaCall { name } => {
                first_call_monitor.on_to_java_call(&name);
            }
            HostNotification::VmLogEntry { level, message } => {
                vm_log_monitor.on_log_entry(&level, &message);
            }
            HostNotification::JfrChunk { path, start_time_ms, end_time_ms, size, recording_id } => {
                if let Some(jfr) = &jfr_monitor {
                    jfr.next_chunk(&path, start_time_ms, end_time_ms, size, recording_id).await;
                }
            }
            HostNotification::JfrRecordingStarted { recording_id } => {
                if let Some(jfr) = &jfr_monitor {
                    jfr.recording_started(recording_id);
                }
            }
            HostNotification::JfrRecordingStopped { recording_id } => {
                if let Some(jfr) = &jfr_monitor {
                    jfr.recording_stopped(recording_id);
                }
            }
            HostNotification::MainMethodEntered { name } => {
                info!(name = %name, "main method entered");
            }
            HostNotification::DisableCrs => {
                warn!("host disabled CRS");
                break;
            }
            HostNotification::DrainQueues { force, stop_after_drain } => {
                info!(force, stop_after_drain, "host requested drain");
                if stop_after_drain {
                    break;
                }
                controller.events().wait_all_events_processed(
                    crs_core::Deadline::after(&SystemClock, Duration::from_secs(10)),
                ).await;
                controller.uploads().sync().await;
            }
        }
    }
}
