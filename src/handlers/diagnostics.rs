use crate::{models::DiagnosticsResponse, ws::AppState};
use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;
use std::sync::{Mutex, OnceLock};
use sysinfo::System;
use tracing::info;

static SYSTEM_MONITOR: OnceLock<Mutex<System>> = OnceLock::new();

/// Live relay counts plus host CPU and memory
pub async fn diagnostics(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<DiagnosticsResponse>) {

    let n_conn = state.registry.len().await as u32;
    let stats = state.rooms.stats().await;

    // System stats
    let (cpu_usage, memory_alloc, memory_free, memory_total) = {
        let sys_lock = SYSTEM_MONITOR.get_or_init(|| {
            Mutex::new(System::new_all())
        });
        match sys_lock.lock() {
            Ok(mut sys) => {
                sys.refresh_cpu();
                sys.refresh_memory();
                (
                    sys.global_cpu_info().cpu_usage(),
                    sys.used_memory(),
                    sys.free_memory(),
                    sys.total_memory(),
                )
            }
            Err(_) => (0.0, 0, 0, 0)
        }
    };

    info!(
        "Diagnostics: CPU: {:.2}%, Mem: {}/{} MB (Free: {} MB), Conn: {}, Rooms: {}, Users: {}",
        cpu_usage,
        memory_alloc / 1024 / 1024,
        memory_total / 1024 / 1024,
        memory_free / 1024 / 1024,
        n_conn,
        stats.rooms,
        stats.users
    );

    (
        StatusCode::OK,
        Json(DiagnosticsResponse {
            n_conn,
            n_rooms: stats.rooms as u32,
            n_users: stats.users as u32,
            n_files: stats.files as u32,
            n_messages: stats.messages as u32,
            cpu_usage,
            memory_alloc,
            memory_total,
            memory_free,
        }),
    )
}
