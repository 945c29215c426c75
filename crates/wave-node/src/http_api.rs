//! HTTP control API.
//!
//! Translates remote commands into transport commands and exposes status,
//! spectrum heights and the playlist as JSON. Any other path is served as a
//! static file from the media directory, with `/` mapped to `index.html`.

use std::net::SocketAddr;
use std::path::{Component, Path, PathBuf};
use std::sync::Mutex;

use actix_files::Files;
use actix_web::{App, HttpResponse, HttpServer, Responder, get, middleware::Logger, post, web};
use wave_player::spectrum::HeightsReader;
use wave_player::status::{NO_TRACK, StatusReader, TransportState, TransportStatus};
use wave_player::{PlayerClient, PlayerError, TransportCommand};
use wave_player_types::{
    ControlAccepted, ErrorResponse, HealthResponse, RemoteCommand, RemoteState, RemoteStatus,
    SpectrumResponse,
};

/// Shared handler state.
pub(crate) struct AppState {
    client: PlayerClient,
    media_dir: PathBuf,
    status: Mutex<StatusReader>,
    heights: Mutex<HeightsReader>,
}

impl AppState {
    pub(crate) fn new(client: PlayerClient, media_dir: PathBuf) -> Self {
        Self {
            status: Mutex::new(client.status_reader()),
            heights: Mutex::new(client.heights_reader()),
            client,
            media_dir,
        }
    }
}

/// Bind and run the API until the server is stopped.
pub(crate) fn build_server(
    bind: SocketAddr,
    state: web::Data<AppState>,
) -> std::io::Result<actix_web::dev::Server> {
    tracing::info!(bind = %bind, "http api listening");
    let media_dir = state.media_dir.clone();
    let server = HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(Logger::default().exclude("/api/status").exclude("/api/spectrum"))
            .configure(routes)
            .service(static_files(&media_dir))
    })
    .workers(2)
    .disable_signals()
    .bind(bind)?
    .run();
    Ok(server)
}

pub(crate) fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(control)
        .service(status)
        .service(spectrum)
        .service(playlist)
        .service(health);
}

/// Web UI and other static files. Registered after the API routes.
pub(crate) fn static_files(media_dir: &Path) -> Files {
    Files::new("/", media_dir).index_file("index.html")
}

#[post("/api/control")]
async fn control(state: web::Data<AppState>, body: web::Bytes) -> impl Responder {
    let remote = match serde_json::from_slice::<RemoteCommand>(&body) {
        Ok(cmd) => cmd,
        Err(e) => return error_response(HttpResponse::BadRequest(), format!("invalid command: {e}")),
    };
    let cmd = match to_transport_command(remote, &state.media_dir) {
        Ok(cmd) => cmd,
        Err(message) => return error_response(HttpResponse::BadRequest(), message),
    };
    tracing::info!(command = ?cmd, "remote command");
    match state.client.submit_command(cmd) {
        Ok(()) => HttpResponse::Accepted().json(ControlAccepted::queued()),
        Err(e @ (PlayerError::Backpressure(_) | PlayerError::Disconnected(_))) => {
            tracing::warn!("remote command not queued: {e}");
            error_response(HttpResponse::ServiceUnavailable(), e.to_string())
        }
        Err(e) => error_response(HttpResponse::InternalServerError(), e.to_string()),
    }
}

#[get("/api/status")]
async fn status(state: web::Data<AppState>) -> impl Responder {
    // Reads may wait on the status guard; keep them off the async workers.
    let snapshot = web::block(move || match state.status.lock() {
        Ok(mut reader) => reader.read(),
        Err(_) => TransportStatus::stopped(),
    })
    .await
    .unwrap_or_else(|e| {
        tracing::warn!("status read: {e}");
        TransportStatus::stopped()
    });
    HttpResponse::Ok().json(to_remote_status(&snapshot))
}

#[get("/api/spectrum")]
async fn spectrum(state: web::Data<AppState>) -> impl Responder {
    let heights = web::block(move || match state.heights.lock() {
        Ok(mut reader) => reader.read().to_vec(),
        Err(_) => Vec::new(),
    })
    .await
    .unwrap_or_else(|e| {
        tracing::warn!("spectrum read: {e}");
        Vec::new()
    });
    HttpResponse::Ok().json(SpectrumResponse { heights })
}

#[get("/api/playlist")]
async fn playlist(state: web::Data<AppState>) -> impl Responder {
    match list_wav_files(&state.media_dir) {
        Ok(names) => HttpResponse::Ok().json(names),
        Err(e) => {
            tracing::warn!(dir = %state.media_dir.display(), "playlist scan failed: {e}");
            error_response(HttpResponse::InternalServerError(), format!("read media dir: {e}"))
        }
    }
}

#[get("/health")]
async fn health() -> impl Responder {
    HttpResponse::Ok().json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

fn error_response(mut builder: actix_web::HttpResponseBuilder, message: String) -> HttpResponse {
    builder.json(ErrorResponse { error: message })
}

fn to_transport_command(remote: RemoteCommand, media_dir: &Path) -> Result<TransportCommand, String> {
    Ok(match remote {
        RemoteCommand::Play { track } => TransportCommand::Play(resolve_track(media_dir, &track)?),
        RemoteCommand::Pause => TransportCommand::Pause,
        RemoteCommand::Resume => TransportCommand::Resume,
        RemoteCommand::Stop => TransportCommand::Stop,
        RemoteCommand::Seek { value } => {
            if !(0.0..=100.0).contains(&value) {
                return Err(format!("seek value {value} outside 0..=100"));
            }
            TransportCommand::Seek(value)
        }
    })
}

/// Resolve a track name inside `media_dir`, refusing anything that could
/// escape it.
fn resolve_track(media_dir: &Path, track: &str) -> Result<PathBuf, String> {
    let rel = Path::new(track.trim());
    if rel.as_os_str().is_empty() {
        return Err("track is empty".to_string());
    }
    if !rel.components().all(|c| matches!(c, Component::Normal(_))) {
        return Err(format!("track must be a relative path inside the media dir: {track}"));
    }
    Ok(media_dir.join(rel))
}

fn to_remote_status(ts: &TransportStatus) -> RemoteStatus {
    let track = if ts.state == TransportState::Stopped {
        NO_TRACK.to_string()
    } else {
        ts
            .track
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| NO_TRACK.to_string())
    };
    RemoteStatus {
        is_playing: ts.is_playing(),
        track,
        position: ts.current_position_sec.max(0.0) as u64,
        duration: ts.total_duration_sec.max(0.0) as u64,
        state: match ts.state {
            TransportState::Stopped => RemoteState::Stopped,
            TransportState::Playing => RemoteState::Playing,
            TransportState::Paused => RemoteState::Paused,
        },
    }
}

/// Sorted names of `.wav` files directly inside `dir`.
fn list_wav_files(dir: &Path) -> std::io::Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let path = entry.path();
        let is_wav = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("wav"));
        if is_wav {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{http::StatusCode, test};
    use wave_player::output::NullOutput;
    use wave_player::{PlayerConfig, PlayerContext, PlayerHandle};

    fn temp_media_dir(label: &str) -> PathBuf {
        let root = std::env::temp_dir().join(format!(
            "wave-node-{label}-{}",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        std::fs::create_dir_all(&root).expect("create temp dir");
        root
    }

    fn start_player(media_dir: PathBuf) -> (PlayerHandle, web::Data<AppState>) {
        let handle = PlayerContext::new(PlayerConfig::default())
            .unwrap()
            .start(Box::new(NullOutput::new(true)))
            .unwrap();
        let state = web::Data::new(AppState::new(handle.client(), media_dir));
        (handle, state)
    }

    /// Minimal 16-bit mono PCM WAV of silence.
    fn silent_wav(frames: usize) -> Vec<u8> {
        let data_len = (frames * 2) as u32;
        let mut out = Vec::new();
        out.extend_from_slice(b"RIFF");
        out.extend_from_slice(&(36 + data_len).to_le_bytes());
        out.extend_from_slice(b"WAVEfmt ");
        out.extend_from_slice(&16u32.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&8_000u32.to_le_bytes());
        out.extend_from_slice(&16_000u32.to_le_bytes());
        out.extend_from_slice(&2u16.to_le_bytes());
        out.extend_from_slice(&16u16.to_le_bytes());
        out.extend_from_slice(b"data");
        out.extend_from_slice(&data_len.to_le_bytes());
        out.resize(out.len() + frames * 2, 0);
        out
    }

    #[::core::prelude::v1::test]
    fn resolve_track_stays_inside_media_dir() {
        let dir = Path::new("/srv/music");
        assert_eq!(resolve_track(dir, "a.wav").unwrap(), dir.join("a.wav"));
        assert_eq!(resolve_track(dir, "live/b.wav").unwrap(), dir.join("live/b.wav"));
        assert!(resolve_track(dir, "../etc/passwd").is_err());
        assert!(resolve_track(dir, "/etc/passwd").is_err());
        assert!(resolve_track(dir, "live/../../x.wav").is_err());
        assert!(resolve_track(dir, "  ").is_err());
    }

    #[::core::prelude::v1::test]
    fn remote_status_uses_basename_and_whole_seconds() {
        let ts = TransportStatus {
            state: TransportState::Paused,
            track: PathBuf::from("/srv/music/live/song.wav"),
            total_duration_sec: 181.9,
            current_position_sec: 12.7,
            channel_count: 2,
            bits_per_sample: 16,
            sample_rate: 44_100,
            byte_rate: 176_400,
        };
        let remote = to_remote_status(&ts);
        assert!(!remote.is_playing);
        assert_eq!(remote.track, "song.wav");
        assert_eq!(remote.position, 12);
        assert_eq!(remote.duration, 181);
        assert_eq!(remote.state, RemoteState::Paused);

        let stopped = to_remote_status(&TransportStatus::stopped());
        assert_eq!(stopped.track, NO_TRACK);
        assert_eq!(stopped.state, RemoteState::Stopped);
    }

    #[::core::prelude::v1::test]
    fn seek_range_is_checked_before_queueing() {
        let dir = Path::new("/srv/music");
        assert_eq!(
            to_transport_command(RemoteCommand::Seek { value: 25.0 }, dir).unwrap(),
            TransportCommand::Seek(25.0)
        );
        assert!(to_transport_command(RemoteCommand::Seek { value: 120.0 }, dir).is_err());
        assert!(to_transport_command(RemoteCommand::Seek { value: f32::NAN }, dir).is_err());
    }

    #[::core::prelude::v1::test]
    fn playlist_lists_sorted_wav_files() {
        let dir = temp_media_dir("playlist");
        for name in ["b.wav", "a.WAV", "notes.txt", "c.flac"] {
            std::fs::write(dir.join(name), b"stub").unwrap();
        }
        std::fs::create_dir_all(dir.join("sub.wav")).unwrap();
        assert_eq!(list_wav_files(&dir).unwrap(), vec!["a.WAV", "b.wav"]);
    }

    #[actix_web::test]
    async fn control_queues_valid_commands() {
        let dir = temp_media_dir("control");
        std::fs::write(dir.join("tone.wav"), silent_wav(8_000)).unwrap();
        let (handle, state) = start_player(dir);
        let app = test::init_service(App::new().app_data(state.clone()).configure(routes)).await;

        let req = test::TestRequest::post()
            .uri("/api/control")
            .set_json(serde_json::json!({"command": "play", "track": "tone.wav"}))
            .to_request();
        let resp: ControlAccepted = test::call_and_read_body_json(&app, req).await;
        assert_eq!(resp, ControlAccepted::queued());

        let req = test::TestRequest::post()
            .uri("/api/control")
            .set_json(serde_json::json!({"command": "stop"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::ACCEPTED);

        drop(app);
        handle.shutdown();
    }

    #[actix_web::test]
    async fn control_rejects_bad_requests() {
        let (handle, state) = start_player(temp_media_dir("bad-control"));
        let app = test::init_service(App::new().app_data(state.clone()).configure(routes)).await;

        for body in [
            serde_json::json!({"command": "rewind"}),
            serde_json::json!({"command": "play"}),
            serde_json::json!({"command": "play", "track": "../secret.wav"}),
            serde_json::json!({"command": "seek", "value": 150}),
        ] {
            let req = test::TestRequest::post()
                .uri("/api/control")
                .set_json(&body)
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{body}");
        }

        drop(app);
        handle.shutdown();
    }

    #[actix_web::test]
    async fn control_reports_unavailable_transport() {
        let (handle, state) = start_player(temp_media_dir("gone"));
        handle.shutdown();
        let app = test::init_service(App::new().app_data(state.clone()).configure(routes)).await;

        let req = test::TestRequest::post()
            .uri("/api/control")
            .set_json(serde_json::json!({"command": "pause"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[actix_web::test]
    async fn root_serves_index_from_media_dir() {
        let dir = temp_media_dir("static");
        std::fs::write(dir.join("index.html"), "<h1>wave</h1>").unwrap();
        std::fs::write(dir.join("app.js"), "start()").unwrap();
        let (handle, state) = start_player(dir.clone());
        let app = test::init_service(
            App::new()
                .app_data(state.clone())
                .configure(routes)
                .service(static_files(&dir)),
        )
        .await;

        let req = test::TestRequest::get().uri("/").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(test::read_body(resp).await, web::Bytes::from_static(b"<h1>wave</h1>"));

        let req = test::TestRequest::get().uri("/app.js").to_request();
        assert_eq!(
            test::call_and_read_body(&app, req).await,
            web::Bytes::from_static(b"start()")
        );

        let req = test::TestRequest::get().uri("/missing.css").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        // API routes still win over the static mount.
        let req = test::TestRequest::get().uri("/health").to_request();
        let body: HealthResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body.status, "ok");

        drop(app);
        handle.shutdown();
    }

    #[actix_web::test]
    async fn status_and_spectrum_report_idle_player() {
        let (handle, state) = start_player(temp_media_dir("status"));
        let app = test::init_service(App::new().app_data(state.clone()).configure(routes)).await;

        let req = test::TestRequest::get().uri("/api/status").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(
            body,
            serde_json::json!({
                "isPlaying": false,
                "track": "none",
                "position": 0,
                "duration": 0,
                "state": "stopped"
            })
        );

        let req = test::TestRequest::get().uri("/api/spectrum").to_request();
        let body: SpectrumResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body.heights, vec![0u8; 32]);

        let req = test::TestRequest::get().uri("/health").to_request();
        let body: HealthResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body.status, "ok");

        drop(app);
        handle.shutdown();
    }
}
