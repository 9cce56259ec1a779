use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::{HeaderMap, StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::{
    config::Config,
    dispatch::{self, Operation},
    envelope, inline, multipart,
    error::{Result, SoapError},
    store::{InMemoryRecordStore, RecordStore},
    upload,
    xop::{self, FileData},
};

#[derive(Clone)]
struct AppState {
    store: Arc<dyn RecordStore>,
    upload_dir: Arc<PathBuf>,
    wsdl_path: Arc<PathBuf>,
    max_body_bytes: usize,
}

pub async fn run(config: Config) -> Result<()> {
    run_with_store(config, Arc::new(InMemoryRecordStore::seeded())).await
}

pub async fn run_with_store(config: Config, store: Arc<dyn RecordStore>) -> Result<()> {
    let state = AppState {
        store,
        upload_dir: Arc::new(config.upload_dir.clone()),
        wsdl_path: Arc::new(config.wsdl_path.clone()),
        max_body_bytes: config.max_body_bytes,
    };

    let app = Router::new()
        .route("/soap", post(soap_endpoint))
        .route("/health", get(health))
        .route("/wsdl", get(wsdl))
        .with_state(state)
        // The endpoint enforces max_body_bytes itself after buffering, so
        // an oversized request gets a fault envelope instead of axum's
        // bare 413.
        .layer(DefaultBodyLimit::disable())
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!(
        "Starting soapd server on {addr} (upload_dir={})",
        config.upload_dir.display()
    );

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// The single operation endpoint. POST only; axum answers other methods
/// with a bare 405, bypassing the fault envelope. Each request is
/// classified once and handled to completion with no shared mutable state.
async fn soap_endpoint(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let action = headers
        .get("SOAPAction")
        .and_then(|value| value.to_str().ok());
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");

    if body.len() > state.max_body_bytes {
        return SoapError::PayloadTooLarge {
            size: body.len(),
            max: state.max_body_bytes,
        }
        .into_response();
    }

    let operation = match dispatch::classify(action, &body) {
        Ok(operation) => operation,
        Err(err) => return err.into_response(),
    };
    info!(
        operation = ?operation,
        content_type,
        "SOAP request"
    );

    let result = match operation {
        Operation::Lookup => handle_lookup(&state, &body).await,
        Operation::InlineUpload => handle_inline_upload(&state, &body).await,
        Operation::OptimizedUpload => handle_optimized_upload(&state, content_type, &body).await,
    };

    match result {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

async fn handle_lookup(state: &AppState, body: &[u8]) -> Result<Response> {
    let text = body_text(body)?;
    let request = envelope::decode_lookup(text)?;
    let record = state
        .store
        .find(&request.id)
        .ok_or_else(|| SoapError::RecordNotFound(request.id.clone()))?;
    Ok(xml_response(envelope::encode_lookup_response(&record)))
}

async fn handle_inline_upload(state: &AppState, body: &[u8]) -> Result<Response> {
    let text = body_text(body)?;
    let request = envelope::decode_inline_upload(text)?;
    if request.file_name.is_empty() {
        return Err(SoapError::MissingField("fileName"));
    }
    if request.file_data.is_empty() {
        return Err(SoapError::MissingField("fileData"));
    }

    let data = inline::decode(&request.file_data)?;
    let stored = upload::store_file(&state.upload_dir, &request.file_name, &data).await?;
    info!(
        file_id = %stored.file_id,
        file_name = %stored.file_name,
        size = stored.size,
        "file uploaded"
    );
    Ok(xml_response(envelope::encode_upload_response(
        "InlineUploadResponse",
        &stored,
    )))
}

async fn handle_optimized_upload(
    state: &AppState,
    content_type: &str,
    body: &[u8],
) -> Result<Response> {
    let (file_name, data) = if multipart::is_multipart(content_type) {
        let message = multipart::parse(body, content_type, state.max_body_bytes)?;
        let control = body_text(&message.control.data)?;
        let request = envelope::decode_optimized_upload(control)?;
        let data = match xop::resolve(&request.file_data)? {
            FileData::Inline(bytes) => bytes,
            FileData::Reference(content_id) => {
                xop::match_attachment(&content_id, &message.attachments)?.to_vec()
            }
        };
        (request.file_name, data)
    } else {
        // Non-MTOM client: plain envelope with inline base64 fileData.
        let text = body_text(body)?;
        let request = envelope::decode_optimized_upload(text)?;
        let data = match xop::resolve(&request.file_data)? {
            FileData::Inline(bytes) => bytes,
            FileData::Reference(content_id) => {
                return Err(SoapError::ReferenceNotFound(content_id));
            }
        };
        (request.file_name, data)
    };

    if file_name.is_empty() {
        return Err(SoapError::MissingField("fileName"));
    }
    if data.is_empty() {
        return Err(SoapError::MissingField("fileData"));
    }

    let stored = upload::store_file(&state.upload_dir, &file_name, &data).await?;
    info!(
        file_id = %stored.file_id,
        file_name = %stored.file_name,
        size = stored.size,
        "MTOM file uploaded"
    );
    Ok(xml_response(envelope::encode_upload_response(
        "OptimizedUploadResponse",
        &stored,
    )))
}

async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        service: "soapd",
    })
}

#[derive(Serialize)]
struct HealthResponse<'a> {
    status: &'a str,
    service: &'a str,
}

async fn wsdl(State(state): State<AppState>) -> Response {
    match tokio::fs::read(state.wsdl_path.as_path()).await {
        Ok(contents) => ([(CONTENT_TYPE, "application/xml")], contents).into_response(),
        Err(_) => StatusCode::NOT_FOUND.into_response(),
    }
}

fn body_text(body: &[u8]) -> Result<&str> {
    std::str::from_utf8(body).map_err(|err| SoapError::InvalidXml(err.to_string()))
}

fn xml_response(body: String) -> Response {
    ([(CONTENT_TYPE, envelope::TEXT_XML)], body).into_response()
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        let mut sigterm =
            signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
