// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! TCP listener translating protocol requests into engine calls.
//!
//! One spawned task per connection; each request line gets one response
//! line. File-content requests stream the body after the header and end
//! the connection.

use std::sync::Arc;

use hub_core::{basename, JobOperation};
use hub_driver::DriverApi;
use hub_engine::{EngineError, ScanManager, SearchScan, SizeScan, TransferEngine};
use hub_storage::Store;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, warn};

use crate::protocol::{content_type_for, Disposition, Request, Response};

/// Shared daemon context for all request handlers.
pub(crate) struct ListenCtx<D: DriverApi> {
    pub driver: D,
    pub store: Arc<Store>,
    pub engine: TransferEngine<D>,
    pub searches: Arc<ScanManager<D, SearchScan>>,
    pub sizes: Arc<ScanManager<D, SizeScan>>,
}

/// Listener task accepting protocol connections.
pub(crate) struct Listener<D: DriverApi> {
    socket: TcpListener,
    ctx: Arc<ListenCtx<D>>,
}

/// Errors from connection handling.
#[derive(Debug, Error)]
pub(crate) enum ConnectionError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl<D: DriverApi> Listener<D> {
    pub fn new(socket: TcpListener, ctx: Arc<ListenCtx<D>>) -> Self {
        Self { socket, ctx }
    }

    /// Accept loop; runs until the task is aborted at shutdown.
    pub async fn run(self) {
        loop {
            match self.socket.accept().await {
                Ok((stream, peer)) => {
                    debug!(%peer, "client connected");
                    let ctx = Arc::clone(&self.ctx);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, &ctx).await {
                            match e {
                                ConnectionError::Io(_) => debug!("client disconnected"),
                                other => error!("connection error: {other}"),
                            }
                        }
                    });
                }
                Err(e) => {
                    error!("accept error: {e}");
                }
            }
        }
    }
}

async fn handle_connection<D: DriverApi>(
    stream: TcpStream,
    ctx: &ListenCtx<D>,
) -> Result<(), ConnectionError> {
    let (read_half, mut write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let request: Request = match serde_json::from_str(&line) {
            Ok(request) => request,
            Err(e) => {
                write_response(
                    &mut write_half,
                    &Response::Error {
                        message: format!("invalid request: {e}"),
                    },
                )
                .await?;
                continue;
            }
        };

        match request {
            Request::FileContent {
                remote_path,
                disposition,
            } => {
                // The body is delimited by connection close.
                stream_file(ctx, &mut write_half, &remote_path, disposition).await?;
                return Ok(());
            }
            request => {
                let response = handle_request(ctx, request).await;
                write_response(&mut write_half, &response).await?;
            }
        }
    }
    Ok(())
}

async fn write_response(
    writer: &mut OwnedWriteHalf,
    response: &Response,
) -> Result<(), ConnectionError> {
    let mut payload = serde_json::to_vec(response)?;
    payload.push(b'\n');
    writer.write_all(&payload).await?;
    Ok(())
}

fn not_found(what: &str) -> Response {
    Response::Error {
        message: format!("{what} not found"),
    }
}

fn engine_error(error: EngineError) -> Response {
    Response::Error {
        message: error.to_string(),
    }
}

pub(crate) async fn handle_request<D: DriverApi>(ctx: &ListenCtx<D>, request: Request) -> Response {
    match request {
        Request::Health => match (ctx.driver.version().await, ctx.driver.config_file().await) {
            (Ok(version), Ok(config_file)) => Response::Health {
                ok: true,
                driver_available: true,
                driver_version: Some(version),
                driver_config_file: Some(config_file),
            },
            _ => Response::Health {
                ok: false,
                driver_available: false,
                driver_version: None,
                driver_config_file: None,
            },
        },

        Request::ListRemotes => match ctx.driver.list_remotes().await {
            Ok(remotes) => Response::Remotes { remotes },
            Err(e) => Response::Error {
                message: e.to_string(),
            },
        },

        Request::List {
            remote_path,
            recursive,
        } => match ctx.driver.list(&remote_path, recursive).await {
            Ok(items) => Response::Entries { items },
            Err(e) => Response::Error {
                message: e.to_string(),
            },
        },

        Request::SubmitTransfer {
            operation,
            sources,
            destination_dir,
        } => {
            if operation == JobOperation::Delete {
                return Response::Error {
                    message: "operation must be copy or move".to_string(),
                };
            }
            match ctx.engine.submit_transfer(operation, sources, destination_dir) {
                Ok(job) => Response::Job { job },
                Err(e) => engine_error(e),
            }
        }

        Request::SubmitDelete { sources } => match ctx.engine.submit_delete(sources) {
            Ok(job) => Response::Job { job },
            Err(e) => engine_error(e),
        },

        Request::CancelJob { job_id } => match ctx.engine.cancel(&job_id) {
            Ok(Some(job)) => Response::Job { job },
            Ok(None) => not_found("job"),
            Err(e) => engine_error(e),
        },

        Request::ListJobs => Response::Jobs {
            jobs: ctx.engine.list_jobs(),
        },

        Request::GetJob { job_id } => match ctx.engine.get_job(&job_id) {
            Some(job) => Response::Job { job },
            None => not_found("job"),
        },

        Request::GetSettings => match ctx.store.get_settings() {
            Ok(Some(settings)) => Response::Settings { settings },
            Ok(None) => Response::Error {
                message: "settings not initialized".to_string(),
            },
            Err(e) => Response::Error {
                message: e.to_string(),
            },
        },

        Request::PutSettings { settings } => match ctx.store.set_settings(&settings) {
            Ok(()) => Response::Settings { settings },
            Err(e) => Response::Error {
                message: e.to_string(),
            },
        },

        Request::CreateSearch {
            root_path,
            filename_query,
            literal,
            min_size_mb,
        } => match SearchScan::new(&filename_query, literal, min_size_mb) {
            Ok(kind) => Response::SearchCreated {
                search_id: ctx.searches.create(&root_path, kind),
            },
            Err(e) => engine_error(e),
        },

        Request::PollSearch {
            search_id,
            after_seq,
        } => match ctx.searches.poll(&search_id, after_seq) {
            Ok(page) => Response::SearchEvents { page },
            Err(_) => not_found("search"),
        },

        Request::CancelSearch { search_id } => {
            if ctx.searches.cancel(&search_id) {
                Response::Cancelled { ok: true }
            } else {
                not_found("search")
            }
        }

        Request::CreateSize { root_path } => Response::SizeCreated {
            size_id: ctx.sizes.create(&root_path, SizeScan::new()),
        },

        Request::PollSize { size_id, after_seq } => match ctx.sizes.poll(&size_id, after_seq) {
            Ok(page) => Response::SizeEvents { page },
            Err(_) => not_found("size"),
        },

        Request::CancelSize { size_id } => {
            if ctx.sizes.cancel(&size_id) {
                Response::Cancelled { ok: true }
            } else {
                not_found("size")
            }
        }

        Request::RenamePath {
            source_path,
            new_name,
        } => match ctx.driver.rename_within_parent(&source_path, &new_name).await {
            Ok(updated_path) => Response::Renamed { updated_path },
            Err(e) => Response::Error {
                message: e.to_string(),
            },
        },

        // Handled by the connection loop; unreachable through it.
        Request::FileContent { .. } => Response::Error {
            message: "file_content requires a dedicated connection".to_string(),
        },
    }
}

/// Stat, validate, send the header, then pump chunks until EOF.
async fn stream_file<D: DriverApi>(
    ctx: &ListenCtx<D>,
    writer: &mut OwnedWriteHalf,
    remote_path: &str,
    disposition: Disposition,
) -> Result<(), ConnectionError> {
    let entry = match ctx.driver.stat(remote_path).await {
        Ok(entry) => entry,
        Err(e) => {
            return write_response(
                writer,
                &Response::Error {
                    message: e.to_string(),
                },
            )
            .await;
        }
    };
    if entry.is_dir {
        return write_response(
            writer,
            &Response::Error {
                message: "remote_path must reference a file".to_string(),
            },
        )
        .await;
    }

    let name = if entry.name.is_empty() {
        basename(remote_path).unwrap_or_default()
    } else {
        entry.name.clone()
    };
    let content_type = content_type_for(&name);
    if disposition == Disposition::Inline && content_type == "application/octet-stream" {
        return write_response(
            writer,
            &Response::Error {
                message: "inline preview is only supported for jpg/jpeg/png/gif".to_string(),
            },
        )
        .await;
    }

    let mut stream = match ctx.driver.open_stream(remote_path).await {
        Ok(stream) => stream,
        Err(e) => {
            return write_response(
                writer,
                &Response::Error {
                    message: e.to_string(),
                },
            )
            .await;
        }
    };

    write_response(
        writer,
        &Response::FileHead {
            name,
            content_type: content_type.to_string(),
            disposition,
        },
    )
    .await?;

    loop {
        match stream.next_chunk().await {
            Ok(Some(chunk)) => writer.write_all(&chunk).await?,
            Ok(None) => break,
            Err(e) => {
                // Header already went out; all we can do is log and cut
                // the connection short.
                warn!(remote_path, error = %e, "file stream aborted");
                stream.close().await;
                break;
            }
        }
    }
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
#[path = "listener_tests.rs"]
mod tests;
