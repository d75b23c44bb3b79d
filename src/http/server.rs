//! ESP-IDF HTTP server binding.
//!
//! One wildcard handler per method feeds every request through
//! [`route`]. Handlers run on the server's own task and only touch the
//! [`SnapshotHandle`] and the [`RemoteCommander`].

use anyhow::{anyhow, Result};
use esp_idf_svc::http::server::{Configuration, EspHttpConnection, EspHttpServer, Request};
use esp_idf_svc::http::{Headers, Method};
use esp_idf_svc::io::{Read, Write};
use log::{info, warn};

use super::routes::{route, ApiRequest, ApiResponse, HttpMethod, MAX_BODY_LEN};
use crate::adapters::time::MonotonicClock;
use crate::app::commands::RemoteCommander;
use crate::app::ports::Clock;
use crate::state::SnapshotHandle;

pub fn start_server(
    state: SnapshotHandle,
    commander: RemoteCommander,
) -> Result<EspHttpServer<'static>> {
    let cfg = Configuration {
        stack_size: 12 * 1024,
        uri_match_wildcard: true,
        ..Default::default()
    };
    let mut server = EspHttpServer::new(&cfg)?;

    for (method, api_method) in [
        (Method::Get, HttpMethod::Get),
        (Method::Post, HttpMethod::Post),
        (Method::Options, HttpMethod::Options),
    ] {
        let state = state.clone();
        let commander = commander.clone();
        server.fn_handler::<anyhow::Error, _>("/*", method, move |req| {
            serve(req, api_method, &state, &commander)
        })?;
    }

    info!("HTTP: server listening on :80");
    Ok(server)
}

fn serve(
    mut req: Request<&mut EspHttpConnection<'_>>,
    method: HttpMethod,
    state: &SnapshotHandle,
    commander: &RemoteCommander,
) -> Result<()> {
    let uri = req.uri().to_owned();
    let len = req.content_len().unwrap_or(0) as usize;

    let response = if len > MAX_BODY_LEN {
        warn!("HTTP: {} body of {} bytes rejected", uri, len);
        ApiResponse::error(400, "request body too large")
    } else {
        let mut body = vec![0_u8; len];
        if len > 0 {
            req.read_exact(&mut body)
                .map_err(|e| anyhow!("body read failed: {:?}", e))?;
        }
        let request = ApiRequest {
            method,
            path: &uri,
            body: &body,
        };
        let now_ms = MonotonicClock::new().now_ms();
        route(&request, state, now_ms, &mut |cmd| commander.execute(cmd))
    };

    let headers = response.headers();
    req.into_response(response.status, None, &headers)?
        .write_all(&response.body)?;
    Ok(())
}
