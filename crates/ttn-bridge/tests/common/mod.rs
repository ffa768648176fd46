// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Shared fixtures: uplink envelopes and a fake InfluxDB 1.x endpoint.

#![allow(dead_code)]

use axum::extract::{Form, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap};
use std::net::SocketAddr;
use std::sync::Arc;
use ttn_bridge::line_protocol::{parse_line, FieldKind};
use ttn_bridge::subscription::RawMessage;

pub const TOPIC: &str = "fr_co2ampel_hft/devices/co2ampelbndlg_dev01/up";

/// Uplink envelope as published by the network.
pub fn envelope(co2: &str, hum: &str, tmp: &str, time: &str) -> RawMessage {
    let payload = format!(
        r#"{{"app_id":"fr_co2ampel_hft","dev_id":"co2ampelbndlg_dev01","hardware_serial":"00A2B3C4D5E6F708","port":1,"counter":118,"payload_raw":"A/wlvA==","payload_fields":{{"co2":{},"hum":{},"tmp":{}}},"metadata":{{"time":"{}","frequency":868.1,"modulation":"LORA"}}}}"#,
        co2, hum, tmp, time
    );
    RawMessage::new(TOPIC, payload.into_bytes())
}

/// What the fake server has seen and accepted.
#[derive(Debug, Default)]
pub struct FakeInflux {
    pub statements: Vec<String>,
    pub databases: BTreeSet<String>,
    /// (database, line) for every accepted write.
    pub points: Vec<(String, String)>,
    pub schema: HashMap<(String, String), FieldKind>,
    /// Requests to `/write` answered with 503 before accepting again.
    pub unavailable_writes: usize,
    pub write_requests: usize,
}

pub type Shared = Arc<Mutex<FakeInflux>>;

/// Serve a fake InfluxDB on an ephemeral port.
pub async fn spawn_fake_influx(state: Shared) -> SocketAddr {
    let app = Router::new()
        .route("/query", post(query))
        .route("/write", post(write))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    addr
}

async fn query(
    State(state): State<Shared>,
    Form(form): Form<HashMap<String, String>>,
) -> impl IntoResponse {
    let Some(q) = form.get("q") else {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": "missing required parameter \"q\""})),
        );
    };

    let mut state = state.lock();
    state.statements.push(q.clone());
    if let Some(name) = q.strip_prefix("CREATE DATABASE ") {
        state.databases.insert(name.trim_matches('"').to_string());
    }
    (
        StatusCode::OK,
        Json(serde_json::json!({"results": [{"statement_id": 0}]})),
    )
}

async fn write(
    State(state): State<Shared>,
    Query(params): Query<HashMap<String, String>>,
    body: String,
) -> impl IntoResponse {
    let mut state = state.lock();
    state.write_requests += 1;

    if state.unavailable_writes > 0 {
        state.unavailable_writes -= 1;
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({"error": "engine busy"})),
        )
            .into_response();
    }

    let db = params.get("db").cloned().unwrap_or_default();
    if !state.databases.contains(&db) {
        return (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"error": format!("database not found: \"{}\"", db)})),
        )
            .into_response();
    }
    if params.get("precision").map(String::as_str) != Some("ns") {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": "expected precision=ns"})),
        )
            .into_response();
    }

    for line in body.lines().filter(|l| !l.is_empty()) {
        let Some((measurement, fields, _)) = parse_line(line) else {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({"error": format!("unable to parse '{}'", line)})),
            )
                .into_response();
        };

        for (field, literal) in &fields {
            let kind = FieldKind::of_literal(literal);
            let key = (measurement.clone(), field.clone());
            if let Some(existing) = state.schema.get(&key) {
                if *existing != kind {
                    let error = format!(
                        "partial write: field type conflict: input field \"{}\" on measurement \"{}\" is type {:?}, already exists as type {:?} dropped=1",
                        field, measurement, kind, existing
                    );
                    return (
                        StatusCode::BAD_REQUEST,
                        Json(serde_json::json!({ "error": error })),
                    )
                        .into_response();
                }
            }
        }
        for (field, literal) in fields {
            state
                .schema
                .entry((measurement.clone(), field))
                .or_insert(FieldKind::of_literal(&literal));
        }
        state.points.push((db.clone(), line.to_string()));
    }

    StatusCode::NO_CONTENT.into_response()
}
