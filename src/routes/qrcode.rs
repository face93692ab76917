// routes/qrcode.rs
// GET /qrcode[?source=remote] -> PNG QR code of the factory enrollment URI.
// The remote renderer is tried only on request and falls back to local
// rendering.

use axum::{
    extract::{Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use std::sync::Arc;

use crate::{
    state::AppState,
    totp::{qr, uri},
};

#[derive(Deserialize, Default)]
pub struct QrQuery {
    pub source: Option<String>,
}

pub async fn qrcode(State(st): State<Arc<AppState>>, Query(q): Query<QrQuery>) -> Response {
    let secret = match st.factory.secret().await {
        Ok(secret) => secret,
        Err(err) => return err.into_response(),
    };
    let otpauth = st.verifier.enrollment_uri(&secret, None);

    let png = if q.source.as_deref() == Some("remote") {
        let service = uri::qr_service_url(&st.config.qr_service_url, &otpauth);
        qr::fetch_or_render(&st.http, &service, &otpauth).await
    } else {
        qr::render_png(&otpauth)
    };

    match png {
        Ok(png) => ([(header::CONTENT_TYPE, "image/png")], png).into_response(),
        Err(err) => {
            tracing::error!(error = %err, "failed to build qr");
            (StatusCode::INTERNAL_SERVER_ERROR, "failed to build qr").into_response()
        }
    }
}
