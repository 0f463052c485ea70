// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! QR rendering for the pairing endpoint.

use base64::Engine;
use qrcode::render::svg;
use qrcode::QrCode;

use wagate_core::WagateError;

/// Render a pairing payload as an SVG data URL, ready for an `<img>` tag.
pub fn qr_data_url(payload: &str) -> Result<String, WagateError> {
    let code = QrCode::new(payload.as_bytes())
        .map_err(|e| WagateError::Internal(format!("qr encoding failed: {e}")))?;
    let image = code
        .render::<svg::Color>()
        .min_dimensions(256, 256)
        .build();
    let encoded = base64::engine::general_purpose::STANDARD.encode(image.as_bytes());
    Ok(format!("data:image/svg+xml;base64,{encoded}"))
}
