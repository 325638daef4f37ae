// SPDX-FileCopyrightText: 2026 Proplink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Terminal rendering for pairing QR challenges.

use qrcode::QrCode;
use qrcode::render::unicode;

use proplink_core::ProplinkError;

/// Render a pairing challenge payload as a unicode QR code for the terminal.
pub fn render_unicode(payload: &str) -> Result<String, ProplinkError> {
    let code = QrCode::new(payload.as_bytes())
        .map_err(|e| ProplinkError::Internal(format!("qr encode failed: {e}")))?;
    Ok(code
        .render::<unicode::Dense1x2>()
        .quiet_zone(true)
        .build())
}
