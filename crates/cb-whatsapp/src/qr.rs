//! Terminal rendering of pairing QR codes

use qrcode::render::unicode;
use qrcode::QrCode;
use tracing::{info, warn};

/// Render a QR payload as half-block unicode art, or `None` if it cannot be encoded
pub fn render_qr(code: &str) -> Option<String> {
    let qr = QrCode::new(code.as_bytes()).ok()?;
    let art = qr
        .render::<unicode::Dense1x2>()
        .dark_color(unicode::Dense1x2::Light)
        .light_color(unicode::Dense1x2::Dark)
        .quiet_zone(true)
        .build();
    Some(art)
}

/// Print a scannable QR code to the terminal and log its payload
pub fn show_qr(code: &str) {
    info!("Scan this QR code with WhatsApp");
    match render_qr(code) {
        Some(art) => println!("{}", art),
        None => warn!("QR payload could not be rendered; use the raw value below"),
    }
    info!(qr = %code, "pairing QR payload");
}
