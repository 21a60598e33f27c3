//! Terminal rendering of the login QR code

use qrcode::types::QrError;
use qrcode::QrCode;

/// Renders `payload` with Unicode blocks, two columns per module so the code
/// stays square in a terminal.
pub fn render(payload: &str) -> Result<String, QrError> {
    let code = QrCode::new(payload.as_bytes())?;
    Ok(code
        .render::<char>()
        .quiet_zone(true)
        .module_dimensions(2, 1)
        .build())
}
