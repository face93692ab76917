// totp/qr.rs
// QR images for enrollment: local PNG rendering, or the external renderer
// with a local fallback.

use anyhow::{Context, Result};
use image::{DynamicImage, ImageFormat, Luma};
use qrcode::QrCode;
use std::{io::Cursor, time::Duration};

const REMOTE_TIMEOUT: Duration = Duration::from_secs(5);

pub fn render_png(payload: &str) -> Result<Vec<u8>> {
    let code = QrCode::new(payload.as_bytes()).context("payload does not fit in a QR code")?;
    let img = code.render::<Luma<u8>>().min_dimensions(200, 200).build();

    // image 0.25: write_to requires Write + Seek
    let mut cursor = Cursor::new(Vec::<u8>::new());
    DynamicImage::ImageLuma8(img)
        .write_to(&mut cursor, ImageFormat::Png)
        .context("failed to encode QR png")?;
    Ok(cursor.into_inner())
}

async fn fetch_remote(client: &reqwest::Client, url: &str) -> Result<Vec<u8>> {
    let response = client
        .get(url)
        .timeout(REMOTE_TIMEOUT)
        .send()
        .await?
        .error_for_status()?;
    Ok(response.bytes().await?.to_vec())
}

/// Tries the external renderer first; any failure falls back to rendering
/// `payload` locally.
pub async fn fetch_or_render(
    client: &reqwest::Client,
    service_url: &str,
    payload: &str,
) -> Result<Vec<u8>> {
    match fetch_remote(client, service_url).await {
        Ok(png) => Ok(png),
        Err(err) => {
            tracing::warn!(error = %err, "QR service unavailable, rendering locally");
            render_png(payload)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n";

    #[test]
    fn renders_png() {
        let png = render_png("otpauth://totp/A:B?secret=JBSWY3DPEHPK3PXP").unwrap();
        assert!(png.starts_with(PNG_MAGIC));
    }

    #[tokio::test]
    async fn unreachable_service_falls_back_to_local_render() {
        let client = reqwest::Client::new();
        let png = fetch_or_render(&client, "http://127.0.0.1:9/qr", "otpauth://totp/A:B")
            .await
            .unwrap();
        assert!(png.starts_with(PNG_MAGIC));
    }
}
