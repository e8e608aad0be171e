//! Canvas rendering probe
//!
//! Draws a fixed sequence (text, emoji glyphs, linear gradient) on a fixed
//! 280x60 offscreen surface and digests the resulting pixel buffer. The same
//! engine and configuration always render the same bytes, so the digest is a
//! stable proxy for the rendering stack.
//!
//! Text-metric measurements (plain and emoji string widths) are recorded as
//! auxiliary features; they never feed the digest.

#[cfg(target_arch = "wasm32")]
use std::collections::BTreeMap;

#[cfg(target_arch = "wasm32")]
use async_trait::async_trait;

#[cfg(target_arch = "wasm32")]
use crate::error::Result;

#[cfg(target_arch = "wasm32")]
use super::{CapabilityProbe, ProbeId, ProbeResult};

/// Fixed surface dimensions. Part of the canonical encoding prefix.
pub const SURFACE_WIDTH: u32 = 280;
pub const SURFACE_HEIGHT: u32 = 60;

/// Fixed drawing inputs. Changing any of these changes every digest.
pub const SAMPLE_TEXT: &str = "Cwm fjordbank glyphs vext quiz, 🎯";
pub const EMOJI_TEXT: &str = "😃🙈🌍";

/// Serialize a pixel buffer into the canonical encoding: a `w:h:` dimension
/// prefix followed by the raw RGBA bytes.
pub fn encode_pixels(width: u32, height: u32, rgba: &[u8]) -> Vec<u8> {
    let mut encoding = format!("{}:{}:", width, height).into_bytes();
    encoding.extend_from_slice(rgba);
    encoding
}

/// Probe over the 2D canvas rendering capability.
#[derive(Debug, Default)]
pub struct CanvasProbe;

impl CanvasProbe {
    pub fn new() -> Self {
        CanvasProbe
    }
}

#[cfg(target_arch = "wasm32")]
#[async_trait(?Send)]
impl CapabilityProbe for CanvasProbe {
    fn id(&self) -> ProbeId {
        ProbeId::Canvas
    }

    async fn detect(&mut self) -> Result<ProbeResult> {
        use crate::error::ScanError;

        // The surface lives only for this call; it is released when the
        // context goes out of scope, fault or not.
        let ctx = match acquire_surface() {
            Some(ctx) => ctx,
            None => {
                log::debug!("canvas: 2D rendering capability absent");
                return Ok(ProbeResult::unsupported(ProbeId::Canvas));
            }
        };

        let (encoding, features) =
            render_and_encode(&ctx).map_err(|e| ScanError::probe_fault("canvas", &e))?;

        Ok(ProbeResult::from_encoding(ProbeId::Canvas, encoding, features).await)
    }
}

/// Create the offscreen surface, or `None` when the platform cannot.
#[cfg(target_arch = "wasm32")]
fn acquire_surface() -> Option<web_sys::CanvasRenderingContext2d> {
    use wasm_bindgen::JsCast;

    let document = web_sys::window()?.document()?;
    let canvas: web_sys::HtmlCanvasElement = document
        .create_element("canvas")
        .ok()?
        .dyn_into()
        .ok()?;
    canvas.set_width(SURFACE_WIDTH);
    canvas.set_height(SURFACE_HEIGHT);

    canvas.get_context("2d").ok()??.dyn_into().ok()
}

#[cfg(target_arch = "wasm32")]
fn render_and_encode(
    ctx: &web_sys::CanvasRenderingContext2d,
) -> std::result::Result<(Vec<u8>, BTreeMap<String, String>), wasm_bindgen::JsValue> {
    let w = SURFACE_WIDTH as f64;
    let h = SURFACE_HEIGHT as f64;

    ctx.set_text_baseline("alphabetic");

    // Text metrics first, while the font state is clean
    let mut features = BTreeMap::new();
    ctx.set_font("14px Arial");
    let text_width = ctx.measure_text(SAMPLE_TEXT)?.width();
    let emoji_width = ctx.measure_text(EMOJI_TEXT)?.width();
    features.insert("textWidth".to_string(), format!("{:.2}", text_width));
    features.insert("emojiWidth".to_string(), format!("{:.2}", emoji_width));
    features.insert("width".to_string(), SURFACE_WIDTH.to_string());
    features.insert("height".to_string(), SURFACE_HEIGHT.to_string());

    // Fixed gradient backdrop
    let gradient = ctx.create_linear_gradient(0.0, 0.0, w, h);
    gradient.add_color_stop(0.0, "#f60")?;
    gradient.add_color_stop(0.5, "#069")?;
    gradient.add_color_stop(1.0, "#fff")?;
    ctx.set_fill_style_canvas_gradient(&gradient);
    ctx.fill_rect(0.0, 0.0, w, h);

    // Two text passes in different fonts, then the emoji glyphs
    ctx.set_fill_style_str("#069");
    ctx.set_font("14px Arial");
    ctx.fill_text(SAMPLE_TEXT, 2.0, 18.0)?;

    ctx.set_fill_style_str("rgba(102, 204, 0, 0.7)");
    ctx.set_font("18px Times New Roman");
    ctx.fill_text(SAMPLE_TEXT, 4.0, 42.0)?;
    ctx.fill_text(EMOJI_TEXT, 200.0, 56.0)?;

    let image = ctx.get_image_data(0.0, 0.0, w, h)?;
    let rgba = image.data().0;
    let encoding = encode_pixels(SURFACE_WIDTH, SURFACE_HEIGHT, &rgba);

    Ok((encoding, features))
}
