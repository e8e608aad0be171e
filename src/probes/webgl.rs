//! WebGL parameter probe
//!
//! Reads the vendor/renderer/version strings the 3D capability reports,
//! preferring the unmasked values exposed by `WEBGL_debug_renderer_info`
//! when the extension is present. The canonical encoding is the pipe-joined
//! sequence of those strings in a fixed position order, so an absent value
//! still occupies its slot as an empty string.

/// Field order of the canonical encoding.
pub const ENCODING_FIELDS: usize = 6;

/// Join parameter values in their fixed positions.
pub fn encode_parameters(values: &[String; ENCODING_FIELDS]) -> Vec<u8> {
    values.join("|").into_bytes()
}

/// Probe over the WebGL rendering capability.
#[derive(Debug, Default)]
pub struct WebGlProbe;

impl WebGlProbe {
    pub fn new() -> Self {
        WebGlProbe
    }
}

#[cfg(target_arch = "wasm32")]
mod platform {
    use std::collections::BTreeMap;

    use async_trait::async_trait;
    use wasm_bindgen::{JsCast, JsValue};
    use web_sys::WebGlRenderingContext;

    use crate::error::Result;
    use crate::probes::{CapabilityProbe, ProbeId, ProbeResult};

    use super::{encode_parameters, WebGlProbe};

    // WEBGL_debug_renderer_info constants; not surfaced by web-sys
    const UNMASKED_VENDOR_WEBGL: u32 = 0x9245;
    const UNMASKED_RENDERER_WEBGL: u32 = 0x9246;

    #[async_trait(?Send)]
    impl CapabilityProbe for WebGlProbe {
        fn id(&self) -> ProbeId {
            ProbeId::WebGl
        }

        async fn detect(&mut self) -> Result<ProbeResult> {
            let gl = match acquire_context() {
                Some(gl) => gl,
                None => {
                    log::debug!("webgl: 3D rendering capability absent");
                    return Ok(ProbeResult::unsupported(ProbeId::WebGl));
                }
            };

            let vendor = string_parameter(&gl, WebGlRenderingContext::VENDOR);
            let renderer = string_parameter(&gl, WebGlRenderingContext::RENDERER);
            let version = string_parameter(&gl, WebGlRenderingContext::VERSION);
            let shading =
                string_parameter(&gl, WebGlRenderingContext::SHADING_LANGUAGE_VERSION);

            // Unmasked strings only resolve once the debug extension loads
            let has_debug_ext = matches!(
                gl.get_extension("WEBGL_debug_renderer_info"),
                Ok(Some(_))
            );
            let (unmasked_vendor, unmasked_renderer) = if has_debug_ext {
                (
                    string_parameter(&gl, UNMASKED_VENDOR_WEBGL),
                    string_parameter(&gl, UNMASKED_RENDERER_WEBGL),
                )
            } else {
                (String::new(), String::new())
            };

            let mut features = BTreeMap::new();
            features.insert(
                "vendor".to_string(),
                pick_display(&unmasked_vendor, &vendor),
            );
            features.insert(
                "renderer".to_string(),
                pick_display(&unmasked_renderer, &renderer),
            );

            let encoding = encode_parameters(&[
                vendor,
                renderer,
                version,
                shading,
                unmasked_vendor,
                unmasked_renderer,
            ]);

            Ok(ProbeResult::from_encoding(ProbeId::WebGl, encoding, features).await)
        }
    }

    fn acquire_context() -> Option<WebGlRenderingContext> {
        let document = web_sys::window()?.document()?;
        let canvas: web_sys::HtmlCanvasElement = document
            .create_element("canvas")
            .ok()?
            .dyn_into()
            .ok()?;
        canvas.get_context("webgl").ok()??.dyn_into().ok()
    }

    fn string_parameter(gl: &WebGlRenderingContext, pname: u32) -> String {
        gl.get_parameter(pname)
            .ok()
            .as_ref()
            .and_then(JsValue::as_string)
            .unwrap_or_default()
    }

    fn pick_display(unmasked: &str, masked: &str) -> String {
        if unmasked.is_empty() {
            masked.to_string()
        } else {
            unmasked.to_string()
        }
    }
}
