//! Audio subsystem probe
//!
//! Renders a fixed oscillator-through-compressor graph in an offline audio
//! context and sums the tail of the produced samples. The sample rate plus
//! that sum characterize the host's audio processing pipeline. The offline
//! context is scoped to the probe call.

/// Fixed rendering parameters.
pub const CHANNELS: u32 = 1;
pub const FRAMES: u32 = 5000;
pub const SAMPLE_RATE: f32 = 44100.0;
pub const OSCILLATOR_HZ: f32 = 10_000.0;

/// First frame of the summed tail segment; the head of the buffer is
/// dominated by the compressor's attack ramp and less stable.
pub const TAIL_START: usize = 4500;

/// Canonical encoding: sample rate and the fixed-precision tail sum in
/// fixed positions.
pub fn encode_signature(sample_rate: f32, tail_sum: f64) -> Vec<u8> {
    format!("sampleRate:{}|sum:{:.5}", sample_rate, tail_sum).into_bytes()
}

/// Sum of absolute sample values from `TAIL_START` on.
pub fn tail_sum(samples: &[f32]) -> f64 {
    samples
        .iter()
        .skip(TAIL_START)
        .map(|s| s.abs() as f64)
        .sum()
}

/// Probe over the audio processing capability.
#[derive(Debug, Default)]
pub struct AudioProbe;

impl AudioProbe {
    pub fn new() -> Self {
        AudioProbe
    }
}

#[cfg(target_arch = "wasm32")]
mod platform {
    use std::collections::BTreeMap;

    use async_trait::async_trait;
    use wasm_bindgen::JsCast;
    use wasm_bindgen_futures::JsFuture;
    use web_sys::{AudioBuffer, OfflineAudioContext, OscillatorType};

    use crate::error::{Result, ScanError};
    use crate::probes::{CapabilityProbe, ProbeId, ProbeResult};

    use super::*;

    #[async_trait(?Send)]
    impl CapabilityProbe for AudioProbe {
        fn id(&self) -> ProbeId {
            ProbeId::Audio
        }

        async fn detect(&mut self) -> Result<ProbeResult> {
            let ctx = match OfflineAudioContext::new_with_number_of_channels_and_length_and_sample_rate(
                CHANNELS,
                FRAMES,
                SAMPLE_RATE,
            ) {
                Ok(ctx) => ctx,
                Err(_) => {
                    log::debug!("audio: offline audio capability absent");
                    return Ok(ProbeResult::unsupported(ProbeId::Audio));
                }
            };

            let buffer = render(&ctx)
                .await
                .map_err(|e| ScanError::probe_fault("audio", &e))?;

            let samples = buffer
                .get_channel_data(0)
                .map_err(|e| ScanError::probe_fault("audio", &e))?;
            let sum = tail_sum(&samples);
            let sample_rate = buffer.sample_rate();

            let mut features = BTreeMap::new();
            features.insert("sampleRate".to_string(), format!("{}", sample_rate));

            let encoding = encode_signature(sample_rate, sum);
            Ok(ProbeResult::from_encoding(ProbeId::Audio, encoding, features).await)
        }
    }

    /// Build the fixed graph and render it to completion.
    async fn render(
        ctx: &OfflineAudioContext,
    ) -> std::result::Result<AudioBuffer, wasm_bindgen::JsValue> {
        let oscillator = ctx.create_oscillator()?;
        oscillator.set_type(OscillatorType::Triangle);
        oscillator.frequency().set_value(OSCILLATOR_HZ);

        let compressor = ctx.create_dynamics_compressor()?;
        oscillator.connect_with_audio_node(&compressor)?;
        compressor.connect_with_audio_node(&ctx.destination())?;
        oscillator.start()?;

        let rendered = JsFuture::from(ctx.start_rendering()?).await?;
        rendered.dyn_into::<AudioBuffer>()
    }
}
