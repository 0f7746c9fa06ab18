//! Orbit viewer
//!
//! Drives the frame pipeline on the headless device: a background thread
//! plays the GPU and retires frames after a randomized latency, a scripted
//! input stream steers the camera and the selected item, and one sphere
//! orbits the scene so its object record stays dirty every frame.
//!
//! Usage: `orbit_viewer [config.toml|config.ron]`

mod scene;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use frame_pipeline::config::ConfigError;
use frame_pipeline::foundation::logging;
use frame_pipeline::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const DEFAULT_CONFIG_PATH: &str = "orbit_viewer.toml";

/// Viewer settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ViewerConfig {
    /// Frames to render before exiting
    pub frames: u64,
    /// Simulated CPU time per frame in milliseconds
    pub frame_interval_ms: u64,
    /// Average simulated GPU time per frame, in frame intervals
    pub gpu_latency_frames: f32,
    /// PNG used for the floor texture; a checkerboard when unset
    pub texture: Option<PathBuf>,
    /// Frame pipeline settings
    pub renderer: RendererConfig,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            frames: 600,
            frame_interval_ms: 4,
            gpu_latency_frames: 1.5,
            texture: None,
            renderer: RendererConfig::default(),
        }
    }
}

impl Config for ViewerConfig {}

impl ViewerConfig {
    fn validate(&self) -> Result<(), ViewerError> {
        if !(self.gpu_latency_frames >= 0.0 && self.gpu_latency_frames.is_finite()) {
            return Err(ViewerError::InvalidConfig(format!(
                "gpu_latency_frames must be a non-negative number, got {}",
                self.gpu_latency_frames
            )));
        }
        Ok(())
    }

    /// Mean simulated GPU time per frame
    fn gpu_frame_time(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms.max(1)).mul_f32(self.gpu_latency_frames)
    }
}

/// Viewer errors
#[derive(Error, Debug)]
enum ViewerError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid viewer config: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("Failed to start GPU timeline thread: {0}")]
    Thread(#[from] std::io::Error),
}

/// Scripted input for frame `frame` of a `total`-frame run
fn scripted_event(frame: u64, total: u64, config: &RendererConfig) -> Option<InputEvent> {
    if frame == total / 2 {
        return Some(InputEvent::Resized {
            width: config.surface_width * 5 / 4,
            height: config.surface_height * 5 / 4,
        });
    }

    match frame % 240 {
        // Drag the camera a quarter turn
        0..=59 => Some(InputEvent::PointerMoved {
            x: (frame % 240) as f32 * 6.0,
            y: 300.0 + (frame % 60) as f32,
            dragging: frame % 240 != 0,
        }),
        80 => Some(InputEvent::Wheel { delta: -2.0 }),
        120 => Some(InputEvent::Key {
            code: KeyCode::Tab,
            pressed: true,
        }),
        140 | 150 | 160 => Some(InputEvent::Key {
            code: KeyCode::Right,
            pressed: true,
        }),
        180 => Some(InputEvent::Key {
            code: KeyCode::Q,
            pressed: true,
        }),
        200 => Some(InputEvent::Wheel { delta: 2.0 }),
        _ => None,
    }
}

fn load_texture(config: &ViewerConfig) -> RenderResult<TextureData> {
    match &config.texture {
        Some(path) => {
            log::info!("Loading floor texture from {}", path.display());
            TextureData::from_png_file(path)
        }
        None => Ok(TextureData::checkerboard(64, 8, [220, 220, 220, 255], [40, 40, 48, 255])),
    }
}

fn run(config: &ViewerConfig) -> Result<(), ViewerError> {
    config.validate()?;

    let timeline = SimulatedTimeline::new(false);
    let mean = config.gpu_frame_time();
    let mut rng = StdRng::from_entropy();
    // Declared before the renderer so frames still retire while it drops
    let _gpu = RetirementThread::spawn(Arc::clone(&timeline), move || mean.mul_f32(rng.gen_range(0.5..1.5)))?;

    let assets = scene::build(load_texture(config)?)?;
    let mut renderer = FrameRenderer::new(HeadlessDevice::with_timeline(timeline), &config.renderer, assets)?;
    let orbiter = renderer
        .catalog()
        .find_item(scene::ORBITER)
        .ok_or_else(|| RenderError::InvalidConfig(format!("scene has no '{}' item", scene::ORBITER)))?;

    log::info!(
        "Rendering {} frames with {} frame slots (GPU ~{:.1} ms per frame)",
        config.frames,
        config.renderer.frame_resource_count,
        mean.as_secs_f32() * 1000.0
    );

    let mut input = InputController::default();
    let mut timer = FrameTimer::new();
    let mut stalls = 0u64;
    let mut uploads = 0usize;

    for frame in 0..config.frames {
        if let Some(event) = scripted_event(frame, config.frames, &config.renderer) {
            if renderer.handle_input(&mut input, event)? == InputResponse::Quit {
                log::info!("Quit requested");
                break;
            }
        }

        let timing = timer.tick();
        if let Some(item) = renderer.catalog_mut().item_mut(orbiter) {
            item.set_transform(scene::orbit_transform(timing.total));
        }
        if frame % 30 == 0 {
            renderer
                .catalog_mut()
                .set_material_params(scene::PULSE_MATERIAL, scene::pulse_params(timing.total))?;
        }

        let receipt = renderer.render_frame(timing)?;
        if receipt.waited {
            stalls += 1;
        }
        uploads += receipt.uploads.objects + receipt.uploads.materials;

        if let Some(stats) = timer.take_stats() {
            log::info!(
                "{:.1} fps ({:.2} ms/frame), {} stalls, {} record uploads, {} draws in last frame",
                stats.fps,
                stats.ms_per_frame,
                stalls,
                uploads,
                receipt.draws.draw_calls
            );
            stalls = 0;
            uploads = 0;
        }

        std::thread::sleep(Duration::from_millis(config.frame_interval_ms));
    }

    renderer.shutdown()?;
    log::info!(
        "Rendered {} frames, completion value {}",
        renderer.frames_rendered(),
        renderer.completion_counter().last_signaled()
    );
    Ok(())
}

fn main() {
    let path = std::env::args()
        .nth(1)
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);

    let config = match ViewerConfig::load_or_default(&path) {
        Ok(config) => config,
        Err(e) => {
            logging::init();
            log::error!("Failed to load {}: {}", path.display(), e);
            std::process::exit(1);
        }
    };
    logging::init_with_level(&config.renderer.log_level);

    if let Err(e) = run(&config) {
        log::error!("Orbit viewer failed: {}", e);
        std::process::exit(1);
    }
}
