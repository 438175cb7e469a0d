//! Frame acquisition.
//!
//! One session owns one camera. Sources:
//! - V4L2 devices (feature: camera-v4l2)
//! - Synthetic `stub://` source (tests, development)
//!
//! Both produce full RGB `Frame`s for the session loop. The camera handle is
//! released exactly once, when the source is dropped at session end.

use anyhow::Result;

use crate::frame::Frame;

#[cfg(feature = "camera-v4l2")]
mod v4l2;

/// Configuration for a camera source.
#[derive(Clone, Debug)]
pub struct CameraConfig {
    /// Device path (e.g. "/dev/video0") or "stub://name" for synthetic.
    pub device: String,
    /// Target frame rate. The session loop paces itself to this.
    pub target_fps: u32,
    /// Preferred frame width.
    pub width: u32,
    /// Preferred frame height.
    pub height: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device: "stub://camera".to_string(),
            target_fps: 30,
            width: 1280,
            height: 720,
        }
    }
}

impl From<&crate::config::CameraSettings> for CameraConfig {
    fn from(settings: &crate::config::CameraSettings) -> Self {
        Self {
            device: settings.device.clone(),
            target_fps: settings.target_fps,
            width: settings.width,
            height: settings.height,
        }
    }
}

/// Camera source with a synthetic fallback for `stub://` devices.
pub struct CameraSource {
    backend: CameraBackend,
}

enum CameraBackend {
    Synthetic(SyntheticCamera),
    #[cfg(feature = "camera-v4l2")]
    Device(v4l2::DeviceCamera),
}

impl CameraSource {
    pub fn new(config: CameraConfig) -> Result<Self> {
        if config.device.starts_with("stub://") {
            Ok(Self {
                backend: CameraBackend::Synthetic(SyntheticCamera::new(config)),
            })
        } else {
            #[cfg(feature = "camera-v4l2")]
            {
                Ok(Self {
                    backend: CameraBackend::Device(v4l2::DeviceCamera::new(config)?),
                })
            }
            #[cfg(not(feature = "camera-v4l2"))]
            {
                anyhow::bail!("real camera devices require the camera-v4l2 feature")
            }
        }
    }

    /// Open the device and negotiate the capture format.
    pub fn connect(&mut self) -> Result<()> {
        match &mut self.backend {
            CameraBackend::Synthetic(camera) => camera.connect(),
            #[cfg(feature = "camera-v4l2")]
            CameraBackend::Device(camera) => camera.connect(),
        }
    }

    /// Capture the next frame. A failure here is fatal to the session.
    pub fn next_frame(&mut self) -> Result<Frame> {
        match &mut self.backend {
            CameraBackend::Synthetic(camera) => camera.next_frame(),
            #[cfg(feature = "camera-v4l2")]
            CameraBackend::Device(camera) => camera.next_frame(),
        }
    }

    pub fn is_healthy(&self) -> bool {
        match &self.backend {
            CameraBackend::Synthetic(camera) => camera.is_healthy(),
            #[cfg(feature = "camera-v4l2")]
            CameraBackend::Device(camera) => camera.is_healthy(),
        }
    }

    pub fn stats(&self) -> CameraStats {
        match &self.backend {
            CameraBackend::Synthetic(camera) => camera.stats(),
            #[cfg(feature = "camera-v4l2")]
            CameraBackend::Device(camera) => camera.stats(),
        }
    }
}

/// Capture statistics.
#[derive(Clone, Debug)]
pub struct CameraStats {
    pub frames_captured: u64,
    pub device: String,
}

// ----------------------------------------------------------------------------
// Synthetic camera (stub://)
// ----------------------------------------------------------------------------

struct SyntheticCamera {
    config: CameraConfig,
    frame_count: u64,
    /// Simulated scene state; changes periodically so downstream crops vary.
    scene_state: u8,
}

impl SyntheticCamera {
    fn new(config: CameraConfig) -> Self {
        Self {
            config,
            frame_count: 0,
            scene_state: 0,
        }
    }

    fn connect(&mut self) -> Result<()> {
        log::info!("CameraSource: connected to {} (synthetic)", self.config.device);
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Frame> {
        self.frame_count += 1;
        if self.frame_count % 50 == 0 {
            self.scene_state = self.scene_state.wrapping_add(1);
        }
        let pixels = self.generate_pixels();
        Frame::new(pixels, self.config.width, self.config.height)
    }

    /// Deterministic blocky background with a bright "visitor" square whose
    /// position depends on the scene state, so consecutive scenes produce
    /// distinguishable crops. Blocks are 8x8-aligned and shades sit well
    /// inside histogram buckets, so the pattern survives a JPEG round trip.
    fn generate_pixels(&self) -> Vec<u8> {
        const SHADES: [u8; 4] = [16, 80, 144, 208];

        let width = self.config.width as usize;
        let height = self.config.height as usize;
        let mut pixels = vec![0u8; width * height * 3];

        for y in 0..height {
            for x in 0..width {
                let shade = SHADES[(x / 8 + y / 8 + self.scene_state as usize) % SHADES.len()];
                let offset = (y * width + x) * 3;
                pixels[offset] = shade;
                pixels[offset + 1] = shade;
                pixels[offset + 2] = shade;
            }
        }

        // Visitor square, one quarter of the smaller dimension.
        let side = (width.min(height) / 4).max(1);
        let x0 = (self.scene_state as usize * 13) % (width.saturating_sub(side).max(1));
        let y0 = (self.scene_state as usize * 7) % (height.saturating_sub(side).max(1));
        for y in y0..(y0 + side).min(height) {
            for x in x0..(x0 + side).min(width) {
                let offset = (y * width + x) * 3;
                pixels[offset] = 230;
                pixels[offset + 1] = 180;
                pixels[offset + 2] = 150;
            }
        }

        pixels
    }

    fn is_healthy(&self) -> bool {
        true
    }

    fn stats(&self) -> CameraStats {
        CameraStats {
            frames_captured: self.frame_count,
            device: self.config.device.clone(),
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn stub_config() -> CameraConfig {
        CameraConfig {
            device: "stub://test".to_string(),
            target_fps: 30,
            width: 64,
            height: 48,
        }
    }

    #[test]
    fn synthetic_camera_produces_frames() -> Result<()> {
        let mut camera = CameraSource::new(stub_config())?;
        camera.connect()?;

        let frame = camera.next_frame()?;
        assert_eq!(frame.width, 64);
        assert_eq!(frame.height, 48);
        assert!(camera.is_healthy());
        Ok(())
    }

    #[test]
    fn synthetic_camera_counts_captures() -> Result<()> {
        let mut camera = CameraSource::new(stub_config())?;
        camera.connect()?;

        camera.next_frame()?;
        camera.next_frame()?;
        camera.next_frame()?;
        assert_eq!(camera.stats().frames_captured, 3);
        Ok(())
    }

    #[cfg(not(feature = "camera-v4l2"))]
    #[test]
    fn real_device_requires_feature() {
        let config = CameraConfig {
            device: "/dev/video0".to_string(),
            ..stub_config()
        };
        assert!(CameraSource::new(config).is_err());
    }
}
