//! V4L2 webcam access.
//!
//! Only V4L2 `VIDEO_CAPTURE` devices yielding JFIF JPEG or Motion JPEG frames with a discrete set
//! of frame sizes are supported.

use std::env;

use anyhow::bail;
use image::RgbaImage;
use linuxvideo::{
    format::{FrameSizes, PixFormat, Pixelformat},
    stream::ReadStream,
    BufType, CapabilityFlags, Device,
};

use crate::{resolution::Resolution, timer::Timer};

const ENV_VAR_WEBCAM_NAME: &str = "HANDSTEER_WEBCAM_NAME";

/// Options for opening a [`Webcam`].
pub struct WebcamOptions {
    name: Option<String>,
    resolution: Resolution,
}

impl Default for WebcamOptions {
    fn default() -> Self {
        Self {
            name: None,
            resolution: Resolution::RES_VGA,
        }
    }
}

impl WebcamOptions {
    /// Sets the name of the webcam device to open.
    ///
    /// If no webcam with the given name can be found, opening the webcam will result in an error.
    #[inline]
    pub fn name(self, name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..self
        }
    }

    /// Sets the resolution to request. Defaults to `640x480`.
    ///
    /// See [`pick_resolution`] for what happens if the camera does not offer it.
    #[inline]
    pub fn resolution(mut self, resolution: Resolution) -> Self {
        self.resolution = resolution;
        self
    }
}

/// Picks the frame size closest to `wanted` from the sizes a camera `offers`.
///
/// An exact match wins. Otherwise the smallest offered size that fully contains `wanted` is used,
/// and if there is none, the largest offered size.
pub fn pick_resolution(offers: &[Resolution], wanted: Resolution) -> Option<Resolution> {
    if offers.contains(&wanted) {
        return Some(wanted);
    }

    offers
        .iter()
        .filter(|res| res.contains(wanted))
        .min_by_key(|res| res.num_pixels())
        .or_else(|| offers.iter().max_by_key(|res| res.num_pixels()))
        .copied()
}

fn negotiate_format(device: &Device, wanted: Resolution) -> anyhow::Result<PixFormat> {
    let mut pixel_format = None;
    for format in device.formats(BufType::VIDEO_CAPTURE) {
        let format = format?;
        if format.pixelformat() == Pixelformat::JPEG || format.pixelformat() == Pixelformat::MJPG {
            pixel_format = Some(format.pixelformat());
            break;
        }
    }

    let Some(pixel_format) = pixel_format else {
        bail!("no supported pixel format found");
    };

    let offers = match device.frame_sizes(pixel_format)? {
        FrameSizes::Discrete(sizes) => sizes
            .iter()
            .map(|size| Resolution::new(size.width(), size.height()))
            .collect::<Vec<_>>(),
        FrameSizes::Stepwise(_) | FrameSizes::Continuous(_) => {
            bail!("stepwise or continuous resolutions are not supported");
        }
    };
    log::trace!("offered frame sizes: {:?}", offers);

    let Some(res) = pick_resolution(&offers, wanted) else {
        bail!("device does not offer any frame size");
    };
    if res != wanted {
        log::debug!("{} not available, using {}", wanted, res);
    }

    Ok(PixFormat::new(res.width(), res.height(), pixel_format))
}

/// A webcam yielding a stream of RGBA frames.
///
/// The device is closed when the [`Webcam`] is dropped.
pub struct Webcam {
    stream: ReadStream,
    resolution: Resolution,
    t_dequeue: Timer,
    t_decode: Timer,
}

impl Webcam {
    /// Opens the first supported webcam found.
    ///
    /// This function can block for a significant amount of time while the webcam initializes (on
    /// the order of hundreds of milliseconds).
    pub fn open(options: WebcamOptions) -> anyhow::Result<Self> {
        if let Ok(name) = env::var(ENV_VAR_WEBCAM_NAME) {
            log::debug!(
                "webcam override: `{}` is set to '{}'",
                ENV_VAR_WEBCAM_NAME,
                name,
            );
        }
        for res in linuxvideo::list()? {
            match res {
                Ok(dev) => match Self::open_impl(dev, &options) {
                    Ok(Some(webcam)) => return Ok(webcam),
                    Ok(None) => {}
                    Err(e) => {
                        log::debug!("{}", e);
                    }
                },
                Err(e) => {
                    log::warn!("{}", e);
                }
            }
        }

        bail!("no supported webcam device found")
    }

    fn open_impl(dev: Device, options: &WebcamOptions) -> anyhow::Result<Option<Self>> {
        let caps = dev.capabilities()?;
        let cam_name_from_env = env::var(ENV_VAR_WEBCAM_NAME).ok();
        if let Some(name) = options.name.as_deref().or(cam_name_from_env.as_deref()) {
            if caps.card() != name {
                return Ok(None);
            }
        }

        let cap_flags = caps.device_capabilities();
        let path = dev.path()?;
        log::debug!(
            "device {} ({}) capabilities: {:?}",
            caps.card(),
            path.display(),
            cap_flags,
        );

        if !cap_flags.contains(CapabilityFlags::VIDEO_CAPTURE) {
            return Ok(None);
        }

        let pixfmt = negotiate_format(&dev, options.resolution)?;
        let capture = dev.video_capture(pixfmt)?;

        let format = capture.format();
        let resolution = Resolution::new(format.width(), format.height());
        log::info!("opened {} ({}) at {}", caps.card(), path.display(), resolution);

        let stream = capture.into_stream(2)?;

        Ok(Some(Self {
            stream,
            resolution,
            t_dequeue: Timer::new("dequeue"),
            t_decode: Timer::new("decode"),
        }))
    }

    /// Returns the size of the frames this webcam delivers.
    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Reads the next frame from the camera.
    ///
    /// Blocks until a frame is available. An error means the stream is unusable; a frame that
    /// arrives but fails to decode is logged and replaced by a blank frame instead.
    pub fn read(&mut self) -> anyhow::Result<RgbaImage> {
        let dequeue_guard = self.t_dequeue.start();
        let resolution = self.resolution;
        let t_decode = &self.t_decode;
        self.stream
            .dequeue(|buf| {
                drop(dequeue_guard);
                let decoded = t_decode.time(|| {
                    image::load_from_memory_with_format(&buf, image::ImageFormat::Jpeg)
                });
                let image = match decoded {
                    Ok(image) => image.to_rgba8(),
                    Err(e) => {
                        // Webcams occasionally produce corrupted MJPG frames. A blank frame reads
                        // as "no hand" and keeps the loop going.
                        log::error!("webcam decode error: {}", e);
                        RgbaImage::new(resolution.width(), resolution.height())
                    }
                };
                Ok(image)
            })
            .map_err(Into::into)
    }

    /// Returns profiling timers for webcam access and decoding.
    pub fn timers(&self) -> impl Iterator<Item = &Timer> + '_ {
        [&self.t_dequeue, &self.t_decode].into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn res(width: u32, height: u32) -> Resolution {
        Resolution::new(width, height)
    }

    #[test]
    fn exact_match() {
        let offers = [res(1280, 720), res(640, 480), res(320, 240)];
        assert_eq!(
            pick_resolution(&offers, Resolution::RES_VGA),
            Some(Resolution::RES_VGA)
        );
    }

    #[test]
    fn smallest_larger() {
        let offers = [res(1920, 1080), res(800, 600), res(1280, 720), res(320, 240)];
        assert_eq!(
            pick_resolution(&offers, Resolution::RES_VGA),
            Some(res(800, 600))
        );
    }

    #[test]
    fn largest_if_all_smaller() {
        let offers = [res(160, 120), res(320, 240), res(640, 360)];
        assert_eq!(
            pick_resolution(&offers, Resolution::RES_VGA),
            Some(res(640, 360))
        );
    }

    #[test]
    fn nothing_offered() {
        assert_eq!(pick_resolution(&[], Resolution::RES_VGA), None);
    }
}
