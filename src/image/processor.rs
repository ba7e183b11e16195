use super::VariantRenderer;
use crate::models::{Dimensions, ImagePolicy, RenderedVariants};
use crate::{Error, Result};
use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageFormat, ImageResult, Rgb, RgbImage};
use std::io::Cursor;
use std::sync::Arc;

const WHITE: Rgb<u8> = Rgb([255, 255, 255]);

pub struct ImageProcessor {
    policy: Arc<ImagePolicy>,
}

impl ImageProcessor {
    pub fn new(policy: Arc<ImagePolicy>) -> Self {
        Self { policy }
    }

    fn render_sync(
        policy: &ImagePolicy,
        image_data: &[u8],
        format: ImageFormat,
    ) -> Result<RenderedVariants> {
        let img = image::load_from_memory(image_data).map_err(Error::ImageDecode)?;

        let mut rendered = RenderedVariants::new();
        for size in &policy.sizes {
            let variant = match size.target {
                Some(target) => fit_and_pad(&img, target),
                None => img.clone(),
            };
            let bytes =
                encode(&variant, format, policy).map_err(|source| Error::ImageEncode {
                    size_class: size.class.to_string(),
                    source,
                })?;
            tracing::debug!(
                "Rendered {} variant: {}x{}, {} bytes",
                size.class,
                variant.width(),
                variant.height(),
                bytes.len()
            );
            rendered.insert(size.class, bytes);
        }

        Ok(rendered)
    }
}

#[async_trait]
impl VariantRenderer for ImageProcessor {
    async fn render(&self, image_data: &[u8], extension: &str) -> Result<RenderedVariants> {
        let format = ImageFormat::from_extension(extension).ok_or_else(|| {
            Error::UnsupportedFormat {
                filename: format!(".{}", extension),
            }
        })?;

        tokio::task::spawn_blocking({
            let policy = Arc::clone(&self.policy);
            let image_data = image_data.to_vec();
            move || Self::render_sync(&policy, &image_data, format)
        })
        .await
        .map_err(|e| Error::Invariant(format!("Image rendering task join error: {}", e)))?
    }
}

/// Scale to fit inside `target` keeping the aspect ratio, then center on a
/// white canvas of exactly `target` when the scaled image falls short.
pub fn fit_and_pad(img: &DynamicImage, target: Dimensions) -> DynamicImage {
    let resized = img.resize(target.width, target.height, FilterType::Lanczos3);
    if resized.width() == target.width && resized.height() == target.height {
        return resized;
    }

    let mut canvas = DynamicImage::ImageRgb8(RgbImage::from_pixel(
        target.width,
        target.height,
        WHITE,
    ));
    let x = target.width.saturating_sub(resized.width()) / 2;
    let y = target.height.saturating_sub(resized.height()) / 2;
    imageops::overlay(&mut canvas, &resized, i64::from(x), i64::from(y));
    canvas
}

/// JPEG carries no alpha: composite transparency onto white and drop to RGB.
pub fn flatten_for_jpeg(img: &DynamicImage) -> DynamicImage {
    if img.color().has_alpha() {
        let mut background =
            DynamicImage::ImageRgb8(RgbImage::from_pixel(img.width(), img.height(), WHITE));
        imageops::overlay(&mut background, img, 0, 0);
        background
    } else if let DynamicImage::ImageRgb8(_) = img {
        img.clone()
    } else {
        DynamicImage::ImageRgb8(img.to_rgb8())
    }
}

fn png_compression(level: u8) -> CompressionType {
    if level == 0 {
        CompressionType::Uncompressed
    } else {
        CompressionType::Level(level.min(9))
    }
}

fn encode(img: &DynamicImage, format: ImageFormat, policy: &ImagePolicy) -> ImageResult<Vec<u8>> {
    let mut buf = Vec::new();
    match format {
        ImageFormat::Jpeg => {
            let encoder = JpegEncoder::new_with_quality(&mut buf, policy.jpeg_quality);
            flatten_for_jpeg(img).write_with_encoder(encoder)?;
        }
        ImageFormat::Png => {
            let encoder = PngEncoder::new_with_quality(
                &mut buf,
                png_compression(policy.png_compression),
                PngFilter::Adaptive,
            );
            img.write_with_encoder(encoder)?;
        }
        // gif, webp and bmp use their encoder defaults, which only take 8-bit
        // RGB(A); gif wants RGBA.
        other => {
            let img = if other == ImageFormat::Gif || img.color().has_alpha() {
                DynamicImage::ImageRgba8(img.to_rgba8())
            } else {
                DynamicImage::ImageRgb8(img.to_rgb8())
            };
            img.write_to(&mut Cursor::new(&mut buf), other)?;
        }
    }
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SizeClass;
    use image::{GenericImageView, Rgba, RgbaImage};

    fn encode_test_image(img: DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), format).unwrap();
        bytes
    }

    fn red_image(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            width,
            height,
            Rgba([255, 0, 0, 255]),
        ))
    }

    fn processor() -> ImageProcessor {
        ImageProcessor::new(Arc::new(ImagePolicy::default()))
    }

    fn assert_red(img: &DynamicImage, x: u32, y: u32) {
        let p = img.get_pixel(x, y);
        assert!(p[0] > 240 && p[1] < 15 && p[2] < 15, "({}, {}) = {:?}", x, y, p);
    }

    fn assert_white(img: &DynamicImage, x: u32, y: u32) {
        let p = img.get_pixel(x, y);
        assert!(
            p[0] > 245 && p[1] > 245 && p[2] > 245,
            "({}, {}) = {:?}",
            x,
            y,
            p
        );
    }

    #[tokio::test]
    async fn test_every_size_class_rendered_at_exact_box() {
        let policy = ImagePolicy::default();
        let data = encode_test_image(red_image(400, 200), ImageFormat::Png);

        let rendered = processor().render(&data, "png").await.unwrap();
        assert_eq!(rendered.len(), policy.sizes.len());

        for size in &policy.sizes {
            let img = image::load_from_memory(rendered.get(size.class).unwrap()).unwrap();
            match size.target {
                Some(target) => {
                    assert_eq!((img.width(), img.height()), (target.width, target.height))
                }
                None => assert_eq!((img.width(), img.height()), (400, 200)),
            }
        }
    }

    #[tokio::test]
    async fn test_letterbox_is_centered_on_one_axis() {
        let data = encode_test_image(red_image(400, 200), ImageFormat::Png);

        let rendered = processor().render(&data, "png").await.unwrap();
        let thumb =
            image::load_from_memory(rendered.get(SizeClass::Thumbnail).unwrap()).unwrap();

        // 400x200 scales to 300x150, leaving 75px bands above and below.
        assert_white(&thumb, 150, 0);
        assert_white(&thumb, 150, 74);
        assert_red(&thumb, 150, 76);
        assert_red(&thumb, 150, 223);
        assert_white(&thumb, 150, 225);
        assert_white(&thumb, 150, 299);
        assert_red(&thumb, 0, 150);
        assert_red(&thumb, 299, 150);
    }

    #[test]
    fn test_letterbox_odd_remainder_uses_floor_offset() {
        let target = Dimensions::new(300, 300);

        // 199 spare rows: 99 above, 100 below.
        let wide = fit_and_pad(&red_image(300, 101), target);
        assert_eq!(wide.dimensions(), (300, 300));
        assert_white(&wide, 150, 98);
        assert_red(&wide, 150, 99);
        assert_red(&wide, 150, 199);
        assert_white(&wide, 150, 200);
        assert_red(&wide, 0, 150);

        // Same split on the horizontal axis.
        let tall = fit_and_pad(&red_image(101, 300), target);
        assert_eq!(tall.dimensions(), (300, 300));
        assert_white(&tall, 98, 150);
        assert_red(&tall, 99, 150);
        assert_red(&tall, 199, 150);
        assert_white(&tall, 200, 150);
        assert_red(&tall, 150, 0);
    }

    #[tokio::test]
    async fn test_small_image_is_scaled_up_to_fit() {
        let data = encode_test_image(red_image(10, 10), ImageFormat::Png);

        let rendered = processor().render(&data, "png").await.unwrap();
        let medium = image::load_from_memory(rendered.get(SizeClass::Medium).unwrap()).unwrap();

        assert_eq!(medium.dimensions(), (600, 600));
        assert_red(&medium, 0, 0);
        assert_red(&medium, 599, 599);
    }

    #[tokio::test]
    async fn test_transparent_png_flattens_to_white_jpeg() {
        let transparent = DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            80,
            40,
            Rgba([0, 0, 0, 0]),
        ));
        let data = encode_test_image(transparent, ImageFormat::Png);

        let rendered = processor().render(&data, "jpg").await.unwrap();

        for class in SizeClass::all() {
            let bytes = rendered.get(*class).unwrap();
            assert_eq!(image::guess_format(bytes).unwrap(), ImageFormat::Jpeg);
            let img = image::load_from_memory(bytes).unwrap();
            assert!(!img.color().has_alpha());
            assert_white(&img, 0, 0);
            assert_white(&img, img.width() / 2, img.height() / 2);
        }
    }

    #[tokio::test]
    async fn test_output_format_follows_extension() {
        let data = encode_test_image(red_image(64, 32), ImageFormat::Png);

        for (ext, format) in [
            ("jpeg", ImageFormat::Jpeg),
            ("gif", ImageFormat::Gif),
            ("webp", ImageFormat::WebP),
            ("bmp", ImageFormat::Bmp),
        ] {
            let rendered = processor().render(&data, ext).await.unwrap();
            let original = rendered.get(SizeClass::Original).unwrap();
            assert_eq!(image::guess_format(original).unwrap(), format, "{}", ext);
        }
    }

    #[tokio::test]
    async fn test_non_image_bytes_fail_to_decode() {
        let result = processor().render(b"definitely not an image", "jpg").await;
        assert!(matches!(result, Err(Error::ImageDecode(_))));
    }

    #[test]
    fn test_png_compression_level_changes_output() {
        let gradient = DynamicImage::ImageRgba8(RgbaImage::from_fn(256, 256, |x, y| {
            Rgba([x as u8, y as u8, ((x * y) % 251) as u8, 255])
        }));
        let encode_at = |level: u8| {
            let policy = ImagePolicy {
                png_compression: level,
                ..ImagePolicy::default()
            };
            encode(&gradient, ImageFormat::Png, &policy).unwrap()
        };

        let stored = encode_at(0);
        let fast = encode_at(1);
        let default = encode_at(6);
        let best = encode_at(9);

        assert!(stored.len() > fast.len());
        assert_ne!(fast, default);
        assert_ne!(default, best);
        assert_eq!(image::load_from_memory(&stored).unwrap(), gradient);
        assert_eq!(image::load_from_memory(&best).unwrap(), gradient);
    }

    #[test]
    fn test_flatten_keeps_opaque_pixels() {
        let mut img = RgbaImage::from_pixel(4, 4, Rgba([0, 0, 0, 0]));
        img.put_pixel(1, 1, Rgba([0, 0, 255, 255]));

        let flat = flatten_for_jpeg(&DynamicImage::ImageRgba8(img));

        assert!(matches!(flat, DynamicImage::ImageRgb8(_)));
        assert_eq!(flat.get_pixel(1, 1), Rgba([0, 0, 255, 255]));
        assert_eq!(flat.get_pixel(0, 0), Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn test_fit_and_pad_skips_canvas_when_aspect_matches() {
        let img = red_image(800, 800);
        let fitted = fit_and_pad(&img, Dimensions::new(300, 300));

        assert_eq!(fitted.dimensions(), (300, 300));
        assert!(fitted.color().has_alpha());
    }
}
