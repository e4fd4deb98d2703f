// THEORY:
// `image_helper` is the only place the crate touches the file system for pixel
// data. Frames leave as RGBA PNGs written through the `PngEncoder`, and come in
// through `image::open`, which accepts any format the `image` crate decodes and
// normalises it to RGBA8.

use crate::core_modules::frame::frame::PixelBuffer;
use crate::error::Result;
use image::ImageEncoder;
use image::codecs::png::PngEncoder;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

pub fn load_frame(path: impl AsRef<Path>) -> Result<PixelBuffer> {
    let image = image::open(path)?.to_rgba8();
    PixelBuffer::try_from(image)
}

pub fn save_frame(path: impl AsRef<Path>, frame: &PixelBuffer) -> Result<()> {
    let output = BufWriter::new(File::create(path)?);
    let encoder = PngEncoder::new(output);

    encoder.write_image(
        frame.as_bytes(),
        frame.width(),
        frame.height(),
        image::ExtendedColorType::Rgba8,
    )?;

    Ok(())
}
