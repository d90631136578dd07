//! [`ArchiveUnpacker`] implementation over in-memory zip archives.

use std::io::{Cursor, Read};

use log::debug;
use zip::ZipArchive;

use reel_core::decode::{ArchiveUnpacker, RawFrame, UnpackedEntry};
use reel_core::FrameDimension;

mod error;
pub use error::UnpackError;

/// Unpacks zipped image blocks.
///
/// In 2D mode every archive entry is decoded with the `image` crate
/// into an RGBA8 raster; in 3D mode entry bytes pass through untouched.
/// Entries are visited in archive index order; their file names carry
/// no meaning.
pub struct ZipUnpacker;

impl ArchiveUnpacker for ZipUnpacker {
    type OpenError = UnpackError;
    type FatalError = UnpackError;

    fn new() -> Result<Self, Self::OpenError> {
        Ok(ZipUnpacker)
    }

    fn unpack(
        &mut self,
        block: &[u8],
        start: usize,
        end: usize,
        dimension: FrameDimension,
        emit: &mut dyn FnMut(usize, UnpackedEntry),
    ) -> Result<(), Self::FatalError> {
        let mut archive = ZipArchive::new(Cursor::new(block))?;
        debug!(
            "unpacking entries {}..={} of an archive with {} entries",
            start,
            end,
            archive.len()
        );

        for index in start..=end {
            if index >= archive.len() {
                return Err(UnpackError::MissingEntry {
                    index,
                    len: archive.len(),
                });
            }

            let mut file = archive.by_index(index)?;
            let mut data = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut data)?;

            let position = index - start;
            match dimension {
                FrameDimension::Dim2d => {
                    let rgba = image::load_from_memory(&data)?.to_rgba8();
                    let (width, height) = rgba.dimensions();
                    emit(
                        position,
                        UnpackedEntry::Image(RawFrame {
                            rgba: rgba.into_raw(),
                            width,
                            height,
                        }),
                    );
                }
                FrameDimension::Dim3d => emit(position, UnpackedEntry::Blob(data)),
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use image::{ImageFormat, Rgba, RgbaImage};
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    use super::*;

    fn png_bytes(width: u32, height: u32, value: u8) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, Rgba([value, value, value, 255]));
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    fn zip_block(entries: &[(&str, Vec<u8>)]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, data) in entries {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    fn collect(
        block: &[u8],
        start: usize,
        end: usize,
        dimension: FrameDimension,
    ) -> Result<Vec<(usize, UnpackedEntry)>, UnpackError> {
        let mut unpacker = ZipUnpacker::new().unwrap();
        let mut entries = Vec::new();
        unpacker.unpack(block, start, end, dimension, &mut |index, entry| {
            entries.push((index, entry));
        })?;
        Ok(entries)
    }

    #[test]
    fn unpacks_images_in_index_order() {
        let block = zip_block(&[
            ("000.png", png_bytes(2, 3, 10)),
            ("001.png", png_bytes(4, 1, 20)),
        ]);

        let entries = collect(&block, 0, 1, FrameDimension::Dim2d).unwrap();

        assert_eq!(entries.len(), 2);
        match &entries[0] {
            (0, UnpackedEntry::Image(raw)) => {
                assert_eq!((raw.width, raw.height), (2, 3));
                assert_eq!(raw.rgba.len(), 2 * 3 * 4);
                assert_eq!(&raw.rgba[..4], &[10, 10, 10, 255]);
            }
            _ => panic!("expected an image at position 0"),
        }
        match &entries[1] {
            (1, UnpackedEntry::Image(raw)) => {
                assert_eq!((raw.width, raw.height), (4, 1));
            }
            _ => panic!("expected an image at position 1"),
        }
    }

    #[test]
    fn three_dimensional_entries_pass_through() {
        let payload = vec![1u8, 2, 3, 4, 5];
        let block = zip_block(&[("cloud.pcd", payload.clone())]);

        let entries = collect(&block, 0, 0, FrameDimension::Dim3d).unwrap();

        match &entries[0] {
            (0, UnpackedEntry::Blob(data)) => assert_eq!(data, &payload),
            _ => panic!("expected a blob"),
        }
    }

    #[test]
    fn range_beyond_the_archive_is_an_error() {
        let block = zip_block(&[("only.png", png_bytes(1, 1, 1))]);

        let result = collect(&block, 0, 1, FrameDimension::Dim2d);
        assert!(matches!(
            result,
            Err(UnpackError::MissingEntry { index: 1, len: 1 })
        ));
    }

    #[test]
    fn corrupt_blocks_and_entries_are_errors() {
        let result = collect(b"not a zip archive", 0, 0, FrameDimension::Dim2d);
        assert!(matches!(result, Err(UnpackError::Zip(_))));

        let block = zip_block(&[("broken.png", vec![0xde, 0xad, 0xbe, 0xef])]);
        let result = collect(&block, 0, 0, FrameDimension::Dim2d);
        assert!(matches!(result, Err(UnpackError::Image(_))));
    }
}
