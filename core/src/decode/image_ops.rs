use crate::RenderSize;

/// Crop a row-major RGBA8 buffer to `dst_w` x `dst_h`.
///
/// The caller guarantees `dst_w <= src_w` and `dst_h <= src_h`. No
/// filtering is applied: equal sizes pass the buffer through unchanged,
/// a width-preserving crop keeps the leading rows, and anything else
/// copies the first `dst_w` pixels of each of the first `dst_h` rows.
pub(crate) fn crop(buffer: Vec<u8>, src_w: u32, src_h: u32, dst_w: u32, dst_h: u32) -> Vec<u8> {
    if (src_w, src_h) == (dst_w, dst_h) {
        return buffer;
    }

    let dst_row = dst_w as usize * 4;

    if src_w == dst_w && src_h > dst_h {
        let mut buffer = buffer;
        buffer.truncate(dst_row * dst_h as usize);
        return buffer;
    }

    let src_row = src_w as usize * 4;
    let mut out = Vec::with_capacity(dst_row * dst_h as usize);
    for row in buffer.chunks_exact(src_row).take(dst_h as usize) {
        out.extend_from_slice(&row[..dst_row]);
    }
    out
}

/// Compute the size a decoded video frame is cropped to before caching.
///
/// The codec's reported dimensions are not trusted as the final size:
/// the output is derived from the render surface, scaled down by how far
/// the decoded height falls short of it, then clamped to the decoded
/// dimensions so the crop stays in bounds.
pub(crate) fn render_target(render: RenderSize, decoded_w: u32, decoded_h: u32) -> (u32, u32) {
    if decoded_w == 0 || decoded_h == 0 {
        return (decoded_w, decoded_h);
    }

    let scale = (f64::from(render.height) / f64::from(decoded_h)).ceil();
    let out_w = (f64::from(render.width) / scale).round() as u32;
    let out_h = (f64::from(render.height) / scale).round() as u32;

    (out_w.min(decoded_w), out_h.min(decoded_h))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pixel(v: u8) -> [u8; 4] {
        [v, v, v, 255]
    }

    fn buffer(width: u32, height: u32) -> Vec<u8> {
        let mut buf = Vec::with_capacity((width * height * 4) as usize);
        for i in 0..width * height {
            buf.extend_from_slice(&pixel(i as u8));
        }
        buf
    }

    #[test]
    fn crop_equal_size_is_pass_through() {
        let src = buffer(4, 3);
        let out = crop(src.clone(), 4, 3, 4, 3);
        assert_eq!(out, src);
    }

    #[test]
    fn crop_same_width_keeps_leading_rows() {
        let src = buffer(4, 3);
        let out = crop(src.clone(), 4, 3, 4, 2);
        assert_eq!(out, &src[..4 * 2 * 4]);
    }

    #[test]
    fn crop_copies_row_prefixes() {
        let out = crop(buffer(4, 2), 4, 2, 2, 2);
        // First two pixels of each source row.
        let mut expected = Vec::new();
        for v in [0u8, 1, 4, 5] {
            expected.extend_from_slice(&pixel(v));
        }
        assert_eq!(out, expected);
    }

    #[test]
    fn render_target_exact_match_is_identity() {
        let render = RenderSize {
            width: 1920,
            height: 1080,
        };
        assert_eq!(render_target(render, 1920, 1080), (1920, 1080));
    }

    #[test]
    fn render_target_crops_coded_padding() {
        // 1088 coded rows for a 1080 surface: scale stays 1, so the
        // extra rows are cropped away.
        let render = RenderSize {
            width: 1920,
            height: 1080,
        };
        assert_eq!(render_target(render, 1920, 1088), (1920, 1080));
    }

    #[test]
    fn render_target_scales_down_for_small_decodes() {
        let render = RenderSize {
            width: 1920,
            height: 1080,
        };
        // A 544-row decode is roughly half the surface; the output is
        // halved and clamped into the decoded frame.
        assert_eq!(render_target(render, 960, 544), (960, 540));
    }

    #[test]
    fn render_target_degenerate_dimensions() {
        let render = RenderSize {
            width: 100,
            height: 100,
        };
        assert_eq!(render_target(render, 0, 0), (0, 0));
    }
}
