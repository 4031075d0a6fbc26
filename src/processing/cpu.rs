use image::{GrayImage, Luma, Rgba, RgbaImage};
use imageproc::filter::box_filter;
use rayon::prelude::*;

/// Host-side box blur with edge clamping, one channel per rayon task.
///
/// Sums are truncated by `box_filter`, so results can sit up to two levels
/// below the GPU strategies, which round.
pub fn box_blur(img: &RgbaImage, radius: u32) -> RgbaImage {
    if radius == 0 {
        return img.clone();
    }
    let (w, h) = img.dimensions();
    let planes: Vec<GrayImage> = (0..4usize)
        .into_par_iter()
        .map(|c| {
            let plane = GrayImage::from_fn(w, h, |x, y| Luma([img.get_pixel(x, y)[c]]));
            box_filter(&plane, radius, radius)
        })
        .collect();

    RgbaImage::from_fn(w, h, |x, y| {
        Rgba([
            planes[0].get_pixel(x, y)[0],
            planes[1].get_pixel(x, y)[0],
            planes[2].get_pixel(x, y)[0],
            planes[3].get_pixel(x, y)[0],
        ])
    })
}

#[cfg(test)]
mod tests {
    use image::{Rgba, RgbaImage};

    use super::box_blur;

    #[test]
    fn zero_radius_is_identity() {
        let img = RgbaImage::from_fn(5, 3, |x, y| Rgba([x as u8 * 40, y as u8 * 60, 7, 255]));
        assert_eq!(box_blur(&img, 0), img);
    }

    #[test]
    fn constant_image_is_unchanged() {
        let img = RgbaImage::from_pixel(64, 64, Rgba([128, 128, 128, 128]));
        let out = box_blur(&img, 2);
        assert!(out.pixels().all(|p| p.0 == [128, 128, 128, 128]));
    }

    #[test]
    fn bright_pixel_averages_over_kernel() {
        let mut img = RgbaImage::from_pixel(8, 8, Rgba([0, 0, 0, 255]));
        img.put_pixel(4, 4, Rgba([255, 0, 0, 255]));
        let out = box_blur(&img, 1);
        for y in 3..=5 {
            for x in 3..=5 {
                assert!(out.get_pixel(x, y)[0].abs_diff(28) <= 1);
            }
        }
        assert_eq!(out.get_pixel(2, 4)[0], 0);
        assert_eq!(out.get_pixel(4, 4)[3], 255);
    }

    #[test]
    fn edges_replicate_border_pixels() {
        // left column bright: a clamped window at x = 0 sees it twice
        let img = RgbaImage::from_fn(3, 3, |x, _| {
            let v = if x == 0 { 90 } else { 0 };
            Rgba([v, v, v, 255])
        });
        let out = box_blur(&img, 1);
        assert_eq!(out.get_pixel(0, 1)[0], 60);
        assert_eq!(out.get_pixel(1, 1)[0], 30);
        assert_eq!(out.get_pixel(2, 1)[0], 0);
    }
}
