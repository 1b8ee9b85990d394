//! Behavioural tests for cysto_core
//!
//! # Test Categories
//!
//! 1. **Geometry Invariants** - squarify, crop and resize shapes
//! 2. **Mask Properties** - monotonicity in the radius factor, fill semantics
//! 3. **Warp Properties** - identity, full turns, fill outside the view
//! 4. **Camera Model** - ray fields and intrinsics round trips

use cysto_core::prelude::*;
use proptest::prelude::*;

fn ramp(channels: usize, height: usize, width: usize) -> Image {
    Image::from_fn(channels, height, width, |c, y, x| {
        (c * 1000 + y * width + x) as f32
    })
}

// =============================================================================
// 1. Geometry Invariants
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Squarifying twice with the same target gives the same image.
    #[test]
    fn squarify_is_idempotent(h in 4usize..48, w in 4usize..48, target in 2usize..24) {
        let img = ramp(2, h, w);
        let once = squarify(&img, Some(target));
        let twice = squarify(&once, Some(target));
        prop_assert_eq!(once.shape(), [2, target, target]);
        prop_assert_eq!(once, twice);
    }

    /// Without a target the side is the shorter input side.
    #[test]
    fn squarify_without_target_uses_shorter_side(h in 1usize..40, w in 1usize..40) {
        let out = squarify(&ramp(1, h, w), None);
        prop_assert_eq!(out.size(), ImageSize::square(h.min(w)));
    }

    /// Resizing never leaves the input value range.
    #[test]
    fn resize_stays_in_range(h in 2usize..20, w in 2usize..20, oh in 1usize..30, ow in 1usize..30) {
        let img = ramp(1, h, w);
        let (lo, hi) = img.min_max().unwrap();
        let out = resize_bilinear(&img, ImageSize::new(oh, ow));
        for &v in out.data() {
            prop_assert!(v >= lo - 1e-3 && v <= hi + 1e-3);
        }
    }
}

#[test]
fn test_center_crop_takes_middle_rows() {
    let img = ramp(1, 6, 2);
    let out = center_crop(&img, ImageSize::square(2));
    assert_eq!(out.get(0, 0, 0), img.get(0, 2, 0));
    assert_eq!(out.get(0, 1, 1), img.get(0, 3, 1));
}

// =============================================================================
// 2. Mask Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// A larger radius factor never masks more pixels.
    #[test]
    fn mask_area_monotonic(side in 4usize..40, a in 0.1f32..1.0, b in 0.1f32..1.0) {
        let (small, large) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(
            cysto_core::mask::masked_area(side, side, small)
                <= cysto_core::mask::masked_area(side, side, large)
        );
    }

    /// Pixels inside the disc keep their values.
    #[test]
    fn mask_preserves_inside(side in 4usize..32, factor in 0.5f32..1.0) {
        let img = ramp(3, side, side);
        let mut masked = img.clone();
        apply_circular_mask(&mut masked, factor, &[-1.0]).unwrap();
        for y in 0..side {
            for x in 0..side {
                let inside = cysto_core::mask::inside_circle(side, side, factor, y, x);
                for c in 0..3 {
                    if inside {
                        prop_assert_eq!(masked.get(c, y, x), img.get(c, y, x));
                    } else {
                        prop_assert_eq!(masked.get(c, y, x), -1.0);
                    }
                }
            }
        }
    }
}

#[test]
fn test_mask_rejects_bad_fill() {
    let mut img = Image::zeros(3, 4, 4);
    let err = apply_circular_mask(&mut img, 1.0, &[0.0, 0.0]).unwrap_err();
    assert_eq!(
        err,
        CoreError::FillLengthMismatch {
            channels: 3,
            got: 2
        }
    );
}

// =============================================================================
// 3. Warp Properties
// =============================================================================

#[test]
fn test_full_turn_is_identity() {
    let img = ramp(2, 9, 9);
    let out = affine(&img, &AffineParams::rotation(360.0), Interpolation::Nearest, &[0.0]).unwrap();
    assert_eq!(out, img);
}

#[test]
fn test_quarter_turn_of_square_keeps_centre() {
    let img = ramp(1, 9, 9);
    let out = affine(&img, &AffineParams::rotation(90.0), Interpolation::Nearest, &[0.0]).unwrap();
    assert_eq!(out.get(0, 4, 4), img.get(0, 4, 4));
}

#[test]
fn test_large_translation_fills_everything() {
    let img = ramp(3, 8, 8);
    let params = AffineParams::default().with_translation(100.0, 0.0);
    let out = affine(&img, &params, Interpolation::Bilinear, &[0.1, 0.2, 0.3]).unwrap();
    for y in 0..8 {
        for x in 0..8 {
            assert_eq!(out.get(0, y, x), 0.1);
            assert_eq!(out.get(2, y, x), 0.3);
        }
    }
}

// =============================================================================
// 4. Camera Model
// =============================================================================

#[test]
fn test_rays_have_unit_depth() {
    let k = CameraIntrinsics::from_matrix([
        [1000.0, 0.0, 640.0],
        [0.0, 1000.0, 360.0],
        [0.0, 0.0, 1.0],
    ])
    .unwrap();
    assert_eq!(k.image_size(), ImageSize::new(720, 1280));

    let locations = squarify(&pixel_locations(k.image_size()), Some(16));
    let rays = rays_from_locations(&k, &locations).unwrap();
    assert!(rays.channel(2).unwrap().iter().all(|&z| z == 1.0));

    // x grows left to right, y grows top to bottom
    assert!(rays.get(0, 8, 0) < rays.get(0, 8, 15));
    assert!(rays.get(1, 0, 8) < rays.get(1, 15, 8));
}

#[test]
fn test_strip_assembly() {
    let a = Image::filled(3, 4, 4, 0.0);
    let b = Image::filled(3, 4, 4, 1.0);
    let strip = hstack(&[a.clone(), b.clone(), a]).unwrap();
    assert_eq!(strip.shape(), [3, 4, 12]);
    assert_eq!(strip.get(1, 2, 5), 1.0);

    let grid = vstack(&[strip.clone(), strip]).unwrap();
    assert_eq!(grid.shape(), [3, 8, 12]);
}
