//! Properties of assembled PSF volumes.

use std::sync::Arc;

use approx::assert_relative_eq;
use ndarray::{Array3, Axis};
use psfmodels_compute::SerialBackend;
use psfmodels_core::{
    compute_psf, Model, OpticalParameters, PsfError, PsfOptions, PsfSession, ZOrder,
};

fn options(model: Model) -> PsfOptions {
    PsfOptions {
        model,
        ..Default::default()
    }
}

fn argmax(volume: &Array3<f64>) -> (usize, usize, usize) {
    volume
        .indexed_iter()
        .fold(((0, 0, 0), f64::MIN), |best, (idx, &v)| if v > best.1 { (idx, v) } else { best })
        .0
}

fn peak(volume: &Array3<f64>) -> f64 {
    volume.iter().copied().fold(0.0, f64::max)
}

#[test]
fn test_output_is_finite_non_negative_and_shaped() {
    let params = OpticalParameters::builder()
        .shape(7, 12, 17)
        .particle_depth_um(1.0)
        .specimen_ri(1.33)
        .build()
        .unwrap();
    for model in [Model::Scalar, Model::Vectorial] {
        let volume = compute_psf(&params, &options(model)).unwrap();
        assert_eq!(volume.dim(), (7, 12, 17));
        assert!(volume.iter().all(|v| v.is_finite() && *v >= 0.0), "{model:?}");
    }
}

#[test]
fn test_equal_radius_pixels_are_equal() {
    let params = OpticalParameters::builder()
        .shape(3, 21, 21)
        .n_samples(64)
        .build()
        .unwrap();
    let volume = compute_psf(&params, &options(Model::Vectorial)).unwrap();
    let n = 20;
    for plane in volume.axis_iter(Axis(0)) {
        for y in 0..=n {
            for x in 0..=n {
                let v = plane[[y, x]];
                assert_eq!(v, plane[[x, y]]);
                assert_eq!(v, plane[[n - y, x]]);
                assert_eq!(v, plane[[y, n - x]]);
            }
        }

        // Pairs on the same circle that no mirror or transpose maps onto
        // each other: (3, 4) and (5, 0) pixels from the centre, and so on.
        let c = 10;
        let circles: [&[(usize, usize)]; 2] = [
            &[(c + 3, c + 4), (c + 5, c), (c - 4, c + 3), (c, c - 5), (c + 4, c - 3)],
            &[(c + 6, c + 8), (c + 10, c), (c - 8, c - 6), (c, c + 10)],
        ];
        for circle in circles {
            let reference = plane[circle[0]];
            assert!(reference > 0.0);
            for &(y, x) in &circle[1..] {
                assert_relative_eq!(plane[[y, x]], reference, max_relative = 1e-10);
            }
        }
    }
}

#[test]
fn test_oil_objective_into_water_peaks_at_centre() {
    // 550 nm, NA 1.4 oil objective, aqueous specimen, emitter at the coverslip.
    let params = OpticalParameters::builder()
        .wavelength_nm(550.0)
        .numerical_aperture(1.4)
        .immersion_ri(1.515)
        .specimen_ri(1.33)
        .particle_depth_um(0.0)
        .dxy_um(0.05)
        .dz_um(0.1)
        .shape(21, 31, 31)
        .build()
        .unwrap();
    for model in [Model::Scalar, Model::Vectorial] {
        let volume = compute_psf(&params, &options(model)).unwrap();
        assert_eq!(argmax(&volume), (10, 15, 15), "{model:?}");
    }
}

#[test]
fn test_deep_particle_gives_dimmer_valid_volume() {
    let shallow = OpticalParameters::builder()
        .specimen_ri(1.33)
        .shape(7, 15, 15)
        .dz_um(0.25)
        .n_samples(400)
        .build()
        .unwrap();
    let deep = OpticalParameters::builder()
        .specimen_ri(1.33)
        .particle_depth_um(200.0)
        .shape(7, 15, 15)
        .dz_um(0.25)
        .n_samples(400)
        .build()
        .unwrap();
    for model in [Model::Scalar, Model::Vectorial] {
        let near = compute_psf(&shallow, &options(model)).unwrap();
        let far = compute_psf(&deep, &options(model)).unwrap();
        assert!(far.iter().all(|v| v.is_finite() && *v >= 0.0));
        assert!(peak(&far) > 0.0);
        assert!(peak(&far) < peak(&near), "{model:?}");
    }
}

#[test]
fn test_particle_above_coverslip_stays_bounded() {
    // NA 1.4 into water: angles past the critical angle must decay for a
    // particle on either side of the coverslip.
    let at_depth = |depth: f64| {
        OpticalParameters::builder()
            .numerical_aperture(1.4)
            .specimen_ri(1.33)
            .particle_depth_um(depth)
            .n_samples(200)
            .shape(5, 15, 15)
            .build()
            .unwrap()
    };
    for model in [Model::Scalar, Model::Vectorial] {
        let focus = peak(&compute_psf(&at_depth(0.0), &options(model)).unwrap());
        let below = peak(&compute_psf(&at_depth(5.0), &options(model)).unwrap());
        for depth in [-5.0, -100.0] {
            let volume = compute_psf(&at_depth(depth), &options(model)).unwrap();
            assert!(volume.iter().all(|v| v.is_finite() && *v >= 0.0), "{model:?} at {depth}");
            let above = peak(&volume);
            assert!(above > 0.0 && above < focus, "{model:?} at {depth}: {above:e} vs {focus:e}");
        }
        // Equal distance on either side of the interface gives the same peak.
        let mirrored = peak(&compute_psf(&at_depth(-5.0), &options(model)).unwrap());
        assert_relative_eq!(mirrored, below, max_relative = 1e-3);
    }
}

#[test]
fn test_lateral_offset_moves_the_peak() {
    let params = OpticalParameters::builder()
        .shape(3, 31, 31)
        .lateral_offset_um(0.1, 0.05)
        .build()
        .unwrap();
    let volume = compute_psf(&params, &options(Model::Vectorial)).unwrap();
    // 2 pixels in x, 1 pixel in y
    assert_eq!(argmax(&volume), (1, 16, 17));
}

#[cfg(feature = "cpu")]
#[test]
fn test_backends_agree_exactly() {
    let params = OpticalParameters::builder()
        .shape(9, 15, 15)
        .particle_depth_um(3.0)
        .specimen_ri(1.33)
        .build()
        .unwrap();
    let serial = PsfSession::new(params.clone(), PsfOptions::default())
        .with_backend(Arc::new(SerialBackend))
        .volume()
        .unwrap();
    let parallel = PsfSession::new(params, PsfOptions::default())
        .with_backend(Arc::new(psfmodels_compute::CpuBackend::with_threads(3).unwrap()))
        .volume()
        .unwrap();
    assert_eq!(serial, parallel);
}

#[test]
fn test_descending_order_and_normalization() {
    let params = OpticalParameters::builder()
        .shape(5, 11, 11)
        .particle_depth_um(1.0)
        .specimen_ri(1.33)
        .build()
        .unwrap();
    let ascending = compute_psf(&params, &PsfOptions::default()).unwrap();
    let descending = compute_psf(
        &params,
        &PsfOptions {
            z_order: ZOrder::Descending,
            ..Default::default()
        },
    )
    .unwrap();
    for plane in 0..5 {
        assert_eq!(
            ascending.index_axis(Axis(0), plane),
            descending.index_axis(Axis(0), 4 - plane)
        );
    }

    let normalized = compute_psf(
        &params,
        &PsfOptions {
            normalize: true,
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(peak(&normalized), 1.0);
    let scale = peak(&ascending);
    for (n, a) in normalized.iter().zip(&ascending) {
        assert!((n - a / scale).abs() < 1e-15);
    }
}

#[test]
fn test_invalid_configuration_fails_before_compute() {
    let result = OpticalParameters::builder().numerical_aperture(1.6).build();
    assert!(matches!(result, Err(PsfError::InvalidParameter { name: "numerical_aperture", .. })));

    let result = OpticalParameters::builder().shape(0, 31, 31).build();
    assert!(matches!(result, Err(PsfError::ConfigurationMismatch(_))));
}
