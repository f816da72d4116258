use criterion::Throughput;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use skycombine::band::Band;
use skycombine::combine::crossmatch::CrossMatcher;
use skycombine::combine::PixelCombiner;
use skycombine::detections::{Detection, ExposureMeta};
use skycombine::params::CombineParams;
use skycombine::reddening::NoReddening;
use skycombine::sky::healpix::{ang2pix_ring, pix_center};
use skycombine::sky::tangent_plane::TangentPlane;

const ARCSEC: f64 = 1.0 / 3600.0;

/// `n` random positions within 0.15° of the pixel centre.
fn positions(rng: &mut StdRng, plane: &TangentPlane, n: usize) -> Vec<(f64, f64)> {
    (0..n)
        .map(|_| plane.deproject(rng.random_range(-0.15..0.15), rng.random_range(-0.15..0.15)))
        .collect()
}

fn exposures(
    rng: &mut StdRng,
    stars: &[(f64, f64)],
    nexp: usize,
) -> Vec<(ExposureMeta, Vec<Detection>)> {
    (0..nexp)
        .map(|k| {
            let band = Band::ALL[k % Band::ALL.len()];
            let meta = ExposureMeta::new(format!("exp{k}"), k as i64, band, 57_000.0 + k as f64);
            let dets = stars
                .iter()
                .enumerate()
                .map(|(i, (ra, dec))| {
                    Detection::new(
                        format!("{k}.{i}"),
                        ra + rng.random_range(-0.1..0.1) * ARCSEC,
                        dec + rng.random_range(-0.1..0.1) * ARCSEC,
                        0.05,
                        rng.random_range(16.0..22.0),
                        0.02,
                    )
                })
                .collect();
            (meta, dets)
        })
        .collect()
}

fn bench_crossmatch(c: &mut Criterion) {
    let params = CombineParams::default();
    let pix = ang2pix_ring(params.nside, 150.0, 20.0);
    let (cra, cdec) = pix_center(params.nside, pix);
    let plane = TangentPlane::new(cra, cdec);
    let mut rng = StdRng::seed_from_u64(1);

    let mut group = c.benchmark_group("crossmatch");
    for n in [1_000, 10_000, 50_000] {
        let objects = positions(&mut rng, &plane, n);
        let detections = positions(&mut rng, &plane, n);
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| {
                CrossMatcher::new(&plane, &objects, params.match_radius_deg()).match_all(&detections)
            })
        });
    }
    group.finish();
}

fn bench_combine(c: &mut Criterion) {
    let params = CombineParams::builder()
        .initial_capacity(1_000)
        .growth_increment(1_000)
        .build()
        .unwrap();
    let pix = ang2pix_ring(params.nside, 150.0, 20.0);
    let (cra, cdec) = pix_center(params.nside, pix);
    let plane = TangentPlane::new(cra, cdec);
    let mut rng = StdRng::seed_from_u64(2);

    let mut group = c.benchmark_group("combine");
    for nstars in [500, 5_000] {
        let stars = positions(&mut rng, &plane, nstars);
        let run = exposures(&mut rng, &stars, 10);
        group.throughput(Throughput::Elements((nstars * run.len()) as u64));
        group.bench_with_input(BenchmarkId::from_parameter(nstars), &run, |b, run| {
            b.iter(|| {
                let mut combiner = PixelCombiner::new(pix, params.clone()).unwrap();
                for (meta, dets) in run {
                    combiner.add_exposure(meta, dets);
                }
                combiner.finish(&NoReddening)
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_crossmatch, bench_combine);
criterion_main!(benches);
