use criterion::{criterion_group, criterion_main, Criterion};
use seiscorr::{
    decluster, find_peaks, multi_normxcorr_fft, multi_normxcorr_time_threaded, normxcorr_fft,
    normxcorr_time, FftConfig, Parallelism, SignalBlock, TemplateBank,
};
use std::hint::black_box;

fn make_channel(len: usize, seed: usize) -> Vec<f32> {
    (0..len)
        .map(|i| {
            let noise = (((i + seed) * 2654435761) % 1000) as f32 / 1000.0 - 0.5;
            (i as f32 * 0.031).sin() + 0.4 * noise
        })
        .collect()
}

fn bench_single(c: &mut Criterion) {
    let channel = make_channel(86_400, 0);
    let short = channel[1000..1040].to_vec();
    let long = channel[5000..5400].to_vec();

    let fft = FftConfig::default();

    c.bench_function("time_m40_n86400", |b| {
        b.iter(|| black_box(normxcorr_time(&short, &channel).unwrap()));
    });
    c.bench_function("fft_m40_n86400", |b| {
        b.iter(|| black_box(normxcorr_fft(&short, &channel, &fft).unwrap()));
    });
    c.bench_function("fft_m400_n86400", |b| {
        b.iter(|| black_box(normxcorr_fft(&long, &channel, &fft).unwrap()));
    });
}

fn bench_multi(c: &mut Criterion) {
    let n_channels = 6;
    let len = 20_000;
    let channels: Vec<f32> = (0..n_channels)
        .flat_map(|ch| make_channel(len, ch * 97))
        .collect();
    let block = SignalBlock::from_slice(&channels, n_channels, len).unwrap();

    let n_templates = 8;
    let tpl_len = 200;
    let templates: Vec<f32> = (0..n_templates * n_channels)
        .flat_map(|row| {
            let ch = row % n_channels;
            let start = ch * len + 500 + (row / n_channels) * 1000;
            channels[start..start + tpl_len].to_vec()
        })
        .collect();
    let bank = TemplateBank::per_channel(
        SignalBlock::from_slice(&templates, n_templates * n_channels, tpl_len).unwrap(),
        n_channels,
    )
    .unwrap();

    let fft = FftConfig::default();
    let sequential = Parallelism::sequential();

    c.bench_function("multi_fft_sequential", |b| {
        b.iter(|| black_box(multi_normxcorr_fft(&bank, block, &fft, &sequential).unwrap()));
    });
    c.bench_function("multi_time_sequential", |b| {
        b.iter(|| black_box(multi_normxcorr_time_threaded(&bank, block, &sequential).unwrap()));
    });

    if cfg!(feature = "rayon") {
        let parallel = Parallelism::available();
        c.bench_function("multi_fft_parallel", |b| {
            b.iter(|| black_box(multi_normxcorr_fft(&bank, block, &fft, &parallel).unwrap()));
        });
    }
}

fn bench_peaks(c: &mut Criterion) {
    let channel = make_channel(200_000, 3);
    c.bench_function("find_peaks_decluster", |b| {
        b.iter(|| {
            let peaks = find_peaks(&channel, 0.8);
            black_box(decluster(&peaks, 50))
        });
    });
}

criterion_group!(benches, bench_single, bench_multi, bench_peaks);
criterion_main!(benches);
