#![cfg(feature = "rayon")]

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use seiscorr::{
    multi_find_peaks, multi_normxcorr_fft, multi_normxcorr_time_threaded, normxcorr_fft_threaded,
    normxcorr_time_threaded, DetectConfig, Detector, FftConfig, Parallelism, PeakConfig,
    SignalBlock, TemplateBank, Threshold,
};

fn noise(rng: &mut StdRng, len: usize) -> Vec<f32> {
    (0..len).map(|_| rng.random_range(-1.0f32..1.0)).collect()
}

fn bank_and_channels(
    rng: &mut StdRng,
    n_templates: usize,
    n_channels: usize,
    m: usize,
    len: usize,
) -> (TemplateBank, Vec<f32>) {
    let channels = noise(rng, n_channels * len);
    let templates = noise(rng, n_templates * n_channels * m);
    let bank = TemplateBank::per_channel(
        SignalBlock::from_slice(&templates, n_templates * n_channels, m).unwrap(),
        n_channels,
    )
    .unwrap();
    (bank, channels)
}

#[test]
fn multi_time_is_bit_identical_across_thread_counts() {
    let mut rng = StdRng::seed_from_u64(101);
    for (n_templates, n_channels) in [(5, 2), (2, 5), (3, 3)] {
        let (bank, channels) = bank_and_channels(&mut rng, n_templates, n_channels, 24, 700);
        let block = SignalBlock::from_slice(&channels, n_channels, 700).unwrap();
        let base = multi_normxcorr_time_threaded(&bank, block, &Parallelism::sequential()).unwrap();
        for threads in [2, 4, 7] {
            let par =
                multi_normxcorr_time_threaded(&bank, block, &Parallelism::with_threads(threads))
                    .unwrap();
            assert_eq!(base.as_slice(), par.as_slice(), "threads={threads}");
        }
    }
}

#[test]
fn multi_fft_is_bit_identical_across_thread_counts() {
    let mut rng = StdRng::seed_from_u64(202);
    let (bank, channels) = bank_and_channels(&mut rng, 4, 3, 90, 3000);
    let block = SignalBlock::from_slice(&channels, 3, 3000).unwrap();
    let cfg = FftConfig { max_fft_len: 1024 };
    let base = multi_normxcorr_fft(&bank, block, &cfg, &Parallelism::sequential()).unwrap();
    for threads in [2, 3, 8] {
        let par = multi_normxcorr_fft(&bank, block, &cfg, &Parallelism::with_threads(threads))
            .unwrap();
        assert_eq!(base.as_slice(), par.as_slice(), "threads={threads}");
    }
}

#[test]
fn single_pair_segments_are_bit_identical() {
    let mut rng = StdRng::seed_from_u64(303);
    let channel = noise(&mut rng, 20_000);
    let template = channel[4000..4120].to_vec();
    let cfg = FftConfig { max_fft_len: 2048 };

    let time = normxcorr_time_threaded(&template, &channel, &Parallelism::sequential()).unwrap();
    let fft =
        normxcorr_fft_threaded(&template, &channel, &cfg, &Parallelism::sequential()).unwrap();
    for threads in [2, 5, 16] {
        let par = Parallelism::with_threads(threads);
        let t = normxcorr_time_threaded(&template, &channel, &par).unwrap();
        let f = normxcorr_fft_threaded(&template, &channel, &cfg, &par).unwrap();
        assert_eq!(time.trace, t.trace, "time threads={threads}");
        assert_eq!(fft.trace, f.trace, "fft threads={threads}");
        assert_eq!(time.conditioning, t.conditioning);
        assert_eq!(fft.conditioning, f.conditioning);
    }
}

#[test]
fn peaks_and_detections_are_thread_invariant() {
    let mut rng = StdRng::seed_from_u64(404);
    let traces = noise(&mut rng, 6 * 800);
    let block = SignalBlock::from_slice(&traces, 6, 800).unwrap();
    let thresholds = [0.9f32; 6];
    let base =
        multi_find_peaks(block, &thresholds, &PeakConfig::default(), &Parallelism::sequential())
            .unwrap();
    let par = multi_find_peaks(
        block,
        &thresholds,
        &PeakConfig::default(),
        &Parallelism::with_threads(4),
    )
    .unwrap();
    assert_eq!(base, par);

    let (bank, channels) = bank_and_channels(&mut rng, 3, 4, 40, 1200);
    let block = SignalBlock::from_slice(&channels, 4, 1200).unwrap();
    let run = |threads: usize| {
        Detector::new(bank.clone())
            .with_config(DetectConfig {
                threshold: Threshold::Mad(4.0),
                min_separation: 20,
                parallelism: Parallelism::with_threads(threads),
                ..DetectConfig::default()
            })
            .detect(block)
            .unwrap()
    };
    assert_eq!(run(1), run(3));
}
