//! Performance benchmarks for transcription and arrangement

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use whistle_dsp::{
    analyze, apply_continuity, build_arrangement, suggest_settings, AnalysisOptions, ContinuityOptions,
    OutputStyle, RetroStyle,
};

/// Eight-note C major scale, 0.5 s per note, with short gaps
fn scale_melody(sample_rate: u32) -> Vec<f32> {
    let notes = [60.0f32, 62.0, 64.0, 65.0, 67.0, 69.0, 71.0, 72.0];
    let note_len = (sample_rate / 2) as usize;
    let gap = (sample_rate / 20) as usize;
    let mut samples = Vec::with_capacity(notes.len() * (note_len + gap));
    for midi in notes {
        let freq = 440.0 * 2.0f32.powf((midi - 69.0) / 12.0);
        samples.extend((0..note_len).map(|i| {
            (i as f32 * freq * 2.0 * std::f32::consts::PI / sample_rate as f32).sin() * 0.5
        }));
        samples.extend(std::iter::repeat(0.0).take(gap));
    }
    samples
}

fn bench_analyze(c: &mut Criterion) {
    let samples = scale_melody(44100);
    let options = AnalysisOptions::default();

    c.bench_function("analyze_scale_4s", |b| {
        b.iter(|| {
            let _ = analyze(black_box(&samples), black_box(44100), black_box(&options), None);
        });
    });

    c.bench_function("suggest_settings_scale_4s", |b| {
        b.iter(|| {
            let _ = suggest_settings(black_box(&samples), black_box(44100), black_box(&options), None);
        });
    });
}

fn bench_arrange(c: &mut Criterion) {
    let samples = scale_melody(44100);
    let Ok(result) = analyze(&samples, 44100, &AnalysisOptions::default(), None) else {
        return;
    };
    let continuity = ContinuityOptions::default();

    c.bench_function("arrange_and_continuity", |b| {
        b.iter(|| {
            let arrangement = build_arrangement(
                black_box(&result.melody),
                120.0,
                &result.suggested_key,
                result.suggested_scale,
                OutputStyle::AutoArrange,
                RetroStyle::Nes,
            );
            apply_continuity(&arrangement, black_box(&continuity))
        });
    });
}

criterion_group!(benches, bench_analyze, bench_arrange);
criterion_main!(benches);
