//! Example: Transcribe a WAV file
//!
//! Usage: `cargo run --example analyze_file -- <path.wav> [full-mix]`
//!
//! Suggests settings from the recording, applies them, transcribes, and
//! prints the result as JSON.

use whistle_dsp::{analyze, suggest_settings, AnalysisMode, AnalysisOptions};

fn load_wav(path: &str) -> Result<(Vec<f32>, u32), Box<dyn std::error::Error>> {
    let mut reader = hound::WavReader::open(path)?;
    let spec = reader.spec();

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader.samples::<f32>().collect::<Result<Vec<_>, _>>()?,
        hound::SampleFormat::Int => {
            let max_value = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|s| s as f32 / max_value))
                .collect::<Result<Vec<_>, _>>()?
        }
    };

    let mono = whistle_dsp::preprocessing::deinterleave_to_mono(&samples, spec.channels as usize)?;
    Ok((mono, spec.sample_rate))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let Some(path) = args.next() else {
        eprintln!("usage: analyze_file <path.wav> [full-mix]");
        std::process::exit(2);
    };
    let mode = match args.next().as_deref() {
        Some("full-mix") => AnalysisMode::FullMix,
        _ => AnalysisMode::Monophonic,
    };

    let (samples, sample_rate) = load_wav(&path)?;
    let base = AnalysisOptions {
        analysis_mode: mode,
        ..AnalysisOptions::default()
    };

    let suggested = suggest_settings(&samples, sample_rate, &base, None)?;
    println!("Suggested settings:");
    println!("{}", serde_json::to_string_pretty(&suggested)?);

    let options = suggested.apply_to(&base);
    let result = analyze(&samples, sample_rate, &options, None)?;

    if let Some(warning) = &result.warning {
        eprintln!("warning: {}", warning);
    }
    println!("Key: {} {}", result.suggested_key, result.suggested_scale.name());
    println!("{}", serde_json::to_string_pretty(&result.melody)?);

    Ok(())
}
