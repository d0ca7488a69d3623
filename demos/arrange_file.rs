//! Example: Arrange a melody JSON file
//!
//! Usage: `cargo run --example arrange_file -- <melody.json> [bpm] [key] [natural]`
//!
//! The input is a JSON array of `{"note": "C4", "beats": 1.0}` steps, as
//! printed by `analyze_file`.

use whistle_dsp::{
    apply_continuity, build_arrangement, ContinuityMode, ContinuityOptions, MelodyStep, OutputStyle,
    RetroStyle, Scale,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(path) = args.first() else {
        eprintln!("usage: arrange_file <melody.json> [bpm] [key] [natural]");
        std::process::exit(2);
    };
    let bpm: f64 = args.get(1).and_then(|s| s.parse().ok()).unwrap_or(120.0);
    let key = args.get(2).cloned().unwrap_or_else(|| "C".to_string());
    let mode = if args.iter().any(|a| a == "natural") {
        ContinuityMode::Natural
    } else {
        ContinuityMode::Seamless
    };

    let melody: Vec<MelodyStep> = serde_json::from_str(&std::fs::read_to_string(path)?)?;
    let arrangement = build_arrangement(
        &melody,
        bpm,
        &key,
        Scale::Major,
        OutputStyle::AutoArrange,
        RetroStyle::SnesLite,
    );

    let options = ContinuityOptions {
        mode,
        ..ContinuityOptions::default()
    };
    let result = apply_continuity(&arrangement, &options);

    eprintln!(
        "continuity: {} removed, {} shortened, {} fills",
        result.stats.rests_removed, result.stats.rests_shortened, result.stats.fills_inserted
    );
    println!("{}", serde_json::to_string_pretty(&result.arrangement)?);

    Ok(())
}
