//! Plays a WAV file through the default audio device as a cue.
//!
//! Usage:
//!   cargo run --bin play_cue -- path/to/clip.wav

use std::path::Path;
use std::thread;
use std::time::Duration;

use cuebox::AudioCue;

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let path = args.get(1).unwrap_or_else(|| {
        eprintln!("Usage: play_cue <clip.wav>");
        std::process::exit(1);
    });

    let pcm = cuebox::load_wav_file(path).unwrap_or_else(|e| {
        eprintln!("Failed to load {}: {}", path, e);
        std::process::exit(1);
    });

    let name = Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "clip".to_string());

    let cue = AudioCue::make_stereo_cue(pcm, name, 6).unwrap_or_else(|e| {
        eprintln!("Failed to build cue: {}", e);
        std::process::exit(1);
    });

    println!("Cue:     {}", cue.name());
    println!("Frames:  {}", cue.frame_length());
    println!("Length:  {:.2}s", cue.microsecond_length() as f64 / 1e6);

    cue.open().unwrap_or_else(|e| {
        eprintln!("Failed to open audio line: {}", e);
        std::process::exit(1);
    });

    let clip_ms = cue.microsecond_length() / 1000;

    println!("Playing straight...");
    let _ = cue.play();
    thread::sleep(Duration::from_millis(clip_ms / 2));

    // Overlap a second instance, panned left and sped up.
    println!("Overlapping: left, 1.5x speed...");
    let _ = cue.play_with(0.8, -0.8, 1.5, 0);
    thread::sleep(Duration::from_millis(clip_ms));

    println!("Quiet loop, drifting right...");
    if let Some(id) = cue.play_with(0.4, 0.0, 1.0, 2) {
        thread::sleep(Duration::from_millis(clip_ms / 2));
        let _ = cue.set_pan(id, 0.9);
    }
    thread::sleep(Duration::from_millis(clip_ms * 3));

    cue.close().unwrap_or_else(|e| {
        eprintln!("Failed to close: {}", e);
        std::process::exit(1);
    });
    println!("Done.");
}
