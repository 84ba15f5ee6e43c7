use fs_err as fs;
use serde_json::{json, to_string_pretty};
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::chat::ChatOutcome;

pub struct SavedPaths {
    pub dir: PathBuf,
    pub request: PathBuf,
    pub response: PathBuf,
}

/// One directory per interactive session; each turn adds a request/response pair.
pub fn session_dir(root: &Path, session: Uuid) -> PathBuf {
    root.join(".vibe").join("tx").join(session.to_string())
}

pub fn save_turn(root: &Path, session: Uuid, turn: usize, outcome: &ChatOutcome) -> anyhow::Result<SavedPaths> {
    let dir = session_dir(root, session);
    fs::create_dir_all(&dir)?;

    let request = dir.join(format!("turn-{turn:03}.request.json"));
    fs::write(&request, to_string_pretty(&outcome.call)?)?;

    let response = dir.join(format!("turn-{turn:03}.response.json"));
    let body = json!({
        "model": outcome.route.model,
        "cached": outcome.cached,
        "usage": outcome.tokens,
        "text": outcome.raw,
        "steps": outcome.steps,
    });
    fs::write(&response, to_string_pretty(&body)?)?;

    Ok(SavedPaths { dir, request, response })
}

pub fn print_saved_paths(turn: usize, saved: &SavedPaths) {
    println!("debug[turn {turn}]: request saved at: {}", saved.request.display());
    println!("debug[turn {turn}]: response saved at: {}", saved.response.display());
    std::io::stdout().flush().ok();
}

pub fn print_json_debug(outcome: &ChatOutcome) -> anyhow::Result<()> {
    eprintln!("\n===== DEBUG: MODEL CALL =====\n{}\n", to_string_pretty(&outcome.call)?);
    eprintln!("===== DEBUG: RAW REPLY =====\n{}\n", outcome.raw);
    std::io::stderr().flush().ok();
    Ok(())
}
