//! Human-readable summaries of a debate state.

use std::fmt::Write as _;

use crux_coordination::DebateState;

/// Multi-line summary for the terminal.
pub fn summarize(state: &DebateState) -> String {
    let mut out = String::new();
    if !state.started {
        let _ = writeln!(
            out,
            "debate never started: {}",
            state.error.as_deref().unwrap_or("no events")
        );
        return out;
    }

    let _ = writeln!(out, "debate {} ({})", state.debate_id, state.mode);
    let _ = writeln!(out, "topic: {}", state.topic);
    let _ = writeln!(
        out,
        "personas: {}",
        state
            .personas
            .iter()
            .map(|p| p.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );
    let _ = writeln!(
        out,
        "turns: {} spoken, {} skipped; blackboard v{}",
        state.transcript.len(),
        state.skipped.len(),
        state.blackboard.version
    );
    if let Some(latest) = state.latest_convergence() {
        let _ = writeln!(
            out,
            "entropy {:.3}, open cruxes {}",
            latest.entropy, latest.unresolved_crux_count
        );
    }
    if !state.crux_rooms.is_empty() {
        let _ = writeln!(out, "crux rooms: {}", state.crux_rooms.len());
    }

    match (&state.completion, &state.error) {
        (Some(done), _) => {
            let _ = writeln!(out, "finished after {} rounds: {}", done.rounds, done.reason);
            for crux in &done.output.cruxes {
                let _ = writeln!(out, "  crux ({:.2}) {}", crux.weight, crux.proposition);
            }
        }
        (None, Some(error)) => {
            let _ = writeln!(out, "failed: {}", error);
        }
        (None, None) => {
            let _ = writeln!(out, "incomplete: stream ended without a terminal event");
        }
    }
    out
}
