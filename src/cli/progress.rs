// src/cli/progress.rs — Terminal progress renderer

use crate::core::types::ProgressEvent;

/// Format one progress event as a single line.
pub fn render(event: &ProgressEvent) -> String {
    match event {
        ProgressEvent::SessionStart {
            query,
            max_iterations,
            cached_for_query,
        } => format!(
            "[start] \"{}\" (max {} iteration(s), {} cached)",
            query, max_iterations, cached_for_query,
        ),
        ProgressEvent::SearchStart { iteration, query } => {
            format!("[iter {}] searching: {}", iteration, query)
        }
        ProgressEvent::ResultsReady { iteration, count } => {
            format!("[iter {}] {} result(s)", iteration, count)
        }
        ProgressEvent::Evaluated {
            iteration,
            verdict,
            score,
            relevant,
        } => format!(
            "[iter {}] score={:.2} -> {} ({} relevant)",
            iteration, score, verdict, relevant,
        ),
        ProgressEvent::QueryRewritten { iteration, query } => {
            format!("[iter {}] next query: {}", iteration, query)
        }
        ProgressEvent::Complete {
            iterations,
            total_results,
            relevant_cached,
            stop_reason,
        } => format!(
            "[done] {} iteration(s), {} result(s), {} cached ({})",
            iterations, total_results, relevant_cached, stop_reason,
        ),
    }
}

/// Build a progress callback that writes formatted lines to stderr.
///
/// stdout stays reserved for result listings.
pub fn terminal_progress() -> impl Fn(ProgressEvent) + Send + 'static {
    move |event| eprintln!("{}", render(&event))
}
