use dissociate::engine::progress::{Progress, ProgressCallback, Stage};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressState, ProgressStyle};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::warn;

const SPINNER_TICK_MS: u64 = 80;

struct BarState {
    pb: ProgressBar,
    stage: Option<Stage>,
    /// Reactions found so far by the running formula scan.
    reactions_found: usize,
}

/// Drives a single stderr progress bar from pipeline progress events.
///
/// Each stage shows as a spinner and ends with its count; the `A -> B + C` formula
/// scan switches the bar to a counted style with a running reaction tally.
#[derive(Clone)]
pub struct CliProgressHandler {
    state: Arc<Mutex<BarState>>,
}

impl CliProgressHandler {
    pub fn new() -> Self {
        Self::with_draw_target(ProgressDrawTarget::stderr())
    }

    /// Handler whose bar never draws, for quiet runs.
    pub fn hidden() -> Self {
        Self::with_draw_target(ProgressDrawTarget::hidden())
    }

    fn with_draw_target(target: ProgressDrawTarget) -> Self {
        let pb = ProgressBar::with_draw_target(Some(0), target).with_style(Self::spinner_style());
        pb.finish_and_clear();

        Self {
            state: Arc::new(Mutex::new(BarState {
                pb,
                stage: None,
                reactions_found: 0,
            })),
        }
    }

    pub fn get_callback(&self) -> ProgressCallback<'static> {
        let state = self.state.clone();

        Box::new(move |progress: Progress| {
            let Ok(mut state) = state.lock() else {
                warn!("Progress bar mutex was poisoned. Cannot update progress.");
                return;
            };
            Self::apply(&mut state, progress);
        })
    }

    fn apply(state: &mut BarState, progress: Progress) {
        let pb = &state.pb;
        match progress {
            Progress::StageStart(stage) => {
                state.stage = Some(stage);
                pb.reset();
                pb.set_length(0);
                pb.set_style(Self::spinner_style());
                pb.enable_steady_tick(Duration::from_millis(SPINNER_TICK_MS));
                pb.set_message(stage.to_string());
            }
            Progress::StageFinish { stage, count } => {
                pb.disable_steady_tick();
                pb.finish_with_message(format!("✓ {}: {} {}", stage, count, stage.unit()));
                state.stage = None;
            }
            Progress::FormulasStart { total } => {
                state.reactions_found = 0;
                pb.disable_steady_tick();
                pb.reset();
                pb.set_length(total);
                pb.set_position(0);
                pb.set_style(Self::formula_bar_style());
                pb.set_prefix("0");
            }
            Progress::FormulaDone { reactions } => {
                state.reactions_found += reactions;
                pb.set_prefix(state.reactions_found.to_string());
                pb.inc(1);
            }
            Progress::FormulasFinish => {
                let length = pb.length().unwrap_or(0);
                if pb.position() < length {
                    pb.set_position(length);
                }
                // Back to the spinner until the stage reports its count.
                if state.stage.is_some() {
                    pb.set_style(Self::spinner_style());
                }
            }
            Progress::Message(msg) => {
                if pb.is_finished() {
                    pb.set_message(msg);
                } else {
                    pb.println(format!("  {}", msg));
                }
            }
        }
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::with_template("{spinner:.green} {msg}")
            .expect("Failed to create spinner style template")
    }

    fn formula_bar_style() -> ProgressStyle {
        ProgressStyle::with_template(
            "{msg:<24} [{bar:40.cyan/blue}] {pos}/{len} formulas, {prefix} reactions ({eta})",
        )
        .expect("Failed to create bar style template")
        .with_key(
            "eta",
            |state: &ProgressState, w: &mut dyn std::fmt::Write| {
                let _ = write!(w, "{:.1}s", state.eta().as_secs_f64());
            },
        )
        .progress_chars("##-")
    }
}

impl Default for CliProgressHandler {
    fn default() -> Self {
        Self::new()
    }
}
