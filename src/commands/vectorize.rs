use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use logotrace::{Orchestrator, PipelineSettings, RunEvent, VectorizeResult, VtracerVectorizer};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use crate::cli::{GlobalOptions, VectorizeCommand};

use super::utils::{input_limits, load_profile, resolve_output};

/// The main function to run the vectorize command.
pub async fn run(global: &GlobalOptions, cmd: VectorizeCommand) -> VectorizeResult<()> {
    let tracing = cmd.tracing.apply(load_profile(cmd.profile.as_deref())?);
    let timeout = cmd
        .timeout
        .filter(|secs| *secs > 0.0)
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok());
    let settings = PipelineSettings::default()
        .with_limits(input_limits(global))
        .with_tracing(tracing)
        .with_trace_timeout(timeout);

    let orchestrator = Orchestrator::new(VtracerVectorizer, settings);
    let bar = (!cmd.no_progress).then(progress_bar);
    let listener = bar
        .clone()
        .map(|bar| follow_progress(bar, orchestrator.subscribe()));

    let result = orchestrator.vectorize_path(&cmd.input).await;
    // Closing the channel ends the listener even when no run was started.
    drop(orchestrator);
    if let Some(listener) = listener {
        let _ = listener.await;
    }
    if let Some(bar) = &bar {
        bar.finish_and_clear();
    }

    let document = result?;
    let output_path = resolve_output(&cmd.input, cmd.output.as_deref());
    document.save(&output_path)?;
    println!(
        "SVG saved to {} ({} paths, {} colors)",
        output_path.display(),
        document.path_count(),
        document.color_count()
    );

    Ok(())
}

fn progress_bar() -> ProgressBar {
    let bar = ProgressBar::new(100);
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} [{bar:40.green/238}] {pos:>3}%  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  "),
    );
    bar
}

fn follow_progress(
    bar: ProgressBar,
    mut events: tokio::sync::broadcast::Receiver<RunEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(RunEvent::Progress {
                    milestone, percent, ..
                }) => {
                    bar.set_position(u64::from(percent));
                    bar.set_message(milestone.label());
                }
                Ok(event) if event.is_terminal() => break,
                Ok(_) | Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    })
}
