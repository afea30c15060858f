//! One supervised backend session driven from the console.
//! （由主控台驅動、受監督的單一後端工作階段。）

use std::io;

use anyhow::{Context, Result};
use futures::StreamExt;
use tokio::io::AsyncRead;
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};
use tracing::{debug, info, warn};
use zinspector_dispatch::Outcome;
use zinspector_supervisor::{
    find_free_port, ExitReport, LaunchSpec, ProcessSupervisor, SupervisorError,
};

use crate::console::{parse_line, render_tree, ConsoleInput, ConsolePrompter, ConsoleSurface, HELP};
use crate::context::AppContext;

/// Longest console line accepted; mesh paths are the longest expected input.
const MAX_CONSOLE_LINE: usize = 64 * 1024;

enum SessionEnd {
    Quit,
    EndOfInput,
    Signal(&'static str),
    BackendExited(Result<ExitReport, SupervisorError>),
}

/// Ctrl-C, plus SIGTERM on unix.
struct ShutdownSignal {
    #[cfg(unix)]
    terminate: Option<tokio::signal::unix::Signal>,
}

impl ShutdownSignal {
    #[cfg(unix)]
    fn new() -> Self {
        use tokio::signal::unix::{signal, SignalKind};
        let terminate = match signal(SignalKind::terminate()) {
            Ok(stream) => Some(stream),
            Err(err) => {
                warn!(error = %err, "SIGTERM handler unavailable");
                None
            }
        };
        Self { terminate }
    }

    #[cfg(not(unix))]
    fn new() -> Self {
        Self {}
    }

    #[cfg(unix)]
    async fn recv(&mut self) -> &'static str {
        match self.terminate.as_mut() {
            Some(terminate) => tokio::select! {
                _ = interrupted() => "interrupt",
                _ = terminate.recv() => "terminate",
            },
            None => {
                interrupted().await;
                "interrupt"
            }
        }
    }

    #[cfg(not(unix))]
    async fn recv(&mut self) -> &'static str {
        interrupted().await;
        "interrupt"
    }
}

async fn interrupted() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "Ctrl-C handler unavailable");
        std::future::pending::<()>().await;
    }
}

/// Spawns the backend, serves console commands until told to stop, then tears down.
pub async fn run(context: AppContext) -> Result<()> {
    let input = FramedRead::new(
        tokio::io::stdin(),
        LinesCodec::new_with_max_length(MAX_CONSOLE_LINE),
    );
    run_with_input(context, input).await
}

async fn run_with_input<R>(context: AppContext, mut input: FramedRead<R, LinesCodec>) -> Result<()>
where
    R: AsyncRead + Unpin + Send,
{
    let backend = &context.config.backend;
    let port = find_free_port(backend.port_range.start, backend.port_range.end)
        .context("no port available for the backend")?;
    let mut spec = LaunchSpec::new(backend.program.clone())
        .with_args(backend.args.iter().cloned())
        .with_port(port)
        .with_envs(backend.env.clone());
    if let Some(dir) = &backend.working_dir {
        spec = spec.with_working_dir(dir.clone());
    }

    let mut supervisor = ProcessSupervisor::new();
    let pid = supervisor
        .spawn(&spec)
        .with_context(|| format!("failed to start backend `{}`", spec.display()))?;
    context.install_bridge(port);
    info!(pid, port, "backend running");
    println!("backend running on port {port}; type 'help' for commands");

    let mut signals = ShutdownSignal::new();
    let surface = ConsoleSurface;

    let end = loop {
        if !supervisor.is_running() {
            // An exit seen by a cancelled wait is still held by the supervisor.
            break SessionEnd::BackendExited(supervisor.wait_exit().await);
        }
        let line = tokio::select! {
            line = input.next() => line,
            exit = supervisor.wait_exit() => break SessionEnd::BackendExited(exit),
            signal = signals.recv() => break SessionEnd::Signal(signal),
        };
        let line = match line {
            Some(Ok(line)) => line,
            Some(Err(LinesCodecError::MaxLineLengthExceeded)) => {
                // The framed reader ends after a decode error.
                eprintln!("input line longer than {MAX_CONSOLE_LINE} bytes; stopping");
                break SessionEnd::EndOfInput;
            }
            Some(Err(err)) => {
                warn!(error = %err, "console input unreadable");
                break SessionEnd::EndOfInput;
            }
            None => break SessionEnd::EndOfInput,
        };

        let command = match parse_line(&line) {
            ConsoleInput::Empty => continue,
            ConsoleInput::Help => {
                println!("{HELP}");
                continue;
            }
            ConsoleInput::Quit => break SessionEnd::Quit,
            ConsoleInput::Usage(usage) => {
                eprintln!("{usage}");
                continue;
            }
            ConsoleInput::Unknown(word) => {
                eprintln!("unknown command '{word}'; type 'help' for commands");
                continue;
            }
            ConsoleInput::Run(command) => command,
        };

        let mut prompter = ConsolePrompter::new(&mut input);
        let result = tokio::select! {
            result = context.dispatcher.execute(command, &mut prompter, &surface) => result,
            exit = supervisor.wait_exit() => break SessionEnd::BackendExited(exit),
            signal = signals.recv() => break SessionEnd::Signal(signal),
        };
        // Failures were already reported by the surface.
        if let Ok(outcome) = result {
            print_outcome(&context, &outcome);
        }
    };

    context.teardown();
    match end {
        SessionEnd::BackendExited(Ok(report)) => Err(SupervisorError::Crashed(report).into()),
        SessionEnd::BackendExited(Err(err)) => Err(err).context("lost track of the backend"),
        SessionEnd::Signal(signal) => {
            info!(signal, "shutdown requested");
            stop_backend(&mut supervisor).await
        }
        SessionEnd::Quit | SessionEnd::EndOfInput => stop_backend(&mut supervisor).await,
    }
}

async fn stop_backend(supervisor: &mut ProcessSupervisor) -> Result<()> {
    let report = supervisor
        .shutdown()
        .await
        .context("failed to stop the backend")?;
    debug!(?report, "backend stopped");
    Ok(())
}

fn print_outcome(context: &AppContext, outcome: &Outcome) {
    match outcome {
        Outcome::Cancelled => println!("cancelled"),
        Outcome::Synchronized { .. } => print!("{}", render_tree(&context.view.snapshot())),
        Outcome::Tree(tree) => match tree.to_pretty_json() {
            Ok(rendered) => println!("{rendered}"),
            Err(err) => eprintln!("error: {err}"),
        },
        Outcome::Name(name) => println!("{name}"),
    }
    let _ = io::Write::flush(&mut io::stdout());
}
