//! Root of every invocation.
//!
//! Parses the command line, configures logger and http client exactly once,
//! runs the matched subcommand and turns whatever comes out of it (including
//! panics) into an exit code.

use crate::{
    client,
    commands::{Args, Commands, GlobalOptions},
    context::Context,
    error::{Error, is_cancellation},
    logger::Logger,
};
use anyhow::Result;
use clap::Parser;
use log::debug;
use std::{
    any::Any,
    backtrace::Backtrace,
    cell::{Cell, RefCell},
    ffi::OsString,
    panic::{self, AssertUnwindSafe},
    sync::Once,
};

thread_local! {
    static GUARDED: Cell<bool> = const { Cell::new(false) };
    static LAST_PANIC: RefCell<Option<PanicReport>> = const { RefCell::new(None) };
}

#[derive(Debug)]
pub struct PanicReport {
    pub payload: String,
    pub backtrace: Option<String>,
}

/// How an invocation ended.
#[derive(Debug)]
pub enum ExitOutcome {
    Success,
    RecoveredPanic(PanicReport),
    CommandError(anyhow::Error),
    Cancelled,
}

impl ExitOutcome {
    fn from_result(result: Result<()>) -> Self {
        match result {
            Ok(()) => Self::Success,
            Err(e) if is_cancellation(&e) => Self::Cancelled,
            Err(e) => Self::CommandError(e),
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            Self::Success => 0,
            Self::RecoveredPanic(_) | Self::CommandError(_) | Self::Cancelled => 1,
        }
    }

    /// Writes at most one line, cancellations and successes stay silent.
    pub fn report(&self, logger: &Logger) {
        match self {
            Self::RecoveredPanic(report) => match (&report.backtrace, logger.is_dev()) {
                (Some(backtrace), true) => logger.err(format_args!(
                    "{}\nstack backtrace:\n{}",
                    report.payload, backtrace
                )),
                _ => logger.err(format_args!("Unexpected error: {}", report.payload)),
            },
            Self::CommandError(e) => logger.err(format_args!("An error occurred: {:#}", e)),
            Self::Success | Self::Cancelled => (),
        }
    }
}

/// Selects the logger configuration (`--verbose` wins over `--quiet`).
pub fn select_logger(options: &GlobalOptions) -> Logger {
    options.logger()
}

/// Pre-run step: builds the shared client once the options are final.
///
/// Fails before any subcommand runs if the proxy or user agent are unusable.
pub fn configure_globals<'a>(
    options: GlobalOptions,
    logger: &'a Logger,
    command: &Commands,
) -> Result<Context<'a>> {
    debug!(
        "Executing `{}` command with {} arg(s)",
        command.name(),
        command.arg_count()
    );

    let client = client::create_or_default_client(options.proxy.as_deref(), &options.useragent)?;

    Ok(Context {
        client,
        logger,
        options,
    })
}

/// Runs `f` and converts its result or panic into an [`ExitOutcome`].
///
/// Panics inside `f` are not printed by the default hook, their payload and a
/// backtrace are kept for [`ExitOutcome::report`] instead.
pub fn guard<F>(f: F) -> ExitOutcome
where
    F: FnOnce() -> Result<()>,
{
    install_panic_hook();

    let was_guarded = GUARDED.with(|x| x.replace(true));
    let result = panic::catch_unwind(AssertUnwindSafe(f));
    GUARDED.with(|x| x.set(was_guarded));

    match result {
        Ok(result) => ExitOutcome::from_result(result),
        Err(payload) => {
            let report = LAST_PANIC
                .with(|x| x.borrow_mut().take())
                .unwrap_or_else(|| PanicReport {
                    payload: payload_message(payload.as_ref()),
                    backtrace: None,
                });
            ExitOutcome::RecoveredPanic(report)
        }
    }
}

/// Entry point of the binary, returns the process exit code.
pub fn execute() -> i32 {
    execute_from(std::env::args_os())
}

pub fn execute_from<I, T>(args: I) -> i32
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let args = match Args::try_parse_from(args) {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            // --help and --version end up here too
            return if e.use_stderr() { 1 } else { 0 };
        }
    };

    let logger = select_logger(&args.global).install();
    dispatch(args, logger, block_on)
}

/// Everything after parsing: globals, the guarded `runner` call and reporting.
pub fn dispatch<R>(args: Args, logger: &Logger, runner: R) -> i32
where
    R: FnOnce(Commands, &Context<'_>) -> Result<()>,
{
    let Args { command, global } = args;
    let outcome = guard(|| {
        let ctx = configure_globals(global, logger, &command)?;
        runner(command, &ctx)
    });

    outcome.report(logger);
    outcome.code()
}

fn block_on(command: Commands, ctx: &Context<'_>) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run(command, ctx))
}

/// Races the command against Ctrl+C.
pub async fn run(command: Commands, ctx: &Context<'_>) -> Result<()> {
    tokio::select! {
        result = command.execute(ctx) => result,
        _ = interrupted() => Err(Error::Cancelled.into()),
    }
}

async fn interrupted() {
    if tokio::signal::ctrl_c().await.is_err() {
        // no signal handler means no way to get interrupted
        std::future::pending::<()>().await;
    }
}

fn install_panic_hook() {
    static HOOK: Once = Once::new();

    HOOK.call_once(|| {
        let default_hook = panic::take_hook();

        panic::set_hook(Box::new(move |info| {
            if !GUARDED.with(Cell::get) {
                default_hook(info);
                return;
            }

            let report = PanicReport {
                payload: payload_message(info.payload()),
                backtrace: Some(Backtrace::force_capture().to_string()),
            };
            LAST_PANIC.with(|x| *x.borrow_mut() = Some(report));
        }));
    });
}

fn payload_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with a non-string payload".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Context as _, anyhow};
    use std::sync::{Arc, Mutex};

    fn output(buffer: &Arc<Mutex<Vec<u8>>>) -> String {
        String::from_utf8(buffer.lock().unwrap().clone()).unwrap()
    }

    fn options(proxy: Option<&str>) -> GlobalOptions {
        GlobalOptions {
            quiet: false,
            verbose: false,
            proxy: proxy.map(ToOwned::to_owned),
            useragent: "crunchy-cli/test".to_owned(),
        }
    }

    fn info_command() -> Commands {
        Commands::Info(crate::commands::Info {})
    }

    #[test]
    fn success_exits_with_zero() {
        let (logger, buffer) = Logger::default().with_buffer();
        let outcome = guard(|| Ok(()));

        outcome.report(&logger);
        assert!(matches!(outcome, ExitOutcome::Success));
        assert_eq!(outcome.code(), 0);
        assert!(output(&buffer).is_empty());
    }

    #[test]
    fn command_error_is_logged_once() {
        let (logger, buffer) = Logger::default().with_buffer();
        let outcome = guard(|| Err(anyhow!("segment 3 is missing")));

        outcome.report(&logger);
        assert_eq!(outcome.code(), 1);

        let output = output(&buffer);
        assert_eq!(output.matches("An error occurred: ").count(), 1);
        assert!(output.contains("An error occurred: segment 3 is missing"));
    }

    #[test]
    fn cancellation_is_silent_but_fails() {
        let (logger, buffer) = Logger::default().with_buffer();
        let outcome = guard(|| {
            Err::<(), _>(Error::Cancelled).context("downloading https://cdn.local/a.mp4")?;
            Ok(())
        });

        outcome.report(&logger);
        assert!(matches!(outcome, ExitOutcome::Cancelled));
        assert_eq!(outcome.code(), 1);
        assert!(!output(&buffer).contains("An error occurred"));
    }

    #[test]
    fn cancellation_text_alone_is_an_error() {
        let outcome = guard(|| Err(anyhow!("context canceled: operation was cancelled")));
        assert!(matches!(outcome, ExitOutcome::CommandError(_)));
    }

    #[test]
    fn panic_without_dev_mode_hides_trace() {
        let (logger, buffer) = Logger::default().with_buffer();
        let outcome = guard(|| panic!("index out of bounds"));

        outcome.report(&logger);
        assert_eq!(outcome.code(), 1);

        let output = output(&buffer);
        assert!(output.contains("Unexpected error: index out of bounds"));
        assert!(!output.contains("stack backtrace"));
    }

    #[test]
    fn panic_in_dev_mode_has_trace() {
        let (logger, buffer) = Logger::verbose().with_buffer();
        let outcome = guard(|| {
            let value: Option<u8> = None;
            panic!("unexpected value {:?}", value)
        });

        outcome.report(&logger);
        assert_eq!(outcome.code(), 1);

        let output = output(&buffer);
        assert!(output.contains("unexpected value None"));
        assert!(output.contains("stack backtrace:"));
        assert!(!output.contains("Unexpected error"));
    }

    async fn fail() -> Result<()> {
        panic!("inside async")
    }

    #[test]
    fn panic_inside_runtime_is_recovered() {
        let outcome = guard(|| {
            let runtime = tokio::runtime::Builder::new_current_thread().build()?;
            runtime.block_on(fail())
        });

        match outcome {
            ExitOutcome::RecoveredPanic(report) => assert_eq!(report.payload, "inside async"),
            x => panic!("expected recovered panic, got {:?}", x),
        }
    }

    #[test]
    fn invalid_proxy_fails_before_command() {
        let logger = Logger::quiet();
        let error = configure_globals(options(Some("not a proxy")), &logger, &info_command())
            .err()
            .unwrap();

        assert!(error.downcast_ref::<Error>().is_some_and(Error::is_config));
    }

    #[test]
    fn globals_carry_options() {
        let logger = Logger::quiet();
        let ctx = configure_globals(options(None), &logger, &info_command()).unwrap();

        assert_eq!(ctx.options.useragent, "crunchy-cli/test");
        assert!(!ctx.logger.is_info());
    }

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(args).unwrap()
    }

    #[test]
    fn panicking_command_exits_with_one() {
        let (logger, buffer) = Logger::default().with_buffer();
        let code = dispatch(
            parse(&["crunchy-cli", "download", "https://cdn.local/a.mp4"]),
            &logger,
            |command, _: &Context<'_>| panic!("no handler for `{}`", command.name()),
        );

        assert_eq!(code, 1);
        let output = output(&buffer);
        assert!(output.contains("Unexpected error: no handler for `download`"));
        assert!(!output.contains("stack backtrace"));
    }

    #[test]
    fn panicking_command_in_verbose_mode_has_trace() {
        let args = parse(&["crunchy-cli", "info", "-v"]);
        let (logger, buffer) = args.global.logger().with_buffer();
        let code = dispatch(args, &logger, |_, _: &Context<'_>| panic!("broken session"));

        assert_eq!(code, 1);
        let output = output(&buffer);
        assert!(output.contains("broken session\nstack backtrace:"));
    }

    #[test]
    fn runner_sees_configured_globals() {
        let (logger, buffer) = Logger::default().with_buffer();
        let mut seen = None;
        let code = dispatch(
            parse(&["crunchy-cli", "info", "--useragent", "agent/2"]),
            &logger,
            |command, ctx: &Context<'_>| {
                seen = Some((command.name(), ctx.options.useragent.clone()));
                Ok(())
            },
        );

        assert_eq!(code, 0);
        assert_eq!(seen, Some(("info", "agent/2".to_owned())));
        assert!(output(&buffer).is_empty());
    }

    #[test]
    fn bad_proxy_never_reaches_runner() {
        let (logger, buffer) = Logger::default().with_buffer();
        let mut called = false;
        let code = dispatch(
            parse(&["crunchy-cli", "info", "--proxy", "not a proxy"]),
            &logger,
            |_, _: &Context<'_>| {
                called = true;
                Ok(())
            },
        );

        assert_eq!(code, 1);
        assert!(!called);
        assert!(output(&buffer).contains("An error occurred: invalid proxy url"));
    }

    #[test]
    fn help_and_bad_arguments() {
        assert_eq!(execute_from(["crunchy-cli", "--version"]), 0);
        assert_eq!(execute_from(["crunchy-cli", "no-such-command"]), 1);
    }
}
