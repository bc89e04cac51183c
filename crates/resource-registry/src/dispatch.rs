//! Wiring registry and command tree together for one process invocation.

use std::ffi::OsString;
use std::io::Write;

use tracing::{debug, warn};

use crate::error::Error;
use crate::program::{GlobalFlags, Parsed, Program};
use crate::registry::ResourceRegistry;

/// Exit status for success and for help/version output.
pub const EXIT_SUCCESS: i32 = 0;

/// Exit status for every failure.
pub const EXIT_FAILURE: i32 = 1;

/// Lets every registered resource attach its commands to `program`, in
/// registration order.
///
/// A resource's [`instructions`](crate::Resource::instructions) are applied
/// to its namespace unless the resource already set some.
#[must_use]
pub fn assemble(registry: &ResourceRegistry, mut program: Program) -> Program {
    for resource in registry.iter() {
        resource.register_commands(&mut program);

        let name = resource.name();
        match program.get_namespace_mut(name) {
            Some(namespace) => {
                if namespace.get_instructions().is_none()
                    && let Some(instructions) = resource.instructions()
                {
                    namespace.instructions(instructions);
                }
            }
            None => warn!(resource = name, "resource registered no commands"),
        }
    }
    program
}

/// Parses `args` once, runs the matched handler and reports the outcome.
///
/// `on_parsed` is called with the global flags after a successful parse and
/// before the handler runs. The handler's payload is written to `stdout`
/// only once it has returned successfully; every error goes to `stderr`.
/// Returns the process exit status.
pub fn dispatch<I, T, F>(
    program: Program,
    args: I,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
    on_parsed: F,
) -> i32
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
    F: FnOnce(GlobalFlags),
{
    let command = match program.parse(args) {
        Ok(Parsed::Display(text)) => return emit(stdout, stderr, &text),
        Ok(Parsed::Command(command)) => command,
        Err(err) => return report(stderr, &err),
    };

    on_parsed(command.flags());

    match command.execute() {
        Ok(payload) => emit(stdout, stderr, &payload),
        Err(err) => report(stderr, &err),
    }
}

/// Writes a successful payload followed by a newline.
fn emit(stdout: &mut dyn Write, stderr: &mut dyn Write, payload: &str) -> i32 {
    if payload.is_empty() {
        return EXIT_SUCCESS;
    }

    let written = if payload.ends_with('\n') {
        stdout.write_all(payload.as_bytes())
    } else {
        writeln!(stdout, "{payload}")
    };

    match written.and_then(|()| stdout.flush()) {
        Ok(()) => EXIT_SUCCESS,
        Err(err) => {
            let _ = writeln!(stderr, "error: failed to write output: {err}");
            EXIT_FAILURE
        }
    }
}

/// Writes an error to `stderr` and returns the failure status.
pub fn report(stderr: &mut dyn Write, err: &Error) -> i32 {
    debug!(error = ?err, "command failed");
    let _ = match err {
        // clap renders its own "error:" prefix and usage hints
        Error::Usage(message) => writeln!(stderr, "{message}"),
        other => writeln!(stderr, "error: {other}"),
    };
    let _ = stderr.flush();
    EXIT_FAILURE
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;
    use crate::command::CommandInfo;
    use crate::resource::Resource;

    struct Fixture {
        name: &'static str,
        instructions: Option<&'static str>,
        registered: Rc<Cell<u32>>,
    }

    impl Fixture {
        fn new(name: &'static str) -> Self {
            Self {
                name,
                instructions: None,
                registered: Rc::new(Cell::new(0)),
            }
        }
    }

    impl Resource for Fixture {
        fn name(&self) -> &str {
            self.name
        }

        fn instructions(&self) -> Option<&str> {
            self.instructions
        }

        fn register_commands(&self, program: &mut Program) {
            self.registered.set(self.registered.get() + 1);
            program
                .namespace(self.name, "fixture")
                .command(CommandInfo::new("ok", "Succeeds"), |inv| {
                    Ok(format!("payload from {}", inv.resource()))
                })
                .command(CommandInfo::new("fail", "Fails"), |_| {
                    Err("upstream unavailable".into())
                });
        }
    }

    struct Outcome {
        code: i32,
        stdout: String,
        stderr: String,
    }

    fn run(registry: &ResourceRegistry, args: &[&str]) -> Outcome {
        let program = assemble(registry, Program::new("meta-composer", "0.1.0", "test"));
        let mut argv = vec!["meta-composer"];
        argv.extend_from_slice(args);

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let code = dispatch(program, argv, &mut stdout, &mut stderr, |_| {});
        Outcome {
            code,
            stdout: String::from_utf8(stdout).unwrap(),
            stderr: String::from_utf8(stderr).unwrap(),
        }
    }

    fn registry(names: &[&'static str]) -> ResourceRegistry {
        let mut registry = ResourceRegistry::new();
        for name in names {
            registry.register(Fixture::new(*name)).unwrap();
        }
        registry
    }

    #[test]
    fn successful_handler_prints_payload() {
        let out = run(&registry(&["alpha"]), &["alpha", "ok"]);
        assert_eq!(out.code, EXIT_SUCCESS);
        assert_eq!(out.stdout, "payload from alpha\n");
        assert!(out.stderr.is_empty());
    }

    #[test]
    fn failing_handler_exits_one_without_stdout() {
        let out = run(&registry(&["alpha"]), &["alpha", "fail"]);
        assert_eq!(out.code, EXIT_FAILURE);
        assert!(out.stdout.is_empty());
        assert_eq!(out.stderr, "error: alpha fail failed: upstream unavailable\n");
    }

    #[test]
    fn unknown_resource_exits_one_and_names_it() {
        let out = run(&registry(&["alpha", "beta"]), &["gamma", "ok"]);
        assert_eq!(out.code, EXIT_FAILURE);
        assert!(out.stdout.is_empty());
        assert!(out.stderr.contains("'gamma'"));
        assert!(out.stderr.contains("alpha, beta"));
    }

    #[test]
    fn version_exits_zero_with_only_version_on_stdout() {
        let out = run(&registry(&["alpha"]), &["--version"]);
        assert_eq!(out.code, EXIT_SUCCESS);
        assert_eq!(out.stdout, "meta-composer 0.1.0\n");
        assert!(out.stderr.is_empty());
    }

    #[test]
    fn help_exits_zero_on_stdout() {
        let out = run(&registry(&["alpha"]), &["--help"]);
        assert_eq!(out.code, EXIT_SUCCESS);
        assert!(out.stdout.contains("alpha ok"));
        assert!(out.stderr.is_empty());
    }

    #[test]
    fn missing_subcommand_exits_one() {
        let out = run(&registry(&["alpha"]), &["alpha"]);
        assert_eq!(out.code, EXIT_FAILURE);
        assert!(out.stdout.is_empty());
        assert!(!out.stderr.is_empty());
    }

    #[test]
    fn on_parsed_receives_global_flags_before_handler() {
        let program = assemble(
            &registry(&["alpha"]),
            Program::new("meta-composer", "0.1.0", "test"),
        );
        let mut seen = None;
        let code = dispatch(
            program,
            ["meta-composer", "-v", "alpha", "ok"],
            &mut Vec::new(),
            &mut Vec::new(),
            |flags| seen = Some(flags),
        );
        assert_eq!(code, EXIT_SUCCESS);
        assert_eq!(
            seen,
            Some(GlobalFlags {
                verbose: true,
                debug: false
            })
        );
    }

    #[test]
    fn on_parsed_not_called_when_parsing_fails() {
        let program = assemble(
            &registry(&["alpha"]),
            Program::new("meta-composer", "0.1.0", "test"),
        );
        let mut called = false;
        dispatch(
            program,
            ["meta-composer", "nope"],
            &mut Vec::new(),
            &mut Vec::new(),
            |_| called = true,
        );
        assert!(!called);
    }

    #[test]
    fn duplicate_registration_fails_before_commands_are_attached() {
        let first = Fixture::new("a");
        let second = Fixture::new("a");
        let first_count = Rc::clone(&first.registered);
        let second_count = Rc::clone(&second.registered);

        let mut registry = ResourceRegistry::new();
        registry.register(first).unwrap();
        let err = registry.register(second).unwrap_err();

        assert!(matches!(err, Error::DuplicateName(_)));
        assert_eq!(first_count.get(), 0);
        assert_eq!(second_count.get(), 0);
    }

    #[test]
    fn assemble_applies_resource_instructions() {
        let mut registry = ResourceRegistry::new();
        registry
            .register(Fixture {
                instructions: Some("Prefer ok over fail."),
                ..Fixture::new("alpha")
            })
            .unwrap();

        let program = assemble(&registry, Program::new("p", "0", "about"));
        assert_eq!(
            program.get_namespace("alpha").unwrap().get_instructions(),
            Some("Prefer ok over fail.")
        );
    }

    #[test]
    fn assemble_preserves_registration_order() {
        let program = assemble(
            &registry(&["c", "a", "b"]),
            Program::new("p", "0", "about"),
        );
        assert_eq!(program.namespace_names(), vec!["c", "a", "b"]);
    }

    #[test]
    fn report_writes_usage_errors_verbatim() {
        let mut stderr = Vec::new();
        let code = report(&mut stderr, &Error::Usage("error: bad flag".to_string()));
        assert_eq!(code, EXIT_FAILURE);
        assert_eq!(String::from_utf8(stderr).unwrap(), "error: bad flag\n");
    }
}
