//! The command tree resources attach to, and its two-phase
//! parse-then-execute lifecycle.
//!
//! A [`Program`] is assembled from namespaces (one per resource) holding
//! leaf commands. [`Program::parse`] turns process arguments into either a
//! [`Parsed::Command`] ready to run or text to display (`--help`,
//! `--version`). Parsing happens once; the returned [`ParsedCommand`] runs
//! its handler exactly once.

use std::ffi::OsString;

use clap::error::ErrorKind;
use clap::{Arg, ArgAction, ArgMatches};
use tracing::debug;

use crate::command::{CommandInfo, Placeholder};
use crate::error::{Error, HandlerError, Result};

/// Outcome of a handler: the full payload for standard output, or an error.
pub type HandlerResult = std::result::Result<String, HandlerError>;

type Handler = Box<dyn Fn(&Invocation) -> HandlerResult>;

const VERBOSE_FLAG: &str = "verbose";
const DEBUG_FLAG: &str = "debug";

/// Root of the command-line surface.
pub struct Program {
    name: String,
    version: String,
    about: String,
    namespaces: Vec<Namespace>,
}

impl Program {
    /// Creates an empty program with the given name, version and
    /// top-level description.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        about: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            about: about.into(),
            namespaces: Vec::new(),
        }
    }

    /// Returns the namespace called `name`, creating it with `about` as its
    /// description if it does not exist yet.
    pub fn namespace(&mut self, name: &str, about: &str) -> &mut Namespace {
        let index = match self.namespaces.iter().position(|ns| ns.name == name) {
            Some(index) => index,
            None => {
                self.namespaces.push(Namespace::new(name, about));
                self.namespaces.len() - 1
            }
        };
        &mut self.namespaces[index]
    }

    /// Looks up an existing namespace.
    #[must_use]
    pub fn get_namespace(&self, name: &str) -> Option<&Namespace> {
        self.namespaces.iter().find(|ns| ns.name == name)
    }

    pub(crate) fn get_namespace_mut(&mut self, name: &str) -> Option<&mut Namespace> {
        self.namespaces.iter_mut().find(|ns| ns.name == name)
    }

    /// Names of all namespaces in the order they were added.
    #[must_use]
    pub fn namespace_names(&self) -> Vec<String> {
        self.namespaces.iter().map(|ns| ns.name.clone()).collect()
    }

    /// Builds the `clap` command tree.
    ///
    /// # Errors
    ///
    /// Returns an error if a leaf command declares malformed argument
    /// placeholders.
    pub fn command(&self) -> Result<clap::Command> {
        let mut root = clap::Command::new(self.name.clone())
            .version(self.version.clone())
            .about(self.about.clone())
            .subcommand_required(true)
            .arg_required_else_help(true)
            .arg(
                Arg::new(VERBOSE_FLAG)
                    .short('v')
                    .long(VERBOSE_FLAG)
                    .help("Enable verbose output")
                    .global(true)
                    .action(ArgAction::SetTrue),
            )
            .arg(
                Arg::new(DEBUG_FLAG)
                    .short('d')
                    .long(DEBUG_FLAG)
                    .help("Enable debug output")
                    .global(true)
                    .action(ArgAction::SetTrue),
            );

        if let Some(overview) = self.render_overview() {
            root = root.after_help(overview);
        }

        for namespace in &self.namespaces {
            root = root.subcommand(namespace.to_clap()?);
        }

        Ok(root)
    }

    /// Renders one usage line per leaf command, grouped by resource.
    fn render_overview(&self) -> Option<String> {
        let lines: Vec<(String, &str)> = self
            .namespaces
            .iter()
            .flat_map(|ns| {
                ns.commands
                    .iter()
                    .map(move |leaf| (leaf.info.usage(&ns.name), leaf.info.description.as_str()))
            })
            .collect();

        if lines.is_empty() {
            return None;
        }

        let width = lines.iter().map(|(usage, _)| usage.len()).max().unwrap_or(0);
        let mut overview = String::from("Resource commands:\n");
        for (usage, description) in lines {
            overview.push_str(&format!("  {usage:<width$}  {description}\n"));
        }
        Some(overview.trim_end().to_string())
    }

    /// Parses `args` (including the program name) against the assembled
    /// command tree.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownResource`] when the first word is not a
    /// registered namespace, [`Error::Usage`] for every other parse
    /// failure, and placeholder errors from [`Program::command`].
    pub fn parse<I, T>(mut self, args: I) -> Result<Parsed>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let args: Vec<OsString> = args.into_iter().map(Into::into).collect();
        let command = self.command()?;

        let matches = match command.try_get_matches_from(&args) {
            Ok(matches) => matches,
            Err(err) => return self.classify_parse_error(&err, &args),
        };

        let flags = GlobalFlags {
            verbose: matches.get_flag(VERBOSE_FLAG),
            debug: matches.get_flag(DEBUG_FLAG),
        };

        let Some((resource, resource_matches)) = matches.subcommand() else {
            return Err(Error::Usage(format!("{}: missing resource", self.name)));
        };
        let Some((operation, leaf_matches)) = resource_matches.subcommand() else {
            return Err(Error::Usage(format!("{resource}: missing command")));
        };

        let leaf = self
            .get_namespace_mut(resource)
            .and_then(|ns| ns.take_command(operation))
            .ok_or_else(|| Error::Usage(format!("{resource} {operation}: no such command")))?;

        let invocation = Invocation::from_matches(resource, &leaf.info, leaf_matches)?;
        debug!(resource, operation, "parsed command");

        Ok(Parsed::Command(ParsedCommand {
            invocation,
            handler: leaf.handler,
            flags,
        }))
    }

    fn classify_parse_error(&self, err: &clap::Error, args: &[OsString]) -> Result<Parsed> {
        let rendered = err.render().to_string();
        match err.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                return Ok(Parsed::Display(rendered));
            }
            _ => {}
        }

        let first_word = args
            .iter()
            .skip(1)
            .filter_map(|arg| arg.to_str())
            .find(|arg| !arg.starts_with('-'));

        if let Some(word) = first_word
            && word != "help"
            && self.get_namespace(word).is_none()
        {
            return Err(Error::UnknownResource {
                name: word.to_string(),
                available: self.namespace_names(),
            });
        }

        Err(Error::Usage(rendered.trim_end().to_string()))
    }
}

impl std::fmt::Debug for Program {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Program")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("namespaces", &self.namespaces)
            .finish()
    }
}

/// A resource's group of leaf commands.
pub struct Namespace {
    name: String,
    about: String,
    instructions: Option<String>,
    commands: Vec<LeafCommand>,
}

struct LeafCommand {
    info: CommandInfo,
    handler: Handler,
}

impl Namespace {
    fn new(name: &str, about: &str) -> Self {
        Self {
            name: name.to_string(),
            about: about.to_string(),
            instructions: None,
            commands: Vec::new(),
        }
    }

    /// Namespace name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Namespace description.
    #[must_use]
    pub fn about(&self) -> &str {
        &self.about
    }

    /// Usage instructions shown after the namespace's help, if any.
    #[must_use]
    pub fn get_instructions(&self) -> Option<&str> {
        self.instructions.as_deref()
    }

    /// Sets usage instructions shown after the namespace's help.
    pub fn instructions(&mut self, text: impl Into<String>) -> &mut Self {
        self.instructions = Some(text.into());
        self
    }

    /// Adds a leaf command and the handler that runs it.
    ///
    /// A later command with the same name replaces the earlier one.
    pub fn command<F>(&mut self, info: CommandInfo, handler: F) -> &mut Self
    where
        F: Fn(&Invocation) -> HandlerResult + 'static,
    {
        self.commands.retain(|leaf| leaf.info.name != info.name);
        self.commands.push(LeafCommand {
            info,
            handler: Box::new(handler),
        });
        self
    }

    /// Descriptors of the leaf commands, in registration order.
    pub fn commands(&self) -> impl Iterator<Item = &CommandInfo> {
        self.commands.iter().map(|leaf| &leaf.info)
    }

    fn take_command(&mut self, name: &str) -> Option<LeafCommand> {
        let index = self.commands.iter().position(|leaf| leaf.info.name == name)?;
        Some(self.commands.swap_remove(index))
    }

    fn to_clap(&self) -> Result<clap::Command> {
        let mut command = clap::Command::new(self.name.clone())
            .about(self.about.clone())
            .subcommand_required(true)
            .arg_required_else_help(true);

        if let Some(instructions) = &self.instructions {
            command = command.after_help(instructions.clone());
        }

        for leaf in &self.commands {
            let mut sub =
                clap::Command::new(leaf.info.name.clone()).about(leaf.info.description.clone());
            for placeholder in leaf.info.placeholders()? {
                sub = sub.arg(
                    Arg::new(placeholder.name.clone())
                        .value_name(placeholder.name.clone())
                        .required(placeholder.required)
                        .action(ArgAction::Set),
                );
            }
            command = command.subcommand(sub);
        }

        Ok(command)
    }
}

impl std::fmt::Debug for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Namespace")
            .field("name", &self.name)
            .field("commands", &self.commands().map(|c| &c.name).collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

/// Result of [`Program::parse`].
#[derive(Debug)]
pub enum Parsed {
    /// A leaf command matched and is ready to run.
    Command(ParsedCommand),
    /// Help or version text; print to standard output and exit successfully.
    Display(String),
}

/// Flags accepted by every command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GlobalFlags {
    /// `--verbose` was given.
    pub verbose: bool,
    /// `--debug` was given.
    pub debug: bool,
}

/// A matched leaf command together with its handler.
pub struct ParsedCommand {
    invocation: Invocation,
    handler: Handler,
    flags: GlobalFlags,
}

impl ParsedCommand {
    /// Global flags given on the command line.
    #[must_use]
    pub fn flags(&self) -> GlobalFlags {
        self.flags
    }

    /// The matched invocation.
    #[must_use]
    pub fn invocation(&self) -> &Invocation {
        &self.invocation
    }

    /// Runs the handler, consuming the command.
    ///
    /// # Errors
    ///
    /// Wraps any handler failure in [`Error::Handler`] tagged with the
    /// resource and operation.
    pub fn execute(self) -> Result<String> {
        debug!(
            resource = self.invocation.resource,
            operation = self.invocation.operation,
            "running handler"
        );
        (self.handler)(&self.invocation).map_err(|source| Error::Handler {
            resource: self.invocation.resource.clone(),
            operation: self.invocation.operation.clone(),
            source,
        })
    }
}

impl std::fmt::Debug for ParsedCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParsedCommand")
            .field("invocation", &self.invocation)
            .field("flags", &self.flags)
            .finish_non_exhaustive()
    }
}

/// Arguments passed to a handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    resource: String,
    operation: String,
    args: Vec<(String, Option<String>)>,
}

impl Invocation {
    /// Creates an invocation directly, bypassing argument parsing.
    #[must_use]
    pub fn new(
        resource: impl Into<String>,
        operation: impl Into<String>,
        args: Vec<(String, Option<String>)>,
    ) -> Self {
        Self {
            resource: resource.into(),
            operation: operation.into(),
            args,
        }
    }

    fn from_matches(resource: &str, info: &CommandInfo, matches: &ArgMatches) -> Result<Self> {
        let args = info
            .placeholders()?
            .into_iter()
            .map(|Placeholder { name, .. }| {
                let value = matches.get_one::<String>(&name).cloned();
                (name, value)
            })
            .collect();

        Ok(Self::new(resource, info.name.clone(), args))
    }

    /// Resource namespace that matched.
    #[must_use]
    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// Leaf command that matched.
    #[must_use]
    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Value of the argument declared as `<name>` or `[name]`, if given.
    #[must_use]
    pub fn arg(&self, name: &str) -> Option<&str> {
        self.args
            .iter()
            .find(|(arg, _)| arg == name)
            .and_then(|(_, value)| value.as_deref())
    }

    /// Value of a required argument.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingArgument`] if it was not supplied.
    pub fn required(&self, name: &str) -> Result<&str> {
        self.arg(name)
            .ok_or_else(|| Error::MissingArgument(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn program() -> Program {
        let mut program = Program::new("meta-composer", "1.2.3", "Compose metadata");
        program
            .namespace("echo", "Echo values")
            .command(
                CommandInfo::new("say", "Repeat a word").arg("<word>").arg("[suffix]"),
                |inv| {
                    let word = inv.required("word")?;
                    Ok(format!("{word}{}", inv.arg("suffix").unwrap_or("")))
                },
            )
            .command(CommandInfo::new("fail", "Always fails"), |_| {
                Err("boom".into())
            });
        program
    }

    fn run(args: &[&str]) -> Result<Parsed> {
        let mut argv = vec!["meta-composer"];
        argv.extend_from_slice(args);
        program().parse(argv)
    }

    #[test]
    fn namespace_is_created_once() {
        let mut program = Program::new("p", "0", "about");
        program.namespace("a", "first");
        program.namespace("a", "second");
        program.namespace("b", "other");
        assert_eq!(program.namespace_names(), vec!["a", "b"]);
        assert_eq!(program.get_namespace("a").unwrap().about(), "first");
    }

    #[test]
    fn command_with_same_name_replaces_previous() {
        let mut program = Program::new("p", "0", "about");
        program
            .namespace("a", "x")
            .command(CommandInfo::new("get", "old"), |_| Ok(String::new()))
            .command(CommandInfo::new("get", "new"), |_| Ok(String::new()));
        let descriptions: Vec<_> = program
            .get_namespace("a")
            .unwrap()
            .commands()
            .map(|c| c.description.clone())
            .collect();
        assert_eq!(descriptions, vec!["new"]);
    }

    #[test]
    fn clap_tree_is_valid() {
        program().command().unwrap().debug_assert();
    }

    #[test]
    fn parse_and_execute_leaf_command() {
        let Parsed::Command(cmd) = run(&["echo", "say", "hi", "!"]).unwrap() else {
            panic!("expected a command");
        };
        assert_eq!(cmd.invocation().resource(), "echo");
        assert_eq!(cmd.invocation().operation(), "say");
        assert_eq!(cmd.execute().unwrap(), "hi!");
    }

    #[test]
    fn optional_argument_may_be_omitted() {
        let Parsed::Command(cmd) = run(&["echo", "say", "hi"]).unwrap() else {
            panic!("expected a command");
        };
        assert_eq!(cmd.invocation().arg("suffix"), None);
        assert_eq!(cmd.execute().unwrap(), "hi");
    }

    #[test]
    fn global_flags_are_parsed_anywhere() {
        let Parsed::Command(cmd) = run(&["--verbose", "echo", "say", "hi", "--debug"]).unwrap()
        else {
            panic!("expected a command");
        };
        assert_eq!(
            cmd.flags(),
            GlobalFlags {
                verbose: true,
                debug: true
            }
        );
    }

    #[test]
    fn handler_error_is_tagged_with_resource_and_operation() {
        let Parsed::Command(cmd) = run(&["echo", "fail"]).unwrap() else {
            panic!("expected a command");
        };
        let err = cmd.execute().unwrap_err();
        assert_eq!(err.to_string(), "echo fail failed: boom");
    }

    #[test]
    fn version_is_displayed() {
        let Parsed::Display(text) = run(&["--version"]).unwrap() else {
            panic!("expected display output");
        };
        assert_eq!(text.trim(), "meta-composer 1.2.3");
    }

    #[test]
    fn help_lists_resource_commands() {
        let Parsed::Display(text) = run(&["--help"]).unwrap() else {
            panic!("expected display output");
        };
        assert!(text.contains("echo say <word> [suffix]"));
        assert!(text.contains("Repeat a word"));
    }

    #[test]
    fn namespace_help_shows_instructions() {
        let mut program = program();
        program
            .get_namespace_mut("echo")
            .unwrap()
            .instructions("Use say for greetings.");
        let Parsed::Display(text) = program.parse(["meta-composer", "echo", "--help"]).unwrap()
        else {
            panic!("expected display output");
        };
        assert!(text.contains("Use say for greetings."));
    }

    #[test]
    fn unknown_resource_lists_available_names() {
        let err = run(&["nope", "list"]).unwrap_err();
        match err {
            Error::UnknownResource { name, available } => {
                assert_eq!(name, "nope");
                assert_eq!(available, vec!["echo"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn unknown_leaf_command_is_a_usage_error() {
        let err = run(&["echo", "shout"]).unwrap_err();
        assert!(matches!(err, Error::Usage(_)));
    }

    #[test]
    fn missing_required_argument_is_a_usage_error() {
        let err = run(&["echo", "say"]).unwrap_err();
        assert!(matches!(err, Error::Usage(ref msg) if msg.contains("<word>")));
    }

    #[test]
    fn excess_arguments_are_rejected() {
        let err = run(&["echo", "fail", "extra"]).unwrap_err();
        assert!(matches!(err, Error::Usage(_)));
    }

    #[test]
    fn missing_subcommand_is_a_usage_error() {
        assert!(matches!(run(&["echo"]).unwrap_err(), Error::Usage(_)));
        assert!(matches!(run(&[]).unwrap_err(), Error::Usage(_)));
    }

    #[test]
    fn invalid_placeholder_fails_command_building() {
        let mut program = Program::new("p", "0", "about");
        program
            .namespace("a", "x")
            .command(CommandInfo::new("get", "x").arg("bad"), |_| Ok(String::new()));
        assert!(matches!(
            program.command().unwrap_err(),
            Error::InvalidPlaceholder(_)
        ));
    }

    #[test]
    fn invocation_required_reports_missing_argument() {
        let inv = Invocation::new("a", "b", vec![("x".to_string(), None)]);
        assert!(matches!(
            inv.required("x").unwrap_err(),
            Error::MissingArgument(ref n) if n == "x"
        ));
    }
}
