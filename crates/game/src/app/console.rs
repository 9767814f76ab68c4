use std::collections::HashMap;

use world::Direction;

const MAX_STEPS: u32 = 64;
const MAX_TICKS: u32 = 6_000;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SessionCommand {
    Move { direction: Direction, steps: u32 },
    Hold { direction: Direction, ticks: u32 },
    Interact,
    Cancel,
    Wait { ticks: u32 },
    Look,
    Status,
    Save,
    Load,
    Hide,
    Say { text: String },
    Messages,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CommandParseError {
    pub(crate) reason: String,
    pub(crate) usage: String,
}

type ParseFn = fn(&[String]) -> Result<SessionCommand, String>;

struct CommandSpec {
    name: &'static str,
    help: &'static str,
    arg_schema: &'static str,
    parse: ParseFn,
}

/// Line commands understood by the headless session.
pub(crate) struct CommandRegistry {
    specs: Vec<CommandSpec>,
    lookup_by_lower_name: HashMap<String, usize>,
}

impl CommandRegistry {
    pub(crate) fn new() -> Self {
        Self {
            specs: Vec::new(),
            lookup_by_lower_name: HashMap::new(),
        }
    }

    pub(crate) fn with_session_commands() -> Self {
        let mut registry = Self::new();
        registry.register("move", "Step the player", "<dir> [steps]", parse_move, &["m", "go"]);
        registry.register("hold", "Hold a direction for ticks", "<dir> <ticks>", parse_hold, &[]);
        registry.register(
            "interact",
            "Open an adjacent door, fight an adjacent enemy, or win a fight",
            "",
            |_| Ok(SessionCommand::Interact),
            &["fight", "enter", "win", "space"],
        );
        registry.register(
            "cancel",
            "Lose the current fight",
            "",
            |_| Ok(SessionCommand::Cancel),
            &["lose", "esc"],
        );
        registry.register("wait", "Advance time", "<ticks>", parse_wait, &[]);
        registry.register("look", "Draw the room", "", |_| Ok(SessionCommand::Look), &["l"]);
        registry.register("status", "Show player and board status", "", |_| Ok(SessionCommand::Status), &[]);
        registry.register("save", "Save now", "", |_| Ok(SessionCommand::Save), &[]);
        registry.register("load", "Load the saved game", "", |_| Ok(SessionCommand::Load), &[]);
        registry.register("hide", "Simulate losing visibility", "", |_| Ok(SessionCommand::Hide), &[]);
        registry.register("say", "Leave a message on this spot", "<text...>", parse_say, &[]);
        registry.register("messages", "List board messages", "", |_| Ok(SessionCommand::Messages), &[]);
        registry.register("help", "List commands", "", |_| Ok(SessionCommand::Help), &["?"]);
        registry.register("quit", "Save and exit", "", |_| Ok(SessionCommand::Quit), &["exit", "q"]);
        registry
    }

    fn register(
        &mut self,
        name: &'static str,
        help: &'static str,
        arg_schema: &'static str,
        parse: ParseFn,
        aliases: &[&str],
    ) {
        self.specs.push(CommandSpec {
            name,
            help,
            arg_schema,
            parse,
        });
        let index = self.specs.len() - 1;
        for key in std::iter::once(&name).chain(aliases) {
            self.lookup_by_lower_name
                .entry(key.to_ascii_lowercase())
                .or_insert(index);
        }
    }

    pub(crate) fn parse_line(&self, line: &str) -> Option<Result<SessionCommand, CommandParseError>> {
        let tokens: Vec<String> = line.split_whitespace().map(ToString::to_string).collect();
        let (name, args) = tokens.split_first()?;
        let Some(spec) = self
            .lookup_by_lower_name
            .get(&name.to_ascii_lowercase())
            .and_then(|index| self.specs.get(*index))
        else {
            return Some(Err(CommandParseError {
                reason: format!("unknown command '{name}'"),
                usage: "help".to_string(),
            }));
        };

        Some((spec.parse)(args).map_err(|reason| CommandParseError {
            reason,
            usage: usage_line(spec),
        }))
    }

    pub(crate) fn help_lines(&self) -> Vec<String> {
        self.specs
            .iter()
            .map(|spec| format!("{} - {}", usage_line(spec), spec.help))
            .collect()
    }
}

fn usage_line(spec: &CommandSpec) -> String {
    if spec.arg_schema.is_empty() {
        spec.name.to_string()
    } else {
        format!("{} {}", spec.name, spec.arg_schema)
    }
}

fn parse_direction(token: Option<&String>) -> Result<Direction, String> {
    let token = token.ok_or_else(|| "missing direction".to_string())?;
    Direction::parse(token).ok_or_else(|| format!("invalid direction '{token}'"))
}

fn parse_count(token: Option<&String>, default: Option<u32>, max: u32) -> Result<u32, String> {
    let Some(token) = token else {
        return default.ok_or_else(|| "missing count".to_string());
    };
    let count: u32 = token
        .parse()
        .map_err(|_| format!("invalid count '{token}'"))?;
    if count == 0 || count > max {
        return Err(format!("count must be between 1 and {max}"));
    }
    Ok(count)
}

fn expect_no_more(args: &[String], used: usize) -> Result<(), String> {
    if args.len() > used {
        return Err("too many arguments".to_string());
    }
    Ok(())
}

fn parse_move(args: &[String]) -> Result<SessionCommand, String> {
    let direction = parse_direction(args.first())?;
    let steps = parse_count(args.get(1), Some(1), MAX_STEPS)?;
    expect_no_more(args, 2)?;
    Ok(SessionCommand::Move { direction, steps })
}

fn parse_hold(args: &[String]) -> Result<SessionCommand, String> {
    let direction = parse_direction(args.first())?;
    let ticks = parse_count(args.get(1), None, MAX_TICKS)?;
    expect_no_more(args, 2)?;
    Ok(SessionCommand::Hold { direction, ticks })
}

fn parse_wait(args: &[String]) -> Result<SessionCommand, String> {
    let ticks = parse_count(args.first(), None, MAX_TICKS)?;
    expect_no_more(args, 1)?;
    Ok(SessionCommand::Wait { ticks })
}

fn parse_say(args: &[String]) -> Result<SessionCommand, String> {
    if args.is_empty() {
        return Err("missing text".to_string());
    }
    Ok(SessionCommand::Say {
        text: args.join(" "),
    })
}
