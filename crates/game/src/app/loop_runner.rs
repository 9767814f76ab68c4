use std::io::{self, BufRead, Write};
use std::process::ExitCode;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{error, info};
use world::{
    load_world, save_world, AutosaveTimer, CombatPhase, Direction, InputSnapshot, SaveStore,
    SaveTrigger, TickReport, WorldMachine, WorldMachineFocus,
};

use super::bootstrap::AppWiring;
use super::console::{CommandRegistry, SessionCommand};
use super::message_board::MessageBoard;
use super::view;

pub(crate) const FIXED_DT_SECONDS: f32 = 1.0 / 60.0;
/// Upper bound on ticks spent waiting for a move or a fade to finish.
const MAX_SETTLE_TICKS: u32 = 600;
const LISTING_TIMEOUT: Duration = Duration::from_secs(6);
const SHUTDOWN_BOARD_WAIT: Duration = Duration::from_secs(2);
const BOARD_POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

/// Headless fixed-step session: each command line advances the world by whole
/// ticks and prints what changed.
pub(crate) struct Session<W: Write> {
    machine: WorldMachine,
    saves: Box<dyn SaveStore>,
    board: Option<MessageBoard>,
    autosave: AutosaveTimer,
    registry: CommandRegistry,
    out: W,
    ticks: u64,
}

pub(crate) fn run(app: AppWiring) -> ExitCode {
    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut session = Session::new(app, stdout.lock());

    match session.run_lines(stdin.lock()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "session_io_failed");
            ExitCode::FAILURE
        }
    }
}

impl<W: Write> Session<W> {
    pub(crate) fn new(app: AppWiring, out: W) -> Self {
        Self {
            machine: app.machine,
            saves: app.saves,
            board: app.board,
            autosave: app.autosave,
            registry: CommandRegistry::with_session_commands(),
            out,
            ticks: 0,
        }
    }

    pub(crate) fn run_lines<R: BufRead>(&mut self, input: R) -> io::Result<()> {
        self.print_view()?;
        writeln!(self.out, "type 'help' for commands")?;

        for line in input.lines() {
            let line = line?;
            let command = match self.registry.parse_line(&line) {
                None => continue,
                Some(Err(err)) => {
                    writeln!(self.out, "error: {}. usage: {}", err.reason, err.usage)?;
                    continue;
                }
                Some(Ok(command)) => command,
            };
            if self.execute(command)? == Flow::Quit {
                break;
            }
        }

        self.shutdown()
    }

    fn execute(&mut self, command: SessionCommand) -> io::Result<Flow> {
        match command {
            SessionCommand::Move { direction, steps } => {
                self.walk(direction, steps)?;
                self.print_view()?;
            }
            SessionCommand::Hold { direction, ticks } => {
                let input = InputSnapshot::empty().holding(direction);
                for _ in 0..ticks {
                    self.step(&input)?;
                }
                self.print_view()?;
            }
            SessionCommand::Interact => {
                self.interact(InputSnapshot::empty().with_interact_pressed(true))?;
                self.print_view()?;
            }
            SessionCommand::Cancel => {
                if self.machine.focus() == WorldMachineFocus::Combat {
                    self.interact(InputSnapshot::empty().with_cancel_pressed(true))?;
                    self.print_view()?;
                } else {
                    writeln!(self.out, "nothing to cancel")?;
                }
            }
            SessionCommand::Wait { ticks } => {
                let input = InputSnapshot::empty();
                for _ in 0..ticks {
                    self.step(&input)?;
                }
                self.print_view()?;
            }
            SessionCommand::Look => self.print_view()?,
            SessionCommand::Status => {
                self.poll_board()?;
                for line in view::status_lines(&self.machine, self.board.as_ref()) {
                    writeln!(self.out, "{line}")?;
                }
            }
            SessionCommand::Save => {
                let saved = save_world(self.machine.store(), self.saves.as_mut(), SaveTrigger::Manual);
                self.autosave.reset();
                writeln!(self.out, "{}", if saved { "saved" } else { "save failed" })?;
            }
            SessionCommand::Load => {
                if load_world(self.machine.store_mut(), self.saves.as_ref()) {
                    self.machine.restart_room();
                    writeln!(self.out, "loaded")?;
                    self.print_view()?;
                } else {
                    writeln!(self.out, "no saved game loaded")?;
                }
            }
            SessionCommand::Hide => {
                self.step(&InputSnapshot::empty().with_visibility_lost(true))?;
            }
            SessionCommand::Say { text } => self.say(&text)?,
            SessionCommand::Messages => self.list_messages()?,
            SessionCommand::Help => {
                for line in self.registry.help_lines() {
                    writeln!(self.out, "{line}")?;
                }
            }
            SessionCommand::Quit => return Ok(Flow::Quit),
        }
        Ok(Flow::Continue)
    }

    /// One fixed tick plus everything that hangs off it: autosave, save
    /// requests, board polling and event lines.
    fn step(&mut self, input: &InputSnapshot) -> io::Result<TickReport> {
        let report = self.machine.tick(FIXED_DT_SECONDS, input);
        self.ticks += 1;

        if let Some(trigger) = report.save_request {
            save_world(self.machine.store(), self.saves.as_mut(), trigger);
            self.autosave.reset();
        } else if self.autosave.tick(FIXED_DT_SECONDS) {
            save_world(self.machine.store(), self.saves.as_mut(), SaveTrigger::Interval);
        }

        if let Some(room_id) = &report.room_changed {
            writeln!(self.out, "-- entered {room_id} --")?;
        }
        if let Some(session) = &report.combat_started {
            writeln!(self.out, "-- combat with {} --", session.enemy_id)?;
        }
        if let Some(result) = &report.combat_result {
            let outcome = if result.victory { "VICTORY!" } else { "DEFEAT!" };
            match &result.damaged_part {
                Some(part) => writeln!(self.out, "-- {outcome} your {part} was hurt --")?,
                None => writeln!(self.out, "-- {outcome} --")?,
            }
        }

        self.poll_board()?;
        Ok(report)
    }

    fn settle(&mut self) -> io::Result<()> {
        let idle = InputSnapshot::empty();
        for _ in 0..MAX_SETTLE_TICKS {
            if !self.machine.room().player().is_busy() {
                break;
            }
            self.step(&idle)?;
        }
        Ok(())
    }

    fn walk(&mut self, direction: Direction, steps: u32) -> io::Result<()> {
        let input = InputSnapshot::empty().holding(direction);
        for _ in 0..steps {
            let report = self.step(&input)?;
            match report.player_move {
                Some(outcome) if outcome.moved => {
                    if !outcome.pushed.is_empty() {
                        writeln!(self.out, "pushed {}", outcome.pushed.join(", "))?;
                    }
                    self.settle()?;
                }
                Some(outcome) => {
                    let reason = outcome
                        .rejection
                        .as_ref()
                        .map_or("blocked", |rejection| rejection.as_str());
                    writeln!(self.out, "blocked: {reason}")?;
                    break;
                }
                None => {
                    writeln!(self.out, "cannot move right now")?;
                    break;
                }
            }
        }
        Ok(())
    }

    /// Room: a single interact tick. Combat: wait out the fade-in, press, then
    /// run until control is back in the room.
    fn interact(&mut self, press: InputSnapshot) -> io::Result<()> {
        if self.machine.focus() == WorldMachineFocus::Room {
            self.settle()?;
            let report = self.step(&press)?;
            if report.room_changed.is_none() && report.combat_started.is_none() {
                writeln!(self.out, "nothing to interact with")?;
            }
            return Ok(());
        }

        let idle = InputSnapshot::empty();
        for _ in 0..MAX_SETTLE_TICKS {
            match self.machine.combat().map(|combat| combat.phase()) {
                Some(CombatPhase::Entering) => {
                    self.step(&idle)?;
                }
                _ => break,
            }
        }
        self.step(&press)?;
        for _ in 0..MAX_SETTLE_TICKS {
            if self.machine.focus() == WorldMachineFocus::Room {
                break;
            }
            self.step(&idle)?;
        }
        Ok(())
    }

    fn say(&mut self, text: &str) -> io::Result<()> {
        let Some(board) = self.board.as_mut() else {
            return writeln!(self.out, "message board is off");
        };
        let pixel = self.machine.room().player().pixel();
        match board.post(text, pixel.x, pixel.y) {
            Ok(()) => writeln!(self.out, "message sent"),
            Err(reason) => writeln!(self.out, "error: {reason}. usage: say <text...>"),
        }
    }

    fn list_messages(&mut self) -> io::Result<()> {
        let Some(board) = self.board.as_mut() else {
            return writeln!(self.out, "message board is off");
        };
        board.request_listing();
        let started = Instant::now();
        let listing = loop {
            board.poll();
            if let Some(listing) = board.take_listing() {
                break listing;
            }
            if started.elapsed() >= LISTING_TIMEOUT {
                break Vec::new();
            }
            thread::sleep(BOARD_POLL_INTERVAL);
        };

        if listing.is_empty() {
            return writeln!(self.out, "no messages");
        }
        for message in &listing {
            writeln!(
                self.out,
                "[{}] ({:.0},{:.0}) {}",
                message.level, message.x, message.y, message.text
            )?;
        }
        Ok(())
    }

    fn poll_board(&mut self) -> io::Result<()> {
        let Some(board) = self.board.as_mut() else {
            return Ok(());
        };
        let before = board.status().clone();
        if board.poll() && *board.status() != before {
            writeln!(self.out, "board: {}", board.status().label())?;
        }
        Ok(())
    }

    fn print_view(&mut self) -> io::Result<()> {
        self.poll_board()?;
        for line in view::render(&self.machine, self.board.as_ref()) {
            writeln!(self.out, "{line}")?;
        }
        Ok(())
    }

    fn shutdown(&mut self) -> io::Result<()> {
        self.machine.shutdown();
        let saved = save_world(self.machine.store(), self.saves.as_mut(), SaveTrigger::Shutdown);
        if let Some(board) = self.board.as_mut() {
            board.wait_idle(SHUTDOWN_BOARD_WAIT);
        }
        info!(ticks = self.ticks, saved, "session_ended");
        writeln!(self.out, "bye")?;
        self.out.flush()
    }
}
