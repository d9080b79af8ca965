use std::io::{self, Stdout, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::event::EventStream;
use crossterm::{cursor, execute, terminal};
use futures::StreamExt;
use hatcog_core::constants::{DEFAULT_DAEMON_ADDR, JOIN_DELAY, VERSION};
use hatcog_core::{
    ChannelError, ClientConfig, Diagnostic, EditOutcome, HandlerRegistry, LineChannel, LineEditor,
    NickCompletion, OutboundContext, PatternTable, RebuildReason, Target, Translator,
};

// ANSI codes
pub(crate) const BOLD: &str = "\x1b[1m";
pub(crate) const REVERSE: &str = "\x1b[7m";
pub(crate) const YELLOW: &str = "\x1b[33m";
pub(crate) const RED: &str = "\x1b[31m";
pub(crate) const RESET: &str = "\x1b[0m";

mod format;
mod keys;
mod render;
mod session;

use format::{error, system};
use render::{page, pager_command, Screen};
use session::{handlers, ChatSession};

#[derive(Parser, Debug)]
#[command(name = "hjoin")]
#[command(version, about = "Terminal chat client for the hatcog daemon")]
struct Args {
    /// Channel to join, with or without the leading '#'
    channel: Option<String>,

    /// Open a private conversation with this nick instead of a channel
    #[arg(long, value_name = "NICK")]
    private: Option<String>,

    /// Address of the hatcog daemon
    #[arg(long, env = "HATCOG_DAEMON", default_value = DEFAULT_DAEMON_ADDR)]
    daemon: String,

    /// NickServ password, sent before joining
    #[arg(long, env = "HATCOG_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Print every event with a timestamp instead of running the chat screen
    #[arg(long)]
    logger: bool,

    /// Prefix templated lines with the time
    #[arg(long)]
    timestamps: bool,

    /// JSON file overriding the built-in display patterns
    #[arg(long, value_name = "FILE")]
    patterns: Option<PathBuf>,
}

impl Args {
    fn into_config(self) -> Result<ClientConfig> {
        let target = Target::from_args(self.channel.as_deref(), self.private.as_deref());
        if target.is_none() && !self.logger {
            anyhow::bail!("No channel given. Usage: hjoin <channel> or hjoin --private <nick>");
        }
        Ok(ClientConfig {
            daemon_addr: self.daemon,
            target,
            password: self.password,
            timestamps: self.timestamps,
            patterns_path: self.patterns,
        })
    }
}

fn load_patterns(config: &ClientConfig) -> Result<PatternTable> {
    let table = match &config.patterns_path {
        Some(path) => PatternTable::load(path)?,
        None => PatternTable::builtin()?,
    };
    Ok(table)
}

/// Translate and send the identify and join commands.
async fn greet(
    channel: &mut LineChannel,
    translator: &Translator,
    config: &ClientConfig,
) -> Result<()> {
    let context = OutboundContext {
        channel: config.target.as_ref().map(Target::name).unwrap_or_default(),
        nick: None,
    };
    let lines = config.startup_lines();
    let identifies = lines.len() > 1;
    for (i, line) in lines.iter().enumerate() {
        if let Some(wire) = translator.translate_out(&context, line)? {
            channel.send(&wire).await?;
        }
        // give services time to accept the password before joining
        if identifies && i == 0 {
            tokio::time::sleep(JOIN_DELAY).await;
        }
    }
    Ok(())
}

/// Everything the interactive loop needs, so handlers can borrow it whole.
struct Client {
    channel: LineChannel,
    translator: Translator,
    handlers: HandlerRegistry<ChatSession>,
    session: ChatSession,
    editor: LineEditor,
    screen: Screen<Stdout>,
}

enum Flow {
    Continue,
    Quit,
}

impl Client {
    fn show(&mut self, text: &str) -> Result<()> {
        let status = self.session.status();
        self.screen.print_above_input(text, &status, &self.editor)?;
        Ok(())
    }

    fn redraw(&mut self) -> Result<()> {
        let status = self.session.status();
        self.screen.redraw_input(&status, &self.editor)?;
        Ok(())
    }

    /// Drain every complete line the daemon has sent.
    fn on_readable(&mut self) -> Result<Flow> {
        loop {
            let line = match self.channel.receive_one() {
                Ok(Some(line)) => line,
                Ok(None) => return Ok(Flow::Continue),
                Err(ChannelError::ConnectionLost) => {
                    tracing::info!("daemon closed the connection");
                    return Ok(Flow::Quit);
                }
                Err(e) => return Err(e.into()),
            };

            let translation =
                match self
                    .translator
                    .dispatch(&line, &self.handlers, &mut self.session)
                {
                    Ok(translation) => translation,
                    Err(e) => {
                        tracing::warn!(error = %e, "dropping line");
                        continue;
                    }
                };
            if let Some(Diagnostic::Unhandled(command)) = translation.diagnostic {
                self.session.unhandled.insert(command);
            }
            match translation.display {
                Some(display) => self.show(&display)?,
                None => self.redraw()?,
            }
        }
    }

    async fn on_terminal_event(&mut self, event: crossterm::event::Event) -> Result<Flow> {
        for key in keys::translate(&event) {
            let completion = NickCompletion::new(&self.session.presence, self.session.nick.as_deref());
            let outcome = self.editor.handle_key(key, &completion);
            match outcome {
                EditOutcome::Continue => self.redraw()?,
                EditOutcome::Line(line) => {
                    if is_quit(&line) {
                        return Ok(Flow::Quit);
                    }
                    self.submit(&line).await?;
                }
                EditOutcome::Quit => return Ok(Flow::Quit),
                EditOutcome::Rebuild { reason, snapshot } => {
                    if reason == RebuildReason::PageScroll {
                        terminal::disable_raw_mode()?;
                        if let Err(e) = page(&pager_command(), self.screen.scrollback()) {
                            tracing::warn!(error = %e, "pager failed");
                        }
                        terminal::enable_raw_mode()?;
                    }
                    self.editor = LineEditor::resume(snapshot);
                    let status = self.session.status();
                    self.screen.rebuild(
                        terminal::size()?,
                        self.session.host.as_deref(),
                        &status,
                        &self.editor,
                    )?;
                }
            }
        }
        Ok(Flow::Continue)
    }

    /// Send one line of input and echo messages locally; the daemon does
    /// not echo our own messages back.
    async fn submit(&mut self, line: &str) -> Result<()> {
        let context = OutboundContext {
            channel: self.session.channel(),
            nick: self.session.nick.as_deref(),
        };
        let wire = match self.translator.translate_out(&context, line) {
            Ok(Some(wire)) => wire,
            Ok(None) => return self.redraw(),
            Err(e) => return self.show(&error(&e.to_string())),
        };
        self.channel.send(&wire).await?;

        match local_echo(line) {
            Some(content) => {
                let nick = self.session.display_nick().to_string();
                let text = self.session.message_line(&nick, &content);
                self.show(&text)
            }
            None => self.redraw(),
        }
    }
}

fn is_quit(line: &str) -> bool {
    line.trim() == "/quit"
}

/// Content to show for our own submitted line: plain text as is, `/me` as
/// a CTCP ACTION, nothing for other commands.
fn local_echo(line: &str) -> Option<String> {
    let line = line.trim();
    if let Some(action) = line.strip_prefix("/me ") {
        Some(format!("\u{1}ACTION {action}\u{1}"))
    } else if line.starts_with(hatcog_core::constants::COMMAND_PREFIX) {
        None
    } else {
        Some(line.to_string())
    }
}

async fn run_interactive(config: ClientConfig, translator: Translator) -> Result<()> {
    let target = config
        .target
        .clone()
        .context("interactive mode needs a channel or --private nick")?;
    let mut channel = LineChannel::connect(&config.daemon_addr).await?;
    greet(&mut channel, &translator, &config).await?;

    let mut client = Client {
        channel,
        translator,
        handlers: handlers(),
        session: ChatSession::new(target),
        editor: LineEditor::new(),
        screen: Screen::new(io::stdout(), terminal::size()?),
    };
    let status = client.session.status();
    client
        .screen
        .rebuild(terminal::size()?, None, &status, &client.editor)?;

    let mut events = EventStream::new();
    loop {
        let flow = tokio::select! {
            ready = client.channel.readable() => {
                match ready {
                    Ok(()) => client.on_readable()?,
                    Err(ChannelError::ConnectionLost) => Flow::Quit,
                    Err(e) => return Err(e.into()),
                }
            }
            maybe_event = events.next() => {
                let Some(Ok(event)) = maybe_event else {
                    break;
                };
                client.on_terminal_event(event).await?
            }
        };
        if let Flow::Quit = flow {
            break;
        }
    }

    if !client.session.unhandled.is_empty() {
        tracing::info!(commands = ?client.session.unhandled, "commands without a template");
    }
    client.screen.clear_footer()?;
    client.channel.close().await;
    Ok(())
}

/// Print every translated event, timestamped, until the daemon goes away.
async fn run_logger(config: ClientConfig, translator: Translator) -> Result<()> {
    let translator = translator.with_timestamps(true);
    let mut channel = LineChannel::connect(&config.daemon_addr).await?;
    greet(&mut channel, &translator, &config).await?;

    let mut stdout = io::stdout();
    loop {
        match channel.readable().await {
            Ok(()) => {}
            Err(ChannelError::ConnectionLost) => break,
            Err(e) => return Err(e.into()),
        }
        loop {
            let line = match channel.receive_one() {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(ChannelError::ConnectionLost) => return Ok(()),
                Err(e) => return Err(e.into()),
            };
            match translator.translate_in(&line) {
                Ok(translation) => {
                    if let Some(display) = translation.display {
                        writeln!(stdout, "{display}")?;
                    }
                }
                Err(e) => tracing::warn!(error = %e, "dropping line"),
            }
        }
        stdout.flush()?;
    }
    Ok(())
}

fn restore_terminal() -> io::Result<()> {
    terminal::disable_raw_mode()?;
    execute!(io::stdout(), cursor::Show)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let logger = args.logger;
    let config = args.into_config()?;

    let log_path = hatcog_core::logging::init().context("Failed to open log file")?;
    tracing::info!(version = VERSION, log = %log_path.display(), "starting");

    let translator = Translator::new(load_patterns(&config)?).with_timestamps(config.timestamps);

    if logger {
        return run_logger(config, translator).await;
    }

    // Install panic hook to restore terminal
    let default_panic = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = restore_terminal();
        default_panic(info);
    }));

    terminal::enable_raw_mode()?;
    let result = run_interactive(config, translator).await;
    restore_terminal()?;
    println!();

    if let Err(e) = &result {
        tracing::error!(error = %e, "session ended with an error");
    } else {
        println!("{}", system("Goodbye."));
    }
    result
}
