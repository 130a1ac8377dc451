// Interactive session: commands from stdin, task events in between

use std::io::Write;

use eyre::Result;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::cli::{render_outcome, render_table};
use crate::downloader::models::DownloadOptions;
use crate::session::{Controller, Notice, SessionState};

const HELP: &str = "\
commands:
  analyze <url>                 list the progressive MP4 formats of a video
  list                          show the format table again
  select <id|row>               choose a format by id, or by row number
  download [video|audio|both]   download the selection (default: both)
  status                        show state, status line and progress
  help                          this text
  quit                          leave (running downloads are abandoned)";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    Analyze(String),
    List,
    Select(String),
    Download(DownloadOptions),
    Status,
    Help,
    Quit,
    Empty,
}

impl ShellCommand {
    pub fn parse(line: &str) -> Result<Self, String> {
        let mut words = line.split_whitespace();
        let Some(command) = words.next() else {
            return Ok(Self::Empty);
        };
        let argument = words.next();
        if words.next().is_some() {
            return Err(format!("too many arguments for {}", command));
        }

        match (command.to_lowercase().as_str(), argument) {
            ("analyze" | "a", Some(url)) => Ok(Self::Analyze(url.to_string())),
            ("analyze" | "a", None) => Err("usage: analyze <url>".to_string()),
            ("list" | "ls", None) => Ok(Self::List),
            ("select" | "s", Some(target)) => Ok(Self::Select(target.to_string())),
            ("select" | "s", None) => Err("usage: select <id|row>".to_string()),
            ("download" | "d", None | Some("both")) => Ok(Self::Download(DownloadOptions::default())),
            ("download" | "d", Some("video")) => Ok(Self::Download(DownloadOptions::video_only())),
            ("download" | "d", Some("audio")) => Ok(Self::Download(DownloadOptions::audio_only())),
            ("download" | "d", Some(other)) => Err(format!("download what? '{}' (video, audio or both)", other)),
            ("status", None) => Ok(Self::Status),
            ("help" | "?", None) => Ok(Self::Help),
            ("quit" | "exit" | "q", None) => Ok(Self::Quit),
            (_, Some(_)) if is_known(command) => Err(format!("{} takes no argument", command)),
            _ => Err(format!("unknown command '{}', try help", command)),
        }
    }
}

fn is_known(command: &str) -> bool {
    matches!(command.to_lowercase().as_str(), "list" | "ls" | "status" | "help" | "?" | "quit" | "exit" | "q")
}

/// Shell-side view of progress, printed in steps of ten
#[derive(Debug, Default)]
struct ProgressEcho {
    last_decile: Option<u8>,
}

impl ProgressEcho {
    fn update(&mut self, percent: u8) -> Option<u8> {
        let decile = percent / 10;
        if percent == 0 {
            self.last_decile = Some(0);
            return None;
        }
        if self.last_decile.map_or(true, |last| decile > last) {
            self.last_decile = Some(decile);
            return Some(decile * 10);
        }
        None
    }
}

pub async fn run_shell(mut controller: Controller) -> Result<()> {
    println!("ytgrab shell; type help for commands");
    println!("videos: {}", controller.dirs().video_dir.display());
    println!("audios: {}", controller.dirs().audio_dir.display());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut echo = ProgressEcho::default();
    prompt()?;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match ShellCommand::parse(&line) {
                    Ok(ShellCommand::Quit) => break,
                    Ok(command) => execute(&mut controller, command),
                    Err(message) => println!("{}", message),
                }
                prompt()?;
            }
            Some(notice) = controller.next_event() => {
                render_notice(&controller, &notice, &mut echo);
            }
        }
    }

    if controller.session().is_download_running() {
        tracing::warn!("leaving with a download still running");
    }
    Ok(())
}

fn prompt() -> Result<()> {
    print!("ytgrab> ");
    std::io::stdout().flush()?;
    Ok(())
}

/// Run one command against the controller; rejected actions were already put
/// on the status line by the controller
fn execute(controller: &mut Controller, command: ShellCommand) {
    let outcome = match command {
        ShellCommand::Analyze(url) => controller.analyze(&url).map_err(|e| e.to_string()),
        ShellCommand::List => {
            print!("{}", render_table(controller.session()));
            if controller.session().rows().is_empty() {
                println!("no formats; analyze a URL first");
            }
            Ok(())
        }
        ShellCommand::Select(target) => select(controller, &target).map(|(row, id)| {
            println!("selected row {} (format {})", row, id);
        }),
        ShellCommand::Download(options) => controller.download(options).map_err(|e| e.to_string()),
        ShellCommand::Status => {
            let session = controller.session();
            println!("state: {:?}", session.state());
            println!("status: {}", session.status());
            if session.state() == SessionState::Downloading {
                println!("progress: {}%", session.progress());
            }
            Ok(())
        }
        ShellCommand::Help => {
            println!("{}", HELP);
            Ok(())
        }
        ShellCommand::Quit | ShellCommand::Empty => Ok(()),
    };

    if let Err(message) = outcome {
        println!("{}", message);
    }
}

/// A target naming a format id in the table wins; otherwise a number is a row
fn select(controller: &mut Controller, target: &str) -> Result<(usize, String), String> {
    let is_id = controller.session().rows().iter().any(|r| r.format_id == target);
    let selection = match target.parse::<usize>() {
        Ok(0) if !is_id => return Err("rows start at 1".to_string()),
        Ok(row) if !is_id => controller.select_index(row - 1),
        _ => controller.select_id(target),
    }
    .map_err(|e| e.to_string())?;

    Ok((selection.index + 1, selection.format_id))
}

fn render_notice(controller: &Controller, notice: &Notice, echo: &mut ProgressEcho) {
    match notice {
        Notice::Status(text) => println!("\n· {}", text),
        Notice::Progress(percent) => {
            if let Some(shown) = echo.update(*percent) {
                println!("\n· {}%", shown);
            }
        }
        Notice::FormatsReady { rows, .. } => {
            if *rows > 0 {
                print!("\n{}", render_table(controller.session()));
            }
        }
        Notice::ProbeFailed(_) | Notice::ProbeFinished => {}
        Notice::DownloadFinished { result, .. } => match result {
            Ok(outcome) => print!("\n{}", render_outcome(outcome)),
            Err(e) => println!("\n{}", e.status_text()),
        },
    }
}
