//! Commands typed on stdin while a capture runs.
//!
//! One command per line: `s` starts or resumes, `p` pauses, `q` quits and
//! `l` (or a line holding only a space) flips the label.

use std::io::BufRead;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Pause,
    ToggleLabel,
    Quit,
}

impl Command {
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim_end_matches(['\r', '\n']);
        if line == " " {
            return Some(Command::ToggleLabel);
        }
        match line.trim().to_ascii_lowercase().as_str() {
            "s" | "start" => Some(Command::Start),
            "p" | "pause" => Some(Command::Pause),
            "l" | "label" => Some(Command::ToggleLabel),
            "q" | "quit" => Some(Command::Quit),
            _ => None,
        }
    }
}

/// Capture state shared between the serial loop and the stdin reader.
#[derive(Debug)]
pub struct Controls {
    label: AtomicU8,
    paused: AtomicBool,
    quit: AtomicBool,
}

impl Controls {
    pub fn new(label: u8, paused: bool) -> Self {
        Self {
            label: AtomicU8::new(label),
            paused: AtomicBool::new(paused),
            quit: AtomicBool::new(false),
        }
    }

    pub fn apply(&self, command: Command) {
        match command {
            Command::Start => self.paused.store(false, Ordering::Relaxed),
            Command::Pause => self.paused.store(true, Ordering::Relaxed),
            Command::ToggleLabel => {
                self.label.fetch_xor(1, Ordering::Relaxed);
            }
            Command::Quit => self.quit.store(true, Ordering::Relaxed),
        }
    }

    pub fn label(&self) -> u8 {
        self.label.load(Ordering::Relaxed)
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Relaxed)
    }

    pub fn should_quit(&self) -> bool {
        self.quit.load(Ordering::Relaxed)
    }
}

/// Read commands from stdin on a background thread until EOF or `q`.
pub fn spawn_stdin_reader(controls: Arc<Controls>) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            match Command::parse(&line) {
                Some(command) => {
                    controls.apply(command);
                    println!(
                        "[{:?}] label={} paused={}",
                        command,
                        controls.label(),
                        controls.is_paused()
                    );
                    if command == Command::Quit {
                        break;
                    }
                }
                None => println!("Commands: s=start p=pause l=toggle label q=quit"),
            }
        }
    })
}
