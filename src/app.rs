use crate::cli::{builder_for, export_records};
use crate::config::Config;
use crate::event::StructuredEvent;
use crate::export::CalendarRecord;
use crate::parser::EventBuilder;
use crate::schedule::{find_conflicts, sort_events};
use anyhow::{anyhow, Result};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::path::PathBuf;

const HELP: &str = "\
Commands:
  add <phrase>     Parse a phrase, e.g. add Monday 10am Team Meeting
  list             Show the events added so far
  export [path]    Write the events to an .ics file
  clear            Forget all events
  help             Show this help
  exit             Leave";

/// Whether the loop should keep reading input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// Interactive session collecting events to export
pub struct Application {
    config: Config,
    builder: EventBuilder,
    events: Vec<StructuredEvent>,
}

impl Application {
    pub fn new(config: Config) -> Self {
        let builder = builder_for(&config);
        Self { config, builder, events: Vec::new() }
    }

    pub fn events(&self) -> &[StructuredEvent] {
        &self.events
    }

    pub fn run(&mut self) -> Result<()> {
        log::info!("Starting CalendMe interactive session");
        let mut rl = DefaultEditor::new()?;

        println!("Welcome to CalendMe! Type 'help' for commands.");
        let prompt = "calendme> ";

        loop {
            match rl.readline(prompt) {
                Ok(line) => {
                    let _ = rl.add_history_entry(line.as_str());
                    match self.process_input(&line) {
                        Ok(Flow::Exit) => break,
                        Ok(Flow::Continue) => {}
                        Err(err) => println!("Error: {}", err),
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("CTRL-C");
                    break;
                }
                Err(ReadlineError::Eof) => {
                    println!("CTRL-D");
                    break;
                }
                Err(err) => {
                    println!("Error: {:?}", err);
                    break;
                }
            }
        }

        Ok(())
    }

    pub fn process_input(&mut self, input: &str) -> Result<Flow> {
        let input = input.trim();
        let (command, rest) = match input.split_once(char::is_whitespace) {
            Some((command, rest)) => (command, rest.trim()),
            None => (input, ""),
        };

        match command.to_lowercase().as_str() {
            "" => {}
            "add" => {
                let event = self.add(rest)?;
                println!(
                    "Added: {} on {} {}-{}",
                    event.title,
                    event.date,
                    event.start_time.format("%H:%M"),
                    event.end_time.format("%H:%M")
                );
            }
            "list" => {
                if self.events.is_empty() {
                    println!("No events yet");
                }
                for (i, event) in self.events.iter().enumerate() {
                    println!(
                        "{:>3}. {} {}-{}  {} [{}]",
                        i + 1,
                        event.date,
                        event.start_time.format("%H:%M"),
                        event.end_time.format("%H:%M"),
                        event.title,
                        event.priority
                    );
                }
            }
            "export" => {
                let output = (!rest.is_empty()).then(|| PathBuf::from(rest));
                let records: Vec<CalendarRecord> =
                    self.events.iter().map(CalendarRecord::from).collect();
                export_records(&self.config, &records, output.as_deref())?;
            }
            "clear" => {
                self.events.clear();
                println!("Cleared all events");
            }
            "help" => println!("{}", HELP),
            "exit" | "quit" => return Ok(Flow::Exit),
            other => return Err(anyhow!("Unknown command '{}'. Type 'help' for commands.", other)),
        }
        Ok(Flow::Continue)
    }

    /// Parse `phrase`, warn about overlaps and keep the list in chronological order
    fn add(&mut self, phrase: &str) -> Result<StructuredEvent> {
        let event = self.builder.parse(phrase)?;
        for other in find_conflicts(&self.events, &event) {
            println!(
                "Warning: overlaps with '{}' ({}-{})",
                other.title,
                other.start_time.format("%H:%M"),
                other.end_time.format("%H:%M")
            );
        }
        self.events.push(event.clone());
        sort_events(&mut self.events);
        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app_in(dir: &std::path::Path) -> Application {
        let mut config = Config::default();
        config.export.directory = Some(dir.to_path_buf());
        Application::new(config)
    }

    #[test]
    fn test_add_list_clear() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut app = app_in(dir.path());

        assert_eq!(app.process_input("add tomorrow 3pm Dentist")?, Flow::Continue);
        assert_eq!(app.process_input("add tomorrow 9am Standup for 15 minutes")?, Flow::Continue);
        let titles: Vec<&str> = app.events().iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["Standup", "Dentist"]);

        app.process_input("list")?;
        app.process_input("clear")?;
        assert!(app.events().is_empty());
        Ok(())
    }

    #[test]
    fn test_bad_input_keeps_session() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut app = app_in(dir.path());
        assert!(app.process_input("add Team Meeting").is_err());
        assert!(app.process_input("frobnicate").is_err());
        assert_eq!(app.process_input("   ")?, Flow::Continue);
        assert_eq!(app.process_input("EXIT")?, Flow::Exit);
        Ok(())
    }

    #[test]
    fn test_export_writes_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut app = app_in(dir.path());
        assert!(app.process_input("export").is_err());

        app.process_input("add tomorrow 3pm Dentist")?;
        let target = dir.path().join("session.ics");
        app.process_input(&format!("export {}", target.display()))?;
        assert!(std::fs::read_to_string(target)?.contains("SUMMARY:Dentist"));
        Ok(())
    }
}
