use anyhow::{Result, anyhow, bail};
use tracing::info;

use crate::gate::{Gate, Unlocked};
use crate::prompt::{confirm, prompt_line, prompt_number, prompt_optional_number, prompt_string};
use crate::series::{Serie, Update};
use crate::store::Store;

const HELP: &str = "\
Actions:
  ls [finished|ongoing]   list series
  add                     add a series
  update                  change season/episode of an ongoing series
  finish                  mark an ongoing series finished
  rm                      delete a series
  unlock                  enter a one-time code now
  lock                    forget the accepted code
  help                    show this text
  quit                    leave the shell";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Which {
    All,
    Finished,
    Ongoing,
}

#[derive(Debug, PartialEq, Eq)]
enum Action {
    List(Which),
    Add,
    Update,
    Finish,
    Remove,
    Unlock,
    Lock,
    Help,
    Quit,
    Nothing,
}

impl Action {
    fn parse(line: &str) -> Result<Self> {
        let mut words = line.split_whitespace();
        let action = match (words.next(), words.next()) {
            (None, _) => Action::Nothing,
            (Some("ls" | "list"), None) => Action::List(Which::All),
            (Some("ls" | "list"), Some("finished")) => Action::List(Which::Finished),
            (Some("ls" | "list"), Some("ongoing")) => Action::List(Which::Ongoing),
            (Some("add"), None) => Action::Add,
            (Some("update"), None) => Action::Update,
            (Some("finish"), None) => Action::Finish,
            (Some("rm" | "delete"), None) => Action::Remove,
            (Some("unlock"), None) => Action::Unlock,
            (Some("lock"), None) => Action::Lock,
            (Some("help" | "?"), None) => Action::Help,
            (Some("quit" | "exit"), None) => Action::Quit,
            _ => bail!("unknown action '{line}', try 'help'"),
        };
        if words.next().is_some() {
            bail!("unknown action '{line}', try 'help'");
        }
        Ok(action)
    }
}

/// Interactive shell. Once a code is accepted the gate stays open until
/// `lock` or the end of the process; nothing is written to disk.
///
/// `ask_code` supplies a code whenever one is needed and the gate is closed.
pub struct Session<'a, F> {
    gate: &'a Gate,
    store: &'a Store,
    ask_code: F,
    unlocked: Option<Unlocked>,
}

impl<'a, F> Session<'a, F>
where
    F: FnMut() -> Result<String>,
{
    pub fn new(gate: &'a Gate, store: &'a Store, ask_code: F) -> Self {
        Session {
            gate,
            store,
            ask_code,
            unlocked: None,
        }
    }

    pub fn run(&mut self) -> Result<()> {
        println!("series shell, type 'help' for actions");
        while let Some(line) = prompt_line("series> ")? {
            match Action::parse(&line).and_then(|action| self.dispatch(action)) {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) => eprintln!("Error: {e:#}"),
            }
        }
        Ok(())
    }

    /// Returns `false` when the shell should stop.
    fn dispatch(&mut self, action: Action) -> Result<bool> {
        let store = self.store;
        match action {
            Action::Nothing => {}
            Action::Quit => return Ok(false),
            Action::Help => println!("{HELP}"),
            Action::List(which) => print_series(store, which)?,
            Action::Unlock => {
                self.unlocked = None;
                self.key()?;
                println!("Unlocked.");
            }
            Action::Lock => {
                self.unlocked = None;
                info!("shell gate closed");
                println!("Locked.");
            }
            Action::Add => {
                let name = prompt_string("Name: ")?;
                let serie = if confirm("Finished? [y/N]: ")? {
                    let key = self.key()?;
                    store.add_finished(key, &name)?
                } else {
                    let season = prompt_number("Season: ")?;
                    let episode = prompt_number("Episode: ")?;
                    let key = self.key()?;
                    store.add_ongoing(key, &name, season, episode)?
                };
                println!("Added {serie}");
            }
            Action::Update => {
                let name = prompt_string("Name: ")?;
                let season = prompt_optional_number("Season (empty to keep): ")?;
                let episode = prompt_optional_number("Episode (empty to keep): ")?;
                let update = Update::from_parts(season, episode)
                    .ok_or_else(|| anyhow!("nothing to update"))?;
                let key = self.key()?;
                let serie = store.update(key, &name, update)?;
                println!("Updated {serie}");
            }
            Action::Finish => {
                let name = prompt_string("Name: ")?;
                let key = self.key()?;
                let serie = store.convert(key, &name)?;
                println!("Finished {serie}");
            }
            Action::Remove => {
                let name = prompt_string("Name: ")?;
                if !confirm(&format!("Delete '{}'? [y/N]: ", name.trim()))? {
                    return Ok(true);
                }
                let key = self.key()?;
                store.delete(key, &name)?;
                println!("Deleted {}", name.trim());
            }
        }
        Ok(true)
    }

    fn key(&mut self) -> Result<&Unlocked> {
        let key = match self.unlocked.take() {
            Some(key) => key,
            None => self.gate.unlock_now(&(self.ask_code)()?)?,
        };
        Ok(self.unlocked.insert(key))
    }
}

pub fn print_series(store: &Store, which: Which) -> Result<()> {
    match which {
        Which::All => {
            let (finished, ongoing): (Vec<Serie>, Vec<Serie>) = store
                .list_all()?
                .into_iter()
                .partition(|s| s.is_finished());
            print_group("Ongoing", &ongoing);
            print_group("Finished", &finished);
        }
        Which::Finished => print_group("Finished", &store.list(true)?),
        Which::Ongoing => print_group("Ongoing", &store.list(false)?),
    }
    Ok(())
}

fn print_group(label: &str, rows: &[Serie]) {
    println!("{label}:");
    if rows.is_empty() {
        println!("  (none)");
    }
    for s in rows {
        println!("  {s}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::otp::{self, SharedSecret};
    use crate::store::tests::Scratch;
    use std::cell::Cell;
    use time::OffsetDateTime;
    use zeroize::Zeroizing;

    const SECRET: &str = "GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ";

    fn gate() -> Gate {
        Gate::from_config(&Config {
            otp_secret: Some(Zeroizing::new(SECRET.to_string())),
            store_dir: "unused".into(),
            otp_issuer: "series".to_string(),
        })
    }

    fn current_code() -> String {
        let secret = SharedSecret::from_base32(SECRET).unwrap();
        otp::generate(&secret, OffsetDateTime::now_utc())
    }

    /// Differs from the current code in every digit.
    fn wrong_code() -> String {
        current_code()
            .bytes()
            .map(|b| char::from(b'0' + (b - b'0' + 5) % 10))
            .collect()
    }

    #[test]
    fn accepted_code_is_reused_for_later_mutations() {
        let dir = Scratch::new("shell-reuse");
        let store = Store::open(dir.0.join("series.json"));
        let gate = gate();
        let asked = Cell::new(0);
        let mut session = Session::new(&gate, &store, || {
            asked.set(asked.get() + 1);
            Ok(current_code())
        });

        store.add_finished(session.key().unwrap(), "Dark").unwrap();
        store.add_ongoing(session.key().unwrap(), "Andor", 1, 3).unwrap();
        assert_eq!(asked.get(), 1);
        assert_eq!(store.list_all().unwrap().len(), 2);
    }

    #[test]
    fn lock_forces_a_new_code() {
        let dir = Scratch::new("shell-lock");
        let store = Store::open(dir.0.join("series.json"));
        let gate = gate();
        let asked = Cell::new(0);
        let mut session = Session::new(&gate, &store, || {
            asked.set(asked.get() + 1);
            Ok(current_code())
        });

        session.key().unwrap();
        assert!(session.dispatch(Action::Lock).unwrap());
        assert!(session.unlocked.is_none());

        session.key().unwrap();
        assert_eq!(asked.get(), 2);
    }

    #[test]
    fn failed_unlock_leaves_the_gate_closed() {
        let dir = Scratch::new("shell-fail");
        let store = Store::open(dir.0.join("series.json"));
        let gate = gate();
        let asked = Cell::new(0);
        let mut session = Session::new(&gate, &store, || {
            asked.set(asked.get() + 1);
            Ok(wrong_code())
        });

        assert!(session.key().is_err());
        assert!(session.unlocked.is_none());
        assert!(session.key().is_err());
        assert_eq!(asked.get(), 2);
        assert!(store.list_all().unwrap().is_empty());
    }

    #[test]
    fn parses_actions() {
        assert_eq!(Action::parse("").unwrap(), Action::Nothing);
        assert_eq!(Action::parse("  ls ").unwrap(), Action::List(Which::All));
        assert_eq!(
            Action::parse("ls finished").unwrap(),
            Action::List(Which::Finished)
        );
        assert_eq!(
            Action::parse("list ongoing").unwrap(),
            Action::List(Which::Ongoing)
        );
        assert_eq!(Action::parse("delete").unwrap(), Action::Remove);
        assert_eq!(Action::parse("exit").unwrap(), Action::Quit);
    }

    #[test]
    fn rejects_unknown_actions() {
        assert!(Action::parse("ls someday").is_err());
        assert!(Action::parse("add Dark").is_err());
        assert!(Action::parse("drop").is_err());
    }
}
