//! Executes parsed script commands against a backend manager.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use libchinese_backend::{
    BackendConfig, BackendManager, BackendSettings, BackendSlot, Clock, ConverterInstance,
    HistoryLibrary, HistorySession, ManualClock, Scheme, SchemeFamily, SharedConfig,
    SimulatedLoop,
};
use serde::Serialize;

use crate::script::{Command, Line};

type Manager = BackendManager<HistoryLibrary>;

pub struct Runner {
    config: SharedConfig,
    event_loop: SimulatedLoop,
    slot: BackendSlot<HistoryLibrary>,
    sessions: HashMap<String, ConverterInstance<HistorySession>>,
}

#[derive(Debug, Serialize)]
pub struct Summary {
    pub finalized: bool,
    pub save_pending: bool,
    pub elapsed_secs: u64,
    pub families: Vec<FamilySummary>,
}

#[derive(Debug, Serialize)]
pub struct FamilySummary {
    pub family: SchemeFamily,
    pub scheme: Option<Scheme>,
    pub options: u32,
    pub history_file: Option<String>,
    pub outstanding: usize,
    pub phrases: Vec<(String, u64)>,
}

impl Runner {
    pub fn new(config: BackendConfig) -> Self {
        let clock = ManualClock::new();
        let event_loop = SimulatedLoop::new(clock.clone());
        let config = SharedConfig::new(config);
        let settings = BackendSettings::from_config(&config.get());

        let mut slot = BackendSlot::new();
        slot.init(BackendManager::new(
            HistoryLibrary::new(),
            settings,
            Box::new(config.clone()),
            Box::new(event_loop.handle()),
            Box::new(clock),
        ));

        Self {
            config,
            event_loop,
            slot,
            sessions: HashMap::new(),
        }
    }

    pub fn run(&mut self, lines: &[Line]) -> Result<()> {
        for line in lines {
            tracing::debug!(line = line.number, command = ?line.command, "executing");
            self.execute(&line.command)
                .with_context(|| format!("line {}", line.number))?;
        }
        Ok(())
    }

    fn execute(&mut self, command: &Command) -> Result<()> {
        match command {
            Command::Alloc { family, name } => {
                if self.sessions.contains_key(name) {
                    bail!("instance {} is already allocated", name);
                }
                let instance = manager(&mut self.slot)?.allocate_instance(*family)?;
                self.sessions.insert(name.clone(), instance);
            }
            Command::Release { name } => {
                let instance = self
                    .sessions
                    .remove(name)
                    .ok_or_else(|| anyhow!("no instance named {}", name))?;
                manager(&mut self.slot)?.release_instance(instance);
            }
            Command::Commit { name, phrase } => {
                self.session(name)?.get().commit(phrase);
                manager(&mut self.slot)?.notify_modified();
            }
            Command::Layout { family, index } => {
                let index = *index;
                self.config.edit(|c| match family {
                    SchemeFamily::Pinyin => c.pinyin.double_pinyin_schema = index,
                    SchemeFamily::Bopomofo => c.bopomofo.keyboard_mapping = index,
                });
            }
            Command::Fuzzy { family, rule } => {
                self.config.edit(|c| match family {
                    SchemeFamily::Pinyin => c.pinyin.fuzzy.push(rule.clone()),
                    SchemeFamily::Bopomofo => c.bopomofo.fuzzy.push(rule.clone()),
                });
            }
            Command::Modify => manager(&mut self.slot)?.notify_modified(),
            Command::Advance { seconds } => {
                let backend = manager(&mut self.slot)?;
                let fired = self
                    .event_loop
                    .advance(Duration::from_secs(*seconds), |id| backend.on_timeout(id));
                tracing::debug!(seconds, fired, "time advanced");
            }
            Command::Save => manager(&mut self.slot)?.save_user_data()?,
            Command::Teardown => self.finish(),
            Command::ExpectPending(expected) => {
                let actual = manager(&mut self.slot)?.is_save_pending();
                if actual != *expected {
                    bail!("expected pending {}, found {}", expected, actual);
                }
            }
            Command::ExpectScheme { family, scheme } => {
                let actual = manager(&mut self.slot)?
                    .context(*family)
                    .and_then(|c| c.scheme())
                    .map(scheme_name);
                if actual != *scheme {
                    bail!("expected {} scheme {:?}, found {:?}", family, scheme, actual);
                }
            }
            Command::ExpectFreq {
                name,
                phrase,
                count,
            } => {
                let actual = self.session(name)?.get().frequency(phrase);
                if actual != *count {
                    bail!("expected {} to have count {}, found {}", phrase, count, actual);
                }
            }
        }
        Ok(())
    }

    fn session(&self, name: &str) -> Result<&ConverterInstance<HistorySession>> {
        self.sessions
            .get(name)
            .ok_or_else(|| anyhow!("no instance named {}", name))
    }

    pub fn summary(&self) -> Summary {
        let elapsed_secs = self.event_loop.clock().now().as_secs();
        let Some(manager) = self.slot.get() else {
            return Summary {
                finalized: true,
                save_pending: false,
                elapsed_secs,
                families: Vec::new(),
            };
        };

        let families = SchemeFamily::ALL
            .iter()
            .filter_map(|&family| {
                let context = manager.context(family)?;
                Some(FamilySummary {
                    family,
                    scheme: context.scheme(),
                    options: context.options().bits(),
                    history_file: context.history_path().map(|p| p.display().to_string()),
                    outstanding: manager.outstanding_instances(family),
                    phrases: context.history_entries(),
                })
            })
            .collect();

        Summary {
            finalized: false,
            save_pending: manager.is_save_pending(),
            elapsed_secs,
            families,
        }
    }

    /// Release held sessions and tear the backend down. Idempotent.
    pub fn finish(&mut self) {
        if let Some(manager) = self.slot.get_mut() {
            for (_, instance) in self.sessions.drain() {
                manager.release_instance(instance);
            }
        }
        self.slot.finalize();
    }
}

fn manager(slot: &mut BackendSlot<HistoryLibrary>) -> Result<&mut Manager> {
    slot.get_mut()
        .ok_or_else(|| anyhow!("backend already torn down"))
}

fn scheme_name(scheme: Scheme) -> String {
    match scheme {
        Scheme::DoublePinyin(s) => format!("{:?}", s),
        Scheme::Chewing(s) => format!("{:?}", s),
    }
}
