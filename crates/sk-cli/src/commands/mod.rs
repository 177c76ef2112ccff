pub mod act;
pub mod init;
pub mod plugins;
pub mod show;

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError};

use sk_core::{AutomationConfig, Encounter, Entity, EntityId, TargetProvider, TokenId};
use sk_flow::FlowServices;

use crate::chat::TerminalChat;

/// Options shared by every command.
pub struct Options {
    pub encounter: PathBuf,
    pub config: Option<PathBuf>,
    pub seed: Option<u64>,
    pub save: bool,
}

/// A loaded encounter with services wired to the terminal.
pub struct Session {
    pub encounter: Arc<Encounter>,
    pub services: Arc<FlowServices>,
    pub chat: Arc<TerminalChat>,
}

fn load_encounter(path: &Path) -> Result<Encounter, String> {
    Encounter::load(path).map_err(|e| format!("cannot load encounter {}: {e}", path.display()))
}

fn load_config(options: &Options) -> Result<AutomationConfig, String> {
    let config = match &options.config {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .map_err(|e| format!("cannot read config {}: {e}", path.display()))?;
            serde_json::from_str(&json)
                .map_err(|e| format!("invalid config {}: {e}", path.display()))?
        }
        None => AutomationConfig::default(),
    };
    // There is no interactive HUD on the command line.
    let config = config.with_prompt(false);
    Ok(match options.seed {
        Some(seed) => config.with_seed(seed),
        None => config,
    })
}

impl Session {
    pub fn open(options: &Options) -> Result<Self, String> {
        let encounter = Arc::new(load_encounter(&options.encounter)?);
        let config = load_config(options)?;
        let chat = Arc::new(TerminalChat::new(Arc::clone(&encounter)));
        let services = FlowServices::for_encounter(Arc::clone(&encounter))
            .with_config(config)
            .with_chat(chat.clone())
            .build();
        Ok(Self {
            encounter,
            services,
            chat,
        })
    }

    /// Find a combatant and open a fresh turn for it.
    pub fn actor(&self, key: &str) -> Result<Entity, String> {
        let actor = self
            .encounter
            .find(key)
            .ok_or_else(|| format!("unknown combatant '{key}'"))?;
        self.start_turn(actor.id)?;
        Ok(actor)
    }

    fn start_turn(&self, actor: EntityId) -> Result<(), String> {
        let mut history = self
            .services
            .history
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        history.start_round();
        history.start_turn(actor).map_err(|e| e.to_string())
    }

    /// Resolve target names to their tokens on the active scene.
    pub fn targets(&self, names: &[String]) -> Result<Vec<TokenId>, String> {
        names
            .iter()
            .map(|name| {
                let entity = self
                    .encounter
                    .find(name)
                    .ok_or_else(|| format!("unknown target '{name}'"))?;
                self.encounter
                    .token_for(entity.id)
                    .ok_or_else(|| format!("{} has no token on the scene", entity.name))
            })
            .collect()
    }

    /// Save the encounter if requested.
    pub fn finish(&self, options: &Options) -> Result<(), String> {
        if !options.save {
            return Ok(());
        }
        self.encounter
            .save(&options.encounter)
            .map_err(|e| format!("cannot save encounter: {e}"))
    }
}

/// Run an async command to completion on a single-threaded runtime.
pub fn block_on<F: Future>(future: F) -> Result<F::Output, String> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("cannot start runtime: {e}"))?;
    Ok(runtime.block_on(future))
}
