//! CLI frontend for the Skirmish action engine.

mod chat;
mod commands;

use std::path::PathBuf;
use std::process;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "skirmish",
    about = "Skirmish: resolve tactical combat actions against an encounter",
    version,
    propagate_version = true
)]
struct Cli {
    /// Encounter file to act on
    #[arg(short, long, global = true, default_value = "encounter.json")]
    encounter: PathBuf,

    /// Automation config file (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// RNG seed for the dice
    #[arg(short, long, global = true)]
    seed: Option<u64>,

    /// Write changed combatants back to the encounter file
    #[arg(long, global = true)]
    save: bool,

    /// More log output (-v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Roll modifiers shared by the attack commands.
#[derive(Args)]
struct Modifiers {
    /// Extra accuracy
    #[arg(short, long, default_value = "0")]
    accuracy: i32,

    /// Extra difficulty
    #[arg(short, long, default_value = "0")]
    difficulty: i32,

    /// Target by name (repeatable); defaults to the encounter's targets
    #[arg(short, long = "target")]
    targets: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a sample encounter file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Show combatants and their tracks
    Show,

    /// List the registered roll plugins
    Plugins,

    /// Attack with a weapon
    Attack {
        /// Attacking combatant
        actor: String,

        /// Weapon name
        weapon: String,

        #[command(flatten)]
        modifiers: Modifiers,

        /// Roll damage for any hits
        #[arg(long)]
        damage: bool,
    },

    /// Make an improvised attack
    Basic {
        /// Attacking combatant
        actor: String,

        #[command(flatten)]
        modifiers: Modifiers,
    },

    /// Make a tech attack
    Tech {
        /// Attacking combatant
        actor: String,

        #[command(flatten)]
        modifiers: Modifiers,
    },

    /// Roll weapon damage without an attack
    Damage {
        /// Acting combatant
        actor: String,

        /// Weapon name
        weapon: String,

        /// Halve the result
        #[arg(long)]
        half: bool,
    },

    /// Roll a stat check
    Stat {
        /// Acting combatant
        actor: String,

        /// hull, agility, systems, engineering, or grit
        stat: String,
    },

    /// Take structure damage
    Structure {
        /// Damaged combatant
        actor: String,
    },

    /// Overheat
    Overheat {
        /// Overheating combatant
        actor: String,
    },

    /// Activate a system
    Activate {
        /// Acting combatant
        actor: String,

        /// System name
        system: String,
    },
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let options = commands::Options {
        encounter: cli.encounter,
        config: cli.config,
        seed: cli.seed,
        save: cli.save,
    };

    let result = match cli.command {
        Commands::Init { force } => commands::init::run(&options.encounter, force),
        Commands::Show => commands::show::run(&options),
        Commands::Plugins => commands::plugins::run(),
        Commands::Attack {
            actor,
            weapon,
            modifiers,
            damage,
        } => commands::act::attack(&options, &actor, &weapon, &modifiers.into(), damage),
        Commands::Basic { actor, modifiers } => {
            commands::act::basic(&options, &actor, &modifiers.into())
        }
        Commands::Tech { actor, modifiers } => {
            commands::act::tech(&options, &actor, &modifiers.into())
        }
        Commands::Damage {
            actor,
            weapon,
            half,
        } => commands::act::damage(&options, &actor, &weapon, half),
        Commands::Stat { actor, stat } => commands::act::stat(&options, &actor, &stat),
        Commands::Structure { actor } => commands::act::structure(&options, &actor),
        Commands::Overheat { actor } => commands::act::overheat(&options, &actor),
        Commands::Activate { actor, system } => commands::act::activate(&options, &actor, &system),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        process::exit(1);
    }
}

impl From<Modifiers> for commands::act::Modifiers {
    fn from(m: Modifiers) -> Self {
        Self {
            accuracy: m.accuracy,
            difficulty: m.difficulty,
            targets: m.targets,
        }
    }
}
