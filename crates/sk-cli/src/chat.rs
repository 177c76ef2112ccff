//! Renders chat cards to the terminal.

use std::sync::{Arc, Mutex, PoisonError};

use colored::{ColoredString, Colorize};
use comfy_table::{ContentArrangement, Table};
use serde_json::Value;
use sk_core::{Encounter, Entity, TargetProvider, TokenId};
use sk_flow::flows::{
    ActivationPayload, AttackPayload, DamagePayload, OverheatPayload, StatPayload,
    StructurePayload, TraumaPayload,
};
use sk_flow::{ChatMessage, ChatSink, SerializedFlow, Template};

/// Prints each message as it arrives and remembers the latest follow-up.
pub struct TerminalChat {
    encounter: Arc<Encounter>,
    follow_up: Mutex<Option<SerializedFlow>>,
}

impl TerminalChat {
    pub fn new(encounter: Arc<Encounter>) -> Self {
        Self {
            encounter,
            follow_up: Mutex::new(None),
        }
    }

    /// The follow-up offered by the last message that had one.
    pub fn take_follow_up(&self) -> Option<SerializedFlow> {
        self.follow_up
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    fn target_name(&self, token: Option<TokenId>) -> String {
        token
            .and_then(|t| self.encounter.target(t))
            .map_or_else(|| "-".to_string(), |h| h.name().to_string())
    }

    fn card(&self, message: &ChatMessage) -> Result<String, serde_json::Error> {
        let data = message.data.clone();
        let body = match message.template {
            Template::Attack | Template::TechAttack => attack_card(data)?,
            Template::Damage => self.damage_card(data)?,
            Template::Stat => stat_card(data)?,
            Template::Structure => structure_card(data)?,
            Template::Overheat => overheat_card(data)?,
            Template::SystemTrauma => trauma_card(data)?,
            Template::Activation => activation_card(data)?,
        };
        Ok(format!(
            "  {} {}\n{body}",
            message.speaker.bold(),
            format!("[{}]", message.template).dimmed()
        ))
    }

    fn damage_card(&self, data: Value) -> Result<String, serde_json::Error> {
        let payload: DamagePayload = serde_json::from_value(data)?;
        let mut table = new_table(vec!["Target", "Damage", "Total"]);
        for result in &payload.results {
            let parts: Vec<String> = result
                .parts
                .iter()
                .map(|p| format!("{} {}", p.roll.tooltip(), p.kind))
                .collect();
            let total = if result.crit {
                format!("{} (crit)", result.total)
            } else {
                result.total.to_string()
            };
            table.add_row(vec![
                self.target_name(result.token),
                parts.join(" + "),
                total,
            ]);
        }
        let mut out = format!("  {}\n{table}", payload.title);
        if payload.overkill_heat > 0 {
            out.push_str(&format!(
                "\n  {} heat from overkill",
                payload.overkill_heat.to_string().red()
            ));
        }
        Ok(out)
    }
}

fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(header);
    table
}

fn verdict(hit: bool, crit: bool) -> ColoredString {
    match (hit, crit) {
        (true, true) => "CRIT".red().bold(),
        (true, false) => "HIT".green().bold(),
        (false, _) => "MISS".dimmed(),
    }
}

fn attack_card(data: Value) -> Result<String, serde_json::Error> {
    let payload: AttackPayload = serde_json::from_value(data)?;
    let mut table = new_table(vec!["Target", "Roll", "Total", "Defense", "Result"]);
    for result in &payload.results {
        table.add_row(vec![
            result.target.clone().unwrap_or_else(|| "-".to_string()),
            result.roll.tooltip(),
            result.roll.total.to_string(),
            result
                .defense
                .map_or_else(|| "-".to_string(), |d| d.to_string()),
            verdict(result.hit, result.crit).to_string(),
        ]);
    }
    Ok(format!("  {}\n{table}", payload.title))
}

fn stat_card(data: Value) -> Result<String, serde_json::Error> {
    let payload: StatPayload = serde_json::from_value(data)?;
    let roll = payload
        .roll
        .as_ref()
        .map_or_else(String::new, |r| format!("{} = {}", r.tooltip(), r.total));
    let outcome = if payload.success {
        "SUCCESS".green().bold()
    } else {
        "FAILURE".red().bold()
    };
    Ok(format!("  {}: {roll} {outcome}", payload.title))
}

fn roll_line(roll: Option<&sk_mechanics::Roll>) -> String {
    roll.map_or_else(|| "no roll".to_string(), |r| format!("{} = {}", r.tooltip(), r.total))
}

fn conditions_line(conditions: &[sk_core::Condition]) -> String {
    if conditions.is_empty() {
        return String::new();
    }
    let names: Vec<String> = conditions.iter().map(ToString::to_string).collect();
    format!("\n  now {}", names.join(", ").yellow())
}

fn structure_card(data: Value) -> Result<String, serde_json::Error> {
    let payload: StructurePayload = serde_json::from_value(data)?;
    let outcome = payload
        .outcome
        .map_or_else(String::new, |o| o.to_string());
    Ok(format!(
        "  Structure damage: {} ({}, {} structure left){}",
        outcome.red().bold(),
        roll_line(payload.roll.as_ref()),
        payload.remaining,
        conditions_line(&payload.conditions)
    ))
}

fn overheat_card(data: Value) -> Result<String, serde_json::Error> {
    let payload: OverheatPayload = serde_json::from_value(data)?;
    let outcome = payload
        .outcome
        .map_or_else(String::new, |o| o.to_string());
    Ok(format!(
        "  Overheat: {} ({}, {} stress left){}",
        outcome.red().bold(),
        roll_line(payload.roll.as_ref()),
        payload.remaining,
        conditions_line(&payload.conditions)
    ))
}

fn trauma_card(data: Value) -> Result<String, serde_json::Error> {
    let payload: TraumaPayload = serde_json::from_value(data)?;
    let loss = match &payload.destroyed {
        Some(name) => format!("{} destroyed", name.red().bold()),
        None => "nothing left to destroy".to_string(),
    };
    Ok(format!(
        "  System trauma: {loss} ({})",
        roll_line(payload.roll.as_ref())
    ))
}

fn activation_card(data: Value) -> Result<String, serde_json::Error> {
    let payload: ActivationPayload = serde_json::from_value(data)?;
    Ok(format!("  {}: {}", payload.title.bold(), payload.effect))
}

impl ChatSink for TerminalChat {
    fn render(&self, message: ChatMessage) {
        if let Some(follow_up) = &message.flags.follow_up {
            *self
                .follow_up
                .lock()
                .unwrap_or_else(PoisonError::into_inner) = Some(follow_up.clone());
        }
        match self.card(&message) {
            Ok(card) => println!("{card}\n"),
            Err(e) => tracing::warn!(template = %message.template, error = %e, "cannot render message"),
        }
    }

    fn warn(&self, actor: &Entity, text: &str) {
        eprintln!("{} {}: {text}", "warning:".yellow().bold(), actor.name);
    }
}
