use comfy_table::{ContentArrangement, Table};
use sk_core::Track;

use super::Options;

fn track(t: Track) -> String {
    format!("{}/{}", t.value, t.max)
}

pub fn run(options: &Options) -> Result<(), String> {
    let encounter = super::load_encounter(&options.encounter)?;
    let entities = encounter.entities();
    if entities.is_empty() {
        println!("  No combatants.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        "Name",
        "Kind",
        "HP",
        "Structure",
        "Stress",
        "Heat",
        "Conditions",
        "Items",
    ]);

    for entity in &entities {
        let conditions: Vec<String> = entity.conditions.iter().map(ToString::to_string).collect();
        let items: Vec<String> = entity
            .items
            .iter()
            .map(|i| {
                if i.destroyed {
                    format!("{} (destroyed)", i.name)
                } else if i.is_unloaded() {
                    format!("{} (unloaded)", i.name)
                } else {
                    i.name.clone()
                }
            })
            .collect();
        table.add_row(vec![
            entity.name.clone(),
            entity.kind.to_string(),
            track(entity.hp),
            track(entity.structure),
            track(entity.stress),
            track(entity.heat),
            conditions.join(", "),
            items.join(", "),
        ]);
    }

    println!("{table}");
    println!();
    println!("  {} combatants", entities.len());
    Ok(())
}
