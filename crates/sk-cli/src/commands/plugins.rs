use comfy_table::{ContentArrangement, Table};
use sk_mechanics::plugins::default_registry;
use sk_mechanics::{Activation, Scope};

pub fn run() -> Result<(), String> {
    let registry = default_registry();

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Slug", "Name", "Family", "Scopes", "Activation", "Effect"]);

    for def in registry.plugins() {
        let scopes: Vec<String> = def.scopes.iter().map(Scope::to_string).collect();
        let activation = match &def.activation {
            Activation::Talent { talent, rank, .. } => format!("talent {talent} rank {rank}"),
            Activation::Reminder { .. } => "reminder".to_string(),
            Activation::AlwaysOn { .. } => "always on".to_string(),
        };
        let mut effect = Vec::new();
        if def.effect.accuracy != 0 {
            effect.push(format!("{:+} accuracy", def.effect.accuracy));
        }
        if def.effect.rewrite.is_some() {
            effect.push("rewrites formula".to_string());
        }
        table.add_row(vec![
            def.slug.clone(),
            def.name.clone(),
            def.family.to_string(),
            scopes.join(", "),
            activation,
            effect.join(", "),
        ]);
    }

    println!("{table}");
    println!();
    println!("  {} plugins", registry.len());
    for slug in registry.multi_scoped() {
        println!("  warning: {slug} attaches at more than one level");
    }
    Ok(())
}
