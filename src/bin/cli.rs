#![cfg(not(tarpaulin_include))]

use featherpack::aggregate::{category_breakdown, category_views, summarize};
use featherpack::config::Config;
use featherpack::export::{archive_file_name, export_to_file};
use featherpack::notes::read_notes;
use featherpack::store::GearStore;
use std::env;

fn usage() {
    eprintln!("Usage: featherpack-cli [--dir <path>] <command>");
    eprintln!("Commands:");
    eprintln!("  list                 List available gear lists");
    eprintln!("  create <name>        Create an empty gear list");
    eprintln!("  show <name>          Print every category table");
    eprintln!("  summary <name>       Print weight totals and category shares");
    eprintln!("  json <name>          Print categories and totals as JSON");
    eprintln!("  export <name> [out]  Bundle the list and its notes as .tar.gz");
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (config, args) = Config::from_args(env::args().skip(1))?;
    let store = GearStore::new(&config.dir);

    let command = args.first().map(String::as_str);
    let name = args.get(1).map(String::as_str);

    match (command, name) {
        (Some("list"), _) => {
            for list in store.list_available()? {
                println!("{}", list);
            }
        }
        (Some("create"), Some(name)) => {
            let file_name = store.create(name)?;
            println!("Created {}", file_name);
        }
        (Some("show"), Some(name)) => {
            let list = store.load(name)?;
            for view in category_views(&list) {
                println!("\n{} ({:.0})", view.label, view.total);
                for (row, total) in view.rows.iter().zip(&view.row_totals) {
                    println!(
                        "  {:<24} {:<28} {:>4} x {:>8.1} = {:>9.1} {}{}{}",
                        row.name,
                        row.desc,
                        row.quantity,
                        row.weight,
                        total,
                        if row.wearable { "👕" } else { "" },
                        if row.consumable { "🍞" } else { "" },
                        if row.luxury { "📸" } else { "" },
                    );
                }
            }

            let notes = read_notes(&store, name)?;
            if !notes.is_empty() {
                println!("\nNotes:\n{}", notes);
            }
        }
        (Some("summary"), Some(name)) => {
            let list = store.load(name)?;
            let summary = summarize(&list);
            println!("Total:      {:>10.1}", summary.total);
            println!("Base:       {:>10.1}", summary.base_total);
            println!("Wearable:   {:>10.1}", summary.wearable_total);
            println!("Consumable: {:>10.1}", summary.consumable_total);
            println!("Luxury:     {:>10.1}", summary.luxury_total);
            println!();
            for share in category_breakdown(&list) {
                println!(
                    "{:<20} {:>10.1} {:>5.1}%",
                    share.category,
                    share.total,
                    share.share * 100.0
                );
            }
        }
        (Some("json"), Some(name)) => {
            let list = store.load(name)?;
            let report = serde_json::json!({
                "summary": summarize(&list),
                "breakdown": category_breakdown(&list),
                "categories": category_views(&list),
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        (Some("export"), Some(name)) => {
            let out = match args.get(2) {
                Some(out) => out.clone(),
                None => archive_file_name(name)?,
            };
            let bytes = export_to_file(&store, name, &out)?;
            println!("Wrote {} ({} bytes)", out, bytes);
        }
        _ => usage(),
    }

    Ok(())
}
