//! `apipull list` - show vendors and their endpoint catalogs.

use apipull_core::model::EndpointEntry;

use crate::Vendor;

pub fn run(vendor: Option<Vendor>, verbose: bool) -> anyhow::Result<()> {
    let vendors: Vec<Vendor> = match vendor {
        Some(v) => vec![v],
        None => Vendor::all().to_vec(),
    };

    for vendor in vendors {
        let catalog = vendor.catalog();
        println!("{} ({} endpoints)", vendor.display_name(), catalog.len());
        for entry in &catalog {
            print_entry(entry, verbose);
        }
        println!();
    }
    Ok(())
}

fn print_entry(entry: &EndpointEntry, verbose: bool) {
    let def = &entry.definition;
    println!("  {} (v{})", entry.name, def.resource_version);
    if !verbose {
        return;
    }
    if let Some(description) = &def.description {
        println!("      {description}");
    }
    let page_size = def
        .default_page_size
        .map(|s| s.to_string())
        .unwrap_or_else(|| "(none)".to_string());
    println!(
        "      resource: {} | {} | page size: {}",
        def.resource_name, def.method, page_size
    );
    if let Some(depends_on) = &def.depends_on {
        println!("      depends on: {depends_on} (auto-fetched)");
    }
    if def.supports_watermark {
        let mut line = "      watermark: supported".to_string();
        if let Some(min) = def.min_time_span {
            line.push_str(&format!(" | min window: {min}"));
        }
        if let Some(max) = def.max_time_span {
            line.push_str(&format!(" | max window: {max}"));
        }
        println!("{line}");
    }
}
