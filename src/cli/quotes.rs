use super::fetch::fetch_quotes;
use super::ui;
use crate::core::config::AppConfig;
use crate::core::{QuoteSet, StrategyCatalog, Venue, VenueQuoteKey};
use crate::providers;
use anyhow::Result;
use comfy_table::Cell;

/// Every quote key the catalog uses, with the strategies that use it.
fn referenced_keys(catalog: &StrategyCatalog) -> Vec<(VenueQuoteKey, Vec<String>)> {
    let mut keys: Vec<(VenueQuoteKey, Vec<String>)> = Vec::new();
    for strategy in catalog.strategies() {
        for (key, _) in strategy.quote_groups() {
            match keys.iter_mut().find(|(k, _)| *k == key) {
                Some((_, users)) => users.push(strategy.id.clone()),
                None => keys.push((key, vec![strategy.id.clone()])),
            }
        }
    }
    keys
}

pub fn display_quotes(
    catalog: &StrategyCatalog,
    quotes: &QuoteSet,
    failed: &[(Venue, String)],
) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Quote"),
        ui::header_cell("Used by"),
        ui::header_cell("Base"),
        ui::header_cell("Reward"),
        ui::header_cell("Combined"),
    ]);

    for (key, users) in referenced_keys(catalog) {
        let quote = quotes.get(&key);
        let venue_failed = failed.iter().any(|(venue, _)| *venue == key.venue);
        let rate_cell = |rate: Option<f64>| match rate {
            Some(r) => ui::number_cell(ui::format_percent(r)),
            None => ui::na_cell(venue_failed),
        };
        table.add_row(vec![
            Cell::new(key.to_string()),
            Cell::new(users.join(", ")),
            rate_cell(quote.map(|q| q.base)),
            rate_cell(quote.map(|q| q.reward)),
            match quote {
                Some(q) => ui::format_percentage_cell(q.combined()),
                None => ui::na_cell(venue_failed),
            },
        ]);
    }

    let mut output = format!("{}\n\n", ui::style_text("Venue quotes", ui::StyleType::Title));
    output.push_str(&table.to_string());
    for (venue, error) in failed {
        output.push_str(&format!(
            "\n{}",
            ui::style_text(&format!("Venue {venue} failed: {error}"), ui::StyleType::Error)
        ));
    }
    output
}

pub async fn run(config: &AppConfig) -> Result<()> {
    let catalog = config.catalog()?;
    let quote_providers = providers::quote_providers(config);
    let (quotes, failed) = fetch_quotes(&quote_providers, &catalog).await;
    println!("{}", display_quotes(&catalog, &quotes, &failed));
    Ok(())
}
