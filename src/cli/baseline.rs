use super::ui;
use crate::core::config::AppConfig;
use crate::core::{AggregatedHoldings, Asset, ReserveData, StrategyCatalog, aggregate_holdings};
use crate::providers;
use anyhow::{Context, Result};
use comfy_table::Cell;
use std::collections::BTreeSet;

/// Strategies to list: catalog order first, then any extra ids found in the
/// holdings.
fn strategy_ids(catalog: &StrategyCatalog, reserve: &ReserveData) -> Vec<String> {
    let mut ids: Vec<String> = catalog.strategies().iter().map(|s| s.id.clone()).collect();
    let extras: BTreeSet<&str> = reserve
        .holdings
        .strategies()
        .filter(|id| !catalog.contains(id))
        .collect();
    ids.extend(extras.into_iter().map(str::to_string));
    ids
}

pub fn display_baseline(
    catalog: &StrategyCatalog,
    reserve: &ReserveData,
    aggregated: &AggregatedHoldings,
) -> String {
    let mut table = ui::new_styled_table();
    let mut header = vec![ui::header_cell("Strategy")];
    for asset in Asset::ALL {
        header.push(ui::header_cell(asset.symbol()));
    }
    table.set_header(header);

    for id in strategy_ids(catalog, reserve) {
        let scope = catalog.get(&id).map(|s| &s.scope);
        let name = match catalog.get(&id) {
            Some(strategy) => strategy.name.clone(),
            None => ui::style_text(&format!("{id} (not in catalog)"), ui::StyleType::Warning),
        };
        let mut row = vec![Cell::new(name)];
        for asset in Asset::ALL {
            let amount = reserve.holdings.amount(&id, asset);
            let eligible = scope.is_none_or(|s| s.contains(asset));
            if !eligible && amount == 0.0 {
                row.push(Cell::new(""));
                continue;
            }
            row.push(ui::number_cell(format!(
                "{} ({})",
                ui::format_amount(amount),
                ui::format_percent(aggregated.baseline.get(asset, &id))
            )));
        }
        table.add_row(row);
    }

    let mut totals = vec![Cell::new(ui::style_text("Total", ui::StyleType::TotalLabel))];
    for asset in Asset::ALL {
        totals.push(ui::number_cell(ui::format_amount(aggregated.asset_total(asset))));
    }
    table.add_row(totals);

    let mut output = format!(
        "{}\n\n",
        ui::style_text("Baseline allocation", ui::StyleType::Title)
    );
    output.push_str(&table.to_string());
    output.push_str(&format!(
        "\n\n{} {}",
        ui::style_text("Total reserve value:", ui::StyleType::TotalLabel),
        ui::style_text(&ui::format_amount(aggregated.grand_total), ui::StyleType::TotalValue)
    ));
    if let Some(ratio) = reserve.backing_ratio(aggregated.grand_total) {
        output.push_str(&format!(
            "\n{} {}",
            ui::style_text("Backing ratio:", ui::StyleType::TotalLabel),
            ui::format_percent(ratio)
        ));
    }
    output
}

pub async fn run(config: &AppConfig) -> Result<()> {
    let catalog = config.catalog()?;
    let holdings = providers::holdings_provider(&config.holdings)?;
    let reserve = holdings
        .fetch_reserve()
        .await
        .context("Failed to fetch reserve holdings")?;
    let aggregated = aggregate_holdings(&reserve.holdings);
    println!("{}", display_baseline(&catalog, &reserve, &aggregated));
    Ok(())
}
