use super::fetch::{MarketData, fetch_market_data};
use super::ui;
use crate::core::config::AppConfig;
use crate::core::{Asset, ProjectionResult, StrategyCatalog, YieldSimulator};
use crate::providers;
use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use comfy_table::Cell;
use serde::Serialize;
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Allowed distance from 1.0 before an asset's allocations are flagged.
const SUM_TOLERANCE: f64 = 1e-9;

/// A manual allocation edit, written `ASSET:STRATEGY=FRACTION`.
#[derive(Debug, Clone, PartialEq)]
pub struct AllocationOverride {
    pub asset: String,
    pub strategy: String,
    pub fraction: f64,
}

impl FromStr for AllocationOverride {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || anyhow!("Invalid allocation '{s}', expected ASSET:STRATEGY=FRACTION");
        let (cell, fraction) = s.split_once('=').ok_or_else(malformed)?;
        let (asset, strategy) = cell.split_once(':').ok_or_else(malformed)?;
        let fraction = fraction
            .trim()
            .parse::<f64>()
            .with_context(|| format!("Invalid fraction in allocation '{s}'"))?;
        Ok(Self {
            asset: asset.trim().to_string(),
            strategy: strategy.trim().to_string(),
            fraction,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProjectOptions {
    /// Replaces the configured boost multiplier.
    pub boost: Option<f64>,
    /// Applied after the config file's allocation overrides.
    pub overrides: Vec<AllocationOverride>,
    pub json: bool,
}

/// Everything the `project` command reports.
#[derive(Debug, Serialize)]
pub struct ProjectionReport {
    pub captured_at: DateTime<Utc>,
    pub boost: f64,
    pub backing_ratio: Option<f64>,
    /// Allocation sum per asset the reserve actually holds.
    pub allocation_sums: BTreeMap<Asset, f64>,
    pub failed_venues: Vec<String>,
    #[serde(flatten)]
    pub result: ProjectionResult,
}

impl ProjectionReport {
    /// Assets whose allocation fractions do not add up to one.
    pub fn unbalanced_assets(&self) -> Vec<(Asset, f64)> {
        self.allocation_sums
            .iter()
            .filter(|(_, sum)| (*sum - 1.0).abs() > SUM_TOLERANCE)
            .map(|(asset, sum)| (*asset, *sum))
            .collect()
    }

    pub fn display_as_table(&self) -> String {
        let mut table = ui::new_styled_table();
        table.set_header(vec![
            ui::header_cell("Strategy"),
            ui::header_cell("Assets"),
            ui::header_cell("Quote"),
            ui::header_cell("Allocation"),
            ui::header_cell("Amount"),
            ui::header_cell("Base"),
            ui::header_cell("Reward"),
            ui::header_cell("Boosted"),
            ui::header_cell("Contribution"),
        ]);

        for row in &self.result.rows {
            let assets = row
                .assets
                .iter()
                .map(|a| a.symbol())
                .collect::<Vec<_>>()
                .join(", ");
            table.add_row(vec![
                Cell::new(&row.strategy_name),
                Cell::new(assets),
                Cell::new(ui::style_text(&row.quote_key.to_string(), ui::StyleType::Subtle)),
                ui::number_cell(ui::format_percent(row.allocation)),
                ui::number_cell(ui::format_amount(row.allocation_amount)),
                ui::number_cell(ui::format_percent(row.base_rate)),
                ui::number_cell(ui::format_percent(row.reward_rate)),
                ui::number_cell(ui::format_percent(row.boosted_rate)),
                ui::format_percentage_cell(row.weighted),
            ]);
        }

        for entry in &self.result.unquoted {
            let assets = entry
                .assets
                .iter()
                .map(|a| a.symbol())
                .collect::<Vec<_>>()
                .join(", ");
            table.add_row(vec![
                Cell::new(ui::style_text(&entry.strategy_id, ui::StyleType::Subtle)),
                Cell::new(assets),
                Cell::new(ui::style_text(&entry.quote_key.to_string(), ui::StyleType::Error)),
                ui::na_cell(true),
                ui::na_cell(true),
                ui::na_cell(true),
                ui::na_cell(true),
                ui::na_cell(true),
                ui::na_cell(true),
            ]);
        }

        let mut output = format!(
            "{} {}\n\n",
            ui::style_text("Reserve yield projection", ui::StyleType::Title),
            ui::style_text(
                &format!("(as of {})", self.captured_at.format("%Y-%m-%d %H:%M UTC")),
                ui::StyleType::Subtle
            )
        );
        output.push_str(&table.to_string());

        let apy_style = if self.result.is_complete() {
            ui::StyleType::TotalValue
        } else {
            ui::StyleType::Warning
        };
        output.push_str(&format!(
            "\n\n{} {}",
            ui::style_text("Blended APY:", ui::StyleType::TotalLabel),
            ui::style_text(&ui::format_percent(self.result.blended_apy), apy_style)
        ));
        output.push_str(&format!(
            "\n{} {}",
            ui::style_text("Boost multiplier:", ui::StyleType::TotalLabel),
            self.boost
        ));
        output.push_str(&format!(
            "\n{} {}",
            ui::style_text("Total reserve value:", ui::StyleType::TotalLabel),
            ui::format_amount(self.result.total_value)
        ));
        if let Some(ratio) = self.backing_ratio {
            output.push_str(&format!(
                "\n{} {}",
                ui::style_text("Backing ratio:", ui::StyleType::TotalLabel),
                ui::format_percent(ratio)
            ));
        }

        if !self.result.is_complete() {
            output.push_str(&format!(
                "\n\n{}",
                ui::style_text(
                    &format!(
                        "Quote data unavailable for {} row(s); they are excluded from the blended APY.",
                        self.result.unquoted.len()
                    ),
                    ui::StyleType::Error
                )
            ));
        }
        for venue in &self.failed_venues {
            output.push_str(&format!(
                "\n{}",
                ui::style_text(&format!("Venue failed: {venue}"), ui::StyleType::Error)
            ));
        }
        for (asset, sum) in self.unbalanced_assets() {
            output.push_str(&format!(
                "\n{}",
                ui::style_text(
                    &format!("{asset} allocations sum to {}, not 100%", ui::format_percent(sum)),
                    ui::StyleType::Warning
                )
            ));
        }

        output
    }
}

/// Seeds a simulator from the fetched data and applies config and command
/// line edits, in that order.
pub fn build_report(
    config: &AppConfig,
    catalog: Arc<StrategyCatalog>,
    options: &ProjectOptions,
    data: MarketData,
) -> Result<ProjectionReport> {
    let mut simulator = YieldSimulator::new(catalog, &data.reserve.holdings, data.quotes);

    simulator.set_boost_multiplier(options.boost.unwrap_or(config.boost));

    for (asset, cells) in &config.allocations {
        for (strategy, fraction) in cells {
            simulator
                .set_allocation(*asset, strategy, *fraction)
                .with_context(|| format!("Invalid allocation in config for {asset}/{strategy}"))?;
        }
    }
    for edit in &options.overrides {
        debug!("Applying override {edit:?}");
        simulator
            .set_allocation_str(&edit.asset, &edit.strategy, edit.fraction)
            .with_context(|| {
                format!("Invalid allocation override {}:{}", edit.asset, edit.strategy)
            })?;
    }

    let backing_ratio = data
        .reserve
        .backing_ratio(simulator.holdings().grand_total);
    // Nothing to allocate for an asset with a zero total.
    let allocation_sums = simulator
        .model()
        .matrix()
        .asset_sums()
        .into_iter()
        .filter(|(asset, _)| simulator.holdings().asset_total(*asset) > 0.0)
        .collect();
    let boost = simulator.model().boost();
    let result = simulator.result().clone();

    Ok(ProjectionReport {
        captured_at: data.captured_at,
        boost,
        backing_ratio,
        allocation_sums,
        failed_venues: data
            .failed_venues
            .iter()
            .map(|(venue, e)| format!("{venue}: {e}"))
            .collect(),
        result,
    })
}

pub async fn run(config: &AppConfig, options: &ProjectOptions) -> Result<()> {
    let catalog = Arc::new(config.catalog()?);
    let holdings = providers::holdings_provider(&config.holdings)?;
    let quote_providers = providers::quote_providers(config);

    let data = fetch_market_data(holdings.as_ref(), &quote_providers, &catalog).await?;
    let report = build_report(config, catalog, options, data)?;
    info!(
        blended_apy = report.result.blended_apy,
        rows = report.result.rows.len(),
        "Projection complete"
    );
    for (asset, sum) in report.unbalanced_assets() {
        warn!("{asset} allocations sum to {sum}");
    }

    if options.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialize projection")?
        );
    } else {
        println!("{}", report.display_as_table());
    }
    Ok(())
}
