//! Historical listings: events, insights and news.

use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, ContentArrangement, Table};

use hw_core::config::ConfigHandle;
use hw_core::error::HwResult;
use hw_models::{BackendEvent, NewsArticle};

use crate::OutputFormat;

pub async fn events(config: ConfigHandle, limit: usize, format: OutputFormat) -> HwResult<()> {
    let api = super::create_api_client(&config).await?;
    let events = api.events().await?;
    print_events(&events, limit, "events", format);
    Ok(())
}

pub async fn insights(config: ConfigHandle, limit: usize, format: OutputFormat) -> HwResult<()> {
    let api = super::create_api_client(&config).await?;
    let insights = api.insights().await?;
    print_events(&insights, limit, "insights", format);
    Ok(())
}

pub async fn news(config: ConfigHandle, limit: usize, format: OutputFormat) -> HwResult<()> {
    let api = super::create_api_client(&config).await?;
    let articles = api.news().await?;
    let shown: Vec<&NewsArticle> = articles.iter().take(limit).collect();

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&shown).unwrap_or_default());
        }
        OutputFormat::Text => {
            if shown.is_empty() {
                println!("No news found.");
                return Ok(());
            }
            let mut table = new_table();
            table.set_header(vec!["Date", "Title", "Author", "Summary"]);
            for article in &shown {
                let date = article.date.get(..10).unwrap_or(&article.date);
                table.add_row(vec![
                    date.to_string(),
                    super::truncate(&article.title, 40),
                    article.author.clone(),
                    super::truncate(&article.summary, 50),
                ]);
            }
            println!("{table}");
            println!("\n{} of {} articles", shown.len(), articles.len());
        }
    }
    Ok(())
}

fn print_events(events: &[BackendEvent], limit: usize, noun: &str, format: OutputFormat) {
    let shown = &events[..limit.min(events.len())];

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(shown).unwrap_or_default());
        }
        OutputFormat::Text => {
            if shown.is_empty() {
                println!("No {noun} found.");
                return;
            }
            let mut table = new_table();
            table.set_header(vec!["Time", "Type", "Severity", "Message"]);
            for event in shown {
                table.add_row(vec![
                    super::format_timestamp(event),
                    event.event_type.to_string(),
                    super::styled_severity(event.effective_severity()).to_string(),
                    super::truncate(&event.message, 60),
                ]);
            }
            println!("{table}");
            println!("\n{} of {} {noun}", shown.len(), events.len());
        }
    }
}

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}
