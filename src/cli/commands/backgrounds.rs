use anyhow::Result;
use clap::Args;
use colored::Colorize;
use serde_json::json;

use crate::core::background::{self, BackgroundCategory, BackgroundDescriptor};

#[derive(Args)]
pub struct BackgroundsArgs {
    /// Output format (text, json)
    #[arg(short, long, default_value = "text")]
    pub format: String,
}

pub fn run(args: BackgroundsArgs, default_id: &str) -> Result<()> {
    if args.format == "json" {
        let groups = json!({
            "standard": background::by_category(BackgroundCategory::Standard).collect::<Vec<_>>(),
            "creative": background::by_category(BackgroundCategory::Creative).collect::<Vec<_>>(),
            "custom": BackgroundDescriptor::custom_upload(),
            "default": default_id,
        });
        println!("{}", serde_json::to_string_pretty(&groups)?);
        return Ok(());
    }

    for category in [BackgroundCategory::Standard, BackgroundCategory::Creative] {
        println!("{}", category.label().cyan().bold());
        for bg in background::by_category(category) {
            print_row(bg, bg.id == default_id);
        }
        println!();
    }

    println!("{}", "Custom".cyan().bold());
    print_row(&BackgroundDescriptor::custom_upload(), false);
    println!();
    println!(
        "{}",
        "Use --custom <image> with `idphoto process` to upload your own background.".dimmed()
    );

    Ok(())
}

fn print_row(bg: &BackgroundDescriptor, is_default: bool) {
    let marker = if is_default { "*".green().to_string() } else { " ".to_string() };
    println!(
        "  {} {:<14} {:<12} {:<24} {}",
        marker,
        bg.id,
        bg.kind.to_string(),
        bg.display_name,
        bg.value.dimmed()
    );
}
