use std::path::PathBuf;

use tracing::warn;

use fieldlens_core::config::FieldLensConfig;
use fieldlens_core::dates::DateMatcher;
use fieldlens_core::rules::loader::RuleLoader;
use fieldlens_core::FnRegistry;

use crate::args::RulesArgs;

/// Load the rule set and print its statistics.
pub fn run(args: &RulesArgs, config: &FieldLensConfig) -> anyhow::Result<()> {
    let mut loader = RuleLoader::new(FnRegistry::with_builtins())
        .with_langs(config.rules.langs.clone())
        .with_contexts(config.rules.contexts.clone())
        .with_countries(config.rules.country_codes.clone());

    let paths: Vec<PathBuf> = if args.rulepath.is_empty() {
        config.rule_paths()
    } else {
        args.rulepath.iter().map(PathBuf::from).collect()
    };
    for path in paths {
        loader.load_path(path)?;
    }
    let (set, diagnostics) = loader.finish();
    for diagnostic in diagnostics {
        warn!("{}: {}", diagnostic.stage, diagnostic.message);
    }

    println!("Rule types:");
    println!("- field based rules {}", set.field_rules.len());
    println!("- data based rules {}", set.data_rules.len());
    println!("Context:");
    for (context, count) in &set.contexts {
        println!("- {} {}", context, count);
    }
    println!("Language:");
    for (lang, count) in &set.langs {
        println!("- {} {}", lang, count);
    }
    if !set.countries.is_empty() {
        println!("Country:");
        for (country, count) in &set.countries {
            println!("- {} {}", country, count);
        }
    }
    println!(
        "Date/time patterns: {}",
        DateMatcher::new().pattern_count()
    );
    Ok(())
}
