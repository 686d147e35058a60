use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use comfy_table::{presets::UTF8_FULL_CONDENSED, Table};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::Semaphore;
use tracing::warn;

use fieldlens_core::config::FieldLensConfig;
use fieldlens_core::engine::{ScanMode, ScanOptions, Scanner};
use fieldlens_core::llm::{create_provider, HttpEmbedder, LlmClassifier, LlmClassifierConfig};
use fieldlens_core::report::ScanReport;
use fieldlens_core::rules::loader::RuleLoader;
use fieldlens_core::{CancelToken, FieldLensError, FnRegistry, RuleSet};

use crate::args::{ModeArg, ScanArgs, ScanFormat};

/// Run a scan over one or more data files on a worker pool sized to the
/// machine, honoring Ctrl-C as the cancellation signal.
pub async fn run(args: &ScanArgs, config: &FieldLensConfig) -> anyhow::Result<()> {
    let rules = Arc::new(load_rules(args, config)?);
    let options = scan_options(args, config);

    let classifier = match args.mode {
        ModeArg::Rules => None,
        ModeArg::Hybrid | ModeArg::Llm => Some(Arc::new(
            build_classifier(args, config).await.context("setting up the LLM classifier")?,
        )),
    };

    let cancel = CancelToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("cancelling, writing partial results...");
                cancel.cancel();
            }
        });
    }

    let progress = if args.files.len() > 1 && args.format != ScanFormat::Json {
        let bar = ProgressBar::new(args.files.len() as u64);
        bar.set_style(
            ProgressStyle::with_template("{bar:30} {pos}/{len} {msg}")
                .expect("valid progress template"),
        );
        Some(bar)
    } else {
        None
    };

    let workers = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4);
    let semaphore = Arc::new(Semaphore::new(workers));
    let mut tasks = tokio::task::JoinSet::new();

    for (index, file) in args.files.iter().cloned().enumerate() {
        let rules = rules.clone();
        let options = options.clone();
        let classifier = classifier.clone();
        let cancel = cancel.clone();
        let semaphore = semaphore.clone();
        tasks.spawn(async move {
            let _permit = semaphore.acquire_owned().await.expect("semaphore open");
            let report = scan_file(&file, &rules, options, classifier.as_deref(), &cancel).await;
            (index, file, report)
        });
    }

    let mut outcomes: Vec<(usize, PathBuf, fieldlens_core::Result<ScanReport>)> = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        let (index, file, report) = joined.expect("scan task panicked");
        if let Some(bar) = &progress {
            bar.inc(1);
            bar.set_message(file.display().to_string());
        }
        outcomes.push((index, file, report));
    }
    if let Some(bar) = progress {
        bar.finish_and_clear();
    }
    outcomes.sort_by_key(|(index, _, _)| *index);

    let mut reports = Vec::new();
    let mut last_failure: Option<FieldLensError> = None;
    for (_, file, outcome) in outcomes {
        match outcome {
            Ok(report) => reports.push(report),
            Err(err) => {
                warn!("skipping {}: {}", file.display(), err);
                eprintln!("skipping {}: {}", file.display(), err);
                last_failure = Some(err);
            }
        }
    }

    if reports.is_empty() {
        if let Some(err) = last_failure {
            return Err(err.into());
        }
    }

    write_reports(args, &reports)?;

    if reports.iter().any(|r| r.cancelled) || cancel.is_cancelled() {
        return Err(FieldLensError::Cancelled.into());
    }
    Ok(())
}

async fn scan_file(
    file: &PathBuf,
    rules: &RuleSet,
    options: ScanOptions,
    classifier: Option<&LlmClassifier>,
    cancel: &CancelToken,
) -> fieldlens_core::Result<ScanReport> {
    let limit = options.limit;
    let records = {
        let file = file.clone();
        tokio::task::spawn_blocking(move || fieldlens_core::read::read_records(&file, limit))
            .await
            .map_err(|e| FieldLensError::Other(e.to_string()))??
    };

    let table = file.display().to_string();
    let scanner = Scanner::new(rules, options);
    let report = match classifier {
        Some(classifier) => {
            scanner
                .scan_with_classifier(&table, records, classifier, cancel)
                .await
        }
        None => scanner.scan(&table, records, cancel),
    };
    Ok(report)
}

fn load_rules(args: &ScanArgs, config: &FieldLensConfig) -> fieldlens_core::Result<RuleSet> {
    let mut loader = RuleLoader::new(FnRegistry::with_builtins())
        .with_langs(merge(&args.langs, &config.rules.langs))
        .with_contexts(merge(&args.contexts, &config.rules.contexts))
        .with_countries(config.rules.country_codes.clone());

    let paths: Vec<PathBuf> = if args.rules.is_empty() {
        config.rule_paths()
    } else {
        args.rules.iter().map(PathBuf::from).collect()
    };
    for path in paths {
        loader.load_path(path)?;
    }
    let (set, diagnostics) = loader.finish();
    for diagnostic in diagnostics {
        warn!("{}: {}", diagnostic.stage, diagnostic.message);
    }
    Ok(set)
}

fn scan_options(args: &ScanArgs, config: &FieldLensConfig) -> ScanOptions {
    let mut options = ScanOptions::default();
    options.limit = args.limit;
    options.confidence = args.confidence;
    options.contexts = merge(&args.contexts, &config.rules.contexts);
    options.langs = merge(&args.langs, &config.rules.langs);
    options.parse_dates = !args.no_dates && config.scan.parse_dates.unwrap_or(true);
    options.ignore_imprecise =
        !args.keep_imprecise && config.scan.ignore_imprecise.unwrap_or(true);
    options.dict_share = args
        .dict_share
        .or(config.scan.dict_share)
        .unwrap_or(options.dict_share);
    if let Some(limit) = config.scan.limit {
        if args.limit == 1000 {
            options.limit = limit;
        }
    }
    if let Some(confidence) = config.scan.confidence {
        if (args.confidence - 5.0).abs() < f64::EPSILON {
            options.confidence = confidence;
        }
    }
    options.mode = match args.mode {
        ModeArg::Rules => ScanMode::Rules,
        ModeArg::Hybrid => ScanMode::Hybrid,
        ModeArg::Llm => ScanMode::Llm,
    };
    options.llm_country = args.country.clone();
    options
}

async fn build_classifier(
    args: &ScanArgs,
    config: &FieldLensConfig,
) -> fieldlens_core::Result<LlmClassifier> {
    let registry = args
        .registry
        .clone()
        .or_else(|| config.llm.registry.as_deref().map(|p| config.resolve_path(p)))
        .ok_or_else(|| FieldLensError::Config {
            message: "hybrid/llm mode needs a registry (--registry or [llm].registry)".to_string(),
        })?;

    let mut classifier_config = LlmClassifierConfig::new(registry);
    classifier_config.index_path = config.llm.index.as_deref().map(|p| config.resolve_path(p));
    if let Some(top_k) = config.llm.top_k {
        classifier_config.top_k = top_k;
    }
    if let Some(retries) = config.llm.max_retries {
        classifier_config.max_retries = retries;
    }

    let embedding_key = config
        .llm
        .api_key
        .clone()
        .or_else(|| std::env::var("OPENAI_API_KEY").ok());
    let embedder = HttpEmbedder::new(
        config
            .llm
            .embedding_base_url
            .as_deref()
            .unwrap_or("https://api.openai.com/v1"),
        embedding_key,
        config.llm.embedding_model.as_deref(),
    )?;

    let provider_name = args
        .provider
        .clone()
        .or_else(|| config.llm.provider.clone())
        .unwrap_or_else(|| "openai".to_string());
    let provider = create_provider(
        &provider_name,
        config.llm.api_key.clone(),
        config.llm.base_url.clone(),
        args.model.clone().or_else(|| config.llm.model.clone()),
        config.llm.timeout_secs.map(Duration::from_secs),
    )?;

    LlmClassifier::build(classifier_config, Box::new(embedder), provider).await
}

fn write_reports(args: &ScanArgs, reports: &[ScanReport]) -> anyhow::Result<()> {
    if let Some(output) = &args.output {
        let json = reports_json(reports)?;
        std::fs::write(output, json)
            .with_context(|| format!("writing report to {}", output.display()))?;
        println!("Output written to {}", output.display());
        return Ok(());
    }

    match args.format {
        ScanFormat::Json => {
            println!("{}", reports_json(reports)?);
        }
        ScanFormat::Short | ScanFormat::Full => {
            for report in reports {
                print_table(report, args.format == ScanFormat::Short);
            }
        }
    }
    Ok(())
}

fn reports_json(reports: &[ScanReport]) -> anyhow::Result<String> {
    let json = if reports.len() == 1 {
        serde_json::to_string_pretty(&reports[0])?
    } else {
        serde_json::to_string_pretty(reports)?
    };
    Ok(json)
}

fn print_table(report: &ScanReport, matched_only: bool) {
    println!("Table: {}", report.table);
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(vec!["key", "ftype", "tags", "matches"]);

    let mut rows = 0;
    for field in &report.fields {
        if matched_only && field.matches.is_empty() {
            continue;
        }
        let tags = field
            .tags
            .iter()
            .map(|t| format!("{:?}", t).to_lowercase())
            .collect::<Vec<_>>()
            .join(",");
        let matches = field
            .matches
            .iter()
            .map(|m| match &m.format {
                Some(format) => format!("{} {:.2} ({})", m.dataclass, m.confidence, format),
                None => format!("{} {:.2}", m.dataclass, m.confidence),
            })
            .collect::<Vec<_>>()
            .join(", ");
        table.add_row(vec![
            field.field.clone(),
            field.ftype.as_str().to_string(),
            tags,
            matches,
        ]);
        rows += 1;
    }

    if rows > 0 {
        println!("{table}");
    } else {
        println!("(no matched columns)");
    }
    if report.cancelled {
        println!("(scan cancelled, partial results)");
    }
}

fn merge(primary: &[String], fallback: &[String]) -> Vec<String> {
    if primary.is_empty() {
        fallback.to_vec()
    } else {
        primary.to_vec()
    }
}
