// stocksent_cli.rs
// Use it like this:
// stocksent_cli tickers app --limit 5
// stocksent_cli sentiment AAPL --days 7
// STOCKSENT_USE_MOCK=1 stocksent_cli advice TSLA --mode no-rag

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info};
use stocksent::{
  advice::{AdviceMode, AdviceRequest},
  CancellationToken, Config, StockSentClient, StockSentError,
};

// --- CLI Argument Parsing ---

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
  #[clap(subcommand)]
  command: Command,

  /// Use offline news and ticker data (same as STOCKSENT_USE_MOCK=1).
  #[arg(long, global = true)]
  mock: bool,

  /// Use offline advice (same as STOCKSENT_USE_ADVICE_MOCK=1).
  #[arg(long, global = true)]
  advice_mock: bool,

  /// Finnhub API token. Overrides FINNHUB_TOKEN.
  #[arg(long, global = true)]
  token: Option<String>,

  /// Finnhub base URL. Overrides FINNHUB_BASE_URL.
  #[arg(long, global = true)]
  finnhub_url: Option<String>,

  /// Advice backend base URL. Overrides BACKEND_BASE_URL.
  #[arg(long, global = true)]
  backend_url: Option<String>,
}

#[derive(Parser, Debug)]
enum Command {
  /// Search the US common-stock universe by symbol prefix or name.
  Tickers(TickersArgs),
  /// Per-day news sentiment for the last N days, today's keywords and the trend.
  Sentiment(SentimentArgs),
  /// Ask the advice backend for suggestions based on today's sentiment.
  Advice(AdviceArgs),
}

#[derive(Parser, Debug)]
struct TickersArgs {
  /// Symbol prefix or part of the company name. Empty lists the first entries.
  #[arg(default_value = "")]
  query: String,

  #[arg(long, default_value_t = 20)]
  limit: usize,
}

#[derive(Parser, Debug)]
struct SentimentArgs {
  symbol: String,

  #[arg(long, default_value_t = 7)]
  days: u32,
}

#[derive(Parser, Debug)]
struct AdviceArgs {
  symbol: String,

  /// "rag" retrieves recent news as context, "no-rag" asks the model directly.
  #[arg(long, default_value = "rag")]
  mode: AdviceMode,

  #[arg(long, default_value_t = 7)]
  days: u32,
}

fn build_config(args: &Args) -> Result<Config> {
  // Flags override the environment; validation runs on the merged result.
  let mut config = Config::from_env_unchecked();
  if args.mock {
    config.use_mock_news = true;
  }
  if args.advice_mock {
    config.use_mock_advice = true;
  }
  if let Some(token) = &args.token {
    config.finnhub_token = Some(token.clone());
  }
  if let Some(url) = &args.finnhub_url {
    config.finnhub_base_url = url.clone();
  }
  if let Some(url) = &args.backend_url {
    config.advice.base_url = url.clone();
  }
  config.validate().context("Invalid configuration")?;
  Ok(config)
}

// --- Commands ---

async fn run_tickers(client: &StockSentClient, args: &TickersArgs, cancel: &CancellationToken) -> Result<(), StockSentError> {
  let hits = client.tickers().search(&args.query, args.limit, cancel).await?;
  if hits.is_empty() {
    println!("No tickers match '{}'.", args.query);
  }
  for ticker in hits {
    println!("{:<8} {}", ticker.symbol, ticker.name);
  }
  Ok(())
}

async fn run_sentiment(client: &StockSentClient, args: &SentimentArgs, cancel: &CancellationToken) -> Result<(), StockSentError> {
  let news = client.news();
  let summary = news.summary(&args.symbol, args.days, cancel).await?;
  println!("{:<12} {:>5} {:>7}  {}", "date", "news", "score", "level");
  for day in &summary.days {
    println!("{:<12} {:>5} {:>+7.3}  {}", day.date.format("%Y-%m-%d"), day.count, day.score, day.level());
  }
  println!();
  println!("Trend: {:+.3} ({})", summary.average, summary.level);
  let keywords = news.today_keywords();
  if keywords.is_empty() {
    println!("No news today.");
  } else {
    println!("Today's keywords: {}", keywords.join(", "));
  }
  Ok(())
}

async fn run_advice(client: &StockSentClient, args: &AdviceArgs, cancel: &CancellationToken) -> Result<(), StockSentError> {
  let news = client.news();
  let summary = news.summary(&args.symbol, args.days, cancel).await?;
  let request = AdviceRequest::from_summary(&args.symbol.trim().to_uppercase(), &summary, news.today_keywords());
  info!("Requesting {} advice for {} ({}, {:+.2})", args.mode, request.symbol, request.level, request.score);
  let suggestions = client.advice().fetch_advice(args.mode, &request, cancel).await?;
  println!("{} today: {} ({:+.2})", request.symbol, request.level, request.score);
  for (i, suggestion) in suggestions.iter().enumerate() {
    println!("{}. {}", i + 1, suggestion);
  }
  Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
  env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
  let args = Args::parse();
  let config = build_config(&args)?;
  let client = StockSentClient::new(config).context("Failed to set up services")?;

  let cancel = CancellationToken::new();
  {
    let cancel = cancel.clone();
    tokio::spawn(async move {
      if tokio::signal::ctrl_c().await.is_ok() {
        info!("Interrupted, cancelling");
        cancel.cancel();
      }
    });
  }

  let outcome = match &args.command {
    Command::Tickers(a) => run_tickers(&client, a, &cancel).await,
    Command::Sentiment(a) => run_sentiment(&client, a, &cancel).await,
    Command::Advice(a) => run_advice(&client, a, &cancel).await,
  };

  match outcome {
    Ok(()) => Ok(()),
    Err(e) if e.is_cancelled() => {
      info!("Cancelled");
      Ok(())
    }
    Err(e @ StockSentError::ConfigurationError(_)) => Err(e).context("Configuration problem"),
    Err(e) => {
      error!("{}", e);
      eprintln!("{}", e.user_message());
      std::process::exit(1);
    }
  }
}
