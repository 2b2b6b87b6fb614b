// stocksent/src/client.rs

use crate::advice::{AdviceClient, HttpAdviceClient, OfflineAdviceClient};
use crate::base::StockSentError;
use crate::config::Config;
use crate::news::{FinnhubNewsService, NewsService, OfflineNewsService};
use crate::news_repository::NewsRepository;
use crate::sentiment::{LexiconScorer, SentimentScorer};
use crate::ticker::{FinnhubTickerService, OfflineTickerService, TickerRepository, TickerService};

use log::info;
use std::sync::Arc;

/// Entry point wiring the repositories to real or offline collaborators.
pub struct StockSentClient {
  config: Config,
  news_repo: Arc<NewsRepository>,
  ticker_repo: Arc<TickerRepository>,
  advice_client: Arc<dyn AdviceClient>,
}

impl StockSentClient {
  pub fn new(config: Config) -> Result<Self, StockSentError> {
    config.validate()?;
    let (news, tickers): (Arc<dyn NewsService>, Arc<dyn TickerService>) = if config.use_mock_news {
      info!("Using offline news and ticker services");
      (Arc::new(OfflineNewsService::new()), Arc::new(OfflineTickerService))
    } else {
      let token = config
        .finnhub_token
        .as_deref()
        .ok_or_else(|| StockSentError::ConfigurationError("FINNHUB_TOKEN is not set".to_string()))?;
      info!("Using Finnhub at {}", config.finnhub_base_url);
      (
        Arc::new(FinnhubNewsService::new(&config.finnhub_base_url, token, config.request_timeout)?),
        Arc::new(FinnhubTickerService::new(&config.finnhub_base_url, token, config.request_timeout)?),
      )
    };
    let advice_client: Arc<dyn AdviceClient> = if config.use_mock_advice {
      info!("Using offline advice");
      Arc::new(OfflineAdviceClient::new())
    } else {
      info!("Using advice backend at {}", config.advice.base_url);
      Arc::new(HttpAdviceClient::new(&config.advice)?)
    };
    Ok(Self::from_parts(config, news, tickers, Arc::new(LexiconScorer::new()), advice_client))
  }

  /// Assemble a client around caller-supplied collaborators.
  pub fn from_parts(
    config: Config,
    news: Arc<dyn NewsService>,
    tickers: Arc<dyn TickerService>,
    scorer: Arc<dyn SentimentScorer>,
    advice_client: Arc<dyn AdviceClient>,
  ) -> Self {
    let news_repo = NewsRepository::new(news, scorer, config.news_limits.clone(), config.cache_policy.clone());
    let ticker_repo = Arc::new(TickerRepository::new(tickers, config.ticker_limits.clone()));
    StockSentClient { config, news_repo, ticker_repo, advice_client }
  }

  pub fn config(&self) -> &Config {
    &self.config
  }

  pub fn news(&self) -> Arc<NewsRepository> {
    self.news_repo.clone()
  }

  pub fn tickers(&self) -> Arc<TickerRepository> {
    self.ticker_repo.clone()
  }

  pub fn advice(&self) -> Arc<dyn AdviceClient> {
    self.advice_client.clone()
  }
}
