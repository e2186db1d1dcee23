use crate::ingest::DatadogSource;
use crate::model::FetchOutcome;
use crate::pipeline::Pipeline;
use crate::progress::Progress;
use crate::sink::create_sink;
use logpull_core::backoff::BackoffPolicy;
use logpull_core::shutdown::Shutdown;
use logpull_core::{Config, Error, FetchConfig, Result};
use std::sync::Arc;
use tracing::{info, instrument};

pub struct Credentials {
    pub api_key: String,
    pub app_key: String,
}

impl Credentials {
    fn validate(&self) -> Result<()> {
        if self.api_key.is_empty() {
            return Err(Error::Config(
                "DD_API_KEY environment variable is required".into(),
            ));
        }
        if self.app_key.is_empty() {
            return Err(Error::Config(
                "DD_APP_KEY environment variable is required".into(),
            ));
        }
        Ok(())
    }
}

pub struct App {
    pipeline: Pipeline,
}

impl App {
    /// Validates the request and opens the destination. No remote call is made here.
    #[instrument(skip_all)]
    pub fn new(config: &Config, fetch: FetchConfig, credentials: Credentials) -> Result<Self> {
        info!("Initializing application");

        fetch.validate()?;
        credentials.validate()?;

        let sink = create_sink(fetch.format, fetch.output.as_deref(), fetch.append)?;
        let source = DatadogSource::new(&config.api, credentials.api_key, credentials.app_key)?;

        info!(
            site = %config.api.site,
            format = %fetch.format,
            output = ?fetch.output,
            append = fetch.append,
            "Output ready"
        );

        let pipeline = Pipeline::new(
            Arc::new(source),
            sink,
            fetch,
            BackoffPolicy::from(&config.retry),
            Progress::stderr(),
        );

        Ok(Self { pipeline })
    }

    /// Runs the export and releases the sink whatever the outcome.
    pub async fn run(&mut self, shutdown: &mut Shutdown) -> Result<FetchOutcome> {
        let outcome = self.pipeline.run(shutdown).await;
        let closed = self.pipeline.close();

        let outcome = outcome?;
        closed?;
        Ok(outcome)
    }
}
