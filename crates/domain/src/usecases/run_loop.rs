//! Run loop use case - orchestrates scanning, filtering, fetching, and publishing

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::sync::watch;
use tokio::time::{Duration, Instant, sleep, timeout};

use crate::{
    model::{
        CycleReport, ListingOrder, Post, ProcessResult, PublishMode, RejectReason, TitleOptions,
    },
    policy::{EligibilityEvaluator, EligibilityPolicy},
    ports::{Clock, Credentials, Ledger, MediaFetcher, Notifier, PageSource, PublishResult, Publisher},
    usecases::render::BackLinkRenderer,
};

/// Configuration for the run loop
#[derive(Debug, Clone)]
pub struct RunLoopConfig {
    /// Feed location handed to the page source
    pub source_location: String,
    /// Order in which the page source lists items
    pub listing_order: ListingOrder,
    /// Eligibility policy
    pub policy: EligibilityPolicy,
    /// Title construction
    pub title: TitleOptions,
    /// Single or batch publishing per cycle
    pub publish_mode: PublishMode,
    /// Destination credentials; `None` skips login
    pub credentials: Option<Credentials>,
    /// Post a back-link comment after publishing
    pub comment_back_link: bool,
    /// Back-link phrasings (empty uses defaults)
    pub back_link_phrases: Vec<String>,
    /// Dry run mode (don't actually publish or record)
    pub dry_run: bool,
    /// Wait after a cycle that published nothing
    pub poll_backoff: Duration,
    /// Wait after a failed cycle
    pub error_backoff: Duration,
    /// Wait before publishing a video
    pub video_settle_delay: Duration,
    /// Wait after each successful publish
    pub post_publish_delay: Duration,
    /// Upper bound on any single external call
    pub step_timeout: Duration,
    /// Seed for eligibility randomness (None = from entropy)
    pub random_seed: Option<u64>,
}

impl Default for RunLoopConfig {
    fn default() -> Self {
        Self {
            source_location: String::new(),
            listing_order: ListingOrder::NewestFirst,
            policy: EligibilityPolicy::default(),
            title: TitleOptions::default(),
            publish_mode: PublishMode::Single,
            credentials: None,
            comment_back_link: false,
            back_link_phrases: vec![],
            dry_run: true,
            poll_backoff: Duration::from_secs(15),
            error_backoff: Duration::from_secs(15),
            video_settle_delay: Duration::from_secs(30),
            post_publish_delay: Duration::from_secs(15),
            step_timeout: Duration::from_secs(60),
            random_seed: None,
        }
    }
}

/// Run loop orchestrator
pub struct RunLoop<P, F, X, L, N, Cl>
where
    P: PageSource + ?Sized,
    F: MediaFetcher + ?Sized,
    X: Publisher + ?Sized,
    L: Ledger + ?Sized,
    N: Notifier + ?Sized + 'static,
    Cl: Clock + ?Sized,
{
    page_source: Arc<P>,
    media_fetcher: Arc<F>,
    publisher: Arc<X>,
    ledger: Arc<L>,
    notifier: Arc<N>,
    clock: Arc<Cl>,
    config: RunLoopConfig,
    evaluator: EligibilityEvaluator,
    back_links: BackLinkRenderer,
    rng: Mutex<StdRng>,
}

impl<P, F, X, L, N, Cl> RunLoop<P, F, X, L, N, Cl>
where
    P: PageSource + ?Sized,
    F: MediaFetcher + ?Sized,
    X: Publisher + ?Sized,
    L: Ledger + ?Sized,
    N: Notifier + ?Sized + 'static,
    Cl: Clock + ?Sized,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        page_source: Arc<P>,
        media_fetcher: Arc<F>,
        publisher: Arc<X>,
        ledger: Arc<L>,
        notifier: Arc<N>,
        clock: Arc<Cl>,
        config: RunLoopConfig,
    ) -> Self {
        let evaluator = EligibilityEvaluator::new(config.policy.clone());
        let back_links = BackLinkRenderer::new(config.back_link_phrases.clone());
        let rng = match config.random_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            page_source,
            media_fetcher,
            publisher,
            ledger,
            notifier,
            clock,
            config,
            evaluator,
            back_links,
            rng: Mutex::new(rng),
        }
    }

    /// Prepare the ledger. Failure here is fatal.
    pub async fn init(&self) -> Result<(), RunLoopError> {
        self.ledger
            .init()
            .await
            .map_err(|e| RunLoopError::FatalSetup(format!("Ledger init failed: {}", e)))
    }

    /// Poll until `shutdown` turns true. Shutdown is only observed between cycles.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<(), RunLoopError> {
        self.init().await?;

        tracing::info!(
            source = %self.config.source_location,
            mode = ?self.config.publish_mode,
            dry_run = self.config.dry_run,
            "Relay loop started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            let pause = match self.poll_once().await {
                Ok(report) if report.halted => {
                    tracing::warn!("Publishing halted, backing off");
                    Some(self.config.error_backoff)
                }
                Ok(report) if report.recorded_count() > 0 => None,
                Ok(report) => {
                    if report.is_idle() {
                        tracing::debug!("No new items");
                    }
                    Some(self.config.poll_backoff)
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    tracing::error!(error = %e, "Cycle failed");
                    Some(self.config.error_backoff)
                }
            };

            if let Some(pause) = pause {
                tracing::debug!(backoff_secs = pause.as_secs(), "Backing off");
                tokio::select! {
                    _ = sleep(pause) => {}
                    changed = shutdown.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }
        }

        tracing::info!("Relay loop stopped");
        Ok(())
    }

    /// Run a single scan cycle
    pub async fn poll_once(&self) -> Result<CycleReport, RunLoopError> {
        let started = Instant::now();
        let result = self.run_cycle().await;

        self.publisher.release().await;
        self.page_source.release().await;

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(report) => tracing::info!(
                listed = report.listed,
                discovered = report.discovered,
                published = report.published_count(),
                skipped = report.skipped_count(),
                deferred = report.deferred_count(),
                halted = report.halted,
                elapsed_ms,
                "Cycle complete"
            ),
            Err(e) => tracing::warn!(error = %e, elapsed_ms, "Cycle abandoned"),
        }

        result
    }

    async fn run_cycle(&self) -> Result<CycleReport, RunLoopError> {
        let mut report = CycleReport::default();

        // Scan
        let scan_started = Instant::now();
        let listed = self
            .bounded(
                "list items",
                self.page_source.list_items(&self.config.source_location),
            )
            .await
            .map_err(RunLoopError::TransientFetch)?;
        report.listed = listed.len();

        // Diff against the ledger
        let posted: HashSet<String> = self
            .ledger
            .list_posted()
            .await
            .map_err(|e| RunLoopError::Ledger(e.to_string()))?
            .into_iter()
            .collect();

        let fresh = self.diff(listed, &posted);
        report.discovered = fresh.len();

        tracing::info!(
            listed = report.listed,
            discovered = report.discovered,
            elapsed_ms = scan_started.elapsed().as_millis() as u64,
            "Scanned feed"
        );

        if fresh.is_empty() {
            return Ok(report);
        }

        let mut posts = Vec::with_capacity(fresh.len());
        for item_id in fresh {
            match self.build_post(&item_id).await {
                Ok(post) => posts.push(post),
                Err(reason) => {
                    tracing::warn!(item = %item_id, reason = %reason, "Deferring item");
                    report
                        .outcomes
                        .push((item_id, ProcessResult::Deferred { reason }));
                }
            }
        }

        let fetch_failures = self.fetch_media(&mut posts).await;
        let fetched: Vec<PathBuf> = posts.iter().filter_map(|p| p.file_path.clone()).collect();

        let published = self.publish_all(posts, fetch_failures, &mut report).await;
        self.discard_media(&fetched).await;
        published?;

        Ok(report)
    }

    /// Put identifiers in chronological order and drop known or repeated ones
    fn diff(&self, listed: Vec<String>, posted: &HashSet<String>) -> Vec<String> {
        let mut listed = listed;
        if self.config.listing_order == ListingOrder::NewestFirst {
            listed.reverse();
        }

        let mut seen = HashSet::new();
        listed
            .into_iter()
            .filter(|id| !id.trim().is_empty())
            .filter(|id| !posted.contains(id))
            .filter(|id| seen.insert(id.clone()))
            .collect()
    }

    /// Fetch detail, construct the post and decide its eligibility once
    async fn build_post(&self, item_id: &str) -> Result<Post, String> {
        let detail = self
            .bounded("fetch detail", self.page_source.fetch_detail(item_id))
            .await?;

        let now = self.clock.now();
        if !self.config.dry_run {
            if let Err(e) = self.ledger.record_observed(item_id, now).await {
                tracing::warn!(item = %item_id, error = %e, "Failed to record observation");
            }
        }

        let post = {
            let mut rng = self.lock_rng();
            let mut post = Post::from_detail(item_id, detail, &self.config.title, &mut *rng);
            let verdict = self.evaluator.evaluate(&post, now, &mut *rng);
            post.decide(verdict);
            post
        };

        tracing::info!(
            item = %post.source_uri,
            title = %post.title,
            media = post.media_uris.len(),
            is_video = post.is_video,
            is_multiple = post.is_multiple(),
            postable = post.is_postable(),
            reason = post.reject_reason().map(|r| r.as_str()).unwrap_or(""),
            "Evaluated post"
        );

        Ok(post)
    }

    /// Download the primary media of every postable post.
    /// Returns failure reasons keyed by source URI.
    async fn fetch_media(&self, posts: &mut [Post]) -> HashMap<String, String> {
        let mut failures = HashMap::new();

        for post in posts.iter_mut().filter(|p| p.is_postable()) {
            let Some(media_uri) = post.primary_media().map(str::to_string) else {
                continue;
            };

            let started = Instant::now();
            match self
                .bounded("download media", self.media_fetcher.download(&media_uri))
                .await
            {
                Ok(path) => {
                    tracing::info!(
                        item = %post.source_uri,
                        path = %path.display(),
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Fetched media"
                    );
                    post.file_path = Some(path);
                }
                Err(reason) => {
                    tracing::warn!(item = %post.source_uri, reason = %reason, "Media fetch failed");
                    failures.insert(post.source_uri.clone(), reason);
                }
            }
        }

        failures
    }

    async fn publish_all(
        &self,
        posts: Vec<Post>,
        mut fetch_failures: HashMap<String, String>,
        report: &mut CycleReport,
    ) -> Result<(), RunLoopError> {
        let mut logged_in = false;
        let mut stop_reason: Option<String> = None;

        for post in posts {
            let uri = post.source_uri.clone();

            if let Some(reason) = &stop_reason {
                tracing::info!(item = %uri, reason = %reason, "Deferring item");
                report.outcomes.push((
                    uri,
                    ProcessResult::Deferred {
                        reason: reason.clone(),
                    },
                ));
                continue;
            }

            // An override verdict can still leave nothing to publish
            let skip_reason = post.reject_reason().or_else(|| {
                post.primary_media()
                    .is_none()
                    .then_some(RejectReason::NoMedia)
            });

            if let Some(reason) = skip_reason {
                if !self.config.dry_run {
                    if post.reject_reason().is_some() {
                        self.dispatch_notification(&post);
                    }
                    self.ledger
                        .upsert_posted(&uri, self.clock.now())
                        .await
                        .map_err(|e| RunLoopError::Ledger(e.to_string()))?;
                }
                tracing::info!(item = %uri, reason = %reason, "Skipped post");
                report
                    .outcomes
                    .push((uri, ProcessResult::Skipped { reason }));
                continue;
            }

            let Some(file_path) = post.file_path.clone() else {
                let reason = fetch_failures
                    .remove(&uri)
                    .unwrap_or_else(|| "no media fetched".to_string());
                tracing::info!(item = %uri, reason = %reason, "Deferring item");
                report
                    .outcomes
                    .push((uri, ProcessResult::Deferred { reason }));
                continue;
            };

            if self.config.dry_run {
                tracing::info!(
                    item = %uri,
                    title = %post.title,
                    path = %file_path.display(),
                    "[DRY RUN] Would publish"
                );
                report.outcomes.push((
                    uri,
                    ProcessResult::Published {
                        title: post.title.clone(),
                        publish_id: None,
                        url: None,
                    },
                ));
                if self.config.publish_mode == PublishMode::Single {
                    stop_reason = Some("single publish per cycle".to_string());
                }
                continue;
            }

            if !logged_in {
                if let Some(credentials) = &self.config.credentials {
                    if let Err(error) = self
                        .bounded("login", self.publisher.login(credentials))
                        .await
                    {
                        tracing::error!(platform = self.publisher.platform(), error = %error, "Login failed");
                        report.halted = true;
                        report.outcomes.push((uri, ProcessResult::Failed { error }));
                        stop_reason = Some("login failed".to_string());
                        continue;
                    }
                }
                logged_in = true;
            }

            if post.is_video && !self.config.video_settle_delay.is_zero() {
                tracing::debug!(
                    item = %uri,
                    delay_secs = self.config.video_settle_delay.as_secs(),
                    "Waiting for video to settle"
                );
                sleep(self.config.video_settle_delay).await;
            }

            let started = Instant::now();
            match self
                .bounded("publish", self.publisher.publish(&file_path, &post.title))
                .await
            {
                Ok(result) => {
                    self.ledger
                        .upsert_posted(&uri, self.clock.now())
                        .await
                        .map_err(|e| RunLoopError::Ledger(e.to_string()))?;

                    tracing::info!(
                        item = %uri,
                        platform = self.publisher.platform(),
                        publish_id = %result.id,
                        url = ?result.url,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Published post"
                    );

                    if self.config.comment_back_link {
                        self.comment_back_link(&result, &uri).await;
                    }
                    self.dispatch_notification(&post);

                    report.outcomes.push((
                        uri,
                        ProcessResult::Published {
                            title: post.title.clone(),
                            publish_id: Some(result.id),
                            url: result.url,
                        },
                    ));

                    if !self.config.post_publish_delay.is_zero() {
                        sleep(self.config.post_publish_delay).await;
                    }

                    if self.config.publish_mode == PublishMode::Single {
                        stop_reason = Some("single publish per cycle".to_string());
                    }
                }
                Err(error) => {
                    tracing::error!(item = %uri, error = %error, "Publish failed, halting cycle");
                    report.halted = true;
                    report.outcomes.push((uri, ProcessResult::Failed { error }));
                    stop_reason = Some("publishing halted after failure".to_string());
                }
            }
        }

        Ok(())
    }

    /// Remove this cycle's downloads; failures are only logged
    async fn discard_media(&self, paths: &[PathBuf]) {
        for path in paths {
            if let Err(e) = self.media_fetcher.discard(path).await {
                tracing::warn!(path = %path.display(), error = %e, "Failed to discard media");
            }
        }
    }

    async fn comment_back_link(&self, published: &PublishResult, source_uri: &str) {
        let comment = self.back_links.render(source_uri);
        match self
            .bounded(
                "comment back link",
                self.publisher.comment_back_link(published, &comment),
            )
            .await
        {
            Ok(()) => tracing::debug!(item = %source_uri, "Posted back-link comment"),
            Err(error) => {
                tracing::warn!(item = %source_uri, error = %error, "Back-link comment failed")
            }
        }
    }

    /// Fire-and-forget notification; never blocks the cycle
    fn dispatch_notification(&self, post: &Post) {
        if !self.notifier.is_enabled() {
            return;
        }

        let notifier = Arc::clone(&self.notifier);
        let post = post.clone();
        tokio::spawn(async move {
            if let Err(e) = notifier.notify(&post).await {
                tracing::warn!(item = %post.source_uri, error = %e, "Notification failed");
            }
        });
    }

    async fn bounded<T, E, Fut>(&self, step: &'static str, fut: Fut) -> Result<T, String>
    where
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        match timeout(self.config.step_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(format!("{} failed: {}", step, e)),
            Err(_) => Err(format!(
                "{} timed out after {}s",
                step,
                self.config.step_timeout.as_secs()
            )),
        }
    }

    fn lock_rng(&self) -> MutexGuard<'_, StdRng> {
        self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Errors from the run loop
#[derive(Debug, thiserror::Error)]
pub enum RunLoopError {
    #[error("Transient fetch error: {0}")]
    TransientFetch(String),
    #[error("Ledger error: {0}")]
    Ledger(String),
    #[error("Fatal setup error: {0}")]
    FatalSetup(String),
}

impl RunLoopError {
    /// Whether the process should stop
    pub fn is_fatal(&self) -> bool {
        matches!(self, RunLoopError::FatalSetup(_))
    }
}
