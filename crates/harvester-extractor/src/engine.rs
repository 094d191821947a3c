//! Fetch/extract engine: one work item in, one result or failure out

use crate::config::ExtractorConfig;
use crate::error::ProfileError;
use crate::normalize;
use crate::profile::{compile_patterns, FieldKind, FieldSpec, SelectorStrategy, TargetProfile};
use crate::throttle::{DelayStage, RateLimiter};
use harvester_domain::{ExtractionFailure, ExtractionResult, FieldValue, WorkItem};
use harvester_session::{Session, SessionError};
use regex::Regex;
use tracing::{debug, info, instrument, warn};

/// A field with its patterns compiled
struct CompiledField {
    spec: FieldSpec,
    strip: Option<Regex>,
    exclude: Vec<Regex>,
}

/// Drives a session through navigate, wait, read for each item
///
/// The engine holds no per-session state and is shared by all workers.
pub struct FetchEngine {
    profile: TargetProfile,
    fields: Vec<CompiledField>,
    config: ExtractorConfig,
}

impl FetchEngine {
    /// Create an engine after validating the profile and configuration
    pub fn new(profile: TargetProfile, config: ExtractorConfig) -> Result<Self, ProfileError> {
        profile.validate()?;
        config.validate().map_err(ProfileError::Invalid)?;

        let fields = profile
            .fields
            .iter()
            .map(|spec| {
                let (strip, exclude) = compile_patterns(spec)?;
                Ok(CompiledField {
                    spec: spec.clone(),
                    strip,
                    exclude,
                })
            })
            .collect::<Result<Vec<_>, ProfileError>>()?;

        info!(
            "Fetch engine ready: profile v{}, {} fields, {} URL template(s)",
            profile.version,
            fields.len(),
            profile.url_templates().count()
        );

        Ok(Self {
            profile,
            fields,
            config,
        })
    }

    /// Target profile in use
    pub fn profile(&self) -> &TargetProfile {
        &self.profile
    }

    /// Engine configuration in use
    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Extract one item, retrying transient errors per the retry policy
    ///
    /// # Errors
    ///
    /// Returns an [`ExtractionFailure`] once a permanent error occurs or the
    /// attempts are exhausted. The caller records it and moves on.
    #[instrument(skip_all, fields(key = %item.key()))]
    pub async fn extract<S>(
        &self,
        session: &mut S,
        limiter: &mut RateLimiter,
        item: &WorkItem,
    ) -> Result<ExtractionResult, ExtractionFailure>
    where
        S: Session + ?Sized,
    {
        let policy = &self.config.retry;
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.attempt(session, limiter, item).await {
                Ok(mut result) => {
                    result.attempts = attempt;
                    debug!(
                        "Extracted {} field(s) on attempt {}",
                        result.fields.len(),
                        attempt
                    );
                    return Ok(result);
                }
                Err(err) if policy.should_retry(attempt, err.is_transient()) => {
                    warn!(
                        "Attempt {}/{} failed: {}",
                        attempt, policy.max_attempts, err
                    );
                    limiter.pause_within(policy.backoff).await;
                }
                Err(err) => {
                    return Err(ExtractionFailure {
                        key: item.key().to_string(),
                        attempts: attempt,
                        reason: err.to_string(),
                    });
                }
            }
        }
    }

    /// One navigate-through-extract pass over the primary and alternate URLs
    ///
    /// The first URL yielding fields wins, unless the profile falls back on
    /// unavailable items and the page reads as unavailable. Failing that the
    /// outcome is the first unavailable page not preceded by a transient
    /// error, then the first transient error, then the first empty page,
    /// then the last permanent error.
    async fn attempt<S>(
        &self,
        session: &mut S,
        limiter: &mut RateLimiter,
        item: &WorkItem,
    ) -> Result<ExtractionResult, SessionError>
    where
        S: Session + ?Sized,
    {
        let mut unavailable: Option<ExtractionResult> = None;
        let mut empty: Option<ExtractionResult> = None;
        let mut transient: Option<SessionError> = None;
        let mut permanent: Option<SessionError> = None;

        for (index, template) in self.profile.url_templates().enumerate() {
            let url = item.expand(template);
            if index > 0 {
                debug!("Falling back to {}", url);
            }

            match self.visit(session, limiter, item, &url).await {
                Ok(result) if result.is_empty() => {
                    debug!("No fields found at {}", url);
                    if empty.is_none() {
                        empty = Some(result);
                    }
                }
                Ok(result) if self.wants_fallback(&result) => {
                    debug!("Item reported unavailable at {}", url);
                    if unavailable.is_none() && transient.is_none() {
                        unavailable = Some(result);
                    }
                }
                Ok(result) => return Ok(result),
                Err(err) if err.is_transient() => {
                    debug!("Visit to {} failed: {}", url, err);
                    if transient.is_none() {
                        transient = Some(err);
                    }
                }
                Err(err) => {
                    debug!("Visit to {} failed: {}", url, err);
                    permanent = Some(err);
                }
            }
        }

        if let Some(result) = unavailable {
            return Ok(result);
        }
        if let Some(err) = transient {
            return Err(err);
        }
        match empty {
            Some(result) => Ok(result),
            None => Err(permanent.unwrap_or(SessionError::NotLoaded)),
        }
    }

    /// Whether an availability field of `result` says the item cannot be bought here
    fn wants_fallback(&self, result: &ExtractionResult) -> bool {
        self.profile.fallback_when_unavailable
            && self.fields.iter().any(|field| {
                field.spec.kind == FieldKind::Availability
                    && result.field(&field.spec.name) == Some(&FieldValue::Flag(false))
            })
    }

    async fn visit<S>(
        &self,
        session: &mut S,
        limiter: &mut RateLimiter,
        item: &WorkItem,
        url: &str,
    ) -> Result<ExtractionResult, SessionError>
    where
        S: Session + ?Sized,
    {
        let timeouts = &self.config.timeouts;

        limiter.pause(DelayStage::PreNavigation).await;
        session.navigate(url, timeouts.navigation()).await?;

        if let Some(ready) = &self.profile.ready_selector {
            session.wait_for(ready, timeouts.selector()).await?;
        }
        limiter.pause(DelayStage::PostLoad).await;

        let source_url = session.current_url().unwrap_or(url).to_string();
        let mut result = ExtractionResult::new(item.key(), source_url);

        for field in &self.fields {
            if let Some(value) = self.read_field(session, field).await? {
                result.fields.push((field.spec.name.clone(), value));
            }
        }

        Ok(result)
    }

    /// First strategy yielding a normalizable value, or `None`
    async fn read_field<S>(&self, session: &S, field: &CompiledField) -> Result<Option<FieldValue>, SessionError>
    where
        S: Session + ?Sized,
    {
        if field.spec.kind == FieldKind::UrlList && field.spec.merge_strategies {
            let mut urls = Vec::new();
            for strategy in &field.spec.strategies {
                urls.extend(read_urls(session, strategy).await?);
            }
            return Ok(finish_urls(field, urls));
        }

        for strategy in &field.spec.strategies {
            let raw = session
                .read(&strategy.selector, strategy.attribute.as_deref())
                .await?;

            let value = match field.spec.kind {
                FieldKind::Text => raw.iter().find_map(|v| normalize::clean_text(v)).map(FieldValue::Text),
                FieldKind::Number => self.read_number(session, field, strategy, &raw).await?,
                FieldKind::UrlList => finish_urls(field, urls_from(&raw)),
                FieldKind::Availability => {
                    let texts: Vec<String> = raw.iter().filter_map(|v| normalize::clean_text(v)).collect();
                    if texts.is_empty() {
                        None
                    } else {
                        Some(FieldValue::Flag(normalize::is_available(
                            &texts,
                            &field.spec.unavailable_markers,
                        )))
                    }
                }
            };

            if value.is_some() {
                return Ok(value);
            }
            debug!("Strategy '{}' gave nothing for {}", strategy.selector, field.spec.name);
        }

        Ok(None)
    }

    async fn read_number<S>(
        &self,
        session: &S,
        field: &CompiledField,
        strategy: &SelectorStrategy,
        raw: &[String],
    ) -> Result<Option<FieldValue>, SessionError>
    where
        S: Session + ?Sized,
    {
        let Some(fraction_selector) = &strategy.fraction_selector else {
            return Ok(raw
                .iter()
                .find_map(|v| normalize::parse_number(v, field.spec.decimal_style))
                .map(FieldValue::Number));
        };

        let Some(whole) = raw.iter().find_map(|v| normalize::clean_text(v)) else {
            return Ok(None);
        };
        let fraction = session.read(fraction_selector, None).await?;
        let fraction = fraction.iter().find_map(|v| normalize::clean_text(v));

        Ok(normalize::join_whole_fraction(&whole, fraction.as_deref()).map(FieldValue::Number))
    }
}

async fn read_urls<S>(session: &S, strategy: &SelectorStrategy) -> Result<Vec<String>, SessionError>
where
    S: Session + ?Sized,
{
    let raw = session
        .read(&strategy.selector, strategy.attribute.as_deref())
        .await?;
    Ok(urls_from(&raw))
}

fn urls_from(raw: &[String]) -> Vec<String> {
    raw.iter().flat_map(|v| normalize::extract_urls(v)).collect()
}

fn finish_urls(field: &CompiledField, urls: Vec<String>) -> Option<FieldValue> {
    let cleaned = normalize::clean_urls(urls, field.strip.as_ref(), &field.exclude, field.spec.max_items);
    if cleaned.is_empty() {
        None
    } else {
        Some(FieldValue::List(cleaned))
    }
}
