//! Eligibility policy for relaying posts

use rand::Rng;
use time::{OffsetDateTime, UtcOffset};

use crate::model::{Post, RejectReason, Verdict};

/// Draw value that causes a random skip
const RANDOM_SKIP_DRAW: u32 = 1;

/// Hour-of-day window in which posting is allowed.
///
/// Covers `[lower, upper)`. A window with `lower > upper` wraps past midnight and
/// `lower == upper` allows every hour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveHours {
    pub lower: u8,
    pub upper: u8,
}

impl ActiveHours {
    pub const ALWAYS: ActiveHours = ActiveHours { lower: 0, upper: 0 };

    pub fn contains(&self, hour: u8) -> bool {
        if self.lower == self.upper {
            return true;
        }
        if self.lower < self.upper {
            hour >= self.lower && hour < self.upper
        } else {
            hour >= self.lower || hour < self.upper
        }
    }
}

impl Default for ActiveHours {
    fn default() -> Self {
        Self::ALWAYS
    }
}

/// Policy configuration
#[derive(Debug, Clone)]
pub struct EligibilityPolicy {
    /// Posts older than this are stale
    pub max_age_secs: u64,
    /// Hours in which posting is allowed
    pub active_hours: ActiveHours,
    /// Offset in which active hours are evaluated
    pub utc_offset: UtcOffset,
    /// Roughly one in this many image posts is skipped; 0 disables skipping
    pub random_skip_denominator: u32,
    /// Accept everything
    pub debug_override: bool,
}

impl Default for EligibilityPolicy {
    fn default() -> Self {
        Self {
            max_age_secs: 180,
            active_hours: ActiveHours::ALWAYS,
            utc_offset: UtcOffset::UTC,
            random_skip_denominator: 3,
            debug_override: false,
        }
    }
}

/// Decides whether a post may be published
#[derive(Debug, Clone)]
pub struct EligibilityEvaluator {
    policy: EligibilityPolicy,
}

impl EligibilityEvaluator {
    pub fn new(policy: EligibilityPolicy) -> Self {
        Self { policy }
    }

    /// Evaluate a post against the policy at `now`. The first failing check wins.
    pub fn evaluate<R: Rng + ?Sized>(&self, post: &Post, now: OffsetDateTime, rng: &mut R) -> Verdict {
        if self.policy.debug_override {
            return Verdict::Postable;
        }

        let age_secs = (now - post.captured_at).whole_seconds().unsigned_abs();
        tracing::debug!(source_uri = %post.source_uri, age_secs, "Evaluating post");

        if age_secs > self.policy.max_age_secs {
            return Verdict::Rejected(RejectReason::Stale);
        }

        if post.media_uris.is_empty() {
            return Verdict::Rejected(RejectReason::NoMedia);
        }

        if post.title.is_empty() {
            return Verdict::Rejected(RejectReason::NoTitle);
        }

        let hour = now.to_offset(self.policy.utc_offset).hour();
        if !self.policy.active_hours.contains(hour) {
            return Verdict::Rejected(RejectReason::OutsideActiveHours);
        }

        if !post.is_video && self.policy.random_skip_denominator > 0 {
            let draw = rng.gen_range(1..=self.policy.random_skip_denominator);
            if draw == RANDOM_SKIP_DRAW {
                return Verdict::Rejected(RejectReason::RandomlySkipped);
            }
        }

        Verdict::Postable
    }
}
