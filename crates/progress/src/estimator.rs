//! Duration estimation from story points and confidence.
//!
//! Estimates follow a lognormal uncertainty model: the lower the confidence,
//! the wider the spread above the median estimate.

use chrono::{Datelike, NaiveDate, Weekday};
use rand::{Rng, SeedableRng};
use rand_pcg::Mcg128Xsl64;
use serde::{Deserialize, Serialize};
use timeline_core::{DateWindow, Item, Team};

/// Confidence assumed when an item has none.
pub const DEFAULT_CONFIDENCE: f64 = 50.0;

/// Standard deviations of spread at zero confidence.
const LOW_CONFIDENCE_STDS: f64 = 1.3;

/// Configuration for the estimation engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EstimationConfig {
    /// Percentile of the uncertainty distribution used for deterministic
    /// estimates (50-99)
    pub uncertainty_weight: f64,
    /// Confidence used when an item's own is invalid
    pub default_confidence: f64,
    /// Seed for probabilistic draws (None = random)
    pub seed: Option<u64>,
}

impl Default for EstimationConfig {
    fn default() -> Self {
        Self {
            uncertainty_weight: 80.0,
            default_confidence: DEFAULT_CONFIDENCE,
            seed: None,
        }
    }
}

impl EstimationConfig {
    /// Set the uncertainty weight.
    pub fn with_uncertainty_weight(mut self, weight: f64) -> Self {
        self.uncertainty_weight = weight;
        self
    }

    /// Set the sampling seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// `0 < v <= 100`.
pub fn is_confidence_valid(value: f64) -> bool {
    value > 0.0 && value <= 100.0
}

/// `v >= 0`.
pub fn is_points_valid(value: f64) -> bool {
    value.is_finite() && value >= 0.0
}

/// Monday-to-Friday days between two dates, both ends included.
pub fn business_days(start: NaiveDate, end: NaiveDate) -> i64 {
    if end < start {
        return 0;
    }
    start
        .iter_days()
        .take_while(|d| *d <= end)
        .filter(|d| !matches!(d.weekday(), Weekday::Sat | Weekday::Sun))
        .count() as i64
}

/// Working days one track needs for `points`.
pub fn points_to_days(points: f64, team: &Team) -> f64 {
    let per_day = team.points_per_day_per_track();
    if per_day > 0.0 && per_day.is_finite() {
        points / per_day
    } else {
        0.0
    }
}

fn spread(confidence: f64) -> f64 {
    LOW_CONFIDENCE_STDS * (100.0 - confidence.clamp(0.0, 100.0)) / 100.0
}

/// Points added on top of a median estimate at the `uncertainty_weight`
/// percentile. Lower confidence yields a larger buffer; full confidence
/// yields none.
pub fn deterministic_extra_points(points: f64, confidence: f64, uncertainty_weight: f64) -> f64 {
    let percentile = uncertainty_weight.clamp(50.0, 99.0) / 100.0;
    points * ((spread(confidence) * normal_quantile(percentile)).exp() - 1.0)
}

/// Days of work already done in `window` as of `now`.
pub fn completed_days_of_work(window: &DateWindow, total_days: f64, now: NaiveDate) -> f64 {
    match (window.start, window.due) {
        (Some(start), due) if start <= now && due.map_or(true, |d| d > now) => {
            business_days(start, now) as f64
        }
        (_, Some(due)) if due < now => total_days,
        _ => 0.0,
    }
}

/// Converts estimates into durations.
///
/// Deterministic methods are pure; probabilistic ones advance the engine's
/// seeded generator.
pub struct EstimationEngine {
    config: EstimationConfig,
    rng: Mcg128Xsl64,
}

impl EstimationEngine {
    /// Create an engine.
    pub fn new(config: EstimationConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => Mcg128Xsl64::seed_from_u64(seed),
            None => Mcg128Xsl64::from_entropy(),
        };
        Self { config, rng }
    }

    /// Current configuration.
    pub fn config(&self) -> &EstimationConfig {
        &self.config
    }

    /// Item confidence if valid, else the configured default.
    pub fn effective_confidence(&self, item: &Item) -> f64 {
        item.confidence
            .filter(|c| is_confidence_valid(*c))
            .unwrap_or(self.config.default_confidence)
    }

    /// Story points if valid, else the team's per-track sprint capacity.
    pub fn effective_points(&self, item: &Item) -> f64 {
        item.story_points
            .filter(|p| is_points_valid(*p))
            .unwrap_or_else(|| default_points(&item.team))
    }

    /// Median story points if valid, else the team's per-track sprint capacity.
    pub fn effective_points_median(&self, item: &Item) -> f64 {
        item.story_points_median
            .filter(|p| is_points_valid(*p))
            .unwrap_or_else(|| default_points(&item.team))
    }

    /// One draw of extra points from the uncertainty model.
    pub fn probabilistic_extra_points(&mut self, points: f64, confidence: f64) -> f64 {
        let z = self.standard_normal();
        points * ((spread(confidence) * z).exp() - 1.0)
    }

    /// Total working days an item represents.
    ///
    /// Explicit start and due dates win, then the median estimate with its
    /// confidence buffer, then raw story points. With neither estimate the
    /// team default feeds the median path.
    pub fn total_days_of_work(&self, item: &Item) -> f64 {
        if let (Some(start), Some(due)) = (item.start_date, item.due_date) {
            return business_days(start, due) as f64;
        }
        let has_median = item.story_points_median.is_some_and(is_points_valid);
        let has_points = item.story_points.is_some_and(is_points_valid);
        if has_points && !has_median {
            return points_to_days(self.effective_points(item), &item.team);
        }
        let median = self.effective_points_median(item);
        let extra = deterministic_extra_points(
            median,
            self.effective_confidence(item),
            self.config.uncertainty_weight,
        );
        points_to_days(median + extra, &item.team)
    }

    /// One Monte-Carlo draw of an item's total working days.
    ///
    /// Explicit dates are exact and consume no draw. Otherwise the median,
    /// raw points or team default (in that order) is inflated by a sampled
    /// extra.
    pub fn sample_days_of_work(&mut self, item: &Item) -> f64 {
        if let (Some(start), Some(due)) = (item.start_date, item.due_date) {
            return business_days(start, due) as f64;
        }
        let base = item
            .story_points_median
            .filter(|p| is_points_valid(*p))
            .or_else(|| item.story_points.filter(|p| is_points_valid(*p)))
            .unwrap_or_else(|| default_points(&item.team));
        let confidence = self.effective_confidence(item);
        let extra = self.probabilistic_extra_points(base, confidence);
        points_to_days(base + extra, &item.team)
    }

    fn standard_normal(&mut self) -> f64 {
        // Box-Muller; u1 is kept away from zero.
        let u1: f64 = 1.0 - self.rng.gen::<f64>();
        let u2: f64 = self.rng.gen::<f64>();
        (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
    }
}

impl Default for EstimationEngine {
    fn default() -> Self {
        Self::new(EstimationConfig::default())
    }
}

fn default_points(team: &Team) -> f64 {
    if team.parallel_work_limit > 0.0 {
        team.velocity / team.parallel_work_limit
    } else {
        team.velocity
    }
}

// Acklam's rational approximation of the standard normal inverse CDF.
fn normal_quantile(p: f64) -> f64 {
    const A: [f64; 6] = [
        -3.969683028665376e+01,
        2.209460984245205e+02,
        -2.759285104469687e+02,
        1.383577518672690e+02,
        -3.066479806614716e+01,
        2.506628277459239e+00,
    ];
    const B: [f64; 5] = [
        -5.447609879822406e+01,
        1.615858368580409e+02,
        -1.556989798598866e+02,
        6.680131188771972e+01,
        -1.328068155288572e+01,
    ];
    const C: [f64; 6] = [
        -7.784894002430293e-03,
        -3.223964580411365e-01,
        -2.400758277161838e+00,
        -2.549732539343734e+00,
        4.374664141464968e+00,
        2.938163982698783e+00,
    ];
    const D: [f64; 4] = [
        7.784695709041462e-03,
        3.224671290700398e-01,
        2.445134137142996e+00,
        3.754408661907416e+00,
    ];
    const P_LOW: f64 = 0.02425;

    let p = p.clamp(1e-12, 1.0 - 1e-12);
    if p < P_LOW {
        let q = (-2.0 * p.ln()).sqrt();
        (((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    } else if p <= 1.0 - P_LOW {
        let q = p - 0.5;
        let r = q * q;
        (((((A[0] * r + A[1]) * r + A[2]) * r + A[3]) * r + A[4]) * r + A[5]) * q
            / (((((B[0] * r + B[1]) * r + B[2]) * r + B[3]) * r + B[4]) * r + 1.0)
    } else {
        let q = (-2.0 * (1.0 - p).ln()).sqrt();
        -(((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use timeline_core::{ItemKey, Provenance};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn window(start: Option<NaiveDate>, due: Option<NaiveDate>) -> DateWindow {
        let key = ItemKey::new("E-1");
        let mut w = DateWindow::empty();
        if let Some(s) = start {
            w = w.with_start(s, Provenance::item("start date", &key));
        }
        if let Some(e) = due {
            w = w.with_due(e, Provenance::item("due date", &key));
        }
        w
    }

    #[test]
    fn test_business_days_epic_scenario() {
        assert_eq!(business_days(d(2024, 1, 1), d(2024, 1, 10)), 8);
    }

    #[test]
    fn test_business_days_edges() {
        assert_eq!(business_days(d(2024, 1, 6), d(2024, 1, 7)), 0);
        assert_eq!(business_days(d(2024, 1, 8), d(2024, 1, 8)), 1);
        assert_eq!(business_days(d(2024, 1, 10), d(2024, 1, 1)), 0);
    }

    #[test]
    fn test_validity() {
        assert!(!is_confidence_valid(0.0));
        assert!(is_confidence_valid(100.0));
        assert!(!is_confidence_valid(101.0));
        assert!(is_points_valid(0.0));
        assert!(!is_points_valid(-1.0));
        assert!(!is_points_valid(f64::NAN));
    }

    #[test]
    fn test_points_to_days() {
        let team = Team::default();
        assert!((points_to_days(21.0, &team) - 10.0).abs() < 1e-9);

        let wide = Team {
            parallel_work_limit: 3.0,
            ..Team::default()
        };
        assert!((points_to_days(7.0, &wide) - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_normal_quantile() {
        assert!(normal_quantile(0.5).abs() < 1e-9);
        assert!((normal_quantile(0.8) - 0.841_621).abs() < 1e-4);
        assert!((normal_quantile(0.99) - 2.326_348).abs() < 1e-4);
    }

    #[test]
    fn test_deterministic_extra_decreases_with_confidence() {
        let low = deterministic_extra_points(10.0, 10.0, 80.0);
        let mid = deterministic_extra_points(10.0, 50.0, 80.0);
        let high = deterministic_extra_points(10.0, 90.0, 80.0);
        assert!(low > mid && mid > high && high > 0.0);
        assert!(deterministic_extra_points(10.0, 100.0, 80.0).abs() < 1e-12);
        assert!((mid - 7.28).abs() < 0.01);
    }

    #[test]
    fn test_probabilistic_draws_are_seeded() {
        let config = EstimationConfig::default().with_seed(42);
        let mut a = EstimationEngine::new(config.clone());
        let mut b = EstimationEngine::new(config);
        let draws_a: Vec<f64> = (0..5).map(|_| a.probabilistic_extra_points(8.0, 40.0)).collect();
        let draws_b: Vec<f64> = (0..5).map(|_| b.probabilistic_extra_points(8.0, 40.0)).collect();
        assert_eq!(draws_a, draws_b);
        assert!(draws_a.windows(2).any(|w| w[0] != w[1]));
        assert!(draws_a.iter().all(|x| *x > -8.0));
    }

    #[test]
    fn test_sampled_days() {
        let mut engine = EstimationEngine::new(EstimationConfig::default().with_seed(3));

        let dated = Item::new("E-1", "Epic").with_dates(Some(d(2024, 1, 1)), Some(d(2024, 1, 10)));
        assert_eq!(engine.sample_days_of_work(&dated), 8.0);

        let certain = Item::new("E-2", "Epic").with_estimate(Some(42.0), None, Some(100.0));
        assert!((engine.sample_days_of_work(&certain) - 20.0).abs() < 1e-9);

        let vague = Item::new("E-3", "Epic").with_estimate(None, Some(21.0), Some(20.0));
        let draws: Vec<f64> = (0..4).map(|_| engine.sample_days_of_work(&vague)).collect();
        assert!(draws.iter().all(|x| *x > 0.0));
        assert!(draws.windows(2).any(|w| w[0] != w[1]));
    }

    #[test]
    fn test_full_confidence_draw_has_no_spread() {
        let mut engine = EstimationEngine::new(EstimationConfig::default().with_seed(7));
        assert!(engine.probabilistic_extra_points(8.0, 100.0).abs() < 1e-12);
    }

    #[test]
    fn test_total_days_priority() {
        let engine = EstimationEngine::default();

        let dated = Item::new("E-1", "Epic")
            .with_dates(Some(d(2024, 1, 1)), Some(d(2024, 1, 10)))
            .with_estimate(Some(100.0), Some(100.0), Some(90.0));
        assert_eq!(engine.total_days_of_work(&dated), 8.0);

        let median = Item::new("E-2", "Epic").with_estimate(Some(100.0), Some(21.0), Some(100.0));
        assert!((engine.total_days_of_work(&median) - 10.0).abs() < 1e-9);

        let raw = Item::new("E-3", "Epic").with_estimate(Some(42.0), None, Some(10.0));
        assert!((engine.total_days_of_work(&raw) - 20.0).abs() < 1e-9);

        let bare = Item::new("E-4", "Epic");
        let expected = points_to_days(21.0 + deterministic_extra_points(21.0, 50.0, 80.0), &Team::default());
        assert!((engine.total_days_of_work(&bare) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_effective_values_fall_back() {
        let engine = EstimationEngine::default();
        let item = Item::new("S-1", "Story").with_estimate(Some(-3.0), None, Some(0.0));
        assert_eq!(engine.effective_confidence(&item), DEFAULT_CONFIDENCE);
        assert_eq!(engine.effective_points(&item), 21.0);
        assert_eq!(engine.effective_points_median(&item), 21.0);
    }

    #[test]
    fn test_completed_days_of_work() {
        let in_flight = window(Some(d(2024, 1, 1)), Some(d(2024, 1, 31)));
        assert_eq!(completed_days_of_work(&in_flight, 23.0, d(2024, 1, 10)), 8.0);

        let open_ended = window(Some(d(2024, 1, 1)), None);
        assert_eq!(completed_days_of_work(&open_ended, 0.0, d(2024, 1, 5)), 5.0);

        let finished = window(Some(d(2023, 12, 1)), Some(d(2023, 12, 20)));
        assert_eq!(completed_days_of_work(&finished, 14.0, d(2024, 1, 10)), 14.0);

        let future = window(Some(d(2024, 2, 1)), Some(d(2024, 2, 20)));
        assert_eq!(completed_days_of_work(&future, 14.0, d(2024, 1, 10)), 0.0);
    }
}
