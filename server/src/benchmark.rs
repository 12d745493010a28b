//! Fixed query workload and timing statistics for `/benchmark`.

use serde::{Serialize, Serializer};
use std::time::Duration;

pub const DEFAULT_ITERATIONS: usize = 10;
pub const MAX_ITERATIONS: usize = 100;
/// Result limit used while timing, large enough that every query pays for its full result set.
pub const BENCHMARK_LIMIT: usize = 50_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Expected {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BenchmarkQuery {
    pub query: &'static str,
    pub category: &'static str,
    pub description: &'static str,
    pub expected_results: Expected,
}

const fn q(query: &'static str, category: &'static str, description: &'static str, expected_results: Expected) -> BenchmarkQuery {
    BenchmarkQuery { query, category, description, expected_results }
}

pub const QUERIES: &[BenchmarkQuery] = &[
    q("machine", "single-word-common", "Common single word", Expected::High),
    q("quantum", "single-word-rare", "Rare technical term", Expected::Low),
    q("performance", "single-word-common", "Frequent technical term", Expected::High),
    q("machine learning", "multi-word-common", "Common tech phrase", Expected::Medium),
    q("artificial intelligence", "multi-word-common", "Popular AI term", Expected::Medium),
    q("cloud computing", "multi-word-common", "Infrastructure term", Expected::Medium),
    q("database optimization performance", "multi-word-technical", "Technical multi-term", Expected::Medium),
    q("kubernetes docker microservices", "multi-word-technical", "DevOps stack query", Expected::Low),
    q("Dr. Sarah Chen", "author-search", "Specific author search", Expected::Low),
    q("Chen", "author-partial", "Partial author search", Expected::Low),
    q(
        "advanced machine learning algorithms optimization scalability",
        "complex-long",
        "Complex technical query",
        Expected::Low,
    ),
    q("javascript", "programming-language", "Programming language", Expected::Medium),
    q("react angular vue", "framework-comparison", "Framework comparison", Expected::Medium),
    q("healthcare fintech", "domain-specific", "Industry domains", Expected::Low),
    q("security encryption", "security-focused", "Security concepts", Expected::Medium),
    q("beginner tutorial", "difficulty-search", "Beginner content search", Expected::Medium),
    q("advanced guide", "difficulty-search", "Advanced content search", Expected::Medium),
    q("research analysis", "type-search", "Research content", Expected::Medium),
    q("blockchain", "trending-tech", "Blockchain technology", Expected::Low),
    q("serverless", "trending-tech", "Serverless computing", Expected::Low),
];

/// Clamps a requested iteration count into `1..=MAX_ITERATIONS`.
pub fn iterations(requested: Option<usize>) -> usize {
    requested.unwrap_or(DEFAULT_ITERATIONS).clamp(1, MAX_ITERATIONS)
}

fn millis<S: Serializer>(value: &f64, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&format!("{value:.3}ms"))
}

/// Summary of one query's timings, in milliseconds. Standard deviation is the population one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DurationStats {
    #[serde(serialize_with = "millis")]
    pub total_duration: f64,
    #[serde(serialize_with = "millis")]
    pub average_duration: f64,
    #[serde(serialize_with = "millis")]
    pub min_duration: f64,
    #[serde(serialize_with = "millis")]
    pub max_duration: f64,
    #[serde(serialize_with = "millis")]
    pub median_duration: f64,
    #[serde(serialize_with = "millis")]
    pub standard_deviation: f64,
}

impl DurationStats {
    pub fn from_durations(durations: &[Duration]) -> Self {
        if durations.is_empty() {
            return Self::default();
        }
        let mut ms: Vec<f64> = durations.iter().map(|d| d.as_secs_f64() * 1000.0).collect();
        ms.sort_by(f64::total_cmp);
        let n = ms.len();
        let total: f64 = ms.iter().sum();
        let average = total / n as f64;
        let median = if n % 2 == 0 { (ms[n / 2 - 1] + ms[n / 2]) / 2.0 } else { ms[n / 2] };
        let variance = ms.iter().map(|d| (d - average).powi(2)).sum::<f64>() / n as f64;
        Self {
            total_duration: total,
            average_duration: average,
            min_duration: ms[0],
            max_duration: ms[n - 1],
            median_duration: median,
            standard_deviation: variance.sqrt(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryBenchmark {
    #[serde(flatten)]
    pub query: BenchmarkQuery,
    pub result_count: usize,
    pub iterations: usize,
    #[serde(flatten)]
    pub stats: DurationStats,
    /// Every iteration's time in milliseconds, in run order.
    pub durations: Vec<f64>,
}

impl QueryBenchmark {
    pub fn new(query: BenchmarkQuery, result_count: usize, durations: &[Duration]) -> Self {
        Self {
            query,
            result_count,
            iterations: durations.len(),
            stats: DurationStats::from_durations(durations),
            durations: durations.iter().map(|d| d.as_secs_f64() * 1000.0).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BenchmarkReport {
    pub benchmarks: Vec<QueryBenchmark>,
    #[serde(serialize_with = "millis")]
    pub average_duration: f64,
}

impl BenchmarkReport {
    pub fn new(benchmarks: Vec<QueryBenchmark>) -> Self {
        let average_duration = if benchmarks.is_empty() {
            0.0
        } else {
            benchmarks.iter().map(|b| b.stats.average_duration).sum::<f64>() / benchmarks.len() as f64
        };
        Self { benchmarks, average_duration }
    }
}
