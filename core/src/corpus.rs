//! Document sources for a bulk load.

use crate::document::Article;
use crate::error::Result;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

/// A restartable sequence of articles. Every call to `documents` starts from the beginning,
/// which is what lets a failed bulk load be retried from scratch.
pub trait Corpus: Send + Sync {
    fn documents(&self) -> Box<dyn Iterator<Item = Result<Article>> + Send + '_>;

    fn size_hint(&self) -> Option<usize> { None }
}

impl Corpus for [Article] {
    fn documents(&self) -> Box<dyn Iterator<Item = Result<Article>> + Send + '_> {
        Box::new(self.iter().cloned().map(Ok))
    }

    fn size_hint(&self) -> Option<usize> { Some(self.len()) }
}

impl Corpus for Vec<Article> {
    fn documents(&self) -> Box<dyn Iterator<Item = Result<Article>> + Send + '_> {
        self.as_slice().documents()
    }

    fn size_hint(&self) -> Option<usize> { Some(self.len()) }
}

const TITLE_PREFIXES: &[&str] = &[
    "Introduction to", "Advanced", "Understanding", "Mastering", "Deep Dive into", "Complete Guide to",
    "Best Practices for", "Fundamentals of", "Modern", "Building", "Practical", "Optimizing",
];

const SUBJECTS: &[&str] = &[
    "Machine Learning", "Database Design", "Web Development", "Cloud Computing", "Data Structures",
    "Algorithms", "Software Architecture", "DevOps", "Artificial Intelligence", "Cybersecurity",
    "Microservices", "Performance Optimization", "Blockchain Technology", "Quantum Computing",
    "Distributed Systems", "Serverless Computing", "Computer Vision", "Natural Language Processing",
    "System Design", "Embedded Systems",
];

const OPENINGS: &[&str] = &[
    "This comprehensive exploration covers the fundamental concepts and practical applications behind modern software practice.",
    "A detailed technical analysis of optimization strategies used by teams running large production systems.",
    "Understanding the core principles requires a systematic approach that breaks complex ideas into manageable components.",
    "This investigation examines emerging patterns in software engineering and their impact on reliability.",
    "A practical handbook for developers and architects focused on real-world problem solving.",
    "Exploring frameworks that enable robust, scalable solutions in distributed environments.",
];

const TECH_TERMS: &[&str] = &[
    "scalability", "performance", "optimization", "architecture", "framework", "infrastructure",
    "deployment", "monitoring", "analytics", "automation", "testing", "encryption", "authentication",
    "networking", "kubernetes", "docker", "javascript", "python", "rust", "react",
];

const BUSINESS_TERMS: &[&str] = &[
    "productivity", "efficiency", "workflow", "strategy", "innovation", "transformation", "enterprise",
    "startup", "agile", "collaboration", "healthcare", "fintech",
];

const AUTHORS: &[&str] = &[
    "Dr. Sarah Chen", "Michael Rodriguez", "Emily Watson", "David Kim", "Maria Garcia", "Alex Johnson",
    "Robert Zhang", "Jennifer Taylor", "Sophie Turner", "Carlos Silva", "Grace Liu", "Jordan Lee",
];

const DIFFICULTIES: &[&str] = &["beginner", "intermediate", "advanced"];
const KINDS: &[&str] = &["article", "tutorial", "research", "guide", "analysis"];

/// Deterministic pseudo-random articles: the same `(seed, index)` always yields the same
/// article, and ids run `1..=count`.
#[derive(Debug, Clone, Copy)]
pub struct SyntheticCorpus {
    count: usize,
    seed: u64,
}

impl SyntheticCorpus {
    pub fn new(count: usize) -> Self { Self { count, seed: 0 } }

    pub fn with_seed(count: usize, seed: u64) -> Self { Self { count, seed } }

    pub fn article(&self, index: usize) -> Article {
        let mut rng = StdRng::seed_from_u64(self.seed.wrapping_mul(0x9E37_79B9_7F4A_7C15) ^ index as u64);
        let pick = |rng: &mut StdRng, words: &[&'static str]| -> &'static str {
            words.choose(rng).copied().unwrap_or_default()
        };

        let difficulty = pick(&mut rng, DIFFICULTIES);
        let kind = pick(&mut rng, KINDS);
        let title = format!("{} {}", pick(&mut rng, TITLE_PREFIXES), pick(&mut rng, SUBJECTS));

        let tech_count = match difficulty {
            "advanced" => 4,
            "intermediate" => 2,
            _ => 1,
        };
        let tech: Vec<&str> = TECH_TERMS.choose_multiple(&mut rng, tech_count).copied().collect();
        let business: Vec<&str> = BUSINESS_TERMS.choose_multiple(&mut rng, 2).copied().collect();
        let mut content = pick(&mut rng, OPENINGS).to_string();
        content.push_str(&format!(" Key concepts include: {}.", tech.join(", ")));
        content.push_str(&format!(" Business impact areas: {}.", business.join(", ")));
        if kind == "tutorial" {
            content.push_str(" This tutorial provides step-by-step instructions with hands-on exercises.");
        }

        let mut article = Article::new((index + 1).to_string(), title, content, pick(&mut rng, AUTHORS));
        article.tags = tech.iter().take(3).map(|t| t.to_string()).collect();
        article.difficulty = Some(difficulty.to_string());
        article.kind = Some(kind.to_string());
        article.read_time = Some(rng.gen_range(3..23));
        article.views = Some(rng.gen_range(100..100_100));
        article.rating = Some((rng.gen_range(30..=50) as f32) / 10.0);
        article.publish_date = Some(format!(
            "{}-{:02}-{:02}",
            rng.gen_range(2020..2024),
            rng.gen_range(1..=12),
            rng.gen_range(1..=28)
        ));
        article
    }
}

impl Corpus for SyntheticCorpus {
    fn documents(&self) -> Box<dyn Iterator<Item = Result<Article>> + Send + '_> {
        Box::new((0..self.count).map(move |i| Ok(self.article(i))))
    }

    fn size_hint(&self) -> Option<usize> { Some(self.count) }
}
