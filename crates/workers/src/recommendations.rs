//! Practice recommendations: per-skill scores from the adaptive log, the
//! weakest skill, the song level and the game to suggest next.

use std::{collections::BTreeMap, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::{
    domain::SongLevel,
    error::TaskException,
    protocol::{PracticeEvent, Recommendations, SongEvent, WorkerRequest, WorkerResponse},
};

use crate::runtime::{unsupported_request, WorkerTask};

const MS_PER_DAY: f64 = 86_400_000.0;
const RECENCY_DECAY_PER_DAY: f64 = 0.35;
const RECENT_SONG_EVENTS: usize = 8;
const DEFAULT_SKILL_SCORE: f64 = 60.0;
const DEFAULT_GAME: &str = "pitch-quest";

pub const RECOMMENDATIONS_TTL: Duration = Duration::from_secs(5 * 60);

/// Skills a recommendation may target, in tie-break order.
pub const SKILL_CANDIDATES: [&str; 5] = ["pitch", "rhythm", "bow_control", "reading", "posture"];

const SKILL_BY_GAME: &[(&str, &str)] = &[
    ("pitch-quest", "pitch"),
    ("ear-trainer", "pitch"),
    ("tuning-time", "pitch"),
    ("tuner", "pitch"),
    ("scale-practice", "pitch"),
    ("rhythm-dash", "rhythm"),
    ("rhythm-painter", "rhythm"),
    ("pizzicato", "rhythm"),
    ("duet-challenge", "rhythm"),
    ("bow-hero", "bow_control"),
    ("string-quest", "bow_control"),
    ("note-memory", "reading"),
    ("melody-maker", "reading"),
    ("story-song", "reading"),
    ("coach-focus", "focus"),
    ("trainer-metronome", "rhythm"),
    ("trainer-posture", "posture"),
    ("bowing-coach", "bow_control"),
];

const GAME_BY_SKILL: &[(&str, &str)] = &[
    ("pitch", "pitch-quest"),
    ("rhythm", "rhythm-dash"),
    ("bow_control", "bow-hero"),
    ("reading", "note-memory"),
    ("posture", "view-posture"),
];

const GAME_LABELS: &[(&str, &str)] = &[
    ("pitch-quest", "Pitch Quest"),
    ("rhythm-dash", "Rhythm Dash"),
    ("note-memory", "Note Memory"),
    ("ear-trainer", "Ear Trainer"),
    ("bow-hero", "Bow Hero"),
    ("string-quest", "String Quest"),
    ("rhythm-painter", "Rhythm Painter"),
    ("story-song", "Story Song Lab"),
    ("pizzicato", "Pizzicato Pop"),
    ("tuning-time", "Tuning Time"),
    ("melody-maker", "Melody Maker"),
    ("scale-practice", "Scale Practice"),
    ("duet-challenge", "Duet Challenge"),
    ("view-posture", "Posture Mirror"),
];

const SKILL_LABELS: &[(&str, &str)] = &[
    ("pitch", "Pitch"),
    ("rhythm", "Rhythm"),
    ("bow_control", "Bowing"),
    ("reading", "Reading"),
    ("posture", "Posture"),
    ("focus", "Focus"),
];

fn lookup(table: &'static [(&'static str, &'static str)], key: &str) -> Option<&'static str> {
    table
        .iter()
        .find_map(|(candidate, value)| (*candidate == key).then_some(*value))
}

pub fn skill_for_game(game_id: &str) -> Option<&'static str> {
    lookup(SKILL_BY_GAME, game_id)
}

pub fn game_for_skill(skill: &str) -> &'static str {
    lookup(GAME_BY_SKILL, skill).unwrap_or(DEFAULT_GAME)
}

pub fn game_label(game_id: &str) -> &'static str {
    lookup(GAME_LABELS, game_id).unwrap_or("Pitch Quest")
}

pub fn skill_label(skill: &str) -> &'static str {
    lookup(SKILL_LABELS, skill).unwrap_or("Pitch")
}

/// 1 for now or no timestamp, decaying with age in days.
pub fn recency_weight(timestamp_ms: Option<i64>, now: DateTime<Utc>) -> f64 {
    let Some(timestamp_ms) = timestamp_ms.filter(|ts| *ts != 0) else {
        return 1.0;
    };
    let age_ms = now.timestamp_millis() as f64 - timestamp_ms as f64;
    let days = (age_ms / MS_PER_DAY).max(0.0);
    1.0 / (1.0 + days * RECENCY_DECAY_PER_DAY)
}

/// Weighted mean over finite value/weight pairs; 0 when nothing counts.
pub fn weighted_average<T>(
    items: &[T],
    value: impl Fn(&T) -> f64,
    weight: impl Fn(&T) -> f64,
) -> f64 {
    let (total, weight_sum) = items.iter().fold((0.0, 0.0), |(total, sum), item| {
        let (v, w) = (value(item), weight(item));
        if v.is_finite() && w.is_finite() {
            (total + v * w, sum + w)
        } else {
            (total, sum)
        }
    });
    if weight_sum == 0.0 {
        0.0
    } else {
        total / weight_sum
    }
}

fn clamp_score(value: f64) -> f64 {
    value.clamp(0.0, 100.0)
}

pub fn compute_skill_scores(
    adaptive_log: &[PracticeEvent],
    now: DateTime<Utc>,
) -> BTreeMap<String, f64> {
    let mut totals: BTreeMap<&'static str, (f64, f64)> = BTreeMap::new();
    for entry in adaptive_log {
        let Some(skill) = skill_for_game(&entry.id) else {
            continue;
        };
        let raw = entry
            .accuracy
            .filter(|accuracy| accuracy.is_finite())
            .or(entry.score.filter(|score| score.is_finite()))
            .unwrap_or(0.0);
        let value = clamp_score(raw);
        let weight = recency_weight(entry.timestamp, now);
        let slot = totals.entry(skill).or_insert((0.0, 0.0));
        slot.0 += value * weight;
        slot.1 += weight;
    }

    totals
        .into_iter()
        .map(|(skill, (total, weight))| {
            let weight = if weight == 0.0 { 1.0 } else { weight };
            (skill.to_string(), clamp_score(total / weight))
        })
        .collect()
}

pub fn find_weakest_skill(scores: &BTreeMap<String, f64>) -> &'static str {
    let mut weakest = (SKILL_CANDIDATES[0], f64::INFINITY);
    for skill in SKILL_CANDIDATES {
        let score = scores.get(skill).copied().unwrap_or(DEFAULT_SKILL_SCORE);
        if score < weakest.1 {
            weakest = (skill, score);
        }
    }
    weakest.0
}

pub fn compute_song_level(song_events: &[SongEvent], now: DateTime<Utc>) -> SongLevel {
    let recent = &song_events[song_events.len().saturating_sub(RECENT_SONG_EVENTS)..];
    let accuracy = |event: &SongEvent| clamp_score(event.accuracy.unwrap_or(0.0));

    let mut average = weighted_average(recent, accuracy, |event| {
        recency_weight(event.timestamp, now)
    });
    if average == 0.0 && !recent.is_empty() {
        average = recent.iter().map(accuracy).sum::<f64>() / recent.len() as f64;
    }

    if average >= 85.0 {
        SongLevel::Advanced
    } else if average >= 65.0 {
        SongLevel::Intermediate
    } else {
        SongLevel::Beginner
    }
}

pub fn coach_action_message(game_label: &str, skill: &str) -> String {
    format!("Try {game_label} next to build {}.", skill.replacen('_', " ", 1))
}

pub fn compute_recommendations(
    adaptive_log: &[PracticeEvent],
    song_events: &[SongEvent],
    now: DateTime<Utc>,
) -> Recommendations {
    let skill_scores = compute_skill_scores(adaptive_log, now);
    let weakest = find_weakest_skill(&skill_scores);
    let game_id = game_for_skill(weakest);
    let game_label = game_label(game_id);

    Recommendations {
        weakest_skill: weakest.to_string(),
        skill_label: skill_label(weakest).to_string(),
        song_level: compute_song_level(song_events, now),
        recommended_game_id: game_id.to_string(),
        recommended_game_label: game_label.to_string(),
        coach_action_message: coach_action_message(game_label, weakest),
        computed_at: now,
        skill_scores,
    }
}

/// Whether a result computed at `updated_at` is younger than `ttl`.
pub fn cache_fresh(updated_at: Option<DateTime<Utc>>, ttl: Duration, now: DateTime<Utc>) -> bool {
    let Some(updated_at) = updated_at else {
        return false;
    };
    let Ok(age) = (now - updated_at).to_std() else {
        // stamped in the future
        return true;
    };
    age < ttl
}

pub struct RecommendationTask;

#[async_trait]
impl WorkerTask for RecommendationTask {
    fn name(&self) -> &'static str {
        "recommendations"
    }

    async fn handle(&self, request: &WorkerRequest) -> Result<WorkerResponse, TaskException> {
        let WorkerRequest::ComputeRecommendations {
            request_id,
            adaptive_log,
            song_events,
        } = request
        else {
            return Err(unsupported_request(self.name(), request));
        };

        let recommendations = compute_recommendations(adaptive_log, song_events, Utc::now());
        Ok(WorkerResponse::RecommendationsResult {
            request_id: *request_id,
            ok: true,
            recommendations: Some(recommendations),
            error: None,
            error_code: None,
        })
    }
}

#[cfg(test)]
#[path = "tests/recommendations_tests.rs"]
mod tests;
