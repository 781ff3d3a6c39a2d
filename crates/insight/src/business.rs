//! Owner business profile and the niche guideline table.

use serde::{Deserialize, Serialize};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BusinessGoals {
    #[serde(default)]
    pub selected: Vec<String>,
    #[serde(default)]
    pub other: Option<String>,
}

impl BusinessGoals {
    pub fn joined(&self) -> String {
        self.selected
            .iter()
            .map(String::as_str)
            .chain(self.other.as_deref())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BusinessInfo {
    pub niche: Option<String>,
    #[serde(default)]
    pub goals: BusinessGoals,
    pub analysis_period: Option<String>,
    #[serde(default)]
    pub info_priority: Vec<String>,
    pub best_data_format: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisualPreference {
    Charts,
    Balanced,
}

impl BusinessInfo {
    pub fn visual_preference(&self) -> VisualPreference {
        match self.best_data_format.as_deref().map(normalize_key).as_deref() {
            Some("graficos") | Some("charts") | Some("graphs") => VisualPreference::Charts,
            _ => VisualPreference::Balanced,
        }
    }

    pub fn niche_label(&self) -> &str {
        self.niche
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or("general business")
    }
}

/// Lowercase, accent-stripped, single-spaced key.
pub fn normalize_key(raw: &str) -> String {
    let folded: String = raw
        .trim()
        .to_lowercase()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .map(|c| match c {
            '_' | '-' | '/' => ' ',
            other => other,
        })
        .collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub const GENERIC_GUIDELINE: &str = "Focus on revenue, cost and volume trends, highlight the best and worst \
performers, and point out seasonality or concentration risks a small business owner can act on.";

const NICHE_GUIDELINES: &[(&[&str], &str)] = &[
    (
        &["estetica", "beleza", "beauty", "aesthetics", "salao", "salon"],
        "Look at procedure and service mix, ticket per client, return frequency and booking seasonality. \
Name procedures explicitly when they drive growth.",
    ),
    (
        &["restaurante", "alimentacao", "food", "restaurant", "lanchonete", "bar", "padaria", "bakery"],
        "Look at best-selling items, average ticket, peak days and hours, and food cost against price. \
Flag items with high volume but low margin.",
    ),
    (
        &["varejo", "loja", "retail", "store", "comercio"],
        "Look at category and product mix, stock turnover, discounts against margin, and sales by period. \
Call out slow-moving products.",
    ),
    (
        &["ecommerce", "e commerce", "loja virtual", "online store"],
        "Look at orders, conversion signals, average order value, shipping cost share and repeat customers. \
Separate channels when the data allows it.",
    ),
    (
        &["saude", "health", "clinica", "clinic", "odontologia", "dental"],
        "Look at appointments, no-shows, procedures by professional and revenue per patient. \
Never expose patient-level details.",
    ),
    (
        &["educacao", "education", "escola", "school", "cursos", "courses"],
        "Look at enrollments, churn, course completion and revenue per student or class.",
    ),
    (
        &["academia", "fitness", "gym", "personal"],
        "Look at active members, plan mix, churn by month and attendance patterns.",
    ),
    (
        &["servicos", "services", "consultoria", "consulting", "agencia", "agency"],
        "Look at billable volume, revenue per client, client concentration and delivery time.",
    ),
    (
        &["imobiliaria", "real estate", "imoveis"],
        "Look at listings, closed deals, time to close, price per area and commission revenue.",
    ),
];

/// Steering text for a niche; unrecognised or missing niches get [`GENERIC_GUIDELINE`].
pub fn niche_guideline(niche: Option<&str>) -> &'static str {
    let Some(key) = niche.map(normalize_key).filter(|k| !k.is_empty()) else {
        return GENERIC_GUIDELINE;
    };
    NICHE_GUIDELINES
        .iter()
        .find(|(aliases, _)| aliases.contains(&key.as_str()))
        .map(|(_, text)| *text)
        .unwrap_or(GENERIC_GUIDELINE)
}
