//! Prompt rendering. Pure: no I/O, same input gives the same text.

use std::fmt::Write as _;

use serde::Serialize;
use serde_json::Value as JsonValue;
use tabular::{ColumnDescriptor, Row};

use crate::business::{niche_guideline, BusinessInfo, VisualPreference};
use crate::output::AI_OUTPUT_SCHEMA;
use crate::pii::PII_SENTINEL;

pub const SUMMARY_MAX_WORDS: usize = 150;
pub const MAX_INSIGHTS: usize = 5;
pub const MAX_KPIS: usize = 6;
pub const MAX_CHARTS: usize = 4;

#[derive(Debug, Clone, Copy)]
pub struct DatasetMeta<'a> {
    pub filename: &'a str,
    pub row_count: i64,
}

#[derive(Debug, Clone, Copy)]
pub struct PromptContext<'a> {
    pub columns: &'a [ColumnDescriptor],
    pub sample: &'a [Row],
    pub parameters: &'a JsonValue,
    pub business: Option<&'a BusinessInfo>,
    pub dataset: Option<DatasetMeta<'a>>,
    pub language: &'a str,
}

fn json<T: Serialize + ?Sized>(v: &T) -> String {
    serde_json::to_string(v).unwrap_or_else(|_| "null".to_string())
}

fn or_default<'a>(s: &'a str, fallback: &'a str) -> &'a str {
    if s.trim().is_empty() {
        fallback
    } else {
        s
    }
}

/// Renders the niche-aware prompt when a business profile is present, the generic one otherwise.
pub fn build(ctx: &PromptContext<'_>) -> String {
    match ctx.business {
        Some(info) => build_with_niche(ctx, info),
        None => build_generic(ctx),
    }
}

fn write_data_section(out: &mut String, ctx: &PromptContext<'_>) {
    if let Some(meta) = ctx.dataset {
        let _ = writeln!(out, "- Dataset: {} ({} rows in total)", meta.filename, meta.row_count);
    }
    let _ = writeln!(out, "- Column schema: {}", json(ctx.columns));
    let _ = writeln!(out, "- Sample rows ({} rows): {}", ctx.sample.len(), json(ctx.sample));
}

fn write_rules(out: &mut String) {
    let _ = writeln!(out, "Rules:");
    let _ = writeln!(out, "- Return ONLY valid JSON in the format below. Never write text outside the JSON.");
    let _ = writeln!(
        out,
        "- If any value looks like personal data (tax id, document number, e-mail, phone, card), \
mask it as \"{PII_SENTINEL}\" instead of dropping the row, and add a note to meta.warnings."
    );
    let _ = writeln!(
        out,
        "- If the data is empty or insufficient, say so in meta.warnings in plain, friendly words."
    );
    let _ = writeln!(out);
    let _ = writeln!(out, "Expected output schema:");
    let _ = writeln!(out, "{AI_OUTPUT_SCHEMA}");
}

fn build_generic(ctx: &PromptContext<'_>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "You are a data analysis assistant. Write every text field in {}.", ctx.language);
    let _ = writeln!(out, "IMPORTANT: return ONLY valid JSON.");
    let _ = writeln!(out);
    let _ = writeln!(out, "Context:");
    write_data_section(&mut out, ctx);
    let _ = writeln!(out, "- User parameters: {}", json(ctx.parameters));
    let _ = writeln!(out);
    let _ = writeln!(out, "Tasks:");
    let _ = writeln!(out, "1) Write a \"summary\" (at most {SUMMARY_MAX_WORDS} words) explaining what the data shows.");
    let _ = writeln!(out, "2) Give at most {MAX_INSIGHTS} short, actionable insights.");
    let _ = writeln!(out, "3) Suggest at most {MAX_CHARTS} charts (bar, line, pie, scatter, table).");
    let _ = writeln!(out, "4) Produce at most {MAX_KPIS} KPIs with label, value and unit.");
    let _ = writeln!(out, "5) Fill meta with rows_sampled, schema and warnings.");
    let _ = writeln!(out);
    write_rules(&mut out);
    out
}

fn build_with_niche(ctx: &PromptContext<'_>, info: &BusinessInfo) -> String {
    let niche = info.niche_label();
    let goals = info.goals.joined();
    let priorities = info.info_priority.join(", ");
    let visual = match info.visual_preference() {
        VisualPreference::Charts => {
            "Prefer graphical views (bar, line, pie, scatter). Avoid plain tables unless strictly necessary."
        }
        VisualPreference::Balanced => "Balance charts and detailed tables.",
    };

    let mut out = String::new();
    let _ = writeln!(out, "You are a senior business intelligence consultant specialised in: {niche}.");
    let _ = writeln!(
        out,
        "Your job is to turn raw data into strategic clarity for a small business owner. \
Write every text field in {}.",
        ctx.language
    );
    let _ = writeln!(out, "IMPORTANT: return ONLY valid JSON.");
    let _ = writeln!(out);
    let _ = writeln!(out, "--- BUSINESS CONTEXT ---");
    let _ = writeln!(out, "1. Niche: {niche}. Use the vocabulary of this market.");
    let _ = writeln!(out, "2. Goals: {}.", or_default(&goals, "general performance review"));
    let _ = writeln!(out, "3. Analysis priorities: {}.", or_default(&priorities, "overview"));
    let _ = writeln!(
        out,
        "4. Visual preference: {}.",
        info.best_data_format.as_deref().map(|s| or_default(s, "none")).unwrap_or("none")
    );
    if let Some(period) = info.analysis_period.as_deref().filter(|p| !p.trim().is_empty()) {
        let _ = writeln!(out, "5. Analysis period: {period}.");
    }
    let _ = writeln!(out, "Niche guideline: {}", niche_guideline(info.niche.as_deref()));
    let _ = writeln!(out);
    let _ = writeln!(out, "--- DATA ---");
    write_data_section(&mut out, ctx);
    let _ = writeln!(out, "- User parameters: {}", json(ctx.parameters));
    let _ = writeln!(out);
    let _ = writeln!(out, "--- TASKS ---");
    let _ = writeln!(
        out,
        "1) SUMMARY: one paragraph (at most {SUMMARY_MAX_WORDS} words), direct language, focused on the goals \
and priorities above. Say what is happening, why, and what to do."
    );
    let _ = writeln!(
        out,
        "2) INSIGHTS: at most {MAX_INSIGHTS} short, practical insights tied to the \"{niche}\" niche. \
\"Sales went up\" is too vague; name the product, service or period that moved."
    );
    let _ = writeln!(
        out,
        "3) KPIS: at most {MAX_KPIS} key numeric metrics matching the priorities, with friendly labels \
(\"Total revenue\", not \"sum_price\")."
    );
    let _ = writeln!(
        out,
        "4) CHARTS: at most {MAX_CHARTS} visualisations. {visual} Pick the chart type that tells the story \
(line for time, pie for distribution)."
    );
    let _ = writeln!(out);
    write_rules(&mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::business::{BusinessGoals, GENERIC_GUIDELINE};
    use serde_json::json;
    use tabular::CellValue;

    fn sample() -> Vec<Row> {
        let mut r = Row::new();
        r.insert("product".into(), CellValue::text("Botox"));
        r.insert("total".into(), CellValue::from(350));
        vec![r]
    }

    fn ctx<'a>(sample: &'a [Row], params: &'a JsonValue, business: Option<&'a BusinessInfo>) -> PromptContext<'a> {
        PromptContext {
            columns: &[],
            sample,
            parameters: params,
            business,
            dataset: Some(DatasetMeta { filename: "sales.csv", row_count: 120 }),
            language: "pt-BR",
        }
    }

    #[test]
    fn generic_prompt_embeds_schema_caps_and_data() {
        let rows = sample();
        let params = json!({"focus": "revenue"});
        let text = build(&ctx(&rows, &params, None));

        assert!(text.contains(AI_OUTPUT_SCHEMA));
        assert!(text.contains("ONLY valid JSON"));
        assert!(text.contains("at most 150 words"));
        assert!(text.contains("at most 5 short"));
        assert!(text.contains("at most 4 charts"));
        assert!(text.contains("at most 6 KPIs"));
        assert!(text.contains(PII_SENTINEL));
        assert!(text.contains(r#""product":"Botox""#));
        assert!(text.contains(r#"{"focus":"revenue"}"#));
        assert!(text.contains("sales.csv (120 rows in total)"));
        assert!(text.contains("pt-BR"));
        assert!(!text.contains("Niche guideline"));
    }

    #[test]
    fn niche_prompt_adds_profile_and_guideline() {
        let rows = sample();
        let params = JsonValue::Null;
        let info = BusinessInfo {
            niche: Some("Estética".into()),
            goals: BusinessGoals { selected: vec!["Grow revenue".into()], other: None },
            analysis_period: Some("last 3 months".into()),
            info_priority: vec!["growth".into(), "products".into()],
            best_data_format: Some("graficos".into()),
        };
        let text = build(&ctx(&rows, &params, Some(&info)));

        assert!(text.contains("specialised in: Estética"));
        assert!(text.contains("Goals: Grow revenue."));
        assert!(text.contains("Analysis priorities: growth, products."));
        assert!(text.contains("Analysis period: last 3 months."));
        assert!(text.contains("Prefer graphical views"));
        assert!(text.contains(niche_guideline(Some("estetica"))));
        assert!(text.contains(AI_OUTPUT_SCHEMA));
    }

    #[test]
    fn unknown_niche_uses_generic_guideline_and_defaults() {
        let rows = sample();
        let params = JsonValue::Null;
        let info = BusinessInfo {
            niche: Some("Falconry".into()),
            ..Default::default()
        };
        let text = build(&ctx(&rows, &params, Some(&info)));

        assert!(text.contains(GENERIC_GUIDELINE));
        assert!(text.contains("Goals: general performance review."));
        assert!(text.contains("Balance charts and detailed tables."));
    }

    #[test]
    fn build_is_deterministic() {
        let rows = sample();
        let params = json!({"a": 1});
        assert_eq!(build(&ctx(&rows, &params, None)), build(&ctx(&rows, &params, None)));
    }
}
