//! Turns the analysis model's raw reply into a linked product list.

use thiserror::Error;

use crate::marketplace::MarketplaceConfig;
use crate::models::{ProductAnalysis, ProductItem};

const TAGGED_FENCE: &str = "```json";
const FENCE: &str = "```";

/// First matching rule wins; order matters.
const PLACEMENT_PREFIXES: &[(&[&str], &str)] = &[
    (&["above", "hanging"], "hanging "),
    (&["large", "tall"], "large "),
    (&["human", "life size"], "human sized "),
    (&["small", "mini"], "small "),
];

#[derive(Debug, Error)]
#[error("analysis reply is not a valid product list: {0}")]
pub struct ProductDecodeError(#[from] pub serde_json::Error);

/// Recovers the JSON payload from a reply that may be wrapped in a Markdown fence.
///
/// A ```` ```json ```` fence is preferred; otherwise the first bare fence is used.
/// The payload runs to the next fence, or to the end of the text when the fence
/// is never closed. Text without fences is returned as is.
pub fn extract_json_payload(text: &str) -> &str {
    let opened = text
        .split_once(TAGGED_FENCE)
        .or_else(|| text.split_once(FENCE))
        .map(|(_, rest)| rest);
    match opened {
        Some(rest) => rest.split(FENCE).next().unwrap_or(rest),
        None => text,
    }
}

pub fn decode_analysis(payload: &str) -> Result<ProductAnalysis, ProductDecodeError> {
    Ok(serde_json::from_str(payload)?)
}

fn placement_prefix(note: &str) -> Option<&'static str> {
    let note = note.to_lowercase();
    PLACEMENT_PREFIXES
        .iter()
        .find(|(needles, _)| needles.iter().any(|n| note.contains(n)))
        .map(|(_, prefix)| *prefix)
}

/// Ordered marketplace search terms for one product.
pub fn search_terms(item: &ProductItem) -> Vec<String> {
    let mut terms = Vec::with_capacity(4);
    if item.qty > 1 {
        terms.push(item.qty.to_string());
    }
    if let Some(color) = &item.color {
        terms.push(color.clone());
    }
    let prefix = item.placement.note.as_deref().and_then(placement_prefix).unwrap_or("");
    terms.push(format!("{prefix}{}", item.name));
    terms.push(item.description.clone());
    terms
}

/// Overwrites every item's `amazon_link`.
pub fn enrich_links(analysis: &mut ProductAnalysis, marketplace: &MarketplaceConfig) {
    for item in &mut analysis.items {
        item.amazon_link = marketplace.search_url(&search_terms(item));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Placement;
    use pretty_assertions::assert_eq;

    fn item(name: &str, note: Option<&str>) -> ProductItem {
        ProductItem {
            name: name.into(),
            kind: "decor".into(),
            qty: 1,
            description: "canvas wall art".into(),
            placement: Placement { note: note.map(Into::into), bbox_norm: vec![0.0, 0.0, 0.5, 0.5] },
            ..Default::default()
        }
    }

    fn marketplace() -> MarketplaceConfig {
        MarketplaceConfig { host: "www.amazon.com".into(), partner_tag: "snapdesign-20".into() }
    }

    #[test]
    fn extracts_between_tagged_fence_and_next_fence() {
        let text = "prefix ```json\n{\"a\":1}\n``` suffix";
        assert_eq!(extract_json_payload(text), "\n{\"a\":1}\n");
    }

    #[test]
    fn extracts_first_untagged_block() {
        let text = "here:\n```\n{\"b\":2}\n```\nand ```{\"c\":3}```";
        assert_eq!(extract_json_payload(text), "\n{\"b\":2}\n");
    }

    #[test]
    fn prefers_tagged_fence_over_earlier_bare_fence() {
        let text = "```\nnot this\n```\n```json\n{\"d\":4}\n```";
        assert_eq!(extract_json_payload(text), "\n{\"d\":4}\n");
    }

    #[test]
    fn unclosed_fence_takes_the_remainder() {
        assert_eq!(extract_json_payload("```json\n{\"e\":5}"), "\n{\"e\":5}");
        assert_eq!(extract_json_payload("```\n{\"e\":5}"), "\n{\"e\":5}");
    }

    #[test]
    fn text_without_fences_is_unchanged() {
        let text = "{\"items\": []}";
        assert_eq!(extract_json_payload(text), text);
    }

    #[test]
    fn decode_tolerates_missing_safety_notes() {
        let analysis = decode_analysis(r#"{"description":"d","items":[]}"#).unwrap();
        assert_eq!(analysis.safety_notes, "");
        assert!(analysis.items.is_empty());
    }

    #[test]
    fn decode_fails_when_items_is_a_string() {
        let err = decode_analysis(r#"{"description":"d","items":"lamp","safetyNotes":""}"#);
        assert!(err.is_err());
    }

    #[test]
    fn decode_fails_on_non_json() {
        assert!(decode_analysis("Sure! Here are the products you need.").is_err());
    }

    #[test]
    fn decode_reads_full_item() {
        let payload = r#"{
            "description": "modern theme",
            "items": [{
                "name": "floor lamp",
                "type": "lighting",
                "qty": 1,
                "color": null,
                "description": "arc floor lamp brass",
                "keywords": ["arc", "brass", "arc"],
                "placement": {"note": null, "bboxNorm": [0.7, 0.1, 0.2, 0.6]},
                "estPriceUSD": 89.99
            }],
            "safetyNotes": null
        }"#;
        let analysis = decode_analysis(payload).unwrap();
        let lamp = &analysis.items[0];
        assert_eq!(lamp.kind, "lighting");
        assert_eq!(lamp.color, None);
        assert_eq!(lamp.keywords, vec!["arc", "brass", "arc"]);
        assert_eq!(lamp.placement.bbox_norm, vec![0.7, 0.1, 0.2, 0.6]);
        assert_eq!(lamp.est_price_usd, Some(89.99));
        assert_eq!(lamp.amazon_link, "");
        assert_eq!(analysis.safety_notes, "");
    }

    #[test]
    fn no_quantity_token_when_qty_is_one_or_missing() {
        let mut single = item("vase", None);
        assert_eq!(search_terms(&single), vec!["vase", "canvas wall art"]);
        single.qty = 0;
        assert_eq!(search_terms(&single), vec!["vase", "canvas wall art"]);
    }

    #[test]
    fn quantity_and_color_lead_the_terms() {
        let mut pillows = item("throw pillow", None);
        pillows.qty = 4;
        pillows.color = Some("mustard".into());
        assert_eq!(search_terms(&pillows), vec!["4", "mustard", "throw pillow", "canvas wall art"]);
    }

    #[test]
    fn hung_above_note_prefixes_hanging() {
        let painting = item("painting", Some("hung above the sofa"));
        assert_eq!(search_terms(&painting)[0], "hanging painting");
    }

    #[test]
    fn hanging_beats_large() {
        let planter = item("planter", Some("Large planter HANGING from the ceiling"));
        assert_eq!(search_terms(&planter)[0], "hanging planter");
    }

    #[test]
    fn later_rules_apply_in_order() {
        assert_eq!(search_terms(&item("plant", Some("tall, in the corner")))[0], "large plant");
        assert_eq!(search_terms(&item("bear", Some("life size by the door")))[0], "human sized bear");
        assert_eq!(search_terms(&item("tree", Some("mini tree on desk")))[0], "small tree");
        assert_eq!(search_terms(&item("rug", Some("under the table")))[0], "rug");
    }

    #[test]
    fn enrich_links_overwrites_every_item() {
        let mut analysis = ProductAnalysis {
            description: "gallery wall".into(),
            items: vec![item("painting", Some("above the sofa")), item("frame", None)],
            safety_notes: String::new(),
        };
        analysis.items[1].amazon_link = "stale".into();
        enrich_links(&mut analysis, &marketplace());
        assert_eq!(
            analysis.items[0].amazon_link,
            "https://www.amazon.com/s?k=hanging+painting+canvas+wall+art&tag=snapdesign-20"
        );
        assert_eq!(
            analysis.items[1].amazon_link,
            "https://www.amazon.com/s?k=frame+canvas+wall+art&tag=snapdesign-20"
        );
    }

    #[test]
    fn enrich_links_accepts_empty_list() {
        let mut analysis = ProductAnalysis::default();
        enrich_links(&mut analysis, &marketplace());
        assert!(analysis.items.is_empty());
    }
}
