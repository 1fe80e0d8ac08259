use promo_localizer::analysis::{BBoxNorm, TextRole};
use promo_localizer::providers::{render_translation_prompt, TranslationRegion};

#[test]
fn translation_prompt_snapshot() {
    let regions = vec![
        TranslationRegion {
            text: "COMING SOON".to_string(),
            role: TextRole::Tagline,
            bbox: BBoxNorm {
                x1: 0.12,
                y1: 0.9,
                x2: 0.78,
                y2: 0.95,
            },
        },
        TranslationRegion {
            text: "Directed by John Smith".to_string(),
            role: TextRole::Credits,
            bbox: BBoxNorm {
                x1: 0.15,
                y1: 0.85,
                x2: 0.75,
                y2: 0.88,
            },
        },
    ];
    let prompt = render_translation_prompt(&regions, "fr-FR").unwrap();
    insta::assert_snapshot!(prompt);
}
