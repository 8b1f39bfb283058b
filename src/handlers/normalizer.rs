use serde_json::Value;

use crate::models::{AnalysisResult, CookingMethod, FoodItem, NutritionInfo};

pub const CONFIDENCE_THRESHOLD: f64 = 0.9;
pub const MAX_FOOD_ITEMS: usize = 5;

/// Outcome of pulling structured data out of free-form model text
#[derive(Debug)]
pub enum Extraction {
    Parsed(Value),
    Unparsable(String),
}

/// Parses the span from the first `{` to the last `}` of `text`.
pub fn extract(text: &str) -> Extraction {
    let Some(start) = text.find('{') else {
        return Extraction::Unparsable("no JSON object in response".to_string());
    };
    let end = match text.rfind('}') {
        Some(end) if end > start => end,
        _ => return Extraction::Unparsable("unterminated JSON object".to_string()),
    };

    match serde_json::from_str::<Value>(&text[start..=end]) {
        Ok(raw) => Extraction::Parsed(raw),
        Err(e) => Extraction::Unparsable(e.to_string()),
    }
}

/// Turns model output into an [`AnalysisResult`]; never fails.
///
/// `total_calories` sums every parsed item, including those dropped by the
/// confidence filter or the item cap, while `foods` only holds survivors.
/// A field of the wrong type reads as missing.
pub fn normalize(text: &str) -> AnalysisResult {
    match extract(text) {
        Extraction::Parsed(raw) => shape(&raw),
        Extraction::Unparsable(reason) => {
            log::warn!("⚠️ Could not parse model response, returning empty result: {}", reason);
            AnalysisResult::empty()
        }
    }
}

fn number(value: &Value, key: &str) -> Option<f64> {
    value.get(key).and_then(Value::as_f64)
}

fn string(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}

fn shape(raw: &Value) -> AnalysisResult {
    let parsed: &[Value] = raw
        .get("foods")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let total_calories: f64 = parsed
        .iter()
        .map(|food| number(food, "calories").unwrap_or(0.0))
        .sum();

    let confident: Vec<&Value> = parsed
        .iter()
        .filter(|food| number(food, "confidence").is_some_and(|c| c >= CONFIDENCE_THRESHOLD))
        .collect();
    let any_confident = !confident.is_empty();

    let foods = confident
        .into_iter()
        .take(MAX_FOOD_ITEMS)
        .map(food_item)
        .collect();

    let confidence = number(raw, "confidence").unwrap_or(if any_confident {
        CONFIDENCE_THRESHOLD
    } else {
        0.0
    });

    AnalysisResult {
        foods,
        total_calories,
        confidence,
    }
}

fn food_item(food: &Value) -> FoodItem {
    let nutrition = food.get("nutrition_info");
    let nutrient = |key: &str| nutrition.and_then(|n| number(n, key)).unwrap_or(0.0);

    FoodItem {
        name: string(food, "name").unwrap_or_default(),
        calories: number(food, "calories").unwrap_or(0.0),
        cooking_method: string(food, "cooking_method").map(CookingMethod::from),
        confidence: number(food, "confidence").unwrap_or(0.0),
        portion_estimate: string(food, "portion_estimate").unwrap_or_default(),
        nutrition_info: NutritionInfo {
            protein: nutrient("protein"),
            carbs: nutrient("carbs"),
            fat: nutrient("fat"),
            fiber: nutrient("fiber"),
        },
    }
}
