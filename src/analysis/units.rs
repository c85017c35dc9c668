//! Unit and label helpers for legends and reports.

use crate::models::Observation;

/// First non-empty unit in the data, trimmed.
pub fn unit_of(observations: &[Observation]) -> Option<String> {
    observations
        .iter()
        .filter_map(|o| o.unit.as_deref())
        .map(str::trim)
        .find(|u| !u.is_empty())
        .map(String::from)
}

/// Short form of common units; unknown units come back unchanged.
pub fn abbreviate_unit(unit: &str) -> String {
    let normalized = unit.trim().to_lowercase();

    let short = match normalized.as_str() {
        "kilogram" | "kilograms" => "kg",
        "gram" | "grams" => "g",
        "tonne" | "tonnes" | "ton" | "tons" | "metric ton" | "metric tons" => "t",
        "kilometer" | "kilometers" | "kilometre" | "kilometres" => "km",
        "meter" | "meters" | "metre" | "metres" => "m",
        "centimeter" | "centimeters" | "centimetre" | "centimetres" => "cm",
        "millimeter" | "millimeters" | "millimetre" | "millimetres" => "mm",
        "liter" | "liters" | "litre" | "litres" => "L",
        "milliliter" | "milliliters" | "millilitre" | "millilitres" => "mL",
        "square kilometer" | "square kilometers" | "square kilometre" | "square kilometres" => {
            "km²"
        }
        "square meter" | "square meters" | "square metre" | "square metres" => "m²",
        "hectare" | "hectares" => "ha",
        "hour" | "hours" => "hr",
        "minute" | "minutes" => "min",
        "second" | "seconds" => "s",
        "vatu" => "VT",
        "percent" | "percentage" => "%",
        "degree" | "degrees" => "°",
        "celsius" => "°C",
        "fahrenheit" => "°F",
        _ => return unit.to_string(),
    };

    short.to_string()
}

/// Whitespace to underscores, then drop anything outside `[A-Za-z0-9_-]`.
pub fn sanitize_filename(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut in_whitespace = false;

    for c in name.chars() {
        if c.is_whitespace() {
            if !in_whitespace {
                out.push('_');
            }
            in_whitespace = true;
            continue;
        }
        in_whitespace = false;
        if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
            out.push(c);
        }
    }

    out
}
