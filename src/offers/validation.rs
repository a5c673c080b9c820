use crate::error::{AppError, AppResult};

use super::repo_types::Detail;

pub const TITLE_MAX: usize = 50;
pub const DESCRIPTION_MAX: usize = 500;
pub const PRICE_MAX: f64 = 100_000.0;

fn clamp_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// Trimmed title cut to [`TITLE_MAX`] characters; blank titles are refused.
pub fn clamp_title(raw: &str) -> AppResult<String> {
    let title = clamp_chars(raw.trim(), TITLE_MAX);
    if title.is_empty() {
        return Err(AppError::bad_request("Title is required"));
    }
    Ok(title)
}

pub fn clamp_description(raw: &str) -> String {
    clamp_chars(raw.trim(), DESCRIPTION_MAX)
}

/// Price in `[0, PRICE_MAX]`.
pub fn parse_price(raw: &str) -> AppResult<f64> {
    let price = raw
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|p| p.is_finite())
        .ok_or_else(|| AppError::bad_request("Price must be a number"))?;
    if !(0.0..=PRICE_MAX).contains(&price) {
        return Err(AppError::bad_request(format!(
            "Price must be between 0 and {PRICE_MAX}"
        )));
    }
    Ok(price)
}

/// Optional labelled attributes of an offer as they arrive in a request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetailFields {
    pub brand: Option<String>,
    pub size: Option<String>,
    pub condition: Option<String>,
    pub color: Option<String>,
    pub city: Option<String>,
}

impl DetailFields {
    pub fn any(&self) -> bool {
        self.brand.is_some()
            || self.size.is_some()
            || self.condition.is_some()
            || self.color.is_some()
            || self.city.is_some()
    }

    /// Details in label order, skipping fields that are absent or blank.
    pub fn build(&self) -> Vec<Detail> {
        let entries: [(&Option<String>, fn(String) -> Detail); 5] = [
            (&self.brand, Detail::Brand),
            (&self.size, Detail::Size),
            (&self.condition, Detail::Condition),
            (&self.color, Detail::Color),
            (&self.city, Detail::City),
        ];
        entries
            .into_iter()
            .filter_map(|(value, make)| {
                let v = value.as_deref()?.trim();
                (!v.is_empty()).then(|| make(v.to_string()))
            })
            .collect()
    }
}
