//! Target profile: where an item's page lives and how to read its fields

use crate::error::ProfileError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// How a field's raw value is coerced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Trimmed text
    Text,
    /// Locale-aware decimal number
    Number,
    /// List of URLs pulled out of attribute values
    UrlList,
    /// `false` when an unavailability phrase occurs, `true` otherwise
    Availability,
}

/// Decimal separator convention for number fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecimalStyle {
    /// `1.299,99`
    Comma,
    /// `1,299.99`
    Dot,
    /// Guess from the separators present
    #[default]
    Auto,
}

/// One way of locating a field on the page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectorStrategy {
    /// CSS selector
    pub selector: String,

    /// Attribute to read instead of the element text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,

    /// Selector of the fractional part, joined to the whole part read by `selector`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fraction_selector: Option<String>,
}

impl SelectorStrategy {
    /// Strategy reading the element text
    pub fn text(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            attribute: None,
            fraction_selector: None,
        }
    }

    /// Strategy reading an attribute
    pub fn attribute(selector: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            attribute: Some(attribute.into()),
            fraction_selector: None,
        }
    }

    /// Strategy joining a whole part and a fractional part
    pub fn split_price(whole: impl Into<String>, fraction: impl Into<String>) -> Self {
        Self {
            selector: whole.into(),
            attribute: None,
            fraction_selector: Some(fraction.into()),
        }
    }
}

/// A field to extract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Output column name (list fields become `name1..nameN`)
    pub name: String,

    /// Coercion applied to the raw value
    pub kind: FieldKind,

    /// Strategies in priority order; the first yielding a value wins
    pub strategies: Vec<SelectorStrategy>,

    /// Separator convention for `number` fields
    #[serde(default)]
    pub decimal_style: DecimalStyle,

    /// Regex removed from every URL of a `url_list` field
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strip_pattern: Option<String>,

    /// URLs matching any of these regexes are dropped
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude_patterns: Vec<String>,

    /// Cap on the number of URLs kept
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_items: Option<usize>,

    /// For `url_list`: concatenate the URLs of every strategy instead of stopping at the first
    #[serde(default, skip_serializing_if = "is_false")]
    pub merge_strategies: bool,

    /// Case-insensitive phrases meaning "not available"
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unavailable_markers: Vec<String>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl FieldSpec {
    /// Field with the given kind and strategies and default options
    pub fn new(name: impl Into<String>, kind: FieldKind, strategies: Vec<SelectorStrategy>) -> Self {
        Self {
            name: name.into(),
            kind,
            strategies,
            decimal_style: DecimalStyle::Auto,
            strip_pattern: None,
            exclude_patterns: Vec::new(),
            max_items: None,
            merge_strategies: false,
            unavailable_markers: Vec::new(),
        }
    }
}

/// Everything the engine needs to know about the target site
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetProfile {
    /// Profile revision, recorded for operators
    #[serde(default = "default_version")]
    pub version: String,

    /// Canonical item URL; `{key}` and `{column}` placeholders are expanded
    pub url_template: String,

    /// Further URLs tried, in order, when a page yields no field or a failure
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alternate_url_templates: Vec<String>,

    /// Element that signals the page is ready
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ready_selector: Option<String>,

    /// Also try the next URL when an availability field reads `false`
    #[serde(default, skip_serializing_if = "is_false")]
    pub fallback_when_unavailable: bool,

    /// Fields to extract
    pub fields: Vec<FieldSpec>,
}

fn default_version() -> String {
    "1".to_string()
}

impl Default for TargetProfile {
    /// Retail product detail page with price, images, title and availability
    fn default() -> Self {
        let mut price = FieldSpec::new(
            "price",
            FieldKind::Number,
            vec![
                SelectorStrategy::split_price(
                    "#corePriceDisplay_desktop_feature_div span.a-price-whole",
                    "#corePriceDisplay_desktop_feature_div span.a-price-fraction",
                ),
                SelectorStrategy::text("#corePriceDisplay_desktop_feature_div span.a-offscreen"),
                SelectorStrategy::text("#price_inside_buybox"),
            ],
        );
        price.decimal_style = DecimalStyle::Comma;

        let mut image = FieldSpec::new(
            "image",
            FieldKind::UrlList,
            vec![
                SelectorStrategy::attribute("img#landingImage", "data-a-dynamic-image"),
                SelectorStrategy::attribute("li.imageThumbnail img", "data-old-hires"),
                SelectorStrategy::attribute("li.imageThumbnail img", "src"),
            ],
        );
        image.strip_pattern = Some(r"\._[^.]+_".to_string());
        image.exclude_patterns = vec![
            r"_US40_|_SX40_|_SS40_|_SR38,50_|_US100_|_SX38_SY50_CR".to_string(),
            r"dp-play-icon-overlay|play-button-mb-image-grid-small_".to_string(),
        ];
        image.max_items = Some(10);
        image.merge_strategies = true;

        let mut availability = FieldSpec::new(
            "available",
            FieldKind::Availability,
            vec![SelectorStrategy::text("#ppd")],
        );
        availability.unavailable_markers = vec![
            "no disponible".to_string(),
            "currently unavailable".to_string(),
            "no es una página activa de nuestro sitio".to_string(),
            "cannot be shipped to your selected delivery location".to_string(),
            "no puede enviarse este producto al punto de entrega seleccionado".to_string(),
        ];

        Self {
            version: default_version(),
            url_template: "https://www.amazon.es/dp/{key}".to_string(),
            alternate_url_templates: vec!["https://www.amazon.com/dp/{key}".to_string()],
            ready_selector: Some("#dp".to_string()),
            fallback_when_unavailable: true,
            fields: vec![
                FieldSpec::new(
                    "title",
                    FieldKind::Text,
                    vec![SelectorStrategy::text("#productTitle")],
                ),
                price,
                image,
                availability,
            ],
        }
    }
}

impl TargetProfile {
    /// Check the profile for mistakes that would only surface mid-run
    ///
    /// # Errors
    ///
    /// Returns the first problem found: missing template, no fields,
    /// duplicate or empty names, fields without strategies, selectors that
    /// do not parse, or patterns that do not compile.
    pub fn validate(&self) -> Result<(), ProfileError> {
        if self.url_template.trim().is_empty() {
            return Err(ProfileError::Invalid("url_template must not be empty".to_string()));
        }
        if self.fields.is_empty() {
            return Err(ProfileError::Invalid("at least one field is required".to_string()));
        }
        if let Some(ready) = &self.ready_selector {
            check_selector("ready_selector", ready)?;
        }

        let mut names = HashSet::new();
        for field in &self.fields {
            if field.name.trim().is_empty() {
                return Err(ProfileError::Invalid("field name must not be empty".to_string()));
            }
            if !names.insert(field.name.as_str()) {
                return Err(ProfileError::Invalid(format!("duplicate field '{}'", field.name)));
            }
            if field.strategies.is_empty() {
                return Err(ProfileError::Invalid(format!(
                    "field '{}' has no strategies",
                    field.name
                )));
            }
            for strategy in &field.strategies {
                check_selector(&field.name, &strategy.selector)?;
                if let Some(fraction) = &strategy.fraction_selector {
                    check_selector(&field.name, fraction)?;
                }
            }
            if field.max_items == Some(0) {
                return Err(ProfileError::Invalid(format!(
                    "field '{}' has max_items = 0",
                    field.name
                )));
            }
            if field.kind == FieldKind::Availability && field.unavailable_markers.is_empty() {
                return Err(ProfileError::Invalid(format!(
                    "availability field '{}' needs unavailable_markers",
                    field.name
                )));
            }
            compile_patterns(field)?;
        }

        if self.fallback_when_unavailable
            && !self.fields.iter().any(|f| f.kind == FieldKind::Availability)
        {
            return Err(ProfileError::Invalid(
                "fallback_when_unavailable needs an availability field".to_string(),
            ));
        }

        Ok(())
    }

    /// Load a profile from TOML
    pub fn from_toml(toml_str: &str) -> Result<Self, ProfileError> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Serialize the profile to TOML
    pub fn to_toml(&self) -> Result<String, ProfileError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// All URL templates in the order they are tried
    pub fn url_templates(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.url_template.as_str())
            .chain(self.alternate_url_templates.iter().map(String::as_str))
    }
}

fn check_selector(field: &str, selector: &str) -> Result<(), ProfileError> {
    scraper::Selector::parse(selector)
        .map(|_| ())
        .map_err(|_| ProfileError::Selector {
            field: field.to_string(),
            selector: selector.to_string(),
        })
}

/// Compiled `strip_pattern` and `exclude_patterns` of a field
pub(crate) fn compile_patterns(field: &FieldSpec) -> Result<(Option<Regex>, Vec<Regex>), ProfileError> {
    let compile = |pattern: &str| {
        Regex::new(pattern).map_err(|source| ProfileError::Pattern {
            field: field.name.clone(),
            source,
        })
    };

    let strip = field.strip_pattern.as_deref().map(compile).transpose()?;
    let exclude = field
        .exclude_patterns
        .iter()
        .map(|p| compile(p))
        .collect::<Result<Vec<_>, _>>()?;

    Ok((strip, exclude))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_profile_is_valid() {
        let profile = TargetProfile::default();
        assert!(profile.validate().is_ok());
        assert_eq!(profile.url_templates().count(), 2);
    }

    #[test]
    fn test_parse_minimal_toml() {
        let profile = TargetProfile::from_toml(
            r##"
            url_template = "https://shop.test/item/{key}"

            [[fields]]
            name = "price"
            kind = "number"
            decimal_style = "comma"

            [[fields.strategies]]
            selector = "span.whole"
            fraction_selector = "span.fraction"

            [[fields.strategies]]
            selector = "#price"
            "##,
        )
        .unwrap();

        assert_eq!(profile.version, "1");
        assert!(profile.ready_selector.is_none());
        let price = &profile.fields[0];
        assert_eq!(price.kind, FieldKind::Number);
        assert_eq!(price.decimal_style, DecimalStyle::Comma);
        assert_eq!(price.strategies.len(), 2);
        assert_eq!(
            price.strategies[0].fraction_selector.as_deref(),
            Some("span.fraction")
        );
        assert!(profile.validate().is_ok());
    }

    #[test]
    fn test_toml_round_trip() {
        let profile = TargetProfile::default();
        let parsed = TargetProfile::from_toml(&profile.to_toml().unwrap()).unwrap();
        assert_eq!(profile, parsed);
    }

    #[test]
    fn test_duplicate_field_rejected() {
        let mut profile = TargetProfile::default();
        let first = profile.fields[0].clone();
        profile.fields.push(first);

        assert!(matches!(profile.validate(), Err(ProfileError::Invalid(_))));
    }

    #[test]
    fn test_field_without_strategies_rejected() {
        let mut profile = TargetProfile::default();
        profile.fields[0].strategies.clear();
        assert!(profile.validate().is_err());
    }

    #[test]
    fn test_bad_selector_rejected() {
        let mut profile = TargetProfile::default();
        profile.fields[0].strategies[0].selector = "div[[".to_string();
        assert!(matches!(profile.validate(), Err(ProfileError::Selector { .. })));
    }

    #[test]
    fn test_bad_pattern_rejected() {
        let mut profile = TargetProfile::default();
        profile.fields[2].strip_pattern = Some("(unclosed".to_string());
        assert!(matches!(profile.validate(), Err(ProfileError::Pattern { .. })));
    }

    #[test]
    fn test_availability_needs_markers() {
        let mut profile = TargetProfile::default();
        profile.fields[3].unavailable_markers.clear();
        assert!(profile.validate().is_err());
    }

    #[test]
    fn test_unavailable_fallback_needs_availability_field() {
        let mut profile = TargetProfile::default();
        profile.fields.retain(|f| f.kind != FieldKind::Availability);
        assert!(profile.validate().is_err());

        profile.fallback_when_unavailable = false;
        assert!(profile.validate().is_ok());
    }
}
