//! Style rule definitions and evaluation.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::context::StyleContext;
use crate::dsl::{Expression, parse_expression};

/// Ordered style rules with an optional fallback style.
#[derive(Debug, Clone)]
pub struct StyleRules {
    pub rules: Vec<CompiledRule>,
    pub default: Option<String>,
}

/// A compiled style rule.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub filter: Expression,
    pub style: String,
}

/// Raw style rule from YAML (before compilation).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StyleRule {
    /// The filter expression
    #[serde(rename = "match")]
    pub match_expr: String,
    /// The style selected if this rule matches
    pub style: String,
}

/// Raw style rules from YAML (before compilation).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StyleRulesConfig {
    pub rules: Vec<StyleRule>,
    #[serde(default)]
    pub default: Option<String>,
}

impl StyleRules {
    /// Compile style rules from config.
    pub fn compile(name: &str, config: &StyleRulesConfig) -> Result<Self> {
        let mut rules = Vec::with_capacity(config.rules.len());

        for (i, rule) in config.rules.iter().enumerate() {
            let filter = parse_expression(&rule.match_expr).map_err(|e| {
                anyhow::anyhow!("Error parsing rule {} in style '{}': {}", i + 1, name, e)
            })?;

            rules.push(CompiledRule {
                filter,
                style: rule.style.clone(),
            });
        }

        Ok(StyleRules {
            rules,
            default: config.default.clone(),
        })
    }

    /// Style of the first matching rule, or the default.
    pub fn select(&self, ctx: &StyleContext<'_>) -> Option<&str> {
        self.rules
            .iter()
            .find(|rule| rule.filter.evaluate(ctx))
            .map(|rule| rule.style.as_str())
            .or(self.default.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::{Geometry, LineString, Point};
    use std::collections::HashMap;

    fn metadata(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn make_rules(default: Option<&str>) -> StyleRules {
        let config = StyleRulesConfig {
            rules: vec![
                StyleRule {
                    match_expr: "class = 'motorway' AND view::zoom >= 5".into(),
                    style: "motorway".into(),
                },
                StyleRule {
                    match_expr: "class COLLATE nocase = 'primary' AND view::zoom >= 10".into(),
                    style: "primary".into(),
                },
                StyleRule {
                    match_expr: "geometry::type = 'linestring' AND geometry::vertices > 2".into(),
                    style: "detailed-line".into(),
                },
                StyleRule {
                    match_expr: "class IS NOT NULL".into(),
                    style: "misc".into(),
                },
            ],
            default: default.map(String::from),
        };

        StyleRules::compile("roads", &config).unwrap()
    }

    #[test]
    fn test_first_match_wins() {
        let rules = make_rules(None);
        let point = Geometry::Point(Point::new(0.0, 0.0));

        let meta = metadata(&[("class", "motorway")]);
        let ctx = StyleContext::new(6.0, Some(&point), &meta);
        assert_eq!(rules.select(&ctx), Some("motorway"));

        let ctx = StyleContext::new(4.0, Some(&point), &meta);
        assert_eq!(rules.select(&ctx), Some("misc"));
    }

    #[test]
    fn test_collation_and_zoom() {
        let rules = make_rules(None);
        let meta = metadata(&[("class", "PRIMARY")]);

        let ctx = StyleContext::new(12.0, None, &meta);
        assert_eq!(rules.select(&ctx), Some("primary"));

        let ctx = StyleContext::new(9.5, None, &meta);
        assert_eq!(rules.select(&ctx), Some("misc"));
    }

    #[test]
    fn test_geometry_variables() {
        let rules = make_rules(None);
        let line = Geometry::LineString(LineString::from(vec![(0.0, 0.0), (1.0, 1.0), (2.0, 0.0)]));
        let meta = metadata(&[]);

        let ctx = StyleContext::new(14.0, Some(&line), &meta);
        assert_eq!(rules.select(&ctx), Some("detailed-line"));
    }

    #[test]
    fn test_default_and_no_match() {
        let meta = metadata(&[("highway", "primary")]);
        let ctx = StyleContext::new(14.0, None, &meta);

        assert_eq!(make_rules(None).select(&ctx), None);
        assert_eq!(make_rules(Some("fallback")).select(&ctx), Some("fallback"));
    }

    #[test]
    fn test_numeric_metadata_compares_as_number() {
        let config = StyleRulesConfig {
            rules: vec![
                StyleRule {
                    match_expr: "lanes >= 2 AND ref <> 'A1'".into(),
                    style: "wide".into(),
                },
                StyleRule {
                    match_expr: "ref = '007'".into(),
                    style: "bond".into(),
                },
            ],
            default: None,
        };
        let rules = StyleRules::compile("lanes", &config).unwrap();

        let meta = metadata(&[("lanes", "3"), ("ref", "B2")]);
        assert_eq!(rules.select(&StyleContext::new(10.0, None, &meta)), Some("wide"));

        let meta = metadata(&[("lanes", "1.5")]);
        assert_eq!(rules.select(&StyleContext::new(10.0, None, &meta)), None);

        // Text that is not a number never orders against one
        let meta = metadata(&[("lanes", "many"), ("ref", "B2")]);
        assert_eq!(rules.select(&StyleContext::new(10.0, None, &meta)), None);

        // String comparisons stay textual
        let meta = metadata(&[("ref", "007")]);
        assert_eq!(rules.select(&StyleContext::new(10.0, None, &meta)), Some("bond"));
    }

    #[test]
    fn test_compile_error_names_rule() {
        let config = StyleRulesConfig {
            rules: vec![
                StyleRule {
                    match_expr: "a = 1".into(),
                    style: "ok".into(),
                },
                StyleRule {
                    match_expr: "a = ".into(),
                    style: "broken".into(),
                },
            ],
            default: None,
        };
        let err = StyleRules::compile("roads", &config).unwrap_err();
        assert!(err.to_string().contains("rule 2 in style 'roads'"));
    }

    #[test]
    fn test_deserializes_from_yaml_shape() {
        let config: StyleRulesConfig = serde_json::from_str(
            r#"{"rules": [{"match": "class = 'park'", "style": "green"}], "default": "grey"}"#,
        )
        .unwrap();
        let rules = StyleRules::compile("areas", &config).unwrap();
        let meta = metadata(&[("class", "park")]);
        assert_eq!(rules.select(&StyleContext::new(1.0, None, &meta)), Some("green"));
    }
}
