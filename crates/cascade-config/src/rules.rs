use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use cascade_model::{MethodRef, Rule};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct ApiSpec {
    class: String,
    method: String,
}

#[derive(Debug, Deserialize)]
struct RuleFile {
    crime: String,
    #[serde(default)]
    permission: Vec<String>,
    api: [ApiSpec; 2],
    #[serde(default = "default_weight")]
    weight: f64,
    #[serde(default = "default_score")]
    score: f64,
}

fn default_weight() -> f64 {
    1.0
}

fn default_score() -> f64 {
    1.0
}

impl From<RuleFile> for Rule {
    fn from(f: RuleFile) -> Self {
        Rule {
            crime: f.crime,
            permissions: f.permission.into_iter().collect(),
            api_pair: [
                MethodRef::new(f.api[0].class.clone(), f.api[0].method.clone()),
                MethodRef::new(f.api[1].class.clone(), f.api[1].method.clone()),
            ],
            weight: f.weight,
            yscore: f.score,
        }
    }
}

/// Load every `*.toml` rule definition in `dir`, sorted by filename so
/// evaluation order (and therefore report ordering) is deterministic
/// across runs.
pub fn load_rules_dir(dir: impl AsRef<Path>) -> Result<Vec<Rule>> {
    let dir = dir.as_ref();
    let pattern = dir.join("*.toml");
    let pattern_str = pattern.to_string_lossy().into_owned();

    let mut paths: Vec<PathBuf> = glob::glob(&pattern_str)
        .with_context(|| format!("invalid rule glob pattern: {pattern_str}"))?
        .filter_map(|entry| entry.ok())
        .collect();
    paths.sort();

    let mut rules = Vec::with_capacity(paths.len());
    for path in paths {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("reading rule file {}", path.display()))?;
        let parsed: RuleFile = toml::from_str(&content)
            .with_context(|| format!("parsing rule file {}", path.display()))?;
        rules.push(Rule::from(parsed));
    }
    Ok(rules)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_and_sorts_rule_files_by_name() {
        let dir =
            std::env::temp_dir().join(format!("cascade-config-rules-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        write_rule(
            &dir.join("b_rule.toml"),
            r#"
            crime = "second"
            api = [
                { class = "Lb;", method = "one" },
                { class = "Lb;", method = "two" },
            ]
            "#,
        );
        write_rule(
            &dir.join("a_rule.toml"),
            r#"
            crime = "first"
            permission = ["android.permission.SEND_SMS"]
            weight = 3.0
            score = 2.0
            api = [
                { class = "La;", method = "one" },
                { class = "La;", method = "two" },
            ]
            "#,
        );

        let rules = load_rules_dir(&dir).unwrap();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].crime, "first");
        assert_eq!(rules[0].weight, 3.0);
        assert_eq!(rules[1].crime, "second");

        std::fs::remove_dir_all(&dir).ok();
    }

    fn write_rule(path: &Path, content: &str) {
        let mut file = std::fs::File::create(path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
    }
}
